//! Runtime types.
//!
//! A [`RuntimeType`] is a finished, immutable type known to the host: either
//! declared up front by the embedding application (`TypeOrigin::Host`) or
//! produced by a code emitter (`TypeOrigin::Generated`). Handles are cheap to
//! clone and compare by a process-unique [`TypeKey`].

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use bitflags::bitflags;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::value::{Value, ValueKind};

bitflags! {
    /// Type-level attributes.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct TypeAttributes: u32 {
        const PUBLIC = 1 << 0;
        const SEALED = 1 << 1;
        const ABSTRACT = 1 << 2;
        const INTERFACE = 1 << 3;
        const SERIALIZABLE = 1 << 4;
        /// Declared inside another type.
        const NESTED = 1 << 5;
    }
}

/// Process-unique identity of a runtime type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeKey(u64);

impl TypeKey {
    fn fresh() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        TypeKey(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Member accessibility.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Visibility {
    Public,
    Protected,
    Private,
}

impl Visibility {
    /// Whether a derived type can call a member with this visibility.
    #[inline]
    pub fn is_visible_to_subclass(self) -> bool {
        matches!(self, Visibility::Public | Visibility::Protected)
    }
}

/// A constructor, described by its parameter kinds.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConstructorSignature {
    pub parameters: Vec<ValueKind>,
    pub visibility: Visibility,
}

impl ConstructorSignature {
    pub fn public(parameters: impl Into<Vec<ValueKind>>) -> Self {
        ConstructorSignature {
            parameters: parameters.into(),
            visibility: Visibility::Public,
        }
    }

    pub fn protected(parameters: impl Into<Vec<ValueKind>>) -> Self {
        ConstructorSignature {
            parameters: parameters.into(),
            visibility: Visibility::Protected,
        }
    }

    pub fn private(parameters: impl Into<Vec<ValueKind>>) -> Self {
        ConstructorSignature {
            parameters: parameters.into(),
            visibility: Visibility::Private,
        }
    }

    /// Whether `arguments` can be passed to this constructor.
    pub fn accepts(&self, arguments: &[ValueKind]) -> bool {
        self.parameters.len() == arguments.len()
            && self
                .parameters
                .iter()
                .zip(arguments)
                .all(|(param, arg)| *param == ValueKind::Object || param == arg)
    }
}

/// A named marker attached to a type, with positional arguments.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CustomAttribute {
    pub name: String,
    pub arguments: Vec<Value>,
}

impl CustomAttribute {
    pub fn new(name: impl Into<String>) -> Self {
        CustomAttribute {
            name: name.into(),
            arguments: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_argument(mut self, argument: impl Into<Value>) -> Self {
        self.arguments.push(argument.into());
        self
    }
}

/// Where a runtime type came from.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeOrigin {
    Host,
    Generated { module: String },
}

struct TypeDef {
    key: TypeKey,
    name: String,
    namespace: Option<String>,
    full_name: String,
    attributes: TypeAttributes,
    base: Option<RuntimeType>,
    interfaces: Vec<RuntimeType>,
    constructors: Vec<ConstructorSignature>,
    fields: Vec<String>,
    methods: Vec<String>,
    custom_attributes: Vec<CustomAttribute>,
    static_values: FxHashMap<String, Value>,
    origin: TypeOrigin,
    nested: RwLock<Vec<RuntimeType>>,
}

/// Handle to an immutable runtime type.
#[derive(Clone)]
pub struct RuntimeType(Arc<TypeDef>);

impl RuntimeType {
    /// The root of the host type hierarchy.
    pub fn root() -> RuntimeType {
        static ROOT: OnceLock<RuntimeType> = OnceLock::new();
        ROOT.get_or_init(|| {
            RuntimeType::builder("Object")
                .namespace("System")
                .attributes(TypeAttributes::PUBLIC)
                .without_base()
                .build()
        })
        .clone()
    }

    pub fn builder(name: impl Into<String>) -> RuntimeTypeBuilder {
        RuntimeTypeBuilder::new(name)
    }

    #[inline]
    pub fn key(&self) -> TypeKey {
        self.0.key
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn namespace(&self) -> Option<&str> {
        self.0.namespace.as_deref()
    }

    /// `Namespace.Name`, or `Outer+Name` for nested types.
    pub fn full_name(&self) -> &str {
        &self.0.full_name
    }

    pub fn attributes(&self) -> TypeAttributes {
        self.0.attributes
    }

    pub fn base_type(&self) -> Option<&RuntimeType> {
        self.0.base.as_ref()
    }

    pub fn interfaces(&self) -> &[RuntimeType] {
        &self.0.interfaces
    }

    pub fn constructors(&self) -> &[ConstructorSignature] {
        &self.0.constructors
    }

    pub fn fields(&self) -> &[String] {
        &self.0.fields
    }

    pub fn methods(&self) -> &[String] {
        &self.0.methods
    }

    pub fn custom_attributes(&self) -> &[CustomAttribute] {
        &self.0.custom_attributes
    }

    pub fn custom_attribute(&self, name: &str) -> Option<&CustomAttribute> {
        self.0.custom_attributes.iter().find(|a| a.name == name)
    }

    pub fn has_custom_attribute(&self, name: &str) -> bool {
        self.custom_attribute(name).is_some()
    }

    /// The value a type initializer stored into a static field.
    pub fn static_field_value(&self, name: &str) -> Option<&Value> {
        self.0.static_values.get(name)
    }

    pub fn origin(&self) -> &TypeOrigin {
        &self.0.origin
    }

    pub fn is_generated(&self) -> bool {
        matches!(self.0.origin, TypeOrigin::Generated { .. })
    }

    pub fn is_sealed(&self) -> bool {
        self.0.attributes.contains(TypeAttributes::SEALED)
    }

    pub fn is_interface(&self) -> bool {
        self.0.attributes.contains(TypeAttributes::INTERFACE)
    }

    pub fn is_abstract(&self) -> bool {
        self.0
            .attributes
            .intersects(TypeAttributes::ABSTRACT | TypeAttributes::INTERFACE)
    }

    /// Whether a derived type can be created from this type.
    pub fn is_subclassable(&self) -> bool {
        !self.is_sealed()
            && !self.is_interface()
            && self
                .0
                .constructors
                .iter()
                .any(|c| c.visibility.is_visible_to_subclass())
    }

    /// Whether `self` equals `other` or derives from it (through bases or interfaces).
    pub fn is_assignable_to(&self, other: &RuntimeType) -> bool {
        if self == other {
            return true;
        }
        if self.0.interfaces.iter().any(|i| i.is_assignable_to(other)) {
            return true;
        }
        self.0
            .base
            .as_ref()
            .is_some_and(|base| base.is_assignable_to(other))
    }

    /// Types declared inside this one, in creation order.
    pub fn nested_types(&self) -> Vec<RuntimeType> {
        self.0.nested.read().clone()
    }

    pub(crate) fn add_nested_type(&self, nested: RuntimeType) {
        self.0.nested.write().push(nested);
    }
}

impl PartialEq for RuntimeType {
    fn eq(&self, other: &Self) -> bool {
        self.0.key == other.0.key
    }
}

impl Eq for RuntimeType {}

impl Hash for RuntimeType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.key.hash(state);
    }
}

impl fmt::Debug for RuntimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RuntimeType({})", self.0.full_name)
    }
}

impl fmt::Display for RuntimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.full_name)
    }
}

/// Builder for [`RuntimeType`].
///
/// Unless told otherwise the type derives from [`RuntimeType::root`]
/// (interfaces have no base) and gets a public parameterless constructor
/// (interfaces get none).
#[derive(Debug)]
pub struct RuntimeTypeBuilder {
    name: String,
    namespace: Option<String>,
    declaring_type_name: Option<String>,
    attributes: TypeAttributes,
    base: Option<Option<RuntimeType>>,
    interfaces: Vec<RuntimeType>,
    constructors: Option<Vec<ConstructorSignature>>,
    fields: Vec<String>,
    methods: Vec<String>,
    custom_attributes: Vec<CustomAttribute>,
    static_values: FxHashMap<String, Value>,
    origin: TypeOrigin,
}

impl RuntimeTypeBuilder {
    fn new(name: impl Into<String>) -> Self {
        RuntimeTypeBuilder {
            name: name.into(),
            namespace: None,
            declaring_type_name: None,
            attributes: TypeAttributes::PUBLIC,
            base: None,
            interfaces: Vec::new(),
            constructors: None,
            fields: Vec::new(),
            methods: Vec::new(),
            custom_attributes: Vec::new(),
            static_values: FxHashMap::default(),
            origin: TypeOrigin::Host,
        }
    }

    #[must_use]
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Mark the type as nested inside the type named `declaring_full_name`.
    #[must_use]
    pub fn declared_in(mut self, declaring_full_name: impl Into<String>) -> Self {
        self.declaring_type_name = Some(declaring_full_name.into());
        self.attributes |= TypeAttributes::NESTED;
        self
    }

    #[must_use]
    pub fn attributes(mut self, attributes: TypeAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    #[must_use]
    pub fn base(mut self, base: RuntimeType) -> Self {
        self.base = Some(Some(base));
        self
    }

    #[must_use]
    pub fn without_base(mut self) -> Self {
        self.base = Some(None);
        self
    }

    #[must_use]
    pub fn interface(mut self, interface: RuntimeType) -> Self {
        self.interfaces.push(interface);
        self
    }

    #[must_use]
    pub fn constructor(mut self, constructor: ConstructorSignature) -> Self {
        self.constructors
            .get_or_insert_with(Vec::new)
            .push(constructor);
        self
    }

    /// Declare the type without any constructor.
    #[must_use]
    pub fn without_constructors(mut self) -> Self {
        self.constructors = Some(Vec::new());
        self
    }

    #[must_use]
    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.fields.push(name.into());
        self
    }

    #[must_use]
    pub fn method(mut self, name: impl Into<String>) -> Self {
        self.methods.push(name.into());
        self
    }

    #[must_use]
    pub fn custom_attribute(mut self, attribute: CustomAttribute) -> Self {
        self.custom_attributes.push(attribute);
        self
    }

    #[must_use]
    pub fn static_value(mut self, field: impl Into<String>, value: Value) -> Self {
        self.static_values.insert(field.into(), value);
        self
    }

    #[must_use]
    pub fn origin(mut self, origin: TypeOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub fn build(self) -> RuntimeType {
        let is_interface = self.attributes.contains(TypeAttributes::INTERFACE);
        let base = match self.base {
            Some(base) => base,
            None if is_interface => None,
            None => Some(RuntimeType::root()),
        };
        let constructors = match self.constructors {
            Some(constructors) => constructors,
            None if is_interface => Vec::new(),
            None => vec![ConstructorSignature::public(Vec::new())],
        };
        let full_name = match (&self.declaring_type_name, &self.namespace) {
            (Some(declaring), _) => format!("{declaring}+{}", self.name),
            (None, Some(ns)) => format!("{ns}.{}", self.name),
            (None, None) => self.name.clone(),
        };

        RuntimeType(Arc::new(TypeDef {
            key: TypeKey::fresh(),
            name: self.name,
            namespace: self.namespace,
            full_name,
            attributes: self.attributes,
            base,
            interfaces: self.interfaces,
            constructors,
            fields: self.fields,
            methods: self.methods,
            custom_attributes: self.custom_attributes,
            static_values: self.static_values,
            origin: self.origin,
            nested: RwLock::new(Vec::new()),
        }))
    }
}
