//! Mutable types under construction.
//!
//! Every assembly run owns a [`MutableTypeArena`]; types in it are addressed
//! by [`MutableTypeId`] (arena + index) and may refer to each other, or to
//! finished runtime types, through [`TypeRef`]. Ids are unique across arenas,
//! so an id from one run never resolves in another.

use std::ops::{Index, IndexMut};
use std::sync::atomic::{AtomicU32, Ordering};

use crate::expr::{Expr, StaticType};
use crate::runtime_type::{
    ConstructorSignature, CustomAttribute, RuntimeType, TypeAttributes, Visibility,
};
use crate::value::ValueKind;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArenaId(u32);

impl ArenaId {
    fn fresh() -> Self {
        static NEXT: AtomicU32 = AtomicU32::new(1);
        ArenaId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MutableTypeId {
    arena: ArenaId,
    index: u32,
}

impl MutableTypeId {
    #[inline]
    pub fn arena(self) -> ArenaId {
        self.arena
    }

    #[inline]
    pub fn index(self) -> usize {
        self.index as usize
    }
}

/// Reference to a type that is either finished or still being built.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeRef {
    Runtime(RuntimeType),
    Mutable(MutableTypeId),
}

impl TypeRef {
    pub fn as_mutable(&self) -> Option<MutableTypeId> {
        match self {
            TypeRef::Mutable(id) => Some(*id),
            TypeRef::Runtime(_) => None,
        }
    }
}

impl From<RuntimeType> for TypeRef {
    fn from(ty: RuntimeType) -> Self {
        TypeRef::Runtime(ty)
    }
}

impl From<&RuntimeType> for TypeRef {
    fn from(ty: &RuntimeType) -> Self {
        TypeRef::Runtime(ty.clone())
    }
}

impl From<MutableTypeId> for TypeRef {
    fn from(id: MutableTypeId) -> Self {
        TypeRef::Mutable(id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDecl {
    pub name: String,
    pub field_type: StaticType,
    pub is_static: bool,
    pub visibility: Visibility,
}

impl FieldDecl {
    pub fn instance(name: impl Into<String>, field_type: StaticType) -> Self {
        FieldDecl {
            name: name.into(),
            field_type,
            is_static: false,
            visibility: Visibility::Private,
        }
    }

    pub fn private_static(name: impl Into<String>, field_type: StaticType) -> Self {
        FieldDecl {
            name: name.into(),
            field_type,
            is_static: true,
            visibility: Visibility::Private,
        }
    }
}

#[derive(Clone, Debug)]
pub struct MethodDecl {
    pub name: String,
    pub parameters: Vec<ValueKind>,
    pub visibility: Visibility,
    pub body: Expr,
}

impl MethodDecl {
    pub fn public(name: impl Into<String>, parameters: Vec<ValueKind>, body: Expr) -> Self {
        MethodDecl {
            name: name.into(),
            parameters,
            visibility: Visibility::Public,
            body,
        }
    }
}

/// A type being built by one assembly run.
#[derive(Clone, Debug)]
pub struct MutableType {
    id: MutableTypeId,
    name: String,
    namespace: Option<String>,
    full_name: String,
    attributes: TypeAttributes,
    base: Option<TypeRef>,
    interfaces: Vec<TypeRef>,
    constructors: Vec<ConstructorSignature>,
    fields: Vec<FieldDecl>,
    methods: Vec<MethodDecl>,
    type_initializations: Vec<Expr>,
    custom_attributes: Vec<CustomAttribute>,
    declaring_type: Option<MutableTypeId>,
    nested_types: Vec<MutableTypeId>,
    modified: bool,
}

impl MutableType {
    pub fn id(&self) -> MutableTypeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn attributes(&self) -> TypeAttributes {
        self.attributes
    }

    pub fn is_interface(&self) -> bool {
        self.attributes.contains(TypeAttributes::INTERFACE)
    }

    pub fn base_type(&self) -> Option<&TypeRef> {
        self.base.as_ref()
    }

    pub fn interfaces(&self) -> &[TypeRef] {
        &self.interfaces
    }

    pub fn constructors(&self) -> &[ConstructorSignature] {
        &self.constructors
    }

    pub fn fields(&self) -> &[FieldDecl] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDecl> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn methods(&self) -> &[MethodDecl] {
        &self.methods
    }

    pub fn type_initializations(&self) -> &[Expr] {
        &self.type_initializations
    }

    pub fn custom_attributes(&self) -> &[CustomAttribute] {
        &self.custom_attributes
    }

    pub fn has_custom_attribute(&self, name: &str) -> bool {
        self.custom_attributes.iter().any(|a| a.name == name)
    }

    pub fn declaring_type(&self) -> Option<MutableTypeId> {
        self.declaring_type
    }

    pub fn nested_types(&self) -> &[MutableTypeId] {
        &self.nested_types
    }

    /// Whether anything was added since creation.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Base type followed by interfaces.
    pub fn dependencies(&self) -> impl Iterator<Item = &TypeRef> {
        self.base.iter().chain(self.interfaces.iter())
    }

    pub fn add_interface(&mut self, interface: impl Into<TypeRef>) {
        self.interfaces.push(interface.into());
        self.modified = true;
    }

    pub fn add_field(&mut self, field: FieldDecl) {
        self.fields.push(field);
        self.modified = true;
    }

    pub fn add_method(&mut self, method: MethodDecl) {
        self.methods.push(method);
        self.modified = true;
    }

    pub fn add_constructor(&mut self, constructor: ConstructorSignature) {
        self.constructors.push(constructor);
        self.modified = true;
    }

    pub fn add_type_initialization(&mut self, initialization: Expr) {
        self.type_initializations.push(initialization);
        self.modified = true;
    }

    pub fn add_custom_attribute(&mut self, attribute: CustomAttribute) {
        self.custom_attributes.push(attribute);
        self.modified = true;
    }

    /// Add a constructor that mirrors one of the base type's; does not count
    /// as a modification.
    pub fn copy_constructor(&mut self, constructor: ConstructorSignature) {
        self.constructors.push(constructor);
    }
}

/// Owner of all mutable types of one assembly run.
#[derive(Debug)]
pub struct MutableTypeArena {
    id: ArenaId,
    types: Vec<MutableType>,
}

impl Default for MutableTypeArena {
    fn default() -> Self {
        Self::new()
    }
}

impl MutableTypeArena {
    pub fn new() -> Self {
        MutableTypeArena {
            id: ArenaId::fresh(),
            types: Vec::new(),
        }
    }

    pub fn id(&self) -> ArenaId {
        self.id
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn contains(&self, id: MutableTypeId) -> bool {
        id.arena == self.id && id.index() < self.types.len()
    }

    pub fn get(&self, id: MutableTypeId) -> Option<&MutableType> {
        if id.arena == self.id {
            self.types.get(id.index())
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, id: MutableTypeId) -> Option<&mut MutableType> {
        if id.arena == self.id {
            self.types.get_mut(id.index())
        } else {
            None
        }
    }

    pub fn ids(&self) -> impl Iterator<Item = MutableTypeId> + '_ {
        (0..self.types.len()).map(|i| self.id_at(i))
    }

    /// Create a top-level type. `base` is `None` only for interfaces.
    pub fn create_type(
        &mut self,
        name: &str,
        namespace: Option<&str>,
        attributes: TypeAttributes,
        base: Option<TypeRef>,
    ) -> MutableTypeId {
        let full_name = match namespace {
            Some(ns) => format!("{ns}.{name}"),
            None => name.to_owned(),
        };
        self.push(name, namespace, full_name, attributes, base, None)
    }

    /// Create a type nested inside `declaring`. The declaring type counts as
    /// modified afterwards.
    pub fn create_nested_type(
        &mut self,
        declaring: MutableTypeId,
        name: &str,
        attributes: TypeAttributes,
        base: Option<TypeRef>,
    ) -> MutableTypeId {
        let outer = &self[declaring];
        let full_name = format!("{}+{name}", outer.full_name);
        let namespace = outer.namespace.clone();
        let id = self.push(
            name,
            namespace.as_deref(),
            full_name,
            attributes | TypeAttributes::NESTED,
            base,
            Some(declaring),
        );
        let outer = &mut self[declaring];
        outer.nested_types.push(id);
        outer.modified = true;
        id
    }

    /// The outermost type that (transitively) declares `id`, or `id` itself.
    pub fn outermost_declaring_type(&self, id: MutableTypeId) -> MutableTypeId {
        let mut current = id;
        while let Some(outer) = self.get(current).and_then(MutableType::declaring_type) {
            current = outer;
        }
        current
    }

    fn id_at(&self, index: usize) -> MutableTypeId {
        MutableTypeId {
            arena: self.id,
            index: u32::try_from(index).unwrap_or(u32::MAX),
        }
    }

    fn push(
        &mut self,
        name: &str,
        namespace: Option<&str>,
        full_name: String,
        attributes: TypeAttributes,
        base: Option<TypeRef>,
        declaring_type: Option<MutableTypeId>,
    ) -> MutableTypeId {
        let id = self.id_at(self.types.len());
        self.types.push(MutableType {
            id,
            name: name.to_owned(),
            namespace: namespace.map(str::to_owned),
            full_name,
            attributes,
            base,
            interfaces: Vec::new(),
            constructors: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            type_initializations: Vec::new(),
            custom_attributes: Vec::new(),
            declaring_type,
            nested_types: Vec::new(),
            modified: false,
        });
        id
    }
}

impl Index<MutableTypeId> for MutableTypeArena {
    type Output = MutableType;

    fn index(&self, id: MutableTypeId) -> &MutableType {
        match self.get(id) {
            Some(ty) => ty,
            None => panic!("{id:?} does not belong to arena {:?}", self.id),
        }
    }
}

impl IndexMut<MutableTypeId> for MutableTypeArena {
    fn index_mut(&mut self, id: MutableTypeId) -> &mut MutableType {
        let arena = self.id;
        match self.get_mut(id) {
            Some(ty) => ty,
            None => panic!("{id:?} does not belong to arena {arena:?}"),
        }
    }
}
