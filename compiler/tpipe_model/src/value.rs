//! Structural values.
//!
//! `Value` is what identity parts, expression constants and static field
//! contents are made of. Equality and hashing are structural, except for
//! [`OpaqueValue`] which compares by reference.

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::runtime_type::RuntimeType;

/// A hashable, cheaply clonable value.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Str(Arc<str>),
    Type(RuntimeType),
    List(Arc<[Value]>),
    /// Host data the model does not look into (e.g. an embedded identity).
    Opaque(OpaqueValue),
}

/// The coarse kind of a [`Value`], used for parameter lists and delegate shapes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueKind {
    Bool,
    Int,
    Str,
    Type,
    List,
    /// Accepts any value.
    Object,
}

impl ValueKind {
    /// Whether a parameter of this kind accepts `value`.
    #[inline]
    pub fn accepts(self, value: &Value) -> bool {
        self == ValueKind::Object || value.kind() == self
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::Str => "str",
            ValueKind::Type => "type",
            ValueKind::List => "list",
            ValueKind::Object => "object",
        };
        f.write_str(name)
    }
}

impl Value {
    /// Wrap arbitrary host data.
    pub fn opaque<T: Any + Send + Sync + fmt::Debug>(data: T) -> Self {
        Value::Opaque(OpaqueValue::new(data))
    }

    /// Build a list value.
    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Value::List(items.into_iter().collect())
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Str(_) => ValueKind::Str,
            Value::Type(_) => ValueKind::Type,
            Value::List(_) => ValueKind::List,
            Value::Opaque(_) => ValueKind::Object,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_type(&self) -> Option<&RuntimeType> {
        match self {
            Value::Type(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Downcast opaque host data.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Value::Opaque(opaque) => opaque.downcast_ref(),
            _ => None,
        }
    }

    /// Whether the value contains only primitives (no types, no opaque data).
    pub fn is_flat(&self) -> bool {
        match self {
            Value::Bool(_) | Value::Int(_) | Value::Str(_) => true,
            Value::List(items) => items.iter().all(Value::is_flat),
            Value::Type(_) | Value::Opaque(_) => false,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(Arc::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(Arc::from(value))
    }
}

impl From<RuntimeType> for Value {
    fn from(value: RuntimeType) -> Self {
        Value::Type(value)
    }
}

impl From<&RuntimeType> for Value {
    fn from(value: &RuntimeType) -> Self {
        Value::Type(value.clone())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(n) => write!(f, "Int({n})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::Type(t) => write!(f, "Type({})", t.full_name()),
            Value::List(items) => f.debug_list().entries(items.iter()).finish(),
            Value::Opaque(opaque) => write!(f, "{opaque:?}"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Type(t) => write!(f, "{}", t.full_name()),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Opaque(opaque) => write!(f, "{opaque:?}"),
        }
    }
}

trait OpaqueData: Any + Send + Sync + fmt::Debug {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any + Send + Sync + fmt::Debug> OpaqueData for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Reference-compared host data carried inside a [`Value`].
#[derive(Clone)]
pub struct OpaqueValue(Arc<dyn OpaqueData>);

impl OpaqueValue {
    pub fn new<T: Any + Send + Sync + fmt::Debug>(data: T) -> Self {
        OpaqueValue(Arc::new(data))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        (*self.0).as_any().downcast_ref()
    }
}

impl PartialEq for OpaqueValue {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.0), Arc::as_ptr(&other.0))
    }
}

impl Eq for OpaqueValue {}

impl Hash for OpaqueValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(Arc::as_ptr(&self.0).cast::<()>(), state);
    }
}

impl fmt::Debug for OpaqueValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Opaque({:?})", &*self.0)
    }
}
