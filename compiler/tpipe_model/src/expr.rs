//! A minimal expression model for type initializers.
//!
//! Only what identity embedding and serialization hooks need: constants,
//! `null`, type literals, object construction, lists, and assignment of a
//! static field of the type being initialized.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::mutable::TypeRef;
use crate::runtime_type::RuntimeType;
use crate::value::Value;

/// The static type an expression evaluates to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum StaticType {
    Void,
    Object,
    Type,
    /// The serialization-safe wrapper produced by [`Expr::flat_value`].
    FlatValue,
    Named(&'static str),
}

impl fmt::Display for StaticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaticType::Void => f.write_str("void"),
            StaticType::Object => f.write_str("object"),
            StaticType::Type => f.write_str("type"),
            StaticType::FlatValue => f.write_str("FlatValue"),
            StaticType::Named(name) => f.write_str(name),
        }
    }
}

type CtorFn = dyn Fn(Vec<Option<Value>>) -> Result<Value, String> + Send + Sync;

/// Builds the value of a [`Expr::New`] expression from its evaluated arguments.
#[derive(Clone)]
pub struct ValueConstructor(Arc<CtorFn>);

impl ValueConstructor {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Vec<Option<Value>>) -> Result<Value, String> + Send + Sync + 'static,
    {
        ValueConstructor(Arc::new(f))
    }

    fn invoke(&self, arguments: Vec<Option<Value>>) -> Result<Value, String> {
        (self.0)(arguments)
    }
}

impl fmt::Debug for ValueConstructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ValueConstructor(..)")
    }
}

/// Object construction.
#[derive(Clone, Debug)]
pub struct NewExpr {
    pub static_type: StaticType,
    pub arguments: Vec<Expr>,
    pub constructor: ValueConstructor,
}

#[derive(Clone, Debug)]
pub enum Expr {
    Constant(Value),
    Null,
    TypeOf(TypeRef),
    New(NewExpr),
    List(Vec<Expr>),
    AssignStatic { field: String, value: Box<Expr> },
}

/// Serialization-safe wrapper around a flat value (or `null`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FlatValue(pub Option<Value>);

/// What evaluation needs from its surroundings.
pub trait EvalEnv {
    fn resolve_type(&self, type_ref: &TypeRef) -> Result<RuntimeType, EvalError>;
    fn assign_static(&mut self, field: &str, value: Option<Value>) -> Result<(), EvalError>;
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("type reference '{0}' cannot be resolved yet")]
    UnresolvedType(String),
    #[error("static field '{0}' is not declared")]
    UnknownStaticField(String),
    #[error("constructing a value of static type '{static_type}' failed: {message}")]
    Construction {
        static_type: StaticType,
        message: String,
    },
}

impl Expr {
    pub fn constant(value: impl Into<Value>) -> Self {
        Expr::Constant(value.into())
    }

    pub fn type_of(type_ref: impl Into<TypeRef>) -> Self {
        Expr::TypeOf(type_ref.into())
    }

    pub fn new_object(
        static_type: StaticType,
        arguments: Vec<Expr>,
        constructor: ValueConstructor,
    ) -> Self {
        Expr::New(NewExpr {
            static_type,
            arguments,
            constructor,
        })
    }

    /// Wrap `inner` into a [`FlatValue`]; evaluation fails unless it yields a
    /// flat value or `null`.
    pub fn flat_value(inner: Expr) -> Self {
        Expr::new_object(
            StaticType::FlatValue,
            vec![inner],
            ValueConstructor::new(|mut args| {
                let value = args.pop().flatten();
                match value {
                    Some(v) if !v.is_flat() => Err(format!("{v:?} is not a flat value")),
                    value => Ok(Value::opaque(FlatValue(value))),
                }
            }),
        )
    }

    pub fn assign_static(field: impl Into<String>, value: Expr) -> Self {
        Expr::AssignStatic {
            field: field.into(),
            value: Box::new(value),
        }
    }

    pub fn static_type(&self) -> StaticType {
        match self {
            Expr::Constant(Value::Type(_)) | Expr::TypeOf(_) => StaticType::Type,
            Expr::Constant(_) | Expr::Null | Expr::List(_) => StaticType::Object,
            Expr::New(new) => new.static_type,
            Expr::AssignStatic { .. } => StaticType::Void,
        }
    }

    /// Evaluate; `Ok(None)` is `null` (or no value, for assignments).
    pub fn evaluate(&self, env: &mut dyn EvalEnv) -> Result<Option<Value>, EvalError> {
        match self {
            Expr::Constant(value) => Ok(Some(value.clone())),
            Expr::Null => Ok(None),
            Expr::TypeOf(type_ref) => env.resolve_type(type_ref).map(|t| Some(Value::Type(t))),
            Expr::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    let value = item.evaluate(env)?.ok_or_else(|| EvalError::Construction {
                        static_type: StaticType::Object,
                        message: "list elements cannot be null".to_owned(),
                    })?;
                    values.push(value);
                }
                Ok(Some(Value::list(values)))
            }
            Expr::New(new) => {
                let mut arguments = Vec::with_capacity(new.arguments.len());
                for argument in &new.arguments {
                    arguments.push(argument.evaluate(env)?);
                }
                new.constructor
                    .invoke(arguments)
                    .map(Some)
                    .map_err(|message| EvalError::Construction {
                        static_type: new.static_type,
                        message,
                    })
            }
            Expr::AssignStatic { field, value } => {
                let value = value.evaluate(env)?;
                env.assign_static(field, value)?;
                Ok(None)
            }
        }
    }
}
