//! Constructor delegates.
//!
//! A [`ConstructorCall`] is a constructor of a runtime type resolved against
//! a [`DelegateShape`] (the parameter kinds a caller will pass). Resolution
//! is the expensive part and is what callers cache.

use std::fmt;

use thiserror::Error;

use crate::runtime_type::{ConstructorSignature, RuntimeType, Visibility};
use crate::value::{Value, ValueKind};

/// The parameter list a caller wants to invoke a constructor with.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct DelegateShape {
    parameters: Vec<ValueKind>,
}

impl DelegateShape {
    pub fn new(parameters: impl Into<Vec<ValueKind>>) -> Self {
        DelegateShape {
            parameters: parameters.into(),
        }
    }

    /// The shape matching the kinds of `arguments`.
    pub fn for_arguments(arguments: &[Value]) -> Self {
        DelegateShape {
            parameters: arguments.iter().map(Value::kind).collect(),
        }
    }

    pub fn parameters(&self) -> &[ValueKind] {
        &self.parameters
    }
}

impl fmt::Display for DelegateShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, param) in self.parameters.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{param}")?;
        }
        f.write_str(")")
    }
}

/// An object produced by invoking a [`ConstructorCall`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instance {
    ty: RuntimeType,
    arguments: Vec<Value>,
}

impl Instance {
    pub fn runtime_type(&self) -> &RuntimeType {
        &self.ty
    }

    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConstructorLookupError {
    #[error("type '{ty}' is abstract and cannot be instantiated")]
    Abstract { ty: String },
    #[error("type '{ty}' does not contain a constructor with the signature {shape}")]
    MissingConstructor { ty: String, shape: String },
    #[error(
        "the constructor {shape} of type '{ty}' is not public; allow non-public constructors to use it"
    )]
    NotPublic { ty: String, shape: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum InvocationError {
    #[error("expected {expected} arguments, got {actual}")]
    ArgumentCount { expected: usize, actual: usize },
    #[error("argument {index} must be of kind '{expected}', got '{actual}'")]
    ArgumentKind {
        index: usize,
        expected: ValueKind,
        actual: ValueKind,
    },
}

/// A resolved constructor of a concrete runtime type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConstructorCall {
    ty: RuntimeType,
    signature: ConstructorSignature,
}

impl ConstructorCall {
    pub fn runtime_type(&self) -> &RuntimeType {
        &self.ty
    }

    pub fn signature(&self) -> &ConstructorSignature {
        &self.signature
    }

    pub fn invoke(&self, arguments: &[Value]) -> Result<Instance, InvocationError> {
        let parameters = &self.signature.parameters;
        if parameters.len() != arguments.len() {
            return Err(InvocationError::ArgumentCount {
                expected: parameters.len(),
                actual: arguments.len(),
            });
        }
        for (index, (param, arg)) in parameters.iter().zip(arguments).enumerate() {
            if !param.accepts(arg) {
                return Err(InvocationError::ArgumentKind {
                    index,
                    expected: *param,
                    actual: arg.kind(),
                });
            }
        }
        Ok(Instance {
            ty: self.ty.clone(),
            arguments: arguments.to_vec(),
        })
    }
}

/// Resolves constructors of assembled types.
pub trait ConstructorDelegateFactory: Send + Sync {
    /// Resolve the constructor of `assembled` matching `shape`. `requested`
    /// is the type the caller asked for and is what errors name.
    fn create_constructor_call(
        &self,
        requested: &RuntimeType,
        assembled: &RuntimeType,
        shape: &DelegateShape,
        allow_non_public: bool,
    ) -> Result<ConstructorCall, ConstructorLookupError>;
}

/// Picks an exact parameter match first, then any compatible constructor.
#[derive(Copy, Clone, Debug, Default)]
pub struct DefaultConstructorDelegateFactory;

impl ConstructorDelegateFactory for DefaultConstructorDelegateFactory {
    fn create_constructor_call(
        &self,
        requested: &RuntimeType,
        assembled: &RuntimeType,
        shape: &DelegateShape,
        allow_non_public: bool,
    ) -> Result<ConstructorCall, ConstructorLookupError> {
        if assembled.is_abstract() {
            return Err(ConstructorLookupError::Abstract {
                ty: requested.full_name().to_owned(),
            });
        }

        let constructors = assembled.constructors();
        let parameters = shape.parameters();
        let found = constructors
            .iter()
            .find(|c| c.parameters == parameters)
            .or_else(|| constructors.iter().find(|c| c.accepts(parameters)));
        let Some(signature) = found else {
            return Err(ConstructorLookupError::MissingConstructor {
                ty: requested.full_name().to_owned(),
                shape: shape.to_string(),
            });
        };
        if signature.visibility != Visibility::Public && !allow_non_public {
            return Err(ConstructorLookupError::NotPublic {
                ty: requested.full_name().to_owned(),
                shape: shape.to_string(),
            });
        }

        Ok(ConstructorCall {
            ty: assembled.clone(),
            signature: signature.clone(),
        })
    }
}
