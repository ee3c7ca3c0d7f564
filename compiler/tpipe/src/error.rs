//! Error types of the pipeline core.

use std::fmt;

use thiserror::Error;
use tpipe_model::{ConstructorLookupError, EmitError, EmitErrorKind, InvocationError, StaticType};

use crate::participant::ParticipantError;
use crate::pool::ContextId;

/// Classification of a wrapped code generation failure.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CodeGenerationErrorKind {
    InvalidOperation,
    NotSupported,
    Generic,
}

impl fmt::Display for CodeGenerationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodeGenerationErrorKind::InvalidOperation => f.write_str("invalid operation"),
            CodeGenerationErrorKind::NotSupported => f.write_str("not supported"),
            CodeGenerationErrorKind::Generic => f.write_str("code generation failure"),
        }
    }
}

/// Errors of type and constructor assembly.
#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("the requested type '{0}' is already an assembled type")]
    AlreadyAssembled(String),

    #[error("type '{0}' is not an assembled type")]
    NotAssembled(String),

    #[error(
        "more than one participant claims type '{ty}' as an additional type: '{first}' and '{second}'"
    )]
    AmbiguousAdditionalTypeId {
        ty: String,
        first: String,
        second: String,
    },

    #[error("no participant provided an additional type for identifier {0}")]
    AdditionalTypeNotSupported(String),

    #[error(
        "participant '{participant}' answered additional type {id} with a mutable type that was not generated"
    )]
    AdditionalTypeNotGenerated { participant: String, id: String },

    #[error("mutable type '{0}' was not part of the generated batch")]
    TypeNotGenerated(String),

    #[error(
        "the code was generated for participant configuration '{actual}', but this pipeline uses '{expected}'"
    )]
    ConfigurationMismatch { expected: String, actual: String },

    #[error("module '{0}' does not record a participant configuration")]
    MissingConfiguration(String),

    #[error(
        "An error occurred during code generation for '{requested}': {source}. The following participants are currently configured and may have caused the error: '{participants}'."
    )]
    CodeGeneration {
        kind: CodeGenerationErrorKind,
        requested: String,
        participants: String,
        source: BatchGenerationError,
    },

    #[error(transparent)]
    Participant(#[from] ParticipantError),

    #[error(
        "participant '{participant}' returned a flat value expression of static type '{actual}' for '{requested}'; expected 'FlatValue'"
    )]
    InvalidFlatValueExpression {
        participant: String,
        requested: String,
        actual: StaticType,
    },

    #[error("the type identifier embedded in '{0}' is missing or malformed")]
    MalformedTypeId(String),

    #[error(transparent)]
    ConstructorLookup(#[from] ConstructorLookupError),

    #[error(transparent)]
    Invocation(#[from] InvocationError),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error("flushing assembly context {context} failed")]
    Flush {
        context: ContextId,
        #[source]
        source: EmitError,
    },
}

impl AssemblyError {
    /// The kind of a wrapped code generation failure, if this is one.
    pub fn code_generation_kind(&self) -> Option<CodeGenerationErrorKind> {
        match self {
            AssemblyError::CodeGeneration { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Violations of the assembly context pool protocol.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("an assembly context pool needs at least one context")]
    Empty,

    #[error("assembly context {0} does not belong to this pool")]
    NotRegistered(ContextId),

    #[error("assembly context {0} has already been returned to the pool")]
    AlreadyEnqueued(ContextId),

    #[error(
        "the current thread still holds the assembly contexts of a previous dequeue_all call; return all of them before dequeuing again"
    )]
    DequeueAllOutstanding,

    #[error(
        "the current thread still holds an assembly context from a previous dequeue call; return it before calling dequeue_all"
    )]
    DequeueOutstanding,
}

/// A cycle among the mutable types of one batch.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("circular dependency detected: {}", .types.join(" -> "))]
pub struct DependencyCycleError {
    /// Full names along the cycle; the first name is repeated at the end.
    pub types: Vec<String>,
}

#[derive(Debug, Error)]
pub enum BatchGenerationError {
    #[error(transparent)]
    Cycle(#[from] DependencyCycleError),

    #[error(transparent)]
    Emit(#[from] EmitError),
}

impl BatchGenerationError {
    pub fn kind(&self) -> CodeGenerationErrorKind {
        match self {
            BatchGenerationError::Cycle(_) => CodeGenerationErrorKind::InvalidOperation,
            BatchGenerationError::Emit(e) => match e.kind() {
                EmitErrorKind::InvalidOperation => CodeGenerationErrorKind::InvalidOperation,
                EmitErrorKind::NotSupported => CodeGenerationErrorKind::NotSupported,
                EmitErrorKind::Io => CodeGenerationErrorKind::Generic,
            },
        }
    }
}

/// Invalid settings or registry usage.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("assembly name pattern '{0}' must contain the '{{counter}}' placeholder")]
    MissingCounterPlaceholder(String),

    #[error("participant configuration id must not be empty")]
    EmptyConfigurationId,

    #[error("invalid pipeline settings")]
    Parse(#[from] serde_json::Error),

    #[error("a pipeline with participant configuration '{0}' is already registered")]
    DuplicatePipeline(String),

    #[error("no pipeline with participant configuration '{0}' is registered")]
    UnknownPipeline(String),

    #[error("no default pipeline has been set")]
    NoDefaultPipeline,

    #[error(transparent)]
    Pool(#[from] PoolError),
}
