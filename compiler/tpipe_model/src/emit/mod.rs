//! Code emission SPI.
//!
//! A code backend turns mutable types into runtime types in three steps
//! (declare, define facets, create) and later flushes everything it
//! produced as one module. [`ModuleEmitter`] is the in-memory reference
//! backend.

mod module_emitter;

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::mutable::{MutableTypeArena, MutableTypeId};
use crate::runtime_type::{CustomAttribute, RuntimeType};

pub use module_emitter::{ManifestAttribute, ManifestType, ModuleEmitter, ModuleManifest};

/// Classifies emission failures.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum EmitErrorKind {
    /// The request is invalid in the backend's current state.
    InvalidOperation,
    /// The backend cannot express the request.
    NotSupported,
    Io,
}

impl fmt::Display for EmitErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmitErrorKind::InvalidOperation => f.write_str("invalid operation"),
            EmitErrorKind::NotSupported => f.write_str("not supported"),
            EmitErrorKind::Io => f.write_str("I/O error"),
        }
    }
}

#[derive(Debug, Error)]
#[error("{message}")]
pub struct EmitError {
    kind: EmitErrorKind,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl EmitError {
    pub fn new(kind: EmitErrorKind, message: impl Into<String>) -> Self {
        EmitError {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::new(EmitErrorKind::InvalidOperation, message)
    }

    pub fn not_supported(message: impl Into<String>) -> Self {
        Self::new(EmitErrorKind::NotSupported, message)
    }

    pub fn io(context: impl fmt::Display, error: std::io::Error) -> Self {
        EmitError {
            kind: EmitErrorKind::Io,
            message: format!("{context}: {error}"),
            source: Some(Box::new(error)),
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> EmitErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Turns mutable types into runtime types.
///
/// Callers declare every type of a batch before defining any, and define
/// every type before creating any; a declaring type is created before the
/// types nested in it.
pub trait CodeEmitter {
    fn declare_type(&mut self, arena: &MutableTypeArena, id: MutableTypeId)
        -> Result<(), EmitError>;

    fn define_type_facets(
        &mut self,
        arena: &MutableTypeArena,
        id: MutableTypeId,
    ) -> Result<(), EmitError>;

    fn create_type(
        &mut self,
        arena: &MutableTypeArena,
        id: MutableTypeId,
    ) -> Result<RuntimeType, EmitError>;
}

/// The result of flushing a backend.
#[derive(Clone, Debug)]
pub struct FlushedModule {
    pub name: String,
    pub attributes: Vec<CustomAttribute>,
    /// Every type created since the previous flush, in creation order.
    pub types: Vec<RuntimeType>,
    pub manifest_path: Option<PathBuf>,
}

impl FlushedModule {
    pub fn attribute(&self, name: &str) -> Option<&CustomAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

pub trait GeneratedCodeFlusher {
    /// Seal everything created so far into a module. `Ok(None)` when nothing
    /// was created since the last flush.
    fn flush_code(
        &mut self,
        attributes: &[CustomAttribute],
    ) -> Result<Option<FlushedModule>, EmitError>;
}

/// A complete backend, owned by one assembly context.
pub trait CodeBackend: CodeEmitter + GeneratedCodeFlusher + Send {}

impl<T: CodeEmitter + GeneratedCodeFlusher + Send + ?Sized> CodeBackend for T {}
