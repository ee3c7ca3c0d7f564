//! Participant SPI.
//!
//! Participants are the pluggable stages of a pipeline. They are identified
//! only by their position in the pipeline's participant list, which is fixed
//! when the pipeline is built.

use std::any::Any;
use std::fmt;

use rustc_hash::FxHashMap;
use thiserror::Error;
use tpipe_model::{Expr, MutableTypeId, RuntimeType, Value};

use crate::context::{AdditionalTypeAssemblyContext, ProxyTypeAssemblyContext};
use crate::type_id::AdditionalTypeId;

/// A pluggable stage of type assembly.
pub trait Participant: Send + Sync {
    /// Name used in diagnostics.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// The capability to contribute one part of the assembled type id.
    fn partial_type_identifier_provider(&self) -> Option<&dyn TypeIdentifierProvider> {
        None
    }

    /// Modify the proxy of a requested type. `id_part` is this participant's
    /// part of the type id, if it has one.
    fn participate(
        &self,
        id_part: Option<&Value>,
        context: &mut ProxyTypeAssemblyContext<'_>,
    ) -> Result<(), ParticipantError>;

    /// Answer a request for an additional type. `Ok(None)` leaves the request
    /// to the next participant.
    fn get_or_create_additional_type(
        &self,
        _additional_type_id: &AdditionalTypeId,
        _context: &mut AdditionalTypeAssemblyContext<'_>,
    ) -> Result<Option<AdditionalTypeRef>, ParticipantError> {
        Ok(None)
    }

    /// Map a generated additional type back to its identifier.
    fn get_additional_type_id(&self, _additional_type: &RuntimeType) -> Option<AdditionalTypeId> {
        None
    }

    /// Called instead of [`Participant::participate`] when the requested type
    /// cannot be derived from.
    fn handle_non_subclassable_type(
        &self,
        _requested_type: &RuntimeType,
    ) -> Result<(), ParticipantError> {
        Ok(())
    }
}

/// Contributes one part of an [`AssembledTypeId`](crate::AssembledTypeId).
pub trait TypeIdentifierProvider: Send + Sync {
    /// The part for `requested_type`; `None` means "no specific identity".
    fn get_id(&self, requested_type: &RuntimeType) -> Option<Value>;

    /// An expression rebuilding `id` inside generated code.
    fn get_expression(&self, id: &Value) -> Option<Expr>;

    /// An expression of static type `FlatValue` carrying a serializable form
    /// of `id`.
    fn get_flat_value_expression_for_serialization(&self, id: &Value) -> Option<Expr>;
}

/// A participant's answer to an additional type request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AdditionalTypeRef {
    /// A type that already exists; nothing is generated.
    Existing(RuntimeType),
    /// A type created through the assembly context.
    Mutable(MutableTypeId),
}

/// Failure raised by a participant.
#[derive(Debug, Error)]
#[error("participant '{participant}' failed: {message}")]
pub struct ParticipantError {
    participant: String,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ParticipantError {
    pub fn new(participant: impl Into<String>, message: impl Into<String>) -> Self {
        ParticipantError {
            participant: participant.into(),
            message: message.into(),
            source: None,
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn participant(&self) -> &str {
        &self.participant
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// State shared by all participants running on one assembly context.
///
/// Lives as long as the context's generated code: it is cleared whenever the
/// context's code is flushed.
#[derive(Default)]
pub struct ParticipantState {
    entries: FxHashMap<String, Box<dyn Any + Send>>,
}

impl ParticipantState {
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.entries.get(key).and_then(|v| v.downcast_ref())
    }

    pub fn get_mut<T: Any>(&mut self, key: &str) -> Option<&mut T> {
        self.entries.get_mut(key).and_then(|v| v.downcast_mut())
    }

    pub fn insert<T: Any + Send>(&mut self, key: impl Into<String>, value: T) {
        self.entries.insert(key.into(), Box::new(value));
    }

    /// The value under `key`, inserting `init()` first if there is none.
    /// `None` if the key holds a value of another type.
    pub fn get_or_insert_with<T: Any + Send>(
        &mut self,
        key: &str,
        init: impl FnOnce() -> T,
    ) -> Option<&mut T> {
        self.entries
            .entry(key.to_owned())
            .or_insert_with(|| Box::new(init()))
            .downcast_mut()
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl fmt::Debug for ParticipantState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}
