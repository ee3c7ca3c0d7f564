//! Serialized access to an assembly context's code backend.
//!
//! All generation and flushing of one context happens under a reentrant
//! lock, so a thread that is already generating on the context (a
//! participant requesting another type) can generate again, while other
//! threads wait.

use std::cell::RefCell;
use std::fmt;

use parking_lot::ReentrantMutex;
use tpipe_model::{
    CodeBackend, CustomAttribute, EmitError, FlushedModule, MutableTypeArena, MutableTypeId,
};
use tracing::debug;

use crate::batch::{BatchCodeGenerator, GeneratedTypes, MutableTypeBatchCodeGenerator};
use crate::error::BatchGenerationError;
use crate::participant::ParticipantState;

struct GenerationState {
    backend: Box<dyn CodeBackend>,
    participant_state: ParticipantState,
}

/// Guards one context's backend and participant state.
pub struct CodeGenerationSynchronizationPoint {
    state: ReentrantMutex<RefCell<GenerationState>>,
}

impl CodeGenerationSynchronizationPoint {
    pub fn new(backend: Box<dyn CodeBackend>) -> Self {
        CodeGenerationSynchronizationPoint {
            state: ReentrantMutex::new(RefCell::new(GenerationState {
                backend,
                participant_state: ParticipantState::default(),
            })),
        }
    }

    /// Return `lookup()` if it finds something once the lock is held;
    /// otherwise run `generate` under the lock.
    pub fn get_or_generate<T, E>(
        &self,
        lookup: impl FnOnce() -> Option<T>,
        generate: impl FnOnce(&GenerationScope<'_>) -> Result<T, E>,
    ) -> Result<T, E> {
        let guard = self.state.lock();
        if let Some(found) = lookup() {
            debug!("found after acquiring the generation lock");
            return Ok(found);
        }
        generate(&GenerationScope { state: &*guard })
    }

    /// Run `f` under the lock.
    pub fn with_scope<R>(&self, f: impl FnOnce(&GenerationScope<'_>) -> R) -> R {
        let guard = self.state.lock();
        f(&GenerationScope { state: &*guard })
    }

    /// Flush the backend and reset the participant state.
    pub fn flush_code(
        &self,
        attributes: &[CustomAttribute],
    ) -> Result<Option<FlushedModule>, EmitError> {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        let module = state.backend.flush_code(attributes)?;
        state.participant_state.clear();
        Ok(module)
    }
}

impl fmt::Debug for CodeGenerationSynchronizationPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodeGenerationSynchronizationPoint")
            .finish_non_exhaustive()
    }
}

/// Access to a context while its generation lock is held.
///
/// Every method borrows the guarded state only for its own duration, so a
/// participant may start a nested assembly between calls. Closures passed
/// to [`GenerationScope::with_participant_state`] must not start one.
pub struct GenerationScope<'a> {
    state: &'a RefCell<GenerationState>,
}

impl GenerationScope<'_> {
    pub fn with_participant_state<R>(&self, f: impl FnOnce(&mut ParticipantState) -> R) -> R {
        f(&mut self.state.borrow_mut().participant_state)
    }
}

impl MutableTypeBatchCodeGenerator for GenerationScope<'_> {
    #[tracing::instrument(level = "debug", skip_all, fields(types = types.len()))]
    fn generate_types(
        &self,
        arena: &MutableTypeArena,
        types: &[MutableTypeId],
    ) -> Result<GeneratedTypes, BatchGenerationError> {
        let mut state = self.state.borrow_mut();
        BatchCodeGenerator::new(state.backend.as_mut()).generate_types(arena, types)
    }
}
