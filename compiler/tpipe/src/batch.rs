//! Batch code generation.
//!
//! A batch is generated in three passes over its dependency order: declare
//! every type (nested types right after their declaring type), define every
//! type's facets, then create every type (declaring types before the types
//! nested in them).

use tpipe_model::{CodeEmitter, EmitError, MutableTypeArena, MutableTypeId, RuntimeType};
use tracing::trace;

use crate::error::BatchGenerationError;
use crate::sort::DependentTypeSorter;

/// Generates a set of mutable types as one batch.
pub trait MutableTypeBatchCodeGenerator {
    fn generate_types(
        &self,
        arena: &MutableTypeArena,
        types: &[MutableTypeId],
    ) -> Result<GeneratedTypes, BatchGenerationError>;
}

/// Top-level mutable types of a batch and what they were generated into,
/// in generation order. Nested types are generated but not listed.
#[derive(Clone, Debug, Default)]
pub struct GeneratedTypes {
    entries: Vec<(MutableTypeId, RuntimeType)>,
}

impl GeneratedTypes {
    pub fn get(&self, id: MutableTypeId) -> Option<&RuntimeType> {
        self.entries
            .iter()
            .find_map(|(mutable, generated)| (*mutable == id).then_some(generated))
    }

    pub fn contains(&self, id: MutableTypeId) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (MutableTypeId, &RuntimeType)> {
        self.entries.iter().map(|(id, ty)| (*id, ty))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Drives a [`CodeEmitter`] through the three generation passes.
pub struct BatchCodeGenerator<'e, E: CodeEmitter + ?Sized> {
    emitter: &'e mut E,
}

impl<'e, E: CodeEmitter + ?Sized> BatchCodeGenerator<'e, E> {
    pub fn new(emitter: &'e mut E) -> Self {
        BatchCodeGenerator { emitter }
    }

    pub fn generate_types(
        &mut self,
        arena: &MutableTypeArena,
        types: &[MutableTypeId],
    ) -> Result<GeneratedTypes, BatchGenerationError> {
        if let Some(foreign) = types.iter().find(|id| !arena.contains(**id)) {
            return Err(EmitError::invalid_operation(format!(
                "{foreign:?} is not part of the batch's arena"
            ))
            .into());
        }
        let order = DependentTypeSorter::sort(arena, types)?;

        for &id in &order {
            self.declare(arena, id)?;
        }
        for &id in &order {
            self.define(arena, id)?;
        }
        let mut entries = Vec::with_capacity(order.len());
        for &id in &order {
            let generated = self.create(arena, id)?;
            entries.push((id, generated));
        }
        Ok(GeneratedTypes { entries })
    }

    fn declare(
        &mut self,
        arena: &MutableTypeArena,
        id: MutableTypeId,
    ) -> Result<(), BatchGenerationError> {
        trace!(ty = arena[id].full_name(), "declare");
        self.emitter.declare_type(arena, id)?;
        for &nested in arena[id].nested_types() {
            self.declare(arena, nested)?;
        }
        Ok(())
    }

    fn define(
        &mut self,
        arena: &MutableTypeArena,
        id: MutableTypeId,
    ) -> Result<(), BatchGenerationError> {
        self.emitter.define_type_facets(arena, id)?;
        for &nested in arena[id].nested_types() {
            self.define(arena, nested)?;
        }
        Ok(())
    }

    fn create(
        &mut self,
        arena: &MutableTypeArena,
        id: MutableTypeId,
    ) -> Result<RuntimeType, BatchGenerationError> {
        let generated = self.emitter.create_type(arena, id)?;
        for &nested in arena[id].nested_types() {
            self.create(arena, nested)?;
        }
        Ok(generated)
    }
}

#[cfg(test)]
mod tests;
