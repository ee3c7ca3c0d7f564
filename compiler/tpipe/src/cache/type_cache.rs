use std::fmt;
use std::sync::Arc;

use tpipe_model::RuntimeType;
use tracing::debug;

use super::KeyedCache;
use crate::assembler::{TypeAssembler, TypeAssemblyResult};
use crate::error::AssemblyError;
use crate::pool::{AssemblyContext, AssemblyContextPool, PooledContext};
use crate::type_id::{AdditionalTypeId, AssembledTypeId};

/// Assembled and additional types by identity.
///
/// Misses are assembled on a context leased from the pool; the context's
/// synchronization point re-checks the cache before generating. The
/// context is leased before the key's gate is taken.
pub struct TypeCache {
    assembler: Arc<TypeAssembler>,
    pool: Arc<dyn AssemblyContextPool>,
    types: KeyedCache<AssembledTypeId, RuntimeType>,
    additional_types: KeyedCache<AdditionalTypeId, RuntimeType>,
}

impl TypeCache {
    pub fn new(assembler: Arc<TypeAssembler>, pool: Arc<dyn AssemblyContextPool>) -> Self {
        TypeCache {
            assembler,
            pool,
            types: KeyedCache::new(),
            additional_types: KeyedCache::new(),
        }
    }

    pub fn assembler(&self) -> &TypeAssembler {
        &self.assembler
    }

    pub fn get_or_create_type(
        &self,
        requested_type: &RuntimeType,
    ) -> Result<RuntimeType, AssemblyError> {
        let type_id = self.assembler.compute_type_id(requested_type);
        self.get_or_create_type_by_id(&type_id)
    }

    pub fn get_or_create_type_by_id(
        &self,
        type_id: &AssembledTypeId,
    ) -> Result<RuntimeType, AssemblyError> {
        if let Some(ty) = self.types.get(type_id) {
            debug!(requested = %type_id, "type cache hit");
            return Ok(ty);
        }
        debug!(requested = %type_id, "type cache miss");
        // Lease before taking the key's gate, so no thread waits for a
        // context while holding a gate.
        let context = PooledContext::dequeue(self.pool.as_ref())?;
        self.types
            .get_or_try_insert_with(type_id, || self.generate_type(&context, type_id))
    }

    pub fn get_or_create_additional_type(
        &self,
        additional_type_id: &AdditionalTypeId,
    ) -> Result<RuntimeType, AssemblyError> {
        if let Some(ty) = self.additional_types.get(additional_type_id) {
            debug!(id = %additional_type_id, "additional type cache hit");
            return Ok(ty);
        }
        debug!(id = %additional_type_id, "additional type cache miss");
        let context = PooledContext::dequeue(self.pool.as_ref())?;
        self.additional_types.get_or_try_insert_with(additional_type_id, || {
            self.generate_additional_type(&context, additional_type_id)
        })
    }

    /// Cached assembled type, without assembling.
    pub fn get_type(&self, type_id: &AssembledTypeId) -> Option<RuntimeType> {
        self.types.get(type_id)
    }

    /// Cached additional type, without assembling.
    pub fn get_additional_type(&self, id: &AdditionalTypeId) -> Option<RuntimeType> {
        self.additional_types.get(id)
    }

    /// Register previously generated types: assembled types under their
    /// embedded type id, additional types under the id their participant
    /// reports. Types already cached keep their cached instance; types
    /// nobody claims are skipped.
    pub fn load_types(&self, types: &[RuntimeType]) -> Result<(), AssemblyError> {
        for ty in types {
            if self.assembler.is_assembled_type(ty) {
                let type_id = self.assembler.extract_type_id(ty)?;
                self.types.insert_if_absent(type_id, ty.clone());
            } else if let Some(id) = self.assembler.get_additional_type_id(ty)? {
                self.additional_types.insert_if_absent(id, ty.clone());
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    fn generate_type(
        &self,
        context: &AssemblyContext,
        type_id: &AssembledTypeId,
    ) -> Result<RuntimeType, AssemblyError> {
        context.sync_point().get_or_generate(
            || self.types.get(type_id),
            |scope| {
                let result = self.assembler.assemble_type(type_id, scope)?;
                Ok(self.register_additional_types(result))
            },
        )
    }

    fn generate_additional_type(
        &self,
        context: &AssemblyContext,
        additional_type_id: &AdditionalTypeId,
    ) -> Result<RuntimeType, AssemblyError> {
        context.sync_point().get_or_generate(
            || self.additional_types.get(additional_type_id),
            |scope| {
                let result = self
                    .assembler
                    .assemble_additional_type(additional_type_id, scope)?;
                Ok(self.register_additional_types(result))
            },
        )
    }

    fn register_additional_types(&self, result: TypeAssemblyResult) -> RuntimeType {
        for (id, ty) in result.additional_types {
            self.additional_types.insert_if_absent(id, ty);
        }
        result.ty
    }
}

impl fmt::Debug for TypeCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeCache")
            .field("types", &self.types)
            .field("additional_types", &self.additional_types)
            .finish_non_exhaustive()
    }
}
