use std::fmt;
use std::sync::Arc;

use tpipe_model::{ConstructorCall, ConstructorDelegateFactory, DelegateShape, RuntimeType};
use tracing::debug;

use super::{KeyedCache, TypeCache};
use crate::assembler::TypeAssembler;
use crate::error::AssemblyError;
use crate::type_id::{AssembledTypeId, ConstructionKey};

type AssembledConstructorKey = (RuntimeType, DelegateShape, bool);

/// Constructor calls of already assembled types.
pub struct ConstructorForAssembledTypeCache {
    assembler: Arc<TypeAssembler>,
    delegate_factory: Arc<dyn ConstructorDelegateFactory>,
    calls: KeyedCache<AssembledConstructorKey, ConstructorCall>,
}

impl ConstructorForAssembledTypeCache {
    pub fn new(
        assembler: Arc<TypeAssembler>,
        delegate_factory: Arc<dyn ConstructorDelegateFactory>,
    ) -> Self {
        ConstructorForAssembledTypeCache {
            assembler,
            delegate_factory,
            calls: KeyedCache::new(),
        }
    }

    /// The constructor of `assembled` matching `shape`. Errors name the
    /// requested type rather than the generated one.
    pub fn get_or_create(
        &self,
        assembled: &RuntimeType,
        shape: &DelegateShape,
        allow_non_public: bool,
    ) -> Result<ConstructorCall, AssemblyError> {
        let key = (assembled.clone(), shape.clone(), allow_non_public);
        self.calls.get_or_try_insert_with(&key, || -> Result<_, AssemblyError> {
            let requested = if self.assembler.is_assembled_type(assembled) {
                self.assembler.get_requested_type(assembled)?
            } else {
                assembled.clone()
            };
            Ok(self.delegate_factory.create_constructor_call(
                &requested,
                assembled,
                shape,
                allow_non_public,
            )?)
        })
    }
}

impl fmt::Debug for ConstructorForAssembledTypeCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructorForAssembledTypeCache")
            .field("calls", &self.calls)
            .finish_non_exhaustive()
    }
}

/// Constructor calls by [`ConstructionKey`]; assembles the type on a miss.
pub struct ConstructorCallCache {
    type_cache: Arc<TypeCache>,
    assembled_constructors: Arc<ConstructorForAssembledTypeCache>,
    calls: KeyedCache<ConstructionKey, ConstructorCall>,
}

impl ConstructorCallCache {
    pub fn new(
        type_cache: Arc<TypeCache>,
        assembled_constructors: Arc<ConstructorForAssembledTypeCache>,
    ) -> Self {
        ConstructorCallCache {
            type_cache,
            assembled_constructors,
            calls: KeyedCache::new(),
        }
    }

    pub fn get_or_create_constructor_call(
        &self,
        type_id: &AssembledTypeId,
        shape: &DelegateShape,
        allow_non_public: bool,
    ) -> Result<ConstructorCall, AssemblyError> {
        let key = ConstructionKey::new(type_id.clone(), shape.clone(), allow_non_public);
        if let Some(call) = self.calls.get(&key) {
            debug!(requested = %type_id, %shape, "constructor cache hit");
            return Ok(call);
        }
        // Resolved outside the key's gate: resolving may wait for a context.
        let assembled = self.type_cache.get_or_create_type_by_id(type_id)?;
        self.calls.get_or_try_insert_with(&key, || {
            self.assembled_constructors
                .get_or_create(&assembled, shape, allow_non_public)
        })
    }
}

impl fmt::Debug for ConstructorCallCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructorCallCache")
            .field("calls", &self.calls)
            .finish_non_exhaustive()
    }
}
