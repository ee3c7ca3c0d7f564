//! Queries over assembled types.

use std::fmt;
use std::sync::Arc;

use tpipe_model::{DelegateShape, Instance, RuntimeType, Value};

use crate::cache::{ConstructorCallCache, TypeCache};
use crate::error::AssemblyError;
use crate::type_id::{AdditionalTypeId, AssembledTypeId};

pub struct ReflectionService {
    type_cache: Arc<TypeCache>,
    constructor_calls: Arc<ConstructorCallCache>,
}

impl ReflectionService {
    pub fn new(type_cache: Arc<TypeCache>, constructor_calls: Arc<ConstructorCallCache>) -> Self {
        ReflectionService {
            type_cache,
            constructor_calls,
        }
    }

    pub fn is_assembled_type(&self, ty: &RuntimeType) -> bool {
        self.type_cache.assembler().is_assembled_type(ty)
    }

    pub fn get_requested_type(
        &self,
        assembled: &RuntimeType,
    ) -> Result<RuntimeType, AssemblyError> {
        self.type_cache.assembler().get_requested_type(assembled)
    }

    pub fn get_type_id_for_requested_type(&self, requested_type: &RuntimeType) -> AssembledTypeId {
        self.type_cache.assembler().compute_type_id(requested_type)
    }

    pub fn get_type_id_for_assembled_type(
        &self,
        assembled: &RuntimeType,
    ) -> Result<AssembledTypeId, AssemblyError> {
        self.type_cache.assembler().extract_type_id(assembled)
    }

    pub fn get_additional_type_id(
        &self,
        additional_type: &RuntimeType,
    ) -> Result<Option<AdditionalTypeId>, AssemblyError> {
        self.type_cache
            .assembler()
            .get_additional_type_id(additional_type)
    }

    pub fn get_assembled_type(
        &self,
        type_id: &AssembledTypeId,
    ) -> Result<RuntimeType, AssemblyError> {
        self.type_cache.get_or_create_type_by_id(type_id)
    }

    pub fn get_additional_type(
        &self,
        additional_type_id: &AdditionalTypeId,
    ) -> Result<RuntimeType, AssemblyError> {
        self.type_cache
            .get_or_create_additional_type(additional_type_id)
    }

    /// Construct an instance of the assembled type for `type_id` with the
    /// constructor matching `arguments`.
    pub fn instantiate_assembled_type(
        &self,
        type_id: &AssembledTypeId,
        arguments: &[Value],
        allow_non_public: bool,
    ) -> Result<Instance, AssemblyError> {
        let shape = DelegateShape::for_arguments(arguments);
        let call = self
            .constructor_calls
            .get_or_create_constructor_call(type_id, &shape, allow_non_public)?;
        Ok(call.invoke(arguments)?)
    }
}

impl fmt::Debug for ReflectionService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReflectionService").finish_non_exhaustive()
    }
}
