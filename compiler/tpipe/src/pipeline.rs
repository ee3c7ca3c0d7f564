//! The pipeline facade and its builder.

use std::fmt;
use std::sync::Arc;

use tpipe_model::{
    CodeBackend, ConstructorCall, ConstructorDelegateFactory, DefaultConstructorDelegateFactory,
    DefaultMutableTypeFactory, DelegateShape, Instance, ModuleEmitter, MutableTypeFactory,
    RuntimeType, Value,
};
use tracing::debug;

use crate::assembler::TypeAssembler;
use crate::cache::{ConstructorCallCache, ConstructorForAssembledTypeCache, TypeCache};
use crate::code_manager::CodeManager;
use crate::error::{AssemblyError, ConfigError};
use crate::participant::Participant;
use crate::pool::{
    AssemblyContext, AssemblyContextPool, BlockingAssemblyContextPool,
    ThreadLocalAssemblyContextPoolDecorator,
};
use crate::reflection::ReflectionService;
use crate::serialization::{
    ComplexSerializationEnabler, NoopSerializationEnabler, SurrogateSerializationEnabler,
};
use crate::settings::PipelineSettings;
use crate::type_id::AdditionalTypeId;

/// Creates the code backend of the assembly context at the given index.
pub type BackendFactory = dyn Fn(&PipelineSettings, usize) -> Box<dyn CodeBackend> + Send + Sync;

/// Entry point for assembled types of one participant configuration.
pub struct Pipeline {
    settings: PipelineSettings,
    assembler: Arc<TypeAssembler>,
    type_cache: Arc<TypeCache>,
    constructor_calls: Arc<ConstructorCallCache>,
    code_manager: CodeManager,
    reflection_service: ReflectionService,
}

impl Pipeline {
    pub fn builder(participant_configuration_id: impl Into<String>) -> PipelineBuilder {
        PipelineBuilder::new(participant_configuration_id)
    }

    pub fn participant_configuration_id(&self) -> &str {
        self.assembler.participant_configuration_id()
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn participants(&self) -> &[Arc<dyn Participant>] {
        self.assembler.participants()
    }

    /// The assembled type for `requested_type`, assembling it on first use.
    pub fn get_assembled_type(
        &self,
        requested_type: &RuntimeType,
    ) -> Result<RuntimeType, AssemblyError> {
        self.type_cache.get_or_create_type(requested_type)
    }

    pub fn get_additional_type(
        &self,
        additional_type_id: &AdditionalTypeId,
    ) -> Result<RuntimeType, AssemblyError> {
        self.type_cache
            .get_or_create_additional_type(additional_type_id)
    }

    /// Instantiate the assembled type of `requested_type` with the
    /// constructor matching `arguments`.
    pub fn create_object(
        &self,
        requested_type: &RuntimeType,
        arguments: &[Value],
        allow_non_public: bool,
    ) -> Result<Instance, AssemblyError> {
        let shape = DelegateShape::for_arguments(arguments);
        let call = self.get_or_create_constructor_call(requested_type, &shape, allow_non_public)?;
        Ok(call.invoke(arguments)?)
    }

    pub fn get_or_create_constructor_call(
        &self,
        requested_type: &RuntimeType,
        shape: &DelegateShape,
        allow_non_public: bool,
    ) -> Result<ConstructorCall, AssemblyError> {
        let type_id = self.assembler.compute_type_id(requested_type);
        self.constructor_calls
            .get_or_create_constructor_call(&type_id, shape, allow_non_public)
    }

    pub fn reflection_service(&self) -> &ReflectionService {
        &self.reflection_service
    }

    pub fn code_manager(&self) -> &CodeManager {
        &self.code_manager
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("assembler", &self.assembler)
            .field("settings", &self.settings)
            .field("types", &self.type_cache)
            .finish_non_exhaustive()
    }
}

pub struct PipelineBuilder {
    participant_configuration_id: String,
    settings: PipelineSettings,
    participants: Vec<Arc<dyn Participant>>,
    backend_factory: Option<Box<BackendFactory>>,
    type_factory: Arc<dyn MutableTypeFactory>,
    constructor_factory: Arc<dyn ConstructorDelegateFactory>,
}

impl PipelineBuilder {
    pub fn new(participant_configuration_id: impl Into<String>) -> Self {
        PipelineBuilder {
            participant_configuration_id: participant_configuration_id.into(),
            settings: PipelineSettings::default(),
            participants: Vec::new(),
            backend_factory: None,
            type_factory: Arc::new(DefaultMutableTypeFactory::new()),
            constructor_factory: Arc::new(DefaultConstructorDelegateFactory),
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn with_participant(mut self, participant: impl Participant + 'static) -> Self {
        self.participants.push(Arc::new(participant));
        self
    }

    #[must_use]
    pub fn with_participants(
        mut self,
        participants: impl IntoIterator<Item = Arc<dyn Participant>>,
    ) -> Self {
        self.participants.extend(participants);
        self
    }

    /// Replace the default backend, a [`ModuleEmitter`] per context.
    #[must_use]
    pub fn with_backend_factory(
        mut self,
        factory: impl Fn(&PipelineSettings, usize) -> Box<dyn CodeBackend> + Send + Sync + 'static,
    ) -> Self {
        self.backend_factory = Some(Box::new(factory));
        self
    }

    #[must_use]
    pub fn with_type_factory(mut self, factory: Arc<dyn MutableTypeFactory>) -> Self {
        self.type_factory = factory;
        self
    }

    #[must_use]
    pub fn with_constructor_delegate_factory(
        mut self,
        factory: Arc<dyn ConstructorDelegateFactory>,
    ) -> Self {
        self.constructor_factory = factory;
        self
    }

    pub fn build(self) -> Result<Pipeline, ConfigError> {
        if self.participant_configuration_id.is_empty() {
            return Err(ConfigError::EmptyConfigurationId);
        }
        self.settings.validate()?;

        let degree = self.settings.effective_degree_of_parallelism();
        let contexts = (0..degree)
            .map(|index| {
                let backend = match &self.backend_factory {
                    Some(factory) => factory(&self.settings, index),
                    None => default_backend(&self.settings, index),
                };
                Arc::new(AssemblyContext::new(backend))
            })
            .collect();
        let blocking = BlockingAssemblyContextPool::new(contexts)?;
        let pool: Arc<dyn AssemblyContextPool> =
            Arc::new(ThreadLocalAssemblyContextPoolDecorator::new(blocking));

        let serialization_enabler: Arc<dyn ComplexSerializationEnabler> =
            if self.settings.enable_complex_serialization {
                Arc::new(SurrogateSerializationEnabler)
            } else {
                Arc::new(NoopSerializationEnabler)
            };
        let assembler = Arc::new(TypeAssembler::new(
            self.participant_configuration_id.clone(),
            self.participants.into(),
            self.type_factory,
            serialization_enabler,
        ));

        let type_cache = Arc::new(TypeCache::new(Arc::clone(&assembler), Arc::clone(&pool)));
        let assembled_constructors = Arc::new(ConstructorForAssembledTypeCache::new(
            Arc::clone(&assembler),
            self.constructor_factory,
        ));
        let constructor_calls = Arc::new(ConstructorCallCache::new(
            Arc::clone(&type_cache),
            assembled_constructors,
        ));

        debug!(
            configuration = %self.participant_configuration_id,
            contexts = degree,
            participants = assembler.participants().len(),
            "pipeline built"
        );
        Ok(Pipeline {
            code_manager: CodeManager::new(
                self.participant_configuration_id,
                pool,
                Arc::clone(&type_cache),
            ),
            reflection_service: ReflectionService::new(
                Arc::clone(&type_cache),
                Arc::clone(&constructor_calls),
            ),
            settings: self.settings,
            assembler,
            type_cache,
            constructor_calls,
        })
    }
}

fn default_backend(settings: &PipelineSettings, index: usize) -> Box<dyn CodeBackend> {
    let emitter = ModuleEmitter::new(settings.module_name_pattern(index));
    match &settings.assembly_directory {
        Some(directory) => Box::new(emitter.with_output_directory(directory)),
        None => Box::new(emitter),
    }
}

impl fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("configuration", &self.participant_configuration_id)
            .field("settings", &self.settings)
            .field("participants", &self.participants.len())
            .finish_non_exhaustive()
    }
}
