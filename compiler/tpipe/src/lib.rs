//! Identity-keyed assembly of runtime-derived types.
//!
//! A [`Pipeline`] turns a requested [`RuntimeType`](tpipe_model::RuntimeType)
//! into an assembled type: a generated proxy that a fixed list of
//! [`Participant`]s has modified. Assembled types are keyed by an
//! [`AssembledTypeId`] (the requested type plus one identity part per
//! identifier-providing participant) and generated at most once per key.
//!
//! Generation runs on pooled assembly contexts, each owning one code backend
//! behind a reentrant [`CodeGenerationSynchronizationPoint`]. All mutable
//! types of one run are generated together as a batch, in dependency order.

mod assembler;
mod batch;
mod cache;
mod code_manager;
mod context;
mod error;
mod identifier;
mod participant;
mod pipeline;
mod pool;
mod reflection;
mod registry;
mod serialization;
mod settings;
mod sort;
mod sync;
mod type_id;

#[cfg(test)]
mod testing;

pub use assembler::{TypeAssembler, TypeAssemblyResult};
pub use batch::{BatchCodeGenerator, GeneratedTypes, MutableTypeBatchCodeGenerator};
pub use cache::{ConstructorCallCache, ConstructorForAssembledTypeCache, KeyedCache, TypeCache};
pub use code_manager::{CodeManager, PIPELINE_CONFIGURATION_ATTRIBUTE};
pub use context::{
    AdditionalTypeAssemblyContext, GeneratedTypesContext, ProxyTypeAssemblyContext,
    TypeAssemblyContext,
};
pub use error::{
    AssemblyError, BatchGenerationError, CodeGenerationErrorKind, ConfigError,
    DependencyCycleError, PoolError,
};
pub use identifier::{
    AssembledTypeIdData, AssembledTypeIdentifierProvider, ASSEMBLED_TYPE_ATTRIBUTE,
    TYPE_ID_FIELD_NAME,
};
pub use participant::{
    AdditionalTypeRef, Participant, ParticipantError, ParticipantState, TypeIdentifierProvider,
};
pub use pipeline::{BackendFactory, Pipeline, PipelineBuilder};
pub use pool::{
    AssemblyContext, AssemblyContextPool, BlockingAssemblyContextPool, ContextId, PooledContext,
    ThreadLocalAssemblyContextPoolDecorator,
};
pub use reflection::ReflectionService;
pub use registry::PipelineRegistry;
pub use serialization::{
    ComplexSerializationEnabler, NoopSerializationEnabler, SurrogateSerializationEnabler,
    CONFIGURATION_ID_FIELD_NAME, SERIALIZABLE_ASSEMBLED_TYPE_ATTRIBUTE, TYPE_ID_DATA_FIELD_NAME,
};
pub use settings::PipelineSettings;
pub use sort::DependentTypeSorter;
pub use sync::{CodeGenerationSynchronizationPoint, GenerationScope};
pub use type_id::{AdditionalTypeId, AssembledTypeId, ConstructionKey, IdentityParts};

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for debug output.
///
/// Safe to call multiple times. Enable with `RUST_LOG=tpipe=debug` or
/// `RUST_LOG=tpipe=trace`.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            // Another subscriber may already be installed by the host.
            let _ = tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(EnvFilter::from_default_env())
                .try_init();
        }
    });
}
