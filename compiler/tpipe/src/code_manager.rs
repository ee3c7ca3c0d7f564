//! Flushing generated code and loading it back.

use std::fmt;
use std::sync::Arc;

use tpipe_model::{CustomAttribute, FlushedModule, Value};
use tracing::{debug, error};

use crate::cache::TypeCache;
use crate::error::AssemblyError;
use crate::pool::AssemblyContextPool;

/// Module attribute naming the participant configuration that produced the
/// module's types.
pub const PIPELINE_CONFIGURATION_ATTRIBUTE: &str = "PipelineConfiguration";

pub struct CodeManager {
    participant_configuration_id: String,
    pool: Arc<dyn AssemblyContextPool>,
    type_cache: Arc<TypeCache>,
}

impl CodeManager {
    pub fn new(
        participant_configuration_id: impl Into<String>,
        pool: Arc<dyn AssemblyContextPool>,
        type_cache: Arc<TypeCache>,
    ) -> Self {
        CodeManager {
            participant_configuration_id: participant_configuration_id.into(),
            pool,
            type_cache,
        }
    }

    /// Flush the code of every assembly context into modules.
    ///
    /// Takes all contexts, so it waits for running assemblies to finish and
    /// must not be called from inside one. Every context is returned to the
    /// pool whether or not flushing succeeds; contexts without new code
    /// produce no module.
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(configuration = %self.participant_configuration_id)
    )]
    pub fn flush_code_to_disk(
        &self,
        attributes: &[CustomAttribute],
    ) -> Result<Vec<FlushedModule>, AssemblyError> {
        let mut attributes = attributes.to_vec();
        attributes.push(
            CustomAttribute::new(PIPELINE_CONFIGURATION_ATTRIBUTE)
                .with_argument(self.participant_configuration_id.as_str()),
        );

        let contexts = self.pool.dequeue_all()?;
        let mut modules = Vec::new();
        let mut failure = None;
        for context in &contexts {
            match context.sync_point().flush_code(&attributes) {
                Ok(Some(module)) => {
                    debug!(
                        context = %context.id(),
                        module = %module.name,
                        types = module.types.len(),
                        "flushed"
                    );
                    modules.push(module);
                }
                Ok(None) => {}
                Err(source) => {
                    failure = Some(AssemblyError::Flush {
                        context: context.id(),
                        source,
                    });
                    break;
                }
            }
        }

        for context in contexts {
            let id = context.id();
            if let Err(err) = self.pool.enqueue(context) {
                error!(
                    context = %id,
                    error = %err,
                    "failed to return assembly context after flushing"
                );
                if failure.is_none() {
                    failure = Some(AssemblyError::Pool(err));
                }
            }
        }

        match failure {
            Some(err) => Err(err),
            None => Ok(modules),
        }
    }

    /// Make the types of a flushed module available to the type cache.
    pub fn load_flushed_code(&self, module: &FlushedModule) -> Result<(), AssemblyError> {
        let actual = module
            .attribute(PIPELINE_CONFIGURATION_ATTRIBUTE)
            .and_then(|attribute| attribute.arguments.first())
            .and_then(Value::as_str)
            .ok_or_else(|| AssemblyError::MissingConfiguration(module.name.clone()))?;
        if actual != self.participant_configuration_id {
            return Err(AssemblyError::ConfigurationMismatch {
                expected: self.participant_configuration_id.clone(),
                actual: actual.to_owned(),
            });
        }
        self.type_cache.load_types(&module.types)
    }
}

impl fmt::Debug for CodeManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodeManager")
            .field("configuration", &self.participant_configuration_id)
            .finish_non_exhaustive()
    }
}
