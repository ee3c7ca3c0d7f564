//! Named pipelines.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::error::ConfigError;
use crate::pipeline::Pipeline;

#[derive(Default)]
struct RegistryState {
    pipelines: FxHashMap<String, Arc<Pipeline>>,
    default: Option<String>,
}

/// Pipelines by participant configuration id, with an optional default.
#[derive(Default)]
pub struct PipelineRegistry {
    state: RwLock<RegistryState>,
}

impl PipelineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, pipeline: Arc<Pipeline>) -> Result<(), ConfigError> {
        let id = pipeline.participant_configuration_id().to_owned();
        let mut state = self.state.write();
        if state.pipelines.contains_key(&id) {
            return Err(ConfigError::DuplicatePipeline(id));
        }
        state.pipelines.insert(id, pipeline);
        Ok(())
    }

    /// Remove a pipeline; it stops being the default if it was one.
    pub fn unregister(&self, id: &str) -> Result<Arc<Pipeline>, ConfigError> {
        let mut state = self.state.write();
        let removed = state
            .pipelines
            .remove(id)
            .ok_or_else(|| ConfigError::UnknownPipeline(id.to_owned()))?;
        if state.default.as_deref() == Some(id) {
            state.default = None;
        }
        Ok(removed)
    }

    pub fn get(&self, id: &str) -> Result<Arc<Pipeline>, ConfigError> {
        self.state
            .read()
            .pipelines
            .get(id)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownPipeline(id.to_owned()))
    }

    pub fn set_default(&self, id: &str) -> Result<(), ConfigError> {
        let mut state = self.state.write();
        if !state.pipelines.contains_key(id) {
            return Err(ConfigError::UnknownPipeline(id.to_owned()));
        }
        state.default = Some(id.to_owned());
        Ok(())
    }

    pub fn default_pipeline(&self) -> Result<Arc<Pipeline>, ConfigError> {
        let state = self.state.read();
        state
            .default
            .as_ref()
            .and_then(|id| state.pipelines.get(id))
            .cloned()
            .ok_or(ConfigError::NoDefaultPipeline)
    }

    /// Registered configuration ids, sorted.
    pub fn configuration_ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.state.read().pipelines.keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl fmt::Debug for PipelineRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("PipelineRegistry")
            .field("pipelines", &state.pipelines.len())
            .field("default", &state.default)
            .finish()
    }
}
