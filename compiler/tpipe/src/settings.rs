//! Pipeline configuration.

use std::num::NonZeroUsize;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const COUNTER_PLACEHOLDER: &str = "{counter}";

/// Settings of one pipeline.
///
/// Deserializable from JSON; missing keys take their defaults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineSettings {
    /// Number of assembly contexts; `0` picks the available parallelism.
    pub degree_of_parallelism: usize,
    /// Name pattern of flushed modules; must contain `{counter}`.
    pub assembly_name_pattern: String,
    /// Where flushed module manifests are written, if anywhere.
    pub assembly_directory: Option<PathBuf>,
    /// Record deserialization data on serializable proxies.
    pub enable_complex_serialization: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        PipelineSettings {
            degree_of_parallelism: 1,
            assembly_name_pattern: "TypePipe_GeneratedAssembly_{counter}".to_owned(),
            assembly_directory: None,
            enable_complex_serialization: false,
        }
    }
}

impl PipelineSettings {
    #[must_use]
    pub fn with_degree_of_parallelism(mut self, degree: usize) -> Self {
        self.degree_of_parallelism = degree;
        self
    }

    #[must_use]
    pub fn with_assembly_name_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.assembly_name_pattern = pattern.into();
        self
    }

    #[must_use]
    pub fn with_assembly_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.assembly_directory = Some(directory.into());
        self
    }

    #[must_use]
    pub fn with_complex_serialization(mut self, enabled: bool) -> Self {
        self.enable_complex_serialization = enabled;
        self
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let settings: PipelineSettings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.assembly_name_pattern.contains(COUNTER_PLACEHOLDER) {
            let pattern = self.assembly_name_pattern.clone();
            return Err(ConfigError::MissingCounterPlaceholder(pattern));
        }
        Ok(())
    }

    pub fn effective_degree_of_parallelism(&self) -> usize {
        match self.degree_of_parallelism {
            0 => std::thread::available_parallelism().map_or(1, NonZeroUsize::get),
            n => n,
        }
    }

    /// Module name pattern of the context at `index`. Contexts are told
    /// apart by a suffix when there is more than one.
    pub fn module_name_pattern(&self, index: usize) -> String {
        if self.effective_degree_of_parallelism() > 1 {
            format!("{}_{}", self.assembly_name_pattern, index + 1)
        } else {
            self.assembly_name_pattern.clone()
        }
    }
}

#[cfg(test)]
mod tests;
