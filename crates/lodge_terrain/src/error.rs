//! # Terrain Error Types
//!
//! Only configuration, I/O and caller cancellation surface as errors.
//! Unsatisfiable searches inside a stage (no waterway start, no end point)
//! are absorbed by that stage and logged.

use thiserror::Error;

use crate::pipeline::PipelineStage;

/// Errors that can halt a generation run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TerrainError {
    /// A configuration value is out of its valid range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The configuration text could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ConfigParse(String),

    /// A configuration file could not be read.
    #[error("failed to read {path}: {message}")]
    Io {
        /// Path that was being read.
        path: String,
        /// Underlying I/O error message.
        message: String,
    },

    /// The caller stopped the pipeline before a stage ran.
    #[error("generation cancelled before stage {stage:?}")]
    Cancelled {
        /// The stage that did not run.
        stage: PipelineStage,
    },
}

impl From<toml::de::Error> for TerrainError {
    fn from(err: toml::de::Error) -> Self {
        Self::ConfigParse(err.to_string())
    }
}

/// Result type for terrain operations.
pub type TerrainResult<T> = Result<T, TerrainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = TerrainError::InvalidConfig("map_size must be >= 4".to_string());
        assert_eq!(err.to_string(), "invalid configuration: map_size must be >= 4");

        let err = TerrainError::Cancelled {
            stage: PipelineStage::Caves,
        };
        assert_eq!(err.to_string(), "generation cancelled before stage Caves");
    }
}
