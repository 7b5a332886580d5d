use nfoscan_core::{ConfigError, CoreError, ResolveError, ValidationError};
use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{path}:{line}: {source}")]
    Universe {
        path: String,
        line: usize,
        source: ValidationError,
    },

    #[error("command error: {0}")]
    Command(String),

    #[error("run aborted: {0}")]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) | Self::Config(_) | Self::Universe { .. } | Self::Command(_) => 2,
            Self::Resolve(ResolveError::Validation(_) | ResolveError::InvalidCycle { .. }) => 2,
            Self::Resolve(_) => 3,
            Self::Serialization(_) => 4,
            Self::Io(_) => 10,
        }
    }
}

impl From<CoreError> for CliError {
    fn from(error: CoreError) -> Self {
        match error {
            CoreError::Validation(error) => Self::Validation(error),
            CoreError::Resolve(error) => Self::Resolve(error),
            CoreError::Config(error) => Self::Config(error),
            CoreError::Serialization(error) => Self::Serialization(error),
            CoreError::Io(error) => Self::Io(error),
            CoreError::NestedRuntime => Self::Command(CoreError::NestedRuntime.to_string()),
        }
    }
}
