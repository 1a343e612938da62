//! Error types for the trainctl-core crate.

use thiserror::Error;

/// Errors owned by the launcher itself.
///
/// Anything that goes wrong inside the training run is reported by the
/// training framework through its exit status, never through this type.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Sweep error: {0}")]
    Sweep(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl LaunchError {
    pub fn sweep(msg: impl Into<String>) -> Self {
        Self::Sweep(msg.into())
    }

    /// Exit status the CLI reports when the launcher fails before a child
    /// exit status exists.
    pub fn exit_code(&self) -> i32 {
        match self {
            // Mirrors the shell's "command not found".
            Self::Spawn { .. } => 127,
            _ => 2,
        }
    }
}

impl From<figment::Error> for LaunchError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}
