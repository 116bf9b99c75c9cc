//! Error handling for the depth-of-field pipeline.
//!
//! Construction errors abort creation; no partially built pipeline is ever
//! returned. Runtime errors come from surface acquisition and readback.

/// Everything that can go wrong while building or driving the pipeline.
#[derive(thiserror::Error, Debug)]
pub enum DofError {
    #[error("No compatible GPU context: {0}")]
    NoCompatibleContext(String),

    #[error("Shader '{stage}' failed to compile: {message}")]
    ShaderCompile { stage: String, message: String },

    #[error("Render target '{label}' is incomplete: {reason}")]
    IncompleteTarget { label: String, reason: String },

    #[error("Surface error: {0}")]
    Surface(String),

    #[error("Readback error: {0}")]
    Readback(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl DofError {
    pub fn context<T: ToString>(msg: T) -> Self {
        DofError::NoCompatibleContext(msg.to_string())
    }

    pub fn readback<T: ToString>(msg: T) -> Self {
        DofError::Readback(msg.to_string())
    }

    pub fn incomplete<L: ToString, R: ToString>(label: L, reason: R) -> Self {
        DofError::IncompleteTarget {
            label: label.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type DofResult<T> = Result<T, DofError>;
