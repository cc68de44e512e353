use thiserror::Error;

/// Failures the viewer can report. None of them is fatal for the host page:
/// callers degrade to a static fallback or ignore the call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ViewerError {
    #[error("graphics context unavailable: {0}")]
    ContextUnavailable(String),

    #[error("failed to build viewer: {0}")]
    BuildFailure(String),

    #[error("invalid color: {0}")]
    InvalidColor(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("render error: {0}")]
    Render(String),
}

impl ViewerError {
    /// Whether the host should swap in the non-3D fallback.
    pub fn wants_fallback(&self) -> bool {
        !matches!(self, ViewerError::Render(_))
    }
}

pub type Result<T> = std::result::Result<T, ViewerError>;
