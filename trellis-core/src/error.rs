//! Error types.

use thiserror::Error;

/// Errors surfaced by the component runtime.
#[derive(Debug, Error)]
pub enum ViewError {
    /// A hook or injection function ran outside a component setup.
    #[error("`{hook}` cannot be called outside the component")]
    OutsideComponent { hook: &'static str },

    /// No provider was found for a token and no fallback was given.
    #[error("No provide for `{token}`")]
    NoProvider { token: String },

    #[error("application has already started")]
    AlreadyMounted,

    #[error("application has not been mounted")]
    NotMounted,

    /// A render was requested while a reconciliation pass was running.
    #[error("a render pass is already in progress")]
    RenderInProgress,

    #[error("invalid render options: {0}")]
    Config(#[from] serde_json::Error),

    /// A component setup function reported a failure.
    #[error("component `{component}` failed during setup: {message}")]
    Setup { component: String, message: String },
}

impl ViewError {
    /// Convenience constructor for setup failures.
    pub fn setup(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Setup {
            component: component.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ViewError>;
