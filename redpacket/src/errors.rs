use thiserror::Error;

#[derive(Error, Debug)]
pub enum AutomationError {
    #[error("Element is no longer valid: {0}")]
    StaleElement(String),

    #[error("Platform-specific error: {0}")]
    PlatformError(String),

    #[error("Action failed: {0}")]
    ActionFailed(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<serde_json::Error> for AutomationError {
    fn from(e: serde_json::Error) -> Self {
        AutomationError::ConfigError(e.to_string())
    }
}
