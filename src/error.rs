use thiserror::Error;

/// Errors raised by the page driver and the browser controller
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    #[error("Failed to connect to browser: {0}")]
    ConnectionFailed(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Invalid tab index {index} ({count} tabs open)")]
    InvalidTab { index: usize, count: usize },

    #[error("No element with index {index} in the current selector map")]
    ElementNotFound { index: usize },

    #[error("Element {index} is stale: {reason}")]
    StaleElement { index: usize, reason: String },

    #[error("Element {index} (<{tag}>) does not accept text input")]
    NotEditable { index: usize, tag: String },

    #[error("Failed to parse DOM: {0}")]
    DomParseFailed(String),

    #[error("Tab operation failed: {0}")]
    TabOperationFailed(String),

    #[error("JavaScript evaluation failed: {0}")]
    EvaluationFailed(String),

    #[error("{action} failed: {reason}")]
    ActionFailed { action: String, reason: String },
}

/// Errors raised by the decision agent
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Could not parse action batch: {0}")]
    ActionParse(String),

    #[error("Unknown action '{0}'")]
    UnknownAction(String),

    #[error("Invalid parameters for '{action}': {reason}")]
    InvalidParams { action: String, reason: String },

    #[error("Action budget of {limit} exhausted")]
    BudgetExceeded { limit: usize },

    #[error("Language model request failed: {0}")]
    Model(String),

    #[error(transparent)]
    Browser(#[from] BrowserError),
}

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, BrowserError>;
