use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Email error: {0}")]
    Email(String),

    #[error("Notification error: {sink}: {message}")]
    Notification { sink: String, message: String },

    #[error("Scraping error: {0}")]
    Scraping(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

// Implement conversion from validation errors
impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(format!("{}", err))
    }
}

impl From<lettre::error::Error> for AppError {
    fn from(err: lettre::error::Error) -> Self {
        AppError::Email(err.to_string())
    }
}

impl From<lettre::address::AddressError> for AppError {
    fn from(err: lettre::address::AddressError) -> Self {
        AppError::Email(format!("invalid address: {}", err))
    }
}

impl From<lettre::transport::smtp::Error> for AppError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        AppError::Email(err.to_string())
    }
}

/// Why a single tracked item could not be refreshed during a run.
///
/// These never escape a run: the orchestrator logs them and folds them into
/// the run's failure counter.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ItemError {
    #[error("No adapter available for {url}")]
    NoAdapterAvailable { url: String },

    #[error("Fetch failed for {url}: {reason}")]
    FetchFailure { url: String, reason: String },

    #[error("Failed to persist item {item_id}: {reason}")]
    PersistenceFailure { item_id: i64, reason: String },

    #[error("Task for item {item_id} aborted: {reason}")]
    TaskAborted { item_id: i64, reason: String },
}

impl ItemError {
    /// Short label used for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ItemError::NoAdapterAvailable { .. } => "no_adapter",
            ItemError::FetchFailure { .. } => "fetch",
            ItemError::PersistenceFailure { .. } => "persistence",
            ItemError::TaskAborted { .. } => "aborted",
        }
    }
}

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;
