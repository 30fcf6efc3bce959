use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("No entries found in feed: {source_url}")]
    EmptyFeed { source_url: String },

    #[error("Failed to fetch feed {source_url}: {reason}")]
    FetchFailure { source_url: String, reason: String },

    #[error("{variable} environment variable not set")]
    MissingCredential { variable: &'static str },

    #[error("Completion service error: {0}")]
    UpstreamService(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl AppError {
    pub fn fetch(source_url: &str, reason: impl ToString) -> Self {
        AppError::FetchFailure {
            source_url: source_url.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
