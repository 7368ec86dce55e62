use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("job not found: {0}")]
    NotFound(String),

    #[error("job id already exists: {0}")]
    DuplicateId(String),

    #[error("no price data available")]
    NoPriceData,

    #[error("price source unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("invalid input: {0}")]
    Validation(String),
}

impl Error {
    /// Recoverable on the next scheduled attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::UpstreamUnavailable(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::UpstreamUnavailable(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
