use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("movie provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("movie provider error: {0}")]
    ProviderError(String),

    #[error("movie provider returned an unreadable response: {0}")]
    ProviderBadResponse(String),

    #[error("movie not found")]
    NotFound,

    #[error("store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Store(err.to_string())
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::Store(format!("blocking task failed: {}", err))
    }
}

impl Error {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }
}

pub type AppResult<T> = Result<T, Error>;
