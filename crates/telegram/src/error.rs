use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Telegram(#[from] teloxide::RequestError),

    /// A blocking config store call panicked or was cancelled.
    #[error("{operation} did not complete: {source}")]
    Blocking {
        operation: &'static str,
        #[source]
        source: tokio::task::JoinError,
    },
}

impl Error {
    #[must_use]
    pub fn blocking(operation: &'static str, source: tokio::task::JoinError) -> Self {
        Self::Blocking { operation, source }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
