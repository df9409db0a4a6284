use std::error::Error as StdError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Input is not 12 or 13 ASCII digits.
    #[error("invalid EAN code {code:?}: expected 12 or 13 digits")]
    InvalidFormat { code: String },

    /// A 13-digit code whose last digit is not the computed check digit.
    #[error("invalid EAN code {code}: check digit should be {expected}")]
    ChecksumMismatch { code: String, expected: u8 },

    #[error("{context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl Error {
    #[must_use]
    pub fn invalid_format(code: impl Into<String>) -> Self {
        Self::InvalidFormat { code: code.into() }
    }

    #[must_use]
    pub fn external<E>(context: impl Into<String>, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
