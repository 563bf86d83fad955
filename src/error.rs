use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Represents a result type for operations in the OFREP provider.
pub type Result<T> = std::result::Result<T, Error>;

/// Enum representing possible errors that can occur in the OFREP provider.
///
/// The first group of variants mirrors the OpenFeature error taxonomy and is what flag reads
/// report. The remaining variants describe transport and protocol failures of a bulk refresh.
#[derive(thiserror::Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// The requested flag is not part of the last bulk evaluation.
    #[error("flag not found: {0}")]
    FlagNotFound(String),

    /// The cached flag value cannot be converted into the requested type.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// The server failed to parse the flag configuration.
    #[error("parse error: {0}")]
    ParseError(String),

    /// The evaluation context has no targeting key.
    #[error("targeting key is missing from the evaluation context")]
    TargetingKeyMissing,

    /// The evaluation context is absent or was rejected by the server.
    #[error("invalid evaluation context: {0}")]
    InvalidContext(String),

    /// No flags have been fetched yet, or the server is not ready to evaluate.
    #[error("provider is not ready")]
    ProviderNotReady,

    /// The server answered 401 Unauthorized. The API key is likely invalid.
    #[error("unauthorized, api_key is likely invalid")]
    Unauthorized,

    /// The server answered 403 Forbidden.
    #[error("forbidden, api_key does not grant access to the evaluation endpoint")]
    Forbidden,

    /// The server answered 429 Too Many Requests.
    #[error("too many requests (retry-after: {retry_after:?})")]
    TooManyRequests {
        /// Raw value of the `Retry-After` header, if any.
        retry_after: Option<String>,
    },

    /// The response body is not a valid evaluation response.
    #[error("unable to decode evaluation response")]
    Unmarshal(#[source] Arc<serde_json::Error>),

    /// The server answered with a status code the protocol does not define.
    #[error("unexpected response from server (status {status})")]
    UnexpectedResponse {
        /// HTTP status code.
        status: u16,
        /// Raw response body, kept for diagnostics.
        body: String,
    },

    /// Catch-all error, carrying server-provided details.
    #[error("general error: {0}")]
    General(String),

    /// Invalid endpoint configuration.
    #[error("invalid endpoint configuration")]
    InvalidBaseUrl(#[source] url::ParseError),

    /// Network error.
    #[error(transparent)]
    Network(Arc<reqwest::Error>),

    /// An I/O error.
    #[error(transparent)]
    // std::io::Error is not clonable, so we're wrapping it in an Arc.
    Io(Arc<std::io::Error>),

    /// Indicates that the poller thread panicked. This should normally never happen.
    #[error("poller thread panicked")]
    PollerThreadPanicked,

    /// The provider has been shut down and cannot be initialized again.
    #[error("provider has been shut down")]
    ProviderShutdown,
}

impl Error {
    /// Map the error to the OpenFeature error code reported alongside a flag evaluation.
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::FlagNotFound(_) => ErrorCode::FlagNotFound,
            Error::TypeMismatch(_) => ErrorCode::TypeMismatch,
            Error::ParseError(_) => ErrorCode::ParseError,
            Error::TargetingKeyMissing => ErrorCode::TargetingKeyMissing,
            Error::InvalidContext(_) => ErrorCode::InvalidContext,
            Error::ProviderNotReady => ErrorCode::ProviderNotReady,
            _ => ErrorCode::General,
        }
    }

    /// Return `true` if retrying with the same credentials cannot succeed.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Unauthorized | Error::Forbidden)
    }

    /// Return `true` if the error is expected backpressure rather than a failure.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Error::TooManyRequests { .. })
    }

    /// Build the error corresponding to an `errorCode` reported by the server, either for a
    /// whole bulk evaluation or for a single flag.
    pub(crate) fn from_code(code: ErrorCode, flag_key: &str, details: Option<&str>) -> Error {
        match code {
            ErrorCode::FlagNotFound => Error::FlagNotFound(flag_key.to_owned()),
            ErrorCode::InvalidContext => {
                Error::InvalidContext(details.unwrap_or("invalid context").to_owned())
            }
            ErrorCode::ParseError => Error::ParseError(details.unwrap_or("parse error").to_owned()),
            ErrorCode::ProviderNotReady => Error::ProviderNotReady,
            ErrorCode::TargetingKeyMissing => Error::TargetingKeyMissing,
            ErrorCode::TypeMismatch => {
                Error::TypeMismatch(details.unwrap_or("type mismatch").to_owned())
            }
            ErrorCode::General => Error::General(details.unwrap_or("general error").to_owned()),
        }
    }
}

// Some variants hold `Arc`s of non-comparable errors, so errors compare by code and message.
impl PartialEq for Error {
    fn eq(&self, other: &Error) -> bool {
        self.code() == other.code() && self.to_string() == other.to_string()
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(Arc::new(value))
    }
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        Error::Network(Arc::new(value.without_url()))
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::Unmarshal(Arc::new(value))
    }
}

/// OpenFeature error codes, as they appear on the wire.
///
/// Unknown codes sent by the server decode as [`ErrorCode::General`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The provider has not been initialized yet.
    ProviderNotReady,
    /// The flag could not be found.
    FlagNotFound,
    /// An error was encountered parsing data, such as a flag configuration.
    ParseError,
    /// The type of the flag value does not match the expected type.
    TypeMismatch,
    /// The provider requires a targeting key and one was not provided.
    TargetingKeyMissing,
    /// The evaluation context does not meet provider requirements.
    InvalidContext,
    /// Any other error.
    #[serde(other)]
    General,
}
