use std::error::Error as StdError;

use derive_more::Display;

use crate::lifecycle::Rejection;

/// Failure kinds surfaced by the data-access core.
///
/// Only [`Error::Connectivity`] is recovered from automatically (by serving
/// the request from the degraded store). Everything else reaches the caller.
#[derive(Clone, Debug, Display, Eq, PartialEq)]
pub enum Error {
    /// Connection refused, DNS failure, socket error or timeout.
    #[display("backend unreachable: {_0}")]
    Connectivity(String),

    /// The remote rejected the bearer token. The stored token is purged.
    #[display("session expired: {_0}")]
    AuthExpired(String),

    /// Any other non-2xx answer, carrying the server-supplied message.
    #[display("request failed ({status}): {message}")]
    Remote { status: u16, message: String },

    /// Rejected locally, before any request was issued.
    #[display("{_0}")]
    Validation(String),

    #[display("{_0} not found")]
    NotFound(String),

    /// The client settings cannot produce a request, e.g. a base URL
    /// without a scheme.
    #[display("invalid configuration: {_0}")]
    Config(String),

    /// A successful answer whose body is not the expected record.
    #[display("unexpected response: {_0}")]
    Malformed(String),
}

impl Error {
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connectivity(_))
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl StdError for Error {}

impl From<Rejection> for Error {
    fn from(rejection: Rejection) -> Self {
        Self::Validation(rejection.to_string())
    }
}
