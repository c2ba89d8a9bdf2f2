use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the enrichment clients.
///
/// "Not found" is never an error: lookups return `Ok(None)` so fallback
/// chains can keep going.
#[derive(Debug, Error)]
pub enum Error {
    /// The request queue shut down before the job was dispatched.
    #[error("request cancelled")]
    Cancelled,

    #[error("request job panicked")]
    JobPanicked,

    #[error("{service} request failed: {source}")]
    Http {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("received non-ok status from {service}: {status}")]
    Status {
        service: &'static str,
        status: StatusCode,
    },

    /// The service answered 200 but reported a failure in the body.
    #[error("{service} reported an error: {message}")]
    Upstream {
        service: &'static str,
        message: String,
    },

    /// A refreshed token was rejected as well.
    #[error("{service} returned unauthorized after refreshing the access token")]
    Unauthorized { service: &'static str },

    #[error("failed to decode {service} response: {source}")]
    Decode {
        service: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("cache database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("cache pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("cache error: {0}")]
    Cache(String),
}

impl Error {
    pub(crate) fn http(service: &'static str, source: reqwest::Error) -> Self {
        Error::Http { service, source }
    }

    pub(crate) fn decode(service: &'static str, source: serde_json::Error) -> Self {
        Error::Decode { service, source }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}
