use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced by the client.
///
/// Validation problems are detected before any network traffic. The only
/// failure recovered internally is `Unauthorized`, which triggers a single
/// re-login and retry of the failed relay call.
#[derive(Error, Debug)]
pub enum Error {
    /// A required argument or configuration field was missing or empty.
    #[error("{0}")]
    Validation(String),

    /// A point lookup matched zero rows.
    #[error("key {key} not found")]
    NotFound { key: String },

    /// A write was attempted on a handle configured without a private key.
    #[error("operation requires a signing key; none was configured")]
    SigningKeyRequired,

    /// The relay rejected the session credential (HTTP 401/403).
    #[error("relay rejected credentials (HTTP {status})")]
    Unauthorized { status: u16 },

    /// Transport-level or non-auth HTTP failure. Never retried here.
    #[error(transparent)]
    Network(#[from] reqwest::Error),

    /// The chain rejected a fully signed transaction.
    #[error("transaction rejected: {detail}")]
    Broadcast { detail: String },

    /// A collaborator returned a body this client could not decode.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// A collaborator response decoded but was missing or corrupting a
    /// required field.
    #[error("malformed response: {0}")]
    Protocol(String),
}

/// Fail with a validation error unless `predicate` holds.
pub(crate) fn ensure(predicate: bool, message: &str) -> Result<()> {
    if predicate {
        Ok(())
    } else {
        Err(Error::Validation(message.to_string()))
    }
}
