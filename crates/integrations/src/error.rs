use thiserror::Error;

/// Failures while building an adapter. Call failures are reported through
/// the engine's own error types.
#[derive(Debug, Error)]
pub enum IntegrationError {
    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("missing setting: {0}")]
    Missing(&'static str),
}
