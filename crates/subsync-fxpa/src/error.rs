// Errors raised by the FXPA client.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FxpaError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned status {code}: {body}")]
    Status { code: u16, body: String },

    #[error("not logged in (session cookie missing or expired)")]
    NotLoggedIn,

    #[error("page error: {0}")]
    PageError(String),

    #[error("failed to decode response: {0}")]
    Decode(String),
}
