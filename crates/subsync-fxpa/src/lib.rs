// FXPA client: roster fetches, player searches and lineup change requests.

pub mod client;
pub mod decode;
pub mod error;

pub use client::{FxpaClient, DEFAULT_BASE_URL};
pub use error::FxpaError;
