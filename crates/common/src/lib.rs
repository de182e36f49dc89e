//! Shared types for the google-login workspace

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
