//! Shared error definitions and the retry executor used across all parley crates.

pub mod error;
pub mod retry;

pub use {
    error::{Error, FromMessage, Result},
    retry::{RetryAttempt, RetryPolicy},
};
