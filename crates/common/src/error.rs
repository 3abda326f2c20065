use std::{fmt::Display, path::PathBuf};

use thiserror::Error;

/// Errors shared by crates that have no richer taxonomy of their own.
#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    #[must_use]
    pub fn parse(path: impl Into<PathBuf>, message: impl Display) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

impl FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message(message)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can be built from a plain message string.
///
/// Pair with [`impl_context!`] to get `.context()` / `.with_context()` on
/// `Result` and `Option` in that crate.
pub trait FromMessage: Sized {
    fn from_message(message: String) -> Self;

    /// `"{context}: {source}"`, the shape every context helper produces.
    fn with_source(context: impl Display, source: impl Display) -> Self {
        Self::from_message(format!("{context}: {source}"))
    }
}

/// Generate a crate-local `Context` trait.
///
/// Invoke in a module where `Error: FromMessage` and `Result<T>` are in scope:
///
/// ```ignore
/// parley_common::impl_context!();
/// ```
#[macro_export]
macro_rules! impl_context {
    () => {
        pub trait Context<T> {
            fn with_context<C: Into<String>>(self, f: impl FnOnce() -> C) -> Result<T>;

            fn context(self, context: impl Into<String>) -> Result<T>
            where
                Self: Sized,
            {
                self.with_context(|| context)
            }
        }

        impl<T, E: std::fmt::Display> Context<T> for std::result::Result<T, E> {
            fn with_context<C: Into<String>>(self, f: impl FnOnce() -> C) -> Result<T> {
                self.map_err(|source| {
                    let context: String = f().into();
                    <Error as $crate::FromMessage>::with_source(context, source)
                })
            }
        }

        impl<T> Context<T> for Option<T> {
            fn with_context<C: Into<String>>(self, f: impl FnOnce() -> C) -> Result<T> {
                self.ok_or_else(|| <Error as $crate::FromMessage>::from_message(f().into()))
            }
        }
    };
}
