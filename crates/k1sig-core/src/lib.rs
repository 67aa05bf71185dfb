//! Core error types for k1sig.

#![forbid(unsafe_code)]

mod error;

pub use error::Error;

pub type Result<T> = std::result::Result<T, Error>;
