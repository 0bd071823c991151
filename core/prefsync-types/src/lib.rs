//! Core type definitions for prefsync.
//!
//! This crate defines the data model shared by the store and the sync engine:
//! - Typed preference keys and their declared value types
//! - Dynamically typed preference values
//! - Type descriptors for structured (JSON-decoded) values
//!
//! A [`TypedKey`] names a preference and fixes the type its value must have.
//! The declared [`ValueType`] decides how a loosely typed remote value is
//! turned into a [`PrefValue`].

mod key;
mod value;

pub use key::{DecodeFn, TypeDescriptor, TypedKey, ValueType};
pub use value::{PrefType, PrefValue};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unknown value type: {0}")]
    UnknownValueType(String),

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: String,
        found: &'static str,
    },
}
