//! Error types for the reactive core.
//!
//! The engine itself never fails: writes to read-only data are dropped with a
//! warning and self-triggers are suppressed. Errors only surface from the
//! fallible edges of the API, such as converting a dynamic [`Value`] into a
//! concrete Rust type or snapshotting a value tree to JSON.
//!
//! [`Value`]: crate::proxy::Value

use thiserror::Error;

/// Errors produced by conversions and bridge operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A value had a different dynamic type than the caller asked for.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// An operation that needs a container (object or array) got a primitive.
    #[error("value of type {found} is not a container")]
    NotAContainer { found: &'static str },

    /// A value graph refers back to itself and cannot be flattened.
    #[error("cyclic value graph cannot be serialized")]
    Cycle,
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;
