//! Proxy Layer
//!
//! Plain containers and the reactive wrappers that observe them.
//!
//! # Concepts
//!
//! ## Raw containers
//!
//! A [`Raw`] is an ordinary object or array holding [`Value`]s. Nothing about
//! it is reactive: reading it records nothing and writing it notifies no one.
//!
//! ## Proxies
//!
//! A [`Reactive`] wraps a raw container. Reads through the proxy are
//! recorded as dependencies of the running effect, and writes through it
//! re-run the effects that read what changed. Writes made directly on the
//! raw container bypass the engine entirely.
//!
//! ## Keys
//!
//! Properties are addressed by [`Key`]: strings, array indices, or opaque
//! [`Symbol`]s. The reserved [`ITERATE_KEY`] stands for "the key set of an
//! object" and is what key enumeration depends on.
//!
//! ## Accessors
//!
//! An object property may be an [`Accessor`] instead of a stored value. Its
//! getter runs with the proxy it was read through as the receiver, so the
//! reads it makes are tracked like any other.

mod accessor;
mod array;
mod handle;
mod json;
mod key;
mod raw;
mod value;

pub use accessor::Accessor;
pub use handle::{
    is_proxy, is_reactive, is_readonly, is_shallow, reactive, readonly, shallow_reactive,
    shallow_readonly, to_raw, Reactive,
};
pub use key::{Key, Symbol, ITERATE_KEY};
pub use raw::Raw;
pub use value::{has_changed, Value};
