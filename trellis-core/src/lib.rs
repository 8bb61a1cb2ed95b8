//! Trellis Core
//!
//! This crate provides a fine-grained reactive runtime: computations
//! ("effects") that re-run automatically whenever the data they read
//! changes, without any manual subscription wiring. It implements:
//!
//! - Dependency tracking and effect scheduling
//! - Transparent reactive proxies over plain objects and arrays
//! - Lazy memoized computed values
//! - Watchers with deferred flushing and stale-callback invalidation
//! - Refs and auto-unwrapping ref views
//!
//! # Architecture
//!
//! The crate is organized into two modules:
//!
//! - `proxy`: dynamic values, plain containers and the reactive wrappers
//!   that intercept reads and writes on them
//! - `reactive`: the dependency store, the effect engine and the primitives
//!   built on it
//!
//! All engine state is thread-local and every handle is `Rc`-based, so a
//! reactive graph lives on the thread that built it.
//!
//! # Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use trellis_core::{computed, effect, reactive, Raw};
//!
//! // Wrap plain data
//! let state = reactive(&Raw::object_from([("count", 1)]));
//!
//! // Create a derived value
//! let doubled = computed({
//!     let state = state.clone();
//!     move || state.get("count").as_f64().unwrap_or_default() * 2.0
//! });
//!
//! // Create an effect
//! let log = Rc::new(RefCell::new(Vec::new()));
//! let logger = effect({
//!     let log = log.clone();
//!     let doubled = doubled.clone();
//!     move || log.borrow_mut().push(doubled.value())
//! });
//!
//! // Update the data; the effect re-runs
//! state.set("count", 5);
//! assert_eq!(*log.borrow(), vec![2.0, 10.0]);
//! # logger.stop();
//! ```

pub mod error;
pub mod proxy;
pub mod reactive;

pub use error::{Error, Result};
pub use proxy::{
    has_changed, is_proxy, is_reactive, is_readonly, is_shallow, reactive, readonly,
    shallow_reactive, shallow_readonly, to_raw, Accessor, Key, Raw, Reactive, Symbol, Value,
    ITERATE_KEY,
};
pub use reactive::{
    computed, effect, effect_with, flush, is_ref, pause_tracking, proxy_refs, queue_job,
    ref_value, to_ref, to_refs, track, trigger, unref, untracked, watch, Computed, Effect,
    EffectOptions, FlushMode, Job, OnInvalidate, Ref, SourceKind, TriggerKind, WatchHandle,
    WatchOptions, WatchSource,
};
