//! Reactive Primitives
//!
//! This module implements the engine: dependency tracking, effects, and the
//! derived primitives built from them. Together with the proxy layer these
//! form the foundation of Trellis's fine-grained reactivity.
//!
//! # Concepts
//!
//! ## Effects
//!
//! An Effect is a computation that re-runs whenever data it read during its
//! last run is written. Effects are used to synchronize reactive state with
//! external systems, such as updating a view or logging.
//!
//! ## Computed values
//!
//! A Computed is a derived value that caches its result. It re-evaluates only
//! when read after one of its dependencies changed.
//!
//! ## Watchers
//!
//! A watcher reports a source's new and previous value to a callback, with
//! optional immediate firing, deferred flushing and stale-callback
//! invalidation.
//!
//! ## Refs
//!
//! A Ref is a single reactive slot, either boxed or bound to one property of
//! a proxy.
//!
//! # Implementation Notes
//!
//! The engine uses a thread-local context stack to detect dependencies
//! automatically. When a proxy property is read, the runtime checks whether a
//! computation is running and, if so, records the dependency in the
//! thread-local dependency store.

mod computed;
mod context;
mod effect;
mod refs;
mod runtime;
mod scheduler;
mod subscriber;
mod watch;

pub use computed::{computed, Computed};
pub use context::{pause_tracking, untracked, PauseTracking, ReactiveContext};
pub use effect::{effect, effect_with, Effect, EffectOptions, Scheduler, WeakEffect};
pub use refs::{is_ref, proxy_refs, ref_value, to_ref, to_refs, unref, Ref, RefProxy};
pub use runtime::{track, trigger, Runtime, SourceId, SourceKind, TriggerKind};
pub use scheduler::{flush, flush_post_jobs, has_pending_jobs, queue_job, queue_post_flush};
pub use subscriber::{Job, SubscriberId};
pub use watch::{traverse, watch, FlushMode, OnInvalidate, WatchHandle, WatchOptions, WatchSource};
