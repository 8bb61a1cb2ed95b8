//! Reactive Runtime
//!
//! The runtime owns the dependency store: the mapping from every observed
//! `(source, key)` pair to the set of computations that read it during their
//! most recent run. Proxies, computed values and refs all funnel their reads
//! into [`Runtime::track`] and their writes into [`Runtime::trigger`].
//!
//! # How It Works
//!
//! 1. When a reactive property is read inside a running computation, the
//!    runtime adds that computation to the property's [`Dep`] and the
//!    computation remembers the `Dep` (weakly) for later cleanup.
//!
//! 2. When a computation re-runs, it first removes itself from every `Dep` it
//!    remembered, then rebuilds its dependencies from scratch. Branches that
//!    are no longer taken stop notifying it.
//!
//! 3. When a property is written, the runtime:
//!    a. Collects the subscribers of the property, plus the structural keys
//!       the write affects (the iteration key, array `length`, truncated
//!       indices)
//!    b. Snapshots them, so re-runs that resubscribe cannot disturb the loop
//!    c. Skips the computation that is currently running
//!    d. Hands each remaining one to its scheduler, or runs it in place
//!
//! # Threading
//!
//! The store is thread-local. Everything reactive is `Rc`-based, so a source
//! and its subscribers always live on the thread that created them.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use smallvec::SmallVec;

use super::context::ReactiveContext;
use super::subscriber::{Job, Subscriber, SubscriberId};
use crate::proxy::{Key, Value, ITERATE_KEY};

/// Identity of a tracked source in the dependency store.
///
/// Raw containers, computed values and anything else that calls
/// [`track`]/[`trigger`] directly allocate one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(u64);

impl SourceId {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SourceId {
    fn default() -> Self {
        Self::new()
    }
}

/// What a write did to its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    /// An existing key got a new value.
    Set,
    /// A key that did not exist was created.
    Add,
    /// An own key was removed.
    Delete,
}

/// Shape of the source being written, which decides the structural keys a
/// write also invalidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Object,
    Array,
}

/// The subscriber set of one `(source, key)` pair.
pub(crate) struct Dep {
    source: SourceId,
    key: Key,
    subscribers: RefCell<IndexMap<SubscriberId, Rc<dyn Subscriber>>>,
}

impl Dep {
    fn new(source: SourceId, key: Key) -> Self {
        Self {
            source,
            key,
            subscribers: RefCell::new(IndexMap::new()),
        }
    }

    /// Returns `true` if the subscriber was not already present.
    fn insert(&self, subscriber: &Rc<dyn Subscriber>) -> bool {
        let mut subscribers = self.subscribers.borrow_mut();
        if subscribers.contains_key(&subscriber.id()) {
            return false;
        }
        subscribers.insert(subscriber.id(), Rc::clone(subscriber));
        true
    }

    /// Remove a subscriber. An emptied set is dropped from the store.
    pub(crate) fn remove(self: &Rc<Self>, id: SubscriberId) {
        let (removed, now_empty) = {
            let mut subscribers = self.subscribers.borrow_mut();
            let removed = subscribers.shift_remove(&id);
            (removed, subscribers.is_empty())
        };
        drop(removed);
        if now_empty {
            Runtime::prune(self);
        }
    }

    fn snapshot_into(&self, out: &mut IndexMap<SubscriberId, Rc<dyn Subscriber>>) {
        for (id, subscriber) in self.subscribers.borrow().iter() {
            out.entry(*id).or_insert_with(|| Rc::clone(subscriber));
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.subscribers.borrow().len()
    }
}

type KeyDeps = IndexMap<Key, Rc<Dep>>;

thread_local! {
    static TARGET_MAP: RefCell<HashMap<SourceId, KeyDeps>> = RefCell::new(HashMap::new());
}

/// The reactive runtime.
///
/// A unit struct grouping the dependency-store operations; all state is
/// thread-local.
pub struct Runtime;

impl Runtime {
    /// Record that the running computation read `key` on `source`.
    ///
    /// No-op outside a computation, while tracking is paused, or when the
    /// running computation has been stopped.
    pub fn track(source: SourceId, key: &Key) {
        if !ReactiveContext::is_tracking() {
            return;
        }
        let Some(subscriber) = ReactiveContext::current() else {
            return;
        };
        if !subscriber.is_active() {
            return;
        }

        let dep = TARGET_MAP.with(|map| {
            let mut map = map.borrow_mut();
            let deps = map.entry(source).or_default();
            Rc::clone(
                deps.entry(key.clone())
                    .or_insert_with(|| Rc::new(Dep::new(source, key.clone()))),
            )
        });

        if dep.insert(&subscriber) {
            subscriber.record_dep(&dep);
            tracing::trace!(?source, %key, subscriber = ?subscriber.id(), "track");
        }
    }

    /// Notify everything that depends on `key` of `source` after a write.
    ///
    /// `new_value` is only consulted for an array `length` write, where it is
    /// the new length.
    pub fn trigger(
        source: SourceId,
        kind: SourceKind,
        key: &Key,
        op: TriggerKind,
        new_value: Option<&Value>,
    ) {
        let deps: SmallVec<[Rc<Dep>; 4]> = TARGET_MAP.with(|map| {
            let map = map.borrow();
            let Some(deps) = map.get(&source) else {
                return SmallVec::new();
            };

            let mut collected = SmallVec::new();
            if kind == SourceKind::Array && key.is_length() {
                let new_len = new_value.and_then(Value::as_index).unwrap_or(0);
                for (tracked, dep) in deps {
                    let out_of_range = tracked.as_index().is_some_and(|i| i >= new_len);
                    if tracked.is_length() || out_of_range {
                        collected.push(Rc::clone(dep));
                    }
                }
            } else {
                collected.extend(deps.get(key).cloned());
            }

            if matches!(op, TriggerKind::Add | TriggerKind::Delete) {
                collected.extend(deps.get(&ITERATE_KEY).cloned());
            }
            if op == TriggerKind::Add && kind == SourceKind::Array && !key.is_length() {
                collected.extend(deps.get(&Key::length()).cloned());
            }
            collected
        });

        if deps.is_empty() {
            return;
        }

        // Snapshot first: running a subscriber cleans it out of the live sets
        // and may add it back.
        let mut subscribers = IndexMap::new();
        for dep in &deps {
            dep.snapshot_into(&mut subscribers);
        }
        drop(deps);

        tracing::trace!(?source, %key, ?op, count = subscribers.len(), "trigger");

        let current = ReactiveContext::current_subscriber();
        for (id, subscriber) in subscribers {
            if Some(id) == current || !subscriber.is_active() {
                continue;
            }
            match subscriber.scheduler() {
                Some(scheduler) => scheduler(Job::new(subscriber)),
                None => subscriber.run_erased(),
            }
        }
    }

    /// Drop every dependency set recorded for `source`.
    ///
    /// Called when the source itself is released. Tolerates being reached
    /// during thread teardown or from inside another store operation.
    pub fn forget_source(source: SourceId) {
        let removed = TARGET_MAP
            .try_with(|map| match map.try_borrow_mut() {
                Ok(mut map) => map.remove(&source),
                Err(_) => None,
            })
            .ok()
            .flatten();
        drop(removed);
    }

    /// Number of computations currently subscribed to `key` of `source`.
    pub fn subscriber_count(source: SourceId, key: &Key) -> usize {
        TARGET_MAP.with(|map| {
            map.borrow()
                .get(&source)
                .and_then(|deps| deps.get(key))
                .map_or(0, |dep| dep.len())
        })
    }

    /// Number of keys of `source` that have at least one subscriber.
    pub fn tracked_key_count(source: SourceId) -> usize {
        TARGET_MAP.with(|map| map.borrow().get(&source).map_or(0, IndexMap::len))
    }

    fn prune(dep: &Rc<Dep>) {
        let removed = TARGET_MAP
            .try_with(|map| {
                let Ok(mut map) = map.try_borrow_mut() else {
                    return None;
                };
                let deps = map.get_mut(&dep.source)?;
                let same = deps.get(&dep.key).is_some_and(|live| Rc::ptr_eq(live, dep));
                if !same || dep.len() > 0 {
                    return None;
                }
                let removed = deps.shift_remove(&dep.key);
                if deps.is_empty() {
                    map.remove(&dep.source);
                }
                removed
            })
            .ok()
            .flatten();
        drop(removed);
    }
}

/// Record a read of `key` on `source`. See [`Runtime::track`].
pub fn track(source: SourceId, key: impl Into<Key>) {
    Runtime::track(source, &key.into());
}

/// Notify the dependents of a write. See [`Runtime::trigger`].
pub fn trigger(
    source: SourceId,
    kind: SourceKind,
    key: impl Into<Key>,
    op: TriggerKind,
    new_value: Option<&Value>,
) {
    Runtime::trigger(source, kind, &key.into(), op, new_value);
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::effect;
    use std::cell::Cell;

    fn counter() -> (Rc<Cell<usize>>, impl Fn() -> usize) {
        let runs = Rc::new(Cell::new(0));
        let read = {
            let runs = runs.clone();
            move || runs.get()
        };
        (runs, read)
    }

    #[test]
    fn manual_track_and_trigger() {
        let source = SourceId::new();
        let (runs, count) = counter();

        let _e = effect(move || {
            track(source, "x");
            runs.set(runs.get() + 1);
        });
        assert_eq!(count(), 1);
        assert_eq!(Runtime::subscriber_count(source, &Key::from("x")), 1);

        trigger(source, SourceKind::Object, "x", TriggerKind::Set, None);
        assert_eq!(count(), 2);

        // Unrelated key: nothing runs.
        trigger(source, SourceKind::Object, "y", TriggerKind::Set, None);
        assert_eq!(count(), 2);
    }

    #[test]
    fn structural_writes_reach_iteration_subscribers() {
        let source = SourceId::new();
        let (runs, count) = counter();

        let _e = effect(move || {
            track(source, ITERATE_KEY);
            runs.set(runs.get() + 1);
        });

        trigger(source, SourceKind::Object, "a", TriggerKind::Set, None);
        assert_eq!(count(), 1);
        trigger(source, SourceKind::Object, "a", TriggerKind::Add, None);
        assert_eq!(count(), 2);
        trigger(source, SourceKind::Object, "a", TriggerKind::Delete, None);
        assert_eq!(count(), 3);
    }

    #[test]
    fn length_shrink_reaches_out_of_range_indices() {
        let source = SourceId::new();
        let (low_runs, low) = counter();
        let (high_runs, high) = counter();

        let _low = effect(move || {
            track(source, 0usize);
            low_runs.set(low_runs.get() + 1);
        });
        let _high = effect(move || {
            track(source, 3usize);
            high_runs.set(high_runs.get() + 1);
        });

        let new_len = Value::from(2);
        trigger(
            source,
            SourceKind::Array,
            "length",
            TriggerKind::Set,
            Some(&new_len),
        );
        assert_eq!(low(), 1);
        assert_eq!(high(), 2);
    }

    #[test]
    fn array_add_reaches_length_subscribers() {
        let source = SourceId::new();
        let (runs, count) = counter();

        let _e = effect(move || {
            track(source, "length");
            runs.set(runs.get() + 1);
        });

        trigger(source, SourceKind::Array, 5usize, TriggerKind::Set, None);
        assert_eq!(count(), 1);
        trigger(source, SourceKind::Array, 5usize, TriggerKind::Add, None);
        assert_eq!(count(), 2);
    }

    #[test]
    fn emptied_sets_are_pruned() {
        let source = SourceId::new();
        let e = effect(move || track(source, "x"));
        assert_eq!(Runtime::tracked_key_count(source), 1);

        e.stop();
        assert_eq!(Runtime::tracked_key_count(source), 0);
        assert_eq!(Runtime::subscriber_count(source, &Key::from("x")), 0);
    }

    #[test]
    fn forgetting_a_source_releases_its_deps() {
        let source = SourceId::new();
        let (runs, count) = counter();
        let _e = effect(move || {
            track(source, "x");
            runs.set(runs.get() + 1);
        });

        Runtime::forget_source(source);
        trigger(source, SourceKind::Object, "x", TriggerKind::Set, None);
        assert_eq!(count(), 1);
    }
}
