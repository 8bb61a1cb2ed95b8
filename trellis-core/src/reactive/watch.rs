//! Watchers
//!
//! A watcher observes a source and calls back with the new and previous
//! value whenever the source's dependencies are written.
//!
//! # How Watchers Work
//!
//! 1. The source becomes a getter: either a user function, or a deep
//!    traversal that reads every property reachable from a reactive value.
//!
//! 2. The getter is wrapped in a lazy effect whose scheduler runs the
//!    watcher's job instead of the getter.
//!
//! 3. The job re-runs the getter, calls the invalidation hook the previous
//!    callback registered (if any), then calls the callback with
//!    `(new, old, on_invalidate)` and remembers `new` as the next `old`.
//!
//! # Stale callbacks
//!
//! A callback that starts asynchronous work can register a hook through
//! [`OnInvalidate::register`]. If the source changes again before that work
//! settles, the hook runs before the next callback does, and the earlier
//! work can tell it has been superseded. The mechanism is advisory: the
//! async work has to check.
//!
//! # Flush timing
//!
//! With [`FlushMode::Sync`] the job runs inside the triggering write. With
//! [`FlushMode::Post`] it is queued with
//! [`queue_post_flush`](super::scheduler::queue_post_flush) and runs on the
//! next [`flush`](super::scheduler::flush).

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use super::effect::{Effect, EffectOptions, WeakEffect};
use super::runtime::SourceId;
use super::scheduler::queue_post_flush;
use crate::proxy::Value;

/// When a triggered watcher job runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlushMode {
    /// Inside the write that triggered it.
    #[default]
    Sync,
    /// On the next flush of the job queue.
    Post,
}

/// Options for [`watch`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchOptions {
    /// Run the callback once at registration, with no previous value.
    pub immediate: bool,
    pub flush: FlushMode,
}

impl WatchOptions {
    pub fn immediate() -> Self {
        Self {
            immediate: true,
            ..Self::default()
        }
    }

    pub fn with_flush(mut self, flush: FlushMode) -> Self {
        self.flush = flush;
        self
    }
}

/// What a watcher observes: a getter whose reads are tracked and whose
/// result is reported.
pub struct WatchSource<T> {
    getter: Box<dyn Fn() -> T>,
    deep: bool,
}

impl<T> WatchSource<T> {
    pub fn getter(getter: impl Fn() -> T + 'static) -> Self {
        Self {
            getter: Box::new(getter),
            deep: false,
        }
    }
}

impl WatchSource<Value> {
    /// Observe a value tree at every depth. The callback receives the value
    /// itself.
    pub fn deep(value: impl Into<Value>) -> Self {
        let value = value.into();
        Self {
            getter: Box::new(move || traverse(&value)),
            deep: true,
        }
    }
}

impl<T> fmt::Debug for WatchSource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchSource").field("deep", &self.deep).finish()
    }
}

/// Read every property reachable from `value`, so that the running effect
/// depends on all of them. Containers already visited are skipped, which
/// makes cyclic graphs safe. Returns `value`.
pub fn traverse(value: &Value) -> Value {
    let mut seen = HashSet::new();
    visit(value, &mut seen);
    value.clone()
}

fn visit(value: &Value, seen: &mut HashSet<SourceId>) {
    match value {
        Value::Proxy(proxy) => {
            if !seen.insert(proxy.id()) {
                return;
            }
            for key in proxy.keys() {
                visit(&proxy.get(key), seen);
            }
        }
        Value::Object(raw) => {
            if !seen.insert(raw.id()) {
                return;
            }
            for item in raw.values() {
                visit(&item, seen);
            }
        }
        Value::Ref(r) => visit(&r.value(), seen),
        _ => {}
    }
}

type Cleanup = Box<dyn FnOnce()>;

/// Registers the hook that marks a callback invocation as superseded.
///
/// Handed to every watcher callback. Registering again replaces the
/// previous hook.
#[derive(Clone, Default)]
pub struct OnInvalidate {
    slot: Rc<RefCell<Option<Cleanup>>>,
}

impl OnInvalidate {
    pub fn register(&self, hook: impl FnOnce() + 'static) {
        let previous = self.slot.borrow_mut().replace(Box::new(hook));
        drop(previous);
    }

    /// Run and clear the pending hook, if any.
    fn invalidate(&self) {
        let hook = self.slot.borrow_mut().take();
        if let Some(hook) = hook {
            hook();
        }
    }

    fn is_pending(&self) -> bool {
        self.slot.borrow().is_some()
    }
}

impl fmt::Debug for OnInvalidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnInvalidate")
            .field("pending", &self.is_pending())
            .finish()
    }
}

type Callback<T> = Box<dyn Fn(&T, Option<&T>, &OnInvalidate)>;

struct WatchState<T: 'static> {
    /// Set right after the effect is created. Weak: the effect's scheduler
    /// owns this state.
    effect: RefCell<Option<WeakEffect<T>>>,
    old: RefCell<Option<T>>,
    on_invalidate: OnInvalidate,
    callback: Callback<T>,
    flush: FlushMode,
}

impl<T: Clone + 'static> WatchState<T> {
    fn schedule(self: &Rc<Self>) {
        match self.flush {
            FlushMode::Sync => self.run_job(),
            FlushMode::Post => {
                let state = Rc::clone(self);
                queue_post_flush(move || state.run_job());
            }
        }
    }

    fn run_job(&self) {
        let Some(effect) = self.effect.borrow().as_ref().and_then(WeakEffect::upgrade) else {
            return;
        };
        if !effect.is_active() {
            return;
        }

        let new = effect.run();
        self.on_invalidate.invalidate();

        let old = self.old.borrow().clone();
        (self.callback)(&new, old.as_ref(), &self.on_invalidate);
        let previous = self.old.borrow_mut().replace(new);
        drop(previous);
    }
}

/// Handle to a registered watcher.
///
/// Dropping the handle does not stop the watcher; call [`stop`](Self::stop).
pub struct WatchHandle<T: 'static> {
    effect: Effect<T>,
    state: Rc<WatchState<T>>,
}

impl<T: 'static> WatchHandle<T> {
    /// Stop watching. A pending invalidation hook runs now.
    pub fn stop(&self) {
        self.effect.stop();
        self.state.on_invalidate.invalidate();
        tracing::debug!(effect = ?self.effect.id(), "watcher stopped");
    }

    pub fn is_active(&self) -> bool {
        self.effect.is_active()
    }

    /// Number of times the source has been evaluated.
    pub fn run_count(&self) -> usize {
        self.effect.run_count()
    }
}

impl<T: 'static> fmt::Debug for WatchHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchHandle")
            .field("effect", &self.effect)
            .field("flush", &self.state.flush)
            .finish()
    }
}

/// Call `callback(new, old, on_invalidate)` whenever `source` changes.
///
/// # Example
///
/// ```rust
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use trellis_core::{reactive, watch, OnInvalidate, Raw, Value, WatchOptions, WatchSource};
///
/// let state = reactive(&Raw::object_from([("age", 0)]));
/// let calls = Rc::new(Cell::new(0));
///
/// let _w = watch(
///     WatchSource::getter({
///         let state = state.clone();
///         move || state.get("age")
///     }),
///     {
///         let calls = calls.clone();
///         move |_new: &Value, _old: Option<&Value>, _: &OnInvalidate| calls.set(calls.get() + 1)
///     },
///     WatchOptions::immediate(),
/// );
///
/// state.set("age", 1);
/// assert_eq!(calls.get(), 2);
/// ```
pub fn watch<T, F>(source: WatchSource<T>, callback: F, options: WatchOptions) -> WatchHandle<T>
where
    T: Clone + 'static,
    F: Fn(&T, Option<&T>, &OnInvalidate) + 'static,
{
    let state = Rc::new(WatchState {
        effect: RefCell::new(None),
        old: RefCell::new(None),
        on_invalidate: OnInvalidate::default(),
        callback: Box::new(callback),
        flush: options.flush,
    });

    let effect = Effect::with_options(
        source.getter,
        EffectOptions::lazy().with_scheduler({
            let state = Rc::clone(&state);
            move |_job| state.schedule()
        }),
    );
    *state.effect.borrow_mut() = Some(effect.downgrade());
    tracing::debug!(effect = ?effect.id(), ?options, "watcher created");

    if options.immediate {
        state.run_job();
    } else {
        let initial = effect.run();
        *state.old.borrow_mut() = Some(initial);
    }

    WatchHandle { effect, state }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::{reactive, Raw};
    use crate::reactive::scheduler::flush;
    use std::cell::Cell;

    fn counter() -> (Rc<Cell<usize>>, impl Fn(&Value, Option<&Value>, &OnInvalidate)) {
        let calls = Rc::new(Cell::new(0));
        let cb = {
            let calls = calls.clone();
            move |_: &Value, _: Option<&Value>, _: &OnInvalidate| calls.set(calls.get() + 1)
        };
        (calls, cb)
    }

    #[test]
    fn getter_source_reports_new_and_old() {
        let state = reactive(&Raw::object_from([("age", 0)]));
        let seen = Rc::new(RefCell::new(Vec::new()));

        let w = watch(
            WatchSource::getter({
                let state = state.clone();
                move || state.get("age")
            }),
            {
                let seen = seen.clone();
                move |new: &Value, old: Option<&Value>, _: &OnInvalidate| {
                    seen.borrow_mut().push((new.clone(), old.cloned()));
                }
            },
            WatchOptions::default(),
        );

        state.set("age", 1);
        state.set("age", 2);
        assert_eq!(
            *seen.borrow(),
            vec![
                (Value::from(1), Some(Value::from(0))),
                (Value::from(2), Some(Value::from(1))),
            ]
        );
        w.stop();
    }

    #[test]
    fn immediate_fires_at_registration_without_old_value() {
        let state = reactive(&Raw::object_from([("age", 0)]));
        let olds = Rc::new(RefCell::new(Vec::new()));

        let w = watch(
            WatchSource::getter({
                let state = state.clone();
                move || state.get("age")
            }),
            {
                let olds = olds.clone();
                move |_: &Value, old: Option<&Value>, _: &OnInvalidate| {
                    olds.borrow_mut().push(old.cloned());
                }
            },
            WatchOptions::immediate(),
        );
        assert_eq!(*olds.borrow(), vec![None]);

        state.set("age", 1);
        assert_eq!(*olds.borrow(), vec![None, Some(Value::from(0))]);
        w.stop();
    }

    #[test]
    fn deep_source_sees_nested_writes() {
        let inner = Raw::object_from([("n", 1)]);
        let state = reactive(&Raw::object_from([("inner", Value::from(&inner))]));
        let (calls, cb) = counter();

        let w = watch(WatchSource::deep(&state), cb, WatchOptions::default());

        reactive(&inner).set("n", 2);
        assert_eq!(calls.get(), 1);

        state.set("extra", true);
        assert_eq!(calls.get(), 2);
        w.stop();
    }

    #[test]
    fn deep_traversal_survives_cycles() {
        let raw = Raw::object();
        raw.set("me", &raw);
        let state = reactive(&raw);
        let (calls, cb) = counter();

        let w = watch(WatchSource::deep(&state), cb, WatchOptions::default());
        state.set("x", 1);
        assert_eq!(calls.get(), 1);

        w.stop();
        raw.delete("me");
    }

    #[test]
    fn post_flush_defers_the_callback() {
        let state = reactive(&Raw::object_from([("age", 0)]));
        let (calls, cb) = counter();

        let w = watch(
            WatchSource::getter({
                let state = state.clone();
                move || state.get("age")
            }),
            cb,
            WatchOptions::default().with_flush(FlushMode::Post),
        );

        state.set("age", 1);
        assert_eq!(calls.get(), 0);
        flush();
        assert_eq!(calls.get(), 1);
        w.stop();
    }

    #[test]
    fn stop_runs_pending_invalidation() {
        let state = reactive(&Raw::object_from([("age", 0)]));
        let invalidated = Rc::new(Cell::new(false));

        let w = watch(
            WatchSource::getter({
                let state = state.clone();
                move || state.get("age")
            }),
            {
                let invalidated = invalidated.clone();
                move |_: &Value, _: Option<&Value>, on_invalidate: &OnInvalidate| {
                    let invalidated = invalidated.clone();
                    on_invalidate.register(move || invalidated.set(true));
                }
            },
            WatchOptions::default(),
        );

        state.set("age", 1);
        assert!(!invalidated.get());

        w.stop();
        assert!(invalidated.get());
        assert!(!w.is_active());

        // No more callbacks after stop
        invalidated.set(false);
        state.set("age", 2);
        assert!(!invalidated.get());
    }

    #[test]
    fn options_load_from_json() {
        let options: WatchOptions =
            serde_json::from_str(r#"{"immediate": true, "flush": "post"}"#).unwrap();
        assert_eq!(options, WatchOptions::immediate().with_flush(FlushMode::Post));

        let options: WatchOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, WatchOptions::default());
    }
}
