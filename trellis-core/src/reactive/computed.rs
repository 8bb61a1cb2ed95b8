//! Computed Implementation
//!
//! A Computed is a cached derived value that re-evaluates only when one of
//! the reactive values it read has been written since the last evaluation.
//!
//! # How Computed Values Work
//!
//! 1. The getter is wrapped in a lazy effect. Nothing runs at creation.
//!
//! 2. On first access, the effect runs, the result is cached and the node is
//!    marked clean.
//!
//! 3. When a dependency of the getter is written, the effect's scheduler does
//!    not re-run the getter. It marks the node dirty and triggers the node's
//!    own synthetic `value` key, so whoever read this computed value is
//!    notified in turn.
//!
//! 4. On next access, a dirty node re-runs the getter once; a clean node
//!    returns the cache.
//!
//! # Why This Matters
//!
//! Recomputation is strictly demand-driven:
//!
//! - A property changes
//! - 10 computed values depend on it
//! - Only the computed values actually read again will recompute
//! - The rest stay dirty (no wasted work)

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use super::effect::{Effect, EffectOptions};
use super::runtime::{Runtime, SourceId, SourceKind, TriggerKind};
use crate::proxy::Key;

/// Name of the synthetic key every reader of a computed value tracks.
const VALUE: &str = "value";

struct ComputedInner<T: 'static> {
    /// Identity of this node in the dependency store.
    source: SourceId,

    /// Set when a dependency changed since the cache was filled.
    dirty: Cell<bool>,

    /// The cached value, filled on first access.
    cached: RefCell<Option<T>>,

    /// Lazy effect over the getter.
    effect: Effect<T>,
}

impl<T: 'static> ComputedInner<T> {
    /// Scheduler body: invalidate the cache and notify readers.
    fn invalidate(&self) {
        if !self.dirty.replace(true) {
            tracing::trace!(source = ?self.source, "computed invalidated");
            Runtime::trigger(
                self.source,
                SourceKind::Object,
                &Key::from(VALUE),
                TriggerKind::Set,
                None,
            );
        }
    }
}

impl<T: 'static> Drop for ComputedInner<T> {
    fn drop(&mut self) {
        self.effect.stop();
        Runtime::forget_source(self.source);
    }
}

/// A lazily evaluated, memoized derived value.
///
/// Cloning a `Computed` shares the cache.
///
/// # Example
///
/// ```rust
/// use trellis_core::{computed, reactive, Raw};
///
/// let state = reactive(&Raw::object_from([("a", 1), ("b", 2)]));
/// let sum = computed({
///     let state = state.clone();
///     move || {
///         state.get("a").as_f64().unwrap_or_default()
///             + state.get("b").as_f64().unwrap_or_default()
///     }
/// });
///
/// assert_eq!(sum.value(), 3.0);
/// state.set("a", 10);
/// assert_eq!(sum.value(), 12.0);
/// ```
pub struct Computed<T: 'static> {
    inner: Rc<ComputedInner<T>>,
}

impl<T: 'static> Computed<T> {
    /// Create a computed value. The getter does not run until the first
    /// [`value`](Self::value) call.
    pub fn new<F>(getter: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        let inner = Rc::new_cyclic(|this: &Weak<ComputedInner<T>>| {
            let this = Weak::clone(this);
            let effect = Effect::with_options(
                getter,
                EffectOptions::lazy().with_scheduler(move |_job| {
                    if let Some(inner) = this.upgrade() {
                        inner.invalidate();
                    }
                }),
            );
            ComputedInner {
                source: SourceId::new(),
                dirty: Cell::new(true),
                cached: RefCell::new(None),
                effect,
            }
        });
        Self { inner }
    }

    /// Whether the next read will re-run the getter.
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    /// Dependency-store identity of the synthetic `value` key's owner.
    pub fn source_id(&self) -> SourceId {
        self.inner.source
    }

    /// Number of times the getter has run.
    pub fn compute_count(&self) -> usize {
        self.inner.effect.run_count()
    }
}

impl<T: Clone + 'static> Computed<T> {
    /// The current value, recomputed first if a dependency changed.
    ///
    /// Reading inside an effect subscribes that effect to this value.
    pub fn value(&self) -> T {
        let inner = &self.inner;
        let cached = if inner.dirty.get() {
            None
        } else {
            inner.cached.borrow().clone()
        };

        let value = match cached {
            Some(value) => value,
            None => {
                let value = inner.effect.run();
                inner.dirty.set(false);
                let previous = inner.cached.replace(Some(value.clone()));
                drop(previous);
                value
            }
        };

        Runtime::track(inner.source, &Key::from(VALUE));
        value
    }
}

impl<T: 'static> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("source", &self.inner.source)
            .field("dirty", &self.is_dirty())
            .field("cached", &self.inner.cached.borrow())
            .finish()
    }
}

/// Create a computed value from a getter.
pub fn computed<T, F>(getter: F) -> Computed<T>
where
    T: 'static,
    F: Fn() -> T + 'static,
{
    Computed::new(getter)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
