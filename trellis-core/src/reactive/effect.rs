//! Effect Implementation
//!
//! An Effect is a computation that re-runs whenever the reactive data it read
//! during its last run is written.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies (unless it is lazy).
//!
//! 2. Before every run, the effect removes itself from every dependency set
//!    it joined last time, then re-tracks while the function executes. The
//!    dependency set therefore always reflects the latest run, which is what
//!    makes branch switching work.
//!
//! 3. When a dependency is written, the effect either re-runs in place or, if
//!    it was created with a scheduler, hands a [`Job`] to that scheduler and
//!    lets it decide when to run.
//!
//! # Laziness
//!
//! A lazy effect does not run at creation. Calling [`Effect::run`] runs it
//! under tracking and returns the function's result. Computed values and
//! watchers are built from lazy effects with custom schedulers.
//!
//! # Lifetime
//!
//! The dependency store holds subscribed effects strongly, so an effect keeps
//! reacting after its handle is dropped, for as long as something it depends
//! on is alive. [`Effect::stop`] detaches it for good.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;

use super::context::{untracked, ReactiveContext};
use super::runtime::Dep;
use super::subscriber::{Job, Subscriber, SubscriberId};

/// Caller-supplied replacement for "re-run immediately".
pub type Scheduler = Rc<dyn Fn(Job)>;

/// Options for [`effect_with`].
#[derive(Clone, Default)]
pub struct EffectOptions {
    /// Receives the effect's run handle on every trigger instead of the
    /// effect running synchronously.
    pub scheduler: Option<Scheduler>,

    /// Do not run at creation.
    pub lazy: bool,
}

impl EffectOptions {
    /// Options for an effect that only runs when asked to.
    pub fn lazy() -> Self {
        Self {
            lazy: true,
            ..Self::default()
        }
    }

    pub fn with_scheduler(mut self, scheduler: impl Fn(Job) + 'static) -> Self {
        self.scheduler = Some(Rc::new(scheduler));
        self
    }

    pub fn with_lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }
}

impl fmt::Debug for EffectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectOptions")
            .field("scheduler", &self.scheduler.is_some())
            .field("lazy", &self.lazy)
            .finish()
    }
}

struct EffectInner<T> {
    /// The subscriber ID used for dependency tracking.
    id: SubscriberId,

    /// The effect function.
    func: Box<dyn Fn() -> T>,

    /// Dependency sets joined during the last run. Held weakly: the store
    /// owns the sets, and a released source takes its sets with it.
    deps: RefCell<SmallVec<[Weak<Dep>; 4]>>,

    scheduler: Option<Scheduler>,

    /// Cleared by `stop`.
    active: Cell<bool>,

    /// Number of tracked runs.
    run_count: Cell<usize>,
}

impl<T: 'static> EffectInner<T> {
    fn run(self: &Rc<Self>) -> T {
        if !self.active.get() {
            return untracked(|| (self.func)());
        }

        self.cleanup();

        let _ctx = ReactiveContext::enter(Rc::clone(self) as Rc<dyn Subscriber>);
        self.run_count.set(self.run_count.get() + 1);
        tracing::trace!(effect = ?self.id, run = self.run_count.get(), "effect run");

        (self.func)()
    }

    /// Leave every dependency set joined during the last run.
    fn cleanup(&self) {
        let deps = std::mem::take(&mut *self.deps.borrow_mut());
        for dep in deps {
            if let Some(dep) = dep.upgrade() {
                dep.remove(self.id);
            }
        }
    }

    fn stop(&self) {
        if self.active.replace(false) {
            self.cleanup();
            tracing::debug!(effect = ?self.id, "effect stopped");
        }
    }
}

impl<T: 'static> Subscriber for EffectInner<T> {
    fn id(&self) -> SubscriberId {
        self.id
    }

    fn record_dep(&self, dep: &Rc<Dep>) {
        self.deps.borrow_mut().push(Rc::downgrade(dep));
    }

    fn is_active(&self) -> bool {
        self.active.get()
    }

    fn scheduler(&self) -> Option<Scheduler> {
        self.scheduler.clone()
    }

    fn run_erased(self: Rc<Self>) {
        drop(self.run());
    }
}

/// A reactive computation.
///
/// # Example
///
/// ```rust
/// use trellis_core::{effect, reactive, Raw};
///
/// let state = reactive(&Raw::object_from([("count", 0)]));
/// let seen = std::rc::Rc::new(std::cell::Cell::new(0.0));
///
/// let _e = effect({
///     let state = state.clone();
///     let seen = seen.clone();
///     move || seen.set(state.get("count").as_f64().unwrap_or_default())
/// });
///
/// state.set("count", 5);
/// assert_eq!(seen.get(), 5.0);
/// ```
///
/// # Lifetime
///
/// Every source the effect read holds it strongly until its next run or
/// until [`stop`](Self::stop). Dropping the `Effect` handle does not
/// detach it, so an effect whose closure captures its own sources keeps
/// them, and their dependency entries, alive until it is stopped.
pub struct Effect<T: 'static = ()> {
    inner: Rc<EffectInner<T>>,
}

impl<T: 'static> Effect<T> {
    /// Create an effect and run it once to establish its dependencies.
    pub fn new<F>(func: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        Self::with_options(func, EffectOptions::default())
    }

    /// Create an effect without running it.
    pub fn new_lazy<F>(func: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        Self::with_options(func, EffectOptions::lazy())
    }

    pub fn with_options<F>(func: F, options: EffectOptions) -> Self
    where
        F: Fn() -> T + 'static,
    {
        let effect = Self {
            inner: Rc::new(EffectInner {
                id: SubscriberId::new(),
                func: Box::new(func),
                deps: RefCell::new(SmallVec::new()),
                scheduler: options.scheduler,
                active: Cell::new(true),
                run_count: Cell::new(0),
            }),
        };
        tracing::debug!(effect = ?effect.id(), lazy = options.lazy, "effect created");

        if !options.lazy {
            drop(effect.run());
        }
        effect
    }

    /// Run the effect now and return its result.
    ///
    /// A stopped effect still runs its function, but without tracking.
    pub fn run(&self) -> T {
        self.inner.run()
    }

    /// Detach the effect from everything it depends on. Triggers no longer
    /// reach it.
    pub fn stop(&self) {
        self.inner.stop();
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.get()
    }

    pub fn id(&self) -> SubscriberId {
        self.inner.id
    }

    /// Get the number of times the effect has run under tracking.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.get()
    }

    /// Get the number of dependency sets the effect currently belongs to.
    pub fn dependency_count(&self) -> usize {
        self.inner
            .deps
            .borrow()
            .iter()
            .filter(|dep| dep.strong_count() > 0)
            .count()
    }

    /// A run handle, as a scheduler would receive it.
    pub fn job(&self) -> Job {
        Job::new(Rc::clone(&self.inner) as Rc<dyn Subscriber>)
    }

    pub fn downgrade(&self) -> WeakEffect<T> {
        WeakEffect {
            inner: Rc::downgrade(&self.inner),
        }
    }
}

impl<T: 'static> Clone for Effect<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: 'static> fmt::Debug for Effect<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id())
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("active", &self.is_active())
            .finish()
    }
}

/// A non-owning effect handle.
pub struct WeakEffect<T: 'static = ()> {
    inner: Weak<EffectInner<T>>,
}

impl<T: 'static> WeakEffect<T> {
    pub fn upgrade(&self) -> Option<Effect<T>> {
        self.inner.upgrade().map(|inner| Effect { inner })
    }
}

impl<T: 'static> Clone for WeakEffect<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

/// Register a computation and run it once.
pub fn effect<T, F>(func: F) -> Effect<T>
where
    T: 'static,
    F: Fn() -> T + 'static,
{
    Effect::new(func)
}

/// Register a computation with a scheduler and/or laziness.
pub fn effect_with<T, F>(func: F, options: EffectOptions) -> Effect<T>
where
    T: 'static,
    F: Fn() -> T + 'static,
{
    Effect::with_options(func, options)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
