//! Subscriber types for the reactive system.
//!
//! A subscriber is any computation that depends on reactive values: plain
//! effects, the effect behind a computed value, or the effect behind a
//! watcher. Dependency sets store subscribers type-erased, so a subscriber is
//! reached through the [`Subscriber`] trait and handed to schedulers as a
//! [`Job`].

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::runtime::Dep;

/// Unique identifier for a subscriber.
///
/// Each subscriber gets a unique ID when created. The ID keys subscriber
/// sets and the job queue, which is how duplicate subscriptions and
/// duplicate queued runs are avoided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// A computation as seen by the dependency store.
pub(crate) trait Subscriber {
    fn id(&self) -> SubscriberId;

    /// Remember a dependency set this subscriber was added to, so it can
    /// remove itself before its next run.
    fn record_dep(&self, dep: &Rc<Dep>);

    /// Stopped subscribers neither track nor get notified.
    fn is_active(&self) -> bool;

    /// The caller-supplied scheduler, if any.
    fn scheduler(&self) -> Option<super::Scheduler>;

    /// Run the computation, discarding its result.
    fn run_erased(self: Rc<Self>);
}

/// A run handle for a triggered computation.
///
/// Schedulers receive a `Job` instead of the computation being run
/// immediately. Running the job re-runs the computation under tracking.
#[derive(Clone)]
pub struct Job {
    subscriber: Rc<dyn Subscriber>,
}

impl Job {
    pub(crate) fn new(subscriber: Rc<dyn Subscriber>) -> Self {
        Self { subscriber }
    }

    /// The ID of the computation this job runs.
    pub fn id(&self) -> SubscriberId {
        self.subscriber.id()
    }

    /// Run the computation now.
    pub fn run(&self) {
        Rc::clone(&self.subscriber).run_erased();
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job").field("id", &self.id()).finish()
    }
}
