//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a reactive property is
//! read, we can register the current computation as a dependent.
//!
//! # Implementation
//!
//! We use a thread-local stack to track the currently executing computation.
//! When entering a reactive context (running an effect), we push the
//! subscriber onto the stack. When the computation completes, we pop it.
//!
//! A stack rather than a single slot is what makes nested effects work: an
//! effect that registers another effect during its run must get its own
//! frame back once the inner effect finishes, so that reads after the inner
//! effect are attributed to the outer one.
//!
//! Tracking can additionally be paused (see [`pause_tracking`]). Entering a
//! context always resumes tracking for the duration of the run, so an effect
//! re-run synchronously from inside a paused section still records its
//! dependencies.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::subscriber::{Subscriber, SubscriberId};

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<Rc<dyn Subscriber>>> = RefCell::new(Vec::new());
    static SHOULD_TRACK: Cell<bool> = const { Cell::new(true) };
}

/// Guard that pops the context when dropped.
///
/// This ensures the context stack is properly maintained even if the
/// computation panics.
pub struct ReactiveContext {
    subscriber_id: SubscriberId,
    resumed_from: bool,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given subscriber.
    ///
    /// While this context is active, reactive reads register the subscriber
    /// as a dependent. The context is exited when the returned guard drops.
    pub(crate) fn enter(subscriber: Rc<dyn Subscriber>) -> Self {
        let subscriber_id = subscriber.id();
        CONTEXT_STACK.with(|stack| stack.borrow_mut().push(subscriber));
        let resumed_from = SHOULD_TRACK.with(|flag| flag.replace(true));

        Self {
            subscriber_id,
            resumed_from,
        }
    }

    /// Check if there is an active reactive context.
    pub fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| !stack.borrow().is_empty())
    }

    /// Whether a read right now would be recorded as a dependency.
    pub fn is_tracking() -> bool {
        SHOULD_TRACK.with(Cell::get) && Self::is_active()
    }

    /// Get the current subscriber ID, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().map(|s| s.id()))
    }

    /// The currently running computation.
    pub(crate) fn current() -> Option<Rc<dyn Subscriber>> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().cloned())
    }

    /// Depth of the context stack.
    pub fn depth() -> usize {
        CONTEXT_STACK.with(|stack| stack.borrow().len())
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        let popped = CONTEXT_STACK.with(|stack| stack.borrow_mut().pop());
        SHOULD_TRACK.with(|flag| flag.set(self.resumed_from));

        // Verify we're popping the right context.
        if let Some(entry) = popped {
            debug_assert_eq!(
                entry.id(),
                self.subscriber_id,
                "ReactiveContext mismatch: expected {:?}, got {:?}",
                self.subscriber_id,
                entry.id()
            );
        }
    }
}

/// Guard returned by [`pause_tracking`]; restores the previous tracking
/// state when dropped, so pauses nest.
#[must_use = "tracking resumes as soon as the guard is dropped"]
pub struct PauseTracking {
    previous: bool,
}

/// Suspend dependency tracking until the returned guard is dropped.
pub fn pause_tracking() -> PauseTracking {
    PauseTracking {
        previous: SHOULD_TRACK.with(|flag| flag.replace(false)),
    }
}

impl Drop for PauseTracking {
    fn drop(&mut self) {
        SHOULD_TRACK.with(|flag| flag.set(self.previous));
    }
}

/// Run `f` without recording any dependencies.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let _pause = pause_tracking();
    f()
}
