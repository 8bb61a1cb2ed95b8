//! Job Queue
//!
//! A batching scheduler for effects. Instead of re-running on every write, an
//! effect created with [`queue_job`] as its scheduler is queued, and all
//! queued effects run together on the next [`flush`].
//!
//! # Algorithm
//!
//! 1. A triggered effect's [`Job`] is queued keyed by its subscriber ID. A
//!    job that is already queued is not queued again, so an effect triggered
//!    N times before a flush runs once.
//! 2. Post-flush callbacks (deferred watcher jobs) sit in a separate FIFO.
//! 3. `flush` drains queued jobs first, then post-flush callbacks, and keeps
//!    going until both are empty, since running either may queue more work.
//!
//! The queue is thread-local. Hosts with an event loop call `flush` once per
//! turn, which plays the role of a microtask checkpoint.

use std::cell::RefCell;
use std::collections::VecDeque;

use indexmap::IndexMap;

use super::subscriber::{Job, SubscriberId};

type PostJob = Box<dyn FnOnce()>;

/// Pending work for one thread.
#[derive(Default)]
struct JobQueue {
    /// Queued effect runs, in first-queued order.
    jobs: IndexMap<SubscriberId, Job>,

    /// Callbacks to run after the queued jobs.
    post: VecDeque<PostJob>,

    /// Set while a flush is draining the queue.
    flushing: bool,
}

impl JobQueue {
    fn push_job(&mut self, job: Job) -> bool {
        if self.jobs.contains_key(&job.id()) {
            return false;
        }
        self.jobs.insert(job.id(), job);
        true
    }

    fn next_job(&mut self) -> Option<Job> {
        self.jobs.shift_remove_index(0).map(|(_, job)| job)
    }
}

thread_local! {
    static QUEUE: RefCell<JobQueue> = RefCell::new(JobQueue::default());
}

/// Queue an effect run for the next flush.
///
/// Returns `false` if the same effect was already waiting. Usable directly
/// as an effect scheduler: `EffectOptions::default().with_scheduler(|job| {
/// queue_job(job); })`.
pub fn queue_job(job: Job) -> bool {
    let queued = QUEUE.with(|queue| queue.borrow_mut().push_job(job));
    tracing::trace!(queued, "queue job");
    queued
}

/// Queue a callback to run after the pending jobs of the next flush.
pub fn queue_post_flush(callback: impl FnOnce() + 'static) {
    QUEUE.with(|queue| queue.borrow_mut().post.push_back(Box::new(callback)));
}

/// Whether any job or post-flush callback is waiting.
pub fn has_pending_jobs() -> bool {
    QUEUE.with(|queue| {
        let queue = queue.borrow();
        !queue.jobs.is_empty() || !queue.post.is_empty()
    })
}

/// Resets the flushing flag even if a job panics.
struct FlushGuard;

impl Drop for FlushGuard {
    fn drop(&mut self) {
        let _ = QUEUE.try_with(|queue| {
            if let Ok(mut queue) = queue.try_borrow_mut() {
                queue.flushing = false;
            }
        });
    }
}

/// Run every queued job, then every post-flush callback, until nothing is
/// left. Returns how many were run.
///
/// Calling `flush` from inside a flush is a no-op; the outer flush picks up
/// whatever was queued.
pub fn flush() -> usize {
    let entered = QUEUE.with(|queue| {
        let mut queue = queue.borrow_mut();
        !std::mem::replace(&mut queue.flushing, true)
    });
    if !entered {
        return 0;
    }
    let _guard = FlushGuard;

    let mut ran = 0;
    loop {
        if let Some(job) = QUEUE.with(|queue| queue.borrow_mut().next_job()) {
            job.run();
            ran += 1;
            continue;
        }
        match QUEUE.with(|queue| queue.borrow_mut().post.pop_front()) {
            Some(callback) => {
                callback();
                ran += 1;
            }
            None => break,
        }
    }

    if ran > 0 {
        tracing::trace!(ran, "flushed job queue");
    }
    ran
}

/// Run only the post-flush callbacks. Returns how many were run.
pub fn flush_post_jobs() -> usize {
    let mut ran = 0;
    while let Some(callback) = QUEUE.with(|queue| queue.borrow_mut().post.pop_front()) {
        callback();
        ran += 1;
    }
    ran
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{effect_with, track, trigger, EffectOptions, SourceId, SourceKind, TriggerKind};
    use std::cell::Cell;
    use std::rc::Rc;

    fn queued() -> EffectOptions {
        EffectOptions::default().with_scheduler(|job| {
            queue_job(job);
        })
    }

    #[test]
    fn repeated_triggers_run_once_per_flush() {
        let source = SourceId::new();
        let effect = effect_with(move || track(source, "x"), queued());
        assert_eq!(effect.run_count(), 1);

        for _ in 0..5 {
            trigger(source, SourceKind::Object, "x", TriggerKind::Set, None);
        }
        assert_eq!(effect.run_count(), 1);
        assert!(has_pending_jobs());

        assert_eq!(flush(), 1);
        assert_eq!(effect.run_count(), 2);
        assert!(!has_pending_jobs());
        assert_eq!(flush(), 0);
    }

    #[test]
    fn post_callbacks_run_after_jobs() {
        let source = SourceId::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        let _effect = effect_with(
            {
                let order = order.clone();
                move || {
                    track(source, "x");
                    order.borrow_mut().push("job");
                }
            },
            queued(),
        );
        order.borrow_mut().clear();

        queue_post_flush({
            let order = order.clone();
            move || order.borrow_mut().push("post")
        });
        trigger(source, SourceKind::Object, "x", TriggerKind::Set, None);

        flush();
        assert_eq!(*order.borrow(), vec!["job", "post"]);
    }

    #[test]
    fn nested_flush_is_a_no_op() {
        let inner = Rc::new(Cell::new(usize::MAX));
        queue_post_flush({
            let inner = inner.clone();
            move || inner.set(flush())
        });

        assert_eq!(flush(), 1);
        assert_eq!(inner.get(), 0);
    }

    #[test]
    fn flush_post_jobs_leaves_queued_jobs() {
        let source = SourceId::new();
        let effect = effect_with(move || track(source, "x"), queued());
        trigger(source, SourceKind::Object, "x", TriggerKind::Set, None);

        let ran = Rc::new(Cell::new(false));
        queue_post_flush({
            let ran = ran.clone();
            move || ran.set(true)
        });

        assert_eq!(flush_post_jobs(), 1);
        assert!(ran.get());
        assert_eq!(effect.run_count(), 1);

        flush();
        assert_eq!(effect.run_count(), 2);
    }
}
