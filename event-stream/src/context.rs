//! Single delivery context
//!
//! All state owned by a pipeline must be touched from one place. A
//! `DeliveryContext` is bound to the thread that created it (normally the
//! UI/main thread) and runs jobs one at a time:
//!
//! - dispatched on the owning thread: the job runs right away, or right after
//!   the job currently running if we are already inside one
//! - dispatched from any other thread: the job is queued and runs the next
//!   time the owner calls [`DeliveryContext::drain`]
//!
//! Nothing here blocks. The host's own run loop decides when to drain.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use crossbeam::channel::{self, Receiver, Sender};
use tracing::{trace, warn};

/// A unit of work run on the delivery context
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Errors returned when handing work to a context
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// The context was closed and accepts no more work
    #[error("delivery context '{0}' is closed")]
    Closed(String),
}

struct ContextInner {
    name: String,
    owner: ThreadId,
    tx: Sender<Job>,
    rx: Receiver<Job>,
    draining: AtomicBool,
    closed: AtomicBool,
}

/// Resets the draining flag however the drain loop exits
struct DrainGuard<'a> {
    draining: &'a AtomicBool,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.draining.store(false, Ordering::Release);
    }
}

/// Serial executor bound to its creating thread
///
/// Cloning yields another handle to the same context; handles are `Send` and
/// can be given to code that receives callbacks on other threads.
#[derive(Clone)]
pub struct DeliveryContext {
    inner: Arc<ContextInner>,
}

impl DeliveryContext {
    /// Create a context owned by the current thread
    pub fn new() -> Self {
        Self::named("main")
    }

    /// Create a named context owned by the current thread
    pub fn named(name: impl Into<String>) -> Self {
        let (tx, rx) = channel::unbounded();
        Self {
            inner: Arc::new(ContextInner {
                name: name.into(),
                owner: thread::current().id(),
                tx,
                rx,
                draining: AtomicBool::new(false),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Name given at construction
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Whether the calling thread owns this context
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.inner.owner
    }

    /// Hand `job` to the context
    ///
    /// On the owning thread this also drains, so the job has run by the time
    /// `dispatch` returns unless another job is still on the stack.
    pub fn dispatch<F>(&self, job: F) -> Result<(), DispatchError>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.is_closed() {
            return Err(DispatchError::Closed(self.inner.name.clone()));
        }

        self.inner
            .tx
            .send(Box::new(job))
            .map_err(|_| DispatchError::Closed(self.inner.name.clone()))?;

        if self.is_current() {
            self.drain();
        } else {
            trace!(context = %self.inner.name, "job queued from another thread");
        }

        Ok(())
    }

    /// Run every queued job, returning how many ran
    ///
    /// Must be called from the owning thread. Calling it from inside a job is
    /// a no-op: the outer drain picks up whatever was queued.
    pub fn drain(&self) -> usize {
        if !self.is_current() {
            warn!(context = %self.inner.name, "drain called off the owning thread, ignoring");
            return 0;
        }

        if self.inner.draining.swap(true, Ordering::AcqRel) {
            return 0;
        }
        let _guard = DrainGuard {
            draining: &self.inner.draining,
        };

        let mut ran = 0;
        while !self.is_closed() {
            match self.inner.rx.try_recv() {
                Ok(job) => {
                    job();
                    ran += 1;
                }
                Err(_) => break,
            }
        }
        ran
    }

    /// Number of jobs waiting to run
    pub fn pending(&self) -> usize {
        self.inner.rx.len()
    }

    /// Reject further work and discard anything still queued
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let discarded = self.inner.rx.try_iter().count();
        trace!(context = %self.inner.name, discarded, "delivery context closed");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

impl Default for DeliveryContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DeliveryContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeliveryContext")
            .field("name", &self.inner.name)
            .field("pending", &self.pending())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_dispatch_on_owner_runs_immediately() {
        let context = DeliveryContext::new();
        let ran = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&ran);
        context.dispatch(move || flag.store(true, Ordering::SeqCst)).unwrap();

        assert!(ran.load(Ordering::SeqCst));
        assert_eq!(context.pending(), 0);
    }

    #[test]
    fn test_nested_dispatch_runs_after_current_job() {
        let context = DeliveryContext::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let nested_context = context.clone();
        let log = Arc::clone(&order);
        context
            .dispatch(move || {
                log.lock().push("outer-start");
                let inner_log = Arc::clone(&log);
                nested_context
                    .dispatch(move || inner_log.lock().push("inner"))
                    .unwrap();
                log.lock().push("outer-end");
            })
            .unwrap();

        assert_eq!(*order.lock(), vec!["outer-start", "outer-end", "inner"]);
    }

    #[test]
    fn test_off_thread_dispatch_waits_for_drain() {
        let context = DeliveryContext::named("ui");
        let ran = Arc::new(AtomicBool::new(false));

        let remote = context.clone();
        let flag = Arc::clone(&ran);
        thread::spawn(move || {
            assert!(!remote.is_current());
            remote.dispatch(move || flag.store(true, Ordering::SeqCst)).unwrap();
        })
        .join()
        .unwrap();

        assert!(!ran.load(Ordering::SeqCst));
        assert_eq!(context.pending(), 1);

        assert_eq!(context.drain(), 1);
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_drain_off_thread_is_ignored() {
        let context = DeliveryContext::new();
        let remote = context.clone();

        let ran = thread::spawn(move || {
            remote.dispatch(|| {}).unwrap();
            remote.drain()
        })
        .join()
        .unwrap();

        assert_eq!(ran, 0);
        assert_eq!(context.drain(), 1);
    }

    #[test]
    fn test_closed_context_rejects_work() {
        let context = DeliveryContext::named("closing");
        let remote = context.clone();
        thread::spawn(move || remote.dispatch(|| {}).unwrap())
            .join()
            .unwrap();

        context.close();
        assert_eq!(context.pending(), 0);
        assert_eq!(
            context.dispatch(|| {}),
            Err(DispatchError::Closed("closing".to_string()))
        );
    }
}
