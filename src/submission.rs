use std::io;
use std::sync::{Arc, Mutex};

use crate::sys::eventfd::EventFd;

/// A unit of work submitted to the loop thread: either a user closure handed in
/// through `execute`, or a registration/unregistration request. Boxed so the queue
/// can hold a heterogeneous mix without generics leaking into public API.
pub(crate) type Task = Box<dyn FnOnce() + Send>;

/// Abstracts "make the loop thread notice there is new work" so the coalescing
/// contract can be exercised without a real kernel `eventfd`.
///
/// The only implementations are `EventFd` (used by the real reactor) and, under
/// `#[cfg(test)]`, a plain counter — both just need "N calls to `notify` before the
/// loop thread next observes state collapse into a single wake-up", which is exactly
/// what `eventfd`'s counter semantics give for free.
pub(crate) trait Notifier: Send + Sync {
    fn notify(&self) -> io::Result<()>;
}

impl Notifier for EventFd {
    fn notify(&self) -> io::Result<()> {
        self.write(1)
    }
}

impl Notifier for Arc<EventFd> {
    fn notify(&self) -> io::Result<()> {
        self.write(1)
    }
}

struct QueueState {
    tasks: Vec<Task>,
    running: bool,
}

/// The cross-thread submission queue backing `execute` and `close`.
///
/// Foreign threads only ever touch this struct (never the loop's private state
/// directly): they push a task and notify, or flip `running` and notify. The loop
/// thread swaps the live task buffer out for an empty scratch buffer under the
/// mutex, then runs the drained tasks with the mutex released, so a task that
/// itself calls `execute` does not deadlock against its own submission.
pub(crate) struct Submission<N: Notifier = Arc<EventFd>> {
    state: Mutex<QueueState>,
    notifier: N,
}

impl Submission<Arc<EventFd>> {
    pub fn new(notifier: Arc<EventFd>) -> Submission<Arc<EventFd>> {
        Submission {
            state: Mutex::new(QueueState {
                tasks: Vec::new(),
                running: true,
            }),
            notifier,
        }
    }
}

impl<N: Notifier> Submission<N> {
    #[cfg(test)]
    pub fn with_notifier(notifier: N) -> Submission<N> {
        Submission {
            state: Mutex::new(QueueState {
                tasks: Vec::new(),
                running: true,
            }),
            notifier,
        }
    }

    /// Enqueues `task` unless the reactor has already been asked to stop, in which
    /// case it is dropped silently under the same lock. Notifies the loop thread
    /// only when this push transitioned the queue from empty to non-empty — the
    /// wake-up handle's own counter already coalesces anything beyond that, so
    /// writing on every push would just be redundant syscalls, and the spec's
    /// "exactly one notification per empty-to-non-empty transition" property
    /// depends on not doing so.
    pub fn push(&self, task: Task) -> io::Result<()> {
        let should_notify = {
            let mut state = self.state.lock().unwrap();
            if !state.running {
                return Ok(());
            }
            let was_empty = state.tasks.is_empty();
            state.tasks.push(task);
            was_empty
        };

        if should_notify {
            self.notifier.notify()?;
        }
        Ok(())
    }

    /// Flips the running flag to false and notifies. Equivalent to, and simpler
    /// than, routing a dedicated "stop" closure through `push`: the loop's top-of-
    /// iteration check reads the same flag either way.
    pub fn stop(&self) -> io::Result<()> {
        {
            let mut state = self.state.lock().unwrap();
            state.running = false;
        }
        self.notifier.notify()
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().unwrap().running
    }

    /// Swaps the live task buffer for an empty one and returns what was drained,
    /// releasing the lock before the caller runs any of them.
    pub fn take_ready(&self) -> Vec<Task> {
        let mut state = self.state.lock().unwrap();
        std::mem::take(&mut state.tasks)
    }
}

pub(crate) type SharedSubmission = Arc<Submission<Arc<EventFd>>>;
