use std::io;
use std::os::unix::io::RawFd;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crate::config::Config;
use crate::driver::{Driver, SharedInner};
use crate::handler::DatagramReader;
use crate::inner::Inner;
use crate::slot::SlotHandler;
use crate::socket::SocketHandle;
use crate::submission::{Submission, SharedSubmission};
use crate::sys::eventfd::EventFd;

/// Where a `Reactor` sits in its own lifecycle. Transitions only ever move
/// forward: `Constructed -> Running -> Terminated`.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum Lifecycle {
    Constructed,
    Running,
    Terminated,
}

/// A single-threaded, `epoll`-backed reactor that dispatches batches of incoming
/// UDP datagrams to user-supplied handlers.
///
/// Construction (`new`) only allocates the kernel objects (epoll instance,
/// wake-up eventfd) and validates configuration; no thread is started and nothing
/// is registered until `start`. Registering sockets before `start` is allowed —
/// they simply become visible to the loop thread the moment it begins polling.
pub struct Reactor {
    inner: SharedInner,
    submission: SharedSubmission,
    wakeup: Arc<EventFd>,
    config: Config,
    lifecycle: Mutex<Lifecycle>,
    join: Mutex<Option<JoinHandle<()>>>,
}

/// A capability to unregister a single previously-registered socket.
///
/// Cheap to clone-equivalent (it is just an fd plus a reactor handle); calling
/// `cancel` more than once, or after the reactor has already removed the
/// registration on its own (handler returned `Control::Remove`, or the reactor
/// shut down), is a harmless no-op.
///
/// Keyed by the socket's `RawFd`, looked up through the registry at cancel time —
/// not by the slot's table index. The slot table reuses freed indices on the next
/// `register`, so a `Cancel` that outlives its slot (self-removal, a prior
/// `cancel()` call, or shutdown) must never be able to resolve to whatever
/// unrelated registration later ends up at that same index; going through the
/// fd-keyed registry, which no longer has an entry once the original slot is
/// gone, rules that out.
pub struct Cancel {
    fd: RawFd,
    submission: SharedSubmission,
    inner: SharedInner,
}

impl Cancel {
    pub fn cancel(&self) -> io::Result<()> {
        let inner = self.inner.clone();
        let fd = self.fd;
        self.submission.push(Box::new(move || {
            if let Some(mut slot) = inner.lock().unwrap().unregister_by_fd(fd) {
                if let SlotHandler::Datagram(reader) = &mut slot.handler {
                    reader.on_remove();
                }
            }
        }))
    }
}

impl Reactor {
    pub fn new(config: Config) -> io::Result<Reactor> {
        config.validate()?;

        let inner = Arc::new(Mutex::new(Inner::new()?));
        let wakeup = Arc::new(EventFd::new()?);
        let submission = Arc::new(Submission::new(wakeup.clone()));

        Ok(Reactor {
            inner,
            submission,
            wakeup,
            config,
            lifecycle: Mutex::new(Lifecycle::Constructed),
            join: Mutex::new(None),
        })
    }

    /// Spawns the loop thread. Returns an error, and leaves the reactor
    /// `Constructed`, if called more than once.
    pub fn start(&self) -> io::Result<()> {
        let mut lifecycle = self.lifecycle.lock().unwrap();
        if *lifecycle != Lifecycle::Constructed {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "reactor has already been started",
            ));
        }

        let driver = Driver::new(
            self.inner.clone(),
            self.config.max_selected_events,
            self.config.max_datagrams_per_batch,
            self.config.datagram_buffer_len,
            self.wakeup.clone(),
            self.submission.clone(),
        )?;

        let handle = thread::Builder::new()
            .name(self.config.thread_name.clone())
            .spawn(move || driver.run())?;

        *self.join.lock().unwrap() = Some(handle);
        *lifecycle = Lifecycle::Running;
        Ok(())
    }

    /// Registers a socket for readability and attaches `reader` to it.
    ///
    /// Extracting the fd is the only part of this call that can fail synchronously
    /// (§7's "handle-extraction failure", surfaced here before anything is
    /// submitted). Before `start`, no loop thread exists yet to race with, so the
    /// actual `epoll_ctl(ADD)` runs directly against `Inner` on the calling thread.
    /// Once the reactor is running, registration instead runs as a task on the
    /// loop thread (the only thread allowed to touch epoll or the slot table from
    /// then on) — submitted and left to run asynchronously, exactly like any other
    /// `execute`d task, rather than having this call block on the result. Blocking
    /// here would deadlock a caller that registers from inside a task or a
    /// `DatagramReader` callback already running on the loop thread, since nothing
    /// else can drain the submission queue while that thread is blocked waiting on
    /// itself. A kernel registration failure on this path is therefore not
    /// returned to the caller; it is logged on the loop thread per §7, matching
    /// the spec's synchronous-extraction/asynchronous-kernel-failure split.
    ///
    /// Either way, the returned `Cancel` is keyed by `fd`, not by a slot index, so
    /// it never needs the registration to have actually completed yet.
    pub fn register<S: SocketHandle, R: DatagramReader + 'static>(
        &self,
        socket: &S,
        reader: R,
    ) -> io::Result<Cancel> {
        let fd = socket.extract_fd()?;

        if *self.lifecycle.lock().unwrap() == Lifecycle::Constructed {
            self.inner
                .lock()
                .unwrap()
                .register_slot(fd, SlotHandler::Datagram(Box::new(reader)))?;
        } else {
            let inner = self.inner.clone();
            self.submission.push(Box::new(move || {
                if let Err(err) =
                    inner.lock().unwrap().register_slot(fd, SlotHandler::Datagram(Box::new(reader)))
                {
                    log::warn!("epoll registration failed for fd {}: {}", fd, err);
                }
            }))?;
        }

        Ok(Cancel {
            fd,
            submission: self.submission.clone(),
            inner: self.inner.clone(),
        })
    }

    /// Submits `task` to run on the loop thread, ordered after every task already
    /// submitted (from any thread) and before any submitted after this call
    /// returns observes it.
    pub fn execute<F: FnOnce() + Send + 'static>(&self, task: F) -> io::Result<()> {
        self.submission.push(Box::new(task))
    }

    /// Requests shutdown. If the reactor was never started, this just marks it
    /// `Terminated` directly, since there is no loop thread to notify. If it was
    /// started, this flips the running flag and waits for the loop thread to
    /// observe it, run every handler's `on_remove`, and exit.
    pub fn close(&self) -> io::Result<()> {
        let mut lifecycle = self.lifecycle.lock().unwrap();
        match *lifecycle {
            Lifecycle::Terminated => return Ok(()),
            Lifecycle::Constructed => {
                *lifecycle = Lifecycle::Terminated;
                return Ok(());
            }
            Lifecycle::Running => {}
        }

        self.submission.stop()?;

        if let Some(handle) = self.join.lock().unwrap().take() {
            handle
                .join()
                .map_err(|_| io::Error::new(io::ErrorKind::Other, "loop thread panicked"))?;
        }

        *lifecycle = Lifecycle::Terminated;
        Ok(())
    }
}

impl Drop for Reactor {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
