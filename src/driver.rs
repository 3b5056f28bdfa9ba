use std::os::unix::io::AsRawFd;
use std::sync::{Arc, Mutex};

use crate::handler::Control;
use crate::inner::Inner;
use crate::slot::SlotHandler;
use crate::submission::SharedSubmission;
use crate::sys::epoll::Events;
use crate::sys::eventfd::EventFd;
use crate::sys::recv::RecvPool;

pub(crate) type SharedInner = Arc<Mutex<Inner>>;

/// Everything the loop thread drives: the shared `Inner` (epoll/slots/registry),
/// the event buffer, the receive-buffer pool, the wake-up eventfd, and a handle to
/// the submission queue it drains each iteration.
///
/// `Inner` is reachable from foreign threads too (registration tasks lock it from
/// wherever `execute` happens to run the closure), but every closure that reaches
/// it is itself only ever run by this loop, so the lock is never contended in
/// practice — see the note on `Inner`.
pub(crate) struct Driver {
    inner: SharedInner,
    events: Events,
    recv_pool: RecvPool,
    wakeup: Arc<EventFd>,
    wakeup_slot: usize,
    submission: SharedSubmission,
}

impl Driver {
    pub fn new(
        inner: SharedInner,
        max_selected_events: usize,
        max_datagrams: usize,
        buf_len: usize,
        wakeup: Arc<EventFd>,
        submission: SharedSubmission,
    ) -> std::io::Result<Driver> {
        let wakeup_fd = wakeup.as_raw_fd();
        let wakeup_slot = inner
            .lock()
            .unwrap()
            .register_slot(wakeup_fd, SlotHandler::Wakeup)?;

        Ok(Driver {
            inner,
            events: Events::with_capacity(max_selected_events),
            recv_pool: RecvPool::new(max_datagrams, buf_len),
            wakeup,
            wakeup_slot,
            submission,
        })
    }

    /// Runs until `Submission::stop` is observed. Intended to be the body of the
    /// dedicated loop thread; never returns until shutdown.
    pub fn run(mut self) {
        loop {
            if !self.submission.is_running() {
                break;
            }

            // Indefinite timeout: `Submission::stop` always raises the wake-up
            // fd regardless of queue state, so there is never a need to poll
            // with a timeout just to notice shutdown.
            let wait_result = {
                let inner = self.inner.lock().unwrap();
                inner.epoll().wait(&mut self.events, None)
            };

            if let Err(err) = wait_result {
                log::warn!("epoll_wait failed: {}", err);
                continue;
            }

            for i in 0..self.events.len() {
                let index = self.events.token(i);

                if index == self.wakeup_slot {
                    self.drain_wakeup();
                    continue;
                }

                self.dispatch_datagram(index);
            }
        }

        self.cleanup();
    }

    /// Reads (and discards) the wake-up counter, then drains and runs whatever
    /// tasks the submission queue has accumulated. The counter read and the task
    /// drain are independent: a writer that calls `execute` between this read and
    /// the next `epoll_wait` simply causes another, harmless wake-up.
    fn drain_wakeup(&mut self) {
        let _ = self.wakeup.read();

        for task in self.submission.take_ready() {
            task();
        }
    }

    fn dispatch_datagram(&mut self, index: usize) {
        let fd = {
            let mut inner = self.inner.lock().unwrap();
            match inner.slot_mut(index) {
                Some(slot) => slot.fd,
                None => return,
            }
        };

        let n = match self.recv_pool.recv(fd) {
            Ok(n) => n,
            Err(err) => {
                log::warn!("recvmmsg on fd {} failed: {}", fd, err);
                return;
            }
        };

        for i in 0..n {
            let buf = self.recv_pool.buffer(i);

            let control = {
                let mut inner = self.inner.lock().unwrap();
                match inner.slot_mut(index) {
                    Some(slot) => match &mut slot.handler {
                        SlotHandler::Datagram(reader) => reader.on_read(buf),
                        SlotHandler::Wakeup => Control::Continue,
                    },
                    // The handler removed itself mid-batch; drop the remainder of
                    // this batch rather than dispatching to a dead slot.
                    None => break,
                }
            };

            if control == Control::Remove {
                self.remove_slot(index);
                break;
            }
        }
    }

    fn remove_slot(&mut self, index: usize) {
        let removed = self.inner.lock().unwrap().unregister_slot(index);
        if let Some(mut slot) = removed {
            if let SlotHandler::Datagram(reader) = &mut slot.handler {
                reader.on_remove();
            }
        }
    }

    fn cleanup(self) {
        let drained = self.inner.lock().unwrap().drain();
        for mut slot in drained {
            if let SlotHandler::Datagram(reader) = &mut slot.handler {
                reader.on_remove();
            }
        }
    }
}
