use std::os::unix::io::{AsRawFd, RawFd};
use std::time::Duration;
use std::{cmp, io};

use super::syscall;

/// A raw epoll instance.
///
/// Registrations are keyed by a 64-bit user-data word; the reactor stores the slot
/// index there (see `crate::slot`). `Epoll` itself knows nothing about slots — it
/// is a narrow, level-triggered-only wrapper; only readable interest is ever
/// requested here, so there is no `Ready`/`EpollOpt` style abstraction layer.
pub struct Epoll {
    epfd: RawFd,
}

impl Epoll {
    pub fn new() -> io::Result<Epoll> {
        let epfd = syscall!(epoll_create1(libc::EPOLL_CLOEXEC))?;
        Ok(Epoll { epfd })
    }

    /// Waits for readiness events. `timeout = None` blocks indefinitely.
    ///
    /// An `EINTR` from the kernel is treated as a zero-event batch: `events` keeps
    /// whatever length it already had set to zero by the previous call, the loop
    /// driver just sees nothing to dispatch and re-enters `wait` on its next
    /// iteration.
    pub fn wait(&self, events: &mut Events, timeout: Option<Duration>) -> io::Result<()> {
        let timeout_ms = timeout
            .map(|to| cmp::min(to.as_millis(), libc::c_int::MAX as u128) as libc::c_int)
            .unwrap_or(-1);

        let cnt = match syscall!(epoll_wait(
            self.epfd,
            events.events.as_mut_ptr(),
            events.events.capacity() as i32,
            timeout_ms,
        )) {
            Ok(cnt) => cnt,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                unsafe { events.events.set_len(0) };
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        unsafe { events.events.set_len(cnt as usize) };
        Ok(())
    }

    pub fn add(&self, fd: RawFd, token: usize) -> io::Result<()> {
        let mut info = libc::epoll_event {
            events: libc::EPOLLIN as u32,
            u64: token as u64,
        };
        syscall!(epoll_ctl(self.epfd, libc::EPOLL_CTL_ADD, fd, &mut info))?;
        Ok(())
    }

    pub fn delete(&self, fd: RawFd) -> io::Result<()> {
        // The kernel ignores `event` for `EPOLL_CTL_DEL` on modern Linux, but older
        // kernels required a non-null pointer; pass a zeroed one for portability.
        let mut info = libc::epoll_event { events: 0, u64: 0 };
        syscall!(epoll_ctl(self.epfd, libc::EPOLL_CTL_DEL, fd, &mut info))?;
        Ok(())
    }
}

impl AsRawFd for Epoll {
    fn as_raw_fd(&self) -> RawFd {
        self.epfd
    }
}

impl Drop for Epoll {
    fn drop(&mut self) {
        unsafe {
            let _ = libc::close(self.epfd);
        }
    }
}

/// The raw `epoll_wait` output buffer, reused across calls to `wait` to avoid
/// reallocating on every iteration of the loop.
pub struct Events {
    events: Vec<libc::epoll_event>,
}

impl Events {
    pub fn with_capacity(capacity: usize) -> Events {
        let mut events = Vec::with_capacity(capacity);
        unsafe { events.set_len(0) };
        Events { events }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// The slot index carried in event `idx`'s user-data word.
    pub fn token(&self, idx: usize) -> usize {
        self.events[idx].u64 as usize
    }
}
