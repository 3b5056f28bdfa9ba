use std::io::{self, Read, Write};
use std::os::unix::io::{AsRawFd, RawFd};

use super::fd::FileDesc;
use super::syscall;

const EFD_CLOEXEC: i32 = libc::EFD_CLOEXEC;
const EFD_NONBLOCK: i32 = libc::EFD_NONBLOCK;

/// A Linux `eventfd(2)`, used as the reactor's cross-thread wake-up handle.
///
/// `write` adds to the kernel-held 64-bit counter (coalescing concurrent writers for
/// free); `read` atomically fetches-and-zeroes it. Both are non-blocking, matching
/// the flags this is constructed with.
#[derive(Debug)]
pub struct EventFd {
    inner: FileDesc,
}

impl EventFd {
    pub fn new() -> io::Result<EventFd> {
        let flags = EFD_CLOEXEC | EFD_NONBLOCK;
        let fd = syscall!(eventfd(0, flags))?;
        Ok(EventFd {
            inner: FileDesc::new(fd),
        })
    }

    pub fn read(&self) -> io::Result<u64> {
        let mut buf = [0u8; 8];
        (&self.inner).read_exact(&mut buf)?;
        Ok(u64::from_ne_bytes(buf))
    }

    pub fn write(&self, val: u64) -> io::Result<()> {
        let buf: [u8; 8] = val.to_ne_bytes();
        (&self.inner).write_all(&buf)?;
        Ok(())
    }
}

impl Read for &EventFd {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (&self.inner).read(buf)
    }
}

impl Write for &EventFd {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (&self.inner).write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl AsRawFd for EventFd {
    fn as_raw_fd(&self) -> RawFd {
        self.inner.as_raw_fd()
    }
}

#[cfg(test)]
mod test {
    use super::EventFd;

    #[test]
    fn write_and_read() {
        let eventfd = EventFd::new().unwrap();
        eventfd.write(123).unwrap();
        let count = eventfd.read().unwrap();
        assert_eq!(123, count);
    }

    #[test]
    fn coalesces_concurrent_writes() {
        let eventfd = EventFd::new().unwrap();
        eventfd.write(1).unwrap();
        eventfd.write(1).unwrap();
        eventfd.write(1).unwrap();
        assert_eq!(3, eventfd.read().unwrap());
    }

    #[test]
    fn read_on_zero_counter_would_block() {
        let eventfd = EventFd::new().unwrap();
        let err = eventfd.read().unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::WouldBlock);
    }
}
