use std::io;
use std::os::unix::io::{AsRawFd, RawFd};

/// Anything that can hand the reactor a raw, already-bound UDP socket fd to
/// register. Implemented for every `AsRawFd` type so callers can register a
/// `std::net::UdpSocket` directly; a dedicated trait (rather than requiring
/// `AsRawFd` on `register` itself) leaves room for a future implementor that wants
/// to do extra bookkeeping — or its own fallible lookup — when its fd is
/// extracted. Fallible because a higher-level, not-yet-bound socket wrapper may
/// simply not have an fd to hand back yet; that failure is surfaced to the
/// caller of `register` before anything is submitted to the loop thread.
pub trait SocketHandle {
    fn extract_fd(&self) -> io::Result<RawFd>;
}

impl<T: AsRawFd> SocketHandle for T {
    fn extract_fd(&self) -> io::Result<RawFd> {
        Ok(self.as_raw_fd())
    }
}
