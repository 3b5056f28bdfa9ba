use std::os::unix::io::RawFd;
use std::{io, mem, ptr};

use super::syscall;

/// The receive-buffer pool: `max_datagrams` preallocated buffers of `buf_len` bytes
/// each, wired into a matching array of `iovec`/`mmsghdr` descriptors consumed by a
/// single `recvmmsg(2)` call per dispatch.
///
/// The buffers and their descriptors are built once at construction and never
/// resized afterwards, so the raw pointers embedded in `iovecs`/`msgs` stay valid for
/// the pool's entire lifetime, including across the pool being moved (e.g. into the
/// loop thread's closure): moving a `Vec<u8>` relocates its three-word header, not
/// the heap allocation the header points at.
pub struct RecvPool {
    bufs: Vec<Vec<u8>>,
    // Kept alive only to back `msgs[i].msg_hdr.msg_iov`; never read directly.
    _iovecs: Vec<libc::iovec>,
    msgs: Vec<libc::mmsghdr>,
    buf_len: usize,
}

impl RecvPool {
    pub fn new(max_datagrams: usize, buf_len: usize) -> RecvPool {
        let mut bufs: Vec<Vec<u8>> = (0..max_datagrams).map(|_| vec![0u8; buf_len]).collect();

        let mut iovecs: Vec<libc::iovec> = bufs
            .iter_mut()
            .map(|b| libc::iovec {
                iov_base: b.as_mut_ptr() as *mut libc::c_void,
                iov_len: buf_len,
            })
            .collect();

        let msgs: Vec<libc::mmsghdr> = iovecs
            .iter_mut()
            .map(|iov| {
                let mut msg: libc::mmsghdr = unsafe { mem::zeroed() };
                msg.msg_hdr.msg_iov = iov as *mut libc::iovec;
                msg.msg_hdr.msg_iovlen = 1;
                msg
            })
            .collect();

        RecvPool {
            bufs,
            _iovecs: iovecs,
            msgs,
            buf_len,
        }
    }

    pub fn capacity(&self) -> usize {
        self.msgs.len()
    }

    /// Issues one `recvmmsg` for up to `capacity()` datagrams. Returns the number of
    /// datagrams actually received (`k >= 0`); a negative return from the kernel is
    /// surfaced as `Err` so the caller can log it and treat it as `k == 0`.
    pub fn recv(&mut self, fd: RawFd) -> io::Result<usize> {
        let vlen = self.msgs.len() as u32;
        let n = syscall!(recvmmsg(
            fd,
            self.msgs.as_mut_ptr(),
            vlen,
            0,
            ptr::null_mut()
        ))?;
        Ok(n as usize)
    }

    /// The `i`-th datagram's bytes from the most recent `recv` call. Valid only
    /// until the next call to `recv`.
    pub fn buffer(&self, i: usize) -> &[u8] {
        let len = (self.msgs[i].msg_len as usize).min(self.buf_len);
        &self.bufs[i][..len]
    }
}
