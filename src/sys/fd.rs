use std::io::{self, Read, Write};
use std::os::unix::io::{AsRawFd, FromRawFd, IntoRawFd, RawFd};

use super::syscall;

/// Owns a raw file descriptor and closes it on drop.
///
/// Used for the `eventfd` the wake-up handle is built on; epoll's own fd is closed
/// by `sys::epoll::Epoll`'s own `Drop` impl instead, since it additionally needs to
/// report close failures through the same `syscall!` convention used elsewhere.
#[derive(Debug)]
pub struct FileDesc(RawFd);

impl FileDesc {
    pub fn new(fd: RawFd) -> Self {
        FileDesc(fd)
    }

    pub fn raw(&self) -> RawFd {
        self.0
    }
}

impl FromRawFd for FileDesc {
    unsafe fn from_raw_fd(fd: RawFd) -> Self {
        FileDesc(fd)
    }
}

impl AsRawFd for FileDesc {
    fn as_raw_fd(&self) -> RawFd {
        self.0
    }
}

impl IntoRawFd for FileDesc {
    fn into_raw_fd(self) -> RawFd {
        let fd = self.0;
        std::mem::forget(self);
        fd
    }
}

impl Drop for FileDesc {
    fn drop(&mut self) {
        unsafe {
            let _ = libc::close(self.0);
        }
    }
}

impl Read for &FileDesc {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let ret = syscall!(read(
            self.raw(),
            buf.as_mut_ptr() as *mut libc::c_void,
            buf.len()
        ))?;
        Ok(ret as usize)
    }
}

impl Write for &FileDesc {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let ret = syscall!(write(
            self.raw(),
            buf.as_ptr() as *const libc::c_void,
            buf.len()
        ))?;
        Ok(ret as usize)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
