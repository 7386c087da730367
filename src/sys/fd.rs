//! Descriptor operations.
//!
//! [`Descriptor`] is a borrowed raw file descriptor. It never closes what it
//! points at; ownership stays with the `File`/`OwnedFd` it was taken from.

use crate::port::error::{PortError, PortResult};
use libc::{c_int, c_ulong};
use std::io;
use std::os::unix::io::{AsRawFd, RawFd};

/// Turn a `-1`-on-error return into a result, capturing errno.
pub(crate) fn cvt(op: &'static str, ret: c_int) -> PortResult<c_int> {
    if ret < 0 {
        Err(PortError::last_os_error(op))
    } else {
        Ok(ret)
    }
}

/// Like [`cvt`], but transparently retries calls interrupted by a signal.
pub(crate) fn cvt_r<F>(op: &'static str, mut call: F) -> PortResult<c_int>
where
    F: FnMut() -> c_int,
{
    loop {
        let ret = call();
        if ret >= 0 {
            return Ok(ret);
        }
        let source = io::Error::last_os_error();
        if source.raw_os_error() != Some(libc::EINTR) {
            return Err(PortError::Syscall { op, source });
        }
    }
}

fn cvt_len<F>(op: &'static str, mut call: F) -> PortResult<usize>
where
    F: FnMut() -> libc::ssize_t,
{
    loop {
        let ret = call();
        if ret >= 0 {
            return Ok(ret as usize);
        }
        let source = io::Error::last_os_error();
        if source.raw_os_error() != Some(libc::EINTR) {
            return Err(PortError::Syscall { op, source });
        }
    }
}

/// True when a non-blocking call failed only because it would have blocked.
pub fn would_block(err: &PortError) -> bool {
    matches!(err.errno(), Some(e) if e == libc::EAGAIN || e == libc::EWOULDBLOCK)
}

/// A raw descriptor with the handful of operations the tty engine needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Descriptor(RawFd);

impl Descriptor {
    pub fn new(fd: RawFd) -> Self {
        Self(fd)
    }

    /// Borrow the descriptor of anything that exposes one.
    pub fn of<T: AsRawFd + ?Sized>(io: &T) -> Self {
        Self(io.as_raw_fd())
    }

    pub fn raw(self) -> RawFd {
        self.0
    }

    /// Generic `fcntl(2)` with an integer argument.
    pub fn fcntl(self, op: &'static str, cmd: c_int, arg: c_int) -> PortResult<c_int> {
        cvt(op, unsafe { libc::fcntl(self.0, cmd, arg) })
    }

    /// Current file status flags (`F_GETFL`).
    pub fn status_flags(self) -> PortResult<c_int> {
        self.fcntl("fcntl(F_GETFL)", libc::F_GETFL, 0)
    }

    pub fn is_nonblocking(self) -> PortResult<bool> {
        Ok(self.status_flags()? & libc::O_NONBLOCK != 0)
    }

    /// Toggle `O_NONBLOCK` with a read-modify-write of the status flags.
    pub fn set_nonblocking(self, on: bool) -> PortResult<()> {
        let flags = self.status_flags()?;
        let updated = if on {
            flags | libc::O_NONBLOCK
        } else {
            flags & !libc::O_NONBLOCK
        };
        if updated != flags {
            self.fcntl("fcntl(F_SETFL)", libc::F_SETFL, updated)?;
        }
        Ok(())
    }

    /// Mark the descriptor close-on-exec.
    pub fn set_cloexec(self) -> PortResult<()> {
        let flags = self.fcntl("fcntl(F_GETFD)", libc::F_GETFD, 0)?;
        self.fcntl("fcntl(F_SETFD)", libc::F_SETFD, flags | libc::FD_CLOEXEC)?;
        Ok(())
    }

    /// Take a non-blocking exclusive advisory lock.
    pub fn lock_exclusive(self) -> PortResult<()> {
        cvt_r("flock(LOCK_EX|LOCK_NB)", || unsafe {
            libc::flock(self.0, libc::LOCK_EX | libc::LOCK_NB)
        })?;
        Ok(())
    }

    pub fn unlock(self) -> PortResult<()> {
        cvt_r("flock(LOCK_UN)", || unsafe { libc::flock(self.0, libc::LOCK_UN) })?;
        Ok(())
    }

    /// Generic `ioctl(2)` taking a pointer argument.
    ///
    /// # Safety
    ///
    /// `arg` must point at a value whose layout matches what the kernel
    /// reads or writes for `request`.
    pub unsafe fn ioctl<T>(self, op: &'static str, request: c_ulong, arg: *mut T) -> PortResult<c_int> {
        cvt_r(op, || libc::ioctl(self.0, request as _, arg))
    }

    /// One `read(2)`, retried on `EINTR`.
    pub fn read(self, buf: &mut [u8]) -> PortResult<usize> {
        cvt_len("read", || unsafe {
            libc::read(self.0, buf.as_mut_ptr().cast(), buf.len())
        })
    }

    /// One `write(2)`, retried on `EINTR`.
    pub fn write(self, data: &[u8]) -> PortResult<usize> {
        cvt_len("write", || unsafe {
            libc::write(self.0, data.as_ptr().cast(), data.len())
        })
    }
}

impl AsRawFd for Descriptor {
    fn as_raw_fd(&self) -> RawFd {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    #[test]
    fn test_nonblocking_round_trip() {
        let file = tempfile::tempfile().unwrap();
        let fd = Descriptor::of(&file);

        fd.set_nonblocking(true).unwrap();
        assert!(fd.is_nonblocking().unwrap());

        fd.set_nonblocking(false).unwrap();
        assert!(!fd.is_nonblocking().unwrap());
    }

    #[test]
    fn test_exclusive_lock_conflicts_across_open_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lockme");
        let first = File::create(&path).unwrap();
        let second = File::open(&path).unwrap();

        Descriptor::of(&first).lock_exclusive().unwrap();
        let err = Descriptor::of(&second).lock_exclusive().unwrap_err();
        assert!(would_block(&err), "unexpected error: {err}");

        Descriptor::of(&first).unlock().unwrap();
        Descriptor::of(&second).lock_exclusive().unwrap();
    }

    #[test]
    fn test_ioctl_counts_pipe_bytes() {
        let mut fds = [0 as c_int; 2];
        assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
        let (reader, writer) = (Descriptor::new(fds[0]), Descriptor::new(fds[1]));
        assert_eq!(writer.write(b"queued").unwrap(), 6);

        let mut pending: c_int = 0;
        unsafe { reader.ioctl("ioctl(FIONREAD)", libc::FIONREAD as c_ulong, &mut pending) }.unwrap();
        assert_eq!(pending, 6);

        let mut bogus: c_int = 0;
        let err = unsafe { reader.ioctl("ioctl(TIOCMGET)", libc::TIOCMGET as c_ulong, &mut bogus) }
            .unwrap_err();
        assert_eq!(err.errno(), Some(libc::ENOTTY));
        unsafe {
            libc::close(fds[0]);
            libc::close(fds[1]);
        }
    }

    #[test]
    fn test_bad_descriptor_reports_errno() {
        let err = Descriptor::new(-1).status_flags().unwrap_err();
        assert_eq!(err.errno(), Some(libc::EBADF));
    }
}
