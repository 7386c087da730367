//! Self-pipe cancellation token.
//!
//! A [`CancelPipe`] is armed into a multiplexer read-set next to the device
//! descriptor. Any thread may call [`CancelPipe::notify`] to make that wait
//! return; the waiter then calls [`CancelPipe::drain`] to clear the signal.

use super::fd::{cvt, would_block, Descriptor};
use super::fdset::FdSet;
use crate::port::error::{PortError, PortResult};
use std::os::unix::io::{AsRawFd, FromRawFd, OwnedFd};

const DRAIN_CHUNK: usize = 1024;

#[derive(Debug)]
struct Ends {
    read: OwnedFd,
    write: OwnedFd,
}

/// A unidirectional pipe used purely as a wake-up signal.
#[derive(Debug, Default)]
pub struct CancelPipe {
    ends: Option<Ends>,
}

impl CancelPipe {
    /// An unopened pipe.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and open a pipe in one step.
    pub fn opened() -> PortResult<Self> {
        let mut pipe = Self::new();
        pipe.open()?;
        Ok(pipe)
    }

    /// Create the pipe; only the read end is made non-blocking.
    ///
    /// Reopening an open pipe releases the previous pair first.
    pub fn open(&mut self) -> PortResult<()> {
        self.close();

        let mut fds = [0; 2];
        cvt("pipe", unsafe { libc::pipe(fds.as_mut_ptr()) })?;
        let ends = unsafe {
            Ends {
                read: OwnedFd::from_raw_fd(fds[0]),
                write: OwnedFd::from_raw_fd(fds[1]),
            }
        };

        let read = Descriptor::of(&ends.read);
        read.set_cloexec()?;
        read.set_nonblocking(true)?;
        Descriptor::of(&ends.write).set_cloexec()?;

        self.ends = Some(ends);
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.ends.is_some()
    }

    fn ends(&self) -> PortResult<&Ends> {
        self.ends.as_ref().ok_or(PortError::NotOpen)
    }

    /// Wake whoever is waiting on the read end.
    pub fn notify(&self) -> PortResult<()> {
        let ends = self.ends()?;
        let n = Descriptor::of(&ends.write).write(b"x")?;
        if n == 0 {
            return Err(PortError::from_errno("write(cancel pipe)", libc::EIO));
        }
        Ok(())
    }

    /// Discard up to 1024 pending wake-up bytes. Returns how many were read.
    pub fn drain(&self) -> PortResult<usize> {
        let ends = self.ends()?;
        let mut scratch = [0u8; DRAIN_CHUNK];
        match Descriptor::of(&ends.read).read(&mut scratch) {
            Ok(n) => Ok(n),
            Err(e) if would_block(&e) => Ok(0),
            Err(e) => Err(e),
        }
    }

    /// Release both ends; the pipe returns to the unopened state.
    pub fn close(&mut self) {
        self.ends = None;
    }

    /// Add the read end to a multiplexer read-set.
    pub fn arm(&self, set: &mut FdSet) {
        if let Some(ends) = &self.ends {
            set.insert(ends.read.as_raw_fd());
        }
    }

    /// True when the read end is marked ready in `set`.
    pub fn is_signalled(&self, set: &FdSet) -> bool {
        self.ends
            .as_ref()
            .is_some_and(|ends| set.contains(ends.read.as_raw_fd()))
    }
}
