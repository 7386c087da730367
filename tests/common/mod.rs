//! Shared test utilities for sio_tty integration tests.
//!
//! The integration tests run against a pseudo-terminal pair: the slave side
//! is a real character device that [`sio_tty::Port`] can open, and the test
//! drives the other end through the master.

#![allow(dead_code)]

use std::ffi::CStr;
use std::fs::File;
use std::io::{self, Read};
use std::os::unix::io::{AsRawFd, FromRawFd};
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// A pseudo-terminal pair. Dropping it closes the master.
pub struct Pty {
    pub master: File,
    pub slave: PathBuf,
}

impl Pty {
    pub fn open() -> io::Result<Self> {
        let fd = unsafe { libc::posix_openpt(libc::O_RDWR | libc::O_NOCTTY) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        let master = unsafe { File::from_raw_fd(fd) };
        if unsafe { libc::grantpt(fd) } != 0 || unsafe { libc::unlockpt(fd) } != 0 {
            return Err(io::Error::last_os_error());
        }
        let slave = slave_name(&master)?;
        Ok(Self { master, slave })
    }

    /// Read exactly `len` bytes from the master, failing after `limit`.
    pub fn read_master(&mut self, len: usize, limit: Duration) -> io::Result<Vec<u8>> {
        let start = Instant::now();
        let mut out = Vec::with_capacity(len);
        let mut buf = [0u8; 4096];
        while out.len() < len {
            if start.elapsed() > limit {
                return Err(io::Error::new(io::ErrorKind::TimedOut, "master read"));
            }
            let want = (len - out.len()).min(buf.len());
            let n = self.master.read(&mut buf[..want])?;
            out.extend_from_slice(&buf[..n]);
        }
        Ok(out)
    }
}

#[cfg(target_os = "linux")]
fn slave_name(master: &File) -> io::Result<PathBuf> {
    let mut buf = [0 as libc::c_char; 128];
    let rc = unsafe { libc::ptsname_r(master.as_raw_fd(), buf.as_mut_ptr(), buf.len()) };
    if rc != 0 {
        return Err(io::Error::from_raw_os_error(rc));
    }
    let name = unsafe { CStr::from_ptr(buf.as_ptr()) };
    Ok(PathBuf::from(name.to_string_lossy().into_owned()))
}

#[cfg(not(target_os = "linux"))]
fn slave_name(master: &File) -> io::Result<PathBuf> {
    // ptsname is not reentrant; tests that call this run in one thread.
    let ptr = unsafe { libc::ptsname(master.as_raw_fd()) };
    if ptr.is_null() {
        return Err(io::Error::last_os_error());
    }
    let name = unsafe { CStr::from_ptr(ptr) };
    Ok(PathBuf::from(name.to_string_lossy().into_owned()))
}

/// Deterministic payload of `len` bytes.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
