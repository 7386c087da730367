//! Fixed-capacity descriptor bit vector for `select(2)`.

use std::fmt;
use std::mem::MaybeUninit;
use std::os::unix::io::RawFd;

/// Number of descriptors an [`FdSet`] can hold.
pub const CAPACITY: usize = libc::FD_SETSIZE as usize;

/// A `fd_set` plus the highest descriptor ever inserted, which bounds the
/// `nfds` argument of `select(2)`.
///
/// Inserting or probing a descriptor outside `0..CAPACITY` is a contract
/// violation and panics.
#[derive(Clone, Copy)]
pub struct FdSet {
    raw: libc::fd_set,
    highest: Option<RawFd>,
}

fn check(fd: RawFd) {
    assert!(
        fd >= 0 && (fd as usize) < CAPACITY,
        "descriptor {fd} does not fit in an fd_set of {CAPACITY}"
    );
}

impl FdSet {
    pub fn new() -> Self {
        let mut raw = MaybeUninit::<libc::fd_set>::uninit();
        let raw = unsafe {
            libc::FD_ZERO(raw.as_mut_ptr());
            raw.assume_init()
        };
        Self { raw, highest: None }
    }

    pub fn insert(&mut self, fd: RawFd) {
        check(fd);
        unsafe { libc::FD_SET(fd, &mut self.raw) };
        self.highest = Some(self.highest.map_or(fd, |h| h.max(fd)));
    }

    pub fn remove(&mut self, fd: RawFd) {
        check(fd);
        unsafe { libc::FD_CLR(fd, &mut self.raw) };
    }

    pub fn contains(&self, fd: RawFd) -> bool {
        check(fd);
        unsafe { libc::FD_ISSET(fd, &self.raw) }
    }

    /// Number of descriptors currently set.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// Drop every descriptor but keep the `nfds` bound.
    pub fn clear(&mut self) {
        unsafe { libc::FD_ZERO(&mut self.raw) };
    }

    /// Highest descriptor inserted since construction.
    pub fn highest(&self) -> Option<RawFd> {
        self.highest
    }

    /// Descriptors currently set, ascending.
    pub fn iter(&self) -> impl Iterator<Item = RawFd> + '_ {
        let upper = self.highest.map_or(0, |h| h + 1);
        (0..upper).filter(move |&fd| self.contains(fd))
    }

    pub(crate) fn as_mut_ptr(&mut self) -> *mut libc::fd_set {
        &mut self.raw
    }
}

impl Default for FdSet {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FdSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
