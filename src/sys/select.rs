//! The multiplexer: `select(2)` over three descriptor sets.
//!
//! A `None` timeout blocks indefinitely and `Some(Duration::ZERO)` is a pure
//! poll. An interrupted wait is re-armed from the caller's original sets with
//! whatever time is left; if the deadline passes while interrupted, the call
//! reports zero readiness and leaves every set empty.

use super::fdset::FdSet;
use crate::port::error::{PortError, PortResult};
use std::io;
use std::ptr;
use std::time::{Duration, Instant};

/// Split a duration into the kernel's seconds + microseconds form.
pub fn to_timeval(timeout: Duration) -> libc::timeval {
    libc::timeval {
        tv_sec: timeout.as_secs() as libc::time_t,
        tv_usec: timeout.subsec_micros() as libc::suseconds_t,
    }
}

/// Inverse of [`to_timeval`]; negative fields clamp to zero.
pub fn from_timeval(tv: &libc::timeval) -> Duration {
    let secs = u64::try_from(tv.tv_sec).unwrap_or(0);
    let micros = u64::try_from(tv.tv_usec).unwrap_or(0);
    Duration::from_secs(secs) + Duration::from_micros(micros)
}

/// Convert a floating-point timeout in seconds. Negative or non-finite
/// values mean "no timeout".
pub fn timeout_from_secs(seconds: f64) -> Option<Duration> {
    if seconds.is_finite() && seconds >= 0.0 {
        Some(Duration::from_secs_f64(seconds))
    } else {
        None
    }
}

fn slot(set: &mut Option<&mut FdSet>) -> *mut libc::fd_set {
    match set {
        Some(set) => set.as_mut_ptr(),
        None => ptr::null_mut(),
    }
}

fn restore(set: &mut Option<&mut FdSet>, armed: &Option<FdSet>) {
    if let (Some(set), Some(armed)) = (set.as_deref_mut(), armed) {
        *set = *armed;
    }
}

fn clear(set: &mut Option<&mut FdSet>) {
    if let Some(set) = set.as_deref_mut() {
        set.clear();
    }
}

/// Wait until a descriptor in one of the sets is ready or `timeout` elapses.
///
/// Returns the kernel's ready count; the sets are rewritten in place to hold
/// only the ready descriptors.
pub fn wait(
    mut read: Option<&mut FdSet>,
    mut write: Option<&mut FdSet>,
    mut except: Option<&mut FdSet>,
    timeout: Option<Duration>,
) -> PortResult<usize> {
    let armed = (
        read.as_deref().copied(),
        write.as_deref().copied(),
        except.as_deref().copied(),
    );
    let nfds = [armed.0.as_ref(), armed.1.as_ref(), armed.2.as_ref()]
        .into_iter()
        .flatten()
        .filter_map(FdSet::highest)
        .max()
        .map_or(0, |fd| fd + 1);
    let deadline = timeout.map(|t| Instant::now() + t);

    loop {
        restore(&mut read, &armed.0);
        restore(&mut write, &armed.1);
        restore(&mut except, &armed.2);

        let mut tv = deadline.map(|d| to_timeval(d.saturating_duration_since(Instant::now())));
        let tv_ptr = tv.as_mut().map_or(ptr::null_mut(), |tv| tv as *mut libc::timeval);

        let ret = unsafe {
            libc::select(
                nfds,
                slot(&mut read),
                slot(&mut write),
                slot(&mut except),
                tv_ptr,
            )
        };
        if ret >= 0 {
            return Ok(ret as usize);
        }

        let source = io::Error::last_os_error();
        if source.raw_os_error() != Some(libc::EINTR) {
            return Err(PortError::Syscall { op: "select", source });
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            clear(&mut read);
            clear(&mut write);
            clear(&mut except);
            return Ok(0);
        }
        tracing::trace!("select interrupted, re-arming");
    }
}
