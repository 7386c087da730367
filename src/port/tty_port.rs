//! The tty port.
//!
//! A [`Port`] owns one open character device plus two cancel pipes, one
//! per direction. Every operation except the cancel calls runs under the
//! port mutex, so at most one read, write, query or reconfiguration is in
//! flight at a time. [`Port::cancel_read`] and [`Port::cancel_write`] only
//! touch the pipes and may be called from any thread while another thread
//! is blocked inside [`Port::recv`] or [`Port::send`].
//!
//! # Example
//! ```no_run
//! use sio_tty::port::{Port, STOPS};
//!
//! let port = Port::opened("/dev/ttyUSB0")?;
//! port.write_line("AT")?;
//! let reply = port.read_until(&STOPS)?;
//! println!("{port}: {reply:?}");
//! # Ok::<(), sio_tty::port::PortError>(())
//! ```

use super::error::{PortError, PortResult};
use super::rs485;
use super::settings::{PortSettings, Rs485Settings};
use super::termios;
use crate::device::{DeviceClassCache, DeviceId, SysfsLocator, SYSFS_CLASS};
use crate::sys::fd::would_block;
use crate::sys::{ioctl, select, CancelPipe, Descriptor, FdSet, FlowAction, ModemLines, Queue};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::fs::{self, File, Metadata, OpenOptions};
use std::io;
use std::os::unix::fs::{FileTypeExt, OpenOptionsExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Per-call deadline applied to every read and write unless changed with
/// [`Port::set_timeout`].
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(50);

/// Final-result lines of a Hayes-style modem.
pub const STOPS: [&str; 2] = ["\r\nOK\r\n", "\r\nERROR\r\n"];

const OPEN_FLAGS: libc::c_int = libc::O_NOCTTY | libc::O_NONBLOCK;

#[derive(Debug)]
struct CancelPipes {
    read: CancelPipe,
    write: CancelPipe,
}

impl CancelPipes {
    fn open() -> PortResult<Self> {
        Ok(Self {
            read: CancelPipe::opened()?,
            write: CancelPipe::opened()?,
        })
    }
}

struct OpenPort {
    file: File,
    path: PathBuf,
    meta: Metadata,
    settings: PortSettings,
    termios: libc::termios,
    pipes: Arc<CancelPipes>,
    sysfs: Vec<PathBuf>,
}

impl OpenPort {
    fn fd(&self) -> Descriptor {
        Descriptor::of(&self.file)
    }

    fn device_id(&self) -> Option<DeviceId> {
        DeviceId::from_metadata(&self.meta).ok()
    }
}

struct Inner {
    open: Option<OpenPort>,
    timeout: Option<Duration>,
}

impl Inner {
    fn open(&self) -> PortResult<&OpenPort> {
        self.open.as_ref().ok_or(PortError::NotOpen)
    }

    fn open_mut(&mut self) -> PortResult<&mut OpenPort> {
        self.open.as_mut().ok_or(PortError::NotOpen)
    }
}

/// Absolute point in time a call must finish by; `None` never expires.
#[derive(Debug, Clone, Copy)]
struct Deadline(Option<Instant>);

impl Deadline {
    fn after(timeout: Option<Duration>) -> Self {
        Self(timeout.map(|t| Instant::now() + t))
    }

    fn expired(&self) -> bool {
        self.0.is_some_and(|d| Instant::now() > d)
    }

    /// Time left, clamped at zero (a pure poll).
    fn remaining(&self) -> Option<Duration> {
        self.0.map(|d| d.saturating_duration_since(Instant::now()))
    }
}

/// A POSIX serial line.
pub struct Port {
    inner: Mutex<Inner>,
    cancel: RwLock<Option<Arc<CancelPipes>>>,
    classes: Arc<DeviceClassCache>,
    sysfs: SysfsLocator,
}

impl Default for Port {
    fn default() -> Self {
        Self::new()
    }
}

impl Port {
    /// A closed port using the process-wide device-class cache.
    pub fn new() -> Self {
        Self::with_identity(DeviceClassCache::global(), SysfsLocator::default())
    }

    /// A closed port resolving identity through the given collaborators.
    pub fn with_identity(classes: Arc<DeviceClassCache>, sysfs: SysfsLocator) -> Self {
        Self {
            inner: Mutex::new(Inner {
                open: None,
                timeout: Some(DEFAULT_TIMEOUT),
            }),
            cancel: RwLock::new(None),
            classes,
            sysfs,
        }
    }

    /// Create a port and open `path` with default settings.
    pub fn opened(path: impl AsRef<Path>) -> PortResult<Self> {
        let port = Self::new();
        port.open(path)?;
        Ok(port)
    }

    /// Open `path` at 9600 8N1, no flow control, RS-485 off.
    pub fn open(&self, path: impl AsRef<Path>) -> PortResult<()> {
        self.open_with(path, PortSettings::default())
    }

    /// Open `path` and apply `settings`.
    ///
    /// Any failure leaves the port closed with nothing held open.
    pub fn open_with(&self, path: impl AsRef<Path>, settings: PortSettings) -> PortResult<()> {
        let path = path.as_ref();
        let mut inner = self.inner.lock();

        let meta = fs::metadata(path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => PortError::NotFound(path.to_path_buf()),
            _ => PortError::Syscall { op: "stat", source },
        })?;
        if !meta.file_type().is_char_device() {
            return Err(PortError::NotACharacterDevice(path.to_path_buf()));
        }
        if inner.open.is_some() {
            return Err(PortError::AlreadyOpen(path.to_path_buf()));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(OPEN_FLAGS)
            .open(path)
            .map_err(|source| PortError::Syscall { op: "open", source })?;
        let fd = Descriptor::of(&file);

        let termios = termios::configure(fd, &settings)?;

        if !settings.dsrdtr {
            best_effort("clear DTR", ioctl::set_modem_lines(fd, ModemLines::DTR, false));
        }
        if !settings.termios.rtscts {
            best_effort("clear RTS", ioctl::set_modem_lines(fd, ModemLines::RTS, false));
        }
        ioctl::flush(fd, Queue::Input)?;
        ioctl::flush(fd, Queue::Output)?;

        let pipes = Arc::new(CancelPipes::open()?);

        let id = DeviceId::from_metadata(&meta).ok();
        let sysfs = id
            .map(|id| self.sysfs.locate(SYSFS_CLASS, id))
            .unwrap_or_default();

        tracing::info!(
            path = %path.display(),
            device = ?id,
            line = %settings.termios,
            sysfs = sysfs.len(),
            "port opened"
        );

        *self.cancel.write() = Some(Arc::clone(&pipes));
        inner.open = Some(OpenPort {
            file,
            path: path.to_path_buf(),
            meta,
            settings,
            termios,
            pipes,
            sysfs,
        });
        Ok(())
    }

    /// Release the descriptor and both pipes. Closing a closed port does
    /// nothing.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        if let Some(open) = inner.open.take() {
            self.cancel.write().take();
            tracing::info!(path = %open.path.display(), "port closed");
        }
    }

    pub fn is_open(&self) -> bool {
        self.inner.lock().open.is_some()
    }

    pub fn path(&self) -> Option<PathBuf> {
        self.inner.lock().open.as_ref().map(|o| o.path.clone())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.inner.lock().timeout
    }

    /// Per-call deadline for reads and writes. `None` waits forever.
    pub fn set_timeout(&self, timeout: Option<Duration>) {
        self.inner.lock().timeout = timeout;
    }

    /// Settings currently applied to the open device.
    pub fn settings(&self) -> PortResult<PortSettings> {
        Ok(self.inner.lock().open()?.settings.clone())
    }

    /// The termios last written to the device.
    pub fn termios(&self) -> PortResult<libc::termios> {
        Ok(self.inner.lock().open()?.termios)
    }

    /// Re-apply line settings to the open device.
    pub fn reconfigure(&self, settings: PortSettings) -> PortResult<()> {
        let mut inner = self.inner.lock();
        let open = inner.open_mut()?;
        open.termios = termios::configure(open.fd(), &settings)?;
        open.settings = settings;
        Ok(())
    }

    /// Read-modify-write the RS-485 register.
    pub fn set_rs485(&self, settings: Rs485Settings) -> PortResult<()> {
        let mut inner = self.inner.lock();
        let open = inner.open_mut()?;
        rs485::apply(open.fd(), &settings)?;
        open.settings.rs485 = settings;
        Ok(())
    }

    pub fn low_latency(&self) -> PortResult<bool> {
        ioctl::low_latency(self.inner.lock().open()?.fd())
    }

    /// Toggle the driver's low-latency mode. Unlike the hint applied at
    /// open, failure is reported.
    pub fn set_low_latency(&self, on: bool) -> PortResult<()> {
        let mut inner = self.inner.lock();
        let open = inner.open_mut()?;
        ioctl::set_low_latency(open.fd(), on)?;
        open.settings.low_latency = on;
        Ok(())
    }

    /// Wake a [`Port::recv`] blocked in another thread.
    pub fn cancel_read(&self) -> PortResult<()> {
        match self.cancel.read().as_ref() {
            Some(pipes) => pipes.read.notify(),
            None => Ok(()),
        }
    }

    /// Wake a [`Port::send`] blocked in another thread.
    pub fn cancel_write(&self) -> PortResult<()> {
        match self.cancel.read().as_ref() {
            Some(pipes) => pipes.write.notify(),
            None => Ok(()),
        }
    }

    /// Write all of `data` within the port deadline.
    ///
    /// Returns the byte count, which is short only when the write was
    /// cancelled. A deadline miss is `Timeout` carrying the bytes already
    /// handed to the kernel.
    pub fn send(&self, data: &[u8]) -> PortResult<usize> {
        let inner = self.inner.lock();
        let open = inner.open()?;
        if data.is_empty() {
            return Ok(0);
        }
        write_all(open.fd(), &open.pipes.write, Deadline::after(inner.timeout), data)
    }

    /// Fill `buf` within the port deadline.
    ///
    /// Returns early, without error, when cancelled. On `Timeout` or
    /// `DeviceGone` the first `transferred` bytes of `buf` are valid.
    pub fn recv(&self, buf: &mut [u8]) -> PortResult<usize> {
        let inner = self.inner.lock();
        let open = inner.open()?;
        fill(open.fd(), &open.pipes.read, Deadline::after(inner.timeout), buf)
    }

    /// One read of whatever is available, waiting at most the port
    /// deadline for the first byte. `Ok(0)` means the wait was cancelled.
    pub fn read_some(&self, buf: &mut [u8]) -> PortResult<usize> {
        Ok(self.read_once(buf)?.unwrap_or(0))
    }

    /// One write of as much as the kernel takes, waiting at most the port
    /// deadline for room. `Ok(0)` means the wait was cancelled.
    pub fn write_some(&self, data: &[u8]) -> PortResult<usize> {
        let inner = self.inner.lock();
        let open = inner.open()?;
        if data.is_empty() {
            return Ok(0);
        }
        let sent = write_available(open.fd(), &open.pipes.write, Deadline::after(inner.timeout), data)?;
        Ok(sent.unwrap_or(0))
    }

    fn read_once(&self, buf: &mut [u8]) -> PortResult<Option<usize>> {
        let inner = self.inner.lock();
        let open = inner.open()?;
        if buf.is_empty() {
            return Ok(Some(0));
        }
        read_available(open.fd(), &open.pipes.read, Deadline::after(inner.timeout), buf)
    }

    /// Read up to and including the next `\n`.
    ///
    /// A `cancel_read` while waiting gives `Cancelled`; the bytes of the
    /// unfinished line are counted there and dropped.
    pub fn read_line(&self) -> PortResult<String> {
        let mut line = Vec::new();
        let mut byte = [0u8; 1];
        while line.last() != Some(&b'\n') {
            match self.read_once(&mut byte)? {
                Some(0) => {}
                Some(_) => line.push(byte[0]),
                None => return Err(PortError::Cancelled { transferred: line.len() }),
            }
        }
        Ok(String::from_utf8_lossy(&line).into_owned())
    }

    /// Write `s` followed by a carriage return.
    ///
    /// When the body write is cancelled the carriage return is not sent and
    /// the call fails with `Cancelled` carrying the body bytes written.
    pub fn write_line(&self, s: &str) -> PortResult<()> {
        let sent = self.send(s.as_bytes())?;
        if sent < s.len() || self.send(b"\r")? == 0 {
            return Err(PortError::Cancelled { transferred: sent });
        }
        Ok(())
    }

    /// Read whole lines until the accumulated text ends with one of
    /// `terminators`.
    pub fn read_until(&self, terminators: &[&str]) -> PortResult<String> {
        if terminators.is_empty() {
            return Err(PortError::invalid("read_until needs at least one terminator"));
        }
        let mut text = String::new();
        loop {
            match self.read_line() {
                Ok(line) => text.push_str(&line),
                Err(PortError::Cancelled { transferred }) => {
                    return Err(PortError::Cancelled {
                        transferred: text.len() + transferred,
                    })
                }
                Err(e) => return Err(e),
            }
            if terminators.iter().any(|t| text.ends_with(t)) {
                return Ok(text);
            }
        }
    }
}

/// How a wait on the device ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wake {
    Ready,
    Cancelled,
    Expired,
}

/// Block until `fd` is readable (writable when `output` is set), `cancel`
/// fires, or `deadline` passes. A fired cancel is drained here, so each
/// notify ends exactly one wait. Cancellation wins over readiness.
fn wait(fd: Descriptor, cancel: &CancelPipe, output: bool, deadline: Deadline) -> PortResult<Wake> {
    let mut rset = FdSet::new();
    let mut wset = FdSet::new();
    cancel.arm(&mut rset);
    if output {
        wset.insert(fd.raw());
    } else {
        rset.insert(fd.raw());
    }

    if select::wait(Some(&mut rset), Some(&mut wset), None, deadline.remaining())? == 0 {
        return Ok(Wake::Expired);
    }
    if cancel.is_signalled(&rset) {
        cancel.drain()?;
        return Ok(Wake::Cancelled);
    }
    Ok(Wake::Ready)
}

/// Read until `buf` is full, stopping early without error on cancel.
fn fill(fd: Descriptor, cancel: &CancelPipe, deadline: Deadline, buf: &mut [u8]) -> PortResult<usize> {
    let mut got = 0;
    while got < buf.len() {
        match wait(fd, cancel, false, deadline)? {
            Wake::Expired => return Err(PortError::Timeout { transferred: got }),
            Wake::Cancelled => {
                tracing::debug!(got, "read cancelled");
                break;
            }
            Wake::Ready => {}
        }
        match fd.read(&mut buf[got..]) {
            Ok(0) => return Err(PortError::DeviceGone { transferred: got }),
            Ok(n) => got += n,
            Err(e) if would_block(&e) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(got)
}

/// One read once `fd` is readable; `None` when cancelled first.
fn read_available(
    fd: Descriptor,
    cancel: &CancelPipe,
    deadline: Deadline,
    buf: &mut [u8],
) -> PortResult<Option<usize>> {
    loop {
        match wait(fd, cancel, false, deadline)? {
            Wake::Expired => return Err(PortError::Timeout { transferred: 0 }),
            Wake::Cancelled => {
                tracing::debug!("read cancelled");
                return Ok(None);
            }
            Wake::Ready => {}
        }
        match fd.read(buf) {
            Ok(0) => return Err(PortError::DeviceGone { transferred: 0 }),
            Ok(n) => return Ok(Some(n)),
            Err(e) if would_block(&e) => {}
            Err(e) => return Err(e),
        }
    }
}

/// Write all of `data`, waiting for room between partial writes. The count
/// is short only when cancelled.
fn write_all(fd: Descriptor, cancel: &CancelPipe, deadline: Deadline, data: &[u8]) -> PortResult<usize> {
    let mut sent = 0;
    loop {
        match fd.write(&data[sent..]) {
            Ok(n) => sent += n,
            Err(e) if would_block(&e) => {}
            Err(e) => return Err(e),
        }
        if sent == data.len() {
            return Ok(sent);
        }
        if deadline.expired() {
            return Err(PortError::Timeout { transferred: sent });
        }
        match wait(fd, cancel, true, deadline)? {
            Wake::Expired => return Err(PortError::Timeout { transferred: sent }),
            Wake::Cancelled => {
                tracing::debug!(sent, "write cancelled");
                return Ok(sent);
            }
            Wake::Ready => {}
        }
    }
}

/// One write of as much as the kernel takes; `None` when cancelled before
/// there was room.
fn write_available(
    fd: Descriptor,
    cancel: &CancelPipe,
    deadline: Deadline,
    data: &[u8],
) -> PortResult<Option<usize>> {
    loop {
        match fd.write(data) {
            Ok(n) => return Ok(Some(n)),
            Err(e) if would_block(&e) => {}
            Err(e) => return Err(e),
        }
        match wait(fd, cancel, true, deadline)? {
            Wake::Expired => return Err(PortError::Timeout { transferred: 0 }),
            Wake::Cancelled => {
                tracing::debug!("write cancelled");
                return Ok(None);
            }
            Wake::Ready => {}
        }
    }
}

fn best_effort(what: &str, result: PortResult<()>) {
    if let Err(err) = result {
        tracing::debug!(error = %err, "{what} ignored");
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let identity = {
            let inner = self.inner.lock();
            inner
                .open
                .as_ref()
                .map(|o| (o.path.display().to_string(), o.device_id()))
        };
        match identity {
            None => f.write_str("<sio.Port>"),
            Some((path, Some(id))) => write!(
                f,
                "<sio.Port({path:?}):{} [{id}]>",
                self.classes.class_name(id.major)
            ),
            Some((path, None)) => write!(f, "<sio.Port({path:?})>"),
        }
    }
}

impl fmt::Debug for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Port")
            .field("path", &inner.open.as_ref().map(|o| &o.path))
            .field("settings", &inner.open.as_ref().map(|o| &o.settings))
            .field("timeout", &inner.timeout)
            .finish_non_exhaustive()
    }
}

impl io::Read for &Port {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.read_some(buf)?)
    }
}

impl io::Write for &Port {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        Ok(self.write_some(data)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl io::Read for Port {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        io::Read::read(&mut &*self, buf)
    }
}

impl io::Write for Port {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        io::Write::write(&mut &*self, data)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
