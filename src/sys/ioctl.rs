//! tty control calls: line discipline, queue depths, modem lines, flow,
//! break/drain/flush, the serial flags block and the RS-485 register.

use super::fd::{cvt, cvt_r, Descriptor};
use crate::port::error::{PortError, PortResult};
use libc::{c_int, c_ulong};
use std::mem::MaybeUninit;

/// `ASYNC_LOW_LATENCY` in `serial_struct.flags`.
pub const ASYNC_LOW_LATENCY: c_int = 0x2000;

/// `serial_struct` is read as a word buffer; `flags` is the fifth word.
const SERIAL_WORDS: usize = 32;
const SERIAL_FLAGS_WORD: usize = 4;

/// Modem-status and modem-control bits (`TIOCM_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModemLines(c_int);

impl ModemLines {
    pub const DTR: Self = Self(libc::TIOCM_DTR);
    pub const RTS: Self = Self(libc::TIOCM_RTS);
    pub const CTS: Self = Self(libc::TIOCM_CTS);
    pub const DSR: Self = Self(libc::TIOCM_DSR);
    pub const RI: Self = Self(libc::TIOCM_RI);
    pub const CD: Self = Self(libc::TIOCM_CD);

    pub fn from_bits(bits: c_int) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> c_int {
        self.0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for ModemLines {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Hardware-level suspend/resume actions for `tcflow(3)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowAction {
    SuspendOutput,
    ResumeOutput,
    SuspendInput,
    ResumeInput,
}

impl FlowAction {
    fn raw(self) -> c_int {
        match self {
            Self::SuspendOutput => libc::TCOOFF,
            Self::ResumeOutput => libc::TCOON,
            Self::SuspendInput => libc::TCIOFF,
            Self::ResumeInput => libc::TCION,
        }
    }
}

/// Queue selector for `tcflush(3)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Queue {
    Input,
    Output,
    Both,
}

impl Queue {
    fn raw(self) -> c_int {
        match self {
            Self::Input => libc::TCIFLUSH,
            Self::Output => libc::TCOFLUSH,
            Self::Both => libc::TCIOFLUSH,
        }
    }
}

/// Kernel RS-485 register block (`struct serial_rs485`).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rs485Register {
    pub flags: u32,
    pub delay_rts_before_send: u32,
    pub delay_rts_after_send: u32,
    pub padding: [u32; 5],
}

pub fn get_termios(fd: Descriptor) -> PortResult<libc::termios> {
    let mut termios = MaybeUninit::<libc::termios>::uninit();
    cvt("tcgetattr", unsafe { libc::tcgetattr(fd.raw(), termios.as_mut_ptr()) })?;
    Ok(unsafe { termios.assume_init() })
}

pub fn set_termios(fd: Descriptor, termios: &libc::termios) -> PortResult<()> {
    cvt_r("tcsetattr", || unsafe {
        libc::tcsetattr(fd.raw(), libc::TCSANOW, termios)
    })?;
    Ok(())
}

fn int_query(fd: Descriptor, op: &'static str, request: c_ulong) -> PortResult<c_int> {
    let mut value: c_int = 0;
    unsafe { fd.ioctl(op, request, &mut value)? };
    Ok(value)
}

/// Bytes waiting in the input queue.
pub fn input_waiting(fd: Descriptor) -> PortResult<usize> {
    let n = int_query(fd, "ioctl(TIOCINQ)", libc::FIONREAD as c_ulong)?;
    Ok(n.max(0) as usize)
}

/// Bytes waiting in the output queue.
pub fn output_waiting(fd: Descriptor) -> PortResult<usize> {
    let n = int_query(fd, "ioctl(TIOCOUTQ)", libc::TIOCOUTQ as c_ulong)?;
    Ok(n.max(0) as usize)
}

pub fn modem_status(fd: Descriptor) -> PortResult<ModemLines> {
    int_query(fd, "ioctl(TIOCMGET)", libc::TIOCMGET as c_ulong).map(ModemLines)
}

/// Assert (`TIOCMBIS`) or clear (`TIOCMBIC`) modem-control lines.
pub fn set_modem_lines(fd: Descriptor, lines: ModemLines, on: bool) -> PortResult<()> {
    let mut bits = lines.bits();
    if on {
        unsafe { fd.ioctl("ioctl(TIOCMBIS)", libc::TIOCMBIS as c_ulong, &mut bits)? };
    } else {
        unsafe { fd.ioctl("ioctl(TIOCMBIC)", libc::TIOCMBIC as c_ulong, &mut bits)? };
    }
    Ok(())
}

pub fn flow(fd: Descriptor, action: FlowAction) -> PortResult<()> {
    cvt_r("tcflow", || unsafe { libc::tcflow(fd.raw(), action.raw()) })?;
    Ok(())
}

pub fn send_break(fd: Descriptor) -> PortResult<()> {
    cvt("tcsendbreak", unsafe { libc::tcsendbreak(fd.raw(), 0) })?;
    Ok(())
}

/// Block until everything written has been transmitted.
pub fn drain(fd: Descriptor) -> PortResult<()> {
    cvt_r("tcdrain", || unsafe { libc::tcdrain(fd.raw()) })?;
    Ok(())
}

pub fn flush(fd: Descriptor, queue: Queue) -> PortResult<()> {
    cvt("tcflush", unsafe { libc::tcflush(fd.raw(), queue.raw()) })?;
    Ok(())
}

#[cfg(target_os = "linux")]
mod linux {
    use super::*;

    pub fn serial_flags(fd: Descriptor) -> PortResult<c_int> {
        let mut buf = [0 as c_int; SERIAL_WORDS];
        unsafe { fd.ioctl("ioctl(TIOCGSERIAL)", libc::TIOCGSERIAL as c_ulong, buf.as_mut_ptr())? };
        Ok(buf[SERIAL_FLAGS_WORD])
    }

    pub fn update_serial_flags(fd: Descriptor, set: c_int, clear: c_int) -> PortResult<()> {
        let mut buf = [0 as c_int; SERIAL_WORDS];
        unsafe { fd.ioctl("ioctl(TIOCGSERIAL)", libc::TIOCGSERIAL as c_ulong, buf.as_mut_ptr())? };
        let updated = (buf[SERIAL_FLAGS_WORD] | set) & !clear;
        if updated != buf[SERIAL_FLAGS_WORD] {
            buf[SERIAL_FLAGS_WORD] = updated;
            unsafe { fd.ioctl("ioctl(TIOCSSERIAL)", libc::TIOCSSERIAL as c_ulong, buf.as_mut_ptr())? };
        }
        Ok(())
    }

    pub fn get_rs485(fd: Descriptor) -> PortResult<Rs485Register> {
        let mut reg = Rs485Register::default();
        unsafe { fd.ioctl("ioctl(TIOCGRS485)", libc::TIOCGRS485 as c_ulong, &mut reg)? };
        Ok(reg)
    }

    pub fn set_rs485(fd: Descriptor, reg: &Rs485Register) -> PortResult<()> {
        let mut reg = *reg;
        unsafe { fd.ioctl("ioctl(TIOCSRS485)", libc::TIOCSRS485 as c_ulong, &mut reg)? };
        Ok(())
    }
}

#[cfg(not(target_os = "linux"))]
mod linux {
    use super::*;

    pub fn serial_flags(_fd: Descriptor) -> PortResult<c_int> {
        Err(PortError::unsupported("serial flags block (TIOCGSERIAL)"))
    }

    pub fn update_serial_flags(_fd: Descriptor, _set: c_int, _clear: c_int) -> PortResult<()> {
        Err(PortError::unsupported("serial flags block (TIOCSSERIAL)"))
    }

    pub fn get_rs485(_fd: Descriptor) -> PortResult<Rs485Register> {
        Err(PortError::unsupported("RS-485 register (TIOCGRS485)"))
    }

    pub fn set_rs485(_fd: Descriptor, _reg: &Rs485Register) -> PortResult<()> {
        Err(PortError::unsupported("RS-485 register (TIOCSRS485)"))
    }
}

pub use linux::{get_rs485, serial_flags, set_rs485, update_serial_flags};

/// Whether the driver's low-latency hint is currently on.
pub fn low_latency(fd: Descriptor) -> PortResult<bool> {
    Ok(serial_flags(fd)? & ASYNC_LOW_LATENCY != 0)
}

pub fn set_low_latency(fd: Descriptor, on: bool) -> PortResult<()> {
    if on {
        update_serial_flags(fd, ASYNC_LOW_LATENCY, 0)
    } else {
        update_serial_flags(fd, 0, ASYNC_LOW_LATENCY)
    }
}

/// True for errors meaning "this descriptor has no such control".
pub fn is_unsupported(err: &PortError) -> bool {
    matches!(err, PortError::Unsupported(_))
        || matches!(err.errno(), Some(e) if e == libc::ENOTTY || e == libc::EINVAL || e == libc::ENOSYS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modem_lines_contains() {
        let lines = ModemLines::CTS | ModemLines::CD;
        assert!(lines.contains(ModemLines::CTS));
        assert!(lines.contains(ModemLines::CD));
        assert!(!lines.contains(ModemLines::DSR));
        assert!(!ModemLines::default().contains(ModemLines::RI));
    }

    #[test]
    fn test_rs485_register_layout() {
        assert_eq!(std::mem::size_of::<Rs485Register>(), 32);
    }

    #[test]
    fn test_tty_calls_on_regular_file_are_unsupported() {
        let file = tempfile::tempfile().unwrap();
        let fd = Descriptor::of(&file);

        let err = get_termios(fd).unwrap_err();
        assert_eq!(err.errno(), Some(libc::ENOTTY));
        assert!(is_unsupported(&err));
        assert!(is_unsupported(&modem_status(fd).unwrap_err()));
        assert!(is_unsupported(&low_latency(fd).unwrap_err()));
    }
}
