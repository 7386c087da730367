//! Termios translation.
//!
//! [`translate`] is pure: it edits a `libc::termios` in place from semantic
//! settings and never touches a descriptor. [`configure`] wraps it with the
//! get/set round trip and the ancillary calls made whenever a line is
//! (re)configured.

use super::error::{PortError, PortResult};
use super::rs485;
use super::settings::{CharSize, Parity, PortSettings, StopBits, TermiosSettings};
use crate::sys::{ioctl, Descriptor};
use libc::tcflag_t;

/// Stick-parity extension bit.
#[cfg(any(target_os = "linux", target_os = "android"))]
pub const CMSPAR: Option<tcflag_t> = Some(0o10000000000);
#[cfg(not(any(target_os = "linux", target_os = "android")))]
pub const CMSPAR: Option<tcflag_t> = None;

const RAW_LFLAGS: tcflag_t = libc::ICANON
    | libc::ECHO
    | libc::ECHOE
    | libc::ECHOK
    | libc::ECHONL
    | libc::ISIG
    | libc::IEXTEN
    | libc::ECHOCTL
    | libc::ECHOKE;

const RAW_OFLAGS: tcflag_t = libc::OPOST | libc::ONLCR | libc::OCRNL;

#[cfg(any(target_os = "linux", target_os = "android"))]
const IUCLC: tcflag_t = libc::IUCLC;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
const IUCLC: tcflag_t = 0;

const RAW_IFLAGS: tcflag_t = libc::INLCR
    | libc::IGNCR
    | libc::ICRNL
    | libc::IGNBRK
    | IUCLC
    | libc::PARMRK
    | libc::INPCK
    | libc::ISTRIP;

fn char_size_bits(size: CharSize) -> tcflag_t {
    match size {
        CharSize::Five => libc::CS5,
        CharSize::Six => libc::CS6,
        CharSize::Seven => libc::CS7,
        CharSize::Eight => libc::CS8,
    }
}

fn apply_parity(cflag: &mut tcflag_t, parity: Parity) -> PortResult<()> {
    let cmspar = CMSPAR.unwrap_or(0);
    match parity {
        Parity::None => *cflag &= !(libc::PARENB | libc::PARODD | cmspar),
        Parity::Odd => {
            *cflag &= !cmspar;
            *cflag |= libc::PARENB | libc::PARODD;
        }
        Parity::Even => {
            *cflag &= !(libc::PARODD | cmspar);
            *cflag |= libc::PARENB;
        }
        Parity::Mark | Parity::Space => {
            let Some(cmspar) = CMSPAR else {
                return Err(PortError::unsupported(format!(
                    "{parity:?} parity needs the CMSPAR extension"
                )));
            };
            *cflag |= libc::PARENB | cmspar;
            if parity == Parity::Mark {
                *cflag |= libc::PARODD;
            } else {
                *cflag &= !libc::PARODD;
            }
        }
    }
    Ok(())
}

/// VMIN/VTIME pair for an inter-byte timeout, VTIME in deciseconds
/// (saturating at 25.5 s).
pub fn read_thresholds(settings: &TermiosSettings) -> (u8, u8) {
    match settings.inter_byte_timeout {
        Some(gap) if !gap.is_zero() => {
            let tenths = (gap.as_secs_f64() * 10.0) as u64;
            (1, u8::try_from(tenths).unwrap_or(u8::MAX))
        }
        _ => (0, 0),
    }
}

/// Rewrite `termios` for a raw line with the given settings.
pub fn translate(termios: &mut libc::termios, settings: &TermiosSettings) -> PortResult<()> {
    termios.c_lflag &= !RAW_LFLAGS;
    termios.c_oflag &= !RAW_OFLAGS;
    termios.c_iflag &= !RAW_IFLAGS;

    apply_parity(&mut termios.c_cflag, settings.parity)?;

    if settings.xonxoff {
        termios.c_iflag |= libc::IXON | libc::IXOFF;
    } else {
        termios.c_iflag &= !(libc::IXON | libc::IXOFF | libc::IXANY);
    }

    if settings.rtscts {
        termios.c_cflag |= libc::CRTSCTS;
    } else {
        termios.c_cflag &= !libc::CRTSCTS;
    }

    let speed = settings.speed.as_speed();
    unsafe {
        libc::cfsetispeed(termios, speed);
        libc::cfsetospeed(termios, speed);
    }

    termios.c_cflag |= libc::CLOCAL | libc::CREAD;
    termios.c_cflag &= !libc::CSIZE;
    termios.c_cflag |= char_size_bits(settings.char_size);
    match settings.stop_bits {
        StopBits::One => termios.c_cflag &= !libc::CSTOPB,
        StopBits::Two => termios.c_cflag |= libc::CSTOPB,
    }

    let (vmin, vtime) = read_thresholds(settings);
    termios.c_cc[libc::VMIN] = vmin;
    termios.c_cc[libc::VTIME] = vtime;
    Ok(())
}

/// Configure an open descriptor and return the termios that was applied.
///
/// Runs the exclusive-lock check, the termios round trip and, when
/// enabled, the RS-485 register update. The low-latency request is a hint
/// and its failure is only logged.
pub fn configure(fd: Descriptor, settings: &PortSettings) -> PortResult<libc::termios> {
    if settings.exclusive {
        fd.lock_exclusive()?;
        fd.unlock()?;
    }

    let mut termios = ioctl::get_termios(fd)?;
    translate(&mut termios, &settings.termios)?;
    ioctl::set_termios(fd, &termios)?;
    tracing::debug!(line = %settings.termios, "termios applied");

    if settings.rs485.enabled {
        rs485::apply(fd, &settings.rs485)?;
    }

    if settings.low_latency {
        if let Err(err) = ioctl::set_low_latency(fd, true) {
            tracing::debug!(error = %err, "low-latency mode not available");
        }
    }

    Ok(termios)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::settings::BitRate;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn blank() -> libc::termios {
        unsafe { std::mem::zeroed() }
    }

    fn expected_size(size: CharSize) -> tcflag_t {
        [libc::CS5, libc::CS6, libc::CS7, libc::CS8][usize::from(size.bits() - 5)]
    }

    #[test]
    fn test_line_format_truth_table() {
        for size in CharSize::ALL {
            for parity in [Parity::None, Parity::Odd, Parity::Even] {
                for stop in StopBits::ALL {
                    let settings = TermiosSettings {
                        char_size: size,
                        parity,
                        stop_bits: stop,
                        ..Default::default()
                    };
                    let mut t = blank();
                    t.c_cflag = libc::PARENB | libc::PARODD | libc::CSTOPB | libc::CS8;
                    translate(&mut t, &settings).unwrap();

                    let (parenb, parodd) = match parity {
                        Parity::None => (false, false),
                        Parity::Odd => (true, true),
                        _ => (true, false),
                    };
                    let label = format!("{}{}{}", size.bits(), parity.letter(), stop.count());
                    assert_eq!(t.c_cflag & libc::CSIZE, expected_size(size), "{label}");
                    assert_eq!(t.c_cflag & libc::PARENB != 0, parenb, "{label}");
                    assert_eq!(t.c_cflag & libc::PARODD != 0, parodd, "{label}");
                    assert_eq!(t.c_cflag & libc::CSTOPB != 0, stop == StopBits::Two, "{label}");
                    assert_ne!(t.c_cflag & libc::CLOCAL, 0);
                    assert_ne!(t.c_cflag & libc::CREAD, 0);
                }
            }
        }
    }

    #[test]
    fn test_raw_mode_clears_processing() {
        let mut t = blank();
        t.c_lflag = RAW_LFLAGS;
        t.c_oflag = RAW_OFLAGS;
        t.c_iflag = RAW_IFLAGS | libc::IXANY;
        translate(&mut t, &TermiosSettings::default()).unwrap();

        assert_eq!(t.c_lflag & RAW_LFLAGS, 0);
        assert_eq!(t.c_oflag & RAW_OFLAGS, 0);
        assert_eq!(t.c_iflag, 0);
        assert_eq!(t.c_cc[libc::VMIN], 0);
        assert_eq!(t.c_cc[libc::VTIME], 0);
    }

    #[test]
    fn test_flow_control_bits() {
        let mut t = blank();
        let settings = TermiosSettings {
            xonxoff: true,
            rtscts: true,
            ..Default::default()
        };
        translate(&mut t, &settings).unwrap();
        assert_eq!(t.c_iflag & (libc::IXON | libc::IXOFF), libc::IXON | libc::IXOFF);
        assert_ne!(t.c_cflag & libc::CRTSCTS, 0);

        translate(&mut t, &TermiosSettings::default()).unwrap();
        assert_eq!(t.c_iflag & (libc::IXON | libc::IXOFF | libc::IXANY), 0);
        assert_eq!(t.c_cflag & libc::CRTSCTS, 0);
    }

    #[test]
    fn test_speed_is_applied_both_ways() {
        let mut t = blank();
        let settings = TermiosSettings {
            speed: BitRate::from_baud(115200).unwrap(),
            ..Default::default()
        };
        translate(&mut t, &settings).unwrap();
        unsafe {
            assert_eq!(libc::cfgetispeed(&t), libc::B115200);
            assert_eq!(libc::cfgetospeed(&t), libc::B115200);
        }
    }

    #[test]
    fn test_inter_byte_timeout_sets_vmin_vtime() {
        let settings = TermiosSettings {
            inter_byte_timeout: Some(Duration::from_millis(500)),
            ..Default::default()
        };
        assert_eq!(read_thresholds(&settings), (1, 5));

        let settings = TermiosSettings {
            inter_byte_timeout: Some(Duration::ZERO),
            ..Default::default()
        };
        assert_eq!(read_thresholds(&settings), (0, 0));

        let settings = TermiosSettings {
            inter_byte_timeout: Some(Duration::from_secs(30)),
            ..Default::default()
        };
        assert_eq!(read_thresholds(&settings), (1, 255));
    }

    #[test]
    fn test_stick_parity() {
        for parity in [Parity::Mark, Parity::Space] {
            let mut t = blank();
            let settings = TermiosSettings {
                parity,
                ..Default::default()
            };
            let result = translate(&mut t, &settings);
            match CMSPAR {
                Some(cmspar) => {
                    result.unwrap();
                    assert_ne!(t.c_cflag & libc::PARENB, 0);
                    assert_ne!(t.c_cflag & cmspar, 0);
                    assert_eq!(t.c_cflag & libc::PARODD != 0, parity == Parity::Mark);
                }
                None => assert!(matches!(result, Err(PortError::Unsupported(_)))),
            }
        }
    }
}
