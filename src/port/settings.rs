//! Semantic line settings.
//!
//! These are the values a caller reasons about (baud, 8N1, flow control,
//! RS-485 timing). The termios and RS-485 translators turn them into the
//! kernel's bit-level structures.

use super::error::{PortError, PortResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

const RATES: &[(u32, libc::speed_t)] = &[
    (0, libc::B0),
    (50, libc::B50),
    (75, libc::B75),
    (110, libc::B110),
    (134, libc::B134),
    (150, libc::B150),
    (200, libc::B200),
    (300, libc::B300),
    (600, libc::B600),
    (1200, libc::B1200),
    (1800, libc::B1800),
    (2400, libc::B2400),
    (4800, libc::B4800),
    (9600, libc::B9600),
    (19200, libc::B19200),
    (38400, libc::B38400),
    (57600, libc::B57600),
    (115200, libc::B115200),
    (230400, libc::B230400),
];

#[cfg(any(target_os = "linux", target_os = "android"))]
const HIGH_RATES: &[(u32, libc::speed_t)] = &[
    (460800, libc::B460800),
    (500000, libc::B500000),
    (576000, libc::B576000),
    (921600, libc::B921600),
    (1000000, libc::B1000000),
    (1152000, libc::B1152000),
    (1500000, libc::B1500000),
    (2000000, libc::B2000000),
    (2500000, libc::B2500000),
    (3000000, libc::B3000000),
    (3500000, libc::B3500000),
    (4000000, libc::B4000000),
];

#[cfg(not(any(target_os = "linux", target_os = "android")))]
const HIGH_RATES: &[(u32, libc::speed_t)] = &[];

fn rates() -> impl Iterator<Item = &'static (u32, libc::speed_t)> {
    RATES.iter().chain(HIGH_RATES)
}

/// A line speed the platform has a termios constant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct BitRate(u32);

impl BitRate {
    pub const DEFAULT: Self = Self(9600);

    /// Accept only rates that map onto a `B*` constant.
    pub fn from_baud(baud: u32) -> PortResult<Self> {
        if Self::is_valid(baud) {
            Ok(Self(baud))
        } else {
            Err(PortError::invalid(format!("unsupported baud rate {baud}")))
        }
    }

    pub fn is_valid(baud: u32) -> bool {
        rates().any(|&(b, _)| b == baud)
    }

    pub fn baud(self) -> u32 {
        self.0
    }

    /// The `speed_t` value for `cfsetispeed`/`cfsetospeed`.
    pub fn as_speed(self) -> libc::speed_t {
        rates()
            .find(|&&(b, _)| b == self.0)
            .map_or(libc::B9600, |&(_, speed)| speed)
    }

    /// Every rate this platform supports, ascending.
    pub fn all() -> impl Iterator<Item = BitRate> {
        rates().map(|&(b, _)| BitRate(b))
    }
}

impl Default for BitRate {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<u32> for BitRate {
    type Error = PortError;

    fn try_from(baud: u32) -> PortResult<Self> {
        Self::from_baud(baud)
    }
}

impl From<BitRate> for u32 {
    fn from(rate: BitRate) -> Self {
        rate.0
    }
}

impl fmt::Display for BitRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum CharSize {
    Five,
    Six,
    Seven,
    #[default]
    Eight,
}

impl CharSize {
    pub const ALL: [CharSize; 4] = [Self::Five, Self::Six, Self::Seven, Self::Eight];

    pub fn bits(self) -> u8 {
        match self {
            Self::Five => 5,
            Self::Six => 6,
            Self::Seven => 7,
            Self::Eight => 8,
        }
    }

    pub fn is_valid(bits: u8) -> bool {
        (5..=8).contains(&bits)
    }
}

impl TryFrom<u8> for CharSize {
    type Error = PortError;

    fn try_from(bits: u8) -> PortResult<Self> {
        match bits {
            5 => Ok(Self::Five),
            6 => Ok(Self::Six),
            7 => Ok(Self::Seven),
            8 => Ok(Self::Eight),
            other => Err(PortError::invalid(format!(
                "character size must be 5-8, got {other}"
            ))),
        }
    }
}

impl From<CharSize> for u8 {
    fn from(size: CharSize) -> Self {
        size.bits()
    }
}

/// Parity checking mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
    Mark,
    Space,
}

impl Parity {
    pub const ALL: [Parity; 5] = [Self::None, Self::Odd, Self::Even, Self::Mark, Self::Space];

    /// Mark and space need the stick-parity extension.
    pub fn is_sticky(self) -> bool {
        matches!(self, Self::Mark | Self::Space)
    }

    /// One-letter form used in "8N1"-style notation.
    pub fn letter(self) -> char {
        match self {
            Self::None => 'N',
            Self::Odd => 'O',
            Self::Even => 'E',
            Self::Mark => 'M',
            Self::Space => 'S',
        }
    }
}

impl FromStr for Parity {
    type Err = PortError;

    fn from_str(s: &str) -> PortResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "n" => Ok(Self::None),
            "odd" | "o" => Ok(Self::Odd),
            "even" | "e" => Ok(Self::Even),
            "mark" | "m" => Ok(Self::Mark),
            "space" | "s" => Ok(Self::Space),
            other => Err(PortError::invalid(format!("unknown parity '{other}'"))),
        }
    }
}

/// Number of stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum StopBits {
    #[default]
    One,
    Two,
}

impl StopBits {
    pub const ALL: [StopBits; 2] = [Self::One, Self::Two];

    pub fn count(self) -> u8 {
        match self {
            Self::One => 1,
            Self::Two => 2,
        }
    }

    pub fn is_valid(count: u8) -> bool {
        count == 1 || count == 2
    }
}

impl TryFrom<u8> for StopBits {
    type Error = PortError;

    fn try_from(count: u8) -> PortResult<Self> {
        match count {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            other => Err(PortError::invalid(format!("stop bits must be 1 or 2, got {other}"))),
        }
    }
}

impl From<StopBits> for u8 {
    fn from(stop: StopBits) -> Self {
        stop.count()
    }
}

/// Line discipline settings applied through termios.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TermiosSettings {
    pub speed: BitRate,
    pub char_size: CharSize,
    pub parity: Parity,
    pub stop_bits: StopBits,
    /// XON/XOFF software flow control.
    pub xonxoff: bool,
    /// RTS/CTS hardware flow control.
    pub rtscts: bool,
    /// Maximum gap between bytes before a blocking read returns. `None`
    /// leaves all waiting to the multiplexer.
    pub inter_byte_timeout: Option<Duration>,
}

impl fmt::Display for TermiosSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}{}{}",
            self.speed,
            self.char_size.bits(),
            self.parity.letter(),
            self.stop_bits.count()
        )?;
        if self.xonxoff {
            f.write_str(" xon/xoff")?;
        }
        if self.rtscts {
            f.write_str(" rts/cts")?;
        }
        Ok(())
    }
}

/// RS-485 driver-enable settings. Ignored unless `enabled`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Rs485Settings {
    pub enabled: bool,
    /// Keep receiving while transmitting.
    pub loopback: bool,
    /// RTS level while sending.
    pub rts_level_for_tx: bool,
    /// RTS level after sending.
    pub rts_level_for_rx: bool,
    pub delay_before_tx: Option<Duration>,
    pub delay_before_rx: Option<Duration>,
}

/// Everything `Port::open_with` applies to a freshly opened device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortSettings {
    pub termios: TermiosSettings,
    /// DSR/DTR handshaking; when off, DTR is dropped at open.
    pub dsrdtr: bool,
    /// Refuse to open a device another process holds an exclusive lock on.
    pub exclusive: bool,
    /// Ask the driver for its low-latency mode.
    pub low_latency: bool,
    pub rs485: Rs485Settings,
}

impl Default for PortSettings {
    fn default() -> Self {
        Self {
            termios: TermiosSettings::default(),
            dsrdtr: false,
            exclusive: true,
            low_latency: false,
            rs485: Rs485Settings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_9600_8n1() {
        let settings = PortSettings::default();
        assert_eq!(settings.termios.speed.baud(), 9600);
        assert_eq!(settings.termios.char_size, CharSize::Eight);
        assert_eq!(settings.termios.parity, Parity::None);
        assert_eq!(settings.termios.stop_bits, StopBits::One);
        assert!(!settings.termios.xonxoff);
        assert!(!settings.termios.rtscts);
        assert!(!settings.rs485.enabled);
        assert!(settings.exclusive);
        assert_eq!(settings.termios.to_string(), "9600 8N1");
    }

    #[test]
    fn test_bit_rate_validation() {
        assert_eq!(BitRate::from_baud(115200).unwrap().as_speed(), libc::B115200);
        assert!(BitRate::is_valid(0));
        assert!(!BitRate::is_valid(12345));
        assert!(matches!(
            BitRate::from_baud(12345),
            Err(PortError::InvalidSetting(_))
        ));
        assert!(BitRate::all().any(|r| r.baud() == 230400));
    }

    #[test]
    fn test_field_predicates() {
        assert!(CharSize::is_valid(5));
        assert!(!CharSize::is_valid(9));
        assert!(CharSize::try_from(4).is_err());
        assert_eq!(CharSize::try_from(7).unwrap(), CharSize::Seven);

        assert!(StopBits::is_valid(2));
        assert!(!StopBits::is_valid(3));
        assert!(StopBits::try_from(0).is_err());

        assert_eq!("E".parse::<Parity>().unwrap(), Parity::Even);
        assert_eq!("space".parse::<Parity>().unwrap(), Parity::Space);
        assert!("bogus".parse::<Parity>().is_err());
        assert!(Parity::Mark.is_sticky());
        assert!(!Parity::Odd.is_sticky());
    }

    #[test]
    fn test_serde_rejects_bad_values() {
        let ok: TermiosSettings =
            serde_json::from_str(r#"{"speed":19200,"char_size":7,"parity":"even","stop_bits":2}"#)
                .unwrap();
        assert_eq!(ok.to_string(), "19200 7E2");

        let bad = serde_json::from_str::<TermiosSettings>(r#"{"speed":12345}"#);
        assert!(bad.is_err());
        let bad = serde_json::from_str::<TermiosSettings>(r#"{"char_size":9}"#);
        assert!(bad.is_err());
    }
}
