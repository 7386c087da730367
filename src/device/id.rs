//! Device numbers.

use crate::port::error::{PortError, PortResult};
use serde::Serialize;
use std::fmt;
use std::fs::Metadata;
use std::str::FromStr;

/// A `major:minor` device number pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DeviceId {
    pub major: u32,
    pub minor: u32,
}

impl DeviceId {
    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Decode the Linux packed `dev_t` layout.
    pub fn from_rdev(rdev: u64) -> Self {
        let major = ((rdev & 0x0000_0000_000f_ff00) >> 8) | ((rdev & 0xffff_f000_0000_0000) >> 32);
        let minor = (rdev & 0x0000_0000_0000_00ff) | ((rdev & 0x0000_0fff_fff0_0000) >> 12);
        Self {
            major: major as u32,
            minor: minor as u32,
        }
    }

    /// Inverse of [`DeviceId::from_rdev`].
    pub fn to_rdev(self) -> u64 {
        let major = u64::from(self.major);
        let minor = u64::from(self.minor);
        ((major & 0x0000_0fff) << 8)
            | ((major & 0xffff_f000) << 32)
            | (minor & 0x0000_00ff)
            | ((minor & 0xffff_ff00) << 12)
    }

    /// Device number of a special file.
    #[cfg(any(target_os = "linux", target_os = "android"))]
    pub fn from_metadata(meta: &Metadata) -> PortResult<Self> {
        use std::os::unix::fs::MetadataExt;
        Ok(Self::from_rdev(meta.rdev()))
    }

    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    pub fn from_metadata(_meta: &Metadata) -> PortResult<Self> {
        Err(PortError::unsupported("device number decoding on this platform"))
    }
}

impl FromStr for DeviceId {
    type Err = PortError;

    /// Parse the `MAJOR:MINOR` form used by sysfs `dev` files.
    fn from_str(s: &str) -> PortResult<Self> {
        let bad = || PortError::invalid(format!("expected MAJOR:MINOR, got {s:?}"));
        let (major, minor) = s.trim().split_once(':').ok_or_else(bad)?;
        Ok(Self {
            major: major.parse().map_err(|_| bad())?,
            minor: minor.parse().map_err(|_| bad())?,
        })
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.major, self.minor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_decode_classic_and_extended() {
        // ttyUSB0 is 188:0, ttyS1 is 4:65
        assert_eq!(DeviceId::from_rdev(0xbc00), DeviceId::new(188, 0));
        assert_eq!(DeviceId::from_rdev(0x0441), DeviceId::new(4, 65));

        let wide = DeviceId::new(0x1234, 0x12345);
        assert_eq!(DeviceId::from_rdev(wide.to_rdev()), wide);
    }

    #[test]
    fn test_parse_dev_file_content() {
        assert_eq!("188:3\n".parse::<DeviceId>().unwrap(), DeviceId::new(188, 3));
        assert!("188".parse::<DeviceId>().is_err());
        assert!("a:b".parse::<DeviceId>().is_err());
        assert_eq!(DeviceId::new(4, 64).to_string(), "4:64");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_metadata_of_dev_null() {
        let meta = std::fs::metadata("/dev/null").unwrap();
        assert_eq!(DeviceId::from_metadata(&meta).unwrap(), DeviceId::new(1, 3));
    }

    proptest! {
        #[test]
        fn prop_rdev_round_trip(major in 0u32..(1 << 20), minor in 0u32..(1 << 20)) {
            let id = DeviceId::new(major, minor);
            prop_assert_eq!(DeviceId::from_rdev(id.to_rdev()), id);
        }
    }
}
