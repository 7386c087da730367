//! RS-485 register translation.

use super::error::PortResult;
use super::settings::Rs485Settings;
use crate::sys::ioctl::{self, Rs485Register};
use crate::sys::Descriptor;

pub const SER_RS485_ENABLED: u32 = 1 << 0;
pub const SER_RS485_RTS_ON_SEND: u32 = 1 << 1;
pub const SER_RS485_RTS_AFTER_SEND: u32 = 1 << 2;
pub const SER_RS485_RX_DURING_TX: u32 = 1 << 4;

fn toggle(flags: &mut u32, bit: u32, on: bool) {
    if on {
        *flags |= bit;
    } else {
        *flags &= !bit;
    }
}

impl Rs485Settings {
    /// Fold these settings into a register image read from the kernel.
    ///
    /// Disabled settings zero the flag word and leave everything else alone.
    pub fn update(&self, reg: &mut Rs485Register) {
        if !self.enabled {
            reg.flags = 0;
            return;
        }
        reg.flags |= SER_RS485_ENABLED;
        toggle(&mut reg.flags, SER_RS485_RX_DURING_TX, self.loopback);
        toggle(&mut reg.flags, SER_RS485_RTS_ON_SEND, self.rts_level_for_tx);
        toggle(&mut reg.flags, SER_RS485_RTS_AFTER_SEND, self.rts_level_for_rx);
        if let Some(delay) = self.delay_before_tx {
            reg.delay_rts_before_send = millis(delay);
        }
        if let Some(delay) = self.delay_before_rx {
            reg.delay_rts_after_send = millis(delay);
        }
    }
}

fn millis(delay: std::time::Duration) -> u32 {
    u32::try_from(delay.as_millis()).unwrap_or(u32::MAX)
}

/// Read-modify-write the device's RS-485 register.
pub fn apply(fd: Descriptor, settings: &Rs485Settings) -> PortResult<Rs485Register> {
    let mut reg = ioctl::get_rs485(fd)?;
    settings.update(&mut reg);
    ioctl::set_rs485(fd, &reg)?;
    tracing::debug!(flags = %format!("{:#x}", reg.flags), "applied rs485 register");
    Ok(reg)
}
