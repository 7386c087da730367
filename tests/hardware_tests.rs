//! Tests requiring an actual serial device.
//!
//! These tests are skipped if no hardware is available.
//!
//! # Running Hardware Tests
//!
//! ```bash
//! export TEST_PORT=/dev/ttyUSB0
//! export TEST_BAUD=115200               # optional, default: 9600
//! export TEST_LOOPBACK=1                # if the port has TX-RX wired together
//!
//! cargo test --features hardware-tests -- --ignored
//! ```

use sio_tty::{BitRate, Port, PortSettings};
use std::env;
use std::time::Duration;

fn get_test_port() -> Option<String> {
    env::var("TEST_PORT").ok()
}

fn get_test_baud() -> u32 {
    env::var("TEST_BAUD")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(9600)
}

fn is_loopback_enabled() -> bool {
    env::var("TEST_LOOPBACK").ok().as_deref() == Some("1")
}

fn open_test_port() -> Option<Port> {
    let Some(name) = get_test_port() else {
        println!("Skipping hardware test: TEST_PORT not set");
        return None;
    };
    let mut settings = PortSettings::default();
    settings.termios.speed = BitRate::from_baud(get_test_baud()).unwrap();

    let port = Port::new();
    port.open_with(&name, settings)
        .unwrap_or_else(|e| panic!("open {name}: {e}"));
    port.set_timeout(Some(Duration::from_secs(1)));
    Some(port)
}

#[test]
#[ignore] // Run with --ignored flag
fn test_real_port_identity() {
    let Some(port) = open_test_port() else { return };

    println!("{port}");
    let id = port.device_id().expect("device number");
    assert!(id.major > 0);
    assert!(port.device_class_name().is_some());
    for dir in port.sysfs() {
        println!("  sysfs: {}", dir.display());
        assert!(dir.join("dev").exists());
    }
}

#[test]
#[ignore]
fn test_real_port_modem_lines() {
    let Some(port) = open_test_port() else { return };

    port.set_dtr(true).unwrap();
    port.set_rts(true).unwrap();
    let lines = port.modem_lines().unwrap();
    println!("modem lines: {lines:?}");
    port.set_dtr(false).unwrap();
    port.set_rts(false).unwrap();
}

#[test]
#[ignore]
fn test_real_port_loopback() {
    if !is_loopback_enabled() {
        println!("Skipping loopback test: TEST_LOOPBACK not set");
        return;
    }
    let Some(port) = open_test_port() else { return };

    port.reset_input().unwrap();
    let payload = b"sio loopback 0123456789\n";
    assert_eq!(port.send(payload).unwrap(), payload.len());
    port.drain().unwrap();

    let mut buf = vec![0u8; payload.len()];
    assert_eq!(port.recv(&mut buf).unwrap(), payload.len());
    assert_eq!(&buf, payload);
}

#[cfg(feature = "hardware-tests")]
#[test]
#[ignore]
fn test_real_port_low_latency_toggle() {
    let Some(port) = open_test_port() else { return };

    match port.set_low_latency(true) {
        Ok(()) => {
            assert!(port.low_latency().unwrap());
            port.set_low_latency(false).unwrap();
        }
        Err(e) => println!("low latency not supported here: {e}"),
    }
}
