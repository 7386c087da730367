//! Interactive pump between a command channel and a port.

use super::error::PortError;
use super::traits::SerialPortAdapter;
use std::io;
use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::time::Duration;

const CHUNK: usize = 4096;

/// Shuttle bytes until the port is closed.
///
/// Pending commands are written first. Otherwise whatever the port has
/// received is handed to `sink`, and an idle pump waits up to `idle` for
/// the next command. Once the command sender is gone the pump keeps
/// forwarding input until the port closes.
pub fn interact<P, F>(
    port: &P,
    commands: &Receiver<Vec<u8>>,
    mut sink: F,
    idle: Duration,
) -> io::Result<()>
where
    P: SerialPortAdapter + ?Sized,
    F: FnMut(&[u8]) -> io::Result<()>,
{
    let mut senders_gone = false;
    let mut buf = vec![0u8; CHUNK];

    while port.is_open() {
        if !senders_gone {
            match commands.try_recv() {
                Ok(cmd) => {
                    match port.write_bytes(&cmd) {
                        Err(PortError::NotOpen) => break,
                        Err(e) if e.is_timeout() => {
                            tracing::warn!(sent = e.transferred(), len = cmd.len(), "command write timed out");
                        }
                        Err(e) => return Err(e.into()),
                        Ok(_) => {}
                    }
                    continue;
                }
                Err(TryRecvError::Disconnected) => senders_gone = true,
                Err(TryRecvError::Empty) => {}
            }
        }

        let waiting = match port.bytes_to_read() {
            Ok(n) => n,
            Err(PortError::NotOpen) => break,
            Err(e) => return Err(e.into()),
        };
        if waiting > 0 {
            let want = waiting.min(buf.len());
            match port.read_bytes(&mut buf[..want]) {
                Ok(n) => sink(&buf[..n])?,
                Err(PortError::NotOpen) => break,
                Err(e) if e.is_timeout() => {}
                Err(e) => return Err(e.into()),
            }
            continue;
        }

        if senders_gone {
            std::thread::sleep(idle);
            continue;
        }
        match commands.recv_timeout(idle) {
            Ok(cmd) => match port.write_bytes(&cmd) {
                Err(PortError::NotOpen) => break,
                Err(e) if e.is_timeout() => {
                    tracing::warn!(sent = e.transferred(), len = cmd.len(), "command write timed out");
                }
                Err(e) => return Err(e.into()),
                Ok(_) => {}
            },
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => senders_gone = true,
        }
    }
    tracing::debug!(port = %port.name(), "pump finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::MockSerialPort;
    use std::sync::mpsc;
    use std::thread;

    #[test]
    fn test_commands_written_and_input_forwarded() {
        let port = MockSerialPort::new("MOCK0");
        port.enqueue_read(b"hello\r\n");
        let (tx, rx) = mpsc::channel();
        tx.send(b"AT\r".to_vec()).unwrap();

        let seen = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
        let pump_port = port.clone();
        let pump_seen = seen.clone();
        let handle = thread::spawn(move || {
            interact(
                &pump_port,
                &rx,
                |bytes| {
                    pump_seen.lock().extend_from_slice(bytes);
                    Ok(())
                },
                Duration::from_millis(5),
            )
        });

        let started = std::time::Instant::now();
        while seen.lock().len() < 7 && started.elapsed() < Duration::from_secs(5) {
            thread::sleep(Duration::from_millis(5));
        }
        port.close();
        handle.join().unwrap().unwrap();

        assert_eq!(port.written(), b"AT\r");
        assert_eq!(seen.lock().as_slice(), b"hello\r\n");
        drop(tx);
    }

    #[test]
    fn test_sink_error_stops_pump() {
        let port = MockSerialPort::new("MOCK0");
        port.enqueue_read(b"x");
        let (_tx, rx) = mpsc::channel::<Vec<u8>>();

        let err = interact(
            &port,
            &rx,
            |_| Err(io::Error::new(io::ErrorKind::BrokenPipe, "stdout closed")),
            Duration::from_millis(5),
        )
        .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn test_closed_port_returns_immediately() {
        let port = MockSerialPort::new("MOCK0");
        port.close();
        let (_tx, rx) = mpsc::channel::<Vec<u8>>();
        interact(&port, &rx, |_| Ok(()), Duration::from_secs(60)).unwrap();
    }
}
