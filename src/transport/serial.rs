//! Serial port transport.

use crate::configuration::{GatewayConfig, Parity};
use crate::error::{Result, X10Error};
use crate::transport::{DataReady, Transport};
use core::fmt;
use serialport::{DataBits, FlowControl, SerialPort, StopBits};
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

struct Monitor {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// CM11A on a serial port, 4800 baud 8N1 by default.
///
/// A background thread watches the port and raises [`DataReady`] when bytes
/// are waiting; it never reads them itself.
pub struct SerialTransport {
    config: GatewayConfig,
    port: Option<Box<dyn SerialPort>>,
    data_ready: Option<DataReady>,
    monitor: Option<Monitor>,
}

impl fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialTransport")
            .field("port", &self.config.port_name)
            .field("baud_rate", &self.config.baud_rate)
            .field("open", &self.port.is_some())
            .field("monitoring", &self.monitor.is_some())
            .finish_non_exhaustive()
    }
}

impl SerialTransport {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            port: None,
            data_ready: None,
            monitor: None,
        }
    }

    fn try_open(&self) -> Result<Box<dyn SerialPort>> {
        let data_bits = match self.config.data_bits {
            5 => DataBits::Five,
            6 => DataBits::Six,
            7 => DataBits::Seven,
            _ => DataBits::Eight,
        };
        let stop_bits = if self.config.stop_bits == 2 {
            StopBits::Two
        } else {
            StopBits::One
        };
        let parity = match self.config.parity {
            Parity::None => serialport::Parity::None,
            Parity::Odd => serialport::Parity::Odd,
            Parity::Even => serialport::Parity::Even,
        };

        serialport::new(&self.config.port_name, self.config.baud_rate)
            .data_bits(data_bits)
            .parity(parity)
            .stop_bits(stop_bits)
            .flow_control(FlowControl::None)
            .timeout(Duration::from_millis(1))
            .open()
            .map_err(|e| match e.kind() {
                serialport::ErrorKind::NoDevice => X10Error::port_in_use(),
                serialport::ErrorKind::Io(std::io::ErrorKind::NotFound) => {
                    X10Error::port_not_found()
                }
                _ => open_failed(e),
            })
    }

    fn port(&mut self) -> Result<&mut Box<dyn SerialPort>> {
        self.port.as_mut().ok_or_else(X10Error::not_open)
    }

    fn start_monitor(&mut self) -> Result<()> {
        let (Some(port), Some(ready)) = (self.port.as_ref(), self.data_ready.clone()) else {
            return Ok(());
        };
        let watched = port.try_clone().map_err(open_failed)?;
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let interval = self.config.poll_increment;

        let handle = thread::Builder::new()
            .name("cm11a-monitor".into())
            .spawn(move || {
                while !flag.load(Ordering::Acquire) {
                    match watched.bytes_to_read() {
                        Ok(n) if n > 0 => ready.notify(),
                        Ok(_) => {}
                        Err(e) => {
                            x10_log!(warn, "Serial monitor stopped: {}", e);
                            break;
                        }
                    }
                    thread::sleep(interval);
                }
            })
            .map_err(open_failed)?;

        self.monitor = Some(Monitor { stop, handle });
        Ok(())
    }

    fn stop_monitor(&mut self) {
        if let Some(monitor) = self.monitor.take() {
            monitor.stop.store(true, Ordering::Release);
            let _ = monitor.handle.join();
        }
    }
}

impl Transport for SerialTransport {
    fn open(&mut self) -> Result<()> {
        if self.port.is_some() {
            return Ok(());
        }

        // A busy port is retried until the budget runs out
        let deadline = Instant::now() + self.config.open_retry;
        let port = loop {
            match self.try_open() {
                Ok(port) => break port,
                Err(e) if matches!(&e, X10Error::Transport(t) if t.is_port_in_use())
                    && Instant::now() < deadline =>
                {
                    x10_log!(debug, "Port {} busy, retrying", self.config.port_name);
                    thread::sleep(self.config.open_retry_step);
                }
                Err(e) => return Err(e),
            }
        };

        x10_log!(
            info,
            "Opened serial port: {} at {} baud",
            self.config.port_name,
            self.config.baud_rate
        );
        self.port = Some(port);
        self.start_monitor()
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        let port = self.port()?;
        port.write_all(data).map_err(send_failed)?;
        port.flush().map_err(send_failed)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let port = self.port()?;
        match port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(receive_failed(e)),
        }
    }

    fn available(&mut self) -> Result<usize> {
        let port = self.port()?;
        port.bytes_to_read()
            .map(|n| n as usize)
            .map_err(receive_failed)
    }

    fn set_data_ready(&mut self, ready: DataReady) {
        self.data_ready = Some(ready);
        if self.port.is_some() && self.monitor.is_none() {
            if let Err(e) = self.start_monitor() {
                x10_log!(warn, "Cannot watch serial port: {}", e);
            }
        }
    }

    fn close(&mut self) {
        self.stop_monitor();
        if self.port.take().is_some() {
            x10_log!(info, "Closed serial port: {}", self.config.port_name);
        }
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        self.close();
    }
}

fn open_failed<E: fmt::Display>(e: E) -> X10Error {
    x10_log!(warn, "Cannot open serial port: {}", e);
    X10Error::open_failed()
}

fn send_failed<E: fmt::Display>(e: E) -> X10Error {
    x10_log!(warn, "Serial write failed: {}", e);
    X10Error::send_failed()
}

fn receive_failed<E: fmt::Display>(e: E) -> X10Error {
    x10_log!(warn, "Serial read failed: {}", e);
    X10Error::receive_failed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_shows_port() {
        let transport = SerialTransport::new(GatewayConfig::default().with_port_name("/dev/ttyS9"));
        let text = format!("{transport:?}");
        assert!(text.starts_with("SerialTransport"));
        assert!(text.contains("/dev/ttyS9"));
        assert!(text.contains("open: false"));
    }

    #[test]
    fn test_io_errors_keep_category() {
        let unplugged = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "unplugged");
        match send_failed(unplugged) {
            X10Error::Transport(e) => assert!(e.is_send_failed()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_closed_port_refuses_io() {
        let mut transport = SerialTransport::new(GatewayConfig::default());
        assert!(transport.write(&[0x00]).is_err());
        assert!(transport.available().is_err());
    }
}
