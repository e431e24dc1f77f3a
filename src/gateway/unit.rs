//! Transmission units and the request/response exchanges they perform.
//!
//! ```text
//! StatusRequest     PC: 0x8B              CM11A: 14 status bytes
//! EventTransmit     PC: packet            CM11A: checksum
//!                   PC: 0x00              CM11A: 0x55
//! ClockDownload     PC: 7-byte packet
//! MacroPageDownload PC: 19-byte packet
//! Standard          PC: raw bytes (ring enable/disable)
//! ```
//!
//! An unsolicited marker arriving where a reply is expected interrupts the
//! exchange with [`X10Error::Interrupted`].

use crate::configuration::GatewayConfig;
use crate::error::{Result, X10Error};
use crate::gateway::listener::StatusListener;
use crate::protocol::constants::{
    is_unsolicited, CLOCK_PACKET_SIZE, INTERFACE_READY, PAGE_PACKET_SIZE, STATUS_REQUEST,
    STATUS_SIZE, TRANSMISSION_OK,
};
use crate::protocol::event::X10Event;
use crate::protocol::packet::{checksum, encode_event};
use crate::protocol::status::{decode_status, DeviceStatus};
use crate::transport::Transport;
use core::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Raw request bytes of a standard unit.
pub(crate) type StandardPacket = heapless::Vec<u8, 8>;

/// What a unit sends.
pub(crate) enum UnitKind {
    StatusRequest {
        listener: Option<Arc<dyn StatusListener>>,
    },
    ClockDownload([u8; CLOCK_PACKET_SIZE]),
    MacroPageDownload([u8; PAGE_PACKET_SIZE]),
    EventTransmit(X10Event),
    Standard(StandardPacket),
}

impl fmt::Debug for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StatusRequest { listener } => f
                .debug_struct("StatusRequest")
                .field("listener", &listener.is_some())
                .finish(),
            Self::ClockDownload(packet) => f.debug_tuple("ClockDownload").field(packet).finish(),
            Self::MacroPageDownload(packet) => f
                .debug_tuple("MacroPageDownload")
                .field(&[packet[1], packet[2]])
                .finish(),
            Self::EventTransmit(event) => f.debug_tuple("EventTransmit").field(event).finish(),
            Self::Standard(packet) => f.debug_tuple("Standard").field(packet).finish(),
        }
    }
}

/// Result of a completed exchange.
#[derive(Debug)]
pub(crate) enum Completed {
    Status(DeviceStatus),
    Transmitted(X10Event),
    Written,
}

/// One queued request with its retry budget.
#[derive(Debug)]
pub(crate) struct TransmissionUnit {
    pub(crate) kind: UnitKind,
    pub(crate) attempts: u8,
    pub(crate) max_attempts: u8,
}

impl TransmissionUnit {
    pub(crate) fn new(kind: UnitKind, max_attempts: u8) -> Self {
        Self {
            kind,
            attempts: 0,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Count a failed attempt. Returns `true` when the budget is spent.
    pub(crate) fn record_failure(&mut self) -> bool {
        self.attempts = self.attempts.saturating_add(1);
        self.attempts >= self.max_attempts
    }

    /// Run the exchange once.
    pub(crate) fn execute<T: Transport>(&self, link: &mut Link<'_, T>) -> Result<Completed> {
        match &self.kind {
            UnitKind::StatusRequest { .. } => request_status(link).map(Completed::Status),
            UnitKind::EventTransmit(event) => {
                transmit_event(link, event)?;
                Ok(Completed::Transmitted(*event))
            }
            UnitKind::ClockDownload(packet) => link.write(packet).map(|()| Completed::Written),
            UnitKind::MacroPageDownload(packet) => {
                link.write(packet).map(|()| Completed::Written)
            }
            UnitKind::Standard(packet) => link.write(packet).map(|()| Completed::Written),
        }
    }
}

/// Bounded I/O on the transport, used only from the worker thread.
pub(crate) struct Link<'a, T: Transport> {
    pub(crate) transport: &'a mut T,
    pub(crate) config: &'a GatewayConfig,
    pub(crate) interrupt: &'a AtomicBool,
}

impl<'a, T: Transport> Link<'a, T> {
    pub(crate) fn new(
        transport: &'a mut T,
        config: &'a GatewayConfig,
        interrupt: &'a AtomicBool,
    ) -> Self {
        Self {
            transport,
            config,
            interrupt,
        }
    }

    pub(crate) fn write(&mut self, data: &[u8]) -> Result<()> {
        x10_log!(trace, "PC->CM11A: {:02X?}", data);
        self.transport.write(data)
    }

    pub(crate) fn available(&mut self) -> Result<usize> {
        self.transport.available()
    }

    /// Poll until `count` bytes are available or the I/O timeout passes.
    /// Returns the number available at that point.
    pub(crate) fn wait_for(&mut self, count: usize) -> Result<usize> {
        let step = self.config.poll_increment.max(Duration::from_millis(1));
        let mut waited = Duration::ZERO;
        loop {
            let available = self.transport.available()?;
            if available >= count || waited >= self.config.io_timeout {
                return Ok(available);
            }
            if self.interrupt.load(Ordering::Acquire) {
                return Err(X10Error::Timeout);
            }
            thread::sleep(step);
            waited += step;
        }
    }

    /// Read one byte, waiting up to the I/O timeout.
    pub(crate) fn read_byte(&mut self) -> Result<u8> {
        if self.wait_for(1)? == 0 {
            return Err(X10Error::short_read());
        }
        let mut byte = [0u8; 1];
        if self.transport.read(&mut byte)? != 1 {
            return Err(X10Error::short_read());
        }
        x10_log!(trace, "CM11A->PC: {:02X}", byte[0]);
        Ok(byte[0])
    }

    /// Fill `buf` from bytes that are already available.
    pub(crate) fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.transport.read(&mut buf[filled..])?;
            if n == 0 {
                return Err(X10Error::short_read());
            }
            filled += n;
        }
        x10_log!(trace, "CM11A->PC: {:02X?}", buf);
        Ok(())
    }

    /// Discard everything currently buffered. Returns the number of bytes
    /// dropped.
    pub(crate) fn drain(&mut self) -> usize {
        let mut scratch = [0u8; 32];
        let mut dropped = 0;
        while let Ok(n) = self.transport.read(&mut scratch) {
            if n == 0 {
                break;
            }
            dropped += n;
        }
        dropped
    }
}

fn request_status<T: Transport>(link: &mut Link<'_, T>) -> Result<DeviceStatus> {
    link.write(&[STATUS_REQUEST])?;

    let mut buf = [0u8; STATUS_SIZE];
    if link.wait_for(STATUS_SIZE)? >= STATUS_SIZE {
        link.read_exact(&mut buf)?;
    } else {
        let first = link.read_byte()?;
        if is_unsolicited(first) {
            return Err(X10Error::Interrupted(first));
        }
        buf[0] = first;
        if link.available()? < STATUS_SIZE - 1 {
            return Err(X10Error::desynchronized());
        }
        link.read_exact(&mut buf[1..])?;
    }
    decode_status(&buf)
}

fn transmit_event<T: Transport>(link: &mut Link<'_, T>, event: &X10Event) -> Result<()> {
    let packet = encode_event(event);
    let expected = checksum(&packet);
    link.write(&packet)?;

    let reply = link.read_byte()?;
    if reply != expected {
        if is_unsolicited(reply) {
            return Err(X10Error::Interrupted(reply));
        }
        x10_log!(
            debug,
            "Checksum mismatch: expected {:02X}, got {:02X}",
            expected,
            reply
        );
        return Err(X10Error::checksum_mismatch());
    }

    link.write(&[TRANSMISSION_OK])?;
    let ready = link.read_byte()?;
    if ready != INTERFACE_READY {
        if is_unsolicited(ready) {
            return Err(X10Error::Interrupted(ready));
        }
        return Err(X10Error::not_ready());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addressing::{DeviceCode, HouseCode};
    use crate::protocol::constants::POWER_FAILURE;
    use crate::transport::MockTransport;

    fn config() -> GatewayConfig {
        GatewayConfig::default()
            .with_poll_increment(Duration::from_millis(1))
            .with_io_timeout(Duration::from_millis(20))
    }

    fn opened() -> MockTransport {
        let mut mock = MockTransport::new();
        mock.open().unwrap();
        mock
    }

    fn address_event() -> X10Event {
        X10Event::address(HouseCode::A, DeviceCode::new(1).unwrap())
    }

    #[test]
    fn test_status_request_full_reply() {
        let mut mock = opened();
        mock.reply_to(&[STATUS_REQUEST], &[0xFF, 0xFF, 0, 0, 0, 5, 1, 0x60, 0, 0, 1, 0, 0, 0]);
        let config = config();
        let interrupt = AtomicBool::new(false);
        let mut link = Link::new(&mut mock, &config, &interrupt);

        let unit = TransmissionUnit::new(UnitKind::StatusRequest { listener: None }, 3);
        match unit.execute(&mut link).unwrap() {
            Completed::Status(status) => assert_eq!(status.julian_day, 5),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_status_request_interrupted() {
        let mut mock = opened();
        mock.reply_to(&[STATUS_REQUEST], &[POWER_FAILURE]);
        let config = config();
        let interrupt = AtomicBool::new(false);
        let mut link = Link::new(&mut mock, &config, &interrupt);

        let unit = TransmissionUnit::new(UnitKind::StatusRequest { listener: None }, 3);
        let err = unit.execute(&mut link).unwrap_err();
        assert_eq!(err.interrupted_by(), Some(POWER_FAILURE));
    }

    #[test]
    fn test_status_request_desync() {
        let mut mock = opened();
        mock.reply_to(&[STATUS_REQUEST], &[0x01, 0x02, 0x03]);
        let config = config();
        let interrupt = AtomicBool::new(false);
        let mut link = Link::new(&mut mock, &config, &interrupt);

        let unit = TransmissionUnit::new(UnitKind::StatusRequest { listener: None }, 3);
        let err = unit.execute(&mut link).unwrap_err();
        assert!(matches!(err, X10Error::Protocol(ref e) if e.is_desynchronized()));
        assert_eq!(link.drain(), 2);
    }

    #[test]
    fn test_event_transmit_handshake() {
        let mut mock = opened().with_handshake();
        let config = config();
        let interrupt = AtomicBool::new(false);
        let mut link = Link::new(&mut mock, &config, &interrupt);

        let unit = TransmissionUnit::new(UnitKind::EventTransmit(address_event()), 3);
        assert!(matches!(
            unit.execute(&mut link).unwrap(),
            Completed::Transmitted(_)
        ));
        assert_eq!(mock.sent(), vec![vec![0x04, 0x66], vec![TRANSMISSION_OK]]);
    }

    #[test]
    fn test_event_transmit_bad_checksum() {
        let mut mock = opened();
        mock.reply_to(&[0x04, 0x66], &[0x00]);
        let config = config();
        let interrupt = AtomicBool::new(false);
        let mut link = Link::new(&mut mock, &config, &interrupt);

        let unit = TransmissionUnit::new(UnitKind::EventTransmit(address_event()), 3);
        let err = unit.execute(&mut link).unwrap_err();
        assert!(matches!(err, X10Error::Protocol(ref e) if e.is_checksum_mismatch()));
    }

    #[test]
    fn test_event_transmit_no_reply_is_short_read() {
        let mut mock = opened();
        let config = config();
        let interrupt = AtomicBool::new(false);
        let mut link = Link::new(&mut mock, &config, &interrupt);

        let unit = TransmissionUnit::new(UnitKind::EventTransmit(address_event()), 3);
        assert!(unit.execute(&mut link).is_err());
    }

    #[test]
    fn test_interrupt_flag_aborts_wait() {
        let mut mock = opened();
        let config = config().with_io_timeout(Duration::from_secs(60));
        let interrupt = AtomicBool::new(true);
        let mut link = Link::new(&mut mock, &config, &interrupt);
        assert!(matches!(link.wait_for(1), Err(X10Error::Timeout)));
    }

    #[test]
    fn test_record_failure_budget() {
        let mut unit = TransmissionUnit::new(UnitKind::Standard(StandardPacket::new()), 3);
        assert!(!unit.record_failure());
        assert!(!unit.record_failure());
        assert!(unit.record_failure());
    }
}
