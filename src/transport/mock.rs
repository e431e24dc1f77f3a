//! Mock transport for testing.
//!
//! [`MockTransport`] is a cloneable handle: give one clone to the driver and
//! keep another in the test to inject unsolicited bytes and inspect what was
//! written.
//!
//! ## Example
//!
//! ```rust
//! use x10_cm11a::transport::{MockTransport, Transport};
//!
//! let mut mock = MockTransport::new();
//! mock.reply_to(&[0x8B], &[0u8; 14]);
//!
//! mock.open().unwrap();
//! mock.write(&[0x8B]).unwrap();
//! assert_eq!(mock.available().unwrap(), 14);
//! assert_eq!(mock.sent(), vec![vec![0x8B]]);
//! ```

use crate::error::{Result, X10Error};
use crate::protocol::constants::{INTERFACE_READY, TRANSMISSION_OK};
use crate::protocol::packet::checksum;
use crate::transport::{DataReady, Transport};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug)]
struct ReplyRule {
    written: Vec<u8>,
    reply: Vec<u8>,
    /// `None` for a rule that never expires
    remaining: Option<usize>,
}

#[derive(Debug, Default)]
struct MockState {
    /// Bytes waiting to be read by the driver
    inbound: VecDeque<u8>,
    /// Every `write()` call, in order
    sent: Vec<Vec<u8>>,
    rules: Vec<ReplyRule>,
    /// Answer transmissions with checksum and ready byte
    handshake: bool,
    /// Number of upcoming writes that fail
    failing_writes: usize,
    fail_open: bool,
    open: bool,
    open_count: usize,
    close_count: usize,
    data_ready: Option<DataReady>,
}

/// Scripted stand-in for the interface.
///
/// Replies are produced synchronously on `write()`:
/// - explicit rules added with [`MockTransport::reply_to`] or
///   [`MockTransport::reply_once`] are checked first, in the order added
/// - with [`MockTransport::with_handshake`] a 2- or 4-byte transmission is
///   answered with its checksum and a `0x00` acknowledgement with `0x55`
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emulate the interface's transmission handshake.
    #[must_use]
    pub fn with_handshake(self) -> Self {
        self.lock().handshake = true;
        self
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Reply with `reply` every time exactly `written` is written.
    pub fn reply_to(&self, written: &[u8], reply: &[u8]) {
        self.add_rule(written, reply, None);
    }

    /// Reply with `reply` the next time exactly `written` is written.
    pub fn reply_once(&self, written: &[u8], reply: &[u8]) {
        self.add_rule(written, reply, Some(1));
    }

    fn add_rule(&self, written: &[u8], reply: &[u8], remaining: Option<usize>) {
        self.lock().rules.push(ReplyRule {
            written: written.to_vec(),
            reply: reply.to_vec(),
            remaining,
        });
    }

    /// Queue unsolicited bytes and wake the driver.
    pub fn inject(&self, bytes: &[u8]) {
        let ready = {
            let mut state = self.lock();
            state.inbound.extend(bytes.iter().copied());
            state.data_ready.clone()
        };
        if let Some(ready) = ready {
            ready.notify();
        }
    }

    /// Make the next `count` writes fail.
    pub fn fail_writes(&self, count: usize) {
        self.lock().failing_writes = count;
    }

    /// Make `open()` fail with a port-not-found error.
    pub fn fail_open(&self, fail: bool) {
        self.lock().fail_open = fail;
    }

    /// Every successful `write()` so far.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.lock().sent.clone()
    }

    /// Number of writes equal to `packet`.
    pub fn count_sent(&self, packet: &[u8]) -> usize {
        self.lock().sent.iter().filter(|p| p.as_slice() == packet).count()
    }

    pub fn clear_sent(&self) {
        self.lock().sent.clear();
    }

    /// Bytes injected or replied but not read yet.
    pub fn pending(&self) -> usize {
        self.lock().inbound.len()
    }

    pub fn is_open(&self) -> bool {
        self.lock().open
    }

    pub fn open_count(&self) -> usize {
        self.lock().open_count
    }

    pub fn close_count(&self) -> usize {
        self.lock().close_count
    }
}

impl MockState {
    fn reply_for(&mut self, data: &[u8]) -> Option<Vec<u8>> {
        if let Some(index) = self.rules.iter().position(|rule| rule.written == data) {
            let rule = &mut self.rules[index];
            let reply = rule.reply.clone();
            if let Some(remaining) = rule.remaining.as_mut() {
                *remaining -= 1;
                if *remaining == 0 {
                    self.rules.remove(index);
                }
            }
            return Some(reply);
        }

        if self.handshake {
            match data {
                [TRANSMISSION_OK] => return Some(vec![INTERFACE_READY]),
                [_, _] | [_, _, _, _] => return Some(vec![checksum(data)]),
                _ => {}
            }
        }
        None
    }
}

impl Transport for MockTransport {
    fn open(&mut self) -> Result<()> {
        let mut state = self.lock();
        if state.fail_open {
            return Err(X10Error::port_not_found());
        }
        state.open = true;
        state.open_count += 1;
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        let mut state = self.lock();
        if !state.open {
            return Err(X10Error::not_open());
        }
        if state.failing_writes > 0 {
            state.failing_writes -= 1;
            return Err(X10Error::send_failed());
        }
        state.sent.push(data.to_vec());
        if let Some(reply) = state.reply_for(data) {
            state.inbound.extend(reply);
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut state = self.lock();
        let count = buf.len().min(state.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(state.inbound.drain(..count)) {
            *slot = byte;
        }
        Ok(count)
    }

    fn available(&mut self) -> Result<usize> {
        Ok(self.lock().inbound.len())
    }

    fn set_data_ready(&mut self, ready: DataReady) {
        self.lock().data_ready = Some(ready);
    }

    fn close(&mut self) {
        let mut state = self.lock();
        if state.open {
            state.open = false;
            state.close_count += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opened() -> MockTransport {
        let mut mock = MockTransport::new();
        mock.open().unwrap();
        mock
    }

    #[test]
    fn test_write_requires_open() {
        let mut mock = MockTransport::new();
        assert!(mock.write(&[0x8B]).is_err());
    }

    #[test]
    fn test_reply_once_then_expires() {
        let mut mock = opened();
        mock.reply_once(&[0x8B], &[1, 2]);
        mock.write(&[0x8B]).unwrap();
        mock.write(&[0x8B]).unwrap();
        assert_eq!(mock.available().unwrap(), 2);

        let mut buf = [0u8; 8];
        assert_eq!(mock.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], &[1, 2]);
        assert_eq!(mock.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_handshake_emulation() {
        let mut mock = opened().with_handshake();
        mock.write(&[0x04, 0x66]).unwrap();
        mock.write(&[TRANSMISSION_OK]).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(mock.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], &[0x6A, INTERFACE_READY]);
    }

    #[test]
    fn test_rules_take_precedence_over_handshake() {
        let mut mock = opened().with_handshake();
        mock.reply_once(&[0x04, 0x66], &[0xA5]);
        mock.write(&[0x04, 0x66]).unwrap();
        mock.write(&[0x04, 0x66]).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(mock.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], &[0xA5, 0x6A]);
    }

    #[test]
    fn test_failing_writes() {
        let mut mock = opened();
        mock.fail_writes(1);
        assert!(mock.write(&[0x00]).is_err());
        assert!(mock.write(&[0x00]).is_ok());
        assert_eq!(mock.sent(), vec![vec![0x00]]);
    }

    #[test]
    fn test_inject_notifies() {
        let mut mock = opened();
        let ready = DataReady::new();
        mock.set_data_ready(ready.clone());
        mock.inject(&[0xA5]);
        assert!(ready.wait_timeout(std::time::Duration::from_millis(10)));
        assert_eq!(mock.pending(), 1);
    }

    #[test]
    fn test_close_counts_once() {
        let mut mock = opened();
        mock.close();
        mock.close();
        assert_eq!(mock.close_count(), 1);
        assert!(!mock.is_open());
    }
}
