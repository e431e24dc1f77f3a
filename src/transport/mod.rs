//! Serial transport abstraction.
//!
//! The driver talks to the interface through the [`Transport`] trait, so the
//! protocol logic runs unchanged against a real serial port
//! ([`SerialTransport`], feature `serial`) or a scripted [`MockTransport`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use x10_cm11a::{Cm11a, GatewayConfig, MockTransport};
//!
//! // Testing: scripted interface
//! let mock = MockTransport::new().with_handshake();
//! let mut gateway = Cm11a::new(GatewayConfig::default(), mock.clone());
//! gateway.allocate()?;
//! # Ok::<(), x10_cm11a::X10Error>(())
//! ```

pub mod mock;
#[cfg(feature = "serial")]
pub mod serial;

pub use mock::MockTransport;
#[cfg(feature = "serial")]
pub use serial::SerialTransport;

use crate::error::Result;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// Wake-up signal shared between a transport and the driver's worker.
///
/// A transport calls [`DataReady::notify`] whenever bytes arrive. The
/// notification only sets a flag; all reading happens on the worker thread.
#[derive(Debug, Clone, Default)]
pub struct DataReady {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl DataReady {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wake the worker.
    pub fn notify(&self) {
        let (flag, condvar) = &*self.inner;
        // A poisoned flag still carries a valid bool
        let mut ready = flag.lock().unwrap_or_else(|e| e.into_inner());
        *ready = true;
        condvar.notify_all();
    }

    /// Block until notified or `timeout` elapses, then clear the flag.
    ///
    /// Returns `true` if a notification was pending.
    pub(crate) fn wait_timeout(&self, timeout: Duration) -> bool {
        let (flag, condvar) = &*self.inner;
        let guard = flag.lock().unwrap_or_else(|e| e.into_inner());
        let (mut ready, _) = condvar
            .wait_timeout_while(guard, timeout, |ready| !*ready)
            .unwrap_or_else(|e| e.into_inner());
        let was_ready = *ready;
        *ready = false;
        was_ready
    }
}

/// Byte stream to the interface.
///
/// All methods are called from the driver's worker thread, except
/// [`Transport::open`] and [`Transport::close`] which the driver calls on
/// allocation and deallocation.
pub trait Transport: Send + 'static {
    /// Open the underlying port.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the port does not exist, stays busy or
    /// cannot be configured.
    fn open(&mut self) -> Result<()>;

    /// Write all of `data`.
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Read what is available without blocking. Returns the number of bytes
    /// copied into `buf`, possibly zero.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Number of bytes that can be read without blocking.
    fn available(&mut self) -> Result<usize>;

    /// Register the signal to raise when data arrives.
    fn set_data_ready(&mut self, ready: DataReady);

    /// Release the port. Closing twice is harmless.
    fn close(&mut self) {}
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn open(&mut self) -> Result<()> {
        (**self).open()
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        (**self).write(data)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read(buf)
    }

    fn available(&mut self) -> Result<usize> {
        (**self).available()
    }

    fn set_data_ready(&mut self, ready: DataReady) {
        (**self).set_data_ready(ready);
    }

    fn close(&mut self) {
        (**self).close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_data_ready_times_out() {
        let ready = DataReady::new();
        assert!(!ready.wait_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn test_data_ready_pending_notification() {
        let ready = DataReady::new();
        ready.notify();
        assert!(ready.wait_timeout(Duration::from_millis(10)));
        // flag is cleared by the wait
        assert!(!ready.wait_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn test_data_ready_across_threads() {
        let ready = DataReady::new();
        let remote = ready.clone();
        let handle = thread::spawn(move || remote.notify());
        assert!(ready.wait_timeout(Duration::from_secs(5)));
        handle.join().unwrap();
    }
}
