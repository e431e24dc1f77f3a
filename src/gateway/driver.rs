//! CM11A driver handle.

use crate::configuration::GatewayConfig;
use crate::eeprom::{EepromImage, MacroCatalog};
use crate::error::{Result, X10Error};
use crate::gateway::listener::{AddressListener, FunctionListener, GatewayListener, StatusListener};
use crate::gateway::state::{Allocation, GatewayState};
use crate::gateway::unit::{StandardPacket, TransmissionUnit, UnitKind};
use crate::gateway::worker::{Shared, Worker};
use crate::protocol::constants::{RING_DISABLE, RING_ENABLE};
use crate::protocol::event::X10Event;
use crate::protocol::packet::ClockSettings;
use crate::protocol::status::DeviceStatus;
use crate::transport::Transport;
use core::fmt;
use std::sync::atomic::Ordering;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Driver for one CM11A interface.
///
/// Requests are queued and executed in order on a worker thread that owns
/// the transport while the driver is allocated. Results reach the
/// application through listeners.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use x10_cm11a::{Cm11a, DeviceCode, GatewayConfig, HouseCode, MockTransport, X10Event};
///
/// let mock = MockTransport::new().with_handshake();
/// let mut gateway = Cm11a::new(GatewayConfig::default(), mock.clone());
/// gateway.allocate()?;
///
/// let lamp = DeviceCode::new(3)?;
/// gateway.transmit(X10Event::address(HouseCode::A, lamp))?;
///
/// gateway.deallocate()?;
/// # Ok::<(), x10_cm11a::X10Error>(())
/// ```
pub struct Cm11a<T: Transport> {
    shared: Arc<Shared>,
    /// Held here while deallocated, by the worker while allocated
    transport: Option<T>,
    worker: Option<(JoinHandle<T>, Receiver<()>)>,
}

impl<T: Transport> fmt::Debug for Cm11a<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cm11a")
            .field("port", &self.shared.config.port_name)
            .field("state", &self.shared.state())
            .field("queued", &self.shared.queue_len())
            .finish_non_exhaustive()
    }
}

impl<T: Transport> Cm11a<T> {
    pub fn new(config: GatewayConfig, transport: T) -> Self {
        Self {
            shared: Arc::new(Shared::new(config)),
            transport: Some(transport),
            worker: None,
        }
    }

    /// Open the transport, start the worker and request a first status.
    ///
    /// Allocating an allocated driver does nothing.
    ///
    /// # Errors
    ///
    /// Returns the transport's error if the port cannot be opened, or a
    /// gateway error if the driver is changing state or the worker cannot
    /// be started. The driver is left deallocated on failure.
    pub fn allocate(&mut self) -> Result<()> {
        match self.shared.state().allocation {
            Allocation::Allocated => return Ok(()),
            Allocation::Allocating => return Err(X10Error::allocating()),
            Allocation::Deallocating => return Err(X10Error::deallocating()),
            Allocation::Deallocated => {}
        }
        // Gone if an earlier worker had to be abandoned
        let Some(mut transport) = self.transport.take() else {
            return Err(X10Error::not_open());
        };

        self.shared.set_allocation(Allocation::Allocating);
        transport.set_data_ready(self.shared.data_ready.clone());
        if let Err(e) = transport.open() {
            x10_log!(error, "Cannot open {}: {}", self.shared.config.port_name, e);
            self.transport = Some(transport);
            self.shared.set_allocation(Allocation::Deallocated);
            return Err(e);
        }

        self.shared.shutdown.store(false, Ordering::Release);
        self.shared.interrupt.store(false, Ordering::Release);

        let (done, finished) = mpsc::channel();
        let worker = Worker {
            transport,
            shared: Arc::clone(&self.shared),
            done,
        };
        let handle = thread::Builder::new()
            .name("cm11a-worker".into())
            .spawn(move || worker.run());
        match handle {
            Ok(handle) => self.worker = Some((handle, finished)),
            Err(e) => {
                x10_log!(error, "Cannot start worker: {}", e);
                self.shared.set_allocation(Allocation::Deallocated);
                return Err(X10Error::worker_spawn_failed());
            }
        }

        self.shared.set_allocation(Allocation::Allocated);
        x10_log!(info, "Allocated {}", self.shared.config.port_name);
        self.shared.enqueue(UnitKind::StatusRequest { listener: None });
        Ok(())
    }

    /// Stop the worker and close the transport.
    ///
    /// Waits up to the configured join timeout for the worker to finish its
    /// current unit. A worker that does not finish in time is interrupted
    /// and detached; the transport goes with it. Queued units stay queued.
    ///
    /// # Errors
    ///
    /// Returns a gateway error if the driver is already changing state.
    pub fn deallocate(&mut self) -> Result<()> {
        match self.shared.state().allocation {
            Allocation::Deallocated => return Ok(()),
            Allocation::Allocating => return Err(X10Error::allocating()),
            Allocation::Deallocating => return Err(X10Error::deallocating()),
            Allocation::Allocated => {}
        }

        self.shared.set_allocation(Allocation::Deallocating);
        self.shared.shutdown.store(true, Ordering::Release);
        self.shared.data_ready.notify();

        if let Some((handle, finished)) = self.worker.take() {
            match finished.recv_timeout(self.shared.config.join_timeout) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => match handle.join() {
                    Ok(mut transport) => {
                        transport.close();
                        self.transport = Some(transport);
                    }
                    Err(_) => x10_log!(error, "Worker panicked"),
                },
                Err(RecvTimeoutError::Timeout) => {
                    self.shared.interrupt.store(true, Ordering::Release);
                    x10_log!(
                        warn,
                        "Worker still busy after {:?}, detaching",
                        self.shared.config.join_timeout
                    );
                }
            }
        }

        self.shared.set_allocation(Allocation::Deallocated);
        x10_log!(info, "Deallocated {}", self.shared.config.port_name);
        Ok(())
    }

    fn ensure_allocated(&self) -> Result<()> {
        match self.shared.state().allocation {
            Allocation::Allocated => Ok(()),
            Allocation::Allocating => Err(X10Error::allocating()),
            Allocation::Deallocating => Err(X10Error::deallocating()),
            Allocation::Deallocated => Err(X10Error::not_allocated()),
        }
    }

    /// Queue an address or function event for the power line.
    ///
    /// The event reaches address and function listeners once the interface
    /// has acknowledged it.
    pub fn transmit(&self, event: X10Event) -> Result<()> {
        self.ensure_allocated()?;
        self.shared.enqueue(UnitKind::EventTransmit(event));
        Ok(())
    }

    /// Queue several events under one queue lock, keeping their order.
    pub fn transmit_all(&self, events: &[X10Event]) -> Result<()> {
        self.ensure_allocated()?;
        let max = self.shared.config.max_attempts;
        self.shared.enqueue_all(
            events
                .iter()
                .map(|event| TransmissionUnit::new(UnitKind::EventTransmit(*event), max)),
        );
        Ok(())
    }

    /// Queue a status request. The result goes to every status listener.
    pub fn update_status(&self) -> Result<()> {
        self.ensure_allocated()?;
        self.shared.enqueue(UnitKind::StatusRequest { listener: None });
        Ok(())
    }

    /// Queue a status request whose result also goes to `listener`.
    pub fn update_status_with(&self, listener: Arc<dyn StatusListener>) -> Result<()> {
        self.ensure_allocated()?;
        self.shared.enqueue(UnitKind::StatusRequest {
            listener: Some(listener),
        });
        Ok(())
    }

    /// Queue a clock download.
    pub fn set_clock(&self, clock: &ClockSettings) -> Result<()> {
        self.ensure_allocated()?;
        self.shared.enqueue(UnitKind::ClockDownload(clock.to_packet()));
        Ok(())
    }

    /// Queue a clock download from the local wall clock.
    pub fn set_clock_now(&self) -> Result<()> {
        let house = self
            .last_status()
            .map_or(crate::addressing::HouseCode::A, |status| {
                status.monitored_house_code
            });
        self.set_clock(&ClockSettings::now(house))
    }

    /// Allow the interface to signal incoming calls.
    pub fn ring_enable(&self) -> Result<()> {
        self.send_standard(&[RING_ENABLE])
    }

    /// Stop the interface from signalling incoming calls.
    pub fn ring_disable(&self) -> Result<()> {
        self.send_standard(&[RING_DISABLE])
    }

    fn send_standard(&self, bytes: &[u8]) -> Result<()> {
        self.ensure_allocated()?;
        let packet = StandardPacket::from_slice(bytes).map_err(|overflow| {
            x10_log!(warn, "Rejected {}-byte packet: {:?}", bytes.len(), overflow);
            X10Error::packet_too_large()
        })?;
        self.shared.enqueue(UnitKind::Standard(packet));
        Ok(())
    }

    /// Program the interface's EEPROM with `catalog`.
    ///
    /// The image is encoded before anything is queued; all of its pages are
    /// then queued together and the table used to replay macro-initiated
    /// notifications is replaced.
    ///
    /// # Errors
    ///
    /// Returns a capacity error if the image does not fit in the EEPROM.
    /// Nothing is queued in that case.
    pub fn download_initiators(&self, catalog: &MacroCatalog) -> Result<()> {
        let image = EepromImage::encode(catalog)?;
        let max = self.shared.config.max_attempts;
        x10_log!(
            info,
            "Downloading {} macros in {} bytes",
            image.macro_count(),
            image.len()
        );
        self.shared.enqueue_all(
            image
                .pages()
                .map(|page| TransmissionUnit::new(UnitKind::MacroPageDownload(page), max)),
        );
        self.shared.replace_offsets(image.into_offset_table());
        Ok(())
    }

    pub fn state(&self) -> GatewayState {
        self.shared.state()
    }

    /// Most recent status decoded by the worker.
    pub fn last_status(&self) -> Option<DeviceStatus> {
        self.shared.last_status()
    }

    /// Number of units waiting, including one being retried.
    pub fn queue_len(&self) -> usize {
        self.shared.queue_len()
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.shared.config
    }

    /// Set whether the clock is reloaded after a power failure.
    pub fn set_power_failure_auto_recover(&self, enabled: bool) {
        self.shared.auto_recover.store(enabled, Ordering::Release);
    }

    pub fn power_failure_auto_recover(&self) -> bool {
        self.shared.auto_recover.load(Ordering::Acquire)
    }

    pub fn add_status_listener(&self, listener: Arc<dyn StatusListener>) -> bool {
        self.shared.listeners.status.add(listener)
    }

    pub fn remove_status_listener(&self, listener: &Arc<dyn StatusListener>) -> bool {
        self.shared.listeners.status.remove(listener)
    }

    pub fn add_address_listener(&self, listener: Arc<dyn AddressListener>) -> bool {
        self.shared.listeners.address.add(listener)
    }

    pub fn remove_address_listener(&self, listener: &Arc<dyn AddressListener>) -> bool {
        self.shared.listeners.address.remove(listener)
    }

    pub fn add_function_listener(&self, listener: Arc<dyn FunctionListener>) -> bool {
        self.shared.listeners.function.add(listener)
    }

    pub fn remove_function_listener(&self, listener: &Arc<dyn FunctionListener>) -> bool {
        self.shared.listeners.function.remove(listener)
    }

    pub fn add_gateway_listener(&self, listener: Arc<dyn GatewayListener>) -> bool {
        self.shared.listeners.gateway.add(listener)
    }

    pub fn remove_gateway_listener(&self, listener: &Arc<dyn GatewayListener>) -> bool {
        self.shared.listeners.gateway.remove(listener)
    }
}

impl<T: Transport> Drop for Cm11a<T> {
    fn drop(&mut self) {
        if let Err(e) = self.deallocate() {
            x10_log!(warn, "Deallocate on drop failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addressing::{DeviceCode, HouseCode};
    use crate::gateway::listener::GatewayEvent;
    use crate::gateway::state::QueueState;
    use crate::transport::MockTransport;
    use std::time::Duration;

    fn config() -> GatewayConfig {
        GatewayConfig::default()
            .with_poll_increment(Duration::from_millis(1))
            .with_io_timeout(Duration::from_millis(20))
            .with_join_timeout(Duration::from_secs(2))
    }

    #[test]
    fn test_requests_need_allocation() {
        let gateway = Cm11a::new(config(), MockTransport::new());
        let event = X10Event::address(HouseCode::A, DeviceCode::new(1).unwrap());
        match gateway.transmit(event) {
            Err(X10Error::Gateway(e)) => assert!(e.is_not_allocated()),
            other => panic!("unexpected {other:?}"),
        }
        assert!(gateway.update_status().is_err());
        assert!(gateway.ring_enable().is_err());
        assert_eq!(gateway.queue_len(), 0);
    }

    #[test]
    fn test_failed_open_leaves_deallocated() {
        let mock = MockTransport::new();
        mock.fail_open(true);
        let mut gateway = Cm11a::new(config(), mock.clone());
        assert!(gateway.allocate().is_err());
        assert_eq!(gateway.state(), GatewayState::INITIAL);

        // The transport is kept for another try
        mock.fail_open(false);
        gateway.allocate().unwrap();
        assert!(gateway.state().is_allocated());
        gateway.deallocate().unwrap();
    }

    #[test]
    fn test_allocate_twice_is_noop() {
        let mock = MockTransport::new();
        let mut gateway = Cm11a::new(config(), mock.clone());
        gateway.allocate().unwrap();
        gateway.allocate().unwrap();
        assert_eq!(mock.open_count(), 1);
        gateway.deallocate().unwrap();
        assert_eq!(mock.close_count(), 1);
        assert_eq!(gateway.state().allocation, Allocation::Deallocated);
    }

    #[test]
    fn test_ring_enable_writes_single_byte() {
        let mock = MockTransport::new();
        let mut gateway = Cm11a::new(config(), mock.clone());
        gateway.allocate().unwrap();
        gateway.ring_enable().unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while mock.count_sent(&[RING_ENABLE]) == 0 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(mock.count_sent(&[RING_ENABLE]), 1);
        gateway.deallocate().unwrap();
        assert_eq!(gateway.state().queue, QueueState::Empty);
    }

    #[test]
    fn test_oversized_packet_is_rejected() {
        let mut gateway = Cm11a::new(config(), MockTransport::new());
        gateway.allocate().unwrap();
        match gateway.send_standard(&[RING_ENABLE; 9]) {
            Err(X10Error::Capacity(e)) => assert!(e.is_packet_too_large()),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(gateway.queue_len(), 0);
        gateway.deallocate().unwrap();
    }

    #[test]
    fn test_state_changes_fire_on_caller_thread() {
        let threads = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen = Arc::clone(&threads);
        let mut gateway = Cm11a::new(config(), MockTransport::new());
        gateway.add_gateway_listener(Arc::new(move |event: &GatewayEvent| {
            if let GatewayEvent::StateChanged { .. } = event {
                seen.lock().unwrap().push(thread::current().id());
            }
        }));

        gateway.allocate().unwrap();
        gateway.deallocate().unwrap();

        let caller = thread::current().id();
        let threads = threads.lock().unwrap();
        assert!(!threads.is_empty());
        assert!(threads.iter().all(|id| *id == caller));
    }
}
