//! Worker thread.
//!
//! The worker owns the transport while the driver is allocated. Each pass
//! it handles unsolicited bytes, runs the units queued when the pass began
//! and handles unsolicited bytes again. Uploads, status replies and macro
//! playback reach their listeners from this thread; gateway events raised
//! by allocation or by queueing are fired on the caller's thread instead.

use crate::addressing::HouseCode;
use crate::configuration::GatewayConfig;
use crate::eeprom::OffsetTable;
use crate::error::{Result, X10Error};
use crate::gateway::listener::{GatewayEvent, Listeners};
use crate::gateway::state::{Allocation, GatewayState, QueueState};
use crate::gateway::unit::{Completed, Link, TransmissionUnit, UnitKind};
use crate::protocol::constants::{
    BRIGHTEN_FIRST_LEVEL, DIM_MAX, INCOMING_EVENT, INCOMING_EVENT_ACK, MACRO_INITIATED,
    MAX_UPLOAD_SIZE, POWER_FAILURE,
};
use crate::protocol::event::{Function, X10Event};
use crate::protocol::packet::{decode_upload, from_bytes, ClockSettings, Endian, UploadEvents};
use crate::protocol::status::DeviceStatus;
use crate::transport::{DataReady, Transport};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;

/// Longest idle wait before the worker rechecks its shutdown flag.
const IDLE_WAIT: Duration = Duration::from_millis(500);

/// State shared between the driver handle and its worker.
pub(crate) struct Shared {
    pub(crate) config: GatewayConfig,
    pub(crate) queue: Mutex<VecDeque<TransmissionUnit>>,
    pub(crate) state: Mutex<GatewayState>,
    pub(crate) last_status: Mutex<Option<DeviceStatus>>,
    pub(crate) offsets: RwLock<Arc<OffsetTable>>,
    pub(crate) listeners: Listeners,
    pub(crate) auto_recover: AtomicBool,
    pub(crate) shutdown: AtomicBool,
    pub(crate) interrupt: AtomicBool,
    pub(crate) data_ready: DataReady,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl Shared {
    pub(crate) fn new(config: GatewayConfig) -> Self {
        Self {
            auto_recover: AtomicBool::new(config.auto_recover),
            config,
            queue: Mutex::new(VecDeque::new()),
            state: Mutex::new(GatewayState::INITIAL),
            last_status: Mutex::new(None),
            offsets: RwLock::new(Arc::new(OffsetTable::new())),
            listeners: Listeners::default(),
            shutdown: AtomicBool::new(false),
            interrupt: AtomicBool::new(false),
            data_ready: DataReady::new(),
        }
    }

    pub(crate) fn state(&self) -> GatewayState {
        *lock(&self.state)
    }

    pub(crate) fn queue_len(&self) -> usize {
        lock(&self.queue).len()
    }

    pub(crate) fn last_status(&self) -> Option<DeviceStatus> {
        *lock(&self.last_status)
    }

    pub(crate) fn offsets(&self) -> Arc<OffsetTable> {
        let table = self.offsets.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&table)
    }

    pub(crate) fn replace_offsets(&self, table: OffsetTable) {
        let mut current = self.offsets.write().unwrap_or_else(|e| e.into_inner());
        *current = Arc::new(table);
    }

    /// Move the allocation axis, notifying listeners if it changed.
    pub(crate) fn set_allocation(&self, allocation: Allocation) {
        let (old, new) = {
            let mut state = lock(&self.state);
            let old = *state;
            *state = old.with_allocation(allocation);
            (old, *state)
        };
        if old != new {
            x10_log!(debug, "Gateway state {} -> {}", old, new);
            self.listeners
                .fire_gateway(&GatewayEvent::StateChanged { old, new });
        }
    }

    /// Match the queue axis to the queue, notifying listeners if it changed.
    ///
    /// The queue lock is held while the state is updated, so a concurrent
    /// enqueue cannot be overwritten by a stale `Empty`. Listeners run after
    /// both locks are released.
    pub(crate) fn settle_queue(&self) -> QueueState {
        let (old, new) = {
            let queue = lock(&self.queue);
            self.track_queue(&queue)
        };
        self.fire_queue(old, new);
        new.queue
    }

    /// Append units under one lock and wake the worker.
    pub(crate) fn enqueue_all(&self, units: impl IntoIterator<Item = TransmissionUnit>) {
        let (added, old, new) = {
            let mut queue = lock(&self.queue);
            let before = queue.len();
            queue.extend(units);
            let (old, new) = self.track_queue(&queue);
            (queue.len() - before, old, new)
        };
        if added > 0 {
            self.fire_queue(old, new);
            self.data_ready.notify();
        }
    }

    // Lock order is queue, then state.
    fn track_queue(&self, queue: &VecDeque<TransmissionUnit>) -> (GatewayState, GatewayState) {
        let axis = if queue.is_empty() {
            QueueState::Empty
        } else {
            QueueState::NotEmpty
        };
        let mut state = lock(&self.state);
        let old = *state;
        *state = old.with_queue(axis);
        (old, *state)
    }

    fn fire_queue(&self, old: GatewayState, new: GatewayState) {
        if old == new {
            return;
        }
        let event = match new.queue {
            QueueState::Empty => GatewayEvent::QueueEmptied { old, new },
            QueueState::NotEmpty => GatewayEvent::QueueUpdated { old, new },
        };
        self.listeners.fire_gateway(&event);
    }

    pub(crate) fn enqueue(&self, kind: UnitKind) {
        self.enqueue_all([TransmissionUnit::new(kind, self.config.max_attempts)]);
    }

    fn push_front(&self, unit: TransmissionUnit) {
        lock(&self.queue).push_front(unit);
    }

    fn pop_front(&self) -> Option<TransmissionUnit> {
        lock(&self.queue).pop_front()
    }
}

/// Worker thread body.
pub(crate) struct Worker<T: Transport> {
    pub(crate) transport: T,
    pub(crate) shared: Arc<Shared>,
    pub(crate) done: Sender<()>,
}

impl<T: Transport> Worker<T> {
    /// Run until shutdown, then hand the transport back.
    pub(crate) fn run(mut self) -> T {
        x10_log!(debug, "Worker started");
        loop {
            self.shared.data_ready.wait_timeout(IDLE_WAIT);
            if self.stopping() {
                break;
            }
            self.process_pending();
            self.process_queue();
            self.process_pending();
        }
        x10_log!(debug, "Worker stopped");
        // The driver may have stopped waiting already
        let _ = self.done.send(());
        self.transport
    }

    fn stopping(&self) -> bool {
        self.shared.shutdown.load(Ordering::Acquire) || self.shared.interrupt.load(Ordering::Acquire)
    }

    fn link(&mut self) -> Link<'_, T> {
        Link::new(
            &mut self.transport,
            &self.shared.config,
            &self.shared.interrupt,
        )
    }

    /// Run at most the number of units queued when the pass began.
    fn process_queue(&mut self) {
        let budget = self.shared.queue_len();
        for _ in 0..budget {
            if self.stopping() {
                break;
            }
            let Some(mut unit) = self.shared.pop_front() else {
                break;
            };
            x10_log!(debug, "Executing {:?}", unit.kind);

            let result = unit.execute(&mut self.link());
            match result {
                Ok(completed) => self.complete(unit, completed),
                Err(X10Error::Interrupted(marker)) => {
                    x10_log!(debug, "Transmission interrupted by {:02X}", marker);
                    self.dispatch(marker);
                    self.process_pending();
                    self.shared.push_front(unit);
                }
                Err(e) => {
                    let dropped = self.link().drain();
                    if dropped > 0 {
                        x10_log!(warn, "Dropped {} bytes after failed exchange", dropped);
                    }
                    if e.is_fatal() || unit.record_failure() {
                        x10_log!(
                            error,
                            "{} ({}) for {:?}, last error: {}",
                            X10Error::TooManyAttempts,
                            unit.attempts,
                            unit.kind,
                            e
                        );
                        let state = self.shared.state();
                        self.shared
                            .listeners
                            .fire_gateway(&GatewayEvent::QueueUpdated {
                                old: state,
                                new: state,
                            });
                    } else {
                        x10_log!(warn, "Attempt {} failed: {}", unit.attempts, e);
                        self.shared.push_front(unit);
                    }
                }
            }
        }

        if self.shared.settle_queue() == QueueState::NotEmpty {
            self.shared.data_ready.notify();
        }
    }

    fn complete(&mut self, unit: TransmissionUnit, completed: Completed) {
        match completed {
            Completed::Status(status) => {
                *lock(&self.shared.last_status) = Some(status);
                x10_log!(debug, "Status: {}", status);
                self.shared.listeners.fire_status(&status);
                if let UnitKind::StatusRequest {
                    listener: Some(listener),
                } = unit.kind
                {
                    listener.status(&status);
                }
            }
            Completed::Transmitted(event) => {
                x10_log!(debug, "Transmitted {}", event);
                self.shared.listeners.fire_event(&event);
            }
            Completed::Written => {}
        }
    }

    /// Handle every unsolicited byte currently buffered.
    fn process_pending(&mut self) {
        loop {
            match self.link().available() {
                Ok(0) => return,
                Ok(_) => {}
                Err(e) => {
                    x10_log!(warn, "Cannot poll input: {}", e);
                    return;
                }
            }
            let byte = match self.link().read_byte() {
                Ok(byte) => byte,
                Err(e) => {
                    x10_log!(warn, "Cannot read input: {}", e);
                    return;
                }
            };
            self.dispatch(byte);
        }
    }

    fn dispatch(&mut self, byte: u8) {
        match byte {
            INCOMING_EVENT => self.receive_events(),
            POWER_FAILURE => self.power_failure(),
            MACRO_INITIATED => self.macro_initiated(),
            other => {
                let dropped = self.link().drain();
                x10_log!(
                    warn,
                    "Breakdown in protocol at {:02X}, dropped {} bytes",
                    other,
                    dropped
                );
            }
        }
    }

    fn receive_events(&mut self) {
        let upload = read_upload(&mut self.link());

        match upload {
            Ok(events) => {
                for event in &events {
                    x10_log!(debug, "Received {}", event);
                    self.shared.listeners.fire_event(event);
                }
            }
            Err(e) => {
                let dropped = self.link().drain();
                x10_log!(warn, "Bad event upload ({}), dropped {} bytes", e, dropped);
            }
        }
    }

    fn power_failure(&mut self) {
        x10_log!(info, "Interface reported a power failure");
        self.shared
            .listeners
            .fire_gateway(&GatewayEvent::PowerFailure);

        if self.shared.auto_recover.load(Ordering::Acquire) {
            let house = self
                .shared
                .last_status()
                .map_or(HouseCode::A, |status| status.monitored_house_code);
            x10_log!(debug, "Setting clock after power failure, house {}", house);
            self.shared
                .enqueue(UnitKind::ClockDownload(ClockSettings::now(house).to_packet()));
        }
    }

    fn macro_initiated(&mut self) {
        self.shared
            .listeners
            .fire_gateway(&GatewayEvent::MacroInitiated);

        let mut address = [0u8; 2];
        if let Err(e) = read_macro_address(&mut self.link(), &mut address) {
            x10_log!(warn, "Cannot read macro address: {}", e);
            return;
        }

        // The interface always sets the high bit
        let offset = from_bytes(&[address[0] & 0x7F, address[1]], Endian::Big) as u16;
        let table = self.shared.offsets();
        let Some(played) = table.lookup(offset) else {
            x10_log!(warn, "No macro at offset {:#05X}", offset);
            return;
        };
        x10_log!(debug, "Macro at offset {:#05X} started", offset);

        for event in macro_events(played) {
            self.shared.listeners.fire_event(&event);
        }
    }
}

/// Acknowledge an upload notification and decode the events that follow.
fn read_upload<T: Transport>(link: &mut Link<'_, T>) -> Result<UploadEvents> {
    link.write(&[INCOMING_EVENT_ACK])?;
    let size = usize::from(link.read_byte()?);
    if !(2..=MAX_UPLOAD_SIZE).contains(&size) {
        return Err(X10Error::invalid_upload_length());
    }
    if link.wait_for(size)? < size {
        return Err(X10Error::short_read());
    }
    let mut buffer = [0u8; MAX_UPLOAD_SIZE];
    link.read_exact(&mut buffer[..size])?;
    decode_upload(&buffer[..size])
}

fn read_macro_address<T: Transport>(link: &mut Link<'_, T>, address: &mut [u8; 2]) -> Result<()> {
    if link.wait_for(address.len())? < address.len() {
        return Err(X10Error::short_read());
    }
    link.read_exact(address)
}

/// Events a macro produces on the power line, in order.
pub(crate) fn macro_events(played: &crate::eeprom::Macro) -> Vec<X10Event> {
    let mut events = Vec::new();
    for element in played.elements() {
        let house = element.house();
        let addresses: Vec<X10Event> = element
            .devices
            .iter()
            .map(|device| X10Event::address(house, device))
            .collect();

        if element.function().is_dim_or_bright()
            && element.brighten_first
            && !addresses.is_empty()
        {
            events.extend(addresses.iter().copied());
            events.push(X10Event::function(
                house,
                Function::Bright {
                    level: BRIGHTEN_FIRST_LEVEL,
                    max: DIM_MAX,
                },
            ));
        }
        events.extend(addresses);
        events.push(X10Event::Function(element.event));
    }
    events
}
