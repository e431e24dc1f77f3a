//! Event listeners.
//!
//! Status, address and function listeners are called on the driver's worker
//! thread. Gateway listeners may also run on the thread that called
//! `allocate`, `deallocate` or a queueing method: `StateChanged` always
//! does, and `QueueUpdated` does when a request fills an empty queue.
//! Listeners must not block.
//!
//! Closures with the matching signature implement every listener trait:
//!
//! ```rust
//! use std::sync::Arc;
//! use x10_cm11a::gateway::{AddressListener, FunctionListener};
//! use x10_cm11a::{AddressEvent, FunctionEvent};
//!
//! let on_address: Arc<dyn AddressListener> =
//!     Arc::new(|event: &AddressEvent| println!("addressed {}{}", event.house, event.device));
//! let on_function: Arc<dyn FunctionListener> =
//!     Arc::new(|event: &FunctionEvent| println!("{} {}", event.house, event.function));
//! ```

use crate::gateway::state::GatewayState;
use crate::protocol::event::{AddressEvent, FunctionEvent, X10Event};
use crate::protocol::status::DeviceStatus;
use std::sync::{Arc, Mutex};

/// Notification about the driver itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayEvent {
    /// The last queued unit completed or was abandoned
    QueueEmptied { old: GatewayState, new: GatewayState },
    /// The queue gained a unit, or a unit was abandoned
    QueueUpdated { old: GatewayState, new: GatewayState },
    /// The allocation axis changed
    StateChanged { old: GatewayState, new: GatewayState },
    /// The interface lost power and came back
    PowerFailure,
    /// The interface started a stored macro
    MacroInitiated,
}

/// Receives decoded status blocks.
pub trait StatusListener: Send + Sync {
    fn status(&self, status: &DeviceStatus);
}

/// Receives address events seen on the power line or transmitted.
pub trait AddressListener: Send + Sync {
    fn address(&self, event: &AddressEvent);
}

/// Receives function events seen on the power line or transmitted.
pub trait FunctionListener: Send + Sync {
    fn function(&self, event: &FunctionEvent);
}

/// Receives queue, allocation and unsolicited notifications.
pub trait GatewayListener: Send + Sync {
    fn gateway_event(&self, event: &GatewayEvent);
}

impl<F: Fn(&DeviceStatus) + Send + Sync> StatusListener for F {
    fn status(&self, status: &DeviceStatus) {
        self(status);
    }
}

impl<F: Fn(&AddressEvent) + Send + Sync> AddressListener for F {
    fn address(&self, event: &AddressEvent) {
        self(event);
    }
}

impl<F: Fn(&FunctionEvent) + Send + Sync> FunctionListener for F {
    fn function(&self, event: &FunctionEvent) {
        self(event);
    }
}

impl<F: Fn(&GatewayEvent) + Send + Sync> GatewayListener for F {
    fn gateway_event(&self, event: &GatewayEvent) {
        self(event);
    }
}

/// Set of listeners, compared by identity.
pub(crate) struct Registry<L: ?Sized> {
    listeners: Mutex<Vec<Arc<L>>>,
}

impl<L: ?Sized> Default for Registry<L> {
    fn default() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
        }
    }
}

impl<L: ?Sized> Registry<L> {
    fn same(a: &Arc<L>, b: &Arc<L>) -> bool {
        Arc::as_ptr(a).cast::<()>() == Arc::as_ptr(b).cast::<()>()
    }

    /// Add a listener. Returns `false` if it was already registered.
    pub(crate) fn add(&self, listener: Arc<L>) -> bool {
        let mut listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        if listeners.iter().any(|l| Self::same(l, &listener)) {
            return false;
        }
        listeners.push(listener);
        true
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub(crate) fn remove(&self, listener: &Arc<L>) -> bool {
        let mut listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        let before = listeners.len();
        listeners.retain(|l| !Self::same(l, listener));
        before != listeners.len()
    }

    /// Copy of the current listeners, taken so dispatch runs unlocked.
    pub(crate) fn snapshot(&self) -> Vec<Arc<L>> {
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.listeners.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Every listener registry of one driver.
#[derive(Default)]
pub(crate) struct Listeners {
    pub(crate) status: Registry<dyn StatusListener>,
    pub(crate) address: Registry<dyn AddressListener>,
    pub(crate) function: Registry<dyn FunctionListener>,
    pub(crate) gateway: Registry<dyn GatewayListener>,
}

impl Listeners {
    pub(crate) fn fire_status(&self, status: &DeviceStatus) {
        for listener in self.status.snapshot() {
            listener.status(status);
        }
    }

    pub(crate) fn fire_event(&self, event: &X10Event) {
        match event {
            X10Event::Address(address) => {
                for listener in self.address.snapshot() {
                    listener.address(address);
                }
            }
            X10Event::Function(function) => {
                for listener in self.function.snapshot() {
                    listener.function(function);
                }
            }
        }
    }

    pub(crate) fn fire_gateway(&self, event: &GatewayEvent) {
        for listener in self.gateway.snapshot() {
            listener.gateway_event(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addressing::{DeviceCode, HouseCode};
    use crate::protocol::event::Function;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_registry_dedupes_by_identity() {
        let registry: Registry<dyn GatewayListener> = Registry::default();
        let listener: Arc<dyn GatewayListener> = Arc::new(|_: &GatewayEvent| {});
        let other: Arc<dyn GatewayListener> = Arc::new(|_: &GatewayEvent| {});

        assert!(registry.add(Arc::clone(&listener)));
        assert!(!registry.add(Arc::clone(&listener)));
        assert!(registry.add(other));
        assert_eq!(registry.len(), 2);

        assert!(registry.remove(&listener));
        assert!(!registry.remove(&listener));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_fire_event_routes_by_kind() {
        let listeners = Listeners::default();
        let addresses = Arc::new(AtomicUsize::new(0));
        let functions = Arc::new(AtomicUsize::new(0));

        let count = Arc::clone(&addresses);
        listeners.address.add(Arc::new(move |_: &AddressEvent| {
            count.fetch_add(1, Ordering::SeqCst);
        }));
        let count = Arc::clone(&functions);
        listeners.function.add(Arc::new(move |_: &FunctionEvent| {
            count.fetch_add(1, Ordering::SeqCst);
        }));

        let house = HouseCode::A;
        listeners.fire_event(&X10Event::address(house, DeviceCode::new(1).unwrap()));
        listeners.fire_event(&X10Event::function(house, Function::On));
        listeners.fire_event(&X10Event::function(house, Function::Off));

        assert_eq!(addresses.load(Ordering::SeqCst), 1);
        assert_eq!(functions.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_listener_may_register_during_dispatch() {
        let listeners = Arc::new(Listeners::default());
        let inner = Arc::clone(&listeners);
        listeners.gateway.add(Arc::new(move |_: &GatewayEvent| {
            inner.gateway.add(Arc::new(|_: &GatewayEvent| {}));
        }));
        listeners.fire_gateway(&GatewayEvent::PowerFailure);
        assert_eq!(listeners.gateway.len(), 2);
    }
}
