#![cfg_attr(all(not(test), not(feature = "std")), no_std)]
#![doc = include_str!("../README.md")]

//! # x10-cm11a
//!
//! Driver for the CM11A X10 power-line interface.
//!
//! The protocol layer (addresses, events, packets, status decoding) is
//! `no_std`. The driver, the macro catalog and the transports need `std`.
//!
//! ## Features
//!
//! - Event transmission with the interface's checksum handshake
//! - Status requests and clock downloads
//! - Power-line event uploads, power failure and macro notifications
//! - Macro EEPROM programming with timer and macro initiators
//! - Scripted mock transport for tests, serial transport behind `serial`
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use x10_cm11a::{unit, Cm11a, Function, FunctionEvent, GatewayConfig, HouseCode, MockTransport, X10Event};
//!
//! // Swap in `transport::SerialTransport` (feature `serial`) for real hardware
//! let transport = MockTransport::new().with_handshake();
//! let mut gateway = Cm11a::new(GatewayConfig::default(), transport);
//! gateway.add_function_listener(Arc::new(|event: &FunctionEvent| {
//!     println!("{} {}", event.house, event.function);
//! }));
//! gateway.allocate()?;
//!
//! gateway.transmit(unit!(A / 3))?;
//! gateway.transmit(X10Event::function(HouseCode::A, Function::On))?;
//! # Ok::<(), x10_cm11a::X10Error>(())
//! ```

// Macro modules (must be declared before use)
#[macro_use]
pub mod logging;
#[macro_use]
pub mod macros;

pub mod addressing;
pub mod error;
pub mod protocol;

#[cfg(feature = "std")]
pub mod configuration;
#[cfg(feature = "std")]
pub mod eeprom;
#[cfg(feature = "std")]
pub mod gateway;
#[cfg(feature = "std")]
pub mod transport;
#[cfg(feature = "std")]
pub mod utility;

// Re-export commonly used types
#[doc(inline)]
pub use addressing::{DeviceCode, DeviceSet, HouseCode};
#[doc(inline)]
pub use error::{Result, X10Error};
#[doc(inline)]
pub use protocol::{AddressEvent, ClockSettings, DayOfWeek, DeviceStatus, Function, FunctionEvent, X10Event};

#[cfg(feature = "std")]
#[doc(inline)]
pub use configuration::GatewayConfig;
#[cfg(feature = "std")]
#[doc(inline)]
pub use eeprom::{Macro, MacroCatalog, MacroElement, MacroInitiator, MacroTrigger, TimerInitiator};
#[cfg(feature = "std")]
#[doc(inline)]
pub use gateway::{
    AddressListener, Cm11a, FunctionListener, GatewayEvent, GatewayListener, GatewayState,
    StatusListener,
};
#[cfg(feature = "std")]
#[doc(inline)]
pub use transport::{DataReady, MockTransport, Transport};
