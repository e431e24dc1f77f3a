//! X10 addressing system.
//!
//! X10 devices are addressed by a house code (A-P) and a device code (1-16).
//! Devices of one house code can be grouped into a [`DeviceSet`].

pub mod device;
pub mod house;

pub use device::{DeviceCode, DeviceSet};
pub use house::HouseCode;
