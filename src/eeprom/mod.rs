//! Macro memory of the interface.
//!
//! The CM11A stores timers, macro triggers and the macros they start in
//! 1024 bytes of EEPROM, so it keeps running them with the PC switched off.
//! Build a [`MacroCatalog`], encode it into an [`EepromImage`] and download
//! its pages through the driver.

pub mod image;
pub mod model;

pub use image::{EepromImage, OffsetTable, NO_MACRO};
pub use model::{
    Macro, MacroCatalog, MacroElement, MacroId, MacroInitiator, MacroTrigger, TimerInitiator,
    TimerPoint, MAX_MACRO_DELAY,
};
