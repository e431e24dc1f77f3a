//! X10 power-line events.
//!
//! Every X10 exchange is a sequence of address events (select a device) and
//! function events (act on the most recently addressed devices of a house
//! code). This module models both, independent of how they are framed on the
//! serial link.

use crate::addressing::{DeviceCode, HouseCode};
use crate::error::{Result, X10Error};
use crate::protocol::constants::{DIM_MAX, DIM_STEPS};
use core::fmt;

/// X10 function with its operands.
///
/// Dim and Bright carry a level relative to `max`; the interface reports
/// uploaded levels out of [`DIM_MAX`] while a transmission can only carry
/// 0..=[`DIM_STEPS`] steps, see [`Function::dim_steps`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Function {
    /// Turn off every unit of the house code
    AllUnitsOff,
    /// Turn on every lamp of the house code
    AllLightsOn,
    /// Turn on the addressed units
    On,
    /// Turn off the addressed units
    Off,
    /// Dim the addressed units by `level` out of `max`
    Dim { level: u8, max: u8 },
    /// Brighten the addressed units by `level` out of `max`
    Bright { level: u8, max: u8 },
    /// Turn off every lamp of the house code
    AllLightsOff,
    /// Extended code with data and command bytes
    ExtendedCode { data: u8, command: u8 },
    /// Ask other transmitters on the same house code to answer
    HailRequest,
    /// Answer to a hail request
    HailAcknowledge,
    /// Preset dim, low bit clear
    PresetDim1,
    /// Preset dim, low bit set
    PresetDim2,
    /// Extended data transfer follows
    ExtendedDataTransfer,
    /// Status reply: unit is on
    StatusOn,
    /// Status reply: unit is off
    StatusOff,
    /// Ask the addressed units for their status
    StatusRequest,
}

impl Function {
    /// Dim with a level out of [`DIM_MAX`].
    pub const fn dim(level: u8) -> Self {
        Self::Dim {
            level,
            max: DIM_MAX,
        }
    }

    /// Bright with a level out of [`DIM_MAX`].
    pub const fn bright(level: u8) -> Self {
        Self::Bright {
            level,
            max: DIM_MAX,
        }
    }

    /// The 4-bit function code.
    pub const fn code(self) -> u8 {
        match self {
            Self::AllUnitsOff => 0x0,
            Self::AllLightsOn => 0x1,
            Self::On => 0x2,
            Self::Off => 0x3,
            Self::Dim { .. } => 0x4,
            Self::Bright { .. } => 0x5,
            Self::AllLightsOff => 0x6,
            Self::ExtendedCode { .. } => 0x7,
            Self::HailRequest => 0x8,
            Self::HailAcknowledge => 0x9,
            Self::PresetDim1 => 0xA,
            Self::PresetDim2 => 0xB,
            Self::ExtendedDataTransfer => 0xC,
            Self::StatusOn => 0xD,
            Self::StatusOff => 0xE,
            Self::StatusRequest => 0xF,
        }
    }

    /// Build a function without operands from its code.
    ///
    /// Dim and Bright get a zero level and extended codes zero operands; the
    /// caller fills them in from the bytes that follow.
    pub fn from_code(code: u8) -> Result<Self> {
        Ok(match code {
            0x0 => Self::AllUnitsOff,
            0x1 => Self::AllLightsOn,
            0x2 => Self::On,
            0x3 => Self::Off,
            0x4 => Self::dim(0),
            0x5 => Self::bright(0),
            0x6 => Self::AllLightsOff,
            0x7 => Self::ExtendedCode {
                data: 0,
                command: 0,
            },
            0x8 => Self::HailRequest,
            0x9 => Self::HailAcknowledge,
            0xA => Self::PresetDim1,
            0xB => Self::PresetDim2,
            0xC => Self::ExtendedDataTransfer,
            0xD => Self::StatusOn,
            0xE => Self::StatusOff,
            0xF => Self::StatusRequest,
            _ => return Err(X10Error::invalid_function_code()),
        })
    }

    /// True for Dim and Bright.
    pub const fn is_dim_or_bright(self) -> bool {
        matches!(self, Self::Dim { .. } | Self::Bright { .. })
    }

    /// True for extended code.
    pub const fn is_extended(self) -> bool {
        matches!(self, Self::ExtendedCode { .. })
    }

    /// The level scaled to the 0..=22 steps a transmission can carry.
    ///
    /// Zero for functions without a level.
    pub fn dim_steps(self) -> u8 {
        match self {
            Self::Dim { level, max } | Self::Bright { level, max } => {
                if max == 0 {
                    return 0;
                }
                let steps = (u32::from(level) * u32::from(DIM_STEPS) + u32::from(max) / 2)
                    / u32::from(max);
                steps.min(u32::from(DIM_STEPS)) as u8
            }
            _ => 0,
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllUnitsOff => write!(f, "all units off"),
            Self::AllLightsOn => write!(f, "all lights on"),
            Self::On => write!(f, "on"),
            Self::Off => write!(f, "off"),
            Self::Dim { level, max } => write!(f, "dim {level}/{max}"),
            Self::Bright { level, max } => write!(f, "bright {level}/{max}"),
            Self::AllLightsOff => write!(f, "all lights off"),
            Self::ExtendedCode { data, command } => {
                write!(f, "extended code data=0x{data:02X} command=0x{command:02X}")
            }
            Self::HailRequest => write!(f, "hail request"),
            Self::HailAcknowledge => write!(f, "hail acknowledge"),
            Self::PresetDim1 => write!(f, "preset dim 1"),
            Self::PresetDim2 => write!(f, "preset dim 2"),
            Self::ExtendedDataTransfer => write!(f, "extended data transfer"),
            Self::StatusOn => write!(f, "status on"),
            Self::StatusOff => write!(f, "status off"),
            Self::StatusRequest => write!(f, "status request"),
        }
    }
}

/// Selects one device of a house code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AddressEvent {
    pub house: HouseCode,
    pub device: DeviceCode,
}

impl AddressEvent {
    pub const fn new(house: HouseCode, device: DeviceCode) -> Self {
        Self { house, device }
    }
}

/// Applies a function to the addressed devices of a house code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FunctionEvent {
    pub house: HouseCode,
    pub function: Function,
}

impl FunctionEvent {
    pub const fn new(house: HouseCode, function: Function) -> Self {
        Self { house, function }
    }
}

/// One event on the power line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum X10Event {
    Address(AddressEvent),
    Function(FunctionEvent),
}

impl X10Event {
    /// Address event shorthand.
    pub const fn address(house: HouseCode, device: DeviceCode) -> Self {
        Self::Address(AddressEvent::new(house, device))
    }

    /// Function event shorthand.
    pub const fn function(house: HouseCode, function: Function) -> Self {
        Self::Function(FunctionEvent::new(house, function))
    }

    /// House code the event belongs to.
    pub const fn house(&self) -> HouseCode {
        match self {
            Self::Address(event) => event.house,
            Self::Function(event) => event.house,
        }
    }
}

impl From<AddressEvent> for X10Event {
    fn from(event: AddressEvent) -> Self {
        Self::Address(event)
    }
}

impl From<FunctionEvent> for X10Event {
    fn from(event: FunctionEvent) -> Self {
        Self::Function(event)
    }
}

impl fmt::Display for X10Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Address(event) => write!(f, "{}{}", event.house, event.device),
            Self::Function(event) => write!(f, "{} {}", event.house, event.function),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_round_trip() {
        for code in 0..16 {
            assert_eq!(Function::from_code(code).unwrap().code(), code);
        }
        assert!(Function::from_code(16).is_err());
    }

    #[test]
    fn test_dim_steps_scaling() {
        assert_eq!(Function::dim(210).dim_steps(), 22);
        assert_eq!(Function::dim(0).dim_steps(), 0);
        assert_eq!(Function::bright(105).dim_steps(), 11);
        assert_eq!(Function::Bright { level: 22, max: 22 }.dim_steps(), 22);
        assert_eq!(Function::Dim { level: 50, max: 0 }.dim_steps(), 0);
        assert_eq!(Function::On.dim_steps(), 0);
    }

    #[test]
    fn test_calibration_level_maps_to_two_steps() {
        // 22 out of 210 is roughly two of the 22 transmission steps
        assert_eq!(Function::bright(22).dim_steps(), 2);
    }

    #[test]
    fn test_display() {
        let a = HouseCode::new('A').unwrap();
        let three = DeviceCode::new(3).unwrap();
        assert_eq!(X10Event::address(a, three).to_string(), "A3");
        assert_eq!(X10Event::function(a, Function::On).to_string(), "A on");
        assert_eq!(
            X10Event::function(a, Function::dim(50)).to_string(),
            "A dim 50/210"
        );
    }
}
