//! X10 device (unit) codes and device sets.
//!
//! A device code is a number 1-16 within a house code. The interface reports
//! groups of devices as 16-bit words where bit `i` stands for the device whose
//! protocol value is `i`, which is not monotonic in the device number.

use crate::error::{Result, X10Error};
use crate::protocol::constants::{DEVICE_CODE_TO_VALUE, VALUE_TO_DEVICE_CODE};
use core::fmt;

/// X10 device code (1-16)
///
/// # Examples
///
/// ```
/// use x10_cm11a::DeviceCode;
///
/// let device = DeviceCode::new(13).unwrap();
/// assert_eq!(device.to_value(), 0x0);
/// assert_eq!(DeviceCode::from_value(0x6).number(), 1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceCode {
    number: u8,
}

impl DeviceCode {
    /// Lowest device number
    pub const MIN: u8 = 1;
    /// Highest device number
    pub const MAX: u8 = 16;

    /// Create a device code from its number.
    ///
    /// # Errors
    ///
    /// Returns a codec error if `number` is outside 1..=16.
    pub fn new(number: u8) -> Result<Self> {
        if !(Self::MIN..=Self::MAX).contains(&number) {
            return Err(X10Error::invalid_device_code());
        }
        Ok(Self { number })
    }

    /// Const constructor; `None` outside 1..=16.
    pub const fn checked(number: u8) -> Option<Self> {
        if number >= Self::MIN && number <= Self::MAX {
            Some(Self { number })
        } else {
            None
        }
    }

    /// Decode the 4-bit protocol value. Only the low nibble is used.
    #[inline(always)]
    pub const fn from_value(value: u8) -> Self {
        Self {
            number: VALUE_TO_DEVICE_CODE[(value & 0x0F) as usize],
        }
    }

    /// The 4-bit protocol value.
    #[inline(always)]
    pub const fn to_value(self) -> u8 {
        DEVICE_CODE_TO_VALUE[(self.number - 1) as usize]
    }

    /// The device number (1-16).
    #[inline(always)]
    pub const fn number(self) -> u8 {
        self.number
    }
}

impl fmt::Display for DeviceCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number)
    }
}

impl TryFrom<u8> for DeviceCode {
    type Error = X10Error;

    fn try_from(number: u8) -> Result<Self> {
        Self::new(number)
    }
}

impl From<DeviceCode> for u8 {
    #[inline(always)]
    fn from(device: DeviceCode) -> u8 {
        device.number
    }
}

/// A set of device codes within one house code.
///
/// Stored with bit `n - 1` for device `n`, so iteration yields devices in
/// ascending order. [`DeviceSet::from_protocol_bits`] and
/// [`DeviceSet::to_protocol_bits`] convert to and from the interface's
/// scrambled bit order.
///
/// # Examples
///
/// ```
/// use x10_cm11a::{DeviceCode, DeviceSet};
///
/// let mut set = DeviceSet::new();
/// set.insert(DeviceCode::new(5).unwrap());
/// set.insert(DeviceCode::new(3).unwrap());
/// let numbers: Vec<u8> = set.iter().map(|d| d.number()).collect();
/// assert_eq!(numbers, vec![3, 5]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceSet {
    bits: u16,
}

impl DeviceSet {
    /// An empty set.
    pub const fn new() -> Self {
        Self { bits: 0 }
    }

    /// Build a set from device numbers.
    ///
    /// # Errors
    ///
    /// Returns a codec error if any number is outside 1..=16.
    pub fn from_numbers(numbers: &[u8]) -> Result<Self> {
        let mut set = Self::new();
        for &number in numbers {
            set.insert(DeviceCode::new(number)?);
        }
        Ok(set)
    }

    /// Copy of the set with `device` added.
    #[must_use]
    pub const fn with(self, device: DeviceCode) -> Self {
        Self {
            bits: self.bits | (1 << (device.number - 1)),
        }
    }

    /// Decode an interface word where bit `i` means device
    /// `VALUE_TO_DEVICE_CODE[i]`.
    pub fn from_protocol_bits(word: u16) -> Self {
        let mut set = Self::new();
        for position in 0..16u8 {
            if word & (1 << position) != 0 {
                set.insert(DeviceCode::from_value(position));
            }
        }
        set
    }

    /// Encode into the interface's bit order.
    pub fn to_protocol_bits(self) -> u16 {
        self.iter()
            .fold(0u16, |word, device| word | (1 << device.to_value()))
    }

    /// Add a device. Returns `true` if it was not present.
    pub fn insert(&mut self, device: DeviceCode) -> bool {
        let mask = 1u16 << (device.number() - 1);
        let added = self.bits & mask == 0;
        self.bits |= mask;
        added
    }

    /// Remove a device. Returns `true` if it was present.
    pub fn remove(&mut self, device: DeviceCode) -> bool {
        let mask = 1u16 << (device.number() - 1);
        let present = self.bits & mask != 0;
        self.bits &= !mask;
        present
    }

    /// Check membership.
    pub const fn contains(self, device: DeviceCode) -> bool {
        self.bits & (1 << (device.number - 1)) != 0
    }

    /// Number of devices in the set.
    pub const fn len(self) -> usize {
        self.bits.count_ones() as usize
    }

    /// True if no device is set.
    pub const fn is_empty(self) -> bool {
        self.bits == 0
    }

    /// Iterate devices in ascending order.
    pub fn iter(self) -> impl Iterator<Item = DeviceCode> {
        (DeviceCode::MIN..=DeviceCode::MAX)
            .filter(move |n| self.bits & (1 << (n - 1)) != 0)
            .map(|number| DeviceCode { number })
    }
}

impl FromIterator<DeviceCode> for DeviceSet {
    fn from_iter<I: IntoIterator<Item = DeviceCode>>(iter: I) -> Self {
        let mut set = Self::new();
        for device in iter {
            set.insert(device);
        }
        set
    }
}

impl fmt::Display for DeviceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, device) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{device}")?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_valid() {
        assert_eq!(DeviceCode::new(1).unwrap().number(), 1);
        assert_eq!(DeviceCode::new(16).unwrap().number(), 16);
    }

    #[test]
    fn test_new_invalid() {
        assert!(DeviceCode::new(0).is_err());
        assert!(DeviceCode::new(17).is_err());
    }

    #[test]
    fn test_value_round_trip() {
        for number in 1..=16 {
            let device = DeviceCode::new(number).unwrap();
            assert_eq!(DeviceCode::from_value(device.to_value()), device);
        }
    }

    #[test]
    fn test_protocol_bit_zero_is_device_13() {
        let set = DeviceSet::from_protocol_bits(0x0001);
        assert_eq!(set.len(), 1);
        assert!(set.contains(DeviceCode::new(13).unwrap()));
    }

    #[test]
    fn test_protocol_bits_scrambled_order() {
        // position 6 -> device 1, position 14 -> device 2
        let set = DeviceSet::from_protocol_bits((1 << 6) | (1 << 14));
        let numbers: Vec<u8> = set.iter().map(DeviceCode::number).collect();
        assert_eq!(numbers, vec![1, 2]);
        assert_eq!(set.to_protocol_bits(), (1 << 6) | (1 << 14));
    }

    #[test]
    fn test_insert_remove() {
        let mut set = DeviceSet::new();
        let three = DeviceCode::new(3).unwrap();
        assert!(set.insert(three));
        assert!(!set.insert(three));
        assert!(set.contains(three));
        assert!(set.remove(three));
        assert!(set.is_empty());
    }

    #[test]
    fn test_from_numbers_rejects_invalid() {
        assert!(DeviceSet::from_numbers(&[1, 17]).is_err());
        assert_eq!(DeviceSet::from_numbers(&[16, 1]).unwrap().len(), 2);
    }

    #[test]
    fn test_display() {
        let set = DeviceSet::from_numbers(&[5, 3]).unwrap();
        assert_eq!(set.to_string(), "{3, 5}");
        assert_eq!(DeviceSet::new().to_string(), "{}");
    }
}
