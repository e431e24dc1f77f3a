//! X10 house code implementation.
//!
//! House codes name one of 16 channels on the power line, 'A' through 'P'.
//! On the wire each letter travels as a 4-bit value taken from a fixed,
//! non-alphabetic table.

use crate::error::{Result, X10Error};
use crate::protocol::constants::{HOUSE_CODE_TO_VALUE, VALUE_TO_HOUSE_CODE};
use core::fmt;

/// X10 house code ('A'..='P')
///
/// # Examples
///
/// ```
/// use x10_cm11a::HouseCode;
///
/// let house = HouseCode::new('A').unwrap();
/// assert_eq!(house.letter(), 'A');
/// assert_eq!(house.to_value(), 0x6);
///
/// // Decode a protocol nibble
/// let house = HouseCode::from_value(0x0);
/// assert_eq!(house.letter(), 'M');
///
/// // Parse from string
/// let house: HouseCode = "p".parse().unwrap();
/// assert_eq!(house.letter(), 'P');
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HouseCode {
    index: u8,
}

impl HouseCode {
    /// House codes by letter
    pub const A: Self = Self { index: 0 };
    pub const B: Self = Self { index: 1 };
    pub const C: Self = Self { index: 2 };
    pub const D: Self = Self { index: 3 };
    pub const E: Self = Self { index: 4 };
    pub const F: Self = Self { index: 5 };
    pub const G: Self = Self { index: 6 };
    pub const H: Self = Self { index: 7 };
    pub const I: Self = Self { index: 8 };
    pub const J: Self = Self { index: 9 };
    pub const K: Self = Self { index: 10 };
    pub const L: Self = Self { index: 11 };
    pub const M: Self = Self { index: 12 };
    pub const N: Self = Self { index: 13 };
    pub const O: Self = Self { index: 14 };
    pub const P: Self = Self { index: 15 };

    /// Create a house code from its letter (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns a codec error if the letter is outside 'A'..='P'.
    pub fn new(letter: char) -> Result<Self> {
        let upper = letter.to_ascii_uppercase();
        if !('A'..='P').contains(&upper) {
            return Err(X10Error::invalid_house_code());
        }
        Ok(Self {
            index: upper as u8 - b'A',
        })
    }

    /// Const constructor from an ASCII letter; `None` outside 'A'..='P'.
    pub const fn from_ascii(letter: u8) -> Option<Self> {
        match letter.to_ascii_uppercase() {
            upper @ b'A'..=b'P' => Some(Self {
                index: upper - b'A',
            }),
            _ => None,
        }
    }

    /// Create from a zero-based index ('A' = 0).
    pub fn from_index(index: u8) -> Result<Self> {
        if index > 15 {
            return Err(X10Error::invalid_house_code());
        }
        Ok(Self { index })
    }

    /// Decode the 4-bit protocol value. Only the low nibble is used.
    #[inline(always)]
    pub fn from_value(value: u8) -> Self {
        let letter = VALUE_TO_HOUSE_CODE[(value & 0x0F) as usize];
        Self {
            index: letter as u8 - b'A',
        }
    }

    /// The 4-bit protocol value.
    #[inline(always)]
    pub const fn to_value(self) -> u8 {
        HOUSE_CODE_TO_VALUE[self.index as usize]
    }

    /// The house code letter.
    #[inline(always)]
    pub const fn letter(self) -> char {
        (b'A' + self.index) as char
    }

    /// Zero-based index ('A' = 0).
    #[inline(always)]
    pub const fn index(self) -> u8 {
        self.index
    }
}

impl Default for HouseCode {
    fn default() -> Self {
        Self::A
    }
}

impl fmt::Display for HouseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

impl TryFrom<char> for HouseCode {
    type Error = X10Error;

    fn try_from(letter: char) -> Result<Self> {
        Self::new(letter)
    }
}

impl core::str::FromStr for HouseCode {
    type Err = X10Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut chars = s.trim().chars();
        let letter = chars.next().ok_or_else(X10Error::invalid_house_code)?;
        if chars.next().is_some() {
            return Err(X10Error::invalid_house_code());
        }
        Self::new(letter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_valid() {
        let house = HouseCode::new('C').unwrap();
        assert_eq!(house.letter(), 'C');
        assert_eq!(house.index(), 2);
    }

    #[test]
    fn test_letter_constants() {
        assert_eq!(HouseCode::B.letter(), 'B');
        assert_eq!(HouseCode::C, HouseCode::new('C').unwrap());
        assert_eq!(HouseCode::P.index(), 15);
        assert_eq!(HouseCode::M.to_value(), 0x0);
    }

    #[test]
    fn test_new_lowercase() {
        assert_eq!(HouseCode::new('b').unwrap().letter(), 'B');
    }

    #[test]
    fn test_new_invalid() {
        assert!(HouseCode::new('Q').is_err());
        assert!(HouseCode::new('1').is_err());
        assert!(HouseCode::from_index(16).is_err());
    }

    #[test]
    fn test_value_round_trip_all_letters() {
        for index in 0..16 {
            let house = HouseCode::from_index(index).unwrap();
            assert_eq!(HouseCode::from_value(house.to_value()), house);
        }
    }

    #[test]
    fn test_known_values() {
        assert_eq!(HouseCode::new('A').unwrap().to_value(), 0x6);
        assert_eq!(HouseCode::new('M').unwrap().to_value(), 0x0);
        assert_eq!(HouseCode::new('P').unwrap().to_value(), 0xC);
        assert_eq!(HouseCode::from_value(0xF).letter(), 'J');
    }

    #[test]
    fn test_from_value_ignores_high_nibble() {
        assert_eq!(HouseCode::from_value(0x66).letter(), 'A');
    }

    #[test]
    fn test_display_and_parse() {
        let house: HouseCode = "k".parse().unwrap();
        assert_eq!(format!("{house}"), "K");
        assert!("".parse::<HouseCode>().is_err());
        assert!("AB".parse::<HouseCode>().is_err());
    }
}
