//! Interface status block.
//!
//! ```text
//! byte  0-1   battery timer, minutes, little-endian (0xFFFF = reset)
//! byte  2     seconds
//! byte  3     minutes 0-119
//! byte  4     hours / 2
//! byte  5     julian day, low 8 bits
//! byte  6     bit 7: julian day bit 8, bits 0-6: day-of-week mask
//! byte  7     high nibble: monitored house code, low nibble: firmware
//! byte  8-9   last addressed devices
//! byte 10-11  on/off status
//! byte 12-13  dim status
//! ```

use crate::addressing::{DeviceSet, HouseCode};
use crate::error::{Result, X10Error};
use crate::protocol::calendar::DayOfWeek;
use crate::protocol::constants::STATUS_SIZE;
use core::fmt;

/// Snapshot of the interface's clock and monitored house code.
///
/// # Examples
///
/// ```
/// use x10_cm11a::protocol::status::decode_status;
///
/// let status = decode_status(&[
///     0xFF, 0xFF, 0, 0, 0, 5, 1, 0x60, 0, 0, 0x01, 0x00, 0, 0,
/// ]).unwrap();
/// assert_eq!(status.battery_usage_minutes, 0);
/// assert_eq!(status.julian_day, 5);
/// assert_eq!(status.monitored_house_code.letter(), 'A');
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceStatus {
    pub battery_usage_minutes: u16,
    pub seconds: u8,
    pub minutes: u8,
    pub hours: u8,
    pub julian_day: u16,
    pub day_of_week: DayOfWeek,
    pub monitored_house_code: HouseCode,
    pub firmware_revision: u8,
    pub last_addressed: DeviceSet,
    pub on_off: DeviceSet,
    pub dim: DeviceSet,
}

/// Decode a 14-byte status block.
///
/// # Errors
///
/// Returns a protocol error if `bytes` is not exactly 14 bytes long.
pub fn decode_status(bytes: &[u8]) -> Result<DeviceStatus> {
    if bytes.len() != STATUS_SIZE {
        return Err(X10Error::invalid_status_length());
    }

    let word = |low: usize| u16::from_le_bytes([bytes[low], bytes[low + 1]]);

    let battery = word(0);
    let julian_high = u16::from((bytes[6] & 0x80) >> 7) << 8;

    Ok(DeviceStatus {
        battery_usage_minutes: if battery == 0xFFFF { 0 } else { battery },
        seconds: bytes[2],
        minutes: bytes[3] % 60,
        hours: bytes[4].wrapping_mul(2).wrapping_add(bytes[3] / 60),
        julian_day: u16::from(bytes[5]) + julian_high,
        day_of_week: DayOfWeek::from_mask(bytes[6] & 0x7F),
        monitored_house_code: HouseCode::from_value(bytes[7] >> 4),
        firmware_revision: bytes[7] & 0x0F,
        last_addressed: DeviceSet::from_protocol_bits(word(8)),
        on_off: DeviceSet::from_protocol_bits(word(10)),
        dim: DeviceSet::from_protocol_bits(word(12)),
    })
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} day {} {:02}:{:02}:{:02} house {} battery {} min, addressed {} on {} dim {}",
            self.day_of_week,
            self.julian_day,
            self.hours,
            self.minutes,
            self.seconds,
            self.monitored_house_code,
            self.battery_usage_minutes,
            self.last_addressed,
            self.on_off,
            self.dim,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addressing::DeviceCode;

    #[test]
    fn test_decode_reference_block() {
        let status =
            decode_status(&[0xFF, 0xFF, 0, 0, 0, 5, 1, 0x60, 0, 0, 0x01, 0x00, 0, 0]).unwrap();
        assert_eq!(status.battery_usage_minutes, 0);
        assert_eq!((status.hours, status.minutes, status.seconds), (0, 0, 0));
        assert_eq!(status.julian_day, 5);
        assert_eq!(status.day_of_week, DayOfWeek::Sunday);
        assert_eq!(status.monitored_house_code.letter(), 'A');
        assert!(status.last_addressed.is_empty());
        assert_eq!(status.on_off.len(), 1);
        assert!(status.on_off.contains(DeviceCode::new(13).unwrap()));
        assert!(status.dim.is_empty());
    }

    #[test]
    fn test_decode_time_carry() {
        // 75 minutes into an even hour pair: 2 * 5 + 1 = 11:15
        let mut bytes = [0u8; 14];
        bytes[3] = 75;
        bytes[4] = 5;
        let status = decode_status(&bytes).unwrap();
        assert_eq!(status.hours, 11);
        assert_eq!(status.minutes, 15);
    }

    #[test]
    fn test_decode_julian_high_bit_and_weekday() {
        let mut bytes = [0u8; 14];
        bytes[5] = 0x10;
        bytes[6] = 0x80 | 0x40;
        let status = decode_status(&bytes).unwrap();
        assert_eq!(status.julian_day, 256 + 16);
        assert_eq!(status.day_of_week, DayOfWeek::Saturday);
    }

    #[test]
    fn test_decode_battery_and_firmware() {
        let mut bytes = [0u8; 14];
        bytes[0] = 0x34;
        bytes[1] = 0x12;
        bytes[7] = 0x0A;
        let status = decode_status(&bytes).unwrap();
        assert_eq!(status.battery_usage_minutes, 0x1234);
        assert_eq!(status.monitored_house_code.letter(), 'M');
        assert_eq!(status.firmware_revision, 0x0A);
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        assert!(decode_status(&[0u8; 13]).is_err());
        assert!(decode_status(&[0u8; 15]).is_err());
        assert!(decode_status(&[]).is_err());
    }
}
