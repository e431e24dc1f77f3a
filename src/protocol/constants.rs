//! CM11A protocol constants and lookup tables.
//!
//! The interface encodes house codes and device numbers as 4-bit values whose
//! order does not follow the letters or numbers they stand for, so every
//! translation goes through the tables below.

// =============================================================================
// Unsolicited markers (interface -> PC)
// =============================================================================

/// Interface has an incoming power-line event buffered (poll signal)
pub const INCOMING_EVENT: u8 = 0x5A;

/// Interface lost power and needs its clock set again
pub const POWER_FAILURE: u8 = 0xA5;

/// Interface started playing a stored macro
pub const MACRO_INITIATED: u8 = 0x5B;

/// True for the three bytes the interface may send unprompted.
#[inline(always)]
pub const fn is_unsolicited(byte: u8) -> bool {
    matches!(byte, INCOMING_EVENT | POWER_FAILURE | MACRO_INITIATED)
}

// =============================================================================
// Requests and responses (PC -> interface)
// =============================================================================

/// PC acknowledges the poll signal and asks for the event buffer
pub const INCOMING_EVENT_ACK: u8 = 0xC3;

/// Request the 14-byte status block
pub const STATUS_REQUEST: u8 = 0x8B;

/// Header of the 7-byte clock download packet
pub const CLOCK_DOWNLOAD: u8 = 0x9B;

/// Header of a 19-byte EEPROM page download packet
pub const MACRO_DOWNLOAD: u8 = 0xFB;

/// Enable the ring signal
pub const RING_ENABLE: u8 = 0xEB;

/// Disable the ring signal
pub const RING_DISABLE: u8 = 0xDB;

/// PC confirms the checksum echoed by the interface
pub const TRANSMISSION_OK: u8 = 0x00;

/// Interface is ready for the next transmission
pub const INTERFACE_READY: u8 = 0x55;

// =============================================================================
// Header byte bits of a standard transmission
// =============================================================================

/// Always set in a header byte
pub const HEADER_SYNC: u8 = 0x04;

/// Set when the code byte carries a function instead of an address
pub const HEADER_FUNCTION: u8 = 0x02;

/// Set for extended transmissions
pub const HEADER_EXTENDED: u8 = 0x01;

// =============================================================================
// Sizes
// =============================================================================

/// Size of the status block returned for [`STATUS_REQUEST`]
pub const STATUS_SIZE: usize = 14;

/// Maximum size of an incoming event buffer (mask byte + 8 data bytes)
pub const MAX_UPLOAD_SIZE: usize = 9;

/// Size of the on-device macro memory
pub const EEPROM_SIZE: usize = 1024;

/// EEPROM transfer granularity
pub const PAGE_SIZE: usize = 16;

/// Size of a macro download packet: header, 2 address bytes, one page
pub const PAGE_PACKET_SIZE: usize = 3 + PAGE_SIZE;

/// Size of a clock download packet
pub const CLOCK_PACKET_SIZE: usize = 7;

// =============================================================================
// Dim levels
// =============================================================================

/// Level range reported by the interface for uploaded dim/bright events
pub const DIM_MAX: u8 = 210;

/// Number of dim steps a single transmission can carry
pub const DIM_STEPS: u8 = 22;

/// Level of the calibration bright sent before a brighten-first dim
pub const BRIGHTEN_FIRST_LEVEL: u8 = 22;

// =============================================================================
// Lookup tables
// =============================================================================

/// Protocol nibble -> house code letter.
pub const VALUE_TO_HOUSE_CODE: [char; 16] = [
    'M', // value 0
    'E', // value 1
    'C', // value 2
    'K', // value 3
    'O', // value 4
    'G', // value 5
    'A', // value 6
    'I', // value 7
    'N', // value 8
    'F', // value 9
    'D', // value 10
    'L', // value 11
    'P', // value 12
    'H', // value 13
    'B', // value 14
    'J', // value 15
];

/// House code letter index (`A` = 0) -> protocol nibble.
pub const HOUSE_CODE_TO_VALUE: [u8; 16] = [
    0x6, // A
    0xE, // B
    0x2, // C
    0xA, // D
    0x1, // E
    0x9, // F
    0x5, // G
    0xD, // H
    0x7, // I
    0xF, // J
    0x3, // K
    0xB, // L
    0x0, // M
    0x8, // N
    0x4, // O
    0xC, // P
];

/// Protocol nibble (and status bit position) -> device number.
pub const VALUE_TO_DEVICE_CODE: [u8; 16] = [
    13, // position 0
    5,  // position 1
    3,  // position 2
    11, // position 3
    15, // position 4
    7,  // position 5
    1,  // position 6
    9,  // position 7
    14, // position 8
    6,  // position 9
    4,  // position 10
    12, // position 11
    16, // position 12
    8,  // position 13
    2,  // position 14
    10, // position 15
];

/// Device number - 1 -> protocol nibble.
pub const DEVICE_CODE_TO_VALUE: [u8; 16] = [
    0x6, // 1
    0xE, // 2
    0x2, // 3
    0xA, // 4
    0x1, // 5
    0x9, // 6
    0x5, // 7
    0xD, // 8
    0x7, // 9
    0xF, // 10
    0x3, // 11
    0xB, // 12
    0x0, // 13
    0x8, // 14
    0x4, // 15
    0xC, // 16
];

/// Days per month. The interface has no notion of leap years, so February
/// always has 29 days.
pub const DAYS_IN_MONTH: [u16; 12] = [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_house_tables_are_inverse() {
        for (value, letter) in VALUE_TO_HOUSE_CODE.iter().enumerate() {
            let index = (*letter as u8 - b'A') as usize;
            assert_eq!(HOUSE_CODE_TO_VALUE[index] as usize, value);
        }
    }

    #[test]
    fn test_device_tables_are_inverse() {
        for (value, device) in VALUE_TO_DEVICE_CODE.iter().enumerate() {
            assert_eq!(DEVICE_CODE_TO_VALUE[(*device - 1) as usize] as usize, value);
        }
    }

    #[test]
    fn test_days_in_year() {
        let total: u16 = DAYS_IN_MONTH.iter().sum();
        assert_eq!(total, 366);
    }

    #[test]
    fn test_unsolicited_markers() {
        assert!(is_unsolicited(0x5A));
        assert!(is_unsolicited(0xA5));
        assert!(is_unsolicited(0x5B));
        assert!(!is_unsolicited(INTERFACE_READY));
        assert!(!is_unsolicited(TRANSMISSION_OK));
    }

    #[test]
    fn test_page_packet_size() {
        assert_eq!(PAGE_PACKET_SIZE, 19);
    }
}
