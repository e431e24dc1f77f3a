//! CM11A serial packet encoding and decoding.
//!
//! ## Standard transmission
//!
//! ```text
//! ┌──────────────────────────────┬──────────────────────────┐
//! │ Header                       │ Code                     │
//! │ steps<<3 | 0x04 | F | E      │ house<<4 | device/func   │
//! └──────────────────────────────┴──────────────────────────┘
//! F = 0x02 when the code carries a function
//! E = 0x01 for extended transmissions (followed by data, command)
//! ```
//!
//! The interface echoes the byte-wise sum of the packet, the PC confirms
//! with 0x00 and the interface answers 0x55 once the power line is free.
//!
//! ## Incoming event buffer
//!
//! ```text
//! ┌──────────┬─────────┬─────────┬─────┐
//! │ Mask     │ Byte 1  │ Byte 2  │ ... │   up to 8 data bytes
//! └──────────┴─────────┴─────────┴─────┘
//! mask bit (i - 1) set: byte i is a function, otherwise an address
//! ```

use crate::addressing::{DeviceCode, HouseCode};
use crate::error::{Result, X10Error};
use crate::protocol::calendar::{day_of_year, DayOfWeek};
use crate::protocol::constants::{
    CLOCK_DOWNLOAD, CLOCK_PACKET_SIZE, DIM_MAX, HEADER_EXTENDED, HEADER_FUNCTION, HEADER_SYNC,
    MAX_UPLOAD_SIZE,
};
use crate::protocol::event::{Function, X10Event};

/// Largest standard or extended transmission packet.
pub const MAX_TRANSMIT_SIZE: usize = 4;

/// Most events a single upload buffer can hold.
pub const MAX_UPLOAD_EVENTS: usize = MAX_UPLOAD_SIZE - 1;

/// Encoded transmission packet.
pub type TransmitPacket = heapless::Vec<u8, MAX_TRANSMIT_SIZE>;

/// Events decoded from one upload buffer.
pub type UploadEvents = heapless::Vec<X10Event, MAX_UPLOAD_EVENTS>;

/// Byte order for [`to_bytes`] and [`from_bytes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Endian {
    /// Most significant byte first
    Big,
    /// Least significant byte first
    Little,
}

/// Write the low `N` bytes of `value` in the given order.
///
/// # Examples
///
/// ```
/// use x10_cm11a::protocol::packet::{to_bytes, Endian};
///
/// assert_eq!(to_bytes::<2>(0x0120, Endian::Big), [0x01, 0x20]);
/// assert_eq!(to_bytes::<2>(0x0120, Endian::Little), [0x20, 0x01]);
/// ```
pub fn to_bytes<const N: usize>(value: u32, endian: Endian) -> [u8; N] {
    let mut out = [0u8; N];
    for i in 0..N.min(4) {
        let byte = (value >> (8 * i)) as u8;
        match endian {
            Endian::Big => out[N - 1 - i] = byte,
            Endian::Little => out[i] = byte,
        }
    }
    out
}

/// Read up to four bytes as an unsigned integer.
pub fn from_bytes(bytes: &[u8], endian: Endian) -> u32 {
    let bytes = &bytes[..bytes.len().min(4)];
    match endian {
        Endian::Big => bytes
            .iter()
            .fold(0u32, |acc, &byte| (acc << 8) | u32::from(byte)),
        Endian::Little => bytes
            .iter()
            .rev()
            .fold(0u32, |acc, &byte| (acc << 8) | u32::from(byte)),
    }
}

/// Byte-wise sum of a packet, modulo 256.
#[inline]
pub fn checksum(packet: &[u8]) -> u8 {
    packet.iter().fold(0u8, |sum, &byte| sum.wrapping_add(byte))
}

/// Encode an address transmission.
///
/// # Examples
///
/// ```
/// use x10_cm11a::{DeviceCode, HouseCode};
/// use x10_cm11a::protocol::packet::encode_address;
///
/// let packet = encode_address(HouseCode::new('A').unwrap(), DeviceCode::new(1).unwrap());
/// assert_eq!(packet, [0x04, 0x66]);
/// ```
#[inline]
pub const fn encode_address(house: HouseCode, device: DeviceCode) -> [u8; 2] {
    [HEADER_SYNC, (house.to_value() << 4) | device.to_value()]
}

/// Encode a function transmission.
///
/// Dim and Bright carry their level scaled to 0..=22 steps in the header;
/// extended codes produce the 4-byte form.
pub fn encode_function(house: HouseCode, function: Function) -> TransmitPacket {
    let mut packet = TransmitPacket::new();
    let code = (house.to_value() << 4) | function.code();
    // Capacity is 4 and at most 4 bytes are pushed
    if let Function::ExtendedCode { data, command } = function {
        let _ = packet.extend_from_slice(&[
            HEADER_SYNC | HEADER_FUNCTION | HEADER_EXTENDED,
            code,
            data,
            command,
        ]);
    } else {
        let header = (function.dim_steps() << 3) | HEADER_SYNC | HEADER_FUNCTION;
        let _ = packet.extend_from_slice(&[header, code]);
    }
    packet
}

/// Encode any event.
pub fn encode_event(event: &X10Event) -> TransmitPacket {
    match event {
        X10Event::Address(address) => {
            let mut packet = TransmitPacket::new();
            let _ = packet.extend_from_slice(&encode_address(address.house, address.device));
            packet
        }
        X10Event::Function(function) => encode_function(function.house, function.function),
    }
}

/// Decode an incoming event buffer (mask byte followed by 1-8 data bytes).
///
/// # Errors
///
/// - Buffers shorter than 2 or longer than 9 bytes are rejected.
/// - A Dim/Bright or extended code missing its operand bytes stops decoding
///   with a truncated-upload error.
///
/// # Examples
///
/// ```
/// use x10_cm11a::protocol::packet::decode_upload;
/// use x10_cm11a::protocol::event::{Function, X10Event};
///
/// // A1, then "A on"
/// let events = decode_upload(&[0x02, 0x66, 0x62]).unwrap();
/// assert_eq!(events.len(), 2);
/// assert!(matches!(events[1], X10Event::Function(f) if f.function == Function::On));
/// ```
pub fn decode_upload(buffer: &[u8]) -> Result<UploadEvents> {
    if buffer.len() < 2 || buffer.len() > MAX_UPLOAD_SIZE {
        return Err(X10Error::invalid_upload_length());
    }

    let mask = buffer[0];
    let mut events = UploadEvents::new();
    let mut i = 1;
    while i < buffer.len() {
        let house = HouseCode::from_value(buffer[i] >> 4);
        let low = buffer[i] & 0x0F;

        let event = if mask & (1 << (i - 1)) != 0 {
            let function = match Function::from_code(low)? {
                Function::Dim { .. } => {
                    i += 1;
                    Function::Dim {
                        level: *buffer.get(i).ok_or_else(X10Error::truncated_upload)?,
                        max: DIM_MAX,
                    }
                }
                Function::Bright { .. } => {
                    i += 1;
                    Function::Bright {
                        level: *buffer.get(i).ok_or_else(X10Error::truncated_upload)?,
                        max: DIM_MAX,
                    }
                }
                Function::ExtendedCode { .. } => {
                    let data = *buffer.get(i + 1).ok_or_else(X10Error::truncated_upload)?;
                    let command = *buffer.get(i + 2).ok_or_else(X10Error::truncated_upload)?;
                    i += 2;
                    Function::ExtendedCode { data, command }
                }
                other => other,
            };
            X10Event::function(house, function)
        } else {
            X10Event::address(house, DeviceCode::from_value(low))
        };

        // At most 8 data bytes, so at most 8 events
        let _ = events.push(event);
        i += 1;
    }
    Ok(events)
}

/// Settings for a clock download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClockSettings {
    pub seconds: u8,
    pub minutes: u8,
    pub hours: u8,
    /// 0-based day of year, see [`day_of_year`]
    pub julian_day: u16,
    pub day_of_week: DayOfWeek,
    /// House code the interface monitors
    pub house: HouseCode,
    pub clear_battery_timer: bool,
    pub purge_timer: bool,
    pub clear_monitored_status: bool,
}

impl ClockSettings {
    /// Clock settings for a calendar date and time, with all flags clear.
    pub fn new(
        month: u8,
        day: u8,
        hours: u8,
        minutes: u8,
        seconds: u8,
        day_of_week: DayOfWeek,
        house: HouseCode,
    ) -> Self {
        Self {
            seconds: seconds.min(59),
            minutes: minutes.min(59),
            hours: hours.min(23),
            julian_day: day_of_year(month, day),
            day_of_week,
            house,
            clear_battery_timer: false,
            purge_timer: false,
            clear_monitored_status: false,
        }
    }

    /// Settings taken from the local wall clock.
    #[cfg(feature = "std")]
    pub fn now(house: HouseCode) -> Self {
        use chrono::{Datelike, Timelike};

        let now = chrono::Local::now();
        Self::new(
            now.month() as u8,
            now.day() as u8,
            now.hour() as u8,
            now.minute() as u8,
            now.second() as u8,
            DayOfWeek::from_days_from_sunday(now.weekday().num_days_from_sunday() as u8),
            house,
        )
    }

    /// Encode the 7-byte clock download packet.
    ///
    /// ```text
    /// [0x9B, seconds, minutes % 120, minutes / 120,
    ///  julian low, weekday | julian bit 8 << 7, house << 4 | flags]
    /// ```
    pub fn to_packet(&self) -> [u8; CLOCK_PACKET_SIZE] {
        let minute_of_day = u16::from(self.hours) * 60 + u16::from(self.minutes);
        let mut flags = 0;
        if self.clear_battery_timer {
            flags |= 0x04;
        }
        if self.purge_timer {
            flags |= 0x02;
        }
        if self.clear_monitored_status {
            flags |= 0x01;
        }
        let day_high = if self.julian_day > 0xFF { 0x80 } else { 0x00 };
        [
            CLOCK_DOWNLOAD,
            self.seconds,
            (minute_of_day % 120) as u8,
            (minute_of_day / 120) as u8,
            (self.julian_day & 0xFF) as u8,
            self.day_of_week.mask() | day_high,
            (self.house.to_value() << 4) | flags,
        ]
    }
}

/// Encode a clock download packet.
#[inline]
pub fn clock_packet(clock: &ClockSettings) -> [u8; CLOCK_PACKET_SIZE] {
    clock.to_packet()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn house(letter: char) -> HouseCode {
        HouseCode::new(letter).unwrap()
    }

    fn device(number: u8) -> DeviceCode {
        DeviceCode::new(number).unwrap()
    }

    #[test]
    fn test_encode_address() {
        assert_eq!(encode_address(house('A'), device(1)), [0x04, 0x66]);
        assert_eq!(encode_address(house('M'), device(13)), [0x04, 0x00]);
    }

    #[test]
    fn test_encode_function_on() {
        let packet = encode_function(house('A'), Function::On);
        assert_eq!(packet.as_slice(), &[0x06, 0x62]);
    }

    #[test]
    fn test_encode_function_full_dim() {
        let packet = encode_function(house('A'), Function::dim(210));
        assert_eq!(packet.as_slice(), &[(22 << 3) | 0x06, 0x64]);
    }

    #[test]
    fn test_encode_extended() {
        let function = Function::ExtendedCode {
            data: 0x3F,
            command: 0x31,
        };
        let packet = encode_function(house('B'), function);
        assert_eq!(packet.as_slice(), &[0x07, 0xE7, 0x3F, 0x31]);
    }

    #[test]
    fn test_checksum_wraps() {
        assert_eq!(checksum(&[0x04, 0x66]), 0x6A);
        assert_eq!(checksum(&[0xFF, 0x02]), 0x01);
        assert_eq!(checksum(&[]), 0);
    }

    #[test]
    fn test_to_from_bytes() {
        assert_eq!(to_bytes::<2>(0x0120, Endian::Big), [0x01, 0x20]);
        assert_eq!(to_bytes::<3>(0x0001_0203, Endian::Little), [0x03, 0x02, 0x01]);
        assert_eq!(from_bytes(&[0x01, 0x20], Endian::Big), 0x0120);
        assert_eq!(from_bytes(&[0x20, 0x01], Endian::Little), 0x0120);
    }

    #[test]
    fn test_decode_upload_length_guard() {
        assert!(decode_upload(&[0x00]).is_err());
        assert!(decode_upload(&[0x00; 10]).is_err());
    }

    #[test]
    fn test_decode_upload_address_then_dim() {
        // A3, A dim 105/210
        let events = decode_upload(&[0x02, 0x62, 0x64, 105]).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], X10Event::address(house('A'), device(3)));
        assert_eq!(
            events[1],
            X10Event::function(house('A'), Function::dim(105))
        );
    }

    #[test]
    fn test_decode_upload_extended() {
        let events = decode_upload(&[0x01, 0x67, 0x10, 0x20]).unwrap();
        assert_eq!(
            events[0],
            X10Event::function(
                house('A'),
                Function::ExtendedCode {
                    data: 0x10,
                    command: 0x20
                }
            )
        );
    }

    #[test]
    fn test_decode_upload_truncated_operand() {
        let err = decode_upload(&[0x01, 0x64]).unwrap_err();
        assert!(matches!(err, X10Error::Protocol(_)));
    }

    #[test]
    fn test_clock_packet_layout() {
        let mut clock = ClockSettings::new(12, 31, 13, 45, 30, DayOfWeek::Friday, house('A'));
        clock.purge_timer = true;
        let packet = clock.to_packet();
        // 13:45 is minute 825 of the day: block 6, minute 105; day 365 keeps 109 in the low byte
        assert_eq!(packet, [0x9B, 30, 105, 6, 109, 0x20 | 0x80, 0x62]);
    }

    #[test]
    fn test_clock_packet_early_day() {
        let clock = ClockSettings::new(1, 6, 0, 0, 0, DayOfWeek::Sunday, house('M'));
        assert_eq!(clock.to_packet(), [0x9B, 0, 0, 0, 5, 0x01, 0x00]);
    }
}
