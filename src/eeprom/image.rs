//! Macro memory image.
//!
//! ```text
//! ┌───────────────────────────────────────────┐
//! │ Offset of macro initiator table (2, BE)   │
//! ├───────────────────────────────────────────┤
//! │ Timer initiators (9 bytes each)           │
//! │ 0xFF                                      │
//! ├───────────────────────────────────────────┤
//! │ Macro initiators (3 bytes each)           │
//! │ 0xFF 0xFF                                 │
//! ├───────────────────────────────────────────┤
//! │ Macro bodies                              │
//! └───────────────────────────────────────────┘
//! ```
//!
//! Macro bodies are placed in order of first reference: each timer's start
//! and stop macro, then each macro initiator's macro. A macro referenced
//! more than once is stored once.

use crate::eeprom::model::{Macro, MacroCatalog, MacroId, TimerInitiator, TimerPoint};
use crate::error::{Result, X10Error};
use crate::protocol::constants::{EEPROM_SIZE, MACRO_DOWNLOAD, PAGE_PACKET_SIZE, PAGE_SIZE};
use crate::protocol::event::Function;
use crate::protocol::packet::{to_bytes, Endian};
use std::collections::BTreeMap;

/// Size of the macro-initiator table offset at the start of the image
pub const HEADER_SIZE: usize = 2;
/// Size of one timer initiator record
pub const TIMER_INITIATOR_SIZE: usize = 9;
/// Size of one macro initiator record
pub const MACRO_INITIATOR_SIZE: usize = 3;

const TERMINATOR: u8 = 0xFF;

/// Offset written for a missing macro: all ten offset bits set.
pub const NO_MACRO: u16 = 0x03FF;

/// Macros of a downloaded image, keyed by their offset in macro memory.
///
/// The interface reports the offset of the macro it starts playing; this
/// table turns it back into the macro.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OffsetTable {
    by_offset: BTreeMap<u16, Macro>,
}

impl OffsetTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, offset: u16) -> Option<&Macro> {
        self.by_offset.get(&offset)
    }

    pub fn len(&self) -> usize {
        self.by_offset.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_offset.is_empty()
    }
}

/// Encoded macro memory, ready to be split into download pages.
#[derive(Debug, Clone)]
pub struct EepromImage {
    bytes: heapless::Vec<u8, EEPROM_SIZE>,
    offsets: BTreeMap<MacroId, u16>,
    table: OffsetTable,
}

impl EepromImage {
    /// Encode a catalog.
    ///
    /// # Errors
    ///
    /// - Capacity error if the image would exceed 1024 bytes or a macro has
    ///   more than 255 elements. Nothing is produced in that case.
    /// - Codec error if an initiator references a macro missing from the
    ///   catalog.
    ///
    /// # Examples
    ///
    /// ```
    /// use x10_cm11a::eeprom::{EepromImage, MacroCatalog};
    ///
    /// let image = EepromImage::encode(&MacroCatalog::new()).unwrap();
    /// // header, timer terminator, initiator terminator
    /// assert_eq!(image.as_bytes(), &[0x00, 0x03, 0xFF, 0xFF, 0xFF]);
    /// assert_eq!(image.pages().count(), 1);
    /// ```
    pub fn encode(catalog: &MacroCatalog) -> Result<Self> {
        let initiator_table = HEADER_SIZE + catalog.timers().len() * TIMER_INITIATOR_SIZE + 1;
        let mut next = initiator_table + catalog.initiators().len() * MACRO_INITIATOR_SIZE + 2;

        // Assign offsets in order of first reference
        let referenced = catalog
            .timers()
            .iter()
            .flat_map(|timer| [timer.start_macro, timer.stop_macro])
            .chain(catalog.initiators().iter().map(|initiator| initiator.macro_id))
            .flatten();

        let mut offsets = BTreeMap::new();
        let mut order = Vec::new();
        for id in referenced {
            if offsets.contains_key(&id) {
                continue;
            }
            let body = catalog.get(id).ok_or_else(X10Error::unknown_macro)?;
            if next > EEPROM_SIZE {
                return Err(X10Error::out_of_macro_memory());
            }
            offsets.insert(id, next as u16);
            order.push(id);
            next += body_size(body)?;
        }
        if next > EEPROM_SIZE {
            return Err(X10Error::out_of_macro_memory());
        }

        let offset_of = |id: Option<MacroId>| {
            id.and_then(|id| offsets.get(&id).copied())
                .unwrap_or(NO_MACRO)
        };

        let mut bytes = heapless::Vec::<u8, EEPROM_SIZE>::new();
        let mut put = |data: &[u8]| {
            bytes.extend_from_slice(data).map_err(|full| {
                x10_log!(debug, "EEPROM image full at {} bytes: {:?}", EEPROM_SIZE, full);
                X10Error::out_of_macro_memory()
            })
        };

        put(&to_bytes::<2>(initiator_table as u32, Endian::Big))?;
        for timer in catalog.timers() {
            put(&encode_timer(
                timer,
                offset_of(timer.start_macro),
                offset_of(timer.stop_macro),
            ))?;
        }
        put(&[TERMINATOR])?;
        for initiator in catalog.initiators() {
            let offset = offset_of(initiator.macro_id);
            let trigger = initiator.trigger;
            put(&[
                (trigger.house.to_value() << 4) | trigger.device.to_value(),
                (u8::from(trigger.on) << 7) | ((offset >> 8) as u8 & 0x03),
                (offset & 0xFF) as u8,
            ])?;
        }
        put(&[TERMINATOR, TERMINATOR])?;

        let mut by_offset = BTreeMap::new();
        for id in order {
            let body = catalog.get(id).ok_or_else(X10Error::unknown_macro)?;
            encode_macro(body, &mut put)?;
            by_offset.insert(offsets[&id], body.clone());
        }

        Ok(Self {
            bytes,
            offsets,
            table: OffsetTable { by_offset },
        })
    }

    /// The encoded image, without page padding.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Offset a macro was placed at.
    pub fn offset_of(&self, id: MacroId) -> Option<u16> {
        self.offsets.get(&id).copied()
    }

    /// Number of distinct macro bodies in the image.
    pub fn macro_count(&self) -> usize {
        self.offsets.len()
    }

    /// Offset-to-macro table matching this image.
    pub fn offset_table(&self) -> &OffsetTable {
        &self.table
    }

    /// Consume the image, keeping only the offset table.
    pub fn into_offset_table(self) -> OffsetTable {
        self.table
    }

    /// Download packets, one per 16-byte page: `[0xFB, addr_hi, addr_lo,
    /// page]`. The last page is zero-padded.
    pub fn pages(&self) -> impl Iterator<Item = [u8; PAGE_PACKET_SIZE]> + '_ {
        self.bytes.chunks(PAGE_SIZE).enumerate().map(|(index, chunk)| {
            let mut packet = [0u8; PAGE_PACKET_SIZE];
            packet[0] = MACRO_DOWNLOAD;
            packet[1..3].copy_from_slice(&to_bytes::<2>((index * PAGE_SIZE) as u32, Endian::Big));
            packet[3..3 + chunk.len()].copy_from_slice(chunk);
            packet
        })
    }
}

fn element_size(function: Function) -> usize {
    match function {
        Function::Dim { .. } | Function::Bright { .. } => 4,
        Function::ExtendedCode { .. } => 5,
        _ => 3,
    }
}

fn body_size(body: &Macro) -> Result<usize> {
    if body.len() > usize::from(u8::MAX) {
        return Err(X10Error::too_many_elements());
    }
    Ok(2 + body
        .elements()
        .iter()
        .map(|element| element_size(element.function()))
        .sum::<usize>())
}

fn encode_macro(body: &Macro, put: &mut impl FnMut(&[u8]) -> Result<()>) -> Result<()> {
    put(&[body.delay(), body.len() as u8])?;
    for element in body.elements() {
        let function = element.function();
        put(&[(element.house().to_value() << 4) | function.code()])?;
        put(&to_bytes::<2>(
            u32::from(element.devices.to_protocol_bits()),
            Endian::Big,
        ))?;
        match function {
            Function::Dim { .. } | Function::Bright { .. } => {
                put(&[(u8::from(element.brighten_first) << 7) | function.dim_steps()])?;
            }
            Function::ExtendedCode { data, command } => put(&[data, command])?,
            _ => {}
        }
    }
    Ok(())
}

fn encode_point(point: TimerPoint) -> (u8, u8, u8) {
    let minute_of_day = point.minute_of_day.min(1439);
    let day_low = (point.julian_day & 0xFF) as u8;
    let two_hour_blocks = (minute_of_day / 120) as u8;
    let day_high = if point.julian_day > 0xFF { 0x80 } else { 0x00 };
    let minutes = day_high | (minute_of_day % 120) as u8;
    (day_low, two_hour_blocks, minutes)
}

fn encode_timer(timer: &TimerInitiator, start: u16, stop: u16) -> [u8; TIMER_INITIATOR_SIZE] {
    let (start_day, start_blocks, start_minutes) = encode_point(timer.start);
    let (stop_day, stop_blocks, stop_minutes) = encode_point(timer.stop);
    [
        timer.weekdays,
        start_day,
        stop_day,
        (start_blocks << 4) | stop_blocks,
        start_minutes,
        stop_minutes,
        (((start >> 8) as u8 & 0x03) << 4) | ((stop >> 8) as u8 & 0x03),
        (start & 0xFF) as u8,
        (stop & 0xFF) as u8,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addressing::{DeviceCode, DeviceSet, HouseCode};
    use crate::eeprom::model::{MacroElement, MacroInitiator, MacroTrigger};

    fn trigger(device: u8) -> MacroTrigger {
        MacroTrigger {
            house: HouseCode::A,
            device: DeviceCode::new(device).unwrap(),
            on: true,
        }
    }

    fn single(function: Function) -> Macro {
        [MacroElement::new(
            HouseCode::A,
            function,
            DeviceSet::from_numbers(&[1]).unwrap(),
        )]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_shared_macro_encoded_once() {
        let mut catalog = MacroCatalog::new();
        let id = catalog.add_macro(single(Function::On));
        catalog
            .add_initiator(MacroInitiator::new(trigger(1), Some(id)))
            .unwrap();
        catalog
            .add_initiator(MacroInitiator::new(trigger(2), Some(id)))
            .unwrap();

        let image = EepromImage::encode(&catalog).unwrap();
        assert_eq!(image.macro_count(), 1);
        // 2 header + 1 + 2 * 3 + 2 = 11
        assert_eq!(image.offset_of(id), Some(11));
        assert_eq!(image.len(), 11 + 2 + 3);

        let bytes = image.as_bytes();
        assert_eq!(&bytes[0..2], &[0x00, 0x03]);
        assert_eq!(&bytes[3..6], &[0x66, 0x80, 11]);
        assert_eq!(&bytes[6..9], &[0x6E, 0x80, 11]);
        assert_eq!(image.offset_table().lookup(11), catalog.get(id));
    }

    #[test]
    fn test_missing_macro_is_sentinel() {
        let mut catalog = MacroCatalog::new();
        catalog
            .add_initiator(MacroInitiator::new(trigger(1), None))
            .unwrap();
        let image = EepromImage::encode(&catalog).unwrap();
        let record = &image.as_bytes()[3..6];
        assert_eq!(record[1] & 0x03, 0x03);
        assert_eq!(record[2], 0xFF);
        assert!(image.offset_table().is_empty());
    }

    #[test]
    fn test_timer_macros_come_first() {
        let mut catalog = MacroCatalog::new();
        let start = catalog.add_macro(single(Function::On));
        let stop = catalog.add_macro(single(Function::dim(210)));
        let timer = TimerInitiator::new(
            TimerPoint::new(1, 1, 6, 30),
            TimerPoint::new(12, 31, 22, 15),
        )
        .with_start_macro(start)
        .with_stop_macro(stop);
        catalog.add_timer(timer).unwrap();

        let image = EepromImage::encode(&catalog).unwrap();
        // 2 + 9 + 1 + 0 + 2 = 14
        assert_eq!(image.offset_of(start), Some(14));
        assert_eq!(image.offset_of(stop), Some(14 + 5));

        let record = &image.as_bytes()[2..11];
        assert_eq!(record[0], 0x7F);
        assert_eq!(record[1], 0);
        assert_eq!(record[2], (365 - 256) as u8);
        // 06:30 -> block 3 minute 30, 22:15 -> block 11 minute 15
        assert_eq!(record[3], (3 << 4) | 11);
        assert_eq!(record[4], 30);
        assert_eq!(record[5], 0x80 | 15);
        assert_eq!(&record[6..9], &[0x00, 14, 19]);

        // device 1 is protocol bit 6
        let stop_body = &image.as_bytes()[19..25];
        assert_eq!(stop_body, &[0, 1, 0x64, 0x00, 0x40, 22]);
    }

    #[test]
    fn test_timer_point_in_two_hour_blocks() {
        // 13:45 is minute 825: block 6, 105 minutes in
        assert_eq!(encode_point(TimerPoint::new(1, 1, 13, 45)), (0, 6, 105));
        // 23:59 lands in the last block
        assert_eq!(encode_point(TimerPoint::new(1, 1, 23, 59)), (0, 11, 119));
        // day 300 carries its ninth bit in the minute byte
        let late = TimerPoint { julian_day: 300, minute_of_day: 0 };
        assert_eq!(encode_point(late), (44, 0, 0x80));
    }

    #[test]
    fn test_out_of_memory() {
        let mut catalog = MacroCatalog::new();
        for device in 1..=16u8 {
            let body: Macro = (0..20)
                .map(|_| {
                    MacroElement::new(
                        HouseCode::A,
                        Function::On,
                        DeviceSet::from_numbers(&[device]).unwrap(),
                    )
                })
                .collect();
            let id = catalog.add_macro(body);
            catalog
                .add_initiator(MacroInitiator::new(trigger(device), Some(id)))
                .unwrap();
        }
        let err = EepromImage::encode(&catalog).unwrap_err();
        assert!(matches!(err, X10Error::Capacity(ref e) if e.is_out_of_macro_memory()));
    }

    #[test]
    fn test_pages_are_padded() {
        let mut catalog = MacroCatalog::new();
        let id = catalog.add_macro(single(Function::On));
        catalog
            .add_initiator(MacroInitiator::new(trigger(1), Some(id)))
            .unwrap();
        let image = EepromImage::encode(&catalog).unwrap();
        assert_eq!(image.len(), 13);

        let pages: Vec<_> = image.pages().collect();
        assert_eq!(pages.len(), 1);
        assert_eq!(&pages[0][0..3], &[0xFB, 0x00, 0x00]);
        assert_eq!(&pages[0][3..16], image.as_bytes());
        assert_eq!(&pages[0][16..19], &[0, 0, 0]);
    }

    #[test]
    fn test_page_addresses() {
        let mut catalog = MacroCatalog::new();
        let body: Macro = (0..10)
            .map(|_| MacroElement::new(HouseCode::A, Function::Off, DeviceSet::new()))
            .collect();
        let id = catalog.add_macro(body);
        catalog
            .add_initiator(MacroInitiator::new(trigger(1), Some(id)))
            .unwrap();
        let image = EepromImage::encode(&catalog).unwrap();
        // 8 table bytes + 2 + 30 = 40 bytes, three pages
        assert_eq!(image.len(), 40);
        let pages: Vec<_> = image.pages().collect();
        assert_eq!(pages.len(), 3);
        assert_eq!(&pages[2][0..3], &[0xFB, 0x00, 0x20]);
    }
}
