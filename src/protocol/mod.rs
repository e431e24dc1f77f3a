//! CM11A serial protocol.
//!
//! This module contains the wire-level pieces of the driver: protocol
//! constants and lookup tables, the X10 event model, packet encoding and
//! decoding, the status block and calendar arithmetic. Nothing here needs
//! `std`.

pub mod calendar;
pub mod constants;
pub mod event;
pub mod packet;
pub mod status;

pub use calendar::{day_of_year, extract_day, extract_month, DayOfWeek};
pub use constants::*;
pub use event::{AddressEvent, Function, FunctionEvent, X10Event};
pub use packet::{
    checksum, clock_packet, decode_upload, encode_address, encode_event, encode_function,
    from_bytes, to_bytes, ClockSettings, Endian, TransmitPacket, UploadEvents,
};
pub use status::{decode_status, DeviceStatus};
