//! Convenience macros for X10 addresses.
//!
//! These macros validate house and device codes at compile time, so a
//! literal address in application code can never fail at run time.

/// Creates an address [`X10Event`](crate::protocol::event::X10Event) from
/// `house/device` notation.
///
/// # Syntax
///
/// ```text
/// unit!(house/device)
/// ```
///
/// Where:
/// - `house`: House code letter (A-P, either case)
/// - `device`: Device code (1-16)
///
/// # Examples
///
/// ```
/// use x10_cm11a::{unit, DeviceCode, HouseCode, X10Event};
///
/// let lamp = unit!(A / 3);
/// assert_eq!(lamp, X10Event::address(HouseCode::A, DeviceCode::new(3).unwrap()));
/// assert_eq!(lamp.to_string(), "A3");
/// ```
///
/// # Compile-Time Validation
///
/// ```compile_fail
/// // House codes stop at P
/// let addr = x10_cm11a::unit!(Q / 1);
/// ```
///
/// ```compile_fail
/// // Device codes stop at 16
/// let addr = x10_cm11a::unit!(A / 17);
/// ```
#[macro_export]
macro_rules! unit {
    ($house:ident / $device:literal) => {{
        const HOUSE: $crate::addressing::HouseCode = $crate::house_code!($house);
        const DEVICE: $crate::addressing::DeviceCode =
            match $crate::addressing::DeviceCode::checked($device) {
                Some(device) => device,
                None => panic!("Device code must be 1-16"),
            };
        $crate::protocol::event::X10Event::address(HOUSE, DEVICE)
    }};
}

/// Creates a [`HouseCode`](crate::addressing::HouseCode) from a letter,
/// checked at compile time.
///
/// # Examples
///
/// ```
/// use x10_cm11a::house_code;
///
/// assert_eq!(house_code!(B).letter(), 'B');
/// assert_eq!(house_code!(p).letter(), 'P');
/// ```
#[macro_export]
macro_rules! house_code {
    ($house:ident) => {{
        const HOUSE: $crate::addressing::HouseCode = {
            let letter = stringify!($house).as_bytes();
            if letter.len() != 1 {
                panic!("House code must be a single letter A-P");
            }
            match $crate::addressing::HouseCode::from_ascii(letter[0]) {
                Some(house) => house,
                None => panic!("House code must be A-P"),
            }
        };
        HOUSE
    }};
}

/// Creates a [`DeviceSet`](crate::addressing::DeviceSet) from device
/// numbers, checked at compile time.
///
/// # Examples
///
/// ```
/// use x10_cm11a::{devices, DeviceSet};
///
/// let hall = devices![3, 5];
/// assert_eq!(hall, DeviceSet::from_numbers(&[5, 3]).unwrap());
/// assert!(devices![].is_empty());
/// ```
///
/// ```compile_fail
/// let set = x10_cm11a::devices![0];
/// ```
#[macro_export]
macro_rules! devices {
    ($($device:literal),* $(,)?) => {{
        const SET: $crate::addressing::DeviceSet = {
            #[allow(unused_mut, reason = "empty device lists")]
            let mut set = $crate::addressing::DeviceSet::new();
            $(
                set = match $crate::addressing::DeviceCode::checked($device) {
                    Some(device) => set.with(device),
                    None => panic!("Device code must be 1-16"),
                };
            )*
            set
        };
        SET
    }};
}

#[cfg(test)]
mod tests {
    use crate::addressing::{DeviceCode, DeviceSet, HouseCode};
    use crate::protocol::event::X10Event;

    #[test]
    fn test_unit_macro_basic() {
        let event = unit!(A / 3);
        assert_eq!(
            event,
            X10Event::address(HouseCode::A, DeviceCode::new(3).unwrap())
        );
    }

    #[test]
    fn test_unit_macro_boundaries() {
        assert_eq!(unit!(P / 16).to_string(), "P16");
        assert_eq!(unit!(a / 1).to_string(), "A1");
    }

    #[test]
    fn test_devices_macro() {
        let set = devices![1, 16, 1];
        assert_eq!(set.len(), 2);
        assert_eq!(set, DeviceSet::from_numbers(&[1, 16]).unwrap());
        assert_eq!(devices![], DeviceSet::new());
    }
}
