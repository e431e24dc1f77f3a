//! Day-of-year arithmetic on the interface's calendar.
//!
//! The CM11A counts days in a fixed 366-day year (February always has 29
//! days). Julian days here are 0-based: January 1st is day 0.

use crate::protocol::constants::DAYS_IN_MONTH;
use core::fmt;

/// Clamp a 1-based month into 1..=12.
#[inline]
pub fn normalize_month(month: u8) -> u8 {
    month.clamp(1, 12)
}

/// Clamp a 1-based day into the valid range of `month` (already normalized).
#[inline]
pub fn normalize_day(month: u8, day: u8) -> u8 {
    let last = DAYS_IN_MONTH[usize::from(normalize_month(month) - 1)] as u8;
    day.clamp(1, last)
}

/// 0-based day of year for a 1-based month and day.
///
/// Out-of-range months and days clamp to the nearest valid value.
///
/// # Examples
///
/// ```
/// use x10_cm11a::protocol::calendar::day_of_year;
///
/// assert_eq!(day_of_year(1, 1), 0);
/// assert_eq!(day_of_year(3, 1), 60);
/// assert_eq!(day_of_year(12, 31), 365);
/// assert_eq!(day_of_year(13, 40), 365);
/// ```
pub fn day_of_year(month: u8, day: u8) -> u16 {
    let month = normalize_month(month);
    let day = normalize_day(month, day);
    let before: u16 = DAYS_IN_MONTH[..usize::from(month - 1)].iter().sum();
    before + u16::from(day) - 1
}

/// 1-based month containing a 0-based julian day. Days past the end of the
/// year land in December.
pub fn extract_month(julian: u16) -> u8 {
    let mut remaining = julian;
    for (index, days) in DAYS_IN_MONTH.iter().enumerate() {
        if remaining < *days {
            return index as u8 + 1;
        }
        remaining -= days;
    }
    12
}

/// 1-based day of month for a 0-based julian day.
pub fn extract_day(julian: u16) -> u8 {
    let month = extract_month(julian);
    let before: u16 = DAYS_IN_MONTH[..usize::from(month - 1)].iter().sum();
    let day = julian.saturating_sub(before) + 1;
    day.min(DAYS_IN_MONTH[usize::from(month - 1)]) as u8
}

/// Day of the week as the interface's one-hot mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum DayOfWeek {
    Sunday = 0x01,
    Monday = 0x02,
    Tuesday = 0x04,
    Wednesday = 0x08,
    Thursday = 0x10,
    Friday = 0x20,
    Saturday = 0x40,
}

impl DayOfWeek {
    /// Decode a one-hot mask. Anything that is not exactly one known bit
    /// decodes as Sunday.
    pub const fn from_mask(mask: u8) -> Self {
        match mask & 0x7F {
            0x02 => Self::Monday,
            0x04 => Self::Tuesday,
            0x08 => Self::Wednesday,
            0x10 => Self::Thursday,
            0x20 => Self::Friday,
            0x40 => Self::Saturday,
            _ => Self::Sunday,
        }
    }

    /// Days since Sunday (Sunday = 0).
    pub const fn from_days_from_sunday(days: u8) -> Self {
        match days % 7 {
            1 => Self::Monday,
            2 => Self::Tuesday,
            3 => Self::Wednesday,
            4 => Self::Thursday,
            5 => Self::Friday,
            6 => Self::Saturday,
            _ => Self::Sunday,
        }
    }

    /// The one-hot mask.
    #[inline(always)]
    pub const fn mask(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sunday => "Sunday",
            Self::Monday => "Monday",
            Self::Tuesday => "Tuesday",
            Self::Wednesday => "Wednesday",
            Self::Thursday => "Thursday",
            Self::Friday => "Friday",
            Self::Saturday => "Saturday",
        };
        f.write_str(name)
    }
}
