//! Macros, timer initiators and macro initiators.
//!
//! Macros live in a [`MacroCatalog`] arena and are referenced by
//! [`MacroId`], so one macro can be shared by several initiators and still
//! be stored on the interface only once.

use crate::addressing::{DeviceCode, DeviceSet, HouseCode};
use crate::error::{Result, X10Error};
use crate::protocol::calendar::day_of_year;
use crate::protocol::event::{Function, FunctionEvent};
use core::fmt;

/// Longest start delay a macro can carry, in minutes.
pub const MAX_MACRO_DELAY: u8 = 240;

/// Handle of a macro inside a [`MacroCatalog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MacroId(u16);

impl MacroId {
    /// Position of the macro in its catalog.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for MacroId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "macro#{}", self.0)
    }
}

/// One step of a macro: a function applied to a set of devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MacroElement {
    pub event: FunctionEvent,
    /// Devices addressed before the function; may be empty
    pub devices: DeviceSet,
    /// For Dim/Bright: bring the lamps to full brightness first
    pub brighten_first: bool,
}

impl MacroElement {
    pub const fn new(house: HouseCode, function: Function, devices: DeviceSet) -> Self {
        Self {
            event: FunctionEvent::new(house, function),
            devices,
            brighten_first: false,
        }
    }

    /// Builder-style brighten-first flag.
    #[must_use]
    pub const fn with_brighten_first(mut self, brighten_first: bool) -> Self {
        self.brighten_first = brighten_first;
        self
    }

    pub const fn house(&self) -> HouseCode {
        self.event.house
    }

    pub const fn function(&self) -> Function {
        self.event.function
    }
}

/// Ordered list of elements played back by the interface.
///
/// # Examples
///
/// ```
/// use x10_cm11a::{DeviceSet, Function, HouseCode};
/// use x10_cm11a::eeprom::{Macro, MacroElement};
///
/// let mut lights = Macro::new();
/// lights.push(MacroElement::new(
///     HouseCode::A,
///     Function::On,
///     DeviceSet::from_numbers(&[1, 2]).unwrap(),
/// ));
/// assert_eq!(lights.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Macro {
    delay: u8,
    elements: Vec<MacroElement>,
}

impl Macro {
    pub fn new() -> Self {
        Self::default()
    }

    /// Macro with a start delay in minutes.
    ///
    /// # Errors
    ///
    /// Returns a codec error if `delay` exceeds [`MAX_MACRO_DELAY`].
    pub fn with_delay(delay: u8) -> Result<Self> {
        if delay > MAX_MACRO_DELAY {
            return Err(X10Error::value_out_of_range());
        }
        Ok(Self {
            delay,
            elements: Vec::new(),
        })
    }

    pub fn push(&mut self, element: MacroElement) {
        self.elements.push(element);
    }

    pub fn delay(&self) -> u8 {
        self.delay
    }

    pub fn elements(&self) -> &[MacroElement] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl FromIterator<MacroElement> for Macro {
    fn from_iter<I: IntoIterator<Item = MacroElement>>(iter: I) -> Self {
        Self {
            delay: 0,
            elements: iter.into_iter().collect(),
        }
    }
}

/// Point in the interface's calendar: 0-based julian day plus time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimerPoint {
    pub julian_day: u16,
    /// Minutes since midnight (0..1440)
    pub minute_of_day: u16,
}

impl TimerPoint {
    /// Build from a calendar date and time. Out-of-range values clamp.
    pub fn new(month: u8, day: u8, hours: u8, minutes: u8) -> Self {
        Self {
            julian_day: day_of_year(month, day),
            minute_of_day: u16::from(hours.min(23)) * 60 + u16::from(minutes.min(59)),
        }
    }
}

/// Runs a start macro and a stop macro on a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimerInitiator {
    pub start_macro: Option<MacroId>,
    pub stop_macro: Option<MacroId>,
    /// Day-of-week mask, Sunday = 0x01 .. Saturday = 0x40
    pub weekdays: u8,
    pub start: TimerPoint,
    pub stop: TimerPoint,
}

impl TimerInitiator {
    /// Every day of the week.
    pub const ALL_WEEK: u8 = 0x7F;

    pub fn new(start: TimerPoint, stop: TimerPoint) -> Self {
        Self {
            start_macro: None,
            stop_macro: None,
            weekdays: Self::ALL_WEEK,
            start,
            stop,
        }
    }

    #[must_use]
    pub fn with_start_macro(mut self, id: MacroId) -> Self {
        self.start_macro = Some(id);
        self
    }

    #[must_use]
    pub fn with_stop_macro(mut self, id: MacroId) -> Self {
        self.stop_macro = Some(id);
        self
    }

    #[must_use]
    pub fn with_weekdays(mut self, mask: u8) -> Self {
        self.weekdays = mask & Self::ALL_WEEK;
        self
    }
}

/// Power-line event that starts a macro.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MacroTrigger {
    pub house: HouseCode,
    pub device: DeviceCode,
    /// `true` for On, `false` for Off
    pub on: bool,
}

impl MacroTrigger {
    pub const fn new(house: HouseCode, device: DeviceCode, on: bool) -> Self {
        Self { house, device, on }
    }
}

/// Starts a macro when a device is switched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MacroInitiator {
    pub trigger: MacroTrigger,
    pub macro_id: Option<MacroId>,
}

impl MacroInitiator {
    pub const fn new(trigger: MacroTrigger, macro_id: Option<MacroId>) -> Self {
        Self { trigger, macro_id }
    }
}

/// Everything stored in the interface's macro memory.
#[derive(Debug, Clone, Default)]
pub struct MacroCatalog {
    macros: Vec<Macro>,
    timers: Vec<TimerInitiator>,
    initiators: Vec<MacroInitiator>,
}

impl MacroCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a macro and return its handle.
    pub fn add_macro(&mut self, value: Macro) -> MacroId {
        let id = MacroId(self.macros.len() as u16);
        self.macros.push(value);
        id
    }

    /// Look up a macro by handle.
    pub fn get(&self, id: MacroId) -> Option<&Macro> {
        self.macros.get(id.index())
    }

    /// Add a timer initiator.
    ///
    /// # Errors
    ///
    /// Returns a codec error if it references a macro not in this catalog.
    pub fn add_timer(&mut self, timer: TimerInitiator) -> Result<()> {
        self.check(timer.start_macro)?;
        self.check(timer.stop_macro)?;
        self.timers.push(timer);
        Ok(())
    }

    /// Add a macro initiator.
    ///
    /// # Errors
    ///
    /// Returns a codec error if it references a macro not in this catalog.
    pub fn add_initiator(&mut self, initiator: MacroInitiator) -> Result<()> {
        self.check(initiator.macro_id)?;
        self.initiators.push(initiator);
        Ok(())
    }

    pub fn remove_timer(&mut self, timer: &TimerInitiator) -> bool {
        let before = self.timers.len();
        self.timers.retain(|t| t != timer);
        before != self.timers.len()
    }

    pub fn remove_initiator(&mut self, initiator: &MacroInitiator) -> bool {
        let before = self.initiators.len();
        self.initiators.retain(|i| i != initiator);
        before != self.initiators.len()
    }

    pub fn timers(&self) -> &[TimerInitiator] {
        &self.timers
    }

    pub fn initiators(&self) -> &[MacroInitiator] {
        &self.initiators
    }

    /// Remove all initiators and macros.
    pub fn clear(&mut self) {
        self.macros.clear();
        self.timers.clear();
        self.initiators.clear();
    }

    fn check(&self, id: Option<MacroId>) -> Result<()> {
        match id {
            Some(id) if self.get(id).is_none() => Err(X10Error::unknown_macro()),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "serde")]
    #[test]
    fn test_macro_model_is_serializable() {
        fn assert_serde<T: serde::Serialize + serde::de::DeserializeOwned>() {}
        assert_serde::<Macro>();
        assert_serde::<MacroElement>();
        assert_serde::<TimerInitiator>();
        assert_serde::<MacroInitiator>();
    }

    fn lights_on() -> Macro {
        [MacroElement::new(
            HouseCode::A,
            Function::On,
            DeviceSet::from_numbers(&[1]).unwrap(),
        )]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_macro_delay_bound() {
        assert_eq!(Macro::with_delay(240).unwrap().delay(), 240);
        assert!(Macro::with_delay(241).is_err());
    }

    #[test]
    fn test_catalog_ids_are_stable() {
        let mut catalog = MacroCatalog::new();
        let first = catalog.add_macro(lights_on());
        let second = catalog.add_macro(Macro::new());
        assert_ne!(first, second);
        assert_eq!(catalog.get(first).unwrap().len(), 1);
        assert!(catalog.get(second).unwrap().is_empty());
    }

    #[test]
    fn test_catalog_rejects_foreign_macro() {
        let mut other = MacroCatalog::new();
        other.add_macro(Macro::new());
        let foreign = other.add_macro(Macro::new());

        let mut catalog = MacroCatalog::new();
        let trigger = MacroTrigger {
            house: HouseCode::A,
            device: DeviceCode::new(1).unwrap(),
            on: true,
        };
        let err = catalog
            .add_initiator(MacroInitiator::new(trigger, Some(foreign)))
            .unwrap_err();
        assert!(matches!(err, X10Error::Codec(ref e) if e.is_unknown_macro()));
        assert!(catalog
            .add_initiator(MacroInitiator::new(trigger, None))
            .is_ok());
    }

    #[test]
    fn test_remove_initiators() {
        let mut catalog = MacroCatalog::new();
        let id = catalog.add_macro(lights_on());
        let timer = TimerInitiator::new(TimerPoint::new(1, 1, 7, 0), TimerPoint::new(12, 31, 8, 0))
            .with_start_macro(id);
        catalog.add_timer(timer).unwrap();
        assert!(catalog.remove_timer(&timer));
        assert!(!catalog.remove_timer(&timer));
    }

    #[test]
    fn test_timer_point_clamps() {
        let point = TimerPoint::new(2, 30, 25, 61);
        assert_eq!(point.julian_day, day_of_year(2, 29));
        assert_eq!(point.minute_of_day, 23 * 60 + 59);
    }
}
