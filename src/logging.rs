//! Unified Logging Macros for the CM11A driver
//!
//! This module provides a unified logging interface that automatically
//! selects between `log::` and `defmt::` based on the active feature flags.
//!
//! # Usage
//!
//! ```rust,ignore
//! use crate::x10_log;
//!
//! x10_log!(info, "Interface started");
//! x10_log!(debug, "Received {} bytes", n);
//! x10_log!(warn, "Breakdown in protocol, draining input");
//! x10_log!(error, "Unable to open port");
//! x10_log!(trace, "PC->CM11A: {:02X?}", packet);
//! ```
//!
//! # Feature Flags
//!
//! - `std` - Uses the `log::` facade (hosts pick any logger, e.g. `env_logger`)
//! - `defmt` without `std` - Uses `defmt::` for `no_std` targets

/// Unified logging macro - automatically selects log:: or defmt:: based on features
///
/// The driver modules only exist on `std` builds, so they always go through
/// `log`. The codec modules also compile for `no_std` targets, where the
/// `defmt` feature routes their messages to `defmt` instead.
#[macro_export]
#[cfg(not(all(feature = "defmt", not(feature = "std"))))]
macro_rules! x10_log {
    (info, $($arg:tt)*) => { log::info!($($arg)*) };
    (debug, $($arg:tt)*) => { log::debug!($($arg)*) };
    (warn, $($arg:tt)*) => { log::warn!($($arg)*) };
    (error, $($arg:tt)*) => { log::error!($($arg)*) };
    (trace, $($arg:tt)*) => { log::trace!($($arg)*) };
}

#[macro_export]
#[cfg(all(feature = "defmt", not(feature = "std")))]
macro_rules! x10_log {
    (info, $($arg:tt)*) => { defmt::info!($($arg)*) };
    (debug, $($arg:tt)*) => { defmt::debug!($($arg)*) };
    (warn, $($arg:tt)*) => { defmt::warn!($($arg)*) };
    (error, $($arg:tt)*) => { defmt::error!($($arg)*) };
    (trace, $($arg:tt)*) => { defmt::trace!($($arg)*) };
}
