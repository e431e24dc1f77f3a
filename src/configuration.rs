//! Gateway configuration.
//!
//! Settings can be built in code or parsed from `KEY=VALUE` lines, see
//! [`CONFIG`] for the recognised keys and their defaults. Unknown keys are
//! ignored and invalid values fall back to the default.

use crate::utility::{find_value, parse_bool, parse_millis};
use core::time::Duration;

/// Sample configuration with every key at its default value.
pub const CONFIG: &str = r#"
X10_PORT=COM2
X10_BAUD=4800
X10_DATA_BITS=8
X10_STOP_BITS=1
X10_PARITY=none
X10_AUTO_RECOVER=true
X10_MAX_ATTEMPTS=3
X10_POLL_INCREMENT_MS=100
X10_IO_TIMEOUT_MS=3000
X10_JOIN_TIMEOUT_MS=5000
X10_OPEN_RETRY_MS=3000
X10_OPEN_RETRY_STEP_MS=500
"#;

/// Serial parity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
}

impl core::str::FromStr for Parity {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "n" => Ok(Self::None),
            "odd" | "o" => Ok(Self::Odd),
            "even" | "e" => Ok(Self::Even),
            _ => Err(()),
        }
    }
}

/// Driver and serial port settings.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use x10_cm11a::GatewayConfig;
///
/// let config = GatewayConfig::default()
///     .with_port_name("/dev/ttyUSB0")
///     .with_max_attempts(5);
/// assert_eq!(config.baud_rate, 4800);
///
/// let parsed = GatewayConfig::parse("X10_PORT=/dev/ttyS1\nX10_POLL_INCREMENT_MS=50");
/// assert_eq!(parsed.port_name, "/dev/ttyS1");
/// assert_eq!(parsed.poll_increment, Duration::from_millis(50));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GatewayConfig {
    pub port_name: String,
    pub baud_rate: u32,
    pub data_bits: u8,
    pub stop_bits: u8,
    pub parity: Parity,
    /// Set the clock again after the interface reports a power failure
    pub auto_recover: bool,
    /// Attempts per transmission unit before it is abandoned
    pub max_attempts: u8,
    /// Sleep between availability checks while waiting for a reply
    pub poll_increment: Duration,
    /// Longest wait for a reply
    pub io_timeout: Duration,
    /// Longest wait for the worker thread on deallocation
    pub join_timeout: Duration,
    /// Total time spent retrying a busy port on open
    pub open_retry: Duration,
    /// Pause between open attempts
    pub open_retry_step: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port_name: String::from("COM2"),
            baud_rate: 4800,
            data_bits: 8,
            stop_bits: 1,
            parity: Parity::None,
            auto_recover: true,
            max_attempts: 3,
            poll_increment: Duration::from_millis(100),
            io_timeout: Duration::from_millis(3000),
            join_timeout: Duration::from_secs(5),
            open_retry: Duration::from_millis(3000),
            open_retry_step: Duration::from_millis(500),
        }
    }
}

impl GatewayConfig {
    /// Parse `KEY=VALUE` lines on top of the defaults.
    pub fn parse(text: &str) -> Self {
        let mut config = Self::default();

        if let Some(port) = find_value(text, "X10_PORT").filter(|v| !v.is_empty()) {
            config.port_name = port.to_string();
        }
        if let Some(baud) = find_value(text, "X10_BAUD").and_then(|v| v.parse::<u32>().ok()) {
            config.baud_rate = baud;
        }
        if let Some(bits) = find_value(text, "X10_DATA_BITS")
            .and_then(|v| v.parse::<u8>().ok())
            .filter(|bits| (5..=8).contains(bits))
        {
            config.data_bits = bits;
        }
        if let Some(bits) = find_value(text, "X10_STOP_BITS")
            .and_then(|v| v.parse::<u8>().ok())
            .filter(|bits| (1..=2).contains(bits))
        {
            config.stop_bits = bits;
        }
        if let Some(parity) = find_value(text, "X10_PARITY").and_then(|v| v.parse::<Parity>().ok()) {
            config.parity = parity;
        }
        if let Some(flag) = find_value(text, "X10_AUTO_RECOVER").and_then(parse_bool) {
            config.auto_recover = flag;
        }
        if let Some(attempts) = find_value(text, "X10_MAX_ATTEMPTS")
            .and_then(|v| v.parse::<u8>().ok())
            .filter(|attempts| *attempts > 0)
        {
            config.max_attempts = attempts;
        }
        let millis = |key: &str| {
            find_value(text, key)
                .and_then(parse_millis)
                .filter(|d| !d.is_zero())
        };
        if let Some(d) = millis("X10_POLL_INCREMENT_MS") {
            config.poll_increment = d;
        }
        if let Some(d) = millis("X10_IO_TIMEOUT_MS") {
            config.io_timeout = d;
        }
        if let Some(d) = millis("X10_JOIN_TIMEOUT_MS") {
            config.join_timeout = d;
        }
        if let Some(d) = millis("X10_OPEN_RETRY_MS") {
            config.open_retry = d;
        }
        if let Some(d) = millis("X10_OPEN_RETRY_STEP_MS") {
            config.open_retry_step = d;
        }
        config
    }

    #[must_use]
    pub fn with_port_name(mut self, port_name: impl Into<String>) -> Self {
        self.port_name = port_name.into();
        self
    }

    #[must_use]
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    #[must_use]
    pub fn with_auto_recover(mut self, auto_recover: bool) -> Self {
        self.auto_recover = auto_recover;
        self
    }

    /// Attempts per unit, at least one.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u8) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    #[must_use]
    pub fn with_poll_increment(mut self, poll_increment: Duration) -> Self {
        self.poll_increment = poll_increment;
        self
    }

    #[must_use]
    pub fn with_io_timeout(mut self, io_timeout: Duration) -> Self {
        self.io_timeout = io_timeout;
        self
    }

    #[must_use]
    pub fn with_join_timeout(mut self, join_timeout: Duration) -> Self {
        self.join_timeout = join_timeout;
        self
    }

    #[must_use]
    pub fn with_open_retry(mut self, total: Duration, step: Duration) -> Self {
        self.open_retry = total;
        self.open_retry_step = step;
        self
    }
}
