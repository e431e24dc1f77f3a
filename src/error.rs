//! Error types for CM11A operations.
//!
//! This module provides structured error types with backtraces (when std is enabled)
//! and helper methods for error information.

use core::fmt;

#[cfg(feature = "std")]
use std::backtrace::Backtrace;

/// Result type alias for CM11A operations.
pub type Result<T> = core::result::Result<T, X10Error>;

// =============================================================================
// Error Kind Enums (Internal)
// =============================================================================

/// Protocol error variants (internal)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum ProtocolErrorKind {
    InvalidStatusLength,
    InvalidUploadLength,
    TruncatedUpload,
    ChecksumMismatch,
    NotReady,
    Desynchronized,
    ShortRead,
}

/// Transport error variants (internal)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum TransportErrorKind {
    PortNotFound,
    PortInUse,
    OpenFailed,
    SendFailed,
    ReceiveFailed,
    NotOpen,
}

/// Gateway state error variants (internal)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum GatewayErrorKind {
    NotAllocated,
    Allocating,
    Deallocating,
    WorkerSpawnFailed,
}

/// Capacity error variants (internal)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum CapacityErrorKind {
    OutOfMacroMemory,
    TooManyElements,
    PacketTooLarge,
}

/// Codec error variants (internal)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum CodecErrorKind {
    InvalidHouseCode,
    InvalidDeviceCode,
    InvalidFunctionCode,
    ValueOutOfRange,
    UnknownMacro,
}

// =============================================================================
// Main Error Type
// =============================================================================

/// CM11A driver error types.
///
/// This is the main error type returned by all driver operations.
/// It contains a backtrace (when std feature is enabled) and detailed
/// error information through helper methods.
#[derive(Debug)]
pub enum X10Error {
    /// Protocol-related errors (bad replies, desynchronization, etc.)
    Protocol(ProtocolError),
    /// Transport-related errors (port, read, write, etc.)
    Transport(TransportError),
    /// Gateway lifecycle errors (wrong allocation state, etc.)
    Gateway(GatewayError),
    /// EEPROM and packet capacity errors
    Capacity(CapacityError),
    /// Value encoding/decoding errors
    Codec(CodecError),
    /// An unsolicited marker byte pre-empted the exchange in progress
    Interrupted(u8),
    /// The transmission unit exhausted its attempts
    TooManyAttempts,
    /// A bounded wait elapsed without the expected bytes
    Timeout,
}

// =============================================================================
// Structured Error Types
// =============================================================================

/// Protocol error with optional backtrace
#[derive(Debug)]
pub struct ProtocolError {
    kind: ProtocolErrorKind,
    #[cfg(feature = "std")]
    backtrace: Backtrace,
}

impl ProtocolError {
    pub(crate) fn new(kind: ProtocolErrorKind) -> Self {
        Self {
            kind,
            #[cfg(feature = "std")]
            backtrace: Backtrace::capture(),
        }
    }

    /// Check if the stream lost framing
    pub fn is_desynchronized(&self) -> bool {
        matches!(self.kind, ProtocolErrorKind::Desynchronized)
    }

    /// Check if the interface echoed a wrong checksum
    pub fn is_checksum_mismatch(&self) -> bool {
        matches!(self.kind, ProtocolErrorKind::ChecksumMismatch)
    }

    /// Check if a status payload had the wrong size
    pub fn is_invalid_status_length(&self) -> bool {
        matches!(self.kind, ProtocolErrorKind::InvalidStatusLength)
    }
}

/// Transport error with optional backtrace
#[derive(Debug)]
pub struct TransportError {
    kind: TransportErrorKind,
    #[cfg(feature = "std")]
    backtrace: Backtrace,
}

impl TransportError {
    pub(crate) fn new(kind: TransportErrorKind) -> Self {
        Self {
            kind,
            #[cfg(feature = "std")]
            backtrace: Backtrace::capture(),
        }
    }

    /// Check if the port could not be found
    pub fn is_port_not_found(&self) -> bool {
        matches!(self.kind, TransportErrorKind::PortNotFound)
    }

    /// Check if the port is held by someone else
    pub fn is_port_in_use(&self) -> bool {
        matches!(self.kind, TransportErrorKind::PortInUse)
    }

    /// Check if a write failed
    pub fn is_send_failed(&self) -> bool {
        matches!(self.kind, TransportErrorKind::SendFailed)
    }
}

/// Gateway lifecycle error with optional backtrace
#[derive(Debug)]
pub struct GatewayError {
    kind: GatewayErrorKind,
    #[cfg(feature = "std")]
    backtrace: Backtrace,
}

impl GatewayError {
    pub(crate) fn new(kind: GatewayErrorKind) -> Self {
        Self {
            kind,
            #[cfg(feature = "std")]
            backtrace: Backtrace::capture(),
        }
    }

    /// Check if the gateway is not allocated
    pub fn is_not_allocated(&self) -> bool {
        matches!(self.kind, GatewayErrorKind::NotAllocated)
    }

    /// Check if the gateway is tearing down
    pub fn is_deallocating(&self) -> bool {
        matches!(self.kind, GatewayErrorKind::Deallocating)
    }
}

/// Capacity error with optional backtrace
#[derive(Debug)]
pub struct CapacityError {
    kind: CapacityErrorKind,
    #[cfg(feature = "std")]
    backtrace: Backtrace,
}

impl CapacityError {
    pub(crate) fn new(kind: CapacityErrorKind) -> Self {
        Self {
            kind,
            #[cfg(feature = "std")]
            backtrace: Backtrace::capture(),
        }
    }

    /// Check if the EEPROM image would overflow
    pub fn is_out_of_macro_memory(&self) -> bool {
        matches!(self.kind, CapacityErrorKind::OutOfMacroMemory)
    }

    /// Check if a packet exceeds its buffer
    pub fn is_packet_too_large(&self) -> bool {
        matches!(self.kind, CapacityErrorKind::PacketTooLarge)
    }
}

/// Codec error with optional backtrace
#[derive(Debug)]
pub struct CodecError {
    kind: CodecErrorKind,
    #[cfg(feature = "std")]
    backtrace: Backtrace,
}

impl CodecError {
    pub(crate) fn new(kind: CodecErrorKind) -> Self {
        Self {
            kind,
            #[cfg(feature = "std")]
            backtrace: Backtrace::capture(),
        }
    }

    /// Check if a value is out of range
    pub fn is_out_of_range(&self) -> bool {
        matches!(self.kind, CodecErrorKind::ValueOutOfRange)
    }

    /// Check if a macro reference does not resolve
    pub fn is_unknown_macro(&self) -> bool {
        matches!(self.kind, CodecErrorKind::UnknownMacro)
    }
}

// =============================================================================
// Convenience Constructors for X10Error
// =============================================================================

impl X10Error {
    // Protocol errors
    pub(crate) fn invalid_status_length() -> Self {
        Self::Protocol(ProtocolError::new(ProtocolErrorKind::InvalidStatusLength))
    }

    pub(crate) fn invalid_upload_length() -> Self {
        Self::Protocol(ProtocolError::new(ProtocolErrorKind::InvalidUploadLength))
    }

    pub(crate) fn truncated_upload() -> Self {
        Self::Protocol(ProtocolError::new(ProtocolErrorKind::TruncatedUpload))
    }

    pub(crate) fn checksum_mismatch() -> Self {
        Self::Protocol(ProtocolError::new(ProtocolErrorKind::ChecksumMismatch))
    }

    pub(crate) fn not_ready() -> Self {
        Self::Protocol(ProtocolError::new(ProtocolErrorKind::NotReady))
    }

    pub(crate) fn desynchronized() -> Self {
        Self::Protocol(ProtocolError::new(ProtocolErrorKind::Desynchronized))
    }

    pub(crate) fn short_read() -> Self {
        Self::Protocol(ProtocolError::new(ProtocolErrorKind::ShortRead))
    }

    // Transport errors
    pub(crate) fn port_not_found() -> Self {
        Self::Transport(TransportError::new(TransportErrorKind::PortNotFound))
    }

    pub(crate) fn port_in_use() -> Self {
        Self::Transport(TransportError::new(TransportErrorKind::PortInUse))
    }

    pub(crate) fn open_failed() -> Self {
        Self::Transport(TransportError::new(TransportErrorKind::OpenFailed))
    }

    pub(crate) fn send_failed() -> Self {
        Self::Transport(TransportError::new(TransportErrorKind::SendFailed))
    }

    pub(crate) fn receive_failed() -> Self {
        Self::Transport(TransportError::new(TransportErrorKind::ReceiveFailed))
    }

    pub(crate) fn not_open() -> Self {
        Self::Transport(TransportError::new(TransportErrorKind::NotOpen))
    }

    // Gateway errors
    pub(crate) fn not_allocated() -> Self {
        Self::Gateway(GatewayError::new(GatewayErrorKind::NotAllocated))
    }

    pub(crate) fn allocating() -> Self {
        Self::Gateway(GatewayError::new(GatewayErrorKind::Allocating))
    }

    pub(crate) fn deallocating() -> Self {
        Self::Gateway(GatewayError::new(GatewayErrorKind::Deallocating))
    }

    pub(crate) fn worker_spawn_failed() -> Self {
        Self::Gateway(GatewayError::new(GatewayErrorKind::WorkerSpawnFailed))
    }

    // Capacity errors
    pub(crate) fn out_of_macro_memory() -> Self {
        Self::Capacity(CapacityError::new(CapacityErrorKind::OutOfMacroMemory))
    }

    pub(crate) fn too_many_elements() -> Self {
        Self::Capacity(CapacityError::new(CapacityErrorKind::TooManyElements))
    }

    pub(crate) fn packet_too_large() -> Self {
        Self::Capacity(CapacityError::new(CapacityErrorKind::PacketTooLarge))
    }

    // Codec errors
    pub(crate) fn invalid_house_code() -> Self {
        Self::Codec(CodecError::new(CodecErrorKind::InvalidHouseCode))
    }

    pub(crate) fn invalid_device_code() -> Self {
        Self::Codec(CodecError::new(CodecErrorKind::InvalidDeviceCode))
    }

    pub(crate) fn invalid_function_code() -> Self {
        Self::Codec(CodecError::new(CodecErrorKind::InvalidFunctionCode))
    }

    pub(crate) fn value_out_of_range() -> Self {
        Self::Codec(CodecError::new(CodecErrorKind::ValueOutOfRange))
    }

    pub(crate) fn unknown_macro() -> Self {
        Self::Codec(CodecError::new(CodecErrorKind::UnknownMacro))
    }

    /// Marker byte that interrupted an exchange, if this is an interruption.
    pub const fn interrupted_by(&self) -> Option<u8> {
        match self {
            Self::Interrupted(marker) => Some(*marker),
            _ => None,
        }
    }

    /// True for errors that should not be retried by a transmission unit.
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Gateway(_) | Self::Capacity(_) | Self::TooManyAttempts)
    }
}

// =============================================================================
// Display Implementation
// =============================================================================

impl fmt::Display for X10Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            X10Error::Protocol(e) => write!(f, "Protocol error: {:?}", e.kind),
            X10Error::Transport(e) => write!(f, "Transport error: {:?}", e.kind),
            X10Error::Gateway(e) => write!(f, "Gateway error: {:?}", e.kind),
            X10Error::Capacity(e) => write!(f, "Capacity error: {:?}", e.kind),
            X10Error::Codec(e) => write!(f, "Codec error: {:?}", e.kind),
            X10Error::Interrupted(marker) => {
                write!(f, "Transmission interrupted by 0x{marker:02X}")
            }
            X10Error::TooManyAttempts => write!(f, "Too many attempts"),
            X10Error::Timeout => write!(f, "Operation timeout"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for X10Error {
    fn format(&self, f: defmt::Formatter<'_>) {
        match self {
            X10Error::Protocol(e) => defmt::write!(f, "Protocol error: {}", e.kind),
            X10Error::Transport(e) => defmt::write!(f, "Transport error: {}", e.kind),
            X10Error::Gateway(e) => defmt::write!(f, "Gateway error: {}", e.kind),
            X10Error::Capacity(e) => defmt::write!(f, "Capacity error: {}", e.kind),
            X10Error::Codec(e) => defmt::write!(f, "Codec error: {}", e.kind),
            X10Error::Interrupted(marker) => {
                defmt::write!(f, "Transmission interrupted by {=u8:#x}", marker)
            }
            X10Error::TooManyAttempts => defmt::write!(f, "Too many attempts"),
            X10Error::Timeout => defmt::write!(f, "Operation timeout"),
        }
    }
}

// Implement std::error::Error for std-based applications
#[cfg(feature = "std")]
impl std::error::Error for X10Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interrupted_marker() {
        let err = X10Error::Interrupted(0xA5);
        assert_eq!(err.interrupted_by(), Some(0xA5));
        assert_eq!(X10Error::Timeout.interrupted_by(), None);
    }

    #[test]
    fn test_fatal_classification() {
        assert!(X10Error::out_of_macro_memory().is_fatal());
        assert!(X10Error::not_allocated().is_fatal());
        assert!(!X10Error::desynchronized().is_fatal());
        assert!(!X10Error::Interrupted(0x5A).is_fatal());
    }

    #[test]
    fn test_kind_predicates() {
        match X10Error::checksum_mismatch() {
            X10Error::Protocol(e) => {
                assert!(e.is_checksum_mismatch());
                assert!(!e.is_desynchronized());
            }
            other => panic!("unexpected error {other:?}"),
        }
        match X10Error::out_of_macro_memory() {
            X10Error::Capacity(e) => assert!(e.is_out_of_macro_memory()),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_display() {
        assert_eq!(
            X10Error::Interrupted(0x5B).to_string(),
            "Transmission interrupted by 0x5B"
        );
        assert_eq!(
            X10Error::invalid_status_length().to_string(),
            "Protocol error: InvalidStatusLength"
        );
    }
}
