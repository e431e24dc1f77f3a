//! Gateway state.
//!
//! The state has two independent axes, allocation and queue. Exactly one
//! value of each axis is set at any time.

use core::fmt;

/// Allocation axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Allocation {
    Allocating,
    Allocated,
    Deallocating,
    Deallocated,
}

/// Queue axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum QueueState {
    Empty,
    NotEmpty,
}

/// Combined gateway state.
///
/// # Examples
///
/// ```
/// use x10_cm11a::gateway::GatewayState;
///
/// let state = GatewayState::INITIAL;
/// assert_eq!(state.bits(), GatewayState::DEALLOCATED | GatewayState::QUEUE_EMPTY);
/// assert!(!state.is_allocated());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GatewayState {
    pub allocation: Allocation,
    pub queue: QueueState,
}

impl GatewayState {
    pub const ALLOCATING: u32 = 0x01;
    pub const ALLOCATED: u32 = 0x02;
    pub const DEALLOCATING: u32 = 0x04;
    pub const DEALLOCATED: u32 = 0x08;
    pub const QUEUE_EMPTY: u32 = 0x10;
    pub const QUEUE_NOT_EMPTY: u32 = 0x20;

    /// State of a freshly created driver.
    pub const INITIAL: Self = Self {
        allocation: Allocation::Deallocated,
        queue: QueueState::Empty,
    };

    /// Bitmask view with one bit from each axis.
    pub const fn bits(self) -> u32 {
        let allocation = match self.allocation {
            Allocation::Allocating => Self::ALLOCATING,
            Allocation::Allocated => Self::ALLOCATED,
            Allocation::Deallocating => Self::DEALLOCATING,
            Allocation::Deallocated => Self::DEALLOCATED,
        };
        let queue = match self.queue {
            QueueState::Empty => Self::QUEUE_EMPTY,
            QueueState::NotEmpty => Self::QUEUE_NOT_EMPTY,
        };
        allocation | queue
    }

    /// True if every bit of `mask` is set.
    pub const fn test(self, mask: u32) -> bool {
        self.bits() & mask == mask
    }

    pub const fn is_allocated(self) -> bool {
        matches!(self.allocation, Allocation::Allocated)
    }

    #[must_use]
    pub const fn with_allocation(self, allocation: Allocation) -> Self {
        Self {
            allocation,
            queue: self.queue,
        }
    }

    #[must_use]
    pub const fn with_queue(self, queue: QueueState) -> Self {
        Self {
            allocation: self.allocation,
            queue,
        }
    }
}

impl Default for GatewayState {
    fn default() -> Self {
        Self::INITIAL
    }
}

impl fmt::Display for GatewayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}|{:?}", self.allocation, self.queue)
    }
}
