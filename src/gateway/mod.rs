//! Gateway driver.
//!
//! [`Cm11a`] queues requests for the interface and runs them on a worker
//! thread, interleaving them with the events the interface sends on its
//! own: power-line uploads, power failures and macro starts.

pub mod driver;
pub mod listener;
pub mod state;
mod unit;
mod worker;

pub use driver::Cm11a;
pub use listener::{
    AddressListener, FunctionListener, GatewayEvent, GatewayListener, StatusListener,
};
pub use state::{Allocation, GatewayState, QueueState};
