// Connection layer: reactor, outgoing queue, transaction matching

mod counters;
mod queue;
mod reactor;
mod transaction;

pub use counters::*;
pub use queue::*;
pub use reactor::*;
pub use transaction::*;
