//! Event plumbing between the transports and the sync engines
//!
//! - `SyncMessage`: a classified user or department change event
//! - `EventQueues`: two bounded queues with backpressure
//! - `EventDispatcher`: single consumer applying events in order

mod bus;
mod dispatcher;
mod types;

pub use bus::{EventQueues, EventReceivers, EVENT_QUEUE_CAPACITY};
pub use dispatcher::EventDispatcher;
pub use types::{DepartmentEvent, SyncMessage, UserEvent};
