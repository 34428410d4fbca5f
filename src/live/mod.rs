//! Live state: the current snapshot and its subscribers.

mod broadcast;
mod store;

pub use broadcast::{Broadcaster, Delivery, Message, SubscriberId, Subscription};
pub use store::SnapshotStore;
