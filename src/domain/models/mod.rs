pub mod broadcast;
pub mod contact;

pub use broadcast::{Broadcast, BroadcastStatus, MediaFile, MessageKind, MessagePayload};
pub use contact::{BroadcastContact, ContactStatus};
