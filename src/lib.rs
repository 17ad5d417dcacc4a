//! Broadcast dispatch engine: takes a broadcast (one message definition, many
//! recipients) and sends it one contact at a time with throttling, scheduling
//! windows, pause/resume/cancel, and crash recovery backed by an embedded
//! database. Delivery itself goes through the [`DeliveryAdapter`] boundary;
//! this crate never talks to a messaging platform directly.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use application::handlers::dispatcher::BroadcastDispatcher;
pub use application::services::delivery::DeliveryAdapter;
pub use application::usecases::create_broadcast::{
    CreateBroadcastRequest, CreateBroadcastResponse, CreateBroadcastUseCase, Recipient,
};
pub use application::usecases::retry_failed::{
    RetryFailedRequest, RetryFailedResponse, RetryFailedUseCase,
};
pub use config::DispatcherConfig;
pub use domain::models::{
    Broadcast, BroadcastContact, BroadcastStatus, ContactStatus, MediaFile, MessageKind,
    MessagePayload,
};
pub use domain::value_objects::SmartPauseWindow;
