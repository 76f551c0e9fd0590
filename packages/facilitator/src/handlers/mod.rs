pub mod anchor_handler;
pub mod event;
pub mod gateway_proven_handler;
pub mod handler;
pub mod message_status_handler;
pub mod registry;
pub mod request_handler;
