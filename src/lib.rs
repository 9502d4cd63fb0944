//! Webhook bridge between the Zalo Bot platform and the CashyBear chat
//! backend: inbound webhook -> backend chat API -> Zalo sendMessage, with a
//! capped in-memory conversation log for inspection and manual recovery.

pub mod backend;
pub mod config;
pub mod event;
pub mod mapping;
pub mod relay;
pub mod server;
pub mod store;
pub mod trigger;
pub mod zalo;
