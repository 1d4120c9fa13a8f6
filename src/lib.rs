//! Nami Ledger: chat-driven expense tracker.

pub mod bot;
pub mod channels;
pub mod config;
pub mod error;
pub mod ledger;
pub mod lock;
pub mod store;
