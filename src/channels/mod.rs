//! Channel layer: inbound update stream and outbound transport.

pub mod channel;
pub mod stream;
pub mod telegram;
pub mod types;

pub use channel::{MessageStream, Outbox, UpdateSource};
pub use stream::{StreamConfig, UpdateCursor, UpdateStream};
pub use telegram::TelegramClient;
pub use types::{RawMessage, Update};
