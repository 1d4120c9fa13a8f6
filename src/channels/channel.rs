//! Transport seams: where updates come from and where replies go.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::channels::types::{RawMessage, Update};
use crate::error::ChannelError;

/// Stream of inbound messages. Errors are recoverable fetch faults; the
/// stream keeps going after yielding one.
pub type MessageStream = Pin<Box<dyn Stream<Item = Result<RawMessage, ChannelError>> + Send>>;

/// A long-poll endpoint for updates.
#[async_trait]
pub trait UpdateSource: Send + Sync {
    /// Channel name used in errors and logs.
    fn name(&self) -> &str;

    /// Block up to `timeout_secs` for updates at or after `offset`.
    ///
    /// `None` asks for everything the endpoint still buffers.
    async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, ChannelError>;
}

/// Outbound send primitives.
#[async_trait]
pub trait Outbox: Send + Sync {
    /// Send a text message to a chat.
    async fn send_text(&self, chat_id: &str, text: &str) -> Result<(), ChannelError>;

    /// Send an in-memory file to a chat.
    async fn send_file(
        &self,
        chat_id: &str,
        bytes: Vec<u8>,
        file_name: &str,
        caption: Option<&str>,
    ) -> Result<(), ChannelError>;
}
