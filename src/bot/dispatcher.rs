//! Dispatcher: answers each inbound chat message.
//!
//! Flow:
//! 1. Allowlist check (unlisted chats are dropped)
//! 2. Profile upsert for the sender's display name
//! 3. Command routing → store query or classify-and-record
//! 4. One reply per message; failures become an "Error" card

use std::future::Future;
use std::sync::Arc;

use chrono::{Months, NaiveDate, Utc};
use futures::StreamExt;
use tracing::{debug, error, info, warn};

use crate::bot::command::Command;
use crate::bot::export::entries_to_csv;
use crate::bot::reply::{self, Reply};
use crate::channels::{MessageStream, Outbox, RawMessage};
use crate::error::Error;
use crate::ledger::TextClassifier;
use crate::store::Store;

pub struct Dispatcher {
    store: Arc<dyn Store>,
    outbox: Arc<dyn Outbox>,
    classifier: TextClassifier,
    allowed_chats: Vec<String>,
}

impl Dispatcher {
    /// `allowed_chats` holds chat ids; `"*"` admits every chat.
    pub fn new(store: Arc<dyn Store>, outbox: Arc<dyn Outbox>, allowed_chats: Vec<String>) -> Self {
        Self {
            store,
            outbox,
            classifier: TextClassifier::new(),
            allowed_chats,
        }
    }

    pub fn is_chat_allowed(&self, chat_id: &str) -> bool {
        check_chat_allowed(&self.allowed_chats, chat_id)
    }

    /// Consume `messages` until it ends or `shutdown` resolves.
    ///
    /// Fetch faults are logged and skipped; the stream keeps polling.
    pub async fn run<F>(&self, mut messages: MessageStream, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!("Listening for messages...");

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested; stopping dispatcher");
                    break;
                }
                next = messages.next() => match next {
                    Some(Ok(message)) => {
                        if let Err(e) = self.handle(&message).await {
                            error!(chat_id = %message.chat_id, error = %e, "Failed to answer message");
                        }
                    }
                    Some(Err(e)) => debug!(error = %e, "Skipping failed fetch"),
                    None => {
                        info!("Message stream ended");
                        break;
                    }
                },
            }
        }
    }

    /// Answer one message, dating undated entries with today's UTC date.
    pub async fn handle(&self, message: &RawMessage) -> Result<(), Error> {
        self.handle_on(message, Utc::now().date_naive()).await
    }

    /// Answer one message relative to `today`.
    ///
    /// Only a failed send is returned as an error; everything else is
    /// reported to the chat.
    pub async fn handle_on(&self, message: &RawMessage, today: NaiveDate) -> Result<(), Error> {
        let chat_id = message.chat_id.as_str();
        if !self.is_chat_allowed(chat_id) {
            warn!(chat_id, "Ignoring message from unlisted chat");
            return Ok(());
        }

        let text = message.text.trim();
        if text.is_empty() {
            return Ok(());
        }

        if let Some(name) = message.sender_display_name.as_deref() {
            if let Err(e) = self.store.upsert_user_profile(chat_id, name).await {
                warn!(chat_id, error = %e, "Failed to update user profile");
            }
        }

        let reply = match self.respond(chat_id, text, today).await {
            Ok(reply) => reply,
            Err(e) => {
                match &e {
                    Error::Classify(_) => debug!(chat_id, error = %e, "Unclassifiable text"),
                    _ => error!(chat_id, error = %e, "Failed to process message"),
                }
                Reply::Text(reply::error_card(&user_message(&e)))
            }
        };

        match reply {
            Reply::Text(text) => self.outbox.send_text(chat_id, &text).await?,
            Reply::Document {
                bytes,
                file_name,
                caption,
            } => {
                self.outbox
                    .send_file(chat_id, bytes, &file_name, Some(&caption))
                    .await?
            }
        }
        Ok(())
    }

    async fn respond(&self, chat_id: &str, text: &str, today: NaiveDate) -> Result<Reply, Error> {
        match Command::parse(text) {
            Command::Help => Ok(Reply::Text(reply::help_text())),

            Command::Balance => {
                let balance = self.store.balance(chat_id).await?;
                Ok(Reply::Text(reply::balance_card(&balance)))
            }

            Command::Summary {
                months,
                family_only,
            } => {
                let since = months_before(today, months);
                let totals = self
                    .store
                    .category_summary(chat_id, since, family_only)
                    .await?;
                Ok(Reply::Text(reply::summary_card(months, &totals)))
            }

            Command::Export { months } => {
                let since = months.map(|m| months_before(today, m));
                let entries = self.store.entries_since(chat_id, since).await?;
                if entries.is_empty() {
                    return Ok(Reply::Text("No entries to export".to_string()));
                }
                let bytes = entries_to_csv(&entries)?;
                info!(chat_id, rows = entries.len(), "Exporting entries");
                Ok(Reply::Document {
                    bytes,
                    file_name: format!("ledger-{today}.csv"),
                    caption: format!("{} entries", entries.len()),
                })
            }

            Command::Record(text) => {
                let entry = self.classifier.classify_on(&text, today)?;
                let id = self.store.record_entry(chat_id, &entry).await?;
                info!(
                    chat_id,
                    id,
                    kind = %entry.kind,
                    amount = entry.amount,
                    category = %entry.category,
                    "Entry saved"
                );
                Ok(Reply::Text(reply::saved_card(&entry)))
            }
        }
    }
}

/// Classification errors are written for the user; the rest keep their
/// top-level prefix.
fn user_message(e: &Error) -> String {
    match e {
        Error::Classify(inner) => inner.to_string(),
        other => other.to_string(),
    }
}

fn months_before(today: NaiveDate, months: u32) -> NaiveDate {
    today
        .checked_sub_months(Months::new(months))
        .unwrap_or(NaiveDate::MIN)
}

fn check_chat_allowed(allowed: &[String], chat_id: &str) -> bool {
    allowed.iter().any(|c| c == "*" || c == chat_id)
}
