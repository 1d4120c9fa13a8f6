//! Telegram Bot API client: long-poll source and outbound sender.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};

use crate::channels::channel::{Outbox, UpdateSource};
use crate::channels::types::{Update, UpdatesResponse};
use crate::error::ChannelError;

/// Maximum message length for Telegram's sendMessage API.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Extra time on top of the long-poll wait before the HTTP request itself
/// is abandoned.
const POLL_GRACE: Duration = Duration::from_secs(10);

/// Upper bound for every request that does not set its own timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const CHANNEL_NAME: &str = "telegram";

/// Telegram Bot API client.
pub struct TelegramClient {
    bot_token: SecretString,
    api_base: String,
    client: reqwest::Client,
}

impl TelegramClient {
    pub fn new(bot_token: SecretString) -> Self {
        Self::with_api_base(bot_token, TELEGRAM_API_BASE)
    }

    /// Point the client at a different Bot API server.
    pub fn with_api_base(bot_token: SecretString, api_base: &str) -> Self {
        Self {
            bot_token,
            api_base: api_base.trim_end_matches('/').to_string(),
            client: http_client(REQUEST_TIMEOUT),
        }
    }

    /// Replace the default bound on sends and health checks.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.client = http_client(timeout);
        self
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{method}",
            self.api_base,
            self.bot_token.expose_secret()
        )
    }

    /// Check the token against `getMe`.
    pub async fn health_check(&self) -> Result<(), ChannelError> {
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(transport)?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ChannelError::Rejected {
                name: CHANNEL_NAME.into(),
                description: format!("getMe returned {}", resp.status()),
            })
        }
    }

    /// Send a single message chunk (≤4096 chars), Markdown-first with fallback.
    async fn send_message_chunk(&self, chat_id: &str, text: &str) -> Result<(), ChannelError> {
        let markdown_body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "Markdown"
        });

        let markdown_resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&markdown_body)
            .send()
            .await
            .map_err(send_failed)?;

        if markdown_resp.status().is_success() {
            return Ok(());
        }

        let markdown_status = markdown_resp.status();
        tracing::warn!(
            status = ?markdown_status,
            "Telegram sendMessage with Markdown failed; retrying without parse_mode"
        );

        let plain_body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });
        let plain_resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&plain_body)
            .send()
            .await
            .map_err(send_failed)?;

        if !plain_resp.status().is_success() {
            let plain_err = plain_resp.text().await.unwrap_or_default();
            return Err(ChannelError::SendFailed {
                name: CHANNEL_NAME.into(),
                reason: format!(
                    "sendMessage failed (markdown: {}, plain: {})",
                    markdown_status, plain_err
                ),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl UpdateSource for TelegramClient {
    fn name(&self) -> &str {
        CHANNEL_NAME
    }

    async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, ChannelError> {
        let mut body = serde_json::json!({
            "timeout": timeout_secs,
            "allowed_updates": ["message"]
        });
        if let Some(offset) = offset {
            body["offset"] = serde_json::Value::from(offset);
        }

        let resp = self
            .client
            .post(self.api_url("getUpdates"))
            .timeout(Duration::from_secs(timeout_secs) + POLL_GRACE)
            .json(&body)
            .send()
            .await
            .map_err(transport)?;

        // Error statuses still carry an `ok: false` JSON body with a description.
        let text = resp.text().await.map_err(transport)?;
        decode_updates(&text)
    }
}

#[async_trait]
impl Outbox for TelegramClient {
    /// Send a text message, splitting anything over Telegram's 4096 char limit.
    async fn send_text(&self, chat_id: &str, text: &str) -> Result<(), ChannelError> {
        for chunk in split_message(text, TELEGRAM_MAX_MESSAGE_LENGTH) {
            self.send_message_chunk(chat_id, &chunk).await?;
        }
        Ok(())
    }

    async fn send_file(
        &self,
        chat_id: &str,
        bytes: Vec<u8>,
        file_name: &str,
        caption: Option<&str>,
    ) -> Result<(), ChannelError> {
        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("text/csv")
            .map_err(send_failed)?;

        let mut form = Form::new()
            .text("chat_id", chat_id.to_string())
            .part("document", part);

        if let Some(cap) = caption {
            form = form.text("caption", cap.to_string());
        }

        let resp = self
            .client
            .post(self.api_url("sendDocument"))
            .multipart(form)
            .send()
            .await
            .map_err(send_failed)?;

        if !resp.status().is_success() {
            let err = resp.text().await.unwrap_or_default();
            return Err(ChannelError::SendFailed {
                name: CHANNEL_NAME.into(),
                reason: format!("sendDocument failed: {err}"),
            });
        }

        tracing::info!(chat_id, file_name, "Telegram document sent");
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Decode a `getUpdates` body. `ok: false` is a rejection, anything that is
/// not the expected JSON is malformed.
fn decode_updates(body: &str) -> Result<Vec<Update>, ChannelError> {
    let parsed: UpdatesResponse =
        serde_json::from_str(body).map_err(|e| ChannelError::MalformedResponse {
            name: CHANNEL_NAME.into(),
            reason: e.to_string(),
        })?;

    if !parsed.ok {
        return Err(ChannelError::Rejected {
            name: CHANNEL_NAME.into(),
            description: parsed
                .description
                .unwrap_or_else(|| "no description".to_string()),
        });
    }

    Ok(parsed.result)
}

fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "HTTP client setup failed; requests are unbounded");
            reqwest::Client::new()
        })
}

// reqwest errors carry the request URL, which embeds the bot token.
fn transport(e: reqwest::Error) -> ChannelError {
    ChannelError::Transport {
        name: CHANNEL_NAME.into(),
        reason: e.without_url().to_string(),
    }
}

fn send_failed(e: reqwest::Error) -> ChannelError {
    ChannelError::SendFailed {
        name: CHANNEL_NAME.into(),
        reason: e.without_url().to_string(),
    }
}

/// Split a message into chunks that fit Telegram's character limit.
/// Tries to split on newlines, then spaces, then hard-cuts on a char boundary.
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }

        let mut cut = max_len;
        while !remaining.is_char_boundary(cut) {
            cut -= 1;
        }

        let chunk = &remaining[..cut];
        let split_at = chunk
            .rfind('\n')
            .or_else(|| chunk.rfind(' '))
            .unwrap_or(cut);

        // Don't split at position 0 (infinite loop guard)
        let split_at = if split_at == 0 { cut } else { split_at };

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> TelegramClient {
        TelegramClient::with_api_base(SecretString::from("123:ABC".to_string()), base)
    }

    #[test]
    fn telegram_api_url() {
        let ch = TelegramClient::new(SecretString::from("123:ABC".to_string()));
        assert_eq!(
            ch.api_url("getUpdates"),
            "https://api.telegram.org/bot123:ABC/getUpdates"
        );
        assert_eq!(ch.name(), "telegram");
    }

    #[test]
    fn custom_api_base_drops_trailing_slash() {
        let ch = client("http://localhost:8081/");
        assert_eq!(ch.api_url("getMe"), "http://localhost:8081/bot123:ABC/getMe");
    }

    // ── Response decoding ───────────────────────────────────────────

    #[test]
    fn decode_ok_response() {
        let updates = decode_updates(
            r#"{"ok":true,"result":[{"update_id":3,"message":{"message_id":1,"chat":{"id":9},"text":"hi"}}]}"#,
        )
        .unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].update_id, 3);
    }

    #[test]
    fn decode_rejection() {
        let err = decode_updates(r#"{"ok":false,"error_code":409,"description":"Conflict"}"#)
            .unwrap_err();
        match err {
            ChannelError::Rejected { description, .. } => assert_eq!(description, "Conflict"),
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[test]
    fn decode_garbage_is_malformed() {
        assert!(matches!(
            decode_updates("<html>502 Bad Gateway</html>"),
            Err(ChannelError::MalformedResponse { .. })
        ));
        assert!(matches!(
            decode_updates(r#"{"ok":true,"result":[{"message":{}}]}"#),
            Err(ChannelError::MalformedResponse { .. })
        ));
    }

    // ── Network errors (nothing listens on the discard port) ────────

    #[tokio::test]
    async fn unreachable_endpoint_is_transport_fault() {
        let ch = client("http://127.0.0.1:9");
        let err = ch.get_updates(None, 0).await.unwrap_err();
        match err {
            ChannelError::Transport { reason, .. } => {
                assert!(!reason.contains("123:ABC"), "token leaked: {reason}");
            }
            other => panic!("expected Transport, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn send_to_unreachable_endpoint_fails() {
        let ch = client("http://127.0.0.1:9");
        assert!(matches!(
            ch.send_text("1", "hello").await,
            Err(ChannelError::SendFailed { .. })
        ));
        assert!(matches!(
            ch.send_file("1", b"a,b\n".to_vec(), "export.csv", None).await,
            Err(ChannelError::SendFailed { .. })
        ));
    }

    #[tokio::test]
    async fn send_to_silent_server_times_out() {
        // Accepts connections but never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let ch = client(&format!("http://{addr}"))
            .with_request_timeout(Duration::from_millis(200));
        let result = tokio::time::timeout(Duration::from_secs(5), ch.send_text("1", "hello"))
            .await
            .expect("send should give up on its own");
        assert!(matches!(result, Err(ChannelError::SendFailed { .. })));

        server.abort();
    }

    // ── Message splitting ───────────────────────────────────────────

    #[test]
    fn split_message_short() {
        assert_eq!(split_message("Hello", 4096), vec!["Hello"]);
    }

    #[test]
    fn split_message_over_limit_on_newline() {
        let msg = format!("{}\n{}", "a".repeat(2000), "b".repeat(3000));
        let chunks = split_message(&msg, 4096);
        assert_eq!(chunks, vec!["a".repeat(2000), "b".repeat(3000)]);
    }

    #[test]
    fn split_message_no_good_split_point() {
        let msg = "a".repeat(5000);
        let chunks = split_message(&msg, 4096);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 4096);
        assert_eq!(chunks[1].len(), 904);
    }

    #[test]
    fn split_message_respects_char_boundaries() {
        let msg = "₹".repeat(2000);
        let chunks = split_message(&msg, 4096);
        assert!(chunks.iter().all(|c| c.len() <= 4096));
        assert_eq!(chunks.concat(), msg);
    }
}
