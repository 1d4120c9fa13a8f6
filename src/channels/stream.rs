//! Update stream: pulls the long-poll endpoint and emits each inbound
//! message once per stream.
//!
//! The cursor and dedup set live in memory only. A fresh stream (or a
//! restarted process) starts from an empty cursor, so anything the endpoint
//! still buffers may be delivered again.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::channels::channel::{MessageStream, UpdateSource};
use crate::channels::types::{RawMessage, Update};

/// Tuning for the poll loop.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Long-poll wait passed to the endpoint.
    pub timeout_secs: u64,
    /// Delay before the first retry after a failed fetch.
    pub initial_backoff: Duration,
    /// Upper bound for the retry delay.
    pub max_backoff: Duration,
    /// Dedup keys whose update id is more than this far below the offset
    /// are evicted.
    pub dedup_horizon: i64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            dedup_horizon: 10_000,
        }
    }
}

/// Offset plus the set of already-emitted message keys.
#[derive(Debug)]
pub struct UpdateCursor {
    offset: Option<i64>,
    /// (chat_id, message_id) → highest update id that carried it.
    seen: HashMap<(String, i64), i64>,
    horizon: i64,
}

impl UpdateCursor {
    pub fn new(horizon: i64) -> Self {
        Self {
            offset: None,
            seen: HashMap::new(),
            horizon: horizon.max(1),
        }
    }

    /// Lowest update id not yet acknowledged; `None` before the first update.
    pub fn offset(&self) -> Option<i64> {
        self.offset
    }

    /// Number of keys currently retained for dedup.
    pub fn seen_len(&self) -> usize {
        self.seen.len()
    }

    /// Advance past `updates` and return the messages not seen before, in
    /// endpoint order.
    pub fn ingest(&mut self, updates: Vec<Update>) -> Vec<RawMessage> {
        let mut fresh = Vec::new();

        for update in updates {
            let update_id = update.update_id;
            // Advance before filtering so a duplicate never stalls the cursor.
            let next = update_id.saturating_add(1);
            self.offset = Some(self.offset.map_or(next, |o| o.max(next)));

            let Some(message) = RawMessage::from_update(update) else {
                continue;
            };

            match self.seen.get_mut(&message.key()) {
                Some(last) => {
                    *last = (*last).max(update_id);
                    debug!(
                        chat_id = %message.chat_id,
                        message_id = message.message_id,
                        update_id,
                        "Dropping redelivered message"
                    );
                }
                None => {
                    self.seen.insert(message.key(), update_id);
                    fresh.push(message);
                }
            }
        }

        self.evict();
        fresh
    }

    fn evict(&mut self) {
        let Some(offset) = self.offset else {
            return;
        };
        let floor = offset.saturating_sub(self.horizon);
        self.seen.retain(|_, update_id| *update_id >= floor);
    }
}

/// Exponential retry delay with a little jitter.
#[derive(Debug)]
struct Backoff {
    initial: Duration,
    max: Duration,
    current: Option<Duration>,
}

impl Backoff {
    fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max: max.max(initial),
            current: None,
        }
    }

    fn next_delay(&mut self) -> Duration {
        let next = match self.current {
            None => self.initial,
            Some(d) => d.saturating_mul(2).min(self.max),
        };
        self.current = Some(next);

        let jitter_ms = (next.as_millis() / 10) as u64;
        if jitter_ms == 0 {
            return next;
        }
        next + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
    }

    fn reset(&mut self) {
        self.current = None;
    }
}

/// Owns the poll loop state between pulls.
struct PollState {
    source: Arc<dyn UpdateSource>,
    timeout_secs: u64,
    cursor: UpdateCursor,
    pending: VecDeque<RawMessage>,
    backoff: Backoff,
    retry_after: Option<Duration>,
}

/// Lazy, deduplicated sequence of inbound messages.
pub struct UpdateStream {
    source: Arc<dyn UpdateSource>,
    config: StreamConfig,
}

impl UpdateStream {
    pub fn new(source: Arc<dyn UpdateSource>, config: StreamConfig) -> Self {
        Self { source, config }
    }

    /// Start polling. Nothing is fetched until the stream is first pulled,
    /// and each fetch happens only once the previous batch is drained.
    ///
    /// The stream never ends. A failed fetch is yielded as `Err`, and the
    /// next pull waits out the backoff before fetching again.
    pub fn into_stream(self) -> MessageStream {
        let state = PollState {
            source: self.source,
            timeout_secs: self.config.timeout_secs,
            cursor: UpdateCursor::new(self.config.dedup_horizon),
            pending: VecDeque::new(),
            backoff: Backoff::new(self.config.initial_backoff, self.config.max_backoff),
            retry_after: None,
        };

        let stream = futures::stream::unfold(state, |mut state| async move {
            loop {
                if let Some(message) = state.pending.pop_front() {
                    return Some((Ok(message), state));
                }

                if let Some(delay) = state.retry_after.take() {
                    tokio::time::sleep(delay).await;
                }

                let offset = state.cursor.offset();
                match state.source.get_updates(offset, state.timeout_secs).await {
                    Ok(updates) => {
                        state.backoff.reset();
                        let count = updates.len();
                        let fresh = state.cursor.ingest(updates);
                        if count > 0 {
                            debug!(
                                received = count,
                                emitted = fresh.len(),
                                offset = ?state.cursor.offset(),
                                "Fetched updates"
                            );
                        }
                        state.pending.extend(fresh);
                    }
                    Err(e) => {
                        let delay = state.backoff.next_delay();
                        warn!(
                            channel = state.source.name(),
                            retry_in_ms = delay.as_millis() as u64,
                            "Update fetch failed: {e}"
                        );
                        state.retry_after = Some(delay);
                        return Some((Err(e), state));
                    }
                }
            }
        });

        Box::pin(stream)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use futures::StreamExt;

    use super::*;
    use crate::channels::types::{WireChat, WireMessage, WireUser};
    use crate::error::ChannelError;

    fn text_update(update_id: i64, chat_id: i64, message_id: i64, text: &str) -> Update {
        Update {
            update_id,
            message: Some(WireMessage {
                message_id,
                chat: WireChat { id: chat_id },
                text: Some(text.to_string()),
                from: Some(WireUser {
                    first_name: Some("Nami".into()),
                }),
            }),
        }
    }

    fn bare_update(update_id: i64) -> Update {
        Update {
            update_id,
            message: None,
        }
    }

    /// Replays canned responses and records the offsets it was asked for.
    struct ScriptedSource {
        responses: Mutex<VecDeque<Result<Vec<Update>, ChannelError>>>,
        offsets: Mutex<Vec<Option<i64>>>,
    }

    impl ScriptedSource {
        fn new(responses: Vec<Result<Vec<Update>, ChannelError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                offsets: Mutex::new(Vec::new()),
            })
        }

        fn offsets(&self) -> Vec<Option<i64>> {
            self.offsets.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl UpdateSource for ScriptedSource {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn get_updates(
            &self,
            offset: Option<i64>,
            _timeout_secs: u64,
        ) -> Result<Vec<Update>, ChannelError> {
            self.offsets.lock().unwrap().push(offset);
            let next = self.responses.lock().unwrap().pop_front();
            match next {
                Some(response) => response,
                None => futures::future::pending().await,
            }
        }
    }

    fn fast_config() -> StreamConfig {
        StreamConfig {
            timeout_secs: 0,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
            dedup_horizon: 10_000,
        }
    }

    fn transport_fault() -> ChannelError {
        ChannelError::Transport {
            name: "scripted".into(),
            reason: "connection reset".into(),
        }
    }

    // ── Cursor ──────────────────────────────────────────────────────

    #[test]
    fn cursor_starts_without_offset() {
        let cursor = UpdateCursor::new(100);
        assert_eq!(cursor.offset(), None);
        assert_eq!(cursor.seen_len(), 0);
    }

    #[test]
    fn repeated_update_is_dropped_but_advances_offset() {
        let mut cursor = UpdateCursor::new(100);

        let first = cursor.ingest(vec![text_update(5, 1, 10, "500 groceries"), text_update(6, 1, 11, "balance")]);
        assert_eq!(first.len(), 2);
        assert_eq!(cursor.offset(), Some(7));

        let second = cursor.ingest(vec![text_update(6, 1, 11, "balance")]);
        assert!(second.is_empty());
        assert_eq!(cursor.offset(), Some(7));

        // Same message under a newer update id is still a duplicate.
        let third = cursor.ingest(vec![text_update(9, 1, 11, "balance")]);
        assert!(third.is_empty());
        assert_eq!(cursor.offset(), Some(10));
    }

    #[test]
    fn non_message_updates_advance_offset_only() {
        let mut cursor = UpdateCursor::new(100);
        let fresh = cursor.ingest(vec![bare_update(41), bare_update(42)]);
        assert!(fresh.is_empty());
        assert_eq!(cursor.offset(), Some(43));
        assert_eq!(cursor.seen_len(), 0);
    }

    #[test]
    fn offset_never_moves_backwards() {
        let mut cursor = UpdateCursor::new(100);
        cursor.ingest(vec![text_update(50, 1, 1, "a 1")]);
        cursor.ingest(vec![text_update(20, 1, 2, "b 2")]);
        assert_eq!(cursor.offset(), Some(51));
    }

    #[test]
    fn same_message_id_in_different_chats_is_distinct() {
        let mut cursor = UpdateCursor::new(100);
        let fresh = cursor.ingest(vec![text_update(1, 1, 7, "x 1"), text_update(2, 2, 7, "y 2")]);
        assert_eq!(fresh.len(), 2);
    }

    #[test]
    fn keys_far_below_offset_are_evicted() {
        let mut cursor = UpdateCursor::new(10);
        cursor.ingest(vec![text_update(1, 1, 1, "old 1")]);
        cursor.ingest(vec![text_update(5, 1, 5, "recent 5")]);
        assert_eq!(cursor.seen_len(), 2);

        cursor.ingest(vec![bare_update(20)]);
        // offset 21, floor 11: both keys are gone.
        assert_eq!(cursor.seen_len(), 0);

        cursor.ingest(vec![text_update(25, 1, 25, "new 25")]);
        cursor.ingest(vec![bare_update(30)]);
        // offset 31, floor 21: update 25 is retained.
        assert_eq!(cursor.seen_len(), 1);
    }

    // ── Backoff ─────────────────────────────────────────────────────

    #[test]
    fn backoff_doubles_up_to_cap_and_resets() {
        let mut b = Backoff::new(Duration::from_millis(100), Duration::from_millis(350));
        let within = |d: Duration, base: u64| {
            d >= Duration::from_millis(base) && d <= Duration::from_millis(base + base / 10)
        };
        assert!(within(b.next_delay(), 100));
        assert!(within(b.next_delay(), 200));
        assert!(within(b.next_delay(), 350));
        assert!(within(b.next_delay(), 350));
        b.reset();
        assert!(within(b.next_delay(), 100));
    }

    // ── Stream ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn stream_emits_each_message_once_across_fetches() {
        let source = ScriptedSource::new(vec![
            Ok(vec![text_update(1, 100, 1, "500 groceries"), text_update(2, 100, 2, "balance")]),
            Ok(vec![text_update(2, 100, 2, "balance"), text_update(3, 100, 3, "paid 200 medical")]),
        ]);
        let stream = UpdateStream::new(source.clone(), fast_config()).into_stream();

        let texts: Vec<String> = stream
            .take(3)
            .map(|item| item.unwrap().text)
            .collect()
            .await;

        assert_eq!(texts, vec!["500 groceries", "balance", "paid 200 medical"]);
        assert_eq!(source.offsets(), vec![None, Some(3)]);
    }

    #[tokio::test]
    async fn empty_batches_trigger_refetch() {
        let source = ScriptedSource::new(vec![
            Ok(vec![]),
            Ok(vec![bare_update(8)]),
            Ok(vec![text_update(9, 1, 1, "hi")]),
        ]);
        let mut stream = UpdateStream::new(source.clone(), fast_config()).into_stream();

        let msg = stream.next().await.unwrap().unwrap();
        assert_eq!(msg.text, "hi");
        assert_eq!(source.offsets(), vec![None, None, Some(9)]);
    }

    #[tokio::test]
    async fn transport_fault_is_yielded_and_stream_continues() {
        let source = ScriptedSource::new(vec![
            Ok(vec![text_update(1, 1, 1, "first 1")]),
            Err(transport_fault()),
            Err(transport_fault()),
            Ok(vec![text_update(2, 1, 2, "second 2")]),
        ]);
        let mut stream = UpdateStream::new(source.clone(), fast_config()).into_stream();

        assert_eq!(stream.next().await.unwrap().unwrap().text, "first 1");
        assert!(matches!(
            stream.next().await.unwrap(),
            Err(ChannelError::Transport { .. })
        ));
        assert!(stream.next().await.unwrap().is_err());
        assert_eq!(stream.next().await.unwrap().unwrap().text, "second 2");

        // The failed fetches retried from the same offset.
        assert_eq!(source.offsets(), vec![None, Some(2), Some(2), Some(2)]);
    }

    #[tokio::test]
    async fn fresh_stream_starts_from_empty_cursor() {
        let first = ScriptedSource::new(vec![Ok(vec![text_update(4, 1, 1, "x 1")])]);
        let mut stream = UpdateStream::new(first.clone(), fast_config()).into_stream();
        stream.next().await.unwrap().unwrap();

        let second = ScriptedSource::new(vec![Ok(vec![text_update(4, 1, 1, "x 1")])]);
        let mut restarted = UpdateStream::new(second.clone(), fast_config()).into_stream();
        // Redelivered after a restart: no cross-stream continuity.
        assert_eq!(restarted.next().await.unwrap().unwrap().text, "x 1");
        assert_eq!(second.offsets(), vec![None]);
    }

    #[tokio::test]
    async fn nothing_is_fetched_until_pulled() {
        let source = ScriptedSource::new(vec![Ok(vec![text_update(1, 1, 1, "x 1")])]);
        let _stream = UpdateStream::new(source.clone(), fast_config()).into_stream();
        tokio::task::yield_now().await;
        assert!(source.offsets().is_empty());
    }
}
