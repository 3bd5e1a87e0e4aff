// SPDX-FileCopyrightText: 2026 Sendry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-channel delivery queues with human pacing.
//!
//! Each channel drains through a single worker task, so at most one message
//! per channel is in flight at any moment. The worker sleeps a randomized
//! pacing delay before each send, adds a congestion delay proportional to the
//! backlog, simulates typing for text payloads, and bounds the transport call
//! with a timeout. A channel that loses connectivity stops draining and keeps
//! its backlog until [`DeliveryQueue::resume`] is called.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, warn};

use sendry_config::QueueConfig;
use sendry_core::{
    ChannelId, DestinationId, MessagePayload, PresenceState, Priority, SendReceipt, SendryError,
    Transport,
};

/// Options for a single enqueue call.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnqueueOptions {
    pub priority: Priority,
    /// Suppress typing simulation even for text payloads.
    pub skip_typing: bool,
}

/// Snapshot of one channel queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Items waiting behind the one currently in flight.
    pub pending: usize,
    /// Whether a worker task is currently draining the channel.
    pub draining: bool,
}

/// Resolves once the queued message has been handed to the transport.
///
/// The handle stays pending while the item waits in a paused queue; it fails
/// with [`SendryError::Internal`] if the channel is torn down first.
pub struct SendHandle {
    rx: oneshot::Receiver<Result<SendReceipt, SendryError>>,
}

impl SendHandle {
    /// Wait for the dispatch outcome of the enqueued message.
    pub async fn wait(self) -> Result<SendReceipt, SendryError> {
        self.rx
            .await
            .map_err(|_| SendryError::Internal("delivery queue torn down before dispatch".into()))?
    }
}

struct QueueItem {
    destination: DestinationId,
    payload: MessagePayload,
    skip_typing: bool,
    done: oneshot::Sender<Result<SendReceipt, SendryError>>,
}

#[derive(Default)]
struct ChannelState {
    items: VecDeque<QueueItem>,
    draining: bool,
    closed: bool,
}

#[derive(Default)]
struct ChannelQueue {
    state: Mutex<ChannelState>,
}

struct Inner {
    transport: Arc<dyn Transport>,
    config: QueueConfig,
    channels: Mutex<HashMap<ChannelId, Arc<ChannelQueue>>>,
}

/// Registry of per-channel delivery queues. Cheap to clone.
#[derive(Clone)]
pub struct DeliveryQueue {
    inner: Arc<Inner>,
}

impl DeliveryQueue {
    pub fn new(transport: Arc<dyn Transport>, config: QueueConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                config,
                channels: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Queue a payload for delivery on `channel` and start a drain worker if
    /// none is running.
    ///
    /// High-priority items are placed at the head of the backlog; they never
    /// preempt the item already handed to the transport.
    pub async fn enqueue(
        &self,
        channel: &ChannelId,
        destination: DestinationId,
        payload: MessagePayload,
        options: EnqueueOptions,
    ) -> SendHandle {
        let q = {
            let mut channels = self.inner.channels.lock().await;
            channels
                .entry(channel.clone())
                .or_insert_with(|| Arc::new(ChannelQueue::default()))
                .clone()
        };

        let (tx, rx) = oneshot::channel();
        let item = QueueItem {
            destination,
            payload,
            skip_typing: options.skip_typing,
            done: tx,
        };

        let start_worker = {
            let mut state = q.state.lock().await;
            match options.priority {
                Priority::High => state.items.push_front(item),
                Priority::Normal => state.items.push_back(item),
            }
            if state.draining {
                false
            } else {
                state.draining = true;
                true
            }
        };

        if start_worker {
            tokio::spawn(Inner::drain(self.inner.clone(), channel.clone(), q));
        }

        SendHandle { rx }
    }

    /// Restart the drain worker of a paused channel, typically after the
    /// transport reconnects. No-op if the channel is empty or already
    /// draining.
    pub async fn resume(&self, channel: &ChannelId) {
        let Some(q) = self.inner.channels.lock().await.get(channel).cloned() else {
            return;
        };
        let start_worker = {
            let mut state = q.state.lock().await;
            if state.draining || state.items.is_empty() {
                false
            } else {
                state.draining = true;
                true
            }
        };
        if start_worker {
            debug!(channel = %channel, "resuming delivery");
            tokio::spawn(Inner::drain(self.inner.clone(), channel.clone(), q));
        }
    }

    /// Current backlog of a channel.
    pub async fn stats(&self, channel: &ChannelId) -> QueueStats {
        let Some(q) = self.inner.channels.lock().await.get(channel).cloned() else {
            return QueueStats::default();
        };
        let state = q.state.lock().await;
        QueueStats {
            pending: state.items.len(),
            draining: state.draining,
        }
    }

    /// Tear down a channel queue, dropping its backlog. Pending send handles
    /// resolve with an error.
    pub async fn remove_channel(&self, channel: &ChannelId) {
        let removed = self.inner.channels.lock().await.remove(channel);
        if let Some(q) = removed {
            let mut state = q.state.lock().await;
            state.closed = true;
            let dropped = state.items.len();
            state.items.clear();
            if dropped > 0 {
                warn!(channel = %channel, dropped, "channel queue torn down with pending items");
            }
        }
    }
}

impl Inner {
    /// Drain worker: runs until the backlog is empty, the channel goes
    /// offline, or the queue is torn down. All exit decisions happen under
    /// the state lock, so a concurrent enqueue either sees the worker still
    /// draining or observes its exit and starts a fresh one.
    async fn drain(inner: Arc<Inner>, channel: ChannelId, q: Arc<ChannelQueue>) {
        loop {
            let (item, depth) = {
                let mut state = q.state.lock().await;
                if state.closed {
                    state.draining = false;
                    return;
                }
                if !inner.transport.is_connected(&channel) {
                    state.draining = false;
                    if !state.items.is_empty() {
                        warn!(
                            channel = %channel,
                            pending = state.items.len(),
                            "channel offline, delivery paused"
                        );
                    }
                    return;
                }
                match state.items.pop_front() {
                    Some(item) => {
                        let depth = state.items.len();
                        (item, depth)
                    }
                    None => {
                        state.draining = false;
                        return;
                    }
                }
            };
            inner.deliver(&channel, item, depth).await;
        }
    }

    async fn deliver(&self, channel: &ChannelId, item: QueueItem, depth: usize) {
        let cfg = &self.config;

        let pacing = {
            let mut rng = rand::thread_rng();
            rng.gen_range(cfg.min_delay_ms..=cfg.max_delay_ms)
        };
        let congestion = (depth as u64 * cfg.congestion_step_ms).min(cfg.congestion_cap_ms);
        tokio::time::sleep(Duration::from_millis(pacing + congestion)).await;

        if !item.skip_typing {
            if let Some(chars) = item.payload.typing_len() {
                self.simulate_typing(channel, &item.destination, chars).await;
            }
        }

        let budget = Duration::from_secs(cfg.send_timeout_secs);
        let attempt = async {
            match &item.payload {
                MessagePayload::Delete { target } => self
                    .transport
                    .delete_message(channel, target)
                    .await
                    .map(|()| SendReceipt {
                        message_id: target.message_id.clone(),
                    }),
                payload => self.transport.send(channel, &item.destination, payload).await,
            }
        };
        let outcome = match tokio::time::timeout(budget, attempt).await {
            Ok(Ok(receipt)) => {
                debug!(
                    channel = %channel,
                    destination = %item.destination,
                    message = %receipt.message_id,
                    "dispatched"
                );
                Ok(receipt)
            }
            Ok(Err(err)) => {
                warn!(
                    channel = %channel,
                    destination = %item.destination,
                    error = %err,
                    "dispatch failed"
                );
                Err(err)
            }
            Err(_) => {
                warn!(
                    channel = %channel,
                    destination = %item.destination,
                    timeout = ?budget,
                    "dispatch timed out"
                );
                Err(SendryError::SendTimeout { duration: budget })
            }
        };
        // The caller may have dropped its handle; dispatch already happened.
        let _ = item.done.send(outcome);
    }

    /// Typing simulation: composing, hold proportional to text length, then
    /// paused. Presence failures are not dispatch failures.
    async fn simulate_typing(&self, channel: &ChannelId, destination: &DestinationId, chars: usize) {
        let cfg = &self.config;
        if self
            .transport
            .set_presence(channel, destination, PresenceState::Composing)
            .await
            .is_err()
        {
            return;
        }
        let hold =
            (chars as u64 * cfg.typing_ms_per_char).clamp(cfg.typing_min_ms, cfg.typing_max_ms);
        tokio::time::sleep(Duration::from_millis(hold)).await;
        let _ = self
            .transport
            .set_presence(channel, destination, PresenceState::Paused)
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sendry_core::{MessageId, MessageRef};
    use sendry_test_utils::MockTransport;

    fn instant_config() -> QueueConfig {
        QueueConfig {
            min_delay_ms: 0,
            max_delay_ms: 0,
            congestion_step_ms: 0,
            congestion_cap_ms: 0,
            typing_ms_per_char: 0,
            typing_min_ms: 0,
            typing_max_ms: 0,
            send_timeout_secs: 5,
        }
    }

    fn paced_config() -> QueueConfig {
        QueueConfig {
            min_delay_ms: 1000,
            max_delay_ms: 1000,
            ..instant_config()
        }
    }

    fn channel() -> ChannelId {
        ChannelId::from("chan-1")
    }

    fn dest() -> DestinationId {
        DestinationId::from("dest-1")
    }

    fn body(payload: &MessagePayload) -> &str {
        match payload {
            MessagePayload::Text { body, .. } => body,
            other => panic!("expected text payload, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn drains_in_fifo_order() {
        let transport = Arc::new(MockTransport::new());
        let queue = DeliveryQueue::new(transport.clone(), instant_config());

        let mut handles = Vec::new();
        for text in ["first", "second", "third"] {
            handles.push(
                queue
                    .enqueue(
                        &channel(),
                        dest(),
                        MessagePayload::text(text),
                        EnqueueOptions::default(),
                    )
                    .await,
            );
        }
        for handle in handles {
            handle.wait().await.unwrap();
        }

        let sent = transport.sent();
        let bodies: Vec<&str> = sent.iter().map(|m| body(&m.payload)).collect();
        assert_eq!(bodies, ["first", "second", "third"]);
    }

    #[tokio::test(start_paused = true)]
    async fn high_priority_overtakes_backlog_but_not_in_flight() {
        let transport = Arc::new(MockTransport::new());
        let queue = DeliveryQueue::new(transport.clone(), paced_config());

        let first = queue
            .enqueue(
                &channel(),
                dest(),
                MessagePayload::text("first"),
                EnqueueOptions::default(),
            )
            .await;
        // Let the worker take "first" in flight before queuing the rest.
        tokio::task::yield_now().await;

        let normal = queue
            .enqueue(
                &channel(),
                dest(),
                MessagePayload::text("normal"),
                EnqueueOptions::default(),
            )
            .await;
        let urgent = queue
            .enqueue(
                &channel(),
                dest(),
                MessagePayload::text("urgent"),
                EnqueueOptions {
                    priority: Priority::High,
                    skip_typing: false,
                },
            )
            .await;

        first.wait().await.unwrap();
        urgent.wait().await.unwrap();
        normal.wait().await.unwrap();

        let bodies: Vec<String> = transport
            .sent()
            .iter()
            .map(|m| body(&m.payload).to_string())
            .collect();
        assert_eq!(bodies, ["first", "urgent", "normal"]);
    }

    #[tokio::test(start_paused = true)]
    async fn typing_simulation_brackets_text_sends() {
        let transport = Arc::new(MockTransport::new());
        let queue = DeliveryQueue::new(transport.clone(), instant_config());

        queue
            .enqueue(
                &channel(),
                dest(),
                MessagePayload::text("hello"),
                EnqueueOptions::default(),
            )
            .await
            .wait()
            .await
            .unwrap();

        let events: Vec<PresenceState> =
            transport.presence_events().iter().map(|(_, s)| *s).collect();
        assert_eq!(events, [PresenceState::Composing, PresenceState::Paused]);
    }

    #[tokio::test(start_paused = true)]
    async fn skip_typing_suppresses_presence() {
        let transport = Arc::new(MockTransport::new());
        let queue = DeliveryQueue::new(transport.clone(), instant_config());

        queue
            .enqueue(
                &channel(),
                dest(),
                MessagePayload::text("no typing"),
                EnqueueOptions {
                    priority: Priority::Normal,
                    skip_typing: true,
                },
            )
            .await
            .wait()
            .await
            .unwrap();

        assert!(transport.presence_events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn delete_payload_routes_to_delete_message() {
        let transport = Arc::new(MockTransport::new());
        let queue = DeliveryQueue::new(transport.clone(), instant_config());

        let target = MessageRef {
            destination: dest(),
            message_id: MessageId::from("msg-42"),
        };
        let receipt = queue
            .enqueue(
                &channel(),
                dest(),
                MessagePayload::Delete {
                    target: target.clone(),
                },
                EnqueueOptions {
                    priority: Priority::High,
                    skip_typing: true,
                },
            )
            .await
            .wait()
            .await
            .unwrap();

        assert_eq!(receipt.message_id, MessageId::from("msg-42"));
        assert_eq!(transport.deleted(), vec![target]);
        assert!(transport.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_send_fails_with_timeout() {
        let transport = Arc::new(MockTransport::new());
        transport.set_send_delay(Duration::from_secs(30));
        let config = QueueConfig {
            send_timeout_secs: 1,
            ..instant_config()
        };
        let queue = DeliveryQueue::new(transport.clone(), config);

        let err = queue
            .enqueue(
                &channel(),
                dest(),
                MessagePayload::text("slow"),
                EnqueueOptions::default(),
            )
            .await
            .wait()
            .await
            .unwrap_err();

        assert!(matches!(err, SendryError::SendTimeout { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn one_failure_does_not_halt_the_drain() {
        let transport = Arc::new(MockTransport::new());
        transport.push_send_error(SendryError::SendFailed {
            message: "rejected".into(),
        });
        let queue = DeliveryQueue::new(transport.clone(), instant_config());

        let failing = queue
            .enqueue(
                &channel(),
                dest(),
                MessagePayload::text("doomed"),
                EnqueueOptions::default(),
            )
            .await;
        let following = queue
            .enqueue(
                &channel(),
                dest(),
                MessagePayload::text("survivor"),
                EnqueueOptions::default(),
            )
            .await;

        assert!(matches!(
            failing.wait().await,
            Err(SendryError::SendFailed { .. })
        ));
        following.wait().await.unwrap();

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(body(&sent[0].payload), "survivor");
    }

    #[tokio::test(start_paused = true)]
    async fn offline_channel_pauses_and_resume_restarts() {
        let transport = Arc::new(MockTransport::new());
        transport.set_connected(&channel(), false);
        let queue = DeliveryQueue::new(transport.clone(), instant_config());

        let a = queue
            .enqueue(
                &channel(),
                dest(),
                MessagePayload::text("a"),
                EnqueueOptions::default(),
            )
            .await;
        let b = queue
            .enqueue(
                &channel(),
                dest(),
                MessagePayload::text("b"),
                EnqueueOptions::default(),
            )
            .await;

        // Let the worker observe the offline channel and exit.
        tokio::time::sleep(Duration::from_millis(1)).await;
        let stats = queue.stats(&channel()).await;
        assert_eq!(stats.pending, 2);
        assert!(!stats.draining);
        assert!(transport.sent().is_empty());

        transport.set_connected(&channel(), true);
        queue.resume(&channel()).await;

        a.wait().await.unwrap();
        b.wait().await.unwrap();
        assert_eq!(transport.sent().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn resume_without_backlog_is_a_noop() {
        let transport = Arc::new(MockTransport::new());
        let queue = DeliveryQueue::new(transport.clone(), instant_config());

        queue.resume(&channel()).await;
        assert_eq!(queue.stats(&channel()).await, QueueStats::default());
    }

    #[tokio::test(start_paused = true)]
    async fn remove_channel_fails_pending_handles() {
        let transport = Arc::new(MockTransport::new());
        transport.set_connected(&channel(), false);
        let queue = DeliveryQueue::new(transport.clone(), instant_config());

        let handle = queue
            .enqueue(
                &channel(),
                dest(),
                MessagePayload::text("stranded"),
                EnqueueOptions::default(),
            )
            .await;
        tokio::time::sleep(Duration::from_millis(1)).await;

        queue.remove_channel(&channel()).await;

        assert!(matches!(
            handle.wait().await,
            Err(SendryError::Internal(_))
        ));
        assert_eq!(queue.stats(&channel()).await, QueueStats::default());
    }

    #[tokio::test(start_paused = true)]
    async fn congestion_delay_grows_with_backlog() {
        let transport = Arc::new(MockTransport::new());
        let config = QueueConfig {
            congestion_step_ms: 500,
            congestion_cap_ms: 5000,
            ..instant_config()
        };
        let queue = DeliveryQueue::new(transport.clone(), config);

        let started = tokio::time::Instant::now();
        let mut handles = Vec::new();
        for i in 0..3 {
            handles.push(
                queue
                    .enqueue(
                        &channel(),
                        dest(),
                        MessagePayload::text(format!("m{i}")),
                        EnqueueOptions::default(),
                    )
                    .await,
            );
        }
        for handle in handles {
            handle.wait().await.unwrap();
        }

        // Depths seen by the worker are 2, 1, 0 behind each pop.
        assert_eq!(started.elapsed(), Duration::from_millis(1500));
        assert_eq!(transport.sent().len(), 3);
    }
}
