use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};

use dbops_restart_domain::{TaskEvent, TaskId};

use crate::error::FeedError;
use crate::store::{ChannelData, FeedStore, SharedStore};
use crate::subscription::TaskEventStream;

#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Live-channel capacity per subscriber. A subscriber that falls this
    /// far behind is dropped from fan-out rather than awaited.
    pub subscriber_buffer: usize,
    /// How long a finished task's buffer stays subscribable after the
    /// terminal event before the channel is removed.
    pub retention_grace: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            subscriber_buffer: 256,
            retention_grace: Duration::from_secs(60),
        }
    }
}

/// Per-task publish/subscribe fan-out with replay-from-start.
///
/// The coordinator is the only publisher per task. Subscribers attach at any
/// time and first receive every buffered event in order, then live events.
/// Publish never blocks on a slow subscriber.
pub struct OutputBroadcaster {
    store: SharedStore,
    config: FeedConfig,
}

impl OutputBroadcaster {
    #[must_use]
    pub fn new(config: FeedConfig) -> Self {
        Self {
            store: Arc::new(Mutex::new(FeedStore::new())),
            config,
        }
    }

    /// Create the channel for a task. Called once by the coordinator at
    /// task admission, before any event is published.
    pub async fn open(&self, task_id: &TaskId) -> Result<(), FeedError> {
        let mut store = self.store.lock().await;
        if store.channels.contains_key(task_id) {
            return Err(FeedError::AlreadyOpen(task_id.to_string()));
        }
        store.channels.insert(task_id.clone(), ChannelData::new());
        Ok(())
    }

    /// Append an event to the task's buffer and push it to every attached
    /// subscriber. A full or hung-up subscriber is dropped from fan-out;
    /// the buffer still holds the event for replay on resubscribe.
    ///
    /// Publishing the terminal `Completed` event seals the channel: later
    /// publishes fail, live streams end after it, and the buffer is removed
    /// once the retention grace elapses.
    pub async fn publish(&self, task_id: &TaskId, event: TaskEvent) -> Result<(), FeedError> {
        let mut store = self.store.lock().await;
        let channel = store
            .channels
            .get_mut(task_id)
            .ok_or_else(|| FeedError::NotFound(task_id.to_string()))?;

        if channel.sealed {
            return Err(FeedError::Sealed(task_id.to_string()));
        }

        let terminal = event.is_terminal();
        channel.buffer.push(event.clone());

        let before = channel.senders.len();
        channel.senders.retain(|tx| tx.try_send(event.clone()).is_ok());
        let dropped = before - channel.senders.len();
        if dropped > 0 {
            tracing::warn!(task_id = %task_id, dropped, "dropped slow or detached subscribers");
        }

        if terminal {
            channel.sealed = true;
            // Dropping the senders closes each live receiver, so streams
            // end right after the Completed event.
            channel.senders.clear();
            self.schedule_removal(task_id.clone());
        }

        Ok(())
    }

    /// Attach a subscriber. The buffer snapshot and live-sender registration
    /// happen under one lock, so the stream sees every event exactly once in
    /// order no matter when it attaches.
    pub async fn subscribe(&self, task_id: &TaskId) -> Result<TaskEventStream, FeedError> {
        let mut store = self.store.lock().await;
        let channel = store
            .channels
            .get_mut(task_id)
            .ok_or_else(|| FeedError::NotFound(task_id.to_string()))?;

        let backlog: VecDeque<TaskEvent> = channel.buffer.iter().cloned().collect();
        let (tx, rx) = mpsc::channel(self.config.subscriber_buffer);
        if channel.sealed {
            // Replay only: the backlog already ends with Completed.
            drop(tx);
        } else {
            channel.senders.push(tx);
        }

        Ok(TaskEventStream { backlog, live: rx })
    }

    /// Immediate teardown of a task's channel. Live streams end; later
    /// subscribes get `NotFound`.
    pub async fn remove(&self, task_id: &TaskId) {
        let mut store = self.store.lock().await;
        store.channels.remove(task_id);
    }

    /// Number of live subscribers currently attached.
    pub async fn subscriber_count(&self, task_id: &TaskId) -> usize {
        let store = self.store.lock().await;
        store
            .channels
            .get(task_id)
            .map_or(0, |c| c.senders.len())
    }

    fn schedule_removal(&self, task_id: TaskId) {
        let store = self.store.clone();
        let grace = self.config.retention_grace;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            let mut store = store.lock().await;
            if store.channels.remove(&task_id).is_some() {
                tracing::debug!(task_id = %task_id, "retention grace elapsed, buffer removed");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbops_restart_domain::{OutputEvent, OutputKind, TaskCompleted, TaskStatus, now_ms};

    fn line(task_id: &TaskId, seq: u64) -> TaskEvent {
        TaskEvent::Output(OutputEvent {
            task_id: task_id.clone(),
            seq,
            timestamp_ms: now_ms(),
            kind: OutputKind::Info,
            line: format!("line {seq}"),
        })
    }

    fn completed() -> TaskEvent {
        TaskEvent::Completed(TaskCompleted {
            status: TaskStatus::Completed,
            success_count: 1,
            failure_count: 0,
            duration_seconds: 1,
        })
    }

    #[tokio::test]
    async fn open_twice_is_an_error() {
        let feed = OutputBroadcaster::new(FeedConfig::default());
        let id = TaskId::generate();
        feed.open(&id).await.unwrap();
        assert!(matches!(
            feed.open(&id).await,
            Err(FeedError::AlreadyOpen(_))
        ));
    }

    #[tokio::test]
    async fn publish_to_unknown_task_is_not_found() {
        let feed = OutputBroadcaster::new(FeedConfig::default());
        let id = TaskId::generate();
        assert!(matches!(
            feed.publish(&id, line(&id, 0)).await,
            Err(FeedError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn subscribe_to_unknown_task_is_not_found() {
        let feed = OutputBroadcaster::new(FeedConfig::default());
        let id = TaskId::generate();
        assert!(matches!(
            feed.subscribe(&id).await,
            Err(FeedError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn publish_after_terminal_is_sealed() {
        let feed = OutputBroadcaster::new(FeedConfig::default());
        let id = TaskId::generate();
        feed.open(&id).await.unwrap();
        feed.publish(&id, completed()).await.unwrap();
        assert!(matches!(
            feed.publish(&id, line(&id, 1)).await,
            Err(FeedError::Sealed(_))
        ));
    }

    #[tokio::test]
    async fn slow_subscriber_is_dropped_not_awaited() {
        let feed = OutputBroadcaster::new(FeedConfig {
            subscriber_buffer: 2,
            retention_grace: Duration::from_secs(60),
        });
        let id = TaskId::generate();
        feed.open(&id).await.unwrap();

        let _stream = feed.subscribe(&id).await.unwrap();
        assert_eq!(feed.subscriber_count(&id).await, 1);

        // Never drained: capacity 2, so the third publish evicts it.
        for seq in 0..3 {
            feed.publish(&id, line(&id, seq)).await.unwrap();
        }
        assert_eq!(feed.subscriber_count(&id).await, 0);
    }

    #[tokio::test]
    async fn dropped_stream_detaches_on_next_publish() {
        let feed = OutputBroadcaster::new(FeedConfig::default());
        let id = TaskId::generate();
        feed.open(&id).await.unwrap();

        let stream = feed.subscribe(&id).await.unwrap();
        drop(stream);

        feed.publish(&id, line(&id, 0)).await.unwrap();
        assert_eq!(feed.subscriber_count(&id).await, 0);
    }

    #[tokio::test]
    async fn remove_makes_task_not_found() {
        let feed = OutputBroadcaster::new(FeedConfig::default());
        let id = TaskId::generate();
        feed.open(&id).await.unwrap();
        feed.remove(&id).await;
        assert!(matches!(
            feed.subscribe(&id).await,
            Err(FeedError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn retention_grace_expires_buffer() {
        tokio::time::pause();
        let feed = OutputBroadcaster::new(FeedConfig {
            subscriber_buffer: 8,
            retention_grace: Duration::from_secs(30),
        });
        let id = TaskId::generate();
        feed.open(&id).await.unwrap();
        feed.publish(&id, completed()).await.unwrap();
        // Let the retention timer register before advancing the clock.
        tokio::task::yield_now().await;

        // Still replayable inside the grace window.
        assert!(feed.subscribe(&id).await.is_ok());

        tokio::time::advance(Duration::from_secs(31)).await;
        tokio::task::yield_now().await;
        assert!(matches!(
            feed.subscribe(&id).await,
            Err(FeedError::NotFound(_))
        ));
    }
}
