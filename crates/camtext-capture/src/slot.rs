//! Single-slot overwrite channel between a capture thread and one consumer.
//!
//! The producer never blocks: publishing while an earlier item is still
//! pending replaces that item, so at most one item is ever buffered and the
//! consumer always pulls the freshest one.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::stream::unfold;
use tokio::sync::Notify;

use crate::core::FrameStream;
use camtext_types::Frame;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The slot was empty.
    Delivered,
    /// An unconsumed item was discarded in favour of the new one.
    Replaced,
    /// The receiving side is gone or the slot was closed; the item was dropped.
    Closed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlotStats {
    pub published: u64,
    pub delivered: u64,
    pub discarded: u64,
}

struct SlotState<T> {
    pending: Option<T>,
    producer_done: bool,
    closed: bool,
    stats: SlotStats,
}

struct Shared<T> {
    state: Mutex<SlotState<T>>,
    notify: Notify,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, SlotState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn close(&self) {
        {
            let mut state = self.lock();
            state.closed = true;
            if state.pending.take().is_some() {
                state.stats.discarded += 1;
            }
        }
        self.notify.notify_one();
    }
}

pub fn latest_channel<T>() -> (SlotPublisher<T>, SlotReceiver<T>) {
    let shared = Arc::new(Shared {
        state: Mutex::new(SlotState {
            pending: None,
            producer_done: false,
            closed: false,
            stats: SlotStats::default(),
        }),
        notify: Notify::new(),
    });
    (
        SlotPublisher {
            shared: Arc::clone(&shared),
        },
        SlotReceiver { shared },
    )
}

/// Producing half. Dropping it lets the consumer drain the last pending item.
pub struct SlotPublisher<T> {
    shared: Arc<Shared<T>>,
}

impl<T> SlotPublisher<T> {
    pub fn publish(&self, item: T) -> PublishOutcome {
        let outcome = {
            let mut state = self.shared.lock();
            if state.closed {
                return PublishOutcome::Closed;
            }
            state.stats.published += 1;
            if state.pending.replace(item).is_some() {
                state.stats.discarded += 1;
                PublishOutcome::Replaced
            } else {
                PublishOutcome::Delivered
            }
        };
        self.shared.notify.notify_one();
        outcome
    }

    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    pub fn closer(&self) -> SlotCloser<T> {
        SlotCloser {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Drop for SlotPublisher<T> {
    fn drop(&mut self) {
        self.shared.lock().producer_done = true;
        self.shared.notify.notify_one();
    }
}

/// Handle that closes the slot from outside the producer, discarding any pending item.
pub struct SlotCloser<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for SlotCloser<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> SlotCloser<T> {
    pub fn close(&self) {
        self.shared.close();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    pub fn stats(&self) -> SlotStats {
        self.shared.lock().stats
    }
}

pub struct SlotReceiver<T> {
    shared: Arc<Shared<T>>,
}

impl<T> SlotReceiver<T> {
    /// Waits for the latest item. Returns `None` once the slot is closed, or
    /// once the producer is gone and nothing is pending.
    pub async fn next(&mut self) -> Option<T> {
        loop {
            let notified = self.shared.notify.notified();
            {
                let mut state = self.shared.lock();
                if state.closed {
                    return None;
                }
                if let Some(item) = state.pending.take() {
                    state.stats.delivered += 1;
                    return Some(item);
                }
                if state.producer_done {
                    return None;
                }
            }
            notified.await;
        }
    }

    pub fn try_take(&mut self) -> Option<T> {
        let mut state = self.shared.lock();
        if state.closed {
            return None;
        }
        let item = state.pending.take();
        if item.is_some() {
            state.stats.delivered += 1;
        }
        item
    }

    pub fn stats(&self) -> SlotStats {
        self.shared.lock().stats
    }

    pub fn close(&self) {
        self.shared.close();
    }

    pub fn closer(&self) -> SlotCloser<T> {
        SlotCloser {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Drop for SlotReceiver<T> {
    fn drop(&mut self) {
        self.shared.close();
    }
}

impl SlotReceiver<Frame> {
    pub fn into_stream(self) -> FrameStream {
        Box::pin(unfold(self, |mut receiver| async move {
            receiver.next().await.map(|frame| (frame, receiver))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio_stream::StreamExt;

    #[tokio::test(flavor = "multi_thread")]
    async fn publishing_while_busy_keeps_only_latest() {
        let (tx, mut rx) = latest_channel::<u32>();
        assert_eq!(tx.publish(1), PublishOutcome::Delivered);
        assert_eq!(tx.publish(2), PublishOutcome::Replaced);
        assert_eq!(tx.publish(3), PublishOutcome::Replaced);

        assert_eq!(rx.next().await, Some(3));
        assert_eq!(rx.try_take(), None);

        let stats = rx.stats();
        assert_eq!(stats.published, 3);
        assert_eq!(stats.delivered, 1);
        assert_eq!(stats.discarded, 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn receiver_wakes_on_publish_from_another_thread() {
        let (tx, mut rx) = latest_channel::<u32>();
        let producer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            tx.publish(42);
        });
        let value = tokio::time::timeout(Duration::from_secs(2), rx.next())
            .await
            .expect("receiver should wake");
        assert_eq!(value, Some(42));
        producer.join().unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn dropped_publisher_still_drains_pending_item() {
        let (tx, mut rx) = latest_channel::<u32>();
        tx.publish(7);
        drop(tx);
        assert_eq!(rx.next().await, Some(7));
        assert_eq!(rx.next().await, None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn close_discards_pending_and_rejects_new_items() {
        let (tx, mut rx) = latest_channel::<u32>();
        let closer = tx.closer();
        tx.publish(1);
        closer.close();

        assert_eq!(tx.publish(2), PublishOutcome::Closed);
        assert!(tx.is_closed());
        assert_eq!(rx.next().await, None);
        assert_eq!(closer.stats().discarded, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn close_wakes_a_waiting_receiver() {
        let (tx, mut rx) = latest_channel::<u32>();
        let closer = tx.closer();
        let waiter = tokio::spawn(async move { rx.next().await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        closer.close();
        let result = tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .expect("receiver should observe close")
            .unwrap();
        assert_eq!(result, None);
        drop(tx);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn dropping_receiver_closes_publisher_side() {
        let (tx, rx) = latest_channel::<u32>();
        drop(rx);
        assert_eq!(tx.publish(1), PublishOutcome::Closed);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn frame_receiver_converts_into_stream() {
        let (tx, rx) = latest_channel::<Frame>();
        let frame = Frame::from_bgra_owned(1, 1, 4, None, vec![0, 0, 0, 255]).unwrap();
        tx.publish(frame.with_frame_index(Some(9)));
        drop(tx);

        let mut stream = rx.into_stream();
        let first = stream.next().await.unwrap();
        assert_eq!(first.frame_index(), Some(9));
        assert!(stream.next().await.is_none());
    }
}
