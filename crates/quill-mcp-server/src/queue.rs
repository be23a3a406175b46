//! Bounded async message queue connecting transports to sessions.
//!
//! Read, write, and process units never touch each other directly; they
//! exchange messages through a pair of these queues. `pop` with a timeout
//! returns `None` when no message arrived in time, which callers treat as
//! "poll again", not as an error.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::Mutex;

const DEFAULT_CAPACITY: usize = 64;

/// A multi-producer queue with a single shared consumer side.
///
/// The receiver sits behind a `Mutex` so the queue can be shared via `Arc`
/// between the unit that fills it and the unit that drains it.
pub struct MessageQueue<T> {
    sender: mpsc::Sender<T>,
    receiver: Mutex<mpsc::Receiver<T>>,
}

impl<T> MessageQueue<T> {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity);
        Self {
            sender,
            receiver: Mutex::new(receiver),
        }
    }

    /// Push a message, waiting up to `timeout` for queue space if given.
    ///
    /// Returns `false` if the queue is full past the timeout or closed.
    pub async fn push(&self, value: T, timeout: Option<Duration>) -> bool {
        match timeout {
            Some(duration) => tokio::time::timeout(duration, self.sender.send(value))
                .await
                .map(|sent| sent.is_ok())
                .unwrap_or(false),
            None => self.sender.send(value).await.is_ok(),
        }
    }

    /// Pop the next message, waiting up to `timeout` if given.
    ///
    /// `None` means no message arrived in time, or the queue is closed and
    /// drained.
    pub async fn pop(&self, timeout: Option<Duration>) -> Option<T> {
        let mut receiver = self.receiver.lock().await;
        match timeout {
            Some(duration) => tokio::time::timeout(duration, receiver.recv())
                .await
                .ok()
                .flatten(),
            None => receiver.recv().await,
        }
    }

    /// Close the queue. Pending messages remain poppable; further pushes fail.
    pub async fn close(&self) {
        self.receiver.lock().await.close();
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl<T> Default for MessageQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_push_pop() {
        let queue = MessageQueue::new();
        assert!(queue.push(42u32, None).await);
        assert_eq!(queue.pop(Some(Duration::from_millis(50))).await, Some(42));
    }

    #[tokio::test]
    async fn test_pop_times_out_when_empty() {
        let queue: MessageQueue<u32> = MessageQueue::new();
        assert_eq!(queue.pop(Some(Duration::from_millis(10))).await, None);
    }

    #[tokio::test]
    async fn test_close_drains_then_stops() {
        let queue = MessageQueue::new();
        assert!(queue.push(1u32, None).await);
        queue.close().await;
        assert_eq!(queue.pop(Some(Duration::from_millis(10))).await, Some(1));
        assert_eq!(queue.pop(Some(Duration::from_millis(10))).await, None);
        assert!(!queue.push(2u32, None).await);
        assert!(queue.is_closed());
    }

    #[tokio::test]
    async fn test_push_full_queue_times_out() {
        let queue = MessageQueue::with_capacity(1);
        assert!(queue.push(1u32, None).await);
        assert!(!queue.push(2u32, Some(Duration::from_millis(10))).await);
    }
}
