//! C7: correlates an outgoing request's `request_id` with the response
//! that eventually arrives on the message queue's read loop. Bounded so a
//! runaway caller can't register unbounded pending slots (spec.md §6.2
//! request/response correlation, §5 "blocking operations ... support both
//! timeout and `interrupt()`").

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dcl_wire::Message;
use tokio::sync::{oneshot, Mutex, Notify};
use tokio::time;

use crate::error::{TransportError, TransportResult};

pub const DEFAULT_CAPACITY: usize = 64;

struct Inner {
    senders: HashMap<u32, oneshot::Sender<Message>>,
    receivers: HashMap<u32, oneshot::Receiver<Message>>,
    capacity: usize,
    interrupted: bool,
}

/// Shared between the task that submits requests (registers a slot) and
/// the message queue's reader task (fills it in when the matching
/// response arrives).
pub struct ResponseBuffer {
    inner: Mutex<Inner>,
    /// Woken whenever a slot frees up (a response is consumed, a
    /// registration times out) or the buffer is interrupted, so a
    /// `register` blocked on a full buffer has something to wait on
    /// (spec.md §5 "blocking operations").
    capacity_available: Notify,
}

impl ResponseBuffer {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        ResponseBuffer {
            inner: Mutex::new(Inner {
                senders: HashMap::new(),
                receivers: HashMap::new(),
                capacity,
                interrupted: false,
            }),
            capacity_available: Notify::new(),
        }
    }

    /// Registers `request_id` as awaiting a response. Call before the
    /// request is sent: the oneshot channel buffers one value even before
    /// `get` polls it, so a response that arrives first isn't lost.
    ///
    /// Blocks rather than erroring when the buffer is at capacity — a
    /// caller that can't register a slot yet should wait for one to free,
    /// not fail the request outright — and wakes with
    /// `TransportError::Interrupted` if `interrupt()` fires while it waits.
    pub async fn register(self: &Arc<Self>, request_id: u32) -> TransportResult<()> {
        loop {
            let notified = self.capacity_available.notified();
            {
                let mut inner = self.inner.lock().await;
                if inner.interrupted {
                    return Err(TransportError::Interrupted);
                }
                if inner.senders.len() < inner.capacity {
                    let (tx, rx) = oneshot::channel();
                    inner.senders.insert(request_id, tx);
                    inner.receivers.insert(request_id, rx);
                    return Ok(());
                }
            }
            notified.await;
        }
    }

    /// Called by the message queue's reader loop when a response arrives.
    /// A response for an id nobody registered is dropped with a debug log
    /// (spec.md §7 "unknown ids log-and-drop").
    pub async fn put(&self, request_id: u32, response: Message) {
        let mut inner = self.inner.lock().await;
        if let Some(tx) = inner.senders.remove(&request_id) {
            let _ = tx.send(response);
            self.capacity_available.notify_waiters();
        } else {
            log::debug!("dropping response for unregistered request id {}", request_id);
        }
    }

    /// Blocks until the response for `request_id` arrives, the deadline
    /// elapses, or `interrupt()` is called. `register` must have been
    /// called for this id first, or this fails immediately.
    pub async fn get(self: &Arc<Self>, request_id: u32, timeout: Duration) -> TransportResult<Message> {
        let rx = {
            let mut inner = self.inner.lock().await;
            if inner.interrupted {
                return Err(TransportError::Interrupted);
            }
            inner
                .receivers
                .remove(&request_id)
                .ok_or_else(|| TransportError::Protocol(format!("request id {} was never registered", request_id)))?
        };

        match time::timeout(timeout, rx).await {
            Ok(Ok(message)) => Ok(message),
            Ok(Err(_)) => Err(TransportError::Interrupted),
            Err(_) => {
                let mut inner = self.inner.lock().await;
                inner.senders.remove(&request_id);
                self.capacity_available.notify_waiters();
                Err(TransportError::TimedOut)
            }
        }
    }

    /// Wakes every pending `get` with `TransportError::Interrupted` by
    /// dropping their senders, wakes every `register` blocked on a full
    /// buffer so it can observe the interruption, and causes subsequent
    /// `register`/`get` calls to fail the same way until the buffer is
    /// replaced. Used on connection teardown.
    pub async fn interrupt(&self) {
        let mut inner = self.inner.lock().await;
        inner.interrupted = true;
        inner.senders.clear();
        self.capacity_available.notify_waiters();
    }
}

impl Default for ResponseBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use dcl_core::CLError;
    use dcl_wire::messages::StatusResponse;

    fn status(request_id: u32) -> Message {
        Message::StatusResponse(StatusResponse { request_id, status: CLError::SUCCESS })
    }

    #[tokio::test]
    async fn get_returns_the_response_put_for_its_id() {
        let buf = Arc::new(ResponseBuffer::new());
        buf.register(1).await.unwrap();
        buf.put(1, status(1)).await;
        let response = buf.get(1, Duration::from_secs(1)).await.unwrap();
        assert_eq!(response, status(1));
    }

    #[tokio::test]
    async fn get_times_out_when_nothing_arrives() {
        let buf = Arc::new(ResponseBuffer::new());
        buf.register(1).await.unwrap();
        let err = buf.get(1, Duration::from_millis(20)).await.unwrap_err();
        assert!(matches!(err, TransportError::TimedOut));
    }

    #[tokio::test]
    async fn interrupt_wakes_pending_waiters() {
        let buf = Arc::new(ResponseBuffer::new());
        buf.register(1).await.unwrap();

        let waiter = {
            let buf = buf.clone();
            tokio::spawn(async move { buf.get(1, Duration::from_secs(5)).await })
        };
        // give the waiter a moment to register its fresh oneshot
        time::sleep(Duration::from_millis(10)).await;
        buf.interrupt().await;

        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(TransportError::Interrupted)));
    }

    #[tokio::test]
    async fn response_for_unregistered_id_is_dropped_not_panicked() {
        let buf = Arc::new(ResponseBuffer::new());
        buf.put(42, status(42)).await;
    }

    #[tokio::test]
    async fn register_blocks_when_full_and_resumes_once_a_slot_frees() {
        let buf = Arc::new(ResponseBuffer::with_capacity(1));
        buf.register(1).await.unwrap();

        let blocked = {
            let buf = buf.clone();
            tokio::spawn(async move { buf.register(2).await })
        };
        time::sleep(Duration::from_millis(10)).await;
        assert!(!blocked.is_finished());

        buf.put(1, status(1)).await;
        buf.get(1, Duration::from_secs(1)).await.unwrap();

        blocked.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn interrupt_wakes_a_register_blocked_on_a_full_buffer() {
        let buf = Arc::new(ResponseBuffer::with_capacity(1));
        buf.register(1).await.unwrap();

        let blocked = {
            let buf = buf.clone();
            tokio::spawn(async move { buf.register(2).await })
        };
        time::sleep(Duration::from_millis(10)).await;
        buf.interrupt().await;

        let result = blocked.await.unwrap();
        assert!(matches!(result, Err(TransportError::Interrupted)));
    }
}
