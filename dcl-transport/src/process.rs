//! C8: the per-peer connection state shared by a host's view of a compute
//! node and a compute node's view of its host — one `Process` bundles the
//! control queue, the data stream and the response correlation buffer
//! that belong to a single TCP peer (spec.md §6.2, §6.3).

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dcl_core::ProcessId;
use dcl_wire::Message;
use tokio::sync::watch;

use crate::data_stream::DataStream;
use crate::error::{TransportError, TransportResult};
use crate::message_queue::MessageQueue;
use crate::response_buffer::ResponseBuffer;

/// The message queue and the data stream of a peer connect independently
/// (spec.md §4.8): a daemon's accept loop can see one arrive well before
/// the other, and the pairing logic that matches them by peer pid needs a
/// state in between "nothing yet" and "fully usable".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    MessageQueueConnected,
    Connected,
}

/// Allocates strictly increasing 32-bit request ids, one per `Process`
/// (request ids only need to be unique within a single connection's
/// correlation buffer, not cluster-wide).
struct RequestIdAllocator {
    next: AtomicU32,
}

impl RequestIdAllocator {
    fn new() -> Self {
        RequestIdAllocator { next: AtomicU32::new(1) }
    }

    fn allocate(&self) -> u32 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

pub struct Process {
    pid: ProcessId,
    queue: Arc<MessageQueue>,
    data: Mutex<Option<Arc<DataStream>>>,
    responses: Arc<ResponseBuffer>,
    request_ids: RequestIdAllocator,
    status_tx: watch::Sender<ConnectionStatus>,
    status_rx: watch::Receiver<ConnectionStatus>,
}

impl Process {
    /// Both channels already in hand — the common case for a connecting
    /// peer, which dials the control and data sockets back to back and has
    /// no reason to expose the in-between state.
    pub fn new(queue: Arc<MessageQueue>, data: Arc<DataStream>) -> Arc<Self> {
        let process = Self::awaiting_data(queue);
        process.attach_data_stream(data);
        process
    }

    /// The message queue half of a peer has connected; its data stream
    /// hasn't arrived yet. Used by a daemon's accept loop while pairing
    /// the two sockets by peer pid (spec.md §4.8, §6.3).
    pub fn awaiting_data(queue: Arc<MessageQueue>) -> Arc<Self> {
        let pid = queue.peer_pid();
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::MessageQueueConnected);
        Arc::new(Process {
            pid,
            queue,
            data: Mutex::new(None),
            responses: Arc::new(ResponseBuffer::new()),
            request_ids: RequestIdAllocator::new(),
            status_tx,
            status_rx,
        })
    }

    /// Completes the pairing once the matching data stream shows up,
    /// promoting this process to fully `Connected`.
    pub fn attach_data_stream(&self, data: Arc<DataStream>) {
        *self.data.lock().unwrap() = Some(data);
        let _ = self.status_tx.send(ConnectionStatus::Connected);
    }

    pub fn pid(&self) -> ProcessId {
        self.pid
    }

    /// Panics if called before the data stream has been attached — every
    /// caller reachable from `RequestProcessor`/`CommandQueue` only runs
    /// against a `Session`/`ComputeNode` built on a fully `Connected`
    /// `Process`.
    pub fn data_stream(&self) -> Arc<DataStream> {
        self.data.lock().unwrap().clone().expect("process is not fully connected yet")
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status_rx.borrow()
    }

    pub fn next_request_id(&self) -> u32 {
        self.request_ids.allocate()
    }

    /// Delivers a response read off this peer's message queue to whichever
    /// caller is waiting on its `request_id`.
    pub async fn complete_response(&self, response: Message) {
        let request_id = response_request_id(&response);
        self.responses.put(request_id, response).await;
    }

    /// Sends `message` (already carrying the allocated `request_id`) and
    /// blocks for the matching response or `timeout`, whichever comes
    /// first. This is C8's "execute_command" sugar: one request, one
    /// correlated response.
    pub async fn execute_command(&self, request_id: u32, message: Message, timeout: Duration) -> TransportResult<Message> {
        self.responses.register(request_id).await?;
        self.queue.send(message).await?;
        self.responses.get(request_id, timeout).await
    }

    /// Fire-and-forget: notifications carry no `request_id` and expect no
    /// response (spec.md §4.12).
    pub async fn notify(&self, message: Message) -> TransportResult<()> {
        self.queue.send(message).await
    }

    pub async fn mark_disconnected(&self) {
        let _ = self.status_tx.send(ConnectionStatus::Disconnected);
        self.responses.interrupt().await;
    }

    pub async fn await_status(&self, target: ConnectionStatus, deadline: Duration) -> TransportResult<()> {
        let mut rx = self.status_rx.clone();
        if *rx.borrow() == target {
            return Ok(());
        }
        tokio::time::timeout(deadline, async {
            loop {
                if rx.changed().await.is_err() {
                    return Err(TransportError::Connection("status channel closed".into()));
                }
                if *rx.borrow() == target {
                    return Ok(());
                }
            }
        })
        .await
        .map_err(|_| TransportError::TimedOut)?
    }
}

fn response_request_id(message: &Message) -> u32 {
    match message {
        Message::StatusResponse(m) => m.request_id,
        Message::DeviceIdsResponse(m) => m.request_id,
        Message::InfoResponse(m) => m.request_id,
        Message::BuildLogResponse(m) => m.request_id,
        Message::EventProfilingResponse(m) => m.request_id,
        other => {
            log::warn!("{:?} is not a response message; cannot correlate", other.type_tag());
            0
        }
    }
}

/// The compute node, from a host's point of view: the target of enqueue
/// requests and info queries.
#[derive(Clone)]
pub struct ComputeNode(pub Arc<Process>);

impl ComputeNode {
    pub fn pid(&self) -> ProcessId {
        self.0.pid()
    }
}

/// The host, from a compute node's point of view: the recipient of status
/// notifications and build-completion callbacks.
#[derive(Clone)]
pub struct Host(pub Arc<Process>);

impl Host {
    pub fn pid(&self) -> ProcessId {
        self.0.pid()
    }
}

/// Sends the same request (built fresh per target so each gets its own
/// `request_id`) to every node and waits for all responses — the
/// multicast/gather sugar named in spec.md §6.3 for broadcast-style
/// enqueue operations.
pub async fn execute_on_all<F>(
    nodes: &[ComputeNode],
    timeout: Duration,
    build: F,
) -> Vec<TransportResult<Message>>
where
    F: Fn(&ComputeNode, u32) -> Message + Send + Sync + 'static,
{
    let build = Arc::new(build);
    let mut handles = Vec::with_capacity(nodes.len());
    for node in nodes {
        let process = node.0.clone();
        let node = node.clone();
        let build = build.clone();
        handles.push(tokio::spawn(async move {
            let request_id = process.next_request_id();
            let message = build(&node, request_id);
            process.execute_command(request_id, message, timeout).await
        }));
    }

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        results.push(
            handle
                .await
                .unwrap_or_else(|_| Err(TransportError::Connection("task panicked".into()))),
        );
    }
    results
}
