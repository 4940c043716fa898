//! Host half of C13: a thin, ergonomic wrapper a front-end shim can build
//! API calls on top of, turning `enqueue_*`/`flush`/`finish` calls into
//! wire requests against a single compute node's command queue.

use std::collections::HashMap;
use std::time::Duration;

use dcl_core::{CLError, ObjectId, ProcessId};
use dcl_transport::{execute_on_all, ComputeNode, TransportError};
use dcl_wire::messages::{
    BroadcastDestination, CommandOptions, EnqueueBarrier, EnqueueBroadcastBuffer,
    EnqueueCopyBuffer, EnqueueMapBuffer, EnqueueMarker, EnqueueNdRangeKernel, EnqueueReadBuffer,
    EnqueueReduceBuffer, EnqueueUnmapBuffer, EnqueueWaitForEvents, EnqueueWriteBuffer,
    FinishRequest, FlushRequest, ReduceSource, StatusResponse,
};
use dcl_wire::Message;

/// Default timeout applied to queue-management requests (flush/finish);
/// long-running kernel enqueues don't block on their own completion so
/// they don't need one (spec.md §4.11 — enqueue responses ack acceptance,
/// not completion).
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct CommandQueue {
    node: ComputeNode,
    queue_id: ObjectId,
}

impl CommandQueue {
    pub fn new(node: ComputeNode, queue_id: ObjectId) -> Self {
        CommandQueue { node, queue_id }
    }

    pub fn queue_id(&self) -> ObjectId {
        self.queue_id
    }

    pub fn node(&self) -> &ComputeNode {
        &self.node
    }

    async fn execute(&self, request_id: u32, message: Message) -> Result<CLError, TransportError> {
        let response = self.node.0.execute_command(request_id, message, DEFAULT_TIMEOUT).await?;
        Ok(status_of(response))
    }

    pub async fn enqueue_nd_range_kernel(
        &self,
        kernel_id: ObjectId,
        global_work_size: Vec<u64>,
        local_work_size: Vec<u64>,
        wait_list: Vec<ObjectId>,
        options: CommandOptions,
    ) -> Result<CLError, TransportError> {
        let request_id = self.node.0.next_request_id();
        let message = Message::EnqueueNdRangeKernel(EnqueueNdRangeKernel {
            request_id,
            queue_id: self.queue_id,
            kernel_id,
            global_work_offset: vec![0; global_work_size.len()],
            global_work_size,
            local_work_size,
            wait_list,
            options,
        });
        self.execute(request_id, message).await
    }

    pub async fn enqueue_read_buffer(
        &self,
        buffer_id: ObjectId,
        blocking: bool,
        offset: u64,
        size: u64,
        wait_list: Vec<ObjectId>,
        options: CommandOptions,
    ) -> Result<CLError, TransportError> {
        let request_id = self.node.0.next_request_id();
        let message = Message::EnqueueReadBuffer(EnqueueReadBuffer {
            request_id,
            queue_id: self.queue_id,
            buffer_id,
            blocking,
            offset,
            size,
            wait_list,
            options,
        });
        self.execute(request_id, message).await
    }

    pub async fn enqueue_write_buffer(
        &self,
        buffer_id: ObjectId,
        blocking: bool,
        offset: u64,
        size: u64,
        wait_list: Vec<ObjectId>,
        options: CommandOptions,
    ) -> Result<CLError, TransportError> {
        let request_id = self.node.0.next_request_id();
        let message = Message::EnqueueWriteBuffer(EnqueueWriteBuffer {
            request_id,
            queue_id: self.queue_id,
            buffer_id,
            blocking,
            offset,
            size,
            wait_list,
            options,
        });
        self.execute(request_id, message).await
    }

    pub async fn enqueue_copy_buffer(
        &self,
        src_buffer_id: ObjectId,
        dst_buffer_id: ObjectId,
        src_offset: u64,
        dst_offset: u64,
        size: u64,
        wait_list: Vec<ObjectId>,
        options: CommandOptions,
    ) -> Result<CLError, TransportError> {
        let request_id = self.node.0.next_request_id();
        let message = Message::EnqueueCopyBuffer(EnqueueCopyBuffer {
            request_id,
            queue_id: self.queue_id,
            src_buffer_id,
            dst_buffer_id,
            src_offset,
            dst_offset,
            size,
            wait_list,
            options,
        });
        self.execute(request_id, message).await
    }

    pub async fn enqueue_map_buffer(
        &self,
        buffer_id: ObjectId,
        blocking: bool,
        write: bool,
        offset: u64,
        size: u64,
        wait_list: Vec<ObjectId>,
        options: CommandOptions,
    ) -> Result<CLError, TransportError> {
        let request_id = self.node.0.next_request_id();
        let message = Message::EnqueueMapBuffer(EnqueueMapBuffer {
            request_id,
            queue_id: self.queue_id,
            buffer_id,
            blocking,
            write,
            offset,
            size,
            wait_list,
            options,
        });
        self.execute(request_id, message).await
    }

    pub async fn enqueue_unmap_buffer(
        &self,
        buffer_id: ObjectId,
        wait_list: Vec<ObjectId>,
        options: CommandOptions,
    ) -> Result<CLError, TransportError> {
        let request_id = self.node.0.next_request_id();
        let message = Message::EnqueueUnmapBuffer(EnqueueUnmapBuffer {
            request_id,
            queue_id: self.queue_id,
            buffer_id,
            wait_list,
            options,
        });
        self.execute(request_id, message).await
    }

    pub async fn enqueue_marker(
        &self,
        wait_list: Vec<ObjectId>,
        options: CommandOptions,
    ) -> Result<CLError, TransportError> {
        let request_id = self.node.0.next_request_id();
        let message = Message::EnqueueMarker(EnqueueMarker { request_id, queue_id: self.queue_id, wait_list, options });
        self.execute(request_id, message).await
    }

    pub async fn enqueue_barrier(
        &self,
        wait_list: Vec<ObjectId>,
        options: CommandOptions,
    ) -> Result<CLError, TransportError> {
        let request_id = self.node.0.next_request_id();
        let message = Message::EnqueueBarrier(EnqueueBarrier { request_id, queue_id: self.queue_id, wait_list, options });
        self.execute(request_id, message).await
    }

    pub async fn enqueue_wait_for_events(
        &self,
        wait_list: Vec<ObjectId>,
    ) -> Result<CLError, TransportError> {
        let request_id = self.node.0.next_request_id();
        let message =
            Message::EnqueueWaitForEvents(EnqueueWaitForEvents { request_id, queue_id: self.queue_id, wait_list });
        self.execute(request_id, message).await
    }

    /// Fans `src_buffer_id` out to every destination. Destinations already
    /// bound to this buffer's own compute node travel in a single wire
    /// message, same as the daemon's own same-session fast path; the rest
    /// can't be reached that way (no node dials another node directly,
    /// spec.md §9 relay-vs-direct decision), so the host reads the source
    /// once and relays a write to each of them concurrently.
    pub async fn enqueue_broadcast_buffer(
        &self,
        src_buffer_id: ObjectId,
        src_offset: u64,
        size: u64,
        destinations: Vec<RemoteBuffer>,
        wait_list: Vec<ObjectId>,
        options: CommandOptions,
    ) -> Result<CLError, TransportError> {
        let local_pid = self.node.pid();
        let (local, remote): (Vec<_>, Vec<_>) =
            destinations.into_iter().partition(|d| d.node.pid() == local_pid);

        if !local.is_empty() {
            let request_id = self.node.0.next_request_id();
            let message = Message::EnqueueBroadcastBuffer(EnqueueBroadcastBuffer {
                request_id,
                src_queue_id: self.queue_id,
                src_buffer_id,
                src_offset,
                size,
                destinations: local
                    .iter()
                    .map(|d| BroadcastDestination { queue_id: d.queue_id, buffer_id: d.buffer_id, offset: d.offset })
                    .collect(),
                wait_list: wait_list.clone(),
                options,
            });
            let status = self.execute(request_id, message).await?;
            if status != CLError::SUCCESS || remote.is_empty() {
                return Ok(status);
            }
        } else if remote.is_empty() {
            return Ok(CLError::SUCCESS);
        }

        let bytes = read_remote(&self.node, self.queue_id, src_buffer_id, src_offset, size, wait_list).await?;
        write_to_many(remote, bytes, options).await
    }

    /// Combines every source into `dst_buffer_id`. When every source and
    /// the destination already live on this buffer's own compute node, a
    /// single wire message does the whole reduction there, same as the
    /// daemon's own same-session fast path. Otherwise the host gathers
    /// each source's bytes itself, combines them the same way the
    /// daemon's reduce kernel does (concatenate, then truncate to
    /// `size`), and writes the result back.
    pub async fn enqueue_reduce_buffer(
        &self,
        sources: Vec<RemoteBuffer>,
        dst_buffer_id: ObjectId,
        dst_offset: u64,
        size: u64,
        kernel_id: ObjectId,
        wait_list: Vec<ObjectId>,
        options: CommandOptions,
    ) -> Result<CLError, TransportError> {
        let local_pid = self.node.pid();
        if sources.iter().all(|s| s.node.pid() == local_pid) {
            let request_id = self.node.0.next_request_id();
            let message = Message::EnqueueReduceBuffer(EnqueueReduceBuffer {
                request_id,
                sources: sources
                    .iter()
                    .map(|s| ReduceSource { queue_id: s.queue_id, buffer_id: s.buffer_id, offset: s.offset })
                    .collect(),
                dst_queue_id: self.queue_id,
                dst_buffer_id,
                dst_offset,
                size,
                kernel_id,
                wait_list,
                options,
            });
            return self.execute(request_id, message).await;
        }

        let mut combined = Vec::with_capacity(size as usize);
        for source in &sources {
            let mut bytes =
                read_remote(&source.node, source.queue_id, source.buffer_id, source.offset, size, vec![]).await?;
            combined.append(&mut bytes);
        }
        combined.truncate(size as usize);

        write_to_many(
            vec![RemoteBuffer {
                node: self.node.clone(),
                queue_id: self.queue_id,
                buffer_id: dst_buffer_id,
                offset: dst_offset,
            }],
            combined,
            options,
        )
        .await
    }

    pub async fn flush(&self) -> Result<CLError, TransportError> {
        let request_id = self.node.0.next_request_id();
        let message = Message::FlushRequest(FlushRequest { request_id, queue_id: self.queue_id });
        self.execute(request_id, message).await
    }

    pub async fn finish(&self) -> Result<CLError, TransportError> {
        let request_id = self.node.0.next_request_id();
        let message = Message::FinishRequest(FinishRequest { request_id, queue_id: self.queue_id });
        self.execute(request_id, message).await
    }
}

fn status_of(response: Message) -> CLError {
    match response {
        Message::StatusResponse(StatusResponse { status, .. }) => status,
        other => {
            log::warn!("expected a status response, got tag {}", other.type_tag());
            CLError::PROTOCOL_ERROR
        }
    }
}

/// One end of a broadcast/reduce that may live on a compute node other
/// than the one a `CommandQueue` itself wraps: which node it's on and
/// the queue/buffer/offset its wire messages address it by there.
#[derive(Clone)]
pub struct RemoteBuffer {
    pub node: ComputeNode,
    pub queue_id: ObjectId,
    pub buffer_id: ObjectId,
    pub offset: u64,
}

/// Reads `size` bytes out of a buffer on whichever node holds it: a
/// blocking `EnqueueReadBuffer` and the matching pull off that node's
/// data stream run concurrently, since the daemon won't send its status
/// response until it's done writing the bytes (spec.md §4.11).
async fn read_remote(
    node: &ComputeNode,
    queue_id: ObjectId,
    buffer_id: ObjectId,
    offset: u64,
    size: u64,
    wait_list: Vec<ObjectId>,
) -> Result<Vec<u8>, TransportError> {
    let request_id = node.0.next_request_id();
    let message = Message::EnqueueReadBuffer(EnqueueReadBuffer {
        request_id,
        queue_id,
        buffer_id,
        blocking: true,
        offset,
        size,
        wait_list,
        options: CommandOptions { command_id: ObjectId::NONE, want_event: false },
    });
    let data_stream = node.0.data_stream();
    let read = data_stream.read(size as usize);
    let (response, bytes) = tokio::join!(
        node.0.execute_command(request_id, message, DEFAULT_TIMEOUT),
        read.wait(),
    );
    match status_of(response?) {
        CLError::SUCCESS => Ok(bytes?),
        other => Err(TransportError::Connection(format!(
            "remote read on node {} failed: {:?}",
            node.pid().0,
            other
        ))),
    }
}

/// Writes the same bytes to every destination concurrently: each node's
/// `EnqueueWriteBuffer` request and the push of `bytes` onto that node's
/// own data stream run side by side via `execute_on_all`, generalized so
/// every destination's request can carry its own buffer id and offset
/// (spec.md §6.5 multi-destination fan-out).
async fn write_to_many(
    destinations: Vec<RemoteBuffer>,
    bytes: Vec<u8>,
    options: CommandOptions,
) -> Result<CLError, TransportError> {
    let nodes: Vec<ComputeNode> = destinations.iter().map(|d| d.node.clone()).collect();
    let by_pid: HashMap<ProcessId, RemoteBuffer> =
        destinations.into_iter().map(|d| (d.node.pid(), d)).collect();

    let push_nodes = nodes.clone();
    let push_bytes = bytes.clone();
    let pushes = tokio::spawn(async move {
        let mut handles = Vec::with_capacity(push_nodes.len());
        for node in push_nodes {
            let bytes = push_bytes.clone();
            handles.push(tokio::spawn(async move { node.0.data_stream().write(bytes).wait().await }));
        }
        for handle in handles {
            let _ = handle.await;
        }
    });

    let size = bytes.len() as u64;
    let results = execute_on_all(&nodes, DEFAULT_TIMEOUT, move |node, request_id| {
        let dest = &by_pid[&node.pid()];
        Message::EnqueueWriteBuffer(EnqueueWriteBuffer {
            request_id,
            queue_id: dest.queue_id,
            buffer_id: dest.buffer_id,
            blocking: true,
            offset: dest.offset,
            size,
            wait_list: vec![],
            options,
        })
    })
    .await;

    let _ = pushes.await;

    for result in results {
        let status = status_of(result?);
        if status != CLError::SUCCESS {
            return Ok(status);
        }
    }
    Ok(CLError::SUCCESS)
}

#[cfg(test)]
mod test {
    use super::*;
    use dcl_transport::{MessageDispatcher, MessageQueue, Process, QueueEvent, Role};
    use dcl_core::ProcessId;

    async fn node_with_responder() -> ComputeNode {
        let dispatcher =
            MessageDispatcher::bind("127.0.0.1:0".parse().unwrap(), ProcessId(1), Role::Host)
                .await
                .unwrap();
        let addr = dispatcher.local_addr().unwrap();
        let data_dispatcher =
            dcl_transport::DataDispatcher::bind("127.0.0.1:0".parse().unwrap(), ProcessId(1), Role::Host)
                .await
                .unwrap();
        let data_addr = data_dispatcher.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (queue, mut rx) = dispatcher.accept().await.unwrap().unwrap();
            let data = data_dispatcher.accept().await.unwrap();
            tokio::spawn(async move {
                while let Some(QueueEvent::Message(msg)) = rx.recv().await {
                    let request_id = match &msg {
                        Message::FinishRequest(m) => m.request_id,
                        Message::FlushRequest(m) => m.request_id,
                        Message::EnqueueNdRangeKernel(m) => m.request_id,
                        _ => continue,
                    };
                    let _ = queue
                        .send(Message::StatusResponse(StatusResponse {
                            request_id,
                            status: CLError::SUCCESS,
                        }))
                        .await;
                }
            });
            data
        });

        let client_queue = MessageQueue::connect(addr, ProcessId(2), Role::ComputeNode).await.unwrap();
        let client_data = dcl_transport::DataStream::connect(data_addr, ProcessId(2), Role::ComputeNode)
            .await
            .unwrap();
        let _server_data = server.await.unwrap();

        let (queue, mut rx) = client_queue;
        let process = Process::new(queue, client_data);
        let pump = process.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let QueueEvent::Message(m) = event {
                    pump.complete_response(m).await;
                }
            }
        });

        ComputeNode(process)
    }

    #[tokio::test]
    async fn finish_returns_success_from_the_fake_node() {
        let node = node_with_responder().await;
        let cq = CommandQueue::new(node, ObjectId(1));
        assert_eq!(cq.finish().await.unwrap(), CLError::SUCCESS);
    }

    #[tokio::test]
    async fn enqueue_nd_range_kernel_round_trips_a_status() {
        let node = node_with_responder().await;
        let cq = CommandQueue::new(node, ObjectId(1));
        let status = cq
            .enqueue_nd_range_kernel(
                ObjectId(2),
                vec![64],
                vec![16],
                vec![],
                CommandOptions { command_id: ObjectId::NONE, want_event: false },
            )
            .await
            .unwrap();
        assert_eq!(status, CLError::SUCCESS);
    }

    /// A fake daemon that, beyond the plain status replies
    /// `node_with_responder` hands out, actually moves bytes for
    /// `EnqueueReadBuffer`/`EnqueueWriteBuffer` over its data stream —
    /// enough to stand in for a real node on either side of a cross-node
    /// broadcast/reduce relay.
    async fn node_with_data_responder(host_pid: u64, fill: u8) -> ComputeNode {
        let dispatcher =
            MessageDispatcher::bind("127.0.0.1:0".parse().unwrap(), ProcessId(host_pid), Role::Host)
                .await
                .unwrap();
        let addr = dispatcher.local_addr().unwrap();
        let data_dispatcher = dcl_transport::DataDispatcher::bind(
            "127.0.0.1:0".parse().unwrap(),
            ProcessId(host_pid),
            Role::Host,
        )
        .await
        .unwrap();
        let data_addr = data_dispatcher.local_addr().unwrap();

        tokio::spawn(async move {
            let (queue, mut rx) = dispatcher.accept().await.unwrap().unwrap();
            let data = data_dispatcher.accept().await.unwrap();
            while let Some(QueueEvent::Message(msg)) = rx.recv().await {
                match msg {
                    Message::EnqueueReadBuffer(req) => {
                        let _ = data.write(vec![fill; req.size as usize]).wait().await;
                        let _ = queue
                            .send(Message::StatusResponse(StatusResponse {
                                request_id: req.request_id,
                                status: CLError::SUCCESS,
                            }))
                            .await;
                    }
                    Message::EnqueueWriteBuffer(req) => {
                        let _ = data.read(req.size as usize).wait().await;
                        let _ = queue
                            .send(Message::StatusResponse(StatusResponse {
                                request_id: req.request_id,
                                status: CLError::SUCCESS,
                            }))
                            .await;
                    }
                    _ => {}
                }
            }
        });

        let client_queue = MessageQueue::connect(addr, ProcessId(host_pid + 1000), Role::ComputeNode)
            .await
            .unwrap();
        let client_data =
            dcl_transport::DataStream::connect(data_addr, ProcessId(host_pid + 1000), Role::ComputeNode)
                .await
                .unwrap();

        let (queue, mut rx) = client_queue;
        let process = Process::new(queue, client_data);
        let pump = process.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let QueueEvent::Message(m) = event {
                    pump.complete_response(m).await;
                }
            }
        });

        ComputeNode(process)
    }

    #[tokio::test]
    async fn enqueue_broadcast_buffer_relays_to_a_destination_on_another_node() {
        let src_node = node_with_data_responder(1, 0xAB).await;
        let dst_node = node_with_data_responder(2, 0x00).await;
        let cq = CommandQueue::new(src_node, ObjectId(1));

        let destinations = vec![RemoteBuffer {
            node: dst_node,
            queue_id: ObjectId(1),
            buffer_id: ObjectId(9),
            offset: 0,
        }];
        let status = cq
            .enqueue_broadcast_buffer(
                ObjectId(5),
                0,
                16,
                destinations,
                vec![],
                CommandOptions { command_id: ObjectId::NONE, want_event: false },
            )
            .await
            .unwrap();
        assert_eq!(status, CLError::SUCCESS);
    }

    #[tokio::test]
    async fn enqueue_reduce_buffer_combines_sources_from_different_nodes() {
        let source_a = node_with_data_responder(1, 0x01).await;
        let source_b = node_with_data_responder(2, 0x02).await;
        let dst_node = node_with_data_responder(3, 0x00).await;
        let cq = CommandQueue::new(dst_node, ObjectId(1));

        let sources = vec![
            RemoteBuffer { node: source_a, queue_id: ObjectId(1), buffer_id: ObjectId(1), offset: 0 },
            RemoteBuffer { node: source_b, queue_id: ObjectId(1), buffer_id: ObjectId(2), offset: 0 },
        ];
        let status = cq
            .enqueue_reduce_buffer(
                sources,
                ObjectId(9),
                0,
                8,
                ObjectId(1),
                vec![],
                CommandOptions { command_id: ObjectId::NONE, want_event: false },
            )
            .await
            .unwrap();
        assert_eq!(status, CLError::SUCCESS);
    }
}
