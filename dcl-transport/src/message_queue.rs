//! C3: one TCP connection carrying framed control-plane `Message`s.
//! `TCP_NODELAY` is set so small request/response frames aren't held back
//! by Nagle's algorithm (spec.md §6.2); reading happens on a dedicated
//! background task so a slow consumer never blocks the socket, and
//! disconnection surfaces as a `QueueEvent::Disconnected` rather than a
//! silent channel close.

use std::net::SocketAddr;
use std::sync::Arc;

use dcl_core::ProcessId;
use dcl_wire::envelope::{Envelope, HEADER_LEN};
use dcl_wire::{ByteBuffer, Message};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};

use crate::error::{TransportError, TransportResult};
use crate::handshake::{self, Role};

#[derive(Debug)]
pub enum QueueEvent {
    Message(Message),
    Disconnected,
}

pub struct MessageQueue {
    peer_pid: ProcessId,
    writer: Mutex<OwnedWriteHalf>,
}

impl MessageQueue {
    /// Initiator side of the handshake (spec.md §6.2): sends our greeting
    /// and waits for the accepting peer's reply. A reply pid of 0 means
    /// the peer refused the connection.
    pub async fn connect(
        addr: SocketAddr,
        pid: ProcessId,
        role: Role,
    ) -> TransportResult<(Arc<Self>, mpsc::UnboundedReceiver<QueueEvent>)> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))?;
        stream.set_nodelay(true)?;
        let (mut read_half, mut write_half) = stream.into_split();
        handshake::send_greeting(&mut write_half, pid, role).await?;
        let peer_pid = handshake::recv_reply(&mut read_half)
            .await?
            .ok_or_else(|| TransportError::Connection("connection refused by peer".into()))?;

        let (tx, rx) = mpsc::unbounded_channel();
        spawn_reader(read_half, tx);

        Ok((Arc::new(MessageQueue { peer_pid, writer: Mutex::new(write_half) }), rx))
    }

    /// Accepting side of the handshake. Reads the connecting peer's
    /// greeting, asks `approve` whether to keep it, and replies with our
    /// own pid if so or a refusal (pid 0) otherwise. Returns `None` on a
    /// refusal — the caller has nothing left to do but drop the socket.
    pub async fn from_accepted(
        stream: TcpStream,
        pid: ProcessId,
        role: Role,
        approve: &(dyn Fn(ProcessId, Role) -> bool + Send + Sync),
    ) -> TransportResult<Option<(Arc<Self>, mpsc::UnboundedReceiver<QueueEvent>)>> {
        stream.set_nodelay(true)?;
        let (mut read_half, mut write_half) = stream.into_split();
        let (peer_pid, peer_role) = handshake::recv_greeting(&mut read_half).await?;

        if !approve(peer_pid, peer_role) {
            handshake::send_reply(&mut write_half, None).await?;
            return Ok(None);
        }
        handshake::send_reply(&mut write_half, Some(pid)).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        spawn_reader(read_half, tx);

        Ok(Some((Arc::new(MessageQueue { peer_pid, writer: Mutex::new(write_half) }), rx)))
    }

    pub fn peer_pid(&self) -> ProcessId {
        self.peer_pid
    }

    /// Sends are serialized behind a mutex: two callers racing to send on
    /// the same queue must not interleave partial frames.
    pub async fn send(&self, message: Message) -> TransportResult<()> {
        let body = message.encode_body();
        let envelope = Envelope::new(message.type_tag(), body.as_slice().len() as u32);

        let mut writer = self.writer.lock().await;
        writer.write_all(&envelope.encode()).await?;
        writer.write_all(body.as_slice()).await?;
        Ok(())
    }
}

fn spawn_reader(mut read_half: OwnedReadHalf, tx: mpsc::UnboundedSender<QueueEvent>) {
    tokio::spawn(async move {
        loop {
            match read_one_message(&mut read_half).await {
                Ok(message) => {
                    if tx.send(QueueEvent::Message(message)).is_err() {
                        return;
                    }
                }
                Err(err) => {
                    log::debug!("message queue reader stopping: {}", err);
                    let _ = tx.send(QueueEvent::Disconnected);
                    return;
                }
            }
        }
    });
}

async fn read_one_message(read_half: &mut OwnedReadHalf) -> TransportResult<Message> {
    let mut header = [0u8; HEADER_LEN];
    read_half.read_exact(&mut header).await?;
    let envelope = Envelope::decode(&header);

    let mut body = vec![0u8; envelope.body_size as usize];
    read_half.read_exact(&mut body).await?;

    let mut buf = ByteBuffer::from_vec(body);
    Ok(Message::unpack_body(envelope.type_tag, &mut buf)?)
}

type ApprovalFn = dyn Fn(ProcessId, Role) -> bool + Send + Sync;

/// Accepts inbound control-plane connections (C5, the message half of the
/// teacher's dual accept-loop pattern).
pub struct MessageDispatcher {
    listener: TcpListener,
    pid: ProcessId,
    role: Role,
    approve: Arc<ApprovalFn>,
}

impl MessageDispatcher {
    pub async fn bind(addr: SocketAddr, pid: ProcessId, role: Role) -> TransportResult<Self> {
        Self::bind_with_approval(addr, pid, role, Arc::new(|_, _| true)).await
    }

    /// Binds with an approval callback consulted for every inbound
    /// greeting before a reply is sent (spec.md §6.2): returning `false`
    /// sends a refusal and the connection is dropped, never reaching the
    /// caller's `accept()`.
    pub async fn bind_with_approval(
        addr: SocketAddr,
        pid: ProcessId,
        role: Role,
        approve: Arc<ApprovalFn>,
    ) -> TransportResult<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(MessageDispatcher { listener, pid, role, approve })
    }

    pub fn local_addr(&self) -> TransportResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts the next inbound connection and completes the handshake.
    /// Returns `Ok(None)` when the connection was refused by the approval
    /// callback; the caller should just loop back to the next `accept()`.
    pub async fn accept(
        &self,
    ) -> TransportResult<Option<(Arc<MessageQueue>, mpsc::UnboundedReceiver<QueueEvent>)>> {
        let (stream, _peer_addr) = self.listener.accept().await?;
        MessageQueue::from_accepted(stream, self.pid, self.role, self.approve.as_ref()).await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use dcl_core::ObjectId;
    use dcl_wire::messages::FinishRequest as FinishRequestMsg;

    #[tokio::test]
    async fn message_round_trips_over_a_real_socket() {
        let dispatcher = MessageDispatcher::bind(
            "127.0.0.1:0".parse().unwrap(),
            ProcessId(1),
            Role::Host,
        )
        .await
        .unwrap();
        let addr = dispatcher.local_addr().unwrap();

        let server = tokio::spawn(async move { dispatcher.accept().await.unwrap().unwrap() });
        let (client, _client_rx) =
            MessageQueue::connect(addr, ProcessId(2), Role::ComputeNode).await.unwrap();
        let (server_queue, mut server_rx) = server.await.unwrap();

        assert_eq!(client.peer_pid(), ProcessId(1));
        assert_eq!(server_queue.peer_pid(), ProcessId(2));

        let msg = Message::FinishRequest(FinishRequestMsg { request_id: 7, queue_id: ObjectId(3) });
        client.send(msg.clone()).await.unwrap();

        match server_rx.recv().await.unwrap() {
            QueueEvent::Message(received) => assert_eq!(received, msg),
            QueueEvent::Disconnected => panic!("unexpected disconnect"),
        }
    }

    #[tokio::test]
    async fn dropping_the_peer_surfaces_as_disconnected() {
        let dispatcher = MessageDispatcher::bind(
            "127.0.0.1:0".parse().unwrap(),
            ProcessId(1),
            Role::Host,
        )
        .await
        .unwrap();
        let addr = dispatcher.local_addr().unwrap();

        let server = tokio::spawn(async move { dispatcher.accept().await.unwrap().unwrap() });
        let (client, _rx) =
            MessageQueue::connect(addr, ProcessId(2), Role::ComputeNode).await.unwrap();
        let (_server_queue, mut server_rx) = server.await.unwrap();

        drop(client);

        match server_rx.recv().await.unwrap() {
            QueueEvent::Disconnected => {}
            QueueEvent::Message(_) => panic!("expected disconnect"),
        }
    }

    #[tokio::test]
    async fn refused_connection_never_reaches_the_accept_loop() {
        let dispatcher = MessageDispatcher::bind_with_approval(
            "127.0.0.1:0".parse().unwrap(),
            ProcessId(1),
            Role::Host,
            Arc::new(|peer_pid, _role| peer_pid != ProcessId(2)),
        )
        .await
        .unwrap();
        let addr = dispatcher.local_addr().unwrap();

        let server = tokio::spawn(async move { dispatcher.accept().await.unwrap() });
        let result = MessageQueue::connect(addr, ProcessId(2), Role::ComputeNode).await;

        assert!(result.is_err());
        assert!(server.await.unwrap().is_none());
    }
}
