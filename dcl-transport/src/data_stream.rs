//! C4: the bulk-data sibling of `MessageQueue` (spec.md §6.2 "dual
//! channel"). One TCP connection, length-prefixed raw transfers, one
//! logical FIFO per direction enforced by serializing each half behind
//! its own lock so concurrent callers queue rather than interleave.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use byteorder::{BigEndian, ByteOrder};
use dcl_core::ProcessId;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Mutex};

use crate::error::{TransportError, TransportResult};
use crate::handshake::{self, Role};

type TransferResult = TransportResult<Vec<u8>>;

/// A handle to one in-flight (or already-finished) read/write transfer.
/// Mirrors the teacher's future-returning I/O calls, generalized to also
/// support polling and a best-effort `abort`.
#[derive(Clone)]
pub struct DataTransferHandle {
    outcome: watch::Receiver<Option<Arc<TransferResult>>>,
    abort_flag: Arc<AtomicBool>,
}

impl DataTransferHandle {
    pub async fn wait(&self) -> TransferResult {
        let mut rx = self.outcome.clone();
        loop {
            if let Some(result) = rx.borrow().as_ref() {
                return clone_result(result);
            }
            if rx.changed().await.is_err() {
                return Err(TransportError::Connection("data stream closed".into()));
            }
        }
    }

    pub fn is_complete(&self) -> bool {
        self.outcome.borrow().is_some()
    }

    /// Requests cancellation. Only effective if the transfer hasn't
    /// started its actual socket I/O yet; once a read/write is in flight
    /// it always runs to completion or failure (no partial-frame aborts).
    pub fn abort(&self) {
        self.abort_flag.store(true, Ordering::SeqCst);
    }

    /// Spawns `callback` to run once the transfer settles. Fire-and-forget,
    /// matching the teacher's pattern of registering a completion action
    /// rather than blocking the caller.
    pub fn set_callback<F>(&self, callback: F)
    where
        F: FnOnce(TransferResult) + Send + 'static,
    {
        let handle = self.clone();
        tokio::spawn(async move {
            callback(handle.wait().await);
        });
    }
}

fn clone_result(result: &TransferResult) -> TransferResult {
    match result {
        Ok(bytes) => Ok(bytes.clone()),
        Err(TransportError::Io(e)) => Err(TransportError::Io(io_error_clone(e))),
        Err(TransportError::Connection(m)) => Err(TransportError::Connection(m.clone())),
        Err(TransportError::Protocol(m)) => Err(TransportError::Protocol(m.clone())),
        Err(TransportError::InvalidObject(id)) => Err(TransportError::InvalidObject(*id)),
        Err(TransportError::Interrupted) => Err(TransportError::Interrupted),
        Err(TransportError::TimedOut) => Err(TransportError::TimedOut),
    }
}

fn io_error_clone(e: &std::io::Error) -> std::io::Error {
    std::io::Error::new(e.kind(), e.to_string())
}

pub struct DataStream {
    peer_pid: ProcessId,
    read_half: Mutex<OwnedReadHalf>,
    write_half: Mutex<OwnedWriteHalf>,
}

impl DataStream {
    pub async fn connect(addr: SocketAddr, pid: ProcessId, role: Role) -> TransportResult<Arc<Self>> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))?;
        Self::from_stream(stream, pid, role).await
    }

    pub async fn from_accepted(stream: TcpStream, pid: ProcessId, role: Role) -> TransportResult<Arc<Self>> {
        Self::from_stream(stream, pid, role).await
    }

    async fn from_stream(stream: TcpStream, pid: ProcessId, role: Role) -> TransportResult<Arc<Self>> {
        stream.set_nodelay(true)?;
        let (mut read_half, mut write_half) = stream.into_split();
        // The data channel's handshake carries no message-queue response
        // variant; it is the same greeting with nothing expected back
        // beyond the peer's own greeting.
        handshake::send_greeting(&mut write_half, pid, role).await?;
        let (peer_pid, _role) = handshake::recv_greeting(&mut read_half).await?;

        Ok(Arc::new(DataStream {
            peer_pid,
            read_half: Mutex::new(read_half),
            write_half: Mutex::new(write_half),
        }))
    }

    pub fn peer_pid(&self) -> ProcessId {
        self.peer_pid
    }

    /// Queues `data` for transfer; serialized against any other writer on
    /// this stream via `write_half`'s lock, so transfers complete in the
    /// order they were submitted.
    pub fn write(self: &Arc<Self>, data: Vec<u8>) -> DataTransferHandle {
        let (tx, rx) = watch::channel(None);
        let abort_flag = Arc::new(AtomicBool::new(false));
        let stream = self.clone();
        let task_abort = abort_flag.clone();

        tokio::spawn(async move {
            let result = if task_abort.load(Ordering::SeqCst) {
                Err(TransportError::Interrupted)
            } else {
                let mut writer = stream.write_half.lock().await;
                write_framed(&mut *writer, &data).await
            };
            let _ = tx.send(Some(Arc::new(result.map(|_| Vec::new()))));
        });

        DataTransferHandle { outcome: rx, abort_flag }
    }

    /// Reads the next `expected_size`-byte frame off the stream.
    pub fn read(self: &Arc<Self>, expected_size: usize) -> DataTransferHandle {
        let (tx, rx) = watch::channel(None);
        let abort_flag = Arc::new(AtomicBool::new(false));
        let stream = self.clone();
        let task_abort = abort_flag.clone();

        tokio::spawn(async move {
            let result = if task_abort.load(Ordering::SeqCst) {
                Err(TransportError::Interrupted)
            } else {
                let mut reader = stream.read_half.lock().await;
                read_framed(&mut *reader, expected_size).await
            };
            let _ = tx.send(Some(Arc::new(result)));
        });

        DataTransferHandle { outcome: rx, abort_flag }
    }
}

async fn write_framed(writer: &mut OwnedWriteHalf, data: &[u8]) -> TransportResult<()> {
    let mut len_buf = [0u8; 8];
    BigEndian::write_u64(&mut len_buf, data.len() as u64);
    writer.write_all(&len_buf).await?;
    writer.write_all(data).await?;
    Ok(())
}

async fn read_framed(reader: &mut OwnedReadHalf, expected_size: usize) -> TransferResult {
    let mut len_buf = [0u8; 8];
    reader.read_exact(&mut len_buf).await?;
    let declared = BigEndian::read_u64(&len_buf) as usize;
    if declared != expected_size {
        return Err(TransportError::Protocol(format!(
            "data frame size mismatch: declared {}, expected {}",
            declared, expected_size
        )));
    }
    let mut data = vec![0u8; declared];
    reader.read_exact(&mut data).await?;
    Ok(data)
}

/// Accepts inbound data-plane connections (C6, the bulk-transfer half of
/// the dual accept-loop pattern).
pub struct DataDispatcher {
    listener: TcpListener,
    pid: ProcessId,
    role: Role,
}

impl DataDispatcher {
    pub async fn bind(addr: SocketAddr, pid: ProcessId, role: Role) -> TransportResult<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(DataDispatcher { listener, pid, role })
    }

    pub fn local_addr(&self) -> TransportResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub async fn accept(&self) -> TransportResult<Arc<DataStream>> {
        let (stream, _peer_addr) = self.listener.accept().await?;
        DataStream::from_accepted(stream, self.pid, self.role).await
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn write_then_read_round_trips_a_payload() {
        let dispatcher =
            DataDispatcher::bind("127.0.0.1:0".parse().unwrap(), ProcessId(1), Role::Host)
                .await
                .unwrap();
        let addr = dispatcher.local_addr().unwrap();

        let server = tokio::spawn(async move { dispatcher.accept().await.unwrap() });
        let client = DataStream::connect(addr, ProcessId(2), Role::ComputeNode).await.unwrap();
        let server_stream = server.await.unwrap();

        let payload = vec![1u8, 2, 3, 4, 5];
        let write_handle = client.write(payload.clone());
        let read_handle = server_stream.read(payload.len());

        write_handle.wait().await.unwrap();
        let received = read_handle.wait().await.unwrap();
        assert_eq!(received, payload);
    }

    #[tokio::test]
    async fn mismatched_declared_size_is_a_protocol_error() {
        let dispatcher =
            DataDispatcher::bind("127.0.0.1:0".parse().unwrap(), ProcessId(1), Role::Host)
                .await
                .unwrap();
        let addr = dispatcher.local_addr().unwrap();

        let server = tokio::spawn(async move { dispatcher.accept().await.unwrap() });
        let client = DataStream::connect(addr, ProcessId(2), Role::ComputeNode).await.unwrap();
        let server_stream = server.await.unwrap();

        let write_handle = client.write(vec![0u8; 4]);
        let read_handle = server_stream.read(8);

        write_handle.wait().await.unwrap();
        assert!(matches!(read_handle.wait().await, Err(TransportError::Protocol(_))));
    }
}
