//! The fixed handshake exchanged before either side of a connection will
//! accept message traffic (spec.md §6.2). The exchange is asymmetric: the
//! connecting peer states its process id, role and protocol version, and
//! the accepting peer replies with nothing but its own process id (or 0
//! to refuse the connection) once it has decided whether to keep it.

use byteorder::{BigEndian, ByteOrder};
use dcl_core::ProcessId;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::TransportResult;

pub const PROTOCOL_VERSION: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Host,
    ComputeNode,
}

impl Role {
    fn to_wire(self) -> u8 {
        match self {
            Role::Host => 0,
            Role::ComputeNode => 1,
        }
    }

    fn from_wire(value: u8) -> Option<Self> {
        match value {
            0 => Some(Role::Host),
            1 => Some(Role::ComputeNode),
            _ => None,
        }
    }
}

/// `{u64 pid, u8 role, u8 protocol}`, big-endian, 10 bytes.
const GREETING_LEN: usize = 10;

pub async fn send_greeting<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    pid: ProcessId,
    role: Role,
) -> TransportResult<()> {
    let mut buf = [0u8; GREETING_LEN];
    BigEndian::write_u64(&mut buf[0..8], pid.0);
    buf[8] = role.to_wire();
    buf[9] = PROTOCOL_VERSION;
    writer.write_all(&buf).await?;
    Ok(())
}

pub async fn recv_greeting<R: AsyncReadExt + Unpin>(
    reader: &mut R,
) -> TransportResult<(ProcessId, Role)> {
    let mut buf = [0u8; GREETING_LEN];
    reader.read_exact(&mut buf).await?;
    let pid = ProcessId(BigEndian::read_u64(&buf[0..8]));
    let role = Role::from_wire(buf[8])
        .ok_or_else(|| crate::error::TransportError::Protocol("unknown role byte".into()))?;
    if buf[9] != PROTOCOL_VERSION {
        return Err(crate::error::TransportError::Protocol(format!(
            "unsupported protocol version {}",
            buf[9]
        )));
    }
    Ok((pid, role))
}

/// `{u64 peer_pid}`, big-endian, 8 bytes. Sent only by the accepting side,
/// only after the greeting has been read and the connection approved or
/// refused. A pid of 0 means refused; the initiator must then drop the
/// connection rather than treat it as live.
const REPLY_LEN: usize = 8;

pub async fn send_reply<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    accepted_as: Option<ProcessId>,
) -> TransportResult<()> {
    let mut buf = [0u8; REPLY_LEN];
    BigEndian::write_u64(&mut buf, accepted_as.map(|p| p.0).unwrap_or(0));
    writer.write_all(&buf).await?;
    Ok(())
}

pub async fn recv_reply<R: AsyncReadExt + Unpin>(
    reader: &mut R,
) -> TransportResult<Option<ProcessId>> {
    let mut buf = [0u8; REPLY_LEN];
    reader.read_exact(&mut buf).await?;
    let pid = BigEndian::read_u64(&buf);
    Ok(if pid == 0 { None } else { Some(ProcessId(pid)) })
}
