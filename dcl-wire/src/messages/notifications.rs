//! Notifications (wire tags >= 600): unsolicited, unacknowledged messages
//! with no `request_id`, sent in both directions (spec.md §4.2, §4.12).

use crate::byte_buffer::{BufferResult, ByteBuffer};
use crate::messages::common::{pack_object_id, unpack_object_id, Blob};
use dcl_core::{CLError, ObjectId};

/// `CL_*_COMPLETE`/`CL_RUNNING`/etc. as sent by the daemon for a command
/// whose `CommandOptions::want_event` was set (spec.md §4.11).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandExecStatus {
    Queued,
    Submitted,
    Running,
    Complete,
    Error,
}

impl CommandExecStatus {
    fn to_wire(self) -> u8 {
        match self {
            CommandExecStatus::Queued => 0,
            CommandExecStatus::Submitted => 1,
            CommandExecStatus::Running => 2,
            CommandExecStatus::Complete => 3,
            CommandExecStatus::Error => 4,
        }
    }

    fn from_wire(value: u8) -> BufferResult<Self> {
        Ok(match value {
            0 => CommandExecStatus::Queued,
            1 => CommandExecStatus::Submitted,
            2 => CommandExecStatus::Running,
            3 => CommandExecStatus::Complete,
            _ => CommandExecStatus::Error,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandExecStatusChanged {
    pub command_id: ObjectId,
    pub status: CommandExecStatus,
    pub error: CLError,
    pub timestamp_ns: u64,
}

impl CommandExecStatusChanged {
    pub fn pack(&self, buf: &mut ByteBuffer) {
        pack_object_id(buf, self.command_id);
        buf.write_u8(self.status.to_wire());
        buf.write_i32(self.error.0);
        buf.write_u64(self.timestamp_ns);
    }
    pub fn unpack(buf: &mut ByteBuffer) -> BufferResult<Self> {
        Ok(CommandExecStatusChanged {
            command_id: unpack_object_id(buf)?,
            status: CommandExecStatus::from_wire(buf.read_u8()?)?,
            error: CLError(buf.read_i32()?),
            timestamp_ns: buf.read_u64()?,
        })
    }
}

/// Build completion for an asynchronous `BuildProgram` (spec.md §4.7).
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramBuildCompleted {
    pub program_id: ObjectId,
    pub status: CLError,
    pub log: String,
}

impl ProgramBuildCompleted {
    pub fn pack(&self, buf: &mut ByteBuffer) {
        pack_object_id(buf, self.program_id);
        buf.write_i32(self.status.0);
        buf.write_string(&self.log);
    }
    pub fn unpack(buf: &mut ByteBuffer) -> BufferResult<Self> {
        Ok(ProgramBuildCompleted {
            program_id: unpack_object_id(buf)?,
            status: CLError(buf.read_i32()?),
            log: buf.read_string()?,
        })
    }
}

/// Host-initiated: tells a remote compute node it may drop its cached
/// copy of a released context (spec.md §4.12, relay-vs-direct open
/// question — see design notes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextReleased {
    pub context_id: ObjectId,
}

impl ContextReleased {
    pub fn pack(&self, buf: &mut ByteBuffer) {
        pack_object_id(buf, self.context_id);
    }
    pub fn unpack(buf: &mut ByteBuffer) -> BufferResult<Self> {
        Ok(ContextReleased { context_id: unpack_object_id(buf)? })
    }
}

/// A node's acquire, addressed by the command id of the last writer
/// rather than the buffer itself (spec.md §4.12: "it acquires by sending
/// `EventSynchronizationMessage(command_id_of_last_writer)`"). Whoever
/// holds that command answers by shipping the buffer's current bytes over
/// the data stream to the sender — no response on the message queue.
/// Because compute nodes cannot dial each other directly, a node short on
/// a foreign peer's data sends this to its own host, which forwards it to
/// the owning node and relays the bytes back (open question recorded in
/// `DESIGN.md`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventSynchronizationMessage {
    pub command_id: ObjectId,
}

impl EventSynchronizationMessage {
    pub fn pack(&self, buf: &mut ByteBuffer) {
        pack_object_id(buf, self.command_id);
    }
    pub fn unpack(buf: &mut ByteBuffer) -> BufferResult<Self> {
        Ok(EventSynchronizationMessage { command_id: unpack_object_id(buf)? })
    }
}

/// A context-scoped driver error surfaced to the host's `ContextListener`
/// (spec.md §4.10). `private_info` is vendor-specific diagnostic data,
/// passed through without being interpreted.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextErrorMessage {
    pub context_id: ObjectId,
    pub info: String,
    pub private_info: Blob,
}

impl ContextErrorMessage {
    pub fn pack(&self, buf: &mut ByteBuffer) {
        pack_object_id(buf, self.context_id);
        buf.write_string(&self.info);
        self.private_info.pack(buf);
    }
    pub fn unpack(buf: &mut ByteBuffer) -> BufferResult<Self> {
        Ok(ContextErrorMessage {
            context_id: unpack_object_id(buf)?,
            info: buf.read_string()?,
            private_info: Blob::unpack(buf)?,
        })
    }
}

/// Sent by either peer on graceful shutdown, before closing the message
/// queue connection (spec.md §4.12).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Goodbye;

impl Goodbye {
    pub fn pack(&self, _buf: &mut ByteBuffer) {}
    pub fn unpack(_buf: &mut ByteBuffer) -> BufferResult<Self> {
        Ok(Goodbye)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn command_exec_status_round_trips() {
        let msg = CommandExecStatusChanged {
            command_id: ObjectId(7),
            status: CommandExecStatus::Running,
            error: CLError::SUCCESS,
            timestamp_ns: 123_456,
        };
        let mut buf = ByteBuffer::new();
        msg.pack(&mut buf);
        assert_eq!(CommandExecStatusChanged::unpack(&mut buf).unwrap(), msg);
    }

    #[test]
    fn goodbye_has_empty_body() {
        let mut buf = ByteBuffer::new();
        Goodbye.pack(&mut buf);
        assert!(buf.is_exhausted());
    }

    #[test]
    fn event_synchronization_message_round_trips_the_command_id() {
        let msg = EventSynchronizationMessage { command_id: ObjectId(42) };
        let mut buf = ByteBuffer::new();
        msg.pack(&mut buf);
        assert_eq!(EventSynchronizationMessage::unpack(&mut buf).unwrap(), msg);
    }

    #[test]
    fn context_error_message_round_trips_info_and_private_info() {
        let msg = ContextErrorMessage {
            context_id: ObjectId(3),
            info: "device lost".to_string(),
            private_info: Blob(vec![1, 2, 3]),
        };
        let mut buf = ByteBuffer::new();
        msg.pack(&mut buf);
        assert_eq!(ContextErrorMessage::unpack(&mut buf).unwrap(), msg);
    }
}
