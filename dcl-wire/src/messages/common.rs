//! Payload fragments shared by more than one message (spec.md §3 data model).

use crate::byte_buffer::{BufferResult, ByteBuffer};
use dcl_core::ObjectId;

/// Native device handle as reported by the daemon's driver. Opaque to the
/// host; devices are owned by the daemon, not named through the per-host
/// object id namespace (spec.md §4.9).
pub type DeviceId = u64;

/// `(size, bytes)` — spec.md §3 "Binary blob". Used for kernel scalar
/// arguments and serialized info values.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Blob(pub Vec<u8>);

impl Blob {
    pub fn pack(&self, buf: &mut ByteBuffer) {
        buf.write_blob(&self.0);
    }

    pub fn unpack(buf: &mut ByteBuffer) -> BufferResult<Self> {
        Ok(Blob(buf.read_blob()?))
    }
}

/// A reference to an existing `cl_event`/command, by object id. The wire
/// form is just the 32-bit id; `ObjectId::NONE` means "no event".
pub fn pack_object_id(buf: &mut ByteBuffer, id: ObjectId) {
    buf.write_u32(id.0);
}

pub fn unpack_object_id(buf: &mut ByteBuffer) -> BufferResult<ObjectId> {
    Ok(ObjectId(buf.read_u32()?))
}

pub fn pack_wait_list(buf: &mut ByteBuffer, wait_list: &[ObjectId]) {
    buf.write_sequence(wait_list, |b, id| pack_object_id(b, *id));
}

pub fn unpack_wait_list(buf: &mut ByteBuffer) -> BufferResult<Vec<ObjectId>> {
    buf.read_sequence(unpack_object_id)
}

/// Every enqueue request carries an optional `command_id` (so later status
/// notifications can be correlated, spec.md §4.11) and a flag for whether
/// the caller wants an event object created and bound under that id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandOptions {
    pub command_id: ObjectId,
    pub want_event: bool,
}

impl CommandOptions {
    pub fn pack(&self, buf: &mut ByteBuffer) {
        pack_object_id(buf, self.command_id);
        buf.write_bool(self.want_event);
    }

    pub fn unpack(buf: &mut ByteBuffer) -> BufferResult<Self> {
        Ok(CommandOptions { command_id: unpack_object_id(buf)?, want_event: buf.read_bool()? })
    }
}
