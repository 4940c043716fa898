//! Response payloads (wire tags 200..299). Every response echoes the
//! `request_id` of the request it answers plus a `CLError` status
//! (spec.md §3 invariant 1, §4.2).

use crate::byte_buffer::{BufferResult, ByteBuffer};
use crate::messages::common::{pack_object_id, unpack_object_id, Blob, DeviceId};
use dcl_core::{CLError, ObjectId};

fn pack_status(buf: &mut ByteBuffer, status: CLError) {
    buf.write_i32(status.0);
}

fn unpack_status(buf: &mut ByteBuffer) -> BufferResult<CLError> {
    Ok(CLError(buf.read_i32()?))
}

/// The common case: a request either succeeds with no payload of its own
/// or fails with a status code. Used for every request that doesn't carry
/// extra response data (deletes, builds, enqueues without info queries).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusResponse {
    pub request_id: u32,
    pub status: CLError,
}

impl StatusResponse {
    pub fn pack(&self, buf: &mut ByteBuffer) {
        buf.write_u32(self.request_id);
        pack_status(buf, self.status);
    }
    pub fn unpack(buf: &mut ByteBuffer) -> BufferResult<Self> {
        Ok(StatusResponse { request_id: buf.read_u32()?, status: unpack_status(buf)? })
    }
}

/// Answers `GetDeviceIDs`.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceIdsResponse {
    pub request_id: u32,
    pub status: CLError,
    pub devices: Vec<DeviceId>,
}

impl DeviceIdsResponse {
    pub fn pack(&self, buf: &mut ByteBuffer) {
        buf.write_u32(self.request_id);
        pack_status(buf, self.status);
        buf.write_sequence(&self.devices, |b, d| {
            b.write_u64(*d);
        });
    }
    pub fn unpack(buf: &mut ByteBuffer) -> BufferResult<Self> {
        Ok(DeviceIdsResponse {
            request_id: buf.read_u32()?,
            status: unpack_status(buf)?,
            devices: buf.read_sequence(|b| b.read_u64())?,
        })
    }
}

/// Answers any `Get*Info` request: a single serialized value (spec.md §3
/// "Binary blob"). Used for `GetDeviceInfo`, `GetKernelInfo`,
/// `GetKernelWorkGroupInfo`.
#[derive(Debug, Clone, PartialEq)]
pub struct InfoResponse {
    pub request_id: u32,
    pub status: CLError,
    pub value: Blob,
}

impl InfoResponse {
    pub fn pack(&self, buf: &mut ByteBuffer) {
        buf.write_u32(self.request_id);
        pack_status(buf, self.status);
        self.value.pack(buf);
    }
    pub fn unpack(buf: &mut ByteBuffer) -> BufferResult<Self> {
        Ok(InfoResponse {
            request_id: buf.read_u32()?,
            status: unpack_status(buf)?,
            value: Blob::unpack(buf)?,
        })
    }
}

/// Answers `GetProgramBuildLog`.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildLogResponse {
    pub request_id: u32,
    pub status: CLError,
    pub log: String,
}

impl BuildLogResponse {
    pub fn pack(&self, buf: &mut ByteBuffer) {
        buf.write_u32(self.request_id);
        pack_status(buf, self.status);
        buf.write_string(&self.log);
    }
    pub fn unpack(buf: &mut ByteBuffer) -> BufferResult<Self> {
        Ok(BuildLogResponse {
            request_id: buf.read_u32()?,
            status: unpack_status(buf)?,
            log: buf.read_string()?,
        })
    }
}

/// Per-event `(queued, submit, start, end)` profiling nanosecond counters,
/// answering `GetEventProfilingInfos` (spec.md §4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventProfilingEntry {
    pub event_id: ObjectId,
    pub status: CLError,
    pub queued_ns: u64,
    pub submit_ns: u64,
    pub start_ns: u64,
    pub end_ns: u64,
}

impl EventProfilingEntry {
    fn pack(&self, buf: &mut ByteBuffer) {
        pack_object_id(buf, self.event_id);
        pack_status(buf, self.status);
        buf.write_u64(self.queued_ns)
            .write_u64(self.submit_ns)
            .write_u64(self.start_ns)
            .write_u64(self.end_ns);
    }
    fn unpack(buf: &mut ByteBuffer) -> BufferResult<Self> {
        Ok(EventProfilingEntry {
            event_id: unpack_object_id(buf)?,
            status: unpack_status(buf)?,
            queued_ns: buf.read_u64()?,
            submit_ns: buf.read_u64()?,
            start_ns: buf.read_u64()?,
            end_ns: buf.read_u64()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventProfilingResponse {
    pub request_id: u32,
    pub entries: Vec<EventProfilingEntry>,
}

impl EventProfilingResponse {
    pub fn pack(&self, buf: &mut ByteBuffer) {
        buf.write_u32(self.request_id);
        buf.write_sequence(&self.entries, |b, e| e.pack(b));
    }
    pub fn unpack(buf: &mut ByteBuffer) -> BufferResult<Self> {
        Ok(EventProfilingResponse {
            request_id: buf.read_u32()?,
            entries: buf.read_sequence(EventProfilingEntry::unpack)?,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn status_response_round_trips_an_error_code() {
        let resp = StatusResponse { request_id: 3, status: CLError::INVALID_MEM_OBJECT };
        let mut buf = ByteBuffer::new();
        resp.pack(&mut buf);
        assert_eq!(StatusResponse::unpack(&mut buf).unwrap(), resp);
    }

    #[test]
    fn device_ids_response_round_trips_an_empty_list() {
        let resp = DeviceIdsResponse { request_id: 1, status: CLError::SUCCESS, devices: vec![] };
        let mut buf = ByteBuffer::new();
        resp.pack(&mut buf);
        assert_eq!(DeviceIdsResponse::unpack(&mut buf).unwrap(), resp);
    }

    #[test]
    fn event_profiling_response_round_trips_multiple_entries() {
        let resp = EventProfilingResponse {
            request_id: 1,
            entries: vec![
                EventProfilingEntry {
                    event_id: ObjectId(1),
                    status: CLError::SUCCESS,
                    queued_ns: 1,
                    submit_ns: 2,
                    start_ns: 3,
                    end_ns: 4,
                },
                EventProfilingEntry {
                    event_id: ObjectId(2),
                    status: CLError::INVALID_EVENT,
                    queued_ns: 0,
                    submit_ns: 0,
                    start_ns: 0,
                    end_ns: 0,
                },
            ],
        };
        let mut buf = ByteBuffer::new();
        resp.pack(&mut buf);
        assert_eq!(EventProfilingResponse::unpack(&mut buf).unwrap(), resp);
    }
}
