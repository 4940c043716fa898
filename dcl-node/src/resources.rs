//! The node's own bookkeeping for objects a host has created on it.
//! Buffers, programs and kernels are real (if simulated) state rather than
//! opaque ids, so enqueue operations have something to actually act on.

use std::sync::Mutex;

use dcl_core::{CLError, ObjectId};
use dcl_wire::messages::{CommandExecStatus, DeviceId};

pub struct ContextResource {
    pub id: ObjectId,
    pub devices: Vec<DeviceId>,
}

#[derive(Debug)]
pub struct BufferResource {
    pub id: ObjectId,
    pub context_id: ObjectId,
    pub data: Mutex<Vec<u8>>,
}

impl BufferResource {
    pub fn new(id: ObjectId, context_id: ObjectId, size: u64) -> Self {
        BufferResource { id, context_id, data: Mutex::new(vec![0u8; size as usize]) }
    }

    pub fn size(&self) -> u64 {
        self.data.lock().unwrap().len() as u64
    }

    pub fn read(&self, offset: u64, size: u64) -> Result<Vec<u8>, CLError> {
        let data = self.data.lock().unwrap();
        let start = offset as usize;
        let end = start + size as usize;
        data.get(start..end).map(|s| s.to_vec()).ok_or(CLError::INVALID_VALUE)
    }

    pub fn write(&self, offset: u64, bytes: &[u8]) -> Result<(), CLError> {
        let mut data = self.data.lock().unwrap();
        let start = offset as usize;
        let end = start + bytes.len();
        if end > data.len() {
            return Err(CLError::INVALID_VALUE);
        }
        data[start..end].copy_from_slice(bytes);
        Ok(())
    }

    pub fn copy_from(&self, src: &BufferResource, src_offset: u64, dst_offset: u64, size: u64) -> Result<(), CLError> {
        let bytes = src.read(src_offset, size)?;
        self.write(dst_offset, &bytes)
    }
}

pub struct ProgramResource {
    pub id: ObjectId,
    pub context_id: ObjectId,
    pub source: String,
    pub build_log: Mutex<String>,
    pub built: Mutex<bool>,
}

pub struct KernelResource {
    pub id: ObjectId,
    pub program_id: ObjectId,
    pub name: String,
    pub args: Mutex<Vec<Option<Vec<u8>>>>,
}

impl KernelResource {
    pub fn set_arg(&self, index: u32, value: Vec<u8>) {
        let mut args = self.args.lock().unwrap();
        let index = index as usize;
        if args.len() <= index {
            args.resize(index + 1, None);
        }
        args[index] = Some(value);
    }
}

pub struct CommandQueueResource {
    pub id: ObjectId,
    pub context_id: ObjectId,
    pub device: DeviceId,
    pub out_of_order: bool,
    pub profiling: bool,
}

/// Node-side bookkeeping for a `cl_event`: the status a command runner
/// transitions through plus the four profiling timestamps
/// `GetEventProfilingInfos` answers with (spec.md §4.9).
pub struct EventRecord {
    pub id: ObjectId,
    pub context_id: ObjectId,
    pub status: Mutex<CommandExecStatus>,
    pub error: Mutex<CLError>,
    pub queued_ns: Mutex<u64>,
    pub submit_ns: Mutex<u64>,
    pub start_ns: Mutex<u64>,
    pub end_ns: Mutex<u64>,
}

impl EventRecord {
    pub fn new(id: ObjectId, context_id: ObjectId) -> Self {
        EventRecord {
            id,
            context_id,
            status: Mutex::new(CommandExecStatus::Queued),
            error: Mutex::new(CLError::SUCCESS),
            queued_ns: Mutex::new(0),
            submit_ns: Mutex::new(0),
            start_ns: Mutex::new(0),
            end_ns: Mutex::new(0),
        }
    }

    pub fn advance(&self, status: CommandExecStatus, timestamp_ns: u64) {
        *self.status.lock().unwrap() = status;
        match status {
            CommandExecStatus::Queued => *self.queued_ns.lock().unwrap() = timestamp_ns,
            CommandExecStatus::Submitted => *self.submit_ns.lock().unwrap() = timestamp_ns,
            CommandExecStatus::Running => *self.start_ns.lock().unwrap() = timestamp_ns,
            CommandExecStatus::Complete | CommandExecStatus::Error => {
                *self.end_ns.lock().unwrap() = timestamp_ns
            }
        }
    }

    pub fn fail(&self, error: CLError, timestamp_ns: u64) {
        *self.error.lock().unwrap() = error;
        self.advance(CommandExecStatus::Error, timestamp_ns);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn buffer_write_then_read_round_trips() {
        let buf = BufferResource::new(ObjectId(1), ObjectId(1), 8);
        buf.write(0, &[1, 2, 3, 4]).unwrap();
        assert_eq!(buf.read(0, 4).unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn out_of_range_access_is_invalid_value() {
        let buf = BufferResource::new(ObjectId(1), ObjectId(1), 4);
        assert_eq!(buf.read(0, 8).unwrap_err(), CLError::INVALID_VALUE);
        assert_eq!(buf.write(2, &[1, 2, 3]).unwrap_err(), CLError::INVALID_VALUE);
    }

    #[test]
    fn copy_between_buffers_copies_the_right_bytes() {
        let src = BufferResource::new(ObjectId(1), ObjectId(1), 4);
        src.write(0, &[9, 8, 7, 6]).unwrap();
        let dst = BufferResource::new(ObjectId(2), ObjectId(1), 4);
        dst.copy_from(&src, 1, 0, 2).unwrap();
        assert_eq!(dst.read(0, 2).unwrap(), vec![8, 7]);
    }

    #[test]
    fn event_record_tracks_each_phase_timestamp_separately() {
        let event = EventRecord::new(ObjectId(1), ObjectId(1));
        event.advance(CommandExecStatus::Queued, 10);
        event.advance(CommandExecStatus::Submitted, 20);
        event.advance(CommandExecStatus::Running, 30);
        event.advance(CommandExecStatus::Complete, 40);
        assert_eq!(*event.queued_ns.lock().unwrap(), 10);
        assert_eq!(*event.submit_ns.lock().unwrap(), 20);
        assert_eq!(*event.start_ns.lock().unwrap(), 30);
        assert_eq!(*event.end_ns.lock().unwrap(), 40);
        assert_eq!(*event.status.lock().unwrap(), CommandExecStatus::Complete);
    }

    #[test]
    fn kernel_arg_slots_grow_to_fit_the_highest_index() {
        let kernel = KernelResource {
            id: ObjectId(1),
            program_id: ObjectId(1),
            name: "k".to_string(),
            args: Mutex::new(Vec::new()),
        };
        kernel.set_arg(2, vec![1]);
        assert_eq!(kernel.args.lock().unwrap().len(), 3);
        assert!(kernel.args.lock().unwrap()[0].is_none());
        assert_eq!(kernel.args.lock().unwrap()[2], Some(vec![1]));
    }
}
