//! The message catalogue: every request/response/notification payload
//! this runtime exchanges, closed under one `Message` enum, tagged by the
//! 32-bit `type_tag` carried in the frame header (spec.md §4.2, §9 "static
//! dispatch table for messages").

pub mod common;
pub mod notifications;
pub mod requests;
pub mod responses;

use crate::byte_buffer::{BufferError, BufferResult, ByteBuffer};

pub use common::{Blob, CommandOptions, DeviceId};
pub use notifications::{
    CommandExecStatus, CommandExecStatusChanged, ContextErrorMessage, ContextReleased,
    EventSynchronizationMessage, Goodbye, ProgramBuildCompleted,
};
pub use requests::*;
pub use responses::{
    BuildLogResponse, DeviceIdsResponse, EventProfilingEntry, EventProfilingResponse,
    InfoResponse, StatusResponse,
};

/// Wire type tags. Requests occupy 100..199, responses 200..299,
/// notifications start at 600 (spec.md §4.2).
pub mod tag {
    pub const GET_DEVICE_IDS: u32 = 100;
    pub const GET_DEVICE_INFO: u32 = 101;
    pub const CREATE_CONTEXT: u32 = 102;
    pub const DELETE_CONTEXT: u32 = 103;
    pub const CREATE_COMMAND_QUEUE: u32 = 104;
    pub const DELETE_COMMAND_QUEUE: u32 = 105;
    pub const CREATE_BUFFER: u32 = 106;
    pub const DELETE_MEMORY: u32 = 107;
    pub const CREATE_PROGRAM_WITH_SOURCE: u32 = 108;
    pub const CREATE_PROGRAM_WITH_BINARY: u32 = 109;
    pub const DELETE_PROGRAM: u32 = 110;
    pub const BUILD_PROGRAM: u32 = 111;
    pub const GET_PROGRAM_BUILD_LOG: u32 = 112;
    pub const CREATE_KERNEL: u32 = 113;
    pub const CREATE_KERNELS_IN_PROGRAM: u32 = 114;
    pub const DELETE_KERNEL: u32 = 115;
    pub const SET_KERNEL_ARG: u32 = 116;
    pub const SET_KERNEL_ARG_BINARY: u32 = 117;
    pub const SET_KERNEL_ARG_MEM_OBJECT: u32 = 118;
    pub const GET_KERNEL_INFO: u32 = 119;
    pub const GET_KERNEL_WORK_GROUP_INFO: u32 = 120;
    pub const CREATE_EVENT: u32 = 121;
    pub const DELETE_EVENT: u32 = 122;
    pub const GET_EVENT_PROFILING_INFOS: u32 = 123;
    pub const ENQUEUE_READ_BUFFER: u32 = 124;
    pub const ENQUEUE_WRITE_BUFFER: u32 = 125;
    pub const ENQUEUE_COPY_BUFFER: u32 = 126;
    pub const ENQUEUE_MAP_BUFFER: u32 = 127;
    pub const ENQUEUE_UNMAP_BUFFER: u32 = 128;
    pub const ENQUEUE_ND_RANGE_KERNEL: u32 = 129;
    pub const ENQUEUE_MARKER: u32 = 130;
    pub const ENQUEUE_BARRIER: u32 = 131;
    pub const ENQUEUE_WAIT_FOR_EVENTS: u32 = 132;
    pub const ENQUEUE_BROADCAST_BUFFER: u32 = 133;
    pub const ENQUEUE_REDUCE_BUFFER: u32 = 134;
    pub const FINISH: u32 = 135;
    pub const FLUSH: u32 = 136;
    pub const RELEASE: u32 = 137;

    pub const STATUS_RESPONSE: u32 = 200;
    pub const DEVICE_IDS_RESPONSE: u32 = 201;
    pub const INFO_RESPONSE: u32 = 202;
    pub const BUILD_LOG_RESPONSE: u32 = 203;
    pub const EVENT_PROFILING_RESPONSE: u32 = 204;

    pub const COMMAND_EXEC_STATUS_CHANGED: u32 = 600;
    pub const PROGRAM_BUILD_COMPLETED: u32 = 601;
    pub const CONTEXT_RELEASED: u32 = 602;
    pub const GOODBYE: u32 = 603;
    pub const EVENT_SYNCHRONIZATION: u32 = 604;
    pub const CONTEXT_ERROR: u32 = 605;
}

macro_rules! message_enum {
    ($($tag:path => $variant:ident($ty:ty)),* $(,)?) => {
        #[derive(Debug, Clone, PartialEq)]
        pub enum Message {
            $($variant($ty)),*
        }

        impl Message {
            pub fn type_tag(&self) -> u32 {
                match self {
                    $(Message::$variant(_) => $tag),*
                }
            }

            pub fn pack_body(&self, buf: &mut ByteBuffer) {
                match self {
                    $(Message::$variant(m) => m.pack(buf)),*
                }
            }

            /// Decode a message body given the type tag already read from
            /// the frame header. Unknown tags are a protocol error, not a
            /// panic (spec.md §7 "Driver errors").
            pub fn unpack_body(type_tag: u32, buf: &mut ByteBuffer) -> BufferResult<Self> {
                match type_tag {
                    $($tag => Ok(Message::$variant(<$ty>::unpack(buf)?)),)*
                    other => Err(BufferError::UnknownTypeTag(other)),
                }
            }
        }
    };
}

message_enum! {
    tag::GET_DEVICE_IDS => GetDeviceIds(GetDeviceIds),
    tag::GET_DEVICE_INFO => GetDeviceInfo(GetDeviceInfo),
    tag::CREATE_CONTEXT => CreateContext(CreateContext),
    tag::DELETE_CONTEXT => DeleteContext(DeleteContext),
    tag::CREATE_COMMAND_QUEUE => CreateCommandQueue(CreateCommandQueue),
    tag::DELETE_COMMAND_QUEUE => DeleteCommandQueue(DeleteCommandQueue),
    tag::CREATE_BUFFER => CreateBuffer(CreateBuffer),
    tag::DELETE_MEMORY => DeleteMemory(DeleteMemory),
    tag::CREATE_PROGRAM_WITH_SOURCE => CreateProgramWithSource(CreateProgramWithSource),
    tag::CREATE_PROGRAM_WITH_BINARY => CreateProgramWithBinary(CreateProgramWithBinary),
    tag::DELETE_PROGRAM => DeleteProgram(DeleteProgram),
    tag::BUILD_PROGRAM => BuildProgram(BuildProgram),
    tag::GET_PROGRAM_BUILD_LOG => GetProgramBuildLog(GetProgramBuildLog),
    tag::CREATE_KERNEL => CreateKernel(CreateKernel),
    tag::CREATE_KERNELS_IN_PROGRAM => CreateKernelsInProgram(CreateKernelsInProgram),
    tag::DELETE_KERNEL => DeleteKernel(DeleteKernel),
    tag::SET_KERNEL_ARG => SetKernelArg(SetKernelArg),
    tag::SET_KERNEL_ARG_BINARY => SetKernelArgBinary(SetKernelArgBinary),
    tag::SET_KERNEL_ARG_MEM_OBJECT => SetKernelArgMemObject(SetKernelArgMemObject),
    tag::GET_KERNEL_INFO => GetKernelInfo(GetKernelInfo),
    tag::GET_KERNEL_WORK_GROUP_INFO => GetKernelWorkGroupInfo(GetKernelWorkGroupInfo),
    tag::CREATE_EVENT => CreateEvent(CreateEvent),
    tag::DELETE_EVENT => DeleteEvent(DeleteEvent),
    tag::GET_EVENT_PROFILING_INFOS => GetEventProfilingInfos(GetEventProfilingInfos),
    tag::ENQUEUE_READ_BUFFER => EnqueueReadBuffer(EnqueueReadBuffer),
    tag::ENQUEUE_WRITE_BUFFER => EnqueueWriteBuffer(EnqueueWriteBuffer),
    tag::ENQUEUE_COPY_BUFFER => EnqueueCopyBuffer(EnqueueCopyBuffer),
    tag::ENQUEUE_MAP_BUFFER => EnqueueMapBuffer(EnqueueMapBuffer),
    tag::ENQUEUE_UNMAP_BUFFER => EnqueueUnmapBuffer(EnqueueUnmapBuffer),
    tag::ENQUEUE_ND_RANGE_KERNEL => EnqueueNdRangeKernel(EnqueueNdRangeKernel),
    tag::ENQUEUE_MARKER => EnqueueMarker(EnqueueMarker),
    tag::ENQUEUE_BARRIER => EnqueueBarrier(EnqueueBarrier),
    tag::ENQUEUE_WAIT_FOR_EVENTS => EnqueueWaitForEvents(EnqueueWaitForEvents),
    tag::ENQUEUE_BROADCAST_BUFFER => EnqueueBroadcastBuffer(EnqueueBroadcastBuffer),
    tag::ENQUEUE_REDUCE_BUFFER => EnqueueReduceBuffer(EnqueueReduceBuffer),
    tag::FINISH => FinishRequest(FinishRequest),
    tag::FLUSH => FlushRequest(FlushRequest),
    tag::RELEASE => ReleaseRequest(ReleaseRequest),

    tag::STATUS_RESPONSE => StatusResponse(StatusResponse),
    tag::DEVICE_IDS_RESPONSE => DeviceIdsResponse(DeviceIdsResponse),
    tag::INFO_RESPONSE => InfoResponse(InfoResponse),
    tag::BUILD_LOG_RESPONSE => BuildLogResponse(BuildLogResponse),
    tag::EVENT_PROFILING_RESPONSE => EventProfilingResponse(EventProfilingResponse),

    tag::COMMAND_EXEC_STATUS_CHANGED => CommandExecStatusChanged(CommandExecStatusChanged),
    tag::PROGRAM_BUILD_COMPLETED => ProgramBuildCompleted(ProgramBuildCompleted),
    tag::CONTEXT_RELEASED => ContextReleased(ContextReleased),
    tag::GOODBYE => Goodbye(Goodbye),
    tag::EVENT_SYNCHRONIZATION => EventSynchronizationMessage(EventSynchronizationMessage),
    tag::CONTEXT_ERROR => ContextErrorMessage(ContextErrorMessage),
}

impl Message {
    /// Encode this message's body into a fresh buffer, ready to be
    /// wrapped in an `Envelope` by the caller (`crate::envelope`).
    pub fn encode_body(&self) -> ByteBuffer {
        let mut buf = ByteBuffer::new();
        self.pack_body(&mut buf);
        buf
    }

    pub fn is_request(&self) -> bool {
        (100..200).contains(&self.type_tag())
    }

    pub fn is_response(&self) -> bool {
        (200..300).contains(&self.type_tag())
    }

    pub fn is_notification(&self) -> bool {
        self.type_tag() >= 600
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use dcl_core::ObjectId;

    #[test]
    fn unknown_type_tag_is_rejected() {
        let mut buf = ByteBuffer::new();
        assert!(Message::unpack_body(9999, &mut buf).is_err());
    }

    #[test]
    fn finish_request_round_trips_through_the_dispatch_table() {
        let msg = Message::FinishRequest(FinishRequest { request_id: 5, queue_id: ObjectId(3) });
        let mut buf = msg.encode_body();
        let decoded = Message::unpack_body(msg.type_tag(), &mut buf).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn request_response_notification_ranges_are_disjoint() {
        let req = Message::FinishRequest(FinishRequest { request_id: 1, queue_id: ObjectId(1) });
        let resp = Message::StatusResponse(StatusResponse {
            request_id: 1,
            status: dcl_core::CLError::SUCCESS,
        });
        let note = Message::Goodbye(Goodbye);
        assert!(req.is_request() && !req.is_response() && !req.is_notification());
        assert!(resp.is_response() && !resp.is_request());
        assert!(note.is_notification() && !note.is_request() && !note.is_response());
    }
}
