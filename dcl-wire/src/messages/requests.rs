//! Request payloads (wire tags 100..199). Every request carries a
//! `request_id`, unique per issuer-session, that the matching response
//! echoes back (spec.md §3 invariant 1).

use crate::byte_buffer::{BufferResult, ByteBuffer};
use crate::messages::common::{
    pack_object_id, pack_wait_list, unpack_object_id, unpack_wait_list, Blob, CommandOptions,
    DeviceId,
};
use dcl_core::ObjectId;

macro_rules! request_struct {
    ($name:ident { $($field:ident : $ty:ty),* $(,)? }) => {
        #[derive(Debug, Clone, PartialEq)]
        pub struct $name {
            pub request_id: u32,
            $(pub $field: $ty),*
        }
    };
}

request_struct!(GetDeviceIds { platform_index: u32 });

impl GetDeviceIds {
    pub fn pack(&self, buf: &mut ByteBuffer) {
        buf.write_u32(self.request_id).write_u32(self.platform_index);
    }
    pub fn unpack(buf: &mut ByteBuffer) -> BufferResult<Self> {
        Ok(GetDeviceIds { request_id: buf.read_u32()?, platform_index: buf.read_u32()? })
    }
}

request_struct!(GetDeviceInfo { device: DeviceId, param: u32 });

impl GetDeviceInfo {
    pub fn pack(&self, buf: &mut ByteBuffer) {
        buf.write_u32(self.request_id).write_u64(self.device).write_u32(self.param);
    }
    pub fn unpack(buf: &mut ByteBuffer) -> BufferResult<Self> {
        Ok(GetDeviceInfo {
            request_id: buf.read_u32()?,
            device: buf.read_u64()?,
            param: buf.read_u32()?,
        })
    }
}

request_struct!(CreateContext { context_id: ObjectId, devices: Vec<DeviceId> });

impl CreateContext {
    pub fn pack(&self, buf: &mut ByteBuffer) {
        buf.write_u32(self.request_id);
        pack_object_id(buf, self.context_id);
        buf.write_sequence(&self.devices, |b, d| {
            b.write_u64(*d);
        });
    }
    pub fn unpack(buf: &mut ByteBuffer) -> BufferResult<Self> {
        let request_id = buf.read_u32()?;
        let context_id = unpack_object_id(buf)?;
        let devices = buf.read_sequence(|b| b.read_u64())?;
        Ok(CreateContext { request_id, context_id, devices })
    }
}

request_struct!(DeleteContext { context_id: ObjectId });

impl DeleteContext {
    pub fn pack(&self, buf: &mut ByteBuffer) {
        buf.write_u32(self.request_id);
        pack_object_id(buf, self.context_id);
    }
    pub fn unpack(buf: &mut ByteBuffer) -> BufferResult<Self> {
        Ok(DeleteContext { request_id: buf.read_u32()?, context_id: unpack_object_id(buf)? })
    }
}

request_struct!(CreateCommandQueue {
    queue_id: ObjectId,
    context_id: ObjectId,
    device: DeviceId,
    out_of_order: bool,
    profiling: bool,
});

impl CreateCommandQueue {
    pub fn pack(&self, buf: &mut ByteBuffer) {
        buf.write_u32(self.request_id);
        pack_object_id(buf, self.queue_id);
        pack_object_id(buf, self.context_id);
        buf.write_u64(self.device).write_bool(self.out_of_order).write_bool(self.profiling);
    }
    pub fn unpack(buf: &mut ByteBuffer) -> BufferResult<Self> {
        Ok(CreateCommandQueue {
            request_id: buf.read_u32()?,
            queue_id: unpack_object_id(buf)?,
            context_id: unpack_object_id(buf)?,
            device: buf.read_u64()?,
            out_of_order: buf.read_bool()?,
            profiling: buf.read_bool()?,
        })
    }
}

request_struct!(DeleteCommandQueue { queue_id: ObjectId });

impl DeleteCommandQueue {
    pub fn pack(&self, buf: &mut ByteBuffer) {
        buf.write_u32(self.request_id);
        pack_object_id(buf, self.queue_id);
    }
    pub fn unpack(buf: &mut ByteBuffer) -> BufferResult<Self> {
        Ok(DeleteCommandQueue { request_id: buf.read_u32()?, queue_id: unpack_object_id(buf)? })
    }
}

/// `CL_MEM_*` flag bits this runtime needs to know about: whether initial
/// contents must be pulled over the data stream before responding
/// (spec.md §4.11).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemFlags {
    pub read_only: bool,
    pub write_only: bool,
    pub copy_host_ptr: bool,
    pub use_host_ptr: bool,
}

impl MemFlags {
    pub fn pack(&self, buf: &mut ByteBuffer) {
        let mut bits = 0u8;
        if self.read_only {
            bits |= 1;
        }
        if self.write_only {
            bits |= 2;
        }
        if self.copy_host_ptr {
            bits |= 4;
        }
        if self.use_host_ptr {
            bits |= 8;
        }
        buf.write_u8(bits);
    }
    pub fn unpack(buf: &mut ByteBuffer) -> BufferResult<Self> {
        let bits = buf.read_u8()?;
        Ok(MemFlags {
            read_only: bits & 1 != 0,
            write_only: bits & 2 != 0,
            copy_host_ptr: bits & 4 != 0,
            use_host_ptr: bits & 8 != 0,
        })
    }

    pub fn needs_initial_contents(&self) -> bool {
        self.copy_host_ptr || self.use_host_ptr
    }
}

request_struct!(CreateBuffer {
    buffer_id: ObjectId,
    context_id: ObjectId,
    flags: MemFlags,
    size: u64,
});

impl CreateBuffer {
    pub fn pack(&self, buf: &mut ByteBuffer) {
        buf.write_u32(self.request_id);
        pack_object_id(buf, self.buffer_id);
        pack_object_id(buf, self.context_id);
        self.flags.pack(buf);
        buf.write_u64(self.size);
    }
    pub fn unpack(buf: &mut ByteBuffer) -> BufferResult<Self> {
        Ok(CreateBuffer {
            request_id: buf.read_u32()?,
            buffer_id: unpack_object_id(buf)?,
            context_id: unpack_object_id(buf)?,
            flags: MemFlags::unpack(buf)?,
            size: buf.read_u64()?,
        })
    }
}

request_struct!(DeleteMemory { memory_id: ObjectId });

impl DeleteMemory {
    pub fn pack(&self, buf: &mut ByteBuffer) {
        buf.write_u32(self.request_id);
        pack_object_id(buf, self.memory_id);
    }
    pub fn unpack(buf: &mut ByteBuffer) -> BufferResult<Self> {
        Ok(DeleteMemory { request_id: buf.read_u32()?, memory_id: unpack_object_id(buf)? })
    }
}

request_struct!(CreateProgramWithSource {
    program_id: ObjectId,
    context_id: ObjectId,
    source: String,
});

impl CreateProgramWithSource {
    pub fn pack(&self, buf: &mut ByteBuffer) {
        buf.write_u32(self.request_id);
        pack_object_id(buf, self.program_id);
        pack_object_id(buf, self.context_id);
        buf.write_string(&self.source);
    }
    pub fn unpack(buf: &mut ByteBuffer) -> BufferResult<Self> {
        Ok(CreateProgramWithSource {
            request_id: buf.read_u32()?,
            program_id: unpack_object_id(buf)?,
            context_id: unpack_object_id(buf)?,
            source: buf.read_string()?,
        })
    }
}

request_struct!(CreateProgramWithBinary {
    program_id: ObjectId,
    context_id: ObjectId,
    device: DeviceId,
    binary: Blob,
});

impl CreateProgramWithBinary {
    pub fn pack(&self, buf: &mut ByteBuffer) {
        buf.write_u32(self.request_id);
        pack_object_id(buf, self.program_id);
        pack_object_id(buf, self.context_id);
        buf.write_u64(self.device);
        self.binary.pack(buf);
    }
    pub fn unpack(buf: &mut ByteBuffer) -> BufferResult<Self> {
        Ok(CreateProgramWithBinary {
            request_id: buf.read_u32()?,
            program_id: unpack_object_id(buf)?,
            context_id: unpack_object_id(buf)?,
            device: buf.read_u64()?,
            binary: Blob::unpack(buf)?,
        })
    }
}

request_struct!(DeleteProgram { program_id: ObjectId });

impl DeleteProgram {
    pub fn pack(&self, buf: &mut ByteBuffer) {
        buf.write_u32(self.request_id);
        pack_object_id(buf, self.program_id);
    }
    pub fn unpack(buf: &mut ByteBuffer) -> BufferResult<Self> {
        Ok(DeleteProgram { request_id: buf.read_u32()?, program_id: unpack_object_id(buf)? })
    }
}

request_struct!(BuildProgram {
    program_id: ObjectId,
    devices: Vec<DeviceId>,
    options: String,
});

impl BuildProgram {
    pub fn pack(&self, buf: &mut ByteBuffer) {
        buf.write_u32(self.request_id);
        pack_object_id(buf, self.program_id);
        buf.write_sequence(&self.devices, |b, d| {
            b.write_u64(*d);
        });
        buf.write_string(&self.options);
    }
    pub fn unpack(buf: &mut ByteBuffer) -> BufferResult<Self> {
        let request_id = buf.read_u32()?;
        let program_id = unpack_object_id(buf)?;
        let devices = buf.read_sequence(|b| b.read_u64())?;
        let options = buf.read_string()?;
        Ok(BuildProgram { request_id, program_id, devices, options })
    }
}

request_struct!(GetProgramBuildLog { program_id: ObjectId, device: DeviceId });

impl GetProgramBuildLog {
    pub fn pack(&self, buf: &mut ByteBuffer) {
        buf.write_u32(self.request_id);
        pack_object_id(buf, self.program_id);
        buf.write_u64(self.device);
    }
    pub fn unpack(buf: &mut ByteBuffer) -> BufferResult<Self> {
        Ok(GetProgramBuildLog {
            request_id: buf.read_u32()?,
            program_id: unpack_object_id(buf)?,
            device: buf.read_u64()?,
        })
    }
}

request_struct!(CreateKernel { kernel_id: ObjectId, program_id: ObjectId, name: String });

impl CreateKernel {
    pub fn pack(&self, buf: &mut ByteBuffer) {
        buf.write_u32(self.request_id);
        pack_object_id(buf, self.kernel_id);
        pack_object_id(buf, self.program_id);
        buf.write_string(&self.name);
    }
    pub fn unpack(buf: &mut ByteBuffer) -> BufferResult<Self> {
        Ok(CreateKernel {
            request_id: buf.read_u32()?,
            kernel_id: unpack_object_id(buf)?,
            program_id: unpack_object_id(buf)?,
            name: buf.read_string()?,
        })
    }
}

request_struct!(CreateKernelsInProgram {
    program_id: ObjectId,
    kernel_ids: Vec<ObjectId>,
});

impl CreateKernelsInProgram {
    pub fn pack(&self, buf: &mut ByteBuffer) {
        buf.write_u32(self.request_id);
        pack_object_id(buf, self.program_id);
        pack_wait_list(buf, &self.kernel_ids);
    }
    pub fn unpack(buf: &mut ByteBuffer) -> BufferResult<Self> {
        Ok(CreateKernelsInProgram {
            request_id: buf.read_u32()?,
            program_id: unpack_object_id(buf)?,
            kernel_ids: unpack_wait_list(buf)?,
        })
    }
}

request_struct!(DeleteKernel { kernel_id: ObjectId });

impl DeleteKernel {
    pub fn pack(&self, buf: &mut ByteBuffer) {
        buf.write_u32(self.request_id);
        pack_object_id(buf, self.kernel_id);
    }
    pub fn unpack(buf: &mut ByteBuffer) -> BufferResult<Self> {
        Ok(DeleteKernel { request_id: buf.read_u32()?, kernel_id: unpack_object_id(buf)? })
    }
}

request_struct!(SetKernelArg { kernel_id: ObjectId, index: u32, value: Blob });

impl SetKernelArg {
    pub fn pack(&self, buf: &mut ByteBuffer) {
        buf.write_u32(self.request_id);
        pack_object_id(buf, self.kernel_id);
        buf.write_u32(self.index);
        self.value.pack(buf);
    }
    pub fn unpack(buf: &mut ByteBuffer) -> BufferResult<Self> {
        Ok(SetKernelArg {
            request_id: buf.read_u32()?,
            kernel_id: unpack_object_id(buf)?,
            index: buf.read_u32()?,
            value: Blob::unpack(buf)?,
        })
    }
}

request_struct!(SetKernelArgBinary { kernel_id: ObjectId, index: u32, value: Blob });

impl SetKernelArgBinary {
    pub fn pack(&self, buf: &mut ByteBuffer) {
        buf.write_u32(self.request_id);
        pack_object_id(buf, self.kernel_id);
        buf.write_u32(self.index);
        self.value.pack(buf);
    }
    pub fn unpack(buf: &mut ByteBuffer) -> BufferResult<Self> {
        Ok(SetKernelArgBinary {
            request_id: buf.read_u32()?,
            kernel_id: unpack_object_id(buf)?,
            index: buf.read_u32()?,
            value: Blob::unpack(buf)?,
        })
    }
}

/// `memory_id == ObjectId::NONE` means "local-memory scratch of `size`
/// bytes" (spec.md §4.11).
request_struct!(SetKernelArgMemObject {
    kernel_id: ObjectId,
    index: u32,
    memory_id: ObjectId,
    size: u64,
});

impl SetKernelArgMemObject {
    pub fn pack(&self, buf: &mut ByteBuffer) {
        buf.write_u32(self.request_id);
        pack_object_id(buf, self.kernel_id);
        buf.write_u32(self.index);
        pack_object_id(buf, self.memory_id);
        buf.write_u64(self.size);
    }
    pub fn unpack(buf: &mut ByteBuffer) -> BufferResult<Self> {
        Ok(SetKernelArgMemObject {
            request_id: buf.read_u32()?,
            kernel_id: unpack_object_id(buf)?,
            index: buf.read_u32()?,
            memory_id: unpack_object_id(buf)?,
            size: buf.read_u64()?,
        })
    }
}

request_struct!(GetKernelInfo { kernel_id: ObjectId, param: u32 });

impl GetKernelInfo {
    pub fn pack(&self, buf: &mut ByteBuffer) {
        buf.write_u32(self.request_id);
        pack_object_id(buf, self.kernel_id);
        buf.write_u32(self.param);
    }
    pub fn unpack(buf: &mut ByteBuffer) -> BufferResult<Self> {
        Ok(GetKernelInfo {
            request_id: buf.read_u32()?,
            kernel_id: unpack_object_id(buf)?,
            param: buf.read_u32()?,
        })
    }
}

request_struct!(GetKernelWorkGroupInfo { kernel_id: ObjectId, device: DeviceId, param: u32 });

impl GetKernelWorkGroupInfo {
    pub fn pack(&self, buf: &mut ByteBuffer) {
        buf.write_u32(self.request_id);
        pack_object_id(buf, self.kernel_id);
        buf.write_u64(self.device);
        buf.write_u32(self.param);
    }
    pub fn unpack(buf: &mut ByteBuffer) -> BufferResult<Self> {
        Ok(GetKernelWorkGroupInfo {
            request_id: buf.read_u32()?,
            kernel_id: unpack_object_id(buf)?,
            device: buf.read_u64()?,
            param: buf.read_u32()?,
        })
    }
}

request_struct!(CreateEvent { event_id: ObjectId, context_id: ObjectId });

impl CreateEvent {
    pub fn pack(&self, buf: &mut ByteBuffer) {
        buf.write_u32(self.request_id);
        pack_object_id(buf, self.event_id);
        pack_object_id(buf, self.context_id);
    }
    pub fn unpack(buf: &mut ByteBuffer) -> BufferResult<Self> {
        Ok(CreateEvent {
            request_id: buf.read_u32()?,
            event_id: unpack_object_id(buf)?,
            context_id: unpack_object_id(buf)?,
        })
    }
}

request_struct!(DeleteEvent { event_id: ObjectId });

impl DeleteEvent {
    pub fn pack(&self, buf: &mut ByteBuffer) {
        buf.write_u32(self.request_id);
        pack_object_id(buf, self.event_id);
    }
    pub fn unpack(buf: &mut ByteBuffer) -> BufferResult<Self> {
        Ok(DeleteEvent { request_id: buf.read_u32()?, event_id: unpack_object_id(buf)? })
    }
}

request_struct!(GetEventProfilingInfos { event_ids: Vec<ObjectId> });

impl GetEventProfilingInfos {
    pub fn pack(&self, buf: &mut ByteBuffer) {
        buf.write_u32(self.request_id);
        pack_wait_list(buf, &self.event_ids);
    }
    pub fn unpack(buf: &mut ByteBuffer) -> BufferResult<Self> {
        Ok(GetEventProfilingInfos {
            request_id: buf.read_u32()?,
            event_ids: unpack_wait_list(buf)?,
        })
    }
}

request_struct!(EnqueueReadBuffer {
    queue_id: ObjectId,
    buffer_id: ObjectId,
    blocking: bool,
    offset: u64,
    size: u64,
    wait_list: Vec<ObjectId>,
    options: CommandOptions,
});

impl EnqueueReadBuffer {
    pub fn pack(&self, buf: &mut ByteBuffer) {
        buf.write_u32(self.request_id);
        pack_object_id(buf, self.queue_id);
        pack_object_id(buf, self.buffer_id);
        buf.write_bool(self.blocking).write_u64(self.offset).write_u64(self.size);
        pack_wait_list(buf, &self.wait_list);
        self.options.pack(buf);
    }
    pub fn unpack(buf: &mut ByteBuffer) -> BufferResult<Self> {
        Ok(EnqueueReadBuffer {
            request_id: buf.read_u32()?,
            queue_id: unpack_object_id(buf)?,
            buffer_id: unpack_object_id(buf)?,
            blocking: buf.read_bool()?,
            offset: buf.read_u64()?,
            size: buf.read_u64()?,
            wait_list: unpack_wait_list(buf)?,
            options: CommandOptions::unpack(buf)?,
        })
    }
}

request_struct!(EnqueueWriteBuffer {
    queue_id: ObjectId,
    buffer_id: ObjectId,
    blocking: bool,
    offset: u64,
    size: u64,
    wait_list: Vec<ObjectId>,
    options: CommandOptions,
});

impl EnqueueWriteBuffer {
    pub fn pack(&self, buf: &mut ByteBuffer) {
        buf.write_u32(self.request_id);
        pack_object_id(buf, self.queue_id);
        pack_object_id(buf, self.buffer_id);
        buf.write_bool(self.blocking).write_u64(self.offset).write_u64(self.size);
        pack_wait_list(buf, &self.wait_list);
        self.options.pack(buf);
    }
    pub fn unpack(buf: &mut ByteBuffer) -> BufferResult<Self> {
        Ok(EnqueueWriteBuffer {
            request_id: buf.read_u32()?,
            queue_id: unpack_object_id(buf)?,
            buffer_id: unpack_object_id(buf)?,
            blocking: buf.read_bool()?,
            offset: buf.read_u64()?,
            size: buf.read_u64()?,
            wait_list: unpack_wait_list(buf)?,
            options: CommandOptions::unpack(buf)?,
        })
    }
}

request_struct!(EnqueueCopyBuffer {
    queue_id: ObjectId,
    src_buffer_id: ObjectId,
    dst_buffer_id: ObjectId,
    src_offset: u64,
    dst_offset: u64,
    size: u64,
    wait_list: Vec<ObjectId>,
    options: CommandOptions,
});

impl EnqueueCopyBuffer {
    pub fn pack(&self, buf: &mut ByteBuffer) {
        buf.write_u32(self.request_id);
        pack_object_id(buf, self.queue_id);
        pack_object_id(buf, self.src_buffer_id);
        pack_object_id(buf, self.dst_buffer_id);
        buf.write_u64(self.src_offset).write_u64(self.dst_offset).write_u64(self.size);
        pack_wait_list(buf, &self.wait_list);
        self.options.pack(buf);
    }
    pub fn unpack(buf: &mut ByteBuffer) -> BufferResult<Self> {
        Ok(EnqueueCopyBuffer {
            request_id: buf.read_u32()?,
            queue_id: unpack_object_id(buf)?,
            src_buffer_id: unpack_object_id(buf)?,
            dst_buffer_id: unpack_object_id(buf)?,
            src_offset: buf.read_u64()?,
            dst_offset: buf.read_u64()?,
            size: buf.read_u64()?,
            wait_list: unpack_wait_list(buf)?,
            options: CommandOptions::unpack(buf)?,
        })
    }
}

request_struct!(EnqueueMapBuffer {
    queue_id: ObjectId,
    buffer_id: ObjectId,
    blocking: bool,
    write: bool,
    offset: u64,
    size: u64,
    wait_list: Vec<ObjectId>,
    options: CommandOptions,
});

impl EnqueueMapBuffer {
    pub fn pack(&self, buf: &mut ByteBuffer) {
        buf.write_u32(self.request_id);
        pack_object_id(buf, self.queue_id);
        pack_object_id(buf, self.buffer_id);
        buf.write_bool(self.blocking).write_bool(self.write).write_u64(self.offset).write_u64(self.size);
        pack_wait_list(buf, &self.wait_list);
        self.options.pack(buf);
    }
    pub fn unpack(buf: &mut ByteBuffer) -> BufferResult<Self> {
        Ok(EnqueueMapBuffer {
            request_id: buf.read_u32()?,
            queue_id: unpack_object_id(buf)?,
            buffer_id: unpack_object_id(buf)?,
            blocking: buf.read_bool()?,
            write: buf.read_bool()?,
            offset: buf.read_u64()?,
            size: buf.read_u64()?,
            wait_list: unpack_wait_list(buf)?,
            options: CommandOptions::unpack(buf)?,
        })
    }
}

request_struct!(EnqueueUnmapBuffer {
    queue_id: ObjectId,
    buffer_id: ObjectId,
    wait_list: Vec<ObjectId>,
    options: CommandOptions,
});

impl EnqueueUnmapBuffer {
    pub fn pack(&self, buf: &mut ByteBuffer) {
        buf.write_u32(self.request_id);
        pack_object_id(buf, self.queue_id);
        pack_object_id(buf, self.buffer_id);
        pack_wait_list(buf, &self.wait_list);
        self.options.pack(buf);
    }
    pub fn unpack(buf: &mut ByteBuffer) -> BufferResult<Self> {
        Ok(EnqueueUnmapBuffer {
            request_id: buf.read_u32()?,
            queue_id: unpack_object_id(buf)?,
            buffer_id: unpack_object_id(buf)?,
            wait_list: unpack_wait_list(buf)?,
            options: CommandOptions::unpack(buf)?,
        })
    }
}

request_struct!(EnqueueNdRangeKernel {
    queue_id: ObjectId,
    kernel_id: ObjectId,
    global_work_offset: Vec<u64>,
    global_work_size: Vec<u64>,
    local_work_size: Vec<u64>,
    wait_list: Vec<ObjectId>,
    options: CommandOptions,
});

impl EnqueueNdRangeKernel {
    fn pack_dims(buf: &mut ByteBuffer, dims: &[u64]) {
        buf.write_sequence(dims, |b, d| {
            b.write_u64(*d);
        });
    }
    fn unpack_dims(buf: &mut ByteBuffer) -> BufferResult<Vec<u64>> {
        buf.read_sequence(|b| b.read_u64())
    }

    pub fn pack(&self, buf: &mut ByteBuffer) {
        buf.write_u32(self.request_id);
        pack_object_id(buf, self.queue_id);
        pack_object_id(buf, self.kernel_id);
        Self::pack_dims(buf, &self.global_work_offset);
        Self::pack_dims(buf, &self.global_work_size);
        Self::pack_dims(buf, &self.local_work_size);
        pack_wait_list(buf, &self.wait_list);
        self.options.pack(buf);
    }
    pub fn unpack(buf: &mut ByteBuffer) -> BufferResult<Self> {
        Ok(EnqueueNdRangeKernel {
            request_id: buf.read_u32()?,
            queue_id: unpack_object_id(buf)?,
            kernel_id: unpack_object_id(buf)?,
            global_work_offset: Self::unpack_dims(buf)?,
            global_work_size: Self::unpack_dims(buf)?,
            local_work_size: Self::unpack_dims(buf)?,
            wait_list: unpack_wait_list(buf)?,
            options: CommandOptions::unpack(buf)?,
        })
    }
}

request_struct!(EnqueueMarker {
    queue_id: ObjectId,
    wait_list: Vec<ObjectId>,
    options: CommandOptions,
});

impl EnqueueMarker {
    pub fn pack(&self, buf: &mut ByteBuffer) {
        buf.write_u32(self.request_id);
        pack_object_id(buf, self.queue_id);
        pack_wait_list(buf, &self.wait_list);
        self.options.pack(buf);
    }
    pub fn unpack(buf: &mut ByteBuffer) -> BufferResult<Self> {
        Ok(EnqueueMarker {
            request_id: buf.read_u32()?,
            queue_id: unpack_object_id(buf)?,
            wait_list: unpack_wait_list(buf)?,
            options: CommandOptions::unpack(buf)?,
        })
    }
}

request_struct!(EnqueueBarrier {
    queue_id: ObjectId,
    wait_list: Vec<ObjectId>,
    options: CommandOptions,
});

impl EnqueueBarrier {
    pub fn pack(&self, buf: &mut ByteBuffer) {
        buf.write_u32(self.request_id);
        pack_object_id(buf, self.queue_id);
        pack_wait_list(buf, &self.wait_list);
        self.options.pack(buf);
    }
    pub fn unpack(buf: &mut ByteBuffer) -> BufferResult<Self> {
        Ok(EnqueueBarrier {
            request_id: buf.read_u32()?,
            queue_id: unpack_object_id(buf)?,
            wait_list: unpack_wait_list(buf)?,
            options: CommandOptions::unpack(buf)?,
        })
    }
}

request_struct!(EnqueueWaitForEvents { queue_id: ObjectId, wait_list: Vec<ObjectId> });

impl EnqueueWaitForEvents {
    pub fn pack(&self, buf: &mut ByteBuffer) {
        buf.write_u32(self.request_id);
        pack_object_id(buf, self.queue_id);
        pack_wait_list(buf, &self.wait_list);
    }
    pub fn unpack(buf: &mut ByteBuffer) -> BufferResult<Self> {
        Ok(EnqueueWaitForEvents {
            request_id: buf.read_u32()?,
            queue_id: unpack_object_id(buf)?,
            wait_list: unpack_wait_list(buf)?,
        })
    }
}

/// One source buffer, N destination buffers each with its own queue and
/// offset, one shared length (spec.md §6.5).
#[derive(Debug, Clone, PartialEq)]
pub struct BroadcastDestination {
    pub queue_id: ObjectId,
    pub buffer_id: ObjectId,
    pub offset: u64,
}

impl BroadcastDestination {
    fn pack(&self, buf: &mut ByteBuffer) {
        pack_object_id(buf, self.queue_id);
        pack_object_id(buf, self.buffer_id);
        buf.write_u64(self.offset);
    }
    fn unpack(buf: &mut ByteBuffer) -> BufferResult<Self> {
        Ok(BroadcastDestination {
            queue_id: unpack_object_id(buf)?,
            buffer_id: unpack_object_id(buf)?,
            offset: buf.read_u64()?,
        })
    }
}

request_struct!(EnqueueBroadcastBuffer {
    src_queue_id: ObjectId,
    src_buffer_id: ObjectId,
    src_offset: u64,
    size: u64,
    destinations: Vec<BroadcastDestination>,
    wait_list: Vec<ObjectId>,
    options: CommandOptions,
});

impl EnqueueBroadcastBuffer {
    pub fn pack(&self, buf: &mut ByteBuffer) {
        buf.write_u32(self.request_id);
        pack_object_id(buf, self.src_queue_id);
        pack_object_id(buf, self.src_buffer_id);
        buf.write_u64(self.src_offset).write_u64(self.size);
        buf.write_sequence(&self.destinations, |b, d| d.pack(b));
        pack_wait_list(buf, &self.wait_list);
        self.options.pack(buf);
    }
    pub fn unpack(buf: &mut ByteBuffer) -> BufferResult<Self> {
        Ok(EnqueueBroadcastBuffer {
            request_id: buf.read_u32()?,
            src_queue_id: unpack_object_id(buf)?,
            src_buffer_id: unpack_object_id(buf)?,
            src_offset: buf.read_u64()?,
            size: buf.read_u64()?,
            destinations: buf.read_sequence(BroadcastDestination::unpack)?,
            wait_list: unpack_wait_list(buf)?,
            options: CommandOptions::unpack(buf)?,
        })
    }
}

/// N source buffers, one destination buffer, a user kernel with two
/// mandatory argument placeholders (spec.md §6.5).
#[derive(Debug, Clone, PartialEq)]
pub struct ReduceSource {
    pub queue_id: ObjectId,
    pub buffer_id: ObjectId,
    pub offset: u64,
}

impl ReduceSource {
    fn pack(&self, buf: &mut ByteBuffer) {
        pack_object_id(buf, self.queue_id);
        pack_object_id(buf, self.buffer_id);
        buf.write_u64(self.offset);
    }
    fn unpack(buf: &mut ByteBuffer) -> BufferResult<Self> {
        Ok(ReduceSource {
            queue_id: unpack_object_id(buf)?,
            buffer_id: unpack_object_id(buf)?,
            offset: buf.read_u64()?,
        })
    }
}

request_struct!(EnqueueReduceBuffer {
    sources: Vec<ReduceSource>,
    dst_queue_id: ObjectId,
    dst_buffer_id: ObjectId,
    dst_offset: u64,
    size: u64,
    kernel_id: ObjectId,
    wait_list: Vec<ObjectId>,
    options: CommandOptions,
});

impl EnqueueReduceBuffer {
    pub fn pack(&self, buf: &mut ByteBuffer) {
        buf.write_u32(self.request_id);
        buf.write_sequence(&self.sources, |b, s| s.pack(b));
        pack_object_id(buf, self.dst_queue_id);
        pack_object_id(buf, self.dst_buffer_id);
        buf.write_u64(self.dst_offset).write_u64(self.size);
        pack_object_id(buf, self.kernel_id);
        pack_wait_list(buf, &self.wait_list);
        self.options.pack(buf);
    }
    pub fn unpack(buf: &mut ByteBuffer) -> BufferResult<Self> {
        Ok(EnqueueReduceBuffer {
            request_id: buf.read_u32()?,
            sources: buf.read_sequence(ReduceSource::unpack)?,
            dst_queue_id: unpack_object_id(buf)?,
            dst_buffer_id: unpack_object_id(buf)?,
            dst_offset: buf.read_u64()?,
            size: buf.read_u64()?,
            kernel_id: unpack_object_id(buf)?,
            wait_list: unpack_wait_list(buf)?,
            options: CommandOptions::unpack(buf)?,
        })
    }
}

request_struct!(FinishRequest { queue_id: ObjectId });

impl FinishRequest {
    pub fn pack(&self, buf: &mut ByteBuffer) {
        buf.write_u32(self.request_id);
        pack_object_id(buf, self.queue_id);
    }
    pub fn unpack(buf: &mut ByteBuffer) -> BufferResult<Self> {
        Ok(FinishRequest { request_id: buf.read_u32()?, queue_id: unpack_object_id(buf)? })
    }
}

request_struct!(FlushRequest { queue_id: ObjectId });

impl FlushRequest {
    pub fn pack(&self, buf: &mut ByteBuffer) {
        buf.write_u32(self.request_id);
        pack_object_id(buf, self.queue_id);
    }
    pub fn unpack(buf: &mut ByteBuffer) -> BufferResult<Self> {
        Ok(FlushRequest { request_id: buf.read_u32()?, queue_id: unpack_object_id(buf)? })
    }
}

/// Defined but unused (spec.md §9 open question) — kept for wire
/// round-trip completeness; never produced or handled by this runtime.
request_struct!(ReleaseRequest { object_id: ObjectId });

impl ReleaseRequest {
    pub fn pack(&self, buf: &mut ByteBuffer) {
        buf.write_u32(self.request_id);
        pack_object_id(buf, self.object_id);
    }
    pub fn unpack(buf: &mut ByteBuffer) -> BufferResult<Self> {
        Ok(ReleaseRequest { request_id: buf.read_u32()?, object_id: unpack_object_id(buf)? })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn create_context_round_trips_a_device_list() {
        let req = CreateContext {
            request_id: 9,
            context_id: ObjectId(1),
            devices: vec![10, 11, 12],
        };
        let mut buf = ByteBuffer::new();
        req.pack(&mut buf);
        assert_eq!(CreateContext::unpack(&mut buf).unwrap(), req);
    }

    #[test]
    fn mem_flags_round_trip_every_combination() {
        for bits in 0u8..16 {
            let flags = MemFlags {
                read_only: bits & 1 != 0,
                write_only: bits & 2 != 0,
                copy_host_ptr: bits & 4 != 0,
                use_host_ptr: bits & 8 != 0,
            };
            let mut buf = ByteBuffer::new();
            flags.pack(&mut buf);
            assert_eq!(MemFlags::unpack(&mut buf).unwrap(), flags);
        }
    }

    #[test]
    fn mem_flags_needs_initial_contents_only_for_host_ptr_variants() {
        let plain = MemFlags { read_only: true, write_only: false, copy_host_ptr: false, use_host_ptr: false };
        let with_copy = MemFlags { copy_host_ptr: true, ..plain };
        assert!(!plain.needs_initial_contents());
        assert!(with_copy.needs_initial_contents());
    }

    #[test]
    fn enqueue_nd_range_kernel_round_trips_all_three_dimension_vectors() {
        let req = EnqueueNdRangeKernel {
            request_id: 1,
            queue_id: ObjectId(2),
            kernel_id: ObjectId(3),
            global_work_offset: vec![0, 0],
            global_work_size: vec![1024, 768],
            local_work_size: vec![16, 16],
            wait_list: vec![ObjectId(4), ObjectId(5)],
            options: CommandOptions { command_id: ObjectId(6), want_event: true },
        };
        let mut buf = ByteBuffer::new();
        req.pack(&mut buf);
        assert_eq!(EnqueueNdRangeKernel::unpack(&mut buf).unwrap(), req);
    }

    #[test]
    fn enqueue_broadcast_buffer_round_trips_multiple_destinations() {
        let req = EnqueueBroadcastBuffer {
            request_id: 1,
            src_queue_id: ObjectId(1),
            src_buffer_id: ObjectId(2),
            src_offset: 0,
            size: 4096,
            destinations: vec![
                BroadcastDestination { queue_id: ObjectId(3), buffer_id: ObjectId(4), offset: 0 },
                BroadcastDestination { queue_id: ObjectId(5), buffer_id: ObjectId(6), offset: 128 },
            ],
            wait_list: vec![],
            options: CommandOptions { command_id: ObjectId::NONE, want_event: false },
        };
        let mut buf = ByteBuffer::new();
        req.pack(&mut buf);
        assert_eq!(EnqueueBroadcastBuffer::unpack(&mut buf).unwrap(), req);
    }

    #[test]
    fn set_kernel_arg_mem_object_none_id_means_local_memory() {
        let req = SetKernelArgMemObject {
            request_id: 1,
            kernel_id: ObjectId(1),
            index: 0,
            memory_id: ObjectId::NONE,
            size: 256,
        };
        let mut buf = ByteBuffer::new();
        req.pack(&mut buf);
        let decoded = SetKernelArgMemObject::unpack(&mut buf).unwrap();
        assert!(decoded.memory_id.is_none());
        assert_eq!(decoded, req);
    }
}
