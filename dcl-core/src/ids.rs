use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// 64-bit identity of a participant, negotiated at handshake. Zero means
/// "unknown/not yet negotiated".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessId(pub u64);

impl ProcessId {
    pub const UNKNOWN: ProcessId = ProcessId(0);

    pub fn is_known(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// 32-bit host-issued handle naming a remote artefact (context, queue,
/// buffer, program, kernel, event, ...). Unique within the scope of the
/// host that allocated it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u32);

impl ObjectId {
    /// Used by `SetKernelArgMemObject` to mean "local-memory scratch of the
    /// declared size" instead of naming a memory object.
    pub const NONE: ObjectId = ObjectId(0);

    pub fn is_none(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj#{}", self.0)
    }
}

/// Monotonically increasing allocator for object ids, one per host session.
/// Mirrors `AtomicCounterWriter` from the teacher's atomics module, but
/// narrowed to the 32-bit width the wire format requires.
#[derive(Debug)]
pub struct ObjectIdAllocator {
    next: AtomicU32,
}

impl ObjectIdAllocator {
    pub fn new() -> Self {
        ObjectIdAllocator { next: AtomicU32::new(1) }
    }

    pub fn allocate(&self) -> ObjectId {
        ObjectId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ObjectIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unknown_process_id_is_not_known() {
        assert!(!ProcessId::UNKNOWN.is_known());
        assert!(ProcessId(1).is_known());
    }

    #[test]
    fn allocator_never_hands_out_the_none_id() {
        let alloc = ObjectIdAllocator::new();
        for _ in 0..100 {
            assert!(!alloc.allocate().is_none());
        }
    }
}
