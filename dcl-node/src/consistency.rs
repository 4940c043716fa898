//! C12: the release-acquire protocol a compute node uses to know whether
//! a command in its wait list was actually satisfied locally, without
//! ever dialing another compute node directly. A command that writes a
//! buffer releases it under its own command id; a later command whose
//! wait list names that id acquires by checking whether this node is the
//! one that ran it. If it isn't, the write happened somewhere else in
//! the cluster, and synchronization happens through the host relaying an
//! `EventSynchronizationMessage` and the resulting bytes over the data
//! stream rather than a dedicated node-to-node message (spec.md §4.12,
//! §9 relay-vs-direct decision, recorded in `DESIGN.md`).

use std::collections::HashMap;
use std::sync::Mutex;

use dcl_core::ObjectId;

#[derive(Debug, Default)]
pub struct ConsistencyEngine {
    /// Which buffer a command this node actually ran wrote to. A wait-list
    /// entry missing from this map names a command this node never
    /// executed — the write happened on some other compute node, and
    /// `acquire` says so (spec.md §4.12).
    writers: Mutex<HashMap<ObjectId, ObjectId>>,
}

impl ConsistencyEngine {
    pub fn new() -> Self {
        ConsistencyEngine { writers: Mutex::new(HashMap::new()) }
    }

    /// Called when a command finishes writing to `buffer_id`. Records
    /// `command_id` as this buffer's last local writer, unless it's
    /// `ObjectId::NONE` (no event was requested, so nothing can ever wait
    /// on it).
    pub fn release(&self, buffer_id: ObjectId, command_id: ObjectId) {
        if command_id != ObjectId::NONE {
            self.writers.lock().unwrap().insert(command_id, buffer_id);
        }
    }

    /// `false` means `command_id` named in a wait list is a write this
    /// node never ran — its result lives on another compute node and has
    /// to be fetched through the host before a dependent command can
    /// proceed (spec.md §4.12: "it acquires by sending
    /// `EventSynchronizationMessage(command_id_of_last_writer)`").
    /// `ObjectId::NONE` (no dependency) is trivially satisfied.
    pub fn acquire(&self, command_id: ObjectId) -> bool {
        command_id == ObjectId::NONE || self.writers.lock().unwrap().contains_key(&command_id)
    }

    /// Records that a relayed write now covers this node's copy of
    /// `buffer_id` as of `command_id`, so later wait-list checks against
    /// the same command succeed without synchronizing again.
    pub fn adopt_relayed_write(&self, buffer_id: ObjectId, command_id: ObjectId) {
        if command_id != ObjectId::NONE {
            self.writers.lock().unwrap().insert(command_id, buffer_id);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn no_dependency_is_trivially_acquired() {
        let engine = ConsistencyEngine::new();
        assert!(engine.acquire(ObjectId::NONE));
    }

    #[test]
    fn a_command_this_node_never_ran_cannot_be_acquired() {
        let engine = ConsistencyEngine::new();
        assert!(!engine.acquire(ObjectId(7)));
        engine.release(ObjectId(1), ObjectId(7));
        assert!(engine.acquire(ObjectId(7)));
    }

    #[test]
    fn releasing_with_no_event_requested_leaves_the_command_unacquirable() {
        let engine = ConsistencyEngine::new();
        engine.release(ObjectId(1), ObjectId::NONE);
        assert!(engine.acquire(ObjectId::NONE));
    }

    #[test]
    fn adopting_a_relayed_write_makes_its_command_id_acquirable() {
        let engine = ConsistencyEngine::new();
        assert!(!engine.acquire(ObjectId(7)));
        engine.adopt_relayed_write(ObjectId(1), ObjectId(7));
        assert!(engine.acquire(ObjectId(7)));
    }
}
