//! C10: the host side's serialized notification sink. Every notification
//! a compute node sends back (command status transitions, build
//! completion, context release acks) is funneled through one channel and
//! drained by a single task, so listener callbacks never run concurrently
//! with each other even though notifications arrive from many connections
//! at once (spec.md §5 "a dedicated worker thread for serialized
//! host-side callbacks").

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use dcl_core::{CLError, ObjectId};
use dcl_wire::messages::CommandExecStatus;
use dcl_wire::Message;
use tokio::sync::mpsc;

/// What the event processor dispatches, extracted from the raw wire
/// notification so listener traits don't need to know about `dcl-wire`.
#[derive(Debug, Clone)]
pub enum HostEvent {
    CommandStatusChanged { command_id: ObjectId, status: CommandExecStatus, error: CLError, timestamp_ns: u64 },
    ProgramBuildCompleted { program_id: ObjectId, status: CLError, log: String },
    ContextReleased { context_id: ObjectId },
    /// A node couldn't satisfy a wait-list dependency locally and is
    /// asking this host to relay the writer's current bytes back over
    /// its data stream (spec.md §4.12).
    EventSynchronization { command_id: ObjectId },
    ContextError { context_id: ObjectId, info: String, private_info: Vec<u8> },
}

impl HostEvent {
    /// Returns `None` for messages that aren't host-bound notifications
    /// (e.g. responses, which are handled by `dcl-transport`'s response
    /// correlation instead).
    pub fn from_message(message: &Message) -> Option<Self> {
        match message {
            Message::CommandExecStatusChanged(m) => Some(HostEvent::CommandStatusChanged {
                command_id: m.command_id,
                status: m.status,
                error: m.error,
                timestamp_ns: m.timestamp_ns,
            }),
            Message::ProgramBuildCompleted(m) => Some(HostEvent::ProgramBuildCompleted {
                program_id: m.program_id,
                status: m.status,
                log: m.log.clone(),
            }),
            Message::ContextReleased(m) => Some(HostEvent::ContextReleased { context_id: m.context_id }),
            Message::EventSynchronizationMessage(m) => {
                Some(HostEvent::EventSynchronization { command_id: m.command_id })
            }
            Message::ContextErrorMessage(m) => Some(HostEvent::ContextError {
                context_id: m.context_id,
                info: m.info.clone(),
                private_info: m.private_info.0.clone(),
            }),
            _ => None,
        }
    }
}

pub trait CommandListener: Send + Sync {
    fn on_status_changed(&self, status: CommandExecStatus, error: CLError, timestamp_ns: u64);
}

pub trait ProgramBuildListener: Send + Sync {
    fn on_build_completed(&self, status: CLError, log: &str);
}

pub trait ContextListener: Send + Sync {
    fn on_context_released(&self);
    fn on_error(&self, _info: &str, _private_info: &[u8]) {}
}

/// Fulfils a node's `EventSynchronizationMessage`: looks up which node
/// last released the buffer `command_id` wrote to, pulls its current
/// bytes, and relays them back over the requesting node's data stream
/// (spec.md §4.12). Cluster-wide rather than per-id — a host only ever
/// has one of these wired up, unlike the per-object listener tables
/// above.
pub trait SynchronizationListener: Send + Sync {
    fn on_synchronization_requested(&self, command_id: ObjectId);
}

#[derive(Default)]
struct Listeners {
    commands: Mutex<HashMap<ObjectId, Arc<dyn CommandListener>>>,
    builds: Mutex<HashMap<ObjectId, Arc<dyn ProgramBuildListener>>>,
    contexts: Mutex<HashMap<ObjectId, Arc<dyn ContextListener>>>,
    synchronization: Mutex<Option<Arc<dyn SynchronizationListener>>>,
}

impl Listeners {
    fn dispatch(&self, event: HostEvent) {
        match event {
            HostEvent::CommandStatusChanged { command_id, status, error, timestamp_ns } => {
                match self.commands.lock().unwrap().get(&command_id).cloned() {
                    Some(listener) => listener.on_status_changed(status, error, timestamp_ns),
                    None => log::debug!("no command listener registered for {}", command_id),
                }
            }
            HostEvent::ProgramBuildCompleted { program_id, status, log: build_log } => {
                match self.builds.lock().unwrap().get(&program_id).cloned() {
                    Some(listener) => listener.on_build_completed(status, &build_log),
                    None => log::debug!("no build listener registered for {}", program_id),
                }
            }
            HostEvent::ContextReleased { context_id } => {
                match self.contexts.lock().unwrap().get(&context_id).cloned() {
                    Some(listener) => listener.on_context_released(),
                    None => log::debug!("no context listener registered for {}", context_id),
                }
            }
            HostEvent::ContextError { context_id, info, private_info } => {
                match self.contexts.lock().unwrap().get(&context_id).cloned() {
                    Some(listener) => listener.on_error(&info, &private_info),
                    None => log::debug!("no context listener registered for {}", context_id),
                }
            }
            HostEvent::EventSynchronization { command_id } => {
                match self.synchronization.lock().unwrap().clone() {
                    Some(listener) => listener.on_synchronization_requested(command_id),
                    None => log::debug!("no synchronization listener registered; dropping request for {}", command_id),
                }
            }
        }
    }
}

/// Owns the single draining task and the per-id listener tables. Cheap to
/// clone: everything it holds is shared.
#[derive(Clone)]
pub struct EventProcessor {
    listeners: Arc<Listeners>,
    sender: mpsc::UnboundedSender<HostEvent>,
}

impl EventProcessor {
    pub fn spawn() -> Self {
        let listeners = Arc::new(Listeners::default());
        let (sender, mut receiver) = mpsc::unbounded_channel::<HostEvent>();

        let worker_listeners = listeners.clone();
        tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                worker_listeners.dispatch(event);
            }
        });

        EventProcessor { listeners, sender }
    }

    pub fn submit(&self, event: HostEvent) {
        let _ = self.sender.send(event);
    }

    pub fn register_command_listener(&self, command_id: ObjectId, listener: Arc<dyn CommandListener>) {
        self.listeners.commands.lock().unwrap().insert(command_id, listener);
    }

    pub fn unregister_command_listener(&self, command_id: ObjectId) {
        self.listeners.commands.lock().unwrap().remove(&command_id);
    }

    pub fn register_build_listener(&self, program_id: ObjectId, listener: Arc<dyn ProgramBuildListener>) {
        self.listeners.builds.lock().unwrap().insert(program_id, listener);
    }

    pub fn register_context_listener(&self, context_id: ObjectId, listener: Arc<dyn ContextListener>) {
        self.listeners.contexts.lock().unwrap().insert(context_id, listener);
    }

    pub fn register_synchronization_listener(&self, listener: Arc<dyn SynchronizationListener>) {
        *self.listeners.synchronization.lock().unwrap() = Some(listener);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    struct FlagListener(Arc<AtomicBool>);
    impl CommandListener for FlagListener {
        fn on_status_changed(&self, _status: CommandExecStatus, _error: CLError, _timestamp_ns: u64) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn registered_listener_receives_its_event() {
        let processor = EventProcessor::spawn();
        let flag = Arc::new(AtomicBool::new(false));
        processor.register_command_listener(ObjectId(1), Arc::new(FlagListener(flag.clone())));

        processor.submit(HostEvent::CommandStatusChanged {
            command_id: ObjectId(1),
            status: CommandExecStatus::Complete,
            error: CLError::SUCCESS,
            timestamp_ns: 0,
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(flag.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn event_for_unregistered_id_is_dropped_not_panicked() {
        let processor = EventProcessor::spawn();
        processor.submit(HostEvent::ContextReleased { context_id: ObjectId(99) });
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[test]
    fn from_message_ignores_non_notification_messages() {
        use dcl_wire::messages::{FinishRequest, StatusResponse};
        let request = Message::FinishRequest(FinishRequest { request_id: 1, queue_id: ObjectId(1) });
        assert!(HostEvent::from_message(&request).is_none());
        let response = Message::StatusResponse(StatusResponse { request_id: 1, status: CLError::SUCCESS });
        assert!(HostEvent::from_message(&response).is_none());
    }

    #[test]
    fn from_message_recognizes_event_synchronization() {
        use dcl_wire::messages::EventSynchronizationMessage;
        let message = Message::EventSynchronizationMessage(EventSynchronizationMessage { command_id: ObjectId(5) });
        match HostEvent::from_message(&message) {
            Some(HostEvent::EventSynchronization { command_id }) => assert_eq!(command_id, ObjectId(5)),
            other => panic!("expected an EventSynchronization event, got {:?}", other),
        }
    }

    struct SyncFlag(Arc<AtomicBool>);
    impl SynchronizationListener for SyncFlag {
        fn on_synchronization_requested(&self, _command_id: ObjectId) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn registered_synchronization_listener_receives_the_request() {
        let processor = EventProcessor::spawn();
        let flag = Arc::new(AtomicBool::new(false));
        processor.register_synchronization_listener(Arc::new(SyncFlag(flag.clone())));

        processor.submit(HostEvent::EventSynchronization { command_id: ObjectId(7) });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(flag.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn unregistered_synchronization_request_is_dropped_not_panicked() {
        let processor = EventProcessor::spawn();
        processor.submit(HostEvent::EventSynchronization { command_id: ObjectId(9) });
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
