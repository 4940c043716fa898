//! C13 (node half): the state a single host connection owns on this
//! daemon — every context, queue, buffer, program, kernel and event it has
//! created, bound into per-kind registries (`dcl-registry`) the way
//! `original_source/dclasio`'s daemon keeps one object table per connected
//! client. Dropped as a unit when the host disconnects.

use std::sync::Arc;

use dcl_core::{CLError, ObjectId};
use dcl_registry::{ObjectKind, Registry};
use dcl_transport::Host;

use crate::consistency::ConsistencyEngine;
use crate::driver::NativeDriver;
use crate::resources::{BufferResource, CommandQueueResource, ContextResource, EventRecord, KernelResource, ProgramResource};

pub struct Session {
    pub host: Host,
    pub driver: Arc<dyn NativeDriver>,
    pub consistency: ConsistencyEngine,
    contexts: Registry<Arc<ContextResource>>,
    queues: Registry<Arc<CommandQueueResource>>,
    buffers: Registry<Arc<BufferResource>>,
    programs: Registry<Arc<ProgramResource>>,
    kernels: Registry<Arc<KernelResource>>,
    events: Registry<Arc<EventRecord>>,
}

impl Session {
    pub fn new(host: Host, driver: Arc<dyn NativeDriver>) -> Self {
        Session {
            host,
            driver,
            consistency: ConsistencyEngine::new(),
            contexts: Registry::new(),
            queues: Registry::new(),
            buffers: Registry::new(),
            programs: Registry::new(),
            kernels: Registry::new(),
            events: Registry::new(),
        }
    }

    pub fn bind_context(&self, resource: ContextResource) -> Result<(), CLError> {
        let id = resource.id;
        self.contexts
            .bind(ObjectKind::Context, id, Arc::new(resource))
            .map_err(|_| CLError::INVALID_VALUE)
    }

    pub fn context(&self, id: ObjectId) -> Result<Arc<ContextResource>, CLError> {
        self.contexts.lookup(ObjectKind::Context, id).map_err(|_| CLError::INVALID_VALUE)
    }

    pub fn unbind_context(&self, id: ObjectId) -> Result<(), CLError> {
        self.contexts.unbind(ObjectKind::Context, id).map(|_| ()).map_err(|_| CLError::INVALID_VALUE)
    }

    pub fn bind_queue(&self, resource: CommandQueueResource) -> Result<(), CLError> {
        let id = resource.id;
        self.queues
            .bind(ObjectKind::CommandQueue, id, Arc::new(resource))
            .map_err(|_| CLError::INVALID_VALUE)
    }

    pub fn queue(&self, id: ObjectId) -> Result<Arc<CommandQueueResource>, CLError> {
        self.queues.lookup(ObjectKind::CommandQueue, id).map_err(|_| CLError::INVALID_VALUE)
    }

    pub fn unbind_queue(&self, id: ObjectId) -> Result<(), CLError> {
        self.queues.unbind(ObjectKind::CommandQueue, id).map(|_| ()).map_err(|_| CLError::INVALID_VALUE)
    }

    pub fn bind_buffer(&self, resource: BufferResource) -> Result<(), CLError> {
        let id = resource.id;
        self.buffers.bind(ObjectKind::Buffer, id, Arc::new(resource)).map_err(|_| CLError::INVALID_VALUE)
    }

    pub fn buffer(&self, id: ObjectId) -> Result<Arc<BufferResource>, CLError> {
        self.buffers.lookup(ObjectKind::Buffer, id).map_err(|_| CLError::INVALID_MEM_OBJECT)
    }

    pub fn unbind_buffer(&self, id: ObjectId) -> Result<(), CLError> {
        self.buffers.unbind(ObjectKind::Buffer, id).map(|_| ()).map_err(|_| CLError::INVALID_MEM_OBJECT)
    }

    pub fn bind_program(&self, resource: ProgramResource) -> Result<(), CLError> {
        let id = resource.id;
        self.programs.bind(ObjectKind::Program, id, Arc::new(resource)).map_err(|_| CLError::INVALID_VALUE)
    }

    pub fn program(&self, id: ObjectId) -> Result<Arc<ProgramResource>, CLError> {
        self.programs.lookup(ObjectKind::Program, id).map_err(|_| CLError::INVALID_VALUE)
    }

    pub fn unbind_program(&self, id: ObjectId) -> Result<(), CLError> {
        self.programs.unbind(ObjectKind::Program, id).map(|_| ()).map_err(|_| CLError::INVALID_VALUE)
    }

    pub fn bind_kernel(&self, resource: KernelResource) -> Result<(), CLError> {
        let id = resource.id;
        self.kernels.bind(ObjectKind::Kernel, id, Arc::new(resource)).map_err(|_| CLError::INVALID_VALUE)
    }

    pub fn kernel(&self, id: ObjectId) -> Result<Arc<KernelResource>, CLError> {
        self.kernels.lookup(ObjectKind::Kernel, id).map_err(|_| CLError::INVALID_VALUE)
    }

    pub fn unbind_kernel(&self, id: ObjectId) -> Result<(), CLError> {
        self.kernels.unbind(ObjectKind::Kernel, id).map(|_| ()).map_err(|_| CLError::INVALID_VALUE)
    }

    pub fn bind_event(&self, resource: EventRecord) -> Result<(), CLError> {
        self.bind_event_arc(Arc::new(resource))
    }

    pub fn bind_event_arc(&self, resource: Arc<EventRecord>) -> Result<(), CLError> {
        let id = resource.id;
        self.events.bind(ObjectKind::Event, id, resource).map_err(|_| CLError::INVALID_VALUE)
    }

    pub fn event(&self, id: ObjectId) -> Result<Arc<EventRecord>, CLError> {
        self.events.lookup(ObjectKind::Event, id).map_err(|_| CLError::INVALID_EVENT)
    }

    pub fn unbind_event(&self, id: ObjectId) -> Result<(), CLError> {
        self.events.unbind(ObjectKind::Event, id).map(|_| ()).map_err(|_| CLError::INVALID_EVENT)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::driver::SimDriver;
    use dcl_core::ProcessId;
    use dcl_transport::{DataDispatcher, DataStream, MessageDispatcher, MessageQueue, Process, Role};

    async fn fake_session() -> Session {
        let dispatcher =
            MessageDispatcher::bind("127.0.0.1:0".parse().unwrap(), ProcessId(1), Role::ComputeNode)
                .await
                .unwrap();
        let addr = dispatcher.local_addr().unwrap();
        let data_dispatcher =
            DataDispatcher::bind("127.0.0.1:0".parse().unwrap(), ProcessId(1), Role::ComputeNode)
                .await
                .unwrap();
        let data_addr = data_dispatcher.local_addr().unwrap();

        tokio::spawn(async move {
            let _ = dispatcher.accept().await;
        });
        tokio::spawn(async move {
            let _ = data_dispatcher.accept().await;
        });

        let (queue, _rx) = MessageQueue::connect(addr, ProcessId(2), Role::Host).await.unwrap();
        let data = DataStream::connect(data_addr, ProcessId(2), Role::Host).await.unwrap();
        let process = Process::new(queue, data);

        Session::new(Host(process), Arc::new(SimDriver::new()))
    }

    #[tokio::test]
    async fn bound_context_round_trips_through_the_session() {
        let session = fake_session().await;
        session.bind_context(ContextResource { id: ObjectId(1), devices: vec![1] }).unwrap();
        assert_eq!(session.context(ObjectId(1)).unwrap().devices, vec![1]);
        session.unbind_context(ObjectId(1)).unwrap();
        assert!(session.context(ObjectId(1)).is_err());
    }

    #[tokio::test]
    async fn looking_up_an_unbound_buffer_is_invalid_mem_object() {
        let session = fake_session().await;
        assert_eq!(session.buffer(ObjectId(5)).unwrap_err(), CLError::INVALID_MEM_OBJECT);
    }
}
