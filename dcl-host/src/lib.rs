//! Host-side runtime: a serialized notification sink (C10) plus a thin
//! command-queue convenience layer (host half of C13) built on top of
//! `dcl-transport`'s `ComputeNode`.

pub mod command_queue;
pub mod event_processor;

pub use command_queue::CommandQueue;
pub use event_processor::{CommandListener, ContextListener, EventProcessor, HostEvent, ProgramBuildListener};
