//! TCP transport: handshake, the control-plane message queue and its
//! accept loop, the data-plane byte stream and its accept loop, request
//! correlation, and the per-peer process abstraction built on top of them
//! (spec.md §6.2, §6.3).

pub mod data_stream;
pub mod error;
pub mod handshake;
pub mod message_queue;
pub mod process;
pub mod response_buffer;

pub use data_stream::{DataDispatcher, DataStream, DataTransferHandle};
pub use error::{TransportError, TransportResult};
pub use handshake::Role;
pub use message_queue::{MessageDispatcher, MessageQueue, QueueEvent};
pub use process::{execute_on_all, ComputeNode, ConnectionStatus, Host, Process};
pub use response_buffer::ResponseBuffer;
