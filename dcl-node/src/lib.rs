//! `dcld`'s library half: everything a compute-node daemon needs to speak
//! the wire protocol defined in `dcl-wire` against the resources it holds
//! for a connected host. The binary (`src/bin/dcld.rs`) is a thin CLI and
//! accept-loop shell around `RequestProcessor`.

pub mod command_queue;
pub mod consistency;
pub mod driver;
pub mod request_processor;
pub mod resources;
pub mod session;

pub use consistency::ConsistencyEngine;
pub use driver::{BuildOutcome, NativeDriver, SimDriver, SimulatedDevice};
pub use request_processor::RequestProcessor;
pub use session::Session;
