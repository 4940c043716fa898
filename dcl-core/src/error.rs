use std::fmt;

/// A `cl_int`-compatible error code. Positive/zero values come from the
/// native driver and pass through verbatim (§7 "Driver errors"); negative
/// values below `CL_PROTOCOL_ERROR` are vendor extensions this runtime
/// defines for transport failures that OpenCL itself has no code for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CLError(pub i32);

impl CLError {
    pub const SUCCESS: CLError = CLError(0);
    pub const INVALID_VALUE: CLError = CLError(-30);
    pub const INVALID_MEM_OBJECT: CLError = CLError(-38);
    pub const INVALID_EVENT: CLError = CLError(-58);
    pub const INVALID_KERNEL_ARGS: CLError = CLError(-52);
    pub const BUILD_PROGRAM_FAILURE: CLError = CLError(-11);
    pub const OUT_OF_RESOURCES: CLError = CLError(-5);

    /// Connection to the peer was lost. Vendor extension (§7).
    pub const CONNECTION_ERROR: CLError = CLError(-1000);
    /// A read/write on an established connection failed. Vendor extension.
    pub const IO_ERROR: CLError = CLError(-1001);
    /// A message violated the protocol (bad type, oversized length,
    /// unknown request id, double-bound id). Vendor extension.
    pub const PROTOCOL_ERROR: CLError = CLError(-1002);
    /// A blocking wait was woken by `interrupt()` rather than completing
    /// normally. Non-fatal; callers treat it as cancellation (§7).
    pub const THREAD_INTERRUPTED: CLError = CLError(-1003);

    pub fn is_success(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for CLError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            CLError::SUCCESS => "CL_SUCCESS",
            CLError::INVALID_VALUE => "CL_INVALID_VALUE",
            CLError::INVALID_MEM_OBJECT => "CL_INVALID_MEM_OBJECT",
            CLError::INVALID_EVENT => "CL_INVALID_EVENT",
            CLError::INVALID_KERNEL_ARGS => "CL_INVALID_KERNEL_ARGS",
            CLError::BUILD_PROGRAM_FAILURE => "CL_BUILD_PROGRAM_FAILURE",
            CLError::OUT_OF_RESOURCES => "CL_OUT_OF_RESOURCES",
            CLError::CONNECTION_ERROR => "CL_CONNECTION_ERROR",
            CLError::IO_ERROR => "CL_IO_ERROR",
            CLError::PROTOCOL_ERROR => "CL_PROTOCOL_ERROR",
            CLError::THREAD_INTERRUPTED => "CL_THREAD_INTERRUPTED",
            CLError(code) => return write!(f, "cl_int({})", code),
        };
        write!(f, "{}", name)
    }
}

impl std::error::Error for CLError {}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn success_is_zero() {
        assert!(CLError::SUCCESS.is_success());
        assert!(!CLError::INVALID_VALUE.is_success());
    }
}
