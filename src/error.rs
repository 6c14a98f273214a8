//! The error taxonomy shared by every hardware-facing component.

use crate::family::DeviceFamily;
use crate::mmio::MmioError;
use crate::registers::Register;

pub type Result<T, E = HalError> = core::result::Result<T, E>;

/// Everything that can go wrong while driving the adapter hardware.
///
/// None of these are fatal to the process. Callers decide whether to
/// retry; only [`HalError::HardwareFault`] moves the adapter context to
/// its `Error` lifecycle state and requires an explicit re-initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HalError {
    /// The operation was attempted before the context finished its
    /// lifecycle chain, or after the context faulted.
    #[error("adapter hardware is not ready")]
    HardwareNotReady,

    /// A request field failed validation before any register was touched.
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),

    /// The feature is not present on this silicon generation. Never
    /// silently downgraded.
    #[error("{feature} is not supported on {family}")]
    UnsupportedCapability {
        family: DeviceFamily,
        feature: &'static str,
    },

    /// The gate-control schedule was written but the enable bit did not
    /// latch. This is the hardware refusing the schedule, not a driver
    /// bug; reported once, the caller decides whether to reprogram.
    #[error("hardware did not latch the gate control schedule")]
    ActivationRejected,

    /// A register access did not complete in time.
    #[error("hardware access timed out")]
    HardwareTimeout,

    /// The register window faulted. Irrecoverable without explicit
    /// re-initialization of the context.
    #[error("irrecoverable register window fault")]
    HardwareFault,

    /// A register was requested that this generation does not implement.
    /// A configuration error in the caller, not a runtime fault.
    #[error("{family} does not implement the {register} register")]
    MissingRegister {
        family: DeviceFamily,
        register: Register,
    },
}

impl From<MmioError> for HalError {
    fn from(v: MmioError) -> Self {
        match v {
            MmioError::Fault => Self::HardwareFault,
            MmioError::Timeout => Self::HardwareTimeout,
        }
    }
}
