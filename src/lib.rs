//! Hardware-control core for Intel Ethernet PTP clocks and TSN shaping.
//!
//! Six generations of controllers share one interface here: the 82575/
//! 82576 without usable timestamping, the 82580/I350/I354/I210/I217/I219
//! with progressively richer IEEE 1588 support, and the I225/I226 with
//! the full 802.1Qbv/Qbu TSN block. The crate owns the per-family
//! register maps and capability tables, the torn-read-safe clock engine,
//! the time-aware-shaper activation state machine with its
//! verify-after-write discipline, and the frame preemption configurator.
//!
//! The embedding driver supplies the mapped register window through the
//! [`MmioBus`] trait and owns discovery, the control channel transport
//! and network stack attachment. Control-channel record layouts are
//! fixed in [`records`].
//!
//! Everything is driven through [`Adapter`], one per physical adapter.
//! The first operation on a fresh context runs the whole lifecycle chain
//! (bind, map, clock bring-up) synchronously; concurrent first callers
//! observe exactly one hardware initialization.

pub mod adapter;
pub mod capability;
pub mod config;
pub mod error;
pub mod family;
pub mod fp;
pub mod mmio;
pub mod ptp;
pub mod records;
pub mod registers;
pub mod tas;

mod hal;

pub use adapter::{Adapter, DeviceIdentity, LifecycleState};
pub use capability::{assert_no_false_advertising, capabilities_of, Capabilities};
pub use config::{StepPolicy, TimingConfig};
pub use error::{HalError, Result};
pub use family::DeviceFamily;
pub use fp::FramePreemptionConfig;
pub use mmio::{MmioBus, MmioError};
pub use ptp::PtpClockSample;
pub use tas::{GateControlList, GateEntry, TasState, MAX_GATE_ENTRIES};
