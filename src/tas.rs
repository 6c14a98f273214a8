//! The time-aware shaper activation engine.
//!
//! The TSN block reports nothing when it refuses a schedule: a rejected
//! enable write produces no interrupt and no status bit, just a control
//! register that silently reads back without the enable bit. Activation
//! is therefore a state machine whose verification step is load-bearing,
//! not a development aid.

use core::fmt::{self, Display, Formatter};
use std::time::Duration;

use arrayvec::ArrayVec;

use crate::error::{HalError, Result};
use crate::mmio::MmioBus;
use crate::ptp;
use crate::registers::{bits, ClockRegisters, TsnRegisters, GATE_QUEUE_COUNT};

/// Upper bound on gate control list length, set by the per-queue window
/// registers the hardware exposes.
pub const MAX_GATE_ENTRIES: usize = 8;

/// One step of the cyclic schedule: which queue gates are open, and for
/// how long.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateEntry {
    pub gate_mask: u8,
    pub duration_ns: u32,
}

/// The caller's intent for one TAS cycle. The hardware's latched shadow
/// copy is what actually drives traffic; this structure is validated,
/// written, and then independently re-read to confirm the hardware took
/// it — never assumed to have taken effect.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GateControlList {
    /// Absolute start of the first cycle, on the adapter's PTP clock.
    pub base_time_ns: u64,
    pub cycle_time_ns: u32,
    pub entries: ArrayVec<GateEntry, MAX_GATE_ENTRIES>,
}

/// One open window per queue, as (start, end) offsets into the cycle.
type QueueWindows = [Option<(u32, u32)>; GATE_QUEUE_COUNT as usize];

impl GateControlList {
    /// Check the list invariants and flatten it into the per-queue gate
    /// windows the hardware is programmed with.
    ///
    /// The hardware has exactly one start/end register pair per queue, so
    /// a queue whose gate opens in two disjoint stretches of the cycle is
    /// not expressible and is rejected here, before any register write.
    pub(crate) fn queue_windows(&self) -> Result<QueueWindows> {
        if self.entries.is_empty() {
            return Err(HalError::InvalidParameter("empty gate control list"));
        }
        if self.cycle_time_ns == 0 {
            return Err(HalError::InvalidParameter("zero cycle time"));
        }

        let total: u64 = self.entries.iter().map(|e| u64::from(e.duration_ns)).sum();
        if total != u64::from(self.cycle_time_ns) {
            return Err(HalError::InvalidParameter(
                "gate durations do not sum to the cycle time",
            ));
        }

        let mut windows: QueueWindows = [None; GATE_QUEUE_COUNT as usize];
        let mut offset: u32 = 0;
        for entry in &self.entries {
            let end = offset + entry.duration_ns;
            if entry.duration_ns != 0 {
                for (queue, window) in windows.iter_mut().enumerate() {
                    if entry.gate_mask & (1u8 << queue) == 0 {
                        continue;
                    }
                    match window {
                        None => *window = Some((offset, end)),
                        Some((_, window_end)) if *window_end == offset => *window_end = end,
                        Some(_) => {
                            return Err(HalError::InvalidParameter(
                                "queue gate opens in disjoint windows",
                            ))
                        }
                    }
                }
            }
            offset = end;
        }

        Ok(windows)
    }
}

/// Where one adapter's shaper stands. `Rejected` is a terminal, expected
/// outcome — hardware refusing a schedule — and callers retry with
/// corrected parameters, not by spinning on the same ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TasState {
    #[default]
    Idle,
    Programming,
    Verifying,
    Active,
    Rejected,
}

impl Display for TasState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TasState::Idle => write!(f, "Idle"),
            TasState::Programming => write!(f, "Programming"),
            TasState::Verifying => write!(f, "Verifying"),
            TasState::Active => write!(f, "Active"),
            TasState::Rejected => write!(f, "Rejected"),
        }
    }
}

/// Validate, program and verify one schedule. Returns the number of
/// queues the accepted schedule drives.
///
/// The caller holds the adapter's exclusive section for the whole call;
/// interleaved writes from a second programming attempt are
/// indistinguishable from hardware rejection.
pub(crate) fn program<B: MmioBus>(
    bus: &B,
    clock: &ClockRegisters,
    tsn: &TsnRegisters,
    gcl: &GateControlList,
    min_lead_ns: u64,
    settle: Duration,
    base_rewrite_fallback: bool,
    state: &mut TasState,
) -> Result<u8> {
    *state = TasState::Programming;

    match run(bus, clock, tsn, gcl, min_lead_ns, settle, base_rewrite_fallback, state) {
        Ok(queues) => {
            *state = TasState::Active;
            log::debug!("TAS active: {queues} queues, cycle {}ns", gcl.cycle_time_ns);
            Ok(queues)
        }
        Err(error) => {
            *state = TasState::Rejected;
            Err(error)
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run<B: MmioBus>(
    bus: &B,
    clock: &ClockRegisters,
    tsn: &TsnRegisters,
    gcl: &GateControlList,
    min_lead_ns: u64,
    settle: Duration,
    base_rewrite_fallback: bool,
    state: &mut TasState,
) -> Result<u8> {
    let windows = gcl.queue_windows()?;

    // The base time is checked against a sample taken *now*. A stale
    // sample is the single most common cause of silent non-activation.
    let now = ptp::read_clock(bus, clock)?;
    if gcl.base_time_ns < now.nanos().saturating_add(min_lead_ns) {
        return Err(HalError::InvalidParameter(
            "base time not sufficiently in the future",
        ));
    }

    // The hardware latches the schedule when the enable bit is written
    // after every other field is already valid. The order below is
    // load-bearing: gate windows, cycle time, base time low then high,
    // control last.
    for (queue, window) in windows.iter().enumerate() {
        let (start, end) = window.unwrap_or((0, 0));
        let queue = queue as u32;
        bus.write(tsn.gate_start_base + queue * 4, start)?;
        bus.write(tsn.gate_end_base + queue * 4, end)?;
    }

    bus.write(tsn.cycle_time, gcl.cycle_time_ns)?;
    if let Some(shadow) = tsn.cycle_time_shadow {
        bus.write(shadow, gcl.cycle_time_ns)?;
    }

    let base_low = gcl.base_time_ns as u32;
    let base_high = (gcl.base_time_ns >> 32) as u32;
    bus.write(tsn.base_time_low, base_low)?;
    bus.write(tsn.base_time_high, base_high)?;

    let control = bus.read(tsn.control)?
        | bits::TAS_CTRL_TRANSMIT_MODE_TSN
        | bits::TAS_CTRL_ENHANCED_QAV;
    bus.write(tsn.control, control)?;

    *state = TasState::Verifying;
    std::thread::sleep(settle);

    let (enabled, base_intact) = verify(bus, tsn, base_low, base_high)?;
    if enabled && base_intact {
        return Ok(selected_queues(&windows));
    }

    // A cleared base time means this part wants the base-time-low half
    // written through zero before it honors the enable. Idempotent, so
    // try it exactly once.
    if !base_intact && base_rewrite_fallback {
        log::debug!("hardware cleared the base time; retrying with the zero-rewrite pattern");
        bus.write(tsn.base_time_low, 0)?;
        bus.write(tsn.base_time_low, base_low)?;
        bus.write(tsn.base_time_high, base_high)?;
        bus.write(tsn.control, control)?;

        std::thread::sleep(settle);
        let (enabled, base_intact) = verify(bus, tsn, base_low, base_high)?;
        if enabled && base_intact {
            return Ok(selected_queues(&windows));
        }
    }

    log::warn!("TAS enable did not latch; hardware rejected the schedule");
    Err(HalError::ActivationRejected)
}

fn verify<B: MmioBus>(
    bus: &B,
    tsn: &TsnRegisters,
    base_low: u32,
    base_high: u32,
) -> Result<(bool, bool)> {
    let control = bus.read(tsn.control)?;
    let enabled = control & bits::TAS_CTRL_TRANSMIT_MODE_TSN != 0;

    let low = bus.read(tsn.base_time_low)?;
    let high = bus.read(tsn.base_time_high)?;
    let base_intact = low == base_low && high == base_high;

    Ok((enabled, base_intact))
}

fn selected_queues(windows: &QueueWindows) -> u8 {
    windows.iter().filter(|w| w.is_some()).count() as u8
}
