//! Per-adapter state: lifecycle, lazy initialization, and the coarse
//! exclusive section around multi-register sequences.
//!
//! One [`Adapter`] exists per physical adapter instance and exclusively
//! owns its mapped register window. Nothing is touched until the first
//! operation arrives; that first caller drives the whole lifecycle chain
//! synchronously, and concurrent first callers observe exactly one
//! hardware initialization between them.

use core::fmt::{self, Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex};

use crate::capability::Capabilities;
use crate::config::TimingConfig;
use crate::error::{HalError, Result};
use crate::family::DeviceFamily;
use crate::fp::{self, FramePreemptionConfig};
use crate::hal::{self, DeviceOps};
use crate::mmio::MmioBus;
use crate::ptp::{self, PtpClockSample};
use crate::records::{ClockQuery, HardwareState, StatusCode};
use crate::tas::{self, GateControlList, TasState};

/// The PCI identity an adapter is discovered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub vendor_id: u16,
    pub device_id: u16,
}

impl DeviceIdentity {
    pub fn new(vendor_id: u16, device_id: u16) -> Self {
        Self {
            vendor_id,
            device_id,
        }
    }
}

impl Display for DeviceIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vendor_id, self.device_id)
    }
}

/// Where one adapter stands between discovery and readiness.
///
/// `ClockReady` is the terminal ready state for clock-bearing families;
/// the clockless generations terminate at `RegistersMapped`, which is as
/// ready as they get. `Error` is reachable from anywhere on an
/// irrecoverable window fault and left only through
/// [`Adapter::reinitialize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    #[default]
    Unbound,
    Bound,
    RegistersMapped,
    ClockReady,
    Error,
}

impl LifecycleState {
    pub(crate) fn code(&self) -> u32 {
        match self {
            LifecycleState::Unbound => 0,
            LifecycleState::Bound => 1,
            LifecycleState::RegistersMapped => 2,
            LifecycleState::ClockReady => 3,
            LifecycleState::Error => 4,
        }
    }
}

impl Display for LifecycleState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::Unbound => write!(f, "Unbound"),
            LifecycleState::Bound => write!(f, "Bound"),
            LifecycleState::RegistersMapped => write!(f, "RegistersMapped"),
            LifecycleState::ClockReady => write!(f, "ClockReady"),
            LifecycleState::Error => write!(f, "Error"),
        }
    }
}

#[derive(Debug)]
struct StateCell {
    state: LifecycleState,
    ops: Option<DeviceOps>,
    init_in_progress: bool,
}

#[derive(Debug, Default)]
struct TasCell {
    state: TasState,
    selected_queues: u8,
}

/// No sample has been taken yet.
const NO_SAMPLE: u64 = u64::MAX;

pub struct Adapter<B> {
    identity: DeviceIdentity,
    timing: TimingConfig,
    bus: B,
    cell: Mutex<StateCell>,
    init_done: Condvar,
    /// Serializes every register sequence that spans more than one
    /// write: TAS programming, set-clock, rate and phase adjustment,
    /// MDIO transactions and lazy initialization. Single-register reads
    /// stay lock-free; a torn clock read is detected and retried rather
    /// than prevented.
    op_lock: Mutex<()>,
    last_sample: AtomicU64,
    tas: Mutex<TasCell>,
}

impl<B: MmioBus> Adapter<B> {
    /// Create the context for a freshly discovered adapter. No hardware
    /// is touched until the first operation.
    pub fn new(identity: DeviceIdentity, bus: B, timing: TimingConfig) -> Self {
        Self {
            identity,
            timing,
            bus,
            cell: Mutex::new(StateCell {
                state: LifecycleState::Unbound,
                ops: None,
                init_in_progress: false,
            }),
            init_done: Condvar::new(),
            op_lock: Mutex::new(()),
            last_sample: AtomicU64::new(NO_SAMPLE),
            tas: Mutex::new(TasCell::default()),
        }
    }

    pub fn identity(&self) -> DeviceIdentity {
        self.identity
    }

    pub fn lifecycle(&self) -> LifecycleState {
        self.cell.lock().unwrap().state
    }

    /// The resolved family, once the context has been bound.
    pub fn family(&self) -> Option<DeviceFamily> {
        self.cell.lock().unwrap().ops.map(|ops| ops.family())
    }

    pub fn capabilities(&self) -> Option<Capabilities> {
        self.cell.lock().unwrap().ops.map(|ops| ops.capabilities())
    }

    /// The shaper state machine's position for this adapter.
    pub fn tas_state(&self) -> TasState {
        self.tas.lock().unwrap().state
    }

    /// Queues driven by the last accepted shaper schedule.
    pub fn selected_queue_count(&self) -> u8 {
        self.tas.lock().unwrap().selected_queues
    }

    /// Tear the context down and hand the register window back.
    pub fn release(self) -> B {
        self.bus
    }

    /// Read the hardware clock, torn-read-safe and without taking the
    /// adapter's exclusive section.
    pub fn read_clock(&self) -> Result<PtpClockSample> {
        let ops = self.ensure_ready()?;
        require(&ops, Capabilities::BASIC_1588, "clock read")?;
        let clock = ops.map().clock(ops.family())?;

        let sample = self.guard(ptp::read_clock(&self.bus, clock))?;
        self.last_sample.store(sample.nanos(), Ordering::Relaxed);
        Ok(sample)
    }

    /// Write the hardware clock. The counter keeps advancing from the
    /// written value. Backward steps are handled per the configured
    /// [`StepPolicy`](crate::config::StepPolicy).
    pub fn set_clock(&self, nanos: u64) -> Result<()> {
        let ops = self.ensure_ready()?;
        require(&ops, Capabilities::BASIC_1588, "clock set")?;
        let clock = ops.map().clock(ops.family())?;

        let _guard = self.op_lock.lock().unwrap();
        let last = match self.last_sample.load(Ordering::Relaxed) {
            NO_SAMPLE => None,
            sample => Some(sample),
        };
        self.guard(ptp::set_clock(
            &self.bus,
            clock,
            nanos,
            last,
            self.timing.step_policy,
        ))?;
        self.last_sample.store(nanos, Ordering::Relaxed);
        Ok(())
    }

    /// Rewrite the clock's rate increment register; returns the previous
    /// raw value for the caller's audit trail.
    pub fn adjust_frequency(&self, increment_ns: u8, fractional: u32) -> Result<u32> {
        let ops = self.ensure_ready()?;
        require(&ops, Capabilities::BASIC_1588, "frequency adjustment")?;
        let clock = ops.map().clock(ops.family())?;

        let _guard = self.op_lock.lock().unwrap();
        self.guard(ptp::adjust_frequency(
            &self.bus,
            clock,
            increment_ns,
            fractional,
            ops.nominal_increment_ns(),
            self.timing.frequency_trim_limit_ppb,
        ))
    }

    /// Apply a one-shot signed offset to the running clock. Serialized
    /// against frequency adjustment on the same adapter.
    pub fn adjust_phase(&self, offset_ns: i64) -> Result<()> {
        let ops = self.ensure_ready()?;
        require(&ops, Capabilities::BASIC_1588, "phase adjustment")?;
        let clock = ops.map().clock(ops.family())?;

        let _guard = self.op_lock.lock().unwrap();
        self.guard(ptp::adjust_phase(&self.bus, clock, offset_ns))
    }

    /// Assemble the clock query response: sample, rate word, auxiliary
    /// control and the base tick rate.
    pub fn clock_query(&self) -> Result<ClockQuery> {
        let ops = self.ensure_ready()?;
        require(&ops, Capabilities::BASIC_1588, "clock query")?;
        let clock = ops.map().clock(ops.family())?;

        let info = self.guard(ptp::clock_info(&self.bus, clock, ops.base_tick_mhz()))?;
        self.last_sample
            .store(info.sample.nanos(), Ordering::Relaxed);

        Ok(ClockQuery {
            sample_ns: info.sample.nanos(),
            rate_increment: info.rate_increment,
            aux_control: info.aux_control,
            base_tick_mhz: info.base_tick_mhz,
            status: StatusCode::Success,
        })
    }

    /// Validate, program and verify a gate control schedule.
    ///
    /// Holds the exclusive section for the whole programming-and-verify
    /// sequence; a concurrent attempt waits rather than interleaving
    /// writes. The outcome is also recorded in [`Adapter::tas_state`].
    pub fn setup_tas(&self, list: &GateControlList) -> Result<()> {
        let ops = self.ensure_ready()?;
        require(&ops, Capabilities::TAS, "time-aware shaper")?;
        let family = ops.family();
        let map = ops.map();
        let clock = map.clock(family)?;
        let tsn = map.tsn(family)?;

        let _guard = self.op_lock.lock().unwrap();
        let mut tas = self.tas.lock().unwrap();
        let result = self.guard(tas::program(
            &self.bus,
            clock,
            tsn,
            list,
            self.timing.tas_min_lead_ns(family),
            self.timing.tas_settle(),
            ops.tas_base_rewrite_fallback(),
            &mut tas.state,
        ));

        let queues = result?;
        tas.selected_queues = queues;
        Ok(())
    }

    /// Program frame preemption. A single register write; the hardware
    /// takes it unconditionally, so there is no verification re-read.
    pub fn setup_frame_preemption(&self, config: &FramePreemptionConfig) -> Result<()> {
        let ops = self.ensure_ready()?;
        require(&ops, Capabilities::FRAME_PREEMPTION, "frame preemption")?;
        let tsn = ops.map().tsn(ops.family())?;

        self.guard(fp::configure(&self.bus, tsn, config))
    }

    pub fn mdio_read(&self, phy: u8, reg: u8) -> Result<u16> {
        let mdic = self.mdio_offset()?;
        let _guard = self.op_lock.lock().unwrap();
        self.guard(hal::mdio::read(&self.bus, mdic, phy, reg))
    }

    pub fn mdio_write(&self, phy: u8, reg: u8, value: u16) -> Result<()> {
        let mdic = self.mdio_offset()?;
        let _guard = self.op_lock.lock().unwrap();
        self.guard(hal::mdio::write(&self.bus, mdic, phy, reg, value))
    }

    /// The diagnostic state query. Never triggers initialization and
    /// works in every lifecycle state.
    pub fn hardware_state(&self) -> HardwareState {
        let cell = self.cell.lock().unwrap();
        HardwareState {
            lifecycle: cell.state.code(),
            vendor_id: self.identity.vendor_id,
            device_id: self.identity.device_id,
            capabilities: cell.ops.map(|ops| ops.capabilities().bits()).unwrap_or(0),
            status: StatusCode::Success,
        }
    }

    /// Recover from the `Error` state. The context drops back to its
    /// bound state and the next chain run redoes the hardware bring-up.
    pub fn reinitialize(&self) -> Result<()> {
        {
            let mut cell = self.cell.lock().unwrap();
            match cell.state {
                LifecycleState::Error => {
                    cell.state = if cell.ops.is_some() {
                        LifecycleState::Bound
                    } else {
                        LifecycleState::Unbound
                    };
                }
                _ => {
                    return Err(HalError::InvalidParameter(
                        "adapter is not in the error state",
                    ))
                }
            }
        }

        self.ensure_ready().map(|_| ())
    }

    /// Raw register access for bench diagnostics. Bypasses every
    /// validation layer above, which is why it does not exist in
    /// production builds.
    #[cfg(feature = "diagnostics")]
    pub fn debug_register_read(&self, offset: u32) -> Result<u32> {
        Ok(self.bus.read(offset)?)
    }

    #[cfg(feature = "diagnostics")]
    pub fn debug_register_write(&self, offset: u32, value: u32) -> Result<()> {
        Ok(self.bus.write(offset, value)?)
    }

    fn mdio_offset(&self) -> Result<u32> {
        let ops = self.ensure_ready()?;
        require(&ops, Capabilities::MDIO, "mdio access")?;
        ops.map().mdio_control.ok_or(HalError::MissingRegister {
            family: ops.family(),
            register: crate::registers::Register::MdioControl,
        })
    }

    /// Block until the context is in its terminal ready state, running
    /// the initialization chain if this caller is the first to arrive.
    ///
    /// Exactly one caller performs the hardware sequence; everyone else
    /// waits on the same completion signal and then proceeds uniformly,
    /// whether they won the race or lost it.
    fn ensure_ready(&self) -> Result<DeviceOps> {
        let mut cell = self.cell.lock().unwrap();

        loop {
            if cell.init_in_progress {
                cell = self.init_done.wait(cell).unwrap();
                continue;
            }

            match (cell.state, cell.ops) {
                (LifecycleState::ClockReady, Some(ops)) => return Ok(ops),
                (LifecycleState::RegistersMapped, Some(ops))
                    if !ops.capabilities().contains(Capabilities::BASIC_1588) =>
                {
                    return Ok(ops)
                }
                (LifecycleState::Error, _) => return Err(HalError::HardwareNotReady),
                _ => {}
            }

            cell.init_in_progress = true;
            let bound = cell.ops;
            drop(cell);

            let (ops, outcome) = self.run_init_chain(bound);

            cell = self.cell.lock().unwrap();
            cell.init_in_progress = false;
            cell.ops = ops.or(cell.ops);
            match outcome {
                Ok(state) => cell.state = state,
                Err(_) => cell.state = LifecycleState::Error,
            }
            self.init_done.notify_all();

            return match (outcome, cell.ops) {
                (Ok(_), Some(ops)) => Ok(ops),
                (Err(error), _) => Err(error),
                // Unreachable by construction: a successful chain always
                // resolved the operation set.
                (Ok(_), None) => Err(HalError::HardwareNotReady),
            };
        }
    }

    /// The Unbound → Bound → RegistersMapped → ClockReady chain. Every
    /// step is idempotent, so a chain resumed after a recovered fault
    /// simply redoes the cheap early steps.
    fn run_init_chain(
        &self,
        bound: Option<DeviceOps>,
    ) -> (Option<DeviceOps>, Result<LifecycleState>) {
        let _guard = self.op_lock.lock().unwrap();

        // Unbound -> Bound: resolve the family, bind the operation set.
        let ops = match bound {
            Some(ops) => ops,
            None => {
                let family =
                    DeviceFamily::from_pci_id(self.identity.vendor_id, self.identity.device_id);
                match family {
                    Some(family) => {
                        log::debug!("adapter {} bound as {family}", self.identity);
                        DeviceOps::bind(family)
                    }
                    None => {
                        log::error!("adapter {} is not a supported device", self.identity);
                        return (
                            None,
                            Err(HalError::InvalidParameter("unrecognized vendor/device id")),
                        );
                    }
                }
            }
        };

        // Bound -> RegistersMapped: prove the window decodes reads at
        // all before trusting it with a bring-up sequence.
        if let Err(error) = self.bus.read(ops.map().device_status) {
            log::error!("adapter {} register window unreadable", self.identity);
            return (Some(ops), Err(error.into()));
        }

        // Terminal for families without a hardware clock.
        if !ops.capabilities().contains(Capabilities::BASIC_1588) {
            return (Some(ops), Ok(LifecycleState::RegistersMapped));
        }

        // RegistersMapped -> ClockReady: family bring-up, then prove the
        // clock is actually counting.
        let result = ops.init_ptp(&self.bus).and_then(|()| {
            let clock = ops.map().clock(ops.family())?;
            ptp::verify_advancing(
                &self.bus,
                clock,
                self.timing.clock_probe_interval(),
                self.timing.clock_probe_retries,
            )
        });

        match result {
            Ok(()) => {
                log::info!("adapter {} clock ready", self.identity);
                (Some(ops), Ok(LifecycleState::ClockReady))
            }
            Err(error) => (Some(ops), Err(error)),
        }
    }

    /// Funnel for operation results: a window fault is irrecoverable and
    /// moves the context to `Error`.
    fn guard<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(HalError::HardwareFault) = &result {
            log::error!(
                "adapter {} register window fault; explicit re-initialization required",
                self.identity
            );
            self.cell.lock().unwrap().state = LifecycleState::Error;
        }
        result
    }
}

fn require(ops: &DeviceOps, needed: Capabilities, feature: &'static str) -> Result<()> {
    if ops.capabilities().contains(needed) {
        Ok(())
    } else {
        Err(HalError::UnsupportedCapability {
            family: ops.family(),
            feature,
        })
    }
}
