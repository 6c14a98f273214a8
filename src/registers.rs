//! Per-family register maps.
//!
//! Offsets are generation-specific constants taken from the e1000/igb/igc
//! datasheets; nothing here is probed at runtime. Families that share
//! silicon share identical tables, which the tests enforce.

use core::fmt::{self, Display, Formatter};

use crate::capability::{capabilities_of, Capabilities};
use crate::error::{HalError, Result};
use crate::family::DeviceFamily;

/// Symbolic register names, the only way other components address
/// hardware. Queue-indexed registers carry their queue number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    DeviceControl,
    DeviceStatus,
    MdioControl,
    SystimLow,
    SystimHigh,
    RateIncrement,
    AuxControl,
    PhaseAdjustLow,
    PhaseAdjustHigh,
    TxTimesyncControl,
    RxTimesyncControl,
    TasControl,
    TasBaseTimeLow,
    TasBaseTimeHigh,
    TasCycleTime,
    TasCycleTimeShadow,
    GateWindowStart(u8),
    GateWindowEnd(u8),
    QueueControl(u8),
    FramePreemptionConfig,
}

impl Display for Register {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Register::DeviceControl => write!(f, "device-control"),
            Register::DeviceStatus => write!(f, "device-status"),
            Register::MdioControl => write!(f, "mdio-control"),
            Register::SystimLow => write!(f, "clock-low"),
            Register::SystimHigh => write!(f, "clock-high"),
            Register::RateIncrement => write!(f, "rate-increment"),
            Register::AuxControl => write!(f, "auxiliary-control"),
            Register::PhaseAdjustLow => write!(f, "phase-adjust-low"),
            Register::PhaseAdjustHigh => write!(f, "phase-adjust-high"),
            Register::TxTimesyncControl => write!(f, "tx-timesync-control"),
            Register::RxTimesyncControl => write!(f, "rx-timesync-control"),
            Register::TasControl => write!(f, "tas-control"),
            Register::TasBaseTimeLow => write!(f, "tas-base-time-low"),
            Register::TasBaseTimeHigh => write!(f, "tas-base-time-high"),
            Register::TasCycleTime => write!(f, "tas-cycle-time"),
            Register::TasCycleTimeShadow => write!(f, "tas-cycle-time-shadow"),
            Register::GateWindowStart(q) => write!(f, "gate-window-start[{q}]"),
            Register::GateWindowEnd(q) => write!(f, "gate-window-end[{q}]"),
            Register::QueueControl(q) => write!(f, "queue-control[{q}]"),
            Register::FramePreemptionConfig => write!(f, "frame-preemption-config"),
        }
    }
}

/// The IEEE 1588 clock block of one family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockRegisters {
    pub systim_low: u32,
    pub systim_high: u32,
    pub rate_increment: u32,
    /// Absent on the PCH-class parts, whose clock cannot be gated off.
    pub aux_control: Option<u32>,
    /// Dedicated one-shot offset registers. Families without them step
    /// the clock through the set path instead.
    pub phase_adjust_low: Option<u32>,
    pub phase_adjust_high: Option<u32>,
    pub tx_timesync_control: u32,
    pub rx_timesync_control: u32,
}

/// The 802.1Qbv/Qbu block. Only present on the TSN generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TsnRegisters {
    pub control: u32,
    pub base_time_low: u32,
    pub base_time_high: u32,
    pub cycle_time: u32,
    pub cycle_time_shadow: Option<u32>,
    pub gate_start_base: u32,
    pub gate_end_base: u32,
    pub queue_control_base: u32,
    pub fp_config: u32,
}

/// How many per-queue gate window register pairs the TSN block exposes.
pub const GATE_QUEUE_COUNT: u8 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterMap {
    pub device_control: u32,
    pub device_status: u32,
    pub mdio_control: Option<u32>,
    pub clock: Option<ClockRegisters>,
    pub tsn: Option<TsnRegisters>,
}

const IGB_CLOCK: ClockRegisters = ClockRegisters {
    systim_low: 0x0b600,
    systim_high: 0x0b604,
    rate_increment: 0x0b608,
    aux_control: Some(0x0b640),
    phase_adjust_low: Some(0x0b60c),
    phase_adjust_high: Some(0x0b610),
    tx_timesync_control: 0x0b614,
    rx_timesync_control: 0x0b620,
};

// The PCH integrated MACs share the clock word layout but omit the
// auxiliary control and the dedicated phase adjust pair entirely.
const PCH_CLOCK: ClockRegisters = ClockRegisters {
    systim_low: 0x0b600,
    systim_high: 0x0b604,
    rate_increment: 0x0b608,
    aux_control: None,
    phase_adjust_low: None,
    phase_adjust_high: None,
    tx_timesync_control: 0x0b614,
    rx_timesync_control: 0x0b620,
};

const IGC_CLOCK: ClockRegisters = ClockRegisters {
    systim_low: 0x0b600,
    systim_high: 0x0b604,
    rate_increment: 0x0b608,
    aux_control: Some(0x0b640),
    // Single signed register on igc; there is no high half.
    phase_adjust_low: Some(0x0b60c),
    phase_adjust_high: None,
    tx_timesync_control: 0x0b614,
    rx_timesync_control: 0x0b620,
};

const IGC_TSN: TsnRegisters = TsnRegisters {
    control: 0x3570,
    base_time_low: 0x3314,
    base_time_high: 0x3318,
    cycle_time: 0x331c,
    cycle_time_shadow: Some(0x3320),
    gate_start_base: 0x3340,
    gate_end_base: 0x3380,
    queue_control_base: 0x3300,
    fp_config: 0x3578,
};

const LEGACY_MAP: RegisterMap = RegisterMap {
    device_control: 0x00000,
    device_status: 0x00008,
    mdio_control: Some(0x00020),
    clock: None,
    tsn: None,
};

const IGB_MAP: RegisterMap = RegisterMap {
    device_control: 0x00000,
    device_status: 0x00008,
    mdio_control: Some(0x00020),
    clock: Some(IGB_CLOCK),
    tsn: None,
};

const I210_MAP: RegisterMap = RegisterMap {
    device_control: 0x00000,
    device_status: 0x00008,
    mdio_control: None,
    clock: Some(IGB_CLOCK),
    tsn: None,
};

const I217_MAP: RegisterMap = RegisterMap {
    device_control: 0x00000,
    device_status: 0x00008,
    mdio_control: None,
    clock: Some(PCH_CLOCK),
    tsn: None,
};

const I219_MAP: RegisterMap = RegisterMap {
    device_control: 0x00000,
    device_status: 0x00008,
    mdio_control: Some(0x00020),
    clock: Some(PCH_CLOCK),
    tsn: None,
};

const IGC_MAP: RegisterMap = RegisterMap {
    device_control: 0x00000,
    device_status: 0x00008,
    mdio_control: None,
    clock: Some(IGC_CLOCK),
    tsn: Some(IGC_TSN),
};

impl RegisterMap {
    /// The canonical table for one family.
    pub fn for_family(family: DeviceFamily) -> &'static RegisterMap {
        match family {
            DeviceFamily::E82575 | DeviceFamily::E82576 => &LEGACY_MAP,
            DeviceFamily::E82580 | DeviceFamily::I350 | DeviceFamily::I354 => &IGB_MAP,
            DeviceFamily::I210 => &I210_MAP,
            DeviceFamily::I217 => &I217_MAP,
            DeviceFamily::I219 => &I219_MAP,
            DeviceFamily::I225 | DeviceFamily::I226 => &IGC_MAP,
        }
    }

    pub(crate) fn clock(&self, family: DeviceFamily) -> Result<&ClockRegisters> {
        self.clock.as_ref().ok_or(HalError::MissingRegister {
            family,
            register: Register::SystimLow,
        })
    }

    pub(crate) fn tsn(&self, family: DeviceFamily) -> Result<&TsnRegisters> {
        self.tsn.as_ref().ok_or(HalError::MissingRegister {
            family,
            register: Register::TasControl,
        })
    }
}

/// Resolve a symbolic register name to this family's MMIO offset.
///
/// Failure here is a configuration error in the caller (asking a
/// generation for a register it does not implement), never a runtime
/// hardware fault.
pub fn offset_of(family: DeviceFamily, register: Register) -> Result<u32> {
    let map = RegisterMap::for_family(family);
    let missing = || HalError::MissingRegister { family, register };
    let clock = || map.clock.as_ref().ok_or_else(missing);
    let tsn = || map.tsn.as_ref().ok_or_else(missing);
    let queue = |q: u8, base: u32| {
        if q < GATE_QUEUE_COUNT {
            Ok(base + u32::from(q) * 4)
        } else {
            Err(HalError::InvalidParameter("queue index out of range"))
        }
    };

    match register {
        Register::DeviceControl => Ok(map.device_control),
        Register::DeviceStatus => Ok(map.device_status),
        Register::MdioControl => map.mdio_control.ok_or_else(missing),
        Register::SystimLow => Ok(clock()?.systim_low),
        Register::SystimHigh => Ok(clock()?.systim_high),
        Register::RateIncrement => Ok(clock()?.rate_increment),
        Register::AuxControl => clock()?.aux_control.ok_or_else(missing),
        Register::PhaseAdjustLow => clock()?.phase_adjust_low.ok_or_else(missing),
        Register::PhaseAdjustHigh => clock()?.phase_adjust_high.ok_or_else(missing),
        Register::TxTimesyncControl => Ok(clock()?.tx_timesync_control),
        Register::RxTimesyncControl => Ok(clock()?.rx_timesync_control),
        Register::TasControl => Ok(tsn()?.control),
        Register::TasBaseTimeLow => Ok(tsn()?.base_time_low),
        Register::TasBaseTimeHigh => Ok(tsn()?.base_time_high),
        Register::TasCycleTime => Ok(tsn()?.cycle_time),
        Register::TasCycleTimeShadow => tsn()?.cycle_time_shadow.ok_or_else(missing),
        Register::GateWindowStart(q) => queue(q, tsn()?.gate_start_base),
        Register::GateWindowEnd(q) => queue(q, tsn()?.gate_end_base),
        Register::QueueControl(q) => queue(q, tsn()?.queue_control_base),
        Register::FramePreemptionConfig => Ok(tsn()?.fp_config),
    }
}

/// Bit-field layouts for the registers above.
pub mod bits {
    /// Holds SYSTIM in reset while set.
    pub const TSAUXC_DISABLE_SYSTIME: u32 = 1 << 31;
    /// Enables the hardware clock auxiliary block.
    pub const TSAUXC_PHC_ENABLE: u32 = 1 << 30;

    /// Enable bit shared by the Rx and Tx timesync control registers.
    pub const TSYNC_ENABLED: u32 = 1 << 4;

    /// Whole nanoseconds per tick live in the top byte of the rate
    /// increment register; the low 24 bits are the fractional field.
    pub const RATE_INCREMENT_SHIFT: u32 = 24;
    pub const RATE_FRACTION_MASK: u32 = 0x00ff_ffff;

    /// Sign bit of the phase adjust registers (subtract when set).
    pub const PHASE_ADJUST_NEGATIVE: u32 = 1 << 31;

    pub const TAS_CTRL_TRANSMIT_MODE_TSN: u32 = 1 << 0;
    pub const TAS_CTRL_ENHANCED_QAV: u32 = 1 << 3;
    /// I226 only: suppresses the future-schedule check in hardware.
    pub const TAS_CTRL_FUTURE_SCHED_DISABLE: u32 = 1 << 23;

    pub const FP_CONFIG_ENABLE: u32 = 1 << 31;
    pub const FP_CONFIG_VERIFY_ENABLE: u32 = 1 << 30;
    pub const FP_PREEMPTABLE_QUEUES_SHIFT: u32 = 16;
    pub const FP_MIN_FRAGMENT_MASK: u32 = 0x3ff;

    pub const MDIC_DATA_MASK: u32 = 0x0000_ffff;
    pub const MDIC_REG_SHIFT: u32 = 16;
    pub const MDIC_PHY_SHIFT: u32 = 21;
    pub const MDIC_OP_WRITE: u32 = 0x0400_0000;
    pub const MDIC_OP_READ: u32 = 0x0800_0000;
    pub const MDIC_READY: u32 = 1 << 28;
    pub const MDIC_ERROR: u32 = 1 << 30;
}

/// Cross-checks between the capability table and the register tables.
/// Cheap enough to run from an embedder's startup path; the test suite
/// runs it for every family.
pub fn validate_family_tables(family: DeviceFamily) -> Result<()> {
    let caps = capabilities_of(family);
    let map = RegisterMap::for_family(family);

    let coherent = caps.contains(Capabilities::BASIC_1588) == map.clock.is_some()
        && caps.contains(Capabilities::TAS) == map.tsn.is_some()
        && caps.contains(Capabilities::MDIO) == map.mdio_control.is_some();

    if coherent {
        Ok(())
    } else {
        log::error!("register map for {family} contradicts its capability table");
        Err(HalError::MissingRegister {
            family,
            register: Register::DeviceStatus,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_and_register_tables_agree() {
        for family in DeviceFamily::ALL {
            validate_family_tables(family).unwrap();
        }
    }

    #[test]
    fn shared_silicon_shares_offsets() {
        // I354 is an I350 die; the whole map must match.
        assert_eq!(
            RegisterMap::for_family(DeviceFamily::I350),
            RegisterMap::for_family(DeviceFamily::I354),
        );

        // Every family with a clock uses the same common clock word
        // addresses, whatever else differs.
        let mut clocks = DeviceFamily::ALL
            .iter()
            .filter_map(|family| RegisterMap::for_family(*family).clock);
        let first = clocks.next().unwrap();
        for clock in clocks {
            assert_eq!(clock.systim_low, first.systim_low);
            assert_eq!(clock.systim_high, first.systim_high);
            assert_eq!(clock.rate_increment, first.rate_increment);
        }
    }

    #[test]
    fn pch_parts_omit_the_auxiliary_control_register() {
        for family in [DeviceFamily::I217, DeviceFamily::I219] {
            assert_eq!(
                offset_of(family, Register::AuxControl),
                Err(HalError::MissingRegister {
                    family,
                    register: Register::AuxControl
                })
            );
        }

        assert_eq!(offset_of(DeviceFamily::I210, Register::AuxControl), Ok(0x0b640));
    }

    #[test]
    fn clockless_families_have_no_clock_offsets() {
        for family in [DeviceFamily::E82575, DeviceFamily::E82576] {
            assert!(offset_of(family, Register::SystimLow).is_err());
            assert!(offset_of(family, Register::TasControl).is_err());
            assert_eq!(offset_of(family, Register::MdioControl), Ok(0x20));
        }
    }

    #[test]
    fn gate_window_offsets_stride_by_queue() {
        assert_eq!(
            offset_of(DeviceFamily::I225, Register::GateWindowStart(0)),
            Ok(0x3340)
        );
        assert_eq!(
            offset_of(DeviceFamily::I225, Register::GateWindowStart(3)),
            Ok(0x334c)
        );
        assert_eq!(
            offset_of(DeviceFamily::I226, Register::GateWindowEnd(7)),
            Ok(0x339c)
        );
        assert_eq!(
            offset_of(DeviceFamily::I226, Register::GateWindowStart(8)),
            Err(HalError::InvalidParameter("queue index out of range"))
        );
    }

    #[test]
    fn tas_offsets_exist_only_on_tsn_generations() {
        for family in DeviceFamily::ALL {
            assert_eq!(
                offset_of(family, Register::TasControl).is_ok(),
                family.is_tsn_generation()
            );
        }
    }
}
