//! Generation dispatch.
//!
//! A closed enum with one variant per [`DeviceFamily`], resolved once
//! when the adapter binds and held by value in its context. Adding a
//! family without covering every operation fails to compile instead of
//! failing at runtime with an empty dispatch slot.

pub(crate) mod mdio;

mod igb;
mod igc;
mod pch;

use crate::capability::{capabilities_of, Capabilities};
use crate::error::Result;
use crate::family::DeviceFamily;
use crate::mmio::MmioBus;
use crate::registers::{bits, RegisterMap};

/// The value a reset clock is seeded with; any non-zero write starts the
/// counter on the parts that idle at zero.
pub(crate) const CLOCK_SEED: u32 = 0x1000_0000;

pub(crate) fn nominal_rate_word(nominal_increment_ns: u8) -> u32 {
    u32::from(nominal_increment_ns) << bits::RATE_INCREMENT_SHIFT
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct LegacyOps {
    family: DeviceFamily,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct IgbOps {
    family: DeviceFamily,
    /// Reset and reseed the clock block when it is found stuck at zero.
    /// The I210 ships that way after power-up; the others do not need it.
    stuck_clock_recovery: bool,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct PchOps {
    family: DeviceFamily,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct IgcOps {
    family: DeviceFamily,
    /// The I226 clears the base time instead of latching the schedule
    /// unless the low half is rewritten through zero first.
    base_rewrite_fallback: bool,
}

/// The operation set for one adapter, one variant per family.
#[derive(Debug, Clone, Copy)]
pub(crate) enum DeviceOps {
    E82575(LegacyOps),
    E82576(LegacyOps),
    E82580(IgbOps),
    I350(IgbOps),
    I354(IgbOps),
    I210(IgbOps),
    I217(PchOps),
    I219(PchOps),
    I225(IgcOps),
    I226(IgcOps),
}

impl DeviceOps {
    pub(crate) fn bind(family: DeviceFamily) -> Self {
        match family {
            DeviceFamily::E82575 => DeviceOps::E82575(LegacyOps { family }),
            DeviceFamily::E82576 => DeviceOps::E82576(LegacyOps { family }),
            DeviceFamily::E82580 => DeviceOps::E82580(IgbOps {
                family,
                stuck_clock_recovery: false,
            }),
            DeviceFamily::I350 => DeviceOps::I350(IgbOps {
                family,
                stuck_clock_recovery: false,
            }),
            DeviceFamily::I354 => DeviceOps::I354(IgbOps {
                family,
                stuck_clock_recovery: false,
            }),
            DeviceFamily::I210 => DeviceOps::I210(IgbOps {
                family,
                stuck_clock_recovery: true,
            }),
            DeviceFamily::I217 => DeviceOps::I217(PchOps { family }),
            DeviceFamily::I219 => DeviceOps::I219(PchOps { family }),
            DeviceFamily::I225 => DeviceOps::I225(IgcOps {
                family,
                base_rewrite_fallback: false,
            }),
            DeviceFamily::I226 => DeviceOps::I226(IgcOps {
                family,
                base_rewrite_fallback: true,
            }),
        }
    }

    pub(crate) fn family(&self) -> DeviceFamily {
        match self {
            DeviceOps::E82575(ops) | DeviceOps::E82576(ops) => ops.family,
            DeviceOps::E82580(ops)
            | DeviceOps::I350(ops)
            | DeviceOps::I354(ops)
            | DeviceOps::I210(ops) => ops.family,
            DeviceOps::I217(ops) | DeviceOps::I219(ops) => ops.family,
            DeviceOps::I225(ops) | DeviceOps::I226(ops) => ops.family,
        }
    }

    pub(crate) fn capabilities(&self) -> Capabilities {
        capabilities_of(self.family())
    }

    pub(crate) fn map(&self) -> &'static RegisterMap {
        RegisterMap::for_family(self.family())
    }

    /// Whole nanoseconds the clock adds per hardware tick at the nominal
    /// rate. 8ns at a 125MHz base tick across all clock-bearing parts.
    pub(crate) fn nominal_increment_ns(&self) -> u8 {
        8
    }

    pub(crate) fn base_tick_mhz(&self) -> u32 {
        125
    }

    pub(crate) fn tas_base_rewrite_fallback(&self) -> bool {
        match self {
            DeviceOps::I225(ops) | DeviceOps::I226(ops) => ops.base_rewrite_fallback,
            _ => false,
        }
    }

    /// Bring the hardware clock out of reset, family style. The caller
    /// verifies advancement afterwards; this only performs the writes.
    pub(crate) fn init_ptp<B: MmioBus>(&self, bus: &B) -> Result<()> {
        match self {
            // Nothing to bring up; these parts have no usable clock.
            DeviceOps::E82575(_) | DeviceOps::E82576(_) => Ok(()),
            DeviceOps::E82580(ops)
            | DeviceOps::I350(ops)
            | DeviceOps::I354(ops)
            | DeviceOps::I210(ops) => igb::init_ptp(
                bus,
                ops.family,
                self.nominal_increment_ns(),
                ops.stuck_clock_recovery,
            ),
            DeviceOps::I217(ops) | DeviceOps::I219(ops) => {
                pch::init_ptp(bus, ops.family, self.nominal_increment_ns())
            }
            DeviceOps::I225(ops) | DeviceOps::I226(ops) => {
                igc::init_ptp(bus, ops.family, self.nominal_increment_ns())
            }
        }
    }
}
