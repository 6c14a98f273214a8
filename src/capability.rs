//! The static capability registry.
//!
//! Capabilities are declared per family by pure table lookup, never by
//! runtime feature probing: hardware that half-answers a probe is exactly
//! how a pre-TSN part ends up advertising a shaper it cannot run.

use bitflags::bitflags;

use crate::family::DeviceFamily;

bitflags! {
    /// The feature bits a silicon generation physically supports.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Capabilities: u32 {
        /// IEEE 1588 hardware clock (SYSTIM block).
        const BASIC_1588 = 1 << 0;
        /// Per-packet Rx/Tx timestamping beyond the bare clock.
        const ENHANCED_TIMESTAMPING = 1 << 1;
        /// 802.1Qbv time-aware shaper.
        const TAS = 1 << 2;
        /// 802.1Qbu frame preemption.
        const FRAME_PREEMPTION = 1 << 3;
        /// PCIe precision time measurement.
        const PCIE_PTM = 1 << 4;
        const SPEED_2_5G = 1 << 5;
        const ENERGY_EFFICIENT_ETHERNET = 1 << 6;
        const MMIO = 1 << 7;
        const MDIO = 1 << 8;
    }
}

impl Capabilities {
    /// The bits no pre-TSN generation may ever carry.
    pub const TSN_ONLY: Capabilities = Capabilities::TAS
        .union(Capabilities::FRAME_PREEMPTION)
        .union(Capabilities::PCIE_PTM);
}

/// Look up the declared capability set for a family. O(1), no probing.
pub fn capabilities_of(family: DeviceFamily) -> Capabilities {
    match family {
        DeviceFamily::E82575 | DeviceFamily::E82576 => {
            Capabilities::MMIO | Capabilities::MDIO
        }
        DeviceFamily::E82580 => {
            Capabilities::BASIC_1588 | Capabilities::MMIO | Capabilities::MDIO
        }
        DeviceFamily::I350 | DeviceFamily::I354 => {
            Capabilities::BASIC_1588
                | Capabilities::ENHANCED_TIMESTAMPING
                | Capabilities::ENERGY_EFFICIENT_ETHERNET
                | Capabilities::MMIO
                | Capabilities::MDIO
        }
        DeviceFamily::I210 => {
            Capabilities::BASIC_1588
                | Capabilities::ENHANCED_TIMESTAMPING
                | Capabilities::ENERGY_EFFICIENT_ETHERNET
                | Capabilities::MMIO
        }
        DeviceFamily::I217 => Capabilities::BASIC_1588 | Capabilities::MMIO,
        DeviceFamily::I219 => {
            Capabilities::BASIC_1588
                | Capabilities::ENHANCED_TIMESTAMPING
                | Capabilities::MMIO
                | Capabilities::MDIO
        }
        DeviceFamily::I225 | DeviceFamily::I226 => {
            Capabilities::BASIC_1588
                | Capabilities::ENHANCED_TIMESTAMPING
                | Capabilities::TAS
                | Capabilities::FRAME_PREEMPTION
                | Capabilities::PCIE_PTM
                | Capabilities::SPEED_2_5G
                | Capabilities::ENERGY_EFFICIENT_ETHERNET
                | Capabilities::MMIO
        }
    }
}

/// Check an externally observed capability bitset against the canonical
/// table and return the bits that were declared but are not actually
/// supported. An empty result means the declaration is honest.
///
/// This is the regression check against capability drift: reporting paths
/// that assemble their own bitsets get compared against this table in the
/// test suite, and at runtime any non-empty result is logged loudly.
pub fn assert_no_false_advertising(
    family: DeviceFamily,
    declared: Capabilities,
) -> Capabilities {
    let falsely_declared = declared.difference(capabilities_of(family));

    if !falsely_declared.is_empty() {
        log::error!(
            "{family} reported capabilities it does not have: {falsely_declared:?}"
        );
    }

    falsely_declared
}
