//! Device family resolution from PCI identifiers.

use core::fmt::{self, Display, Formatter};

use serde::Deserialize;

/// Intel's PCI vendor identifier. Every supported controller carries it.
pub const INTEL_VENDOR_ID: u16 = 0x8086;

/// A silicon generation with one register map and one feature set.
///
/// A family is resolved exactly once from the PCI vendor/device identifier
/// pair when the adapter is first addressed, and is immutable afterwards.
/// Families that share silicon (I350/I354) share identical common register
/// offsets; the register map tests enforce this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceFamily {
    /// 82575, the oldest supported generation. No usable timestamping.
    E82575,
    /// 82576. No reliable timestamping either.
    E82576,
    /// 82580, the first generation with an IEEE 1588 hardware clock.
    E82580,
    I350,
    /// An I350 die with integrated backplane PHYs. Same register map.
    I354,
    /// I210/I211 client controllers with enhanced timestamping. The I211
    /// is a reduced I210 and is folded into this family.
    I210,
    I217,
    I219,
    /// First 2.5G generation with the full TSN block.
    I225,
    I226,
}

impl DeviceFamily {
    /// Every family, in introduction order. Handy for table validation.
    pub const ALL: [DeviceFamily; 10] = [
        DeviceFamily::E82575,
        DeviceFamily::E82576,
        DeviceFamily::E82580,
        DeviceFamily::I350,
        DeviceFamily::I354,
        DeviceFamily::I210,
        DeviceFamily::I217,
        DeviceFamily::I219,
        DeviceFamily::I225,
        DeviceFamily::I226,
    ];

    /// Resolve a PCI vendor/device identifier pair to a family.
    ///
    /// Returns `None` for non-Intel hardware and for Intel device ids this
    /// module does not know; discovery treats both as "not ours".
    pub fn from_pci_id(vendor_id: u16, device_id: u16) -> Option<Self> {
        if vendor_id != INTEL_VENDOR_ID {
            return None;
        }

        let family = match device_id {
            0x10a7 | 0x10a9 => DeviceFamily::E82575,
            0x10c9 | 0x10e6 | 0x10e7 | 0x10e8 => DeviceFamily::E82576,
            0x150e | 0x150f | 0x1510 | 0x1511 | 0x1516 => DeviceFamily::E82580,
            0x1521 | 0x1522 | 0x1523 | 0x1524 => DeviceFamily::I350,
            0x1f40 | 0x1f41 | 0x1f45 => DeviceFamily::I354,
            0x1533 | 0x1536 | 0x1537 | 0x1538 | 0x1539 | 0x157b | 0x157c => DeviceFamily::I210,
            0x153a | 0x153b => DeviceFamily::I217,
            0x15b7 | 0x15b8 | 0x15b9 | 0x15bb | 0x15d6 | 0x15d7 | 0x15d8 | 0x15e3 => {
                DeviceFamily::I219
            }
            0x15f2 | 0x15f3 | 0x15f4 | 0x15f5 => DeviceFamily::I225,
            0x3100 | 0x3101 | 0x3102 => DeviceFamily::I226,
            _ => return None,
        };

        Some(family)
    }

    /// Families introduced after 802.1Qbv/Qbu standardization. Only these
    /// may ever advertise TSN features.
    pub fn is_tsn_generation(&self) -> bool {
        matches!(self, DeviceFamily::I225 | DeviceFamily::I226)
    }
}

impl Display for DeviceFamily {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            DeviceFamily::E82575 => write!(f, "82575"),
            DeviceFamily::E82576 => write!(f, "82576"),
            DeviceFamily::E82580 => write!(f, "82580"),
            DeviceFamily::I350 => write!(f, "I350"),
            DeviceFamily::I354 => write!(f, "I354"),
            DeviceFamily::I210 => write!(f, "I210"),
            DeviceFamily::I217 => write!(f, "I217"),
            DeviceFamily::I219 => write!(f, "I219"),
            DeviceFamily::I225 => write!(f, "I225"),
            DeviceFamily::I226 => write!(f, "I226"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn foreign_vendor_is_rejected() {
        assert_eq!(DeviceFamily::from_pci_id(0x10ec, 0x1533), None);
        assert_eq!(DeviceFamily::from_pci_id(0x8086, 0xffff), None);
    }

    #[test]
    fn known_device_ids_resolve() {
        let cases = [
            (0x1533, DeviceFamily::I210),
            (0x1539, DeviceFamily::I210),
            (0x153a, DeviceFamily::I217),
            (0x15b7, DeviceFamily::I219),
            (0x1521, DeviceFamily::I350),
            (0x1f40, DeviceFamily::I354),
            (0x15f2, DeviceFamily::I225),
            (0x3100, DeviceFamily::I226),
            (0x10c9, DeviceFamily::E82576),
            (0x150e, DeviceFamily::E82580),
        ];

        for (device_id, family) in cases {
            assert_eq!(
                DeviceFamily::from_pci_id(INTEL_VENDOR_ID, device_id),
                Some(family)
            );
        }
    }

    #[test]
    fn only_igc_parts_are_tsn_generations() {
        for family in DeviceFamily::ALL {
            assert_eq!(
                family.is_tsn_generation(),
                matches!(family, DeviceFamily::I225 | DeviceFamily::I226)
            );
        }
    }
}
