//! The 802.1Qbu frame preemption configurator.

use crate::error::{HalError, Result};
use crate::mmio::MmioBus;
use crate::registers::{bits, TsnRegisters};

pub const MIN_FRAGMENT_FLOOR: u32 = 64;
pub const MIN_FRAGMENT_CEILING: u32 = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramePreemptionConfig {
    /// Queues whose frames may be interrupted mid-transmission.
    pub preemptable_queues: u8,
    /// Smallest fragment the MAC may produce, 64..=256 bytes.
    pub min_fragment_size_bytes: u32,
    /// Skip the verification handshake with the link partner.
    pub verify_disable: bool,
}

/// Pack and write the preemption register. The hardware accepts this
/// register unconditionally, so there is no verification re-read; the
/// capability gate in the adapter layer is what keeps this write off
/// families whose register space does not decode it.
pub(crate) fn configure<B: MmioBus>(
    bus: &B,
    tsn: &TsnRegisters,
    config: &FramePreemptionConfig,
) -> Result<()> {
    if !(MIN_FRAGMENT_FLOOR..=MIN_FRAGMENT_CEILING).contains(&config.min_fragment_size_bytes) {
        return Err(HalError::InvalidParameter(
            "minimum fragment size outside 64..=256 bytes",
        ));
    }

    let mut value = (u32::from(config.preemptable_queues) << bits::FP_PREEMPTABLE_QUEUES_SHIFT)
        | (config.min_fragment_size_bytes & bits::FP_MIN_FRAGMENT_MASK)
        | bits::FP_CONFIG_ENABLE;
    if !config.verify_disable {
        value |= bits::FP_CONFIG_VERIFY_ENABLE;
    }

    bus.write(tsn.fp_config, value)?;

    log::debug!(
        "frame preemption on: queues {:#04x}, min fragment {}B, verify {}",
        config.preemptable_queues,
        config.min_fragment_size_bytes,
        if config.verify_disable { "off" } else { "on" },
    );

    Ok(())
}
