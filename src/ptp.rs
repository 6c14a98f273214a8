//! The PTP hardware clock engine.
//!
//! The hardware counter is a free-running 64-bit nanosecond value split
//! over two 32-bit registers. Reads are made torn-read-safe by sampling
//! the high half on both sides of the low half and retrying when it
//! moved; no lock is taken for a read.

use std::time::Duration;

use crate::config::StepPolicy;
use crate::error::{HalError, Result};
use crate::mmio::MmioBus;
use crate::registers::{bits, ClockRegisters};

/// A single read of the hardware clock, in nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct PtpClockSample {
    nanos: u64,
}

impl PtpClockSample {
    pub fn from_nanos(nanos: u64) -> Self {
        Self { nanos }
    }

    pub fn nanos(&self) -> u64 {
        self.nanos
    }

    fn from_halves(high: u32, low: u32) -> Self {
        Self {
            nanos: (u64::from(high) << 32) | u64::from(low),
        }
    }
}

/// Everything the clock query reports besides the sample itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ClockInfo {
    pub sample: PtpClockSample,
    pub rate_increment: u32,
    pub aux_control: u32,
    pub base_tick_mhz: u32,
}

/// How often a read retries when the high half moves underneath it. One
/// retry suffices for a real rollover; more than that means the bus is
/// returning garbage.
const TORN_READ_RETRIES: u32 = 3;

/// Read the clock without tearing across the 32-bit rollover boundary.
pub(crate) fn read_clock<B: MmioBus>(bus: &B, clock: &ClockRegisters) -> Result<PtpClockSample> {
    let mut high = bus.read(clock.systim_high)?;

    for _ in 0..=TORN_READ_RETRIES {
        let low = bus.read(clock.systim_low)?;
        let reread = bus.read(clock.systim_high)?;
        if reread == high {
            return Ok(PtpClockSample::from_halves(high, low));
        }
        // The low half rolled over between the two probes; the spliced
        // value would be off by ~4.3 seconds. Go again with the fresh
        // high half.
        high = reread;
    }

    log::warn!("clock high half kept moving across {TORN_READ_RETRIES} retries");
    Err(HalError::HardwareTimeout)
}

/// Demonstrate that the clock is actually counting: two samples taken a
/// probe interval apart must be strictly ordered.
pub(crate) fn verify_advancing<B: MmioBus>(
    bus: &B,
    clock: &ClockRegisters,
    interval: Duration,
    retries: u32,
) -> Result<()> {
    let mut previous = read_clock(bus, clock)?;

    for _ in 0..retries.max(1) {
        std::thread::sleep(interval);
        let current = read_clock(bus, clock)?;
        if current > previous {
            return Ok(());
        }
        previous = current;
    }

    log::error!("hardware clock is not advancing");
    Err(HalError::HardwareNotReady)
}

/// Write both clock halves. The counter keeps running from the written
/// value.
pub(crate) fn set_clock<B: MmioBus>(
    bus: &B,
    clock: &ClockRegisters,
    nanos: u64,
    last_sample: Option<u64>,
    policy: StepPolicy,
) -> Result<()> {
    if let Some(last) = last_sample {
        if nanos < last {
            match policy {
                StepPolicy::Strict => {
                    return Err(HalError::InvalidParameter(
                        "clock step behind the most recent sample",
                    ));
                }
                StepPolicy::Permissive => {
                    log::warn!(
                        "stepping clock backwards by {}ns past the most recent sample",
                        last - nanos
                    );
                }
            }
        }
    }

    write_clock(bus, clock, nanos)
}

fn write_clock<B: MmioBus>(bus: &B, clock: &ClockRegisters, nanos: u64) -> Result<()> {
    bus.write(clock.systim_low, nanos as u32)?;
    bus.write(clock.systim_high, (nanos >> 32) as u32)?;
    Ok(())
}

/// Rewrite the rate increment register and hand back the previous value
/// for the caller's audit trail.
pub(crate) fn adjust_frequency<B: MmioBus>(
    bus: &B,
    clock: &ClockRegisters,
    increment_ns: u8,
    fractional: u32,
    nominal_increment_ns: u8,
    trim_limit_ppb: u32,
) -> Result<u32> {
    if fractional > bits::RATE_FRACTION_MASK {
        return Err(HalError::InvalidParameter(
            "fractional field wider than 24 bits",
        ));
    }

    let requested = f64::from(increment_ns) + f64::from(fractional) / f64::from(1u32 << 24);
    let offset_ppb = (requested / f64::from(nominal_increment_ns) - 1.0) * 1e9;
    if offset_ppb.abs() > f64::from(trim_limit_ppb) {
        return Err(HalError::InvalidParameter(
            "rate offset beyond the configured trim limit",
        ));
    }

    let previous = bus.read(clock.rate_increment)?;
    bus.write(
        clock.rate_increment,
        (u32::from(increment_ns) << bits::RATE_INCREMENT_SHIFT) | fractional,
    )?;

    log::debug!(
        "rate increment {previous:#010x} -> {increment_ns}ns + {fractional}/2^24 ({offset_ppb:+.1}ppb)"
    );

    Ok(previous)
}

/// Apply a one-shot signed offset to the running clock.
///
/// Generations with a dedicated adjust register use it; the PCH parts
/// have none and step through the clock registers instead.
pub(crate) fn adjust_phase<B: MmioBus>(
    bus: &B,
    clock: &ClockRegisters,
    offset_ns: i64,
) -> Result<()> {
    let negative = offset_ns < 0;
    let magnitude = offset_ns.unsigned_abs();

    match (clock.phase_adjust_low, clock.phase_adjust_high) {
        (Some(low), Some(high)) => {
            if magnitude > u64::from(u32::MAX) {
                return Err(HalError::InvalidParameter(
                    "phase offset wider than the adjust register pair",
                ));
            }
            // Magnitude first; the high write carries the sign and
            // triggers the adjustment.
            bus.write(low, magnitude as u32)?;
            bus.write(high, if negative { bits::PHASE_ADJUST_NEGATIVE } else { 0 })?;
            Ok(())
        }
        (Some(low), None) => {
            if magnitude >= u64::from(bits::PHASE_ADJUST_NEGATIVE) {
                return Err(HalError::InvalidParameter(
                    "phase offset wider than the adjust register",
                ));
            }
            let mut value = magnitude as u32;
            if negative {
                value |= bits::PHASE_ADJUST_NEGATIVE;
            }
            bus.write(low, value)?;
            Ok(())
        }
        _ => {
            let sample = read_clock(bus, clock)?;
            let target = if negative {
                sample.nanos().saturating_sub(magnitude)
            } else {
                sample.nanos().saturating_add(magnitude)
            };
            write_clock(bus, clock, target)
        }
    }
}

pub(crate) fn clock_info<B: MmioBus>(
    bus: &B,
    clock: &ClockRegisters,
    base_tick_mhz: u32,
) -> Result<ClockInfo> {
    let sample = read_clock(bus, clock)?;
    let rate_increment = bus.read(clock.rate_increment)?;
    let aux_control = match clock.aux_control {
        Some(offset) => bus.read(offset)?,
        // The PCH generations have no auxiliary control block at all.
        None => 0,
    };

    Ok(ClockInfo {
        sample,
        rate_increment,
        aux_control,
        base_tick_mhz,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::family::DeviceFamily;
    use crate::mmio::test::MockBus;
    use crate::registers::RegisterMap;

    fn clock_of(family: DeviceFamily) -> &'static ClockRegisters {
        RegisterMap::for_family(family).clock.as_ref().unwrap()
    }

    #[test]
    fn read_survives_rollover_between_half_reads() {
        let bus = MockBus::for_family(DeviceFamily::I210);
        let clock = clock_of(DeviceFamily::I210);

        // Park the counter just below the 32-bit boundary with a tick
        // large enough to roll over between the two high-half probes.
        bus.set_systim(0xffff_fff0, 0x20);

        let sample = read_clock(&bus, clock).unwrap();

        // The spliced value would have been 0x0_ffffff10 or
        // 0x1_fffffff0; a self-consistent one carries the new high half
        // with a matching low half.
        assert_eq!(sample.nanos() >> 32, 1);
        assert!(sample.nanos() & 0xffff_ffff < 0x100);
    }

    #[test]
    fn strict_policy_rejects_backward_steps() {
        let bus = MockBus::for_family(DeviceFamily::I210);
        let clock = clock_of(DeviceFamily::I210);

        let result = set_clock(&bus, clock, 1_000, Some(2_000), StepPolicy::Strict);
        assert_eq!(
            result,
            Err(HalError::InvalidParameter(
                "clock step behind the most recent sample"
            ))
        );

        // Permissive applies the same step and only logs.
        set_clock(&bus, clock, 1_000, Some(2_000), StepPolicy::Permissive).unwrap();
        assert!(bus.systim_value() < 2_000);
    }

    #[test]
    fn frequency_adjustment_round_trips_the_top_byte() {
        let bus = MockBus::for_family(DeviceFamily::I210);
        let clock = clock_of(DeviceFamily::I210);
        bus.set_reg(clock.rate_increment, 0x0800_0000);

        let previous = adjust_frequency(&bus, clock, 8, 0x1000, 8, 500_000).unwrap();
        assert_eq!(previous, 0x0800_0000);

        let readback = bus.reg(clock.rate_increment);
        assert_eq!(readback >> bits::RATE_INCREMENT_SHIFT, 8);
        assert_eq!(readback & bits::RATE_FRACTION_MASK, 0x1000);
    }

    #[test]
    fn out_of_range_trim_is_rejected_before_any_write() {
        let bus = MockBus::for_family(DeviceFamily::I210);
        let clock = clock_of(DeviceFamily::I210);

        // A whole extra nanosecond per tick is a 12.5% rate change, far
        // beyond any realistic trim ceiling.
        assert!(adjust_frequency(&bus, clock, 9, 0, 8, 500_000).is_err());
        assert!(adjust_frequency(&bus, clock, 8, 1 << 24, 8, 500_000).is_err());
        assert_eq!(bus.writes_to(clock.rate_increment), Vec::<u32>::new());
    }

    #[test]
    fn phase_adjust_uses_the_register_pair_on_igb() {
        let bus = MockBus::for_family(DeviceFamily::I210);
        let clock = clock_of(DeviceFamily::I210);

        adjust_phase(&bus, clock, -1_500).unwrap();

        assert_eq!(bus.reg(clock.phase_adjust_low.unwrap()), 1_500);
        assert_eq!(
            bus.reg(clock.phase_adjust_high.unwrap()),
            bits::PHASE_ADJUST_NEGATIVE
        );
    }

    #[test]
    fn phase_adjust_packs_sign_into_the_single_igc_register() {
        let bus = MockBus::for_family(DeviceFamily::I226);
        let clock = clock_of(DeviceFamily::I226);

        adjust_phase(&bus, clock, -250).unwrap();
        assert_eq!(
            bus.reg(clock.phase_adjust_low.unwrap()),
            250 | bits::PHASE_ADJUST_NEGATIVE
        );

        // 31 bits of magnitude is all the register has.
        assert!(adjust_phase(&bus, clock, i64::from(i32::MAX) + 1).is_err());
    }

    #[test]
    fn phase_adjust_steps_the_clock_on_pch() {
        let bus = MockBus::for_family(DeviceFamily::I219);
        let clock = clock_of(DeviceFamily::I219);
        bus.set_systim(1_000_000, 0);

        adjust_phase(&bus, clock, 2_000).unwrap();
        assert_eq!(bus.systim_value(), 1_002_000);
    }

    #[test]
    fn clock_info_reports_zero_aux_control_on_pch() {
        let bus = MockBus::for_family(DeviceFamily::I219);
        let clock = clock_of(DeviceFamily::I219);
        bus.set_reg(clock.rate_increment, 0x0800_0042);

        let info = clock_info(&bus, clock, 125).unwrap();
        assert_eq!(info.rate_increment, 0x0800_0042);
        assert_eq!(info.aux_control, 0);
        assert_eq!(info.base_tick_mhz, 125);
    }
}
