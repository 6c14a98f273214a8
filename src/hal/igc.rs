//! Clock bring-up for the igc-class parts (I225, I226).
//!
//! The PHC on these parts starts counting on the first SYSTIM write;
//! there is no enable sequence beyond seeding it.

use super::{nominal_rate_word, CLOCK_SEED};
use crate::error::Result;
use crate::family::DeviceFamily;
use crate::mmio::MmioBus;
use crate::ptp;
use crate::registers::{bits, RegisterMap};

pub(super) fn init_ptp<B: MmioBus>(
    bus: &B,
    family: DeviceFamily,
    nominal_increment_ns: u8,
) -> Result<()> {
    let map = RegisterMap::for_family(family);
    let clock = map.clock(family)?;

    bus.write(clock.rate_increment, nominal_rate_word(nominal_increment_ns))?;

    let sample = ptp::read_clock(bus, clock)?;
    if sample.nanos() == 0 {
        log::debug!("{family} clock idle at zero, seeding");
        bus.write(clock.systim_low, CLOCK_SEED)?;
        bus.write(clock.systim_high, 0)?;
    }

    for timesync in [clock.rx_timesync_control, clock.tx_timesync_control] {
        let value = bus.read(timesync)?;
        if value & bits::TSYNC_ENABLED == 0 {
            bus.write(timesync, value | bits::TSYNC_ENABLED)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mmio::test::MockBus;

    #[test]
    fn idle_clock_is_seeded_once() {
        let bus = MockBus::with_stuck_clock(DeviceFamily::I226);
        let clock = RegisterMap::for_family(DeviceFamily::I226).clock.unwrap();

        init_ptp(&bus, DeviceFamily::I226, 8).unwrap();

        assert_eq!(bus.writes_to(clock.systim_low), vec![CLOCK_SEED]);
        assert_ne!(bus.systim_value(), 0);
    }

    #[test]
    fn running_clock_is_not_reseeded() {
        let bus = MockBus::for_family(DeviceFamily::I225);
        let clock = RegisterMap::for_family(DeviceFamily::I225).clock.unwrap();

        init_ptp(&bus, DeviceFamily::I225, 8).unwrap();

        assert!(bus.writes_to(clock.systim_low).is_empty());
    }
}
