//! Clock bring-up for the igb-class parts (82580, I350/I354, I210).

use super::{nominal_rate_word, CLOCK_SEED};
use crate::error::{HalError, Result};
use crate::family::DeviceFamily;
use crate::mmio::MmioBus;
use crate::ptp;
use crate::registers::{bits, Register, RegisterMap};

pub(super) fn init_ptp<B: MmioBus>(
    bus: &B,
    family: DeviceFamily,
    nominal_increment_ns: u8,
    stuck_clock_recovery: bool,
) -> Result<()> {
    let map = RegisterMap::for_family(family);
    let clock = map.clock(family)?;
    let aux_control = clock.aux_control.ok_or(HalError::MissingRegister {
        family,
        register: Register::AuxControl,
    })?;

    let sample = ptp::read_clock(bus, clock)?;
    if sample.nanos() == 0 && stuck_clock_recovery {
        // A power-cycled part can come up with SYSTIM held at zero and
        // refuses to count until the whole block is reset and reseeded.
        log::info!("{family} clock stuck at zero, running the reset sequence");

        bus.write(aux_control, bits::TSAUXC_DISABLE_SYSTIME)?;
        bus.write(clock.systim_low, 0)?;
        bus.write(clock.systim_high, 0)?;
        bus.write(clock.rx_timesync_control, 0)?;
        bus.write(clock.tx_timesync_control, 0)?;
        bus.write(clock.rate_increment, nominal_rate_word(nominal_increment_ns))?;
        bus.write(aux_control, bits::TSAUXC_PHC_ENABLE)?;
        // The counter starts on the first non-zero seed.
        bus.write(clock.systim_low, CLOCK_SEED)?;
        bus.write(clock.systim_high, 0)?;
    } else {
        bus.write(clock.rate_increment, nominal_rate_word(nominal_increment_ns))?;

        let aux = bus.read(aux_control)?;
        if aux & bits::TSAUXC_DISABLE_SYSTIME != 0 {
            bus.write(aux_control, aux & !bits::TSAUXC_DISABLE_SYSTIME)?;
        }
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
    fn stuck_i210_clock_is_reset_and_reseeded() {
        let bus = MockBus::with_stuck_clock(DeviceFamily::I210);
        let clock = RegisterMap::for_family(DeviceFamily::I210).clock.unwrap();

        init_ptp(&bus, DeviceFamily::I210, 8, true).unwrap();

        // The reset held the clock in disable, then re-enabled it.
        let aux_writes = bus.writes_to(clock.aux_control.unwrap());
        assert_eq!(
            aux_writes,
            vec![bits::TSAUXC_DISABLE_SYSTIME, bits::TSAUXC_PHC_ENABLE]
        );

        // The seed write restarted the counter.
        assert_ne!(bus.systim_value(), 0);
        assert_eq!(
            bus.reg(clock.rate_increment),
            nominal_rate_word(8)
        );
    }

    #[test]
    fn running_clock_is_left_alone_apart_from_the_rate_word() {
        let bus = MockBus::for_family(DeviceFamily::I350);
        let clock = RegisterMap::for_family(DeviceFamily::I350).clock.unwrap();
        let before = bus.systim_value();

        init_ptp(&bus, DeviceFamily::I350, 8, false).unwrap();

        // No reset sequence: the counter was never rewritten.
        assert!(bus.writes_to(clock.systim_low).is_empty());
        assert!(bus.systim_value() >= before);
        assert_ne!(bus.reg(clock.rx_timesync_control) & bits::TSYNC_ENABLED, 0);
        assert_ne!(bus.reg(clock.tx_timesync_control) & bits::TSYNC_ENABLED, 0);
    }
}
