//! Clock bring-up for the PCH integrated MACs (I217, I219).
//!
//! These parts have no auxiliary control block; the clock is always
//! powered and only needs its rate word and packet timestamping enables.

use super::nominal_rate_word;
use crate::error::Result;
use crate::family::DeviceFamily;
use crate::mmio::MmioBus;
use crate::registers::{bits, RegisterMap};

pub(super) fn init_ptp<B: MmioBus>(
    bus: &B,
    family: DeviceFamily,
    nominal_increment_ns: u8,
) -> Result<()> {
    let map = RegisterMap::for_family(family);
    let clock = map.clock(family)?;

    bus.write(clock.rate_increment, nominal_rate_word(nominal_increment_ns))?;

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
    fn bring_up_never_touches_an_aux_control_register() {
        let bus = MockBus::for_family(DeviceFamily::I219);
        init_ptp(&bus, DeviceFamily::I219, 8).unwrap();

        // The PCH map has no auxiliary control offset; every write must
        // have gone to a register the family actually implements.
        let clock = RegisterMap::for_family(DeviceFamily::I219).clock.unwrap();
        let legal = [
            clock.rate_increment,
            clock.rx_timesync_control,
            clock.tx_timesync_control,
        ];
        for (offset, _) in bus.writes() {
            assert!(legal.contains(&offset), "write to unexpected offset {offset:#x}");
        }
    }
}
