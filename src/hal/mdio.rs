//! PHY register access through the MDIC handshake register.

use std::time::Duration;

use crate::error::{HalError, Result};
use crate::mmio::MmioBus;
use crate::registers::bits;

const READY_POLLS: u32 = 10;
const POLL_INTERVAL: Duration = Duration::from_micros(20);

pub(crate) fn read<B: MmioBus>(bus: &B, mdic: u32, phy: u8, reg: u8) -> Result<u16> {
    let value = transact(bus, mdic, command(phy, reg, bits::MDIC_OP_READ, 0))?;
    Ok((value & bits::MDIC_DATA_MASK) as u16)
}

pub(crate) fn write<B: MmioBus>(bus: &B, mdic: u32, phy: u8, reg: u8, value: u16) -> Result<()> {
    transact(bus, mdic, command(phy, reg, bits::MDIC_OP_WRITE, value))?;
    Ok(())
}

fn command(phy: u8, reg: u8, op: u32, data: u16) -> u32 {
    u32::from(data)
        | (u32::from(reg & 0x1f) << bits::MDIC_REG_SHIFT)
        | (u32::from(phy & 0x1f) << bits::MDIC_PHY_SHIFT)
        | op
}

fn transact<B: MmioBus>(bus: &B, mdic: u32, cmd: u32) -> Result<u32> {
    bus.write(mdic, cmd)?;

    for _ in 0..READY_POLLS {
        let value = bus.read(mdic)?;
        if value & bits::MDIC_ERROR != 0 {
            return Err(HalError::InvalidParameter(
                "phy rejected the mdio transaction",
            ));
        }
        if value & bits::MDIC_READY != 0 {
            return Ok(value);
        }
        std::thread::sleep(POLL_INTERVAL);
    }

    log::warn!("mdio transaction never reported ready");
    Err(HalError::HardwareTimeout)
}
