//! An in-memory register window for the test suite.
//!
//! The mock keeps plain register storage plus small behavioral models for
//! the pieces of hardware the engines genuinely interact with: an
//! advancing SYSTIM counter, the MDIC handshake, and the TAS block's
//! habit of silently refusing an enable write.

use std::collections::BTreeMap;
use std::sync::Mutex;

use super::{MmioBus, MmioError};
use crate::family::DeviceFamily;
use crate::registers::{bits, RegisterMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TasRejectMode {
    /// The enable bit never sticks, whatever the driver does.
    DropEnable,
    /// The enable bit sticks only after the base-time-low register has
    /// been rewritten through zero first (the I226 activation quirk);
    /// until then the hardware clears the base time registers too.
    ClearBaseUntilZeroRewrite,
}

#[derive(Debug, Default)]
struct SystimModel {
    low: u32,
    high: u32,
    value: u64,
    /// Added to the counter after every low-half read.
    tick: u64,
    running: bool,
    /// Start counting once a non-zero low half is written (the igc and
    /// recovered-I210 behavior).
    start_on_seed: bool,
}

#[derive(Debug, Default)]
struct MdioModel {
    mdic: u32,
    registers: BTreeMap<(u8, u8), u16>,
    report_error: bool,
}

#[derive(Debug)]
struct TasModel {
    control: u32,
    base_low: u32,
    base_high: u32,
    mode: TasRejectMode,
    zero_rewrite_seen: bool,
}

#[derive(Debug, Default)]
struct MockState {
    regs: BTreeMap<u32, u32>,
    writes: Vec<(u32, u32)>,
    systim: Option<SystimModel>,
    mdio: Option<MdioModel>,
    tas: Option<TasModel>,
    fail_all: bool,
}

#[derive(Debug, Default)]
pub(crate) struct MockBus {
    state: Mutex<MockState>,
}

impl MockBus {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// A window for `family` with its clock already running.
    pub(crate) fn for_family(family: DeviceFamily) -> Self {
        let bus = Self::new();
        if let Some(clock) = RegisterMap::for_family(family).clock {
            bus.state.lock().unwrap().systim = Some(SystimModel {
                low: clock.systim_low,
                high: clock.systim_high,
                value: 5_000_000_000,
                tick: 16,
                running: true,
                start_on_seed: false,
            });
        }
        bus
    }

    /// A window whose clock is stuck at zero until seeded, as a
    /// power-cycled I210 (or an untouched igc part) presents itself.
    pub(crate) fn with_stuck_clock(family: DeviceFamily) -> Self {
        let bus = Self::for_family(family);
        {
            let mut state = bus.state.lock().unwrap();
            let systim = state.systim.as_mut().unwrap();
            systim.value = 0;
            systim.running = false;
            systim.start_on_seed = true;
        }
        bus
    }

    /// A window whose clock never advances, seeded or not.
    pub(crate) fn with_dead_clock(family: DeviceFamily) -> Self {
        let bus = Self::with_stuck_clock(family);
        bus.state.lock().unwrap().systim.as_mut().unwrap().start_on_seed = false;
        bus
    }

    pub(crate) fn set_systim(&self, value: u64, tick: u64) {
        let mut state = self.state.lock().unwrap();
        let systim = state.systim.as_mut().unwrap();
        systim.value = value;
        systim.tick = tick;
    }

    pub(crate) fn systim_value(&self) -> u64 {
        self.state.lock().unwrap().systim.as_ref().unwrap().value
    }

    pub(crate) fn arm_tas_rejection(&self, family: DeviceFamily, mode: TasRejectMode) {
        let tsn = RegisterMap::for_family(family).tsn.unwrap();
        self.state.lock().unwrap().tas = Some(TasModel {
            control: tsn.control,
            base_low: tsn.base_time_low,
            base_high: tsn.base_time_high,
            mode,
            zero_rewrite_seen: false,
        });
    }

    pub(crate) fn enable_mdio(&self, family: DeviceFamily) {
        let mdic = RegisterMap::for_family(family).mdio_control.unwrap();
        self.state.lock().unwrap().mdio = Some(MdioModel {
            mdic,
            ..MdioModel::default()
        });
    }

    pub(crate) fn set_mdio_register(&self, phy: u8, reg: u8, value: u16) {
        let mut state = self.state.lock().unwrap();
        state
            .mdio
            .as_mut()
            .unwrap()
            .registers
            .insert((phy, reg), value);
    }

    pub(crate) fn mdio_register(&self, phy: u8, reg: u8) -> Option<u16> {
        let state = self.state.lock().unwrap();
        state.mdio.as_ref().unwrap().registers.get(&(phy, reg)).copied()
    }

    pub(crate) fn set_mdio_error(&self, report_error: bool) {
        self.state.lock().unwrap().mdio.as_mut().unwrap().report_error = report_error;
    }

    pub(crate) fn set_fail_all(&self, fail: bool) {
        self.state.lock().unwrap().fail_all = fail;
    }

    pub(crate) fn reg(&self, offset: u32) -> u32 {
        *self.state.lock().unwrap().regs.get(&offset).unwrap_or(&0)
    }

    pub(crate) fn set_reg(&self, offset: u32, value: u32) {
        self.state.lock().unwrap().regs.insert(offset, value);
    }

    pub(crate) fn write_count(&self) -> usize {
        self.state.lock().unwrap().writes.len()
    }

    pub(crate) fn writes_to(&self, offset: u32) -> Vec<u32> {
        self.state
            .lock()
            .unwrap()
            .writes
            .iter()
            .filter(|(o, _)| *o == offset)
            .map(|(_, v)| *v)
            .collect()
    }

    /// The full write log, in issue order.
    pub(crate) fn writes(&self) -> Vec<(u32, u32)> {
        self.state.lock().unwrap().writes.clone()
    }
}

impl MmioBus for MockBus {
    fn read(&self, offset: u32) -> Result<u32, MmioError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_all {
            return Err(MmioError::Fault);
        }
        let state = &mut *state;

        if let Some(systim) = state.systim.as_mut() {
            if offset == systim.low {
                let value = systim.value as u32;
                if systim.running {
                    systim.value = systim.value.wrapping_add(systim.tick);
                }
                return Ok(value);
            }
            if offset == systim.high {
                return Ok((systim.value >> 32) as u32);
            }
        }

        Ok(*state.regs.get(&offset).unwrap_or(&0))
    }

    fn write(&self, offset: u32, value: u32) -> Result<(), MmioError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_all {
            return Err(MmioError::Fault);
        }
        let state = &mut *state;

        state.writes.push((offset, value));

        if let Some(systim) = state.systim.as_mut() {
            if offset == systim.low {
                systim.value = (systim.value & 0xffff_ffff_0000_0000) | u64::from(value);
                if systim.start_on_seed && value != 0 {
                    systim.running = true;
                }
                return Ok(());
            }
            if offset == systim.high {
                systim.value =
                    (systim.value & 0x0000_0000_ffff_ffff) | (u64::from(value) << 32);
                return Ok(());
            }
        }

        if let Some(mdio) = state.mdio.as_mut() {
            if offset == mdio.mdic {
                let phy = ((value >> bits::MDIC_PHY_SHIFT) & 0x1f) as u8;
                let reg = ((value >> bits::MDIC_REG_SHIFT) & 0x1f) as u8;
                let result = if mdio.report_error {
                    value | bits::MDIC_READY | bits::MDIC_ERROR
                } else if value & bits::MDIC_OP_READ != 0 {
                    let data = mdio.registers.get(&(phy, reg)).copied().unwrap_or(0);
                    (value & !bits::MDIC_DATA_MASK) | bits::MDIC_READY | u32::from(data)
                } else if value & bits::MDIC_OP_WRITE != 0 {
                    mdio.registers
                        .insert((phy, reg), (value & bits::MDIC_DATA_MASK) as u16);
                    value | bits::MDIC_READY
                } else {
                    value
                };
                state.regs.insert(offset, result);
                return Ok(());
            }
        }

        if let Some(tas) = state.tas.as_mut() {
            if offset == tas.base_low && value == 0 {
                tas.zero_rewrite_seen = true;
            }
            if offset == tas.control && value & bits::TAS_CTRL_TRANSMIT_MODE_TSN != 0 {
                let accept = match tas.mode {
                    TasRejectMode::DropEnable => false,
                    TasRejectMode::ClearBaseUntilZeroRewrite => tas.zero_rewrite_seen,
                };
                if accept {
                    state.regs.insert(offset, value);
                } else {
                    state
                        .regs
                        .insert(offset, value & !bits::TAS_CTRL_TRANSMIT_MODE_TSN);
                    if tas.mode == TasRejectMode::ClearBaseUntilZeroRewrite {
                        let (base_low, base_high) = (tas.base_low, tas.base_high);
                        state.regs.insert(base_low, 0);
                        state.regs.insert(base_high, 0);
                    }
                }
                return Ok(());
            }
        }

        state.regs.insert(offset, value);
        Ok(())
    }
}
