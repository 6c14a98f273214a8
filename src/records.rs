//! Fixed-layout control-channel records.
//!
//! The control channel itself — transport, framing, versioning,
//! authentication — belongs to the embedding driver. This module only
//! pins down the byte layouts the channel exchanges with this core:
//! little-endian, fixed width, request and response sharing one buffer
//! with the response fields written in place.

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::error::HalError;
use crate::fp::FramePreemptionConfig;
use crate::tas::{GateControlList, GateEntry};

const NANOS_PER_SECOND: u64 = 1_000_000_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    EnumConversionError,
    BufferTooShort,
}

/// A record with a fixed wire layout.
pub trait Record: Sized {
    /// The byte size on the wire of this record.
    const WIRE_SIZE: usize;
    /// Byte offset of the status word, for in-place status updates.
    const STATUS_OFFSET: usize;

    fn encode(&self, buffer: &mut [u8]) -> Result<(), RecordError>;
    fn decode(buffer: &[u8]) -> Result<Self, RecordError>;
}

/// Overwrite just the status word of an already-encoded request buffer.
pub fn write_status<R: Record>(buffer: &mut [u8], status: StatusCode) -> Result<(), RecordError> {
    if buffer.len() < R::STATUS_OFFSET + 4 {
        return Err(RecordError::BufferTooShort);
    }
    buffer[R::STATUS_OFFSET..R::STATUS_OFFSET + 4]
        .copy_from_slice(&u32::from(status).to_le_bytes());
    Ok(())
}

/// The status word every response carries, mirroring [`HalError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum StatusCode {
    #[default]
    Success = 0,
    HardwareNotReady = 1,
    InvalidParameter = 2,
    UnsupportedCapability = 3,
    ActivationRejected = 4,
    HardwareTimeout = 5,
    HardwareFault = 6,
    MissingRegister = 7,
}

impl From<&HalError> for StatusCode {
    fn from(v: &HalError) -> Self {
        match v {
            HalError::HardwareNotReady => StatusCode::HardwareNotReady,
            HalError::InvalidParameter(_) => StatusCode::InvalidParameter,
            HalError::UnsupportedCapability { .. } => StatusCode::UnsupportedCapability,
            HalError::ActivationRejected => StatusCode::ActivationRejected,
            HalError::HardwareTimeout => StatusCode::HardwareTimeout,
            HalError::HardwareFault => StatusCode::HardwareFault,
            HalError::MissingRegister { .. } => StatusCode::MissingRegister,
        }
    }
}

impl StatusCode {
    pub fn of<T>(result: &Result<T, HalError>) -> StatusCode {
        match result {
            Ok(_) => StatusCode::Success,
            Err(error) => error.into(),
        }
    }
}

fn get<const N: usize>(buffer: &[u8], offset: usize) -> [u8; N] {
    buffer[offset..offset + N].try_into().unwrap()
}

fn decode_status(buffer: &[u8], offset: usize) -> Result<StatusCode, RecordError> {
    StatusCode::try_from(u32::from_le_bytes(get(buffer, offset)))
        .map_err(|_| RecordError::EnumConversionError)
}

/// Response to a clock query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClockQuery {
    pub sample_ns: u64,
    pub rate_increment: u32,
    pub aux_control: u32,
    pub base_tick_mhz: u32,
    pub status: StatusCode,
}

impl Record for ClockQuery {
    const WIRE_SIZE: usize = 24;
    const STATUS_OFFSET: usize = 20;

    fn encode(&self, buffer: &mut [u8]) -> Result<(), RecordError> {
        if buffer.len() < Self::WIRE_SIZE {
            return Err(RecordError::BufferTooShort);
        }
        buffer[0..8].copy_from_slice(&self.sample_ns.to_le_bytes());
        buffer[8..12].copy_from_slice(&self.rate_increment.to_le_bytes());
        buffer[12..16].copy_from_slice(&self.aux_control.to_le_bytes());
        buffer[16..20].copy_from_slice(&self.base_tick_mhz.to_le_bytes());
        buffer[20..24].copy_from_slice(&u32::from(self.status).to_le_bytes());
        Ok(())
    }

    fn decode(buffer: &[u8]) -> Result<Self, RecordError> {
        if buffer.len() < Self::WIRE_SIZE {
            return Err(RecordError::BufferTooShort);
        }
        Ok(Self {
            sample_ns: u64::from_le_bytes(get(buffer, 0)),
            rate_increment: u32::from_le_bytes(get(buffer, 8)),
            aux_control: u32::from_le_bytes(get(buffer, 12)),
            base_tick_mhz: u32::from_le_bytes(get(buffer, 16)),
            status: decode_status(buffer, 20)?,
        })
    }
}

/// Frequency adjustment command; `previous` is filled in by the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrequencyAdjust {
    pub increment_ns: u32,
    pub fractional: u32,
    pub previous: u32,
    pub status: StatusCode,
}

impl FrequencyAdjust {
    /// The increment field is a register top byte; wider requests are
    /// malformed.
    pub fn increment_byte(&self) -> Result<u8, HalError> {
        u8::try_from(self.increment_ns)
            .map_err(|_| HalError::InvalidParameter("increment wider than the register field"))
    }
}

impl Record for FrequencyAdjust {
    const WIRE_SIZE: usize = 16;
    const STATUS_OFFSET: usize = 12;

    fn encode(&self, buffer: &mut [u8]) -> Result<(), RecordError> {
        if buffer.len() < Self::WIRE_SIZE {
            return Err(RecordError::BufferTooShort);
        }
        buffer[0..4].copy_from_slice(&self.increment_ns.to_le_bytes());
        buffer[4..8].copy_from_slice(&self.fractional.to_le_bytes());
        buffer[8..12].copy_from_slice(&self.previous.to_le_bytes());
        buffer[12..16].copy_from_slice(&u32::from(self.status).to_le_bytes());
        Ok(())
    }

    fn decode(buffer: &[u8]) -> Result<Self, RecordError> {
        if buffer.len() < Self::WIRE_SIZE {
            return Err(RecordError::BufferTooShort);
        }
        Ok(Self {
            increment_ns: u32::from_le_bytes(get(buffer, 0)),
            fractional: u32::from_le_bytes(get(buffer, 4)),
            previous: u32::from_le_bytes(get(buffer, 8)),
            status: decode_status(buffer, 12)?,
        })
    }
}

/// Timestamp get/set command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timestamp {
    pub timestamp_ns: u64,
    /// Only the default hardware clock (selector 0) exists on these
    /// parts; anything else is a malformed request.
    pub clock_selector: u32,
    pub status: StatusCode,
}

impl Timestamp {
    pub fn set_value(&self) -> Result<u64, HalError> {
        if self.clock_selector != 0 {
            return Err(HalError::InvalidParameter("unknown clock selector"));
        }
        Ok(self.timestamp_ns)
    }
}

impl Record for Timestamp {
    const WIRE_SIZE: usize = 16;
    const STATUS_OFFSET: usize = 12;

    fn encode(&self, buffer: &mut [u8]) -> Result<(), RecordError> {
        if buffer.len() < Self::WIRE_SIZE {
            return Err(RecordError::BufferTooShort);
        }
        buffer[0..8].copy_from_slice(&self.timestamp_ns.to_le_bytes());
        buffer[8..12].copy_from_slice(&self.clock_selector.to_le_bytes());
        buffer[12..16].copy_from_slice(&u32::from(self.status).to_le_bytes());
        Ok(())
    }

    fn decode(buffer: &[u8]) -> Result<Self, RecordError> {
        if buffer.len() < Self::WIRE_SIZE {
            return Err(RecordError::BufferTooShort);
        }
        Ok(Self {
            timestamp_ns: u64::from_le_bytes(get(buffer, 0)),
            clock_selector: u32::from_le_bytes(get(buffer, 8)),
            status: decode_status(buffer, 12)?,
        })
    }
}

/// Time-aware shaper setup command: split base and cycle times plus up
/// to eight (gate state, duration) entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TasSetup {
    pub base_time_s: u64,
    pub base_time_ns: u32,
    pub cycle_time_s: u32,
    pub cycle_time_ns: u32,
    pub gate_states: [u8; 8],
    pub gate_durations: [u32; 8],
    pub status: StatusCode,
}

impl TasSetup {
    /// Validate the split time fields and assemble the gate control list
    /// the engine consumes. Entries with a zero duration are padding.
    pub fn gate_control_list(&self) -> Result<GateControlList, HalError> {
        if u64::from(self.base_time_ns) >= NANOS_PER_SECOND
            || u64::from(self.cycle_time_ns) >= NANOS_PER_SECOND
        {
            return Err(HalError::InvalidParameter(
                "nanoseconds field must stay below one second",
            ));
        }

        let base_time_ns = self
            .base_time_s
            .checked_mul(NANOS_PER_SECOND)
            .and_then(|s| s.checked_add(u64::from(self.base_time_ns)))
            .ok_or(HalError::InvalidParameter("base time overflows 64 bits"))?;

        let cycle_time_ns = u64::from(self.cycle_time_s) * NANOS_PER_SECOND
            + u64::from(self.cycle_time_ns);
        let cycle_time_ns = u32::try_from(cycle_time_ns)
            .map_err(|_| HalError::InvalidParameter("cycle time wider than the register"))?;

        let mut list = GateControlList {
            base_time_ns,
            cycle_time_ns,
            entries: Default::default(),
        };
        for (state, duration) in self.gate_states.iter().zip(self.gate_durations) {
            if duration > 0 {
                list.entries.push(GateEntry {
                    gate_mask: *state,
                    duration_ns: duration,
                });
            }
        }

        Ok(list)
    }
}

impl Record for TasSetup {
    const WIRE_SIZE: usize = 64;
    const STATUS_OFFSET: usize = 60;

    fn encode(&self, buffer: &mut [u8]) -> Result<(), RecordError> {
        if buffer.len() < Self::WIRE_SIZE {
            return Err(RecordError::BufferTooShort);
        }
        buffer[0..8].copy_from_slice(&self.base_time_s.to_le_bytes());
        buffer[8..12].copy_from_slice(&self.base_time_ns.to_le_bytes());
        buffer[12..16].copy_from_slice(&self.cycle_time_s.to_le_bytes());
        buffer[16..20].copy_from_slice(&self.cycle_time_ns.to_le_bytes());
        buffer[20..28].copy_from_slice(&self.gate_states);
        for (i, duration) in self.gate_durations.iter().enumerate() {
            buffer[28 + i * 4..32 + i * 4].copy_from_slice(&duration.to_le_bytes());
        }
        buffer[60..64].copy_from_slice(&u32::from(self.status).to_le_bytes());
        Ok(())
    }

    fn decode(buffer: &[u8]) -> Result<Self, RecordError> {
        if buffer.len() < Self::WIRE_SIZE {
            return Err(RecordError::BufferTooShort);
        }
        let mut gate_durations = [0u32; 8];
        for (i, duration) in gate_durations.iter_mut().enumerate() {
            *duration = u32::from_le_bytes(get(buffer, 28 + i * 4));
        }
        Ok(Self {
            base_time_s: u64::from_le_bytes(get(buffer, 0)),
            base_time_ns: u32::from_le_bytes(get(buffer, 8)),
            cycle_time_s: u32::from_le_bytes(get(buffer, 12)),
            cycle_time_ns: u32::from_le_bytes(get(buffer, 16)),
            gate_states: get(buffer, 20),
            gate_durations,
            status: decode_status(buffer, 60)?,
        })
    }
}

/// Frame preemption setup command. The layout keeps the C structure's
/// natural padding so both sides agree byte for byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FpSetup {
    pub preemptable_queues: u8,
    pub min_fragment_size: u32,
    pub verify_disable: bool,
    pub status: StatusCode,
}

impl FpSetup {
    pub fn config(&self) -> FramePreemptionConfig {
        FramePreemptionConfig {
            preemptable_queues: self.preemptable_queues,
            min_fragment_size_bytes: self.min_fragment_size,
            verify_disable: self.verify_disable,
        }
    }
}

impl Record for FpSetup {
    const WIRE_SIZE: usize = 16;
    const STATUS_OFFSET: usize = 12;

    fn encode(&self, buffer: &mut [u8]) -> Result<(), RecordError> {
        if buffer.len() < Self::WIRE_SIZE {
            return Err(RecordError::BufferTooShort);
        }
        buffer[0..4].copy_from_slice(&[self.preemptable_queues, 0, 0, 0]);
        buffer[4..8].copy_from_slice(&self.min_fragment_size.to_le_bytes());
        buffer[8..12].copy_from_slice(&[u8::from(self.verify_disable), 0, 0, 0]);
        buffer[12..16].copy_from_slice(&u32::from(self.status).to_le_bytes());
        Ok(())
    }

    fn decode(buffer: &[u8]) -> Result<Self, RecordError> {
        if buffer.len() < Self::WIRE_SIZE {
            return Err(RecordError::BufferTooShort);
        }
        Ok(Self {
            preemptable_queues: buffer[0],
            min_fragment_size: u32::from_le_bytes(get(buffer, 4)),
            verify_disable: buffer[8] != 0,
            status: decode_status(buffer, 12)?,
        })
    }
}

/// Diagnostic hardware-state query response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HardwareState {
    pub lifecycle: u32,
    pub vendor_id: u16,
    pub device_id: u16,
    pub capabilities: u32,
    pub status: StatusCode,
}

impl Record for HardwareState {
    const WIRE_SIZE: usize = 16;
    const STATUS_OFFSET: usize = 12;

    fn encode(&self, buffer: &mut [u8]) -> Result<(), RecordError> {
        if buffer.len() < Self::WIRE_SIZE {
            return Err(RecordError::BufferTooShort);
        }
        buffer[0..4].copy_from_slice(&self.lifecycle.to_le_bytes());
        buffer[4..6].copy_from_slice(&self.vendor_id.to_le_bytes());
        buffer[6..8].copy_from_slice(&self.device_id.to_le_bytes());
        buffer[8..12].copy_from_slice(&self.capabilities.to_le_bytes());
        buffer[12..16].copy_from_slice(&u32::from(self.status).to_le_bytes());
        Ok(())
    }

    fn decode(buffer: &[u8]) -> Result<Self, RecordError> {
        if buffer.len() < Self::WIRE_SIZE {
            return Err(RecordError::BufferTooShort);
        }
        Ok(Self {
            lifecycle: u32::from_le_bytes(get(buffer, 0)),
            vendor_id: u16::from_le_bytes(get(buffer, 4)),
            device_id: u16::from_le_bytes(get(buffer, 6)),
            capabilities: u32::from_le_bytes(get(buffer, 8)),
            status: decode_status(buffer, 12)?,
        })
    }
}
