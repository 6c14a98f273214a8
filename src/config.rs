//! Timing knobs that are empirically derived rather than architectural.
//!
//! The TAS minimum base-time lead in particular was determined on real
//! silicon and differs between revisions; nothing in the vendor
//! documentation pins it down. Everything here therefore ships with
//! conservative defaults and can be overridden from a TOML file.

use std::collections::BTreeMap;
use std::fs::read_to_string;
use std::path::Path;
use std::time::Duration;

use log::warn;
use serde::Deserialize;

use crate::family::DeviceFamily;

/// How `set_clock` treats a value behind the most recently read sample.
#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StepPolicy {
    /// Reject backward steps as invalid parameters.
    Strict,
    /// Log backward steps as anomalies and apply them anyway. PTP servos
    /// legitimately step time backwards on resynchronization, so this is
    /// the default.
    #[default]
    Permissive,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct TimingConfig {
    #[serde(default)]
    pub step_policy: StepPolicy,

    /// Ceiling on the rate offset `adjust_frequency` may program,
    /// relative to the family's nominal tick, in parts per billion.
    #[serde(default = "default_frequency_trim_limit_ppb")]
    pub frequency_trim_limit_ppb: u32,

    /// Settle delay between the TAS enable write and the verification
    /// re-read.
    #[serde(default = "default_tas_settle_us")]
    pub tas_settle_us: u64,

    /// Interval between the two samples that demonstrate an advancing
    /// clock during bring-up.
    #[serde(default = "default_clock_probe_interval_us")]
    pub clock_probe_interval_us: u64,

    /// How often bring-up retries the advancing-clock check before
    /// declaring the hardware broken.
    #[serde(default = "default_clock_probe_retries")]
    pub clock_probe_retries: u32,

    /// Per-family override of the minimum lead between the current clock
    /// sample and an acceptable TAS base time, in nanoseconds. Families
    /// not listed use the built-in per-generation default.
    #[serde(default)]
    pub tas_min_lead_ns: BTreeMap<DeviceFamily, u64>,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            step_policy: StepPolicy::default(),
            frequency_trim_limit_ppb: default_frequency_trim_limit_ppb(),
            tas_settle_us: default_tas_settle_us(),
            clock_probe_interval_us: default_clock_probe_interval_us(),
            clock_probe_retries: default_clock_probe_retries(),
            tas_min_lead_ns: BTreeMap::new(),
        }
    }
}

impl TimingConfig {
    /// Parse a config from a TOML file.
    pub fn from_file(file: &Path) -> Result<TimingConfig, ConfigError> {
        let contents = read_to_string(file).map_err(ConfigError::Io)?;
        let config: TimingConfig = toml::de::from_str(&contents).map_err(ConfigError::Toml)?;
        config.warn_when_unreasonable();
        Ok(config)
    }

    /// Warns about config values that are technically valid but almost
    /// certainly not what the operator wanted.
    pub fn warn_when_unreasonable(&self) {
        if self.tas_settle_us > 10_000 {
            warn!("TAS settle delay above 10ms stalls every activation attempt.");
        }

        for (family, lead) in &self.tas_min_lead_ns {
            if *lead < 100_000 {
                warn!("TAS base time lead below 100us on {family} rejects most schedules.");
            }
        }
    }

    /// The minimum lead between a fresh clock sample and an acceptable
    /// TAS base time, for this family.
    pub fn tas_min_lead_ns(&self, family: DeviceFamily) -> u64 {
        if let Some(lead) = self.tas_min_lead_ns.get(&family) {
            return *lead;
        }

        // Empirical per-generation floors. The I225 wants a visibly
        // larger margin than the I226 before the enable bit latches.
        match family {
            DeviceFamily::I225 => 1_000_000,
            _ => 500_000,
        }
    }

    pub(crate) fn tas_settle(&self) -> Duration {
        Duration::from_micros(self.tas_settle_us)
    }

    pub(crate) fn clock_probe_interval(&self) -> Duration {
        Duration::from_micros(self.clock_probe_interval_us)
    }
}

fn default_frequency_trim_limit_ppb() -> u32 {
    // The same ceiling the kernel NTP interface enforces: ±500 ppm.
    500_000
}

fn default_tas_settle_us() -> u64 {
    100
}

fn default_clock_probe_interval_us() -> u64 {
    10
}

fn default_clock_probe_retries() -> u32 {
    3
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Toml(toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => writeln!(f, "io error while reading config: {e}"),
            ConfigError::Toml(e) => writeln!(f, "config toml parsing error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}
