// src/config.rs

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::telemetry::MetricKind;

/// Refresh intervals below this are raised to it.
pub const MIN_INTERVAL_SECS: f64 = 0.5;

/// Longest accepted refresh interval or command timeout: one day.
pub const MAX_DURATION_SECS: f64 = 86_400.0;

/// Most points a single trend history may keep.
pub const MAX_HISTORY_CAPACITY: usize = 10_000;

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, io::Error),
    Parse(PathBuf, serde_json::Error),
    InvalidInterval(MetricKind, f64),
    InvalidCapacity(MetricKind),
    InvalidTimeout(f64),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(path, err) => write!(f, "cannot read {}: {}", path.display(), err),
            ConfigError::Parse(path, err) => write!(f, "invalid config {}: {}", path.display(), err),
            ConfigError::InvalidInterval(kind, secs) => {
                write!(
                    f,
                    "refresh interval for {} must be positive and at most {}s, got {}",
                    kind, MAX_DURATION_SECS, secs
                )
            }
            ConfigError::InvalidCapacity(kind) => write!(
                f,
                "history capacity for {} must be between 1 and {}",
                kind, MAX_HISTORY_CAPACITY
            ),
            ConfigError::InvalidTimeout(secs) => write!(
                f,
                "command timeout must be positive and at most {}s, got {}",
                MAX_DURATION_SECS, secs
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Seconds between samples, per metric kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshIntervals {
    pub battery: f64,
    pub cpu: f64,
    pub memory: f64,
    pub gpu: f64,
    pub network: f64,
    pub disk_io: f64,
    pub wifi: f64,
    pub volume: f64,
    pub mic: f64,
    pub keyboard_layout: f64,
    pub mounted_volumes: f64,
    pub sleep_inhibitor: f64,
}

impl Default for RefreshIntervals {
    fn default() -> Self {
        RefreshIntervals {
            battery: 30.0,
            cpu: 2.0,
            memory: 3.0,
            gpu: 2.0,
            network: 2.0,
            disk_io: 2.0,
            wifi: 10.0,
            volume: 2.0,
            mic: 2.0,
            keyboard_layout: 30.0,
            mounted_volumes: 30.0,
            sleep_inhibitor: 10.0,
        }
    }
}

impl RefreshIntervals {
    pub fn seconds(&self, kind: MetricKind) -> f64 {
        match kind {
            MetricKind::Battery => self.battery,
            MetricKind::Cpu => self.cpu,
            MetricKind::Memory => self.memory,
            MetricKind::Gpu => self.gpu,
            MetricKind::Network => self.network,
            MetricKind::DiskIo => self.disk_io,
            MetricKind::Wifi => self.wifi,
            MetricKind::Volume => self.volume,
            MetricKind::Mic => self.mic,
            MetricKind::KeyboardLayout => self.keyboard_layout,
            MetricKind::MountedVolumes => self.mounted_volumes,
            MetricKind::SleepInhibitor => self.sleep_inhibitor,
        }
    }

    fn seconds_mut(&mut self, kind: MetricKind) -> &mut f64 {
        match kind {
            MetricKind::Battery => &mut self.battery,
            MetricKind::Cpu => &mut self.cpu,
            MetricKind::Memory => &mut self.memory,
            MetricKind::Gpu => &mut self.gpu,
            MetricKind::Network => &mut self.network,
            MetricKind::DiskIo => &mut self.disk_io,
            MetricKind::Wifi => &mut self.wifi,
            MetricKind::Volume => &mut self.volume,
            MetricKind::Mic => &mut self.mic,
            MetricKind::KeyboardLayout => &mut self.keyboard_layout,
            MetricKind::MountedVolumes => &mut self.mounted_volumes,
            MetricKind::SleepInhibitor => &mut self.sleep_inhibitor,
        }
    }
}

/// Points kept per trend metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryCapacities {
    pub cpu: usize,
    pub memory: usize,
    pub gpu: usize,
    pub network: usize,
    pub disk_io: usize,
}

impl Default for HistoryCapacities {
    fn default() -> Self {
        HistoryCapacities {
            cpu: 40,
            memory: 40,
            gpu: 40,
            network: 30,
            disk_io: 30,
        }
    }
}

impl HistoryCapacities {
    pub fn for_kind(&self, kind: MetricKind) -> Option<usize> {
        match kind {
            MetricKind::Cpu => Some(self.cpu),
            MetricKind::Memory => Some(self.memory),
            MetricKind::Gpu => Some(self.gpu),
            MetricKind::Network => Some(self.network),
            MetricKind::DiskIo => Some(self.disk_io),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub intervals: RefreshIntervals,
    pub history: HistoryCapacities,
    pub command_timeout_secs: f64,
    /// Interface-name prefixes counted as data-carrying.
    pub network_interfaces: Vec<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        TelemetryConfig {
            intervals: RefreshIntervals::default(),
            history: HistoryCapacities::default(),
            command_timeout_secs: 5.0,
            network_interfaces: vec!["en".to_string(), "pdp_ip".to_string()],
        }
    }
}

impl TelemetryConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config: TelemetryConfig =
            serde_json::from_str(&raw).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()
    }

    /// Reads the per-user config file, or defaults when there is none.
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("statusbar-telemetry").join("config.json"))
    }

    /// Rejects nonsensical values and raises too-short intervals to
    /// [`MIN_INTERVAL_SECS`].
    ///
    /// Once this passes, [`interval`](Self::interval) and
    /// [`command_timeout`](Self::command_timeout) cannot fail.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        for kind in MetricKind::ALL {
            let secs = self.intervals.seconds_mut(kind);
            if !in_duration_range(*secs) {
                return Err(ConfigError::InvalidInterval(kind, *secs));
            }
            if *secs < MIN_INTERVAL_SECS {
                warn!(
                    "{} refresh interval {}s raised to {}s",
                    kind, secs, MIN_INTERVAL_SECS
                );
                *secs = MIN_INTERVAL_SECS;
            }
            if let Some(capacity) = self.history.for_kind(kind) {
                if capacity == 0 || capacity > MAX_HISTORY_CAPACITY {
                    return Err(ConfigError::InvalidCapacity(kind));
                }
            }
        }
        if !in_duration_range(self.command_timeout_secs) {
            return Err(ConfigError::InvalidTimeout(self.command_timeout_secs));
        }
        Ok(self)
    }

    pub fn interval(&self, kind: MetricKind) -> Duration {
        bounded_duration(self.intervals.seconds(kind))
    }

    pub fn command_timeout(&self) -> Duration {
        bounded_duration(self.command_timeout_secs)
    }
}

fn in_duration_range(secs: f64) -> bool {
    secs > 0.0 && secs <= MAX_DURATION_SECS && Duration::try_from_secs_f64(secs).is_ok()
}

/// Seconds as a `Duration`, capped at [`MAX_DURATION_SECS`]. Values a
/// validated config cannot hold map to [`MIN_INTERVAL_SECS`].
fn bounded_duration(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs.min(MAX_DURATION_SECS))
        .ok()
        .filter(|duration| !duration.is_zero())
        .unwrap_or(Duration::from_secs_f64(MIN_INTERVAL_SECS))
}
