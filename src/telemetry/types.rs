use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Battery,
    Cpu,
    Memory,
    Gpu,
    Network,
    DiskIo,
    Wifi,
    Volume,
    Mic,
    KeyboardLayout,
    MountedVolumes,
    SleepInhibitor,
}

impl MetricKind {
    pub const ALL: [MetricKind; 12] = [
        MetricKind::Battery,
        MetricKind::Cpu,
        MetricKind::Memory,
        MetricKind::Gpu,
        MetricKind::Network,
        MetricKind::DiskIo,
        MetricKind::Wifi,
        MetricKind::Volume,
        MetricKind::Mic,
        MetricKind::KeyboardLayout,
        MetricKind::MountedVolumes,
        MetricKind::SleepInhibitor,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Battery => "battery",
            MetricKind::Cpu => "cpu",
            MetricKind::Memory => "memory",
            MetricKind::Gpu => "gpu",
            MetricKind::Network => "network",
            MetricKind::DiskIo => "disk_io",
            MetricKind::Wifi => "wifi",
            MetricKind::Volume => "volume",
            MetricKind::Mic => "mic",
            MetricKind::KeyboardLayout => "keyboard_layout",
            MetricKind::MountedVolumes => "mounted_volumes",
            MetricKind::SleepInhibitor => "sleep_inhibitor",
        }
    }

    /// Battery keeps its last reading; everything else falls back to a
    /// neutral default so the bar never shows a number it cannot back up.
    pub fn failure_policy(&self) -> FailurePolicy {
        match self {
            MetricKind::Battery => FailurePolicy::RetainLast,
            _ => FailurePolicy::ResetToDefault,
        }
    }

    /// Kinds whose value is a rate over two counter samples.
    pub fn needs_baseline(&self) -> bool {
        matches!(self, MetricKind::Cpu | MetricKind::Network | MetricKind::DiskIo)
    }

    pub fn trend_series(&self) -> &'static [TrendSeries] {
        match self {
            MetricKind::Cpu => &[TrendSeries::CpuPercent],
            MetricKind::Memory => &[TrendSeries::MemoryPercent],
            MetricKind::Gpu => &[TrendSeries::GpuPercent],
            MetricKind::Network => &[TrendSeries::NetworkDownload, TrendSeries::NetworkUpload],
            MetricKind::DiskIo => &[TrendSeries::DiskRead, TrendSeries::DiskWrite],
            _ => &[],
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailurePolicy {
    RetainLast,
    ResetToDefault,
}

/// A scalar history kept for a trend metric.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendSeries {
    CpuPercent,
    MemoryPercent,
    GpuPercent,
    NetworkDownload,
    NetworkUpload,
    DiskRead,
    DiskWrite,
}

impl TrendSeries {
    pub const ALL: [TrendSeries; 7] = [
        TrendSeries::CpuPercent,
        TrendSeries::MemoryPercent,
        TrendSeries::GpuPercent,
        TrendSeries::NetworkDownload,
        TrendSeries::NetworkUpload,
        TrendSeries::DiskRead,
        TrendSeries::DiskWrite,
    ];

    pub fn kind(&self) -> MetricKind {
        match self {
            TrendSeries::CpuPercent => MetricKind::Cpu,
            TrendSeries::MemoryPercent => MetricKind::Memory,
            TrendSeries::GpuPercent => MetricKind::Gpu,
            TrendSeries::NetworkDownload | TrendSeries::NetworkUpload => MetricKind::Network,
            TrendSeries::DiskRead | TrendSeries::DiskWrite => MetricKind::DiskIo,
        }
    }
}

// Raw readings, as handed over by the probes.

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CoreTicks {
    pub user: u64,
    pub system: u64,
    pub idle: u64,
    pub nice: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatteryReading {
    pub current_capacity: u64,
    pub max_capacity: u64,
    pub charging: bool,
    pub plugged_in: bool,
    pub low_power_mode: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct MemoryPages {
    pub active: u64,
    pub wired: u64,
    pub compressed: u64,
    pub free: u64,
    pub inactive: u64,
    pub page_size: u64,
    pub total_bytes: u64,
}

/// A pair of monotonic byte counters: received/sent for network,
/// read/written for disks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct ByteCounters {
    pub inbound: u64,
    pub outbound: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum RawReading {
    Battery(BatteryReading),
    Cpu(Vec<CoreTicks>),
    Memory(MemoryPages),
    Gpu(f64),
    Network(ByteCounters),
    DiskIo(ByteCounters),
    Wifi(WifiStatus),
    Volume(AudioLevel),
    Mic(AudioLevel),
    KeyboardLayout(String),
    MountedVolumes(Vec<MountedVolume>),
    SleepInhibitor(InhibitorStatus),
}

impl RawReading {
    pub fn kind(&self) -> MetricKind {
        match self {
            RawReading::Battery(_) => MetricKind::Battery,
            RawReading::Cpu(_) => MetricKind::Cpu,
            RawReading::Memory(_) => MetricKind::Memory,
            RawReading::Gpu(_) => MetricKind::Gpu,
            RawReading::Network(_) => MetricKind::Network,
            RawReading::DiskIo(_) => MetricKind::DiskIo,
            RawReading::Wifi(_) => MetricKind::Wifi,
            RawReading::Volume(_) => MetricKind::Volume,
            RawReading::Mic(_) => MetricKind::Mic,
            RawReading::KeyboardLayout(_) => MetricKind::KeyboardLayout,
            RawReading::MountedVolumes(_) => MetricKind::MountedVolumes,
            RawReading::SleepInhibitor(_) => MetricKind::SleepInhibitor,
        }
    }
}

/// A reading together with the name of the strategy that produced it.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    pub source: &'static str,
    pub reading: RawReading,
}

impl Sample {
    pub fn new(source: &'static str, reading: RawReading) -> Self {
        Sample { source, reading }
    }
}

// Published values.

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BatteryStatus {
    pub percent: u8,
    pub charging: bool,
    pub plugged_in: bool,
    pub low_power_mode: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct CpuUsage {
    pub percent: f64,
    pub core_count: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct MemoryUsage {
    pub percent: f64,
    pub used_bytes: u64,
    pub total_bytes: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct NetworkThroughput {
    pub download_bytes_per_sec: f64,
    pub upload_bytes_per_sec: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct DiskThroughput {
    pub read_bytes_per_sec: f64,
    pub write_bytes_per_sec: f64,
}

#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WifiStatus {
    pub interface: String,
    pub active: bool,
    pub ssid: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct AudioLevel {
    /// Scalar volume in `0.0..=1.0`.
    pub level: f32,
    pub muted: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountedVolume {
    pub name: String,
    pub mount_point: String,
    pub total_bytes: u64,
    pub available_bytes: u64,
}

/// Which assertion a `caffeinate` child holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InhibitOption {
    Display,
    Idle,
    Disk,
    System,
    User,
}

impl InhibitOption {
    pub fn flag(&self) -> &'static str {
        match self {
            InhibitOption::Display => "-d",
            InhibitOption::Idle => "-i",
            InhibitOption::Disk => "-m",
            InhibitOption::System => "-s",
            InhibitOption::User => "-u",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InhibitorStatus {
    pub active: bool,
    pub pid: Option<u32>,
    /// Set when the running inhibitor was not spawned by this engine.
    pub external: bool,
    pub option: Option<InhibitOption>,
}

pub const UNKNOWN_KEYBOARD_LAYOUT: &str = "Unknown";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum MetricValue {
    Battery(BatteryStatus),
    Cpu(CpuUsage),
    Memory(MemoryUsage),
    Gpu(f64),
    Network(NetworkThroughput),
    DiskIo(DiskThroughput),
    Wifi(WifiStatus),
    Volume(AudioLevel),
    Mic(AudioLevel),
    KeyboardLayout(String),
    MountedVolumes(Vec<MountedVolume>),
    SleepInhibitor(InhibitorStatus),
}

impl MetricValue {
    /// The value published before the first success and after a failure
    /// under [`FailurePolicy::ResetToDefault`].
    pub fn default_for(kind: MetricKind) -> Self {
        match kind {
            MetricKind::Battery => MetricValue::Battery(BatteryStatus::default()),
            MetricKind::Cpu => MetricValue::Cpu(CpuUsage::default()),
            MetricKind::Memory => MetricValue::Memory(MemoryUsage::default()),
            MetricKind::Gpu => MetricValue::Gpu(0.0),
            MetricKind::Network => MetricValue::Network(NetworkThroughput::default()),
            MetricKind::DiskIo => MetricValue::DiskIo(DiskThroughput::default()),
            MetricKind::Wifi => MetricValue::Wifi(WifiStatus::default()),
            MetricKind::Volume => MetricValue::Volume(AudioLevel::default()),
            MetricKind::Mic => MetricValue::Mic(AudioLevel::default()),
            MetricKind::KeyboardLayout => {
                MetricValue::KeyboardLayout(UNKNOWN_KEYBOARD_LAYOUT.to_string())
            }
            MetricKind::MountedVolumes => MetricValue::MountedVolumes(Vec::new()),
            MetricKind::SleepInhibitor => MetricValue::SleepInhibitor(InhibitorStatus::default()),
        }
    }
}

/// The consumer-visible state of one metric.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub kind: MetricKind,
    pub value: MetricValue,
    pub updated_at: DateTime<Utc>,
    pub last_success: Option<DateTime<Utc>>,
    pub source: String,
    pub latency_ms: u32,
    pub error: Option<String>,
}

impl MetricSnapshot {
    pub fn initial(kind: MetricKind) -> Self {
        MetricSnapshot {
            kind,
            value: MetricValue::default_for(kind),
            updated_at: Utc::now(),
            last_success: None,
            source: "uninitialized".to_string(),
            latency_ms: 0,
            error: None,
        }
    }

    pub fn fresh(kind: MetricKind, value: MetricValue, source: &str, latency: Duration) -> Self {
        let now = Utc::now();
        MetricSnapshot {
            kind,
            value,
            updated_at: now,
            last_success: Some(now),
            source: source.to_string(),
            latency_ms: latency.as_millis().min(u32::MAX as u128) as u32,
            error: None,
        }
    }

    /// True when no probe has succeeded within `max_age`.
    pub fn is_stale(&self, max_age: Duration) -> bool {
        match self.last_success {
            Some(at) => Utc::now()
                .signed_duration_since(at)
                .to_std()
                .map(|age| age > max_age)
                .unwrap_or(false),
            None => true,
        }
    }
}
