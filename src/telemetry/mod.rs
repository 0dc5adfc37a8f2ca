mod command;
mod derive;
mod engine;
mod error;
mod fallback;
mod guard;
mod history;
pub mod probes;
mod publisher;
mod rate;
mod scheduler;
#[cfg(test)]
mod tests;
mod types;

pub use command::{CommandRunner, SystemCommandRunner};
pub use derive::cpu_usage_percent;
pub use engine::TelemetryEngine;
pub use error::{ProbeFailure, TelemetryError};
pub use fallback::{FallbackChain, Strategy};
pub use guard::ResourceGuard;
#[cfg(target_os = "macos")]
pub use guard::{host_port, HostPort};
pub use history::{HistoryBuffer, HistoryPoint};
pub use probes::{Probe, ProbeSet};
pub use publisher::SnapshotPublisher;
pub use rate::{counter_delta, rate_per_second, rates_between, CounterSample};
pub use scheduler::{RefreshAction, RefreshScheduler};
pub use types::{
    AudioLevel, BatteryReading, BatteryStatus, ByteCounters, CoreTicks, CpuUsage, DiskThroughput,
    FailurePolicy, InhibitOption, InhibitorStatus, MemoryPages, MemoryUsage, MetricKind,
    MetricSnapshot, MetricValue, MountedVolume, NetworkThroughput, RawReading, Sample,
    TrendSeries, WifiStatus, UNKNOWN_KEYBOARD_LAYOUT,
};
