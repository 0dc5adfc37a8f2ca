pub mod config;
pub mod telemetry;

pub use config::{ConfigError, HistoryCapacities, RefreshIntervals, TelemetryConfig};
pub use telemetry::{
    InhibitOption, InhibitorStatus, MetricKind, MetricSnapshot, MetricValue, ProbeFailure,
    TelemetryEngine, TelemetryError, TrendSeries,
};
