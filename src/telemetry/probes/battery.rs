use std::sync::Arc;

use super::super::command::CommandRunner;
use super::super::error::ProbeFailure;
use super::super::types::{BatteryReading, MetricKind, RawReading, Sample};
use super::ioreg::query_class;
use super::Probe;

const BATTERY_CLASS: &str = "AppleSmartBattery";
const CURRENT_CAPACITY_KEYS: &[&str] = &["CurrentCapacity", "Current Capacity"];
const MAX_CAPACITY_KEYS: &[&str] = &["MaxCapacity", "Max Capacity"];

pub struct BatteryProbe {
    runner: Arc<dyn CommandRunner>,
}

impl BatteryProbe {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        BatteryProbe { runner }
    }
}

impl Probe for BatteryProbe {
    fn kind(&self) -> MetricKind {
        MetricKind::Battery
    }

    fn sample(&self) -> Result<Sample, ProbeFailure> {
        let entries = query_class(self.runner.as_ref(), BATTERY_CLASS)?;
        let battery = entries
            .iter()
            .find(|e| e.first_number(MAX_CAPACITY_KEYS).is_some())
            .ok_or_else(|| ProbeFailure::no_data("no internal battery"))?;

        let current_capacity = battery
            .first_number(CURRENT_CAPACITY_KEYS)
            .ok_or_else(|| ProbeFailure::parse("battery current capacity missing"))?;
        let max_capacity = battery.first_number(MAX_CAPACITY_KEYS).unwrap_or(0);
        if max_capacity == 0 {
            return Err(ProbeFailure::parse("battery max capacity is zero"));
        }

        // Low power mode is a nicety; a failing pmset does not sink the sample.
        let low_power_mode = self
            .runner
            .run("pmset", &["-g"])
            .map(|out| parse_low_power_mode(&out))
            .unwrap_or(false);

        let reading = BatteryReading {
            current_capacity,
            max_capacity,
            charging: battery.flag("IsCharging").unwrap_or(false),
            plugged_in: battery.flag("ExternalConnected").unwrap_or(false),
            low_power_mode,
        };
        Ok(Sample::new("ioreg::AppleSmartBattery", RawReading::Battery(reading)))
    }
}

pub(crate) fn parse_low_power_mode(pmset: &str) -> bool {
    pmset.lines().any(|line| {
        let mut parts = line.split_whitespace();
        parts.next() == Some("lowpowermode") && parts.next() == Some("1")
    })
}

/// `round(current / max * 100)` clamped into `0..=100`.
pub fn battery_percent(current: u64, max: u64) -> u8 {
    if max == 0 {
        return 0;
    }
    let percent = (current as f64 / max as f64 * 100.0).round();
    percent.clamp(0.0, 100.0) as u8
}
