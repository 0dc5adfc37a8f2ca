use std::sync::Arc;

use super::super::command::CommandRunner;
use super::super::error::ProbeFailure;
use super::super::types::{MetricKind, RawReading, Sample};
use super::ioreg::{query_class, IoregEntry};
use super::Probe;

const ACCELERATOR_CLASS: &str = "IOAccelerator";
const RENDERER_UTILIZATION_KEYS: &[&str] = &["Renderer Utilization %"];
const DEVICE_UTILIZATION_KEYS: &[&str] = &["Device Utilization %", "GPU Activity(%)"];

/// Divisor for device utilization when no renderer figure is published.
pub const DEVICE_UTILIZATION_DERATE: f64 = 3.5;
/// Applied to every raw figure. Empirically tuned, not hardware-specific.
pub const EFFECTIVE_UTILIZATION_FACTOR: f64 = 0.4;

/// Heuristic GPU load from the accelerator performance statistics.
///
/// This is an approximation, not a precise utilization metric.
pub struct GpuProbe {
    runner: Arc<dyn CommandRunner>,
}

impl GpuProbe {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        GpuProbe { runner }
    }
}

impl Probe for GpuProbe {
    fn kind(&self) -> MetricKind {
        MetricKind::Gpu
    }

    fn sample(&self) -> Result<Sample, ProbeFailure> {
        let entries = query_class(self.runner.as_ref(), ACCELERATOR_CLASS)?;
        if entries.is_empty() {
            return Ok(Sample::new("ioreg::IOAccelerator(none)", RawReading::Gpu(0.0)));
        }
        let usage = entries
            .iter()
            .filter_map(accelerator_utilization)
            .fold(None, |best: Option<f64>, u| Some(best.map_or(u, |b| b.max(u))))
            .ok_or_else(|| ProbeFailure::no_data("accelerator has no performance statistics"))?;
        Ok(Sample::new("ioreg::IOAccelerator", RawReading::Gpu(usage)))
    }
}

fn accelerator_utilization(entry: &IoregEntry) -> Option<f64> {
    gpu_utilization(
        entry.first_number(RENDERER_UTILIZATION_KEYS),
        entry.first_number(DEVICE_UTILIZATION_KEYS),
    )
}

/// Renderer utilization when present, else derated device utilization, then
/// the global effective-utilization factor.
pub fn gpu_utilization(renderer: Option<u64>, device: Option<u64>) -> Option<f64> {
    let raw = match (renderer, device) {
        (Some(renderer), _) => renderer as f64,
        (None, Some(device)) => device as f64 / DEVICE_UTILIZATION_DERATE,
        (None, None) => return None,
    };
    Some((raw * EFFECTIVE_UTILIZATION_FACTOR).clamp(0.0, 100.0))
}
