use std::time::Instant;

use super::probes::{battery_percent, flatten_ticks, memory_usage};
use super::rate::{counter_delta, rates_between, CounterSample};
use super::types::{
    BatteryStatus, CpuUsage, DiskThroughput, MemoryUsage, MetricValue, NetworkThroughput,
    RawReading, TrendSeries,
};

/// What one successful reading turns into.
#[derive(Debug)]
pub(crate) struct Derived {
    /// `None` when the reading was overtaken by a newer stored baseline and
    /// must not be published.
    pub value: Option<MetricValue>,
    pub trend: Vec<(TrendSeries, f64)>,
    /// New baseline to store, `None` when the reading must not replace the
    /// current one.
    pub counters: Option<CounterSample>,
}

impl Derived {
    fn plain(value: MetricValue) -> Self {
        Derived {
            value: Some(value),
            trend: Vec::new(),
            counters: None,
        }
    }

    fn superseded() -> Self {
        Derived {
            value: None,
            trend: Vec::new(),
            counters: None,
        }
    }
}

/// Turns a raw reading into its published value, using `baseline` for the
/// counter-based kinds.
pub(crate) fn derive(
    reading: RawReading,
    baseline: Option<&CounterSample>,
    taken_at: Instant,
) -> Derived {
    match reading {
        RawReading::Battery(b) => Derived::plain(MetricValue::Battery(BatteryStatus {
            percent: battery_percent(b.current_capacity, b.max_capacity),
            charging: b.charging,
            plugged_in: b.plugged_in,
            low_power_mode: b.low_power_mode,
        })),
        RawReading::Cpu(cores) => {
            let current = CounterSample::new(flatten_ticks(&cores), taken_at);
            let percent = match usable_baseline(baseline, taken_at) {
                Baseline::Usable(prev) => cpu_usage_percent(&prev.values, &current.values),
                Baseline::Missing => None,
                Baseline::Newer => return Derived::superseded(),
            };
            Derived {
                value: Some(MetricValue::Cpu(CpuUsage {
                    percent: percent.unwrap_or(0.0),
                    core_count: cores.len(),
                })),
                trend: percent.map(|p| (TrendSeries::CpuPercent, p)).into_iter().collect(),
                counters: Some(current),
            }
        }
        RawReading::Memory(pages) => {
            let (used_bytes, percent) = memory_usage(&pages);
            let total_bytes = if pages.total_bytes > 0 {
                pages.total_bytes
            } else {
                (pages.active + pages.wired + pages.compressed + pages.free + pages.inactive)
                    .saturating_mul(pages.page_size)
            };
            Derived {
                value: Some(MetricValue::Memory(MemoryUsage {
                    percent,
                    used_bytes,
                    total_bytes,
                })),
                trend: vec![(TrendSeries::MemoryPercent, percent)],
                counters: None,
            }
        }
        RawReading::Gpu(percent) => Derived {
            value: Some(MetricValue::Gpu(percent)),
            trend: vec![(TrendSeries::GpuPercent, percent)],
            counters: None,
        },
        RawReading::Network(counters) => {
            let current = CounterSample::new(vec![counters.inbound, counters.outbound], taken_at);
            let Some((rates, counters)) = counter_rates(baseline, current) else {
                return Derived::superseded();
            };
            let throughput = rates
                .map(|(download, upload)| NetworkThroughput {
                    download_bytes_per_sec: download,
                    upload_bytes_per_sec: upload,
                })
                .unwrap_or_default();
            Derived {
                value: Some(MetricValue::Network(throughput)),
                trend: rates
                    .map(|(down, up)| {
                        vec![
                            (TrendSeries::NetworkDownload, down),
                            (TrendSeries::NetworkUpload, up),
                        ]
                    })
                    .unwrap_or_default(),
                counters: Some(counters),
            }
        }
        RawReading::DiskIo(counters) => {
            let current = CounterSample::new(vec![counters.inbound, counters.outbound], taken_at);
            let Some((rates, counters)) = counter_rates(baseline, current) else {
                return Derived::superseded();
            };
            let throughput = rates
                .map(|(read, write)| DiskThroughput {
                    read_bytes_per_sec: read,
                    write_bytes_per_sec: write,
                })
                .unwrap_or_default();
            Derived {
                value: Some(MetricValue::DiskIo(throughput)),
                trend: rates
                    .map(|(read, write)| {
                        vec![(TrendSeries::DiskRead, read), (TrendSeries::DiskWrite, write)]
                    })
                    .unwrap_or_default(),
                counters: Some(counters),
            }
        }
        RawReading::Wifi(status) => Derived::plain(MetricValue::Wifi(status)),
        RawReading::Volume(level) => Derived::plain(MetricValue::Volume(level)),
        RawReading::Mic(level) => Derived::plain(MetricValue::Mic(level)),
        RawReading::KeyboardLayout(name) => Derived::plain(MetricValue::KeyboardLayout(name)),
        RawReading::MountedVolumes(volumes) => Derived::plain(MetricValue::MountedVolumes(volumes)),
        RawReading::SleepInhibitor(status) => Derived::plain(MetricValue::SleepInhibitor(status)),
    }
}

enum Baseline<'a> {
    Usable(&'a CounterSample),
    Missing,
    /// The stored baseline was taken after this reading (a manual refresh
    /// overtook a periodic one).
    Newer,
}

fn usable_baseline(baseline: Option<&CounterSample>, taken_at: Instant) -> Baseline<'_> {
    match baseline {
        Some(prev) if prev.taken_at >= taken_at => Baseline::Newer,
        Some(prev) => Baseline::Usable(prev),
        None => Baseline::Missing,
    }
}

/// Inbound and outbound rates plus the baseline to store next; `None` when the
/// stored baseline is newer than `current`.
fn counter_rates(
    baseline: Option<&CounterSample>,
    current: CounterSample,
) -> Option<(Option<(f64, f64)>, CounterSample)> {
    match usable_baseline(baseline, current.taken_at) {
        Baseline::Usable(prev) => {
            let rates = rates_between(prev, &current).and_then(|r| match r.as_slice() {
                [inbound, outbound] => Some((*inbound, *outbound)),
                _ => None,
            });
            Some((rates, current))
        }
        Baseline::Missing => Some((None, current)),
        Baseline::Newer => None,
    }
}

/// `100 * (Δtotal - Δidle) / Δtotal` over all cores.
///
/// Both slices are flattened `[user, system, idle, nice]` quadruples; `None`
/// when they differ in length or no ticks elapsed.
pub fn cpu_usage_percent(previous: &[u64], current: &[u64]) -> Option<f64> {
    if previous.len() != current.len() || current.is_empty() || current.len() % 4 != 0 {
        return None;
    }
    let mut total = 0u64;
    let mut idle = 0u64;
    for (then, now) in previous.chunks_exact(4).zip(current.chunks_exact(4)) {
        for state in 0..4 {
            let delta = counter_delta(then[state], now[state]);
            total = total.saturating_add(delta);
            if state == 2 {
                idle = idle.saturating_add(delta);
            }
        }
    }
    if total == 0 {
        return None;
    }
    let busy = total.saturating_sub(idle);
    Some((busy as f64 / total as f64 * 100.0).clamp(0.0, 100.0))
}
