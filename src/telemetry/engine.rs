use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::join_all;
use futures::FutureExt;
use log::{debug, info, warn};
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task;

use crate::config::TelemetryConfig;

use super::derive::derive;
use super::error::{ProbeFailure, TelemetryError};
use super::history::{HistoryBuffer, HistoryPoint};
use super::probes::{AudioBackend, AudioDirection, ProbeSet};
use super::publisher::SnapshotPublisher;
use super::rate::CounterSample;
use super::scheduler::{RefreshAction, RefreshScheduler};
use super::types::{InhibitOption, InhibitorStatus, MetricKind, MetricSnapshot, TrendSeries};

/// Samples every metric on its own timer and publishes snapshots and trend
/// histories.
///
/// Construct one per process and hand it to whatever owns the UI loop.
/// Consumers only ever get copies of engine state.
pub struct TelemetryEngine {
    inner: Arc<EngineInner>,
    scheduler: RefreshScheduler,
    running: AtomicBool,
    _runtime: Option<Arc<Runtime>>,
}

struct EngineInner {
    config: TelemetryConfig,
    probes: ProbeSet,
    publisher: SnapshotPublisher,
    counters: DashMap<MetricKind, CounterSample>,
    histories: DashMap<TrendSeries, HistoryBuffer<f64>>,
    /// Advanced by `stop()`; results of probes dispatched under an older
    /// epoch are dropped.
    epoch: AtomicU64,
    runtime: Handle,
}

impl TelemetryEngine {
    /// An engine over the live system probes.
    pub fn new(config: TelemetryConfig) -> Result<Self, TelemetryError> {
        let config = config.validate()?;
        let probes = ProbeSet::system(&config);
        Self::with_probes(config, probes)
    }

    /// An engine over an explicit probe set.
    ///
    /// Uses the ambient tokio runtime when there is one, otherwise builds a
    /// private multi-threaded runtime that lives as long as the engine.
    pub fn with_probes(config: TelemetryConfig, probes: ProbeSet) -> Result<Self, TelemetryError> {
        let config = config.validate()?;

        let (runtime, owned) = match Handle::try_current() {
            Ok(handle) => (handle, None),
            Err(_) => {
                let runtime = Builder::new_multi_thread()
                    .enable_all()
                    .thread_name("telemetry")
                    .build()
                    .map_err(TelemetryError::Runtime)?;
                (runtime.handle().clone(), Some(Arc::new(runtime)))
            }
        };

        let histories = DashMap::new();
        for series in TrendSeries::ALL {
            let capacity = config.history.for_kind(series.kind()).unwrap_or(1);
            histories.insert(series, HistoryBuffer::new(capacity));
        }

        let inner = Arc::new(EngineInner {
            config,
            probes,
            publisher: SnapshotPublisher::new(),
            counters: DashMap::new(),
            histories,
            epoch: AtomicU64::new(0),
            runtime: runtime.clone(),
        });

        Ok(TelemetryEngine {
            inner,
            scheduler: RefreshScheduler::new(runtime),
            running: AtomicBool::new(false),
            _runtime: owned,
        })
    }

    pub fn config(&self) -> &TelemetryConfig {
        &self.inner.config
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Samples every metric once and schedules each on its own interval.
    /// Calling it while running does nothing.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("telemetry engine starting");
        for kind in self.inner.probes.kinds() {
            Arc::clone(&self.inner).dispatch(kind);

            let inner = Arc::clone(&self.inner);
            let action: RefreshAction = Arc::new(move || {
                let inner = Arc::clone(&inner);
                async move {
                    let epoch = inner.epoch();
                    inner.sample(kind, epoch).await;
                }
                .boxed()
            });
            self.scheduler
                .schedule(kind, self.inner.config.interval(kind), action);
        }
    }

    /// Cancels every timer. Probes already running finish, but their results
    /// are discarded.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.scheduler.cancel_all();
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        info!("telemetry engine stopped");
    }

    /// Requests an out-of-band sample of every metric.
    pub fn refresh(&self) {
        for kind in self.inner.probes.kinds() {
            self.refresh_kind(kind);
        }
    }

    /// Requests an out-of-band sample of `kind` without touching its timer.
    pub fn refresh_kind(&self, kind: MetricKind) {
        if !self.scheduler.fire_now(kind) {
            Arc::clone(&self.inner).dispatch(kind);
        }
    }

    pub fn refresh_battery(&self) {
        self.refresh_kind(MetricKind::Battery);
    }

    pub fn refresh_cpu(&self) {
        self.refresh_kind(MetricKind::Cpu);
    }

    pub fn refresh_memory(&self) {
        self.refresh_kind(MetricKind::Memory);
    }

    pub fn refresh_gpu(&self) {
        self.refresh_kind(MetricKind::Gpu);
    }

    pub fn refresh_network(&self) {
        self.refresh_kind(MetricKind::Network);
    }

    pub fn refresh_disk_io(&self) {
        self.refresh_kind(MetricKind::DiskIo);
    }

    pub fn refresh_wifi(&self) {
        self.refresh_kind(MetricKind::Wifi);
    }

    pub fn refresh_volume(&self) {
        self.refresh_kind(MetricKind::Volume);
    }

    pub fn refresh_mic(&self) {
        self.refresh_kind(MetricKind::Mic);
    }

    pub fn refresh_keyboard_layout(&self) {
        self.refresh_kind(MetricKind::KeyboardLayout);
    }

    pub fn refresh_mounted_volumes(&self) {
        self.refresh_kind(MetricKind::MountedVolumes);
    }

    pub fn refresh_sleep_inhibitor(&self) {
        self.refresh_kind(MetricKind::SleepInhibitor);
    }

    /// Samples `kind` and waits until the result is published.
    pub async fn refresh_now(&self, kind: MetricKind) {
        let epoch = self.inner.epoch();
        Arc::clone(&self.inner).sample(kind, epoch).await;
    }

    pub async fn refresh_all_now(&self) {
        join_all(
            self.inner
                .probes
                .kinds()
                .into_iter()
                .map(|kind| self.refresh_now(kind)),
        )
        .await;
    }

    /// Samples every metric, waits `window`, then samples the counter-based
    /// kinds again so their published rates cover a real interval.
    pub async fn refresh_all_with_rates(&self, window: Duration) {
        self.refresh_all_now().await;
        tokio::time::sleep(window).await;
        let counter_kinds = self
            .inner
            .probes
            .kinds()
            .into_iter()
            .filter(|kind| kind.needs_baseline());
        join_all(counter_kinds.map(|kind| self.refresh_now(kind))).await;
    }

    /// Called by the UI loop when the selected input source changes.
    pub fn notify_input_source_changed(&self) {
        self.refresh_kind(MetricKind::KeyboardLayout);
    }

    /// Called by the UI loop on mount and unmount notifications.
    pub fn notify_volumes_changed(&self) {
        self.refresh_kind(MetricKind::MountedVolumes);
    }

    pub async fn snapshot(&self, kind: MetricKind) -> MetricSnapshot {
        self.inner.publisher.snapshot(kind).await
    }

    pub async fn snapshots(&self) -> Vec<MetricSnapshot> {
        self.inner.publisher.all().await
    }

    /// Oldest point first.
    pub fn history(&self, series: TrendSeries) -> Vec<HistoryPoint<f64>> {
        self.inner
            .histories
            .get(&series)
            .map(|buffer| buffer.points())
            .unwrap_or_default()
    }

    pub fn clear_histories(&self) {
        for mut buffer in self.inner.histories.iter_mut() {
            buffer.clear();
        }
    }

    pub fn set_output_volume(&self, level: f32) -> bool {
        self.write_audio(AudioDirection::Output, |audio| {
            audio.set_volume(AudioDirection::Output, level.clamp(0.0, 1.0))
        })
    }

    pub fn set_output_muted(&self, muted: bool) -> bool {
        self.write_audio(AudioDirection::Output, |audio| {
            audio.set_muted(AudioDirection::Output, muted)
        })
    }

    pub fn set_mic_volume(&self, level: f32) -> bool {
        self.write_audio(AudioDirection::Input, |audio| {
            audio.set_volume(AudioDirection::Input, level.clamp(0.0, 1.0))
        })
    }

    pub fn set_mic_muted(&self, muted: bool) -> bool {
        self.write_audio(AudioDirection::Input, |audio| {
            audio.set_muted(AudioDirection::Input, muted)
        })
    }

    fn write_audio(
        &self,
        direction: AudioDirection,
        write: impl FnOnce(&dyn AudioBackend) -> bool,
    ) -> bool {
        let written = write(self.inner.probes.audio().as_ref());
        if written {
            self.refresh_kind(direction.kind());
        } else {
            debug!("{} control not settable", direction.kind());
        }
        written
    }

    /// Stops a running sleep inhibitor or starts one holding `option`.
    pub fn toggle_sleep_inhibitor(&self, option: InhibitOption) -> InhibitorStatus {
        let status = self.inner.probes.inhibitor().toggle(option);
        self.refresh_kind(MetricKind::SleepInhibitor);
        status
    }
}

#[cfg(test)]
impl TelemetryEngine {
    pub(crate) fn store_baseline(&self, kind: MetricKind, baseline: CounterSample) {
        self.inner.counters.insert(kind, baseline);
    }

    pub(crate) fn baseline(&self, kind: MetricKind) -> Option<CounterSample> {
        self.inner.counters.get(&kind).map(|stored| stored.clone())
    }
}

impl Drop for TelemetryEngine {
    fn drop(&mut self) {
        self.scheduler.cancel_all();
    }
}

impl EngineInner {
    fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    fn dispatch(self: Arc<Self>, kind: MetricKind) {
        let epoch = self.epoch();
        let runtime = self.runtime.clone();
        runtime.spawn(async move {
            self.sample(kind, epoch).await;
        });
    }

    async fn sample(self: Arc<Self>, kind: MetricKind, epoch: u64) {
        let Some(probe) = self.probes.get(kind) else {
            debug!("no probe registered for {}", kind);
            return;
        };

        let started = Instant::now();
        let outcome = task::spawn_blocking(move || {
            let result = probe.sample();
            (result, Instant::now())
        })
        .await;
        let latency = started.elapsed();
        let (result, taken_at) = match outcome {
            Ok(outcome) => outcome,
            Err(join_err) => (
                Err(ProbeFailure::Worker(join_err.to_string())),
                Instant::now(),
            ),
        };

        if self.epoch() != epoch {
            debug!("discarding {} sample from a stopped run", kind);
            return;
        }

        let sample = match result {
            Ok(sample) if sample.reading.kind() == kind => sample,
            Ok(sample) => {
                let failure = ProbeFailure::parse(format!(
                    "{} probe returned a {} reading",
                    kind,
                    sample.reading.kind()
                ));
                warn!("{}", failure);
                self.publisher.publish_failure(kind, &failure, latency).await;
                return;
            }
            Err(failure) => {
                warn!("{} sampler error: {}", kind, failure);
                self.publisher.publish_failure(kind, &failure, latency).await;
                return;
            }
        };

        let derived = match self.counters.entry(kind) {
            Entry::Occupied(mut stored) => {
                let mut derived = derive(sample.reading, Some(stored.get()), taken_at);
                if let Some(counters) = derived.counters.take() {
                    stored.insert(counters);
                }
                derived
            }
            Entry::Vacant(slot) => {
                let mut derived = derive(sample.reading, None, taken_at);
                if let Some(counters) = derived.counters.take() {
                    slot.insert(counters);
                }
                derived
            }
        };

        let Some(value) = derived.value else {
            debug!("{} sample overtaken by a newer one; not published", kind);
            return;
        };

        let now = Utc::now();
        for (series, value) in &derived.trend {
            if let Some(mut buffer) = self.histories.get_mut(series) {
                buffer.add_at(now, *value);
            }
        }
        self.publisher
            .publish_success(kind, value, sample.source, latency)
            .await;
    }
}
