#![cfg(test)]

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{TimeZone, Utc};
use futures::FutureExt;
use tokio::time::sleep;

use crate::config::TelemetryConfig;

use super::derive::derive;
use super::probes::{
    AudioBackend, AudioDirection, NetworkProbe, Probe, ProbeSet, ProcessControl, SleepInhibitor,
};
use super::*;

#[test]
fn counter_delta_treats_decrease_as_restart() {
    assert_eq!(counter_delta(100, 250), 150);
    assert_eq!(counter_delta(7, 7), 0);
    assert_eq!(counter_delta(u64::MAX - 5, 10), 10);
}

#[test]
fn rate_is_bytes_over_elapsed_seconds() {
    let t0 = Instant::now();
    let t1 = t0 + Duration::from_secs(2);
    assert_eq!(rate_per_second(1_000, 3_000, t0, t1), Some(1_000.0));
    assert_eq!(rate_per_second(5_000, 1_000, t0, t1), Some(500.0));
}

#[test]
fn rate_requires_strictly_increasing_time() {
    let t0 = Instant::now();
    assert_eq!(rate_per_second(0, 10, t0, t0), None);
    let earlier = t0;
    let later = t0 + Duration::from_millis(10);
    assert_eq!(rate_per_second(0, 10, later, earlier), None);
}

#[test]
fn rates_between_needs_matching_shapes() {
    let t0 = Instant::now();
    let previous = CounterSample::new(vec![0, 0], t0);
    let current = CounterSample::new(vec![4_000, 2_000], t0 + Duration::from_secs(4));
    assert_eq!(rates_between(&previous, &current), Some(vec![1_000.0, 500.0]));

    let reshaped = CounterSample::new(vec![1, 2, 3], t0 + Duration::from_secs(4));
    assert_eq!(rates_between(&previous, &reshaped), None);
}

#[test]
fn network_rates_over_five_seconds() {
    let t0 = Instant::now();
    let previous = CounterSample::new(vec![1_000, 500], t0);
    let current = CounterSample::new(vec![3_000, 700], t0 + Duration::from_secs(5));
    assert_eq!(rates_between(&previous, &current), Some(vec![400.0, 40.0]));

    let derived = derive(
        RawReading::Network(ByteCounters {
            inbound: 3_000,
            outbound: 700,
        }),
        Some(&previous),
        t0 + Duration::from_secs(5),
    );
    assert_eq!(
        derived.value,
        Some(MetricValue::Network(NetworkThroughput {
            download_bytes_per_sec: 400.0,
            upload_bytes_per_sec: 40.0,
        }))
    );
}

#[test]
fn overtaken_readings_are_not_published() {
    let t0 = Instant::now();
    let newer = CounterSample::new(vec![200, 100, 900, 0], t0 + Duration::from_millis(50));
    let derived = derive(ticks(100, 50, 800), Some(&newer), t0);
    assert_eq!(derived.value, None);
    assert!(derived.trend.is_empty());
    assert!(derived.counters.is_none());

    let newer = CounterSample::new(vec![5_000, 5_000], t0 + Duration::from_millis(50));
    for reading in [
        RawReading::Network(ByteCounters {
            inbound: 4_000,
            outbound: 4_000,
        }),
        RawReading::DiskIo(ByteCounters {
            inbound: 4_000,
            outbound: 4_000,
        }),
    ] {
        let derived = derive(reading, Some(&newer), t0);
        assert_eq!(derived.value, None);
        assert!(derived.counters.is_none());
    }

    let same_instant = CounterSample::new(vec![100, 50, 800, 0], t0);
    assert_eq!(derive(ticks(100, 50, 800), Some(&same_instant), t0).value, None);
}

#[test]
fn cpu_percent_from_tick_deltas() {
    let previous = [100, 50, 800, 0];
    let current = [200, 100, 900, 0];
    let percent = cpu_usage_percent(&previous, &current).expect("cpu percent");
    assert!((percent - 60.0).abs() < 1e-9);

    assert_eq!(cpu_usage_percent(&current, &current), None);
    assert_eq!(cpu_usage_percent(&previous, &[1, 2, 3, 4, 5, 6, 7, 8]), None);
}

#[test]
fn history_keeps_most_recent_points_in_order() {
    let mut history = HistoryBuffer::new(3);
    for (i, value) in [1.0, 2.0, 3.0, 4.0, 5.0].into_iter().enumerate() {
        let at = Utc.timestamp_opt(1_700_000_000 + i as i64, 0).unwrap();
        history.add_at(at, value);
    }
    assert_eq!(history.len(), 3);
    assert_eq!(history.values(), vec![3.0, 4.0, 5.0]);
    let points = history.points();
    assert!(points.windows(2).all(|w| w[0].at < w[1].at));
    assert_eq!(history.latest().map(|p| p.value), Some(5.0));

    history.clear();
    assert!(history.is_empty());
    assert_eq!(history.capacity(), 3);
}

#[test]
fn history_with_oversized_capacity_still_works() {
    let mut history = HistoryBuffer::new(usize::MAX);
    history.add(1.5);
    history.add(2.5);
    assert_eq!(history.capacity(), usize::MAX);
    assert_eq!(history.values(), vec![1.5, 2.5]);
}

static ACQUISITIONS: AtomicUsize = AtomicUsize::new(0);

fn acquire_counted() -> u32 {
    ACQUISITIONS.fetch_add(1, Ordering::SeqCst);
    thread::sleep(Duration::from_millis(5));
    42
}

static COUNTED: ResourceGuard<u32> = ResourceGuard::new(acquire_counted);

#[test]
fn resource_guard_acquires_once_across_threads() {
    assert!(!COUNTED.is_acquired());
    let handles: Vec<_> = (0..10)
        .map(|_| {
            thread::spawn(|| {
                for _ in 0..10 {
                    assert_eq!(*COUNTED.get(), 42);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("guard thread");
    }
    assert!(COUNTED.is_acquired());
    assert_eq!(ACQUISITIONS.load(Ordering::SeqCst), 1);
}

struct Fixed {
    name: &'static str,
    outcome: Result<u64, ProbeFailure>,
    calls: Arc<AtomicUsize>,
}

impl Fixed {
    fn new(name: &'static str, outcome: Result<u64, ProbeFailure>) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Fixed {
                name,
                outcome,
                calls: calls.clone(),
            },
            calls,
        )
    }
}

impl Strategy<u64> for Fixed {
    fn name(&self) -> &'static str {
        self.name
    }

    fn attempt(&self) -> Result<u64, ProbeFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}

#[test]
fn fallback_stops_at_first_success() {
    let (primary, _) = Fixed::new("primary", Err(ProbeFailure::no_data("nothing")));
    let (secondary, _) = Fixed::new("secondary", Ok(9));
    let (tertiary, tertiary_calls) = Fixed::new("tertiary", Ok(1));
    let chain = FallbackChain::new()
        .then(primary)
        .then(secondary)
        .then(tertiary);
    assert_eq!(chain.run(), Ok(("secondary", 9)));
    assert_eq!(tertiary_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn fallback_keeps_legitimate_zero() {
    let (primary, _) = Fixed::new("primary", Ok(0));
    let (secondary, secondary_calls) = Fixed::new("secondary", Ok(5));
    let chain = FallbackChain::new().then(primary).then(secondary);
    assert_eq!(chain.run(), Ok(("primary", 0)));
    assert_eq!(secondary_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn fallback_exhaustion_lists_every_attempt() {
    let (primary, _) = Fixed::new("primary", Err(ProbeFailure::Unsupported("sysctl")));
    let chain = FallbackChain::new().then(primary);
    match chain.run() {
        Err(ProbeFailure::Exhausted(attempts)) => {
            assert_eq!(attempts, vec!["primary: sysctl is not supported here".to_string()])
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert!(FallbackChain::<u64>::new().run().is_err());
}

#[tokio::test]
async fn publisher_starts_with_defaults() {
    let publisher = SnapshotPublisher::new();
    let all = publisher.all().await;
    assert_eq!(all.len(), MetricKind::ALL.len());
    let keyboard = publisher.snapshot(MetricKind::KeyboardLayout).await;
    assert_eq!(
        keyboard.value,
        MetricValue::KeyboardLayout(UNKNOWN_KEYBOARD_LAYOUT.to_string())
    );
    assert!(keyboard.last_success.is_none());
    assert!(keyboard.is_stale(Duration::from_secs(60)));
}

#[tokio::test]
async fn publisher_failure_policy_per_kind() {
    let publisher = SnapshotPublisher::new();
    let battery = MetricValue::Battery(BatteryStatus {
        percent: 64,
        charging: true,
        plugged_in: true,
        low_power_mode: false,
    });
    publisher
        .publish_success(MetricKind::Battery, battery.clone(), "test", Duration::from_millis(3))
        .await;
    publisher
        .publish_success(MetricKind::Gpu, MetricValue::Gpu(37.5), "test", Duration::ZERO)
        .await;

    let failure = ProbeFailure::no_data("gone");
    publisher
        .publish_failure(MetricKind::Battery, &failure, Duration::ZERO)
        .await;
    publisher
        .publish_failure(MetricKind::Gpu, &failure, Duration::ZERO)
        .await;

    let battery_snapshot = publisher.snapshot(MetricKind::Battery).await;
    assert_eq!(battery_snapshot.value, battery);
    assert_eq!(battery_snapshot.error.as_deref(), Some("no data: gone"));
    assert!(battery_snapshot.last_success.is_some());
    assert_eq!(battery_snapshot.source, "test");

    let gpu_snapshot = publisher.snapshot(MetricKind::Gpu).await;
    assert_eq!(gpu_snapshot.value, MetricValue::Gpu(0.0));
    assert!(gpu_snapshot.error.is_some());
}

fn counting_action(counter: Arc<AtomicUsize>) -> RefreshAction {
    Arc::new(move || {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
        }
        .boxed()
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn scheduler_ticks_until_cancelled() {
    let scheduler = RefreshScheduler::new(tokio::runtime::Handle::current());
    let ticks = Arc::new(AtomicUsize::new(0));

    assert!(!scheduler.schedule(MetricKind::Cpu, Duration::ZERO, counting_action(ticks.clone())));
    assert!(scheduler.schedule(
        MetricKind::Cpu,
        Duration::from_millis(40),
        counting_action(ticks.clone())
    ));
    assert_eq!(scheduler.interval(MetricKind::Cpu), Some(Duration::from_millis(40)));

    sleep(Duration::from_millis(20)).await;
    assert_eq!(ticks.load(Ordering::SeqCst), 0, "first tick waits one interval");

    sleep(Duration::from_millis(200)).await;
    assert!(ticks.load(Ordering::SeqCst) >= 2);

    scheduler.cancel_all();
    assert!(scheduler.scheduled_kinds().is_empty());
    sleep(Duration::from_millis(20)).await;
    let settled = ticks.load(Ordering::SeqCst);
    sleep(Duration::from_millis(150)).await;
    assert_eq!(ticks.load(Ordering::SeqCst), settled);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn scheduler_replaces_timer_and_fires_on_demand() {
    let scheduler = RefreshScheduler::new(tokio::runtime::Handle::current());
    let old = Arc::new(AtomicUsize::new(0));
    let new = Arc::new(AtomicUsize::new(0));

    scheduler.schedule(MetricKind::Gpu, Duration::from_millis(30), counting_action(old.clone()));
    scheduler.schedule(MetricKind::Gpu, Duration::from_secs(60), counting_action(new.clone()));
    assert_eq!(scheduler.scheduled_kinds(), vec![MetricKind::Gpu]);

    assert!(scheduler.fire_now(MetricKind::Gpu));
    assert!(!scheduler.fire_now(MetricKind::Battery));
    sleep(Duration::from_millis(150)).await;

    assert_eq!(old.load(Ordering::SeqCst), 0);
    assert_eq!(new.load(Ordering::SeqCst), 1);
    assert!(scheduler.cancel(MetricKind::Gpu));
    assert!(!scheduler.is_scheduled(MetricKind::Gpu));
}

// Engine fixtures.

struct SilentAudio;

impl AudioBackend for SilentAudio {
    fn read(&self, _direction: AudioDirection) -> Result<AudioLevel, ProbeFailure> {
        Ok(AudioLevel::default())
    }

    fn set_volume(&self, _direction: AudioDirection, _level: f32) -> bool {
        true
    }

    fn set_muted(&self, _direction: AudioDirection, _muted: bool) -> bool {
        false
    }
}

struct NoProcesses;

impl ProcessControl for NoProcesses {
    fn spawn(&self, _program: &str, _args: &[&str]) -> io::Result<u32> {
        Err(io::Error::new(io::ErrorKind::NotFound, "no caffeinate"))
    }

    fn terminate(&self, _pid: u32) -> bool {
        false
    }

    fn find_by_name(&self, _name: &str) -> Vec<u32> {
        Vec::new()
    }
}

fn empty_probe_set() -> ProbeSet {
    ProbeSet::new(
        Arc::new(SilentAudio),
        Arc::new(SleepInhibitor::new(Arc::new(NoProcesses))),
    )
}

/// Replays a fixed sequence of outcomes, repeating the last one.
struct Scripted {
    kind: MetricKind,
    outcomes: Mutex<Vec<Result<RawReading, ProbeFailure>>>,
    delay: Duration,
}

impl Scripted {
    fn new(kind: MetricKind, outcomes: Vec<Result<RawReading, ProbeFailure>>) -> Self {
        Scripted {
            kind,
            outcomes: Mutex::new(outcomes),
            delay: Duration::ZERO,
        }
    }

    fn slow(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl Probe for Scripted {
    fn kind(&self) -> MetricKind {
        self.kind
    }

    fn sample(&self) -> Result<Sample, ProbeFailure> {
        thread::sleep(self.delay);
        let mut outcomes = self.outcomes.lock().unwrap();
        let outcome = if outcomes.len() > 1 {
            outcomes.remove(0)
        } else {
            outcomes[0].clone()
        };
        outcome.map(|reading| Sample::new("scripted", reading))
    }
}

fn ticks(user: u64, system: u64, idle: u64) -> RawReading {
    RawReading::Cpu(vec![CoreTicks {
        user,
        system,
        idle,
        nice: 0,
    }])
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn engine_derives_cpu_percent_from_second_sample() {
    let probes = empty_probe_set().with(Scripted::new(
        MetricKind::Cpu,
        vec![Ok(ticks(100, 50, 800)), Ok(ticks(200, 100, 900))],
    ));
    let engine = TelemetryEngine::with_probes(TelemetryConfig::default(), probes).expect("engine");

    engine.refresh_now(MetricKind::Cpu).await;
    let first = engine.snapshot(MetricKind::Cpu).await;
    assert_eq!(
        first.value,
        MetricValue::Cpu(CpuUsage {
            percent: 0.0,
            core_count: 1
        })
    );
    assert!(engine.history(TrendSeries::CpuPercent).is_empty());

    engine.refresh_now(MetricKind::Cpu).await;
    match engine.snapshot(MetricKind::Cpu).await.value {
        MetricValue::Cpu(usage) => assert!((usage.percent - 60.0).abs() < 1e-9),
        other => panic!("unexpected value {:?}", other),
    }
    assert_eq!(engine.history(TrendSeries::CpuPercent).len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn one_shot_refresh_publishes_real_rates() {
    let probes = empty_probe_set()
        .with(Scripted::new(
            MetricKind::Cpu,
            vec![Ok(ticks(100, 50, 800)), Ok(ticks(200, 100, 900))],
        ))
        .with(Scripted::new(
            MetricKind::Gpu,
            vec![Ok(RawReading::Gpu(10.0)), Ok(RawReading::Gpu(90.0))],
        ));
    let engine = TelemetryEngine::with_probes(TelemetryConfig::default(), probes).expect("engine");

    engine.refresh_all_with_rates(Duration::from_millis(20)).await;

    match engine.snapshot(MetricKind::Cpu).await.value {
        MetricValue::Cpu(usage) => assert!((usage.percent - 60.0).abs() < 1e-9),
        other => panic!("unexpected value {:?}", other),
    }
    assert_eq!(engine.history(TrendSeries::CpuPercent).len(), 1);
    // Kinds without a baseline are sampled once.
    assert_eq!(engine.snapshot(MetricKind::Gpu).await.value, MetricValue::Gpu(10.0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn engine_network_rate_uses_fallback_source() {
    struct Counters(Mutex<u64>);
    impl Strategy<ByteCounters> for Counters {
        fn name(&self) -> &'static str {
            "netstat -ib"
        }
        fn attempt(&self) -> Result<ByteCounters, ProbeFailure> {
            let mut total = self.0.lock().unwrap();
            *total += 1_000;
            Ok(ByteCounters {
                inbound: *total,
                outbound: *total / 2,
            })
        }
    }
    struct Failing;
    impl Strategy<ByteCounters> for Failing {
        fn name(&self) -> &'static str {
            "sysctl::NET_RT_IFLIST2"
        }
        fn attempt(&self) -> Result<ByteCounters, ProbeFailure> {
            Err(ProbeFailure::QueryFailed("sysctl(NET_RT_IFLIST2)", 1))
        }
    }

    let chain = FallbackChain::new().then(Failing).then(Counters(Mutex::new(0)));
    let probes = empty_probe_set().with(NetworkProbe::with_chain(chain));
    let engine = TelemetryEngine::with_probes(TelemetryConfig::default(), probes).expect("engine");

    engine.refresh_now(MetricKind::Network).await;
    sleep(Duration::from_millis(20)).await;
    engine.refresh_now(MetricKind::Network).await;

    let snapshot = engine.snapshot(MetricKind::Network).await;
    assert_eq!(snapshot.source, "netstat -ib");
    assert!(snapshot.error.is_none());
    match snapshot.value {
        MetricValue::Network(throughput) => {
            assert!(throughput.download_bytes_per_sec > 0.0);
            assert!(throughput.upload_bytes_per_sec > 0.0);
            assert!(throughput.download_bytes_per_sec > throughput.upload_bytes_per_sec);
        }
        other => panic!("unexpected value {:?}", other),
    }
    assert_eq!(engine.history(TrendSeries::NetworkDownload).len(), 1);
    assert_eq!(engine.history(TrendSeries::NetworkUpload).len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn engine_applies_failure_policies() {
    let battery = RawReading::Battery(BatteryReading {
        current_capacity: 50,
        max_capacity: 100,
        charging: false,
        plugged_in: false,
        low_power_mode: false,
    });
    let probes = empty_probe_set()
        .with(Scripted::new(
            MetricKind::Battery,
            vec![Ok(battery), Err(ProbeFailure::no_data("no internal battery"))],
        ))
        .with(Scripted::new(
            MetricKind::Gpu,
            vec![Ok(RawReading::Gpu(12.0)), Err(ProbeFailure::parse("bad"))],
        ));
    let engine = TelemetryEngine::with_probes(TelemetryConfig::default(), probes).expect("engine");

    engine.refresh_all_now().await;
    engine.refresh_all_now().await;

    let battery = engine.snapshot(MetricKind::Battery).await;
    match battery.value {
        MetricValue::Battery(status) => assert_eq!(status.percent, 50),
        other => panic!("unexpected value {:?}", other),
    }
    assert!(battery.error.is_some());

    let gpu = engine.snapshot(MetricKind::Gpu).await;
    assert_eq!(gpu.value, MetricValue::Gpu(0.0));
    assert!(gpu.error.is_some());
    assert_eq!(engine.history(TrendSeries::GpuPercent).len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn engine_discards_samples_finished_after_stop() {
    let probes = empty_probe_set().with(
        Scripted::new(MetricKind::Gpu, vec![Ok(RawReading::Gpu(80.0))])
            .slow(Duration::from_millis(150)),
    );
    let engine = TelemetryEngine::with_probes(TelemetryConfig::default(), probes).expect("engine");

    engine.start();
    assert!(engine.is_running());
    engine.stop();
    assert!(!engine.is_running());

    sleep(Duration::from_millis(400)).await;
    let gpu = engine.snapshot(MetricKind::Gpu).await;
    assert!(gpu.last_success.is_none());
    assert_eq!(gpu.value, MetricValue::Gpu(0.0));
    assert!(engine.history(TrendSeries::GpuPercent).is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn engine_start_samples_immediately() {
    let probes = empty_probe_set().with(Scripted::new(
        MetricKind::KeyboardLayout,
        vec![Ok(RawReading::KeyboardLayout("ABC".to_string()))],
    ));
    let engine = TelemetryEngine::with_probes(TelemetryConfig::default(), probes).expect("engine");
    engine.start();
    engine.start();

    sleep(Duration::from_millis(200)).await;
    let layout = engine.snapshot(MetricKind::KeyboardLayout).await;
    assert_eq!(layout.value, MetricValue::KeyboardLayout("ABC".to_string()));
    assert_eq!(layout.source, "scripted");
    engine.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn engine_audio_writes_report_settable() {
    let engine =
        TelemetryEngine::with_probes(TelemetryConfig::default(), empty_probe_set()).expect("engine");
    assert!(engine.set_output_volume(1.7));
    assert!(!engine.set_mic_muted(true));

    let status = engine.toggle_sleep_inhibitor(InhibitOption::Display);
    assert!(!status.active);
}

#[test]
fn engine_builds_private_runtime_outside_tokio() {
    let engine =
        TelemetryEngine::with_probes(TelemetryConfig::default(), empty_probe_set()).expect("engine");
    engine.start();
    assert!(engine.is_running());
    engine.stop();
    assert!(!engine.is_running());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn engine_keeps_snapshot_when_sample_is_overtaken() {
    let probes = empty_probe_set().with(Scripted::new(
        MetricKind::Cpu,
        vec![
            Ok(ticks(100, 50, 800)),
            Ok(ticks(200, 100, 900)),
            Ok(ticks(300, 150, 1_000)),
        ],
    ));
    let engine = TelemetryEngine::with_probes(TelemetryConfig::default(), probes).expect("engine");
    engine.refresh_now(MetricKind::Cpu).await;
    engine.refresh_now(MetricKind::Cpu).await;
    let published = engine.snapshot(MetricKind::Cpu).await;
    assert_eq!(engine.history(TrendSeries::CpuPercent).len(), 1);

    // A baseline stored by a sample that finished after the next one was taken.
    let ahead = CounterSample::new(
        vec![250, 125, 950, 0],
        Instant::now() + Duration::from_secs(3_600),
    );
    engine.store_baseline(MetricKind::Cpu, ahead.clone());
    engine.refresh_now(MetricKind::Cpu).await;

    let after = engine.snapshot(MetricKind::Cpu).await;
    assert_eq!(after.value, published.value);
    assert_eq!(after.last_success, published.last_success);
    assert!(after.error.is_none());
    match after.value {
        MetricValue::Cpu(usage) => assert!((usage.percent - 60.0).abs() < 1e-9),
        other => panic!("unexpected value {:?}", other),
    }
    assert_eq!(engine.history(TrendSeries::CpuPercent).len(), 1);
    assert_eq!(engine.baseline(MetricKind::Cpu), Some(ahead));
}

static PORT_ACQUISITIONS: AtomicUsize = AtomicUsize::new(0);

fn acquire_port() -> u32 {
    PORT_ACQUISITIONS.fetch_add(1, Ordering::SeqCst);
    7
}

static PORT: ResourceGuard<u32> = ResourceGuard::new(acquire_port);

/// Reads through `PORT` on every sample, like the Mach-backed probes.
struct PortBound;

impl Probe for PortBound {
    fn kind(&self) -> MetricKind {
        MetricKind::Gpu
    }

    fn sample(&self) -> Result<Sample, ProbeFailure> {
        let port = *PORT.get();
        Ok(Sample::new("port", RawReading::Gpu(port as f64)))
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn guard_acquires_once_across_engine_cycles() {
    let engine = TelemetryEngine::with_probes(
        TelemetryConfig::default(),
        empty_probe_set().with(PortBound),
    )
    .expect("engine");

    for _ in 0..10 {
        engine.start();
        for _ in 0..10 {
            engine.refresh_now(MetricKind::Gpu).await;
        }
        engine.stop();
    }

    assert!(PORT.is_acquired());
    assert_eq!(PORT_ACQUISITIONS.load(Ordering::SeqCst), 1);
    assert_eq!(engine.snapshot(MetricKind::Gpu).await.value, MetricValue::Gpu(7.0));
}
