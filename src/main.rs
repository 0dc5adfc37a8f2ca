use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use bytesize::ByteSize;
use clap::Parser;
use log::error;

use statusbar_telemetry::config::{MAX_DURATION_SECS, MIN_INTERVAL_SECS};
use statusbar_telemetry::{MetricSnapshot, MetricValue, TelemetryConfig, TelemetryEngine};

/// Gap between the two samples `--once` takes of the counter-based metrics.
const RATE_WINDOW: Duration = Duration::from_secs(1);

/// Samples the status bar metrics and prints them.
#[derive(Parser, Debug)]
#[command(name = "statusbar-telemetry", version)]
struct Cli {
    /// Config file; defaults to the per-user config when present.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Sample every metric once and exit.
    #[arg(long)]
    once: bool,

    /// Print snapshots as JSON lines.
    #[arg(long)]
    json: bool,

    /// Seconds between printed reports while running.
    #[arg(long, default_value = "5", value_parser = parse_seconds)]
    every: Duration,
}

fn parse_seconds(raw: &str) -> Result<Duration, String> {
    let secs: f64 = raw
        .parse()
        .map_err(|_| format!("`{}` is not a number of seconds", raw))?;
    if !(MIN_INTERVAL_SECS..=MAX_DURATION_SECS).contains(&secs) {
        return Err(format!(
            "must be between {} and {} seconds",
            MIN_INTERVAL_SECS, MAX_DURATION_SECS
        ));
    }
    Duration::try_from_secs_f64(secs).map_err(|err| err.to_string())
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => TelemetryConfig::load(path),
        None => TelemetryConfig::load_default(),
    };
    let config = match config {
        Ok(config) => config,
        Err(err) => {
            error!("{}", err);
            return ExitCode::FAILURE;
        }
    };

    let engine = match TelemetryEngine::new(config) {
        Ok(engine) => engine,
        Err(err) => {
            error!("{}", err);
            return ExitCode::FAILURE;
        }
    };

    if cli.once {
        engine.refresh_all_with_rates(RATE_WINDOW).await;
        report(&engine.snapshots().await, cli.json);
        return ExitCode::SUCCESS;
    }

    let every = cli.every;
    engine.start();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = tokio::time::sleep(every) => report(&engine.snapshots().await, cli.json),
        }
    }
    engine.stop();
    ExitCode::SUCCESS
}

fn report(snapshots: &[MetricSnapshot], json: bool) {
    for snapshot in snapshots {
        if json {
            match serde_json::to_string(snapshot) {
                Ok(line) => println!("{}", line),
                Err(err) => error!("failed to encode {} snapshot: {}", snapshot.kind, err),
            }
            continue;
        }
        let mut line = format!("{:<16} {}", snapshot.kind.as_str(), describe(&snapshot.value));
        if let Some(err) = &snapshot.error {
            line.push_str(&format!("  [{}]", err));
        }
        println!("{}", line);
    }
    if !json {
        println!();
    }
}

fn per_second(rate: f64) -> String {
    format!("{}/s", ByteSize::b(rate.max(0.0) as u64))
}

fn describe(value: &MetricValue) -> String {
    match value {
        MetricValue::Battery(b) => format!(
            "{}%{}{}",
            b.percent,
            if b.charging { " charging" } else { "" },
            if b.low_power_mode { " low-power" } else { "" }
        ),
        MetricValue::Cpu(c) => format!("{:.1}% of {} cores", c.percent, c.core_count),
        MetricValue::Memory(m) => format!(
            "{:.1}% ({} of {})",
            m.percent,
            ByteSize::b(m.used_bytes),
            ByteSize::b(m.total_bytes)
        ),
        MetricValue::Gpu(percent) => format!("{:.1}%", percent),
        MetricValue::Network(n) => format!(
            "down {} up {}",
            per_second(n.download_bytes_per_sec),
            per_second(n.upload_bytes_per_sec)
        ),
        MetricValue::DiskIo(d) => format!(
            "read {} write {}",
            per_second(d.read_bytes_per_sec),
            per_second(d.write_bytes_per_sec)
        ),
        MetricValue::Wifi(w) => match (&w.ssid, w.active) {
            (Some(ssid), true) => format!("{} on {}", w.interface, ssid),
            (None, true) => format!("{} active", w.interface),
            _ => format!("{} inactive", w.interface),
        },
        MetricValue::Volume(a) | MetricValue::Mic(a) => format!(
            "{:.0}%{}",
            a.level * 100.0,
            if a.muted { " muted" } else { "" }
        ),
        MetricValue::KeyboardLayout(name) => name.clone(),
        MetricValue::MountedVolumes(volumes) => volumes
            .iter()
            .map(|v| format!("{} ({} free)", v.name, ByteSize::b(v.available_bytes)))
            .collect::<Vec<_>>()
            .join(", "),
        MetricValue::SleepInhibitor(s) => match (s.active, s.pid) {
            (true, Some(pid)) if s.external => format!("active (external pid {})", pid),
            (true, Some(pid)) => format!("active (pid {})", pid),
            _ => "inactive".to_string(),
        },
    }
}
