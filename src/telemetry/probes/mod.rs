mod audio;
mod battery;
mod cpu;
mod disk;
mod gpu;
mod inhibitor;
mod ioreg;
mod keyboard;
mod memory;
mod network;
mod volumes;
mod wifi;

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::TelemetryConfig;

use super::command::{CommandRunner, SystemCommandRunner};
use super::error::ProbeFailure;
use super::types::{MetricKind, Sample};

pub use audio::{combine_channels, AudioBackend, AudioDirection, AudioProbe, CoreAudioBackend};
pub use battery::{battery_percent, BatteryProbe};
pub use cpu::{flatten_ticks, CpuProbe};
pub use disk::{DiskIoProbe, BYTES_PER_OPERATION};
pub use gpu::{gpu_utilization, GpuProbe, DEVICE_UTILIZATION_DERATE, EFFECTIVE_UTILIZATION_FACTOR};
pub use inhibitor::{
    InhibitorProbe, ProcessControl, SleepInhibitor, SystemProcessControl, INHIBITOR_PROGRAM,
};
pub use ioreg::{parse_entries, IoregEntry};
pub use keyboard::KeyboardLayoutProbe;
pub use memory::{memory_usage, MemoryProbe};
pub use network::{
    parse_netstat, InterfaceFilter, NetstatCounters, NetworkProbe, RoutingTableCounters,
};
pub use volumes::MountedVolumesProbe;
pub use wifi::WifiProbe;

/// One OS query for one metric kind. Runs on a blocking worker.
pub trait Probe: Send + Sync {
    fn kind(&self) -> MetricKind;
    fn sample(&self) -> Result<Sample, ProbeFailure>;
}

/// Everything the engine queries or controls.
pub struct ProbeSet {
    probes: HashMap<MetricKind, Arc<dyn Probe>>,
    audio: Arc<dyn AudioBackend>,
    inhibitor: Arc<SleepInhibitor>,
}

impl ProbeSet {
    /// A set with no probes registered yet.
    pub fn new(audio: Arc<dyn AudioBackend>, inhibitor: Arc<SleepInhibitor>) -> Self {
        ProbeSet {
            probes: HashMap::new(),
            audio,
            inhibitor,
        }
    }

    /// The probes backed by the running system.
    pub fn system(config: &TelemetryConfig) -> Self {
        let runner: Arc<dyn CommandRunner> =
            Arc::new(SystemCommandRunner::new(config.command_timeout()));
        let audio: Arc<dyn AudioBackend> = Arc::new(CoreAudioBackend::new());
        let inhibitor = Arc::new(SleepInhibitor::new(Arc::new(SystemProcessControl::new())));
        let filter = InterfaceFilter::new(config.network_interfaces.iter().cloned());

        ProbeSet::new(Arc::clone(&audio), Arc::clone(&inhibitor))
            .with(BatteryProbe::new(runner.clone()))
            .with(CpuProbe::new())
            .with(MemoryProbe::new())
            .with(GpuProbe::new(runner.clone()))
            .with(NetworkProbe::new(runner.clone(), filter))
            .with(DiskIoProbe::new(runner.clone()))
            .with(WifiProbe::new(runner.clone()))
            .with(AudioProbe::new(AudioDirection::Output, Arc::clone(&audio)))
            .with(AudioProbe::new(AudioDirection::Input, audio))
            .with(KeyboardLayoutProbe::new(runner))
            .with(MountedVolumesProbe::new())
            .with(InhibitorProbe::new(inhibitor))
    }

    /// Registers `probe`, replacing any probe for the same kind.
    pub fn with(mut self, probe: impl Probe + 'static) -> Self {
        self.insert(Arc::new(probe));
        self
    }

    pub fn insert(&mut self, probe: Arc<dyn Probe>) {
        self.probes.insert(probe.kind(), probe);
    }

    pub fn get(&self, kind: MetricKind) -> Option<Arc<dyn Probe>> {
        self.probes.get(&kind).cloned()
    }

    pub fn kinds(&self) -> Vec<MetricKind> {
        let mut kinds: Vec<MetricKind> = self.probes.keys().copied().collect();
        kinds.sort();
        kinds
    }

    pub fn audio(&self) -> &Arc<dyn AudioBackend> {
        &self.audio
    }

    pub fn inhibitor(&self) -> &Arc<SleepInhibitor> {
        &self.inhibitor
    }
}
