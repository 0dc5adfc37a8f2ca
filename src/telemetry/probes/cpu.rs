use super::super::error::ProbeFailure;
use super::super::types::{CoreTicks, MetricKind, RawReading, Sample};
use super::Probe;

/// Per-core tick counters from `host_processor_info`.
///
/// The host port comes from the process-wide guard; this probe never calls
/// `mach_host_self()` itself.
#[derive(Default)]
pub struct CpuProbe;

impl CpuProbe {
    pub fn new() -> Self {
        CpuProbe
    }
}

impl Probe for CpuProbe {
    fn kind(&self) -> MetricKind {
        MetricKind::Cpu
    }

    fn sample(&self) -> Result<Sample, ProbeFailure> {
        let cores = read_core_ticks()?;
        if cores.is_empty() {
            return Err(ProbeFailure::no_data("processor list empty"));
        }
        Ok(Sample::new("mach::host_processor_info", RawReading::Cpu(cores)))
    }
}

/// Flattens per-core ticks into `[user, system, idle, nice, user, ...]`.
pub fn flatten_ticks(cores: &[CoreTicks]) -> Vec<u64> {
    cores
        .iter()
        .flat_map(|c| [c.user, c.system, c.idle, c.nice])
        .collect()
}

#[cfg(target_os = "macos")]
mod mach {
    use libc::{c_int, mach_port_t};

    pub const PROCESSOR_CPU_LOAD_INFO: c_int = 2;
    pub const CPU_STATE_MAX: usize = 4;
    pub const CPU_STATE_USER: usize = 0;
    pub const CPU_STATE_SYSTEM: usize = 1;
    pub const CPU_STATE_IDLE: usize = 2;
    pub const CPU_STATE_NICE: usize = 3;

    extern "C" {
        pub static mach_task_self_: mach_port_t;

        pub fn host_processor_info(
            host: mach_port_t,
            flavor: c_int,
            out_processor_count: *mut u32,
            out_processor_info: *mut *mut c_int,
            out_processor_info_count: *mut u32,
        ) -> c_int;

        pub fn vm_deallocate(target_task: mach_port_t, address: usize, size: usize) -> c_int;
    }
}

#[cfg(target_os = "macos")]
fn read_core_ticks() -> Result<Vec<CoreTicks>, ProbeFailure> {
    use super::super::guard::host_port;
    use mach::*;

    let host = host_port();
    let mut processor_count: u32 = 0;
    let mut info: *mut libc::c_int = std::ptr::null_mut();
    let mut info_count: u32 = 0;

    let result = unsafe {
        host_processor_info(
            host.0,
            PROCESSOR_CPU_LOAD_INFO,
            &mut processor_count,
            &mut info,
            &mut info_count,
        )
    };
    if result != 0 {
        return Err(ProbeFailure::QueryFailed("host_processor_info", result));
    }
    if info.is_null() {
        return Err(ProbeFailure::no_data("host_processor_info returned no array"));
    }

    let needed = processor_count as usize * CPU_STATE_MAX;
    let mut cores = Vec::with_capacity(processor_count as usize);
    if needed <= info_count as usize {
        for core in 0..processor_count as usize {
            let base = core * CPU_STATE_MAX;
            // Ticks are natural_t and wrap at 32 bits.
            let tick = |state: usize| (unsafe { *info.add(base + state) }) as u32 as u64;
            cores.push(CoreTicks {
                user: tick(CPU_STATE_USER),
                system: tick(CPU_STATE_SYSTEM),
                idle: tick(CPU_STATE_IDLE),
                nice: tick(CPU_STATE_NICE),
            });
        }
    }

    // The kernel maps the array into our task; hand it back every time.
    unsafe {
        vm_deallocate(
            mach_task_self_,
            info as usize,
            info_count as usize * std::mem::size_of::<libc::c_int>(),
        );
    }

    if cores.is_empty() {
        return Err(ProbeFailure::parse("processor info shorter than expected"));
    }
    Ok(cores)
}

#[cfg(not(target_os = "macos"))]
fn read_core_ticks() -> Result<Vec<CoreTicks>, ProbeFailure> {
    Err(ProbeFailure::Unsupported("host_processor_info"))
}
