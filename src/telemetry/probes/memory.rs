use super::super::error::ProbeFailure;
use super::super::types::{MemoryPages, MetricKind, RawReading, Sample};
use super::Probe;

/// Virtual-memory page counts from `host_statistics64`, through the guarded
/// host port.
#[derive(Default)]
pub struct MemoryProbe;

impl MemoryProbe {
    pub fn new() -> Self {
        MemoryProbe
    }
}

impl Probe for MemoryProbe {
    fn kind(&self) -> MetricKind {
        MetricKind::Memory
    }

    fn sample(&self) -> Result<Sample, ProbeFailure> {
        let pages = read_vm_pages()?;
        Ok(Sample::new("mach::host_statistics64", RawReading::Memory(pages)))
    }
}

/// `(used bytes, percent)` where used covers active, wired and compressed
/// pages and the denominator adds free and inactive pages.
pub fn memory_usage(pages: &MemoryPages) -> (u64, f64) {
    let used_pages = pages.active + pages.wired + pages.compressed;
    let considered = used_pages + pages.free + pages.inactive;
    let used_bytes = used_pages.saturating_mul(pages.page_size);
    if considered == 0 {
        return (used_bytes, 0.0);
    }
    let percent = used_pages as f64 / considered as f64 * 100.0;
    (used_bytes, percent.clamp(0.0, 100.0))
}

#[cfg(target_os = "macos")]
fn read_vm_pages() -> Result<MemoryPages, ProbeFailure> {
    use std::mem::MaybeUninit;

    use libc::{
        host_statistics64, mach_msg_type_number_t, vm_statistics64, HOST_VM_INFO64,
        HOST_VM_INFO64_COUNT,
    };

    use super::super::guard::host_port;

    let host = host_port();
    let mut stats = MaybeUninit::<vm_statistics64>::uninit();
    let mut count: mach_msg_type_number_t = HOST_VM_INFO64_COUNT;
    let result = unsafe {
        host_statistics64(
            host.0,
            HOST_VM_INFO64,
            stats.as_mut_ptr() as *mut _,
            &mut count,
        )
    };
    if result != 0 {
        return Err(ProbeFailure::QueryFailed("host_statistics64", result));
    }
    let stats = unsafe { stats.assume_init() };

    let page_size_raw = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    let page_size = if page_size_raw > 0 {
        page_size_raw as u64
    } else {
        4096
    };

    Ok(MemoryPages {
        active: stats.active_count as u64,
        wired: stats.wire_count as u64,
        compressed: stats.compressor_page_count as u64,
        free: stats.free_count as u64,
        inactive: stats.inactive_count as u64,
        page_size,
        total_bytes: read_sysctl_u64("hw.memsize").unwrap_or(0),
    })
}

#[cfg(target_os = "macos")]
fn read_sysctl_u64(name: &str) -> Result<u64, ProbeFailure> {
    use std::ffi::CString;
    use std::ptr;

    let c_name = CString::new(name).map_err(|e| ProbeFailure::parse(e.to_string()))?;
    let mut size: libc::size_t = std::mem::size_of::<u64>() as libc::size_t;
    let mut value: u64 = 0;
    let result = unsafe {
        libc::sysctlbyname(
            c_name.as_ptr(),
            &mut value as *mut u64 as *mut libc::c_void,
            &mut size as *mut libc::size_t,
            ptr::null_mut(),
            0,
        )
    };
    if result != 0 {
        return Err(ProbeFailure::QueryFailed(
            "sysctlbyname",
            std::io::Error::last_os_error().raw_os_error().unwrap_or(result),
        ));
    }
    Ok(value)
}

#[cfg(not(target_os = "macos"))]
fn read_vm_pages() -> Result<MemoryPages, ProbeFailure> {
    Err(ProbeFailure::Unsupported("host_statistics64"))
}
