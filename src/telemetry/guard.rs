use std::sync::OnceLock;

/// Holds a scarce OS handle that must be acquired at most once.
///
/// The acquisition function is bound at construction and there is no way to
/// release or replace the handle afterwards; it lives until the guard is
/// dropped, which for the process-wide guards means process exit.
pub struct ResourceGuard<T> {
    handle: OnceLock<T>,
    acquire: fn() -> T,
}

impl<T> ResourceGuard<T> {
    pub const fn new(acquire: fn() -> T) -> Self {
        ResourceGuard {
            handle: OnceLock::new(),
            acquire,
        }
    }

    /// Returns the handle, acquiring it on first use. Concurrent first calls
    /// block on each other; exactly one of them runs the acquisition.
    pub fn get(&self) -> &T {
        self.handle.get_or_init(self.acquire)
    }

    pub fn is_acquired(&self) -> bool {
        self.handle.get().is_some()
    }
}

/// The Mach host port used for processor and VM statistics.
///
/// Every `mach_host_self()` call adds a send right to the port. Calling it on
/// each sample leaks rights until the per-process limit is hit, after which
/// the window server stops delivering keyboard and mouse events system-wide.
#[cfg(target_os = "macos")]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HostPort(pub libc::mach_port_t);

#[cfg(target_os = "macos")]
fn acquire_host_port() -> HostPort {
    log::debug!("acquiring mach host port");
    #[allow(deprecated)]
    let port = unsafe { libc::mach_host_self() };
    HostPort(port)
}

#[cfg(target_os = "macos")]
static HOST_PORT: ResourceGuard<HostPort> = ResourceGuard::new(acquire_host_port);

#[cfg(target_os = "macos")]
pub fn host_port() -> HostPort {
    *HOST_PORT.get()
}
