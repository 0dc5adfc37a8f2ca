use std::collections::HashMap;
use std::io;
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};

use log::{debug, info, warn};
use sysinfo::System;

use super::super::error::ProbeFailure;
use super::super::types::{InhibitOption, InhibitorStatus, MetricKind, RawReading, Sample};
use super::Probe;

pub const INHIBITOR_PROGRAM: &str = "caffeinate";

/// Spawn, terminate and find processes.
pub trait ProcessControl: Send + Sync {
    fn spawn(&self, program: &str, args: &[&str]) -> io::Result<u32>;
    fn terminate(&self, pid: u32) -> bool;
    fn find_by_name(&self, name: &str) -> Vec<u32>;
}

/// Real processes. Children spawned here are kept so they can be reaped.
#[derive(Default)]
pub struct SystemProcessControl {
    children: Mutex<HashMap<u32, Child>>,
}

impl SystemProcessControl {
    pub fn new() -> Self {
        Self::default()
    }

    fn reap_exited(&self) {
        let mut children = self.children.lock().unwrap_or_else(|e| e.into_inner());
        children.retain(|_, child| matches!(child.try_wait(), Ok(None)));
    }
}

impl ProcessControl for SystemProcessControl {
    fn spawn(&self, program: &str, args: &[&str]) -> io::Result<u32> {
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        let pid = child.id();
        self.children
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(pid, child);
        Ok(pid)
    }

    fn terminate(&self, pid: u32) -> bool {
        let owned = self
            .children
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&pid);
        if let Some(mut child) = owned {
            let killed = child.kill().is_ok();
            let _ = child.wait();
            return killed;
        }
        unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) == 0 }
    }

    fn find_by_name(&self, name: &str) -> Vec<u32> {
        self.reap_exited();
        let mut system = System::new();
        system.refresh_processes();
        let mut pids: Vec<u32> = system
            .processes()
            .iter()
            .filter(|(_, process)| process.name() == name)
            .map(|(pid, _)| pid.as_u32())
            .collect();
        pids.sort_unstable();
        pids
    }
}

#[derive(Clone, Copy, Debug)]
struct OwnedInhibitor {
    pid: u32,
    option: InhibitOption,
}

/// Keeps the machine awake by holding a `caffeinate` child.
///
/// At most one inhibitor runs at a time: starting one first terminates any
/// other `caffeinate` on the system, including ones this engine did not spawn.
pub struct SleepInhibitor {
    control: Arc<dyn ProcessControl>,
    owned: Mutex<Option<OwnedInhibitor>>,
}

impl SleepInhibitor {
    pub fn new(control: Arc<dyn ProcessControl>) -> Self {
        SleepInhibitor {
            control,
            owned: Mutex::new(None),
        }
    }

    pub fn status(&self) -> InhibitorStatus {
        let running = self.control.find_by_name(INHIBITOR_PROGRAM);
        let mut owned = self.owned.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(current) = *owned {
            if running.contains(&current.pid) {
                return InhibitorStatus {
                    active: true,
                    pid: Some(current.pid),
                    external: false,
                    option: Some(current.option),
                };
            }
            debug!("inhibitor {} exited on its own", current.pid);
            *owned = None;
        }

        match running.first() {
            Some(pid) => InhibitorStatus {
                active: true,
                pid: Some(*pid),
                external: true,
                option: None,
            },
            None => InhibitorStatus::default(),
        }
    }

    /// Stops a running inhibitor, or starts one holding `option`.
    pub fn toggle(&self, option: InhibitOption) -> InhibitorStatus {
        if self.status().active {
            self.stop();
            return self.status();
        }

        self.terminate_all();
        match self.control.spawn(INHIBITOR_PROGRAM, &[option.flag()]) {
            Ok(pid) => {
                info!("sleep inhibitor started (pid {}, {})", pid, option.flag());
                *self.owned.lock().unwrap_or_else(|e| e.into_inner()) =
                    Some(OwnedInhibitor { pid, option });
                InhibitorStatus {
                    active: true,
                    pid: Some(pid),
                    external: false,
                    option: Some(option),
                }
            }
            Err(e) => {
                warn!("failed to spawn {}: {}", INHIBITOR_PROGRAM, e);
                InhibitorStatus::default()
            }
        }
    }

    pub fn stop(&self) {
        let owned = self.owned.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(current) = owned {
            self.control.terminate(current.pid);
        }
        self.terminate_all();
        info!("sleep inhibitor stopped");
    }

    fn terminate_all(&self) {
        for pid in self.control.find_by_name(INHIBITOR_PROGRAM) {
            if !self.control.terminate(pid) {
                warn!("could not terminate {} (pid {})", INHIBITOR_PROGRAM, pid);
            }
        }
    }
}

pub struct InhibitorProbe {
    inhibitor: Arc<SleepInhibitor>,
}

impl InhibitorProbe {
    pub fn new(inhibitor: Arc<SleepInhibitor>) -> Self {
        InhibitorProbe { inhibitor }
    }
}

impl Probe for InhibitorProbe {
    fn kind(&self) -> MetricKind {
        MetricKind::SleepInhibitor
    }

    fn sample(&self) -> Result<Sample, ProbeFailure> {
        Ok(Sample::new(
            "process-table",
            RawReading::SleepInhibitor(self.inhibitor.status()),
        ))
    }
}
