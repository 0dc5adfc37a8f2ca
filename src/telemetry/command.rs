use std::io::Read;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use log::debug;

use super::error::ProbeFailure;

/// Runs an external command and returns its stdout.
///
/// Probes that shell out take this instead of spawning directly so tests can
/// script the output.
pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &str, args: &[&str]) -> Result<String, ProbeFailure>;
}

/// Spawns real processes, killing any that outlive `timeout`.
pub struct SystemCommandRunner {
    timeout: Duration,
}

impl SystemCommandRunner {
    pub fn new(timeout: Duration) -> Self {
        SystemCommandRunner { timeout }
    }
}

impl CommandRunner for SystemCommandRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<String, ProbeFailure> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| ProbeFailure::subprocess(program, e.to_string()))?;

        // Drain stdout on its own thread so a chatty child (ioreg) cannot
        // stall on a full pipe while we wait for it.
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| ProbeFailure::subprocess(program, "stdout not captured"))?;
        let reader = thread::spawn(move || {
            let mut out = Vec::new();
            let _ = stdout.read_to_end(&mut out);
            out
        });

        let started = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if started.elapsed() >= self.timeout {
                        debug!("killing {} after {:?}", program, self.timeout);
                        let _ = child.kill();
                        let _ = child.wait();
                        let _ = reader.join();
                        return Err(ProbeFailure::Timeout {
                            program: program.to_string(),
                        });
                    }
                    thread::sleep(Duration::from_millis(5));
                }
                Err(e) => return Err(ProbeFailure::subprocess(program, e.to_string())),
            }
        };

        let out = reader
            .join()
            .map_err(|_| ProbeFailure::subprocess(program, "stdout reader panicked"))?;
        if !status.success() {
            return Err(ProbeFailure::subprocess(program, format!("exited with {}", status)));
        }
        Ok(String::from_utf8_lossy(&out).into_owned())
    }
}
