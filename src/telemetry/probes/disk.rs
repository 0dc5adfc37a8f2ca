use std::sync::Arc;

use super::super::command::CommandRunner;
use super::super::error::ProbeFailure;
use super::super::types::{ByteCounters, MetricKind, RawReading, Sample};
use super::ioreg::{query_class, IoregEntry};
use super::Probe;

const STORAGE_DRIVER_CLASS: &str = "IOBlockStorageDriver";

const BYTES_READ_KEYS: &[&str] = &["Bytes (Read)", "Bytes read", "BytesRead"];
const BYTES_WRITTEN_KEYS: &[&str] = &["Bytes (Write)", "Bytes written", "BytesWritten"];
const READ_OPERATION_KEYS: &[&str] = &["Operations (Read)", "Reads"];
const WRITE_OPERATION_KEYS: &[&str] = &["Operations (Write)", "Writes"];

/// Assumed transfer size when a driver only reports operation counts.
pub const BYTES_PER_OPERATION: u64 = 4096;

/// Cumulative bytes read and written, summed over every block storage driver.
pub struct DiskIoProbe {
    runner: Arc<dyn CommandRunner>,
}

impl DiskIoProbe {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        DiskIoProbe { runner }
    }
}

impl Probe for DiskIoProbe {
    fn kind(&self) -> MetricKind {
        MetricKind::DiskIo
    }

    fn sample(&self) -> Result<Sample, ProbeFailure> {
        let entries = query_class(self.runner.as_ref(), STORAGE_DRIVER_CLASS)?;
        let totals = entries.iter().fold(ByteCounters::default(), |acc, entry| ByteCounters {
            inbound: acc
                .inbound
                .wrapping_add(transferred(entry, BYTES_READ_KEYS, READ_OPERATION_KEYS)),
            outbound: acc
                .outbound
                .wrapping_add(transferred(entry, BYTES_WRITTEN_KEYS, WRITE_OPERATION_KEYS)),
        });
        Ok(Sample::new("ioreg::IOBlockStorageDriver", RawReading::DiskIo(totals)))
    }
}

fn transferred(entry: &IoregEntry, byte_keys: &[&str], operation_keys: &[&str]) -> u64 {
    entry
        .first_number(byte_keys)
        .or_else(|| {
            entry
                .first_number(operation_keys)
                .map(|ops| ops.saturating_mul(BYTES_PER_OPERATION))
        })
        .unwrap_or(0)
}
