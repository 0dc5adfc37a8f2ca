use sysinfo::Disks;

use super::super::error::ProbeFailure;
use super::super::types::{MetricKind, MountedVolume, RawReading, Sample};
use super::Probe;

/// Mounted volumes with their capacity.
#[derive(Default)]
pub struct MountedVolumesProbe;

impl MountedVolumesProbe {
    pub fn new() -> Self {
        MountedVolumesProbe
    }
}

impl Probe for MountedVolumesProbe {
    fn kind(&self) -> MetricKind {
        MetricKind::MountedVolumes
    }

    fn sample(&self) -> Result<Sample, ProbeFailure> {
        let disks = Disks::new_with_refreshed_list();
        let list = disks.list();
        if list.is_empty() {
            return Err(ProbeFailure::no_data("no volumes mounted"));
        }

        let volumes = list
            .iter()
            .map(|disk| {
                let mount_point = disk.mount_point().to_string_lossy().to_string();
                let name = disk.name().to_string_lossy().to_string();
                MountedVolume {
                    name: if name.is_empty() {
                        mount_point.clone()
                    } else {
                        name
                    },
                    mount_point,
                    total_bytes: disk.total_space(),
                    available_bytes: disk.available_space(),
                }
            })
            .collect();
        Ok(Sample::new("sysinfo::disks", RawReading::MountedVolumes(volumes)))
    }
}
