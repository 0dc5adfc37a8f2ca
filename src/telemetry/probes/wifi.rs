use std::sync::Arc;

use super::super::command::CommandRunner;
use super::super::error::ProbeFailure;
use super::super::types::{MetricKind, RawReading, Sample, WifiStatus};
use super::Probe;

const DEFAULT_WIFI_DEVICE: &str = "en0";

pub struct WifiProbe {
    runner: Arc<dyn CommandRunner>,
}

impl WifiProbe {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        WifiProbe { runner }
    }
}

impl Probe for WifiProbe {
    fn kind(&self) -> MetricKind {
        MetricKind::Wifi
    }

    fn sample(&self) -> Result<Sample, ProbeFailure> {
        let interface = self
            .runner
            .run("networksetup", &["-listallhardwareports"])
            .ok()
            .and_then(|out| wifi_device(&out))
            .unwrap_or_else(|| DEFAULT_WIFI_DEVICE.to_string());

        let ifconfig = self.runner.run("ifconfig", &[interface.as_str()])?;
        let active = interface_active(&ifconfig);
        let ssid = if active {
            self.runner
                .run("networksetup", &["-getairportnetwork", interface.as_str()])
                .ok()
                .and_then(|out| parse_ssid(&out))
        } else {
            None
        };

        Ok(Sample::new(
            "networksetup",
            RawReading::Wifi(WifiStatus {
                interface,
                active,
                ssid,
            }),
        ))
    }
}

/// The `Device:` line following `Hardware Port: Wi-Fi` (or `AirPort`).
pub(crate) fn wifi_device(hardware_ports: &str) -> Option<String> {
    let mut in_wifi_block = false;
    for line in hardware_ports.lines() {
        let line = line.trim();
        if let Some(port) = line.strip_prefix("Hardware Port:") {
            let port = port.trim();
            in_wifi_block = port == "Wi-Fi" || port == "AirPort";
        } else if in_wifi_block {
            if let Some(device) = line.strip_prefix("Device:") {
                let device = device.trim();
                if !device.is_empty() {
                    return Some(device.to_string());
                }
            }
        }
    }
    None
}

pub(crate) fn interface_active(ifconfig: &str) -> bool {
    ifconfig
        .lines()
        .any(|line| line.trim() == "status: active")
}

pub(crate) fn parse_ssid(airport_network: &str) -> Option<String> {
    airport_network.lines().find_map(|line| {
        line.trim()
            .strip_prefix("Current Wi-Fi Network:")
            .or_else(|| line.trim().strip_prefix("Current AirPort Network:"))
            .map(str::trim)
            .filter(|ssid| !ssid.is_empty())
            .map(str::to_string)
    })
}
