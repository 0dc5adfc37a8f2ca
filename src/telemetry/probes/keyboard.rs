use std::sync::Arc;

use super::super::command::CommandRunner;
use super::super::error::ProbeFailure;
use super::super::types::{MetricKind, RawReading, Sample};
use super::Probe;

/// Localized name of the selected keyboard input source.
///
/// Sampled periodically and again whenever the owner of the UI loop reports
/// an input-source change.
pub struct KeyboardLayoutProbe {
    runner: Arc<dyn CommandRunner>,
}

impl KeyboardLayoutProbe {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        KeyboardLayoutProbe { runner }
    }
}

impl Probe for KeyboardLayoutProbe {
    fn kind(&self) -> MetricKind {
        MetricKind::KeyboardLayout
    }

    fn sample(&self) -> Result<Sample, ProbeFailure> {
        let output = self.runner.run(
            "defaults",
            &["read", "com.apple.HIToolbox", "AppleSelectedInputSources"],
        )?;
        let name = parse_layout_name(&output)
            .ok_or_else(|| ProbeFailure::parse("no keyboard layout in selected input sources"))?;
        Ok(Sample::new("defaults::HIToolbox", RawReading::KeyboardLayout(name)))
    }
}

/// `"KeyboardLayout Name" = X;` from the first keyboard layout source, else
/// the last component of an `"Input Mode"` identifier.
pub(crate) fn parse_layout_name(output: &str) -> Option<String> {
    let mut input_mode = None;
    for line in output.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim().trim_matches('"');
        let value = value.trim().trim_end_matches(';').trim().trim_matches('"');
        if value.is_empty() {
            continue;
        }
        match key {
            "KeyboardLayout Name" => return Some(value.to_string()),
            "Input Mode" if input_mode.is_none() => {
                input_mode = value.rsplit('.').next().map(str::to_string);
            }
            _ => {}
        }
    }
    input_mode
}
