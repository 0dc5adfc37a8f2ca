//! Parsing for `ioreg -r -w0 -c <class> -d 1` text output. `-w0` stops ioreg
//! from clipping the long single-line statistics dictionaries.
//!
//! Property dictionaries change key names between macOS releases, so lookups
//! take an ordered list of candidate keys and stop at the first one present.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;

use super::super::command::CommandRunner;
use super::super::error::ProbeFailure;

lazy_static! {
    static ref NUMBER_PROPERTY: Regex =
        Regex::new(r#""([^"]+)"\s*=\s*(\d+)"#).expect("number property pattern");
    static ref FLAG_PROPERTY: Regex =
        Regex::new(r#""([^"]+)"\s*=\s*(Yes|No)\b"#).expect("flag property pattern");
}

/// Properties of one registry entry, flattened across nested dictionaries.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IoregEntry {
    pub header: String,
    numbers: HashMap<String, u64>,
    flags: HashMap<String, bool>,
}

impl IoregEntry {
    pub fn number(&self, key: &str) -> Option<u64> {
        self.numbers.get(key).copied()
    }

    pub fn first_number(&self, candidates: &[&str]) -> Option<u64> {
        candidates.iter().find_map(|key| self.number(key))
    }

    pub fn flag(&self, key: &str) -> Option<bool> {
        self.flags.get(key).copied()
    }

    fn absorb(&mut self, line: &str) {
        for caps in NUMBER_PROPERTY.captures_iter(line) {
            if let Ok(value) = caps[2].parse::<u64>() {
                self.numbers.insert(caps[1].to_string(), value);
            }
        }
        for caps in FLAG_PROPERTY.captures_iter(line) {
            self.flags.insert(caps[1].to_string(), &caps[2] == "Yes");
        }
    }
}

pub fn parse_entries(output: &str) -> Vec<IoregEntry> {
    let mut entries = Vec::new();
    let mut current: Option<IoregEntry> = None;

    for line in output.lines() {
        if let Some(pos) = line.find("+-o ") {
            if let Some(done) = current.take() {
                entries.push(done);
            }
            current = Some(IoregEntry {
                header: line[pos + 4..].trim().to_string(),
                ..IoregEntry::default()
            });
            continue;
        }
        if let Some(entry) = current.as_mut() {
            entry.absorb(line);
        }
    }
    if let Some(done) = current.take() {
        entries.push(done);
    }
    entries
}

/// Lists every registry entry of `class`.
pub fn query_class(runner: &dyn CommandRunner, class: &str) -> Result<Vec<IoregEntry>, ProbeFailure> {
    let output = runner.run("ioreg", &["-r", "-w0", "-c", class, "-d", "1"])?;
    Ok(parse_entries(&output))
}
