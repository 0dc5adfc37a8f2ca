use std::time::Instant;

/// The last raw counter vector read for one metric kind.
///
/// Network keeps `[rx, tx]`, disk keeps `[read, write]` and CPU keeps the
/// flattened per-core `[user, system, idle, nice]` ticks.
#[derive(Clone, Debug, PartialEq)]
pub struct CounterSample {
    pub values: Vec<u64>,
    pub taken_at: Instant,
}

impl CounterSample {
    pub fn new(values: Vec<u64>, taken_at: Instant) -> Self {
        CounterSample { values, taken_at }
    }
}

/// Distance travelled by a monotonic counter.
///
/// A reading below the previous one means the counter wrapped or was reset;
/// counting is then assumed to have restarted from zero, so the delta is the
/// new reading itself.
pub fn counter_delta(then: u64, now: u64) -> u64 {
    if now >= then {
        now - then
    } else {
        now
    }
}

/// Per-second rate between two counter readings.
///
/// Returns `None` unless `t_now` is strictly after `t_then`.
pub fn rate_per_second(then: u64, now: u64, t_then: Instant, t_now: Instant) -> Option<f64> {
    if t_now <= t_then {
        return None;
    }
    let seconds = t_now.duration_since(t_then).as_secs_f64();
    if seconds <= 0.0 {
        return None;
    }
    let rate = counter_delta(then, now) as f64 / seconds;
    Some(rate.max(0.0))
}

/// Rates for every counter of `current` against `previous`.
///
/// `None` when there is no usable baseline: the vectors differ in length or
/// the readings are not in time order.
pub fn rates_between(previous: &CounterSample, current: &CounterSample) -> Option<Vec<f64>> {
    if previous.values.len() != current.values.len() {
        return None;
    }
    previous
        .values
        .iter()
        .zip(&current.values)
        .map(|(then, now)| rate_per_second(*then, *now, previous.taken_at, current.taken_at))
        .collect()
}
