use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::future::BoxFuture;
use log::{debug, warn};
use tokio::runtime::Handle;
use tokio::select;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::types::MetricKind;

/// Work run on every tick. Each call produces a fresh future, which is
/// spawned so a slow refresh never delays the next tick.
pub type RefreshAction = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

struct TimerEntry {
    interval: Duration,
    action: RefreshAction,
    cancel: CancellationToken,
}

/// One repeating timer per metric kind.
pub struct RefreshScheduler {
    runtime: Handle,
    timers: DashMap<MetricKind, TimerEntry>,
}

impl RefreshScheduler {
    pub fn new(runtime: Handle) -> Self {
        RefreshScheduler {
            runtime,
            timers: DashMap::new(),
        }
    }

    /// Registers the timer for `kind`, replacing any existing one. The first
    /// tick fires one `interval` from now. Returns `false` for a zero
    /// interval, which is never scheduled.
    pub fn schedule(&self, kind: MetricKind, interval: Duration, action: RefreshAction) -> bool {
        if interval.is_zero() {
            warn!("refusing to schedule {} with a zero interval", kind);
            return false;
        }

        let cancel = CancellationToken::new();
        let entry = TimerEntry {
            interval,
            action: Arc::clone(&action),
            cancel: cancel.clone(),
        };
        if let Some(previous) = self.timers.insert(kind, entry) {
            previous.cancel.cancel();
        }

        let runtime = self.runtime.clone();
        self.runtime.spawn(async move {
            let mut ticker = interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                select! {
                    _ = cancel.cancelled() => {
                        break;
                    }
                    _ = ticker.tick() => {
                        runtime.spawn(action());
                    }
                }
            }
            debug!("{} timer stopped", kind);
        });
        debug!("{} scheduled every {:?}", kind, interval);
        true
    }

    /// Runs the action registered for `kind` once, leaving its cadence alone.
    pub fn fire_now(&self, kind: MetricKind) -> bool {
        let action = self.timers.get(&kind).map(|entry| Arc::clone(&entry.action));
        match action {
            Some(action) => {
                self.runtime.spawn(action());
                true
            }
            None => false,
        }
    }

    pub fn cancel(&self, kind: MetricKind) -> bool {
        match self.timers.remove(&kind) {
            Some((_, entry)) => {
                entry.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) {
        let kinds: Vec<MetricKind> = self.timers.iter().map(|entry| *entry.key()).collect();
        for kind in kinds {
            self.cancel(kind);
        }
    }

    pub fn is_scheduled(&self, kind: MetricKind) -> bool {
        self.timers.contains_key(&kind)
    }

    pub fn interval(&self, kind: MetricKind) -> Option<Duration> {
        self.timers.get(&kind).map(|entry| entry.interval)
    }

    pub fn scheduled_kinds(&self) -> Vec<MetricKind> {
        let mut kinds: Vec<MetricKind> = self.timers.iter().map(|entry| *entry.key()).collect();
        kinds.sort();
        kinds
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
