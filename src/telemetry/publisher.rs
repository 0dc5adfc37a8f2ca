use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;

use super::error::ProbeFailure;
use super::types::{FailurePolicy, MetricKind, MetricSnapshot, MetricValue};

/// Last published snapshot per metric kind.
///
/// Every update replaces a whole snapshot under the write lock, so readers
/// see either the old or the new one, never a mix. Concurrent updates for
/// the same kind resolve as last write wins.
pub struct SnapshotPublisher {
    snapshots: RwLock<HashMap<MetricKind, MetricSnapshot>>,
}

impl SnapshotPublisher {
    pub fn new() -> Self {
        let initial = MetricKind::ALL
            .iter()
            .map(|kind| (*kind, MetricSnapshot::initial(*kind)))
            .collect();
        SnapshotPublisher {
            snapshots: RwLock::new(initial),
        }
    }

    pub async fn publish_success(
        &self,
        kind: MetricKind,
        value: MetricValue,
        source: &str,
        latency: Duration,
    ) {
        let snapshot = MetricSnapshot::fresh(kind, value, source, latency);
        self.snapshots.write().await.insert(kind, snapshot);
    }

    /// Records a failed probe according to the kind's failure policy.
    pub async fn publish_failure(&self, kind: MetricKind, failure: &ProbeFailure, latency: Duration) {
        let mut guard = self.snapshots.write().await;
        let previous = guard
            .remove(&kind)
            .unwrap_or_else(|| MetricSnapshot::initial(kind));

        let value = match kind.failure_policy() {
            FailurePolicy::RetainLast => previous.value,
            FailurePolicy::ResetToDefault => MetricValue::default_for(kind),
        };
        let snapshot = MetricSnapshot {
            kind,
            value,
            updated_at: Utc::now(),
            last_success: previous.last_success,
            source: previous.source,
            latency_ms: latency.as_millis().min(u32::MAX as u128) as u32,
            error: Some(failure.to_string()),
        };
        guard.insert(kind, snapshot);
    }

    pub async fn snapshot(&self, kind: MetricKind) -> MetricSnapshot {
        self.snapshots
            .read()
            .await
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| MetricSnapshot::initial(kind))
    }

    /// All snapshots, ordered by kind.
    pub async fn all(&self) -> Vec<MetricSnapshot> {
        let guard = self.snapshots.read().await;
        let mut all: Vec<MetricSnapshot> = guard.values().cloned().collect();
        all.sort_by_key(|s| s.kind);
        all
    }
}

impl Default for SnapshotPublisher {
    fn default() -> Self {
        Self::new()
    }
}
