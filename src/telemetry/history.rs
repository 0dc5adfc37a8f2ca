use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::MAX_HISTORY_CAPACITY;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint<T> {
    pub at: DateTime<Utc>,
    pub value: T,
}

/// Fixed-capacity FIFO of timestamped points.
///
/// Points are only ever appended at the back and evicted from the front, so
/// the buffer always holds the most recent `capacity` points in insertion
/// order.
#[derive(Clone, Debug)]
pub struct HistoryBuffer<T> {
    points: VecDeque<HistoryPoint<T>>,
    capacity: usize,
}

impl<T: Clone> HistoryBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        HistoryBuffer {
            points: VecDeque::with_capacity(capacity.min(MAX_HISTORY_CAPACITY)),
            capacity,
        }
    }

    pub fn add(&mut self, value: T) {
        self.add_at(Utc::now(), value);
    }

    pub fn add_at(&mut self, at: DateTime<Utc>, value: T) {
        self.points.push_back(HistoryPoint { at, value });
        while self.points.len() > self.capacity {
            self.points.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<&HistoryPoint<T>> {
        self.points.back()
    }

    /// Oldest first.
    pub fn points(&self) -> Vec<HistoryPoint<T>> {
        self.points.iter().cloned().collect()
    }

    pub fn values(&self) -> Vec<T> {
        self.points.iter().map(|p| p.value.clone()).collect()
    }
}
