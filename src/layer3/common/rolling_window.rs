// Rolling Window - Count-bounded FIFO of numeric observations
// Median/mean are recomputed from the current contents on every query

use std::collections::VecDeque;

/// Fixed-capacity sliding buffer. Live order is always insertion order;
/// statistics work on copies.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    capacity: usize,
    data: VecDeque<f64>,
}

impl RollingWindow {
    /// Capacity is fixed for the life of the window (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            data: VecDeque::with_capacity(capacity.min(10_000)),
        }
    }

    /// Append, evicting the oldest observation once over capacity
    pub fn push(&mut self, value: f64) {
        self.data.push_back(value);
        while self.data.len() > self.capacity {
            self.data.pop_front();
        }
    }

    pub fn median(&self) -> Option<f64> {
        if self.data.is_empty() {
            return None;
        }

        let mut sorted: Vec<f64> = self.data.iter().copied().collect();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let mid = sorted.len() / 2;
        if sorted.len() % 2 == 1 {
            Some(sorted[mid])
        } else {
            Some((sorted[mid - 1] + sorted[mid]) / 2.0)
        }
    }

    pub fn mean(&self) -> Option<f64> {
        if self.data.is_empty() {
            return None;
        }
        Some(self.data.iter().sum::<f64>() / self.data.len() as f64)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Copy of the contents, oldest first
    pub fn values(&self) -> Vec<f64> {
        self.data.iter().copied().collect()
    }

    pub fn last(&self) -> Option<f64> {
        self.data.back().copied()
    }
}
