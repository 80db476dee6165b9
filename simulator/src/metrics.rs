//! Simulation metrics.

use std::collections::VecDeque;

use serde::Serialize;

/// Simulation metrics.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationMetrics {
    /// Total transactions attempted.
    pub total_transactions: u64,
    /// Committed transactions.
    pub committed: u64,
    /// Aborted transactions.
    pub aborted: u64,
    /// Latency samples (microseconds).
    #[serde(skip)]
    latency_samples: VecDeque<u64>,
    /// Maximum samples to keep.
    #[serde(skip)]
    max_samples: usize,
}

impl SimulationMetrics {
    /// Create new metrics.
    pub fn new() -> Self {
        Self {
            total_transactions: 0,
            committed: 0,
            aborted: 0,
            latency_samples: VecDeque::with_capacity(10000),
            max_samples: 10000,
        }
    }

    /// Record a committed transaction.
    pub fn record_commit(&mut self, latency_us: u64) {
        self.total_transactions += 1;
        self.committed += 1;
        self.push_sample(latency_us);
    }

    /// Record an aborted transaction.
    pub fn record_abort(&mut self, latency_us: u64) {
        self.total_transactions += 1;
        self.aborted += 1;
        self.push_sample(latency_us);
    }

    fn push_sample(&mut self, latency_us: u64) {
        if self.latency_samples.len() >= self.max_samples {
            self.latency_samples.pop_front();
        }
        self.latency_samples.push_back(latency_us);
    }

    /// Get average latency in microseconds.
    pub fn average_latency_us(&self) -> u64 {
        if self.latency_samples.is_empty() {
            return 0;
        }

        let sum: u64 = self.latency_samples.iter().sum();
        sum / self.latency_samples.len() as u64
    }

    /// Get p99 latency.
    pub fn p99_latency_us(&self) -> u64 {
        self.percentile_latency(99)
    }

    fn percentile_latency(&self, percentile: usize) -> u64 {
        if self.latency_samples.is_empty() {
            return 0;
        }

        let mut sorted: Vec<_> = self.latency_samples.iter().copied().collect();
        sorted.sort_unstable();

        let idx = (sorted.len() * percentile / 100).min(sorted.len() - 1);
        sorted[idx]
    }

    /// Get commit rate.
    pub fn commit_rate(&self) -> f64 {
        if self.total_transactions == 0 {
            return 0.0;
        }

        self.committed as f64 / self.total_transactions as f64
    }
}

impl Default for SimulationMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics() {
        let mut metrics = SimulationMetrics::new();

        metrics.record_commit(100);
        metrics.record_commit(200);
        metrics.record_commit(150);
        metrics.record_abort(150);

        assert_eq!(metrics.total_transactions, 4);
        assert_eq!(metrics.committed, 3);
        assert_eq!(metrics.aborted, 1);
        assert_eq!(metrics.average_latency_us(), 150);
        assert_eq!(metrics.p99_latency_us(), 200);
        assert_eq!(metrics.commit_rate(), 0.75);
    }

    #[test]
    fn test_empty_metrics() {
        let metrics = SimulationMetrics::default();
        assert_eq!(metrics.average_latency_us(), 0);
        assert_eq!(metrics.commit_rate(), 0.0);
    }
}
