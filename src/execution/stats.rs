// Coordination statistics
//
// Rolling counters over plan executions, surfaced through the engine's
// metrics snapshot.

use parking_lot::Mutex;
use serde::Serialize;

/// Shape of an executed plan, for the breakdown counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinationShape {
    Parallel,
    Sequential,
    Mixed,
    Empty,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct CoordinationSnapshot {
    pub total_coordinations: u64,
    pub parallel_executions: u64,
    pub sequential_executions: u64,
    pub mixed_executions: u64,
    pub total_operations: u64,
    pub successful_coordinations: u64,
    pub failed_coordinations: u64,
    pub average_overhead_ms: f64,
    pub fastest_ms: f64,
    pub slowest_ms: f64,
}

/// Thread-safe coordination counter set.
#[derive(Debug, Default)]
pub struct CoordinationStatistics {
    inner: Mutex<CoordinationSnapshot>,
}

impl CoordinationStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &self,
        operation_count: usize,
        shape: CoordinationShape,
        overhead_ms: f64,
        success: bool,
    ) {
        let mut inner = self.inner.lock();
        inner.total_coordinations += 1;
        inner.total_operations += operation_count as u64;

        match shape {
            CoordinationShape::Parallel => inner.parallel_executions += 1,
            CoordinationShape::Sequential => inner.sequential_executions += 1,
            CoordinationShape::Mixed => inner.mixed_executions += 1,
            CoordinationShape::Empty => {}
        }
        if success {
            inner.successful_coordinations += 1;
        } else {
            inner.failed_coordinations += 1;
        }

        let n = inner.total_coordinations as f64;
        inner.average_overhead_ms = (inner.average_overhead_ms * (n - 1.0) + overhead_ms) / n;
        if inner.total_coordinations == 1 || overhead_ms < inner.fastest_ms {
            inner.fastest_ms = overhead_ms;
        }
        if overhead_ms > inner.slowest_ms {
            inner.slowest_ms = overhead_ms;
        }
    }

    pub fn snapshot(&self) -> CoordinationSnapshot {
        self.inner.lock().clone()
    }

    pub fn reset(&self) {
        *self.inner.lock() = CoordinationSnapshot::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_by_shape() {
        let stats = CoordinationStatistics::new();
        stats.record(2, CoordinationShape::Parallel, 4.0, true);
        stats.record(3, CoordinationShape::Mixed, 8.0, true);
        stats.record(1, CoordinationShape::Sequential, 6.0, false);

        let snap = stats.snapshot();
        assert_eq!(snap.total_coordinations, 3);
        assert_eq!(snap.total_operations, 6);
        assert_eq!(snap.parallel_executions, 1);
        assert_eq!(snap.mixed_executions, 1);
        assert_eq!(snap.sequential_executions, 1);
        assert_eq!(snap.successful_coordinations, 2);
        assert_eq!(snap.failed_coordinations, 1);
        assert_eq!(snap.fastest_ms, 4.0);
        assert_eq!(snap.slowest_ms, 8.0);
        assert!((snap.average_overhead_ms - 6.0).abs() < 1e-9);
    }

    #[test]
    fn reset_clears_everything() {
        let stats = CoordinationStatistics::new();
        stats.record(2, CoordinationShape::Parallel, 4.0, true);
        stats.reset();
        assert_eq!(stats.snapshot().total_coordinations, 0);
    }
}
