//! Job scheduling - how many jobs may run at once

use std::sync::Arc;
use tokio::sync::Semaphore;

/// Strategy for scheduling job execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulingStrategy {
    /// One job at a time, in expansion order
    Sequential,

    /// All jobs at once
    #[default]
    Parallel,

    /// At most N jobs at once
    LimitedParallel(usize),
}

impl SchedulingStrategy {
    /// Number of jobs allowed to run concurrently
    pub fn concurrency(&self, job_count: usize) -> usize {
        let limit = match self {
            SchedulingStrategy::Sequential => 1,
            SchedulingStrategy::Parallel => job_count,
            SchedulingStrategy::LimitedParallel(max) => (*max).min(job_count),
        };
        limit.max(1)
    }
}

/// Hands out run permits according to the strategy
#[derive(Debug, Clone)]
pub struct ExecutionScheduler {
    strategy: SchedulingStrategy,
    permits: Arc<Semaphore>,
}

impl ExecutionScheduler {
    pub fn new(strategy: SchedulingStrategy, job_count: usize) -> Self {
        Self {
            strategy,
            permits: Arc::new(Semaphore::new(strategy.concurrency(job_count))),
        }
    }

    pub fn strategy(&self) -> SchedulingStrategy {
        self.strategy
    }

    /// Shared semaphore a job must hold a permit of while it runs
    pub fn permits(&self) -> Arc<Semaphore> {
        self.permits.clone()
    }
}
