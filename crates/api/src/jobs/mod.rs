//! Scheduled background jobs.

mod pool_metrics;
mod review_purge;
mod scheduler;

pub use pool_metrics::PoolMetricsJob;
pub use review_purge::ReviewPurgeJob;
pub use scheduler::JobScheduler;
