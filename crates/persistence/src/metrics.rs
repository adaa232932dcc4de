//! Database metrics collection.

use metrics::{gauge, histogram};
use sqlx::PgPool;
use std::time::Instant;
use tracing::warn;

/// Queries slower than this are logged in addition to being recorded.
const SLOW_QUERY_SECS: f64 = 1.0;

/// Record database query duration under the query's name.
pub fn record_query_duration(query_name: &str, duration_secs: f64) {
    histogram!(
        "database_query_duration_seconds",
        "query" => query_name.to_string()
    )
    .record(duration_secs);

    if duration_secs > SLOW_QUERY_SECS {
        warn!(query = query_name, duration_secs, "slow database query");
    }
}

/// Record connection pool gauges. Called periodically by the pool metrics
/// job.
pub fn record_pool_metrics(pool: &PgPool) {
    let size = pool.size() as usize;
    let idle = pool.num_idle();
    let active = size.saturating_sub(idle);

    gauge!("database_connections_active").set(active as f64);
    gauge!("database_connections_idle").set(idle as f64);
    gauge!("database_connections_total").set(size as f64);
}

/// Times one database operation and records it on demand.
///
/// Usage:
/// ```ignore
/// let timer = QueryTimer::new("find_lead_by_email");
/// let result = sqlx::query_as::<_, LeadEntity>(...).fetch_optional(&pool).await;
/// timer.record();
/// result
/// ```
pub struct QueryTimer {
    query_name: String,
    start: Instant,
}

impl QueryTimer {
    pub fn new(query_name: impl Into<String>) -> Self {
        Self {
            query_name: query_name.into(),
            start: Instant::now(),
        }
    }

    /// Record the elapsed duration to metrics.
    pub fn record(self) {
        let duration = self.start.elapsed().as_secs_f64();
        record_query_duration(&self.query_name, duration);
    }
}
