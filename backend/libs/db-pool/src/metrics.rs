//! Prometheus gauges for the connection pool

use prometheus::{register_int_gauge_vec, IntGaugeVec};
use sqlx::PgPool;

lazy_static::lazy_static! {
    /// Connections by state (idle/active/max)
    static ref DB_POOL_CONNECTIONS: IntGaugeVec = register_int_gauge_vec!(
        "db_pool_connections",
        "Database pool connection count by state",
        &["service", "state"]
    ).expect("Prometheus metrics registration should succeed at startup");
}

/// Point-in-time pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub size: u32,
    pub idle: u32,
    pub max: u32,
}

impl PoolStats {
    pub fn of(pool: &PgPool) -> Self {
        Self {
            size: pool.size(),
            idle: pool.num_idle() as u32,
            max: pool.options().get_max_connections(),
        }
    }

    pub fn active(&self) -> u32 {
        self.size.saturating_sub(self.idle)
    }

    /// Fraction of `max` in use, 0.0 when the pool has no capacity.
    pub fn utilization(&self) -> f64 {
        if self.max == 0 {
            return 0.0;
        }
        f64::from(self.active()) / f64::from(self.max)
    }
}

pub(crate) fn update_pool_metrics(pool: &PgPool, service: &str) {
    let stats = PoolStats::of(pool);

    DB_POOL_CONNECTIONS
        .with_label_values(&[service, "idle"])
        .set(i64::from(stats.idle));

    DB_POOL_CONNECTIONS
        .with_label_values(&[service, "active"])
        .set(i64::from(stats.active()));

    DB_POOL_CONNECTIONS
        .with_label_values(&[service, "max"])
        .set(i64::from(stats.max));
}
