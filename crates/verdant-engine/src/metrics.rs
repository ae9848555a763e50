//! Prometheus metrics for the lending engine

use prometheus::{Gauge, IntCounter, IntCounterVec, Opts, Registry};
use rust_decimal::prelude::ToPrimitive;
use verdant_common::ErrorKind;
use verdant_ledger::PoolStats;

pub struct EngineMetrics {
    pub operations_total: IntCounterVec,
    pub rejections_total: IntCounterVec,
    pub credits_recorded_total: IntCounter,
    pub events_emitted_total: IntCounter,
    pub total_deposits: Gauge,
    pub total_borrows: Gauge,
    pub utilization_percent: Gauge,
    pub borrow_rate_percent: Gauge,
}

impl EngineMetrics {
    pub fn new() -> prometheus::Result<Self> {
        Ok(Self {
            operations_total: IntCounterVec::new(
                Opts::new("verdant_operations_total", "Committed engine operations"),
                &["operation"],
            )?,
            rejections_total: IntCounterVec::new(
                Opts::new("verdant_rejections_total", "Rejected engine operations"),
                &["operation", "kind"],
            )?,
            credits_recorded_total: IntCounter::new(
                "verdant_credits_recorded_total",
                "Offset credentials recorded",
            )?,
            events_emitted_total: IntCounter::new(
                "verdant_events_emitted_total",
                "Domain events queued for notification",
            )?,
            total_deposits: Gauge::new("verdant_pool_total_deposits", "Pool deposits")?,
            total_borrows: Gauge::new("verdant_pool_total_borrows", "Pool borrows")?,
            utilization_percent: Gauge::new(
                "verdant_pool_utilization_percent",
                "Pool utilization in percent",
            )?,
            borrow_rate_percent: Gauge::new(
                "verdant_pool_borrow_rate_percent",
                "Undiscounted annual borrow rate in percent",
            )?,
        })
    }

    pub fn register(&self, registry: &Registry) -> prometheus::Result<()> {
        registry.register(Box::new(self.operations_total.clone()))?;
        registry.register(Box::new(self.rejections_total.clone()))?;
        registry.register(Box::new(self.credits_recorded_total.clone()))?;
        registry.register(Box::new(self.events_emitted_total.clone()))?;
        registry.register(Box::new(self.total_deposits.clone()))?;
        registry.register(Box::new(self.total_borrows.clone()))?;
        registry.register(Box::new(self.utilization_percent.clone()))?;
        registry.register(Box::new(self.borrow_rate_percent.clone()))?;
        Ok(())
    }

    pub fn record_success(&self, operation: &str) {
        self.operations_total.with_label_values(&[operation]).inc();
    }

    pub fn record_rejection(&self, operation: &str, kind: ErrorKind) {
        let kind = format!("{kind:?}");
        self.rejections_total
            .with_label_values(&[operation, kind.as_str()])
            .inc();
    }

    pub fn observe_pool(&self, stats: &PoolStats) {
        self.total_deposits
            .set(stats.total_deposits.to_f64().unwrap_or_default());
        self.total_borrows
            .set(stats.total_borrows.to_f64().unwrap_or_default());
        self.utilization_percent
            .set(stats.utilization.to_f64().unwrap_or_default());
        self.borrow_rate_percent
            .set(stats.borrow_rate.to_f64().unwrap_or_default());
    }
}
