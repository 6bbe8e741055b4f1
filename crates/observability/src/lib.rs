use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceCell<()> = OnceCell::new();

#[derive(Debug, Default)]
pub struct AppMetrics {
    turns_total: AtomicU64,
    small_talk_total: AtomicU64,
    classifier_fallback_total: AtomicU64,
    places_searches_total: AtomicU64,
    radius_attempts_total: AtomicU64,
    enrichment_failures_total: AtomicU64,
    web_search_failures_total: AtomicU64,
    total_latency_millis: AtomicU64,
    latency_samples_total: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub turns_total: u64,
    pub small_talk_total: u64,
    pub classifier_fallback_total: u64,
    pub places_searches_total: u64,
    pub radius_attempts_total: u64,
    pub enrichment_failures_total: u64,
    pub web_search_failures_total: u64,
    pub latency_samples_total: u64,
    pub avg_latency_millis: f64,
}

impl AppMetrics {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_turn(&self) {
        self.turns_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_small_talk(&self) {
        self.small_talk_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_classifier_fallback(&self) {
        self.classifier_fallback_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_places_search(&self) {
        self.places_searches_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_radius_attempts(&self, attempts: usize) {
        self.radius_attempts_total
            .fetch_add(attempts as u64, Ordering::Relaxed);
    }

    pub fn inc_enrichment_failure(&self) {
        self.enrichment_failures_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_web_search_failure(&self) {
        self.web_search_failures_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn observe_latency(&self, duration: Duration) {
        self.total_latency_millis
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
        self.latency_samples_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let turns = self.turns_total.load(Ordering::Relaxed);
        let latency = self.total_latency_millis.load(Ordering::Relaxed);
        let samples = self.latency_samples_total.load(Ordering::Relaxed);

        MetricsSnapshot {
            turns_total: turns,
            small_talk_total: self.small_talk_total.load(Ordering::Relaxed),
            classifier_fallback_total: self.classifier_fallback_total.load(Ordering::Relaxed),
            places_searches_total: self.places_searches_total.load(Ordering::Relaxed),
            radius_attempts_total: self.radius_attempts_total.load(Ordering::Relaxed),
            enrichment_failures_total: self.enrichment_failures_total.load(Ordering::Relaxed),
            web_search_failures_total: self.web_search_failures_total.load(Ordering::Relaxed),
            latency_samples_total: samples,
            avg_latency_millis: if samples == 0 {
                0.0
            } else {
                latency as f64 / samples as f64
            },
        }
    }
}

pub fn init_tracing(service_name: &str) {
    TRACING_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}=info,wayfinder_api=info,wayfinder_agents=info,wayfinder_services=info",
                service_name
            ))
        });

        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .with_span_list(true)
            .init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_averages_latency_over_observed_turns() {
        let metrics = AppMetrics::default();
        metrics.inc_turn();
        metrics.inc_turn();
        metrics.observe_latency(Duration::from_millis(30));
        metrics.observe_latency(Duration::from_millis(10));
        metrics.add_radius_attempts(3);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.turns_total, 2);
        assert_eq!(snapshot.latency_samples_total, 2);
        assert_eq!(snapshot.radius_attempts_total, 3);
        assert!((snapshot.avg_latency_millis - 20.0).abs() < f64::EPSILON);
    }
}
