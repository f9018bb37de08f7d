//! Prometheus counters/histograms emitted by the scheduler's job wrapper.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct IngestionMetrics {
    pub success: IntCounterVec,
    pub failure: IntCounterVec,
    pub latency: HistogramVec,
    pub delay: HistogramVec,
}

impl IngestionMetrics {
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let success = IntCounterVec::new(
            Opts::new("ingestion_success_total", "Successful ingestion runs"),
            &["dataset_id"],
        )?;
        let failure = IntCounterVec::new(
            Opts::new("ingestion_failure_total", "Failed ingestion runs"),
            &["dataset_id"],
        )?;
        let latency = HistogramVec::new(
            HistogramOpts::new(
                "ingestion_latency_seconds",
                "Wall-clock duration of one ingestion run",
            ),
            &["dataset_id"],
        )?;
        let delay = HistogramVec::new(
            HistogramOpts::new(
                "ingestion_delay_seconds",
                "Seconds since the previous successful run of the dataset",
            )
            .buckets(prometheus::exponential_buckets(60.0, 4.0, 10)?),
            &["dataset_id"],
        )?;

        registry.register(Box::new(success.clone()))?;
        registry.register(Box::new(failure.clone()))?;
        registry.register(Box::new(latency.clone()))?;
        registry.register(Box::new(delay.clone()))?;

        Ok(Self {
            success,
            failure,
            latency,
            delay,
        })
    }

    /// Text exposition for the external metrics endpoint.
    pub fn render(registry: &Registry) -> String {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        if encoder.encode(&registry.gather(), &mut buf).is_err() {
            return String::new();
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_track_per_dataset_outcomes() {
        let registry = Registry::new();
        let metrics = IngestionMetrics::register(&registry).unwrap();

        metrics.success.with_label_values(&["rates.fred.us10y"]).inc();
        metrics.success.with_label_values(&["rates.fred.us10y"]).inc();
        metrics.failure.with_label_values(&["policy.fed.rss"]).inc();
        metrics
            .latency
            .with_label_values(&["rates.fred.us10y"])
            .observe(1.25);

        assert_eq!(
            metrics.success.with_label_values(&["rates.fred.us10y"]).get(),
            2
        );
        assert_eq!(metrics.failure.with_label_values(&["policy.fed.rss"]).get(), 1);

        let text = IngestionMetrics::render(&registry);
        assert!(text.contains("ingestion_success_total"));
        assert!(text.contains("ingestion_delay_seconds"));
    }

    #[test]
    fn double_registration_is_rejected() {
        let registry = Registry::new();
        IngestionMetrics::register(&registry).unwrap();
        assert!(IngestionMetrics::register(&registry).is_err());
    }
}
