//! Health reporting for the external readiness endpoint: a dataset is
//! healthy while its last success is no older than twice its cadence.

use chrono::{DateTime, Duration as ChronoDuration, Utc};

use tradewinds_core::DatasetRegistry;
use tradewinds_store::{Coordinator, IngestStore};

use crate::scheduler::read_last_success;

#[derive(Debug, Clone, PartialEq)]
pub struct DatasetHealth {
    pub dataset_id: String,
    pub healthy: bool,
    pub last_success: Option<DateTime<Utc>>,
}

pub async fn dataset_health(
    registry: &DatasetRegistry,
    coord: &dyn Coordinator,
) -> Vec<DatasetHealth> {
    let now = Utc::now();
    let mut report = Vec::new();
    for (dataset_id, cfg) in registry.enabled() {
        let last_success = read_last_success(coord, dataset_id).await;
        let allowance = ChronoDuration::from_std(cfg.cadence.interval() * 2)
            .unwrap_or_else(|_| ChronoDuration::days(60));
        let healthy = last_success
            .map(|ts| now - ts <= allowance)
            .unwrap_or(false);
        report.push(DatasetHealth {
            dataset_id: dataset_id.clone(),
            healthy,
            last_success,
        });
    }
    report
}

/// Overall readiness: every enabled dataset healthy, plus live store and
/// coordination dependencies.
pub async fn readiness(
    registry: &DatasetRegistry,
    coord: &dyn Coordinator,
    store: &dyn IngestStore,
) -> bool {
    let datasets_ok = dataset_health(registry, coord)
        .await
        .iter()
        .all(|d| d.healthy);
    datasets_ok && store.ping().await && coord.ping().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::time::Duration;

    use tradewinds_core::{Cadence, DatasetConfig};
    use tradewinds_store::{MemoryCoordinator, MemoryStore};

    fn registry_with(cadence: Cadence) -> DatasetRegistry {
        let cfg = DatasetConfig {
            name: "Test".to_string(),
            cadence,
            adapter: "static".to_string(),
            transform: None,
            target_table: "metrics_ts".to_string(),
            conflict_keys: vec!["series_id".to_string()],
            enabled: true,
            args: BTreeMap::new(),
        };
        DatasetRegistry {
            datasets: [("rates.fred.us10y".to_string(), cfg)].into_iter().collect(),
        }
    }

    #[tokio::test]
    async fn fresh_success_is_healthy_and_feeds_readiness() {
        let registry = registry_with(Cadence::QuarterHourly);
        let coord = MemoryCoordinator::new();
        coord
            .set_with_ttl(
                "ingest:rates.fred.us10y:ts",
                &Utc::now().to_rfc3339(),
                Duration::from_secs(900),
            )
            .await
            .unwrap();

        let report = dataset_health(&registry, &coord).await;
        assert_eq!(report.len(), 1);
        assert!(report[0].healthy);
        assert!(report[0].last_success.is_some());

        let store = MemoryStore::new();
        assert!(readiness(&registry, &coord, &store).await);
    }

    #[tokio::test]
    async fn stale_success_beyond_twice_the_cadence_is_unhealthy() {
        let registry = registry_with(Cadence::QuarterHourly);
        let coord = MemoryCoordinator::new();
        let an_hour_ago = Utc::now() - ChronoDuration::hours(1);
        coord
            .set_with_ttl(
                "ingest:rates.fred.us10y:ts",
                &an_hour_ago.to_rfc3339(),
                Duration::from_secs(900),
            )
            .await
            .unwrap();

        let report = dataset_health(&registry, &coord).await;
        assert!(!report[0].healthy);

        let store = MemoryStore::new();
        assert!(!readiness(&registry, &coord, &store).await);
    }

    #[tokio::test]
    async fn missing_last_success_is_unhealthy() {
        let registry = registry_with(Cadence::Daily);
        let coord = MemoryCoordinator::new();
        let report = dataset_health(&registry, &coord).await;
        assert!(!report[0].healthy);
        assert!(report[0].last_success.is_none());
    }
}
