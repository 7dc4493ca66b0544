//! Construction of port implementations from configuration.

use std::sync::Arc;

use customer_analytics_application::ports::{
    BlobStore, CampaignRevenueSource, EventStore, NoCampaignRevenue,
};
use customer_analytics_application::{
    AggregationOrchestrator, AnalyticsService, OrchestratorConfig, ScoringConfig, ScoringEngine,
    ServiceConfig, SnapshotStore,
};
use customer_analytics_common::config::{
    AggregationSettings, AppConfig, EventStoreBackend, EventStoreConfig, SnapshotStoreBackend,
    SnapshotStoreConfig,
};
use tracing::info;

use crate::{
    CsvCampaignRevenue, DatabaseConfig, DatabasePool, InMemoryBlobStore, InMemoryEventStore,
    LocalFsStorage, PgEventStore, Result, S3Storage, StorageConfig,
};

/// Connect the configured event store.
///
/// The postgres backend runs migrations before returning. The memory backend
/// is seeded from `seed_csv` when one is configured.
pub async fn connect_event_store(config: &EventStoreConfig) -> Result<Arc<dyn EventStore>> {
    match config.backend {
        EventStoreBackend::Postgres => {
            let database = DatabasePool::new(&DatabaseConfig::from_event_store(config)?).await?;
            database.migrate().await?;
            let store = PgEventStore::from_database(&database);
            if let Some(path) = &config.seed_csv {
                let report = crate::read_events_csv(path).await?;
                let stored = store
                    .append(report.records)
                    .await
                    .map_err(|e| crate::Error::Connection(e.to_string()))?;
                info!(stored, malformed = report.malformed, "Seeded postgres event store");
            }
            Ok(Arc::new(store))
        }
        EventStoreBackend::Memory => {
            let store = match &config.seed_csv {
                Some(path) => InMemoryEventStore::from_csv(path).await?,
                None => InMemoryEventStore::new(),
            };
            info!(events = store.len(), "Using in-memory event store");
            Ok(Arc::new(store))
        }
    }
}

/// Connect the configured snapshot blob store.
pub async fn connect_blob_store(config: &SnapshotStoreConfig) -> Result<Arc<dyn BlobStore>> {
    match config.backend {
        SnapshotStoreBackend::S3 => Ok(Arc::new(S3Storage::new(StorageConfig::from(config)).await?)),
        SnapshotStoreBackend::Local => Ok(Arc::new(LocalFsStorage::new(&config.local_path).await?)),
        SnapshotStoreBackend::Memory => {
            info!("Using in-memory snapshot store; snapshots are lost on restart");
            Ok(Arc::new(InMemoryBlobStore::new()))
        }
    }
}

/// Campaign revenue source, empty unless a CSV is configured.
pub async fn campaign_source(
    settings: &AggregationSettings,
) -> Result<Arc<dyn CampaignRevenueSource>> {
    match &settings.campaign_revenue_csv {
        Some(path) => Ok(Arc::new(CsvCampaignRevenue::from_path(path).await?)),
        None => Ok(Arc::new(NoCampaignRevenue)),
    }
}

/// Engine wired over the configured stores
pub struct Components {
    pub events: Arc<dyn EventStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub campaign: Arc<dyn CampaignRevenueSource>,
    pub snapshots: SnapshotStore,
    pub orchestrator: Arc<AggregationOrchestrator>,
}

impl Components {
    /// Query service over these components.
    pub fn service(&self, config: ServiceConfig) -> AnalyticsService {
        AnalyticsService::new(
            self.orchestrator.clone(),
            self.events.clone(),
            self.campaign.clone(),
            self.snapshots.clone(),
            config,
        )
    }
}

/// Connect every store and build the orchestrator.
pub async fn assemble(config: &AppConfig) -> Result<Components> {
    let events = connect_event_store(&config.event_store).await?;
    let blobs = connect_blob_store(&config.snapshot_store).await?;
    let campaign = campaign_source(&config.aggregation).await?;
    let snapshots = SnapshotStore::new(blobs.clone());

    let orchestrator = Arc::new(AggregationOrchestrator::new(
        events.clone(),
        campaign.clone(),
        snapshots.clone(),
        ScoringEngine::new(ScoringConfig::from(&config.scoring)),
        OrchestratorConfig::from(config),
    ));

    Ok(Components {
        events,
        blobs,
        campaign,
        snapshots,
        orchestrator,
    })
}
