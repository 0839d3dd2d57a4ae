//! High-level service facade used by dashboards.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::analytics::{DashboardStats, FillHistogram, RouteStop, route_priorities};
use crate::backend::Backend;
use crate::model::{Bin, BinId, BinPatch, Coordinate, NewBin, Route};
use crate::ports::{ChangeSubscription, PortError};
use crate::prediction::{OverflowPrediction, PredictionConfig, predict_overflows};
use crate::store::{BinStore, Snapshot, StoreEvent, StoreState};
use crate::validation::validate_records;

/// Public entry point for reading, mutating, and analysing bins.
pub struct BinwatchService {
    backend: Backend,
    store: Arc<BinStore>,
    prediction: PredictionConfig,
}

impl BinwatchService {
    /// Create a new service bound to the provided backend.
    #[must_use]
    pub fn new(backend: Backend, prediction: PredictionConfig) -> Self {
        Self {
            backend,
            store: Arc::new(BinStore::new()),
            prediction,
        }
    }

    /// Store holding the current snapshot.
    #[must_use]
    pub fn store(&self) -> Arc<BinStore> {
        Arc::clone(&self.store)
    }

    /// Receiver notified whenever the snapshot, loading flag, or error changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<StoreState> {
        self.store.subscribe()
    }

    /// Re-read the registry and replace the snapshot.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] if the registry read fails. The previous snapshot
    /// stays in place and the error is recorded in the store.
    pub async fn refresh(&self) -> Result<(), PortError> {
        self.store.dispatch(StoreEvent::FetchStarted);

        match self.backend.registry.fetch_all().await {
            Ok(records) => {
                let (bins, rejected) = validate_records(records);
                tracing::debug!(
                    bins = bins.len(),
                    rejected = rejected.len(),
                    "bins snapshot refreshed"
                );
                self.store.dispatch(StoreEvent::FetchSucceeded(Snapshot {
                    bins,
                    rejected,
                    fetched_at: Utc::now(),
                }));
                Ok(())
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to fetch bins");
                self.store.dispatch(StoreEvent::FetchFailed(err.to_string()));
                Err(err)
            }
        }
    }

    /// Register a new bin, then re-read.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] if the registry refuses the insert.
    pub async fn add_bin(&self, bin: &NewBin) -> Result<(), PortError> {
        self.backend.registry.insert(bin).await?;
        tracing::info!(location = %bin.location, "bin added");
        self.refresh_after_mutation().await;
        Ok(())
    }

    /// Record that a bin was emptied at `now`, then re-read.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] if the registry update fails.
    pub async fn mark_collected(&self, id: &BinId, now: DateTime<Utc>) -> Result<(), PortError> {
        self.update_bin(id, &BinPatch::collected(now)).await
    }

    /// Apply a partial update, then re-read. An empty patch is a no-op.
    ///
    /// The patch is stamped with the current time as `last_updated` unless it
    /// carries its own stamp.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] if the registry update fails.
    pub async fn update_bin(&self, id: &BinId, patch: &BinPatch) -> Result<(), PortError> {
        if patch.is_empty() {
            return Ok(());
        }
        let patch = patch.clone().touched(Utc::now());
        self.backend.registry.update(id, &patch).await?;
        tracing::info!(bin_id = %id, "bin updated");
        self.refresh_after_mutation().await;
        Ok(())
    }

    /// Delete a bin, then re-read.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] if the registry delete fails.
    pub async fn delete_bin(&self, id: &BinId) -> Result<(), PortError> {
        self.backend.registry.delete(id).await?;
        tracing::info!(bin_id = %id, "bin deleted");
        self.refresh_after_mutation().await;
        Ok(())
    }

    /// Route from `origin` to a bin.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] if the routing service fails or finds no path.
    pub async fn route_to(&self, origin: Coordinate, bin: &Bin) -> Result<Route, PortError> {
        self.backend.routing.route(origin, bin.coordinate).await
    }

    /// Open the registry's change feed.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] if the feed cannot be established.
    pub async fn subscribe_changes(&self) -> Result<ChangeSubscription, PortError> {
        self.backend.change_feed.subscribe().await
    }

    /// Overflow predictions for the current snapshot.
    #[must_use]
    pub fn predictions(&self, now: DateTime<Utc>) -> Vec<OverflowPrediction> {
        predict_overflows(self.store.current().bins(), now, &self.prediction)
    }

    /// Fill histogram for the current snapshot.
    #[must_use]
    pub fn histogram(&self) -> FillHistogram {
        FillHistogram::from_bins(self.store.current().bins())
    }

    /// Suggested collection order for the current snapshot.
    #[must_use]
    pub fn route_priorities(&self) -> Vec<RouteStop> {
        route_priorities(self.store.current().bins())
    }

    /// Headline numbers for the current snapshot.
    #[must_use]
    pub fn stats(&self) -> DashboardStats {
        DashboardStats::from_bins(self.store.current().bins())
    }

    // The mutation itself succeeded; a failed re-read only leaves the view stale.
    async fn refresh_after_mutation(&self) {
        if let Err(err) = self.refresh().await {
            tracing::warn!(error = %err, "re-read after mutation failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::TimeZone;
    use tokio::sync::mpsc;

    use super::*;
    use crate::model::{BinRecord, BinStatus, ChangeEvent, ChangeKind};
    use crate::ports::{BinRegistryPort, ChangeFeedPort, RoutingPort};
    use crate::validation::ValidationError;

    fn stamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    fn record(id: &str, fill_level: f64) -> BinRecord {
        BinRecord {
            id: BinId(id.to_owned()),
            location: format!("Zone {id}"),
            latitude: Some(13.0),
            longitude: Some(80.2),
            fill_level: Some(fill_level),
            status: Some(BinStatus::Operational),
            capacity: Some(100),
            last_updated: Some(stamp()),
            last_collection: None,
            created_at: Some(stamp()),
        }
    }

    #[derive(Default)]
    struct FakeRegistry {
        rows: Mutex<Vec<BinRecord>>,
        fetches: AtomicUsize,
        offline: AtomicBool,
    }

    impl FakeRegistry {
        fn with_rows(rows: Vec<BinRecord>) -> Self {
            Self {
                rows: Mutex::new(rows),
                ..Self::default()
            }
        }

        fn check_online(&self) -> Result<(), PortError> {
            if self.offline.load(Ordering::SeqCst) {
                Err(PortError::Internal("registry offline".to_owned()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl BinRegistryPort for FakeRegistry {
        async fn fetch_all(&self) -> Result<Vec<BinRecord>, PortError> {
            self.check_online()?;
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let mut rows = self.rows.lock().expect("rows lock").clone();
            rows.sort_by(|left, right| {
                right
                    .fill_level
                    .unwrap_or_default()
                    .total_cmp(&left.fill_level.unwrap_or_default())
            });
            Ok(rows)
        }

        async fn insert(&self, bin: &NewBin) -> Result<(), PortError> {
            self.check_online()?;
            let mut rows = self.rows.lock().expect("rows lock");
            let mut row = record(&format!("new-{}", rows.len()), f64::from(bin.fill_level));
            row.location.clone_from(&bin.location);
            row.latitude = Some(bin.latitude);
            row.longitude = Some(bin.longitude);
            row.capacity = Some(i64::from(bin.capacity));
            row.status = Some(bin.status.clone());
            rows.push(row);
            Ok(())
        }

        async fn update(&self, id: &BinId, patch: &BinPatch) -> Result<(), PortError> {
            self.check_online()?;
            let mut rows = self.rows.lock().expect("rows lock");
            for row in rows.iter_mut().filter(|row| &row.id == id) {
                if let Some(fill_level) = patch.fill_level {
                    row.fill_level = Some(f64::from(fill_level));
                }
                if let Some(status) = &patch.status {
                    row.status = Some(status.clone());
                }
                if patch.last_collection.is_some() {
                    row.last_collection = patch.last_collection;
                }
                if patch.last_updated.is_some() {
                    row.last_updated = patch.last_updated;
                }
            }
            Ok(())
        }

        async fn delete(&self, id: &BinId) -> Result<(), PortError> {
            self.check_online()?;
            self.rows.lock().expect("rows lock").retain(|row| &row.id != id);
            Ok(())
        }
    }

    struct FakeFeed;

    #[async_trait]
    impl ChangeFeedPort for FakeFeed {
        async fn subscribe(&self) -> Result<ChangeSubscription, PortError> {
            let (sender, receiver) = mpsc::channel(4);
            sender
                .send(ChangeEvent {
                    kind: ChangeKind::Insert,
                    id: None,
                })
                .await
                .map_err(|_err| PortError::FeedClosed)?;
            Ok(ChangeSubscription::new(receiver, None))
        }
    }

    #[derive(Default)]
    struct FakeRouting {
        requests: Mutex<Vec<(Coordinate, Coordinate)>>,
    }

    #[async_trait]
    impl RoutingPort for FakeRouting {
        async fn route(&self, from: Coordinate, to: Coordinate) -> Result<Route, PortError> {
            self.requests.lock().expect("requests lock").push((from, to));
            Ok(Route {
                path: vec![from, to],
                distance_meters: 1_500.0,
                duration_seconds: 300.0,
            })
        }
    }

    fn service(registry: &Arc<FakeRegistry>, routing: &Arc<FakeRouting>) -> BinwatchService {
        let backend = Backend::new(
            Arc::clone(registry) as Arc<dyn BinRegistryPort>,
            Arc::new(FakeFeed),
            Arc::clone(routing) as Arc<dyn RoutingPort>,
        );
        BinwatchService::new(backend, PredictionConfig::default())
    }

    #[tokio::test]
    async fn refresh_publishes_validated_snapshot() {
        let registry = Arc::new(FakeRegistry::with_rows(vec![
            record("low", 10.0),
            record("broken", 180.0),
            record("high", 92.0),
        ]));
        let service = service(&registry, &Arc::new(FakeRouting::default()));
        let mut updates = service.subscribe();

        service.refresh().await.expect("refresh succeeds");

        assert!(updates.has_changed().expect("store alive"));
        let state = updates.borrow_and_update().clone();
        let ids: Vec<&str> = state.bins().iter().map(|bin| bin.id.0.as_str()).collect();
        assert_eq!(ids, ["high", "low"]);

        let snapshot = state.snapshot.expect("snapshot present");
        let rejected = snapshot.rejected.first().expect("one rejected row");
        assert_eq!(rejected.id, BinId("broken".to_owned()));
        assert_eq!(rejected.reason, ValidationError::FillLevelOutOfRange(180.0));
    }

    #[tokio::test]
    async fn mark_collected_resets_bin_and_re_reads() {
        let mut full = record("full", 95.0);
        full.status = Some(BinStatus::Full);
        let registry = Arc::new(FakeRegistry::with_rows(vec![full]));
        let service = service(&registry, &Arc::new(FakeRouting::default()));
        service.refresh().await.expect("initial read");

        service
            .mark_collected(&BinId("full".to_owned()), stamp())
            .await
            .expect("collect succeeds");

        assert_eq!(registry.fetches.load(Ordering::SeqCst), 2);
        let state = service.store().current();
        let bin = state.bins().first().expect("bin still present");
        assert_eq!(bin.fill_level, 0);
        assert_eq!(bin.status, BinStatus::Operational);
        assert_eq!(bin.last_collection, Some(stamp()));
        assert_eq!(bin.last_updated, stamp());
    }

    #[tokio::test]
    async fn updates_are_stamped_as_modified() {
        let registry = Arc::new(FakeRegistry::with_rows(vec![record("a", 50.0)]));
        let service = service(&registry, &Arc::new(FakeRouting::default()));
        let before = Utc::now();

        let patch = BinPatch {
            fill_level: Some(64),
            ..BinPatch::default()
        };
        service
            .update_bin(&BinId("a".to_owned()), &patch)
            .await
            .expect("update succeeds");

        let state = service.store().current();
        let bin = state.bins().first().expect("bin present");
        assert_eq!(bin.fill_level, 64);
        assert!(bin.last_updated >= before);
    }

    #[tokio::test]
    async fn add_and_delete_round_through_registry() {
        let registry = Arc::new(FakeRegistry::default());
        let service = service(&registry, &Arc::new(FakeRouting::default()));

        let new_bin = NewBin::parse("Besant Nagar", "13.0", "80.26", "240").expect("valid form");
        service.add_bin(&new_bin).await.expect("insert succeeds");

        let state = service.store().current();
        let added = state.bins().first().expect("bin added");
        assert_eq!(added.fill_level, 0);
        assert_eq!(added.capacity, 240);

        let id = added.id.clone();
        service.delete_bin(&id).await.expect("delete succeeds");
        assert!(service.store().current().bins().is_empty());
    }

    #[tokio::test]
    async fn failed_read_keeps_stale_snapshot() {
        let registry = Arc::new(FakeRegistry::with_rows(vec![record("a", 50.0)]));
        let service = service(&registry, &Arc::new(FakeRouting::default()));
        service.refresh().await.expect("initial read");

        registry.offline.store(true, Ordering::SeqCst);
        assert!(service.refresh().await.is_err());

        let state = service.store().current();
        assert_eq!(state.bins().len(), 1);
        assert!(!state.loading);
        assert!(state.last_error.is_some());
    }

    #[tokio::test]
    async fn failed_mutation_does_not_re_read() {
        let registry = Arc::new(FakeRegistry::with_rows(vec![record("a", 50.0)]));
        let service = service(&registry, &Arc::new(FakeRouting::default()));
        registry.offline.store(true, Ordering::SeqCst);

        let result = service.delete_bin(&BinId("a".to_owned())).await;

        assert!(result.is_err());
        assert_eq!(registry.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_patch_is_a_no_op() {
        let registry = Arc::new(FakeRegistry::with_rows(vec![record("a", 50.0)]));
        let service = service(&registry, &Arc::new(FakeRouting::default()));

        service
            .update_bin(&BinId("a".to_owned()), &BinPatch::default())
            .await
            .expect("no-op succeeds");
        assert_eq!(registry.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn route_goes_from_origin_to_bin() {
        let registry = Arc::new(FakeRegistry::with_rows(vec![record("a", 50.0)]));
        let routing = Arc::new(FakeRouting::default());
        let service = service(&registry, &routing);
        service.refresh().await.expect("initial read");

        let state = service.store().current();
        let bin = state.bins().first().expect("bin present");
        let origin = Coordinate::new(13.05, 80.25).expect("valid origin");
        let route = service.route_to(origin, bin).await.expect("route found");

        assert_eq!(route.path, vec![origin, bin.coordinate]);
        assert_eq!(
            *routing.requests.lock().expect("requests lock"),
            vec![(origin, bin.coordinate)]
        );
    }

    #[tokio::test]
    async fn analytics_follow_the_snapshot() {
        let mut recent = record("recent", 95.0);
        recent.last_collection = Some(Utc::now() - chrono::Duration::hours(10));
        let registry = Arc::new(FakeRegistry::with_rows(vec![
            recent,
            record("mid", 72.0),
            record("low", 5.0),
        ]));
        let service = service(&registry, &Arc::new(FakeRouting::default()));
        service.refresh().await.expect("initial read");

        assert_eq!(service.stats().total, 3);
        assert_eq!(service.histogram().quarter4, 1);
        assert_eq!(service.route_priorities().len(), 2);
        let predictions = service.predictions(Utc::now());
        let first = predictions.first().expect("recent bin predicted");
        assert_eq!(first.bin.id, BinId("recent".to_owned()));
    }

    #[tokio::test]
    async fn change_feed_is_passed_through() {
        let registry = Arc::new(FakeRegistry::default());
        let service = service(&registry, &Arc::new(FakeRouting::default()));

        let mut subscription = service.subscribe_changes().await.expect("feed opens");
        let event = subscription.try_next().expect("feed open");
        assert_eq!(event.map(|change| change.kind), Some(ChangeKind::Insert));
    }
}
