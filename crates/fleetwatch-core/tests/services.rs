//! Service-level tests over the in-memory store.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::float_cmp
)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use fleetwatch_core::{
    AccidentFilter, AccidentReport, ActiveAlert, AlertPolicy, AlertService, CoreError, EventSink,
    FleetStore, IngestionService, LocationReport, ManualClock, MemoryStore, Proximity, Ranked,
    StoreError, VehicleFilter, VehicleQueries,
};
use fleetwatch_types::{
    Accident, AccidentStatus, Alert, AlertId, GeoPoint, IdentityId, LocationSample, RelayEvent,
    Severity, Vehicle, VehicleId, VehicleStatus,
};

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<RelayEvent>>,
}

impl RecordingSink {
    fn events(&self) -> Vec<RelayEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for RecordingSink {
    fn publish(&self, event: RelayEvent) {
        self.events.lock().unwrap().push(event);
    }
}

struct Harness {
    store: Arc<MemoryStore>,
    sink: Arc<RecordingSink>,
    clock: Arc<ManualClock>,
    ingest: IngestionService,
    alerts: AlertService,
    vehicles: VehicleQueries,
}

fn start() -> DateTime<Utc> {
    DateTime::from_timestamp(1_760_000_000, 0).unwrap()
}

fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let sink = Arc::new(RecordingSink::default());
    let clock = Arc::new(ManualClock::new(start()));
    Harness {
        ingest: IngestionService::new(store.clone(), sink.clone(), clock.clone()),
        alerts: AlertService::new(
            store.clone(),
            sink.clone(),
            clock.clone(),
            AlertPolicy::default(),
        ),
        vehicles: VehicleQueries::new(store.clone(), 1000.0),
        store,
        sink,
        clock,
    }
}

fn vehicle(reg: &str) -> Vehicle {
    Vehicle {
        id: VehicleId::new(),
        registration_number: reg.to_owned(),
        make: Some(String::from("Tata")),
        model: Some(String::from("Ace")),
        year: Some(2022),
        color: None,
        driver_id: None,
        status: VehicleStatus::Active,
        position: None,
        speed_kmh: 0.0,
        heading: 0.0,
        last_location_time: None,
    }
}

// ---------------------------------------------------------------------------
// Ingestion
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ingest_then_read_matches_the_sample() {
    let h = harness();
    let v1 = h.store.register_vehicle(vehicle("KA-01-AA-0001")).await.unwrap();

    let mut report = LocationReport::at(12.90, 77.60);
    report.speed = Some(40.0);
    let recorded = h.ingest.ingest(v1.id, &report).await.unwrap();

    let current = h.vehicles.get(v1.id).await.unwrap();
    assert_eq!(current.position, Some(GeoPoint::new(12.90, 77.60)));
    assert_eq!(current.speed_kmh, 40.0);
    assert_eq!(current.last_location_time, Some(start()));
    assert_eq!(current, recorded.vehicle);

    let active = h.vehicles.active().await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].speed_kmh, 40.0);
}

#[tokio::test]
async fn ingest_applies_defaults_and_publishes() {
    let h = harness();
    let v = h.store.register_vehicle(vehicle("KA-01-AA-0002")).await.unwrap();

    let recorded = h.ingest.ingest(v.id, &LocationReport::at(0.0, 0.0)).await.unwrap();
    assert_eq!(recorded.sample.accuracy_m, 10.0);
    assert_eq!(recorded.sample.heading, 0.0);

    let events = h.sink.events();
    assert_eq!(events.len(), 1);
    let RelayEvent::LocationUpdated(update) = &events[0] else {
        panic!("expected a location event");
    };
    assert_eq!(update.vehicle_id, v.id);
    assert_eq!(update.timestamp, start());
}

#[tokio::test]
async fn rejected_ingest_mutates_and_publishes_nothing() {
    let h = harness();
    let v = h.store.register_vehicle(vehicle("KA-01-AA-0003")).await.unwrap();

    let err = h.ingest.ingest(v.id, &LocationReport::at(91.0, 0.0)).await.unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
    assert!(h.sink.events().is_empty());
    assert_eq!(h.vehicles.get(v.id).await.unwrap().position, None);
    assert!(h.ingest.history(v.id, None, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn ingest_for_unknown_vehicle_is_not_found() {
    let h = harness();
    let err = h
        .ingest
        .ingest(VehicleId::new(), &LocationReport::at(12.9, 77.6))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound { entity: "vehicle", .. }));
    assert!(h.sink.events().is_empty());
}

#[tokio::test]
async fn last_applied_sample_wins() {
    let h = harness();
    let v = h.store.register_vehicle(vehicle("KA-01-AA-0004")).await.unwrap();

    h.ingest.ingest(v.id, &LocationReport::at(12.90, 77.60)).await.unwrap();
    h.clock.advance(Duration::seconds(5));
    h.ingest.ingest(v.id, &LocationReport::at(12.91, 77.61)).await.unwrap();

    let current = h.vehicles.get(v.id).await.unwrap();
    assert_eq!(current.position, Some(GeoPoint::new(12.91, 77.61)));

    let history = h.ingest.history(v.id, None, None).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].position, GeoPoint::new(12.91, 77.61));
}

#[tokio::test]
async fn history_window_excludes_old_samples() {
    let h = harness();
    let v = h.store.register_vehicle(vehicle("KA-01-AA-0005")).await.unwrap();

    h.ingest.ingest(v.id, &LocationReport::at(12.90, 77.60)).await.unwrap();
    h.clock.advance(Duration::hours(3));
    h.ingest.ingest(v.id, &LocationReport::at(12.95, 77.65)).await.unwrap();

    let recent = h.ingest.history(v.id, Some(1), None).await.unwrap();
    assert_eq!(recent.len(), 1);

    let err = h.ingest.history(VehicleId::new(), None, None).await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound { .. }));
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

#[tokio::test]
async fn nearby_orders_by_distance() {
    let h = harness();
    let near = h.store.register_vehicle(vehicle("KA-02-BB-0001")).await.unwrap();
    let far = h.store.register_vehicle(vehicle("KA-02-BB-0002")).await.unwrap();
    let idle = h.store.register_vehicle(vehicle("KA-02-BB-0003")).await.unwrap();

    h.ingest.ingest(far.id, &LocationReport::at(12.9790, 77.5946)).await.unwrap();
    h.ingest.ingest(near.id, &LocationReport::at(12.9720, 77.5946)).await.unwrap();

    let center = GeoPoint::new(12.9716, 77.5946);
    let hits: Vec<Ranked<Vehicle>> = h.vehicles.nearby(center, None).await.unwrap();
    let ids: Vec<VehicleId> = hits.iter().map(|r| r.item.id).collect();
    assert_eq!(ids, vec![near.id, far.id]);
    assert!(!ids.contains(&idle.id));
    assert!(hits[0].distance_m < hits[1].distance_m);

    let tight = h.vehicles.nearby(center, Some(100.0)).await.unwrap();
    assert_eq!(tight.len(), 1);

    let err = h.vehicles.nearby(center, Some(-5.0)).await.unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
}

#[tokio::test]
async fn listing_filters_by_status() {
    let h = harness();
    let mut parked = vehicle("KA-03-CC-0001");
    parked.status = VehicleStatus::Maintenance;
    h.store.register_vehicle(parked).await.unwrap();
    h.store.register_vehicle(vehicle("KA-03-CC-0002")).await.unwrap();

    let all = h.vehicles.list(VehicleFilter::default()).await.unwrap();
    assert_eq!(all.len(), 2);
    let in_shop = h
        .vehicles
        .list(VehicleFilter {
            status: Some(VehicleStatus::Maintenance),
            ..VehicleFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(in_shop.len(), 1);
    assert_eq!(h.vehicles.active().await.unwrap().len(), 1);
}

// ---------------------------------------------------------------------------
// Alert lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reporting_an_accident_creates_a_linked_alert() {
    let h = harness();
    let reporter = IdentityId::new();

    let reported = h
        .alerts
        .report_accident(AccidentReport::at(12.97, 77.59, Severity::Severe), reporter)
        .await
        .unwrap();

    assert_eq!(reported.accident.status, AccidentStatus::Reported);
    assert_eq!(reported.alert.accident_id, Some(reported.accident.id));
    assert_eq!(reported.alert.radius_m, 1500.0);
    assert_eq!(reported.alert.expires_at, Some(start() + Duration::hours(2)));
    assert_eq!(reported.alert.created_by, reporter);

    let accidents = h.alerts.list_accidents(AccidentFilter::default()).await.unwrap();
    assert_eq!(accidents.len(), 1);

    let events = h.sink.events();
    let RelayEvent::AccidentReported(notice) = &events[0] else {
        panic!("expected an accident event");
    };
    assert_eq!(notice.accident_id, reported.accident.id);
    assert_eq!(notice.alert_id, reported.alert.id);
    assert_eq!(notice.severity, Severity::Severe);
}

#[tokio::test]
async fn severity_defaults_to_moderate() {
    let h = harness();
    let report = AccidentReport {
        latitude: Some(12.97),
        longitude: Some(77.59),
        ..AccidentReport::default()
    };
    let reported = h.alerts.report_accident(report, IdentityId::new()).await.unwrap();
    assert_eq!(reported.accident.severity, Severity::Moderate);
}

#[tokio::test]
async fn unknown_vehicle_rejects_the_report_before_writing() {
    let h = harness();
    let mut report = AccidentReport::at(12.97, 77.59, Severity::Minor);
    report.vehicle_id = Some(VehicleId::new());

    let err = h.alerts.report_accident(report, IdentityId::new()).await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound { .. }));
    assert!(h.alerts.list_accidents(AccidentFilter::default()).await.unwrap().is_empty());
    assert!(h.sink.events().is_empty());
}

#[tokio::test]
async fn expired_alerts_are_never_active() {
    let h = harness();
    h.alerts
        .report_accident(AccidentReport::at(12.97, 77.59, Severity::Critical), IdentityId::new())
        .await
        .unwrap();
    assert_eq!(h.alerts.active_alerts(None).await.unwrap().len(), 1);

    h.clock.advance(Duration::hours(2));
    assert!(h.alerts.active_alerts(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn ttl_override_shortens_the_alert() {
    let h = harness();
    let mut report = AccidentReport::at(12.97, 77.59, Severity::Minor);
    report.alert_ttl_secs = Some(60);
    report.alert_radius_m = Some(250.0);
    let reported = h.alerts.report_accident(report, IdentityId::new()).await.unwrap();
    assert_eq!(reported.alert.radius_m, 250.0);

    h.clock.advance(Duration::seconds(61));
    assert!(h.alerts.active_alerts(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn deactivation_overrides_expiry() {
    let h = harness();
    let reported = h
        .alerts
        .report_accident(AccidentReport::at(12.97, 77.59, Severity::Severe), IdentityId::new())
        .await
        .unwrap();

    let alert = h.alerts.deactivate(reported.alert.id).await.unwrap();
    assert!(!alert.active);
    assert!(h.alerts.active_alerts(None).await.unwrap().is_empty());

    let err = h.alerts.deactivate(AlertId::new()).await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound { entity: "alert", .. }));
}

#[tokio::test]
async fn proximity_modes() {
    let h = harness();
    let reporter = IdentityId::new();
    let near = h
        .alerts
        .report_accident(AccidentReport::at(12.9720, 77.5946, Severity::Minor), reporter)
        .await
        .unwrap();
    h.clock.advance(Duration::seconds(1));
    let far = h
        .alerts
        .report_accident(AccidentReport::at(13.0500, 77.5946, Severity::Minor), reporter)
        .await
        .unwrap();

    let unfiltered: Vec<ActiveAlert> = h.alerts.active_alerts(None).await.unwrap();
    assert_eq!(unfiltered[0].alert.id, far.alert.id);
    assert!(unfiltered.iter().all(|a| a.distance_m.is_none()));

    let center = GeoPoint::new(12.9716, 77.5946);
    let within = h
        .alerts
        .active_alerts(Some(Proximity::Within {
            center,
            radius_m: 5000.0,
        }))
        .await
        .unwrap();
    assert_eq!(within.len(), 1);
    assert_eq!(within[0].alert.id, near.alert.id);

    // 13.05 is ~8.7 km away: outside its own 1500 m radius.
    let covering = h
        .alerts
        .active_alerts(Some(Proximity::Covering { point: center }))
        .await
        .unwrap();
    assert_eq!(covering.len(), 1);
    assert_eq!(covering[0].alert.id, near.alert.id);
}

#[tokio::test]
async fn accident_listing_filters() {
    let h = harness();
    let reporter = IdentityId::new();
    for severity in [Severity::Minor, Severity::Severe, Severity::Severe] {
        h.alerts
            .report_accident(AccidentReport::at(12.97, 77.59, severity), reporter)
            .await
            .unwrap();
        h.clock.advance(Duration::seconds(1));
    }

    let severe = h
        .alerts
        .list_accidents(AccidentFilter {
            severity: Some(Severity::Severe),
            ..AccidentFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(severe.len(), 2);
    assert!(severe[0].reported_at > severe[1].reported_at);

    let limited = h
        .alerts
        .list_accidents(AccidentFilter {
            limit: 1,
            ..AccidentFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(limited.len(), 1);
}

// ---------------------------------------------------------------------------
// Partial failure
// ---------------------------------------------------------------------------

/// Delegates to a [`MemoryStore`] but refuses every alert insert.
struct AlertlessStore(MemoryStore);

#[async_trait]
impl FleetStore for AlertlessStore {
    async fn register_vehicle(&self, vehicle: Vehicle) -> Result<Vehicle, StoreError> {
        self.0.register_vehicle(vehicle).await
    }
    async fn get_vehicle(&self, id: VehicleId) -> Result<Option<Vehicle>, StoreError> {
        self.0.get_vehicle(id).await
    }
    async fn list_vehicles(&self, filter: VehicleFilter) -> Result<Vec<Vehicle>, StoreError> {
        self.0.list_vehicles(filter).await
    }
    async fn record_sample(&self, sample: LocationSample) -> Result<Vehicle, StoreError> {
        self.0.record_sample(sample).await
    }
    async fn location_history(
        &self,
        vehicle_id: VehicleId,
        since: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<LocationSample>, StoreError> {
        self.0.location_history(vehicle_id, since, limit).await
    }
    async fn vehicles_within(
        &self,
        center: GeoPoint,
        radius_m: f64,
    ) -> Result<Vec<Ranked<Vehicle>>, StoreError> {
        self.0.vehicles_within(center, radius_m).await
    }
    async fn insert_accident(&self, accident: Accident) -> Result<Accident, StoreError> {
        self.0.insert_accident(accident).await
    }
    async fn insert_alert(&self, _alert: Alert) -> Result<Alert, StoreError> {
        Err(StoreError::Backend("connection reset".into()))
    }
    async fn list_accidents(&self, filter: AccidentFilter) -> Result<Vec<Accident>, StoreError> {
        self.0.list_accidents(filter).await
    }
    async fn active_alerts(
        &self,
        now: DateTime<Utc>,
        proximity: Option<Proximity>,
    ) -> Result<Vec<ActiveAlert>, StoreError> {
        self.0.active_alerts(now, proximity).await
    }
    async fn deactivate_alert(&self, id: AlertId) -> Result<Alert, StoreError> {
        self.0.deactivate_alert(id).await
    }
}

#[tokio::test]
async fn failed_alert_insert_is_a_partial_report() {
    let store = Arc::new(AlertlessStore(MemoryStore::new()));
    let sink = Arc::new(RecordingSink::default());
    let alerts = AlertService::new(
        store.clone(),
        sink.clone(),
        Arc::new(ManualClock::new(start())),
        AlertPolicy::default(),
    );

    let err = alerts
        .report_accident(AccidentReport::at(12.97, 77.59, Severity::Severe), IdentityId::new())
        .await
        .unwrap_err();

    let CoreError::PartialReport { accident, .. } = err else {
        panic!("expected a partial report, got {err:?}");
    };
    let stored = store.list_accidents(AccidentFilter::default()).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, accident.id);
    assert!(sink.events().is_empty());
}
