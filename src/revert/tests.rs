use std::time::Duration;

use chrono::{TimeZone, Utc};

use super::*;
use crate::bus::MockEventBus;
use crate::coordinator::PublishPolicy;
use crate::events::{EventMessage, EventRow, OperationKind};
use crate::interfaces::ApplicationStore;
use crate::model::{Application, ApplicationFields};
use crate::storage::{MockApplicationStore, MockCacheVersions, MockWarehouse};
use crate::utils::clock::FakeClock;

const DAY: i64 = 86_400;
const APPLIED: i64 = 1_717_243_200;

struct Harness {
    store: Arc<MockApplicationStore>,
    bus: Arc<MockEventBus>,
    warehouse: Arc<MockWarehouse>,
    resolver: RevertResolver,
}

fn harness() -> Harness {
    let store = Arc::new(MockApplicationStore::new());
    let bus = Arc::new(MockEventBus::new());
    let warehouse = Arc::new(MockWarehouse::new());
    let coordinator = Arc::new(MutationCoordinator::new(
        store.clone(),
        bus.clone(),
        Arc::new(MockCacheVersions::new()),
        Arc::new(FakeClock::new(
            Utc.with_ymd_and_hms(2024, 6, 15, 9, 0, 0).unwrap(),
        )),
        PublishPolicy {
            timeout: Duration::from_secs(1),
            retries: 0,
        },
    ));
    Harness {
        resolver: RevertResolver::new(coordinator, warehouse.clone()),
        store,
        bus,
        warehouse,
    }
}

fn owner() -> Owner {
    Owner::new("kim@example.com")
}

fn job() -> ApplicationId {
    ApplicationId::new("job-1")
}

async fn seed_application(h: &Harness, status: ApplicationStatus) {
    h.store
        .put(Application {
            id: job(),
            owner: owner(),
            fields: ApplicationFields {
                role: "SWE".to_string(),
                company: "Acme".to_string(),
                location: "Remote".to_string(),
                applied_date: APPLIED,
                link: String::new(),
            },
            status,
        })
        .await
        .unwrap();
}

/// Record an event `day` days after the apply date and return its id.
async fn record(h: &Harness, operation: OperationKind, status: ApplicationStatus, day: i64) -> Uuid {
    let operation_id = Uuid::new_v4();
    h.warehouse
        .insert(EventRow {
            operation_id,
            owner: owner(),
            job_id: job(),
            event_time: APPLIED + day * DAY,
            applied_date: APPLIED,
            status,
            operation,
        })
        .await
        .unwrap();
    operation_id
}

async fn live_status(h: &Harness) -> ApplicationStatus {
    h.store.get(&owner(), &job()).await.unwrap().unwrap().status
}

#[tokio::test]
async fn test_single_event_cannot_be_reverted() {
    let h = harness();
    seed_application(&h, ApplicationStatus::Applied).await;
    let add = record(&h, OperationKind::Add, ApplicationStatus::Applied, 0).await;

    let err = h.resolver.revert(&owner(), &job(), add).await.unwrap_err();

    assert!(matches!(err, Error::RevertConflict(_)));
    assert_eq!(h.bus.attempt_count().await, 0);
}

#[tokio::test]
async fn test_revert_latest_restores_previous_status() {
    let h = harness();
    seed_application(&h, ApplicationStatus::Interviewing).await;
    record(&h, OperationKind::Add, ApplicationStatus::Applied, 0).await;
    let interview = record(&h, OperationKind::EditStatus, ApplicationStatus::Interviewing, 3).await;

    let status = h.resolver.revert(&owner(), &job(), interview).await.unwrap();

    assert_eq!(status, ApplicationStatus::Applied);
    assert_eq!(live_status(&h).await, ApplicationStatus::Applied);
    match h.bus.published().await.as_slice() {
        [EventMessage::RevertLatest(e)] => {
            assert_eq!(e.reverted_operation_id, interview);
            assert_eq!(e.status, ApplicationStatus::Applied);
        }
        other => panic!("unexpected events {other:?}"),
    }
}

#[tokio::test]
async fn test_revert_historical_leaves_live_state() {
    let h = harness();
    seed_application(&h, ApplicationStatus::Offer).await;
    record(&h, OperationKind::Add, ApplicationStatus::Applied, 0).await;
    let interview = record(&h, OperationKind::EditStatus, ApplicationStatus::Interviewing, 3).await;
    record(&h, OperationKind::EditStatus, ApplicationStatus::Offer, 9).await;

    let status = h.resolver.revert(&owner(), &job(), interview).await.unwrap();

    assert_eq!(status, ApplicationStatus::Offer);
    assert_eq!(live_status(&h).await, ApplicationStatus::Offer);
    match h.bus.published().await.as_slice() {
        [EventMessage::Revert(e)] => assert_eq!(e.reverted_operation_id, interview),
        other => panic!("unexpected events {other:?}"),
    }
}

#[tokio::test]
async fn test_revert_older_history_is_conflict() {
    let h = harness();
    seed_application(&h, ApplicationStatus::Offer).await;
    let add = record(&h, OperationKind::Add, ApplicationStatus::Applied, 0).await;
    record(&h, OperationKind::EditStatus, ApplicationStatus::Interviewing, 3).await;
    record(&h, OperationKind::EditStatus, ApplicationStatus::Offer, 9).await;

    let err = h.resolver.revert(&owner(), &job(), add).await.unwrap_err();

    assert!(matches!(err, Error::RevertConflict(_)));
    assert_eq!(live_status(&h).await, ApplicationStatus::Offer);
    assert_eq!(h.bus.attempt_count().await, 0);
}

#[tokio::test]
async fn test_reverted_rows_are_skipped() {
    let h = harness();
    seed_application(&h, ApplicationStatus::Screen).await;
    record(&h, OperationKind::Add, ApplicationStatus::Applied, 0).await;
    let screen = record(&h, OperationKind::EditStatus, ApplicationStatus::Screen, 2).await;
    let rejected = record(&h, OperationKind::EditStatus, ApplicationStatus::Rejected, 5).await;
    h.warehouse
        .flag_reverted(&owner(), &job(), rejected)
        .await
        .unwrap();

    let status = h.resolver.revert(&owner(), &job(), screen).await.unwrap();

    assert_eq!(status, ApplicationStatus::Applied);
    assert_eq!(live_status(&h).await, ApplicationStatus::Applied);
}

#[tokio::test]
async fn test_revert_latest_publish_failure_restores_status() {
    let h = harness();
    seed_application(&h, ApplicationStatus::Rejected).await;
    record(&h, OperationKind::Add, ApplicationStatus::Applied, 0).await;
    let rejected = record(&h, OperationKind::EditStatus, ApplicationStatus::Rejected, 4).await;
    h.bus.set_fail_on_publish(true).await;

    let err = h.resolver.revert(&owner(), &job(), rejected).await.unwrap_err();

    assert!(matches!(err, Error::Publish(_)));
    assert_eq!(live_status(&h).await, ApplicationStatus::Rejected);
}

#[tokio::test]
async fn test_warehouse_unavailable_surfaces() {
    let h = harness();
    h.warehouse.set_fail_on_read(true).await;

    let err = h
        .resolver
        .revert(&owner(), &job(), Uuid::new_v4())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Warehouse(_)));
}
