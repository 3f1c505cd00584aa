use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use uuid::Uuid;

use super::*;
use crate::bus::{ChannelConfig, ChannelEventBus};
use crate::config::PoolConfig;
use crate::events::{
    ApplicationEvent, DeleteEvent, EventMessage, RevertEvent, RevertLatestEvent, StatusEvent,
    UserDeleteEvent,
};
use crate::interfaces::{ApplicationStore, CacheVersions, EventBus, Projector, Warehouse};
use crate::model::{
    Application, ApplicationFields, ApplicationId, ApplicationStatus, Owner,
};
use crate::storage::{MockApplicationStore, MockCacheVersions, MockSearchIndex, MockWarehouse};
use crate::utils::clock::FakeClock;

const DAY: i64 = 86_400;

fn owner() -> Owner {
    Owner::new("kim@example.com")
}

fn now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
}

fn application(id: &str, status: ApplicationStatus) -> Application {
    Application {
        id: ApplicationId::new(id),
        owner: owner(),
        fields: ApplicationFields {
            role: "SWE".to_string(),
            company: "Acme".to_string(),
            location: "Remote".to_string(),
            applied_date: now().timestamp() - 5 * DAY,
            link: String::new(),
        },
        status,
    }
}

fn add_event(id: &str) -> EventMessage {
    let app = application(id, ApplicationStatus::Applied);
    EventMessage::Add(ApplicationEvent::from_application(
        &app,
        app.fields.applied_date,
    ))
}

fn status_event(id: &str, status: ApplicationStatus, days_after: i64) -> EventMessage {
    let applied_date = now().timestamp() - 5 * DAY;
    EventMessage::EditStatus(StatusEvent {
        operation_id: Uuid::new_v4(),
        owner: owner(),
        object_id: ApplicationId::new(id),
        status,
        applied_date,
        timestamp: applied_date + days_after * DAY,
    })
}

struct Fixture {
    store: Arc<MockApplicationStore>,
    index: Arc<MockSearchIndex>,
    cache: Arc<MockCacheVersions>,
    warehouse: Arc<MockWarehouse>,
    search: SearchProjector,
    analytics: WarehouseProjector,
}

fn fixture() -> Fixture {
    let store = Arc::new(MockApplicationStore::new());
    let index = Arc::new(MockSearchIndex::new());
    let cache = Arc::new(MockCacheVersions::new());
    let warehouse = Arc::new(MockWarehouse::new());
    let clock = Arc::new(FakeClock::new(now()));
    Fixture {
        search: SearchProjector::new(index.clone(), cache.clone()),
        analytics: WarehouseProjector::new(warehouse.clone(), store.clone(), clock),
        store,
        index,
        cache,
        warehouse,
    }
}

// ============================================================================
// Search projector
// ============================================================================

#[tokio::test]
async fn test_search_add_is_idempotent() {
    let f = fixture();
    let event = add_event("a1");

    f.search.project(&event).await.unwrap();
    f.search.project(&event).await.unwrap();

    assert_eq!(f.index.document_count(&owner()).await, 1);
    let doc = f.index.document(&owner(), &ApplicationId::new("a1")).await.unwrap();
    assert_eq!(doc.company, "Acme");
}

#[tokio::test]
async fn test_search_status_update_patches_document() {
    let f = fixture();
    f.search.project(&add_event("a1")).await.unwrap();

    f.search
        .project(&status_event("a1", ApplicationStatus::Interviewing, 2))
        .await
        .unwrap();

    let doc = f.index.document(&owner(), &ApplicationId::new("a1")).await.unwrap();
    assert_eq!(doc.status, ApplicationStatus::Interviewing);
    assert_eq!(doc.role, "SWE");
}

#[tokio::test]
async fn test_search_status_update_never_creates() {
    let f = fixture();

    f.search
        .project(&status_event("ghost", ApplicationStatus::Offer, 1))
        .await
        .unwrap();

    assert_eq!(f.index.document_count(&owner()).await, 0);
    assert_eq!(f.cache.version(&owner()).await.unwrap(), 0);
}

#[tokio::test]
async fn test_search_write_bumps_cache_version() {
    let f = fixture();

    f.search.project(&add_event("a1")).await.unwrap();
    f.search
        .project(&status_event("a1", ApplicationStatus::Screen, 1))
        .await
        .unwrap();

    assert_eq!(f.cache.version(&owner()).await.unwrap(), 2);
}

#[tokio::test]
async fn test_search_cache_outage_does_not_fail_projection() {
    let f = fixture();
    f.cache.set_fail(true).await;

    f.search.project(&add_event("a1")).await.unwrap();

    assert_eq!(f.index.document_count(&owner()).await, 1);
}

#[tokio::test]
async fn test_search_delete_twice_is_harmless() {
    let f = fixture();
    f.search.project(&add_event("a1")).await.unwrap();
    let delete = EventMessage::Delete(DeleteEvent {
        operation_id: Uuid::new_v4(),
        owner: owner(),
        object_id: ApplicationId::new("a1"),
    });

    f.search.project(&delete).await.unwrap();
    f.search.project(&delete).await.unwrap();

    assert_eq!(f.index.document_count(&owner()).await, 0);
}

#[tokio::test]
async fn test_search_user_delete_removes_all_owner_documents() {
    let f = fixture();
    f.search.project(&add_event("a1")).await.unwrap();
    f.search.project(&add_event("a2")).await.unwrap();

    f.search
        .project(&EventMessage::UserDelete(UserDeleteEvent {
            operation_id: Uuid::new_v4(),
            owner: owner(),
        }))
        .await
        .unwrap();

    assert_eq!(f.index.document_count(&owner()).await, 0);
    assert_eq!(f.index.bulk_delete_count().await, 1);
}

#[tokio::test]
async fn test_search_revert_latest_restores_status() {
    let f = fixture();
    f.search.project(&add_event("a1")).await.unwrap();
    f.search
        .project(&status_event("a1", ApplicationStatus::Rejected, 3))
        .await
        .unwrap();

    f.search
        .project(&EventMessage::RevertLatest(RevertLatestEvent {
            operation_id: Uuid::new_v4(),
            owner: owner(),
            object_id: ApplicationId::new("a1"),
            reverted_operation_id: Uuid::new_v4(),
            status: ApplicationStatus::Applied,
            timestamp: now().timestamp(),
        }))
        .await
        .unwrap();

    let doc = f.index.document(&owner(), &ApplicationId::new("a1")).await.unwrap();
    assert_eq!(doc.status, ApplicationStatus::Applied);
}

#[tokio::test]
async fn test_search_failure_surfaces_as_projector_error() {
    let f = fixture();
    f.index.set_fail_on_write(true).await;

    let err = f.search.project(&add_event("a1")).await.unwrap_err();

    assert!(matches!(err, crate::interfaces::ProjectorError::Search(_)));
    assert!(!err.is_permanent());
}

// ============================================================================
// Warehouse projector
// ============================================================================

#[tokio::test]
async fn test_warehouse_duplicate_event_inserts_once() {
    let f = fixture();
    let event = add_event("a1");

    f.analytics.project(&event).await.unwrap();
    f.analytics.project(&event).await.unwrap();

    assert_eq!(f.warehouse.row_count(&owner()).await, 1);
}

#[tokio::test]
async fn test_warehouse_writes_back_analytics() {
    let f = fixture();

    f.analytics.project(&add_event("a1")).await.unwrap();
    f.analytics
        .project(&status_event("a1", ApplicationStatus::Screen, 4))
        .await
        .unwrap();

    let profile = f.store.profile(&owner()).await.unwrap();
    let analytics = profile.analytics.unwrap();
    assert_eq!(analytics.application_velocity, 1);
    assert_eq!(analytics.resume_effectiveness, 1);
    assert_eq!(analytics.avg_response_time, Some(4.0));
}

#[tokio::test]
async fn test_warehouse_delete_removes_job_rows() {
    let f = fixture();
    f.analytics.project(&add_event("a1")).await.unwrap();
    f.analytics.project(&add_event("a2")).await.unwrap();

    f.analytics
        .project(&EventMessage::Delete(DeleteEvent {
            operation_id: Uuid::new_v4(),
            owner: owner(),
            object_id: ApplicationId::new("a1"),
        }))
        .await
        .unwrap();

    assert_eq!(f.warehouse.row_count(&owner()).await, 1);
    let analytics = f.store.profile(&owner()).await.unwrap().analytics.unwrap();
    assert_eq!(analytics.application_velocity, 1);
}

#[tokio::test]
async fn test_warehouse_revert_flags_row() {
    let f = fixture();
    let status = status_event("a1", ApplicationStatus::Screen, 1);
    f.analytics.project(&add_event("a1")).await.unwrap();
    f.analytics.project(&status).await.unwrap();

    f.analytics
        .project(&EventMessage::Revert(RevertEvent {
            operation_id: Uuid::new_v4(),
            owner: owner(),
            object_id: ApplicationId::new("a1"),
            reverted_operation_id: status.operation_id(),
        }))
        .await
        .unwrap();

    let latest = f
        .warehouse
        .latest_events(&owner(), &ApplicationId::new("a1"), 2)
        .await
        .unwrap();
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].status, ApplicationStatus::Applied);
    let analytics = f.store.profile(&owner()).await.unwrap().analytics.unwrap();
    assert_eq!(analytics.resume_effectiveness, 0);
}

#[tokio::test]
async fn test_warehouse_user_delete_skips_recompute() {
    let f = fixture();
    f.analytics.project(&add_event("a1")).await.unwrap();
    f.store.set_fail_on_profile(true).await;

    f.analytics
        .project(&EventMessage::UserDelete(UserDeleteEvent {
            operation_id: Uuid::new_v4(),
            owner: owner(),
        }))
        .await
        .unwrap();

    assert_eq!(f.warehouse.row_count(&owner()).await, 0);
}

#[tokio::test]
async fn test_warehouse_write_back_failure_is_retryable() {
    let f = fixture();
    f.store.set_fail_on_profile(true).await;

    let err = f.analytics.project(&add_event("a1")).await.unwrap_err();

    assert!(!err.is_permanent());
    // The row landed; redelivery will skip it and retry the write-back.
    assert_eq!(f.warehouse.row_count(&owner()).await, 1);
}

// ============================================================================
// Consumer
// ============================================================================

fn pool_config() -> PoolConfig {
    PoolConfig {
        workers: 2,
        queue_capacity: 8,
    }
}

async fn wait_idle(consumer: &ProjectionConsumer) {
    for _ in 0..200 {
        if consumer.subscription().is_idle() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("consumer {} never went idle", consumer.name());
}

fn channel_bus() -> ChannelEventBus {
    ChannelEventBus::new(ChannelConfig {
        max_delivery_attempts: 5,
        redelivery_delay: Duration::from_millis(10),
    })
}

#[tokio::test]
async fn test_consumer_projects_published_events() {
    let f = fixture();
    let bus = channel_bus();
    let consumer = ProjectionConsumer::start(
        bus.subscribe("search").await,
        Arc::new(SearchProjector::new(f.index.clone(), f.cache.clone())),
        &pool_config(),
    );

    bus.publish(Arc::new(add_event("a1"))).await.unwrap();
    bus.publish(Arc::new(add_event("a2"))).await.unwrap();
    wait_idle(&consumer).await;
    consumer.shutdown().await;

    assert_eq!(f.index.document_count(&owner()).await, 2);
    assert_eq!(consumer.stats().processed(), 2);
}

#[tokio::test]
async fn test_consumer_redelivers_after_projector_failure() {
    let f = fixture();
    let bus = channel_bus();
    f.index.set_fail_on_write(true).await;
    let consumer = ProjectionConsumer::start(
        bus.subscribe("search").await,
        Arc::new(SearchProjector::new(f.index.clone(), f.cache.clone())),
        &pool_config(),
    );

    bus.publish(Arc::new(add_event("a1"))).await.unwrap();
    while consumer.stats().failed() == 0 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    f.index.set_fail_on_write(false).await;
    wait_idle(&consumer).await;
    consumer.shutdown().await;

    assert_eq!(f.index.document_count(&owner()).await, 1);
    assert!(consumer.stats().failed() >= 1);
    assert!(consumer.subscription().dead_letters().is_empty());
}

#[tokio::test]
async fn test_consumer_rejects_undecodable_payload() {
    let f = fixture();
    let bus = channel_bus();
    let subscription = bus.subscribe("warehouse").await;
    let consumer = ProjectionConsumer::start(
        subscription.clone(),
        Arc::new(WarehouseProjector::new(
            f.warehouse.clone(),
            f.store.clone(),
            Arc::new(FakeClock::new(now())),
        )),
        &pool_config(),
    );

    bus.publish_raw("kim@example.com", b"{\"operation\":\"teleport\"}".to_vec())
        .await
        .unwrap();
    wait_idle(&consumer).await;
    consumer.shutdown().await;

    assert_eq!(subscription.dead_letters().len(), 1);
    assert_eq!(subscription.dead_letters()[0].attempts, 1);
}
