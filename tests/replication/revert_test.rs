//! Revert of the latest and the second-latest event of a job.

use std::time::Duration;

use copium::api::RevertStatusRequest;
use copium::events::EventRow;
use copium::interfaces::ApplicationStore;
use copium::model::{Application, ApplicationStatus};
use copium::standalone::Runtime;
use copium::utils::clock::FakeClock;
use copium::Error;

use crate::common::*;

const DAY: Duration = Duration::from_secs(86_400);

/// Job with events `[add@t0, Screen@t1, Offer@t2]`, one day apart.
async fn job_with_history(runtime: &Runtime, clock: &FakeClock) -> (Application, Vec<EventRow>) {
    let app = add(runtime, "SWE").await;
    clock.advance(DAY);
    set_status(runtime, &app, ApplicationStatus::Screen).await;
    clock.advance(DAY);
    set_status(runtime, &app, ApplicationStatus::Offer).await;
    settle(runtime).await;

    let timeline = runtime
        .service()
        .timeline(TOKEN, app.id.clone())
        .await
        .unwrap();
    assert_eq!(timeline.len(), 3);
    (app, timeline)
}

async fn live_status(runtime: &Runtime, app: &Application) -> ApplicationStatus {
    runtime
        .store()
        .get(&owner(), &app.id)
        .await
        .unwrap()
        .unwrap()
        .status
}

#[tokio::test]
async fn test_revert_latest_restores_previous_status() {
    let (runtime, clock) = runtime().await;
    let (app, timeline) = job_with_history(&runtime, &clock).await;
    let t2 = timeline[0].operation_id;
    assert_eq!(timeline[0].status, ApplicationStatus::Offer);

    let status = runtime
        .service()
        .revert_status(
            TOKEN,
            RevertStatusRequest {
                id: app.id.clone(),
                operation_id: t2,
            },
        )
        .await
        .unwrap();
    settle(&runtime).await;

    assert_eq!(status, ApplicationStatus::Screen);
    assert_eq!(live_status(&runtime, &app).await, ApplicationStatus::Screen);
    let doc = runtime.index().document(&owner(), &app.id).await.unwrap();
    assert_eq!(doc.status, ApplicationStatus::Screen);
    let timeline = runtime.service().timeline(TOKEN, app.id.clone()).await.unwrap();
    let reverted = timeline.iter().find(|row| row.operation_id == t2).unwrap();
    assert!(reverted.is_reverted());

    runtime.shutdown().await;
}

#[tokio::test]
async fn test_revert_deep_history_is_conflict() {
    let (runtime, clock) = runtime().await;
    let (app, timeline) = job_with_history(&runtime, &clock).await;
    let t0 = timeline[2].operation_id;

    let err = runtime
        .service()
        .revert_status(
            TOKEN,
            RevertStatusRequest {
                id: app.id.clone(),
                operation_id: t0,
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, Error::RevertConflict(_)));
    assert_eq!(live_status(&runtime, &app).await, ApplicationStatus::Offer);

    runtime.shutdown().await;
}

#[tokio::test]
async fn test_revert_historical_flags_row_only() {
    let (runtime, clock) = runtime().await;
    let (app, timeline) = job_with_history(&runtime, &clock).await;
    let t1 = timeline[1].operation_id;

    let status = runtime
        .service()
        .revert_status(
            TOKEN,
            RevertStatusRequest {
                id: app.id.clone(),
                operation_id: t1,
            },
        )
        .await
        .unwrap();
    settle(&runtime).await;

    assert_eq!(status, ApplicationStatus::Offer);
    assert_eq!(live_status(&runtime, &app).await, ApplicationStatus::Offer);
    let timeline = runtime.service().timeline(TOKEN, app.id.clone()).await.unwrap();
    let flagged: Vec<_> = timeline.iter().filter(|row| row.is_reverted()).collect();
    assert_eq!(flagged.len(), 1);
    assert_eq!(flagged[0].operation_id, t1);

    runtime.shutdown().await;
}
