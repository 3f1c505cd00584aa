//! Ordered, at-least-once projection into the derived stores.

use std::sync::Arc;

use copium::dashboard::DashboardQuery;
use copium::events::{ApplicationEvent, EventMessage};
use copium::interfaces::EventBus;
use copium::model::{Application, ApplicationFields, ApplicationId, ApplicationStatus};

use crate::common::*;

#[tokio::test]
async fn test_status_changes_arrive_in_order() {
    let (runtime, _clock) = runtime().await;
    let app = add(&runtime, "SWE").await;

    for status in [
        ApplicationStatus::Screen,
        ApplicationStatus::Interviewing,
        ApplicationStatus::Offer,
        ApplicationStatus::Rejected,
    ] {
        set_status(&runtime, &app, status).await;
    }
    settle(&runtime).await;

    let doc = runtime.index().document(&owner(), &app.id).await.unwrap();
    assert_eq!(doc.status, ApplicationStatus::Rejected);
    assert_eq!(runtime.warehouse().row_count(&owner()).await, 5);

    runtime.shutdown().await;
}

#[tokio::test]
async fn test_duplicate_delivery_is_absorbed() {
    let (runtime, _clock) = runtime().await;
    let app = Application {
        id: ApplicationId::new("dup-1"),
        owner: owner(),
        fields: ApplicationFields {
            role: "SWE".to_string(),
            company: "Acme".to_string(),
            location: "Remote".to_string(),
            applied_date: APPLIED,
            link: String::new(),
        },
        status: ApplicationStatus::Applied,
    };
    let event = Arc::new(EventMessage::Add(ApplicationEvent::from_application(
        &app, APPLIED,
    )));

    runtime.bus().publish(event.clone()).await.unwrap();
    runtime.bus().publish(event).await.unwrap();
    settle(&runtime).await;

    assert_eq!(runtime.index().document_count(&owner()).await, 1);
    assert_eq!(runtime.warehouse().row_count(&owner()).await, 1);

    runtime.shutdown().await;
}

#[tokio::test]
async fn test_dashboard_reflects_projected_applications() {
    let (runtime, _clock) = runtime().await;
    for role in ["SWE", "SRE", "PM"] {
        add(&runtime, role).await;
    }
    settle(&runtime).await;

    let page = runtime
        .service()
        .dashboard(
            TOKEN,
            &DashboardQuery {
                text: Some("sre".to_string()),
                page: 1,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(page.total_hits, 1);
    assert_eq!(page.total_pages, 1);
    assert_eq!(page.hits_per_page, 10);
    assert_eq!(page.hits[0].role, "SRE");

    runtime.shutdown().await;
}
