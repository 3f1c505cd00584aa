//! Write-publish-compensate saga end to end.

use copium::api::AddApplicationRequest;
use copium::interfaces::ApplicationStore;
use copium::Error;

use crate::common::*;

#[tokio::test]
async fn test_add_replicates_to_every_store() {
    let (runtime, _clock) = runtime().await;

    let app = add(&runtime, "SWE").await;
    settle(&runtime).await;

    assert!(!app.id.as_str().is_empty());
    let profile = runtime.store().profile(&owner()).await.unwrap();
    assert_eq!(profile.applications_count, 1);
    assert!(runtime.index().document(&owner(), &app.id).await.is_some());
    assert_eq!(runtime.warehouse().row_count(&owner()).await, 1);
    let analytics = profile.analytics.expect("analytics written back");
    assert_eq!(analytics.application_velocity, 1);

    runtime.shutdown().await;
}

#[tokio::test]
async fn test_add_rolled_back_when_bus_unreachable() {
    let (runtime, _clock) = runtime().await;
    runtime.bus().close().await;

    let err = runtime
        .service()
        .add_application(
            TOKEN,
            AddApplicationRequest {
                form: form("SWE"),
                status: None,
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Publish(_)));
    assert!(err.is_retryable());
    assert_eq!(runtime.store().count(&owner()).await.unwrap(), 0);
    let profile = runtime.store().profile(&owner()).await.unwrap();
    assert_eq!(profile.applications_count, 0);

    runtime.shutdown().await;
}

#[tokio::test]
async fn test_delete_user_clears_derived_stores() {
    let (runtime, _clock) = runtime().await;
    add(&runtime, "SWE").await;
    add(&runtime, "SRE").await;
    settle(&runtime).await;

    let removed = runtime.service().delete_user(TOKEN).await.unwrap();
    settle(&runtime).await;

    assert_eq!(removed, 2);
    assert_eq!(runtime.store().count(&owner()).await.unwrap(), 0);
    assert_eq!(runtime.index().document_count(&owner()).await, 0);
    assert_eq!(runtime.warehouse().row_count(&owner()).await, 0);

    runtime.shutdown().await;
}
