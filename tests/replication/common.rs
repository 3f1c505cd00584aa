//! Shared fixtures for the replication scenarios.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};

use copium::api::{AddApplicationRequest, ApplicationForm, EditStatusRequest};
use copium::config::CopiumConfig;
use copium::model::{Application, ApplicationStatus, Owner};
use copium::standalone::Runtime;
use copium::utils::clock::FakeClock;

pub const TOKEN: &str = "token-kim";
/// Noon UTC, 2024-06-01.
pub const APPLIED: i64 = 1_717_243_200;

pub fn owner() -> Owner {
    Owner::new("kim@example.com")
}

pub fn config() -> CopiumConfig {
    let mut config = CopiumConfig::default();
    config.pool.workers = 2;
    config.bus.publish_timeout_secs = 2;
    config.bus.publish_retries = 0;
    config.bus.redelivery_delay_ms = 10;
    config
        .auth
        .tokens
        .insert(TOKEN.to_string(), owner().as_str().to_string());
    config
}

/// Runtime whose clock starts on the morning of the apply date.
pub async fn runtime() -> (Runtime, Arc<FakeClock>) {
    let clock = Arc::new(FakeClock::new(
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap(),
    ));
    let runtime = Runtime::start_with_clock(&config(), clock.clone()).await;
    (runtime, clock)
}

pub fn form(role: &str) -> ApplicationForm {
    ApplicationForm {
        role: role.to_string(),
        company: "Acme".to_string(),
        location: "Remote".to_string(),
        applied_date: APPLIED,
        link: "https://acme.example/jobs".to_string(),
    }
}

pub async fn add(runtime: &Runtime, role: &str) -> Application {
    runtime
        .service()
        .add_application(
            TOKEN,
            AddApplicationRequest {
                form: form(role),
                status: Some("Applied".to_string()),
            },
        )
        .await
        .unwrap()
}

pub async fn set_status(runtime: &Runtime, app: &Application, status: ApplicationStatus) {
    runtime
        .service()
        .edit_status(
            TOKEN,
            EditStatusRequest {
                id: app.id.clone(),
                status: status.as_str().to_string(),
            },
        )
        .await
        .unwrap();
}

/// Wait for both projection consumers to drain.
pub async fn settle(runtime: &Runtime) {
    assert!(
        runtime.wait_idle(Duration::from_secs(5)).await,
        "projections did not settle"
    );
}
