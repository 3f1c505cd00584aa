//! Dispatch pool shutdown under load.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use copium::config::PoolConfig;
use copium::dispatch::{DispatchPool, JobHandler};

struct SlowCounter {
    seen: Mutex<HashMap<usize, usize>>,
}

#[async_trait]
impl JobHandler<usize> for SlowCounter {
    type Error = std::convert::Infallible;

    async fn handle(&self, job: usize) -> Result<(), Self::Error> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        *self.seen.lock().await.entry(job).or_insert(0) += 1;
        Ok(())
    }
}

#[tokio::test]
async fn test_two_workers_process_five_jobs_once_then_stop() {
    let handler = Arc::new(SlowCounter {
        seen: Mutex::new(HashMap::new()),
    });
    let pool = DispatchPool::start(
        "scenario",
        &PoolConfig {
            workers: 2,
            queue_capacity: 8,
        },
        handler.clone(),
    );

    for job in 0..5 {
        pool.submit(job).await.unwrap();
    }
    for _ in 0..100 {
        if pool.stats().processed() == 5 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    tokio::time::timeout(Duration::from_secs(1), pool.stop())
        .await
        .expect("stop returned");

    let seen = handler.seen.lock().await;
    assert_eq!(seen.len(), 5);
    assert!(seen.values().all(|&count| count == 1));
    assert_eq!(pool.stats().processed(), 5);
    assert_eq!(pool.stats().active_workers(), 0);
}
