mod common;

use std::time::Duration;

use common::fake_api::FIRST_CREATED_ID;
use common::{ExportBuilder, TestHarness};

use metrika_export::config::ScheduleConfig;
use metrika_export::{LogProcessStatus, Scheduler};

fn fast_schedule() -> ScheduleConfig {
    ScheduleConfig {
        create_interval_secs: 3600,
        refresh_interval_secs: 1,
        process_interval_secs: 1,
    }
}

#[tokio::test]
async fn test_routines_run_immediately_and_stop() {
    let h = TestHarness::new().await;
    let scheduler = Scheduler::new(h.exporter.clone(), fast_schedule());

    let handles = scheduler.start();
    tokio::time::sleep(Duration::from_millis(200)).await;
    scheduler.stop();

    for handle in handles {
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("routine did not stop")
            .expect("routine panicked");
    }

    // The create routine fired on its first tick, and only once.
    assert_eq!(h.api.created().len(), 1);
    assert_eq!(
        h.store().list_log_processes().await.unwrap()[0].request_id,
        FIRST_CREATED_ID
    );
}

#[tokio::test]
async fn test_scheduler_drives_export_to_completion() {
    let h = TestHarness::new().await;
    h.exporter.create_tick().await.unwrap();
    let id = FIRST_CREATED_ID;
    h.api.set_part(
        id,
        0,
        ExportBuilder::new()
            .hit(&[1], "hash-a", "2024-12-11 10:00:00", "w1", Some("S1"))
            .build(),
    );
    h.api.set_status(id, LogProcessStatus::Processed, 1);

    let scheduler = Scheduler::new(h.exporter.clone(), fast_schedule());
    let handles = scheduler.start();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while h.process(id).await.status != LogProcessStatus::CleanedByUser {
        assert!(
            tokio::time::Instant::now() < deadline,
            "export did not finish in time"
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    scheduler.stop();
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(h.store().count_exported_events().await.unwrap(), 1);
    assert_eq!(h.api.cleaned(), vec![id]);
}

#[tokio::test]
async fn test_stop_before_start_is_harmless() {
    let h = TestHarness::new().await;
    let scheduler = Scheduler::new(h.exporter.clone(), fast_schedule());
    scheduler.stop();

    let handles = scheduler.start();
    for handle in handles {
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("routine did not stop")
            .unwrap();
    }
    // Stopped before the first tick could run anything.
    assert!(h.api.created().is_empty());
}
