//! Integration tests for the streaming engine: dedup, independence, fast
//! path, kill propagation and timeout bounds.

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use assert_matches::assert_matches;
use cactustv::config::Config;
use cactustv_common::{AccelerationMode, Error, PlaybackSettingsPatch};
use common::{eventually, id, Behavior, TestHarness};

#[tokio::test]
async fn concurrent_requests_share_one_process() {
    let h = Arc::new(TestHarness::new());

    let calls: Vec<_> = (0..8)
        .map(|_| {
            let h = h.clone();
            tokio::spawn(async move { h.service().prepare_stream(&id("m1"), "1080p").await })
        })
        .collect();

    for call in calls {
        let path = call.await.unwrap().unwrap();
        assert_eq!(path, "/api/play/m1/1080p/index.m3u8");
    }
    assert_eq!(h.supervisor.starts(), 1);
}

#[tokio::test]
async fn two_callers_within_100ms_get_the_same_stream() {
    let h = Arc::new(TestHarness::with_behavior(Behavior::Produce(
        Duration::from_millis(300),
    )));

    let first = {
        let h = h.clone();
        tokio::spawn(async move { h.service().prepare_stream(&id("m1"), "1080p").await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    let second = h.service().prepare_stream(&id("m1"), "1080p").await.unwrap();
    let first = first.await.unwrap().unwrap();

    assert_eq!(first, second);
    assert_eq!(h.supervisor.starts(), 1);
}

#[tokio::test]
async fn qualities_are_independent() {
    let h = Arc::new(TestHarness::with_behavior(Behavior::Stall));

    // A stalled 1080p session must not hold up 720p.
    let stalled = {
        let h = h.clone();
        tokio::spawn(async move { h.service().prepare_stream(&id("m1"), "1080p").await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    h.supervisor
        .set_behavior(Behavior::Produce(Duration::from_millis(20)));
    let started = Instant::now();
    let path = h.service().prepare_stream(&id("m1"), "720p").await.unwrap();
    assert_eq!(path, "/api/play/m1/720p/index.m3u8");
    assert!(started.elapsed() < Duration::from_secs(1));

    assert_eq!(h.supervisor.starts(), 2);
    assert_eq!(h.service().active_sessions().len(), 2);

    h.service().kill_stream(&id("m1")).await.unwrap();
    assert_matches!(stalled.await.unwrap(), Err(Error::EncodeFailed { .. }));
}

#[tokio::test]
async fn ready_manifest_takes_the_fast_path() {
    let h = TestHarness::new();
    h.service().prepare_stream(&id("m1"), "480p").await.unwrap();
    assert!(h.manifest("m1", "480p").exists());

    for _ in 0..5 {
        let path = h.service().prepare_stream(&id("m1"), "480p").await.unwrap();
        assert_eq!(path, "/api/play/m1/480p/index.m3u8");
    }
    assert_eq!(h.supervisor.starts(), 1);
}

#[tokio::test]
async fn kill_stream_terminates_all_qualities_and_reclaims() {
    let h = TestHarness::new();
    h.service().prepare_stream(&id("m1"), "720p").await.unwrap();
    h.service().prepare_stream(&id("m1"), "1080p").await.unwrap();
    h.service().prepare_stream(&id("m2"), "720p").await.unwrap();
    assert_eq!(h.service().active_sessions().len(), 3);
    assert!(h.media_dir("m1").exists());

    h.service().kill_stream(&id("m1")).await.unwrap();

    assert_eq!(h.supervisor.kills(), 2);
    let remaining = h.service().active_sessions();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].media_id.as_str(), "m2");
    assert!(!h.media_dir("m1").exists());
    assert!(h.media_dir("m2").exists());
}

#[tokio::test]
async fn kill_stream_without_sessions_still_reclaims() {
    let h = TestHarness::new();
    let stale = h.media_dir("m1").join("720p");
    std::fs::create_dir_all(&stale).unwrap();
    std::fs::write(stale.join("seg_000.ts"), b"old").unwrap();

    h.service().kill_stream(&id("m1")).await.unwrap();
    assert!(!h.media_dir("m1").exists());
    assert_eq!(h.supervisor.kills(), 0);
}

#[tokio::test]
async fn kill_releases_joined_waiters() {
    let h = Arc::new(TestHarness::with_behavior(Behavior::Stall));

    let waiters: Vec<_> = (0..3)
        .map(|_| {
            let h = h.clone();
            tokio::spawn(async move { h.service().prepare_stream(&id("m1"), "720p").await })
        })
        .collect();

    assert!(eventually(Duration::from_secs(1), || !h.service().active_sessions().is_empty()).await);
    // Let the other callers join before killing.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let _reclaim = h.service().kill_stream(&id("m1"));

    for w in waiters {
        let result = tokio::time::timeout(Duration::from_secs(1), w)
            .await
            .expect("waiter hung after kill")
            .unwrap();
        assert_matches!(result, Err(Error::EncodeFailed { .. }));
    }
    assert_eq!(h.supervisor.starts(), 1);
}

#[tokio::test]
async fn wait_is_bounded_by_the_ready_timeout() {
    let mut config = Config::default();
    config.streaming.ready_timeout_secs = 1;
    config.streaming.poll_interval_ms = 20;
    let h = TestHarness::with_config(config, Behavior::Stall);

    let started = Instant::now();
    let err = h
        .service()
        .prepare_stream(&id("m1"), "720p")
        .await
        .unwrap_err();
    let elapsed = started.elapsed();

    assert_matches!(err, Error::Timeout { secs: 1, .. });
    assert!(elapsed >= Duration::from_secs(1));
    assert!(elapsed < Duration::from_millis(1500));

    // Left running for a later request to join.
    assert_eq!(h.service().active_sessions().len(), 1);
    assert_eq!(h.supervisor.kills(), 0);
}

#[tokio::test]
async fn timed_out_session_can_be_joined_later() {
    let mut config = Config::default();
    config.streaming.ready_timeout_secs = 1;
    config.streaming.poll_interval_ms = 20;
    let h = TestHarness::with_config(config, Behavior::Produce(Duration::from_millis(1300)));

    let err = h
        .service()
        .prepare_stream(&id("m1"), "720p")
        .await
        .unwrap_err();
    assert_matches!(err, Error::Timeout { .. });

    h.service().prepare_stream(&id("m1"), "720p").await.unwrap();
    assert_eq!(h.supervisor.starts(), 1);
}

#[tokio::test]
async fn kill_on_timeout_stops_the_session() {
    let mut config = Config::default();
    config.streaming.ready_timeout_secs = 1;
    config.streaming.poll_interval_ms = 20;
    config.streaming.kill_on_timeout = true;
    let h = TestHarness::with_config(config, Behavior::Stall);

    let err = h
        .service()
        .prepare_stream(&id("m1"), "720p")
        .await
        .unwrap_err();
    assert_matches!(err, Error::Timeout { .. });
    assert_eq!(h.supervisor.kills(), 1);
    assert!(h.service().active_sessions().is_empty());
}

#[tokio::test]
async fn encode_failure_reaches_every_waiter_and_is_not_retried() {
    let h = Arc::new(TestHarness::with_behavior(Behavior::Fail));

    let calls: Vec<_> = (0..4)
        .map(|_| {
            let h = h.clone();
            tokio::spawn(async move { h.service().prepare_stream(&id("m2"), "360p").await })
        })
        .collect();
    for call in calls {
        assert_matches!(call.await.unwrap(), Err(Error::EncodeFailed { .. }));
    }
    assert!(eventually(Duration::from_secs(1), || h.service().active_sessions().is_empty()).await);

    let starts = h.supervisor.starts();
    assert!(starts >= 1);

    // A fresh request is a fresh attempt.
    h.supervisor
        .set_behavior(Behavior::Produce(Duration::from_millis(10)));
    h.service().prepare_stream(&id("m2"), "360p").await.unwrap();
    assert_eq!(h.supervisor.starts(), starts + 1);
}

#[tokio::test]
async fn unknown_media_starts_nothing() {
    let h = TestHarness::new();
    let err = h
        .service()
        .prepare_stream(&id("missing"), "720p")
        .await
        .unwrap_err();
    assert_matches!(err, Error::NotFound { .. });
    assert_eq!(h.supervisor.starts(), 0);
    assert!(!h.media_dir("missing").exists());
}

#[tokio::test]
async fn hardware_mode_requires_both_toggles() {
    let mut config = Config::default();
    config.streaming.hwaccel = AccelerationMode::Cuda;
    let h = TestHarness::with_config(config, Behavior::Produce(Duration::from_millis(10)));

    h.service().prepare_stream(&id("m1"), "720p").await.unwrap();

    h.ctx.settings.update(PlaybackSettingsPatch {
        transcoding_enabled: None,
        hardware_acceleration: Some(true),
    });
    h.service().prepare_stream(&id("m1"), "1080p").await.unwrap();

    h.ctx.settings.update(PlaybackSettingsPatch {
        transcoding_enabled: Some(false),
        hardware_acceleration: None,
    });
    h.service().prepare_stream(&id("m1"), "480p").await.unwrap();

    assert_eq!(
        h.supervisor.modes(),
        vec![
            AccelerationMode::Cpu,
            AccelerationMode::Cuda,
            AccelerationMode::Cpu
        ]
    );
}

#[tokio::test]
async fn restart_discards_previous_output() {
    let h = TestHarness::new();
    h.service().prepare_stream(&id("m1"), "720p").await.unwrap();
    h.service().shutdown().await;

    h.service().store().reset_all().await.unwrap();
    assert!(!h.media_dir("m1").exists());

    // No stale fast path after a reset.
    h.service().prepare_stream(&id("m1"), "720p").await.unwrap();
    assert_eq!(h.supervisor.starts(), 2);
}

#[tokio::test]
async fn restart_after_kill_waits_for_the_old_encoder() {
    let h = TestHarness::new();
    h.supervisor.set_exit_delay(Duration::from_millis(200));
    h.service().prepare_stream(&id("m1"), "720p").await.unwrap();

    let reclaim = h.service().kill_stream(&id("m1"));
    assert!(h.service().active_sessions().is_empty());

    // Held until the old encoder has exited and its directory is gone.
    h.service().prepare_stream(&id("m1"), "720p").await.unwrap();
    reclaim.await.unwrap();

    assert_eq!(h.supervisor.starts(), 2);
    assert_eq!(h.supervisor.max_live(), 1);
    assert!(h.manifest("m1", "720p").exists());
    assert!(!h.media_dir("m1").join("720p").join("seg_999.ts").exists());
    assert_eq!(h.service().active_sessions().len(), 1);
}

#[tokio::test]
async fn killed_session_is_not_joined_while_exiting() {
    let h = Arc::new(TestHarness::with_behavior(Behavior::Stall));
    h.supervisor.set_exit_delay(Duration::from_millis(150));

    let waiter = {
        let h = h.clone();
        tokio::spawn(async move { h.service().prepare_stream(&id("m1"), "720p").await })
    };
    assert!(eventually(Duration::from_secs(1), || !h.service().active_sessions().is_empty()).await);

    let _reclaim = h.service().kill_stream(&id("m1"));
    h.supervisor.set_behavior(Behavior::Produce(Duration::from_millis(10)));

    // Arrives while the killed encoder is still exiting.
    let started = Instant::now();
    h.service().prepare_stream(&id("m1"), "720p").await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(100));

    assert_matches!(waiter.await.unwrap(), Err(Error::EncodeFailed { .. }));
    assert_eq!(h.supervisor.starts(), 2);
    assert_eq!(h.supervisor.max_live(), 1);
}

#[tokio::test]
async fn prepared_stream_survives_catalog_outage() {
    let h = TestHarness::new();
    h.service().prepare_stream(&id("m1"), "720p").await.unwrap();

    h.catalog.remove(&id("m1"));

    let path = h.service().prepare_stream(&id("m1"), "720p").await.unwrap();
    assert_eq!(path, "/api/play/m1/720p/index.m3u8");
    assert_eq!(h.supervisor.starts(), 1);

    // Without a manifest the lookup still decides.
    let err = h.service().prepare_stream(&id("m1"), "1080p").await.unwrap_err();
    assert_matches!(err, Error::NotFound { .. });
}
