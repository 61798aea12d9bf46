//! End-to-end tests for the click scheduler, driven through `ClickerHandle`
//! against a mock desktop.
//!
//! Most tests run on tokio's paused clock, so timing assertions are exact
//! and long intervals cost nothing.

mod common;

use auto_clicker::config::parse_duration;
use auto_clicker::{
    spawn, ClickKind, ClickLimit, ClickerError, MouseButton, Point, ResolutionError, RunConfig,
    RunEnd, RunState, SchedulerEvent, TargetMode, TickError,
};
use common::{collect_run, drain, MockPlatform};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{sleep, timeout, Instant};

fn fixed(x: i32, y: i32) -> TargetMode {
    TargetMode::FixedPoint(Point::new(x, y))
}

#[tokio::test(start_paused = true)]
async fn test_five_fixed_clicks_complete_on_schedule() {
    let platform = Arc::new(MockPlatform::new());
    let clicker = spawn(platform.clone());
    let mut events = clicker.subscribe();

    let config = RunConfig::new(Duration::from_millis(100))
        .with_kind(ClickKind::Left)
        .with_limit(ClickLimit::Finite(5))
        .with_target(fixed(100, 100));

    let started = Instant::now();
    clicker.start(config).unwrap();
    let log = collect_run(&mut events).await;
    let elapsed = started.elapsed();

    assert_eq!(log.end, Some(RunEnd::Completed));
    assert_eq!(log.clicks.len(), 5);
    assert_eq!(log.reported_clicks, 5);
    assert!(log.clicks.iter().all(|c| c.point == Point::new(100, 100)));
    assert!(
        elapsed >= Duration::from_millis(500) && elapsed <= Duration::from_millis(501),
        "elapsed {:?}",
        elapsed
    );

    // Consecutive clicks sit one interval apart.
    for pair in log.clicks.windows(2) {
        let gap = pair[1].timestamp.duration_since(pair[0].timestamp);
        assert!(
            gap >= Duration::from_millis(100) && gap <= Duration::from_millis(101),
            "gap {:?}",
            gap
        );
    }

    assert_eq!(
        platform.clicks(),
        vec![(Point::new(100, 100), MouseButton::Left); 5]
    );

    let mut status = clicker.status();
    let status = status
        .wait_for(|s| s.state.is_idle() && s.last_end.is_some())
        .await
        .unwrap();
    assert_eq!(status.clicks_done, 5);
}

/// States published until the current run finishes.
async fn collect_states(events: &mut broadcast::Receiver<SchedulerEvent>) -> Vec<RunState> {
    let mut states = Vec::new();
    loop {
        match events.recv().await.unwrap() {
            SchedulerEvent::State(state) => states.push(state),
            SchedulerEvent::RunFinished { .. } => return states,
            _ => {}
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_stop_mid_wait_passes_through_stopping() {
    let clicker = spawn(Arc::new(MockPlatform::new()));
    let mut events = clicker.subscribe();

    clicker
        .start(RunConfig::new(Duration::from_millis(100)).with_limit(ClickLimit::Continuous))
        .unwrap();
    sleep(Duration::from_millis(250)).await;
    clicker.stop().unwrap();

    let states = collect_states(&mut events).await;
    let n = states.len();
    assert!(matches!(
        states[n - 3],
        RunState::Running { clicks_done: 3, .. }
    ));
    assert_eq!(states[n - 2], RunState::Stopping);
    assert_eq!(states[n - 1], RunState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_panic_while_running_passes_through_stopping() {
    let clicker = spawn(Arc::new(MockPlatform::new()));
    let mut events = clicker.subscribe();

    clicker
        .start(RunConfig::new(Duration::from_millis(100)).with_limit(ClickLimit::Continuous))
        .unwrap();
    sleep(Duration::from_millis(50)).await;
    clicker.panic().unwrap();

    let states = collect_states(&mut events).await;
    assert_eq!(&states[states.len() - 2..], &[RunState::Stopping, RunState::Idle]);
}

#[tokio::test(start_paused = true)]
async fn test_countdown_abort_skips_stopping() {
    let clicker = spawn(Arc::new(MockPlatform::new()));
    let mut events = clicker.subscribe();

    clicker
        .start(
            RunConfig::new(Duration::from_millis(100))
                .with_countdown(Duration::from_secs(3)),
        )
        .unwrap();
    sleep(Duration::from_millis(1500)).await;
    clicker.stop().unwrap();

    let states = collect_states(&mut events).await;
    assert_eq!(
        states,
        vec![
            RunState::CountingDown { remaining: 3 },
            RunState::CountingDown { remaining: 2 },
            RunState::Idle,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_completed_run_holds_last_slot() {
    let clicker = spawn(Arc::new(MockPlatform::new()));
    let mut events = clicker.subscribe();

    clicker
        .start(RunConfig::new(Duration::from_millis(100)).with_limit(ClickLimit::Finite(1)))
        .unwrap();
    sleep(Duration::from_millis(50)).await;
    assert!(matches!(
        clicker.status().borrow().state,
        RunState::Running { clicks_done: 1, .. }
    ));

    // A stop inside the trailing slot still lands.
    clicker.stop().unwrap();
    let log = collect_run(&mut events).await;
    assert_eq!(log.end, Some(RunEnd::Stopped));
    assert_eq!(log.reported_clicks, 1);
}

#[tokio::test(start_paused = true)]
async fn test_oversized_durations_rejected_and_scheduler_survives() {
    let clicker = spawn(Arc::new(MockPlatform::new()));
    let mut events = clicker.subscribe();

    let huge_interval = RunConfig::new(parse_duration("18446744073709551615s").unwrap())
        .with_limit(ClickLimit::Continuous);
    assert!(matches!(
        clicker.start(huge_interval),
        Err(ClickerError::ConfigValidation(_))
    ));

    let huge_countdown = RunConfig::new(Duration::from_millis(10))
        .with_countdown(parse_duration("18446744073709551615m").unwrap());
    assert!(matches!(
        clicker.start(huge_countdown),
        Err(ClickerError::ConfigValidation(_))
    ));

    sleep(Duration::from_millis(100)).await;
    assert!(drain(&mut events).is_empty());

    clicker
        .start(RunConfig::new(Duration::from_millis(10)).with_limit(ClickLimit::Finite(2)))
        .unwrap();
    let log = collect_run(&mut events).await;
    assert_eq!(log.end, Some(RunEnd::Completed));
    assert!(clicker.stop().is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_double_left_counts_two_clicks_per_tick() {
    let platform = Arc::new(MockPlatform::new());
    let clicker = spawn(platform.clone());
    let mut events = clicker.subscribe();

    clicker
        .start(
            RunConfig::new(Duration::from_millis(50))
                .with_kind(ClickKind::DoubleLeft)
                .with_limit(ClickLimit::Finite(6))
                .with_target(fixed(10, 20)),
        )
        .unwrap();
    let log = collect_run(&mut events).await;

    assert_eq!(log.clicks.len(), 6);
    assert_eq!(platform.clicks().len(), 6);
    assert!(platform
        .clicks()
        .iter()
        .all(|(_, button)| *button == MouseButton::Left));

    // Each tick yields a pair at the same point, fired back to back.
    for pair in log.clicks.chunks(2) {
        assert_eq!(pair[0].point, pair[1].point);
        assert!(pair[1].timestamp.duration_since(pair[0].timestamp) < Duration::from_millis(1));
    }
}

#[tokio::test(start_paused = true)]
async fn test_double_left_never_exceeds_odd_limit() {
    let platform = Arc::new(MockPlatform::new());
    let clicker = spawn(platform.clone());
    let mut events = clicker.subscribe();

    clicker
        .start(
            RunConfig::new(Duration::from_millis(50))
                .with_kind(ClickKind::DoubleLeft)
                .with_limit(ClickLimit::Finite(5)),
        )
        .unwrap();
    let log = collect_run(&mut events).await;

    assert_eq!(log.end, Some(RunEnd::Completed));
    assert_eq!(log.clicks.len(), 5);
    assert_eq!(platform.clicks().len(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_continuous_runs_until_stopped() {
    let platform = Arc::new(MockPlatform::new());
    let clicker = spawn(platform.clone());
    let mut events = clicker.subscribe();

    clicker
        .start(
            RunConfig::new(Duration::from_millis(100))
                .with_limit(ClickLimit::Continuous)
                .with_target(fixed(1, 1)),
        )
        .unwrap();

    sleep(Duration::from_secs(10)).await;
    let so_far = drain(&mut events);
    assert!(!so_far
        .iter()
        .any(|e| matches!(e, SchedulerEvent::RunFinished { .. })));
    assert!(platform.clicks().len() >= 100);

    clicker.stop().unwrap();
    let log = collect_run(&mut events).await;
    assert_eq!(log.end, Some(RunEnd::Stopped));
}

#[tokio::test(start_paused = true)]
async fn test_panic_during_countdown_clicks_nothing() {
    let platform = Arc::new(MockPlatform::new());
    let clicker = spawn(platform.clone());
    let mut events = clicker.subscribe();

    clicker
        .start(
            RunConfig::new(Duration::from_millis(10))
                .with_countdown(Duration::from_secs(3))
                .with_target(fixed(5, 5)),
        )
        .unwrap();

    sleep(Duration::from_secs(1)).await;
    clicker.panic().unwrap();
    let log = collect_run(&mut events).await;

    assert_eq!(log.end, Some(RunEnd::Panicked));
    assert!(log.clicks.is_empty());
    assert!(platform.clicks().is_empty());

    let mut status = clicker.status();
    let status = status
        .wait_for(|s| s.last_end.is_some())
        .await
        .unwrap();
    assert!(status.state.is_idle());
    assert_eq!(status.clicks_done, 0);
}

#[tokio::test(start_paused = true)]
async fn test_panic_preempts_long_interval() {
    let platform = Arc::new(MockPlatform::new());
    let clicker = spawn(platform.clone());
    let mut events = clicker.subscribe();

    clicker
        .start(
            RunConfig::new(Duration::from_secs(600))
                .with_limit(ClickLimit::Continuous)
                .with_target(fixed(5, 5)),
        )
        .unwrap();

    // Wait for the first click, then panic in the middle of a 10 minute wait.
    while !matches!(events.recv().await.unwrap(), SchedulerEvent::Click(_)) {}
    let panicked_at = Instant::now();
    clicker.panic().unwrap();
    let log = collect_run(&mut events).await;

    assert_eq!(log.end, Some(RunEnd::Panicked));
    assert_eq!(log.reported_clicks, 1);
    assert!(panicked_at.elapsed() < Duration::from_millis(50));
}

#[tokio::test(start_paused = true)]
async fn test_panic_while_idle_is_noop() {
    let platform = Arc::new(MockPlatform::new());
    let clicker = spawn(platform.clone());
    let mut events = clicker.subscribe();

    clicker.panic().unwrap();
    clicker.stop().unwrap();
    sleep(Duration::from_millis(100)).await;
    assert!(drain(&mut events).is_empty());
    assert!(clicker.status().borrow().state.is_idle());

    // The scheduler is still usable afterwards.
    clicker
        .start(RunConfig::new(Duration::from_millis(10)).with_limit(ClickLimit::Finite(2)))
        .unwrap();
    let log = collect_run(&mut events).await;
    assert_eq!(log.end, Some(RunEnd::Completed));
    assert_eq!(log.clicks.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_unsupported_active_window_rejected_at_start() {
    let platform = Arc::new(MockPlatform::without_window_support());
    let clicker = spawn(platform.clone());
    let mut events = clicker.subscribe();

    let result = clicker.start(
        RunConfig::new(Duration::from_millis(10)).with_target(TargetMode::ActiveWindowCenter),
    );

    assert!(matches!(result, Err(ClickerError::UnsupportedTarget { .. })));
    sleep(Duration::from_millis(100)).await;
    assert!(drain(&mut events).is_empty());
    assert!(platform.clicks().is_empty());
    assert!(clicker.status().borrow().state.is_idle());
}

#[tokio::test(start_paused = true)]
async fn test_invalid_config_rejected_synchronously() {
    let clicker = spawn(Arc::new(MockPlatform::new()));
    let mut events = clicker.subscribe();

    let zero_interval = clicker.start(RunConfig::new(Duration::ZERO));
    assert!(matches!(zero_interval, Err(ClickerError::ConfigValidation(_))));

    let zero_count =
        clicker.start(RunConfig::default().with_limit(ClickLimit::Finite(0)));
    assert!(matches!(zero_count, Err(ClickerError::ConfigValidation(_))));

    let far_away = clicker.configure(RunConfig::default().with_target(fixed(50_000, 0)));
    assert!(far_away.is_err());

    sleep(Duration::from_millis(100)).await;
    assert!(drain(&mut events).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_resolution_errors_skip_ticks_and_stop_still_works() {
    let platform = Arc::new(MockPlatform::new());
    platform.set_window(Err(ResolutionError::NoActiveWindow));
    let clicker = spawn(platform.clone());
    let mut events = clicker.subscribe();

    clicker
        .start(
            RunConfig::new(Duration::from_millis(20))
                .with_limit(ClickLimit::Finite(3))
                .with_target(TargetMode::ActiveWindowCenter),
        )
        .unwrap();

    sleep(Duration::from_millis(200)).await;
    clicker.stop().unwrap();
    let log = collect_run(&mut events).await;

    assert_eq!(log.end, Some(RunEnd::Stopped));
    assert!(log.clicks.is_empty());
    assert!(log.skipped.len() >= 5);
    assert!(log
        .skipped
        .iter()
        .all(|e| *e == TickError::Resolution(ResolutionError::NoActiveWindow)));

    let mut status = clicker.status();
    let status = status.wait_for(|s| s.last_end.is_some()).await.unwrap();
    assert!(status.missed_clicks >= 5);
    assert!(status.last_warning.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_active_window_target_is_recomputed_each_tick() {
    let platform = Arc::new(MockPlatform::new());
    let clicker = spawn(platform.clone());
    let mut events = clicker.subscribe();

    clicker
        .start(
            RunConfig::new(Duration::from_millis(100))
                .with_limit(ClickLimit::Finite(2))
                .with_target(TargetMode::ActiveWindowCenter),
        )
        .unwrap();

    while !matches!(events.recv().await.unwrap(), SchedulerEvent::Click(_)) {}
    platform.set_window(Ok(auto_clicker::Rect::new(1000, 0, 200, 200)));
    collect_run(&mut events).await;

    let points: Vec<Point> = platform.clicks().into_iter().map(|(p, _)| p).collect();
    assert_eq!(points, vec![Point::new(400, 300), Point::new(1100, 100)]);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_clicks_are_not_counted() {
    let platform = Arc::new(MockPlatform::new());
    platform.reject_clicks(true);
    let clicker = spawn(platform.clone());
    let mut events = clicker.subscribe();

    clicker
        .start(RunConfig::new(Duration::from_millis(10)).with_limit(ClickLimit::Finite(3)))
        .unwrap();

    // Let a few ticks fail, then unblock input.
    let mut failures = 0;
    while failures < 4 {
        if let SchedulerEvent::TickSkipped(TickError::Execution(_)) = events.recv().await.unwrap() {
            failures += 1;
        }
    }
    platform.reject_clicks(false);
    let log = collect_run(&mut events).await;

    assert_eq!(log.end, Some(RunEnd::Completed));
    assert_eq!(log.clicks.len(), 3);
    assert_eq!(platform.clicks().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_follow_cursor_tracks_live_position() {
    let platform = Arc::new(MockPlatform::new());
    let clicker = spawn(platform.clone());
    let mut events = clicker.subscribe();

    clicker
        .start(RunConfig::new(Duration::from_millis(100)).with_limit(ClickLimit::Finite(2)))
        .unwrap();

    while !matches!(events.recv().await.unwrap(), SchedulerEvent::Click(_)) {}
    platform.move_cursor(Point::new(42, 24));
    let log = collect_run(&mut events).await;

    assert_eq!(log.clicks.len(), 1);
    assert_eq!(log.clicks[0].point, Point::new(42, 24));
    assert_eq!(platform.clicks()[0].0, Point::new(500, 400));
}

#[tokio::test(start_paused = true)]
async fn test_start_while_running_is_ignored() {
    let platform = Arc::new(MockPlatform::new());
    let clicker = spawn(platform.clone());
    let mut events = clicker.subscribe();

    clicker
        .start(
            RunConfig::new(Duration::from_millis(100))
                .with_limit(ClickLimit::Finite(3))
                .with_target(fixed(1, 1)),
        )
        .unwrap();
    clicker
        .start(RunConfig::new(Duration::from_millis(1)).with_limit(ClickLimit::Finite(50)))
        .unwrap();

    let log = collect_run(&mut events).await;
    assert_eq!(log.clicks.len(), 3);
    assert!(log.clicks.iter().all(|c| c.point == Point::new(1, 1)));

    sleep(Duration::from_secs(1)).await;
    assert!(drain(&mut events)
        .iter()
        .all(|e| !matches!(e, SchedulerEvent::RunStarted(_))));
}

#[tokio::test(start_paused = true)]
async fn test_each_start_resets_counters() {
    let platform = Arc::new(MockPlatform::new());
    let clicker = spawn(platform.clone());
    let mut events = clicker.subscribe();
    let mut status = clicker.status();

    clicker
        .start(RunConfig::new(Duration::from_millis(10)).with_limit(ClickLimit::Finite(4)))
        .unwrap();
    collect_run(&mut events).await;
    status
        .wait_for(|s| s.last_end.is_some() && s.clicks_done == 4)
        .await
        .unwrap();

    clicker.start_staged().unwrap();
    let log = collect_run(&mut events).await;
    assert_eq!(log.reported_clicks, 4);

    clicker
        .start(RunConfig::new(Duration::from_millis(10)).with_limit(ClickLimit::Finite(2)))
        .unwrap();
    let log = collect_run(&mut events).await;
    assert_eq!(log.reported_clicks, 2);

    let final_status = status
        .wait_for(|s| s.state.is_idle() && s.clicks_done == 2)
        .await
        .unwrap();
    assert_eq!(final_status.last_end, Some(RunEnd::Completed));
}

#[tokio::test(start_paused = true)]
async fn test_pick_reads_cursor_without_touching_scheduler() {
    let platform = Arc::new(MockPlatform::new());
    let clicker = spawn(platform.clone());
    let mut events = clicker.subscribe();

    platform.move_cursor(Point::new(-300, 77));
    assert_eq!(clicker.pick_current_position().unwrap(), Point::new(-300, 77));

    sleep(Duration::from_millis(50)).await;
    assert!(drain(&mut events).is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_slow_clicks_do_not_accumulate_drift() {
    let interval = Duration::from_millis(20);
    let work = Duration::from_millis(8);
    let ticks = 26u64;

    let platform = Arc::new(MockPlatform::with_click_latency(work));
    let clicker = spawn(platform.clone());
    let mut events = clicker.subscribe();

    clicker
        .start(
            RunConfig::new(interval)
                .with_limit(ClickLimit::Finite(ticks))
                .with_target(fixed(3, 3)),
        )
        .unwrap();
    let log = timeout(Duration::from_secs(10), collect_run(&mut events))
        .await
        .expect("run did not finish");

    assert_eq!(log.clicks.len() as u64, ticks);
    let first = log.clicks[0].timestamp;
    let last = log.clicks[log.clicks.len() - 1].timestamp;
    let mean = (last - first) / (ticks as u32 - 1);

    // Compounding drift would push the mean period towards interval + work.
    assert!(mean >= Duration::from_millis(19), "mean period {:?}", mean);
    assert!(mean < interval + work / 2, "mean period {:?}", mean);
}
