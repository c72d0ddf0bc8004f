use std::sync::Arc;
use std::time::Duration;

use services::{FailingTag, RecordingSink, RecordingTag, SimulatedSession, Transport, VideoPlayer};
use watch_core::TrackerPhase;
use watch_core::model::{LifecycleSignal, PlayerState, PropertyValue, SessionSettingsDraft};
use watch_core::time::manual_test_clock;

async fn recorded_session(duration: f64) -> (SimulatedSession, Arc<RecordingSink>) {
    let tag = RecordingTag::new();
    let transport = Arc::new(Transport::new(None));
    transport.initialize(&tag).await;
    let settings = SessionSettingsDraft::new("dQw4w9WgXcQ", "pilot")
        .validate()
        .unwrap();
    (
        SimulatedSession::new(settings, transport, duration, manual_test_clock()),
        tag.sink(),
    )
}

#[tokio::test]
async fn full_watch_with_one_pause() {
    let (mut session, sink) = recorded_session(100.0).await;
    session.ready();
    session.tap_to_start();
    assert_eq!(session.player().state(), PlayerState::Playing);

    session.run_for(Duration::from_secs(30));
    session.player().pause();
    session.pump();
    session.player().play();
    session.pump();
    session.run_for(Duration::from_secs(50));
    session.player().finish();
    session.pump();
    session.leave(LifecycleSignal::Unload);

    let tracker = session.tracker();
    assert_eq!(tracker.total_watched_secs(), 100.0);
    assert_eq!(tracker.play_epochs(), 2);
    assert_eq!(tracker.milestones().len(), 4);

    let progress: Vec<_> = sink
        .named("video_progress")
        .iter()
        .filter_map(|event| event.get("milestone_percent").cloned())
        .collect();
    assert_eq!(
        progress,
        vec![
            PropertyValue::Int(25),
            PropertyValue::Int(50),
            PropertyValue::Int(75),
            PropertyValue::Int(100),
        ]
    );

    let summaries = sink.named("video_session_complete");
    assert_eq!(summaries.len(), 1);
    let summary = &summaries[0];
    assert_eq!(summary.get("completion_rate_percent"), Some(&PropertyValue::Float(100.0)));
    assert_eq!(summary.get("total_watch_seconds"), Some(&PropertyValue::Float(100.0)));
    assert_eq!(summary.get("play_count"), Some(&PropertyValue::Int(2)));
    assert_eq!(summary.get("completion_count"), Some(&PropertyValue::Int(1)));
    assert_eq!(
        summary.get("exit_signal"),
        Some(&PropertyValue::Text("unload".into()))
    );
}

#[tokio::test]
async fn page_exit_signals_finalize_once() {
    let (mut session, sink) = recorded_session(60.0).await;
    session.ready();
    session.tap_to_start();
    session.run_for(Duration::from_secs(10));

    session.leave(LifecycleSignal::VisibilityHidden);
    session.leave(LifecycleSignal::PageHide);
    session.leave(LifecycleSignal::Unload);

    let summaries = sink.named("video_session_complete");
    assert_eq!(summaries.len(), 1);
    assert_eq!(
        summaries[0].get("exit_signal"),
        Some(&PropertyValue::Text("visibility_hidden".into()))
    );
    assert_eq!(summaries[0].get("total_watch_seconds"), Some(&PropertyValue::Float(10.0)));
    assert_eq!(session.tracker().phase(), TrackerPhase::Finalized);
}

#[tokio::test]
async fn autoplay_before_start_is_held_back() {
    let (mut session, sink) = recorded_session(60.0).await;
    session.ready();

    session.player().play();
    session.pump();
    session.run_for(Duration::from_secs(5));

    assert_eq!(session.player().state(), PlayerState::Paused);
    assert_eq!(session.tracker().phase(), TrackerPhase::ReadyUnarmed);
    assert_eq!(session.tracker().play_epochs(), 0);
    assert!(sink.named("video_progress").is_empty());
    assert!(sink.named("video_play").is_empty());
    assert!(sink.named("video_pause").is_empty());
}

#[tokio::test]
async fn tap_before_player_ready_starts_on_ready() {
    let (mut session, _sink) = recorded_session(60.0).await;
    session.tap_to_start();
    assert_eq!(session.tracker().phase(), TrackerPhase::Idle);

    session.ready();
    assert_eq!(session.tracker().phase(), TrackerPhase::Armed);
    assert_eq!(session.player().state(), PlayerState::Playing);

    session.run_for(Duration::from_secs(1));
    assert!(!session.player().is_muted());
}

#[tokio::test]
async fn backward_seek_does_not_add_watch_time() {
    let (mut session, _sink) = recorded_session(100.0).await;
    session.ready();
    session.player().seek(40.0);
    session.tap_to_start();
    session.run_for(Duration::from_secs(1));

    session.player().seek(10.0);
    session.player().pause();
    session.pump();

    let tracker = session.tracker();
    assert_eq!(tracker.total_watched_secs(), 0.0);
    assert_eq!(tracker.max_progress_secs(), 41.0);
}

#[tokio::test]
async fn poll_stops_while_paused() {
    let (mut session, _sink) = recorded_session(100.0).await;
    session.ready();
    session.tap_to_start();
    session.run_for(Duration::from_secs(2));

    session.player().pause();
    session.pump();
    session.run_for(Duration::from_secs(1));

    assert!(!session.tracker().poll_active());
    assert_eq!(session.scheduler().pending(), 0);
}

#[tokio::test]
async fn failed_tag_keeps_accounting() {
    let tag = FailingTag::new();
    let transport = Arc::new(Transport::new(None));
    transport.initialize(&tag).await;
    assert!(!transport.is_ready());

    let settings = SessionSettingsDraft::new("vid", "study").validate().unwrap();
    let mut session = SimulatedSession::new(settings, transport, 40.0, manual_test_clock());
    session.ready();
    session.tap_to_start();
    session.run_for(Duration::from_secs(20));
    session.leave(LifecycleSignal::PageHide);

    let tracker = session.into_tracker();
    assert!(tracker.is_finalized());
    assert_eq!(tracker.total_watched_secs(), 20.0);
    assert_eq!(tracker.milestones().len(), 2);
    assert_eq!(tag.attempts(), 1);
}
