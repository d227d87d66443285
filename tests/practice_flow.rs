use std::{sync::Arc, time::Duration};

use nyra_lib::{
    auth::Gated,
    breathing::MutedCues,
    events::{ChannelSink, UiEvent},
    feedback::ChannelTransport,
    practice::{PracticeOptions, PracticeView},
    settings::TimingSettings,
    AppState,
};
use serde_json::json;
use tempfile::TempDir;
use tokio::time;

fn quick_options() -> PracticeOptions {
    let timing = TimingSettings {
        hold_tick_ms: 20,
        min_recorded_practice_secs: 0,
        ..TimingSettings::default()
    };
    PracticeOptions {
        required_hold_secs: Some(0.3),
        ..PracticeOptions::new(timing, Arc::new(MutedCues))
    }
}

#[tokio::test]
async fn signed_in_practice_feeds_the_dashboard() {
    let dir = TempDir::new().unwrap();
    let (sink, mut events) = ChannelSink::new();
    let state = AppState::open(dir.path(), Arc::new(sink)).unwrap();
    let subscription = state.sessions.start().unwrap();
    assert!(!state.sessions.wait_ready().await.is_signed_in());

    assert!(matches!(
        state.dashboard("vrksana").await,
        Gated::SignInRequired
    ));

    let user = state
        .sessions
        .sign_up("Asha", "asha@example.com", "lotus123")
        .await
        .unwrap();

    let view = PracticeView::open(
        Some("vrksana"),
        &state.api,
        state.db.clone(),
        Some(user.user_id.clone()),
        quick_options(),
        state.events.clone(),
    )
    .await
    .unwrap();

    let (transport, mut detector) = ChannelTransport::pair();
    assert!(view.enable_camera(transport).await.unwrap());
    assert_eq!(
        detector.received.recv().await.as_deref(),
        Some(r#"{"pose":"vrksana"}"#)
    );

    detector.send_json(json!({"is_correct_pose": true, "accuracy": 92.0}));
    detector.frames.send("not json".into()).unwrap();
    time::sleep(Duration::from_millis(600)).await;
    assert!(view.meter().await.completed);

    // the detector goes away on its own
    drop(detector);
    time::sleep(Duration::from_millis(50)).await;
    assert!(!view.feedback_connected().await);

    let summary = view.teardown().await.unwrap().unwrap();
    assert!(summary.completed);
    assert!(summary.recorded_time);

    let run = state
        .db
        .get_practice_run(summary.run_id.as_deref().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(run.user_id.as_deref(), Some(user.user_id.as_str()));

    let dashboard = match state.dashboard("vrksana").await {
        Gated::Allowed(dashboard) => dashboard,
        Gated::SignInRequired => panic!("user should be signed in"),
    };
    assert_eq!(dashboard.attempts, 1);
    assert_eq!(dashboard.completions, 1);
    assert_eq!(dashboard.best_accuracy_percent, 92);
    assert_eq!(dashboard.completion_rate, 100);
    assert!(!dashboard.sample_data);
    assert!(!dashboard.accuracy_measured);

    let mut saw_toast = false;
    let mut saw_completion = false;
    while let Ok(event) = events.try_recv() {
        match event {
            UiEvent::Toast { title, .. } => saw_toast |= title == "Pose Completed!",
            UiEvent::PoseCompleted { pose } => saw_completion |= pose == "vrksana",
            _ => {}
        }
    }
    assert!(saw_toast);
    assert!(saw_completion);

    subscription.dispose().await.unwrap();
}

#[tokio::test]
async fn unknown_pose_without_history_uses_sample_analytics() {
    let dir = TempDir::new().unwrap();
    let (sink, _events) = ChannelSink::new();
    let state = AppState::open(dir.path(), Arc::new(sink)).unwrap();
    let subscription = state.sessions.start().unwrap();
    state.sessions.wait_ready().await;
    state
        .sessions
        .sign_up("Ravi", "ravi@example.com", "mountain1")
        .await
        .unwrap();

    let Gated::Allowed(dashboard) = state.dashboard("tadasan").await else {
        panic!("user should be signed in");
    };
    assert!(dashboard.sample_data);
    assert_eq!(dashboard.overall_accuracy, 73);
    assert_eq!(dashboard.limbs.len(), 4);

    subscription.dispose().await.unwrap();
}
