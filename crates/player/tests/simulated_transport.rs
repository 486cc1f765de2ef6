use std::time::Duration;

use lesson_player::{
    PlaybackMode, PlayerCall, PlayerConfig, PlayerError, PlayerFactory, PlayerHandle, PlayerState,
    SimulatedMedia, SimulatedPlayerFactory,
};

fn factory() -> SimulatedPlayerFactory {
    SimulatedPlayerFactory::new(
        SimulatedMedia::new(10.0)
            .with_startup_delay(Duration::from_millis(200))
            .with_metadata_delay(Duration::from_millis(500)),
    )
}

#[tokio::test(start_paused = true)]
async fn reads_fail_until_startup_delay_elapses() {
    let factory = factory();
    let handle = factory
        .create(&PlayerConfig::new("lesson-1", PlaybackMode::Video))
        .expect("create should succeed");

    assert_eq!(handle.current_time().await, Err(PlayerError::NotReady));

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(handle.current_time().await, Ok(0.0));
    assert_eq!(handle.duration().await, Err(PlayerError::NotReady));

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(handle.duration().await, Ok(10.0));
}

#[tokio::test(start_paused = true)]
async fn position_advances_while_playing_and_ends_at_duration() {
    let factory = SimulatedPlayerFactory::new(SimulatedMedia::new(3.0));
    let handle = factory
        .create(&PlayerConfig::new("lesson-1", PlaybackMode::Audio))
        .expect("create should succeed");

    handle.cue("lesson-1").await.expect("cue");
    handle.play().await.expect("play");
    tokio::time::sleep(Duration::from_millis(1_500)).await;

    let position = handle.current_time().await.expect("position");
    assert!((position - 1.5).abs() < 1e-6);
    assert_eq!(handle.player_state().await, Ok(PlayerState::Playing));

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(handle.current_time().await, Ok(3.0));
    assert_eq!(handle.player_state().await, Ok(PlayerState::Ended));
}

#[tokio::test(start_paused = true)]
async fn seek_pause_and_release_are_recorded_in_order() {
    let factory = SimulatedPlayerFactory::new(SimulatedMedia::new(30.0));
    let handle = factory
        .create(&PlayerConfig::new("lesson-2", PlaybackMode::Video))
        .expect("create should succeed");

    handle.seek_to(12.5, true).await.expect("seek");
    handle.pause().await.expect("pause");
    handle.release().await;

    let player = factory.latest().expect("player should be tracked");
    assert_eq!(
        player.calls(),
        vec![
            PlayerCall::SeekTo {
                seconds: 12.5,
                allow_seek_ahead: true
            },
            PlayerCall::Pause,
            PlayerCall::Release,
        ]
    );
    assert_eq!(handle.current_time().await, Err(PlayerError::Released));
}

#[tokio::test(start_paused = true)]
async fn slow_seek_keeps_old_position_until_it_lands() {
    let factory = SimulatedPlayerFactory::new(
        SimulatedMedia::new(30.0).with_seek_latency(Duration::from_millis(50)),
    );
    let handle = factory
        .create(&PlayerConfig::new("lesson-3", PlaybackMode::Audio))
        .expect("create should succeed");

    let seeking = tokio::spawn({
        let handle = handle.clone();
        async move { handle.seek_to(8.0, true).await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(handle.current_time().await, Ok(0.0));

    seeking
        .await
        .expect("seek task")
        .expect("seek should succeed");
    assert_eq!(handle.current_time().await, Ok(8.0));
}

#[test]
fn failing_create_reports_reason_once() {
    let factory = SimulatedPlayerFactory::new(SimulatedMedia::new(5.0));
    factory.fail_next_create("iframe blocked");

    let Err(error) = factory.create(&PlayerConfig::new("x", PlaybackMode::Video)) else {
        panic!("first create should fail");
    };
    assert_eq!(error.to_string(), "failed to create player: iframe blocked");
    assert!(factory
        .create(&PlayerConfig::new("x", PlaybackMode::Video))
        .is_ok());
    assert_eq!(factory.players().len(), 1);
}
