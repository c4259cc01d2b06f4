//! Integration tests for the playback scheduler.

mod common;

use std::thread;
use std::time::{Duration, Instant};

use common::{count, started, Harness, PlayerEvent};
use syncplay_core::engine::EngineOp;
use syncplay_types::{Command, EngineState, PlayCommand, PlaybackState};

const WAIT: Duration = Duration::from_secs(2);

fn play(name: &str) -> PlayCommand {
    PlayCommand::new(name, 1_700_000_000_000_000_000)
}

#[test]
fn play_starts_after_calibration_delay() {
    let h = Harness::new(200, &["a.mp3"]);
    let sent = Instant::now();
    h.scheduler.on_play(play("a.mp3"));

    let preparing = h.wait_for(WAIT, |e| matches!(e, PlayerEvent::Preparing(..)));
    assert_eq!(preparing, Some(PlayerEvent::Preparing("a.mp3".into(), 200)));
    assert_eq!(h.scheduler.state(), PlaybackState::Scheduled);
    assert_eq!(h.engine.play_count(), 0);

    let started = h.wait_for(WAIT, |e| matches!(e, PlayerEvent::Started(_)));
    assert_eq!(started, Some(PlayerEvent::Started("a.mp3".into())));
    assert!(sent.elapsed() >= Duration::from_millis(200));
    assert_eq!(h.scheduler.state(), PlaybackState::Playing);
    assert_eq!(h.scheduler.current_track().as_deref(), Some("a.mp3"));

    assert_eq!(
        h.engine.operations(),
        vec![
            EngineOp::SetVolume(1.0),
            EngineOp::Stop,
            EngineOp::ClearMedia,
            EngineOp::Load("a.mp3".into()),
            EngineOp::Pause,
            EngineOp::Play,
        ]
    );
}

#[test]
fn second_play_supersedes_pending_start() {
    let h = Harness::new(150, &["f1.mp3", "f2.mp3"]);
    h.scheduler.on_play(play("f1.mp3"));
    h.scheduler.on_play(play("f2.mp3"));

    let events = h.collect_for(Duration::from_millis(600));
    assert_eq!(started(&events), vec!["f2.mp3".to_string()]);
    assert_eq!(h.engine.play_count(), 1);
    assert_eq!(h.engine.loaded(), vec!["f1.mp3".to_string(), "f2.mp3".to_string()]);
    assert_eq!(h.scheduler.current_track().as_deref(), Some("f2.mp3"));
}

#[test]
fn stop_cancels_pending_start() {
    let h = Harness::new(150, &["a.mp3"]);
    h.scheduler.on_play(play("a.mp3"));
    h.scheduler.on_stop();

    let events = h.collect_for(Duration::from_millis(500));
    assert!(started(&events).is_empty());
    assert_eq!(count(&events, &PlayerEvent::Stopped), 1);
    assert_eq!(h.engine.play_count(), 0);
    assert_eq!(h.scheduler.state(), PlaybackState::Idle);
    assert!(h.scheduler.current_track().is_none());

    let ops = h.engine.operations();
    assert_eq!(&ops[ops.len() - 2..], &[EngineOp::Stop, EngineOp::ClearMedia]);
}

#[test]
fn stop_while_idle_still_reports_stopped() {
    let h = Harness::new(0, &[]);
    h.scheduler.on_stop();
    h.scheduler.on_stop();

    let events = h.collect_for(Duration::from_millis(300));
    assert_eq!(count(&events, &PlayerEvent::Stopped), 2);
    assert_eq!(h.scheduler.state(), PlaybackState::Idle);
}

#[test]
fn stop_after_start_halts_engine() {
    let h = Harness::new(0, &["a.mp3"]);
    h.scheduler.on_play(play("a.mp3"));
    assert!(h.wait_for(WAIT, |e| matches!(e, PlayerEvent::Started(_))).is_some());

    h.engine.clear();
    h.scheduler.on_stop();
    assert_eq!(h.wait_for(WAIT, |e| *e == PlayerEvent::Stopped), Some(PlayerEvent::Stopped));
    assert_eq!(h.engine.operations(), vec![EngineOp::Stop, EngineOp::ClearMedia]);
    assert_eq!(h.scheduler.state(), PlaybackState::Idle);
}

#[test]
fn missing_file_keeps_earlier_schedule() {
    let h = Harness::new(150, &["a.mp3"]);
    h.scheduler.on_play(play("a.mp3"));
    h.scheduler.on_play(play("nope.mp3"));

    let events = h.collect_for(Duration::from_millis(600));
    assert!(events.contains(&PlayerEvent::Error("File not found: nope.mp3".into())));
    assert_eq!(started(&events), vec!["a.mp3".to_string()]);
    assert_eq!(h.engine.loaded(), vec!["a.mp3".to_string()]);
}

#[test]
fn missing_file_while_idle_leaves_engine_alone() {
    let h = Harness::new(0, &[]);
    h.scheduler.on_play(play("nope.mp3"));

    let err = h.wait_for(WAIT, |e| matches!(e, PlayerEvent::Error(_)));
    assert_eq!(err, Some(PlayerEvent::Error("File not found: nope.mp3".into())));
    assert_eq!(h.engine.operations(), vec![EngineOp::SetVolume(1.0)]);
    assert_eq!(h.scheduler.state(), PlaybackState::Idle);
}

#[test]
fn nested_file_is_resolved() {
    let h = Harness::new(0, &["sub/dir/track.mp3"]);
    h.scheduler.on_play(play("sub/dir/track.mp3"));
    let started = h.wait_for(WAIT, |e| matches!(e, PlayerEvent::Started(_)));
    assert_eq!(started, Some(PlayerEvent::Started("sub/dir/track.mp3".into())));
}

#[test]
fn start_position_seeks_before_pause() {
    let h = Harness::new(0, &["a.mp3"]);
    h.scheduler.on_play(play("a.mp3").with_start_position(30_000));
    assert!(h.wait_for(WAIT, |e| matches!(e, PlayerEvent::Started(_))).is_some());

    let ops = h.engine.operations();
    let load = ops.iter().position(|op| *op == EngineOp::Load("a.mp3".into())).unwrap();
    assert_eq!(
        &ops[load..],
        &[
            EngineOp::Load("a.mp3".into()),
            EngineOp::Seek(30_000),
            EngineOp::Pause,
            EngineOp::Play,
        ]
    );
}

#[test]
fn load_failure_reports_error_and_goes_idle() {
    let h = Harness::new(0, &["a.mp3"]);
    h.engine.fail_next_load("unsupported format");
    h.scheduler.on_play(play("a.mp3"));

    let events = h.collect_for(Duration::from_millis(300));
    assert_eq!(
        events,
        vec![PlayerEvent::Error(
            "Error processing play command: unsupported format".into()
        )]
    );
    assert_eq!(h.engine.play_count(), 0);
    assert_eq!(h.scheduler.state(), PlaybackState::Idle);
    assert!(h.scheduler.current_track().is_none());
}

#[test]
fn play_failure_at_start_goes_idle() {
    let h = Harness::new(0, &["a.mp3"]);
    h.engine.fail_next_play("device busy");
    h.scheduler.on_play(play("a.mp3"));

    let err = h.wait_for(WAIT, |e| matches!(e, PlayerEvent::Error(_)));
    assert_eq!(err, Some(PlayerEvent::Error("Playback error: device busy".into())));
    assert_eq!(h.scheduler.state(), PlaybackState::Idle);
}

#[test]
fn end_of_track_returns_to_idle() {
    let h = Harness::new(0, &["a.mp3"]);
    h.scheduler.on_play(play("a.mp3"));
    assert!(h.wait_for(WAIT, |e| matches!(e, PlayerEvent::Started(_))).is_some());

    h.engine.finish_track();
    assert_eq!(h.wait_for(WAIT, |e| *e == PlayerEvent::Ended), Some(PlayerEvent::Ended));
    assert_eq!(h.scheduler.state(), PlaybackState::Idle);
    assert!(h.scheduler.current_track().is_none());
}

#[test]
fn end_of_track_while_scheduled_is_ignored() {
    let h = Harness::new(200, &["a.mp3"]);
    h.scheduler.on_play(play("a.mp3"));
    assert!(h.wait_for(WAIT, |e| matches!(e, PlayerEvent::Preparing(..))).is_some());

    h.engine.finish_track();
    let events = h.collect_for(Duration::from_millis(500));
    assert_eq!(count(&events, &PlayerEvent::Ended), 0);
    assert_eq!(started(&events), vec!["a.mp3".to_string()]);
}

#[test]
fn engine_error_cancels_pending_start() {
    let h = Harness::new(200, &["a.mp3"]);
    h.scheduler.on_play(play("a.mp3"));
    assert!(h.wait_for(WAIT, |e| matches!(e, PlayerEvent::Preparing(..))).is_some());

    h.engine.raise_error("decoder crashed");
    let events = common::collect_all(&h.events, Duration::from_millis(500));
    assert!(events.contains(&PlayerEvent::Debug("Player error: decoder crashed".into())));
    assert!(events.contains(&PlayerEvent::Error("Playback error: decoder crashed".into())));
    assert!(started(&events).is_empty());
    assert_eq!(h.engine.play_count(), 0);
    assert_eq!(h.scheduler.state(), PlaybackState::Idle);
}

#[test]
fn engine_state_changes_are_reported() {
    let h = Harness::with_volume(0, &["a.mp3"], 0.8);
    h.scheduler.on_play(play("a.mp3"));

    let events = common::collect_all(&h.events, Duration::from_millis(300));
    assert!(events.contains(&PlayerEvent::Debug("Player state changed to: BUFFERING".into())));
    assert!(events.contains(&PlayerEvent::Debug("Player state changed to: READY".into())));
    assert!(events.contains(&PlayerEvent::Debug("Player ready to play, volume: 0.80".into())));
    assert_eq!(count(&events, &PlayerEvent::EngineReady), 1);
    assert_eq!(h.engine.operations()[0], EngineOp::SetVolume(0.8));
}

#[test]
fn unknown_commands_do_nothing() {
    let h = Harness::new(0, &["a.mp3"]);
    h.scheduler.handle_command(Command::Unknown {
        raw: r#"{"cmd":"PAUSE"}"#.into(),
    });
    let events = h.collect_for(Duration::from_millis(200));
    assert!(events.is_empty());
    assert_eq!(h.engine.operations(), vec![EngineOp::SetVolume(1.0)]);
}

#[test]
fn release_cancels_pending_start() {
    let h = Harness::new(300, &["a.mp3"]);
    h.scheduler.on_play(play("a.mp3"));
    assert!(h.wait_for(WAIT, |e| matches!(e, PlayerEvent::Preparing(..))).is_some());

    let Harness {
        scheduler,
        engine,
        events,
        gate: _,
        root: _root,
    } = h;
    scheduler.release();

    thread::sleep(Duration::from_millis(400));
    let rest = common::collect_all(&events, Duration::from_millis(50));
    assert!(started(&rest).is_empty());
    assert_eq!(engine.play_count(), 0);
    let ops = engine.operations();
    assert_eq!(&ops[ops.len() - 2..], &[EngineOp::Stop, EngineOp::ClearMedia]);
}

#[test]
fn concurrent_plays_start_exactly_once() {
    let h = Harness::new(150, &["a.mp3", "b.mp3", "c.mp3", "d.mp3"]);
    let names = ["a.mp3", "b.mp3", "c.mp3", "d.mp3"];

    let threads: Vec<_> = names
        .iter()
        .map(|name| {
            let handle = h.scheduler.handle();
            let name = name.to_string();
            thread::spawn(move || handle.on_play(PlayCommand::new(name, 0)))
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }

    let events = h.collect_for(Duration::from_millis(700));
    let started = started(&events);
    assert_eq!(started.len(), 1);
    assert_eq!(h.engine.play_count(), 1);
    assert_eq!(h.engine.loaded().len(), 4);
    // whichever PLAY was processed last is the one that starts
    assert_eq!(h.engine.loaded().last(), started.first());
}

#[test]
fn queued_stop_beats_expired_start() {
    let h = Harness::new(0, &["a.mp3"]);

    for _ in 0..50 {
        // Park the scheduler inside the PLAY so the STOP is queued before
        // the zero-length delay can expire.
        h.gate.arm();
        h.scheduler.on_play(play("a.mp3"));
        h.gate.wait_parked(WAIT);
        h.scheduler.on_stop();
        h.gate.open();

        let events = h.events_until(WAIT, |e| *e == PlayerEvent::Stopped);
        assert!(started(&events).is_empty(), "started despite queued stop: {:?}", events);
    }
    assert_eq!(h.engine.play_count(), 0);
}

#[test]
fn queued_play_supersedes_expired_start() {
    let h = Harness::new(0, &["f1.mp3", "f2.mp3"]);

    for _ in 0..50 {
        h.gate.arm();
        h.scheduler.on_play(play("f1.mp3"));
        h.gate.wait_parked(WAIT);
        h.scheduler.on_play(play("f2.mp3"));
        h.gate.open();

        let events = h.events_until(WAIT, |e| matches!(e, PlayerEvent::Started(_)));
        assert_eq!(started(&events), vec!["f2.mp3".to_string()]);
    }
    assert_eq!(h.engine.play_count(), 50);
}

#[test]
fn stop_queued_while_busy_past_deadline_wins() {
    let h = Harness::new(40, &["a.mp3"]);
    h.scheduler.on_play(play("a.mp3"));
    assert!(h.wait_for(WAIT, |e| matches!(e, PlayerEvent::Preparing(..))).is_some());

    // Hold the thread in an engine event until the deadline has passed.
    h.gate.arm();
    h.scheduler.engine_events().state_changed(EngineState::Buffering);
    h.gate.wait_parked(WAIT);
    thread::sleep(Duration::from_millis(100));
    h.scheduler.on_stop();
    h.gate.open();

    let events = h.events_until(WAIT, |e| *e == PlayerEvent::Stopped);
    assert!(started(&events).is_empty());
    assert_eq!(h.engine.play_count(), 0);
    assert_eq!(h.scheduler.state(), PlaybackState::Idle);
}
