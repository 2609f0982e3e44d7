//! Integration tests for MatchingSession
//!
//! Full runs through the session with the recording tone output on a paused
//! clock: playback timing, one tone at a time, cancellation and progress.

use std::sync::Arc;
use std::time::Duration;

use tinnitus_matcher::audio::{RecordingToneOutput, ToneEventKind};
use tinnitus_matcher::calibration::{
    Ear, MatchOutcome, MatchPhase, PlaybackOutcome, SimulatedListener, TrialStep,
};
use tinnitus_matcher::config::AppConfig;
use tinnitus_matcher::error::{CalibrationError, SessionError};
use tinnitus_matcher::managers::MatchingSession;
use tokio::time::Instant;

fn session(output: &RecordingToneOutput, seed: u64) -> MatchingSession {
    MatchingSession::with_seed(AppConfig::default(), Arc::new(output.clone()), seed).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_full_session_with_playback() {
    let output = RecordingToneOutput::new();
    let session = session(&output, 21);
    let mut listener = SimulatedListener::perfect(6000.0);
    let started = Instant::now();

    session.start(Ear::Right, None).unwrap();
    let mut trials = 0u32;
    loop {
        let set = match session.next_trial().unwrap() {
            TrialStep::Trial(set) => set,
            TrialStep::Finished => break,
        };
        trials += 1;

        let outcome = session.play_current_trial().await.unwrap();
        assert_eq!(outcome, PlaybackOutcome::Completed);

        if session
            .submit_response(listener.choose(&set))
            .unwrap()
            .is_finished()
        {
            break;
        }
    }

    let result = session.result().unwrap();
    assert_eq!(result.outcome, MatchOutcome::Converged);
    assert_eq!(result.iterations, trials);
    assert_eq!(result.ear, Ear::Right);
    assert!((result.frequency_hz / 6000.0).log2().abs() < 0.1);

    // Every trial took exactly the configured presentation time
    assert_eq!(
        started.elapsed(),
        Duration::from_millis(4000) * trials
    );
    assert_eq!(output.started_frequencies().len() as u32, trials * 3);
    assert_eq!(output.peak_active_tones(), 1);
    assert_eq!(output.active_tones(), 0);
    assert!(output.events().iter().all(|e| e.spec.pan == 1.0));
}

#[tokio::test(start_paused = true)]
async fn test_tones_never_overlap() {
    let output = RecordingToneOutput::new();
    let session = session(&output, 4);
    session.start(Ear::Both, None).unwrap();

    for _ in 0..3 {
        let set = match session.next_trial().unwrap() {
            TrialStep::Trial(set) => set,
            TrialStep::Finished => break,
        };
        session.play_current_trial().await.unwrap();
        session.submit_response(set.target_index).unwrap();
    }

    let mut sounding = 0i32;
    for event in output.events() {
        match event.kind {
            ToneEventKind::Started => sounding += 1,
            ToneEventKind::Released => sounding -= 1,
        }
        assert!((0..=1).contains(&sounding));
    }
    assert_eq!(sounding, 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_mid_trial_then_restart() {
    let output = RecordingToneOutput::new();
    let session = session(&output, 8);
    let mut progress = session.subscribe();

    session.start(Ear::Left, Some(2000.0)).unwrap();
    session.next_trial().unwrap();

    let (outcome, _) = tokio::join!(session.play_current_trial(), async {
        tokio::time::sleep(Duration::from_millis(2500)).await;
        session.cancel().unwrap();
    });
    assert_eq!(outcome.unwrap(), PlaybackOutcome::Cancelled);
    assert_eq!(output.active_tones(), 0);
    assert!(matches!(
        session.result(),
        Err(CalibrationError::NotComplete)
    ));

    // Last broadcast reports the idle state
    let mut last = None;
    while let Ok(snapshot) = progress.try_recv() {
        last = Some(snapshot);
    }
    assert_eq!(last.unwrap().phase, MatchPhase::Idle);

    session.start(Ear::Left, Some(2000.0)).unwrap();
    let snapshot = session.progress().unwrap();
    assert_eq!(snapshot.iteration, 0);
    assert_eq!(snapshot.current_frequency_hz, Some(2000.0));
}

#[tokio::test(start_paused = true)]
async fn test_audio_unavailable_is_recoverable() {
    let output = RecordingToneOutput::unavailable();
    let session = session(&output, 1);
    session.start(Ear::Both, None).unwrap();
    let set = match session.next_trial().unwrap() {
        TrialStep::Trial(set) => set,
        TrialStep::Finished => unreachable!(),
    };

    let err = session.play_current_trial().await.unwrap_err();
    assert!(matches!(err, SessionError::Audio(_)));

    // The run continues without audio
    let summary = session.submit_response(set.target_index).unwrap();
    assert!(summary.record.was_correct);
    assert_eq!(session.progress().unwrap().iteration, 1);
}

#[tokio::test(start_paused = true)]
async fn test_playback_on_spawned_task_can_be_cancelled() {
    let output = RecordingToneOutput::new();
    let session = Arc::new(session(&output, 13));
    session.start(Ear::Left, None).unwrap();
    session.next_trial().unwrap();

    let playback = tokio::spawn({
        let session = Arc::clone(&session);
        async move { session.play_current_trial().await }
    });

    // First gap: one tone played and released, playback still in flight
    tokio::time::sleep(Duration::from_millis(900)).await;
    assert!(session.is_playing());
    assert!(session.next_trial().is_err());
    assert_eq!(output.started_frequencies().len(), 1);

    session.cancel().unwrap();
    let outcome = playback.await.unwrap().unwrap();
    assert_eq!(outcome, PlaybackOutcome::Cancelled);
    assert!(!session.is_playing());
    assert_eq!(output.active_tones(), 0);
    assert_eq!(output.started_frequencies().len(), 1);
}
