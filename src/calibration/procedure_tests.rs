use super::*;
use crate::calibration::shuffle::{FisherYatesShuffler, IdentityShuffler};
use crate::config::AppConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn identity_controller() -> StaircaseController {
    StaircaseController::new(&AppConfig::default(), Box::new(IdentityShuffler)).unwrap()
}

fn expect_trial(controller: &mut StaircaseController) -> TestSet {
    match controller.next_trial().unwrap() {
        TrialStep::Trial(set) => set,
        TrialStep::Finished => panic!("expected a trial, controller finished"),
    }
}

fn wrong_index(set: &TestSet) -> usize {
    (set.target_index + 1) % 3
}

#[test]
fn test_new_default_is_idle() {
    let controller = StaircaseController::new_default();
    assert_eq!(controller.phase(), MatchPhase::Idle);
    assert!(controller.state().is_none());
    assert!(controller.active_set().is_none());
}

#[test]
fn test_new_rejects_invalid_config() {
    let mut config = AppConfig::default();
    config.matching.max_iterations = 0;
    let result = StaircaseController::new(&config, Box::new(IdentityShuffler));
    assert!(matches!(result, Err(CalibrationError::InvalidConfig { .. })));
}

#[test]
fn test_start_initializes_state() {
    let mut controller = identity_controller();
    controller.start(Ear::Left, Some(4000.0)).unwrap();

    let state = controller.state().unwrap();
    assert_eq!(state.current_frequency_hz, 4000.0);
    assert_eq!(state.step_size_octaves, 2.0);
    assert_eq!(state.iteration, 0);
    assert!(state.history.is_empty());
    assert_eq!(controller.ear(), Ear::Left);
    assert_eq!(controller.phase(), MatchPhase::AwaitingTrial);
}

#[test]
fn test_start_clamps_initial_frequency() {
    let mut controller = identity_controller();
    controller.start(Ear::Both, Some(20_000.0)).unwrap();
    assert_eq!(controller.state().unwrap().current_frequency_hz, 16000.0);

    controller.cancel();
    controller.start(Ear::Both, Some(100.0)).unwrap();
    assert_eq!(controller.state().unwrap().current_frequency_hz, 250.0);

    controller.cancel();
    controller.start(Ear::Both, None).unwrap();
    assert_eq!(controller.state().unwrap().current_frequency_hz, 4000.0);
}

#[test]
fn test_start_while_running_fails() {
    let mut controller = identity_controller();
    controller.start(Ear::Both, None).unwrap();

    let result = controller.start(Ear::Right, None);
    assert!(matches!(result, Err(CalibrationError::AlreadyInProgress)));
    // Running test is untouched
    assert_eq!(controller.ear(), Ear::Both);
}

#[test]
fn test_first_trial_centered_on_start_frequency() {
    let mut controller = identity_controller();
    controller.start(Ear::Both, Some(4000.0)).unwrap();

    let set = expect_trial(&mut controller);
    assert_eq!(set.frequencies[set.target_index], 4000.0);
    assert_eq!(set.target_frequency_hz, 4000.0);
    assert_eq!(set.iteration, 1);
    assert_eq!(set.step_size_octaves, 2.0);
    // Two octaves either side: 1000 Hz and 16000 Hz, neither an octave away
    assert_eq!(set.frequencies, [1000.0, 4000.0, 16000.0]);
    for f in set.frequencies {
        assert!((250.0..=16000.0).contains(&f));
    }
}

#[test]
fn test_candidates_clamped_near_range_edge() {
    let mut controller = identity_controller();
    controller.start(Ear::Both, Some(12000.0)).unwrap();

    let set = expect_trial(&mut controller);
    assert_eq!(set.frequencies[0], 3000.0);
    assert_eq!(set.frequencies[2], 16000.0);
}

#[test]
fn test_next_trial_before_start_fails() {
    let mut controller = identity_controller();
    assert!(matches!(
        controller.next_trial(),
        Err(CalibrationError::InvalidState { .. })
    ));
}

#[test]
fn test_next_trial_with_unanswered_set_fails() {
    let mut controller = identity_controller();
    controller.start(Ear::Both, None).unwrap();
    expect_trial(&mut controller);

    assert!(matches!(
        controller.next_trial(),
        Err(CalibrationError::InvalidState { .. })
    ));
    assert_eq!(controller.state().unwrap().iteration, 1);
}

#[test]
fn test_submit_without_active_set_fails() {
    let mut controller = identity_controller();
    controller.start(Ear::Both, None).unwrap();

    assert!(matches!(
        controller.submit_response(0),
        Err(CalibrationError::InvalidState { .. })
    ));
}

#[test]
fn test_out_of_range_selection_leaves_trial_open() {
    let mut controller = identity_controller();
    controller.start(Ear::Both, None).unwrap();
    let set = expect_trial(&mut controller);

    let result = controller.submit_response(5);
    assert!(matches!(result, Err(CalibrationError::InvalidArgument { .. })));
    assert_eq!(controller.state().unwrap().iteration, 1);
    assert!(controller.state().unwrap().history.is_empty());
    assert_eq!(controller.active_set(), Some(&set));
    assert_eq!(controller.phase(), MatchPhase::AwaitingSelection);

    // Same trial can still be answered
    let summary = controller.submit_response(set.target_index).unwrap();
    assert!(summary.record.was_correct);
}

#[test]
fn test_three_confirmations_shrink_step_to_quarter_octave() {
    let mut controller = identity_controller();
    controller.start(Ear::Both, Some(4000.0)).unwrap();

    for _ in 0..3 {
        let set = expect_trial(&mut controller);
        controller.submit_response(set.target_index).unwrap();
    }

    let state = controller.state().unwrap();
    assert_eq!(state.step_size_octaves, 2.0 * 0.5 * 0.5 * 0.5);
    assert_eq!(state.step_size_octaves, 0.25);
    assert_eq!(state.current_frequency_hz, 4000.0);
    // Step still coarse, so no convergence yet
    assert_eq!(controller.phase(), MatchPhase::AwaitingTrial);
}

#[test]
fn test_redirect_moves_center_and_shrinks_gently() {
    let mut controller = identity_controller();
    controller.start(Ear::Both, Some(4000.0)).unwrap();

    let set = expect_trial(&mut controller);
    let summary = controller.submit_response(0).unwrap();

    assert!(!summary.record.was_correct);
    assert_eq!(summary.record.selected_frequency_hz, set.frequencies[0]);
    assert_eq!(summary.record.target_frequency_hz, 4000.0);
    let state = controller.state().unwrap();
    assert_eq!(state.current_frequency_hz, 1000.0);
    assert!((state.step_size_octaves - 1.4).abs() < 1e-12);
}

#[test]
fn test_never_confirming_runs_exactly_max_iterations() {
    let mut controller = identity_controller();
    controller.start(Ear::Right, Some(4000.0)).unwrap();

    let mut presented = 0;
    while !controller.phase().is_terminal() {
        let set = expect_trial(&mut controller);
        presented += 1;
        controller.submit_response(wrong_index(&set)).unwrap();
    }

    assert_eq!(presented, 15);
    assert_eq!(controller.phase(), MatchPhase::MaxIterationsReached);

    let result = controller.get_result().unwrap();
    assert_eq!(result.outcome, MatchOutcome::MaxIterationsReached);
    assert_eq!(result.iterations, 15);
    assert!(result.history.iter().all(|r| !r.was_correct));
    assert_eq!(result.ear, Ear::Right);
}

#[test]
fn test_next_trial_past_budget_reports_finished() {
    let mut config = AppConfig::default();
    config.matching.max_iterations = 1;
    let mut controller = StaircaseController::new(&config, Box::new(IdentityShuffler)).unwrap();
    controller.start(Ear::Both, None).unwrap();

    let set = expect_trial(&mut controller);
    let summary = controller.submit_response(wrong_index(&set)).unwrap();
    assert!(summary.is_finished());

    // Terminal: no further trials
    assert!(matches!(
        controller.next_trial(),
        Err(CalibrationError::InvalidState { .. })
    ));
}

#[test]
fn test_confirmations_converge_at_fine_step() {
    let mut controller = identity_controller();
    controller.start(Ear::Both, Some(6000.0)).unwrap();

    // 2.0 -> 1.0 -> 0.5 -> 0.25 -> 0.125 -> 0.0625: converged after the 5th
    let mut trials = 0;
    while !controller.phase().is_terminal() {
        let set = expect_trial(&mut controller);
        controller.submit_response(set.target_index).unwrap();
        trials += 1;
    }

    assert_eq!(trials, 5);
    assert_eq!(controller.phase(), MatchPhase::Converged);

    let result = controller.get_result().unwrap();
    assert_eq!(result.outcome, MatchOutcome::Converged);
    assert!((result.frequency_hz - 6000.0).abs() < 1e-9);
    assert_eq!(result.confidence_percent, 95);
}

#[test]
fn test_get_result_before_completion_fails() {
    let mut controller = identity_controller();
    assert!(matches!(
        controller.get_result(),
        Err(CalibrationError::NotComplete)
    ));

    controller.start(Ear::Both, None).unwrap();
    assert!(matches!(
        controller.get_result(),
        Err(CalibrationError::NotComplete)
    ));
}

#[test]
fn test_get_result_is_idempotent() {
    let mut controller = identity_controller();
    controller.start(Ear::Left, Some(3000.0)).unwrap();
    while !controller.phase().is_terminal() {
        let set = expect_trial(&mut controller);
        controller.submit_response(set.target_index).unwrap();
    }

    let first = controller.get_result().unwrap();
    std::thread::sleep(std::time::Duration::from_millis(2));
    let second = controller.get_result().unwrap();

    assert_eq!(first, second);
    assert_eq!(first.frequency_hz.to_bits(), second.frequency_hz.to_bits());
    assert_eq!(first.timestamp_ms, second.timestamp_ms);
}

#[test]
fn test_restart_after_terminal_creates_fresh_run() {
    let mut controller = identity_controller();
    controller.start(Ear::Left, None).unwrap();
    while !controller.phase().is_terminal() {
        let set = expect_trial(&mut controller);
        controller.submit_response(set.target_index).unwrap();
    }

    controller.start(Ear::Right, Some(1000.0)).unwrap();
    let state = controller.state().unwrap();
    assert_eq!(state.iteration, 0);
    assert!(state.history.is_empty());
    assert_eq!(state.current_frequency_hz, 1000.0);
    assert!(matches!(
        controller.get_result(),
        Err(CalibrationError::NotComplete)
    ));
}

#[test]
fn test_cancel_discards_state() {
    let mut controller = identity_controller();
    controller.start(Ear::Both, None).unwrap();
    expect_trial(&mut controller);

    controller.cancel();
    assert_eq!(controller.phase(), MatchPhase::Idle);
    assert!(controller.state().is_none());
    assert!(controller.active_set().is_none());
    assert!(controller.submit_response(0).is_err());
}

#[test]
fn test_seeded_presentation_order_is_reproducible() {
    let config = AppConfig::default();
    let mut a = StaircaseController::seeded(&config, 99).unwrap();
    let mut b = StaircaseController::seeded(&config, 99).unwrap();
    a.start(Ear::Both, Some(4000.0)).unwrap();
    b.start(Ear::Both, Some(4000.0)).unwrap();

    for _ in 0..10 {
        let set_a = expect_trial(&mut a);
        let set_b = expect_trial(&mut b);
        assert_eq!(set_a, set_b);
        assert_eq!(set_a.frequencies[set_a.target_index], set_a.target_frequency_hz);

        a.submit_response(wrong_index(&set_a)).unwrap();
        b.submit_response(wrong_index(&set_b)).unwrap();
    }
}

#[test]
fn test_injected_shuffle_controls_target_index() {
    let rotate = |order: &mut [usize]| order.rotate_left(1);
    let mut controller =
        StaircaseController::new(&AppConfig::default(), Box::new(rotate)).unwrap();
    controller.start(Ear::Both, Some(4000.0)).unwrap();

    let set = expect_trial(&mut controller);
    // [lower, center, upper] rotated left -> [center, upper, lower]
    assert_eq!(set.target_index, 0);
    assert_eq!(set.frequencies, [4000.0, 16000.0, 1000.0]);
}

#[test]
fn test_set_shuffler_rejected_while_running() {
    let mut controller = identity_controller();
    controller.start(Ear::Both, None).unwrap();
    assert!(controller
        .set_shuffler(Box::new(FisherYatesShuffler::seeded(1)))
        .is_err());

    controller.cancel();
    assert!(controller
        .set_shuffler(Box::new(FisherYatesShuffler::seeded(1)))
        .is_ok());
}

/// Drive many random runs and check the per-trial invariants
#[test]
fn test_random_runs_hold_invariants() {
    let config = AppConfig::default();
    let guard = OctaveGuard::new(config.octave_guard.clone(), &config.matching);

    for seed in 0..200u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut controller = StaircaseController::seeded(&config, seed).unwrap();
        let start = rng.gen_range(250.0..16000.0);
        controller.start(Ear::Both, Some(start)).unwrap();

        let mut last_step = controller.state().unwrap().step_size_octaves;
        while !controller.phase().is_terminal() {
            let set = match controller.next_trial().unwrap() {
                TrialStep::Trial(set) => set,
                TrialStep::Finished => break,
            };

            for f in set.frequencies {
                assert!((250.0..=16000.0).contains(&f), "seed {}: {} Hz", seed, f);
            }
            let lowest = set.frequencies.iter().copied().fold(f64::INFINITY, f64::min);
            let highest = set.frequencies.iter().copied().fold(0.0, f64::max);
            assert!(
                lowest <= set.target_frequency_hz && set.target_frequency_hz <= highest,
                "seed {}: center outside {:?}",
                seed,
                set.frequencies
            );
            for i in 0..3 {
                for j in (i + 1)..3 {
                    assert!(
                        !guard.is_near_octave(set.frequencies[i], set.frequencies[j]),
                        "seed {}: octave pair in {:?}",
                        seed,
                        set.frequencies
                    );
                }
            }

            let summary = controller.submit_response(rng.gen_range(0..3)).unwrap();
            let step = controller.state().unwrap().step_size_octaves;
            assert!(step <= last_step);
            assert!(step >= 0.05);
            last_step = step;

            if summary.phase == MatchPhase::Converged {
                let history = &controller.state().unwrap().history;
                assert!(history.len() >= 3);
                assert!(history[history.len() - 3..].iter().all(|r| r.was_correct));
            }
        }

        let result = controller.get_result().unwrap();
        assert!(result.confidence_percent <= 95);
        assert!(result.iterations <= 15);
    }
}

#[test]
fn test_progress_tracks_run() {
    let mut controller = identity_controller();
    assert_eq!(controller.progress().phase, MatchPhase::Idle);

    controller.start(Ear::Left, Some(4000.0)).unwrap();
    let set = expect_trial(&mut controller);
    controller.submit_response(set.target_index).unwrap();

    let progress = controller.progress();
    assert_eq!(progress.phase, MatchPhase::AwaitingTrial);
    assert_eq!(progress.ear, Some(Ear::Left));
    assert_eq!(progress.iteration, 1);
    assert_eq!(progress.step_size_octaves, Some(1.0));
    assert_eq!(progress.consecutive_correct, 1);
}
