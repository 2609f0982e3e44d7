// MatchingSession: binds the staircase controller to trial playback
//
// Single Responsibility: one pitch-matching run from start to result
//
// The controller sits behind a Mutex so the session can be shared between
// the task awaiting playback and the one handling user input, by reference
// or through an Arc with a spawned playback task. The lock is never held
// across an await, so playback futures are Send.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::broadcast;

use crate::audio::ToneOutput;
use crate::calibration::{
    CalibrationProgress, CancelToken, Ear, FisherYatesShuffler, PlaybackOutcome,
    ResponseSummary, StaircaseController, TestResult, TrialPresenter, TrialStep,
};
use crate::config::AppConfig;
use crate::error::{log_calibration_error, CalibrationError, SessionError};

/// Progress channel capacity; one message per transition
const PROGRESS_CHANNEL_CAPACITY: usize = 64;

/// Manages a pitch-matching run and its trial playback
///
/// # Example
/// ```ignore
/// let session = MatchingSession::new(AppConfig::default(), audio::default_output())?;
/// session.start(Ear::Left, None)?;
/// while let TrialStep::Trial(set) = session.next_trial()? {
///     session.play_current_trial().await?;
///     let summary = session.submit_response(ask_listener(&set))?;
///     if summary.is_finished() { break; }
/// }
/// let result = session.result()?;
/// ```
pub struct MatchingSession {
    config: AppConfig,
    seed: Option<u64>,
    controller: Mutex<Option<StaircaseController>>,
    presenter: TrialPresenter,
    cancel: Mutex<CancelToken>,
    playing: AtomicBool,
    progress_tx: broadcast::Sender<CalibrationProgress>,
}

impl MatchingSession {
    /// Create a session with entropy-seeded presentation order
    ///
    /// # Errors
    /// `InvalidConfig` if the configuration fails validation
    pub fn new(config: AppConfig, output: Arc<dyn ToneOutput>) -> Result<Self, CalibrationError> {
        Self::build(config, output, None)
    }

    /// Create a session whose runs all use the same shuffle sequence
    pub fn with_seed(
        config: AppConfig,
        output: Arc<dyn ToneOutput>,
        seed: u64,
    ) -> Result<Self, CalibrationError> {
        Self::build(config, output, Some(seed))
    }

    fn build(
        config: AppConfig,
        output: Arc<dyn ToneOutput>,
        seed: Option<u64>,
    ) -> Result<Self, CalibrationError> {
        config.validate()?;
        let (progress_tx, _) = broadcast::channel(PROGRESS_CHANNEL_CAPACITY);
        Ok(Self {
            presenter: TrialPresenter::new(output, config.playback.clone()),
            config,
            seed,
            controller: Mutex::new(None),
            cancel: Mutex::new(CancelToken::new()),
            playing: AtomicBool::new(false),
            progress_tx,
        })
    }

    /// Start a new run for `ear`
    ///
    /// # Errors
    /// `AlreadyInProgress` while a run is active; finished or cancelled runs
    /// may be replaced.
    pub fn start(&self, ear: Ear, initial_frequency_hz: Option<f64>) -> Result<(), CalibrationError> {
        let mut guard = self.lock_controller()?;
        if guard.as_ref().is_some_and(|c| c.phase().is_running()) {
            let err = CalibrationError::AlreadyInProgress;
            log_calibration_error(&err, "session_start");
            return Err(err);
        }

        let shuffler = match self.seed {
            Some(seed) => FisherYatesShuffler::seeded(seed),
            None => FisherYatesShuffler::from_entropy(),
        };
        let mut controller = StaircaseController::new(&self.config, Box::new(shuffler))?;
        controller.start(ear, initial_frequency_hz)?;

        *self.lock_cancel()? = CancelToken::new();
        self.publish(controller.progress());
        *guard = Some(controller);
        Ok(())
    }

    /// Produce the next trial
    ///
    /// # Errors
    /// `InvalidState` while a playback is in flight, before `start`, or when
    /// the controller rejects the call.
    pub fn next_trial(&self) -> Result<TrialStep, CalibrationError> {
        if self.is_playing() {
            return Err(CalibrationError::invalid_state(
                "a trial is still being presented",
            ));
        }
        self.with_controller("next_trial", |controller| controller.next_trial())
    }

    /// Play the trial awaiting a selection
    ///
    /// # Errors
    /// * `InvalidState` when no trial is active or another playback runs
    /// * Audio errors from the tone output; the trial stays active and may
    ///   be replayed
    pub async fn play_current_trial(&self) -> Result<PlaybackOutcome, SessionError> {
        if self.playing.swap(true, Ordering::SeqCst) {
            return Err(CalibrationError::invalid_state("playback already in flight").into());
        }
        let _playing = PlayingGuard(&self.playing);

        let (test_set, ear) = {
            let guard = self.lock_controller()?;
            let controller = guard
                .as_ref()
                .ok_or_else(|| CalibrationError::invalid_state("no run started"))?;
            let test_set = *controller
                .active_set()
                .ok_or_else(|| CalibrationError::invalid_state("no trial awaiting playback"))?;
            (test_set, controller.ear())
        };
        let cancel = self.lock_cancel()?.clone();

        Ok(self.presenter.play_trial(&test_set, ear, &cancel).await?)
    }

    /// Record the listener's choice for the active trial
    pub fn submit_response(&self, selection: usize) -> Result<ResponseSummary, CalibrationError> {
        self.with_controller("submit_response", |controller| {
            controller.submit_response(selection)
        })
    }

    /// Final result of a finished run
    pub fn result(&self) -> Result<TestResult, CalibrationError> {
        let mut guard = self.lock_controller()?;
        match guard.as_mut() {
            Some(controller) => controller.get_result(),
            None => Err(CalibrationError::NotComplete),
        }
    }

    /// Abort the run: silence any playing tone and discard state
    pub fn cancel(&self) -> Result<(), CalibrationError> {
        self.lock_cancel()?.cancel();

        let mut guard = self.lock_controller()?;
        if let Some(controller) = guard.as_mut() {
            controller.cancel();
            self.publish(controller.progress());
        }
        *guard = None;
        Ok(())
    }

    /// Receive a progress snapshot after every transition
    pub fn subscribe(&self) -> broadcast::Receiver<CalibrationProgress> {
        self.progress_tx.subscribe()
    }

    pub fn progress(&self) -> Result<CalibrationProgress, CalibrationError> {
        let guard = self.lock_controller()?;
        Ok(match guard.as_ref() {
            Some(controller) => controller.progress(),
            None => CalibrationProgress::idle(self.config.matching.max_iterations),
        })
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    // ========================================================================
    // HELPER METHODS - Lock management and progress
    // ========================================================================

    fn with_controller<T>(
        &self,
        context: &str,
        op: impl FnOnce(&mut StaircaseController) -> Result<T, CalibrationError>,
    ) -> Result<T, CalibrationError> {
        let mut guard = self.lock_controller()?;
        let controller = guard.as_mut().ok_or_else(|| {
            let err = CalibrationError::invalid_state("no run started");
            log_calibration_error(&err, context);
            err
        })?;

        let outcome = op(controller);
        self.publish(controller.progress());
        outcome
    }

    fn lock_controller(
        &self,
    ) -> Result<MutexGuard<'_, Option<StaircaseController>>, CalibrationError> {
        self.controller
            .lock()
            .map_err(|_| CalibrationError::StatePoisoned)
    }

    fn lock_cancel(&self) -> Result<MutexGuard<'_, CancelToken>, CalibrationError> {
        self.cancel.lock().map_err(|_| CalibrationError::StatePoisoned)
    }

    fn publish(&self, progress: CalibrationProgress) {
        // No subscribers is fine
        let _ = self.progress_tx.send(progress);
    }
}

/// Clears the in-flight flag however playback ends
struct PlayingGuard<'a>(&'a AtomicBool);

impl Drop for PlayingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
