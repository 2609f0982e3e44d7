// TrialPresenter - plays one TestSet in its presentation order
//
// Timeline per trial: tone, gap, tone, gap, tone, then the post-set pause.
// At most one tone sounds at a time. Each tone's handle lives only inside
// the loop body, so returning early on cancellation or error drops it and
// releases the tone.

use std::sync::Arc;
use std::time::Duration;

use crate::audio::{ToneOutput, ToneSpec};
use crate::calibration::cancel::CancelToken;
use crate::calibration::state::{Ear, TestSet};
use crate::config::PlaybackConfig;
use crate::error::{log_audio_error, AudioError};

/// How a playback ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    Completed,
    Cancelled,
}

pub struct TrialPresenter {
    output: Arc<dyn ToneOutput>,
    config: PlaybackConfig,
}

impl TrialPresenter {
    pub fn new(output: Arc<dyn ToneOutput>, config: PlaybackConfig) -> Self {
        Self { output, config }
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    /// Play the set's three tones in order, routed to `ear`
    ///
    /// # Returns
    /// `Completed` after the post-set pause, or `Cancelled` as soon as the
    /// token fires; the sounding tone (if any) is released either way.
    ///
    /// # Errors
    /// The output's `AudioError` when a tone cannot start. Nothing in the
    /// controller changes, so the same set may be replayed.
    pub async fn play_trial(
        &self,
        test_set: &TestSet,
        ear: Ear,
        cancel: &CancelToken,
    ) -> Result<PlaybackOutcome, AudioError> {
        let last = test_set.frequencies.len() - 1;

        for (index, &frequency_hz) in test_set.frequencies.iter().enumerate() {
            if cancel.is_cancelled() {
                return Ok(self.cancelled(test_set));
            }

            let spec = ToneSpec::new(frequency_hz, self.config.test_volume_db, ear.pan());
            let handle = self.output.start_tone(&spec).inspect_err(|err| {
                log_audio_error(err, "play_trial");
            })?;

            if !hold(self.config.tone_duration(), cancel).await {
                drop(handle);
                return Ok(self.cancelled(test_set));
            }
            handle.stop();

            if index < last && !hold(self.config.pause_between_tones(), cancel).await {
                return Ok(self.cancelled(test_set));
            }
        }

        if !hold(self.config.pause_after_set(), cancel).await {
            return Ok(self.cancelled(test_set));
        }

        tracing::debug!(
            "[TrialPresenter] Trial {} presented {:?}",
            test_set.iteration,
            test_set.frequencies
        );
        Ok(PlaybackOutcome::Completed)
    }

    /// Play one probe tone for the bisection flow, followed by the post-set
    /// pause
    pub async fn play_probe(
        &self,
        frequency_hz: f64,
        ear: Ear,
        cancel: &CancelToken,
    ) -> Result<PlaybackOutcome, AudioError> {
        if cancel.is_cancelled() {
            return Ok(PlaybackOutcome::Cancelled);
        }

        let spec = ToneSpec::new(frequency_hz, self.config.test_volume_db, ear.pan());
        let handle = self.output.start_tone(&spec).inspect_err(|err| {
            log_audio_error(err, "play_probe");
        })?;

        if !hold(self.config.tone_duration(), cancel).await {
            drop(handle);
            return Ok(PlaybackOutcome::Cancelled);
        }
        handle.stop();

        if !hold(self.config.pause_after_set(), cancel).await {
            return Ok(PlaybackOutcome::Cancelled);
        }
        Ok(PlaybackOutcome::Completed)
    }

    fn cancelled(&self, test_set: &TestSet) -> PlaybackOutcome {
        tracing::info!(
            "[TrialPresenter] Playback of trial {} cancelled",
            test_set.iteration
        );
        PlaybackOutcome::Cancelled
    }
}

/// Wait for `duration`; false if cancelled first
async fn hold(duration: Duration, cancel: &CancelToken) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}
