//! Tone output abstraction
//!
//! The presenter never touches a device directly. It asks a [`ToneOutput`]
//! for one tone at a time and owns the returned [`ToneHandle`] until the
//! tone's hold time elapses or playback is cancelled. Dropping a handle must
//! silence the tone and release everything it allocated, so a cancelled
//! future cleans up even if `stop` is never reached.

use crate::error::AudioError;

/// Length of the linear fade applied at tone start and stop
pub const RAMP_MS: u32 = 10;

/// Parameters for a single sine tone
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneSpec {
    pub frequency_hz: f64,
    /// Linear amplitude in [0.0, 1.0]
    pub gain: f32,
    /// Stereo position in [-1.0, 1.0]
    pub pan: f32,
}

impl ToneSpec {
    pub fn new(frequency_hz: f64, volume_db: f64, pan: f32) -> Self {
        Self {
            frequency_hz,
            gain: db_to_gain(volume_db),
            pan: pan.clamp(-1.0, 1.0),
        }
    }

    /// Equal-power left/right channel gains
    pub fn channel_gains(&self) -> (f32, f32) {
        let angle = (self.pan + 1.0) * std::f32::consts::FRAC_PI_4;
        (self.gain * angle.cos(), self.gain * angle.sin())
    }
}

/// Source of test tones
pub trait ToneOutput: Send + Sync {
    /// Start a tone sounding immediately
    ///
    /// # Errors
    /// Any `AudioError` when no tone can be produced.
    fn start_tone(&self, spec: &ToneSpec) -> Result<Box<dyn ToneHandle>, AudioError>;
}

/// A sounding tone; stopping or dropping it releases the tone's resources
///
/// Handles are `Send` so a playback future can run on any runtime worker.
/// `stop` must return without waiting for the release to finish.
pub trait ToneHandle: Send {
    /// Fade the tone out and release it
    fn stop(self: Box<Self>);
}

/// Convert decibels relative to full scale into a linear gain
pub fn db_to_gain(db: f64) -> f32 {
    10f64.powf(db / 20.0).clamp(0.0, 1.0) as f32
}
