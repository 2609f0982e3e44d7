// Audio module - tone output used to present trials

pub mod stubs;
pub mod tone;

#[cfg(not(target_os = "android"))]
pub mod engine_cpal;

use std::sync::Arc;

pub use stubs::{RecordingToneOutput, ToneEvent, ToneEventKind};
pub use tone::{db_to_gain, ToneHandle, ToneOutput, ToneSpec};

#[cfg(not(target_os = "android"))]
pub use engine_cpal::CpalToneOutput;

cfg_if::cfg_if! {
    if #[cfg(not(target_os = "android"))] {
        /// Tone output for the host platform's default device
        pub fn default_output() -> Arc<dyn ToneOutput> {
            Arc::new(CpalToneOutput::new())
        }
    } else {
        /// No device backend on this platform; tones are recorded only
        pub fn default_output() -> Arc<dyn ToneOutput> {
            tracing::warn!("[Audio] No tone backend for this platform, using recording output");
            Arc::new(RecordingToneOutput::new())
        }
    }
}
