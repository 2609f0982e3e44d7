//! Recording tone output for tests and simulation
//!
//! Produces no sound. Every start and release is appended to a shared event
//! log stamped with `tokio::time::Instant`, so tests running on a paused
//! clock can assert exact presentation timing. Failures can be injected to
//! exercise the audio-unavailable path.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::time::Instant;

use super::tone::{ToneHandle, ToneOutput, ToneSpec};
use crate::error::AudioError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ToneEventKind {
    Started,
    Released,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneEvent {
    pub kind: ToneEventKind,
    pub spec: ToneSpec,
    pub at: Instant,
}

#[derive(Debug, Default)]
struct Shared {
    events: Mutex<Vec<ToneEvent>>,
    active: AtomicUsize,
    peak_active: AtomicUsize,
    starts: AtomicUsize,
}

/// Tone output that records instead of playing
#[derive(Debug, Clone, Default)]
pub struct RecordingToneOutput {
    shared: Arc<Shared>,
    /// Starts beyond this count fail
    fail_after: Option<usize>,
}

impl RecordingToneOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `start_tone` fails
    pub fn unavailable() -> Self {
        Self::failing_after(0)
    }

    /// The first `starts` tones succeed, later ones fail
    pub fn failing_after(starts: usize) -> Self {
        Self {
            shared: Arc::default(),
            fail_after: Some(starts),
        }
    }

    pub fn events(&self) -> Vec<ToneEvent> {
        self.shared
            .events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Frequencies of started tones, in start order
    pub fn started_frequencies(&self) -> Vec<f64> {
        self.events()
            .iter()
            .filter(|e| e.kind == ToneEventKind::Started)
            .map(|e| e.spec.frequency_hz)
            .collect()
    }

    /// Tones currently sounding
    pub fn active_tones(&self) -> usize {
        self.shared.active.load(Ordering::SeqCst)
    }

    /// Largest number of tones ever sounding at once
    pub fn peak_active_tones(&self) -> usize {
        self.shared.peak_active.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.shared.events.lock() {
            events.clear();
        }
        self.shared.peak_active.store(self.active_tones(), Ordering::SeqCst);
    }

    fn record(&self, kind: ToneEventKind, spec: ToneSpec) -> Result<(), AudioError> {
        let mut events = self
            .shared
            .events
            .lock()
            .map_err(|_| AudioError::LockPoisoned {
                component: "RecordingToneOutput".to_string(),
            })?;
        events.push(ToneEvent {
            kind,
            spec,
            at: Instant::now(),
        });
        Ok(())
    }
}

impl ToneOutput for RecordingToneOutput {
    fn start_tone(&self, spec: &ToneSpec) -> Result<Box<dyn ToneHandle>, AudioError> {
        let attempt = self.shared.starts.fetch_add(1, Ordering::SeqCst);
        if self.fail_after.is_some_and(|limit| attempt >= limit) {
            return Err(AudioError::AudioUnavailable {
                reason: format!("injected failure on tone {}", attempt + 1),
            });
        }

        self.record(ToneEventKind::Started, *spec)?;
        let active = self.shared.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.peak_active.fetch_max(active, Ordering::SeqCst);

        Ok(Box::new(RecordingToneHandle {
            output: self.clone(),
            spec: *spec,
        }))
    }
}

struct RecordingToneHandle {
    output: RecordingToneOutput,
    spec: ToneSpec,
}

impl ToneHandle for RecordingToneHandle {
    fn stop(self: Box<Self>) {
        // Release happens in Drop
    }
}

impl Drop for RecordingToneHandle {
    fn drop(&mut self) {
        self.output.shared.active.fetch_sub(1, Ordering::SeqCst);
        if let Err(err) = self.output.record(ToneEventKind::Released, self.spec) {
            tracing::warn!("[RecordingToneOutput] Release not recorded: {}", err);
        }
    }
}
