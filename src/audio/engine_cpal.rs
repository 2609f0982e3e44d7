// CpalToneOutput - desktop tone playback through the default output device
//
// Every tone runs on its own thread, which opens an output stream, plays it
// and closes it on release. `cpal::Stream` is not `Send`, so the stream never
// leaves that thread; the handle only holds a command sender. Samples are
// generated in the callback from a phase accumulator; a short linear ramp at
// start and stop avoids clicks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use super::tone::{ToneHandle, ToneOutput, ToneSpec, RAMP_MS};
use crate::error::AudioError;

/// Tone output backed by `cpal`'s default host
#[derive(Debug, Default)]
pub struct CpalToneOutput;

impl CpalToneOutput {
    pub fn new() -> Self {
        Self
    }

    fn create_output_stream(
        spec: &ToneSpec,
        releasing: Arc<AtomicBool>,
    ) -> Result<cpal::Stream, AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(AudioError::NoOutputDevice)?;

        let config = device
            .default_output_config()
            .map_err(|e| AudioError::StreamOpenFailed {
                reason: format!("Failed to get default output config: {:?}", e),
            })?;

        let stream_config: cpal::StreamConfig = config.clone().into();
        let channels_count = stream_config.channels as usize;
        let sample_rate = stream_config.sample_rate.0 as f64;

        let phase_step = spec.frequency_hz / sample_rate;
        let (left_gain, right_gain) = spec.channel_gains();
        let mono_gain = spec.gain;
        let ramp_samples = (sample_rate * RAMP_MS as f64 / 1000.0).max(1.0) as u32;

        let mut phase = 0.0f64;
        let mut attack = 0u32;
        let mut release = ramp_samples;

        let err_fn = |err| tracing::error!("[CpalToneOutput] Output stream error: {}", err);

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => device.build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let releasing = releasing.load(Ordering::Relaxed);

                    for frame in data.chunks_mut(channels_count) {
                        let envelope = if releasing {
                            release = release.saturating_sub(1);
                            release as f32 / ramp_samples as f32
                        } else {
                            attack = (attack + 1).min(ramp_samples);
                            attack as f32 / ramp_samples as f32
                        };

                        let sample = (phase * std::f64::consts::TAU).sin() as f32 * envelope;
                        phase = (phase + phase_step).fract();

                        match frame.len() {
                            1 => frame[0] = sample * mono_gain,
                            _ => {
                                frame[0] = sample * left_gain;
                                frame[1] = sample * right_gain;
                                for extra in frame.iter_mut().skip(2) {
                                    *extra = 0.0;
                                }
                            }
                        }
                    }
                },
                err_fn,
                None,
            ),
            _ => {
                return Err(AudioError::StreamOpenFailed {
                    reason: "Only F32 sample format is currently supported for output".to_string(),
                })
            }
        }
        .map_err(|e| AudioError::StreamOpenFailed {
            reason: format!("{:?}", e),
        })?;

        stream.play().map_err(|e| AudioError::AudioUnavailable {
            reason: format!("Output start failed: {}", e),
        })?;

        Ok(stream)
    }
}

impl ToneOutput for CpalToneOutput {
    fn start_tone(&self, spec: &ToneSpec) -> Result<Box<dyn ToneHandle>, AudioError> {
        let spec = *spec;
        let handle = spawn_tone_thread(
            move |releasing| Self::create_output_stream(&spec, releasing),
            |stream: cpal::Stream, _faded| {
                if let Err(err) = stream.pause() {
                    tracing::warn!("[CpalToneOutput] Pause on release failed: {}", err);
                }
            },
        )?;

        tracing::debug!(
            "[CpalToneOutput] Tone {:.1} Hz, gain {:.3}, pan {:+.1}",
            spec.frequency_hz,
            spec.gain,
            spec.pan
        );

        Ok(Box::new(handle))
    }
}

enum ToneCommand {
    /// Fade out, then close
    Release,
}

/// Open a tone resource on its own thread and keep it there until release
///
/// `open` receives the release flag the sample callback watches. `close`
/// runs on the same thread with `faded` set when the tone was stopped
/// rather than dropped. Open errors are returned before a handle exists.
fn spawn_tone_thread<T, O, C>(open: O, close: C) -> Result<CpalToneHandle, AudioError>
where
    O: FnOnce(Arc<AtomicBool>) -> Result<T, AudioError> + Send + 'static,
    C: FnOnce(T, bool) + Send + 'static,
{
    let (command_tx, command_rx) = mpsc::channel::<ToneCommand>();
    let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(), AudioError>>(1);

    thread::Builder::new()
        .name("tone-output".to_string())
        .spawn(move || {
            let releasing = Arc::new(AtomicBool::new(false));
            let resource = match open(Arc::clone(&releasing)) {
                Ok(resource) => resource,
                Err(err) => {
                    ready_tx.send(Err(err)).ok();
                    return;
                }
            };
            if ready_tx.send(Ok(())).is_err() {
                close(resource, false);
                return;
            }

            // A closed channel means the handle was dropped: no fade
            let faded = matches!(command_rx.recv(), Ok(ToneCommand::Release));
            if faded {
                releasing.store(true, Ordering::Relaxed);
                thread::sleep(Duration::from_millis(RAMP_MS as u64));
            }
            close(resource, faded);
        })
        .map_err(|e| AudioError::AudioUnavailable {
            reason: format!("Tone thread spawn failed: {}", e),
        })?;

    ready_rx.recv().map_err(|_| AudioError::AudioUnavailable {
        reason: "Tone thread exited before starting".to_string(),
    })??;

    Ok(CpalToneHandle {
        commands: command_tx,
    })
}

/// Controls one sounding tone; dropping it closes the stream immediately
struct CpalToneHandle {
    commands: mpsc::Sender<ToneCommand>,
}

impl ToneHandle for CpalToneHandle {
    fn stop(self: Box<Self>) {
        if self.commands.send(ToneCommand::Release).is_err() {
            tracing::warn!("[CpalToneOutput] Tone thread already gone on stop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    /// Tone thread over a dummy resource; reports (release flag, faded) on close
    fn spawn_recorder() -> (Box<dyn ToneHandle>, mpsc::Receiver<(bool, bool)>) {
        let (closed_tx, closed_rx) = mpsc::channel();
        let handle = spawn_tone_thread(Ok, move |releasing: Arc<AtomicBool>, faded| {
            closed_tx.send((releasing.load(Ordering::Relaxed), faded)).ok();
        })
        .unwrap();
        (Box::new(handle), closed_rx)
    }

    #[test]
    fn test_stop_does_not_wait_for_fade() {
        let (handle, closed) = spawn_recorder();

        let started = Instant::now();
        handle.stop();
        assert!(started.elapsed() < Duration::from_millis(RAMP_MS as u64));

        let (releasing, faded) = closed.recv_timeout(Duration::from_secs(1)).unwrap();
        assert!(releasing);
        assert!(faded);
        assert!(started.elapsed() >= Duration::from_millis(RAMP_MS as u64));
    }

    #[test]
    fn test_drop_closes_without_fade() {
        let (handle, closed) = spawn_recorder();
        drop(handle);

        let (releasing, faded) = closed.recv_timeout(Duration::from_secs(1)).unwrap();
        assert!(!releasing);
        assert!(!faded);
    }

    #[test]
    fn test_open_failure_returned_before_handle() {
        let result = spawn_tone_thread(
            |_| Err::<(), _>(AudioError::NoOutputDevice),
            |_, _| panic!("nothing to close"),
        );
        assert!(matches!(result, Err(AudioError::NoOutputDevice)));
    }

    #[test]
    fn test_handle_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<CpalToneHandle>();
        assert_send::<Box<dyn ToneHandle>>();
    }
}
