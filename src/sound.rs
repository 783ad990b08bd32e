use fundsp::prelude::*;
use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, OutputStreamHandle, Sink};
use tracing::warn;

const SAMPLE_RATE: u32 = 44_100;

/// Renders a mono generator for `seconds` into a sample buffer.
fn synth(mut unit: impl AudioUnit, seconds: f32) -> Vec<f32> {
    unit.set_sample_rate(SAMPLE_RATE as f64);
    let n = (SAMPLE_RATE as f32 * seconds) as usize;
    (0..n).map(|_| unit.get_mono()).collect()
}

/// Short upward chirp.
fn jump_samples() -> Vec<f32> {
    let freq = lfo(|t: f32| 300.0 + 600.0 * (t / 0.12).min(1.0));
    let gain = lfo(|t: f32| 0.2 * (1.0 - (t / 0.15).min(1.0)));
    synth((freq >> sine::<f32>()) * gain, 0.15)
}

/// Falling sawtooth, 400 Hz to 80 Hz.
fn death_samples() -> Vec<f32> {
    let freq = lfo(|t: f32| 400.0 - 320.0 * (t / 0.4).min(1.0));
    let gain = lfo(|t: f32| 0.15 * (1.0 - (t / 0.5).min(1.0)));
    synth((freq >> saw()) * gain, 0.5)
}

pub struct Sfx {
    _stream: OutputStream,
    handle: OutputStreamHandle,
    jump: Vec<f32>,
    death: Vec<f32>,
}

impl Sfx {
    /// `None` without an output device; the game then runs silent.
    pub fn open() -> Option<Self> {
        match OutputStream::try_default() {
            Ok((stream, handle)) => Some(Self {
                _stream: stream,
                handle,
                jump: jump_samples(),
                death: death_samples(),
            }),
            Err(err) => {
                warn!("no audio output, sound disabled: {err}");
                None
            }
        }
    }

    pub fn play_jump(&self) {
        self.play(&self.jump);
    }

    pub fn play_death(&self) {
        self.play(&self.death);
    }

    fn play(&self, samples: &[f32]) {
        let Ok(sink) = Sink::try_new(&self.handle) else {
            return;
        };
        sink.append(SamplesBuffer::new(1, SAMPLE_RATE, samples.to_vec()));
        sink.detach();
    }
}
