//! Voice-pitch control.
//!
//! Pitch is compared to a per-player baseline in cents, so the same bands work
//! for any vocal range. The baseline comes from a calibration window that must
//! collect enough voiced samples before it is accepted.

use tracing::{info, warn};

use crate::config::VoiceConfig;
use crate::signal::{Action, ActionSignal};

/// One decoded microphone reading.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PitchSample {
    /// Estimated fundamental in Hz, 0 when unvoiced.
    pub frequency: f64,
    /// Input level in `[0, 1]`.
    pub level: f64,
}

impl PitchSample {
    pub const fn new(frequency: f64, level: f64) -> Self {
        Self { frequency, level }
    }
}

/// Interval from `base` to `freq` in cents; 0 when either is missing.
pub fn frequency_to_cents(base: f64, freq: f64) -> f64 {
    if !(base > 0.0) || !(freq > 0.0) {
        return 0.0;
    }
    1200.0 * (freq / base).log2()
}

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Nearest equal-tempered note, e.g. `"A4"` for 440 Hz.
pub fn frequency_to_note(freq: f64) -> Option<String> {
    if !(freq >= 20.0) || !freq.is_finite() {
        return None;
    }
    let c0 = 440.0 * 2f64.powf(-4.75);
    let half_steps = (12.0 * (freq / c0).log2()).round() as i64;
    let octave = half_steps.div_euclid(12);
    let name = NOTE_NAMES[half_steps.rem_euclid(12) as usize];
    Some(format!("{name}{octave}"))
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Reading {
    Silent,
    Outlier,
    Voiced(f64),
}

#[derive(Debug, Clone, Default)]
struct Calibration {
    samples: Vec<f64>,
    elapsed: u32,
    retries: u32,
}

pub struct VoiceClassifier {
    cfg: VoiceConfig,
    baseline: f64,
    smoothed: f64,
    last_valid: f64,
    calibration: Option<Calibration>,
}

impl VoiceClassifier {
    /// Starts out calibrating.
    pub fn new(cfg: VoiceConfig) -> Self {
        Self {
            cfg,
            baseline: 0.0,
            smoothed: 0.0,
            last_valid: 0.0,
            calibration: Some(Calibration::default()),
        }
    }

    pub fn is_calibrating(&self) -> bool {
        self.calibration.is_some()
    }

    pub fn baseline(&self) -> Option<f64> {
        (self.baseline > 0.0).then_some(self.baseline)
    }

    pub fn smoothed(&self) -> f64 {
        self.smoothed
    }

    /// Current smoothed pitch relative to the baseline, once calibrated.
    pub fn cents(&self) -> Option<f64> {
        let base = self.baseline()?;
        (self.smoothed > 0.0).then(|| frequency_to_cents(base, self.smoothed))
    }

    /// Fraction of the current calibration window already elapsed.
    pub fn calibration_progress(&self) -> Option<f64> {
        self.calibration
            .as_ref()
            .map(|c| f64::from(c.elapsed) / f64::from(self.cfg.calibration_ticks))
    }

    pub fn calibration_message(&self) -> Option<&'static str> {
        self.calibration.as_ref().map(|c| {
            if c.retries == 0 {
                "Hum a comfortable note"
            } else {
                "Not enough sound detected, trying again"
            }
        })
    }

    /// Drops the baseline and every bit of smoothing state and starts a fresh window.
    pub fn recalibrate(&mut self) {
        self.baseline = 0.0;
        self.smoothed = 0.0;
        self.last_valid = 0.0;
        self.calibration = Some(Calibration::default());
        info!("voice calibration restarted");
    }

    /// Jump strength for a pitch `cents` above the baseline.
    pub fn jump_impulse(&self, cents: f64) -> f64 {
        let span = self.cfg.jump_cents;
        let t = ((cents - span.min) / (span.max - span.min)).clamp(0.0, 1.0);
        self.cfg.impulse.at(t)
    }

    fn read(&mut self, sample: PitchSample) -> Reading {
        let f = sample.frequency;
        if sample.level <= self.cfg.volume_threshold || !(f > 0.0) || !f.is_finite() {
            return Reading::Silent;
        }
        if self.last_valid > 0.0 && (f - self.last_valid).abs() > self.cfg.outlier_hz {
            return Reading::Outlier;
        }
        self.last_valid = f;
        Reading::Voiced(f)
    }

    fn decide(&self) -> Action {
        let Some(cents) = self.cents() else {
            return Action::Idle;
        };
        if cents >= self.cfg.jump_cents.min {
            Action::Jump(Some(self.jump_impulse(cents)))
        } else if cents >= self.cfg.duck_cents {
            Action::Duck
        } else {
            Action::Idle
        }
    }

    /// Consumes one fresh sample. Each call is one tick of the calibration window.
    pub fn feed(&mut self, sample: PitchSample) -> ActionSignal {
        let reading = self.read(sample);

        if let Some(cal) = self.calibration.as_mut() {
            if let Reading::Voiced(f) = reading {
                cal.samples.push(f);
            }
            cal.elapsed += 1;
            if cal.elapsed >= self.cfg.calibration_ticks {
                if cal.samples.len() >= self.cfg.calibration_min_samples {
                    let mean = cal.samples.iter().sum::<f64>() / cal.samples.len() as f64;
                    info!(
                        baseline = mean,
                        samples = cal.samples.len(),
                        "voice calibration complete"
                    );
                    self.baseline = mean;
                    self.calibration = None;
                } else {
                    warn!(
                        samples = cal.samples.len(),
                        needed = self.cfg.calibration_min_samples,
                        "not enough voiced samples, restarting calibration"
                    );
                    cal.samples.clear();
                    cal.elapsed = 0;
                    cal.retries += 1;
                }
            }
            return ActionSignal::IDLE;
        }

        match reading {
            Reading::Silent => {
                self.smoothed *= self.cfg.silence_decay;
                ActionSignal::IDLE
            }
            Reading::Outlier => ActionSignal::new(self.decide()),
            Reading::Voiced(f) => {
                let a = self.cfg.smoothing;
                self.smoothed = self.smoothed * (1.0 - a) + f * a;
                ActionSignal::new(self.decide())
            }
        }
    }
}
