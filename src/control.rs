//! Turns sensor frames into per-tick signals and drives a [`GameSession`].

use std::str::FromStr;

use tracing::{debug, info};

use crate::config::GameConfig;
use crate::face::{Expression, ExpressionScores, FaceClassifier, FaceReading, Point};
use crate::random::Uniform;
use crate::sensor::Subscription;
use crate::session::{GameSession, PauseReason, SessionState};
use crate::signal::{Action, ActionSignal};
use crate::voice::{PitchSample, VoiceClassifier, frequency_to_note};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMode {
    /// Keyboard only, no sensor.
    Keys,
    Face,
    Voice,
}

/// One decoded reading from whichever sensor is attached.
#[derive(Debug, Clone, PartialEq)]
pub enum SensorFrame {
    /// `None` when the detector found no face. Landmark counts are checked by the classifier.
    Face(Option<FaceReading>),
    Pitch(PitchSample),
}

/// Line format used by sensor feeds:
///
/// ```text
/// pitch <hz> <level>
/// face none
/// face <expr>=<score>[,<expr>=<score>...] <x>,<y> <x>,<y> ...   (68 points)
/// ```
impl FromStr for SensorFrame {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        match words.next() {
            Some("pitch") => {
                let frequency = number(words.next(), "frequency")?;
                let level = number(words.next(), "level")?;
                Ok(Self::Pitch(PitchSample::new(frequency, level)))
            }
            Some("face") => {
                let Some(scores) = words.next() else {
                    return Err(Error::Sensor("face frame without expressions".to_string()));
                };
                if scores == "none" {
                    return Ok(Self::Face(None));
                }
                let expressions = scores
                    .split(',')
                    .map(parse_score)
                    .collect::<Result<ExpressionScores>>()?;
                let points = words.map(parse_point).collect::<Result<Vec<_>>>()?;
                Ok(Self::Face(Some(FaceReading {
                    points,
                    expressions,
                })))
            }
            Some(other) => Err(Error::Sensor(format!("unknown frame kind {other:?}"))),
            None => Err(Error::Sensor("empty frame".to_string())),
        }
    }
}

fn number(word: Option<&str>, what: &str) -> Result<f64> {
    word.and_then(|w| w.parse().ok())
        .ok_or_else(|| Error::Sensor(format!("missing or bad {what}")))
}

fn parse_score(entry: &str) -> Result<(Expression, f64)> {
    let (name, score) = entry
        .split_once('=')
        .ok_or_else(|| Error::Sensor(format!("bad expression score {entry:?}")))?;
    let expression = Expression::from_name(name)
        .ok_or_else(|| Error::Sensor(format!("unknown expression {name:?}")))?;
    Ok((expression, number(Some(score), "expression score")?))
}

fn parse_point(entry: &str) -> Result<Point> {
    let (x, y) = entry
        .split_once(',')
        .ok_or_else(|| Error::Sensor(format!("bad point {entry:?}")))?;
    Ok(Point::new(number(Some(x), "x")?, number(Some(y), "y")?))
}

enum Classifier {
    Keys,
    Face(FaceClassifier),
    Voice(VoiceClassifier),
}

/// What happened on a tick, for sound effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickEvents {
    pub jumped: bool,
    pub died: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationStatus {
    pub progress: f64,
    pub message: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PitchReadout {
    pub frequency: f64,
    pub note: Option<String>,
    pub cents: Option<f64>,
    /// Strength a jump would get at the current pitch, when above the jump band.
    pub impulse: Option<f64>,
}

pub struct Controller {
    mode: ControlMode,
    session: GameSession,
    classifier: Classifier,
    feed: Option<Subscription<SensorFrame>>,
    signal: ActionSignal,
    held: Option<(Action, u32)>,
}

impl Controller {
    pub fn new(mode: ControlMode, cfg: GameConfig, rng: Box<dyn Uniform + Send>) -> Self {
        let classifier = match mode {
            ControlMode::Keys => Classifier::Keys,
            ControlMode::Face => Classifier::Face(FaceClassifier::new(cfg.face.clone())),
            ControlMode::Voice => Classifier::Voice(VoiceClassifier::new(cfg.voice.clone())),
        };
        Self {
            mode,
            session: GameSession::new(cfg, rng),
            classifier,
            feed: None,
            signal: ActionSignal::IDLE,
            held: None,
        }
    }

    pub fn mode(&self) -> ControlMode {
        self.mode
    }

    pub fn session(&self) -> &GameSession {
        &self.session
    }

    /// Attaches a sensor, cancelling the previous one.
    pub fn attach(&mut self, feed: Subscription<SensorFrame>) {
        self.stop_signal();
        self.feed = Some(feed);
    }

    /// Cancels the sensor subscription and resets the signal to idle. Safe to call repeatedly.
    pub fn stop_signal(&mut self) {
        if let Some(mut feed) = self.feed.take() {
            feed.cancel();
            info!("sensor feed stopped");
        }
        if let Classifier::Face(face) = &mut self.classifier {
            face.reset();
        }
        self.signal = ActionSignal::IDLE;
    }

    /// True when a sensor feed is attached. Face and voice modes sit idle without one.
    pub fn has_feed(&self) -> bool {
        self.feed.is_some()
    }

    pub fn signal(&self) -> ActionSignal {
        self.signal
    }

    pub fn start_session(&mut self) -> bool {
        self.session.start()
    }

    pub fn restart_session(&mut self) {
        self.held = None;
        self.session.restart();
    }

    /// Starts a new voice calibration window. False outside voice mode.
    pub fn recalibrate(&mut self) -> bool {
        match &mut self.classifier {
            Classifier::Voice(voice) => {
                voice.recalibrate();
                true
            }
            _ => false,
        }
    }

    /// One-shot replacement for the sensor action on the next playing tick.
    pub fn set_action_override(&mut self, action: Action) {
        self.session.set_action_override(action);
    }

    /// Keyboard hold: `action` replaces the sensor action for the next `ticks` ticks.
    pub fn hold(&mut self, action: Action, ticks: u32) {
        self.held = (ticks > 0).then_some((action, ticks));
    }

    pub fn calibration(&self) -> Option<CalibrationStatus> {
        let Classifier::Voice(voice) = &self.classifier else {
            return None;
        };
        Some(CalibrationStatus {
            progress: voice.calibration_progress()?,
            message: voice.calibration_message()?,
        })
    }

    pub fn pitch(&self) -> Option<PitchReadout> {
        let Classifier::Voice(voice) = &self.classifier else {
            return None;
        };
        let frequency = voice.smoothed();
        let cents = voice.cents();
        let jump_from = self.session.config().voice.jump_cents.min;
        Some(PitchReadout {
            frequency,
            note: frequency_to_note(frequency),
            cents,
            impulse: cents
                .filter(|c| *c >= jump_from)
                .map(|c| voice.jump_impulse(c)),
        })
    }

    pub fn expression(&self) -> Option<Expression> {
        match &self.classifier {
            Classifier::Face(face) => Some(face.expression()),
            _ => None,
        }
    }

    /// Folds in whatever the sensor delivered since the last tick. Without fresh data
    /// the previous signal stands.
    fn poll(&mut self) {
        let Some(feed) = self.feed.as_mut() else {
            return;
        };
        match &mut self.classifier {
            Classifier::Keys => {
                feed.drain();
            }
            Classifier::Face(face) => {
                // only the newest detection matters
                let newest = feed
                    .drain()
                    .into_iter()
                    .rev()
                    .find_map(|frame| match frame {
                        SensorFrame::Face(reading) => Some(reading),
                        SensorFrame::Pitch(_) => None,
                    });
                if let Some(reading) = newest {
                    self.signal = face.classify_reading(reading.as_ref());
                }
            }
            Classifier::Voice(voice) => {
                for frame in feed.drain() {
                    match frame {
                        SensorFrame::Pitch(sample) => self.signal = voice.feed(sample),
                        SensorFrame::Face(_) => debug!("face frame ignored in voice mode"),
                    }
                }
            }
        }
    }

    fn pause_reason(&self) -> Option<PauseReason> {
        match &self.classifier {
            Classifier::Voice(voice) if voice.is_calibrating() => Some(PauseReason::Calibrating),
            Classifier::Face(_)
                if self.session.config().face.pause_on_warning && self.signal.warning.is_some() =>
            {
                Some(PauseReason::Posture)
            }
            _ => None,
        }
    }

    pub fn tick(&mut self) -> TickEvents {
        self.poll();
        self.session.set_paused(self.pause_reason());

        let mut signal = self.signal;
        if let Some((action, left)) = self.held.take() {
            signal.action = action;
            if left > 1 {
                self.held = Some((action, left - 1));
            }
        }

        let was_grounded = self.session.player().on_ground;
        let was_playing = self.session.state() == SessionState::Playing;
        self.session.tick(&signal);

        let player = self.session.player();
        TickEvents {
            jumped: was_grounded && !player.on_ground && player.vy < 0.0,
            died: was_playing && self.session.state() == SessionState::GameOver,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Variant;
    use crate::face::tests::frontal_points;
    use crate::random::RandSource;
    use crate::sensor;
    use crate::signal::PostureWarning;

    fn controller(mode: ControlMode, variant: Variant) -> Controller {
        Controller::new(
            mode,
            GameConfig::preset(variant),
            Box::new(RandSource::seeded(5)),
        )
    }

    fn face_line(expression: &str, points: &[Point]) -> String {
        let coords: Vec<String> = points.iter().map(|p| format!("{},{}", p.x, p.y)).collect();
        format!("face {expression}=0.9,neutral=0.1 {}", coords.join(" "))
    }

    #[test]
    fn parses_frames() {
        let frame: SensorFrame = "pitch 220.5 0.3".parse().unwrap();
        assert_eq!(frame, SensorFrame::Pitch(PitchSample::new(220.5, 0.3)));

        assert_eq!("face none".parse::<SensorFrame>().unwrap(), SensorFrame::Face(None));

        let frame: SensorFrame = face_line("happy", &frontal_points()).parse().unwrap();
        let SensorFrame::Face(Some(face)) = frame else {
            panic!("expected a face");
        };
        assert_eq!(face.expressions.dominant(), Expression::Happy);
        assert_eq!(face.points.len(), crate::face::LANDMARK_COUNT);

        // short landmark sets still parse; the classifier decides what they mean
        let frame: SensorFrame = "face happy=1.0 1,2 3,4".parse().unwrap();
        let SensorFrame::Face(Some(face)) = frame else {
            panic!("expected a face");
        };
        assert_eq!(face.points, vec![Point::new(1.0, 2.0), Point::new(3.0, 4.0)]);
    }

    #[test]
    fn rejects_malformed_frames() {
        assert!("".parse::<SensorFrame>().is_err());
        assert!("pitch abc 0.3".parse::<SensorFrame>().is_err());
        assert!("pitch 220".parse::<SensorFrame>().is_err());
        assert!("face grumpy=1.0".parse::<SensorFrame>().is_err());
        assert!("blink 1".parse::<SensorFrame>().is_err());
        assert!(matches!(
            "face happy=1.0 1,2 3".parse::<SensorFrame>(),
            Err(Error::Sensor(_))
        ));
    }

    #[test]
    fn short_face_frame_goes_idle_without_warning() {
        let mut c = controller(ControlMode::Face, Variant::Face);
        let (tx, rx) = sensor::channel();
        c.attach(rx);
        c.start_session();

        tx.publish(face_line("sad", &frontal_points()).parse().unwrap());
        c.tick();
        assert_eq!(c.signal().action, Action::Duck);

        tx.publish(face_line("sad", &frontal_points()[..40]).parse().unwrap());
        c.tick();
        assert_eq!(c.signal(), ActionSignal::IDLE);
        assert_eq!(c.expression(), Some(Expression::Neutral));
        assert_eq!(c.session().paused(), None);
        assert!(!c.session().player().is_ducking);
    }

    #[test]
    fn face_frames_drive_the_runner() {
        let mut c = controller(ControlMode::Face, Variant::Face);
        let (tx, rx) = sensor::channel();
        c.attach(rx);
        c.start_session();

        let frame: SensorFrame = face_line("happy", &frontal_points()).parse().unwrap();
        tx.publish(frame);
        let events = c.tick();
        assert!(events.jumped);
        assert_eq!(c.expression(), Some(Expression::Happy));

        // no new frame: the happy signal is reused, but a jump needs the ground again
        let events = c.tick();
        assert!(!events.jumped);
        assert_eq!(c.signal().action, Action::Jump(None));
    }

    #[test]
    fn posture_warning_pauses_face_runs() {
        let mut c = controller(ControlMode::Face, Variant::Face);
        let (tx, rx) = sensor::channel();
        c.attach(rx);
        c.start_session();

        let mut tilted = frontal_points();
        tilted[crate::face::RIGHT_EYE_OUTER].y += 40.0;
        tx.publish(face_line("happy", &tilted).parse().unwrap());
        c.tick();
        assert_eq!(c.signal().warning, Some(PostureWarning::Roll));
        assert_eq!(c.session().paused(), Some(PauseReason::Posture));
        assert_eq!(c.session().world_offset(), 0.0);

        tx.publish(SensorFrame::Face(None));
        c.tick();
        assert_eq!(c.session().paused(), None);
        assert!(c.session().world_offset() > 0.0);
    }

    #[test]
    fn voice_mode_calibrates_then_jumps_on_high_pitch() {
        let mut c = controller(ControlMode::Voice, Variant::Voice);
        let (tx, rx) = sensor::channel();
        c.attach(rx);
        c.start_session();

        for _ in 0..180 {
            tx.publish(SensorFrame::Pitch(PitchSample::new(200.0, 0.5)));
            c.tick();
            if c.calibration().is_some() {
                assert_eq!(c.session().paused(), Some(PauseReason::Calibrating));
            }
        }
        assert_eq!(c.calibration(), None);
        // only the tick that finished calibration got to scroll
        assert_eq!(c.session().world_offset(), 5.0 + 1.0 / 500.0);

        // an octave up is far into the jump band; smoothing needs a few samples to get there
        let mut jumped = false;
        for _ in 0..10 {
            tx.publish(SensorFrame::Pitch(PitchSample::new(400.0, 0.5)));
            jumped |= c.tick().jumped;
        }
        assert!(jumped);
        let readout = c.pitch().unwrap();
        assert!(readout.cents.unwrap() > 200.0);
        assert!(readout.impulse.is_some());
    }

    #[test]
    fn jump_pressed_during_calibration_is_not_replayed() {
        let mut c = controller(ControlMode::Voice, Variant::Voice);
        let (tx, rx) = sensor::channel();
        c.attach(rx);
        c.start_session();

        for i in 0..180 {
            if i == 10 {
                c.set_action_override(Action::Jump(None));
            }
            tx.publish(SensorFrame::Pitch(PitchSample::new(200.0, 0.5)));
            assert!(!c.tick().jumped);
        }
        assert_eq!(c.calibration(), None);
        assert!(c.session().player().on_ground);
    }

    #[test]
    fn recalibrate_only_in_voice_mode() {
        let mut keys = controller(ControlMode::Keys, Variant::Classic);
        assert!(!keys.recalibrate());
        assert_eq!(keys.calibration(), None);
        assert_eq!(keys.pitch(), None);

        let mut voice = controller(ControlMode::Voice, Variant::Voice);
        assert!(voice.recalibrate());
        let status = voice.calibration().unwrap();
        assert_eq!(status.progress, 0.0);
    }

    #[test]
    fn held_duck_expires() {
        let mut c = controller(ControlMode::Keys, Variant::Classic);
        c.start_session();
        c.hold(Action::Duck, 2);
        c.tick();
        assert!(c.session().player().is_ducking);
        c.tick();
        assert!(c.session().player().is_ducking);
        c.tick();
        assert!(!c.session().player().is_ducking);
    }

    #[test]
    fn stop_signal_goes_idle_and_cancels_feed() {
        let mut c = controller(ControlMode::Face, Variant::Face);
        assert!(!c.has_feed());
        let (tx, rx) = sensor::channel();
        c.attach(rx);
        assert!(c.has_feed());
        tx.publish(face_line("sad", &frontal_points()).parse().unwrap());
        c.tick();
        assert_eq!(c.signal().action, Action::Duck);

        c.stop_signal();
        assert_eq!(c.signal(), ActionSignal::IDLE);
        assert_eq!(c.expression(), Some(Expression::Neutral));
        assert!(!c.has_feed());
        assert!(!tx.is_active());
        c.stop_signal();
        c.tick();
        assert_eq!(c.signal(), ActionSignal::IDLE);
    }

    #[test]
    fn death_is_reported_once() {
        let mut c = controller(ControlMode::Keys, Variant::Classic);
        c.start_session();
        let mut deaths = 0;
        for _ in 0..2_000 {
            if c.tick().died {
                deaths += 1;
            }
        }
        assert_eq!(deaths, 1);
        c.restart_session();
        assert_eq!(c.session().state(), SessionState::Playing);
    }
}
