//! Face-expression control.
//!
//! A detection is 68 landmark points plus expression scores. Before an expression
//! is trusted the head posture is checked on three axes, in fixed order
//! roll → yaw → pitch; the first violated axis suppresses control for the frame.

use tracing::debug;

use crate::config::FaceConfig;
use crate::signal::{Action, ActionSignal, PostureWarning};
use crate::{Error, Result};

pub const LANDMARK_COUNT: usize = 68;

pub const LEFT_EYE_OUTER: usize = 36;
pub const RIGHT_EYE_OUTER: usize = 45;
pub const NOSE_TIP: usize = 30;
pub const MOUTH_LEFT: usize = 48;
pub const MOUTH_RIGHT: usize = 54;

const DEGENERATE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn dist(self, other: Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Landmarks(Box<[Point; LANDMARK_COUNT]>);

impl Landmarks {
    pub fn from_points(points: &[Point]) -> Result<Self> {
        let arr: [Point; LANDMARK_COUNT] = points.try_into().map_err(|_| {
            Error::Landmarks(format!(
                "expected {LANDMARK_COUNT} points, got {}",
                points.len()
            ))
        })?;
        if arr.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
            return Err(Error::Landmarks("non-finite coordinate".to_string()));
        }
        Ok(Self(Box::new(arr)))
    }

    pub fn left_eye(&self) -> Point {
        self.0[LEFT_EYE_OUTER]
    }

    pub fn right_eye(&self) -> Point {
        self.0[RIGHT_EYE_OUTER]
    }

    pub fn nose(&self) -> Point {
        self.0[NOSE_TIP]
    }

    /// Midpoint of the two mouth corners.
    pub fn mouth(&self) -> Point {
        let (l, r) = (self.0[MOUTH_LEFT], self.0[MOUTH_RIGHT]);
        Point::new((l.x + r.x) / 2.0, (l.y + r.y) / 2.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Expression {
    Neutral,
    Happy,
    Sad,
    Angry,
    Fearful,
    Disgusted,
    Surprised,
}

impl Expression {
    pub const ALL: [Expression; 7] = [
        Self::Neutral,
        Self::Happy,
        Self::Sad,
        Self::Angry,
        Self::Fearful,
        Self::Disgusted,
        Self::Surprised,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Neutral => "neutral",
            Self::Happy => "happy",
            Self::Sad => "sad",
            Self::Angry => "angry",
            Self::Fearful => "fearful",
            Self::Disgusted => "disgusted",
            Self::Surprised => "surprised",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.name() == name)
    }

    pub fn action(self) -> Action {
        match self {
            Self::Happy | Self::Surprised => Action::Jump(None),
            Self::Sad | Self::Angry | Self::Fearful | Self::Disgusted => Action::Duck,
            Self::Neutral => Action::Idle,
        }
    }
}

/// Expression probabilities in the order the detector reported them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpressionScores(Vec<(Expression, f64)>);

impl ExpressionScores {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a score, keeping the original position if the expression is already present.
    pub fn set(&mut self, expression: Expression, score: f64) {
        match self.0.iter_mut().find(|(e, _)| *e == expression) {
            Some(slot) => slot.1 = score,
            None => self.0.push((expression, score)),
        }
    }

    pub fn with(mut self, expression: Expression, score: f64) -> Self {
        self.set(expression, score);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (Expression, f64)> + '_ {
        self.0.iter().copied()
    }

    /// Strictly greatest score wins, earlier entries win ties, and nothing above 0 means neutral.
    pub fn dominant(&self) -> Expression {
        let mut best = 0.0;
        let mut dominant = Expression::Neutral;
        for (expression, score) in self.iter() {
            if score > best {
                best = score;
                dominant = expression;
            }
        }
        dominant
    }
}

impl FromIterator<(Expression, f64)> for ExpressionScores {
    fn from_iter<I: IntoIterator<Item = (Expression, f64)>>(iter: I) -> Self {
        let mut scores = Self::new();
        for (e, s) in iter {
            scores.set(e, s);
        }
        scores
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FaceDetection {
    pub landmarks: Landmarks,
    pub expressions: ExpressionScores,
}

impl FaceDetection {
    pub fn new(points: &[Point], expressions: ExpressionScores) -> Result<Self> {
        Ok(Self {
            landmarks: Landmarks::from_points(points)?,
            expressions,
        })
    }
}

/// Detector output as it arrives from a feed, not yet checked for shape.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FaceReading {
    pub points: Vec<Point>,
    pub expressions: ExpressionScores,
}

/// Posture ratios measured from one landmark set. `None` means the axis can't be judged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceAngles {
    pub roll: Option<f64>,
    pub yaw: Option<f64>,
    pub pitch: Option<f64>,
}

impl FaceAngles {
    pub fn measure(lm: &Landmarks) -> Self {
        let (left, right, nose, mouth) = (lm.left_eye(), lm.right_eye(), lm.nose(), lm.mouth());
        let eye_dist = left.dist(right);
        let eye_mid = Point::new((left.x + right.x) / 2.0, (left.y + right.y) / 2.0);

        let (roll, yaw) = if eye_dist > DEGENERATE {
            (
                Some((left.y - right.y).abs() / eye_dist),
                Some((nose.x - eye_mid.x).abs() / eye_dist),
            )
        } else {
            (None, None)
        };

        let eye_to_nose = (nose.y - eye_mid.y).abs();
        let nose_to_mouth = (mouth.y - nose.y).abs();
        let pitch = (nose_to_mouth > 0.0).then(|| eye_to_nose / nose_to_mouth);

        Self { roll, yaw, pitch }
    }

    /// First violated axis, roll before yaw before pitch.
    pub fn check(&self, cfg: &FaceConfig) -> Option<PostureWarning> {
        if self.roll.is_some_and(|r| r > cfg.roll) {
            return Some(PostureWarning::Roll);
        }
        if self.yaw.is_some_and(|y| y > cfg.yaw) {
            return Some(PostureWarning::Yaw);
        }
        match self.pitch {
            Some(p) if p < cfg.pitch_min => Some(PostureWarning::ChinRaised),
            Some(p) if p > cfg.pitch_max => Some(PostureWarning::HeadLowered),
            _ => None,
        }
    }
}

pub fn check_face_angle(lm: &Landmarks, cfg: &FaceConfig) -> Option<PostureWarning> {
    FaceAngles::measure(lm).check(cfg)
}

pub struct FaceClassifier {
    cfg: FaceConfig,
    expression: Expression,
}

impl FaceClassifier {
    pub fn new(cfg: FaceConfig) -> Self {
        Self {
            cfg,
            expression: Expression::Neutral,
        }
    }

    /// Expression read on the last classified frame (neutral while suppressed).
    pub fn expression(&self) -> Expression {
        self.expression
    }

    pub fn classify(&mut self, detection: Option<&FaceDetection>) -> ActionSignal {
        let Some(face) = detection else {
            self.expression = Expression::Neutral;
            return ActionSignal::IDLE;
        };
        if let Some(warning) = check_face_angle(&face.landmarks, &self.cfg) {
            self.expression = Expression::Neutral;
            return ActionSignal::warned(warning);
        }
        self.expression = face.expressions.dominant();
        ActionSignal::new(self.expression.action())
    }

    /// Classifies raw detector output; malformed landmark sets read as idle.
    pub fn classify_points(
        &mut self,
        points: &[Point],
        expressions: &ExpressionScores,
    ) -> ActionSignal {
        match FaceDetection::new(points, expressions.clone()) {
            Ok(face) => self.classify(Some(&face)),
            Err(err) => {
                debug!("ignoring detection: {err}");
                self.classify(None)
            }
        }
    }

    /// Classifies one feed frame; `None` means the detector found no face.
    pub fn classify_reading(&mut self, reading: Option<&FaceReading>) -> ActionSignal {
        match reading {
            Some(r) => self.classify_points(&r.points, &r.expressions),
            None => self.classify(None),
        }
    }

    /// Forgets the last expression.
    pub fn reset(&mut self) {
        self.expression = Expression::Neutral;
    }
}
