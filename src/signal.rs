use std::fmt;

/// Discrete control decision for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Action {
    /// Jump if grounded. `None` uses the configured default impulse; `Some(v)` is a
    /// positive strength applied upward.
    Jump(Option<f64>),
    Duck,
    #[default]
    Idle,
}

/// Head-posture problem that suspends face control for a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostureWarning {
    Roll,
    Yaw,
    ChinRaised,
    HeadLowered,
}

impl PostureWarning {
    pub fn code(self) -> &'static str {
        match self {
            Self::Roll => "posture:roll",
            Self::Yaw => "posture:yaw",
            Self::ChinRaised => "posture:chin-raised",
            Self::HeadLowered => "posture:head-lowered",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::Roll => "Keep your head upright",
            Self::Yaw => "Face the camera (head turned sideways)",
            Self::ChinRaised => "Chin raised too high (look down a little)",
            Self::HeadLowered => "Head lowered too far (look up a little)",
        }
    }
}

impl fmt::Display for PostureWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ActionSignal {
    pub action: Action,
    /// Advisory only; never part of gameplay state.
    pub warning: Option<PostureWarning>,
}

impl ActionSignal {
    pub const IDLE: Self = Self {
        action: Action::Idle,
        warning: None,
    };

    pub fn new(action: Action) -> Self {
        Self {
            action,
            warning: None,
        }
    }

    pub fn warned(warning: PostureWarning) -> Self {
        Self {
            action: Action::Idle,
            warning: Some(warning),
        }
    }
}

impl From<Action> for ActionSignal {
    fn from(action: Action) -> Self {
        Self::new(action)
    }
}
