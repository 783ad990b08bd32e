//! Motion-and-collision core for a side-scrolling platform runner.
//!
//! A renderer calls [`control::Controller::tick`] (or [`session::GameSession::tick`]
//! directly) once per frame and draws whatever [`session::GameSession::snapshot`]
//! returns. Sensor decoding happens elsewhere; this crate only consumes the
//! decoded numbers.

pub mod config;
pub mod control;
pub mod face;
pub mod player;
pub mod random;
pub mod sensor;
pub mod session;
pub mod signal;
pub mod voice;
pub mod world;

pub use config::{GameConfig, Variant};
pub use control::{ControlMode, Controller};
pub use player::PlayerBody;
pub use session::{GameSession, SessionState, Snapshot};
pub use signal::{Action, ActionSignal, PostureWarning};
pub use world::{Obstacle, ObstacleKind, Platform, PlatformGenerator};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("malformed landmarks: {0}")]
    Landmarks(String),

    #[error("sensor error: {0}")]
    Sensor(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}
