use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::{Error, Result};

/// Closed numeric range, `min <= max`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub min: f64,
    pub max: f64,
}

impl Span {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Point at fraction `t` of the way from `min` to `max`.
    pub fn at(&self, t: f64) -> f64 {
        self.min + (self.max - self.min) * t
    }

    pub fn contains(&self, v: f64) -> bool {
        v >= self.min && v <= self.max
    }
}

/// The three game variants collapsed into one constant set each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Variant {
    /// Plain platform runner, keyboard or any signal, no obstacles.
    Classic,
    /// Expression-driven runner with spikes and saws.
    Face,
    /// Pitch-driven runner with spikes, saws and a speed ramp.
    Voice,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    pub width: f64,
    pub height: f64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            width: 520.0,
            height: 800.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    pub gravity: f64,
    /// Upward velocity applied by a default jump (negative is up).
    pub jump_impulse: f64,
    pub scroll_speed: f64,
    /// Added to the scroll speed for every tick of play.
    pub speed_gain: f64,
    pub max_speed: f64,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: 0.7,
            jump_impulse: -15.0,
            scroll_speed: 6.0,
            speed_gain: 0.0,
            max_speed: 6.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Fixed screen-space x of the player's center.
    pub anchor_x: f64,
    /// Side of the square sprite box.
    pub size: f64,
    /// Sprite height while ducking, as a fraction of `size`.
    pub duck_ratio: f64,
    pub hitbox_width_ratio: f64,
    pub hitbox_height_ratio: f64,
    /// Inset applied to both platform edges before the horizontal overlap test.
    pub edge_inset: f64,
    /// How far above a platform top the previous foot position may sit and still land.
    pub landing_tolerance: f64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            anchor_x: 160.0,
            size: 85.0,
            duck_ratio: 0.5,
            hitbox_width_ratio: 0.6,
            hitbox_height_ratio: 0.7,
            edge_inset: 4.0,
            landing_tolerance: 2.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// Vertical band for platform tops, as fractions of the viewport height.
    pub band: Span,
    pub max_delta_y: f64,
    pub thin_probability: f64,
    pub thin_width: Span,
    pub normal_width: Span,
    pub thin_gap: Span,
    pub normal_gap: Span,
    pub height: f64,
    pub safe_width: f64,
    /// Platforms appended by `seed()` after the safe one.
    pub seed_count: usize,
    /// Generation keeps platforms this many viewport widths ahead.
    pub lookahead: f64,
    /// Platforms further than this many viewport widths off the left edge are dropped.
    pub prune_margin: f64,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            band: Span::new(0.35, 0.6),
            max_delta_y: 80.0,
            thin_probability: 0.3,
            thin_width: Span::new(60.0, 90.0),
            normal_width: Span::new(150.0, 230.0),
            thin_gap: Span::new(80.0, 130.0),
            normal_gap: Span::new(130.0, 200.0),
            height: 40.0,
            safe_width: 260.0,
            seed_count: 3,
            lookahead: 2.0,
            prune_margin: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObstacleConfig {
    pub enabled: bool,
    /// Platforms must be strictly wider than this to carry an obstacle.
    pub min_platform_width: f64,
    pub none_probability: f64,
    pub spike_probability: f64,
    pub spike_width: f64,
    pub spike_height: f64,
    pub saw_size: f64,
    /// Gap between a platform top and the bottom of the saw above it.
    pub saw_clearance: f64,
    /// Saw rotation per tick, radians.
    pub saw_spin: f64,
}

impl Default for ObstacleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_platform_width: 140.0,
            none_probability: 0.2,
            spike_probability: 0.35,
            spike_width: 30.0,
            spike_height: 30.0,
            saw_size: 44.0,
            saw_clearance: 40.0,
            saw_spin: 0.15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceConfig {
    pub roll: f64,
    pub yaw: f64,
    pub pitch_min: f64,
    pub pitch_max: f64,
    /// Freeze physics while a posture warning is showing.
    pub pause_on_warning: bool,
}

impl Default for FaceConfig {
    fn default() -> Self {
        Self {
            roll: 0.15,
            yaw: 0.25,
            pitch_min: 0.4,
            pitch_max: 1.8,
            pause_on_warning: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    pub volume_threshold: f64,
    /// Largest accepted jump from the last valid frequency, Hz.
    pub outlier_hz: f64,
    pub smoothing: f64,
    pub silence_decay: f64,
    /// Lower edge of the duck band, cents.
    pub duck_cents: f64,
    /// Cents range mapped onto `impulse`; its lower edge starts the jump band.
    pub jump_cents: Span,
    /// Jump strength range (positive, applied upward).
    pub impulse: Span,
    pub calibration_ticks: u32,
    pub calibration_min_samples: usize,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            volume_threshold: 0.015,
            outlier_hz: 300.0,
            smoothing: 0.4,
            silence_decay: 0.8,
            duck_cents: -150.0,
            jump_cents: Span::new(200.0, 700.0),
            impulse: Span::new(10.0, 22.0),
            calibration_ticks: 180,
            calibration_min_samples: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub ticks_per_second: f64,
    /// Cosmetic wave scroll per tick.
    pub wave_speed: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ticks_per_second: 60.0,
            wave_speed: 0.8,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub viewport: ViewportConfig,
    pub physics: PhysicsConfig,
    pub player: PlayerConfig,
    pub platforms: PlatformConfig,
    pub obstacles: ObstacleConfig,
    pub face: FaceConfig,
    pub voice: VoiceConfig,
    pub session: SessionConfig,
}

impl GameConfig {
    pub fn preset(variant: Variant) -> Self {
        let mut cfg = Self::default();
        match variant {
            Variant::Classic => {}
            Variant::Face => {
                cfg.physics.gravity = 0.8;
                cfg.physics.jump_impulse = -18.0;
                cfg.obstacles.enabled = true;
                cfg.face.pause_on_warning = true;
            }
            Variant::Voice => {
                cfg.physics.gravity = 0.8;
                cfg.physics.scroll_speed = 5.0;
                cfg.physics.speed_gain = 1.0 / 500.0;
                cfg.physics.max_speed = 15.0;
                cfg.obstacles.enabled = true;
            }
        }
        cfg
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("viewport.width", self.viewport.width),
            ("viewport.height", self.viewport.height),
            ("physics.gravity", self.physics.gravity),
            ("player.size", self.player.size),
            ("platforms.height", self.platforms.height),
            ("platforms.safe_width", self.platforms.safe_width),
            ("platforms.thin_width.min", self.platforms.thin_width.min),
            ("platforms.normal_width.min", self.platforms.normal_width.min),
            ("session.ticks_per_second", self.session.ticks_per_second),
        ];
        for (name, value) in positive {
            if !(value > 0.0) {
                return Err(Error::Config(format!("{name} must be > 0, got {value}")));
            }
        }
        if self.physics.jump_impulse >= 0.0 {
            return Err(Error::Config(format!(
                "physics.jump_impulse must be negative (upward), got {}",
                self.physics.jump_impulse
            )));
        }
        let spans = [
            ("platforms.band", self.platforms.band),
            ("platforms.thin_width", self.platforms.thin_width),
            ("platforms.normal_width", self.platforms.normal_width),
            ("platforms.thin_gap", self.platforms.thin_gap),
            ("platforms.normal_gap", self.platforms.normal_gap),
            ("voice.jump_cents", self.voice.jump_cents),
            ("voice.impulse", self.voice.impulse),
        ];
        for (name, span) in spans {
            if span.min > span.max {
                return Err(Error::Config(format!(
                    "{name} is inverted: min {} > max {}",
                    span.min, span.max
                )));
            }
        }
        if self.voice.jump_cents.min >= self.voice.jump_cents.max {
            return Err(Error::Config("voice.jump_cents must not be empty".to_string()));
        }
        let probabilities = [
            ("platforms.thin_probability", self.platforms.thin_probability),
            ("obstacles.none_probability", self.obstacles.none_probability),
            ("obstacles.spike_probability", self.obstacles.spike_probability),
            ("voice.smoothing", self.voice.smoothing),
            ("voice.silence_decay", self.voice.silence_decay),
        ];
        for (name, p) in probabilities {
            if !(0.0..=1.0).contains(&p) {
                return Err(Error::Config(format!("{name} must be in [0, 1], got {p}")));
            }
        }
        if self.obstacles.none_probability + self.obstacles.spike_probability > 1.0 {
            return Err(Error::Config(
                "obstacles.none_probability + spike_probability must not exceed 1".to_string(),
            ));
        }
        if self.platforms.lookahead < 1.5 {
            return Err(Error::Config(format!(
                "platforms.lookahead must be >= 1.5 viewports, got {}",
                self.platforms.lookahead
            )));
        }
        if self.platforms.safe_width <= self.player.size * self.player.hitbox_width_ratio {
            return Err(Error::Config(
                "platforms.safe_width must fit the player's hitbox".to_string(),
            ));
        }
        let oc = &self.obstacles;
        if oc.enabled && oc.spike_width > oc.min_platform_width / 3.0 {
            return Err(Error::Config(format!(
                "obstacles.spike_width {} must fit the middle third of a {} wide platform",
                oc.spike_width, oc.min_platform_width
            )));
        }
        if oc.enabled && oc.saw_size > oc.min_platform_width {
            return Err(Error::Config(format!(
                "obstacles.saw_size {} must not exceed obstacles.min_platform_width {}",
                oc.saw_size, oc.min_platform_width
            )));
        }
        if self.voice.calibration_ticks == 0 {
            return Err(Error::Config("voice.calibration_ticks must be > 0".to_string()));
        }
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let cfg: Self = toml::from_str(&content)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Like [`GameConfig::load`], but any failure falls back to `fallback`.
    pub fn load_or(path: &Path, fallback: Self) -> Self {
        if !path.exists() {
            return fallback;
        }
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                warn!("failed to load config {}: {err}; using defaults", path.display());
                fallback
            }
        }
    }

    pub fn load_or_default(path: &Path) -> Self {
        Self::load_or(path, Self::default())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Platform-top band in world y.
    pub fn platform_band(&self) -> Span {
        Span::new(
            self.viewport.height * self.platforms.band.min,
            self.viewport.height * self.platforms.band.max,
        )
    }
}
