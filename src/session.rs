use tracing::{debug, info};

use crate::config::GameConfig;
use crate::player::PlayerBody;
use crate::random::{RandSource, Uniform};
use crate::signal::{Action, ActionSignal, PostureWarning};
use crate::world::{Obstacle, Platform, PlatformGenerator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Course laid out, waiting for `start()`.
    Ready,
    Playing,
    GameOver,
}

/// Why a playing session is temporarily not simulating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseReason {
    Calibrating,
    Posture,
}

/// Read-only view handed to the renderer.
#[derive(Debug, Clone, Copy)]
pub struct Snapshot<'a> {
    pub player: &'a PlayerBody,
    pub platforms: &'a [Platform],
    pub obstacles: &'a [Obstacle],
    pub world_offset: f64,
    pub world_speed: f64,
    pub score: u32,
    pub best_score: u32,
    pub state: SessionState,
    pub paused: Option<PauseReason>,
    pub warning: Option<PostureWarning>,
    pub wave_phase: f64,
    pub frame: u64,
}

pub struct GameSession {
    cfg: GameConfig,
    player: PlayerBody,
    world: PlatformGenerator,
    world_offset: f64,
    world_speed: f64,
    state: SessionState,
    play_ticks: u64,
    score: u32,
    best_score: u32,
    paused: Option<PauseReason>,
    action_override: Option<Action>,
    warning: Option<PostureWarning>,
    wave_phase: f64,
    frame: u64,
}

impl GameSession {
    pub fn new(cfg: GameConfig, rng: Box<dyn Uniform + Send>) -> Self {
        let world = PlatformGenerator::new(&cfg, rng);
        let player = PlayerBody::new(&cfg.player);
        let mut session = Self {
            cfg,
            player,
            world,
            world_offset: 0.0,
            world_speed: 0.0,
            state: SessionState::Ready,
            play_ticks: 0,
            score: 0,
            best_score: 0,
            paused: None,
            action_override: None,
            warning: None,
            wave_phase: 0.0,
            frame: 0,
        };
        session.lay_out();
        session
    }

    pub fn with_seed(cfg: GameConfig, seed: u64) -> Self {
        Self::new(cfg, Box::new(RandSource::seeded(seed)))
    }

    fn lay_out(&mut self) {
        self.world.seed();
        self.world_offset = 0.0;
        self.world_speed = 0.0;
        self.world.extend(0.0);
        if let Some(first) = self.world.platforms().first().copied() {
            self.player.reset_on(&first);
        }
        self.play_ticks = 0;
        self.score = 0;
        self.paused = None;
        self.action_override = None;
        self.warning = None;
    }

    pub fn config(&self) -> &GameConfig {
        &self.cfg
    }

    pub fn player(&self) -> &PlayerBody {
        &self.player
    }

    pub fn world(&self) -> &PlatformGenerator {
        &self.world
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn best_score(&self) -> u32 {
        self.best_score
    }

    pub fn world_offset(&self) -> f64 {
        self.world_offset
    }

    pub fn world_speed(&self) -> f64 {
        self.world_speed
    }

    pub fn paused(&self) -> Option<PauseReason> {
        self.paused
    }

    pub fn snapshot(&self) -> Snapshot<'_> {
        Snapshot {
            player: &self.player,
            platforms: self.world.platforms(),
            obstacles: self.world.obstacles(),
            world_offset: self.world_offset,
            world_speed: self.world_speed,
            score: self.score,
            best_score: self.best_score,
            state: self.state,
            paused: self.paused,
            warning: self.warning,
            wave_phase: self.wave_phase,
            frame: self.frame,
        }
    }

    /// Begins play from the ready screen. Returns false in any other state.
    pub fn start(&mut self) -> bool {
        if self.state != SessionState::Ready {
            return false;
        }
        self.state = SessionState::Playing;
        info!("session started");
        true
    }

    /// Fresh course and score, best score kept, straight into play.
    pub fn restart(&mut self) {
        self.lay_out();
        self.state = SessionState::Playing;
        info!(best = self.best_score, "session restarted");
    }

    pub fn set_paused(&mut self, reason: Option<PauseReason>) {
        self.paused = reason;
    }

    /// Replaces the sensor action on the next tick only. A tick that does not
    /// simulate (not playing, or paused) drops it.
    pub fn set_action_override(&mut self, action: Action) {
        self.action_override = Some(action);
    }

    /// Ends the run. Only the first call has any effect.
    pub fn die(&mut self) -> bool {
        if !self.player.die() {
            return false;
        }
        self.best_score = self.best_score.max(self.score);
        self.state = SessionState::GameOver;
        info!(score = self.score, best = self.best_score, "game over");
        true
    }

    fn apply(&mut self, action: Action) {
        match action {
            Action::Jump(strength) => {
                if self.player.on_ground {
                    let impulse = strength.map_or(self.cfg.physics.jump_impulse, |s| -s.abs());
                    self.player.jump(impulse);
                }
            }
            Action::Duck => self.player.duck_on(),
            Action::Idle => self.player.duck_off(),
        }
    }

    pub fn tick(&mut self, signal: &ActionSignal) {
        self.frame += 1;
        self.wave_phase += self.cfg.session.wave_speed;
        self.world.advance_cosmetics();
        self.warning = signal.warning;

        if self.state != SessionState::Playing || self.paused.is_some() {
            self.world_speed = 0.0;
            self.action_override = None;
            return;
        }

        self.play_ticks += 1;
        self.score = (self.play_ticks as f64 / self.cfg.session.ticks_per_second).floor() as u32;

        let physics = &self.cfg.physics;
        let ramped = physics.scroll_speed + self.play_ticks as f64 * physics.speed_gain;
        self.world_speed = ramped.min(physics.max_speed.max(physics.scroll_speed));
        self.world_offset += self.world_speed;

        self.world.extend(self.world_offset);

        let action = self.action_override.take().unwrap_or(signal.action);
        self.apply(action);

        self.player.integrate(self.cfg.physics.gravity);
        self.player
            .resolve_platforms(self.world.platforms(), self.world_offset);

        if self.cfg.obstacles.enabled {
            if let Some(kind) = self
                .player
                .fatal_obstacle(self.world.obstacles(), self.world_offset)
            {
                debug!(?kind, offset = self.world_offset, "obstacle hit");
                self.die();
            }
        }

        if self.player.has_fallen(self.cfg.viewport.height) {
            debug!(y = self.player.y, "fell into the water");
            self.die();
        }

        if self.player.is_dead {
            self.state = SessionState::GameOver;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Variant;
    use crate::world::ObstacleKind;

    fn session() -> GameSession {
        GameSession::with_seed(GameConfig::default(), 11)
    }

    #[test]
    fn ready_session_does_not_scroll() {
        let mut s = session();
        let y = s.player().y;
        for _ in 0..30 {
            s.tick(&ActionSignal::IDLE);
        }
        assert_eq!(s.state(), SessionState::Ready);
        assert_eq!(s.world_offset(), 0.0);
        assert_eq!(s.player().y, y);
        assert!(s.snapshot().wave_phase > 0.0);
    }

    #[test]
    fn player_starts_on_safe_platform() {
        let s = session();
        let first = s.world().platforms()[0];
        assert!(s.player().on_ground);
        assert_eq!(s.player().foot_y(), first.y);
        assert_eq!(first.center_x(), s.player().x);
    }

    #[test]
    fn playing_scrolls_and_scores_seconds() {
        let mut s = session();
        assert!(s.start());
        assert!(!s.start());
        for _ in 0..15 {
            s.tick(&ActionSignal::IDLE);
        }
        assert_eq!(s.world_offset(), 15.0 * 6.0);
        assert_eq!(s.world_speed(), 6.0);
        assert_eq!(s.score(), 0);
        assert!(s.player().on_ground);
    }

    #[test]
    fn idle_runner_eventually_drowns() {
        let mut s = session();
        s.start();
        for _ in 0..2_000 {
            s.tick(&ActionSignal::IDLE);
            if s.state() == SessionState::GameOver {
                break;
            }
        }
        assert_eq!(s.state(), SessionState::GameOver);
        assert!(s.player().is_dead);
        assert_eq!(s.best_score(), s.score());

        // dead sessions are frozen
        let offset = s.world_offset();
        s.tick(&ActionSignal::new(Action::Jump(None)));
        assert_eq!(s.world_offset(), offset);
    }

    #[test]
    fn override_forces_one_jump() {
        let mut s = session();
        s.start();
        s.set_action_override(Action::Jump(None));
        s.tick(&ActionSignal::new(Action::Duck));
        assert!(!s.player().on_ground);
        assert_eq!(s.player().vy, -15.0 + 0.7);
        assert!(!s.player().is_ducking);
    }

    #[test]
    fn override_is_dropped_by_ticks_that_do_not_simulate() {
        let mut s = session();
        s.set_action_override(Action::Jump(None));
        s.tick(&ActionSignal::IDLE);
        s.start();
        s.tick(&ActionSignal::IDLE);
        assert!(s.player().on_ground);

        s.set_paused(Some(PauseReason::Posture));
        s.set_action_override(Action::Jump(None));
        s.tick(&ActionSignal::IDLE);
        s.set_paused(None);
        s.tick(&ActionSignal::IDLE);
        assert!(s.player().on_ground);
        assert_eq!(s.player().vy, 0.0);
    }

    #[test]
    fn jump_strength_from_signal_is_applied_upward() {
        let mut s = session();
        s.start();
        s.tick(&ActionSignal::new(Action::Jump(Some(20.0))));
        assert_eq!(s.player().vy, -20.0 + 0.7);
    }

    #[test]
    fn duck_and_release() {
        let mut s = session();
        s.start();
        s.tick(&ActionSignal::new(Action::Duck));
        assert!(s.player().is_ducking);
        s.tick(&ActionSignal::IDLE);
        assert!(!s.player().is_ducking);
    }

    #[test]
    fn pause_skips_physics_but_not_cosmetics() {
        let mut s = session();
        s.start();
        s.set_paused(Some(PauseReason::Calibrating));
        let frame = s.snapshot().frame;
        for _ in 0..50 {
            s.tick(&ActionSignal::new(Action::Jump(None)));
        }
        assert_eq!(s.world_offset(), 0.0);
        assert!(s.player().on_ground);
        assert_eq!(s.snapshot().frame, frame + 50);
        assert_eq!(s.snapshot().paused, Some(PauseReason::Calibrating));

        s.set_paused(None);
        s.tick(&ActionSignal::IDLE);
        assert_eq!(s.world_offset(), 6.0);
    }

    #[test]
    fn die_is_idempotent() {
        let mut s = session();
        s.start();
        for _ in 0..10 {
            s.tick(&ActionSignal::IDLE);
        }
        assert!(s.die());
        let best = s.best_score();
        assert!(!s.die());
        assert!(s.player().is_dead);
        assert_eq!(s.best_score(), best);
        assert_eq!(s.state(), SessionState::GameOver);
    }

    #[test]
    fn restart_keeps_best_and_resets_everything_else() {
        let mut s = session();
        s.start();
        for _ in 0..130 {
            s.tick(&ActionSignal::IDLE);
            // hop over every gap by jumping whenever grounded
            s.set_action_override(Action::Jump(None));
        }
        s.die();
        let best = s.best_score();
        s.restart();
        assert_eq!(s.state(), SessionState::Playing);
        assert_eq!(s.score(), 0);
        assert_eq!(s.world_offset(), 0.0);
        assert_eq!(s.best_score(), best);
        assert!(!s.player().is_dead);
        assert!(s.player().on_ground);
    }

    #[test]
    fn voice_preset_ramps_speed_up_to_cap() {
        let mut s = GameSession::with_seed(GameConfig::preset(Variant::Voice), 2);
        s.start();
        s.tick(&ActionSignal::IDLE);
        assert!((s.world_speed() - (5.0 + 1.0 / 500.0)).abs() < 1e-12);

        let mut cfg = GameConfig::preset(Variant::Voice);
        cfg.physics.speed_gain = 1.0;
        cfg.physics.max_speed = 8.0;
        let mut s = GameSession::with_seed(cfg, 2);
        s.start();
        for _ in 0..5 {
            s.tick(&ActionSignal::IDLE);
        }
        assert_eq!(s.world_speed(), 8.0);
    }

    #[test]
    fn spike_on_a_flat_floor_ends_the_run() {
        let mut cfg = GameConfig::preset(Variant::Face);
        // one continuous floor at a single height, a spike on every platform after the first
        cfg.obstacles.none_probability = 0.0;
        cfg.obstacles.spike_probability = 1.0;
        cfg.platforms.thin_probability = 0.0;
        cfg.platforms.max_delta_y = 0.0;
        cfg.platforms.normal_gap = crate::config::Span::new(0.0, 0.0);
        let mut s = GameSession::with_seed(cfg, 4);
        assert!(s
            .world()
            .obstacles()
            .iter()
            .all(|o| o.kind == ObstacleKind::Spike));
        let floor = s.world().platforms()[0].y;
        s.start();
        for _ in 0..5_000 {
            s.tick(&ActionSignal::IDLE);
            if s.state() == SessionState::GameOver {
                break;
            }
        }
        assert_eq!(s.state(), SessionState::GameOver);
        assert!((s.player().foot_y() - floor).abs() < 3.0);
    }
}
