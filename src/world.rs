use std::f64::consts::TAU;

use tracing::debug;

use crate::config::{GameConfig, ObstacleConfig, PlatformConfig, Span};
use crate::random::Uniform;

/// Axis-aligned box, `y` grows downward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x < other.x + other.w
            && self.x + self.w > other.x
            && self.y < other.y + other.h
            && self.y + self.h > other.y
    }
}

/// A floating slab. `x`/`y` are the world-space left edge and top surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Platform {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Platform {
    pub fn right(&self) -> f64 {
        self.x + self.w
    }

    pub fn center_x(&self) -> f64 {
        self.x + self.w / 2.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObstacleKind {
    /// Sits on a platform; always fatal.
    Spike,
    /// Floats above a platform; survivable while ducking.
    Saw,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Obstacle {
    pub kind: ObstacleKind,
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
    /// Rotation for drawing saws, radians.
    pub phase: f64,
}

impl Obstacle {
    pub fn right(&self) -> f64 {
        self.x + self.w
    }

    pub fn rect(&self) -> Rect {
        Rect {
            x: self.x,
            y: self.y,
            w: self.w,
            h: self.h,
        }
    }
}

/// Endless supply of platforms ahead of the camera.
pub struct PlatformGenerator {
    cfg: PlatformConfig,
    obstacle_cfg: ObstacleConfig,
    viewport_w: f64,
    anchor_x: f64,
    band: Span,
    platforms: Vec<Platform>,
    obstacles: Vec<Obstacle>,
    rng: Box<dyn Uniform + Send>,
}

impl PlatformGenerator {
    pub fn new(cfg: &GameConfig, rng: Box<dyn Uniform + Send>) -> Self {
        Self {
            cfg: cfg.platforms.clone(),
            obstacle_cfg: cfg.obstacles.clone(),
            viewport_w: cfg.viewport.width,
            anchor_x: cfg.player.anchor_x,
            band: cfg.platform_band(),
            platforms: Vec::new(),
            obstacles: Vec::new(),
            rng,
        }
    }

    pub fn platforms(&self) -> &[Platform] {
        &self.platforms
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    /// Right edge of the furthest platform, world space.
    pub fn frontier(&self) -> Option<f64> {
        self.platforms.last().map(Platform::right)
    }

    /// Restarts the course: one wide platform centered under the player, then a few random ones.
    pub fn seed(&mut self) {
        self.platforms.clear();
        self.obstacles.clear();

        let w = self.cfg.safe_width;
        let safe = Platform {
            x: self.anchor_x - w / 2.0,
            y: self.rng.within(self.band),
            w,
            h: self.cfg.height,
        };
        self.platforms.push(safe);
        for _ in 0..self.cfg.seed_count {
            self.append();
        }
    }

    /// Drops what scrolled away and refills the look-ahead window. Returns how many platforms were added.
    pub fn extend(&mut self, world_offset: f64) -> usize {
        let cutoff = -self.viewport_w * self.cfg.prune_margin;
        self.platforms.retain(|p| p.right() - world_offset >= cutoff);
        self.obstacles.retain(|o| o.right() - world_offset >= cutoff);

        let horizon = self.viewport_w * self.cfg.lookahead;
        let mut added = 0;
        if self.platforms.is_empty() {
            let y = self.rng.within(self.band);
            self.push(world_offset, y);
            added += 1;
        }
        while self.frontier().is_some_and(|right| right - world_offset < horizon) {
            self.append();
            added += 1;
        }
        if added > 0 {
            debug!(added, live = self.platforms.len(), "platforms extended");
        }
        added
    }

    pub fn advance_cosmetics(&mut self) {
        let spin = self.obstacle_cfg.saw_spin;
        for o in self.obstacles.iter_mut().filter(|o| o.kind == ObstacleKind::Saw) {
            o.phase = (o.phase + spin) % TAU;
        }
    }

    fn is_thin(&self, w: f64) -> bool {
        w <= self.cfg.thin_width.max
    }

    fn append(&mut self) {
        let Some(&last) = self.platforms.last() else {
            return;
        };
        let gap_span = if self.is_thin(last.w) {
            self.cfg.thin_gap
        } else {
            self.cfg.normal_gap
        };
        let gap = self.rng.within(gap_span);

        let target = self.rng.within(self.band);
        let d = self.cfg.max_delta_y;
        let y = target
            .clamp(last.y - d, last.y + d)
            .clamp(self.band.min, self.band.max);

        self.push(last.right() + gap, y);
    }

    fn push(&mut self, x: f64, y: f64) {
        let thin = self.rng.unit() < self.cfg.thin_probability;
        let w = self.rng.within(if thin {
            self.cfg.thin_width
        } else {
            self.cfg.normal_width
        });
        let platform = Platform {
            x,
            y,
            w,
            h: self.cfg.height,
        };
        self.platforms.push(platform);
        if self.obstacle_cfg.enabled && w > self.obstacle_cfg.min_platform_width {
            self.attach_obstacle(&platform);
        }
    }

    fn attach_obstacle(&mut self, p: &Platform) {
        let oc = &self.obstacle_cfg;
        let roll = self.rng.unit();
        let obstacle = if roll < oc.none_probability {
            return;
        } else if roll < oc.none_probability + oc.spike_probability {
            let third = p.w / 3.0;
            let slack = (third - oc.spike_width).max(0.0);
            Obstacle {
                kind: ObstacleKind::Spike,
                x: p.x + third + self.rng.unit() * slack,
                y: p.y - oc.spike_height,
                w: oc.spike_width,
                h: oc.spike_height,
                phase: 0.0,
            }
        } else {
            Obstacle {
                kind: ObstacleKind::Saw,
                x: p.center_x() - oc.saw_size / 2.0,
                y: p.y - oc.saw_clearance - oc.saw_size,
                w: oc.saw_size,
                h: oc.saw_size,
                phase: self.rng.unit() * TAU,
            }
        };
        self.obstacles.push(obstacle);
    }
}
