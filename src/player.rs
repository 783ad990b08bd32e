use crate::config::PlayerConfig;
use crate::world::{Obstacle, ObstacleKind, Platform, Rect};

/// The runner. `x` is a fixed screen-space anchor, `y` the sprite center.
///
/// Grounded implies `vy == 0` and the foot resting exactly on a platform top.
/// Once dead, nothing changes until [`PlayerBody::reset_on`].
#[derive(Debug, Clone)]
pub struct PlayerBody {
    pub x: f64,
    pub y: f64,
    pub vy: f64,
    pub on_ground: bool,
    pub is_ducking: bool,
    pub is_dead: bool,
    cfg: PlayerConfig,
}

impl PlayerBody {
    pub fn new(cfg: &PlayerConfig) -> Self {
        Self {
            x: cfg.anchor_x,
            y: 0.0,
            vy: 0.0,
            on_ground: false,
            is_ducking: false,
            is_dead: false,
            cfg: cfg.clone(),
        }
    }

    pub fn size(&self) -> f64 {
        self.cfg.size
    }

    pub fn half_size(&self) -> f64 {
        self.cfg.size / 2.0
    }

    pub fn foot_y(&self) -> f64 {
        self.y + self.half_size()
    }

    /// Height of the drawn sprite, which shrinks toward the feet while ducking.
    pub fn sprite_height(&self) -> f64 {
        if self.is_ducking {
            self.cfg.size * self.cfg.duck_ratio
        } else {
            self.cfg.size
        }
    }

    /// Stands the player, alive and upright, on `platform`.
    pub fn reset_on(&mut self, platform: &Platform) {
        self.x = self.cfg.anchor_x;
        self.y = platform.y - self.half_size();
        self.vy = 0.0;
        self.on_ground = true;
        self.is_ducking = false;
        self.is_dead = false;
    }

    /// One gravity step. Grounded is cleared until collision puts it back.
    pub fn integrate(&mut self, gravity: f64) {
        if self.is_dead {
            return;
        }
        self.vy += gravity;
        self.y += self.vy;
        self.on_ground = false;
    }

    /// `impulse` is a vertical velocity, negative upward. Returns whether the jump happened.
    pub fn jump(&mut self, impulse: f64) -> bool {
        if !self.on_ground || self.is_dead {
            return false;
        }
        self.vy = impulse;
        self.on_ground = false;
        self.is_ducking = false;
        true
    }

    /// Ducking only starts from the ground.
    pub fn duck_on(&mut self) {
        if self.on_ground && !self.is_dead {
            self.is_ducking = true;
        }
    }

    pub fn duck_off(&mut self) {
        if !self.is_dead {
            self.is_ducking = false;
        }
    }

    /// Lands on the first platform the foot crossed this step. Returns its index.
    pub fn resolve_platforms(&mut self, platforms: &[Platform], world_offset: f64) -> Option<usize> {
        if self.is_dead || self.vy < 0.0 {
            return None;
        }
        let px = self.x + world_offset;
        let foot = self.foot_y();
        let prev_foot = foot - self.vy;
        let inset = self.cfg.edge_inset;
        let tolerance = self.cfg.landing_tolerance;

        let hit = platforms.iter().position(|p| {
            px > p.x + inset
                && px < p.right() - inset
                && prev_foot <= p.y + tolerance
                && foot >= p.y
        })?;
        self.y = platforms[hit].y - self.half_size();
        self.vy = 0.0;
        self.on_ground = true;
        Some(hit)
    }

    /// Shrunk collision box in world space, centered on the visible sprite.
    pub fn hitbox(&self, world_offset: f64) -> Rect {
        let w = self.cfg.size * self.cfg.hitbox_width_ratio;
        let sprite_h = self.sprite_height();
        let h = sprite_h * self.cfg.hitbox_height_ratio;
        let center_y = self.foot_y() - sprite_h / 2.0;
        Rect {
            x: self.x + world_offset - w / 2.0,
            y: center_y - h / 2.0,
            w,
            h,
        }
    }

    /// First obstacle that kills on contact. Saws are passed while ducking.
    pub fn fatal_obstacle(&self, obstacles: &[Obstacle], world_offset: f64) -> Option<ObstacleKind> {
        if self.is_dead {
            return None;
        }
        let hitbox = self.hitbox(world_offset);
        obstacles
            .iter()
            .filter(|o| hitbox.overlaps(&o.rect()))
            .map(|o| o.kind)
            .find(|kind| !(*kind == ObstacleKind::Saw && self.is_ducking))
    }

    /// Sank into the water below the screen.
    pub fn has_fallen(&self, viewport_h: f64) -> bool {
        self.y > viewport_h + self.half_size()
    }

    /// Returns true only on the call that actually killed the player.
    pub fn die(&mut self) -> bool {
        if self.is_dead {
            return false;
        }
        self.is_dead = true;
        self.is_ducking = false;
        true
    }
}
