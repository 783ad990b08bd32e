use chicken_jump::control::{CalibrationStatus, PitchReadout};
use chicken_jump::face::Expression;
use chicken_jump::session::{PauseReason, SessionState, Snapshot};
use chicken_jump::{Obstacle, ObstacleKind, Platform};
use crossterm::{
    cursor, queue,
    style::{self, Color as CColor},
};
use std::io::{self, Write};

// ── Colors ──────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Rgb(u8, u8, u8);

impl Rgb {
    const fn lerp(a: Rgb, b: Rgb, t_256: u16) -> Rgb {
        let t = t_256 as i32;
        Rgb(
            (a.0 as i32 + (b.0 as i32 - a.0 as i32) * t / 256) as u8,
            (a.1 as i32 + (b.1 as i32 - a.1 as i32) * t / 256) as u8,
            (a.2 as i32 + (b.2 as i32 - a.2 as i32) * t / 256) as u8,
        )
    }

    const fn dim(self) -> Rgb {
        Rgb(self.0 / 2, self.1 / 2, self.2 / 2)
    }

    fn to_crossterm(self) -> CColor {
        CColor::Rgb {
            r: self.0,
            g: self.1,
            b: self.2,
        }
    }
}

const SKY_TOP: Rgb = Rgb(120, 190, 235);
const SKY_BOT: Rgb = Rgb(215, 238, 250);
const WATER: Rgb = Rgb(40, 110, 190);
const WATER_DEEP: Rgb = Rgb(25, 70, 140);
const FOAM: Rgb = Rgb(200, 230, 250);
const GRASS: Rgb = Rgb(84, 168, 55);
const GRASS_LIGHT: Rgb = Rgb(110, 200, 70);
const DIRT: Rgb = Rgb(150, 105, 60);
const DIRT_DARK: Rgb = Rgb(120, 82, 45);
const PILLAR: Rgb = Rgb(95, 70, 45);
const SPIKE: Rgb = Rgb(170, 175, 185);
const SPIKE_TIP: Rgb = Rgb(230, 232, 240);
const SAW: Rgb = Rgb(140, 145, 155);
const SAW_HUB: Rgb = Rgb(70, 70, 80);
const CHICKEN: Rgb = Rgb(250, 250, 245);
const CHICKEN_SHADE: Rgb = Rgb(215, 215, 205);
const COMB: Rgb = Rgb(220, 40, 40);
const BEAK: Rgb = Rgb(245, 165, 30);
const EYE: Rgb = Rgb(20, 20, 20);
const GOLD: Rgb = Rgb(245, 200, 66);
const PANEL: Rgb = Rgb(220, 195, 120);
const PANEL_EDGE: Rgb = Rgb(150, 105, 60);
const WHITE: Rgb = Rgb(255, 255, 255);
const SHADOW: Rgb = Rgb(30, 30, 30);

// ── Pixel buffer with half-block rendering ──────────────────────────────────

pub struct PixelBuf {
    w: usize,
    h: usize, // terminal rows * 2
    px: Vec<Rgb>,
}

impl PixelBuf {
    pub fn new(w: usize, h: usize) -> Self {
        Self {
            w,
            h,
            px: vec![SKY_TOP; w * h],
        }
    }

    pub fn resize(&mut self, w: usize, h: usize) {
        self.w = w;
        self.h = h;
        self.px.resize(w * h, SKY_TOP);
    }

    fn set(&mut self, x: i32, y: i32, c: Rgb) {
        if x >= 0 && y >= 0 && (x as usize) < self.w && (y as usize) < self.h {
            self.px[y as usize * self.w + x as usize] = c;
        }
    }

    fn get(&self, x: usize, y: usize) -> Rgb {
        self.px[y * self.w + x]
    }

    fn fill_rect(&mut self, x: i32, y: i32, w: i32, h: i32, c: Rgb) {
        for dy in 0..h {
            for dx in 0..w {
                self.set(x + dx, y + dy, c);
            }
        }
    }

    fn dim(&mut self) {
        for c in &mut self.px {
            *c = c.dim();
        }
    }

    /// Two pixels per cell: top as the foreground of `▀`, bottom as the background.
    pub fn render(&self, out: &mut impl Write) -> io::Result<()> {
        queue!(out, cursor::MoveTo(0, 0))?;
        let rows = self.h / 2;
        let mut fg: Option<Rgb> = None;
        let mut bg: Option<Rgb> = None;

        for row in 0..rows {
            for col in 0..self.w {
                let top = self.get(col, row * 2);
                let bot = self.get(col, row * 2 + 1);
                if bg != Some(bot) {
                    queue!(out, style::SetBackgroundColor(bot.to_crossterm()))?;
                    bg = Some(bot);
                }
                if top == bot {
                    queue!(out, style::Print(' '))?;
                } else {
                    if fg != Some(top) {
                        queue!(out, style::SetForegroundColor(top.to_crossterm()))?;
                        fg = Some(top);
                    }
                    queue!(out, style::Print('\u{2580}'))?;
                }
            }
            if row + 1 < rows {
                queue!(out, style::ResetColor, style::Print("\r\n"))?;
                fg = None;
                bg = None;
            }
        }
        queue!(out, style::ResetColor)?;
        Ok(())
    }
}

// ── 3x5 bitmap digits ──────────────────────────────────────────────────────

#[rustfmt::skip]
const DIGITS: [[u8; 15]; 10] = [
    [1,1,1, 1,0,1, 1,0,1, 1,0,1, 1,1,1], // 0
    [0,1,0, 1,1,0, 0,1,0, 0,1,0, 1,1,1], // 1
    [1,1,1, 0,0,1, 1,1,1, 1,0,0, 1,1,1], // 2
    [1,1,1, 0,0,1, 0,1,1, 0,0,1, 1,1,1], // 3
    [1,0,1, 1,0,1, 1,1,1, 0,0,1, 0,0,1], // 4
    [1,1,1, 1,0,0, 1,1,1, 0,0,1, 1,1,1], // 5
    [1,1,1, 1,0,0, 1,1,1, 1,0,1, 1,1,1], // 6
    [1,1,1, 0,0,1, 0,1,0, 0,1,0, 0,1,0], // 7
    [1,1,1, 1,0,1, 1,1,1, 1,0,1, 1,1,1], // 8
    [1,1,1, 1,0,1, 1,1,1, 0,0,1, 1,1,1], // 9
];

fn draw_number(buf: &mut PixelBuf, cx: i32, y: i32, n: u32, fg: Rgb) {
    let s = n.to_string();
    let total_w = s.len() as i32 * 4 - 1;
    let start_x = cx - total_w / 2;
    for (i, d) in s.bytes().map(|b| b - b'0').enumerate() {
        let glyph = &DIGITS[d as usize];
        let x = start_x + i as i32 * 4;
        for row in 0..5 {
            for col in 0..3 {
                if glyph[row * 3 + col] == 1 {
                    buf.set(x + col as i32 + 1, y + row as i32 + 1, SHADOW);
                    buf.set(x + col as i32, y + row as i32, fg);
                }
            }
        }
    }
}

// ── Scene ───────────────────────────────────────────────────────────────────

/// Non-gameplay readouts shown over the playfield.
#[derive(Default)]
pub struct Hud {
    pub mode: &'static str,
    pub calibration: Option<CalibrationStatus>,
    pub pitch: Option<PitchReadout>,
    pub expression: Option<Expression>,
    /// Sensor mode started without `--feed`: the signal will never change.
    pub missing_feed: bool,
}

/// Maps world units onto the pixel buffer. The world is scaled to fit the height.
pub struct Scene {
    buf: PixelBuf,
    viewport_h: f64,
    scale: f64,
}

impl Scene {
    pub fn new(cols: u16, rows: u16, viewport_h: f64) -> Self {
        let (pw, ph) = (cols as usize, rows as usize * 2);
        Self {
            buf: PixelBuf::new(pw, ph),
            viewport_h,
            scale: ph as f64 / viewport_h,
        }
    }

    pub fn resize(&mut self, cols: u16, rows: u16) {
        let (pw, ph) = (cols as usize, rows as usize * 2);
        self.buf.resize(pw, ph);
        self.scale = ph as f64 / self.viewport_h;
    }

    fn px(&self, world: f64) -> i32 {
        (world * self.scale).round() as i32
    }

    pub fn draw(&mut self, snap: &Snapshot<'_>, hud: &Hud) {
        self.draw_sky();
        for p in snap.platforms {
            self.draw_platform(p, snap.world_offset);
        }
        for o in snap.obstacles {
            match o.kind {
                ObstacleKind::Spike => self.draw_spike(o, snap.world_offset),
                ObstacleKind::Saw => self.draw_saw(o, snap.world_offset),
            }
        }
        self.draw_water(snap.wave_phase);
        self.draw_chicken(snap);
        if let Some(cal) = hud.calibration {
            self.draw_progress(cal.progress);
        }

        if snap.paused.is_some() && snap.state == SessionState::Playing {
            self.buf.dim();
        }
        match snap.state {
            SessionState::GameOver => self.draw_game_over(snap.score, snap.best_score),
            _ => {
                let cx = self.buf.w as i32 / 2;
                draw_number(&mut self.buf, cx, 3, snap.score, WHITE);
            }
        }
    }

    pub fn render(&self, out: &mut impl Write, snap: &Snapshot<'_>, hud: &Hud) -> io::Result<()> {
        self.buf.render(out)?;
        for (row, line) in banner(snap, hud).iter().enumerate() {
            queue!(
                out,
                cursor::MoveTo(1, row as u16 + 1),
                style::SetForegroundColor(CColor::White),
                style::SetBackgroundColor(CColor::Black),
                style::Print(line),
                style::ResetColor,
            )?;
        }
        out.flush()
    }

    fn draw_sky(&mut self) {
        let (w, h) = (self.buf.w, self.buf.h);
        for y in 0..h {
            let t = (y * 256 / h.max(1)) as u16;
            let c = Rgb::lerp(SKY_TOP, SKY_BOT, t);
            for x in 0..w {
                self.buf.set(x as i32, y as i32, c);
            }
        }
    }

    fn draw_water(&mut self, wave_phase: f64) {
        let h = self.buf.h as i32;
        let depth = (self.buf.h as f64 * 0.08).max(3.0) as i32;
        let surface = h - depth;
        for x in 0..self.buf.w as i32 {
            let fx = (x as f64 + wave_phase * self.scale * 4.0) * 0.25;
            let crest = surface + (fx.sin() * 1.2).round() as i32;
            self.buf.set(x, crest, FOAM);
            for y in crest + 1..h {
                let t = ((y - crest) * 256 / depth.max(1)).min(256) as u16;
                self.buf.set(x, y, Rgb::lerp(WATER, WATER_DEEP, t));
            }
        }
    }

    fn draw_platform(&mut self, p: &Platform, offset: f64) {
        let x = self.px(p.x - offset);
        let w = self.px(p.w).max(1);
        let top = self.px(p.y);
        let h = self.px(p.h).max(2);

        // pillar down into the water
        let pillar_w = (w * 3 / 5).max(1);
        self.buf
            .fill_rect(x + (w - pillar_w) / 2, top + h, pillar_w, self.buf.h as i32, PILLAR);

        for dx in 0..w {
            let alt = ((p.x / 8.0) as i32 + dx / 2) % 2 == 0;
            self.buf.set(x + dx, top, if alt { GRASS } else { GRASS_LIGHT });
            for dy in 1..h {
                let stripe = (dx + dy * 2) % 8 < 4;
                self.buf
                    .set(x + dx, top + dy, if stripe { DIRT } else { DIRT_DARK });
            }
        }
        self.buf.fill_rect(x, top + 1, w, 1, GRASS);
    }

    fn draw_spike(&mut self, o: &Obstacle, offset: f64) {
        let x = self.px(o.x - offset);
        let w = self.px(o.w).max(3);
        let base = self.px(o.y + o.h);
        let h = self.px(o.h).max(2);
        let teeth = (w / 3).max(1);
        let tooth_w = w as f64 / teeth as f64;
        for dx in 0..w {
            let into = (dx as f64 + 0.5) % tooth_w / tooth_w;
            let rise = (1.0 - (into - 0.5).abs() * 2.0) * h as f64;
            let top = base - rise.round() as i32;
            for y in top..base {
                self.buf.set(x + dx, y, SPIKE);
            }
            self.buf.set(x + dx, top, SPIKE_TIP);
        }
    }

    fn draw_saw(&mut self, o: &Obstacle, offset: f64) {
        let cx = (o.x - offset + o.w / 2.0) * self.scale;
        let cy = (o.y + o.h / 2.0) * self.scale;
        let r = (o.w / 2.0 * self.scale).max(1.5);
        let reach = r.ceil() as i32 + 1;
        for dy in -reach..=reach {
            for dx in -reach..=reach {
                let (fx, fy) = (dx as f64, dy as f64);
                let dist = fx.hypot(fy);
                let angle = fy.atan2(fx) + o.phase;
                let toothed = if (angle * 8.0).sin() > 0.0 { r } else { r * 0.8 };
                if dist <= toothed {
                    let c = if dist < r * 0.3 { SAW_HUB } else { SAW };
                    self.buf.set(cx as i32 + dx, cy as i32 + dy, c);
                }
            }
        }
    }

    fn draw_chicken(&mut self, snap: &Snapshot<'_>) {
        let p = snap.player;
        let w = self.px(p.size()).max(3);
        let h = self.px(p.sprite_height()).max(2);
        let foot = self.px(p.foot_y());
        let x = self.px(p.x) - w / 2;
        let top = foot - h;
        let legs = (h / 5).max(1);

        self.buf.fill_rect(x, top, w, h - legs, CHICKEN);
        self.buf.fill_rect(x, top + (h - legs) / 2, w / 2, (h - legs) / 2, CHICKEN_SHADE);
        // comb
        self.buf.fill_rect(x + w / 3, top - 1, w / 3, 1, COMB);
        // eye and beak face right
        self.buf.set(x + w * 3 / 4, top + h / 5, EYE);
        self.buf.fill_rect(x + w, top + h / 5, (w / 4).max(1), (h / 6).max(1), BEAK);

        // legs alternate while running on the ground
        let stride = if p.on_ground && snap.world_speed > 0.0 && (snap.frame / 4) % 2 == 0 {
            1
        } else {
            0
        };
        self.buf.fill_rect(x + w / 3 - stride, foot - legs, 1, legs, BEAK);
        self.buf.fill_rect(x + w * 2 / 3 + stride, foot - legs, 1, legs, BEAK);
    }

    fn draw_progress(&mut self, progress: f64) {
        let w = self.buf.w as i32 / 2;
        let x = self.buf.w as i32 / 4;
        let y = self.buf.h as i32 / 2;
        let filled = (w as f64 * progress.clamp(0.0, 1.0)) as i32;
        self.buf.fill_rect(x - 1, y - 1, w + 2, 4, SHADOW);
        self.buf.fill_rect(x, y, filled, 2, GOLD);
    }

    fn draw_game_over(&mut self, score: u32, best: u32) {
        self.buf.dim();
        let cx = self.buf.w as i32 / 2;
        let cy = self.buf.h as i32 / 2;
        let panel_w = 30;
        let panel_h = 18;
        let px = cx - panel_w / 2;
        let py = cy - panel_h / 2;
        self.buf
            .fill_rect(px - 1, py - 1, panel_w + 2, panel_h + 2, SHADOW);
        self.buf.fill_rect(px, py, panel_w, panel_h, PANEL_EDGE);
        self.buf
            .fill_rect(px + 1, py + 1, panel_w - 2, panel_h - 2, PANEL);
        draw_number(&mut self.buf, cx, py + 3, score, WHITE);
        draw_number(&mut self.buf, cx, py + 10, best, GOLD);
    }
}

/// Text lines printed over the top-left corner.
fn banner(snap: &Snapshot<'_>, hud: &Hud) -> Vec<String> {
    let mut lines = Vec::new();
    match snap.state {
        SessionState::Ready => {
            lines.push(format!("CHICKEN JUMP ({})", hud.mode));
            lines.push("SPACE start  UP jump  DOWN duck  C recalibrate  Q quit".to_string());
        }
        SessionState::GameOver => lines.push("GAME OVER  SPACE to run again".to_string()),
        SessionState::Playing => {}
    }
    if hud.missing_feed {
        lines.push(format!("No {} feed: restart with --feed <path>", hud.mode));
    }
    if let Some(cal) = hud.calibration {
        lines.push(format!("{} ({:.0}%)", cal.message, cal.progress * 100.0));
    }
    if let Some(warning) = snap.warning {
        let paused = if snap.paused == Some(PauseReason::Posture) {
            " [paused]"
        } else {
            ""
        };
        lines.push(format!("{warning}{paused}"));
    }
    if let Some(pitch) = &hud.pitch {
        let note = pitch.note.as_deref().unwrap_or("--");
        let cents = pitch
            .cents
            .map_or_else(|| "--".to_string(), |c| format!("{c:+.0}"));
        let jump = pitch
            .impulse
            .map_or_else(String::new, |i| format!("  jump {i:.1}"));
        lines.push(format!(
            "{:.0} Hz {note}  {cents} cents{jump}",
            pitch.frequency
        ));
    }
    if let Some(expression) = hud.expression {
        lines.push(format!("face: {}", expression.name()));
    }
    lines
}
