use chicken_jump::config::Span;
use chicken_jump::control::{SensorFrame, TickEvents};
use chicken_jump::random::{RandSource, Scripted};
use chicken_jump::sensor;
use chicken_jump::session::{PauseReason, SessionState};
use chicken_jump::voice::PitchSample;
use chicken_jump::{
    Action, ActionSignal, ControlMode, Controller, GameConfig, GameSession, ObstacleKind, Variant,
};
use tempfile::TempDir;

fn assert_course_invariants(s: &GameSession) {
    let cfg = s.config();
    let band = cfg.platform_band();
    let platforms = s.world().platforms();
    for pair in platforms.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let gap = b.x - a.right();
        assert!(gap >= cfg.platforms.thin_gap.min - 1e-9, "gap {gap} too small");
        assert!(gap <= cfg.platforms.normal_gap.max + 1e-9, "gap {gap} too large");
        assert!((b.y - a.y).abs() <= cfg.platforms.max_delta_y + 1e-9);
        assert!(band.contains(b.y));
    }
    let frontier = s.world().frontier().unwrap();
    assert!(frontier - s.world_offset() >= cfg.viewport.width * cfg.platforms.lookahead);

    for o in s.world().obstacles() {
        let host = platforms
            .iter()
            .find(|p| o.x >= p.x && o.right() <= p.right() + 1e-9)
            .expect("obstacle sits over a platform");
        match o.kind {
            ObstacleKind::Spike => assert!((o.y + o.h - host.y).abs() < 1e-9),
            ObstacleKind::Saw => assert!(o.y + o.h < host.y),
        }
    }
}

fn assert_player_invariants(s: &GameSession) {
    let p = s.player();
    if p.on_ground {
        assert_eq!(p.vy, 0.0);
        let foot = p.foot_y();
        assert!(
            s.world()
                .platforms()
                .iter()
                .any(|plat| (plat.y - foot).abs() < 1e-9),
            "grounded player must rest on a platform top"
        );
    }
}

#[test]
fn hopping_runner_keeps_every_invariant() {
    for variant in [Variant::Classic, Variant::Face, Variant::Voice] {
        let mut s = GameSession::with_seed(GameConfig::preset(variant), 99);
        s.start();
        for tick in 0..3_000u32 {
            let action = if tick % 40 < 20 {
                Action::Jump(None)
            } else {
                Action::Duck
            };
            s.tick(&ActionSignal::new(action));
            assert_course_invariants(&s);
            assert_player_invariants(&s);
            if s.state() == SessionState::GameOver {
                break;
            }
        }
        if s.state() == SessionState::GameOver {
            assert_eq!(s.best_score(), s.score());
        }
    }
}

#[test]
fn same_seed_same_course() {
    let run = || {
        let mut s = GameSession::with_seed(GameConfig::preset(Variant::Face), 1234);
        s.start();
        for _ in 0..200 {
            s.tick(&ActionSignal::new(Action::Jump(None)));
        }
        (
            s.world().platforms().to_vec(),
            s.world().obstacles().to_vec(),
            s.player().y,
        )
    };
    assert_eq!(run(), run());
}

#[test]
fn scripted_randomness_gives_a_flat_course() {
    let mut cfg = GameConfig::default();
    cfg.platforms.thin_probability = 0.0;
    let s = GameSession::new(cfg, Box::new(Scripted::constant(0.5)));
    let platforms = s.world().platforms();
    let y = platforms[0].y;
    assert!(platforms.iter().all(|p| p.y == y));
    let w = Span::new(150.0, 230.0).at(0.5);
    assert!(platforms[1..].iter().all(|p| p.w == w));
}

#[test]
fn config_file_drives_the_session() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("game.toml");
    let mut cfg = GameConfig::preset(Variant::Voice);
    cfg.physics.scroll_speed = 7.0;
    cfg.physics.speed_gain = 0.0;
    std::fs::write(&path, cfg.to_toml().unwrap()).unwrap();

    let loaded = GameConfig::load(&path).unwrap();
    let mut s = GameSession::new(loaded, Box::new(RandSource::seeded(3)));
    s.start();
    for _ in 0..10 {
        s.tick(&ActionSignal::IDLE);
    }
    assert_eq!(s.world_offset(), 70.0);
}

#[test]
fn broken_config_file_is_rejected_or_replaced() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "[physics]\ngravity = -1.0\n").unwrap();
    assert!(GameConfig::load(&path).is_err());

    let fallback = GameConfig::load_or(&path, GameConfig::preset(Variant::Face));
    assert!(fallback.obstacles.enabled);
}

fn feed_pitch(
    c: &mut Controller,
    tx: &sensor::Publisher<SensorFrame>,
    hz: f64,
    level: f64,
) -> TickEvents {
    tx.publish(SensorFrame::Pitch(PitchSample::new(hz, level)));
    c.tick()
}

#[test]
fn voice_run_from_silent_calibration_to_game_over() {
    let mut c = Controller::new(
        ControlMode::Voice,
        GameConfig::preset(Variant::Voice),
        Box::new(RandSource::seeded(8)),
    );
    let (tx, rx) = sensor::channel();
    c.attach(rx);
    c.start_session();

    // a silent window is rejected and calibration starts over
    for _ in 0..180 {
        feed_pitch(&mut c, &tx, 0.0, 0.0);
    }
    let status = c.calibration().expect("still calibrating");
    assert_eq!(status.progress, 0.0);
    assert_eq!(status.message, "Not enough sound detected, trying again");
    assert_eq!(c.session().paused(), Some(PauseReason::Calibrating));
    assert_eq!(c.session().world_offset(), 0.0);

    for _ in 0..180 {
        feed_pitch(&mut c, &tx, 180.0, 0.4);
    }
    assert!(c.calibration().is_none());
    assert_eq!(c.session().paused(), None);

    // humming at the baseline never jumps, so the runner drowns
    let mut died = 0;
    for _ in 0..3_000 {
        if feed_pitch(&mut c, &tx, 180.0, 0.4).died {
            died += 1;
        }
    }
    assert_eq!(died, 1);
    assert_eq!(c.session().state(), SessionState::GameOver);

    c.restart_session();
    assert!(c.calibration().is_none(), "restart keeps the baseline");
    assert_eq!(c.session().state(), SessionState::Playing);
}
