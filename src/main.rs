mod render;
mod sound;

use anyhow::Context;
use chicken_jump::control::SensorFrame;
use chicken_jump::random::RandSource;
use chicken_jump::sensor;
use chicken_jump::session::SessionState;
use chicken_jump::{Action, ControlMode, Controller, GameConfig, Variant};
use clap::{Parser, ValueEnum};
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEventKind},
    execute, terminal,
};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Stdout, stdout};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use render::{Hud, Scene};
use sound::Sfx;

const DUCK_HOLD_TICKS: u32 = 12;
const FEED_IDLE: Duration = Duration::from_millis(5);

#[derive(Clone, Copy, Debug, ValueEnum)]
enum VariantArg {
    Classic,
    Face,
    Voice,
}

impl From<VariantArg> for Variant {
    fn from(v: VariantArg) -> Self {
        match v {
            VariantArg::Classic => Variant::Classic,
            VariantArg::Face => Variant::Face,
            VariantArg::Voice => Variant::Voice,
        }
    }
}

/// Side-scrolling chicken runner, steered by keys, face expressions or voice pitch.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Game variant; face and voice also pick the control mode
    #[arg(long, value_enum, default_value_t = VariantArg::Classic)]
    variant: VariantArg,

    /// Path to a TOML config replacing the variant preset
    #[arg(long)]
    config: Option<PathBuf>,

    /// Decoded sensor frames, one per line (a file or named pipe)
    #[arg(long)]
    feed: Option<PathBuf>,

    /// Seed for the course generator
    #[arg(long)]
    seed: Option<u64>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,

    /// Write logs here (the terminal is taken by the game)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// No sound
    #[arg(long)]
    mute: bool,
}

fn init_logging(args: &Args) -> anyhow::Result<()> {
    let Some(path) = &args.log_file else {
        return Ok(());
    };
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

/// Tails `path` on a background thread, one frame per non-empty line.
fn open_feed(path: &Path) -> anyhow::Result<sensor::Subscription<SensorFrame>> {
    let file = File::open(path).with_context(|| format!("opening feed {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut line = String::new();
    Ok(sensor::spawn(move || {
        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                thread::sleep(FEED_IDLE);
                continue;
            }
            let frame = line.trim();
            if !frame.is_empty() {
                return frame.parse();
            }
        }
    }))
}

fn hud(controller: &Controller) -> Hud {
    Hud {
        mode: match controller.mode() {
            ControlMode::Keys => "keys",
            ControlMode::Face => "face",
            ControlMode::Voice => "voice",
        },
        calibration: controller.calibration(),
        pitch: controller.pitch(),
        expression: controller.expression(),
        missing_feed: controller.mode() != ControlMode::Keys && !controller.has_feed(),
    }
}

/// One simulation tick of wall time, so speeds and scores track the configured rate.
fn frame_duration(ticks_per_second: f64) -> Duration {
    Duration::from_secs_f64(1.0 / ticks_per_second)
}

fn run(out: &mut Stdout, controller: &mut Controller, sfx: Option<&Sfx>) -> io::Result<()> {
    let (cols, rows) = terminal::size()?;
    let mut scene = Scene::new(cols, rows, controller.session().config().viewport.height);
    let frame = frame_duration(controller.session().config().session.ticks_per_second);

    loop {
        let frame_start = Instant::now();

        // Input
        while event::poll(Duration::ZERO)? {
            match event::read()? {
                Event::Key(key) if key.kind != KeyEventKind::Release => match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                    KeyCode::Char(' ') | KeyCode::Enter => match controller.session().state() {
                        SessionState::Ready => {
                            controller.start_session();
                        }
                        SessionState::GameOver => controller.restart_session(),
                        SessionState::Playing => controller.set_action_override(Action::Jump(None)),
                    },
                    KeyCode::Up => controller.set_action_override(Action::Jump(None)),
                    KeyCode::Down => controller.hold(Action::Duck, DUCK_HOLD_TICKS),
                    KeyCode::Char('c') => {
                        controller.recalibrate();
                    }
                    _ => {}
                },
                Event::Resize(c, r) => scene.resize(c, r),
                _ => {}
            }
        }

        // Update
        let events = controller.tick();
        if let Some(sfx) = sfx {
            if events.jumped {
                sfx.play_jump();
            }
            if events.died {
                sfx.play_death();
            }
        }

        // Render
        let snap = controller.session().snapshot();
        let hud = hud(controller);
        scene.draw(&snap, &hud);
        scene.render(out, &snap, &hud)?;

        // Frame pacing
        let elapsed = frame_start.elapsed();
        if elapsed < frame {
            thread::sleep(frame - elapsed);
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args)?;

    let variant = Variant::from(args.variant);
    let mut cfg = match &args.config {
        Some(path) => GameConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => GameConfig::preset(variant),
    };

    // widen the course to the terminal's aspect; height stays in world units
    let (cols, rows) = terminal::size()?;
    cfg.viewport.width = cfg.viewport.height * f64::from(cols) / (f64::from(rows) * 2.0).max(1.0);
    cfg.validate()?;

    let rng = match args.seed {
        Some(seed) => RandSource::seeded(seed),
        None => RandSource::from_os(),
    };
    let mode = match variant {
        Variant::Classic => ControlMode::Keys,
        Variant::Face => ControlMode::Face,
        Variant::Voice => ControlMode::Voice,
    };
    let mut controller = Controller::new(mode, cfg, Box::new(rng));
    match &args.feed {
        Some(path) => controller.attach(open_feed(path)?),
        None if mode != ControlMode::Keys => {
            warn!(?mode, "no --feed given; the sensor signal stays idle")
        }
        None => {}
    }
    let sfx = if args.mute { None } else { Sfx::open() };
    info!(?mode, seed = ?args.seed, "starting");

    terminal::enable_raw_mode()?;
    let mut out = stdout();
    execute!(
        out,
        terminal::EnterAlternateScreen,
        cursor::Hide,
        terminal::DisableLineWrap,
    )?;

    let result = run(&mut out, &mut controller, sfx.as_ref());
    controller.stop_signal();

    execute!(
        out,
        terminal::LeaveAlternateScreen,
        cursor::Show,
        terminal::EnableLineWrap,
    )?;
    terminal::disable_raw_mode()?;
    result?;
    Ok(())
}
