//! piano-beams - Terminal 88-key piano visualizer
//!
//! Shows held keys and sustain beams for events coming from the computer
//! keyboard (Listen / Record), a replayed recording or a JSON-lines feed.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossterm::{
    event::{
        self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, KeyboardEnhancementFlags,
        PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
    },
    execute,
    terminal::{
        disable_raw_mode, enable_raw_mode, supports_keyboard_enhancement, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::fs::OpenOptions;
use std::io::{self, stdout};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use piano_beams::{
    capture::CaptureLayout,
    config::{Config, Theme},
    controls::Controls,
    ui::render_piano,
    FeedAdapter, FeedReader, FrameClock, Layout, LocalBackend, PianoKeyboard,
};

/// Frame interval
const FRAME: Duration = Duration::from_millis(16);

/// How often the toggles are checked against the backend
const RECONCILE_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Parser)]
#[command(name = "piano-beams")]
#[command(author, version, about = "Terminal 88-key piano visualizer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file path (default: ~/.config/piano-beams/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Read JSON-lines key events from this file or FIFO
    #[arg(short, long)]
    feed: Option<PathBuf>,

    /// Use US QWERTY layout instead of German QWERTZ
    #[arg(long)]
    us_layout: bool,

    /// Initial capture octave (0-9, default 3 for C3)
    #[arg(short, long)]
    octave: Option<u8>,

    /// Concurrent beams per key (0 = unbounded)
    #[arg(long)]
    max_beams: Option<usize>,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a default configuration file
    Init,
    /// Show the configuration file path
    ConfigPath,
    /// Print the generated 88-key layout
    Layout,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_file.as_deref())?;

    match cli.command {
        Some(Commands::Init) => {
            let path = Config::create_default_config_file()?;
            println!("Created default config at: {}", path.display());
            return Ok(());
        }
        Some(Commands::ConfigPath) => {
            let path = Config::config_path()?;
            println!("{}", path.display());
            return Ok(());
        }
        Some(Commands::Layout) => {
            print_layout();
            return Ok(());
        }
        None => {}
    }

    // Load config
    let mut config = if let Some(path) = &cli.config {
        Config::load_from(path).with_context(|| format!("loading {}", path.display()))?
    } else {
        Config::load_or_default()
    };

    // Apply CLI overrides
    if cli.us_layout {
        config.capture.layout = CaptureLayout::Us;
    }
    if let Some(octave) = cli.octave {
        config.capture.base_note = 12 + (octave.min(9) * 12);
    }
    if let Some(max_beams) = cli.max_beams {
        config.beam.max_per_key = max_beams;
    }

    // Run the TUI
    run_tui(config, cli.feed)
}

fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if let Some(path) = log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("opening log file {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}

fn print_layout() {
    let layout = Layout::generate();
    println!("{:>4}  {:<5} {:<6} {:>7}  {:>4}", "id", "note", "kind", "section", "slot");
    for key in layout.keys() {
        let kind = if key.is_black() { "black" } else { "white" };
        println!(
            "{:>4}  {:<5} {:<6} {:>7}  {:>4}",
            key.id,
            key.note_name(),
            kind,
            format!("{:?}", layout.sections()[key.section]),
            key.section_slot
        );
    }
    println!(
        "{} keys ({} white, {} black)",
        layout.len(),
        layout.white_count(),
        layout.black_keys().count()
    );
}

fn run_tui(config: Config, feed_path: Option<PathBuf>) -> Result<()> {
    let (tx, feed) = FeedAdapter::channel();
    let _feed_reader = match feed_path {
        Some(path) => Some(FeedReader::spawn(path, tx.clone())?),
        None => None,
    };

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;

    // Terminals that report key releases need no auto-release
    let enhanced = matches!(supports_keyboard_enhancement(), Ok(true));
    if enhanced {
        execute!(stdout, PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES))?;
    }
    let mut capture = config.key_capture();
    if enhanced {
        capture.set_release_after(None);
    }
    log::info!("Key release reporting: {}", if enhanced { "terminal" } else { "auto-release" });

    let terminal_backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(terminal_backend)?;

    let mut backend = LocalBackend::new(tx, capture);
    let mut keyboard = PianoKeyboard::new(config.beam_settings());
    let mut controls = config.controls();
    controls.reconcile(&backend);

    // Main loop
    let result = run_event_loop(
        &mut terminal,
        &mut keyboard,
        &mut backend,
        &mut controls,
        &feed,
        &config.theme,
        config.beam.units_per_row,
    );

    // Cleanup
    backend.shutdown(Instant::now());
    if enhanced {
        execute!(terminal.backend_mut(), PopKeyboardEnhancementFlags)?;
    }
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;

    result
}

fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    keyboard: &mut PianoKeyboard,
    backend: &mut LocalBackend,
    controls: &mut Controls,
    feed: &FeedAdapter,
    theme: &Theme,
    units_per_row: f32,
) -> Result<()> {
    let mut clock = FrameClock::new(FRAME, Instant::now());
    let mut last_reconcile = Instant::now();

    loop {
        let now = Instant::now();
        if clock.due(now) {
            backend.expire(now);
            controls.tick(backend, now);
            if now.duration_since(last_reconcile) >= RECONCILE_INTERVAL {
                controls.reconcile(&*backend);
                last_reconcile = now;
            }

            // Advance existing beams, then deliver new events so fresh beams
            // are drawn at their initial height
            keyboard.tick(now);
            keyboard.pump(feed, now);

            let octave = backend.capture().octave_name();
            terminal.draw(|frame| {
                render_piano(frame, keyboard, controls, &octave, theme, units_per_row);
            })?;
        }

        // Drain input until the next frame is due
        while event::poll(clock.remaining(Instant::now()))? {
            if let Event::Key(key) = event::read()? {
                if handle_key(key, backend, controls, Instant::now()) == Flow::Quit {
                    return Ok(());
                }
            }
        }
    }
}

fn handle_key(key: KeyEvent, backend: &mut LocalBackend, controls: &mut Controls, now: Instant) -> Flow {
    match key.kind {
        KeyEventKind::Press => return handle_press(key, backend, controls, now),
        KeyEventKind::Repeat => {
            if let KeyCode::Char(c) = key.code {
                backend.key_repeat(c, now);
            }
        }
        KeyEventKind::Release => {
            if let KeyCode::Char(c) = key.code {
                backend.key_up(c, now);
            }
        }
    }
    Flow::Continue
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

fn handle_press(key: KeyEvent, backend: &mut LocalBackend, controls: &mut Controls, now: Instant) -> Flow {
    match key.code {
        KeyCode::Esc => return Flow::Quit,
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return Flow::Quit,
        KeyCode::F(1) => {
            controls.toggle_listen(backend);
        }
        KeyCode::F(2) => {
            controls.toggle_record(backend, now);
        }
        // Octave down: < (Shift+,) or Left arrow
        KeyCode::Left | KeyCode::Char('<') => backend.octave_down(now),
        // Octave up: > (Shift+.) or Right arrow
        KeyCode::Right | KeyCode::Char('>') => backend.octave_up(now),
        KeyCode::Char(c) => backend.key_down(c, now),
        _ => {}
    }
    Flow::Continue
}
