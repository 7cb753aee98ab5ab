//! stepgrid CLI - The `stepgrid` command.
//!
//! Plays a drum grid through the default (or configured) audio device and
//! prints each row as it becomes audible. The grid can be edited while it
//! plays by typing line commands on stdin.

mod commands;
mod kit;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use commands::{Command, HELP};
use crossbeam_channel::{select, Receiver};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use stepgrid_core::{ActiveCellSet, AudioEngine, Config, RowEvent, Sequencer};

/// Delay between voices when loading the demo kit
const KIT_STAGGER: Duration = Duration::from_millis(40);

/// stepgrid - Look-ahead drum step sequencer
#[derive(Parser, Debug)]
#[command(name = "stepgrid")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "A drum step sequencer with sample-accurate look-ahead scheduling", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play a pattern with the built-in kit
    Play {
        /// Tempo in BPM (overrides the config file)
        #[arg(short, long)]
        tempo: Option<f64>,

        /// Active cell as ROW:COL (repeatable); a demo beat is used when omitted
        #[arg(short, long = "cell", value_name = "ROW:COL", value_parser = parse_cell)]
        cells: Vec<(usize, usize)>,

        /// Stop after this many seconds
        #[arg(short, long, value_name = "SECS", value_parser = parse_duration)]
        duration: Option<Duration>,

        /// Path to config file
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Output device name (see `stepgrid devices`)
        #[arg(long, value_name = "NAME")]
        device: Option<String>,
    },

    /// List available audio output devices
    Devices,

    /// Create a default configuration file
    Init,

    /// Show the configuration file path
    ConfigPath,
}

fn parse_cell(text: &str) -> std::result::Result<(usize, usize), String> {
    let (row, column) = text
        .split_once(':')
        .ok_or_else(|| format!("expected ROW:COL, got '{}'", text))?;
    let row = row
        .trim()
        .parse()
        .map_err(|_| format!("invalid row '{}'", row))?;
    let column = column
        .trim()
        .parse()
        .map_err(|_| format!("invalid column '{}'", column))?;
    Ok((row, column))
}

fn parse_duration(text: &str) -> std::result::Result<Duration, String> {
    let seconds: f64 = text
        .trim()
        .parse()
        .map_err(|_| format!("invalid duration '{}'", text))?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(format!("duration must be a non-negative number of seconds, got '{}'", text));
    }
    Duration::try_from_secs_f64(seconds).map_err(|e| format!("invalid duration '{}': {}", text, e))
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();

    match args.command {
        Commands::Play {
            tempo,
            cells,
            duration,
            config,
            device,
        } => {
            let mut config = match config {
                Some(path) => Config::load_from(&path)
                    .with_context(|| format!("Failed to load config from {}", path.display()))?,
                None => Config::load_or_default(),
            };
            if let Some(tempo) = tempo {
                config.sequencer.tempo = tempo;
            }
            if device.is_some() {
                config.audio.output_device = device;
            }
            run_play(config, cells, duration)
        }
        Commands::Devices => stepgrid_core::print_audio_devices(),
        Commands::Init => {
            let path = Config::create_default_config_file()?;
            println!("Created default config at: {}", path.display());
            Ok(())
        }
        Commands::ConfigPath => {
            let path = Config::config_path()?;
            println!("{}", path.display());
            Ok(())
        }
    }
}

/// Four-on-the-floor with offbeat hats, for when no cells are given.
fn demo_pattern(rows: usize) -> Vec<(usize, usize)> {
    let mut cells = Vec::new();
    for row in 0..rows {
        if row % 4 == 0 {
            cells.push((row, 1));
        }
        if row % 8 == 4 {
            cells.push((row, 2));
        }
        if row % 4 == 2 {
            cells.push((row, 0));
        }
    }
    cells
}

/// One printed line per audible row, e.g. `04 | . x . . . . . .`
fn format_row(row: usize, cells: &ActiveCellSet) -> String {
    let columns = cells.shape().columns();
    let marks: Vec<&str> = (0..columns)
        .map(|column| if cells.is_active(row, column) { "x" } else { "." })
        .collect();
    format!("{:02} | {}", row, marks.join(" "))
}

fn run_play(config: Config, cells: Vec<(usize, usize)>, duration: Option<Duration>) -> Result<()> {
    config.sequencer.validate()?;

    let engine = AudioEngine::start(&config.audio).context("Failed to start audio output")?;
    let trigger = engine.trigger();
    let sequencer = Sequencer::new(&config.sequencer, engine.clock(), Arc::new(trigger.clone()))?;
    let shape = sequencer.shape();

    let cells = if cells.is_empty() {
        demo_pattern(shape.rows())
    } else {
        cells
    };
    for (row, column) in cells {
        if let Err(e) = sequencer.cells().try_with_cells_write(|set| set.insert(row, column)) {
            log::warn!("Skipping cell {}:{}: {}", row, column, e);
        }
    }

    let loader = kit::spawn_loader(
        sequencer.voices().clone(),
        engine.sample_rate(),
        shape.columns(),
        KIT_STAGGER,
    )?;

    let shutdown = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, shutdown.clone())
        .context("Failed to install Ctrl-C handler")?;

    let (command_tx, command_rx) = crossbeam_channel::unbounded();
    // With a deadline, closed stdin just means no more commands
    commands::spawn_stdin_reader(command_tx, duration.is_none())?;

    let rows = sequencer.subscribe();

    println!("stepgrid on '{}' ({} Hz)", engine.device_name(), engine.sample_rate());
    println!("{}", HELP);
    sequencer.start()?;

    let deadline = duration.map(|d| Instant::now() + d);
    run_loop(&sequencer, &rows, &command_rx, &shutdown, deadline)?;

    sequencer.stop();
    if loader.join().is_err() {
        log::error!("Kit loader thread panicked");
    }
    if trigger.dropped() > 0 {
        log::warn!("{} triggers were dropped", trigger.dropped());
    }
    println!("Bye");
    Ok(())
}

fn run_loop(
    sequencer: &Sequencer,
    rows: &Receiver<RowEvent>,
    commands: &Receiver<Command>,
    shutdown: &AtomicBool,
    deadline: Option<Instant>,
) -> Result<()> {
    let idle = crossbeam_channel::tick(Duration::from_millis(50));
    let mut commands = commands.clone();

    loop {
        if shutdown.load(Ordering::Relaxed) {
            log::info!("Interrupted by user (Ctrl+C)");
            return Ok(());
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return Ok(());
        }

        select! {
            recv(rows) -> event => {
                let Ok(event) = event else { return Ok(()) };
                let line = sequencer
                    .cells()
                    .with_cells_read(|set| format_row(event.row, set));
                println!("{}", line);
            }
            recv(commands) -> command => {
                let Ok(command) = command else {
                    // Input closed; keep playing until the deadline or Ctrl-C
                    commands = crossbeam_channel::never();
                    continue;
                };
                if !handle_command(sequencer, command)? {
                    return Ok(());
                }
            }
            recv(idle) -> _ => {}
        }
    }
}

/// Apply one command. Returns `false` when the user asked to quit.
fn handle_command(sequencer: &Sequencer, command: Command) -> Result<bool> {
    match command {
        Command::TogglePlay => {
            let playing = sequencer.toggle_play()?;
            println!("{}", if playing { "Playing" } else { "Stopped" });
        }
        Command::Tempo(text) => {
            if sequencer.set_tempo_text(&text) {
                println!("Tempo {} BPM", sequencer.tempo().bpm());
            } else {
                println!("Ignoring tempo '{}', still {} BPM", text, sequencer.tempo().bpm());
            }
        }
        Command::ToggleCell(row, column) => match sequencer.toggle_cell(row, column) {
            Ok(active) => println!("{}:{} {}", row, column, if active { "on" } else { "off" }),
            Err(e) => println!("{}", e),
        },
        Command::Clear => {
            sequencer.clear();
            println!("Cleared");
        }
        Command::Preview(column) => {
            if !sequencer.preview(column) {
                println!("Nothing loaded for column {}", column);
            }
        }
        Command::Quit => return Ok(false),
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepgrid_core::GridShape;

    #[test]
    fn test_parse_cell() {
        assert_eq!(parse_cell("3:1"), Ok((3, 1)));
        assert_eq!(parse_cell(" 12 : 7 "), Ok((12, 7)));
        assert!(parse_cell("3").is_err());
        assert!(parse_cell("a:1").is_err());
    }

    #[test]
    fn test_demo_pattern_fits_grid() {
        let cells = demo_pattern(16);
        assert!(cells.contains(&(0, 1)));
        assert!(cells.contains(&(4, 2)));
        assert!(cells.contains(&(2, 0)));
        assert!(cells.iter().all(|&(row, column)| row < 16 && column < 8));
    }

    #[test]
    fn test_format_row() {
        let mut set = ActiveCellSet::new(GridShape::new(16, 4, 16).unwrap());
        set.insert(4, 1).unwrap();
        set.insert(4, 3).unwrap();
        assert_eq!(format_row(4, &set), "04 | . x . x");
        assert_eq!(format_row(5, &set), "05 | . . . .");
    }

    #[test]
    fn test_cli_parses_play_args() {
        let args = Args::try_parse_from([
            "stepgrid", "play", "--tempo", "90", "--cell", "0:1", "--cell", "4:2",
        ])
        .unwrap();
        match args.command {
            Commands::Play { tempo, cells, .. } => {
                assert_eq!(tempo, Some(90.0));
                assert_eq!(cells, vec![(0, 1), (4, 2)]);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_duration_rejects_bad_values() {
        assert_eq!(parse_duration("2.5"), Ok(Duration::from_millis(2500)));
        assert_eq!(parse_duration("0"), Ok(Duration::ZERO));
        assert!(parse_duration("-1").is_err());
        assert!(parse_duration("nan").is_err());
        assert!(parse_duration("inf").is_err());
        assert!(parse_duration("1e300").is_err());
        assert!(parse_duration("soon").is_err());

        assert!(Args::try_parse_from(["stepgrid", "play", "--duration=-1"]).is_err());
        assert!(Args::try_parse_from(["stepgrid", "play", "--duration", "nan"]).is_err());
        let args = Args::try_parse_from(["stepgrid", "play", "--duration", "10"]).unwrap();
        match args.command {
            Commands::Play { duration, .. } => assert_eq!(duration, Some(Duration::from_secs(10))),
            other => panic!("unexpected command {:?}", other),
        }
    }
}
