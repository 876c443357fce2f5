use clap::{Parser, Subcommand};
use formcheck::{
    config::{Config, ConfigStore, FileConfigStore},
    history::HistoryDb,
    landmarks::Side,
    runtime::{FixedTicker, FrameEvent, ReaderFrameSource, Runner},
    session::{CoachEvent, CurlSession, PostureSession},
    summary::{Exercise, SessionSummary},
};
use std::{
    error::Error,
    fs::File,
    io::{self, BufReader, Write},
    path::PathBuf,
    time::Duration,
};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const TICK_RATE_MS: u64 = 100;

/// rep counting, bad-form advisories and posture checks from pose landmarks
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Reads a stream of pose landmarks (one JSON object per line) and prints rep counts, bad-form warnings and posture labels as they happen."
)]
pub struct Cli {
    /// config file to use instead of the default location
    #[clap(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    /// do not store the session summary in the history database
    #[clap(long, global = true)]
    no_history: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// count bicep curl reps and warn about bad form
    Curl {
        /// landmark stream to read (defaults to stdin)
        #[clap(short = 'i', long)]
        input: Option<PathBuf>,

        /// arm to track (overrides the config)
        #[clap(short = 's', long, value_enum)]
        side: Option<Side>,
    },
    /// classify sitting/standing posture for every frame
    Posture {
        /// landmark stream to read (defaults to stdin)
        #[clap(short = 'i', long)]
        input: Option<PathBuf>,
    },
    /// list stored sessions
    History {
        /// number of sessions to show
        #[clap(short = 'n', long, default_value_t = 10)]
        limit: usize,

        /// export every stored session as csv instead
        #[clap(long, conflicts_with = "clear")]
        csv: bool,

        /// delete every stored session
        #[clap(long)]
        clear: bool,
    },
    /// print the effective configuration
    Config {
        /// write the effective configuration to the config path
        #[clap(long)]
        save: bool,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    let cli = Cli::parse();

    let store = cli
        .config
        .as_ref()
        .map_or_else(FileConfigStore::new, FileConfigStore::with_path);
    let config = store.load();
    config.validate()?;

    let mut stdout = io::stdout().lock();
    match cli.command {
        Command::Curl { ref input, side } => {
            let mut settings = config.curl_settings();
            if let Some(side) = side {
                settings.side = side;
            }
            tracing::info!(side = %settings.side, "starting curl session");
            let mut session = CurlSession::new(settings);
            let summary = replay(input.as_ref(), &mut stdout, |frame| {
                session.process_frame(frame).map_err(Into::into)
            })
            .map(|()| session.summary())?;
            finish(&cli, &mut stdout, &summary)?;
        }
        Command::Posture { ref input } => {
            let mut session = PostureSession::new(config.posture, config.min_visibility);
            replay(input.as_ref(), &mut stdout, |frame| {
                session
                    .process_frame(frame)
                    .map(|event| vec![event])
                    .map_err(Into::into)
            })?;
            finish(&cli, &mut stdout, &session.summary())?;
        }
        Command::History { limit, csv, clear } => {
            let db = HistoryDb::open_default()?;
            if clear {
                db.clear_all()?;
                writeln!(stdout, "history cleared")?;
            } else if csv {
                db.export_csv(&mut stdout)?;
            } else {
                for stored in db.recent_sessions(limit)? {
                    writeln!(stdout, "#{} {}", stored.id, stored.summary)?;
                }
                writeln!(
                    stdout,
                    "total curl reps: {}",
                    db.total_reps(Exercise::BicepCurl)?
                )?;
            }
        }
        Command::Config { save } => {
            writeln!(stdout, "{}", serde_json::to_string_pretty(&config)?)?;
            if save {
                store.save(&config)?;
                tracing::info!(path = %store.path().display(), "config saved");
            }
        }
    }

    Ok(())
}

/// Writes logs to stderr so stdout only carries coaching events.
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(env_filter)
        .init();
}

/// Drive a session over the input stream, printing each event on its own line.
/// Frames the session cannot use are skipped.
fn replay<W, F>(input: Option<&PathBuf>, out: &mut W, mut on_frame: F) -> Result<(), Box<dyn Error>>
where
    W: Write,
    F: FnMut(&formcheck::landmarks::TimedFrame) -> Result<Vec<CoachEvent>, Box<dyn Error>>,
{
    let source = match input {
        Some(path) => ReaderFrameSource::spawn(BufReader::new(File::open(path)?)),
        None => ReaderFrameSource::spawn(BufReader::new(io::stdin())),
    };
    let runner = Runner::new(source, FixedTicker::new(Duration::from_millis(TICK_RATE_MS)));

    loop {
        match runner.step() {
            FrameEvent::Frame(frame) => {
                // Unusable frames are already logged by the session
                if let Ok(events) = on_frame(&frame) {
                    for event in events {
                        writeln!(out, "{event}")?;
                    }
                }
            }
            FrameEvent::Tick => out.flush()?,
            FrameEvent::EndOfStream => break,
        }
    }
    out.flush()?;
    Ok(())
}

fn finish<W: Write>(cli: &Cli, out: &mut W, summary: &SessionSummary) -> Result<(), Box<dyn Error>> {
    writeln!(out, "{summary}")?;
    if !cli.no_history {
        match HistoryDb::open_default().and_then(|db| db.record_session(summary)) {
            Ok(id) => tracing::info!(id, "session stored"),
            Err(e) => tracing::warn!(error = %e, "could not store session"),
        }
    }
    Ok(())
}
