//! mr - macro recorder CLI
//!
//! Record pointer and keyboard input, save it as JSON, replay it with the
//! recorded timing.
//!
//! Host capture and injection need the `native` feature. `replay --dry-run`
//! works everywhere.

use anyhow::Result;
use clap::{Parser, Subcommand};
use crossbeam_channel::{unbounded, RecvTimeoutError};
use serde::Serialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use macro_core::{host_injector, Error, InputInjector, LogInjector};
use macro_recorder::hotkey::{install_global, teardown_global};
use macro_recorder::prelude::*;
use macro_recorder::DoneFn;

const DEFAULT_FILTER: &str = "mr=info,macro_recorder=info,macro_core=info";

#[derive(Parser)]
#[command(name = "mr")]
#[command(about = "Macro recorder - record and replay mouse and keyboard input")]
#[command(version)]
struct Cli {
    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record until the cancel key (or Ctrl+C)
    Record {
        #[arg(short, long, default_value = "macro")]
        name: String,
        /// Write to this file instead of the macro library
        #[arg(short, long)]
        out: Option<PathBuf>,
        #[arg(long, default_value = "esc")]
        cancel_key: String,
        /// Skip mouse moves closer than N pixels
        #[arg(long, default_value = "0")]
        threshold: f64,
    },
    /// Replay a saved macro
    Replay {
        file: String,
        #[arg(short, long, default_value = "1")]
        repetitions: u32,
        /// Seconds to wait between repetitions
        #[arg(short, long, default_value = "0")]
        interval: f64,
        #[arg(short, long, default_value = "1.0")]
        speed: f64,
        #[arg(long, default_value = "100")]
        glide_ms: u64,
        #[arg(long, default_value = "100")]
        scroll_scale: f64,
        /// Seconds before the first event
        #[arg(long, default_value = "2")]
        countdown: u64,
        /// Log injections instead of performing them
        #[arg(long)]
        dry_run: bool,
    },
    /// List saved macros
    List,
    /// Show macro info
    Show {
        file: String,
        #[arg(long)]
        all: bool,
    },
    /// Delete a macro
    Delete {
        file: String,
    },
    /// Wait for a hotkey and record one macro per press
    Listen {
        #[arg(long, default_value = "f9")]
        hotkey: String,
        #[arg(short, long, default_value = "macro")]
        name: String,
        #[arg(long, default_value = "esc")]
        cancel_key: String,
    },
}

#[derive(Serialize)]
struct Output {
    success: bool,
    error: Error,
}

fn init_logging(verbose: bool) {
    let fallback = if verbose {
        DEFAULT_FILTER.replace("=info", "=debug")
    } else {
        DEFAULT_FILTER.to_string()
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| fallback.into()),
        )
        .with_writer(io::stderr)
        .try_init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Record { name, out, cancel_key, threshold } => {
            record(&name, out.as_deref(), &cancel_key, threshold)
        }
        Commands::Replay {
            file,
            repetitions,
            interval,
            speed,
            glide_ms,
            scroll_scale,
            countdown,
            dry_run,
        } => {
            let config = ReplayConfig::default()
                .glide(Duration::from_millis(glide_ms))
                .scroll_scale(scroll_scale)
                .speed(speed);
            replay(&file, repetitions, interval, countdown, dry_run, config)
        }
        Commands::List => list(),
        Commands::Show { file, all } => show(&file, all),
        Commands::Delete { file } => delete(&file),
        Commands::Listen { hotkey, name, cancel_key } => listen(&hotkey, &name, &cancel_key),
    };

    if let Err(e) = result {
        if let Some(err) = e.downcast_ref::<Error>() {
            if let Ok(json) = serde_json::to_string_pretty(&Output { success: false, error: err.clone() }) {
                eprintln!("{}", json);
            }
        }
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn printer() -> StatusFn {
    Arc::new(|msg: &str| println!("{}", msg))
}

fn parse_key(s: &str) -> Result<KeyId> {
    KeyId::parse(s).map_err(|e| anyhow::anyhow!("invalid key '{}': {}", s, e))
}

#[cfg(feature = "native")]
fn input_source() -> Result<Arc<dyn InputSource>> {
    let hub: Arc<dyn InputSource> = macro_recorder::global_hub()?;
    Ok(hub)
}

#[cfg(not(feature = "native"))]
fn input_source() -> Result<Arc<dyn InputSource>> {
    Err(Error::backend_unavailable("built without a native input-capture backend").into())
}

/// Files that exist on disk are used as-is; anything else is looked up in the library.
fn resolve(library: &MacroLibrary, file: &str) -> PathBuf {
    let p = Path::new(file);
    if p.exists() {
        p.to_path_buf()
    } else {
        library.resolve(file)
    }
}

/// Seconds to a `Duration`; negative, non-finite and out-of-range values are rejected.
fn parse_interval(secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs).map_err(|_| {
        anyhow::anyhow!("interval must be a non-negative number of seconds, got {}", secs)
    })
}

fn recorder_config(cancel_key: &str, threshold: f64) -> Result<RecorderConfig> {
    Ok(RecorderConfig::default()
        .cancel_key(parse_key(cancel_key)?)
        .mouse_move_threshold(threshold))
}

fn record(name: &str, out: Option<&Path>, cancel_key: &str, threshold: f64) -> Result<()> {
    let config = recorder_config(cancel_key, threshold)?;
    // recording only; the injector is never driven
    let session = Arc::new(MacroSession::with_config(
        input_source()?,
        Arc::new(LogInjector),
        config,
        ReplayConfig::default(),
    ));

    let (tx, rx) = unbounded::<Arc<EventLog>>();
    session.on_recorded(Arc::new(move |log: Arc<EventLog>| {
        let _ = tx.send(log);
    }));
    session.start_recording(printer())?;

    let s = session.clone();
    ctrlc::set_handler(move || {
        s.stop_recording(None);
    })?;

    let mut count = 0;
    let log = loop {
        match rx.recv_timeout(Duration::from_millis(50)) {
            Ok(log) => break log,
            Err(RecvTimeoutError::Timeout) => {
                let captured = session.captured();
                if captured != count {
                    count = captured;
                    print!("\r{} events", count);
                    io::stdout().flush()?;
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                anyhow::bail!("recording ended without a result")
            }
        }
    };
    println!("\n{} events recorded", log.len());

    let path = match out {
        Some(path) => {
            session.save_macro(path)?;
            path.to_path_buf()
        }
        None => MacroLibrary::new()?.save(name, &log)?,
    };
    println!("Saved: {}", path.display());
    Ok(())
}

fn replay(
    file: &str,
    repetitions: u32,
    interval: f64,
    countdown: u64,
    dry_run: bool,
    config: ReplayConfig,
) -> Result<()> {
    let interval = parse_interval(interval)?;
    if !config.speed.is_finite() || config.speed <= 0.0 {
        anyhow::bail!("speed must be positive");
    }
    let speed = config.speed;

    let injector: Arc<dyn InputInjector> = if dry_run {
        Arc::new(LogInjector)
    } else {
        host_injector()?
    };
    // replay only; nothing ever publishes into this hub
    let session = Arc::new(MacroSession::with_config(
        Arc::new(InputHub::new()),
        injector,
        RecorderConfig::default(),
        config,
    ));

    let library = MacroLibrary::new()?;
    let log = session.load_macro(resolve(&library, file))?;

    println!(
        "Replaying {} ({} events, {:.1}s) x{} at {}x speed...",
        file,
        log.len(),
        log.duration().as_secs_f64(),
        repetitions,
        speed
    );
    if countdown > 0 && !dry_run {
        println!("Starting in {} seconds...", countdown);
        std::thread::sleep(Duration::from_secs(countdown));
    }

    let s = session.clone();
    ctrlc::set_handler(move || {
        s.stop_replaying();
    })?;

    let (tx, rx) = unbounded();
    let on_done: DoneFn = Box::new(move |stats: &ReplayStats| {
        let _ = tx.send(stats.clone());
    });
    session.replay_current(repetitions, interval, printer(), on_done)?;

    let stats = rx
        .recv()
        .map_err(|_| anyhow::anyhow!("replay ended without a result"))?;
    session.wait_replay();

    println!(
        "{} {} events over {} repetitions: {} moves, {} clicks, {} scrolls, {} keys",
        if stats.cancelled { "Stopped after" } else { "Done!" },
        stats.dispatched,
        stats.repetitions,
        stats.moves,
        stats.clicks,
        stats.scrolls,
        stats.keys
    );
    if stats.failed > 0 {
        println!("{} events could not be injected (see log)", stats.failed);
    }
    Ok(())
}

fn list() -> Result<()> {
    let library = MacroLibrary::new()?;
    let files = library.list()?;
    if files.is_empty() {
        println!("No macros saved in {}.", library.path().display());
    } else {
        for f in files {
            println!("{}", f);
        }
    }
    Ok(())
}

fn show(file: &str, all: bool) -> Result<()> {
    let library = MacroLibrary::new()?;
    let path = resolve(&library, file);
    let log = load_macro(&path)?;
    let counts = log.counts();

    println!("File: {}", path.display());
    println!("Events: {}", log.len());
    println!("Duration: {:.2}s", log.duration().as_secs_f64());
    println!(
        "\nSummary: {} moves, {} buttons, {} scrolls, {} keys",
        counts.moves, counts.buttons, counts.scrolls, counts.keys
    );
    if all {
        for (i, e) in log.iter().enumerate() {
            println!("{}: +{:.3}s {:?}", i, e.delay, e.action);
        }
    }
    Ok(())
}

fn delete(file: &str) -> Result<()> {
    let library = MacroLibrary::new()?;
    library.delete(file)?;
    println!("Deleted: {}", file);
    Ok(())
}

fn listen(hotkey: &str, name: &str, cancel_key: &str) -> Result<()> {
    let hotkey = parse_key(hotkey)?;
    let config = recorder_config(cancel_key, 0.0)?;
    if config.cancel_key == hotkey {
        anyhow::bail!("hotkey and cancel key must differ");
    }

    let source = input_source()?;
    let library = MacroLibrary::new()?;
    let session = Arc::new(MacroSession::with_config(
        source.clone(),
        Arc::new(LogInjector),
        config,
        ReplayConfig::default(),
    ));

    let (tx, rx) = unbounded::<Arc<EventLog>>();
    session.on_recorded(Arc::new(move |log: Arc<EventLog>| {
        let _ = tx.send(log);
    }));
    let trigger = HotkeyTrigger::start_recording_on(
        source.as_ref(),
        hotkey.clone(),
        session.clone(),
        printer(),
    )?;
    install_global(trigger);

    let running = Arc::new(AtomicBool::new(true));
    let flag = running.clone();
    let s = session.clone();
    ctrlc::set_handler(move || {
        flag.store(false, Ordering::SeqCst);
        s.stop_recording(None);
    })?;

    println!("Press {} to record, Ctrl+C to quit", hotkey);
    while running.load(Ordering::SeqCst) {
        match rx.recv_timeout(Duration::from_millis(100)) {
            Ok(log) => save_recording(&library, name, &log)?,
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    teardown_global();
    // a recording cut short by Ctrl+C still gets saved
    while let Ok(log) = rx.try_recv() {
        save_recording(&library, name, &log)?;
    }
    Ok(())
}

fn save_recording(library: &MacroLibrary, name: &str, log: &EventLog) -> Result<()> {
    if log.is_empty() {
        println!("Nothing recorded.");
    } else {
        let path = library.save(name, log)?;
        println!("Saved {} events: {}", log.len(), path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_interval() {
        assert_eq!(parse_interval(0.0).unwrap(), Duration::ZERO);
        assert_eq!(parse_interval(1.5).unwrap(), Duration::from_millis(1500));
        assert!(parse_interval(-1.0).is_err());
        assert!(parse_interval(f64::NAN).is_err());
        assert!(parse_interval(f64::INFINITY).is_err());
        assert!(parse_interval(1e30).is_err());
    }

    #[test]
    fn test_recorder_config_from_flags() {
        let config = recorder_config("Key.f8", 4.0).unwrap();
        assert_eq!(config.cancel_key, KeyId::named("f8"));
        assert_eq!(config.mouse_move_threshold, 4.0);
        assert!(recorder_config("", 0.0).is_err());
    }
}
