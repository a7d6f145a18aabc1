use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Parser;
use tokio::io::AsyncReadExt;
use tokio::sync::{broadcast::error::RecvError, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use scriptbot::config::{self as cfg, Config, LogLevel};
use scriptbot::executor::{
    InputActuator, InputCatalog, Registry, Resolver, RunOptions, RunState, Scheduler,
};
use scriptbot::script;
use scriptbot::sources::{self, FileSource, ScriptSource, StdinSource};

/// Scriptbot CLI
#[derive(Debug, Parser)]
#[command(
    name = scriptbot::PKG_NAME,
    version = scriptbot::PKG_VERSION,
    about = "Run line-oriented automation scripts against simulated keyboard and mouse input"
)]
struct Args {
    /// Script file to run, or `-` to read it from stdin
    script: Option<PathBuf>,

    /// Path to a JSON configuration file
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Enable dry-run mode (log actions instead of simulating input)
    #[arg(long = "dry-run")]
    dry_run: bool,

    /// Set log level (e.g., trace, debug, info, warn, error). Overrides RUST_LOG.
    #[arg(long = "log-level")]
    log_level: Option<String>,

    /// Restart the run whenever the script file changes
    #[arg(long = "watch")]
    watch: bool,

    /// Print every step outcome as a JSON line on stdout
    #[arg(long = "events")]
    events: bool,

    /// Parse the script, print it as JSON and exit
    #[arg(long = "parse-only")]
    parse_only: bool,

    /// Print the JSON Schema for the configuration and exit
    #[arg(long = "print-schema")]
    print_schema: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => cfg::load_from_path_async(path).await?,
        None => Config::default(),
    };

    // --log-level > config > RUST_LOG > info
    match args
        .log_level
        .as_deref()
        .map(|s| LogLevel::parse(s).unwrap_or(LogLevel::Info))
        .or(config.log_level)
    {
        Some(level) => scriptbot::init_tracing_with(level.into()),
        None => scriptbot::init_tracing(),
    }

    if args.print_schema {
        let schema = cfg::generate_schema();
        let json = serde_json::to_string_pretty(&schema)?;
        println!("{json}");
        return Ok(());
    }

    let Some(script_path) = args.script.clone() else {
        bail!("a script path (or '-' for stdin) is required");
    };
    let from_stdin = script_path.as_os_str() == "-";
    let dry_run = args.dry_run || config.dry_run;
    let watch = !from_stdin && (args.watch || config.watch.enabled);

    info!(
        version = scriptbot::PKG_VERSION,
        script = %script_path.display(),
        dry_run,
        watch,
        "Starting scriptbot"
    );

    if args.parse_only {
        let text = if from_stdin {
            let mut text = String::new();
            tokio::io::stdin()
                .read_to_string(&mut text)
                .await
                .context("Failed to read script from stdin")?;
            text
        } else {
            tokio::fs::read_to_string(&script_path)
                .await
                .with_context(|| format!("Failed to read script {}", script_path.display()))?
        };
        let (program, anomalies) = script::parse_with_diagnostics(&text);
        for anomaly in &anomalies {
            warn!(%anomaly, "Script anomaly");
        }
        println!("{}", serde_json::to_string_pretty(&program)?);
        return Ok(());
    }

    let actuator = InputActuator::spawn(dry_run)?;
    let registry = Registry::build(Arc::new(InputCatalog::new(actuator)));
    let resolver = Arc::new(Resolver::new(Arc::new(registry)));
    debug!(actions = ?resolver.registry().names(), "Action catalog ready");
    let scheduler = Scheduler::new(resolver, RunOptions::from(&config));

    let printer = args.events.then(|| {
        let mut events = scheduler.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => match serde_json::to_string(&event) {
                        Ok(line) => println!("{line}"),
                        Err(e) => warn!(error = %e, "Failed to serialize step event"),
                    },
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Step event observer lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    });

    let source: Box<dyn ScriptSource> = if from_stdin {
        Box::new(StdinSource::new())
    } else {
        Box::new(FileSource::new(
            script_path.display().to_string(),
            Some(config.watch.poll_ms),
            watch,
        ))
    };

    let (tx, mut rx) = mpsc::channel::<String>(4);
    let _source = sources::spawn_source(source.as_ref(), tx);

    // Each received text replaces the active run.
    let mut current = None;
    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Some(text) => {
                    let program = script::parse(&text);
                    current = Some(scheduler.start(program).await);
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down");
                let state = scheduler.stop().await;
                flush_events(scheduler, printer).await;
                info!(?state, "scriptbot exited");
                return Ok(());
            }
        }
    }

    let Some(run) = current else {
        bail!("no script was loaded");
    };

    let state = tokio::select! {
        state = run.wait() => state,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, cancelling run");
            run.cancel().await
        }
    };

    flush_events(scheduler, printer).await;
    info!(?state, "scriptbot exited");
    if let RunState::Faulted(message) = state {
        error!(%message, "Run faulted");
        bail!("run faulted: {message}");
    }
    Ok(())
}

/// Close the event channel and wait until every buffered event is printed.
async fn flush_events(scheduler: Scheduler, printer: Option<JoinHandle<()>>) {
    drop(scheduler);
    if let Some(printer) = printer {
        if let Err(e) = printer.await {
            warn!(error = %e, "Step event printer failed");
        }
    }
}
