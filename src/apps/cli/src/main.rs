//! Parley CLI - plays a YAML dialogue script in the terminal.

mod console;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use clap::Parser;
use console::{ConsoleSettings, ConsoleView};
use parley_core::commands::{
    ActionRegistry, CommandContext, ParameterCount, UnhandledCommandHandler,
};
use parley_core::infrastructure::logging::{level_to_str, resolve_log_level};
use parley_core::infrastructure::{DiagnosticKind, RunnerEvent};
use parley_core::{
    DialogueProject, DialogueRunner, ParleyConfig, ParleyResult, ScriptProgram, ScriptedDialogue,
    TableLineProvider,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "parley-cli", version, about = "Play a Parley dialogue script in the terminal")]
struct Cli {
    /// YAML dialogue script
    script: PathBuf,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Node to start at; defaults to `runner.start_node` from the configuration
    #[arg(short, long)]
    node: Option<String>,

    /// Choose the first available option automatically and print lines instantly
    #[arg(long)]
    auto: bool,

    /// Print runner events to stderr as JSON lines
    #[arg(long)]
    events: bool,

    /// Milliseconds a line stays up before the dialogue moves on
    #[arg(long, default_value_t = 1200)]
    line_delay_ms: u64,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Stop with an error on commands nothing handles, instead of printing them
    #[arg(long)]
    strict: bool,
}

/// Prints commands the registry doesn't know so scripts keep playing.
struct CommandPrinter;

#[async_trait]
impl UnhandledCommandHandler for CommandPrinter {
    async fn handle_command(
        &self,
        command_text: &str,
        _context: &CommandContext,
    ) -> ParleyResult<bool> {
        println!("[{}]", command_text);
        Ok(true)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => ParleyConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ParleyConfig::default(),
    };

    init_tracing(config.logging.level.as_deref(), cli.verbose);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(run(cli, config));
    // Stdin reads run on a blocking thread that may never return.
    runtime.shutdown_timeout(Duration::from_millis(100));
    result
}

fn init_tracing(configured: Option<&str>, verbose: bool) {
    let level = resolve_log_level(configured, verbose);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(EnvFilter::new(level_to_str(level)))
        .init();
}

async fn run(cli: Cli, config: ParleyConfig) -> Result<()> {
    let program = ScriptProgram::load(&cli.script)
        .with_context(|| format!("Failed to load script {}", cli.script.display()))?;
    let project_name = cli
        .script
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "script".to_string());
    let strings = Arc::new(TableLineProvider::from_strings(program.string_table()));

    let commands = ActionRegistry::with_builtins();
    commands.add_command("echo", ParameterCount::AtLeast(0), |invocation| async move {
        println!("{}", invocation.args.join(" "));
        Ok(())
    });

    let view = Arc::new(ConsoleView::new(ConsoleSettings {
        auto: cli.auto,
        line_delay: Duration::from_millis(cli.line_delay_ms),
    }));

    let mut builder = DialogueRunner::builder(Arc::new(ScriptedDialogue::new()))
        .project(DialogueProject::new(project_name, program))
        .line_provider(strings)
        .command_dispatcher(Arc::new(commands))
        .view(view)
        .config(config.runner.clone());
    if !cli.strict {
        builder = builder.unhandled_command_handler(Arc::new(CommandPrinter));
    }
    let runner = builder.build();

    let rejected_command = Arc::new(AtomicBool::new(false));
    let mut events = runner.subscribe();
    let monitor = {
        let handle = runner.handle();
        let rejected_command = rejected_command.clone();
        let (print_events, strict) = (cli.events, cli.strict);
        tokio::spawn(async move {
            loop {
                let event = match events.recv().await {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("Event monitor lagged: skipped={}", skipped);
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                if print_events {
                    match serde_json::to_string(&event) {
                        Ok(json) => eprintln!("{}", json),
                        Err(e) => tracing::warn!("Failed to serialize runner event: {}", e),
                    }
                }
                let unknown_command = event
                    .as_diagnostic()
                    .is_some_and(|d| d.kind == DiagnosticKind::UnknownCommand);
                if strict && unknown_command {
                    rejected_command.store(true, Ordering::SeqCst);
                    handle.stop();
                }
                if matches!(event, RunnerEvent::DialogueCompleted { .. }) {
                    break;
                }
            }
        })
    };

    {
        let handle = runner.handle();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupted, stopping dialogue");
                handle.stop();
            }
        });
    }

    match &cli.node {
        Some(node) => runner.start_dialogue(node)?,
        None => runner.start_default()?,
    }
    let outcome = runner.wait_for_completion().await;
    if let Err(e) = monitor.await {
        tracing::warn!("Event monitor failed: {}", e);
    }

    outcome.context("Dialogue stopped with an error")?;
    if rejected_command.load(Ordering::SeqCst) {
        bail!("Dialogue stopped: a command was not handled");
    }
    Ok(())
}
