use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context};
use metagen::broadcast::RunPhase;
use metagen::generation::Instructions;
use metagen::workspace;
use metagen::{Config, JobState, MetagenApp, RegenerateOutcome, RunReport};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

fn online(config: &Config) -> anyhow::Result<MetagenApp> {
    Ok(MetagenApp::from_config(config)?)
}

fn offline(config: &Config) -> anyhow::Result<MetagenApp> {
    Ok(MetagenApp::offline(config, "not needed for this command")?)
}

/// Restores the saved session or fails with a hint.
fn restored(app: &MetagenApp) -> anyhow::Result<()> {
    match app.orchestrator.restore()? {
        Some(session) => {
            info!(
                "Restored session for {} ({} of {} processed)",
                session.file_name, session.processed, session.total
            );
            Ok(())
        }
        None => bail!("No saved session. Run `metagen generate <FILE>` first."),
    }
}

/// Cancels the returned token on Ctrl-C.
fn cancel_on_interrupt() -> anyhow::Result<CancellationToken> {
    let token = CancellationToken::new();
    let handler_token = token.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nStopping after the current chunk...");
        handler_token.cancel();
    })
    .context("Failed to install Ctrl-C handler")?;
    Ok(token)
}

/// Prints chunk progress until the run settles.
fn print_progress(app: &MetagenApp) -> JoinHandle<()> {
    let mut rx = app.broadcaster.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            match event.phase {
                RunPhase::Started | RunPhase::ChunkMerged => {
                    println!(
                        "[{:>3.0}%] {}",
                        event.progress() * 100.0,
                        event.message
                    );
                }
                RunPhase::Settled => break,
            }
        }
    })
}

fn print_report(report: &RunReport) {
    println!("{}", report.message);
    if report.resumable {
        println!("Run `metagen resume` to continue, or `metagen export` for partial results.");
    } else if report.outcome == JobState::Completed {
        println!("Run `metagen export` to write the results.");
    }
}

async fn run(app: &MetagenApp, resume: bool) -> anyhow::Result<()> {
    let instructions = app.instructions()?;
    let cancel = cancel_on_interrupt()?;
    let printer = print_progress(app);

    let report = if resume {
        app.orchestrator.resume(instructions.text(), cancel).await?
    } else {
        app.orchestrator.start(instructions.text(), cancel).await?
    };
    let _ = printer.await;

    print_report(&report);
    if report.outcome == JobState::Failed {
        bail!("Generation failed");
    }
    Ok(())
}

pub async fn generate(config: &Config, file: &Path) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let file_name = file
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("Invalid file name: {}", file.display()))?;

    let records = metagen::parse_and_normalize(file_name, &bytes)?;
    let app = online(config)?;
    app.orchestrator.open(file_name, records)?;
    run(&app, false).await
}

pub async fn resume(config: &Config) -> anyhow::Result<()> {
    let app = online(config)?;
    restored(&app)?;
    {
        let shared = app.workspace();
        let ws = workspace::lock(&shared);
        if !ws.resumable() {
            warn!("Saved session is not marked resumable; processing remaining products anyway");
        }
        if ws.remaining().is_empty() {
            println!("Nothing left to generate.");
            return Ok(());
        }
    }
    run(&app, true).await
}

pub fn status(config: &Config) -> anyhow::Result<()> {
    let app = offline(config)?;
    let Some(session) = app.orchestrator.restore()? else {
        println!("No saved session.");
        return Ok(());
    };

    let shared = app.workspace();
    let ws = workspace::lock(&shared);
    let errors = ws
        .ordered()
        .iter()
        .filter(|row| row.generated.has_error())
        .count();

    println!("File:       {}", session.file_name);
    println!("Processed:  {} of {}", session.processed, session.total);
    println!("Resumable:  {}", if session.resumable { "yes" } else { "no" });
    if errors > 0 {
        println!("Errors:     {} row(s) need regeneration", errors);
    }
    if ws.unmatchable_count() > 0 {
        println!("Skipped:    {} row(s) without a SKU", ws.unmatchable_count());
    }
    Ok(())
}

pub fn export(config: &Config, output: Option<PathBuf>) -> anyhow::Result<()> {
    let app = offline(config)?;
    restored(&app)?;

    let (file_name, bytes) = app.export()?;
    let path = output.unwrap_or_else(|| PathBuf::from(file_name));
    std::fs::write(&path, bytes)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}

pub fn edit(config: &Config, sku: &str, field: &str, value: &str) -> anyhow::Result<()> {
    let app = offline(config)?;
    restored(&app)?;

    let outcome = app.overrides.edit(sku, field, value)?;
    if outcome.changed {
        println!("Updated {} for {}", field, sku);
    } else {
        println!("{} for {} already has that value", field, sku);
    }
    Ok(())
}

pub async fn regenerate(config: &Config, sku: &str) -> anyhow::Result<()> {
    let app = online(config)?;
    restored(&app)?;

    let instructions = app.instructions()?;
    match app.overrides.regenerate(sku, instructions.text()).await? {
        RegenerateOutcome::Regenerated { tokens_used } => {
            println!("Regenerated {} ({} tokens used)", sku, tokens_used);
            Ok(())
        }
        RegenerateOutcome::QuotaExceeded { message } => {
            println!("{}", message);
            Ok(())
        }
        RegenerateOutcome::Failed { detail } => bail!("Regeneration failed: {}", detail),
    }
}

pub fn dismiss(config: &Config) -> anyhow::Result<()> {
    let app = offline(config)?;
    app.orchestrator.dismiss()?;
    println!("Session discarded.");
    Ok(())
}

pub fn instructions(config: &Config, set: Option<PathBuf>, reset: bool) -> anyhow::Result<()> {
    let app = offline(config)?;

    if reset {
        app.reset_instructions()?;
        println!("Instructions reset to the default.");
        return Ok(());
    }

    if let Some(path) = set {
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        app.save_instructions(&Instructions::custom(text))?;
        println!("Instructions saved.");
        return Ok(());
    }

    let current = app.instructions()?;
    if current.is_default() {
        println!("(default instructions)");
    }
    println!("{}", current.text());
    Ok(())
}
