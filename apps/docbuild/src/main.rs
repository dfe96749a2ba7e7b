//! docbuild - documentation build orchestration service
//!
//! Reads build request files, drives each through the instruction state
//! machine concurrently, and publishes the results via the cleanup
//! pipeline. Instructions that reference the same remote repository
//! serialize their repository preparation through a shared lock
//! registry.

mod cli;
mod logging;
mod worker;

use clap::Parser;
use cli::Cli;
use docbuild_builder::{BuildInstructionController, CommandMailer, Notifier};
use docbuild_config::Config;
use docbuild_events::EventSender;
use docbuild_resources::ResourceLockRegistry;
use docbuild_types::BuildRequest;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(error) => {
            tracing::error!(%error, "fatal");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<bool, docbuild_errors::Error> {
    let config = Arc::new(Config::load_or_default(&cli.config).await?);

    let registry = Arc::new(ResourceLockRegistry::new());
    let notifier: Arc<dyn Notifier> =
        Arc::new(CommandMailer::new(&config.server.mail_command));

    let (events, mut receiver) = docbuild_events::channel();
    let drain = tokio::spawn(async move {
        while let Some(event) = receiver.recv().await {
            logging::log_event(&event);
        }
    });

    let mut handles = Vec::with_capacity(cli.requests.len());
    for path in &cli.requests {
        let request = match read_request(path).await {
            Ok(request) => request,
            Err(error) => {
                tracing::error!(path = %path.display(), %error, "unreadable build request");
                handles.push(tokio::spawn(async { false }));
                continue;
            }
        };
        handles.push(tokio::spawn(run_instruction(
            request,
            Arc::clone(&config),
            Arc::clone(&registry),
            Arc::clone(&notifier),
            events.clone(),
            cli.workers,
        )));
    }

    let mut all_ok = true;
    for handle in handles {
        match handle.await {
            Ok(ok) => all_ok &= ok,
            Err(error) => {
                tracing::error!(%error, "instruction task panicked");
                all_ok = false;
            }
        }
    }

    drop(events);
    let _ = drain.await;
    Ok(all_ok)
}

async fn read_request(path: &Path) -> Result<BuildRequest, docbuild_errors::Error> {
    let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
        docbuild_errors::ConfigError::ReadFailed {
            path: path.display().to_string(),
            message: e.to_string(),
        }
    })?;
    let request: BuildRequest = serde_json::from_str(&raw).map_err(|e| {
        docbuild_errors::ConfigError::Invalid {
            message: format!("{}: {e}", path.display()),
        }
    })?;
    Ok(request)
}

/// Drive one build instruction end to end. The cleanup pipeline runs
/// regardless of how preparation went.
async fn run_instruction(
    request: BuildRequest,
    config: Arc<Config>,
    registry: Arc<ResourceLockRegistry>,
    notifier: Arc<dyn Notifier>,
    events: EventSender,
    workers: usize,
) -> bool {
    let id = request.id.clone();
    let mut controller = BuildInstructionController::new(
        request,
        config,
        registry,
        notifier,
        Some(events),
    );

    let prepared = controller.prepare().await;
    let controller = Arc::new(controller);

    let mut built = true;
    match prepared {
        Ok(()) => {
            let mut tasks = Vec::with_capacity(workers.max(1));
            for _ in 0..workers.max(1) {
                tasks.push(tokio::spawn(worker::run(Arc::clone(&controller))));
            }
            for task in tasks {
                if task.await.is_err() {
                    built = false;
                }
            }
            let snapshot = controller.snapshot();
            built &= snapshot
                .deliverables
                .values()
                .all(|d| d.status == docbuild_types::DeliverableStatus::Success);
        }
        Err(error) => {
            tracing::error!(id = %id, %error, "build instruction aborted");
            built = false;
        }
    }

    controller.cleanup().await;
    built
}
