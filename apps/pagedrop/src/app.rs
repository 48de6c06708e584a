//! Command handlers.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use pagedrop_deploy::{DeployState, Deployer, PagesPlatform, PollHandle, PollOutcome};
use pagedrop_manifest::build_manifest;
use pagedrop_pages_api::Client;
use pagedrop_protocol::validate_project_name;
use tracing::{error, info, warn};

use crate::cli::Command;
use crate::config::Config;

/// Exit code after Ctrl-C.
const INTERRUPTED: u8 = 130;

/// Runs one command to completion.
pub async fn run(command: Command, config: Config) -> anyhow::Result<ExitCode> {
    match command {
        Command::Deploy {
            directory,
            project,
            no_follow,
        } => {
            let project = resolve_project(project, &config)?;
            let folder = directory.unwrap_or_else(|| PathBuf::from(&config.directory));
            let deployer = deployer(&config, !no_follow)?;
            deploy(&deployer, &project, &folder).await
        }
        Command::Status {
            deployment_id,
            project,
            json,
        } => {
            let project = resolve_project(project, &config)?;
            let status = deployer(&config, false)?
                .poll_status(&project, &deployment_id)
                .await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                println!("{:?} ({}%)", status.state, status.progress);
                for line in &status.logs {
                    println!("  {line}");
                }
                if let Some(url) = &status.url {
                    println!("{url}");
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Watch {
            deployment_id,
            project,
        } => {
            let project = resolve_project(project, &config)?;
            let handle = deployer(&config, true)?.watch(&project, &deployment_id);
            follow(handle).await
        }
        Command::Manifest { directory, json } => {
            let folder = directory.unwrap_or_else(|| PathBuf::from(&config.directory));
            print_manifest(&config, &folder, json)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn deployer(config: &Config, follow: bool) -> anyhow::Result<Deployer> {
    config.require_credentials()?;

    let mut client = Client::new(&config.account_id, &config.api_token)?;
    if let Some(url) = &config.base_url {
        client = client.with_base_url(url);
    }
    let platform: Arc<dyn PagesPlatform> = Arc::new(client);

    let mut deploy_config = config.deploy.to_deploy_config();
    deploy_config.follow_deployment = follow && config.deploy.follow;
    Ok(Deployer::new(platform, deploy_config))
}

/// Picks the project from the command line or the config file.
fn resolve_project(arg: Option<String>, config: &Config) -> anyhow::Result<String> {
    let project = arg
        .or_else(|| (!config.project.is_empty()).then(|| config.project.clone()))
        .context("no project given (use --project or set `project` in the config file)")?;
    validate_project_name(&project)?;
    Ok(project)
}

async fn deploy(deployer: &Deployer, project: &str, folder: &Path) -> anyhow::Result<ExitCode> {
    let outcome = deployer
        .deploy(project, folder)
        .await
        .with_context(|| format!("deploying {} to {project}", folder.display()))?;

    info!(
        deployment = %outcome.deployment_id,
        uploaded = outcome.report.uploaded.len(),
        batches = outcome.report.batches,
        "deployment created"
    );
    match &outcome.url {
        Some(url) => println!("{url}"),
        None => println!("{}", outcome.deployment_id),
    }

    match outcome.poller {
        Some(handle) => follow(handle).await,
        None if outcome.initial_status.state == DeployState::Failure => Ok(ExitCode::FAILURE),
        None => Ok(ExitCode::SUCCESS),
    }
}

/// Logs progress until the poller stops or Ctrl-C is pressed.
async fn follow(handle: PollHandle) -> anyhow::Result<ExitCode> {
    let mut updates = handle.subscribe();
    let progress = tokio::spawn(async move {
        let mut printed = 0;
        while updates.changed().await.is_ok() {
            let Some(status) = updates.borrow_and_update().clone() else {
                continue;
            };
            for line in status.logs.iter().skip(printed) {
                info!("{line}");
            }
            printed = status.logs.len();
            info!(state = ?status.state, progress = status.progress, "deployment status");
        }
    });

    let code = tokio::select! {
        outcome = handle.wait() => exit_code(outcome),
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted, the deployment continues on the platform");
            ExitCode::from(INTERRUPTED)
        }
    };

    if let Err(e) = progress.await {
        warn!(error = %e, "progress reporter failed");
    }
    Ok(code)
}

fn exit_code(outcome: PollOutcome) -> ExitCode {
    match outcome {
        PollOutcome::Finished(status) if status.state == DeployState::Success => {
            info!(url = status.url.as_deref().unwrap_or("-"), "deployment live");
            ExitCode::SUCCESS
        }
        PollOutcome::Finished(status) => {
            error!(
                reason = status.error_message.as_deref().unwrap_or("unknown"),
                "deployment failed"
            );
            ExitCode::FAILURE
        }
        PollOutcome::TimedOut { last } => {
            warn!(
                state = ?last.map(|s| s.state),
                "stopped following, the deployment is still in progress"
            );
            ExitCode::SUCCESS
        }
        PollOutcome::Cancelled => ExitCode::FAILURE,
    }
}

fn print_manifest(config: &Config, folder: &Path, json: bool) -> anyhow::Result<()> {
    let options = config.deploy.to_deploy_config().manifest;
    let built = build_manifest(folder, &options)
        .with_context(|| format!("reading {}", folder.display()))?;

    if json {
        println!("{}", built.manifest.to_json()?);
    } else {
        for file in &built.files {
            println!("{}  {:>10}  {}", file.fingerprint, file.size, file.relative_path);
        }
        info!(
            files = built.files.len(),
            unique = built.index.len(),
            bytes = built.total_size,
            "manifest built"
        );
    }
    Ok(())
}
