//! Command-line interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "pagedrop", version, about = "Deploy a static folder to Cloudflare Pages")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Deploy a folder, uploading only changed files
    Deploy {
        /// Folder to deploy (default: `directory` from the config file)
        directory: Option<PathBuf>,
        /// Target project (default: `project` from the config file)
        #[arg(short, long)]
        project: Option<String>,
        /// Return as soon as the deployment is created
        #[arg(long)]
        no_follow: bool,
    },
    /// Show the current status of a deployment
    Status {
        deployment_id: String,
        #[arg(short, long)]
        project: Option<String>,
        /// Print the status as JSON
        #[arg(long)]
        json: bool,
    },
    /// Follow a deployment until it finishes
    Watch {
        deployment_id: String,
        #[arg(short, long)]
        project: Option<String>,
    },
    /// Print the manifest of a folder without contacting the platform
    Manifest {
        directory: Option<PathBuf>,
        /// Print the manifest as JSON, as submitted with a deployment
        #[arg(long)]
        json: bool,
    },
}
