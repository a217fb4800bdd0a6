///! This module defines actual code that executes the labctl commands.
pub mod containerd;
pub mod issue;
pub mod pr;

use std::env::VarError;

use anyhow::Result;

use crate::commands::{Commands, ContainerdSubcommand, Opts};
use crate::github;

/// A context object that holds resolved state for the network commands
#[derive(Debug)]
pub struct Context {
    pub access_token: String,
    pub owner: String,
    pub repo: String,
}

/// Build a context object from the command-line arguments and environment
fn build_context(opts: &Opts) -> Result<Context> {
    let access_token = get_access_token(opts)?;
    Ok(Context {
        access_token,
        owner: github::OWNER.to_string(),
        repo: github::REPO.to_string(),
    })
}

fn get_access_token(opts: &Opts) -> Result<String> {
    match &opts.access_token {
        Some(access_token) => Ok(access_token.clone()),
        None => maybe_get_github_token_env_var(),
    }
}

fn maybe_get_github_token_env_var() -> Result<String> {
    match std::env::var("GITHUB_TOKEN") {
        Ok(access_token) => Ok(access_token),
        Err(VarError::NotPresent) => Err(anyhow::anyhow!(
            "no access token provided and GITHUB_TOKEN environment variable not set, aborting"
        )),
        Err(e) => Err(anyhow::anyhow!(e)),
    }
}

/// Run the labctl CLI
pub async fn cli(opts: Opts) -> Result<()> {
    env_logger::builder()
        .filter_level(opts.verbose.log_level_filter())
        .target(env_logger::Target::Stdout)
        .init();

    match &opts.command {
        Commands::Version => {
            println!("labctl version {}", clap::crate_version!());
            Ok(())
        }
        Commands::Issue(cmd) => {
            let context = build_context(&opts)?;
            issue::run(&context, &cmd.command).await
        }
        Commands::Pr(cmd) => {
            let context = build_context(&opts)?;
            pr::run(&context, &cmd.command).await
        }
        // The patcher is local-only and neither needs nor checks a token.
        Commands::Containerd(cmd) => match &cmd.command {
            ContainerdSubcommand::Patch { path, nvidia } => containerd::run(path, *nvidia),
        },
    }
}
