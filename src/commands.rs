//! This module defines the commands, subcommands, and arguments for labctl.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::Verbosity;

/// The top level clap parser and CLI arguments
#[derive(Parser, Debug)]
#[command(name = "labctl")]
#[command(version = clap::crate_version!())]
#[command(about = "Homelab tooling for the GitHub workflow and containerd node configuration")]
pub struct Opts {
    #[arg(long = "access-token", global = true, help = "GitHub access token")]
    pub access_token: Option<String>,

    #[command(flatten)]
    pub verbose: Verbosity,

    #[command(subcommand)]
    pub command: Commands,
}

/// The top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Work with issues on the homelab repository")]
    Issue(IssueCommand),
    #[command(about = "Work with pull requests on the homelab repository")]
    Pr(PrCommand),
    #[command(about = "Maintain containerd configuration on cluster nodes")]
    Containerd(ContainerdCommand),
    #[command(about = "Print version information")]
    Version,
}

#[derive(Args, Debug)]
pub struct IssueCommand {
    #[command(subcommand)]
    pub command: IssueSubcommand,
}

/// The `labctl issue` subcommands
#[derive(Subcommand, Debug)]
pub enum IssueSubcommand {
    #[command(about = "Create an issue from a title and a body file")]
    Create {
        #[arg(help = "Issue title")]
        title: String,
        #[arg(help = "Path to a file containing the issue body")]
        body_file: PathBuf,
        #[arg(value_delimiter = ',', help = "Comma-separated list of labels")]
        labels: Vec<String>,
    },
    #[command(about = "Add a comment to an existing issue")]
    Comment {
        #[arg(help = "Issue number")]
        number: u64,
        #[arg(help = "Comment text")]
        comment: String,
    },
}

#[derive(Args, Debug)]
pub struct PrCommand {
    #[command(subcommand)]
    pub command: PrSubcommand,
}

/// The `labctl pr` subcommands
#[derive(Subcommand, Debug)]
pub enum PrSubcommand {
    #[command(about = "Open a pull request from a head branch into a base branch")]
    Create {
        #[arg(help = "Pull request title")]
        title: String,
        #[arg(help = "Path to a file containing the pull request body")]
        body_file: PathBuf,
        #[arg(help = "Head branch")]
        head: String,
        #[arg(default_value = "master", help = "Base branch")]
        base: String,
    },
    #[command(about = "List pull requests by state")]
    List {
        #[arg(value_enum, default_value_t = PrState::Open, help = "State filter")]
        state: PrState,
    },
}

/// The pull request state filter accepted by the GitHub list endpoint
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrState {
    Open,
    Closed,
    All,
}

impl PrState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrState::Open => "open",
            PrState::Closed => "closed",
            PrState::All => "all",
        }
    }
}

impl std::fmt::Display for PrState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Args, Debug)]
pub struct ContainerdCommand {
    #[command(subcommand)]
    pub command: ContainerdSubcommand,
}

/// The `labctl containerd` subcommands
#[derive(Subcommand, Debug)]
pub enum ContainerdSubcommand {
    #[command(about = "Ensure systemd_cgroup = true in the runtime.v1.linux section of a config file")]
    Patch {
        #[arg(help = "Path to the containerd config file")]
        path: PathBuf,
        #[arg(default_value_t = 0, help = "Nonzero also forces runtime = \"nvidia-container-runtime\"")]
        nvidia: u8,
    },
}
