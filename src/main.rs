mod commands;
mod github;
mod labctl;

use std::process::exit;

use clap::Parser;
use commands::Opts;
use log::error;

#[tokio::main]
async fn main() {
    let opts = Opts::parse();
    if let Err(e) = labctl::cli(opts).await {
        error!("Error: {:#}", e);
        exit(1);
    }
}
