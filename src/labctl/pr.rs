//! The `labctl pr` operations: open a pull request, list pull requests.

use std::fs;
use std::path::Path;

use anyhow::{Context as _, Result};
use chrono::SecondsFormat;

use crate::commands::{PrState, PrSubcommand};
use crate::github::{self, ApiOutcome, PullRequest};
use crate::labctl::Context;

/// Handle the `labctl pr` subcommands.
pub async fn run(context: &Context, command: &PrSubcommand) -> Result<()> {
    match command {
        PrSubcommand::Create {
            title,
            body_file,
            head,
            base,
        } => {
            create(context, title, body_file, head, base).await?;
            Ok(())
        }
        PrSubcommand::List { state } => list(context, *state).await,
    }
}

/// Open a pull request from `head` into `base` and print the server's view
/// of it: number, URL, echoed title, and the resolved refs. Yields the new
/// pull request number; a reported HTTP failure yields no number.
async fn create(
    context: &Context,
    title: &str,
    body_file: &Path,
    head: &str,
    base: &str,
) -> Result<u64> {
    println!("Creating PR: {title}");
    println!("Branch: {head} → {base}");
    println!();

    let body = fs::read_to_string(body_file)
        .with_context(|| format!("cannot read {}", body_file.display()))?;
    let octocrab = github::client(&context.access_token)?;

    let outcome = github::create_pull_request(
        &octocrab,
        &context.owner,
        &context.repo,
        title,
        &body,
        head,
        base,
    )
    .await?;

    match outcome {
        ApiOutcome::Success(pr) => {
            println!("✅ Created: PR #{}", pr.number);
            println!("🔗 {}", pr.html_url);
            println!("📝 Title: {}", pr.title);
            // The refs echoed back by the server, not the ones we asked for.
            println!("🌿 {} → {}", pr.head.r#ref, pr.base.r#ref);
            Ok(pr.number)
        }
        ApiOutcome::Failure { status, body } => {
            println!("❌ Failed to create PR (HTTP {})", status.as_u16());
            println!("Error: {body}");
            anyhow::bail!("pull request creation failed")
        }
    }
}

/// List pull requests in the given state, first page only, one block per PR.
async fn list(context: &Context, state: PrState) -> Result<()> {
    let octocrab = github::client(&context.access_token)?;

    let outcome =
        github::list_pull_requests(&octocrab, &context.owner, &context.repo, state.as_str())
            .await?;

    match outcome {
        ApiOutcome::Success(prs) => {
            print!("{}", render_list(state, &prs));
            Ok(())
        }
        ApiOutcome::Failure { status, body } => {
            println!(
                "❌ Failed to list pull requests (HTTP {})",
                status.as_u16()
            );
            println!("Error: {body}");
            anyhow::bail!("pull request listing failed")
        }
    }
}

fn render_list(state: PrState, prs: &[PullRequest]) -> String {
    if prs.is_empty() {
        return format!("No {state} pull requests found.\n");
    }

    let mut out = format!("Found {} {state} pull request(s):\n\n", prs.len());
    for pr in prs {
        out.push_str(&render_pull_request(pr));
        out.push('\n');
    }
    out
}

fn render_pull_request(pr: &PullRequest) -> String {
    format!(
        "PR #{}: {}\n  🌿 {} → {}\n  🔗 {}\n  👤 {}\n  📅 {}\n",
        pr.number,
        pr.title,
        pr.head.r#ref,
        pr.base.r#ref,
        pr.html_url,
        pr.user.login,
        pr.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
    )
}
