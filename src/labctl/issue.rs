//! The `labctl issue` operations: create an issue, comment on an issue.

use std::fs;
use std::path::Path;

use anyhow::{Context as _, Result};

use crate::commands::IssueSubcommand;
use crate::github::{self, ApiOutcome};
use crate::labctl::Context;

/// Handle the `labctl issue` subcommands.
pub async fn run(context: &Context, command: &IssueSubcommand) -> Result<()> {
    match command {
        IssueSubcommand::Create {
            title,
            body_file,
            labels,
        } => {
            create(context, title, body_file, labels).await?;
            Ok(())
        }
        IssueSubcommand::Comment { number, comment } => {
            add_comment(context, *number, comment).await
        }
    }
}

/// Create an issue on the homelab repository and print its number and URL.
/// Yields the new issue number; a reported HTTP failure yields no number.
async fn create(
    context: &Context,
    title: &str,
    body_file: &Path,
    labels: &[String],
) -> Result<u64> {
    println!("Creating issue: {title}");

    let body = fs::read_to_string(body_file)
        .with_context(|| format!("cannot read {}", body_file.display()))?;
    let octocrab = github::client(&context.access_token)?;

    let outcome = github::create_issue(
        &octocrab,
        &context.owner,
        &context.repo,
        title,
        &body,
        labels,
    )
    .await?;

    match outcome {
        ApiOutcome::Success(issue) => {
            println!("✅ Created: Issue #{}", issue.number);
            println!("🔗 {}", issue.html_url);
            Ok(issue.number)
        }
        ApiOutcome::Failure { status, body } => {
            println!("❌ Failed to create issue (HTTP {})", status.as_u16());
            println!("Error: {body}");
            anyhow::bail!("issue creation failed")
        }
    }
}

/// Post a comment on an existing issue and print the comment's URL.
async fn add_comment(context: &Context, number: u64, comment: &str) -> Result<()> {
    let octocrab = github::client(&context.access_token)?;

    let outcome =
        github::comment_on_issue(&octocrab, &context.owner, &context.repo, number, comment)
            .await?;

    match outcome {
        ApiOutcome::Success(posted) => {
            println!("✅ Comment added to Issue #{number}");
            println!("🔗 {}", posted.html_url);
            Ok(())
        }
        ApiOutcome::Failure { status, body } => {
            println!(
                "❌ Failed to comment on Issue #{number} (HTTP {})",
                status.as_u16()
            );
            println!("Error: {body}");
            anyhow::bail!("issue comment failed")
        }
    }
}
