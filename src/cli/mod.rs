//! Command-line interface for mediasend.
//!
//! Provides commands for sending files to a webhook, recording CDN URLs
//! in a repository archive, and inspecting the resolved configuration.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use crate::adapters::ReqwestTransport;
use crate::config;
use crate::core::delivery::{
    ArchiveRequest, Attachment, DeliveryClient, DeliveryStatus, WebhookMessage,
};
use crate::core::endpoint;
use crate::core::fswrite::{self, OverwritePolicy, WriteIntent};
use crate::core::scrub::redact_webhook_url;

/// mediasend - secure delivery of generated media
#[derive(Parser, Debug)]
#[command(name = "mediasend")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send one or more files to the chat webhook
    Send {
        /// Files to send
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Message text to accompany the files
        #[arg(short, long)]
        message: Option<String>,

        /// Webhook URL (falls back to MEDIASEND_WEBHOOK_URL)
        #[arg(long, env = "MEDIASEND_WEBHOOK_URL", hide_env_values = true)]
        webhook_url: String,

        /// Save a local copy of each file into the output directory
        #[arg(long)]
        save: bool,

        /// Overwrite existing local copies instead of disambiguating
        #[arg(long)]
        overwrite: bool,

        /// Also record echoed CDN URLs in this repository (owner/repo)
        #[arg(long)]
        archive_repo: Option<String>,

        /// File path within the archive repository
        #[arg(long, default_value = "cdn_urls.md")]
        archive_path: String,

        /// Content API token (falls back to MEDIASEND_GITHUB_TOKEN)
        #[arg(long, env = "MEDIASEND_GITHUB_TOKEN", hide_env_values = true)]
        github_token: Option<String>,
    },

    /// Record `name=url` pairs in the repository archive file
    Archive {
        /// Repository in owner/repo form
        repo: String,

        /// File path within the repository
        #[arg(short, long, default_value = "cdn_urls.md")]
        path: String,

        /// Entries as name=url pairs
        #[arg(required = true)]
        entries: Vec<String>,

        /// Content API token (falls back to MEDIASEND_GITHUB_TOKEN)
        #[arg(long, env = "MEDIASEND_GITHUB_TOKEN", hide_env_values = true)]
        github_token: String,

        /// Commit message
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Send {
                files,
                message,
                webhook_url,
                save,
                overwrite,
                archive_repo,
                archive_path,
                github_token,
            } => {
                send(
                    files,
                    message,
                    webhook_url,
                    save,
                    overwrite,
                    archive_repo,
                    archive_path,
                    github_token,
                )
                .await
            }
            Commands::Archive {
                repo,
                path,
                entries,
                github_token,
                message,
            } => archive(repo, path, entries, github_token, message).await,
            Commands::Config => show_config(),
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn send(
    files: Vec<PathBuf>,
    message: Option<String>,
    webhook_url: String,
    save: bool,
    overwrite: bool,
    archive_repo: Option<String>,
    archive_path: String,
    github_token: Option<String>,
) -> Result<()> {
    // Validate up front so a bad URL fails before any file is read.
    endpoint::validate(&webhook_url).map_err(|e| anyhow::anyhow!("{e}"))?;

    let mut attachments = Vec::new();
    for file in &files {
        let bytes = std::fs::read(file)
            .with_context(|| format!("Failed to read {}", file.display()))?;
        if bytes.is_empty() {
            bail!("{} is empty", file.display());
        }
        let filename = file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .with_context(|| format!("{} has no file name", file.display()))?;
        attachments.push(Attachment::new(filename, bytes));
    }

    if save {
        let output = config::output_dir()?;
        std::fs::create_dir_all(&output)
            .with_context(|| format!("Failed to create {}", output.display()))?;
        let policy = if overwrite {
            OverwritePolicy::Overwrite
        } else {
            OverwritePolicy::Disambiguate
        };
        for attachment in &attachments {
            let intent = WriteIntent::new(output.join(&attachment.filename), &output, policy);
            let written =
                fswrite::write(&intent, &attachment.bytes).map_err(|e| anyhow::anyhow!("{e}"))?;
            tracing::info!(path = %written.display(), "saved local copy");
        }
    }

    let payload = WebhookMessage {
        content: message,
        embeds: Vec::new(),
        attachments,
    };

    let archive_request = match (archive_repo, github_token) {
        (Some(repo), Some(token)) => Some(ArchiveRequest {
            owner_repo: repo,
            file_path: archive_path,
            token,
            commit_message: None,
        }),
        (Some(_), None) => bail!("--archive-repo requires a content API token"),
        _ => None,
    };

    let client = DeliveryClient::new(ReqwestTransport::new());
    let retry = config::config()?.retry.clone();
    let result = client
        .deliver_and_archive(&webhook_url, &payload, archive_request.as_ref(), &retry)
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    tracing::info!(
        destination = %redact_webhook_url(&webhook_url),
        attempts = result.attempts,
        remote_ids = result.remote_ids.len(),
        "delivery finished"
    );

    match result.status {
        DeliveryStatus::Delivered => {
            println!("Delivered ({} attempts)", result.attempts);
            Ok(())
        }
        DeliveryStatus::PartiallyDelivered => {
            println!("Partially delivered ({} attempts)", result.attempts);
            Ok(())
        }
        DeliveryStatus::Failed => bail!("delivery failed after {} attempts", result.attempts),
    }
}

async fn archive(
    repo: String,
    path: String,
    entries: Vec<String>,
    github_token: String,
    message: Option<String>,
) -> Result<()> {
    let mut cdn_urls = Vec::new();
    for entry in &entries {
        let Some((name, url)) = entry.split_once('=') else {
            bail!("invalid entry {entry:?}; expected name=url");
        };
        cdn_urls.push((name.to_string(), url.to_string()));
    }

    let request = ArchiveRequest {
        owner_repo: repo,
        file_path: path,
        token: github_token,
        commit_message: message,
    };

    let client = DeliveryClient::new(ReqwestTransport::new());
    let retry = config::config()?.retry.clone();
    let result = client
        .update_archive(&request, &cdn_urls, &retry)
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    match result.status {
        DeliveryStatus::Delivered => {
            println!(
                "Archived {} URLs ({} attempts)",
                cdn_urls.len(),
                result.attempts
            );
            Ok(())
        }
        _ => bail!("archive update failed after {} attempts", result.attempts),
    }
}

fn show_config() -> Result<()> {
    let config = config::config()?;
    println!("home:    {}", config.home.display());
    println!("output:  {}", config.output.display());
    match &config.config_file {
        Some(path) => println!("config:  {}", path.display()),
        None => println!("config:  (none found, using defaults)"),
    }
    println!(
        "retry:   {} attempts, {}ms-{}ms backoff",
        config.retry.max_attempts, config.retry.initial_delay_ms, config.retry.max_delay_ms
    );
    Ok(())
}
