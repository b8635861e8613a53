//! CLI for the VDQ download queue.

mod commands;
mod control_socket;

use anyhow::Result;
use clap::{Parser, Subcommand};
use vdq_core::config;
use vdq_core::resume_store::{db::KvDb, ResumeStore};

use commands::{
    run_add, run_pause, run_remove, run_resume, run_scheduler, run_status, run_stop,
};

/// Top-level CLI for the VDQ download queue.
#[derive(Debug, Parser)]
#[command(name = "vdq")]
#[command(about = "VDQ: resumable video download queue", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Queue a new download.
    Add {
        /// Direct HTTP/HTTPS URL to download.
        url: String,

        /// Job identifier. Derived from the URL when omitted.
        #[arg(long)]
        id: Option<i64>,

        /// Destination file path. Derived from the URL filename when omitted.
        #[arg(long)]
        dest: Option<String>,

        /// Display name for the episode.
        #[arg(long)]
        name: Option<String>,

        /// Season number, for display.
        #[arg(long)]
        season: Option<u32>,

        /// Episode number, for display.
        #[arg(long)]
        episode: Option<u32>,
    },

    /// Run the scheduler loop until the queue drains.
    Run {
        /// Restart protocol flag: 1 replays persisted active/queued
        /// downloads before scheduling, 0 starts from the queue only.
        #[arg(long, default_value = "1", value_name = "0|1")]
        replay: u8,

        /// Run up to N downloads concurrently, overriding the config value.
        #[arg(long, value_name = "N")]
        jobs: Option<usize>,
    },

    /// Show persisted active downloads and the queue.
    Status,

    /// Pause a running download by its ID.
    Pause {
        /// Job identifier.
        id: i64,
    },

    /// Resume a paused download by its ID.
    Resume {
        /// Job identifier.
        id: i64,
    },

    /// Stop a running download by its ID and delete its resume records.
    Stop {
        /// Job identifier.
        id: i64,
    },

    /// Remove a job's resume records (queued or leftover) by ID.
    Remove {
        /// Job identifier.
        id: i64,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);
        let store = ResumeStore::new(KvDb::open_default().await?);

        match cli.command {
            CliCommand::Add {
                url,
                id,
                dest,
                name,
                season,
                episode,
            } => {
                run_add(
                    &store,
                    &cfg,
                    commands::AddRequest {
                        url,
                        id,
                        dest,
                        name,
                        season,
                        episode,
                    },
                )
                .await?
            }
            CliCommand::Run { replay, jobs } => run_scheduler(store, &cfg, replay, jobs).await?,
            CliCommand::Status => run_status(&store).await?,
            CliCommand::Pause { id } => run_pause(id).await?,
            CliCommand::Resume { id } => run_resume(id).await?,
            CliCommand::Stop { id } => run_stop(&store, id).await?,
            CliCommand::Remove { id } => run_remove(&store, id).await?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
