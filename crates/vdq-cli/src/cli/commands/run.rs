//! `vdq run` – run the scheduler loop until the queue drains.

use anyhow::{bail, Result};
use std::sync::Arc;
use vdq_core::commands::default_control_socket_path;
use vdq_core::config::VdqConfig;
use vdq_core::engine::curl::CurlEngine;
use vdq_core::resume_store::ResumeStore;
use vdq_core::scheduler::{QueueCounters, RunOutcome, Scheduler};

use crate::cli::control_socket;

pub async fn run_scheduler(
    store: ResumeStore,
    cfg: &VdqConfig,
    replay: u8,
    jobs: Option<usize>,
) -> Result<()> {
    if replay > 1 {
        bail!("--replay takes 0 or 1");
    }

    let engine = Arc::new(CurlEngine::new());
    let (mut scheduler, handle) = Scheduler::new(store, engine, cfg);
    if let Some(jobs) = jobs {
        scheduler.set_policy(Box::new(move || jobs));
    }

    if replay == 1 {
        let report = scheduler.replay().await?;
        if report.active + report.queued > 0 {
            println!(
                "Recovered {} active and {} queued download(s) from previous run.",
                report.active, report.queued
            );
        }
    }

    let socket_path = default_control_socket_path().ok();
    if let Some(path) = &socket_path {
        if control_socket::spawn_control_listener(handle.commands().clone(), path).is_ok() {
            tracing::debug!(path = %path.display(), "control socket listening");
        }
    }

    // Print counter changes as the loop publishes them.
    let mut counters = handle.counters();
    let printer = tokio::spawn(async move {
        let mut last = QueueCounters::default();
        while counters.changed().await.is_ok() {
            let now = *counters.borrow();
            if now != last {
                println!("  downloading {}, queued {}", now.active, now.queued);
                last = now;
            }
        }
    });

    // Ctrl-C checkpoints everything and asks for a relaunch.
    let shutdown_handle = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown_handle.shutdown();
        }
    });

    let outcome = scheduler.run().await?;
    printer.abort();
    if let Some(path) = &socket_path {
        let _ = std::fs::remove_file(path);
    }

    match outcome {
        RunOutcome::Idle => println!("Queue drained."),
        RunOutcome::RestartRequested => {
            println!("Interrupted with downloads in flight; run `vdq run --replay 1` to resume.");
        }
    }
    Ok(())
}
