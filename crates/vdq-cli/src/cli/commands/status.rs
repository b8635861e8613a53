//! `vdq status` – show persisted active downloads and the queue.

use anyhow::Result;
use vdq_core::resume_store::{JobDescriptor, ResumeStore};

pub async fn run_status(store: &ResumeStore) -> Result<()> {
    let active = store.load_all_active().await?;
    let queued = store.load_queue().await?;

    if active.records.is_empty() && queued.records.is_empty() {
        println!("No downloads.");
        return Ok(());
    }

    println!(
        "{:<20} {:<8} {:<10} {:<12} {}",
        "ID", "STATE", "DONE", "TOTAL", "NAME"
    );
    for d in &active.records {
        print_row(d, d.status.as_str());
    }
    let mut queue = queued.records;
    queue.sort_by_key(|r| r.index);
    for r in &queue {
        print_row(&r.descriptor, "queued");
    }

    let skipped = active.skipped + queued.skipped;
    if skipped > 0 {
        println!("({skipped} unreadable record(s) skipped)");
    }
    Ok(())
}

fn print_row(d: &JobDescriptor, state: &str) {
    let total = d
        .total_bytes
        .map(|t| t.to_string())
        .unwrap_or_else(|| "-".to_string());
    println!(
        "{:<20} {:<8} {:<10} {:<12} {}",
        d.id,
        state,
        d.bytes_transferred,
        total,
        d.episode.label()
    );
}
