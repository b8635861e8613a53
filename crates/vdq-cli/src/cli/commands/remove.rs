//! `vdq remove <id>` – delete a job's resume records, queued or leftover.

use anyhow::Result;
use vdq_core::resume_store::ResumeStore;

pub async fn run_remove(store: &ResumeStore, id: i64) -> Result<()> {
    store.remove_all(id).await?;
    println!("Removed job {id}");
    Ok(())
}
