//! `vdq stop <id>` – stop a running download and delete its resume
//! records. The running scheduler reaps the job once the engine settles;
//! deleting the records here also covers the no-scheduler case.

use anyhow::Result;
use vdq_core::commands::{default_control_socket_path, DownloadAction};
use vdq_core::resume_store::ResumeStore;

use crate::cli::control_socket;

pub async fn run_stop(store: &ResumeStore, id: i64) -> Result<()> {
    if let Ok(path) = default_control_socket_path() {
        control_socket::send_command(&path, DownloadAction::Stop, id).await?;
    }
    store.remove_all(id).await?;
    println!("Stopped job {id}");
    Ok(())
}
