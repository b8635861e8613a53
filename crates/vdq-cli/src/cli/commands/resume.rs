//! `vdq resume <id>` – resume a paused download in the active `vdq run`
//! process.

use anyhow::Result;
use vdq_core::commands::{default_control_socket_path, DownloadAction};

use crate::cli::control_socket;

pub async fn run_resume(id: i64) -> Result<()> {
    if let Ok(path) = default_control_socket_path() {
        control_socket::send_command(&path, DownloadAction::Resume, id).await?;
    }
    println!("Resumed job {id}");
    Ok(())
}
