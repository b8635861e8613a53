//! `vdq pause <id>` – pause a running download. Signals the active
//! `vdq run` process; the paused job keeps its resume record.

use anyhow::Result;
use vdq_core::commands::{default_control_socket_path, DownloadAction};

use crate::cli::control_socket;

pub async fn run_pause(id: i64) -> Result<()> {
    if let Ok(path) = default_control_socket_path() {
        control_socket::send_command(&path, DownloadAction::Pause, id).await?;
    }
    println!("Paused job {id}");
    Ok(())
}
