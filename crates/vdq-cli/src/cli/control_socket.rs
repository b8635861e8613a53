//! Control socket: server (during `vdq run`) and client (for `vdq pause`
//! and friends). Protocol: one line per command: "pause <id>",
//! "resume <id>" or "stop <id>".

use anyhow::Result;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::UnixListener;
use vdq_core::commands::{CommandBus, DownloadAction};

/// Spawns a task that listens on `path` and forwards each well-formed
/// "<action> <id>" line onto the command bus. Ignores malformed lines.
pub fn spawn_control_listener(
    bus: CommandBus,
    path: impl AsRef<Path>,
) -> Result<tokio::task::JoinHandle<()>> {
    let path = path.as_ref().to_path_buf();
    let handle = tokio::spawn(async move {
        let _ = std::fs::remove_file(&path);
        let listener = match UnixListener::bind(&path) {
            Ok(l) => l,
            Err(e) => {
                tracing::warn!(path = %path.display(), "control socket bind: {}", e);
                return;
            }
        };
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let bus = bus.clone();
                    tokio::spawn(async move {
                        let mut reader = BufReader::new(stream).lines();
                        while let Ok(Some(line)) = reader.next_line().await {
                            let mut parts = line.trim().split_whitespace();
                            let action = parts.next().and_then(DownloadAction::parse);
                            let id = parts.next().and_then(|s| s.parse::<i64>().ok());
                            if let (Some(action), Some(id)) = (action, id) {
                                bus.send(id, action);
                            }
                        }
                    });
                }
                Err(e) => tracing::debug!("control socket accept: {}", e),
            }
        }
    });
    Ok(handle)
}

/// Sends "<action> <id>\n" to the control socket. No-op if the path does
/// not exist, i.e. no `vdq run` is active.
pub async fn send_command(socket_path: &Path, action: DownloadAction, id: i64) -> Result<()> {
    if !socket_path.exists() {
        return Ok(());
    }
    let mut stream = tokio::net::UnixStream::connect(socket_path).await?;
    let msg = format!("{} {}\n", action.as_str(), id);
    tokio::io::AsyncWriteExt::write_all(&mut stream, msg.as_bytes()).await?;
    Ok(())
}
