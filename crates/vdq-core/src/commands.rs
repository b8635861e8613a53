//! Command channel: pause/resume/stop a specific job without a reference
//! to its instance.
//!
//! A single `(id, action)` channel is consumed only by the scheduler loop,
//! which dispatches to the matching instance. Fire-and-forget: no ack, no
//! backpressure; a command for an id with no active instance is dropped.

use std::path::PathBuf;
use tokio::sync::mpsc;

use crate::engine::JobId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadAction {
    Resume,
    Pause,
    Stop,
}

impl DownloadAction {
    pub fn as_str(self) -> &'static str {
        match self {
            DownloadAction::Resume => "resume",
            DownloadAction::Pause => "pause",
            DownloadAction::Stop => "stop",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "resume" => Some(DownloadAction::Resume),
            "pause" => Some(DownloadAction::Pause),
            "stop" => Some(DownloadAction::Stop),
            _ => None,
        }
    }
}

/// Sender half of the command channel. Cheap to clone and hand to anything
/// that wants to influence a running job by id.
#[derive(Clone)]
pub struct CommandBus {
    tx: mpsc::UnboundedSender<(JobId, DownloadAction)>,
}

impl CommandBus {
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<(JobId, DownloadAction)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Fire-and-forget. Sending after the scheduler is gone is a no-op.
    pub fn send(&self, id: JobId, action: DownloadAction) {
        if self.tx.send((id, action)).is_err() {
            tracing::debug!(id, action = action.as_str(), "command dropped, no scheduler");
        }
    }
}

/// Default path for the control socket (same XDG state dir as the store).
pub fn default_control_socket_path() -> std::io::Result<PathBuf> {
    let dir = xdg::BaseDirectories::with_prefix("vdq")?.get_state_home();
    Ok(dir.join("control.sock"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_string_roundtrip() {
        for action in [
            DownloadAction::Resume,
            DownloadAction::Pause,
            DownloadAction::Stop,
        ] {
            assert_eq!(DownloadAction::parse(action.as_str()), Some(action));
        }
        assert_eq!(DownloadAction::parse("retry"), None);
    }

    #[tokio::test]
    async fn bus_delivers_in_order() {
        let (bus, mut rx) = CommandBus::channel();
        bus.send(1, DownloadAction::Pause);
        bus.send(2, DownloadAction::Stop);
        assert_eq!(rx.recv().await, Some((1, DownloadAction::Pause)));
        assert_eq!(rx.recv().await, Some((2, DownloadAction::Stop)));
    }

    #[test]
    fn send_without_receiver_does_not_panic() {
        let (bus, rx) = CommandBus::channel();
        drop(rx);
        bus.send(1, DownloadAction::Resume);
    }
}
