//! IPC system for brightsync.
//!
//! A Unix socket carries newline-delimited JSON. The daemon broadcasts every
//! published status to connected clients (the status surface); clients may
//! send control requests that are forwarded into the main loop's event
//! channel like any other signal.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, mpsc};

use crate::core::status::Status;
use crate::io::signals::SignalMessage;
use crate::platform::DisplayId;

pub mod client;
pub mod events;
mod server;

pub use server::socket_path;

use events::IpcEvent;

/// Sends typed events from the engine to the IPC server thread.
///
/// Sending never blocks the engine; a stopped server just drops events.
#[derive(Clone)]
pub struct IpcNotifier {
    event_sender: mpsc::Sender<IpcEvent>,
}

impl IpcNotifier {
    /// Create the notifier and the receiver for the server thread.
    pub fn new() -> (Self, mpsc::Receiver<IpcEvent>) {
        let (event_sender, event_receiver) = mpsc::channel();
        (Self { event_sender }, event_receiver)
    }

    pub fn send_status(&self, status: &Status) {
        let _ = self.event_sender.send(IpcEvent::status_changed(status));
    }

    pub fn send_offsets(&self, entries: Vec<(DisplayId, f64)>) {
        let _ = self.event_sender.send(IpcEvent::offsets_changed(entries));
    }
}

/// Background thread serving the IPC socket.
pub struct IpcServer {
    thread_handle: Option<std::thread::JoinHandle<()>>,
}

impl IpcServer {
    /// Start serving on the default socket path.
    pub fn start(
        event_receiver: mpsc::Receiver<IpcEvent>,
        request_sender: mpsc::Sender<SignalMessage>,
        running: Arc<AtomicBool>,
        debug_enabled: bool,
    ) -> Result<Self> {
        Self::start_at(
            socket_path(),
            event_receiver,
            request_sender,
            running,
            debug_enabled,
        )
    }

    /// Start serving on `path`.
    ///
    /// The socket is bound before this returns, so clients may connect as
    /// soon as it does.
    pub fn start_at(
        path: PathBuf,
        event_receiver: mpsc::Receiver<IpcEvent>,
        request_sender: mpsc::Sender<SignalMessage>,
        running: Arc<AtomicBool>,
        debug_enabled: bool,
    ) -> Result<Self> {
        let socket_server =
            server::IpcSocketServer::new(path).context("Failed to create IPC socket server")?;

        let thread_handle = std::thread::Builder::new()
            .name("ipc-server".to_string())
            .spawn(move || {
                if let Err(e) =
                    socket_server.run(event_receiver, request_sender, running, debug_enabled)
                {
                    log_pipe!();
                    log_warning!("IPC server stopped: {e:#}");
                }
            })
            .context("Failed to spawn IPC server thread")?;

        Ok(Self {
            thread_handle: Some(thread_handle),
        })
    }

    /// Wait for the server thread after the running flag was cleared.
    pub fn shutdown(mut self) -> Result<()> {
        if let Some(handle) = self.thread_handle.take() {
            handle
                .join()
                .map_err(|_| anyhow::anyhow!("IPC server thread panicked"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::client::IpcClient;
    use super::events::IpcRequest;
    use super::*;
    use std::sync::atomic::Ordering;
    use std::time::{Duration, Instant};

    fn wait_for<T>(mut probe: impl FnMut() -> Option<T>) -> T {
        let deadline = Instant::now() + Duration::from_secs(15);
        loop {
            if let Some(value) = probe() {
                return value;
            }
            assert!(Instant::now() < deadline, "timed out waiting for IPC server");
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn test_new_client_receives_current_status_and_forwards_requests() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("brightsync-test.sock");
        let running = Arc::new(AtomicBool::new(true));
        let (notifier, event_receiver) = IpcNotifier::new();
        let (request_sender, request_receiver) = mpsc::channel();

        let server = IpcServer::start_at(
            path.clone(),
            event_receiver,
            request_sender,
            running.clone(),
            false,
        )
        .unwrap();

        notifier.send_status(&Status::Paused);

        // Reconnect until the server has consumed the event.
        let event = wait_for(|| IpcClient::connect_to(&path).ok()?.current().ok());
        match event {
            IpcEvent::StatusChanged { text, status, .. } => {
                assert_eq!(text, "Paused");
                assert_eq!(status, Status::Paused);
            }
            other => panic!("unexpected first event: {other:?}"),
        }

        let mut client = IpcClient::connect_to(&path).unwrap();
        client
            .send(&IpcRequest::SetOffset {
                id: DisplayId::new("DEL-A0C4-1"),
                offset: 0.1,
            })
            .unwrap();
        let forwarded = request_receiver
            .recv_timeout(Duration::from_secs(5))
            .unwrap();
        assert_eq!(
            forwarded,
            SignalMessage::SetOffset {
                id: DisplayId::new("DEL-A0C4-1"),
                offset: 0.1
            }
        );

        running.store(false, Ordering::SeqCst);
        server.shutdown().unwrap();
        assert!(!path.exists());
    }
}
