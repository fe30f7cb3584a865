//! Unix socket server for brightsync IPC.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::io::{BufWriter, ErrorKind, Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use crate::common::utils::runtime_dir;
use crate::io::signals::SignalMessage;
use crate::state::ipc::events::{IpcEvent, IpcRequest};

const SOCKET_NAME: &str = "brightsync-events.sock";
const MAX_REQUEST_LEN: usize = 4096;

/// Unix socket server handling client connections.
pub struct IpcSocketServer {
    socket_path: PathBuf,
    listener: UnixListener,
    clients: HashMap<u32, ClientConnection>,
    next_client_id: u32,
    current_status: Option<IpcEvent>,
}

struct ClientConnection {
    raw_stream: UnixStream,
    writer: BufWriter<UnixStream>,
    pending: Vec<u8>,
    connected_at: Instant,
}

impl IpcSocketServer {
    pub fn new(socket_path: PathBuf) -> Result<Self> {
        if socket_path.exists() {
            std::fs::remove_file(&socket_path)
                .with_context(|| format!("Failed to remove existing socket: {socket_path:?}"))?;
        }

        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create socket directory: {parent:?}"))?;
        }

        let listener = UnixListener::bind(&socket_path)
            .with_context(|| format!("Failed to bind Unix socket: {socket_path:?}"))?;
        listener
            .set_nonblocking(true)
            .context("Failed to set socket to non-blocking mode")?;

        Ok(Self {
            socket_path,
            listener,
            clients: HashMap::new(),
            next_client_id: 1,
            current_status: None,
        })
    }

    /// Serve until `running` is cleared.
    ///
    /// Events from `event_receiver` are broadcast to every client; valid
    /// client requests are forwarded to `request_sender`.
    pub fn run(
        mut self,
        event_receiver: mpsc::Receiver<IpcEvent>,
        request_sender: mpsc::Sender<SignalMessage>,
        running: Arc<AtomicBool>,
        debug_enabled: bool,
    ) -> Result<()> {
        if debug_enabled {
            log_debug!("IPC server starting on socket: {:?}", self.socket_path);
        }

        while running.load(Ordering::SeqCst) {
            while let Ok(event) = event_receiver.try_recv() {
                self.update_state(event, debug_enabled)?;
            }

            self.accept(debug_enabled)?;
            self.poll_clients(&request_sender, debug_enabled);

            thread::sleep(Duration::from_millis(10));
        }

        if debug_enabled {
            log_debug!("IPC server shutting down");
        }

        self.cleanup()
    }

    fn update_state(&mut self, event: IpcEvent, debug_enabled: bool) -> Result<()> {
        if matches!(event, IpcEvent::StatusChanged { .. }) {
            self.current_status = Some(event.clone());
        }
        self.broadcast_event(&event, debug_enabled)
    }

    fn broadcast_event(&mut self, event: &IpcEvent, debug_enabled: bool) -> Result<()> {
        let json_line =
            serde_json::to_string(event).context("Failed to serialize IpcEvent to JSON")?;
        let message = format!("{json_line}\n");

        let failed: Vec<u32> = self
            .clients
            .iter_mut()
            .filter_map(|(client_id, client)| {
                let sent = client.writer.write_all(message.as_bytes()).is_ok()
                    && client.writer.flush().is_ok();
                (!sent).then_some(*client_id)
            })
            .collect();

        for client_id in failed {
            self.drop_client(client_id, debug_enabled);
        }
        Ok(())
    }

    fn accept(&mut self, debug_enabled: bool) -> Result<()> {
        loop {
            match self.listener.accept() {
                Ok((stream, _addr)) => {
                    let client_id = self.next_client_id;
                    self.next_client_id += 1;

                    stream
                        .set_nonblocking(true)
                        .context("Failed to set client stream to non-blocking mode")?;
                    let writer_stream = stream
                        .try_clone()
                        .context("Failed to clone stream for writer")?;

                    let mut client = ClientConnection {
                        raw_stream: stream,
                        writer: BufWriter::new(writer_stream),
                        pending: Vec::new(),
                        connected_at: Instant::now(),
                    };

                    if let Some(event) = &self.current_status {
                        let json_line = serde_json::to_string(event)
                            .context("Failed to serialize current status for new client")?;
                        let sent = client
                            .writer
                            .write_all(format!("{json_line}\n").as_bytes())
                            .and_then(|_| client.writer.flush());
                        if let Err(e) = sent {
                            if debug_enabled {
                                log_debug!("Failed to send current status to client {client_id}: {e}");
                            }
                            continue;
                        }
                    }

                    self.clients.insert(client_id, client);
                    if debug_enabled {
                        log_debug!("IPC connections: {}", self.clients.len());
                    }
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    if debug_enabled {
                        log_debug!("Error accepting client connection: {e}");
                    }
                    break;
                }
            }
        }
        Ok(())
    }

    /// Read pending requests and detect disconnected clients.
    fn poll_clients(&mut self, request_sender: &mpsc::Sender<SignalMessage>, debug_enabled: bool) {
        let mut disconnected = Vec::new();
        let mut requests = Vec::new();

        for (client_id, client) in &mut self.clients {
            let mut buffer = [0u8; 512];
            loop {
                match client.raw_stream.read(&mut buffer) {
                    Ok(0) => {
                        disconnected.push(*client_id);
                        break;
                    }
                    Ok(n) => client.pending.extend_from_slice(&buffer[..n]),
                    Err(ref e) if e.kind() == ErrorKind::WouldBlock => break,
                    Err(_) => {
                        disconnected.push(*client_id);
                        break;
                    }
                }
            }

            while let Some(newline) = client.pending.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = client.pending.drain(..=newline).collect();
                requests.push(line);
            }
            if client.pending.len() > MAX_REQUEST_LEN {
                client.pending.clear();
                disconnected.push(*client_id);
            }
        }

        for line in requests {
            let text = String::from_utf8_lossy(&line);
            let text = text.trim();
            if text.is_empty() {
                continue;
            }
            let message = serde_json::from_str::<IpcRequest>(text)
                .map_err(anyhow::Error::from)
                .and_then(IpcRequest::into_signal);
            match message {
                Ok(message) => {
                    if debug_enabled {
                        log_debug!("IPC request: {message:?}");
                    }
                    let _ = request_sender.send(message);
                }
                Err(e) => {
                    log_pipe!();
                    log_warning!("Ignoring invalid IPC request: {e}");
                }
            }
        }

        for client_id in disconnected {
            self.drop_client(client_id, debug_enabled);
        }
    }

    fn drop_client(&mut self, client_id: u32, debug_enabled: bool) {
        if let Some(client) = self.clients.remove(&client_id)
            && debug_enabled
        {
            let duration = client.connected_at.elapsed();
            if duration.as_secs() < 2 {
                log_debug!(
                    "IPC one-shot client served ({}ms) - connections: {}",
                    duration.as_millis(),
                    self.clients.len()
                );
            } else {
                log_debug!(
                    "IPC client disconnected after {}s - connections: {}",
                    duration.as_secs(),
                    self.clients.len()
                );
            }
        }
    }

    fn cleanup(&self) -> Result<()> {
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)
                .with_context(|| format!("Failed to remove socket file: {:?}", self.socket_path))?;
        }
        Ok(())
    }
}

/// Path of the IPC socket: `$XDG_RUNTIME_DIR/brightsync-events.sock`.
pub fn socket_path() -> PathBuf {
    runtime_dir().join(SOCKET_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_path() {
        let path = socket_path();
        assert!(path.to_string_lossy().ends_with("brightsync-events.sock"));
    }

    #[test]
    fn test_server_creation_and_cleanup() {
        let temp_dir = tempfile::tempdir().unwrap();
        let socket_path = temp_dir.path().join("test-brightsync.sock");

        let server = IpcSocketServer::new(socket_path.clone()).unwrap();
        assert!(socket_path.exists());

        server.cleanup().unwrap();
        assert!(!socket_path.exists());
    }
}
