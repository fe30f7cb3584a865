//! IPC client used by the one-shot commands.

use anyhow::{Context, Result, bail};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::Duration;

use super::events::{IpcEvent, IpcRequest};
use super::server::socket_path;

/// Connection to a running brightsync daemon.
pub struct IpcClient {
    stream: UnixStream,
    reader: BufReader<UnixStream>,
    /// Partial line left over from a read that timed out.
    pending: String,
}

impl IpcClient {
    /// Connect to the daemon's socket.
    pub fn connect() -> Result<Self> {
        Self::connect_to(&socket_path())
    }

    pub fn connect_to(path: &Path) -> Result<Self> {
        let stream = UnixStream::connect(path).with_context(|| {
            format!("Failed to connect to brightsync IPC socket at {path:?}. Is brightsync running?")
        })?;

        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .context("Failed to set read timeout on IPC socket")?;

        let reader_stream = stream
            .try_clone()
            .context("Failed to clone stream for reader")?;

        Ok(Self {
            stream,
            reader: BufReader::new(reader_stream),
            pending: String::new(),
        })
    }

    /// Read the status the daemon sends on connect.
    pub fn current(&mut self) -> Result<IpcEvent> {
        self.read_event()
            .context("Failed to read current status from IPC socket")
    }

    /// Block until the next broadcast event.
    pub fn receive(&mut self) -> Result<IpcEvent> {
        self.read_event()
    }

    pub fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.stream
            .set_read_timeout(Some(timeout))
            .context("Failed to set read timeout on IPC socket")
    }

    /// Next event, or `None` when the read timeout expired first.
    pub fn try_receive(&mut self) -> Result<Option<IpcEvent>> {
        match self.read_line() {
            Ok(line) => Self::parse_line(&line).map(Some),
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => Ok(None),
            Err(e) => Err(e).context("Failed to read from IPC socket"),
        }
    }

    pub fn send(&mut self, request: &IpcRequest) -> Result<()> {
        let json = serde_json::to_string(request).context("Failed to serialize IPC request")?;
        self.stream
            .write_all(format!("{json}\n").as_bytes())
            .and_then(|_| self.stream.flush())
            .context("Failed to send request to brightsync")
    }

    /// Quick reachability check without keeping a connection.
    pub fn is_running() -> bool {
        let path = socket_path();
        path.exists() && UnixStream::connect(&path).is_ok()
    }

    fn read_event(&mut self) -> Result<IpcEvent> {
        let line = self
            .read_line()
            .context("Failed to read from IPC socket")?;
        Self::parse_line(&line)
    }

    /// Read one full line, keeping partial data across timeouts.
    fn read_line(&mut self) -> std::io::Result<String> {
        self.reader.read_line(&mut self.pending)?;
        Ok(std::mem::take(&mut self.pending))
    }

    fn parse_line(line: &str) -> Result<IpcEvent> {
        if line.trim().is_empty() {
            bail!("Connection closed by brightsync");
        }
        serde_json::from_str(line.trim())
            .with_context(|| format!("Failed to parse IPC event: {}", line.trim()))
    }
}

/// Send one request to the running daemon.
pub fn send_request(request: &IpcRequest) -> Result<()> {
    IpcClient::connect()?.send(request)
}
