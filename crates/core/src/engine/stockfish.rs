//! Stockfish process plumbing
//!
//! Spawns the engine and turns its stdin/stdout into a pair of channels, so
//! the bridge never touches process I/O directly.

use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::EngineError;

/// Something the engine side pushed to the bridge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    Line(String),
    Crashed(String),
}

/// Bridge side of the channel pair
#[derive(Debug)]
pub struct EngineChannels {
    pub commands: mpsc::UnboundedSender<String>,
    pub events: mpsc::UnboundedReceiver<WorkerEvent>,
}

/// Engine side of the channel pair
#[derive(Debug)]
pub struct EngineEndpoint {
    pub commands: mpsc::UnboundedReceiver<String>,
    pub events: mpsc::UnboundedSender<WorkerEvent>,
}

/// Connected channel ends with nothing attached to the engine side yet
pub fn channel_pair() -> (EngineChannels, EngineEndpoint) {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    (
        EngineChannels {
            commands: cmd_tx,
            events: event_rx,
        },
        EngineEndpoint {
            commands: cmd_rx,
            events: event_tx,
        },
    )
}

/// A running engine process
pub struct StockfishProcess {
    /// The child process
    process: Child,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl StockfishProcess {
    /// Spawns `path` (or "stockfish" if in PATH) and wires it to a fresh channel pair.
    pub fn spawn(path: &str) -> Result<(Self, EngineChannels), EngineError> {
        let mut process = Command::new(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EngineError::Spawn(format!("{path}: {e}")))?;

        let mut stdin = process
            .stdin
            .take()
            .ok_or_else(|| EngineError::Spawn("Failed to open stdin".into()))?;
        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| EngineError::Spawn("Failed to open stdout".into()))?;

        let (channels, endpoint) = channel_pair();
        let EngineEndpoint {
            commands: mut outbound,
            events,
        } = endpoint;

        let crash_tx = events.clone();
        let writer = tokio::spawn(async move {
            while let Some(cmd) = outbound.recv().await {
                debug!(cmd = %cmd, "SF <");
                let written = async {
                    stdin.write_all(format!("{cmd}\n").as_bytes()).await?;
                    stdin.flush().await
                }
                .await;
                if let Err(e) = written {
                    let _ = crash_tx.send(WorkerEvent::Crashed(format!("write failed: {e}")));
                    break;
                }
            }
        });

        let reader = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                let event = match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim().to_string();
                        debug!(line = %line, "SF >");
                        WorkerEvent::Line(line)
                    }
                    Ok(None) => WorkerEvent::Crashed("engine process exited".into()),
                    Err(e) => WorkerEvent::Crashed(format!("read failed: {e}")),
                };
                let fatal = matches!(event, WorkerEvent::Crashed(_));
                if events.send(event).is_err() || fatal {
                    break;
                }
            }
        });

        Ok((
            Self {
                process,
                reader,
                writer,
            },
            channels,
        ))
    }

    /// Kills the process and its I/O tasks
    pub async fn kill(&mut self) {
        self.writer.abort();
        self.reader.abort();
        if let Err(e) = self.process.kill().await {
            warn!(error = %e, "failed to kill engine process");
        }
    }
}
