//! Non-blocking bridge to an interactive child process

use crate::worker::{OutputEvent, reader_task, writer_task};
use advbot_core::{AdvBotError, BridgeConfig, Result, SharedReporter, tracing_reporter};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Result of a single non-blocking read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Next line of output
    Line(String),
    /// Nothing queued right now; the child may still produce more
    Empty,
    /// The child's output has ended
    EndOfStream,
}

/// Lifecycle of a bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Created,
    Running,
    Terminated,
}

/// Owns a child process and turns its stdio into pollable queues
pub struct ProcessBridge {
    /// Program, arguments and polling parameters
    config: BridgeConfig,
    /// Receives reader worker events
    reporter: SharedReporter,
    state: BridgeState,
    /// The child, present once started
    child: Option<Child>,
    /// Exit status once observed
    exit_status: Option<ExitStatus>,
    /// Lines from the reader worker
    output_rx: Option<mpsc::UnboundedReceiver<OutputEvent>>,
    /// Commands for the writer worker
    input_tx: Option<mpsc::UnboundedSender<String>>,
    /// Set once the end-of-stream marker has been consumed
    end_of_stream: bool,
    /// Tells both workers to stop
    shutdown_tx: watch::Sender<bool>,
    reader_handle: Option<JoinHandle<()>>,
    writer_handle: Option<JoinHandle<()>>,
}

impl ProcessBridge {
    /// Create a bridge in the `Created` state
    pub fn new(config: BridgeConfig) -> Self {
        Self::with_reporter(config, tracing_reporter())
    }

    pub fn with_reporter(config: BridgeConfig, reporter: SharedReporter) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            config,
            reporter,
            state: BridgeState::Created,
            child: None,
            exit_status: None,
            output_rx: None,
            input_tx: None,
            end_of_stream: false,
            shutdown_tx,
            reader_handle: None,
            writer_handle: None,
        }
    }

    /// Create and start a bridge in one step
    pub fn spawn(config: BridgeConfig) -> Result<Self> {
        let mut bridge = Self::new(config);
        bridge.start()?;
        Ok(bridge)
    }

    pub fn state(&self) -> BridgeState {
        self.state
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Spawn the child and its reader and writer workers
    pub fn start(&mut self) -> Result<()> {
        if self.state != BridgeState::Created {
            return Err(AdvBotError::InvalidState(format!(
                "bridge cannot start from {:?}",
                self.state
            )));
        }

        info!(
            "Starting {} {:?}",
            self.config.program.display(),
            self.config.args
        );

        let mut child = Command::new(&self.config.program)
            .args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                AdvBotError::Spawn(format!(
                    "Failed to spawn {}: {}",
                    self.config.program.display(),
                    e
                ))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AdvBotError::IpcError("No stdout".into()))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| AdvBotError::IpcError("No stdin".into()))?;

        let (output_tx, output_rx) = mpsc::unbounded_channel();
        let (input_tx, input_rx) = mpsc::unbounded_channel();

        self.reader_handle = Some(tokio::spawn(reader_task(
            stdout,
            output_tx,
            self.shutdown_tx.subscribe(),
            self.reporter.clone(),
        )));
        self.writer_handle = Some(tokio::spawn(writer_task(
            stdin,
            input_rx,
            self.shutdown_tx.subscribe(),
        )));

        self.child = Some(child);
        self.output_rx = Some(output_rx);
        self.input_tx = Some(input_tx);
        self.state = BridgeState::Running;
        Ok(())
    }

    /// Take the next queued line without waiting.
    ///
    /// Once `EndOfStream` has been returned, every later call returns it
    /// again; use [`is_alive`](Self::is_alive) or
    /// [`exit_code`](Self::exit_code) to inspect the child.
    pub fn read_line(&mut self) -> ReadOutcome {
        if self.end_of_stream {
            return ReadOutcome::EndOfStream;
        }
        let Some(rx) = self.output_rx.as_mut() else {
            return ReadOutcome::Empty;
        };

        match rx.try_recv() {
            Ok(OutputEvent::Line(line)) => ReadOutcome::Line(line),
            Ok(OutputEvent::EndOfStream) => {
                self.end_of_stream = true;
                ReadOutcome::EndOfStream
            }
            Err(mpsc::error::TryRecvError::Empty) => ReadOutcome::Empty,
            Err(mpsc::error::TryRecvError::Disconnected) => {
                // reader went away without its marker
                self.end_of_stream = true;
                ReadOutcome::EndOfStream
            }
        }
    }

    /// Collect a block of output using the configured retry policy
    pub async fn read_block(&mut self) -> Vec<String> {
        let retries = self.config.read_retries;
        let interval = self.config.read_interval();
        self.read_block_with(retries, interval).await
    }

    /// Collect lines until `max_retries` consecutive polls find nothing.
    ///
    /// Every line received restores the full retry budget, so output that
    /// trickles in is drained completely. Stops at end of stream and returns
    /// what was gathered so the final lines of a game are never lost.
    pub async fn read_block_with(&mut self, max_retries: u32, interval: Duration) -> Vec<String> {
        let mut lines = Vec::new();
        let mut retries = max_retries;

        while retries > 0 {
            match self.read_line() {
                ReadOutcome::Line(line) => {
                    lines.push(line);
                    retries = max_retries;
                }
                ReadOutcome::Empty => {
                    retries -= 1;
                    sleep(interval).await;
                }
                ReadOutcome::EndOfStream => break,
            }
        }

        debug!("Read block of {} lines", lines.len());
        lines
    }

    /// Queue `text` for the child, followed by a newline.
    ///
    /// Returns immediately; delivery is not acknowledged.
    pub fn write_command(&self, text: &str) {
        let Some(tx) = self.input_tx.as_ref() else {
            warn!("Command dropped, bridge not running: {}", text);
            return;
        };
        if tx.send(format!("{}\n", text)).is_err() {
            warn!("Command dropped, writer has stopped: {}", text);
        }
    }

    /// Whether the child is still running
    pub fn is_alive(&mut self) -> bool {
        self.child.is_some() && self.poll_exit().is_none()
    }

    /// Exit code of the child, `None` while it runs.
    ///
    /// A child killed by signal `n` reports `-n` on Unix.
    pub fn exit_code(&mut self) -> Option<i32> {
        self.poll_exit().map(exit_code_of)
    }

    fn poll_exit(&mut self) -> Option<ExitStatus> {
        if self.exit_status.is_none() {
            let child = self.child.as_mut()?;
            match child.try_wait() {
                Ok(status) => self.exit_status = status,
                Err(e) => warn!("Failed to poll child status: {}", e),
            }
        }
        self.exit_status
    }

    /// Kill the child and stop both workers.
    ///
    /// Workers get `join_timeout` each to finish before they are aborted.
    pub async fn teardown(&mut self) -> Result<()> {
        if self.state == BridgeState::Terminated {
            return Ok(());
        }
        self.state = BridgeState::Terminated;

        if let Some(child) = self.child.as_mut() {
            if self.exit_status.is_none() {
                if let Err(e) = child.start_kill() {
                    debug!("Kill failed, child likely already exited: {}", e);
                }
            }
            match child.wait().await {
                Ok(status) => self.exit_status = Some(status),
                Err(e) => warn!("Failed to reap child: {}", e),
            }
        }

        let _ = self.shutdown_tx.send(true);
        self.input_tx = None;

        let timeout = self.config.join_timeout();
        for handle in [self.reader_handle.take(), self.writer_handle.take()]
            .into_iter()
            .flatten()
        {
            join_with_timeout(handle, timeout).await;
        }

        info!("Bridge torn down (exit code {:?})", self.exit_code());
        Ok(())
    }
}

impl Drop for ProcessBridge {
    fn drop(&mut self) {
        // Kill the child and cancel workers if teardown was skipped
        if let Some(child) = self.child.as_mut() {
            let _ = child.start_kill();
        }
        let _ = self.shutdown_tx.send(true);
        for handle in [self.reader_handle.take(), self.writer_handle.take()]
            .into_iter()
            .flatten()
        {
            handle.abort();
        }
    }
}

async fn join_with_timeout(mut handle: JoinHandle<()>, timeout: Duration) {
    match tokio::time::timeout(timeout, &mut handle).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Bridge worker failed: {}", e),
        Err(_) => {
            warn!("Bridge worker did not stop within {:?}, aborting", timeout);
            handle.abort();
        }
    }
}

#[cfg(unix)]
fn exit_code_of(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|sig| -sig))
        .unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_code_of(status: ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}
