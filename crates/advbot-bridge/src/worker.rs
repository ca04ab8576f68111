//! Background workers that pump the child's stdio
//!
//! The reader turns the child's stdout into a queue of lines terminated by a
//! single end-of-stream marker. The writer drains the command queue into the
//! child's stdin. Both stop when the shutdown signal fires.

use advbot_core::{Severity, SharedReporter};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

/// Item on the output queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    /// One line of child output, terminator removed
    Line(String),
    /// The child's stdout closed; nothing follows
    EndOfStream,
}

/// Read lines from `stdout` until it closes or shutdown is signalled.
///
/// Pushes `OutputEvent::EndOfStream` exactly once before returning.
pub async fn reader_task<R>(
    stdout: R,
    output_tx: mpsc::UnboundedSender<OutputEvent>,
    mut shutdown_rx: watch::Receiver<bool>,
    reporter: SharedReporter,
) where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();
    let mut stopped = false;

    loop {
        buf.clear();
        tokio::select! {
            read = reader.read_until(b'\n', &mut buf) => {
                match read {
                    Ok(0) => {
                        debug!("Child stdout closed");
                        break;
                    }
                    Ok(_) => {
                        let line = decode_line(&buf);
                        debug!("[Game→Rust] {}", line);
                        if output_tx.send(OutputEvent::Line(line)).is_err() {
                            // bridge dropped, nobody left to read
                            return;
                        }
                    }
                    Err(e) => {
                        warn!("Failed to read child stdout: {}", e);
                        break;
                    }
                }
            }

            _ = shutdown_rx.changed() => {
                debug!("Shutdown signalled, reader task exiting");
                stopped = true;
                break;
            }
        }
    }

    if stopped {
        reporter.report(Severity::Debug, "Game output reader stopped by teardown");
    } else {
        reporter.report(Severity::Info, "Game output reached end of stream");
    }
    let _ = output_tx.send(OutputEvent::EndOfStream);
}

/// Write queued commands to `stdin` in submission order.
///
/// Exits when the queue closes, the pipe breaks or shutdown is signalled.
pub async fn writer_task<W>(
    mut stdin: W,
    mut input_rx: mpsc::UnboundedReceiver<String>,
    mut shutdown_rx: watch::Receiver<bool>,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        tokio::select! {
            cmd = input_rx.recv() => {
                let Some(cmd) = cmd else {
                    debug!("Command queue closed, writer task exiting");
                    break;
                };
                debug!("[Rust→Game] {}", cmd.trim_end());
                if let Err(e) = write_command(&mut stdin, &cmd).await {
                    warn!("Failed to write to child stdin: {}", e);
                    break;
                }
            }

            _ = shutdown_rx.changed() => {
                debug!("Shutdown signalled, writer task exiting");
                break;
            }
        }
    }
}

async fn write_command<W: AsyncWrite + Unpin>(stdin: &mut W, cmd: &str) -> std::io::Result<()> {
    stdin.write_all(cmd.as_bytes()).await?;
    stdin.flush().await
}

fn decode_line(buf: &[u8]) -> String {
    let mut line = String::from_utf8_lossy(buf).into_owned();
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
    line
}
