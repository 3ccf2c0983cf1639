//! Stdin/stdout JSON bridge for the host command channel.
//!
//! Reads newline-delimited JSON requests, runs each one on its own task so a
//! long install does not block status queries, and writes responses and
//! install progress events as newline-delimited JSON.
//!
//! Stdout is exclusively reserved for the JSON protocol; all diagnostic
//! output (tracing, logs) must be routed to stderr.

use serde::Serialize;
use serde_json::Value;
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinSet;

use super::dispatch::dispatch;
use super::protocol::{CommandName, Event, Request, Response};
use crate::commands::{self, CoreState};
use crate::core::error::CommandError;
use crate::install::InstallProgress;

type SharedWriter<W> = Arc<Mutex<W>>;

/// Run the bridge over the process's stdin and stdout
pub async fn run_stdio_bridge(state: Arc<CoreState>) -> io::Result<()> {
    serve(state, tokio::io::stdin(), tokio::io::stdout()).await
}

/// Run the bridge until `input` closes or a `shutdown` request arrives.
///
/// In-flight requests are answered before returning.
pub async fn serve<R, W>(state: Arc<CoreState>, input: R, output: W) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let writer: SharedWriter<W> = Arc::new(Mutex::new(output));

    let event_writer = Arc::clone(&writer);
    let mut progress_rx = commands::subscribe_install_progress(&state);
    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
    let event_handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                received = progress_rx.recv() => match received {
                    Ok(progress) => {
                        if forward_progress(&event_writer, &progress).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, "event forwarder lagged; some events were dropped");
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = &mut stop_rx => {
                    // Flush what was published before the last response
                    while let Ok(progress) = progress_rx.try_recv() {
                        if forward_progress(&event_writer, &progress).await.is_err() {
                            break;
                        }
                    }
                    break;
                }
            }
        }
    });

    let result = run_reader(&state, input, &writer).await;

    let _ = stop_tx.send(());
    let _ = event_handle.await;

    if let Err(ref e) = result {
        tracing::error!(error = %e, "host bridge stopped with an error");
    }
    result
}

async fn run_reader<R, W>(state: &Arc<CoreState>, input: R, writer: &SharedWriter<W>) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let mut reader = BufReader::new(input);
    let mut line = String::new();
    let mut in_flight = JoinSet::new();

    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            tracing::info!("stdin closed (EOF); shutting down host bridge");
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let request: Request = match serde_json::from_str(trimmed) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(error = %e, raw_line = %trimmed, "failed to parse request");
                let response = Response::error(
                    Value::Null,
                    CommandError::invalid_request(format!("failed to parse request: {}", e)),
                );
                write_message(writer, &response).await?;
                continue;
            }
        };

        let Some(command) = CommandName::parse(&request.command) else {
            let response = Response::error(
                request.id,
                CommandError::invalid_request(format!("unknown command '{}'", request.command)),
            );
            write_message(writer, &response).await?;
            continue;
        };

        if command == CommandName::Shutdown {
            while in_flight.join_next().await.is_some() {}
            write_message(writer, &Response::ok(request.id, Value::Null)).await?;
            tracing::info!("shutdown requested; closing host bridge");
            return Ok(());
        }

        tracing::debug!(?command, "dispatching request");
        let state = Arc::clone(state);
        let writer = Arc::clone(writer);
        in_flight.spawn(async move {
            let response = match dispatch(&state, command, request.args).await {
                Ok(result) => Response::ok(request.id, result),
                Err(error) => {
                    tracing::debug!(?command, %error, "command failed");
                    Response::error(request.id, error)
                }
            };
            write_message(&writer, &response).await
        });

        // Reap finished tasks without waiting
        while let Some(joined) = in_flight.try_join_next() {
            flatten(joined)?;
        }
    }

    while let Some(joined) = in_flight.join_next().await {
        flatten(joined)?;
    }
    Ok(())
}

async fn forward_progress<W>(writer: &SharedWriter<W>, progress: &InstallProgress) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let event = Event::install_progress(progress)?;
    write_message(writer, &event).await.map_err(|e| {
        tracing::warn!(error = %e, "failed to write event; stopping event forwarder");
        e
    })
}

fn flatten(joined: Result<io::Result<()>, tokio::task::JoinError>) -> io::Result<()> {
    joined.map_err(io::Error::other)?
}

/// Write one JSON line and flush
async fn write_message<W, T>(writer: &SharedWriter<W>, message: &T) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut json = serde_json::to_vec(message)?;
    json.push(b'\n');

    let mut w = writer.lock().await;
    w.write_all(&json).await?;
    w.flush().await
}
