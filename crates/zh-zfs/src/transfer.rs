// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Send and receive orchestration.
//!
//! A send runs one `zfs send` subprocess and drives three things at once: the
//! data stream is copied into the caller's sink, the diagnostic stream is fed
//! through the progress parser, and the exit status is awaited. All three are
//! polled from the calling task with `tokio::join!`, so neither pipe can fill
//! up and stall the sender. Outcomes are reconciled once all three finish.

use crate::classify::{ClassifiedError, ErrorKind};
use crate::error::{ParseError, ZfsError, ZfsResult};
use crate::exec::{read_all, BoxedReader, CommandLine, Pipes, ProcessExit};
use crate::name::SnapshotName;
use crate::options::{ReceiveOptions, SendOptions, SendRequest};
use crate::progress::{ProgressCallback, ProgressStream};
use crate::zfs::{failure, Zfs};
use serde::Serialize;
use std::io;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, warn};

/// Result of a completed send.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransferSummary {
    /// Bytes copied into the sink.
    pub bytes: u64,
    /// Progress events delivered to the callback.
    pub progress_events: usize,
}

/// What was read from the diagnostic pipe.
#[derive(Debug, Default)]
struct Diagnostics {
    events: usize,
    /// Lines not consumed as progress, newline-joined.
    leftover: String,
    header_error: Option<ParseError>,
}

impl Zfs {
    /// Stream `request.snapshot` into `sink`. With a callback, progress events
    /// are delivered as `zfs` reports them.
    pub async fn send<W>(
        &self,
        request: &SendRequest,
        sink: W,
        progress: Option<ProgressCallback<'_>>,
    ) -> ZfsResult<TransferSummary>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let snapshot: SnapshotName = request.snapshot.parse()?;
        self.check_send_endpoints(&snapshot, &request.options).await?;
        self.run_send(&snapshot, &request.options, sink, progress).await
    }

    /// Feed `source` into `zfs receive target`. Returns the bytes written.
    pub async fn receive<R>(
        &self,
        target: &str,
        mut source: R,
        options: &ReceiveOptions,
    ) -> ZfsResult<u64>
    where
        R: AsyncRead + Unpin + Send,
    {
        let command = self.receive_command(target, options);
        debug!(operation = "zfs_receive", target = %target, command = %command, "Starting receive");

        let mut process = self.runner().start(&command, Pipes::all())?;
        let stdin = process.stdin.take();
        let stdout = process.stdout.take();
        let stderr = process.stderr.take();

        let feed = async move {
            let Some(mut stdin) = stdin else {
                return Ok(0);
            };
            let bytes = tokio::io::copy(&mut source, &mut stdin).await?;
            stdin.shutdown().await?;
            Ok::<u64, io::Error>(bytes)
        };
        let (fed, _stdout, stderr, exit) =
            tokio::join!(feed, read_all(stdout), read_all(stderr), process.wait());

        let stderr = String::from_utf8_lossy(&stderr?).into_owned();
        let bytes = finish_receive(&command, target, fed, &stderr, exit?)?;
        debug!(operation = "zfs_receive", target = %target, bytes, "Receive finished");
        Ok(bytes)
    }

    /// Pipe a send straight into a receive on the same host.
    pub async fn send_to(
        &self,
        request: &SendRequest,
        target: &str,
        options: &ReceiveOptions,
        progress: Option<ProgressCallback<'_>>,
    ) -> ZfsResult<TransferSummary> {
        let snapshot: SnapshotName = request.snapshot.parse()?;
        self.check_send_endpoints(&snapshot, &request.options).await?;

        let command = self.receive_command(target, options);
        debug!(operation = "zfs_send_to", snapshot = %snapshot, target = %target, command = %command, "Starting receiver");

        let mut receiver = self.runner().start(&command, Pipes::all())?;
        let Some(stdin) = receiver.stdin.take() else {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "receiver has no stdin").into());
        };
        let stdout = receiver.stdout.take();
        let stderr = receiver.stderr.take();

        let (sent, _stdout, stderr, exit) = tokio::join!(
            self.run_send(&snapshot, &request.options, stdin, progress),
            read_all(stdout),
            read_all(stderr),
            receiver.wait()
        );

        if let Err(err) = &sent {
            if !is_broken_pipe(err) {
                return sent;
            }
        }

        let stderr = String::from_utf8_lossy(&stderr?).into_owned();
        finish_receive(&command, target, Ok(0), &stderr, exit?)?;
        sent
    }

    /// Target first, then the incremental base; each miss is its own error.
    async fn check_send_endpoints(
        &self,
        snapshot: &SnapshotName,
        options: &SendOptions,
    ) -> ZfsResult<()> {
        let target = snapshot.to_string();
        if !self.exists(&target).await? {
            debug!(operation = "zfs_send", snapshot = %target, "Snapshot to send does not exist");
            return Err(ClassifiedError::not_found(&target).into());
        }

        if let Some(base) = &options.incremental_base {
            // `@snap` and `#bookmark` are relative to the sent filesystem.
            let base = if base.starts_with('@') || base.starts_with('#') {
                format!("{}{}", snapshot.filesystem, base)
            } else {
                base.clone()
            };
            if !self.exists(&base).await? {
                debug!(operation = "zfs_send", base = %base, "Incremental base does not exist");
                return Err(ClassifiedError::not_found(&base).into());
            }
        }
        Ok(())
    }

    async fn run_send<W>(
        &self,
        snapshot: &SnapshotName,
        options: &SendOptions,
        sink: W,
        progress: Option<ProgressCallback<'_>>,
    ) -> ZfsResult<TransferSummary>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let mut args = vec!["send".to_string()];
        args.extend(options.to_args(progress.is_some()));
        args.push(snapshot.to_string());
        let command = self.context().command(args);
        debug!(operation = "zfs_send", snapshot = %snapshot, base = ?options.incremental_base, command = %command, "Starting send");

        let mut process = self.runner().start(&command, Pipes::capture())?;
        let stdout = process.stdout.take();
        let stderr = process.stderr.take();

        let (copied, diagnostics, exit) = tokio::join!(
            copy_to_sink(stdout, sink),
            consume_diagnostics(stderr, progress),
            process.wait()
        );

        let result = reconcile(&command, snapshot, copied, diagnostics, exit);
        match &result {
            Ok(summary) => {
                debug!(operation = "zfs_send", snapshot = %snapshot, bytes = summary.bytes, events = summary.progress_events, "Send finished")
            }
            Err(err) => {
                warn!(operation = "zfs_send", snapshot = %snapshot, error = %err, "Send failed")
            }
        }
        result
    }

    fn receive_command(&self, target: &str, options: &ReceiveOptions) -> CommandLine {
        let mut args = vec!["receive".to_string()];
        args.extend(options.to_args());
        args.push(target.to_string());
        self.context().command(args)
    }
}

/// Copy the data stream, then flush. The sink is dropped on return, which
/// closes it when it is a pipe.
async fn copy_to_sink<W>(stdout: Option<BoxedReader>, mut sink: W) -> io::Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let Some(mut stdout) = stdout else {
        return Ok(0);
    };
    let bytes = tokio::io::copy(&mut stdout, &mut sink).await?;
    sink.flush().await?;
    Ok(bytes)
}

async fn consume_diagnostics(
    stderr: Option<BoxedReader>,
    progress: Option<ProgressCallback<'_>>,
) -> ZfsResult<Diagnostics> {
    let Some(callback) = progress else {
        let text = read_all(stderr).await?;
        return Ok(Diagnostics {
            leftover: String::from_utf8_lossy(&text).trim().to_string(),
            ..Diagnostics::default()
        });
    };
    let Some(stderr) = stderr else {
        return Ok(Diagnostics::default());
    };

    let mut stream = ProgressStream::new(BufReader::new(stderr));
    let mut diagnostics = Diagnostics::default();
    loop {
        match stream.next_event().await {
            Ok(Some(event)) => {
                diagnostics.events += 1;
                callback(event);
            }
            Ok(None) => break,
            Err(ZfsError::Parse(err)) => {
                diagnostics.header_error = Some(err);
                break;
            }
            Err(err) => return Err(err),
        }
    }

    diagnostics.leftover = stream.finish().await?.join("\n");
    Ok(diagnostics)
}

fn reconcile(
    command: &CommandLine,
    snapshot: &SnapshotName,
    copied: io::Result<u64>,
    diagnostics: ZfsResult<Diagnostics>,
    exit: io::Result<ProcessExit>,
) -> ZfsResult<TransferSummary> {
    let dataset = snapshot.to_string();
    let exit = exit?;
    let diagnostics = diagnostics?;

    if !exit.success() {
        return Err(failure(command, &diagnostics.leftover, exit, Some(&dataset)).into());
    }

    let bytes = match copied {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::BrokenPipe => {
            return Err(ClassifiedError::new(ErrorKind::BrokenPipe, err.to_string())
                .with_dataset(dataset)
                .into());
        }
        Err(err) => return Err(ZfsError::Stream(err)),
    };

    if let Some(err) = diagnostics.header_error {
        return Err(err.into());
    }

    if !diagnostics.leftover.trim().is_empty() {
        return Err(failure(command, &diagnostics.leftover, exit, Some(&dataset)).into());
    }

    Ok(TransferSummary {
        bytes,
        progress_events: diagnostics.events,
    })
}

fn finish_receive(
    command: &CommandLine,
    target: &str,
    fed: io::Result<u64>,
    stderr: &str,
    exit: ProcessExit,
) -> ZfsResult<u64> {
    if !exit.success() {
        let err = failure(command, stderr, exit, Some(target));
        warn!(operation = "zfs_receive", target = %target, kind = %err.kind, "Receive failed");
        return Err(err.into());
    }

    let bytes = match fed {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::BrokenPipe => {
            return Err(ClassifiedError::new(ErrorKind::BrokenPipe, err.to_string())
                .with_dataset(target)
                .into());
        }
        Err(err) => return Err(ZfsError::Stream(err)),
    };

    if !stderr.trim().is_empty() {
        return Err(failure(command, stderr, exit, Some(target)).into());
    }
    Ok(bytes)
}

fn is_broken_pipe(err: &ZfsError) -> bool {
    match err {
        ZfsError::Stream(err) => err.kind() == io::ErrorKind::BrokenPipe,
        other => other.kind() == Some(ErrorKind::BrokenPipe),
    }
}
