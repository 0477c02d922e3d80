// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Scripted process runner for exercising the crate without a ZFS pool.

#![allow(dead_code)]

use async_trait::async_trait;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::io::AsyncWrite;
use zh_zfs::exec::{BoxedReader, BoxedWriter};
use zh_zfs::{CommandLine, Pipes, ProcessExit, ProcessRunner, RunningProcess};

/// What a fake process prints and how it exits.
#[derive(Debug, Clone, Default)]
pub struct Scripted {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: i32,
    /// Writes to stdin fail with a broken pipe.
    pub rejects_stdin: bool,
}

impl Scripted {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn stdout(text: &str) -> Self {
        Self {
            stdout: text.as_bytes().to_vec(),
            ..Self::default()
        }
    }

    pub fn fail(code: i32, stderr: &str) -> Self {
        Self {
            stderr: stderr.as_bytes().to_vec(),
            exit_code: code,
            ..Self::default()
        }
    }

    pub fn with_stderr(mut self, stderr: &str) -> Self {
        self.stderr = stderr.as_bytes().to_vec();
        self
    }

    pub fn with_stdout(mut self, stdout: &[u8]) -> Self {
        self.stdout = stdout.to_vec();
        self
    }

    pub fn rejecting_stdin(mut self) -> Self {
        self.rejects_stdin = true;
        self
    }
}

type Handler = Box<dyn Fn(&[String]) -> Scripted + Send + Sync>;

/// Answers each command through `handler`, which sees the arguments `zfs`
/// would receive (without any elevation prefix). Records every command.
pub struct FakeRunner {
    handler: Handler,
    calls: Mutex<Vec<CommandLine>>,
    stdin: SharedBuffer,
}

impl FakeRunner {
    pub fn new<F>(handler: F) -> Arc<Self>
    where
        F: Fn(&[String]) -> Scripted + Send + Sync + 'static,
    {
        Arc::new(Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
            stdin: SharedBuffer::default(),
        })
    }

    pub fn calls(&self) -> Vec<CommandLine> {
        self.calls.lock().unwrap().clone()
    }

    /// `zfs` argument lists, one per command, joined with spaces.
    pub fn zfs_calls(&self) -> Vec<String> {
        self.calls()
            .iter()
            .map(|call| call.zfs_args().join(" "))
            .collect()
    }

    /// Everything written to the stdin of processes started by this runner.
    pub fn stdin_bytes(&self) -> Vec<u8> {
        self.stdin.contents()
    }
}

#[async_trait]
impl ProcessRunner for FakeRunner {
    fn start(&self, command: &CommandLine, pipes: Pipes) -> io::Result<RunningProcess> {
        self.calls.lock().unwrap().push(command.clone());
        let scripted = (self.handler)(command.zfs_args());

        let stdin: Option<BoxedWriter> = match (pipes.stdin, scripted.rejects_stdin) {
            (false, _) => None,
            (true, false) => Some(Box::new(self.stdin.clone())),
            (true, true) => Some(Box::new(BrokenWriter)),
        };
        let stdout: Option<BoxedReader> = pipes
            .stdout
            .then(|| Box::new(io::Cursor::new(scripted.stdout)) as BoxedReader);
        let stderr: Option<BoxedReader> = pipes
            .stderr
            .then(|| Box::new(io::Cursor::new(scripted.stderr)) as BoxedReader);

        let code = scripted.exit_code;
        Ok(RunningProcess::new(stdin, stdout, stderr, async move {
            Ok(ProcessExit::from_code(code))
        }))
    }
}

/// Cloneable in-memory sink.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> Vec<u8> {
        self.0.lock().unwrap().clone()
    }
}

impl AsyncWrite for SharedBuffer {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// A sink whose reader has gone away.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrokenWriter;

impl AsyncWrite for BrokenWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Poll::Ready(Err(io::Error::from(io::ErrorKind::BrokenPipe)))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Answer for `zfs list -H -o name -t all <name>` given the names that exist.
pub fn existence(args: &[String], existing: &[&str]) -> Scripted {
    let name = args.last().map(String::as_str).unwrap_or_default();
    if existing.contains(&name) {
        Scripted::stdout(&format!("{name}\n"))
    } else {
        Scripted::fail(1, &format!("cannot open '{name}': dataset does not exist\n"))
    }
}

/// Whether `args` is the existence probe.
pub fn is_exists_probe(args: &[String]) -> bool {
    args.len() == 7 && args[..6] == ["list", "-H", "-o", "name", "-t", "all"]
}
