// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Subprocess seam.
//!
//! Every `zfs` invocation goes through a [`ProcessRunner`], built from an
//! [`ExecContext`] that fixes the binary and the elevation strategy for the
//! lifetime of a handle. Tests substitute a scripted runner.

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::process::Command;
use tracing::debug;

pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// How commands are elevated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Elevation {
    /// Run the binary as the current user.
    Direct,
    /// Prefix with `<program> -n`; never prompts for a password.
    Sudo { program: PathBuf },
}

/// Binary and elevation used for every command issued through one handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecContext {
    pub binary: PathBuf,
    pub elevation: Elevation,
}

impl Default for ExecContext {
    fn default() -> Self {
        Self::direct("zfs")
    }
}

impl ExecContext {
    pub fn direct(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            elevation: Elevation::Direct,
        }
    }

    pub fn sudo(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            elevation: Elevation::Sudo {
                program: PathBuf::from("sudo"),
            },
        }
    }

    pub fn with_elevation(mut self, elevation: Elevation) -> Self {
        self.elevation = elevation;
        self
    }

    /// Full command line for `args`.
    pub fn command<I, S>(&self, args: I) -> CommandLine
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let binary = self.binary.to_string_lossy().into_owned();
        let args = args.into_iter().map(Into::into);
        match &self.elevation {
            Elevation::Direct => CommandLine {
                program: binary,
                args: args.collect(),
            },
            Elevation::Sudo { program } => CommandLine {
                program: program.to_string_lossy().into_owned(),
                args: ["-n".to_string(), binary].into_iter().chain(args).collect(),
            },
        }
    }
}

/// Whether the current process has an effective uid of 0.
pub fn running_as_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

/// A program plus its arguments, never interpreted by a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    /// Arguments after the elevation prefix, i.e. what `zfs` itself sees.
    pub fn zfs_args(&self) -> &[String] {
        match self.args.first().map(String::as_str) {
            Some("-n") if self.args.len() > 1 => &self.args[2..],
            _ => &self.args,
        }
    }
}

impl std::fmt::Display for CommandLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Which standard streams to connect; unconnected ones go to `/dev/null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pipes {
    pub stdin: bool,
    pub stdout: bool,
    pub stderr: bool,
}

impl Pipes {
    /// stdout and stderr.
    pub fn capture() -> Self {
        Self {
            stdin: false,
            stdout: true,
            stderr: true,
        }
    }

    /// All three.
    pub fn all() -> Self {
        Self {
            stdin: true,
            ..Self::capture()
        }
    }
}

/// How a process ended. `code` is `None` when it was killed by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    pub code: Option<i32>,
}

impl ProcessExit {
    pub fn from_code(code: i32) -> Self {
        Self { code: Some(code) }
    }

    pub fn success(self) -> bool {
        self.code == Some(0)
    }
}

impl From<std::process::ExitStatus> for ProcessExit {
    fn from(status: std::process::ExitStatus) -> Self {
        Self {
            code: status.code(),
        }
    }
}

impl std::fmt::Display for ProcessExit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit status {code}"),
            None => write!(f, "terminated by signal"),
        }
    }
}

/// A started process. Take the pipes out, then [`RunningProcess::wait`].
pub struct RunningProcess {
    pub stdin: Option<BoxedWriter>,
    pub stdout: Option<BoxedReader>,
    pub stderr: Option<BoxedReader>,
    exit: BoxFuture<'static, io::Result<ProcessExit>>,
}

impl RunningProcess {
    pub fn new<F>(
        stdin: Option<BoxedWriter>,
        stdout: Option<BoxedReader>,
        stderr: Option<BoxedReader>,
        exit: F,
    ) -> Self
    where
        F: Future<Output = io::Result<ProcessExit>> + Send + 'static,
    {
        Self {
            stdin,
            stdout,
            stderr,
            exit: exit.boxed(),
        }
    }

    /// Wait for the process to end. Pipes still held here are closed first.
    pub async fn wait(self) -> io::Result<ProcessExit> {
        let Self {
            stdin,
            stdout,
            stderr,
            exit,
        } = self;
        drop((stdin, stdout, stderr));
        exit.await
    }
}

/// Collected result of a run-to-completion command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit: ProcessExit,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

#[async_trait]
pub trait ProcessRunner: Send + Sync {
    fn start(&self, command: &CommandLine, pipes: Pipes) -> io::Result<RunningProcess>;

    /// Run to completion, collecting stdout and stderr.
    async fn output(&self, command: &CommandLine) -> io::Result<CommandOutput> {
        let mut process = self.start(command, Pipes::capture())?;
        let stdout = process.stdout.take();
        let stderr = process.stderr.take();
        let (stdout, stderr) = tokio::try_join!(read_all(stdout), read_all(stderr))?;
        let exit = process.wait().await?;
        Ok(CommandOutput {
            exit,
            stdout,
            stderr,
        })
    }
}

/// Read a pipe to its end; a missing pipe reads as empty.
pub async fn read_all(reader: Option<BoxedReader>) -> io::Result<Vec<u8>> {
    let mut buffer = Vec::new();
    if let Some(mut reader) = reader {
        reader.read_to_end(&mut buffer).await?;
    }
    Ok(buffer)
}

/// Spawns real processes with tokio. Children are killed when their
/// [`RunningProcess`] is dropped before it finished.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioProcessRunner;

fn stdio(piped: bool) -> Stdio {
    if piped {
        Stdio::piped()
    } else {
        Stdio::null()
    }
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    fn start(&self, command: &CommandLine, pipes: Pipes) -> io::Result<RunningProcess> {
        debug!(operation = "run_command", program = %command.program, args = ?command.args, "Running command");

        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(stdio(pipes.stdin))
            .stdout(stdio(pipes.stdout))
            .stderr(stdio(pipes.stderr))
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child.stdin.take().map(|pipe| Box::new(pipe) as BoxedWriter);
        let stdout = child.stdout.take().map(|pipe| Box::new(pipe) as BoxedReader);
        let stderr = child.stderr.take().map(|pipe| Box::new(pipe) as BoxedReader);

        let exit = async move { child.wait().await.map(ProcessExit::from) };
        Ok(RunningProcess::new(stdin, stdout, stderr, exit))
    }
}
