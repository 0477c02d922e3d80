// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use anyhow::{Context, Result};
use clap::Subcommand;
use std::path::PathBuf;
use tracing::debug;
use zh_logging::CliLoggingArgs;
use zh_zfs::{ErrorKind, Zfs, ZfsConfig, ZfsError};

pub mod datasets;
pub mod output;
pub mod transfer;

pub use clap::Parser;

#[derive(clap::Parser, Debug)]
#[command(
    name = "zh",
    about = "Manage ZFS datasets, snapshots and replication",
    version,
    propagate_version = true
)]
pub struct Cli {
    /// TOML file with `zfs-binary`, `elevation` and `sudo-binary`
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[command(flatten)]
    pub logging: CliLoggingArgs,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List datasets with their space usage
    List(datasets::ListArgs),
    /// Show one property of a dataset
    Get(datasets::GetArgs),
    /// Set a property on a dataset
    Set(datasets::SetArgs),
    /// Create a filesystem
    Create(datasets::CreateArgs),
    /// Snapshot a filesystem
    Snapshot(datasets::SnapshotArgs),
    /// Clone a snapshot within its pool
    Clone(datasets::CloneArgs),
    /// Promote a clone so it no longer depends on its origin
    Promote(datasets::PromoteArgs),
    /// Destroy a dataset or snapshot
    Destroy(datasets::DestroyArgs),
    /// List the snapshots of a filesystem
    Snapshots(datasets::SnapshotsArgs),
    /// List the clones of a snapshot
    Clones(datasets::ClonesArgs),
    /// Write a snapshot's send stream to stdout or a file
    Send(transfer::SendArgs),
    /// Receive a send stream from stdin
    Receive(transfer::ReceiveArgs),
    /// Send a snapshot straight into a receive on this host
    Replicate(transfer::ReplicateArgs),
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        self.logging.init("zh")?;

        let config = ZfsConfig::load(self.config.as_deref()).context("loading configuration")?;
        let context = config.exec_context();
        debug!(operation = "cli_start", binary = %context.binary.display(), elevation = ?context.elevation, "Resolved execution context");
        let zfs = Zfs::local(context);

        self.command.run(&zfs).await
    }
}

impl Commands {
    pub async fn run(self, zfs: &Zfs) -> Result<()> {
        match self {
            Commands::List(args) => args.run(zfs).await,
            Commands::Get(args) => args.run(zfs).await,
            Commands::Set(args) => args.run(zfs).await,
            Commands::Create(args) => args.run(zfs).await,
            Commands::Snapshot(args) => args.run(zfs).await,
            Commands::Clone(args) => args.run(zfs).await,
            Commands::Promote(args) => args.run(zfs).await,
            Commands::Destroy(args) => args.run(zfs).await,
            Commands::Snapshots(args) => args.run(zfs).await,
            Commands::Clones(args) => args.run(zfs).await,
            Commands::Send(args) => args.run(zfs).await,
            Commands::Receive(args) => args.run(zfs).await,
            Commands::Replicate(args) => args.run(zfs).await,
        }
    }
}

/// Process exit status for a failed command. Classified `zfs` failures get a
/// status per kind so scripts can branch on them.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    let Some(err) = err.downcast_ref::<ZfsError>() else {
        return 1;
    };
    match err {
        ZfsError::Classified(err) => match err.kind {
            ErrorKind::NotFound => 2,
            ErrorKind::AlreadyExists => 3,
            ErrorKind::InvalidName => 4,
            ErrorKind::NotMounted => 5,
            ErrorKind::BrokenPipe => 6,
            ErrorKind::NotAClone => 7,
            ErrorKind::HasDependents => 8,
            ErrorKind::InvalidProperty => 9,
            ErrorKind::Unclassified => 10,
        },
        ZfsError::Parse(_) => 11,
        ZfsError::Stream(_) => 12,
        ZfsError::PoolMismatch { .. } => 13,
        ZfsError::Property(_) => 14,
    }
}

/// `name=value` argument.
pub fn parse_assignment(text: &str) -> std::result::Result<(String, String), String> {
    match text.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(format!("expected NAME=VALUE, got `{text}`")),
    }
}
