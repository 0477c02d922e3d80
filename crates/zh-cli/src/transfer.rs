// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Send, receive and replicate subcommands.

use crate::output::render_progress;
use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tracing::info;
use zh_zfs::{ReceiveOptions, SendOptions, SendRequest, TransferProgress, Zfs};

/// Flags shared by `send` and `replicate`.
#[derive(Args, Debug, Clone, Default)]
pub struct SendFlags {
    /// Incremental from this snapshot (`@snap` is relative to the sent filesystem)
    #[arg(short = 'i', value_name = "BASE")]
    pub base: Option<String>,
    /// Include intermediate snapshots between BASE and SNAPSHOT
    #[arg(short = 'I', requires = "base")]
    pub intermediary: bool,
    /// Replication stream with descendants and properties
    #[arg(short = 'R')]
    pub replication: bool,
    /// Keep blocks larger than 128KiB
    #[arg(short = 'L')]
    pub large_blocks: bool,
    /// Compressed stream
    #[arg(short = 'c')]
    pub compressed: bool,
    /// Include dataset properties
    #[arg(short = 'p')]
    pub properties: bool,
    /// Report progress on stderr
    #[arg(long)]
    pub progress: bool,
}

impl SendFlags {
    pub fn request(&self, snapshot: &str) -> SendRequest {
        SendRequest {
            snapshot: snapshot.to_string(),
            options: SendOptions {
                incremental_base: self.base.clone(),
                include_intermediary: self.intermediary,
                replication: self.replication,
                large_blocks: self.large_blocks,
                embedded: false,
                compressed: self.compressed,
                include_properties: self.properties,
            },
        }
    }
}

fn print_progress(event: TransferProgress) {
    eprintln!("{}", render_progress(&event));
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub flags: SendFlags,
    /// Write the stream here instead of stdout
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    pub snapshot: String,
}

impl SendArgs {
    pub async fn run(self, zfs: &Zfs) -> Result<()> {
        let request = self.flags.request(&self.snapshot);
        let mut printer = print_progress;
        let progress: Option<&mut (dyn FnMut(TransferProgress) + Send)> = if self.flags.progress {
            Some(&mut printer)
        } else {
            None
        };

        let summary = match &self.output {
            Some(path) => {
                let file = tokio::fs::File::create(path)
                    .await
                    .with_context(|| format!("creating {}", path.display()))?;
                zfs.send(&request, file, progress).await?
            }
            None => zfs.send(&request, tokio::io::stdout(), progress).await?,
        };

        info!(operation = "cli_send", snapshot = %self.snapshot, bytes = summary.bytes, "Send complete");
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct ReceiveFlags {
    /// Roll the target back to its latest snapshot first
    #[arg(short = 'F')]
    pub force: bool,
    /// Do not mount the received filesystem
    #[arg(short = 'u')]
    pub no_mount: bool,
    /// Save partial state so an interrupted receive can resume
    #[arg(short = 's')]
    pub resumable: bool,
}

impl ReceiveFlags {
    pub fn options(&self) -> ReceiveOptions {
        ReceiveOptions {
            force_rollback: self.force,
            resumable: self.resumable,
            no_mount: self.no_mount,
            ..ReceiveOptions::default()
        }
    }
}

#[derive(Args, Debug)]
pub struct ReceiveArgs {
    #[command(flatten)]
    pub flags: ReceiveFlags,
    pub target: String,
}

impl ReceiveArgs {
    pub async fn run(self, zfs: &Zfs) -> Result<()> {
        let bytes = zfs
            .receive(&self.target, tokio::io::stdin(), &self.flags.options())
            .await?;
        info!(operation = "cli_receive", target = %self.target, bytes, "Receive complete");
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct ReplicateArgs {
    #[command(flatten)]
    pub flags: SendFlags,
    #[command(flatten)]
    pub receive: ReceiveFlags,
    pub snapshot: String,
    pub target: String,
}

impl ReplicateArgs {
    pub async fn run(self, zfs: &Zfs) -> Result<()> {
        let request = self.flags.request(&self.snapshot);
        let mut printer = print_progress;
        let progress: Option<&mut (dyn FnMut(TransferProgress) + Send)> = if self.flags.progress {
            Some(&mut printer)
        } else {
            None
        };

        let summary = zfs
            .send_to(&request, &self.target, &self.receive.options(), progress)
            .await?;
        eprintln!(
            "replicated {} into {} ({} bytes)",
            self.snapshot, self.target, summary.bytes
        );
        Ok(())
    }
}
