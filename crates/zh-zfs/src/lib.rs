// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! ZFS dataset management through the `zfs` command-line tool.
//!
//! This crate turns the tool's textual output into typed values:
//! - property dumps (`zfs get -H -p`) become [`DatasetRecord`]s,
//! - the diagnostic stream of `zfs send -P -v` becomes [`TransferProgress`]
//!   events delivered while the send is running,
//! - diagnostic text of failed commands becomes a [`ClassifiedError`].
//!
//! Commands are issued through a [`Zfs`] handle, which owns an immutable
//! [`ExecContext`] and a [`ProcessRunner`].

pub mod classify;
pub mod config;
pub mod error;
pub mod exec;
pub mod name;
pub mod options;
pub mod progress;
pub mod property;
pub mod record;
pub mod size;
pub mod transfer;
pub mod zfs;

pub use classify::{classify, ClassifiedError, ErrorKind, CLASSIFICATION_TABLE};
pub use crate::config::{ElevationMode, ZfsConfig};
pub use error::{ParseContext, ParseError, PropertyError, ZfsError, ZfsResult};
pub use exec::{
    CommandLine, CommandOutput, Elevation, ExecContext, Pipes, ProcessExit, ProcessRunner,
    RunningProcess, TokioProcessRunner,
};
pub use name::{last_component, pool_of, SnapshotName};
pub use options::{
    CreateOptions, DestroyScope, ListOptions, ReceiveOptions, SendOptions, SendRequest,
};
pub use progress::{
    parse_progress_stream, ProgressCallback, ProgressOutcome, ProgressReport, ProgressStream,
    TransferProgress,
};
pub use property::{Property, PropertySource};
pub use record::{aggregate, DatasetRecord, DatasetType};
pub use size::{Size, SizeScale, SIZE_SCALE_BINARY};
pub use transfer::TransferSummary;
pub use zfs::Zfs;
