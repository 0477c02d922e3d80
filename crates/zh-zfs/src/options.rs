// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Flag sets for the `zfs` verbs.

use crate::record::DatasetType;

/// Flags for `zfs send`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendOptions {
    /// Send only the changes since this snapshot (`-i`, or `-I` with
    /// `include_intermediary`).
    pub incremental_base: Option<String>,
    pub include_intermediary: bool,
    /// `-R`: snapshots, properties and descendants.
    pub replication: bool,
    /// `-L`
    pub large_blocks: bool,
    /// `-e`
    pub embedded: bool,
    /// `-c`
    pub compressed: bool,
    /// `-p`
    pub include_properties: bool,
}

impl SendOptions {
    pub fn incremental(base: impl Into<String>) -> Self {
        Self {
            incremental_base: Some(base.into()),
            ..Self::default()
        }
    }

    /// Arguments placed before the snapshot name. `progress` adds `-P -v`.
    pub fn to_args(&self, progress: bool) -> Vec<String> {
        let mut args = Vec::new();
        for (enabled, flag) in [
            (self.replication, "-R"),
            (self.large_blocks, "-L"),
            (self.embedded, "-e"),
            (self.compressed, "-c"),
            (self.include_properties, "-p"),
        ] {
            if enabled {
                args.push(flag.to_string());
            }
        }
        if progress {
            args.push("-P".to_string());
            args.push("-v".to_string());
        }
        if let Some(base) = &self.incremental_base {
            let flag = if self.include_intermediary { "-I" } else { "-i" };
            args.push(flag.to_string());
            args.push(base.clone());
        }
        args
    }
}

/// Snapshot to send plus how to send it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendRequest {
    pub snapshot: String,
    pub options: SendOptions,
}

impl SendRequest {
    pub fn full(snapshot: impl Into<String>) -> Self {
        Self {
            snapshot: snapshot.into(),
            options: SendOptions::default(),
        }
    }

    pub fn incremental(base: impl Into<String>, snapshot: impl Into<String>) -> Self {
        Self {
            snapshot: snapshot.into(),
            options: SendOptions::incremental(base),
        }
    }
}

/// Flags for `zfs receive`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiveOptions {
    /// `-F`
    pub force_rollback: bool,
    /// `-s`
    pub resumable: bool,
    /// `-u`
    pub no_mount: bool,
    /// `-d`
    pub discard_first: bool,
    /// `-e`
    pub discard_all_but_last: bool,
    /// `-o origin=<snapshot>`
    pub origin: Option<String>,
}

impl ReceiveOptions {
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        for (enabled, flag) in [
            (self.force_rollback, "-F"),
            (self.resumable, "-s"),
            (self.no_mount, "-u"),
            (self.discard_first, "-d"),
            (self.discard_all_but_last, "-e"),
        ] {
            if enabled {
                args.push(flag.to_string());
            }
        }
        if let Some(origin) = &self.origin {
            args.push("-o".to_string());
            args.push(format!("origin={origin}"));
        }
        args
    }
}

/// What `zfs destroy` removes besides the named dataset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DestroyScope {
    #[default]
    Single,
    /// `-r`: children.
    Recursive,
    /// `-R`: children and dependents such as clones.
    RecursiveDependents,
}

impl DestroyScope {
    pub fn flag(self) -> Option<&'static str> {
        match self {
            Self::Single => None,
            Self::Recursive => Some("-r"),
            Self::RecursiveDependents => Some("-R"),
        }
    }
}

/// Flags for `zfs create`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateOptions {
    /// `-p`
    pub create_parents: bool,
    /// Each becomes `-o name=value`, in order.
    pub properties: Vec<(String, String)>,
}

/// Selection for `zfs get`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// `-r`
    pub recursive: bool,
    /// `-d <depth>`; implies recursion.
    pub depth: Option<u32>,
    /// `-t`; empty means whatever `zfs` defaults to.
    pub types: Vec<DatasetType>,
    /// Datasets to start from; empty means every pool.
    pub roots: Vec<String>,
}

impl ListOptions {
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            roots: vec![name.into()],
            ..Self::default()
        }
    }

    pub fn recursive(mut self) -> Self {
        self.recursive = true;
        self
    }

    pub fn with_types(mut self, types: &[DatasetType]) -> Self {
        self.types = types.to_vec();
        self
    }

    /// Selection flags, placed between `get` and the property list.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.recursive {
            args.push("-r".to_string());
        }
        if let Some(depth) = self.depth {
            args.push("-d".to_string());
            args.push(depth.to_string());
        }
        if !self.types.is_empty() {
            let types: Vec<&str> = self.types.iter().map(|kind| kind.as_str()).collect();
            args.push("-t".to_string());
            args.push(types.join(","));
        }
        args
    }
}
