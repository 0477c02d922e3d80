// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Dataset name helpers.

use crate::classify::{ClassifiedError, ErrorKind};
use std::str::FromStr;

/// Pool component of a dataset or snapshot name (`tank` for `tank/a/b@s`).
pub fn pool_of(name: &str) -> &str {
    let dataset = name.split(['@', '#']).next().unwrap_or(name);
    dataset.split('/').next().unwrap_or(dataset)
}

/// Last path component of a dataset name (`b` for `tank/a/b`).
pub fn last_component(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// A `filesystem@snapshot` name split into its halves.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SnapshotName {
    pub filesystem: String,
    pub snapshot: String,
}

impl SnapshotName {
    pub fn new(filesystem: impl Into<String>, snapshot: impl Into<String>) -> Self {
        Self {
            filesystem: filesystem.into(),
            snapshot: snapshot.into(),
        }
    }

    pub fn pool(&self) -> &str {
        pool_of(&self.filesystem)
    }
}

impl std::fmt::Display for SnapshotName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.filesystem, self.snapshot)
    }
}

impl FromStr for SnapshotName {
    type Err = ClassifiedError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.split_once('@') {
            Some((filesystem, snapshot))
                if !filesystem.is_empty() && !snapshot.is_empty() && !snapshot.contains('@') =>
            {
                Ok(Self::new(filesystem, snapshot))
            }
            _ => Err(ClassifiedError::new(
                ErrorKind::InvalidName,
                format!("cannot open '{name}': missing '@' delimiter in snapshot name"),
            )
            .with_dataset(name)),
        }
    }
}
