// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Dataset verbs on top of the `zfs` CLI.

use crate::classify::{classify, ClassifiedError};
use crate::error::{ZfsError, ZfsResult};
use crate::exec::{CommandLine, ExecContext, ProcessRunner, TokioProcessRunner};
use crate::name::SnapshotName;
use crate::options::{CreateOptions, DestroyScope, ListOptions};
use crate::property::{format_assignments, Property};
use crate::record::{aggregate, DatasetRecord, DatasetType};
use std::sync::Arc;
use tracing::{debug, warn};

const GET_COLUMNS: [&str; 5] = ["get", "-H", "-p", "-o", "name,property,value,source"];

/// Handle for issuing `zfs` commands.
///
/// The execution context is fixed at construction. [`Zfs::with_context`]
/// returns a separate handle, so elevating one caller never changes what
/// another caller runs.
#[derive(Clone)]
pub struct Zfs {
    runner: Arc<dyn ProcessRunner>,
    context: ExecContext,
}

impl std::fmt::Debug for Zfs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Zfs")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

impl Zfs {
    pub fn new(runner: Arc<dyn ProcessRunner>, context: ExecContext) -> Self {
        Self { runner, context }
    }

    /// Handle that spawns real processes.
    pub fn local(context: ExecContext) -> Self {
        Self::new(Arc::new(TokioProcessRunner), context)
    }

    pub fn context(&self) -> &ExecContext {
        &self.context
    }

    pub fn with_context(&self, context: ExecContext) -> Self {
        Self {
            runner: Arc::clone(&self.runner),
            context,
        }
    }

    pub(crate) fn runner(&self) -> &dyn ProcessRunner {
        self.runner.as_ref()
    }

    /// Run a command to completion. Fails on a non-zero exit status or on any
    /// diagnostic output, classifying the text.
    async fn run(&self, args: Vec<String>, dataset: Option<&str>) -> ZfsResult<String> {
        let command = self.context.command(args);
        debug!(operation = "zfs_command", command = %command, "Running zfs command");

        let output = self.runner.output(&command).await?;
        let stderr = output.stderr_text();
        if output.exit.success() && stderr.trim().is_empty() {
            return Ok(output.stdout_text());
        }

        let err = failure(&command, &stderr, output.exit, dataset);
        warn!(operation = "zfs_command", command = %command, kind = %err.kind, error = %err.text.trim(), "zfs command failed");
        Err(err.into())
    }

    /// Properties of the selected datasets, one record per dataset.
    pub async fn list(&self, options: &ListOptions) -> ZfsResult<Vec<DatasetRecord>> {
        let mut args = strings(&GET_COLUMNS);
        args.extend(options.to_args());
        args.push("all".to_string());
        args.extend(options.roots.iter().cloned());

        let dataset = match options.roots.as_slice() {
            [root] => Some(root.as_str()),
            _ => None,
        };
        let stdout = self.run(args, dataset).await?;
        let records = aggregate(&stdout)?;
        debug!(operation = "zfs_list", roots = ?options.roots, records = records.len(), "Listed datasets");
        Ok(records)
    }

    pub async fn get(&self, name: &str) -> ZfsResult<DatasetRecord> {
        self.list(&ListOptions::root(name))
            .await?
            .into_iter()
            .find(|record| record.name == name)
            .ok_or_else(|| ClassifiedError::not_found(name).into())
    }

    /// One property. Properties `zfs` reports nothing for come back empty.
    pub async fn property(&self, name: &str, property: &str) -> ZfsResult<Property> {
        let mut args = strings(&GET_COLUMNS);
        args.push(property.to_string());
        args.push(name.to_string());

        let stdout = self.run(args, Some(name)).await?;
        let record = aggregate(&stdout)?
            .into_iter()
            .find(|record| record.name == name)
            .ok_or_else(|| ClassifiedError::not_found(name))?;
        Ok(record.property(property))
    }

    pub async fn set_property(&self, name: &str, property: &str, value: &str) -> ZfsResult<()> {
        debug!(operation = "zfs_set", dataset = %name, property = %property, value = %value, "Setting property");
        let args = vec![
            "set".to_string(),
            format!("{property}={value}"),
            name.to_string(),
        ];
        self.run(args, Some(name)).await.map(drop)
    }

    /// Whether a dataset, snapshot or bookmark of that name exists.
    pub async fn exists(&self, name: &str) -> ZfsResult<bool> {
        let args = strings(&["list", "-H", "-o", "name", "-t", "all", name]);
        match self.run(args, Some(name)).await {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    pub async fn create(&self, name: &str, options: &CreateOptions) -> ZfsResult<()> {
        debug!(operation = "zfs_create", dataset = %name, properties = %format_assignments(&options.properties), "Creating dataset");
        let mut args = vec!["create".to_string()];
        if options.create_parents {
            args.push("-p".to_string());
        }
        push_assignments(&mut args, &options.properties);
        args.push(name.to_string());
        self.run(args, Some(name)).await.map(drop)
    }

    pub async fn snapshot(
        &self,
        filesystem: &str,
        snapshot: &str,
        recursive: bool,
    ) -> ZfsResult<SnapshotName> {
        let name = SnapshotName::new(filesystem, snapshot);
        let full = name.to_string();
        debug!(operation = "zfs_snapshot", snapshot = %full, recursive, "Creating snapshot");

        let mut args = vec!["snapshot".to_string()];
        if recursive {
            args.push("-r".to_string());
        }
        args.push(full.clone());
        self.run(args, Some(&full)).await?;
        Ok(name)
    }

    /// Clone `snapshot` into `target`, which must be in the same pool.
    pub async fn clone_snapshot(
        &self,
        snapshot: &str,
        target: &str,
        properties: &[(String, String)],
    ) -> ZfsResult<()> {
        let source: SnapshotName = snapshot.parse()?;
        if source.pool() != crate::name::pool_of(target) {
            return Err(ZfsError::PoolMismatch {
                snapshot: snapshot.to_string(),
                target: target.to_string(),
            });
        }

        debug!(operation = "zfs_clone", snapshot = %snapshot, clone = %target, "Creating clone");
        let mut args = vec!["clone".to_string()];
        push_assignments(&mut args, properties);
        args.push(snapshot.to_string());
        args.push(target.to_string());
        self.run(args, Some(target)).await.map(drop)
    }

    pub async fn promote(&self, clone: &str) -> ZfsResult<()> {
        debug!(operation = "zfs_promote", clone = %clone, "Promoting clone");
        self.run(strings(&["promote", clone]), Some(clone))
            .await
            .map(drop)
    }

    pub async fn destroy(&self, name: &str, scope: DestroyScope) -> ZfsResult<()> {
        debug!(operation = "zfs_destroy", dataset = %name, scope = ?scope, "Destroying dataset");
        let mut args = vec!["destroy".to_string()];
        if let Some(flag) = scope.flag() {
            args.push(flag.to_string());
        }
        args.push(name.to_string());
        self.run(args, Some(name)).await.map(drop)
    }

    /// Snapshots directly under `filesystem`, oldest first.
    pub async fn list_snapshots(&self, filesystem: &str) -> ZfsResult<Vec<String>> {
        let args = strings(&[
            "list", "-H", "-o", "name", "-t", "snapshot", "-d", "1", filesystem,
        ]);
        let stdout = self.run(args, Some(filesystem)).await?;
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Filesystems and volumes whose origin is `snapshot`.
    pub async fn list_clones(&self, snapshot: &str) -> ZfsResult<Vec<String>> {
        let source: SnapshotName = snapshot.parse()?;
        let pool = source.pool().to_string();

        let mut args = strings(&GET_COLUMNS);
        args.push("-r".to_string());
        args.push("-t".to_string());
        args.push(format!(
            "{},{}",
            DatasetType::Filesystem.as_str(),
            DatasetType::Volume.as_str()
        ));
        args.push("origin".to_string());
        args.push(pool.clone());

        let stdout = self.run(args, Some(&pool)).await?;
        Ok(aggregate(&stdout)?
            .into_iter()
            .filter(|record| record.origin() == Some(snapshot))
            .map(|record| record.name)
            .collect())
    }
}

/// Classified error for a failed command, falling back to the exit status
/// when the command printed nothing.
pub(crate) fn failure(
    command: &CommandLine,
    diagnostics: &str,
    exit: crate::exec::ProcessExit,
    dataset: Option<&str>,
) -> ClassifiedError {
    let err = if diagnostics.trim().is_empty() {
        classify(&format!("{command} exited with {exit}"))
    } else {
        classify(diagnostics)
    };
    match dataset {
        Some(dataset) => err.with_dataset(dataset),
        None => err,
    }
}

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|arg| arg.to_string()).collect()
}

fn push_assignments(args: &mut Vec<String>, properties: &[(String, String)]) {
    for (name, value) in properties {
        args.push("-o".to_string());
        args.push(format!("{name}={value}"));
    }
}
