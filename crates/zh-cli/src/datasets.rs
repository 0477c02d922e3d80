// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Dataset subcommands.

use crate::output::{render_property, render_table};
use crate::parse_assignment;
use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use zh_zfs::{CreateOptions, DatasetType, DestroyScope, ListOptions, Zfs};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum TypeArg {
    Filesystem,
    Volume,
    Snapshot,
    Bookmark,
}

impl From<TypeArg> for DatasetType {
    fn from(kind: TypeArg) -> Self {
        match kind {
            TypeArg::Filesystem => DatasetType::Filesystem,
            TypeArg::Volume => DatasetType::Volume,
            TypeArg::Snapshot => DatasetType::Snapshot,
            TypeArg::Bookmark => DatasetType::Bookmark,
        }
    }
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Include descendants
    #[arg(short = 'r', long)]
    pub recursive: bool,
    /// Limit recursion depth
    #[arg(short = 'd', long)]
    pub depth: Option<u32>,
    /// Only these dataset types
    #[arg(short = 't', long = "type", value_enum)]
    pub types: Vec<TypeArg>,
    /// Print records as JSON
    #[arg(long)]
    pub json: bool,
    /// Datasets to list; all pools when omitted
    pub roots: Vec<String>,
}

impl ListArgs {
    pub fn options(&self) -> ListOptions {
        ListOptions {
            recursive: self.recursive,
            depth: self.depth,
            types: self.types.iter().copied().map(DatasetType::from).collect(),
            roots: self.roots.clone(),
        }
    }

    pub async fn run(self, zfs: &Zfs) -> Result<()> {
        let records = zfs.list(&self.options()).await?;
        if self.json {
            println!("{}", serde_json::to_string_pretty(&records)?);
        } else {
            print!("{}", render_table(&records));
        }
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct GetArgs {
    pub name: String,
    pub property: String,
}

impl GetArgs {
    pub async fn run(self, zfs: &Zfs) -> Result<()> {
        let property = zfs.property(&self.name, &self.property).await?;
        println!("{}", render_property(&self.name, &property));
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct SetArgs {
    pub name: String,
    pub property: String,
    pub value: String,
}

impl SetArgs {
    pub async fn run(self, zfs: &Zfs) -> Result<()> {
        zfs.set_property(&self.name, &self.property, &self.value)
            .await
            .with_context(|| format!("setting {} on {}", self.property, self.name))?;
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Create missing parent datasets
    #[arg(short = 'p')]
    pub parents: bool,
    /// Property to set at creation, repeatable
    #[arg(short = 'o', value_name = "NAME=VALUE", value_parser = parse_assignment)]
    pub properties: Vec<(String, String)>,
    pub name: String,
}

impl CreateArgs {
    pub async fn run(self, zfs: &Zfs) -> Result<()> {
        let options = CreateOptions {
            create_parents: self.parents,
            properties: self.properties,
        };
        zfs.create(&self.name, &options).await?;
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct SnapshotArgs {
    /// Snapshot descendants too
    #[arg(short = 'r')]
    pub recursive: bool,
    pub filesystem: String,
    pub snapshot: String,
}

impl SnapshotArgs {
    pub async fn run(self, zfs: &Zfs) -> Result<()> {
        let name = zfs
            .snapshot(&self.filesystem, &self.snapshot, self.recursive)
            .await?;
        println!("{name}");
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct CloneArgs {
    /// Property to set on the clone, repeatable
    #[arg(short = 'o', value_name = "NAME=VALUE", value_parser = parse_assignment)]
    pub properties: Vec<(String, String)>,
    pub snapshot: String,
    pub target: String,
}

impl CloneArgs {
    pub async fn run(self, zfs: &Zfs) -> Result<()> {
        zfs.clone_snapshot(&self.snapshot, &self.target, &self.properties)
            .await?;
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct PromoteArgs {
    pub clone: String,
}

impl PromoteArgs {
    pub async fn run(self, zfs: &Zfs) -> Result<()> {
        zfs.promote(&self.clone).await?;
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct DestroyArgs {
    /// Destroy children
    #[arg(short = 'r', conflicts_with = "dependents")]
    pub recursive: bool,
    /// Destroy children and dependents such as clones
    #[arg(short = 'R')]
    pub dependents: bool,
    pub name: String,
}

impl DestroyArgs {
    pub fn scope(&self) -> DestroyScope {
        if self.dependents {
            DestroyScope::RecursiveDependents
        } else if self.recursive {
            DestroyScope::Recursive
        } else {
            DestroyScope::Single
        }
    }

    pub async fn run(self, zfs: &Zfs) -> Result<()> {
        zfs.destroy(&self.name, self.scope()).await?;
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct SnapshotsArgs {
    pub filesystem: String,
}

impl SnapshotsArgs {
    pub async fn run(self, zfs: &Zfs) -> Result<()> {
        for snapshot in zfs.list_snapshots(&self.filesystem).await? {
            println!("{snapshot}");
        }
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct ClonesArgs {
    pub snapshot: String,
}

impl ClonesArgs {
    pub async fn run(self, zfs: &Zfs) -> Result<()> {
        for clone in zfs.list_clones(&self.snapshot).await? {
            println!("{clone}");
        }
        Ok(())
    }
}
