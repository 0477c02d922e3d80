// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Which `zfs` binary to run and how to elevate it.
//!
//! Values come from an optional TOML file overlaid with `ZH_*` environment
//! variables (`ZH_ZFS_BINARY` sets `zfs-binary`).

use crate::exec::{running_as_root, Elevation, ExecContext};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ENV_PREFIX: &str = "ZH";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElevationMode {
    Direct,
    Sudo,
    /// Sudo unless already running as root.
    #[default]
    Auto,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ZfsConfig {
    pub zfs_binary: PathBuf,
    pub elevation: ElevationMode,
    pub sudo_binary: PathBuf,
}

impl Default for ZfsConfig {
    fn default() -> Self {
        Self {
            zfs_binary: PathBuf::from("zfs"),
            elevation: ElevationMode::default(),
            sudo_binary: PathBuf::from("sudo"),
        }
    }
}

impl ZfsConfig {
    /// Load from `path` (if given) and the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, environment())
    }

    /// Load from `path` (if given) and an explicit environment source.
    pub fn load_with_env(path: Option<&Path>, env: config::Environment) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(true),
            );
        }

        let built = builder
            .add_source(env)
            .build()
            .with_context(|| match path {
                Some(path) => format!("reading config file {:?}", path),
                None => "reading configuration from the environment".to_string(),
            })?;

        built
            .try_deserialize::<ZfsConfig>()
            .context("invalid zfs configuration")
    }

    /// Execution context for this process.
    pub fn exec_context(&self) -> ExecContext {
        self.exec_context_as(running_as_root())
    }

    fn exec_context_as(&self, is_root: bool) -> ExecContext {
        let elevate = match self.elevation {
            ElevationMode::Direct => false,
            ElevationMode::Sudo => true,
            ElevationMode::Auto => !is_root,
        };
        let context = ExecContext::direct(&self.zfs_binary);
        if elevate {
            context.with_elevation(Elevation::Sudo {
                program: self.sudo_binary.clone(),
            })
        } else {
            context
        }
    }
}

/// `ZH_ZFS_BINARY` maps to `zfs-binary`.
pub fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .convert_case(config::Case::Kebab)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(vars: &[(&str, &str)]) -> config::Environment {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        environment().source(Some(vars))
    }

    #[test]
    fn test_defaults() {
        let config = ZfsConfig::load_with_env(None, env(&[])).unwrap();
        assert_eq!(config, ZfsConfig::default());
        assert_eq!(config.elevation, ElevationMode::Auto);
    }

    #[test]
    fn test_file_then_env() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "zfs-binary = \"/usr/sbin/zfs\"").unwrap();
        writeln!(file, "elevation = \"sudo\"").unwrap();
        file.flush().unwrap();

        let config = ZfsConfig::load_with_env(Some(file.path()), env(&[])).unwrap();
        assert_eq!(config.zfs_binary, PathBuf::from("/usr/sbin/zfs"));
        assert_eq!(config.elevation, ElevationMode::Sudo);

        let config =
            ZfsConfig::load_with_env(Some(file.path()), env(&[("ZH_ELEVATION", "direct")]))
                .unwrap();
        assert_eq!(config.elevation, ElevationMode::Direct);
        assert_eq!(config.zfs_binary, PathBuf::from("/usr/sbin/zfs"));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(ZfsConfig::load_with_env(Some(&missing), env(&[])).is_err());
    }

    #[test]
    fn test_exec_context_resolution() {
        let auto = ZfsConfig::default();
        assert_eq!(auto.exec_context_as(true), ExecContext::direct("zfs"));
        assert_eq!(auto.exec_context_as(false), ExecContext::sudo("zfs"));

        let direct = ZfsConfig {
            elevation: ElevationMode::Direct,
            ..ZfsConfig::default()
        };
        assert_eq!(direct.exec_context_as(false).elevation, Elevation::Direct);

        let sudo = ZfsConfig {
            elevation: ElevationMode::Sudo,
            sudo_binary: PathBuf::from("/usr/bin/doas"),
            ..ZfsConfig::default()
        };
        let command = sudo.exec_context_as(true).command(["list"]);
        assert_eq!(command.program, "/usr/bin/doas");
        assert_eq!(command.args, ["-n", "zfs", "list"]);
    }
}
