// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Classification of `zfs` diagnostic text into typed error kinds.
//!
//! The table below is evaluated top to bottom and the first match wins, so its
//! order is the precedence between overlapping messages. Receive-side
//! rejections are listed early: a `cannot receive: ...` message is reported as a
//! broken destination even when the rest of the text names another cause.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

/// Failure categories callers can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    InvalidName,
    /// Created but could not be mounted, usually for lack of privileges.
    NotMounted,
    /// The receiving side rejected or stopped reading the stream.
    BrokenPipe,
    NotAClone,
    HasDependents,
    InvalidProperty,
    Unclassified,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::NotFound => "dataset not found",
            ErrorKind::AlreadyExists => "dataset already exists",
            ErrorKind::InvalidName => "invalid dataset name",
            ErrorKind::NotMounted => "filesystem not mounted",
            ErrorKind::BrokenPipe => "destination pipe broken",
            ErrorKind::NotAClone => "not a clone",
            ErrorKind::HasDependents => "dataset has dependents",
            ErrorKind::InvalidProperty => "invalid property",
            ErrorKind::Unclassified => "zfs command failed",
        };
        f.write_str(name)
    }
}

/// Ordered `(pattern, kind)` pairs. Patterns are case-sensitive regexes matched
/// anywhere in the diagnostic text.
pub const CLASSIFICATION_TABLE: &[(&str, ErrorKind)] = &[
    (r"not a cloned filesystem", ErrorKind::NotAClone),
    (r"[Bb]roken pipe", ErrorKind::BrokenPipe),
    (r"cannot receive", ErrorKind::BrokenPipe),
    (r"failed to read from stream", ErrorKind::BrokenPipe),
    (r"invalid (dataset )?name", ErrorKind::InvalidName),
    (r"trailing slash in name", ErrorKind::InvalidName),
    (r"leading slash in name", ErrorKind::InvalidName),
    (r"empty component in name", ErrorKind::InvalidName),
    (r"invalid character '.' in name", ErrorKind::InvalidName),
    (r"multiple '@' and/or '#' delimiters in name", ErrorKind::InvalidName),
    (r"missing '@' delimiter in snapshot name", ErrorKind::InvalidName),
    (r"dataset does not exist", ErrorKind::NotFound),
    (r"could not find any snapshots to destroy", ErrorKind::NotFound),
    (r"dataset already exists", ErrorKind::AlreadyExists),
    (r"destination already exists", ErrorKind::AlreadyExists),
    (r"but it may only be mounted by root", ErrorKind::NotMounted),
    (r"filesystem successfully created, but not mounted", ErrorKind::NotMounted),
    (r"cannot mount .*: permission denied", ErrorKind::NotMounted),
    (r"umount: only root can", ErrorKind::NotMounted),
    (r"has children", ErrorKind::HasDependents),
    (r"has dependent clones", ErrorKind::HasDependents),
    (r"bad property list: invalid property", ErrorKind::InvalidProperty),
    (r"invalid property", ErrorKind::InvalidProperty),
];

static COMPILED_TABLE: Lazy<Vec<(Regex, ErrorKind)>> = Lazy::new(|| {
    CLASSIFICATION_TABLE
        .iter()
        .map(|(pattern, kind)| {
            let regex = Regex::new(pattern).expect("classification patterns are valid regexes");
            (regex, *kind)
        })
        .collect()
});

/// A diagnostic mapped onto an [`ErrorKind`], keeping the original text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub text: String,
    /// Dataset the failing operation was about, when known.
    pub dataset: Option<String>,
}

impl ClassifiedError {
    pub fn new(kind: ErrorKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            dataset: None,
        }
    }

    /// Synthesised not-found error for a dataset that failed a pre-check.
    pub fn not_found(dataset: &str) -> Self {
        Self::new(
            ErrorKind::NotFound,
            format!("cannot open '{dataset}': dataset does not exist"),
        )
        .with_dataset(dataset)
    }

    pub fn with_dataset(mut self, dataset: impl Into<String>) -> Self {
        self.dataset = Some(dataset.into());
        self
    }
}

impl std::fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = self.text.trim();
        match &self.dataset {
            Some(dataset) => write!(f, "{} ({dataset}): {text}", self.kind),
            None => write!(f, "{}: {text}", self.kind),
        }
    }
}

/// Classify diagnostic text. Total: anything unrecognised is `Unclassified`.
pub fn classify(text: &str) -> ClassifiedError {
    let kind = COMPILED_TABLE
        .iter()
        .find(|(regex, _)| regex.is_match(text))
        .map(|(_, kind)| *kind)
        .unwrap_or(ErrorKind::Unclassified);
    ClassifiedError::new(kind, text)
}
