// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Error types for ZFS operations

use crate::classify::{ClassifiedError, ErrorKind};
use thiserror::Error;

/// Result type alias for ZFS operations
pub type ZfsResult<T> = std::result::Result<T, ZfsError>;

/// Errors that can occur while driving the `zfs` CLI
#[derive(Debug, Error)]
pub enum ZfsError {
    /// Output of a trusted collaborator did not have the expected shape.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The subprocess failed and its diagnostic text was classified.
    #[error(transparent)]
    Classified(#[from] ClassifiedError),

    /// I/O failure on a pipe or while spawning, distinct from a diagnostic.
    #[error("stream error: {0}")]
    Stream(#[from] std::io::Error),

    #[error("cannot clone {snapshot} into {target}: clones must live in the same pool")]
    PoolMismatch { snapshot: String, target: String },

    #[error(transparent)]
    Property(#[from] PropertyError),
}

impl ZfsError {
    /// Classified kind, if this error came from a classified diagnostic.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            ZfsError::Classified(err) => Some(err.kind),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == Some(ErrorKind::NotFound)
    }
}

/// Which input a [`ParseError`] was raised for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseContext {
    PropertyDump,
    ProgressHeader,
    ProgressReport,
}

impl std::fmt::Display for ParseContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseContext::PropertyDump => write!(f, "property dump"),
            ParseContext::ProgressHeader => write!(f, "send progress header"),
            ParseContext::ProgressReport => write!(f, "send progress report"),
        }
    }
}

/// Offending line plus the reason it could not be scanned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed {context} line `{line}`: {reason}")]
pub struct ParseError {
    pub context: ParseContext,
    pub line: String,
    pub reason: String,
}

impl ParseError {
    pub(crate) fn new(context: ParseContext, line: &str, reason: impl Into<String>) -> Self {
        Self {
            context,
            line: line.to_string(),
            reason: reason.into(),
        }
    }
}

/// Failures of the typed property accessors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PropertyError {
    #[error("value of '{name}' is 'none'")]
    None { name: String },

    #[error("value of '{name}' is not set")]
    Empty { name: String },

    #[error("value of '{name}' is not 'on' or 'off': '{value}'")]
    NotBool { name: String, value: String },

    #[error("can't convert value of '{name}' to a 64-bit integer: '{value}'")]
    NotInteger { name: String, value: String },

    #[error("value of '{name}' is out of range for a timestamp: '{value}'")]
    OutOfRange { name: String, value: String },
}
