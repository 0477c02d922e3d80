// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Dataset properties as reported by `zfs get`.

use crate::error::PropertyError;
use crate::size::Size;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Where a property value comes from (the `source` column of `zfs get`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertySource {
    Local,
    Default,
    Inherited,
    Received,
    Temporary,
    /// `-`: internal or read-only property without an external source.
    Unset,
}

impl PropertySource {
    /// Parse the source column; `None` for text `zfs` never prints.
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "local" => Some(Self::Local),
            "default" => Some(Self::Default),
            "inherited" | "inherit" => Some(Self::Inherited),
            "received" => Some(Self::Received),
            "temporary" => Some(Self::Temporary),
            "-" => Some(Self::Unset),
            other if other.starts_with("inherited from ") => Some(Self::Inherited),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Default => "default",
            Self::Inherited => "inherited",
            Self::Received => "received",
            Self::Temporary => "temporary",
            Self::Unset => "-",
        }
    }
}

/// A single dataset property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Property {
    pub name: String,
    /// Empty only when the property is not set at all.
    pub value: String,
    pub source: PropertySource,
}

impl Property {
    pub fn new(name: impl Into<String>, value: impl Into<String>, source: PropertySource) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            source,
        }
    }

    /// Placeholder returned for properties a record does not carry.
    pub fn missing(name: impl Into<String>) -> Self {
        Self::new(name, "", PropertySource::Unset)
    }

    pub fn is_read_only(&self) -> bool {
        self.source == PropertySource::Unset
    }

    pub fn is_default(&self) -> bool {
        self.source == PropertySource::Default
    }

    /// `none` is the value `zfs` uses for an explicitly cleared property.
    pub fn is_none(&self) -> bool {
        self.value == "none"
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    pub fn as_bool(&self) -> Result<bool, PropertyError> {
        match self.value.as_str() {
            "on" => Ok(true),
            "off" => Ok(false),
            _ => Err(PropertyError::NotBool {
                name: self.name.clone(),
                value: self.value.clone(),
            }),
        }
    }

    pub fn as_i64(&self) -> Result<i64, PropertyError> {
        if self.is_none() {
            return Err(PropertyError::None {
                name: self.name.clone(),
            });
        }
        if self.is_empty() {
            return Err(PropertyError::Empty {
                name: self.name.clone(),
            });
        }
        self.value.parse::<i64>().map_err(|_| PropertyError::NotInteger {
            name: self.name.clone(),
            value: self.value.clone(),
        })
    }

    pub fn as_size(&self) -> Result<Size, PropertyError> {
        self.as_i64().map(Size)
    }

    /// Interpret the value as unix seconds (`creation` in `-p` mode).
    pub fn as_time(&self) -> Result<DateTime<Utc>, PropertyError> {
        let seconds = self.as_i64()?;
        DateTime::from_timestamp(seconds, 0).ok_or_else(|| PropertyError::OutOfRange {
            name: self.name.clone(),
            value: self.value.clone(),
        })
    }
}

/// Render `name=value` pairs the way `zfs` accepts them in `-o` lists.
pub fn format_assignments(properties: &[(String, String)]) -> String {
    properties
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join(",")
}
