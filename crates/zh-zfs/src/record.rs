// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Aggregation of `zfs get -H -p` dumps into per-dataset records.
//!
//! The dump is one property per line: `name property value source`. Lines for
//! the same dataset are adjacent, so records are built with a single running
//! accumulator that is flushed whenever the dataset name changes.

use crate::error::{ParseContext, ParseError, PropertyError};
use crate::property::{Property, PropertySource};
use crate::size::Size;
use serde::Serialize;
use std::collections::HashMap;

/// `type` property values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetType {
    Filesystem,
    Volume,
    Snapshot,
    Bookmark,
}

impl DatasetType {
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "filesystem" => Some(Self::Filesystem),
            "volume" => Some(Self::Volume),
            "snapshot" => Some(Self::Snapshot),
            "bookmark" => Some(Self::Bookmark),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Filesystem => "filesystem",
            Self::Volume => "volume",
            Self::Snapshot => "snapshot",
            Self::Bookmark => "bookmark",
        }
    }
}

/// All properties reported for one dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetRecord {
    pub name: String,
    pub properties: HashMap<String, Property>,
}

impl DatasetRecord {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            properties: HashMap::new(),
        }
    }

    /// Property by name; properties the dump did not contain come back empty.
    pub fn property(&self, name: &str) -> Property {
        self.properties
            .get(name)
            .cloned()
            .unwrap_or_else(|| Property::missing(name))
    }

    pub fn dataset_type(&self) -> Option<DatasetType> {
        self.properties
            .get("type")
            .and_then(|property| DatasetType::parse(&property.value))
    }

    /// Origin snapshot for clones.
    pub fn origin(&self) -> Option<&str> {
        self.properties
            .get("origin")
            .map(|property| property.value.as_str())
            .filter(|value| !value.is_empty() && *value != "-" && *value != "none")
    }

    pub fn is_clone(&self) -> bool {
        self.origin().is_some()
    }

    pub fn used(&self) -> Result<Size, PropertyError> {
        self.property("used").as_size()
    }

    pub fn available(&self) -> Result<Size, PropertyError> {
        self.property("available").as_size()
    }

    pub fn referenced(&self) -> Result<Size, PropertyError> {
        self.property("referenced").as_size()
    }

    pub fn mountpoint(&self) -> Property {
        self.property("mountpoint")
    }
}

/// Group a property dump into records, in first-seen order.
///
/// Tab-separated lines (the `-H` format) are split on tabs so sources such as
/// `inherited from tank` stay one field; other lines are split on whitespace.
/// Any line without exactly four fields fails the whole call.
pub fn aggregate(text: &str) -> Result<Vec<DatasetRecord>, ParseError> {
    let mut records = Vec::new();
    let mut current: Option<DatasetRecord> = None;

    for line in text.lines() {
        let (name, property) = parse_line(line)?;

        let starts_new = current.as_ref().map_or(true, |record| record.name != name);
        if starts_new {
            if let Some(done) = current.replace(DatasetRecord::new(name)) {
                records.push(done);
            }
        }

        if let Some(record) = current.as_mut() {
            record.properties.insert(property.name.clone(), property);
        }
    }

    if let Some(done) = current {
        records.push(done);
    }

    Ok(records)
}

fn parse_line(line: &str) -> Result<(&str, Property), ParseError> {
    let fields: Vec<&str> = if line.contains('\t') {
        line.split('\t').collect()
    } else {
        line.split_whitespace().collect()
    };

    let [name, property, value, source] = fields.as_slice() else {
        return Err(ParseError::new(
            ParseContext::PropertyDump,
            line,
            format!("expected 4 fields, found {}", fields.len()),
        ));
    };

    let source = PropertySource::parse(*source).ok_or_else(|| {
        ParseError::new(
            ParseContext::PropertyDump,
            line,
            format!("unknown property source `{source}`"),
        )
    })?;

    Ok((*name, Property::new(*property, *value, source)))
}
