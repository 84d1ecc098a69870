//! Serialized inventory snapshots.
//!
//! An [`InventorySnapshot`] freezes one inventory pass: device dimensions,
//! summary counts and every [`ElementRecord`]. Snapshots are written through
//! a [`SnapshotSink`] under a timestamped name and never read back by the
//! engine.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::introspect::ElementRecord;

/// Errors that can occur while exporting a snapshot.
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotSummary {
    pub total_elements: usize,
    pub clickable_elements: usize,
    pub editable_elements: usize,
    pub scrollable_elements: usize,
}

/// One exported inventory pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventorySnapshot {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub device_info: DeviceInfo,
    pub summary: SnapshotSummary,
    pub elements: Vec<ElementRecord>,
}

impl InventorySnapshot {
    /// Build a snapshot stamped with a new id and the current time.
    pub fn new(device_info: DeviceInfo, elements: Vec<ElementRecord>) -> Self {
        let count = |f: fn(&crate::introspect::ElementInfo) -> bool| {
            elements.iter().filter_map(ElementRecord::info).filter(|i| f(i)).count()
        };
        let summary = SnapshotSummary {
            total_elements: elements.len(),
            clickable_elements: count(|i| i.clickable),
            editable_elements: count(|i| i.editable),
            scrollable_elements: count(|i| i.scrollable),
        };
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            device_info,
            summary,
            elements,
        }
    }

    /// File name derived from the snapshot timestamp.
    pub fn file_name(&self) -> String {
        format!("ui_elements_{}.json", self.timestamp.timestamp_millis())
    }

    /// Pretty-printed JSON rendering.
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Destination for exported snapshots.
pub trait SnapshotSink: Send + Sync {
    /// Write `contents` under `name`, returning where it ended up.
    fn write(&self, name: &str, contents: &str) -> Result<String, SnapshotError>;
}

/// Writes snapshots as files into a directory, creating it on demand.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }
}

impl SnapshotSink for DirectorySink {
    fn write(&self, name: &str, contents: &str) -> Result<String, SnapshotError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(name);
        std::fs::write(&path, contents)?;
        Ok(path.display().to_string())
    }
}

/// Serialize and write a snapshot through `sink`.
pub fn export(sink: &dyn SnapshotSink, snapshot: &InventorySnapshot) -> Result<String, SnapshotError> {
    let json = snapshot.to_json()?;
    sink.write(&snapshot.file_name(), &json)
}
