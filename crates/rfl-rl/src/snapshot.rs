//! Value table snapshots
//!
//! A snapshot is a JSON document mapping each state key (one `0`/`1` per
//! channel) to the values of the actions seen in that state. Pairs that
//! were never written are omitted and read back as zero.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use rfl_core::{Result, RflError};

use crate::state::{Action, OccupancyState};
use crate::table::ValueTable;

/// On-disk snapshot document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueSnapshot {
    pub version: u32,
    pub num_channels: usize,
    pub saved_at: DateTime<Utc>,
    /// state key -> action index -> value
    pub entries: BTreeMap<String, BTreeMap<usize, f64>>,
}

impl ValueSnapshot {
    pub const VERSION: u32 = 1;

    pub fn from_table(table: &ValueTable, num_channels: usize) -> Self {
        let mut entries: BTreeMap<String, BTreeMap<usize, f64>> = BTreeMap::new();
        for (state, action, value) in table.iter() {
            entries
                .entry(state.to_key())
                .or_default()
                .insert(action.to_index(num_channels), value);
        }

        Self {
            version: Self::VERSION,
            num_channels,
            saved_at: Utc::now(),
            entries,
        }
    }

    /// Rebuild the table, rejecting anything that does not fit `num_channels`
    pub fn into_table(self, num_channels: usize) -> Result<ValueTable> {
        if self.version != Self::VERSION {
            return Err(RflError::SnapshotUnavailable(format!(
                "unsupported snapshot version {} (expected {})",
                self.version,
                Self::VERSION
            )));
        }
        if self.num_channels != num_channels {
            return Err(RflError::SnapshotUnavailable(format!(
                "snapshot was taken with {} channels, agent has {}",
                self.num_channels, num_channels
            )));
        }

        let mut table = ValueTable::new();
        for (key, actions) in self.entries {
            let state = OccupancyState::from_key(&key, num_channels).ok_or_else(|| {
                RflError::SnapshotUnavailable(format!("malformed state key {key:?}"))
            })?;
            for (index, value) in actions {
                let action = Action::from_index(index, num_channels).ok_or_else(|| {
                    RflError::SnapshotUnavailable(format!(
                        "action {index} out of range for state {key}"
                    ))
                })?;
                table.set(state.clone(), action, value);
            }
        }
        Ok(table)
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "snapshot".into());
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write every stored entry of `table` to `path`.
///
/// The document is written to a sibling temporary file and renamed into
/// place, so a crash never leaves a truncated snapshot behind.
pub fn save(table: &ValueTable, num_channels: usize, path: &Path) -> Result<()> {
    if let Some((state, action, value)) = table.iter().find(|(_, _, v)| !v.is_finite()) {
        return Err(RflError::InvalidValue(format!(
            "non-finite value {value} for ({state}, {action})"
        )));
    }

    let snapshot = ValueSnapshot::from_table(table, num_channels);
    let tmp = temp_path(path);

    let written = (|| -> Result<()> {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        serde_json::to_writer(&mut writer, &snapshot)?;
        writer.flush()?;
        Ok(())
    })();

    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }

    info!("Q-table saved to {:?} ({} entries)", path, table.len());
    Ok(())
}

/// Strict load: any missing, unreadable, or inconsistent snapshot is an error
pub fn load(path: &Path, num_channels: usize) -> Result<ValueTable> {
    let file = File::open(path).map_err(|e| {
        RflError::SnapshotUnavailable(format!("cannot open {}: {e}", path.display()))
    })?;
    let snapshot: ValueSnapshot = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
        RflError::SnapshotUnavailable(format!("corrupt snapshot {}: {e}", path.display()))
    })?;
    let table = snapshot.into_table(num_channels)?;

    info!("Q-table loaded from {:?} ({} entries)", path, table.len());
    Ok(table)
}

/// Load, or log the problem and start from an empty table
pub fn load_or_empty(path: &Path, num_channels: usize) -> ValueTable {
    match load(path, num_channels) {
        Ok(table) => table,
        Err(e) => {
            warn!("{}, starting with empty table", e);
            ValueTable::new()
        }
    }
}
