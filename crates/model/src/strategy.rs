use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A strategy value that matched none of the accepted spellings.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid value {value:?} passed for {field}")]
pub struct InvalidStrategy {
    pub field: &'static str,
    pub value: String,
}

/// How file entities are migrated. Leaving the strategy unset skips file
/// entities entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileVersionStrategy {
    /// Copy the current payload and create a new entity version for it.
    New,
    /// Migrate every existing version in place.
    All,
    /// Migrate only the latest version in place.
    Latest,
}

impl FileVersionStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            FileVersionStrategy::New => "new",
            FileVersionStrategy::All => "all",
            FileVersionStrategy::Latest => "latest",
        }
    }
}

impl FromStr for FileVersionStrategy {
    type Err = InvalidStrategy;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "new" => Ok(FileVersionStrategy::New),
            "all" => Ok(FileVersionStrategy::All),
            "latest" => Ok(FileVersionStrategy::Latest),
            _ => Err(InvalidStrategy {
                field: "file_version_strategy",
                value: value.to_string(),
            }),
        }
    }
}

impl fmt::Display for FileVersionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How table attached files are migrated. Leaving the strategy unset skips
/// table entities entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableStrategy {
    /// Snapshot each table before migrating its first cell.
    Snapshot,
    /// Migrate cells without creating snapshots.
    NoSnapshot,
}

impl TableStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            TableStrategy::Snapshot => "snapshot",
            TableStrategy::NoSnapshot => "nosnapshot",
        }
    }
}

impl FromStr for TableStrategy {
    type Err = InvalidStrategy;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "snapshot" => Ok(TableStrategy::Snapshot),
            "nosnapshot" => Ok(TableStrategy::NoSnapshot),
            _ => Err(InvalidStrategy {
                field: "table_strategy",
                value: value.to_string(),
            }),
        }
    }
}

impl fmt::Display for TableStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
