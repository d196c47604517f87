use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a checkpoint row.
///
/// During a run a row only moves forward: `Indexed` into `Migrated` or
/// `Errored`. A later run against the same checkpoint may move `Errored`
/// back through the scheduler and end at `Migrated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStatus {
    Indexed,
    Migrated,
    AlreadyMigrated,
    Errored,
}

impl MigrationStatus {
    /// Integer code stored in the checkpoint file. The on-disk encoding is a
    /// resumption compatibility surface and must not change.
    pub fn code(self) -> i64 {
        match self {
            MigrationStatus::Indexed => 1,
            MigrationStatus::Migrated => 2,
            MigrationStatus::AlreadyMigrated => 3,
            MigrationStatus::Errored => 4,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(MigrationStatus::Indexed),
            2 => Some(MigrationStatus::Migrated),
            3 => Some(MigrationStatus::AlreadyMigrated),
            4 => Some(MigrationStatus::Errored),
            _ => None,
        }
    }

    /// Name used in reports and the tabular export.
    pub fn name(self) -> &'static str {
        match self {
            MigrationStatus::Indexed => "INDEXED",
            MigrationStatus::Migrated => "MIGRATED",
            MigrationStatus::AlreadyMigrated => "ALREADY_MIGRATED",
            MigrationStatus::Errored => "ERRORED",
        }
    }
}

impl fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
