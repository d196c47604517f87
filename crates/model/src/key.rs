use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Concrete kind of a checkpoint work item.
///
/// Container kinds (projects and folders) only exist as indexing markers so a
/// later run can skip subtrees that were already fully walked. Files and
/// table attached files carry the payloads that actually move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationType {
    Project,
    Folder,
    File,
    TableAttachedFile,
}

impl MigrationType {
    /// Integer code stored in the checkpoint file. The on-disk encoding is a
    /// resumption compatibility surface and must not change.
    pub fn code(self) -> i64 {
        match self {
            MigrationType::Project => 1,
            MigrationType::Folder => 2,
            MigrationType::File => 3,
            MigrationType::TableAttachedFile => 4,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(MigrationType::Project),
            2 => Some(MigrationType::Folder),
            3 => Some(MigrationType::File),
            4 => Some(MigrationType::TableAttachedFile),
            _ => None,
        }
    }

    /// True for the kinds that represent actual payload migrations.
    pub fn is_payload(self) -> bool {
        matches!(self, MigrationType::File | MigrationType::TableAttachedFile)
    }
}

/// Composite identity of one unit of migration work.
///
/// `version` discriminates file entity versions, `row_id`/`col_id`
/// discriminate table attached files. Absent components are part of the
/// identity: a FILE row with no version stands for "create a new version".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MigrationKey {
    pub id: String,
    pub kind: MigrationType,
    pub version: Option<i64>,
    pub row_id: Option<i64>,
    pub col_id: Option<i64>,
}

impl MigrationKey {
    pub fn container(id: impl Into<String>, kind: MigrationType) -> Self {
        MigrationKey {
            id: id.into(),
            kind,
            version: None,
            row_id: None,
            col_id: None,
        }
    }

    pub fn file(id: impl Into<String>, version: Option<i64>) -> Self {
        MigrationKey {
            id: id.into(),
            kind: MigrationType::File,
            version,
            row_id: None,
            col_id: None,
        }
    }

    pub fn table_cell(id: impl Into<String>, row_id: i64, col_id: i64, row_version: i64) -> Self {
        MigrationKey {
            id: id.into(),
            kind: MigrationType::TableAttachedFile,
            version: Some(row_version),
            row_id: Some(row_id),
            col_id: Some(col_id),
        }
    }
}

/// Total order used by the scheduler: `(id, kind, row_id, col_id, version)`
/// with absent components ordering below present ones. Work for one entity id
/// clusters contiguously under this order.
impl Ord for MigrationKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id
            .cmp(&other.id)
            .then_with(|| self.kind.cmp(&other.kind))
            .then_with(|| self.row_id.cmp(&other.row_id))
            .then_with(|| self.col_id.cmp(&other.col_id))
            .then_with(|| self.version.cmp(&other.version))
    }
}

impl PartialOrd for MigrationKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for MigrationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)?;
        if let Some(version) = self.version {
            write!(f, " v{version}")?;
        }
        if let (Some(row_id), Some(col_id)) = (self.row_id, self.col_id) {
            write!(f, " cell ({row_id}, {col_id})")?;
        }
        Ok(())
    }
}
