use model::{key::MigrationKey, status::MigrationStatus};

/// A fully populated checkpoint row as written by the indexer.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub key: MigrationKey,
    pub parent_id: Option<String>,
    pub status: MigrationStatus,
    pub from_storage_location_id: Option<i64>,
    pub from_file_handle_id: Option<String>,
}

impl WorkItem {
    /// Index-only marker row for a walked container.
    pub fn container_marker(key: MigrationKey, parent_id: Option<String>) -> Self {
        WorkItem {
            key,
            parent_id,
            status: MigrationStatus::Indexed,
            from_storage_location_id: None,
            from_file_handle_id: None,
        }
    }
}

/// A pending payload row handed to the scheduler.
#[derive(Debug, Clone)]
pub struct PendingItem {
    pub key: MigrationKey,
    pub from_file_handle_id: Option<String>,
}

/// Scan position over the composite key order.
///
/// Absent key components are substituted with a `-1` sentinel so the range
/// predicate stays closed under plain SQL comparison; the resulting order is
/// the same "absent sorts first" total order the scheduler requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanCursor {
    pub id: String,
    pub version: i64,
    pub row_id: i64,
    pub col_id: i64,
}

impl ScanCursor {
    pub const SENTINEL: i64 = -1;

    /// Position strictly before every real key.
    pub fn start() -> Self {
        ScanCursor {
            id: String::new(),
            version: Self::SENTINEL,
            row_id: Self::SENTINEL,
            col_id: Self::SENTINEL,
        }
    }

    /// Move the cursor to the given dispatched key.
    pub fn advance(&mut self, key: &MigrationKey) {
        self.id.clone_from(&key.id);
        self.version = key.version.unwrap_or(Self::SENTINEL);
        self.row_id = key.row_id.unwrap_or(Self::SENTINEL);
        self.col_id = key.col_id.unwrap_or(Self::SENTINEL);
    }
}

/// A payload row read back for reporting.
#[derive(Debug, Clone)]
pub struct OutcomeRow {
    /// Internal store rowid, used only to page the result cursor.
    pub rowid: i64,
    pub key: MigrationKey,
    pub from_storage_location_id: Option<i64>,
    pub from_file_handle_id: Option<String>,
    pub to_file_handle_id: Option<String>,
    pub status: MigrationStatus,
    pub exception: Option<String>,
}
