use crate::error::MigrationError;
use connectors::client::EntityClient;
use engine_core::checkpoint::{CheckpointStore, OutcomeRow};
use model::key::MigrationType;
use serde::Serialize;
use std::{
    collections::{HashMap, VecDeque},
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::debug;

/// Column order of the tabular export.
const REPORT_HEADER: [&str; 10] = [
    "id",
    "type",
    "version",
    "row_id",
    "col_name",
    "from_storage_location_id",
    "from_file_handle_id",
    "to_file_handle_id",
    "status",
    "exception",
];

/// Summary of a completed (or dry) run, with lazy access to the per-row
/// outcomes still sitting in the checkpoint file.
///
/// Outcomes are streamed from the store rather than materialized: a
/// migration of millions of entities reports through the same fixed memory.
pub struct MigrationResult {
    client: Arc<dyn EntityClient>,
    pub db_path: PathBuf,
    pub indexed_total: u64,
    pub migrated_total: u64,
    pub error_total: u64,
    batch_size: usize,
}

impl std::fmt::Debug for MigrationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationResult")
            .field("db_path", &self.db_path)
            .field("indexed_total", &self.indexed_total)
            .field("migrated_total", &self.migrated_total)
            .field("error_total", &self.error_total)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

/// One payload row as reported to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationRecord {
    pub id: String,
    /// `"file"` or `"table"`.
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub version: Option<i64>,
    pub row_id: Option<i64>,
    pub col_name: Option<String>,
    pub from_storage_location_id: Option<i64>,
    pub from_file_handle_id: Option<String>,
    pub to_file_handle_id: Option<String>,
    /// Status name, e.g. `"MIGRATED"`.
    pub status: &'static str,
    pub exception: Option<String>,
}

impl MigrationResult {
    pub(crate) fn new(
        client: Arc<dyn EntityClient>,
        db_path: PathBuf,
        indexed_total: u64,
        migrated_total: u64,
        error_total: u64,
        batch_size: usize,
    ) -> Self {
        MigrationResult {
            client,
            db_path,
            indexed_total,
            migrated_total,
            error_total,
            batch_size,
        }
    }

    /// Open a streaming cursor over the payload outcomes.
    pub fn migrations(&self) -> Result<ResultCursor<'_>, MigrationError> {
        let store = CheckpointStore::open_read_only(&self.db_path)?;
        Ok(ResultCursor {
            client: self.client.as_ref(),
            store,
            last_rowid: 0,
            buffer: VecDeque::new(),
            column_names: HashMap::new(),
            batch_size: self.batch_size,
        })
    }

    /// Write every payload outcome to a plain-text tabular file with a fixed
    /// header row. Missing fields are left empty.
    pub async fn export_csv(&self, path: impl AsRef<Path>) -> Result<(), MigrationError> {
        let path = path.as_ref();
        let mut cursor = self.migrations()?;
        let mut writer = csv::Writer::from_path(path)?;

        writer.write_record(REPORT_HEADER)?;
        let mut rows = 0u64;
        while let Some(record) = cursor.try_next().await? {
            writer.write_record([
                record.id.clone(),
                record.kind.to_string(),
                opt_field(record.version),
                opt_field(record.row_id),
                record.col_name.clone().unwrap_or_default(),
                opt_field(record.from_storage_location_id),
                record.from_file_handle_id.clone().unwrap_or_default(),
                record.to_file_handle_id.clone().unwrap_or_default(),
                record.status.to_string(),
                record.exception.clone().unwrap_or_default(),
            ])?;
            rows += 1;
        }
        writer.flush()?;
        debug!(path = %path.display(), rows, "report written");
        Ok(())
    }
}

fn opt_field<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Pull-based iterator over payload outcomes, paging the checkpoint by its
/// internal row order. Column names are resolved through the client on first
/// use and memoized for the life of the cursor.
pub struct ResultCursor<'a> {
    client: &'a dyn EntityClient,
    store: CheckpointStore,
    last_rowid: i64,
    buffer: VecDeque<OutcomeRow>,
    column_names: HashMap<i64, String>,
    batch_size: usize,
}

impl ResultCursor<'_> {
    pub async fn try_next(&mut self) -> Result<Option<MigrationRecord>, MigrationError> {
        if self.buffer.is_empty() {
            let page = self.store.scan_outcomes(self.last_rowid, self.batch_size)?;
            if let Some(last) = page.last() {
                self.last_rowid = last.rowid;
            }
            self.buffer.extend(page);
        }

        match self.buffer.pop_front() {
            Some(row) => Ok(Some(self.record(row).await?)),
            None => Ok(None),
        }
    }

    async fn record(&mut self, row: OutcomeRow) -> Result<MigrationRecord, MigrationError> {
        let col_name = match row.key.col_id {
            Some(col_id) => Some(self.column_name(col_id).await?),
            None => None,
        };
        Ok(MigrationRecord {
            id: row.key.id,
            kind: match row.key.kind {
                MigrationType::TableAttachedFile => "table",
                _ => "file",
            },
            version: row.key.version,
            row_id: row.key.row_id,
            col_name,
            from_storage_location_id: row.from_storage_location_id,
            from_file_handle_id: row.from_file_handle_id,
            to_file_handle_id: row.to_file_handle_id,
            status: row.status.name(),
            exception: row.exception,
        })
    }

    async fn column_name(&mut self, col_id: i64) -> Result<String, MigrationError> {
        if let Some(name) = self.column_names.get(&col_id) {
            return Ok(name.clone());
        }
        let column = self.client.get_column(col_id).await?;
        self.column_names.insert(col_id, column.name.clone());
        Ok(column.name)
    }
}
