use crate::error::MigrationError;
use connectors::entity::ChildType;
use model::strategy::{FileVersionStrategy, TableStrategy};
use std::path::PathBuf;

/// Upper bound on checkpoint scans and batched inserts so large hierarchies
/// are chunked instead of materialized.
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Caller-facing configuration for a migration run.
#[derive(Debug, Clone)]
pub struct MigrateOptions {
    /// Target storage location. The caller must be its owner.
    pub storage_location_id: i64,
    /// Checkpoint database file. Re-running against the same path resumes
    /// the previous run.
    pub db_path: PathBuf,
    /// Walk and index without mutating remote state.
    pub dry_run: bool,
    pub file_version_strategy: Option<FileVersionStrategy>,
    pub table_strategy: Option<TableStrategy>,
    /// Record individual failures and keep going instead of aborting on the
    /// first one.
    pub continue_on_error: bool,
    /// Size of the copy pool shared between entity copies and multipart
    /// part copies.
    pub thread_count: usize,
    pub batch_size: usize,
}

impl MigrateOptions {
    pub fn new(storage_location_id: i64, db_path: impl Into<PathBuf>) -> Self {
        MigrateOptions {
            storage_location_id,
            db_path: db_path.into(),
            dry_run: true,
            file_version_strategy: None,
            table_strategy: None,
            continue_on_error: false,
            thread_count: default_thread_count(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), MigrationError> {
        if self.file_version_strategy.is_none() && self.table_strategy.is_none() {
            return Err(MigrationError::Validation(
                "neither file_version_strategy nor table_strategy is set, \
                 no entities selected for migration"
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// Child types the indexer asks the service for. Folders are always
    /// walked; files and tables only when their strategy is enabled.
    pub(crate) fn include_types(&self) -> Vec<ChildType> {
        let mut types = vec![ChildType::Folder];
        if self.file_version_strategy.is_some() {
            types.push(ChildType::File);
        }
        if self.table_strategy.is_some() {
            types.push(ChildType::Table);
        }
        types
    }
}

pub fn default_thread_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
