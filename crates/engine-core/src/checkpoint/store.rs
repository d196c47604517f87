use crate::checkpoint::models::{OutcomeRow, PendingItem, ScanCursor, WorkItem};
use crate::error::CheckpointError;
use model::{
    key::{MigrationKey, MigrationType},
    status::MigrationStatus,
};
use rusqlite::{Connection, OpenFlags, params};
use std::path::Path;
use tracing::debug;

/// Flat table of work items: one row per discovered payload plus one marker
/// row per fully walked container. The composite primary key keeps a resumed
/// index run from double-inserting, and the integer status/type codes are a
/// compatibility surface for resuming against an existing file.
const SCHEMA: &str = "
    create table if not exists migrations (
        id text not null,
        type integer not null,
        version integer null,
        row_id integer null,
        col_id integer null,

        parent_id text null,
        status integer not null,
        exception text null,

        from_storage_location_id integer null,
        from_file_handle_id text null,
        to_file_handle_id text null,

        primary key (id, type, row_id, col_id, version)
    )
";

const INSERT: &str = "
    insert or ignore into migrations (
        id, type, version, row_id, col_id,
        parent_id, status,
        from_storage_location_id, from_file_handle_id
    ) values (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
";

// Strictly-greater-than on the composite key (id, type, row_id, col_id,
// version), with the cursor's absent components already substituted by the
// -1 sentinel. Work on one entity id stays contiguous under this order.
const NEXT_PENDING: &str = "
    select id, type, version, row_id, col_id, from_file_handle_id
    from migrations
    where status = ?1
      and ((id > ?2 and type in (?3, ?4))
          or (id = ?2 and type = ?3 and version is not null and version > ?5)
          or (id = ?2 and type = ?4
              and (row_id > ?6 or (row_id = ?6 and col_id > ?7))))
    order by id, type, row_id, col_id, version
    limit ?8
";

// Null key components are matched null-safely with IS.
const UPDATE_OUTCOME: &str = "
    update migrations set
        status = ?1,
        to_file_handle_id = ?2,
        exception = ?3
    where id = ?4
      and type = ?5
      and version is ?6
      and row_id is ?7
      and col_id is ?8
";

const SCAN_OUTCOMES: &str = "
    select rowid, id, type, version, row_id, col_id,
           from_storage_location_id, from_file_handle_id, to_file_handle_id,
           status, exception
    from migrations
    where rowid > ?1 and type in (?2, ?3)
    order by rowid
    limit ?4
";

/// Durable, single-writer work plan backed by an embedded SQLite file.
///
/// The scheduler is the only mutator once indexing is done; worker tasks
/// never touch the connection. Each outcome update is committed on its own
/// so a crash loses at most one in-flight outcome.
pub struct CheckpointStore {
    conn: Connection,
}

impl CheckpointStore {
    /// Open or create the checkpoint file and ensure the schema exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CheckpointError> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|source| CheckpointError::Open {
            path: path.display().to_string(),
            source,
        })?;
        conn.execute(SCHEMA, [])?;
        debug!(path = %path.display(), "checkpoint open");
        Ok(CheckpointStore { conn })
    }

    /// Open an existing checkpoint without taking the writer role.
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self, CheckpointError> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY).map_err(
            |source| CheckpointError::Open {
                path: path.display().to_string(),
                source,
            },
        )?;
        Ok(CheckpointStore { conn })
    }

    /// Insert a batch of rows in one transaction, ignoring primary-key
    /// conflicts so a resumed run can replay its discovery safely. Returns
    /// the number of rows actually inserted.
    pub fn insert_work_items(&mut self, items: &[WorkItem]) -> Result<usize, CheckpointError> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare_cached(INSERT)?;
            for item in items {
                inserted += stmt.execute(params![
                    item.key.id,
                    item.key.kind.code(),
                    item.key.version,
                    item.key.row_id,
                    item.key.col_id,
                    item.parent_id,
                    item.status.code(),
                    item.from_storage_location_id,
                    item.from_file_handle_id,
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// True iff any row for the entity id has reached `INDEXED`. Used by the
    /// indexer to skip subtrees that were walked by an earlier run.
    pub fn has_indexed(&self, entity_id: &str) -> Result<bool, CheckpointError> {
        let mut stmt = self
            .conn
            .prepare_cached("select 1 from migrations where id = ?1 and status >= ?2 limit 1")?;
        Ok(stmt.exists(params![entity_id, MigrationStatus::Indexed.code()])?)
    }

    /// The next batch of `INDEXED` payload rows strictly after the cursor,
    /// in composite key order.
    pub fn next_pending(
        &self,
        cursor: &ScanCursor,
        limit: usize,
    ) -> Result<Vec<PendingItem>, CheckpointError> {
        let mut stmt = self.conn.prepare_cached(NEXT_PENDING)?;
        let rows = stmt.query_map(
            params![
                MigrationStatus::Indexed.code(),
                cursor.id,
                MigrationType::File.code(),
                MigrationType::TableAttachedFile.code(),
                cursor.version,
                cursor.row_id,
                cursor.col_id,
                limit as i64,
            ],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, Option<i64>>(2)?,
                    row.get::<_, Option<i64>>(3)?,
                    row.get::<_, Option<i64>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                ))
            },
        )?;

        let mut items = Vec::new();
        for row in rows {
            let (id, type_code, version, row_id, col_id, from_file_handle_id) = row?;
            items.push(PendingItem {
                key: decode_key(id, type_code, version, row_id, col_id)?,
                from_file_handle_id,
            });
        }
        Ok(items)
    }

    /// Send previously errored rows through the scheduler again by moving
    /// them back to `INDEXED`. Returns the number of rows reset.
    pub fn reset_errored(&self) -> Result<usize, CheckpointError> {
        let mut stmt = self.conn.prepare_cached(
            "update migrations set status = ?1, exception = null where status = ?2",
        )?;
        Ok(stmt.execute(params![
            MigrationStatus::Indexed.code(),
            MigrationStatus::Errored.code(),
        ])?)
    }

    /// Record the final state of exactly one row. Autocommits, making the
    /// outcome durable before the scheduler moves on.
    pub fn record_outcome(
        &self,
        key: &MigrationKey,
        status: MigrationStatus,
        to_file_handle_id: Option<&str>,
        exception: Option<&str>,
    ) -> Result<(), CheckpointError> {
        let mut stmt = self.conn.prepare_cached(UPDATE_OUTCOME)?;
        let affected = stmt.execute(params![
            status.code(),
            to_file_handle_id,
            exception,
            key.id,
            key.kind.code(),
            key.version,
            key.row_id,
            key.col_id,
        ])?;
        if affected != 1 {
            return Err(CheckpointError::MissingRow(key.to_string()));
        }
        Ok(())
    }

    /// Page of payload rows in internal row order, for the result cursor.
    pub fn scan_outcomes(
        &self,
        after_rowid: i64,
        limit: usize,
    ) -> Result<Vec<OutcomeRow>, CheckpointError> {
        let mut stmt = self.conn.prepare_cached(SCAN_OUTCOMES)?;
        let rows = stmt.query_map(
            params![
                after_rowid,
                MigrationType::File.code(),
                MigrationType::TableAttachedFile.code(),
                limit as i64,
            ],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, Option<i64>>(3)?,
                    row.get::<_, Option<i64>>(4)?,
                    row.get::<_, Option<i64>>(5)?,
                    row.get::<_, Option<i64>>(6)?,
                    row.get::<_, Option<String>>(7)?,
                    row.get::<_, Option<String>>(8)?,
                    row.get::<_, i64>(9)?,
                    row.get::<_, Option<String>>(10)?,
                ))
            },
        )?;

        let mut outcomes = Vec::new();
        for row in rows {
            let (
                rowid,
                id,
                type_code,
                version,
                row_id,
                col_id,
                from_storage_location_id,
                from_file_handle_id,
                to_file_handle_id,
                status_code,
                exception,
            ) = row?;
            outcomes.push(OutcomeRow {
                rowid,
                key: decode_key(id, type_code, version, row_id, col_id)?,
                from_storage_location_id,
                from_file_handle_id,
                to_file_handle_id,
                status: MigrationStatus::from_code(status_code).ok_or_else(|| {
                    CheckpointError::Corrupt(format!("unknown status code {status_code}"))
                })?,
                exception,
            });
        }
        Ok(outcomes)
    }
}

fn decode_key(
    id: String,
    type_code: i64,
    version: Option<i64>,
    row_id: Option<i64>,
    col_id: Option<i64>,
) -> Result<MigrationKey, CheckpointError> {
    let kind = MigrationType::from_code(type_code)
        .ok_or_else(|| CheckpointError::Corrupt(format!("unknown type code {type_code}")))?;
    Ok(MigrationKey {
        id,
        kind,
        version,
        row_id,
        col_id,
    })
}
