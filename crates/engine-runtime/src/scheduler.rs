use crate::{
    error::{MigrationError, error_trace},
    operations::{self, TaskError},
    options::MigrateOptions,
};
use connectors::{client::EntityClient, copy_pool::CopyPool};
use engine_core::checkpoint::{CheckpointStore, PendingItem, ScanCursor};
use futures::{StreamExt, stream::FuturesUnordered};
use model::{
    key::{MigrationKey, MigrationType},
    status::MigrationStatus,
    strategy::TableStrategy,
};
use std::sync::Arc;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info};

type TaskResult = Result<(MigrationKey, String), TaskError>;

/// Counters accumulated by one scheduling pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScheduleTotals {
    pub migrated: u64,
    pub errored: u64,
}

/// Phase two: stream `INDEXED` rows in composite key order and execute them
/// on a bounded number of concurrent copy tasks.
///
/// The scheduler itself is single-threaded and is the only writer to the
/// checkpoint. Tasks complete in arbitrary order; each completion is settled
/// onto exactly the row its key names, and committed before more work is
/// dispatched.
pub struct MigrationScheduler<'a> {
    client: Arc<dyn EntityClient>,
    pool: CopyPool,
    options: &'a MigrateOptions,
}

impl<'a> MigrationScheduler<'a> {
    pub fn new(client: Arc<dyn EntityClient>, pool: CopyPool, options: &'a MigrateOptions) -> Self {
        MigrationScheduler {
            client,
            pool,
            options,
        }
    }

    pub async fn run(&self, store: &mut CheckpointStore) -> Result<ScheduleTotals, MigrationError> {
        let max_in_flight = self.pool.max_concurrent_copies();
        let mut in_flight: FuturesUnordered<JoinHandle<TaskResult>> = FuturesUnordered::new();
        let mut cursor = ScanCursor::start();
        let mut last_dispatched_id: Option<String> = None;
        let mut totals = ScheduleTotals::default();
        let mut fatal: Option<MigrationError> = None;

        info!(max_in_flight, "migration scheduler starting");

        'dispatch: loop {
            let batch = store.next_pending(&cursor, self.options.batch_size)?;
            if batch.is_empty() {
                break;
            }

            for item in batch {
                // wait-any: make room before dispatching the next task
                while in_flight.len() >= max_in_flight {
                    let Some(joined) = in_flight.next().await else {
                        break;
                    };
                    if let Some(err) = self.settle(store, joined, &mut totals)? {
                        fatal = Some(err);
                        break 'dispatch;
                    }
                }

                if item.key.kind == MigrationType::TableAttachedFile
                    && self.options.table_strategy == Some(TableStrategy::Snapshot)
                    && last_dispatched_id.as_deref() != Some(item.key.id.as_str())
                {
                    // one snapshot per table, before its first cell copy;
                    // key clustering by entity id makes this check sufficient
                    debug!(table = %item.key.id, "creating table snapshot");
                    if let Err(err) = self.client.create_snapshot(&item.key.id).await {
                        fatal = Some(err.into());
                        break 'dispatch;
                    }
                }

                last_dispatched_id = Some(item.key.id.clone());
                cursor.advance(&item.key);
                match self.spawn(item) {
                    Ok(handle) => in_flight.push(handle),
                    Err(err) => {
                        fatal = Some(err);
                        break 'dispatch;
                    }
                }
            }
        }

        // wait-all: in-flight tasks are allowed to finish and their outcomes
        // are recorded even when the run is about to abort
        while let Some(joined) = in_flight.next().await {
            if let Some(err) = self.settle(store, joined, &mut totals)? {
                fatal.get_or_insert(err);
            }
        }

        if let Some(err) = fatal {
            return Err(err);
        }
        info!(
            migrated = totals.migrated,
            errored = totals.errored,
            "migration scheduler done"
        );
        Ok(totals)
    }

    /// Record one completed task on its checkpoint row. Returns the error to
    /// abort with when `continue_on_error` is off.
    fn settle(
        &self,
        store: &CheckpointStore,
        joined: Result<TaskResult, JoinError>,
        totals: &mut ScheduleTotals,
    ) -> Result<Option<MigrationError>, MigrationError> {
        match joined? {
            Ok((key, to_file_handle_id)) => {
                store.record_outcome(
                    &key,
                    MigrationStatus::Migrated,
                    Some(&to_file_handle_id),
                    None,
                )?;
                totals.migrated += 1;
                debug!(%key, %to_file_handle_id, "migrated");
                Ok(None)
            }
            Err(TaskError { key, cause }) => {
                let trace = error_trace(&cause);
                store.record_outcome(&key, MigrationStatus::Errored, None, Some(&trace))?;
                totals.errored += 1;
                error!(%key, error = %cause, "migration failed");
                if self.options.continue_on_error {
                    Ok(None)
                } else {
                    Ok(Some(MigrationError::Client(cause)))
                }
            }
        }
    }

    fn spawn(&self, item: PendingItem) -> Result<JoinHandle<TaskResult>, MigrationError> {
        let PendingItem {
            key,
            from_file_handle_id,
        } = item;
        let from_file_handle_id = from_file_handle_id.ok_or_else(|| {
            MigrationError::Unexpected(format!("pending row {key} has no source file handle"))
        })?;

        let client = Arc::clone(&self.client);
        let pool = self.pool.clone();
        let storage_location_id = self.options.storage_location_id;
        Ok(tokio::spawn(async move {
            debug!(%key, "migrating");
            match operations::execute(
                client.as_ref(),
                &pool,
                &key,
                &from_file_handle_id,
                storage_location_id,
            )
            .await
            {
                Ok(to_file_handle_id) => Ok((key, to_file_handle_id)),
                Err(cause) => Err(TaskError { key, cause }),
            }
        }))
    }
}
