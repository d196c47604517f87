use crate::{
    error::MigrationError,
    indexer::Indexer,
    options::MigrateOptions,
    result::MigrationResult,
    scheduler::{MigrationScheduler, ScheduleTotals},
};
use connectors::{client::EntityClient, copy_pool::CopyPool};
use engine_core::checkpoint::CheckpointStore;
use std::sync::Arc;
use tracing::info;

/// Validates inputs, wires the two phases together and produces the run
/// summary.
///
/// Index and migrate are strictly sequential: the scheduler only ever sees a
/// checkpoint whose discovery is complete for the root it was given.
pub struct MigrationEngine {
    client: Arc<dyn EntityClient>,
    options: MigrateOptions,
}

impl MigrationEngine {
    pub fn new(client: Arc<dyn EntityClient>, options: MigrateOptions) -> Self {
        MigrationEngine { client, options }
    }

    /// Run the migration of the tree rooted at `root_id` against the
    /// configured checkpoint. A dry run stops after indexing.
    pub async fn run(&self, root_id: &str) -> Result<MigrationResult, MigrationError> {
        self.options.validate()?;

        // the caller must own the target storage location; probe before any
        // checkpoint write
        self.client
            .get_storage_location(self.options.storage_location_id)
            .await
            .map_err(|err| {
                MigrationError::Validation(format!(
                    "cannot verify ownership of storage location {}: {err}",
                    self.options.storage_location_id
                ))
            })?;

        let mut store = CheckpointStore::open(&self.options.db_path)?;

        let root = self.client.get_entity(root_id, None).await?;
        let indexer = Indexer::new(self.client.as_ref(), &self.options);
        let indexed_total = indexer.run(&mut store, &root.header()).await?;
        info!(indexed_total, "indexing complete");

        let mut totals = ScheduleTotals::default();
        if self.options.dry_run {
            info!("dry run, skipping migration phase");
        } else {
            let retried = store.reset_errored()?;
            if retried > 0 {
                info!(retried, "retrying previously errored rows");
            }
            let pool = CopyPool::new(self.options.thread_count);
            let scheduler = MigrationScheduler::new(Arc::clone(&self.client), pool, &self.options);
            totals = scheduler.run(&mut store).await?;
        }

        Ok(MigrationResult::new(
            Arc::clone(&self.client),
            self.options.db_path.clone(),
            indexed_total,
            totals.migrated,
            totals.errored,
            self.options.batch_size,
        ))
    }
}
