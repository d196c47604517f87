use crate::{error::MigrationError, options::MigrateOptions};
use connectors::{
    client::EntityClient,
    entity::{Entity, EntityHeader, EntityType},
    file_handle::FileHandleAssociation,
    table::ColumnModel,
};
use engine_core::checkpoint::{CheckpointStore, WorkItem};
use futures::{FutureExt, TryStreamExt, future::BoxFuture};
use model::{
    key::{MigrationKey, MigrationType},
    status::MigrationStatus,
    strategy::FileVersionStrategy,
};
use tracing::{debug, info, warn};

/// Phase one: walk the hierarchy depth-first and write one checkpoint row
/// per unit of work.
///
/// Container marker rows are written only after every child committed, so an
/// interrupted walk re-enters a half-indexed container and the primary key
/// plus the `has_indexed` probe make the replay idempotent.
pub struct Indexer<'a> {
    client: &'a dyn EntityClient,
    options: &'a MigrateOptions,
}

impl<'a> Indexer<'a> {
    pub fn new(client: &'a dyn EntityClient, options: &'a MigrateOptions) -> Self {
        Indexer { client, options }
    }

    /// Index the tree rooted at `root`. Returns the number of rows inserted
    /// by this run; a resumed run counts only its new discoveries.
    pub async fn run(
        &self,
        store: &mut CheckpointStore,
        root: &EntityHeader,
    ) -> Result<u64, MigrationError> {
        self.index_entity(store, root.clone(), None).await
    }

    fn index_entity<'b>(
        &'b self,
        store: &'b mut CheckpointStore,
        header: EntityHeader,
        parent_id: Option<String>,
    ) -> BoxFuture<'b, Result<u64, MigrationError>> {
        async move {
            if store.has_indexed(&header.id)? {
                info!(id = %header.id, "already indexed, skipping");
                return Ok(0);
            }
            debug!(id = %header.id, entity_type = ?header.entity_type, "indexing");

            let outcome = match header.entity_type {
                EntityType::File => {
                    self.index_file(store, &header.id, parent_id.as_deref()).await
                }
                EntityType::Table => {
                    self.index_table(store, &header.id, parent_id.as_deref())
                        .await
                }
                EntityType::Project | EntityType::Folder => {
                    self.index_container(store, &header, parent_id.as_deref())
                        .await
                }
            };

            match outcome {
                Ok(count) => Ok(count),
                Err(MigrationError::Client(err)) if self.options.continue_on_error => {
                    warn!(id = %header.id, error = %err, "indexing failed, skipping subtree");
                    Ok(0)
                }
                Err(err) => Err(err),
            }
        }
        .boxed()
    }

    async fn index_file(
        &self,
        store: &mut CheckpointStore,
        id: &str,
        parent_id: Option<&str>,
    ) -> Result<u64, MigrationError> {
        let Some(strategy) = self.options.file_version_strategy else {
            return Ok(0);
        };

        let mut items = Vec::new();
        match strategy {
            FileVersionStrategy::New => {
                let entity = self.client.get_entity(id, None).await?;
                items.push(self.file_item(MigrationKey::file(id, None), parent_id, &entity)?);
            }
            FileVersionStrategy::All => {
                // every version carries its own handle and storage location
                let versions: Vec<i64> = self.client.list_versions(id).try_collect().await?;
                for version in versions {
                    let entity = self.client.get_entity(id, Some(version)).await?;
                    items.push(self.file_item(
                        MigrationKey::file(id, Some(version)),
                        parent_id,
                        &entity,
                    )?);
                }
            }
            FileVersionStrategy::Latest => {
                let entity = self.client.get_entity(id, None).await?;
                items.push(self.file_item(
                    MigrationKey::file(id, Some(entity.version_number)),
                    parent_id,
                    &entity,
                )?);
            }
        }

        Ok(store.insert_work_items(&items)? as u64)
    }

    async fn index_table(
        &self,
        store: &mut CheckpointStore,
        id: &str,
        parent_id: Option<&str>,
    ) -> Result<u64, MigrationError> {
        if self.options.table_strategy.is_none() {
            return Ok(0);
        }

        let columns: Vec<ColumnModel> = self
            .client
            .list_table_columns(id)
            .await?
            .into_iter()
            .filter(|column| column.column_type.is_file_handle())
            .collect();
        if columns.is_empty() {
            debug!(id, "table has no file handle columns");
            return Ok(0);
        }

        let mut total = 0u64;
        let mut batch: Vec<WorkItem> = Vec::new();
        let mut rows = self.client.table_query(id, &columns);
        while let Some(row) = rows.try_next().await? {
            for (column, cell) in columns.iter().zip(&row.cells) {
                let Some(handle_id) = cell else { continue };

                let association = FileHandleAssociation::table_entity(handle_id.clone(), id);
                let handle = self.client.get_file_handle(handle_id, &association).await?;
                batch.push(WorkItem {
                    key: MigrationKey::table_cell(id, row.row_id, column.id, row.row_version),
                    parent_id: parent_id.map(str::to_string),
                    status: self.payload_status(handle.storage_location_id),
                    from_storage_location_id: handle.storage_location_id,
                    from_file_handle_id: Some(handle.id),
                });

                if batch.len() >= self.options.batch_size {
                    total += store.insert_work_items(&batch)? as u64;
                    batch.clear();
                }
            }
        }
        if !batch.is_empty() {
            total += store.insert_work_items(&batch)? as u64;
        }
        Ok(total)
    }

    async fn index_container(
        &self,
        store: &mut CheckpointStore,
        header: &EntityHeader,
        parent_id: Option<&str>,
    ) -> Result<u64, MigrationError> {
        let include_types = self.options.include_types();
        let mut total = 0u64;

        let mut children = self.client.list_children(&header.id, &include_types);
        while let Some(child) = children.try_next().await? {
            total += self
                .index_entity(store, child, Some(header.id.clone()))
                .await?;
        }

        // the marker that lets a later run skip this whole subtree; written
        // only after every child above is committed
        let kind = match header.entity_type {
            EntityType::Project => MigrationType::Project,
            _ => MigrationType::Folder,
        };
        store.insert_work_items(&[WorkItem::container_marker(
            MigrationKey::container(header.id.clone(), kind),
            parent_id.map(str::to_string),
        )])?;
        Ok(total)
    }

    fn file_item(
        &self,
        key: MigrationKey,
        parent_id: Option<&str>,
        entity: &Entity,
    ) -> Result<WorkItem, MigrationError> {
        let handle = entity.data_file_handle_id.clone().ok_or_else(|| {
            MigrationError::Unexpected(format!(
                "file entity {} has no data file handle",
                entity.id
            ))
        })?;
        Ok(WorkItem {
            key,
            parent_id: parent_id.map(str::to_string),
            status: self.payload_status(entity.storage_location_id),
            from_storage_location_id: entity.storage_location_id,
            from_file_handle_id: Some(handle),
        })
    }

    /// A payload already sitting in the target location has nothing to copy.
    fn payload_status(&self, from_storage_location_id: Option<i64>) -> MigrationStatus {
        if from_storage_location_id == Some(self.options.storage_location_id) {
            MigrationStatus::AlreadyMigrated
        } else {
            MigrationStatus::Indexed
        }
    }
}
