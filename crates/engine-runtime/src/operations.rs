use connectors::{
    client::EntityClient, copy_pool::CopyPool, error::ClientError,
    file_handle::FileHandleAssociation,
};
use model::key::{MigrationKey, MigrationType};
use serde_json::json;
use tracing::debug;

/// Failure of a single migration task, tagged with the row it belongs to so
/// the scheduler records the outcome on the right checkpoint row.
#[derive(Debug)]
pub struct TaskError {
    pub key: MigrationKey,
    pub cause: ClientError,
}

/// Dispatch one pending payload row to its leaf operation. Returns the new
/// file handle id.
pub async fn execute(
    client: &dyn EntityClient,
    pool: &CopyPool,
    key: &MigrationKey,
    from_file_handle_id: &str,
    storage_location_id: i64,
) -> Result<String, ClientError> {
    match (key.kind, key.version) {
        (MigrationType::File, None) => {
            create_new_file_version(client, pool, &key.id, from_file_handle_id, storage_location_id)
                .await
        }
        (MigrationType::File, Some(version)) => {
            migrate_file_version(
                client,
                pool,
                &key.id,
                version,
                from_file_handle_id,
                storage_location_id,
            )
            .await
        }
        (MigrationType::TableAttachedFile, _) => {
            migrate_table_attached_file(client, pool, key, from_file_handle_id, storage_location_id)
                .await
        }
        _ => Err(ClientError::Unexpected(format!(
            "container row {key} is not migratable"
        ))),
    }
}

/// Copy the current payload, then point the entity at the copy, producing a
/// new entity version.
async fn create_new_file_version(
    client: &dyn EntityClient,
    pool: &CopyPool,
    id: &str,
    from_file_handle_id: &str,
    storage_location_id: i64,
) -> Result<String, ClientError> {
    let mut entity = client.get_entity(id, None).await?;

    let source = FileHandleAssociation::file_entity(from_file_handle_id, id);
    let to_file_handle_id = client.multipart_copy(&source, storage_location_id, pool).await?;

    entity.data_file_handle_id = Some(to_file_handle_id.clone());
    client.store_entity(&entity).await?;

    debug!(id, %to_file_handle_id, "created new file version");
    Ok(to_file_handle_id)
}

/// Copy the payload of one existing version and swap its handle in place.
async fn migrate_file_version(
    client: &dyn EntityClient,
    pool: &CopyPool,
    id: &str,
    version: i64,
    from_file_handle_id: &str,
    storage_location_id: i64,
) -> Result<String, ClientError> {
    let source = FileHandleAssociation::file_entity(from_file_handle_id, id);
    let to_file_handle_id = client.multipart_copy(&source, storage_location_id, pool).await?;

    let body = json!({
        "oldFileHandleId": from_file_handle_id,
        "newFileHandleId": to_file_handle_id,
    });
    // no response body, a 2xx is the success signal
    client
        .put(&format!("/entity/{id}/version/{version}/filehandle"), body)
        .await?;

    debug!(id, version, %to_file_handle_id, "migrated file version");
    Ok(to_file_handle_id)
}

/// Copy a table cell's payload and patch the cell with the new handle.
async fn migrate_table_attached_file(
    client: &dyn EntityClient,
    pool: &CopyPool,
    key: &MigrationKey,
    from_file_handle_id: &str,
    storage_location_id: i64,
) -> Result<String, ClientError> {
    let (row_id, col_id) = match (key.row_id, key.col_id) {
        (Some(row_id), Some(col_id)) => (row_id, col_id),
        _ => {
            return Err(ClientError::Unexpected(format!(
                "table attached file row {key} is missing row or column"
            )));
        }
    };

    let source = FileHandleAssociation::table_entity(from_file_handle_id, key.id.as_str());
    let to_file_handle_id = client.multipart_copy(&source, storage_location_id, pool).await?;

    client
        .update_table_cell(&key.id, row_id, col_id, &to_file_handle_id)
        .await?;

    debug!(table = %key.id, row_id, col_id, %to_file_handle_id, "migrated table attached file");
    Ok(to_file_handle_id)
}
