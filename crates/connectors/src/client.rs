use crate::{
    copy_pool::CopyPool,
    entity::{ChildType, Entity, EntityHeader},
    error::ClientError,
    file_handle::{FileHandle, FileHandleAssociation},
    table::{ColumnModel, TableRow},
};
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Streamed listing result. Listings are paginated server-side; consumers
/// pull rows without materializing the whole result.
pub type Listing<'a, T> = BoxStream<'a, Result<T, ClientError>>;

/// Operations the migration engine needs from the remote entity service.
///
/// Implementations own transport, authentication, pagination and retry;
/// the engine only sees these calls.
#[async_trait]
pub trait EntityClient: Send + Sync {
    /// Fetch an entity bundle, optionally pinned to a version. Payloads are
    /// never downloaded.
    async fn get_entity(&self, id: &str, version: Option<i64>) -> Result<Entity, ClientError>;

    /// List the direct children of a container, filtered by type.
    fn list_children<'a>(
        &'a self,
        container_id: &str,
        include_types: &[ChildType],
    ) -> Listing<'a, EntityHeader>;

    /// List the version numbers of a file entity, ascending.
    fn list_versions<'a>(&'a self, file_id: &str) -> Listing<'a, i64>;

    /// Column models of a table entity.
    async fn list_table_columns(&self, table_id: &str) -> Result<Vec<ColumnModel>, ClientError>;

    /// Column metadata by id.
    async fn get_column(&self, col_id: i64) -> Result<ColumnModel, ClientError>;

    /// Query a table for the given columns. Returned cells are positionally
    /// aligned with `columns`.
    fn table_query<'a>(&'a self, table_id: &str, columns: &[ColumnModel])
    -> Listing<'a, TableRow>;

    /// Fetch handle metadata through its association.
    async fn get_file_handle(
        &self,
        handle_id: &str,
        association: &FileHandleAssociation,
    ) -> Result<FileHandle, ClientError>;

    /// Server-side copy of a payload into the target storage location,
    /// returning the new handle id. Nested part copies must draw from
    /// `pool`.
    async fn multipart_copy(
        &self,
        source: &FileHandleAssociation,
        storage_location_id: i64,
        pool: &CopyPool,
    ) -> Result<String, ClientError>;

    /// Persist entity edits. A changed data file handle produces a new
    /// version.
    async fn store_entity(&self, entity: &Entity) -> Result<Entity, ClientError>;

    /// Partial row update of a single table cell.
    async fn update_table_cell(
        &self,
        table_id: &str,
        row_id: i64,
        col_id: i64,
        file_handle_id: &str,
    ) -> Result<(), ClientError>;

    /// Raw REST PUT. Implementations must fail on non-2xx.
    async fn put(&self, path: &str, body: serde_json::Value) -> Result<(), ClientError>;

    /// Create a snapshot version of a table.
    async fn create_snapshot(&self, table_id: &str) -> Result<(), ClientError>;

    /// Probe a storage location; errors when the caller is not its owner.
    async fn get_storage_location(&self, storage_location_id: i64) -> Result<(), ClientError>;
}
