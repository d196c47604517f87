use async_trait::async_trait;
use connectors::{
    client::{EntityClient, Listing},
    copy_pool::CopyPool,
    entity::{ChildType, Entity, EntityHeader, EntityType},
    error::ClientError,
    file_handle::{FileHandle, FileHandleAssociation},
    table::{ColumnModel, ColumnType, TableRow},
};
use futures::stream::{self, StreamExt};
use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
};

/// Install a subscriber so failing tests print their traces. Safe to call
/// from every test; only the first call wins.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Every remote call the scripted client has served, in order. Sequence
/// assertions in the scenario tests key off this log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    GetEntity {
        id: String,
        version: Option<i64>,
    },
    ListChildren {
        id: String,
    },
    ListVersions {
        id: String,
    },
    ListTableColumns {
        id: String,
    },
    GetColumn {
        id: i64,
    },
    TableQuery {
        id: String,
    },
    GetFileHandle {
        id: String,
    },
    MultipartCopy {
        file_handle_id: String,
        object_id: String,
        storage_location_id: i64,
    },
    StoreEntity {
        id: String,
    },
    UpdateTableCell {
        table_id: String,
        row_id: i64,
        col_id: i64,
    },
    Put {
        path: String,
    },
    CreateSnapshot {
        id: String,
    },
    GetStorageLocation {
        id: i64,
    },
}

impl Call {
    /// True for calls that change remote state.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Call::MultipartCopy { .. }
                | Call::StoreEntity { .. }
                | Call::UpdateTableCell { .. }
                | Call::Put { .. }
                | Call::CreateSnapshot { .. }
        )
    }
}

#[derive(Debug, Clone)]
struct FakeRow {
    row_id: i64,
    row_version: i64,
    cells: HashMap<i64, String>,
}

#[derive(Debug, Default)]
struct World {
    entities: HashMap<String, Entity>,
    versions: HashMap<String, Vec<Entity>>,
    children: HashMap<String, Vec<EntityHeader>>,
    columns: HashMap<String, Vec<ColumnModel>>,
    rows: HashMap<String, Vec<FakeRow>>,
    handles: HashMap<String, i64>,
    failing_copies: HashSet<String>,
    denied_locations: HashSet<i64>,
}

/// In-memory scripted entity service. Fixtures are built up with the `add_*`
/// methods; every served call is recorded for sequence assertions.
pub struct FakeClient {
    state: Mutex<World>,
    calls: Mutex<Vec<Call>>,
    copy_counter: AtomicU64,
}

impl FakeClient {
    pub fn new() -> Arc<Self> {
        Arc::new(FakeClient {
            state: Mutex::new(World::default()),
            calls: Mutex::new(Vec::new()),
            copy_counter: AtomicU64::new(0),
        })
    }

    pub fn add_project(&self, id: &str) {
        let mut world = self.state.lock().unwrap();
        world
            .entities
            .insert(id.to_string(), container(id, EntityType::Project));
        world.children.entry(id.to_string()).or_default();
    }

    pub fn add_folder(&self, parent: &str, id: &str) {
        let mut world = self.state.lock().unwrap();
        world
            .entities
            .insert(id.to_string(), container(id, EntityType::Folder));
        world.children.entry(id.to_string()).or_default();
        world
            .children
            .entry(parent.to_string())
            .or_default()
            .push(EntityHeader {
                id: id.to_string(),
                entity_type: EntityType::Folder,
            });
    }

    /// Add a file with one entry per version: `(file handle id, storage
    /// location id)`. Version numbers start at 1; the last entry is the
    /// current version.
    pub fn add_file(&self, parent: &str, id: &str, versions: &[(&str, i64)]) {
        assert!(!versions.is_empty(), "a file needs at least one version");
        let mut world = self.state.lock().unwrap();

        let mut bundles = Vec::new();
        for (index, (handle, location)) in versions.iter().enumerate() {
            world.handles.insert(handle.to_string(), *location);
            bundles.push(Entity {
                id: id.to_string(),
                entity_type: EntityType::File,
                etag: format!("etag-{id}-{}", index + 1),
                version_number: (index + 1) as i64,
                data_file_handle_id: Some(handle.to_string()),
                storage_location_id: Some(*location),
            });
        }
        let current = bundles.last().cloned().unwrap();

        world.versions.insert(id.to_string(), bundles);
        world.entities.insert(id.to_string(), current);
        world
            .children
            .entry(parent.to_string())
            .or_default()
            .push(EntityHeader {
                id: id.to_string(),
                entity_type: EntityType::File,
            });
    }

    pub fn add_table(&self, parent: &str, id: &str, columns: &[(i64, &str, ColumnType)]) {
        let mut world = self.state.lock().unwrap();
        world.entities.insert(id.to_string(), table_bundle(id));
        world.columns.insert(
            id.to_string(),
            columns
                .iter()
                .map(|(col_id, name, column_type)| ColumnModel {
                    id: *col_id,
                    name: name.to_string(),
                    column_type: *column_type,
                })
                .collect(),
        );
        world.rows.entry(id.to_string()).or_default();
        world
            .children
            .entry(parent.to_string())
            .or_default()
            .push(EntityHeader {
                id: id.to_string(),
                entity_type: EntityType::Table,
            });
    }

    /// Add one table row; `cells` holds `(col_id, file handle id, storage
    /// location id)` for the populated file-handle cells.
    pub fn add_table_row(
        &self,
        table: &str,
        row_id: i64,
        row_version: i64,
        cells: &[(i64, &str, i64)],
    ) {
        let mut world = self.state.lock().unwrap();
        let mut row = FakeRow {
            row_id,
            row_version,
            cells: HashMap::new(),
        };
        for (col_id, handle, location) in cells {
            world.handles.insert(handle.to_string(), *location);
            row.cells.insert(*col_id, handle.to_string());
        }
        world.rows.entry(table.to_string()).or_default().push(row);
    }

    /// Make every copy of the given source handle fail.
    pub fn fail_copy(&self, file_handle_id: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_copies
            .insert(file_handle_id.to_string());
    }

    pub fn deny_storage_location(&self, storage_location_id: i64) {
        self.state
            .lock()
            .unwrap()
            .denied_locations
            .insert(storage_location_id);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Source handle ids of every multipart copy served, in order.
    pub fn copies(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::MultipartCopy { file_handle_id, .. } => Some(file_handle_id),
                _ => None,
            })
            .collect()
    }

    pub fn snapshots(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::CreateSnapshot { id } => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn puts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Put { path } => Some(path),
                _ => None,
            })
            .collect()
    }

    pub fn mutation_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.is_mutation())
            .count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

fn container(id: &str, entity_type: EntityType) -> Entity {
    Entity {
        id: id.to_string(),
        entity_type,
        etag: format!("etag-{id}"),
        version_number: 1,
        data_file_handle_id: None,
        storage_location_id: None,
    }
}

fn table_bundle(id: &str) -> Entity {
    Entity {
        id: id.to_string(),
        entity_type: EntityType::Table,
        etag: format!("etag-{id}"),
        version_number: 1,
        data_file_handle_id: None,
        storage_location_id: None,
    }
}

#[async_trait]
impl EntityClient for FakeClient {
    async fn get_entity(&self, id: &str, version: Option<i64>) -> Result<Entity, ClientError> {
        self.record(Call::GetEntity {
            id: id.to_string(),
            version,
        });
        let world = self.state.lock().unwrap();
        match version {
            Some(version) => world
                .versions
                .get(id)
                .and_then(|bundles| {
                    bundles
                        .iter()
                        .find(|bundle| bundle.version_number == version)
                })
                .cloned()
                .ok_or_else(|| ClientError::NotFound(format!("{id} v{version}"))),
            None => world
                .entities
                .get(id)
                .cloned()
                .ok_or_else(|| ClientError::NotFound(id.to_string())),
        }
    }

    fn list_children<'a>(
        &'a self,
        container_id: &str,
        include_types: &[ChildType],
    ) -> Listing<'a, EntityHeader> {
        self.record(Call::ListChildren {
            id: container_id.to_string(),
        });
        let world = self.state.lock().unwrap();
        let include_types = include_types.to_vec();
        let children: Vec<_> = world
            .children
            .get(container_id)
            .map(|children| {
                children
                    .iter()
                    .filter(|child| {
                        include_types
                            .iter()
                            .any(|include| include.matches(child.entity_type))
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        stream::iter(children.into_iter().map(Ok)).boxed()
    }

    fn list_versions<'a>(&'a self, file_id: &str) -> Listing<'a, i64> {
        self.record(Call::ListVersions {
            id: file_id.to_string(),
        });
        let world = self.state.lock().unwrap();
        let versions: Vec<i64> = world
            .versions
            .get(file_id)
            .map(|bundles| bundles.iter().map(|bundle| bundle.version_number).collect())
            .unwrap_or_default();
        stream::iter(versions.into_iter().map(Ok)).boxed()
    }

    async fn list_table_columns(&self, table_id: &str) -> Result<Vec<ColumnModel>, ClientError> {
        self.record(Call::ListTableColumns {
            id: table_id.to_string(),
        });
        let world = self.state.lock().unwrap();
        world
            .columns
            .get(table_id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(table_id.to_string()))
    }

    async fn get_column(&self, col_id: i64) -> Result<ColumnModel, ClientError> {
        self.record(Call::GetColumn { id: col_id });
        let world = self.state.lock().unwrap();
        world
            .columns
            .values()
            .flatten()
            .find(|column| column.id == col_id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("column {col_id}")))
    }

    fn table_query<'a>(
        &'a self,
        table_id: &str,
        columns: &[ColumnModel],
    ) -> Listing<'a, TableRow> {
        self.record(Call::TableQuery {
            id: table_id.to_string(),
        });
        let world = self.state.lock().unwrap();
        let columns = columns.to_vec();
        let rows: Vec<TableRow> = world
            .rows
            .get(table_id)
            .map(|rows| {
                rows.iter()
                    .map(|row| TableRow {
                        row_id: row.row_id,
                        row_version: row.row_version,
                        cells: columns
                            .iter()
                            .map(|column| row.cells.get(&column.id).cloned())
                            .collect(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        stream::iter(rows.into_iter().map(Ok)).boxed()
    }

    async fn get_file_handle(
        &self,
        handle_id: &str,
        _association: &FileHandleAssociation,
    ) -> Result<FileHandle, ClientError> {
        self.record(Call::GetFileHandle {
            id: handle_id.to_string(),
        });
        let world = self.state.lock().unwrap();
        world
            .handles
            .get(handle_id)
            .map(|location| FileHandle {
                id: handle_id.to_string(),
                storage_location_id: Some(*location),
            })
            .ok_or_else(|| ClientError::NotFound(handle_id.to_string()))
    }

    async fn multipart_copy(
        &self,
        source: &FileHandleAssociation,
        storage_location_id: i64,
        pool: &CopyPool,
    ) -> Result<String, ClientError> {
        self.record(Call::MultipartCopy {
            file_handle_id: source.file_handle_id.clone(),
            object_id: source.associate_object_id.clone(),
            storage_location_id,
        });

        // parts draw from the shared pool, like the real copy primitive
        let _permit = pool
            .acquire()
            .await
            .map_err(|_| ClientError::Transport("copy pool closed".to_string()))?;

        let mut world = self.state.lock().unwrap();
        if world.failing_copies.contains(&source.file_handle_id) {
            return Err(ClientError::Transport(format!(
                "simulated copy failure for {}",
                source.file_handle_id
            )));
        }
        let serial = self.copy_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let new_id = format!("fh-copy-{serial}");
        world.handles.insert(new_id.clone(), storage_location_id);
        Ok(new_id)
    }

    async fn store_entity(&self, entity: &Entity) -> Result<Entity, ClientError> {
        self.record(Call::StoreEntity {
            id: entity.id.clone(),
        });
        let mut world = self.state.lock().unwrap();
        let stored = Entity {
            version_number: entity.version_number + 1,
            ..entity.clone()
        };
        world.entities.insert(entity.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn update_table_cell(
        &self,
        table_id: &str,
        row_id: i64,
        col_id: i64,
        file_handle_id: &str,
    ) -> Result<(), ClientError> {
        self.record(Call::UpdateTableCell {
            table_id: table_id.to_string(),
            row_id,
            col_id,
        });
        let mut world = self.state.lock().unwrap();
        let row = world
            .rows
            .get_mut(table_id)
            .and_then(|rows| rows.iter_mut().find(|row| row.row_id == row_id))
            .ok_or_else(|| ClientError::NotFound(format!("{table_id} row {row_id}")))?;
        row.cells.insert(col_id, file_handle_id.to_string());
        Ok(())
    }

    async fn put(&self, path: &str, _body: serde_json::Value) -> Result<(), ClientError> {
        self.record(Call::Put {
            path: path.to_string(),
        });
        Ok(())
    }

    async fn create_snapshot(&self, table_id: &str) -> Result<(), ClientError> {
        self.record(Call::CreateSnapshot {
            id: table_id.to_string(),
        });
        Ok(())
    }

    async fn get_storage_location(&self, storage_location_id: i64) -> Result<(), ClientError> {
        self.record(Call::GetStorageLocation {
            id: storage_location_id,
        });
        let world = self.state.lock().unwrap();
        if world.denied_locations.contains(&storage_location_id) {
            return Err(ClientError::StorageLocationDenied(storage_location_id));
        }
        Ok(())
    }
}
