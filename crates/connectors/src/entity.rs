use serde::{Deserialize, Serialize};

/// Concrete type of a repository entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Project,
    Folder,
    File,
    Table,
}

impl EntityType {
    pub fn is_container(self) -> bool {
        matches!(self, EntityType::Project | EntityType::Folder)
    }
}

/// Child-listing filter accepted by the child listing endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildType {
    Folder,
    File,
    Table,
}

impl ChildType {
    pub fn as_str(self) -> &'static str {
        match self {
            ChildType::Folder => "folder",
            ChildType::File => "file",
            ChildType::Table => "table",
        }
    }

    pub fn matches(self, entity_type: EntityType) -> bool {
        matches!(
            (self, entity_type),
            (ChildType::Folder, EntityType::Folder)
                | (ChildType::File, EntityType::File)
                | (ChildType::Table, EntityType::Table)
        )
    }
}

/// Identity row returned by a child listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityHeader {
    pub id: String,
    pub entity_type: EntityType,
}

/// Entity bundle as fetched from the service.
///
/// `data_file_handle_id` and `storage_location_id` are populated for file
/// entities; containers and tables carry neither.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub entity_type: EntityType,
    pub etag: String,
    pub version_number: i64,
    pub data_file_handle_id: Option<String>,
    pub storage_location_id: Option<i64>,
}

impl Entity {
    pub fn header(&self) -> EntityHeader {
        EntityHeader {
            id: self.id.clone(),
            entity_type: self.entity_type,
        }
    }
}
