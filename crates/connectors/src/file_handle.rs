use serde::{Deserialize, Serialize};

/// Object types a file handle can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssociationType {
    FileEntity,
    TableEntity,
}

/// Source coordinates for a copy: which handle, attached to which object.
/// The service authorizes handle access through the association.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileHandleAssociation {
    pub file_handle_id: String,
    pub associate_object_id: String,
    pub associate_object_type: AssociationType,
}

impl FileHandleAssociation {
    pub fn file_entity(file_handle_id: impl Into<String>, entity_id: impl Into<String>) -> Self {
        FileHandleAssociation {
            file_handle_id: file_handle_id.into(),
            associate_object_id: entity_id.into(),
            associate_object_type: AssociationType::FileEntity,
        }
    }

    pub fn table_entity(file_handle_id: impl Into<String>, table_id: impl Into<String>) -> Self {
        FileHandleAssociation {
            file_handle_id: file_handle_id.into(),
            associate_object_id: table_id.into(),
            associate_object_type: AssociationType::TableEntity,
        }
    }
}

/// Stored payload metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHandle {
    pub id: String,
    pub storage_location_id: Option<i64>,
}
