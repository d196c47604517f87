use serde::{Deserialize, Serialize};

/// Type of a table column, as reported by the column model endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColumnType {
    String,
    Integer,
    Double,
    Boolean,
    Date,
    EntityId,
    FileHandleId,
    LargeText,
    Link,
}

impl ColumnType {
    pub fn is_file_handle(self) -> bool {
        matches!(self, ColumnType::FileHandleId)
    }
}

/// Column metadata of a table entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnModel {
    pub id: i64,
    pub name: String,
    pub column_type: ColumnType,
}

/// One row of a file-handle column projection of a table query.
///
/// `cells` is positionally aligned with the queried columns; empty cells are
/// `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    pub row_id: i64,
    pub row_version: i64,
    pub cells: Vec<Option<String>>,
}
