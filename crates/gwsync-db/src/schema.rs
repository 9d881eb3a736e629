//! Table and index definitions

use std::collections::HashSet;

use crate::error::DbError;
use crate::models::{ROUTE_TABLE, SSL_TABLE, UPSTREAM_ID_INDEX, UPSTREAM_TABLE};
use crate::store::Record;

/// Primary index every table must carry
pub const ID_INDEX: &str = "id";

/// Index definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSchema {
    pub name: String,
    /// Record field the index is keyed by
    pub field: String,
    pub unique: bool,
    /// Rows without a value for `field` are left out of the index instead of rejected
    pub allow_missing: bool,
}

impl IndexSchema {
    pub fn unique(name: &str, field: &str) -> Self {
        Self {
            name: name.to_string(),
            field: field.to_string(),
            unique: true,
            allow_missing: false,
        }
    }

    pub fn non_unique(name: &str, field: &str) -> Self {
        Self {
            name: name.to_string(),
            field: field.to_string(),
            unique: false,
            allow_missing: false,
        }
    }

    pub fn allow_missing(mut self) -> Self {
        self.allow_missing = true;
        self
    }
}

/// Table definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    pub indexes: Vec<IndexSchema>,
}

impl TableSchema {
    pub fn new(name: &str, indexes: Vec<IndexSchema>) -> Self {
        Self {
            name: name.to_string(),
            indexes,
        }
    }

    pub fn index(&self, name: &str) -> Option<&IndexSchema> {
        self.indexes.iter().find(|i| i.name == name)
    }
}

/// Database definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbSchema {
    pub tables: Vec<TableSchema>,
}

impl DbSchema {
    pub fn new(tables: Vec<TableSchema>) -> Self {
        Self { tables }
    }

    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Check the schema is internally consistent for rows of type `R`
    pub fn validate<R: Record>(&self) -> Result<(), DbError> {
        if self.tables.is_empty() {
            return Err(DbError::Schema("no tables defined".to_string()));
        }

        let mut table_names = HashSet::new();
        for table in &self.tables {
            if table.name.is_empty() {
                return Err(DbError::Schema("table name cannot be empty".to_string()));
            }
            if !table_names.insert(table.name.as_str()) {
                return Err(DbError::Schema(format!("duplicate table: {}", table.name)));
            }

            match table.index(ID_INDEX) {
                Some(id) if id.unique && !id.allow_missing => {}
                Some(_) => {
                    return Err(DbError::Schema(format!(
                        "{}: {} index must be unique and required",
                        table.name, ID_INDEX
                    )));
                }
                None => {
                    return Err(DbError::Schema(format!(
                        "{}: missing {} index",
                        table.name, ID_INDEX
                    )));
                }
            }

            let known_fields = R::fields(&table.name);
            let mut index_names = HashSet::new();
            for index in &table.indexes {
                if index.name.is_empty() {
                    return Err(DbError::Schema(format!(
                        "{}: index name cannot be empty",
                        table.name
                    )));
                }
                if !index_names.insert(index.name.as_str()) {
                    return Err(DbError::Schema(format!(
                        "{}: duplicate index {}",
                        table.name, index.name
                    )));
                }
                if index.field.is_empty() {
                    return Err(DbError::Schema(format!(
                        "{}: index {} has no field",
                        table.name, index.name
                    )));
                }
                if !known_fields.contains(&index.field.as_str()) {
                    return Err(DbError::Schema(format!(
                        "{}: index {} refers to unknown field {}",
                        table.name, index.name, index.field
                    )));
                }
            }
        }

        Ok(())
    }
}

/// The fixed route/upstream/ssl schema
pub fn gateway_schema() -> DbSchema {
    DbSchema::new(vec![
        TableSchema::new(
            ROUTE_TABLE,
            vec![
                IndexSchema::unique(ID_INDEX, "id"),
                IndexSchema::non_unique(UPSTREAM_ID_INDEX, "upstream_id").allow_missing(),
            ],
        ),
        TableSchema::new(UPSTREAM_TABLE, vec![IndexSchema::unique(ID_INDEX, "id")]),
        TableSchema::new(SSL_TABLE, vec![IndexSchema::unique(ID_INDEX, "id")]),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Entity;

    #[test]
    fn test_gateway_schema_is_valid() {
        assert!(gateway_schema().validate::<Entity>().is_ok());
    }

    #[test]
    fn test_duplicate_index_name() {
        let schema = DbSchema::new(vec![TableSchema::new(
            ROUTE_TABLE,
            vec![
                IndexSchema::unique(ID_INDEX, "id"),
                IndexSchema::non_unique("by_upstream", "upstream_id"),
                IndexSchema::non_unique("by_upstream", "name"),
            ],
        )]);

        let err = schema.validate::<Entity>().unwrap_err();
        assert!(matches!(err, DbError::Schema(msg) if msg.contains("duplicate index")));
    }

    #[test]
    fn test_unknown_field() {
        let schema = DbSchema::new(vec![TableSchema::new(
            SSL_TABLE,
            vec![
                IndexSchema::unique(ID_INDEX, "id"),
                IndexSchema::non_unique("by_upstream", "upstream_id"),
            ],
        )]);

        let err = schema.validate::<Entity>().unwrap_err();
        assert!(matches!(err, DbError::Schema(msg) if msg.contains("unknown field")));
    }

    #[test]
    fn test_id_index_required() {
        let missing = DbSchema::new(vec![TableSchema::new(UPSTREAM_TABLE, vec![])]);
        assert!(missing.validate::<Entity>().is_err());

        let not_unique = DbSchema::new(vec![TableSchema::new(
            UPSTREAM_TABLE,
            vec![IndexSchema::non_unique(ID_INDEX, "id")],
        )]);
        assert!(not_unique.validate::<Entity>().is_err());
    }

    #[test]
    fn test_duplicate_table() {
        let schema = DbSchema::new(vec![
            TableSchema::new(SSL_TABLE, vec![IndexSchema::unique(ID_INDEX, "id")]),
            TableSchema::new(SSL_TABLE, vec![IndexSchema::unique(ID_INDEX, "id")]),
        ]);
        assert!(schema.validate::<Entity>().is_err());
        assert!(DbSchema::new(vec![]).validate::<Entity>().is_err());
    }
}
