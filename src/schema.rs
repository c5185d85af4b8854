//! Column schema definitions for query validation.
//!
//! A [`TableSchema`] is built once per table per request and handed to the
//! clause compiler, which treats it as authoritative for that call.
//!
//! # Example
//! ```
//! use sqlpipe::schema::TableSchema;
//!
//! let schema = TableSchema::from_columns([("ID", "INTEGER"), ("NAME", "VARCHAR")]);
//! assert!(schema.get("ID").unwrap().is_numeric);
//! assert!(schema.column("MISSING").is_err());
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use strsim::levenshtein;

use crate::error::{SqlPipeError, SqlPipeResult};

const NUMERIC_TYPES: &[&str] = &[
    "INTEGER", "BIGINT", "SMALLINT", "DECIMAL", "NUMERIC", "FLOAT", "DOUBLE",
];
const DATE_TYPES: &[&str] = &["DATE", "TIMESTAMP", "TIME"];
const STRING_TYPES: &[&str] = &["CHAR", "VARCHAR", "CLOB"];

/// Type metadata for one physical column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub typ: Option<String>,
    pub is_numeric: bool,
    pub is_date: bool,
    pub is_string: bool,
}

impl ColumnSchema {
    /// Classify a column from its catalog type name.
    pub fn new(name: impl Into<String>, typ: &str) -> Self {
        let typ = typ.trim().to_uppercase();
        let base = typ.split('(').next().unwrap_or("").trim().to_string();
        Self {
            name: name.into(),
            is_numeric: NUMERIC_TYPES.contains(&base.as_str()),
            is_date: DATE_TYPES.contains(&base.as_str()),
            is_string: STRING_TYPES.contains(&base.as_str()),
            typ: Some(typ),
        }
    }

    /// An entry with no type information (the catalog's `*` row).
    pub fn untyped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            typ: None,
            is_numeric: false,
            is_date: false,
            is_string: false,
        }
    }
}

/// One row of a column catalog listing.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogRow {
    #[serde(rename = "COLNAME", alias = "name")]
    pub colname: String,
    #[serde(rename = "TYPENAME", alias = "type", default)]
    pub typename: Option<String>,
}

/// Flat option entry as produced by column pickers: the column name plus its
/// type carried in the description.
#[derive(Debug, Clone, Deserialize)]
pub struct ColumnOption {
    pub value: serde_json::Value,
    #[serde(default)]
    pub description: Option<String>,
}

/// Column definition as written in a schema document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    #[serde(rename = "type", alias = "typ")]
    pub typ: String,
}

/// Schema document mapping table names to their columns.
///
/// ```json
/// { "ORDERS": [ { "name": "ID", "type": "INTEGER" } ] }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaDocument {
    pub tables: BTreeMap<String, Vec<ColumnDef>>,
}

impl SchemaDocument {
    /// Load a schema document from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Build the schema of one table.
    pub fn table(&self, table: &str) -> SqlPipeResult<TableSchema> {
        let cols = self
            .tables
            .get(table)
            .or_else(|| {
                self.tables
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(table))
                    .map(|(_, cols)| cols)
            })
            .ok_or_else(|| SqlPipeError::UnknownTable(table.to_string()))?;
        Ok(TableSchema::from_columns(
            cols.iter().map(|c| (c.name.as_str(), c.typ.as_str())),
        ))
    }
}

/// Immutable mapping from column name to type metadata for one table.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TableSchema {
    columns: HashMap<String, ColumnSchema>,
}

impl TableSchema {
    /// Build from `(name, type)` pairs.
    pub fn from_columns<'a>(cols: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let columns = cols
            .into_iter()
            .map(|(name, typ)| (name.to_string(), ColumnSchema::new(name, typ)))
            .collect();
        Self { columns }
    }

    /// Build from catalog rows. The `*` row becomes an untyped entry.
    pub fn from_catalog_rows(rows: &[CatalogRow]) -> Self {
        let mut columns = HashMap::new();
        for row in rows {
            let entry = match (&row.typename, row.colname.as_str()) {
                (_, "*") | (None, _) => ColumnSchema::untyped(&row.colname),
                (Some(typ), _) => ColumnSchema::new(&row.colname, typ),
            };
            columns.insert(row.colname.clone(), entry);
        }
        Self { columns }
    }

    /// Build from a flat options list. Entries without a string value or
    /// without a type description are skipped.
    pub fn from_options(options: &[ColumnOption]) -> Self {
        let mut columns = HashMap::new();
        for opt in options {
            let Some(name) = opt.value.as_str() else {
                continue;
            };
            let typ = opt.description.as_deref().unwrap_or("").trim();
            if typ.is_empty() {
                continue;
            }
            columns.insert(name.to_string(), ColumnSchema::new(name, typ));
        }
        Self { columns }
    }

    pub fn get(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.get(name)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Column names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.columns.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Look up a column, failing with a suggestion when it is unknown.
    pub fn column(&self, name: &str) -> SqlPipeResult<&ColumnSchema> {
        self.column_in("", name)
    }

    /// Same as [`TableSchema::column`], naming the clause in the error.
    pub fn column_in(&self, clause: &'static str, name: &str) -> SqlPipeResult<&ColumnSchema> {
        self.columns
            .get(name)
            .ok_or_else(|| SqlPipeError::UnknownColumn {
                clause,
                column: name.to_string(),
                suggestion: self.did_you_mean(name),
            })
    }

    /// Find the best match with a length-scaled Levenshtein threshold.
    fn did_you_mean(&self, input: &str) -> Option<String> {
        let threshold = match input.len() {
            0..=2 => 0,
            3..=5 => 2,
            _ => 3,
        };

        let mut best_match = None;
        let mut min_dist = usize::MAX;
        for cand in self.names() {
            let dist = levenshtein(&input.to_uppercase(), &cand.to_uppercase());
            if dist <= threshold && dist < min_dist {
                min_dist = dist;
                best_match = Some(cand.to_string());
            }
        }
        best_match
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_classification() {
        let schema = TableSchema::from_columns([
            ("ID", "integer"),
            ("PRICE", "DECIMAL(10,2)"),
            ("NAME", "VARCHAR"),
            ("CREATED", "TIMESTAMP"),
            ("PAYLOAD", "BLOB"),
        ]);
        assert!(schema.get("ID").unwrap().is_numeric);
        assert!(schema.get("PRICE").unwrap().is_numeric);
        assert!(schema.get("NAME").unwrap().is_string);
        assert!(schema.get("CREATED").unwrap().is_date);

        let blob = schema.get("PAYLOAD").unwrap();
        assert!(!blob.is_numeric && !blob.is_date && !blob.is_string);
    }

    #[test]
    fn test_catalog_rows_with_star() {
        let rows: Vec<CatalogRow> = serde_json::from_str(
            r#"[{"COLNAME":"*"},{"COLNAME":"ID","TYPENAME":"bigint"}]"#,
        )
        .unwrap();
        let schema = TableSchema::from_catalog_rows(&rows);
        assert_eq!(schema.get("*").unwrap().typ, None);
        assert_eq!(schema.get("ID").unwrap().typ.as_deref(), Some("BIGINT"));
    }

    #[test]
    fn test_from_options_skips_untyped() {
        let options: Vec<ColumnOption> = serde_json::from_str(
            r#"[
                {"value":"ID","description":"INTEGER"},
                {"value":"NOTE"},
                {"value":7,"description":"INTEGER"}
            ]"#,
        )
        .unwrap();
        let schema = TableSchema::from_options(&options);
        assert_eq!(schema.names(), vec!["ID"]);
    }

    #[test]
    fn test_unknown_column_suggestion() {
        let schema = TableSchema::from_columns([("EMAIL", "VARCHAR"), ("ID", "INTEGER")]);
        let err = schema.column("EMIAL").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unknown column \"EMIAL\". Did you mean \"EMAIL\"?"
        );

        let err = schema.column_in("ORDER BY ", "ZZZZZZZZ").unwrap_err();
        assert_eq!(err.to_string(), "Unknown ORDER BY column \"ZZZZZZZZ\"");
    }

    #[test]
    fn test_schema_document() {
        let doc = SchemaDocument::from_json(
            r#"{"ORDERS":[{"name":"ID","type":"INTEGER"},{"name":"REGION","type":"VARCHAR"}]}"#,
        )
        .unwrap();
        let schema = doc.table("orders").unwrap();
        assert_eq!(schema.len(), 2);
        assert!(matches!(
            doc.table("CUSTOMERS"),
            Err(SqlPipeError::UnknownTable(_))
        ));
    }
}
