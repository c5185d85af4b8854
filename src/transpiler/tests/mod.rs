
use crate::schema::TableSchema;

/// Orders table shared by the transpiler tests.
pub(super) fn orders_schema() -> TableSchema {
    TableSchema::from_columns([
        ("ID", "INTEGER"),
        ("AMOUNT", "DECIMAL"),
        ("STATUS", "VARCHAR"),
        ("REGION", "CHAR"),
        ("CREATED_AT", "TIMESTAMP"),
        ("PAYLOAD", "BLOB"),
    ])
}
