use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Supported SQL Dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Db2,
    Postgres,
    #[serde(alias = "mariadb")]
    MySql,
    Sqlite,
}

impl Dialect {
    /// Guess the dialect from a connection URL scheme.
    pub fn from_url(url: &str) -> Self {
        let scheme = url.split(':').next().unwrap_or("").to_lowercase();
        match scheme.as_str() {
            "postgres" | "postgresql" => Dialect::Postgres,
            "mysql" | "mariadb" => Dialect::MySql,
            "sqlite" => Dialect::Sqlite,
            _ => Dialect::Db2,
        }
    }

    pub fn quote_identifier(&self, name: &str) -> String {
        match self {
            Dialect::MySql => format!("`{}`", name.replace('`', "``")),
            _ => format!("\"{}\"", name.replace('"', "\"\"")),
        }
    }

    /// Fixed-precision decimal cast used to normalize numeric aggregates.
    pub fn decimal_cast(&self, expr: &str) -> String {
        match self {
            Dialect::Db2 => format!("DECIMAL({}, 18, 2)", expr),
            _ => format!("CAST({} AS DECIMAL(18, 2))", expr),
        }
    }

    /// Row-count cap clause.
    pub fn row_cap(&self, limit: u64) -> String {
        match self {
            Dialect::Db2 => format!("FETCH FIRST {} ROWS ONLY", limit),
            _ => format!("LIMIT {}", limit),
        }
    }

    /// Positional placeholder for the 1-based bind index.
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${}", index),
            _ => "?".to_string(),
        }
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "db2" => Ok(Dialect::Db2),
            "postgres" | "postgresql" | "pg" => Ok(Dialect::Postgres),
            "mysql" | "mariadb" => Ok(Dialect::MySql),
            "sqlite" => Ok(Dialect::Sqlite),
            other => Err(format!("Unknown dialect: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_url() {
        assert_eq!(Dialect::from_url("postgres://localhost/db"), Dialect::Postgres);
        assert_eq!(Dialect::from_url("sqlite::memory:"), Dialect::Sqlite);
        assert_eq!(Dialect::from_url("mysql://root@localhost/db"), Dialect::MySql);
    }

    #[test]
    fn test_row_cap() {
        assert_eq!(Dialect::Db2.row_cap(10), "FETCH FIRST 10 ROWS ONLY");
        assert_eq!(Dialect::Sqlite.row_cap(10), "LIMIT 10");
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(Dialect::Db2.quote_identifier("a\"b"), "\"a\"\"b\"");
        assert_eq!(Dialect::MySql.quote_identifier("name"), "`name`");
    }
}
