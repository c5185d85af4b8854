//! Statement checks applied right before execution.

use crate::binding::{tokenize, Token};
use crate::error::{SqlPipeError, SqlPipeResult};
use crate::transpiler::Dialect;

/// Rewrites or rejects a resolved statement before it reaches the store.
pub trait StatementSanitizer: Send + Sync {
    fn sanitize(&self, sql: &str, row_limit: u64, select_only: bool) -> SqlPipeResult<String>;
}

/// Default sanitizer.
///
/// Strips a trailing `;`, rejects anything but `SELECT`, `WITH` and `VALUES`
/// when `select_only` is set, and caps reads that carry no row cap of their
/// own.
#[derive(Debug, Clone, Copy, Default)]
pub struct RowCapSanitizer {
    dialect: Dialect,
}

impl RowCapSanitizer {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }
}

const READ_KEYWORDS: &[&str] = &["SELECT", "WITH", "VALUES"];
const CAP_KEYWORDS: &[&str] = &["LIMIT", "FETCH"];

impl StatementSanitizer for RowCapSanitizer {
    fn sanitize(&self, sql: &str, row_limit: u64, select_only: bool) -> SqlPipeResult<String> {
        let sql = sql.trim().trim_end_matches(';').trim_end();
        if sql.is_empty() {
            return Err(SqlPipeError::Rejected("empty statement".to_string()));
        }

        let words = code_words(sql);
        let is_read = starts_with_read(&words);

        if select_only && !is_read {
            return Err(SqlPipeError::Rejected("Only SELECT is allowed.".to_string()));
        }

        // Caps inside subqueries do not bound the outer result.
        let capped = top_level_words(sql)
            .iter()
            .any(|w| CAP_KEYWORDS.contains(&w.as_str()));
        if is_read && row_limit > 0 && !capped {
            return Ok(format!("{} {}", sql, self.dialect.row_cap(row_limit)));
        }
        Ok(sql.to_string())
    }
}

/// Whether the statement is a read (`SELECT`, `WITH` or `VALUES`).
pub fn is_read_statement(sql: &str) -> bool {
    starts_with_read(&code_words(sql))
}

fn starts_with_read(words: &[String]) -> bool {
    words
        .first()
        .is_some_and(|w| READ_KEYWORDS.contains(&w.as_str()))
}

/// Uppercased words outside quotes and comments.
fn code_words(sql: &str) -> Vec<String> {
    tokenize(sql)
        .into_iter()
        .filter_map(|t| match t {
            Token::Text(s) if s.chars().next().is_some_and(char::is_alphabetic) => {
                Some(s.to_uppercase())
            }
            _ => None,
        })
        .collect()
}

/// Uppercased words outside quotes, comments and parentheses.
fn top_level_words(sql: &str) -> Vec<String> {
    let mut depth = 0usize;
    let mut words = Vec::new();
    for token in tokenize(sql) {
        match token {
            Token::Text("(") => depth += 1,
            Token::Text(")") => depth = depth.saturating_sub(1),
            Token::Text(s) if depth == 0 && s.chars().next().is_some_and(char::is_alphabetic) => {
                words.push(s.to_uppercase())
            }
            _ => {}
        }
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caps_reads() {
        let s = RowCapSanitizer::default();
        assert_eq!(
            s.sanitize("SELECT * FROM t;", 200, false).unwrap(),
            "SELECT * FROM t FETCH FIRST 200 ROWS ONLY"
        );
        assert_eq!(
            RowCapSanitizer::new(Dialect::Sqlite)
                .sanitize("with x as (select 1) select * from x", 5, false)
                .unwrap(),
            "with x as (select 1) select * from x LIMIT 5"
        );
    }

    #[test]
    fn test_existing_cap_kept() {
        let s = RowCapSanitizer::new(Dialect::Postgres);
        assert_eq!(
            s.sanitize("SELECT * FROM t LIMIT 3", 200, false).unwrap(),
            "SELECT * FROM t LIMIT 3"
        );
        // a cap keyword inside a literal does not count
        assert_eq!(
            s.sanitize("SELECT 'limit' FROM t", 10, false).unwrap(),
            "SELECT 'limit' FROM t LIMIT 10"
        );
    }

    #[test]
    fn test_subquery_cap_does_not_count() {
        let s = RowCapSanitizer::default();
        assert_eq!(
            s.sanitize(
                "SELECT * FROM (SELECT ID FROM t FETCH FIRST 1 ROWS ONLY) x",
                50,
                false
            )
            .unwrap(),
            "SELECT * FROM (SELECT ID FROM t FETCH FIRST 1 ROWS ONLY) x FETCH FIRST 50 ROWS ONLY"
        );
        assert_eq!(
            s.sanitize("SELECT * FROM (SELECT 1) x FETCH FIRST 2 ROWS ONLY", 50, false)
                .unwrap(),
            "SELECT * FROM (SELECT 1) x FETCH FIRST 2 ROWS ONLY"
        );
    }

    #[test]
    fn test_writes() {
        let s = RowCapSanitizer::default();
        assert_eq!(
            s.sanitize("DELETE FROM t WHERE id = ?", 200, false).unwrap(),
            "DELETE FROM t WHERE id = ?"
        );
        let err = s.sanitize("DELETE FROM t", 200, true).unwrap_err();
        assert_eq!(err.to_string(), "Statement rejected: Only SELECT is allowed.");
        assert!(s.sanitize(" ; ", 200, false).is_err());
    }

    #[test]
    fn test_leading_comment_ignored() {
        let s = RowCapSanitizer::default();
        assert!(s.sanitize("-- report\nSELECT 1 FROM t", 0, true).is_ok());
        assert!(is_read_statement("/* x */ values (1)"));
        assert!(!is_read_statement("INSERT INTO t SELECT * FROM u"));
    }
}
