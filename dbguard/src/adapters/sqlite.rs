use once_cell::sync::Lazy;
use regex::Regex;

use super::{Dialect, MessageParser};

static INDEX_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"UNIQUE constraint failed: index '([^']+)'").expect("valid index name pattern"));

static UNIQUE_COLUMNS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"UNIQUE constraint failed: ((?:\w+\.\w+)(?:, \w+\.\w+)*)").expect("valid unique columns pattern")
});

/// Parses SQLite messages.
///
/// Plain column indexes are reported as `table.column` lists; expression
/// indexes are reported by name. Foreign key failures carry no column at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteParser;

impl MessageParser for SqliteParser {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn index_name(&self, message: &str) -> Option<String> {
        INDEX_NAME
            .captures(message)
            .map(|captures| captures[1].to_string())
    }

    fn unique_error_columns(&self, message: &str) -> Vec<String> {
        let Some(captures) = UNIQUE_COLUMNS.captures(message) else {
            return Vec::new();
        };
        captures[1]
            .split(", ")
            .filter_map(|qualified| qualified.rsplit_once('.').map(|(_, column)| column.to_string()))
            .collect()
    }

    fn foreign_key_error_column(&self, _message: &str) -> Option<String> {
        None
    }
}
