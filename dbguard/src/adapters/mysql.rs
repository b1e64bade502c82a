use once_cell::sync::Lazy;
use regex::Regex;

use super::{Dialect, MessageParser, bare_column};

static INDEX_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Duplicate entry '.*' for key '([^']+)'").expect("valid index name pattern"));

static FOREIGN_KEY_COLUMN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"FOREIGN KEY \(([^)]+)\) REFERENCES").expect("valid foreign key pattern"));

/// Parses MySQL / MariaDB messages.
///
/// Unique violations only name the index (`for key 'entities.index_entities_on_field'`
/// on MySQL 8, without the table prefix before that), so column evidence has to
/// come from an index catalog.
#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlParser;

impl MessageParser for MysqlParser {
    fn dialect(&self) -> Dialect {
        Dialect::Mysql
    }

    fn index_name(&self, message: &str) -> Option<String> {
        let captures = INDEX_NAME.captures(message)?;
        let qualified = &captures[1];
        let name = qualified.rsplit('.').next().unwrap_or(qualified);
        Some(name.to_string())
    }

    fn unique_error_columns(&self, _message: &str) -> Vec<String> {
        Vec::new()
    }

    fn foreign_key_error_column(&self, message: &str) -> Option<String> {
        let captures = FOREIGN_KEY_COLUMN.captures(message)?;
        captures[1]
            .split(',')
            .map(bare_column)
            .find(|column| !column.is_empty())
    }
}
