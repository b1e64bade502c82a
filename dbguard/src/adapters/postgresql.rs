use once_cell::sync::Lazy;
use regex::Regex;

use super::{Dialect, MessageParser, bare_column};

static INDEX_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"unique constraint "([^"]+)""#).expect("valid index name pattern"));

static UNIQUE_COLUMNS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Key \((.+?)\)=\(.*\) already exists").expect("valid unique columns pattern"));

static FOREIGN_KEY_COLUMN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"Key \(([^)]+)\)=\(.*\) is not present in table"#).expect("valid foreign key pattern")
});

/// Parses PostgreSQL messages such as
///
/// ```text
/// ERROR:  duplicate key value violates unique constraint "index_entities_on_field"
/// DETAIL:  Key (field)=(0) already exists.
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresqlParser;

impl MessageParser for PostgresqlParser {
    fn dialect(&self) -> Dialect {
        Dialect::Postgresql
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
        split_columns(&captures[1])
    }

    fn foreign_key_error_column(&self, message: &str) -> Option<String> {
        let captures = FOREIGN_KEY_COLUMN.captures(message)?;
        split_columns(&captures[1]).into_iter().next()
    }
}

fn split_columns(list: &str) -> Vec<String> {
    list.split(", ")
        .map(bare_column)
        .filter(|column| !column.is_empty())
        .collect()
}
