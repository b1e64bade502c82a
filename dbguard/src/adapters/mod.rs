//! Per-dialect parsers for raw driver error messages.
//!
//! Each dialect knows the grammar of its own unique and foreign key violation
//! messages. Parsers never fail: a message they do not recognize simply
//! yields no evidence, and the resolver falls back to the next channel or
//! reports the error as unhandled.

pub mod mysql;
pub mod postgresql;
pub mod sqlite;

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

pub use mysql::MysqlParser;
pub use postgresql::PostgresqlParser;
pub use sqlite::SqliteParser;

/// Database dialects with a known error message grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Postgresql,
    Mysql,
    Sqlite,
}

impl Dialect {
    pub const ALL: [Dialect; 3] = [Dialect::Postgresql, Dialect::Mysql, Dialect::Sqlite];

    pub fn name(self) -> &'static str {
        match self {
            Dialect::Postgresql => "postgresql",
            Dialect::Mysql => "mysql",
            Dialect::Sqlite => "sqlite",
        }
    }

    /// Parser for this dialect.
    pub fn parser(self) -> &'static dyn MessageParser {
        factory(self)
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownDialect(pub String);

impl fmt::Display for UnknownDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown database dialect '{}'", self.0)
    }
}

impl std::error::Error for UnknownDialect {}

impl FromStr for Dialect {
    type Err = UnknownDialect;

    /// Accepts the usual adapter names (`postgres`, `mysql2`, `sqlite3`, ...).
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "postgresql" | "postgres" | "pg" | "postgis" => Ok(Dialect::Postgresql),
            "mysql" | "mysql2" | "trilogy" | "mariadb" => Ok(Dialect::Mysql),
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            other => Err(UnknownDialect(other.to_string())),
        }
    }
}

/// What a unique violation message told us about the offending index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    IndexName(String),
    ColumnList(Vec<String>),
    IndexAndColumns { index_name: String, columns: Vec<String> },
    NoMatch,
}

impl Extraction {
    pub fn index_name(&self) -> Option<&str> {
        match self {
            Extraction::IndexName(name) | Extraction::IndexAndColumns { index_name: name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn columns(&self) -> &[String] {
        match self {
            Extraction::ColumnList(columns) | Extraction::IndexAndColumns { columns, .. } => columns,
            _ => &[],
        }
    }
}

/// Extraction strategy for one dialect.
pub trait MessageParser: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Name of the violated unique index, when the message carries it.
    fn index_name(&self, message: &str) -> Option<String>;

    /// Columns involved in a unique violation, when the message lists them.
    fn unique_error_columns(&self, message: &str) -> Vec<String>;

    /// Column of the violated foreign key.
    fn foreign_key_error_column(&self, message: &str) -> Option<String>;

    /// Combines both unique channels into one tagged result.
    fn unique_evidence(&self, message: &str) -> Extraction {
        let index_name = self.index_name(message);
        let columns = self.unique_error_columns(message);
        match (index_name, columns.is_empty()) {
            (Some(index_name), false) => Extraction::IndexAndColumns { index_name, columns },
            (Some(index_name), true) => Extraction::IndexName(index_name),
            (None, false) => Extraction::ColumnList(columns),
            (None, true) => Extraction::NoMatch,
        }
    }
}

static POSTGRESQL: PostgresqlParser = PostgresqlParser;
static MYSQL: MysqlParser = MysqlParser;
static SQLITE: SqliteParser = SqliteParser;

/// Returns the parser registered for `dialect`.
pub fn factory(dialect: Dialect) -> &'static dyn MessageParser {
    match dialect {
        Dialect::Postgresql => &POSTGRESQL,
        Dialect::Mysql => &MYSQL,
        Dialect::Sqlite => &SQLITE,
    }
}

/// Strips quoting, casts and function wrappers from a column reported inside
/// an expression, e.g. `lower((email)::text)` becomes `email`.
pub(crate) fn bare_column(raw: &str) -> String {
    let inner = raw.rsplit('(').next().unwrap_or(raw);
    let inner = inner.split("::").next().unwrap_or(inner);
    inner
        .trim_matches(|c: char| c == ')' || c == '"' || c == '`' || c == '\'' || c.is_whitespace())
        .to_string()
}
