use anyhow::Result;
use clap::Args;
use comfy_table::Table;
use dbguard::{DatabaseError, DatabaseErrorKind, Dialect};
use serde::Serialize;

use super::parse_dialect;
use crate::examples::ExampleGroup;
use crate::output::{GlobalOptions, OutputManager, Render, key_value_table, or_dash};

pub const EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Inspect a driver message",
    commands: &[
        "dbguard parse --dialect postgresql 'duplicate key value violates unique constraint \"index_entities_on_field\"'",
        "dbguard parse --dialect sqlite 'UNIQUE constraint failed: entities.field'",
        "dbguard --output json parse --dialect mysql \"Duplicate entry '0' for key 'entities.index_entities_on_field'\"",
    ],
}];

#[derive(Args, Debug)]
pub struct ParseArgs {
    /// Database dialect the message comes from
    #[arg(long, short, default_value = "postgresql", value_parser = parse_dialect)]
    pub dialect: Dialect,

    /// Raw driver error message
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ParseReport {
    pub dialect: Dialect,
    pub kind: DatabaseErrorKind,
    pub index_name: Option<String>,
    pub unique_columns: Vec<String>,
    pub foreign_key_column: Option<String>,
}

impl Render for ParseReport {
    fn to_table(&self, options: &GlobalOptions) -> Table {
        let columns = if self.unique_columns.is_empty() {
            "-".to_string()
        } else {
            self.unique_columns.join(", ")
        };
        key_value_table(
            options,
            &[
                ("Dialect", self.dialect.to_string()),
                ("Kind", self.kind.to_string()),
                ("Index name", or_dash(self.index_name.as_deref())),
                ("Unique columns", columns),
                ("Foreign key column", or_dash(self.foreign_key_column.as_deref())),
            ],
        )
    }

    fn to_compact(&self) -> String {
        format!(
            "kind={:?} index={} columns={} fk={}",
            self.kind,
            or_dash(self.index_name.as_deref()),
            self.unique_columns.join(","),
            or_dash(self.foreign_key_column.as_deref())
        )
    }
}

pub fn build_report(dialect: Dialect, message: &str) -> ParseReport {
    let parser = dialect.parser();
    ParseReport {
        dialect,
        kind: DatabaseError::classify(message).kind,
        index_name: parser.index_name(message),
        unique_columns: parser.unique_error_columns(message),
        foreign_key_column: parser.foreign_key_error_column(message),
    }
}

pub fn handle_parse(args: ParseArgs, output: &OutputManager) -> Result<()> {
    let report = build_report(args.dialect, &args.message);
    if report.kind == DatabaseErrorKind::Other {
        output.note("message does not look like a unique or foreign key violation");
    }
    output.display(&report)
}
