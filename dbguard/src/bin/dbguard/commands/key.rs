use anyhow::Result;
use clap::{Args, ValueEnum};
use comfy_table::Table;
use dbguard::{ConstraintKey, KeyKind, keys::unify_columns};
use serde::Serialize;

use crate::examples::ExampleGroup;
use crate::output::{GlobalOptions, OutputManager, Render, key_value_table};

pub const EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Canonical keys",
    commands: &[
        "dbguard key uniqueness tenant_id email",
        "dbguard key uniqueness-index index_users_on_email",
        "dbguard key belongs-to company_id",
    ],
}];

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum KeyKindArg {
    UniquenessIndex,
    Uniqueness,
    BelongsTo,
}

impl From<KeyKindArg> for KeyKind {
    fn from(kind: KeyKindArg) -> Self {
        match kind {
            KeyKindArg::UniquenessIndex => KeyKind::UniquenessIndex,
            KeyKindArg::Uniqueness => KeyKind::Uniqueness,
            KeyKindArg::BelongsTo => KeyKind::BelongsTo,
        }
    }
}

#[derive(Args, Debug)]
pub struct KeyArgs {
    /// Key namespace
    #[arg(value_enum)]
    pub kind: KeyKindArg,

    /// Column names (or a single index name)
    #[arg(required = true)]
    pub columns: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct KeyReport {
    pub kind: KeyKind,
    pub columns: Vec<String>,
    pub key: ConstraintKey,
}

impl Render for KeyReport {
    fn to_table(&self, options: &GlobalOptions) -> Table {
        key_value_table(
            options,
            &[
                ("Kind", self.kind.to_string()),
                ("Columns", self.columns.join(", ")),
                ("Key", self.key.to_string()),
            ],
        )
    }

    fn to_compact(&self) -> String {
        self.key.to_string()
    }
}

pub fn build_report(args: &KeyArgs) -> KeyReport {
    let kind = KeyKind::from(args.kind);
    KeyReport {
        kind,
        columns: unify_columns(&args.columns),
        key: ConstraintKey::new(kind, &args.columns),
    }
}

pub fn handle_key(args: KeyArgs, output: &OutputManager) -> Result<()> {
    output.display(&build_report(&args))
}
