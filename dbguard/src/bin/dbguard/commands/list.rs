use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Args;
use comfy_table::{Cell, Table};
use dbguard::{DbGuardConfig, Registry, ValidatorSummary};
use serde::Serialize;

use crate::examples::ExampleGroup;
use crate::output::{GlobalOptions, OutputManager, Render, or_dash, table};

pub const EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Enumerate declarations",
    commands: &[
        "dbguard list --config dbguard.toml --class Entity",
        "dbguard --output json list --config dbguard.toml --class Post",
    ],
}];

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Path to the declarations file
    #[arg(long, short, env = "DBGUARD_CONFIG")]
    pub config: PathBuf,

    /// Class whose validators (own and inherited) are listed
    #[arg(long)]
    pub class: String,
}

#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct ValidatorList(pub Vec<ValidatorSummary>);

impl Render for ValidatorList {
    fn to_table(&self, options: &GlobalOptions) -> Table {
        let mut table = table(
            options,
            &["Class", "Kind", "Attribute", "Columns", "Index", "Key", "Message"],
        );
        for summary in &self.0 {
            table.add_row(vec![
                Cell::new(&summary.class),
                Cell::new(summary.kind),
                Cell::new(&summary.attribute),
                Cell::new(summary.columns.join(", ")),
                Cell::new(or_dash(summary.index_name.as_deref())),
                Cell::new(&summary.key),
                Cell::new(or_dash(summary.message.as_deref())),
            ]);
        }
        table
    }

    fn to_compact(&self) -> String {
        self.0
            .iter()
            .map(|summary| summary.key.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

pub fn collect(registry: &Registry, class: &str) -> ValidatorList {
    let uniqueness = registry
        .uniqueness_validators(class)
        .into_iter()
        .map(|validator| validator.summary());
    let belongs_to = registry
        .belongs_to_presence_validators(class)
        .into_iter()
        .map(|validator| validator.summary());
    ValidatorList(uniqueness.chain(belongs_to).collect())
}

pub fn handle_list(args: ListArgs, output: &OutputManager) -> Result<()> {
    let config = DbGuardConfig::load(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;
    let registry = config.build_registry().context("Invalid declarations")?;
    if !registry.is_defined(&args.class) {
        bail!("class '{}' is not defined in {}", args.class, args.config.display());
    }

    let list = collect(&registry, &args.class);
    if list.0.is_empty() {
        output.note(&format!("{} declares no database validations", args.class));
        return Ok(());
    }
    output.display(&list)
}
