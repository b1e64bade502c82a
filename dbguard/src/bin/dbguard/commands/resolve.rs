use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, ValueEnum};
use comfy_table::Table;
use dbguard::{
    DatabaseError, DatabaseErrorKind, DbGuardConfig, DynamicRecord, Evidence, Record, Registry, Resolution,
    Resolver, ValidationIssue,
};
use serde::Serialize;
use serde_json::Value;

use crate::examples::ExampleGroup;
use crate::output::{GlobalOptions, OutputManager, Render, key_value_table, or_dash};

pub const EXAMPLES: &[ExampleGroup] = &[
    ExampleGroup {
        title: "Resolve a violation against declarations",
        commands: &[
            "dbguard resolve --config dbguard.toml --class Entity 'UNIQUE constraint failed: entities.field'",
            "dbguard resolve --config dbguard.toml --class Post --kind foreign-key --attr company_id=2 '<message>'",
        ],
    },
    ExampleGroup {
        title: "Scripting",
        commands: &["dbguard --output json resolve --config dbguard.toml --class Entity '<message>' || echo unresolved"],
    },
];

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ViolationKind {
    Unique,
    ForeignKey,
}

#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Path to the declarations file
    #[arg(long, short, env = "DBGUARD_CONFIG")]
    pub config: PathBuf,

    /// Class of the record being saved
    #[arg(long)]
    pub class: String,

    /// Violation kind; guessed from the message when omitted
    #[arg(long, value_enum)]
    pub kind: Option<ViolationKind>,

    /// Record attribute as name=value (value parsed as JSON, else taken as a string)
    #[arg(long = "attr", value_parser = parse_attribute)]
    pub attributes: Vec<(String, Value)>,

    /// Raw driver error message
    pub message: String,
}

fn parse_attribute(raw: &str) -> Result<(String, Value), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{raw}'"))?;
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((name.trim().to_string(), value))
}

#[derive(Debug, Serialize)]
pub struct ResolveReport {
    pub class: String,
    pub kind: DatabaseErrorKind,
    pub evidence: Evidence,
    pub resolution: Resolution,
    pub errors: Vec<ValidationIssue>,
}

impl ResolveReport {
    pub fn is_resolved(&self) -> bool {
        self.resolution.is_resolved()
    }
}

impl Render for ResolveReport {
    fn to_table(&self, options: &GlobalOptions) -> Table {
        let keys = self
            .evidence
            .keys
            .iter()
            .map(|key| key.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let matched = match &self.resolution {
            Resolution::Resolved { class, key } => format!("{class} {key}"),
            Resolution::Unhandled => "unhandled (would re-raise)".to_string(),
        };
        let errors = self
            .errors
            .iter()
            .map(|issue| format!("{} {} ({})", issue.field, issue.message, issue.code))
            .collect::<Vec<_>>()
            .join("\n");
        key_value_table(
            options,
            &[
                ("Class", self.class.clone()),
                ("Kind", self.kind.to_string()),
                ("Index name", or_dash(self.evidence.index_name.as_deref())),
                ("Columns", self.evidence.columns.join(", ")),
                ("Foreign key column", or_dash(self.evidence.foreign_key_column.as_deref())),
                ("Lookup keys", keys),
                ("Matched", matched),
                ("Errors", errors),
            ],
        )
    }

    fn to_compact(&self) -> String {
        match &self.resolution {
            Resolution::Resolved { class, key } => format!("resolved {class} {key}"),
            Resolution::Unhandled => "unhandled".to_string(),
        }
    }
}

pub fn build_report(registry: &Registry, args: &ResolveArgs) -> ResolveReport {
    let error = match args.kind {
        Some(ViolationKind::Unique) => DatabaseError::record_not_unique(&args.message),
        Some(ViolationKind::ForeignKey) => DatabaseError::invalid_foreign_key(&args.message),
        None => DatabaseError::classify(&args.message),
    };

    let mut record = DynamicRecord::new(&args.class);
    for (name, value) in &args.attributes {
        record.set(name, value.clone());
    }

    let resolver = Resolver::new(registry);
    let evidence = resolver.evidence(&args.class, &error);
    let resolution = resolver.handle_error(&mut record, &error);
    ResolveReport {
        class: args.class.clone(),
        kind: error.kind,
        evidence,
        resolution,
        errors: record.errors().iter().cloned().collect(),
    }
}

/// Returns whether the violation was resolved.
pub fn handle_resolve(args: ResolveArgs, output: &OutputManager) -> Result<bool> {
    let config = DbGuardConfig::load(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;
    let registry = config.build_registry().context("Invalid declarations")?;
    if !registry.is_defined(&args.class) {
        bail!("class '{}' is not defined in {}", args.class, args.config.display());
    }

    let report = build_report(&registry, &args);
    output.display(&report)?;
    if report.is_resolved() {
        output.resolved("violation resolved into validation errors");
    } else {
        output.reraised("no declaration matches; the database error would be re-raised");
    }
    Ok(report.is_resolved())
}
