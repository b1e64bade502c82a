use anyhow::Result;
use clap::ValueEnum;
use comfy_table::{Attribute, Cell, Color as TableColor, Table, presets};
use serde::Serialize;

use crate::theme::Tone;

/// How command results are printed.
#[derive(Clone, Copy, Debug, ValueEnum, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Bordered table (default)
    #[default]
    Table,
    /// Pretty-printed JSON for scripts
    Json,
    /// One line per result
    Compact,
}

#[derive(Clone, Debug, Default)]
pub struct GlobalOptions {
    pub output_format: OutputFormat,
    pub quiet: bool,
    pub no_color: bool,
}

/// A command result that can be printed in every `OutputFormat`.
pub trait Render: Serialize {
    fn to_table(&self, options: &GlobalOptions) -> Table;
    fn to_compact(&self) -> String;
}

pub struct OutputManager {
    pub options: GlobalOptions,
}

impl OutputManager {
    pub fn new(options: GlobalOptions) -> Self {
        Self { options }
    }

    pub fn display<R: Render>(&self, report: &R) -> Result<()> {
        if self.options.quiet {
            return Ok(());
        }
        let rendered = match self.options.output_format {
            OutputFormat::Json => serde_json::to_string_pretty(report)?,
            OutputFormat::Table => report.to_table(&self.options).to_string(),
            OutputFormat::Compact => report.to_compact(),
        };
        println!("{rendered}");
        Ok(())
    }

    pub fn resolved(&self, message: &str) {
        self.status(Tone::Resolved, message);
    }

    pub fn reraised(&self, message: &str) {
        self.status(Tone::Reraised, message);
    }

    pub fn note(&self, message: &str) {
        self.status(Tone::Note, message);
    }

    /// Printed to stderr even in quiet or JSON mode.
    pub fn failure(&self, message: &str) {
        eprintln!("{}", self.line(Tone::Failure, message));
    }

    // Status lines would break JSON consumers.
    fn status(&self, tone: Tone, message: &str) {
        if self.options.quiet || self.options.output_format == OutputFormat::Json {
            return;
        }
        println!("{}", self.line(tone, message));
    }

    fn line(&self, tone: Tone, message: &str) -> String {
        let colour = !self.options.no_color;
        format!("{} {}", tone.paint(tone.glyph(), colour), tone.paint(message, colour))
    }
}

fn label(options: &GlobalOptions, text: &str) -> Cell {
    let cell = Cell::new(text).add_attribute(Attribute::Bold);
    if options.no_color { cell } else { cell.fg(TableColor::Cyan) }
}

/// Empty table with the preset for the colour mode and an optional header row.
pub fn table(options: &GlobalOptions, headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(if options.no_color {
        presets::ASCII_FULL
    } else {
        presets::UTF8_FULL_CONDENSED
    });
    if !headers.is_empty() {
        let header: Vec<Cell> = headers.iter().map(|text| label(options, text)).collect();
        table.set_header(header);
    }
    table
}

/// Two-column table of labelled values.
pub fn key_value_table(options: &GlobalOptions, rows: &[(&str, String)]) -> Table {
    let mut table = table(options, &[]);
    for (name, value) in rows {
        table.add_row(vec![label(options, name), Cell::new(value)]);
    }
    table
}

pub fn or_dash(value: Option<&str>) -> String {
    value.unwrap_or("-").to_string()
}
