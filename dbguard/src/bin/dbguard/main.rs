mod commands;
mod examples;
mod output;
mod theme;

use std::process::ExitCode;

use anyhow::Result;
use clap::{ColorChoice, Command, CommandFactory, FromArgMatches, Parser, Subcommand};
use colored::control::ShouldColorize;

use commands::{
    key::{KeyArgs, handle_key},
    list::{ListArgs, handle_list},
    parse::{ParseArgs, handle_parse},
    resolve::{ResolveArgs, handle_resolve},
};
use examples::{ExampleGroup, command_examples};
use output::{GlobalOptions, OutputFormat, OutputManager};
use theme::{Tone, help_styles};

/// Exit status of `resolve` when the error would be re-raised.
const EXIT_UNRESOLVED: u8 = 2;

const ENVIRONMENT: &[(&str, &str)] = &[
    ("DBGUARD_CONFIG", "Declarations file used by resolve and list"),
    ("RUST_LOG", "Log filter, e.g. dbguard=debug"),
    ("NO_COLOR", "Disable colours"),
];

#[derive(Parser)]
#[command(name = "dbguard", version)]
#[command(
    about = "Inspect how database constraint violations map to validation errors",
    long_about = "Works with dbguard declarations: computes canonical constraint keys, \
parses raw unique and foreign key violation messages per dialect, and dry-runs \
the resolution of a violation against a declarations file."
)]
#[command(subcommand_required = true, arg_required_else_help = true)]
struct Cli {
    /// Output format
    #[arg(long, value_enum, default_value = "table", global = true)]
    output: OutputFormat,

    /// Only print errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log each resolution step
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the canonical key for a column set or index name
    Key(KeyArgs),

    /// Extract index name, columns and foreign key column from a driver message
    Parse(ParseArgs),

    /// Resolve a driver message against a declarations file
    Resolve(ResolveArgs),

    /// List the validators declared on a class and its ancestors
    List(ListArgs),
}

fn command(colour: bool) -> Command {
    let mut command = Cli::command()
        .styles(help_styles())
        .color(if colour { ColorChoice::Auto } else { ColorChoice::Never })
        .after_long_help(environment_help(colour));
    for (name, groups) in command_examples() {
        if let Some(subcommand) = command.find_subcommand_mut(name) {
            *subcommand = subcommand.clone().after_long_help(examples_help(groups, colour));
        }
    }
    command
}

fn examples_help(groups: &[ExampleGroup], colour: bool) -> String {
    let mut lines = vec![Tone::Heading.paint("Examples:", colour)];
    for (index, group) in groups.iter().enumerate() {
        if index > 0 {
            lines.push(String::new());
        }
        lines.push(format!("  {}", Tone::Heading.paint(group.title, colour)));
        for invocation in group.commands {
            lines.push(format!(
                "    {} {}",
                Tone::Command.paint(Tone::Command.glyph(), colour),
                Tone::Command.paint(invocation, colour)
            ));
        }
    }
    lines.join("\n")
}

fn environment_help(colour: bool) -> String {
    let mut lines = vec![Tone::Heading.paint("Environment Variables:", colour)];
    let width = ENVIRONMENT.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
    for (name, description) in ENVIRONMENT {
        lines.push(format!(
            "  {}  {description}",
            Tone::Heading.paint(&format!("{name:<width$}"), colour)
        ));
    }
    lines.push(String::new());
    lines.push(format!(
        "{} {}",
        Tone::Heading.paint("Tip:", colour),
        Tone::Dim.paint("'dbguard <command> --help' shows examples for each command.", colour)
    ));
    lines.join("\n")
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();
}

fn run(command: Commands, output: &OutputManager) -> Result<ExitCode> {
    match command {
        Commands::Key(args) => handle_key(args, output)?,
        Commands::Parse(args) => handle_parse(args, output)?,
        Commands::Resolve(args) => {
            if !handle_resolve(args, output)? {
                return Ok(ExitCode::from(EXIT_UNRESOLVED));
            }
        }
        Commands::List(args) => handle_list(args, output)?,
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let colour = ShouldColorize::from_env().should_colorize();
    let matches = command(colour).get_matches();
    let cli = match Cli::from_arg_matches(&matches) {
        Ok(cli) => cli,
        Err(err) => err.exit(),
    };
    init_logging(cli.verbose);

    let output = OutputManager::new(GlobalOptions {
        output_format: cli.output,
        quiet: cli.quiet,
        no_color: cli.no_color || !colour,
    });

    match run(cli.command, &output) {
        Ok(code) => code,
        Err(err) => {
            output.failure(&format!("{err:#}"));
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        command(false).debug_assert();
    }

    #[test]
    fn every_subcommand_has_examples() {
        let command = command(false);
        for (name, groups) in command_examples() {
            assert!(command.find_subcommand(name).is_some(), "{name}");
            assert!(!groups.is_empty());
        }
    }

    #[test]
    fn plain_help_has_no_escape_codes() {
        let help = examples_help(commands::key::EXAMPLES, false);
        assert!(help.starts_with("Examples:"));
        assert!(!help.contains('\u{1b}'));
    }
}
