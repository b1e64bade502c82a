//! Usage examples appended to each subcommand's long help.

use crate::commands::{key, list, parse, resolve};

/// A titled set of example invocations.
#[derive(Clone, Copy, Debug)]
pub struct ExampleGroup {
    pub title: &'static str,
    pub commands: &'static [&'static str],
}

/// Example groups keyed by subcommand name.
pub fn command_examples() -> [(&'static str, &'static [ExampleGroup]); 4] {
    [
        ("key", key::EXAMPLES),
        ("parse", parse::EXAMPLES),
        ("resolve", resolve::EXAMPLES),
        ("list", list::EXAMPLES),
    ]
}
