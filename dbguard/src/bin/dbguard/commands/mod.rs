pub mod key;
pub mod list;
pub mod parse;
pub mod resolve;

use dbguard::Dialect;

/// clap value parser accepting the usual adapter names.
pub fn parse_dialect(value: &str) -> Result<Dialect, String> {
    value.parse::<Dialect>().map_err(|err| err.to_string())
}
