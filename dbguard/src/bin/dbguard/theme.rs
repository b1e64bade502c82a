//! Colours and glyphs for terminal output.

use clap::builder::styling::{AnsiColor, Style, Styles};
use colored::{Color, Colorize};

/// Role a piece of output plays. Each tone has one colour and one glyph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    /// A violation absorbed into validation errors.
    Resolved,
    /// A violation the database error would be re-raised for.
    Reraised,
    Failure,
    Note,
    Heading,
    Command,
    Dim,
}

impl Tone {
    fn ansi(self) -> AnsiColor {
        match self {
            Tone::Resolved => AnsiColor::Green,
            Tone::Reraised => AnsiColor::Yellow,
            Tone::Failure => AnsiColor::Red,
            Tone::Note => AnsiColor::Blue,
            Tone::Heading => AnsiColor::Cyan,
            Tone::Command => AnsiColor::Magenta,
            Tone::Dim => AnsiColor::BrightBlack,
        }
    }

    fn color(self) -> Color {
        match self.ansi() {
            AnsiColor::Green => Color::Green,
            AnsiColor::Yellow => Color::Yellow,
            AnsiColor::Red => Color::Red,
            AnsiColor::Blue => Color::Blue,
            AnsiColor::Cyan => Color::Cyan,
            AnsiColor::Magenta => Color::Magenta,
            _ => Color::BrightBlack,
        }
    }

    pub fn glyph(self) -> &'static str {
        match self {
            Tone::Resolved => "✓",
            Tone::Reraised => "⚠",
            Tone::Failure => "✗",
            Tone::Note => "ℹ",
            Tone::Command => "→",
            Tone::Heading | Tone::Dim => "•",
        }
    }

    /// `text` in this tone's colour, or unchanged when colour is off.
    pub fn paint(self, text: &str, enabled: bool) -> String {
        if !enabled {
            return text.to_string();
        }
        let painted = text.color(self.color());
        match self {
            Tone::Heading | Tone::Failure => painted.bold().to_string(),
            _ => painted.to_string(),
        }
    }

    fn style(self) -> Style {
        Style::new().fg_color(Some(self.ansi().into()))
    }
}

/// clap help styles using the same tones as command output.
pub fn help_styles() -> Styles {
    Styles::styled()
        .usage(Tone::Heading.style().bold())
        .header(Tone::Heading.style().bold())
        .literal(Tone::Command.style())
        .placeholder(Tone::Dim.style())
        .valid(Tone::Resolved.style())
        .invalid(Tone::Reraised.style())
        .error(Tone::Failure.style().bold())
}
