//! Styling and line fitting for listings.

use maintlog::Importance;
use owo_colors::{OwoColorize, colors::css};

/// Columns assumed when stdout is not a terminal.
const FALLBACK_WIDTH: usize = 100;

/// The roles text plays in command output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tone {
    Done,
    Caution,
    Alarm,
    Heading,
    Muted,
}

fn paint(text: &str, tone: Tone, color: bool) -> String {
    if !color {
        return text.to_string();
    }
    match tone {
        Tone::Done => text.fg::<css::Green>().to_string(),
        Tone::Caution => text.fg::<css::Orange>().to_string(),
        Tone::Alarm => text.fg::<css::Red>().bold().to_string(),
        Tone::Heading => text.fg::<css::LightBlue>().to_string(),
        Tone::Muted => text.dimmed().to_string(),
    }
}

fn supports_color() -> bool {
    supports_color::on(supports_color::Stream::Stdout).is_some()
}

/// Styles for command output. Plain text when colour is unavailable.
pub trait Colorize {
    /// Green, for completed changes.
    fn success(&self) -> String;
    /// Blue, for headings.
    fn info(&self) -> String;
    /// Dimmed, for labels and empty results.
    fn dim(&self) -> String;
}

impl<T: AsRef<str> + ?Sized> Colorize for T {
    fn success(&self) -> String {
        paint(self.as_ref(), Tone::Done, supports_color())
    }

    fn info(&self) -> String {
        paint(self.as_ref(), Tone::Heading, supports_color())
    }

    fn dim(&self) -> String {
        paint(self.as_ref(), Tone::Muted, supports_color())
    }
}

const fn importance_tone(level: Importance) -> Tone {
    match level {
        Importance::Low => Tone::Muted,
        Importance::Medium | Importance::High => Tone::Caution,
        Importance::Critical => Tone::Alarm,
    }
}

/// A bracketed importance tag, coloured by severity.
pub fn importance_tag(level: Importance) -> String {
    paint(&format!("[{level}]"), importance_tone(level), supports_color())
}

/// Columns left for text after an `indent`-wide label.
pub fn body_width(indent: usize) -> usize {
    terminal_size::terminal_size()
        .map_or(FALLBACK_WIDTH, |(width, _)| usize::from(width.0))
        .saturating_sub(indent)
}

/// Shortens `line` to `width` characters, marking the cut with an ellipsis.
pub fn truncate(line: &str, width: usize) -> String {
    if line.chars().count() <= width {
        line.to_string()
    } else {
        let kept: String = line.chars().take(width.saturating_sub(1)).collect();
        format!("{kept}…")
    }
}
