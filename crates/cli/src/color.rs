// SPDX-License-Identifier: MIT

use clap::builder::styling::{Ansi256Color, Color, Style, Styles};
use std::io::IsTerminal;

pub mod codes {
    /// Section headers.
    pub const HEADER: u8 = 74;
    /// Status values in a good/running state.
    pub const OK: u8 = 35;
    /// Status values in a failed/error state.
    pub const ERR: u8 = 203;
    /// Muted / secondary text: timestamps, ids, hints.
    pub const MUTED: u8 = 245;
}

/// Determine if color output should be enabled.
///
/// Priority: `NO_COLOR=1` disables → `COLOR=1` forces → TTY check.
pub fn should_colorize() -> bool {
    if std::env::var("NO_COLOR").is_ok_and(|v| v == "1") {
        return false;
    }
    if std::env::var("COLOR").is_ok_and(|v| v == "1") {
        return true;
    }
    std::io::stdout().is_terminal()
}

/// Build clap `Styles` using the project palette.
pub fn styles() -> Styles {
    if !should_colorize() {
        return Styles::plain();
    }
    Styles::styled()
        .header(Style::new().fg_color(Some(Color::Ansi256(Ansi256Color(codes::HEADER)))))
        .literal(Style::new().fg_color(Some(Color::Ansi256(Ansi256Color(codes::MUTED)))))
}

fn fg256(code: u8) -> String {
    format!("\x1b[38;5;{code}m")
}

const RESET: &str = "\x1b[0m";

pub fn header(text: &str) -> String {
    paint(codes::HEADER, text)
}

pub fn muted(text: &str) -> String {
    paint(codes::MUTED, text)
}

/// Color a status string by whether it names a terminal-success,
/// terminal-failure, or in-flight state.
pub fn status(text: &str) -> String {
    match text {
        "completed" | "running" | "succeeded" => paint(codes::OK, text),
        "failed" | "cancelled" | "timed_out" | "error" => paint(codes::ERR, text),
        _ => text.to_string(),
    }
}

fn paint(code: u8, text: &str) -> String {
    if should_colorize() {
        format!("{}{}{}", fg256(code), text, RESET)
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_color_env_disables_colorizing() {
        std::env::set_var("NO_COLOR", "1");
        std::env::remove_var("COLOR");
        assert!(!should_colorize());
        std::env::remove_var("NO_COLOR");
    }

    #[test]
    fn unknown_status_text_passes_through_unpainted() {
        std::env::set_var("NO_COLOR", "1");
        assert_eq!(status("pending"), "pending");
        std::env::remove_var("NO_COLOR");
    }
}
