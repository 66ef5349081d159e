use colored::{Color, Colorize};
use once_cell::sync::Lazy;

/// Colors used by the help screens and status lines.
pub struct ColorTheme {
    pub success: Color,
    pub error: Color,
    pub warning: Color,
    pub info: Color,
    pub accent: Color,
    pub muted: Color,
    pub title: Color,
    pub command: Color,
    pub key: Color,
    pub value: Color,
}

pub static THEME: Lazy<ColorTheme> = Lazy::new(|| ColorTheme {
    success: Color::Green,
    error: Color::Red,
    warning: Color::Yellow,
    info: Color::Blue,
    accent: Color::Cyan,
    muted: Color::BrightBlack,
    title: Color::BrightMagenta,
    command: Color::Magenta,
    key: Color::BrightCyan,
    value: Color::White,
});

pub struct Icons {
    pub success: &'static str,
    pub error: &'static str,
    pub warning: &'static str,
    pub info: &'static str,
    pub arrow: &'static str,
    pub bullet: &'static str,
    pub loading: &'static str,
    pub up: &'static str,
    pub down: &'static str,
    pub star: &'static str,
}

pub const ICONS: Icons = Icons {
    success: "✓",
    error: "✗",
    warning: "⚠",
    info: "ℹ",
    arrow: "→",
    bullet: "•",
    loading: "⟳",
    up: "▲",
    down: "▼",
    star: "★",
};

/// Colors `text` unless color output is off.
pub fn paint(text: &str, color: Color, bold: bool, enabled: bool) -> String {
    match (enabled, bold) {
        (false, _) => text.to_string(),
        (true, false) => text.color(color).to_string(),
        (true, true) => text.color(color).bold().to_string(),
    }
}
