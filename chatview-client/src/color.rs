//! Terminal color support and text decoration

use crossterm::style::{Color, ResetColor, SetBackgroundColor, SetForegroundColor};

/// Named colors accepted wherever a hex code is
pub const NAMED_COLORS: &[(&str, &str)] = &[
    ("red", "#ff0000"),
    ("green", "#00ff00"),
    ("blue", "#0000ff"),
    ("yellow", "#ffff00"),
    ("magenta", "#ff00ff"),
    ("cyan", "#00ffff"),
    ("white", "#ffffff"),
    ("black", "#000000"),
    ("pink", "#eb67eb"),
    ("orange", "#ff8000"),
    ("purple", "#4c00ff"),
    ("brown", "#804e2d"),
    ("light-red", "#ff6666"),
    ("light-green", "#66ff66"),
    ("light-blue", "#6694ff"),
    ("light-yellow", "#ffff66"),
    ("light-magenta", "#ff66ff"),
    ("light-cyan", "#66ffff"),
];

/// How many colors the terminal can show
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSupport {
    None,
    Ansi16,
    Ansi256,
    TrueColor,
}

impl ColorSupport {
    /// Detect from `COLORTERM` and `TERM`
    pub fn detect() -> Self {
        let colorterm = std::env::var("COLORTERM").ok();
        let term = std::env::var("TERM").ok();
        Self::from_env(colorterm.as_deref(), term.as_deref())
    }

    pub fn from_env(colorterm: Option<&str>, term: Option<&str>) -> Self {
        if matches!(colorterm, Some("truecolor") | Some("24bit")) {
            return Self::TrueColor;
        }
        match term {
            Some(t) if t.contains("256color") => Self::Ansi256,
            Some(t) if t.contains("color") => Self::Ansi16,
            _ => Self::None,
        }
    }
}

/// `#rrggbb` or `rrggbb`
pub fn is_valid_hex_color(hex: &str) -> bool {
    let digits = hex.strip_prefix('#').unwrap_or(hex);
    digits.len() == 6 && digits.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Parse `#rrggbb` into its components
pub fn parse_hex(hex: &str) -> Option<(u8, u8, u8)> {
    let digits = hex.strip_prefix('#')?;
    if !is_valid_hex_color(digits) {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
    Some((channel(0)?, channel(2)?, channel(4)?))
}

/// Resolve a named color or hex code to a normalized `#rrggbb`
pub fn resolve_color(spec: &str) -> Option<String> {
    if let Some((_, hex)) = NAMED_COLORS.iter().find(|(name, _)| *name == spec) {
        return Some((*hex).to_string());
    }
    if is_valid_hex_color(spec) {
        let digits = spec.strip_prefix('#').unwrap_or(spec);
        return Some(format!("#{}", digits));
    }
    None
}

/// Nearest entry of the 6x6x6 color cube
pub fn rgb_to_ansi256(r: u8, g: u8, b: u8) -> u8 {
    let level = |v: u8| (6 * u16::from(v) / 256) as u8;
    16 + 36 * level(r) + 6 * level(g) + level(b)
}

fn rgb_to_ansi16(r: u8, g: u8, b: u8) -> Color {
    let bright = r.max(g).max(b) > 191;
    let on = |v: u8| v > 127;
    match (on(r), on(g), on(b), bright) {
        (false, false, false, _) => Color::Black,
        (true, false, false, false) => Color::DarkRed,
        (true, false, false, true) => Color::Red,
        (false, true, false, false) => Color::DarkGreen,
        (false, true, false, true) => Color::Green,
        (false, false, true, false) => Color::DarkBlue,
        (false, false, true, true) => Color::Blue,
        (true, true, false, false) => Color::DarkYellow,
        (true, true, false, true) => Color::Yellow,
        (true, false, true, false) => Color::DarkMagenta,
        (true, false, true, true) => Color::Magenta,
        (false, true, true, false) => Color::DarkCyan,
        (false, true, true, true) => Color::Cyan,
        (true, true, true, false) => Color::Grey,
        (true, true, true, true) => Color::White,
    }
}

/// Paints text for a terminal with known color support
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Painter {
    support: ColorSupport,
}

impl Painter {
    pub fn new(support: ColorSupport) -> Self {
        Self { support }
    }

    pub fn detect() -> Self {
        Self::new(ColorSupport::detect())
    }

    fn color(&self, hex: &str) -> Option<Color> {
        let (r, g, b) = parse_hex(hex)?;
        match self.support {
            ColorSupport::None => None,
            ColorSupport::Ansi16 => Some(rgb_to_ansi16(r, g, b)),
            ColorSupport::Ansi256 => Some(Color::AnsiValue(rgb_to_ansi256(r, g, b))),
            ColorSupport::TrueColor => Some(Color::Rgb { r, g, b }),
        }
    }

    /// Wrap `text` in a color and a reset
    ///
    /// Text is returned unchanged when `hex` is not `#rrggbb` or the
    /// terminal has no color support.
    pub fn paint(&self, text: &str, hex: &str, background: bool) -> String {
        match self.color(hex) {
            Some(color) if background => {
                format!("{}{}{}", SetBackgroundColor(color), text, ResetColor)
            }
            Some(color) => format!("{}{}{}", SetForegroundColor(color), text, ResetColor),
            None => text.to_string(),
        }
    }

    pub fn fg(&self, text: &str, hex: &str) -> String {
        self.paint(text, hex, false)
    }

    pub fn bg(&self, text: &str, hex: &str) -> String {
        self.paint(text, hex, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_support() {
        assert_eq!(
            ColorSupport::from_env(Some("truecolor"), Some("xterm")),
            ColorSupport::TrueColor
        );
        assert_eq!(
            ColorSupport::from_env(Some("24bit"), None),
            ColorSupport::TrueColor
        );
        assert_eq!(
            ColorSupport::from_env(None, Some("xterm-256color")),
            ColorSupport::Ansi256
        );
        assert_eq!(
            ColorSupport::from_env(Some("yes"), Some("xterm-color")),
            ColorSupport::Ansi16
        );
        assert_eq!(ColorSupport::from_env(None, Some("dumb")), ColorSupport::None);
        assert_eq!(ColorSupport::from_env(None, None), ColorSupport::None);
    }

    #[test]
    fn test_valid_hex() {
        assert!(is_valid_hex_color("#a0B1c2"));
        assert!(is_valid_hex_color("a0b1c2"));
        assert!(!is_valid_hex_color("#a0b1c"));
        assert!(!is_valid_hex_color("#a0b1c2d"));
        assert!(!is_valid_hex_color("#g0b1c2"));
        assert!(!is_valid_hex_color(""));
    }

    #[test]
    fn test_parse_hex_requires_hash() {
        assert_eq!(parse_hex("#FF69B4"), Some((0xff, 0x69, 0xb4)));
        assert_eq!(parse_hex("FF69B4"), None);
        assert_eq!(parse_hex("#FF69B"), None);
    }

    #[test]
    fn test_resolve_color() {
        assert_eq!(resolve_color("light-cyan").as_deref(), Some("#66ffff"));
        assert_eq!(resolve_color("123abc").as_deref(), Some("#123abc"));
        assert_eq!(resolve_color("#123abc").as_deref(), Some("#123abc"));
        assert_eq!(resolve_color("chartreuse"), None);
    }

    #[test]
    fn test_ansi256_cube() {
        assert_eq!(rgb_to_ansi256(0, 0, 0), 16);
        assert_eq!(rgb_to_ansi256(255, 255, 255), 231);
        assert_eq!(rgb_to_ansi256(255, 0, 0), 196);
    }

    #[test]
    fn test_paint_truecolor() {
        let painter = Painter::new(ColorSupport::TrueColor);
        assert_eq!(painter.fg("hi", "#010203"), "\x1b[38;2;1;2;3mhi\x1b[0m");
        assert_eq!(painter.bg("hi", "#010203"), "\x1b[48;2;1;2;3mhi\x1b[0m");
    }

    #[test]
    fn test_paint_ansi256() {
        let painter = Painter::new(ColorSupport::Ansi256);
        assert_eq!(painter.fg("hi", "#ff0000"), "\x1b[38;5;196mhi\x1b[0m");
    }

    #[test]
    fn test_paint_passthrough() {
        let none = Painter::new(ColorSupport::None);
        assert_eq!(none.fg("hi", "#ff0000"), "hi");

        let truecolor = Painter::new(ColorSupport::TrueColor);
        assert_eq!(truecolor.fg("hi", "red"), "hi");
        assert_eq!(truecolor.fg("hi", ""), "hi");
    }

    #[test]
    fn test_ansi16_approximation() {
        assert_eq!(rgb_to_ansi16(0, 0, 0), Color::Black);
        assert_eq!(rgb_to_ansi16(255, 0, 0), Color::Red);
        assert_eq!(rgb_to_ansi16(0x80, 0, 0), Color::DarkRed);
        assert_eq!(rgb_to_ansi16(255, 255, 255), Color::White);
    }
}
