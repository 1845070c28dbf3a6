use clap::ValueEnum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliDisplayMode {
  Auto,
  Kitty,
  Direct,
  Ascii,
}

/// How thumbnails are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
  Ascii,
  Direct,
  Kitty,
}

impl DisplayMode {
  pub const ALL: [DisplayMode; 3] = [DisplayMode::Kitty, DisplayMode::Direct, DisplayMode::Ascii];

  pub fn next(self) -> Self {
    let idx = Self::ALL.iter().position(|m| *m == self).unwrap_or(0);
    Self::ALL[(idx + 1) % Self::ALL.len()]
  }

  pub fn label(self) -> &'static str {
    match self {
      DisplayMode::Ascii => "ascii",
      DisplayMode::Direct => "half-block",
      DisplayMode::Kitty => "kitty",
    }
  }

  /// Parse a stored preference. `None` means "detect".
  pub fn from_config(s: &str) -> Option<Self> {
    match s.to_lowercase().as_str() {
      "ascii" => Some(DisplayMode::Ascii),
      "direct" | "half-block" => Some(DisplayMode::Direct),
      "kitty" => Some(DisplayMode::Kitty),
      _ => None,
    }
  }
}

/// Detect the best display mode the terminal supports.
///
/// Probe order: Kitty graphics > true-color half-block > ASCII
fn detect_display_mode(term: &str, term_program: &str, colorterm: &str) -> DisplayMode {
  let term_program = term_program.to_lowercase();
  if term == "xterm-kitty" || matches!(term_program.as_str(), "kitty" | "wezterm" | "ghostty") {
    return DisplayMode::Kitty;
  }

  let colorterm = colorterm.to_lowercase();
  if colorterm == "truecolor" || colorterm == "24bit" {
    return DisplayMode::Direct;
  }

  DisplayMode::Ascii
}

/// CLI flag wins, then the saved preference, then terminal detection.
pub fn resolve_display_mode(cli: CliDisplayMode, saved: Option<&str>) -> DisplayMode {
  match cli {
    CliDisplayMode::Kitty => DisplayMode::Kitty,
    CliDisplayMode::Direct => DisplayMode::Direct,
    CliDisplayMode::Ascii => DisplayMode::Ascii,
    CliDisplayMode::Auto => saved.and_then(DisplayMode::from_config).unwrap_or_else(|| {
      let var = |name: &str| std::env::var(name).unwrap_or_default();
      detect_display_mode(&var("TERM"), &var("TERM_PROGRAM"), &var("COLORTERM"))
    }),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn kitty_detected_from_term_or_program() {
    assert_eq!(detect_display_mode("xterm-kitty", "", ""), DisplayMode::Kitty);
    assert_eq!(detect_display_mode("xterm-256color", "WezTerm", ""), DisplayMode::Kitty);
  }

  #[test]
  fn truecolor_gets_half_blocks() {
    assert_eq!(detect_display_mode("xterm-256color", "Apple_Terminal", "truecolor"), DisplayMode::Direct);
  }

  #[test]
  fn fallback_is_ascii() {
    assert_eq!(detect_display_mode("xterm", "", ""), DisplayMode::Ascii);
  }

  #[test]
  fn labels_parse_back_and_cycle_wraps() {
    for mode in DisplayMode::ALL {
      assert_eq!(DisplayMode::from_config(mode.label()), Some(mode));
    }
    assert_eq!(DisplayMode::Ascii.next(), DisplayMode::Kitty);
  }

  #[test]
  fn explicit_flag_beats_saved_preference() {
    assert_eq!(resolve_display_mode(CliDisplayMode::Ascii, Some("kitty")), DisplayMode::Ascii);
    assert_eq!(resolve_display_mode(CliDisplayMode::Auto, Some("kitty")), DisplayMode::Kitty);
  }
}
