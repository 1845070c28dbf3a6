use ratatui::style::Color;

/// Colour palette for the whole UI.
#[derive(Debug)]
pub struct Theme {
  pub name: &'static str,
  pub bg: Color,
  pub fg: Color,
  pub accent: Color,
  pub muted: Color,
  pub border: Color,
  pub highlight_fg: Color,
  pub highlight_bg: Color,
  pub stripe_bg: Color,
  pub status: Color,
  pub error: Color,
  pub key_fg: Color,
  pub key_bg: Color,
}

pub const THEMES: [Theme; 3] = [
  Theme {
    name: "midnight",
    bg: Color::Rgb(22, 24, 33),
    fg: Color::Rgb(214, 219, 232),
    accent: Color::Rgb(120, 200, 255),
    muted: Color::Rgb(110, 118, 140),
    border: Color::Rgb(60, 66, 86),
    highlight_fg: Color::Rgb(22, 24, 33),
    highlight_bg: Color::Rgb(120, 200, 255),
    stripe_bg: Color::Rgb(28, 31, 42),
    status: Color::Rgb(240, 200, 110),
    error: Color::Rgb(240, 110, 110),
    key_fg: Color::Rgb(22, 24, 33),
    key_bg: Color::Rgb(110, 118, 140),
  },
  Theme {
    name: "paper",
    bg: Color::Rgb(248, 246, 240),
    fg: Color::Rgb(40, 40, 40),
    accent: Color::Rgb(0, 120, 170),
    muted: Color::Rgb(130, 130, 120),
    border: Color::Rgb(200, 196, 186),
    highlight_fg: Color::Rgb(248, 246, 240),
    highlight_bg: Color::Rgb(0, 120, 170),
    stripe_bg: Color::Rgb(240, 237, 229),
    status: Color::Rgb(170, 110, 0),
    error: Color::Rgb(190, 40, 40),
    key_fg: Color::Rgb(248, 246, 240),
    key_bg: Color::Rgb(130, 130, 120),
  },
  Theme {
    name: "terminal",
    bg: Color::Reset,
    fg: Color::Reset,
    accent: Color::Cyan,
    muted: Color::DarkGray,
    border: Color::DarkGray,
    highlight_fg: Color::Black,
    highlight_bg: Color::Cyan,
    stripe_bg: Color::Reset,
    status: Color::Yellow,
    error: Color::Red,
    key_fg: Color::Black,
    key_bg: Color::Gray,
  },
];

/// Index of the theme called `name`, or the first theme.
pub fn index_of(name: Option<&str>) -> usize {
  name.and_then(|name| THEMES.iter().position(|t| t.name == name)).unwrap_or(0)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn known_theme_is_found() {
    assert_eq!(index_of(Some("paper")), 1);
  }

  #[test]
  fn unknown_or_missing_theme_falls_back_to_first() {
    assert_eq!(index_of(Some("nope")), 0);
    assert_eq!(index_of(None), 0);
  }

  #[test]
  fn theme_names_are_unique() {
    for (i, a) in THEMES.iter().enumerate() {
      assert!(THEMES.iter().skip(i + 1).all(|b| b.name != a.name));
    }
  }
}
