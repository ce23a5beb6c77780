use ratatui::style::Color;

pub struct Theme {
  pub name: &'static str,
  pub bg: Color,
  pub fg: Color,
  pub accent: Color,
  pub muted: Color,
  pub border: Color,
  pub highlight_fg: Color,
  pub highlight_bg: Color,
  pub tag_fg: Color,
  pub tag_bg: Color,
  pub playing: Color,
  pub status: Color,
  pub error: Color,
  pub key_fg: Color,
  pub key_bg: Color,
}

pub static THEMES: [Theme; 3] = [
  Theme {
    name: "Night",
    bg: Color::Rgb(22, 24, 33),
    fg: Color::Rgb(220, 222, 232),
    accent: Color::Rgb(137, 180, 250),
    muted: Color::Rgb(120, 124, 145),
    border: Color::Rgb(62, 66, 88),
    highlight_fg: Color::Rgb(22, 24, 33),
    highlight_bg: Color::Rgb(137, 180, 250),
    tag_fg: Color::Rgb(22, 24, 33),
    tag_bg: Color::Rgb(166, 218, 149),
    playing: Color::Rgb(243, 139, 168),
    status: Color::Rgb(249, 226, 175),
    error: Color::Rgb(237, 135, 150),
    key_fg: Color::Rgb(22, 24, 33),
    key_bg: Color::Rgb(120, 124, 145),
  },
  Theme {
    name: "Paper",
    bg: Color::Rgb(250, 247, 240),
    fg: Color::Rgb(40, 40, 46),
    accent: Color::Rgb(30, 102, 245),
    muted: Color::Rgb(130, 126, 118),
    border: Color::Rgb(204, 198, 186),
    highlight_fg: Color::Rgb(250, 247, 240),
    highlight_bg: Color::Rgb(30, 102, 245),
    tag_fg: Color::Rgb(250, 247, 240),
    tag_bg: Color::Rgb(64, 160, 43),
    playing: Color::Rgb(210, 15, 57),
    status: Color::Rgb(223, 142, 29),
    error: Color::Rgb(204, 0, 0),
    key_fg: Color::Rgb(250, 247, 240),
    key_bg: Color::Rgb(130, 126, 118),
  },
  Theme {
    name: "Mono",
    bg: Color::Reset,
    fg: Color::White,
    accent: Color::White,
    muted: Color::DarkGray,
    border: Color::Gray,
    highlight_fg: Color::Black,
    highlight_bg: Color::White,
    tag_fg: Color::Black,
    tag_bg: Color::Gray,
    playing: Color::White,
    status: Color::Gray,
    error: Color::White,
    key_fg: Color::Black,
    key_bg: Color::Gray,
  },
];

pub fn theme_index(name: Option<&str>) -> usize {
  name.and_then(|n| THEMES.iter().position(|t| t.name.eq_ignore_ascii_case(n))).unwrap_or(0)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn theme_lookup_by_name() {
    assert_eq!(theme_index(Some("paper")), 1);
    assert_eq!(theme_index(Some("unknown")), 0);
    assert_eq!(theme_index(None), 0);
  }
}
