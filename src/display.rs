use clap::ValueEnum;

/// `--display-mode` as given on the command line.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliDisplayMode {
  Auto,
  Direct,
  Ascii,
}

/// How card thumbnails are drawn into their cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
  /// Grayscale character ramp, one pixel per cell.
  Ascii,
  /// Truecolor half-blocks, two pixels per cell.
  Direct,
}

impl DisplayMode {
  pub fn label(self) -> &'static str {
    match self {
      DisplayMode::Ascii => "ASCII",
      DisplayMode::Direct => "Half-block",
    }
  }
}

/// Pick the thumbnail mode from the terminal's advertised colour support.
/// `NO_COLOR` wins over `COLORTERM`.
fn mode_for(colorterm: Option<&str>, no_color: bool) -> DisplayMode {
  if no_color {
    return DisplayMode::Ascii;
  }
  match colorterm.map(str::to_ascii_lowercase).as_deref() {
    Some("truecolor" | "24bit") => DisplayMode::Direct,
    _ => DisplayMode::Ascii,
  }
}

pub fn detect_display_mode() -> DisplayMode {
  let colorterm = std::env::var("COLORTERM").ok();
  let no_color = std::env::var_os("NO_COLOR").is_some_and(|v| !v.is_empty());
  mode_for(colorterm.as_deref(), no_color)
}

pub fn resolve_display_mode(cli: CliDisplayMode) -> DisplayMode {
  match cli {
    CliDisplayMode::Auto => detect_display_mode(),
    CliDisplayMode::Direct => DisplayMode::Direct,
    CliDisplayMode::Ascii => DisplayMode::Ascii,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn truecolor_terminals_get_half_blocks() {
    assert_eq!(mode_for(Some("truecolor"), false), DisplayMode::Direct);
    assert_eq!(mode_for(Some("24BIT"), false), DisplayMode::Direct);
    assert_eq!(mode_for(Some("256color"), false), DisplayMode::Ascii);
    assert_eq!(mode_for(None, false), DisplayMode::Ascii);
  }

  #[test]
  fn no_color_forces_ascii() {
    assert_eq!(mode_for(Some("truecolor"), true), DisplayMode::Ascii);
  }

  #[test]
  fn explicit_mode_skips_detection() {
    assert_eq!(resolve_display_mode(CliDisplayMode::Direct), DisplayMode::Direct);
    assert_eq!(resolve_display_mode(CliDisplayMode::Ascii), DisplayMode::Ascii);
  }
}
