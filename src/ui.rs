use ratatui::{
  Frame,
  layout::{Alignment, Constraint, Layout, Rect},
  style::{Modifier, Style},
  text::{Line, Span},
  widgets::{Block, BorderType, Padding, Paragraph, Wrap},
};

use crate::app::{App, AppMode, LoadState};
use crate::card::{CardKind, ThumbPhase};
use crate::constants::constants;
use crate::graphics::{ThumbnailWidget, crop_to_fill, target_pixels};
use crate::media::MediaBackend;
use crate::theme::Theme;

// --- Helpers ---

/// Compute the display width of the first `n` chars (accounting for double-width CJK).
pub fn display_width(s: &str, n: usize) -> usize {
  use unicode_width::UnicodeWidthChar;
  s.chars().take(n).map(|c| c.width().unwrap_or(0)).sum()
}

/// Truncate a string to `max_width` columns, appending "…" if truncated.
fn truncate_str(s: &str, max_width: usize) -> String {
  use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};
  if s.width() <= max_width {
    return s.to_string();
  }
  let mut out = String::new();
  let mut used = 0;
  for c in s.chars() {
    let w = c.width().unwrap_or(0);
    if used + w + 1 > max_width {
      break;
    }
    used += w;
    out.push(c);
  }
  out.push('…');
  out
}

/// Grid columns that fit in `width`.
pub fn grid_columns(width: u16) -> usize {
  (width / constants().card_width.max(1)).max(1) as usize
}

/// Adjust `scroll_row` so the row holding `selected` stays on screen.
pub fn scroll_to_selected(scroll_row: usize, selected: usize, columns: usize, visible_rows: usize) -> usize {
  let row = selected / columns.max(1);
  let visible_rows = visible_rows.max(1);
  if row < scroll_row {
    row
  } else if row >= scroll_row + visible_rows {
    row + 1 - visible_rows
  } else {
    scroll_row
  }
}

// --- UI Rendering ---

pub fn ui<B: MediaBackend>(frame: &mut Frame, app: &mut App<B>) {
  let theme = app.theme();

  frame.render_widget(Block::default().style(Style::default().bg(theme.bg)), frame.area());

  let [header_area, input_area, main_area, status_area, footer_area] = Layout::vertical([
    Constraint::Length(1),
    Constraint::Length(3),
    Constraint::Min(3),
    Constraint::Length(1),
    Constraint::Length(1),
  ])
  .areas(frame.area());

  render_header(frame, app, header_area);
  render_input(frame, app, input_area);
  render_main(frame, app, main_area);
  render_status(frame, app, status_area);
  render_footer(frame, app, footer_area);
}

fn render_header<B: MediaBackend>(frame: &mut Frame, app: &App<B>, area: Rect) {
  let theme = app.theme();
  let left = Line::from(vec![
    Span::styled(" ▦ gridplay ", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)),
    Span::styled(format!(" {}", app.site), Style::default().fg(theme.muted)),
  ]);
  frame.render_widget(left, area);

  let counts = match app.load {
    LoadState::Loaded => format!("{}/{} items  ", app.cards.len(), app.store.len()),
    _ => String::new(),
  };
  let version = format!("{}v{} ", counts, env!("CARGO_PKG_VERSION"));
  let right = Line::from(Span::styled(&version, Style::default().fg(theme.muted)));
  let right_area =
    Rect { x: area.x + area.width.saturating_sub(version.len() as u16), width: version.len() as u16, ..area };
  frame.render_widget(right, right_area);
}

fn render_input<B: MediaBackend>(frame: &mut Frame, app: &mut App<B>, area: Rect) {
  let theme = app.theme();
  let border_color = if app.mode == AppMode::Search { theme.accent } else { theme.border };
  let input_block = Block::bordered()
    .title(" Search ")
    .title_style(Style::default().fg(border_color))
    .border_type(BorderType::Rounded)
    .border_style(Style::default().fg(border_color))
    .padding(Padding::horizontal(1));

  let inner_w = area.width.saturating_sub(4) as usize;
  let cursor_col = display_width(&app.query, app.query_cursor);

  if cursor_col < app.query_scroll {
    app.query_scroll = cursor_col;
  } else if cursor_col >= app.query_scroll + inner_w {
    app.query_scroll = cursor_col.saturating_sub(inner_w) + 1;
  }

  let visible: String = app
    .query
    .chars()
    .scan(0usize, |col, c| {
      let w = unicode_width::UnicodeWidthChar::width(c).unwrap_or(0);
      let start = *col;
      *col += w;
      Some((start, *col, c))
    })
    .skip_while(|(_, end, _)| *end <= app.query_scroll)
    .take_while(|(start, _, _)| *start < app.query_scroll + inner_w)
    .map(|(_, _, c)| c)
    .collect();

  let paragraph = if visible.is_empty() && app.mode == AppMode::Browse {
    Paragraph::new("Press / to filter by title, description or tag").style(Style::default().fg(theme.muted))
  } else {
    Paragraph::new(visible).style(Style::default().fg(theme.fg))
  };
  frame.render_widget(paragraph.block(input_block), area);

  if app.mode == AppMode::Search {
    let cursor_x = area.x + 2 + (cursor_col - app.query_scroll) as u16;
    frame.set_cursor_position((cursor_x, area.y + 1));
  }
}

fn render_main<B: MediaBackend>(frame: &mut Frame, app: &mut App<B>, area: Rect) {
  let theme = app.theme();
  if app.load == LoadState::Loaded && !app.cards.is_empty() {
    render_grid(frame, app, area);
    return;
  }
  let (text, color) = match &app.load {
    LoadState::Loading => ("Loading items…", theme.muted),
    LoadState::Failed(msg) => (msg.as_str(), theme.error),
    LoadState::Loaded => ("No items found.", theme.muted),
  };
  render_message(frame, theme, area, text, color);
}

fn render_message(frame: &mut Frame, theme: &Theme, area: Rect, text: &str, color: ratatui::style::Color) {
  let lines = vec![Line::from(""), Line::from(Span::styled(text.to_string(), Style::default().fg(color)))];
  let paragraph = Paragraph::new(lines).alignment(Alignment::Center).wrap(Wrap { trim: true }).block(
    Block::bordered().border_type(BorderType::Rounded).border_style(Style::default().fg(theme.border)),
  );
  frame.render_widget(paragraph, area);
}

fn render_grid<B: MediaBackend>(frame: &mut Frame, app: &mut App<B>, area: Rect) {
  let columns = grid_columns(area.width);
  let card_h = constants().card_height.min(area.height).max(1);
  let visible_rows = (area.height / card_h).max(1) as usize;
  app.columns = columns;
  app.scroll_row = scroll_to_selected(app.scroll_row, app.selected, columns, visible_rows);

  let card_w = area.width / columns as u16;
  let first = app.scroll_row * columns;
  let last = (first + visible_rows * columns).min(app.cards.len());
  for idx in first..last {
    let slot = idx - first;
    let rect = Rect {
      x: area.x + (slot % columns) as u16 * card_w,
      y: area.y + (slot / columns) as u16 * card_h,
      width: card_w,
      height: card_h,
    };
    render_card_cell(frame, app, idx, rect);
  }
}

fn render_card_cell<B: MediaBackend>(frame: &mut Frame, app: &mut App<B>, idx: usize, area: Rect) {
  let theme = app.theme();
  let is_selected = idx == app.selected;
  let card = &app.cards[idx];
  let session = app.controller.session(card.id);
  let border_color = if session.state.is_active() {
    theme.playing
  } else if is_selected {
    theme.accent
  } else {
    theme.border
  };
  let block = Block::bordered()
    .border_type(if is_selected { BorderType::Thick } else { BorderType::Rounded })
    .border_style(Style::default().fg(border_color));
  let inner = block.inner(area);
  frame.render_widget(block, area);
  if inner.is_empty() {
    return;
  }

  let [thumb_area, text_area] =
    Layout::vertical([Constraint::Min(0), Constraint::Length(5u16.min(inner.height))]).areas(inner);

  // Thumbnail
  let phase = app.thumbs.get(&card.id).map_or(ThumbPhase::Pending, |t| t.phase());
  match app.gfx.images.get(&card.id) {
    Some(image) if !thumb_area.is_empty() => {
      let stale = match app.gfx.resized.get(&card.id) {
        Some((w, h, _)) => *w != thumb_area.width || *h != thumb_area.height,
        None => true,
      };
      if stale {
        let (pw, ph) = target_pixels(app.display_mode, thumb_area.width, thumb_area.height);
        let cropped = crop_to_fill(image, pw, ph, card.thumbnail_focus());
        app.gfx.resized.insert(card.id, (thumb_area.width, thumb_area.height, cropped));
      }
      if let Some((_, _, resized)) = app.gfx.resized.get(&card.id) {
        frame.render_widget(ThumbnailWidget { image: resized, display_mode: app.display_mode }, thumb_area);
      }
    }
    _ if !thumb_area.is_empty() => {
      let placeholder = match phase {
        ThumbPhase::Broken => "no artwork",
        _ => "…",
      };
      let y = thumb_area.y + thumb_area.height / 2;
      let line = Paragraph::new(Span::styled(placeholder, Style::default().fg(theme.muted)))
        .alignment(Alignment::Center);
      frame.render_widget(line, Rect { y, height: 1, ..thumb_area });
    }
    _ => {}
  }

  // Text
  let w = text_area.width as usize;
  let title_style = if is_selected {
    Style::default().fg(theme.highlight_fg).bg(theme.highlight_bg).add_modifier(Modifier::BOLD)
  } else {
    Style::default().fg(theme.fg).add_modifier(Modifier::BOLD)
  };
  let mut lines = vec![
    Line::from(Span::styled(truncate_str(&card.title, w), title_style)),
    Line::from(Span::styled(truncate_str(&card.description, w), Style::default().fg(theme.muted))),
  ];

  let mut tags: Vec<Span> = Vec::new();
  let mut used = 0;
  for tag in &card.tags {
    let label = format!(" {} ", tag);
    let lw = unicode_width::UnicodeWidthStr::width(label.as_str());
    if used + lw > w {
      break;
    }
    used += lw + 1;
    tags.push(Span::styled(label, Style::default().fg(theme.tag_fg).bg(theme.tag_bg)));
    tags.push(Span::raw(" "));
  }
  lines.push(Line::from(tags));

  let mut overlay: Vec<Span> = Vec::new();
  if let Some(label) = card.overlay_label(&session) {
    let style = if session.state.is_active() {
      Style::default().fg(theme.playing).add_modifier(Modifier::BOLD)
    } else {
      Style::default().fg(theme.accent)
    };
    overlay.push(Span::styled(label, style));
  }
  if card.external_link.is_some() && !matches!(card.kind, CardKind::Link(_)) {
    overlay.push(Span::raw("  "));
    overlay.push(Span::styled("↗ link", Style::default().fg(theme.muted)));
  }
  lines.push(Line::from(overlay));

  if let Some(err) = session.state.error() {
    lines.push(Line::from(Span::styled(truncate_str(&format!("⚠ {}", err), w), Style::default().fg(theme.error))));
  }

  frame.render_widget(Paragraph::new(lines), text_area);
}

fn render_status<B: MediaBackend>(frame: &mut Frame, app: &App<B>, area: Rect) {
  let theme = app.theme();
  let (text, style) = if let Some(msg) = &app.status_message {
    (format!(" ⏳ {}", msg), Style::default().fg(theme.status))
  } else if let Some(err) = &app.last_error {
    (format!(" ⚠  {}", err), Style::default().fg(theme.error))
  } else {
    let running = app.controller.running();
    let playing: Vec<&str> = app
      .cards
      .iter()
      .filter(|c| running.contains(&c.id) && app.controller.session(c.id).state.is_active())
      .map(|c| c.title.as_str())
      .collect();
    match playing.first() {
      Some(title) => (format!(" ♪ {}", title), Style::default().fg(theme.status)),
      None => (format!(" Ready [{}]", app.display_mode.label().to_lowercase()), Style::default().fg(theme.muted)),
    }
  };
  frame.render_widget(Paragraph::new(text).style(style), area);
}

fn render_footer<B: MediaBackend>(frame: &mut Frame, app: &App<B>, area: Rect) {
  let theme = app.theme();
  let is_playing = !app.controller.running().is_empty();
  let keys: Vec<(&str, &str)> = match app.mode {
    AppMode::Search => {
      let mut k = vec![("Enter", "Grid"), ("^t", "Theme")];
      if is_playing {
        k.push(("^s", "Stop"));
      }
      k.push(("Esc", if app.query.is_empty() { "Grid" } else { "Clear" }));
      k
    }
    AppMode::Browse => {
      let mut k = vec![("Enter", "Play/Pause"), ("hjkl", "Navigate"), ("o", "Link"), ("/", "Search")];
      if is_playing {
        k.push(("^s", "Stop"));
      }
      k.push(("^t", "Theme"));
      k.push(("q", "Quit"));
      k
    }
  };

  let spans: Vec<Span> = keys
    .iter()
    .enumerate()
    .flat_map(|(i, (key, action))| {
      let mut s = vec![
        Span::styled(format!(" {} ", key), Style::default().fg(theme.key_fg).bg(theme.key_bg)),
        Span::styled(format!(" {} ", action), Style::default().fg(theme.muted)),
      ];
      if i < keys.len() - 1 {
        s.push(Span::raw("  "));
      }
      s
    })
    .collect();

  frame.render_widget(Line::from(spans), area);

  let theme_label = format!("{} ", theme.name);
  let right = Line::from(Span::styled(&theme_label, Style::default().fg(theme.muted)));
  let right_area =
    Rect { x: area.x + area.width.saturating_sub(theme_label.len() as u16), width: theme_label.len() as u16, ..area };
  frame.render_widget(right, right_area);
}
