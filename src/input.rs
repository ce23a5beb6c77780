use anyhow::Result;
use ratatui::crossterm::event::{self, KeyCode, KeyModifiers};

use crate::app::{App, AppMode};
use crate::media::MediaBackend;

// --- Helpers ---

/// Convert a char index to a byte offset within the string.
pub fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
  s.char_indices().nth(char_idx).map_or(s.len(), |(i, _)| i)
}

// --- Event Handling ---

pub async fn handle_key_event<B: MediaBackend>(app: &mut App<B>, key: event::KeyEvent) -> Result<()> {
  if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
    app.should_quit = true;
    return Ok(());
  }

  if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('t') {
    app.next_theme();
    return Ok(());
  }

  if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('s') {
    app.stop_all().await;
    return Ok(());
  }

  match app.mode {
    AppMode::Browse => handle_browse_key(app, key).await,
    AppMode::Search => handle_search_key(app, key).await,
  }
  Ok(())
}

async fn handle_browse_key<B: MediaBackend>(app: &mut App<B>, key: event::KeyEvent) {
  match key.code {
    KeyCode::Enter | KeyCode::Char(' ') => {
      app.clear_error();
      app.activate_selected().await;
    }
    KeyCode::Char('o') => {
      app.open_selected_link();
    }
    KeyCode::Char('/') => {
      app.mode = AppMode::Search;
      app.query_cursor = app.query.chars().count();
    }
    KeyCode::Left | KeyCode::Char('h') => app.move_selection(-1, 0),
    KeyCode::Right | KeyCode::Char('l') => app.move_selection(1, 0),
    KeyCode::Up | KeyCode::Char('k') => app.move_selection(0, -1),
    KeyCode::Down | KeyCode::Char('j') => app.move_selection(0, 1),
    KeyCode::Char('q') => {
      app.should_quit = true;
    }
    KeyCode::Esc => {
      if !app.query.is_empty() {
        app.query_cursor = 0;
        app.query_scroll = 0;
        app.set_query(String::new()).await;
      }
    }
    _ => {}
  }
}

async fn handle_search_key<B: MediaBackend>(app: &mut App<B>, key: event::KeyEvent) {
  match key.code {
    KeyCode::Char(c) => {
      let mut query = app.query.clone();
      let byte_idx = char_to_byte_index(&query, app.query_cursor);
      query.insert(byte_idx, c);
      app.query_cursor += 1;
      app.set_query(query).await;
    }
    KeyCode::Backspace => {
      if app.query_cursor > 0 {
        let mut query = app.query.clone();
        app.query_cursor -= 1;
        let byte_idx = char_to_byte_index(&query, app.query_cursor);
        query.remove(byte_idx);
        app.set_query(query).await;
      }
    }
    KeyCode::Delete => {
      if app.query_cursor < app.query.chars().count() {
        let mut query = app.query.clone();
        let byte_idx = char_to_byte_index(&query, app.query_cursor);
        query.remove(byte_idx);
        app.set_query(query).await;
      }
    }
    KeyCode::Left => {
      app.query_cursor = app.query_cursor.saturating_sub(1);
    }
    KeyCode::Right => {
      if app.query_cursor < app.query.chars().count() {
        app.query_cursor += 1;
      }
    }
    KeyCode::Home => {
      app.query_cursor = 0;
    }
    KeyCode::End => {
      app.query_cursor = app.query.chars().count();
    }
    KeyCode::Down | KeyCode::Enter => {
      app.mode = AppMode::Browse;
    }
    KeyCode::Esc => {
      if app.query.is_empty() {
        app.mode = AppMode::Browse;
      } else {
        app.query_cursor = 0;
        app.query_scroll = 0;
        app.set_query(String::new()).await;
      }
    }
    _ => {}
  }
}
