use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::{App, AppMode};
use crate::settings::SettingsStore;
use crate::tenor::SearchGateway;

// --- Text field ---

/// Convert a char index to a byte offset within the string.
pub fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
  s.char_indices().nth(char_idx).map_or(s.len(), |(i, _)| i)
}

/// Single-line editable text with a char-indexed cursor and horizontal scroll.
#[derive(Debug, Clone, Default)]
pub struct TextField {
  pub value: String,
  pub cursor: usize,
  pub scroll: usize,
}

impl TextField {
  /// Cursor starts at the end of `value`.
  pub fn with_value(value: &str) -> Self {
    Self { value: value.to_string(), cursor: value.chars().count(), scroll: 0 }
  }

  pub fn is_empty(&self) -> bool {
    self.value.is_empty()
  }

  fn len(&self) -> usize {
    self.value.chars().count()
  }

  pub fn clear(&mut self) {
    self.value.clear();
    self.cursor = 0;
    self.scroll = 0;
  }

  /// Apply an editing key. Returns `false` if the key is not an editing key.
  pub fn handle_key(&mut self, code: KeyCode) -> bool {
    match code {
      KeyCode::Char(c) => {
        let byte_idx = char_to_byte_index(&self.value, self.cursor);
        self.value.insert(byte_idx, c);
        self.cursor += 1;
      }
      KeyCode::Backspace => {
        if self.cursor > 0 {
          self.cursor -= 1;
          let byte_idx = char_to_byte_index(&self.value, self.cursor);
          self.value.remove(byte_idx);
        }
      }
      KeyCode::Delete => {
        if self.cursor < self.len() {
          let byte_idx = char_to_byte_index(&self.value, self.cursor);
          self.value.remove(byte_idx);
        }
      }
      KeyCode::Left => self.cursor = self.cursor.saturating_sub(1),
      KeyCode::Right => self.cursor = (self.cursor + 1).min(self.len()),
      KeyCode::Home => self.cursor = 0,
      KeyCode::End => self.cursor = self.len(),
      _ => return false,
    }
    true
  }
}

// --- Event Handling ---

pub fn handle_key_event<S: SettingsStore, G: SearchGateway>(app: &mut App<S, G>, key: KeyEvent) {
  if key.modifiers.contains(KeyModifiers::CONTROL) {
    match key.code {
      KeyCode::Char('c') => app.should_quit = true,
      KeyCode::Char('t') => app.next_theme(),
      KeyCode::Char('g') => app.next_display_mode(),
      KeyCode::Char('o') => app.open_selected(),
      KeyCode::Char('n') => app.next_page(),
      KeyCode::Char('p') => app.prev_page(),
      _ => {}
    }
    return;
  }

  match (key.code, app.mode) {
    (KeyCode::PageDown, _) => app.next_page(),
    (KeyCode::PageUp, _) => app.prev_page(),
    (_, AppMode::Form) => handle_form_key(app, key),
    (_, AppMode::Results) => handle_results_key(app, key),
  }
}

fn handle_form_key<S: SettingsStore, G: SearchGateway>(app: &mut App<S, G>, key: KeyEvent) {
  app.clear_error();
  match key.code {
    // Accepted while loading too: a new query supersedes the fetch in flight.
    KeyCode::Enter => app.submit(),
    KeyCode::Tab => app.move_focus(true),
    KeyCode::BackTab => app.move_focus(false),
    KeyCode::Down => {
      if !app.view().items.is_empty() {
        app.mode = AppMode::Results;
      }
    }
    KeyCode::Esc => {
      if let Some(field) = app.form.focused_text()
        && !field.is_empty()
      {
        field.clear();
      } else if !app.view().items.is_empty() {
        app.mode = AppMode::Results;
      } else {
        app.should_quit = true;
      }
    }
    code if app.form.focus.is_text() => {
      if let Some(field) = app.form.focused_text() {
        field.handle_key(code);
      }
    }
    KeyCode::Left => app.change_choice(false),
    KeyCode::Right | KeyCode::Char(' ') => app.change_choice(true),
    _ => {}
  }
}

fn handle_results_key<S: SettingsStore, G: SearchGateway>(app: &mut App<S, G>, key: KeyEvent) {
  match key.code {
    KeyCode::Down | KeyCode::Char('j') => app.select_next(),
    KeyCode::Up | KeyCode::Char('k') => app.select_prev(),
    KeyCode::Right | KeyCode::Char('n') => app.next_page(),
    KeyCode::Left | KeyCode::Char('p') => app.prev_page(),
    KeyCode::Enter | KeyCode::Char('o') => app.open_selected(),
    KeyCode::Esc | KeyCode::Tab | KeyCode::Char('/') => app.mode = AppMode::Form,
    _ => {}
  }
}
