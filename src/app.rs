use anyhow::Result;
use image::DynamicImage;
use ratatui::{layout::Rect, widgets::ListState};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::display::DisplayMode;
use crate::input::TextField;
use crate::pager::{Pager, Renderer};
use crate::settings::{SettingsRecord, SettingsStore};
use crate::tenor::{ContentFilter, MediaItem, Mode, QueryParameters, ResultKind, SearchGateway};
use crate::theme::{self, THEMES};

// --- Results view ---

/// What the pager last told us to show.
#[derive(Debug, Clone)]
pub struct ResultsView {
  pub status: String,
  pub items: Vec<MediaItem>,
  pub prev_enabled: bool,
  pub next_enabled: bool,
}

impl Default for ResultsView {
  fn default() -> Self {
    Self { status: "Ready".to_string(), items: Vec::new(), prev_enabled: false, next_enabled: false }
  }
}

impl Renderer for ResultsView {
  fn show_status(&mut self, text: &str) {
    self.status = text.to_string();
  }

  fn render_items(&mut self, items: Vec<MediaItem>) {
    self.items = items;
  }

  fn set_nav_enabled(&mut self, prev: bool, next: bool) {
    self.prev_enabled = prev;
    self.next_enabled = next;
  }
}

// --- Query form ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Field {
  ApiKey,
  Mode,
  Filter,
  Kind,
  #[default]
  Query,
}

impl Field {
  pub fn is_text(self) -> bool {
    matches!(self, Field::ApiKey | Field::Query)
  }
}

#[derive(Debug, Clone, Default)]
pub struct QueryForm {
  pub api_key: TextField,
  pub query: TextField,
  pub mode: Mode,
  pub content_filter: ContentFilter,
  pub kind: ResultKind,
  pub focus: Field,
}

impl QueryForm {
  /// Fill the form from a stored record; unknown values keep their defaults.
  pub fn from_record(record: Option<SettingsRecord>) -> Self {
    let Some(record) = record else {
      return Self { focus: Field::ApiKey, ..Self::default() };
    };
    let form = Self {
      api_key: TextField::with_value(&record.api_key),
      query: TextField::with_value(&record.query),
      mode: Mode::from_config(&record.mode),
      content_filter: ContentFilter::from_config(&record.content_filter),
      kind: ResultKind::from_config(&record.kind),
      focus: Field::Query,
    };
    let focus = if form.api_key.value.trim().is_empty() {
      Field::ApiKey
    } else if form.mode == Mode::Trending {
      Field::Mode
    } else {
      Field::Query
    };
    Self { focus, ..form }
  }

  pub fn to_record(&self) -> SettingsRecord {
    SettingsRecord {
      api_key: self.api_key.value.trim().to_string(),
      mode: self.mode.label().to_string(),
      content_filter: self.content_filter.label().to_string(),
      kind: self.kind.label().to_string(),
      query: self.query.value.trim().to_string(),
    }
  }

  pub fn to_params(&self) -> QueryParameters {
    QueryParameters {
      credential: self.api_key.value.trim().to_string(),
      mode: self.mode,
      query_text: self.query.value.trim().to_string(),
      content_filter: self.content_filter,
      result_kind: self.kind,
    }
  }

  /// Fields in tab order. The query box only exists in search mode.
  pub fn fields(&self) -> Vec<Field> {
    let mut fields = vec![Field::ApiKey, Field::Mode, Field::Filter, Field::Kind];
    if self.mode == Mode::Search {
      fields.push(Field::Query);
    }
    fields
  }

  pub fn focused_text(&mut self) -> Option<&mut TextField> {
    match self.focus {
      Field::ApiKey => Some(&mut self.api_key),
      Field::Query => Some(&mut self.query),
      _ => None,
    }
  }

  fn move_focus(&mut self, forward: bool) {
    let fields = self.fields();
    let len = fields.len();
    let idx = fields.iter().position(|f| *f == self.focus).unwrap_or(0);
    let next = if forward { (idx + 1) % len } else { (idx + len - 1) % len };
    self.focus = fields[next];
  }

  /// Change the focused choice field. Returns `false` on text fields.
  fn change_choice(&mut self, forward: bool) -> bool {
    match self.focus {
      Field::Mode => self.mode = self.mode.toggled(),
      Field::Filter => self.content_filter = self.content_filter.cycled(forward),
      Field::Kind => self.kind = self.kind.toggled(),
      Field::ApiKey | Field::Query => return false,
    }
    true
  }
}

// --- App state ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
  Form,
  Results,
}

/// Terminal graphics protocol state (Kitty) and the cell-resolution preview cache.
#[derive(Default)]
pub struct GraphicsCache {
  pub thumb_area: Option<Rect>,
  pub last_sent: Option<(String, Rect)>,
  pub resized: Option<(String, Rect, DynamicImage)>,
}

struct ThumbnailTask {
  url: String,
  rx: oneshot::Receiver<Result<DynamicImage>>,
  handle: JoinHandle<()>,
}

pub struct App<S: SettingsStore, G: SearchGateway> {
  pub form: QueryForm,
  pub mode: AppMode,
  pub pager: Pager<G, ResultsView>,
  pub list_state: ListState,
  pub theme_index: usize,
  pub display_mode: DisplayMode,
  /// Decoded preview for the selected item, keyed by its display URL.
  pub preview: Option<(String, DynamicImage)>,
  pub gfx: GraphicsCache,
  pub last_error: Option<String>,
  pub should_quit: bool,
  gateway: Arc<G>,
  settings: S,
  thumbnail: Option<ThumbnailTask>,
  /// When the last error was set, for auto-dismiss.
  error_time: Option<Instant>,
}

impl<S: SettingsStore, G: SearchGateway> App<S, G> {
  pub fn new(settings: S, gateway: Arc<G>, display_mode: DisplayMode, config: &Config, api_key: Option<String>) -> Self {
    let mut form = QueryForm::from_record(settings.load());
    if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
      form.api_key = TextField::with_value(key.trim());
      if form.focus == Field::ApiKey {
        form.focus = if form.mode == Mode::Search { Field::Query } else { Field::Mode };
      }
    }

    Self {
      form,
      mode: AppMode::Form,
      pager: Pager::new(Arc::clone(&gateway), ResultsView::default()),
      list_state: ListState::default(),
      theme_index: theme::index_of(config.theme_name.as_deref()),
      display_mode,
      preview: None,
      gfx: GraphicsCache::default(),
      last_error: None,
      should_quit: false,
      gateway,
      settings,
      thumbnail: None,
      error_time: None,
    }
  }

  pub fn theme(&self) -> &'static theme::Theme {
    // Safety: theme_index comes from theme::index_of or modular arithmetic in next_theme().
    &THEMES[self.theme_index]
  }

  pub fn view(&self) -> &ResultsView {
    self.pager.renderer()
  }

  /// Set an error message with auto-dismiss tracking.
  pub fn set_error(&mut self, msg: String) {
    self.last_error = Some(msg);
    self.error_time = Some(Instant::now());
  }

  pub fn clear_error(&mut self) {
    self.last_error = None;
    self.error_time = None;
  }

  /// Clear stale error messages after 5 seconds.
  pub fn expire_error(&mut self) {
    if let Some(t) = self.error_time
      && t.elapsed() >= Duration::from_secs(5)
    {
      self.clear_error();
    }
  }

  fn save_config(&self) {
    let config = Config {
      theme_name: Some(self.theme().name.to_string()),
      display_mode: Some(self.display_mode.label().to_string()),
    };
    config.save();
  }

  fn save_settings(&self) {
    self.settings.save(&self.form.to_record());
  }

  pub fn next_theme(&mut self) {
    self.theme_index = (self.theme_index + 1) % THEMES.len();
    self.save_config();
  }

  pub fn next_display_mode(&mut self) {
    self.display_mode = self.display_mode.next();
    self.gfx.resized = None;
    info!(mode = self.display_mode.label(), "display mode changed");
    self.save_config();
  }

  // --- Form ---

  /// Move focus between form fields. Leaving the key field persists it.
  pub fn move_focus(&mut self, forward: bool) {
    let leaving_key = self.form.focus == Field::ApiKey;
    self.form.move_focus(forward);
    if leaving_key && self.form.focus != Field::ApiKey {
      self.save_settings();
    }
  }

  pub fn change_choice(&mut self, forward: bool) {
    if self.form.change_choice(forward) {
      let form = &self.form;
      debug!(mode = form.mode.label(), filter = form.content_filter.label(), kind = form.kind.label(), "form changed");
      self.save_settings();
    }
  }

  pub fn submit(&mut self) {
    self.clear_error();
    self.save_settings();
    if self.pager.submit_new_query(self.form.to_params()).is_ok() {
      self.reset_selection();
    }
  }

  // --- Pagination ---

  pub fn next_page(&mut self) {
    if self.pager.next_page() {
      self.reset_selection();
    }
  }

  pub fn prev_page(&mut self) {
    if self.pager.prev_page() {
      self.reset_selection();
    }
  }

  fn reset_selection(&mut self) {
    self.list_state.select(None);
    self.cancel_thumbnail();
    self.preview = None;
  }

  // --- Selection ---

  pub fn selected_item(&self) -> Option<&MediaItem> {
    self.list_state.selected().and_then(|i| self.view().items.get(i))
  }

  pub fn select_next(&mut self) {
    let count = self.view().items.len();
    if count > 0 {
      let i = self.list_state.selected().map_or(0, |i| (i + 1) % count);
      self.list_state.select(Some(i));
      self.trigger_thumbnail();
    }
  }

  pub fn select_prev(&mut self) {
    let count = self.view().items.len();
    if count > 0 {
      let i = self.list_state.selected().map_or(0, |i| if i == 0 { count - 1 } else { i - 1 });
      self.list_state.select(Some(i));
      self.trigger_thumbnail();
    }
  }

  // --- Background work ---

  fn cancel_thumbnail(&mut self) {
    if let Some(task) = self.thumbnail.take() {
      task.handle.abort();
    }
  }

  /// Fetch the preview for the selected item unless it is already shown or in flight.
  fn trigger_thumbnail(&mut self) {
    let Some(url) = self.selected_item().map(|item| item.display_url.clone()) else { return };
    if self.preview.as_ref().is_some_and(|(u, _)| *u == url) || self.thumbnail.as_ref().is_some_and(|t| t.url == url) {
      return;
    }
    self.cancel_thumbnail();

    let gateway = Arc::clone(&self.gateway);
    let task_url = url.clone();
    let (tx, rx) = oneshot::channel();
    let handle = tokio::spawn(async move {
      let _ = tx.send(gateway.fetch_preview(&task_url).await);
    });
    self.thumbnail = Some(ThumbnailTask { url, rx, handle });
  }

  pub fn check_pending(&mut self) {
    if let Some(outcome) = self.pager.check_pending() {
      match outcome {
        Ok(_) if !self.view().items.is_empty() => {
          self.list_state.select(Some(0));
          self.trigger_thumbnail();
        }
        Ok(_) => {}
        Err(e) => debug!(err = %e, "page load failed"),
      }
    }

    if let Some(mut task) = self.thumbnail.take() {
      match task.rx.try_recv() {
        Ok(Ok(image)) => {
          if self.selected_item().is_some_and(|item| item.display_url == task.url) {
            self.preview = Some((task.url, image));
          }
        }
        Ok(Err(e)) => {
          warn!(err = %e, "preview failed");
        }
        Err(oneshot::error::TryRecvError::Empty) => {
          self.thumbnail = Some(task);
        }
        Err(oneshot::error::TryRecvError::Closed) => {}
      }
    }
  }

  pub fn is_preview_loading(&self) -> bool {
    self.thumbnail.is_some()
  }

  /// Open the selected item's Tenor page (or the media itself) in the default browser.
  pub fn open_selected(&mut self) {
    let Some(item) = self.selected_item() else { return };
    let url = item.item_url.clone().unwrap_or_else(|| item.display_url.clone());

    #[cfg(target_os = "macos")]
    let cmd = "open";
    #[cfg(not(target_os = "macos"))]
    let cmd = "xdg-open";
    match std::process::Command::new(cmd)
      .arg(&url)
      .stdin(std::process::Stdio::null())
      .stdout(std::process::Stdio::null())
      .stderr(std::process::Stdio::null())
      .spawn()
    {
      Ok(mut child) => {
        // Reap the child in a background thread to avoid zombie processes.
        std::thread::spawn(move || {
          let _ = child.wait();
        });
      }
      Err(e) => {
        self.set_error(format!("Failed to open browser: {}", e));
      }
    }
  }

  #[cfg(test)]
  pub fn settings(&self) -> &S {
    &self.settings
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::settings::memory::MemorySettingsStore;
  use crate::tenor::fake::{FakeGateway, raw_page};

  type TestApp = App<MemorySettingsStore, FakeGateway>;

  fn record(mode: &str, q: &str) -> SettingsRecord {
    SettingsRecord {
      api_key: "KEY".to_string(),
      mode: mode.to_string(),
      content_filter: "medium".to_string(),
      kind: "sticker".to_string(),
      query: q.to_string(),
    }
  }

  fn app_with(initial: Option<SettingsRecord>, gateway: &Arc<FakeGateway>) -> TestApp {
    let store = MemorySettingsStore { initial, ..Default::default() };
    App::new(store, Arc::clone(gateway), DisplayMode::Ascii, &Config::default(), None)
  }

  fn app(initial: Option<SettingsRecord>) -> TestApp {
    app_with(initial, &Arc::new(FakeGateway::default()))
  }

  /// Poll until the page fetch and any preview download have been applied.
  async fn drain(app: &mut TestApp) {
    for _ in 0..100 {
      app.check_pending();
      if !app.pager.is_loading() && !app.is_preview_loading() {
        return;
      }
      tokio::task::yield_now().await;
    }
    panic!("background work did not finish");
  }

  fn alts(app: &TestApp) -> Vec<&str> {
    app.view().items.iter().map(|i| i.alt_text.as_str()).collect()
  }

  // --- QueryForm ---

  #[test]
  fn form_restores_saved_record() {
    let form = QueryForm::from_record(Some(record("search", "cat")));
    assert_eq!(form.api_key.value, "KEY");
    assert_eq!(form.query.value, "cat");
    assert_eq!(form.mode, Mode::Search);
    assert_eq!(form.content_filter, ContentFilter::Medium);
    assert_eq!(form.kind, ResultKind::Sticker);
    assert_eq!(form.focus, Field::Query);
    assert_eq!(form.to_record(), record("search", "cat"));
  }

  #[test]
  fn form_ignores_unknown_saved_values() {
    let mut saved = record("sideways", "");
    saved.content_filter = "extreme".to_string();
    let form = QueryForm::from_record(Some(saved));
    assert_eq!(form.mode, Mode::Search);
    assert_eq!(form.content_filter, ContentFilter::Off);
  }

  #[test]
  fn form_without_record_focuses_key() {
    assert_eq!(QueryForm::from_record(None).focus, Field::ApiKey);
  }

  #[test]
  fn params_are_trimmed() {
    let mut form = QueryForm::from_record(Some(record("search", "")));
    form.query = TextField::with_value("  cat  ");
    form.api_key = TextField::with_value(" KEY ");
    let params = form.to_params();
    assert_eq!(params.query_text, "cat");
    assert_eq!(params.credential, "KEY");
  }

  #[test]
  fn trending_skips_query_field() {
    let mut form = QueryForm::from_record(Some(record("trending", "")));
    assert_eq!(form.fields(), [Field::ApiKey, Field::Mode, Field::Filter, Field::Kind]);
    form.focus = Field::Kind;
    form.move_focus(true);
    assert_eq!(form.focus, Field::ApiKey);
    form.move_focus(false);
    assert_eq!(form.focus, Field::Kind);
  }

  // --- App ---

  #[test]
  fn choice_change_saves_settings() {
    let mut app = app(Some(record("search", "cat")));
    app.form.focus = Field::Mode;
    app.change_choice(true);
    assert_eq!(app.form.mode, Mode::Trending);
    let saved = app.settings().saved.borrow();
    assert_eq!(saved.last().unwrap().mode, "trending");
  }

  #[test]
  fn text_fields_do_not_change_choices() {
    let mut app = app(Some(record("search", "cat")));
    app.form.focus = Field::Query;
    app.change_choice(true);
    assert!(app.settings().saved.borrow().is_empty());
  }

  #[test]
  fn leaving_key_field_saves_settings() {
    let mut app = app(None);
    app.form.api_key = TextField::with_value("NEWKEY");
    app.move_focus(true);
    assert_eq!(app.form.focus, Field::Mode);
    let saved = app.settings().saved.borrow();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].api_key, "NEWKEY");
  }

  #[test]
  fn submit_without_key_saves_and_reports() {
    let mut app = app(None);
    app.form.query = TextField::with_value("cat");
    app.submit();
    assert_eq!(app.view().status, "Enter Tenor API key");
    assert!(!app.pager.is_loading());
    assert_eq!(app.settings().saved.borrow().len(), 1);
  }

  #[test]
  fn cli_key_overrides_saved_key() {
    let store = MemorySettingsStore { initial: Some(record("search", "cat")), ..Default::default() };
    let gateway = Arc::new(FakeGateway::default());
    let app = App::new(store, gateway, DisplayMode::Ascii, &Config::default(), Some("OTHER".to_string()));
    assert_eq!(app.form.api_key.value, "OTHER");
  }

  #[test]
  fn selection_wraps_without_items_is_noop() {
    let mut app = app(None);
    app.select_next();
    assert_eq!(app.list_state.selected(), None);
    assert!(app.selected_item().is_none());
  }

  #[tokio::test]
  async fn submit_starts_loading() {
    let gateway = Arc::new(FakeGateway::default());
    let mut app = app_with(Some(record("search", "cat")), &gateway);
    app.submit();
    assert!(app.pager.is_loading());
    assert!(app.view().status.starts_with("Loading..."));
    assert_eq!(app.list_state.selected(), None);

    drain(&mut app).await;
    let requests = gateway.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].param("q"), Some("cat"));
    assert_eq!(requests[0].param("contentfilter"), Some("medium"));
    assert_eq!(requests[0].param("searchfilter"), Some("sticker"));
  }

  #[tokio::test]
  async fn first_item_selected_once_page_applies() {
    let gateway = Arc::new(FakeGateway::default());
    gateway.page("cat", None, raw_page(&["c0", "c1"], Some("CUR1")));
    let mut app = app_with(Some(record("search", "cat")), &gateway);
    app.submit();
    drain(&mut app).await;

    assert_eq!(app.view().status, "Found 2 items (mode=search)");
    assert_eq!(app.list_state.selected(), Some(0));
    assert_eq!(app.selected_item().map(|i| i.alt_text.as_str()), Some("c0"));
    assert_eq!(app.preview.as_ref().map(|(url, _)| url.as_str()), Some("https://m/c0.gif"));
  }

  #[tokio::test]
  async fn paging_resets_selection_and_walks_history() {
    let gateway = Arc::new(FakeGateway::default());
    gateway.page("cat", None, raw_page(&["c0", "c1"], Some("CUR1")));
    gateway.page("cat", Some("CUR1"), raw_page(&["c2"], None));
    let mut app = app_with(Some(record("search", "cat")), &gateway);
    app.submit();
    drain(&mut app).await;
    app.select_next();
    assert_eq!(app.list_state.selected(), Some(1));

    app.next_page();
    assert_eq!(app.list_state.selected(), None);
    assert!(app.preview.is_none());
    drain(&mut app).await;
    assert_eq!(alts(&app), ["c2"]);
    assert_eq!(app.list_state.selected(), Some(0));
    assert_eq!(app.pager.history().len(), 1);

    app.prev_page();
    drain(&mut app).await;
    assert_eq!(alts(&app), ["c0", "c1"]);
    assert!(app.pager.history().is_empty());
    assert_eq!(gateway.requests().last().unwrap().param("pos"), None);
  }

  #[tokio::test]
  async fn submit_while_loading_replaces_the_query() {
    let gateway = Arc::new(FakeGateway::default());
    gateway.page("cat", None, raw_page(&["c0"], None));
    gateway.page("dog", None, raw_page(&["d0"], None));
    let mut app = app_with(Some(record("search", "cat")), &gateway);
    app.submit();
    app.form.query = TextField::with_value("dog");
    app.submit();
    drain(&mut app).await;

    assert_eq!(alts(&app), ["d0"]);
    assert_eq!(app.selected_item().map(|i| i.alt_text.as_str()), Some("d0"));
    assert_eq!(app.settings().saved.borrow().last().unwrap().query, "dog");
  }
}
