use ratatui::{
  Frame,
  layout::{Alignment, Constraint, Layout, Rect},
  style::{Modifier, Style, Stylize},
  text::{Line, Span},
  widgets::{Block, BorderType, List, ListItem, Padding, Paragraph},
};

use crate::app::{App, AppMode, Field};
use crate::display::DisplayMode;
use crate::graphics::{ThumbnailWidget, fit_to_area};
use crate::input::TextField;
use crate::pager::Phase;
use crate::settings::SettingsStore;
use crate::tenor::{Mode, SearchGateway};
use crate::theme::Theme;

// --- Helpers ---

/// Compute the display width of the first `n` chars (accounting for double-width CJK).
pub fn display_width(s: &str, n: usize) -> usize {
  use unicode_width::UnicodeWidthChar;
  s.chars().take(n).map(|c| c.width().unwrap_or(0)).sum()
}

/// Truncate a string to `max_width` characters, appending "…" if truncated.
fn truncate_str(s: &str, max_width: usize) -> String {
  if s.chars().count() <= max_width {
    s.to_string()
  } else {
    let truncated: String = s.chars().take(max_width.saturating_sub(1)).collect();
    format!("{}…", truncated)
  }
}

/// Show only the last four characters of a key.
fn mask_key(key: &str) -> String {
  let len = key.chars().count();
  let shown = len.min(4);
  let tail: String = key.chars().skip(len - shown).collect();
  format!("{}{}", "•".repeat(len - shown), tail)
}

fn rounded(theme: &Theme) -> Block<'static> {
  Block::bordered().border_type(BorderType::Rounded).border_style(Style::default().fg(theme.border))
}

// --- UI Rendering ---

pub fn ui<S: SettingsStore, G: SearchGateway>(frame: &mut Frame, app: &mut App<S, G>) {
  let theme = app.theme();
  app.gfx.thumb_area = None;

  frame.render_widget(Block::default().style(Style::default().bg(theme.bg)), frame.area());

  let query_rows = if app.form.mode == Mode::Search { 3 } else { 0 };
  let [header_area, options_area, query_area, main_area, status_area, footer_area] = Layout::vertical([
    Constraint::Length(1),
    Constraint::Length(3),
    Constraint::Length(query_rows),
    Constraint::Min(3),
    Constraint::Length(1),
    Constraint::Length(1),
  ])
  .areas(frame.area());

  render_header(frame, theme, header_area);
  render_options(frame, app, options_area);
  if query_rows > 0 {
    render_query(frame, app, query_area);
  }
  render_main(frame, app, main_area);
  render_status(frame, app, status_area);
  render_footer(frame, app, footer_area);
}

fn render_header(frame: &mut Frame, theme: &Theme, area: Rect) {
  let left = Line::from(Span::styled(" ▶ tenor-tui ", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)));
  frame.render_widget(left, area);

  let version = format!("v{} ", env!("CARGO_PKG_VERSION"));
  let right = Line::from(Span::styled(&version, Style::default().fg(theme.muted)));
  let right_area =
    Rect { x: area.x + area.width.saturating_sub(version.len() as u16), width: version.len() as u16, ..area };
  frame.render_widget(right, right_area);
}

fn focused<S: SettingsStore, G: SearchGateway>(app: &App<S, G>, field: Field) -> bool {
  app.mode == AppMode::Form && app.form.focus == field
}

/// Bordered single-line input with horizontal scrolling and a cursor when focused.
fn render_text_field(frame: &mut Frame, theme: &Theme, area: Rect, field: &mut TextField, title: &str, active: bool, mask: bool) {
  let border_color = if active { theme.accent } else { theme.border };
  let block = rounded(theme)
    .title(format!(" {} ", title))
    .title_style(Style::default().fg(border_color))
    .border_style(Style::default().fg(border_color))
    .padding(Padding::horizontal(1));

  if mask && !active {
    let paragraph = Paragraph::new(mask_key(&field.value)).style(Style::default().fg(theme.muted)).block(block);
    frame.render_widget(paragraph, area);
    return;
  }

  let inner_w = area.width.saturating_sub(4) as usize;
  let cursor_col = display_width(&field.value, field.cursor);

  if cursor_col < field.scroll || inner_w == 0 {
    field.scroll = cursor_col;
  } else if cursor_col >= field.scroll + inner_w {
    field.scroll = cursor_col.saturating_sub(inner_w) + 1;
  }

  let visible: String = field
    .value
    .chars()
    .scan(0usize, |col, c| {
      let w = unicode_width::UnicodeWidthChar::width(c).unwrap_or(0);
      let start = *col;
      *col += w;
      Some((start, *col, c))
    })
    .skip_while(|(_, end, _)| *end <= field.scroll)
    .take_while(|(start, _, _)| *start < field.scroll + inner_w)
    .map(|(_, _, c)| c)
    .collect();

  let paragraph = Paragraph::new(visible).style(Style::default().fg(theme.fg)).block(block);
  frame.render_widget(paragraph, area);

  // No room for a cursor inside the borders.
  if active && inner_w > 0 {
    let cursor_x = area.x + 2 + cursor_col.saturating_sub(field.scroll) as u16;
    frame.set_cursor_position((cursor_x, area.y + 1));
  }
}

fn render_options<S: SettingsStore, G: SearchGateway>(frame: &mut Frame, app: &mut App<S, G>, area: Rect) {
  let theme = app.theme();
  let [key_area, choices_area] = Layout::horizontal([Constraint::Percentage(40), Constraint::Percentage(60)]).areas(area);

  let key_active = focused(app, Field::ApiKey);
  render_text_field(frame, theme, key_area, &mut app.form.api_key, "API key", key_active, true);

  let choice = |label: &'static str, value: &'static str, field: Field| -> Vec<Span<'static>> {
    let value_style = if focused(app, field) {
      Style::default().fg(theme.highlight_fg).bg(theme.highlight_bg).add_modifier(Modifier::BOLD)
    } else {
      Style::default().fg(theme.fg)
    };
    vec![
      Span::styled(format!("{} ", label), Style::default().fg(theme.muted)),
      Span::styled(format!(" {} ", value), value_style),
      Span::raw("   "),
    ]
  };

  let mut spans = choice("Mode", app.form.mode.label(), Field::Mode);
  spans.extend(choice("Filter", app.form.content_filter.label(), Field::Filter));
  spans.extend(choice("Kind", app.form.kind.label(), Field::Kind));

  let any_focused = [Field::Mode, Field::Filter, Field::Kind].into_iter().any(|f| focused(app, f));
  let border_color = if any_focused { theme.accent } else { theme.border };
  let block = rounded(theme)
    .title(" Options ")
    .title_style(Style::default().fg(border_color))
    .border_style(Style::default().fg(border_color))
    .padding(Padding::horizontal(1));
  frame.render_widget(Paragraph::new(Line::from(spans)).block(block), choices_area);
}

fn render_query<S: SettingsStore, G: SearchGateway>(frame: &mut Frame, app: &mut App<S, G>, area: Rect) {
  let theme = app.theme();
  let active = focused(app, Field::Query);
  render_text_field(frame, theme, area, &mut app.form.query, "Search Tenor", active, false);
}

fn render_main<S: SettingsStore, G: SearchGateway>(frame: &mut Frame, app: &mut App<S, G>, area: Rect) {
  if app.view().items.is_empty() && app.pager.phase() == Phase::Idle {
    render_welcome(frame, app.theme(), area);
    return;
  }
  let [list_area, preview_area] = Layout::horizontal([Constraint::Percentage(60), Constraint::Percentage(40)]).areas(area);
  render_results(frame, app, list_area);
  render_preview(frame, app, preview_area);
}

fn render_welcome(frame: &mut Frame, theme: &Theme, area: Rect) {
  let text = vec![
    Line::from(""),
    Line::from(Span::styled("▶  Welcome to tenor-tui", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD))),
    Line::from(""),
    Line::from(Span::styled("Search Tenor or browse what's trending.", Style::default().fg(theme.fg))),
    Line::from(""),
    Line::from(Span::styled("Enter your API key, pick a mode and press Enter.", Style::default().fg(theme.muted))),
  ];
  let paragraph = Paragraph::new(text).alignment(Alignment::Center).block(rounded(theme));
  frame.render_widget(paragraph, area);
}

fn render_results<S: SettingsStore, G: SearchGateway>(frame: &mut Frame, app: &mut App<S, G>, area: Rect) {
  let theme = app.theme();
  let view = app.pager.renderer();

  // Inner width: area minus 2 borders minus 2 chars for highlight symbol ("▶ ")
  let inner_w = area.width.saturating_sub(4) as usize;

  let items: Vec<ListItem> = view
    .items
    .iter()
    .enumerate()
    .map(|(i, item)| {
      let is_selected = Some(i) == app.list_state.selected();
      let fg = if is_selected { theme.highlight_fg } else { theme.fg };
      let bg = if is_selected {
        theme.highlight_bg
      } else if i % 2 == 1 {
        theme.stripe_bg
      } else {
        theme.bg
      };
      let title = truncate_str(&item.alt_text, inner_w);
      ListItem::new(Line::from(Span::styled(title, Style::default().fg(fg)))).bg(bg)
    })
    .collect();

  let page = app.pager.history().len() + 1;
  let nav_style = |enabled: bool| {
    if enabled { Style::default().fg(theme.accent) } else { Style::default().fg(theme.border) }
  };
  let nav = Line::from(vec![
    Span::styled(" ◀ prev ", nav_style(view.prev_enabled && !app.pager.is_loading())),
    Span::styled(format!("page {}", page), Style::default().fg(theme.muted)),
    Span::styled(" next ▶ ", nav_style(view.next_enabled && !app.pager.is_loading())),
  ]);

  let title = match app.pager.params() {
    Some(p) if p.mode == Mode::Search => format!(" Results for \"{}\" ", truncate_str(&p.query_text, inner_w / 2)),
    Some(_) => " Trending ".to_string(),
    None => " Results ".to_string(),
  };

  let border_color = if app.mode == AppMode::Results { theme.accent } else { theme.border };
  let list = List::new(items)
    .block(
      rounded(theme)
        .title(title)
        .title_bottom(nav.alignment(Alignment::Right))
        .title_style(Style::default().fg(theme.accent).add_modifier(Modifier::BOLD))
        .border_style(Style::default().fg(border_color)),
    )
    .highlight_symbol("▶ ")
    .highlight_style(Style::default().fg(theme.highlight_fg).bg(theme.highlight_bg).add_modifier(Modifier::BOLD));

  frame.render_stateful_widget(list, area, &mut app.list_state);
}

fn render_preview<S: SettingsStore, G: SearchGateway>(frame: &mut Frame, app: &mut App<S, G>, area: Rect) {
  let theme = app.theme();
  let title = Line::from(vec![
    Span::styled(" Preview ", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)),
    Span::styled(format!("[{}] ", app.display_mode.label()), Style::default().fg(theme.muted)),
  ]);
  let block = rounded(theme).title(title).padding(Padding::horizontal(1));
  let inner = block.inner(area);
  frame.render_widget(block, area);

  let [image_area, info_area] = Layout::vertical([Constraint::Min(1), Constraint::Length(3)]).areas(inner);

  let Some(item) = app.selected_item().cloned() else { return };
  let inner_w = info_area.width as usize;
  let mut lines = vec![Line::from(Span::styled(
    truncate_str(&item.alt_text, inner_w),
    Style::default().fg(theme.fg).add_modifier(Modifier::BOLD),
  ))];
  if let Some(page_url) = &item.item_url {
    lines.push(Line::from(Span::styled(truncate_str(page_url, inner_w), Style::default().fg(theme.accent))));
  }
  lines.push(Line::from(Span::styled(truncate_str(&item.display_url, inner_w), Style::default().fg(theme.muted))));
  frame.render_widget(Paragraph::new(lines), info_area);

  let Some((url, image)) = app.preview.as_ref().filter(|(url, _)| *url == item.display_url) else {
    if app.is_preview_loading() {
      let loading = Paragraph::new("Loading preview…").alignment(Alignment::Center).fg(theme.muted);
      frame.render_widget(loading, image_area);
    }
    return;
  };

  if app.display_mode == DisplayMode::Kitty {
    app.gfx.thumb_area = Some(image_area);
    return;
  }

  let stale = match &app.gfx.resized {
    Some((cached_url, cached_area, _)) => cached_url != url || *cached_area != image_area,
    None => true,
  };
  if stale {
    let resized = fit_to_area(image, image_area, app.display_mode);
    app.gfx.resized = Some((url.clone(), image_area, resized));
  }
  if let Some((_, _, ref resized)) = app.gfx.resized {
    frame.render_widget(ThumbnailWidget { image: resized, display_mode: app.display_mode }, image_area);
  }
}

fn render_status<S: SettingsStore, G: SearchGateway>(frame: &mut Frame, app: &App<S, G>, area: Rect) {
  let theme = app.theme();
  let (text, style) = if let Some(err) = &app.last_error {
    (format!(" ⚠  {}", err), Style::default().fg(theme.error))
  } else {
    let status = &app.view().status;
    match app.pager.phase() {
      Phase::Loading => (format!(" ⏳ {}", status), Style::default().fg(theme.status)),
      Phase::Errored => (format!(" ⚠  {}", status), Style::default().fg(theme.error)),
      Phase::Idle if status != "Ready" => (format!(" ⚠  {}", status), Style::default().fg(theme.error)),
      _ => (format!(" {}", status), Style::default().fg(theme.muted)),
    }
  };
  frame.render_widget(Paragraph::new(text).style(style), area);
}

fn render_footer<S: SettingsStore, G: SearchGateway>(frame: &mut Frame, app: &App<S, G>, area: Rect) {
  let theme = app.theme();
  let has_results = !app.view().items.is_empty();
  let mut keys: Vec<(&str, &str)> = match app.mode {
    AppMode::Form => {
      let mut k = Vec::new();
      if !app.pager.is_loading() {
        k.push(("Enter", "Search"));
      }
      k.push(("Tab", "Field"));
      if !app.form.focus.is_text() {
        k.push(("←/→", "Change"));
      }
      if has_results {
        k.push(("↓", "Results"));
      }
      k
    }
    AppMode::Results => vec![("j/k", "Navigate"), ("Enter", "Open"), ("Esc", "Form")],
  };
  if app.pager.can_go_prev() {
    keys.push(("PgUp", "Prev page"));
  }
  if app.pager.can_go_next() {
    keys.push(("PgDn", "Next page"));
  }
  keys.push(("^t", "Theme"));
  keys.push(("^c", "Quit"));

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
