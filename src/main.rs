mod app;
mod config;
mod constants;
mod display;
mod error;
mod graphics;
mod input;
mod pager;
mod settings;
mod tenor;
mod theme;
mod ui;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use clap_complete::Shell;
use directories::ProjectDirs;
use ratatui::{
  DefaultTerminal,
  crossterm::event::{self, Event, KeyEventKind},
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use app::App;
use config::Config;
use display::{CliDisplayMode, DisplayMode};
use graphics::{kitty_delete_all, kitty_render_image};
use settings::{FileSettingsStore, SettingsStore};
use tenor::{SearchGateway, TenorClient};

// --- CLI ---

#[derive(Parser, Debug)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about = "Search and page through Tenor GIFs in the terminal", long_about = None)]
struct Args {
  /// Thumbnail display mode: 'auto', 'kitty', 'direct', or 'ascii' (default: saved preference, then auto-detect)
  #[arg(short, long, default_value = "auto")]
  display_mode: CliDisplayMode,

  /// Tenor API key for this session (overrides the saved key)
  #[arg(short = 'k', long)]
  api_key: Option<String>,

  /// Print a shell completion script and exit
  #[arg(long, value_name = "SHELL")]
  completions: Option<Shell>,
}

// --- Logging ---

/// Log to a file in the data dir; the terminal belongs to the UI.
/// Filter with `TENOR_TUI_LOG` (default `info`).
fn init_logging() -> Option<WorkerGuard> {
  let dirs = ProjectDirs::from("", "", "tenor-tui")?;
  let log_dir = dirs.data_local_dir();
  std::fs::create_dir_all(log_dir).ok()?;

  let appender = tracing_appender::rolling::never(log_dir, "tenor-tui.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);
  let filter = EnvFilter::try_from_env("TENOR_TUI_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
  tracing_subscriber::fmt().with_env_filter(filter).with_writer(writer).with_ansi(false).init();
  Some(guard)
}

// --- Main ---

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();

  if let Some(shell) = args.completions {
    clap_complete::generate(shell, &mut Args::command(), "tenor-tui", &mut std::io::stdout());
    return Ok(());
  }

  let _log_guard = init_logging();
  info!(version = env!("CARGO_PKG_VERSION"), "starting");

  let default_hook = std::panic::take_hook();
  std::panic::set_hook(Box::new(move |info| {
    ratatui::restore();
    default_hook(info);
  }));

  let mut terminal = ratatui::init();
  let result = run(&mut terminal, args).await;
  ratatui::restore();
  result
}

async fn run(terminal: &mut DefaultTerminal, args: Args) -> Result<()> {
  let config = Config::load();
  let display_mode = display::resolve_display_mode(args.display_mode, config.display_mode.as_deref());
  let http = tenor::build_http_client()?;
  let gateway = Arc::new(TenorClient::new(http));
  let mut app = App::new(FileSettingsStore::new(), gateway, display_mode, &config, args.api_key);
  info!(display = display_mode.label(), "ui ready");

  loop {
    app.check_pending();
    app.expire_error();

    terminal.draw(|frame| ui::ui(frame, &mut app)).context("Failed to draw frame")?;
    sync_kitty_preview(&mut app)?;

    if event::poll(Duration::from_millis(100)).context("Failed to poll terminal events")? {
      match event::read().context("Failed to read terminal event")? {
        Event::Key(key) if key.kind == KeyEventKind::Press => {
          input::handle_key_event(&mut app, key);
        }
        _ => {}
      }
    }

    if app.should_quit {
      break;
    }
  }

  if app.display_mode == DisplayMode::Kitty {
    kitty_delete_all()?;
  }
  info!("exiting");
  Ok(())
}

/// Send the selected preview to the terminal when it or its area changed, and
/// clear it when the preview pane has nothing to show.
fn sync_kitty_preview<S: SettingsStore, G: SearchGateway>(app: &mut App<S, G>) -> Result<()> {
  if app.display_mode != DisplayMode::Kitty {
    if app.gfx.last_sent.take().is_some() {
      kitty_delete_all()?;
    }
    return Ok(());
  }

  match (app.gfx.thumb_area, app.preview.as_ref()) {
    (Some(area), Some((url, image))) => {
      let key = (url.clone(), area);
      if app.gfx.last_sent.as_ref() != Some(&key) {
        kitty_delete_all()?;
        kitty_render_image(image, area)?;
        app.gfx.last_sent = Some(key);
      }
    }
    _ => {
      if app.gfx.last_sent.take().is_some() {
        kitty_delete_all()?;
      }
    }
  }
  Ok(())
}
