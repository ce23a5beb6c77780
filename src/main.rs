mod app;
mod card;
mod config;
mod constants;
mod controller;
mod display;
mod fetch;
mod focus;
mod graphics;
mod input;
mod item;
mod media;
mod player;
mod search;
mod source;
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
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use app::App;
use config::Config;
use constants::constants;
use controller::MediaController;
use display::CliDisplayMode;
use player::MpvBackend;
use source::Site;

// --- CLI ---

#[derive(Parser, Debug)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about, long_about = None)]
struct Args {
  /// Gallery root: a directory or an http(s) URL holding data/items.json
  #[arg(default_value = ".")]
  root: String,

  /// Display mode: 'auto', 'direct', or 'ascii' (default: auto-detect)
  #[arg(short, long, default_value = "auto")]
  display_mode: CliDisplayMode,

  /// Media player executable (default: mpv from PATH)
  #[arg(short, long)]
  player: Option<String>,

  /// Print shell completions and exit
  #[arg(long, value_name = "SHELL")]
  completions: Option<Shell>,
}

// --- Logging ---

/// Log to a file in the data dir; the terminal belongs to the UI.
fn init_logging() -> Option<WorkerGuard> {
  let dirs = ProjectDirs::from("", "", "gridplay")?;
  let log_dir = dirs.data_local_dir();
  std::fs::create_dir_all(log_dir).ok()?;
  let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(log_dir, "gridplay.log"));
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gridplay=info"));
  tracing_subscriber::fmt().with_env_filter(filter).with_writer(writer).with_ansi(false).init();
  Some(guard)
}

// --- Main ---

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();

  if let Some(shell) = args.completions {
    clap_complete::generate(shell, &mut Args::command(), "gridplay", &mut std::io::stdout());
    return Ok(());
  }

  let site = Site::parse(&args.root).context("Invalid gallery root")?;
  let _log_guard = init_logging();
  info!(site = %site, "starting gridplay");

  let default_hook = std::panic::take_hook();
  std::panic::set_hook(Box::new(move |info| {
    ratatui::restore();
    default_hook(info);
  }));

  let mut terminal = ratatui::init();
  let result = run(&mut terminal, args, site).await;
  ratatui::restore();
  result
}

async fn run(terminal: &mut DefaultTerminal, args: Args, site: Site) -> Result<()> {
  let display_mode = display::resolve_display_mode(args.display_mode);
  let player = args.player.or(Config::load().player).unwrap_or_else(|| "mpv".to_string());

  let (media_tx, media_rx) = mpsc::unbounded_channel();
  let controller = MediaController::new(MpvBackend::new(player, media_tx));
  let mut app = App::new(site, display_mode, controller, media_rx);
  app.start_load();

  let poll = Duration::from_millis(constants().poll_interval_ms);
  loop {
    app.check_pending().await?;
    app.expire_error();

    terminal.draw(|frame| ui::ui(frame, &mut app))?;

    if event::poll(poll)? {
      match event::read()? {
        Event::Key(key) if key.kind == KeyEventKind::Press => {
          input::handle_key_event(&mut app, key).await?;
        }
        _ => {}
      }
    }

    if app.should_quit {
      break;
    }
  }

  app.stop_all().await;
  info!("exiting");
  Ok(())
}
