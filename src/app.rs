use anyhow::{Context, Result};
use image::DynamicImage;
use reqwest::Client;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::card::{Card, OverlayAction, ThumbPhase, Thumbnail, render_card};
use crate::config::Config;
use crate::constants::constants;
use crate::controller::{MediaController, Toggle};
use crate::display::DisplayMode;
use crate::fetch::{ThumbRequest, ThumbResult, fetch_items, fetch_thumbnails};
use crate::item::ItemStore;
use crate::media::{CardId, MediaBackend, MediaEvent, PlaybackSession};
use crate::player::MpvBackend;
use crate::search;
use crate::source::{Location, Site};
use crate::theme::{THEMES, theme_index};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
  Browse,
  Search,
}

/// Progress of the one-shot item list load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
  Loading,
  Loaded,
  /// Terminal: the grid is replaced by this message.
  Failed(String),
}

/// Terminal graphics state for card thumbnails.
#[derive(Default)]
pub struct GraphicsCache {
  /// Decoded thumbnails by card.
  pub images: HashMap<CardId, DynamicImage>,
  /// Thumbnails cropped to the last drawn cell size.
  pub resized: HashMap<CardId, (u16, u16, DynamicImage)>,
}

/// In-flight async task receivers.
pub(crate) struct AsyncTasks {
  pub(crate) load_rx: Option<oneshot::Receiver<Result<ItemStore>>>,
  pub(crate) thumb_tx: mpsc::Sender<ThumbResult>,
  pub(crate) thumb_rx: mpsc::Receiver<ThumbResult>,
  pub(crate) media_rx: mpsc::UnboundedReceiver<MediaEvent>,
}

pub struct App<B: MediaBackend = MpvBackend> {
  pub site: Site,
  pub store: ItemStore,
  pub load: LoadState,
  pub mode: AppMode,
  pub query: String,
  /// Cursor position within the search input (char index).
  pub query_cursor: usize,
  /// Horizontal scroll offset for the search input.
  pub query_scroll: usize,
  /// Cards for the items matching `query`, in store order.
  pub cards: Vec<Card>,
  /// Index into `cards`.
  pub selected: usize,
  /// First visible grid row.
  pub scroll_row: usize,
  /// Grid columns at the last draw; drives up/down navigation.
  pub columns: usize,
  pub theme_index: usize,
  pub display_mode: DisplayMode,
  pub controller: MediaController<B>,
  pub thumbs: HashMap<CardId, Thumbnail>,
  pub gfx: GraphicsCache,
  pub last_error: Option<String>,
  pub status_message: Option<String>,
  pub should_quit: bool,
  http_client: Client,
  pub(crate) tasks: AsyncTasks,
  /// When the last error was set — used for auto-dismiss.
  error_time: Option<Instant>,
}

impl<B: MediaBackend> App<B> {
  pub fn new(
    site: Site,
    display_mode: DisplayMode,
    controller: MediaController<B>,
    media_rx: mpsc::UnboundedReceiver<MediaEvent>,
  ) -> Self {
    let config = Config::load();
    let (thumb_tx, thumb_rx) = mpsc::channel(64);
    Self {
      site,
      store: ItemStore::default(),
      load: LoadState::Loading,
      mode: AppMode::Browse,
      query: String::new(),
      query_cursor: 0,
      query_scroll: 0,
      cards: Vec::new(),
      selected: 0,
      scroll_row: 0,
      columns: 1,
      theme_index: theme_index(config.theme_name.as_deref()),
      display_mode,
      controller,
      thumbs: HashMap::new(),
      gfx: GraphicsCache::default(),
      last_error: None,
      status_message: None,
      should_quit: false,
      http_client: Client::new(),
      tasks: AsyncTasks { load_rx: None, thumb_tx, thumb_rx, media_rx },
      error_time: None,
    }
  }

  pub fn theme(&self) -> &'static crate::theme::Theme {
    // Safety: theme_index is bounded by theme_index() and the modular
    // arithmetic in next_theme().
    &THEMES[self.theme_index]
  }

  pub fn next_theme(&mut self) {
    self.theme_index = (self.theme_index + 1) % THEMES.len();
    let mut config = Config::load();
    config.theme_name = Some(self.theme().name.to_string());
    config.save();
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

  /// Clear stale error messages.
  pub fn expire_error(&mut self) {
    if let Some(t) = self.error_time
      && t.elapsed() >= Duration::from_secs(constants().error_display_secs)
    {
      self.last_error = None;
      self.error_time = None;
    }
  }

  pub fn selected_card(&self) -> Option<&Card> {
    self.cards.get(self.selected)
  }

  pub fn session(&self, id: CardId) -> PlaybackSession {
    self.controller.session(id)
  }

  // --- Loading ---

  pub fn start_load(&mut self) {
    let client = self.http_client.clone();
    let site = self.site.clone();
    self.load = LoadState::Loading;
    self.status_message = Some("Loading items…".to_string());

    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
      let _ = tx.send(fetch_items(&client, &site).await);
    });
    self.tasks.load_rx = Some(rx);
  }

  pub async fn apply_loaded(&mut self, store: ItemStore) {
    info!(items = store.len(), "items loaded");
    self.store = store;
    self.load = LoadState::Loaded;
    self.rerender().await;
  }

  pub fn apply_load_error(&mut self, err: &anyhow::Error) {
    error!(err = %format!("{:#}", err), "items.json load error");
    self.load = LoadState::Failed(format!("Could not read items.json: {:#}", err));
  }

  // --- Rendering ---

  /// Rebuild the cards for the current query and release media whose cards
  /// disappeared.
  pub async fn rerender(&mut self) {
    let indices = search::filter(&self.query, self.store.items());
    self.cards = indices.iter().filter_map(|&i| self.store.get(i).map(|item| render_card(i, item))).collect();
    debug!(query = %self.query, shown = self.cards.len(), "grid rendered");

    for card in &self.cards {
      self.thumbs.entry(card.id).or_insert_with(|| Thumbnail::for_card(card, &self.site));
    }
    if self.selected >= self.cards.len() {
      self.selected = self.cards.len().saturating_sub(1);
    }

    let visible: HashSet<CardId> = indices.into_iter().collect();
    self.controller.release_hidden(&visible).await;
    self.request_thumbnails();
  }

  pub async fn set_query(&mut self, query: String) {
    self.query = query;
    self.rerender().await;
  }

  fn request_thumbnails(&mut self) {
    let requests: Vec<ThumbRequest> = self
      .cards
      .iter()
      .filter_map(|card| {
        let thumb = self.thumbs.get_mut(&card.id)?;
        thumb.begin().map(|location| ThumbRequest { item: card.id, location })
      })
      .collect();
    self.spawn_thumbnails(requests);
  }

  fn spawn_thumbnails(&self, requests: Vec<ThumbRequest>) {
    if requests.is_empty() {
      return;
    }
    let client = self.http_client.clone();
    let tx = self.tasks.thumb_tx.clone();
    tokio::spawn(fetch_thumbnails(client, requests, tx));
  }

  pub fn handle_thumbnail(&mut self, result: ThumbResult) {
    let Some(thumb) = self.thumbs.get_mut(&result.item) else { return };
    match result.image {
      Ok(image) => {
        if thumb.on_loaded(&result.location) {
          self.gfx.resized.remove(&result.item);
          self.gfx.images.insert(result.item, image);
        }
      }
      Err(_) => {
        if let Some(fallback) = thumb.on_error(&result.location) {
          debug!(item = result.item, location = %fallback, "thumbnail falling back to default artwork");
          self.spawn_thumbnails(vec![ThumbRequest { item: result.item, location: fallback }]);
        } else if thumb.phase() == ThumbPhase::Broken {
          self.gfx.images.remove(&result.item);
        }
      }
    }
  }

  // --- Playback ---

  pub async fn handle_media_event(&mut self, event: MediaEvent) {
    if let Some(transition) = self.controller.observe(event)
      && transition.started()
    {
      self.controller.enforce(transition.id).await;
    }
  }

  /// Overlay click on the selected card.
  pub async fn activate_selected(&mut self) {
    let Some(card) = self.selected_card() else { return };
    let title = card.title.clone();
    let action = card.overlay_action(&self.site);
    match action {
      Ok(OverlayAction::Toggle(request)) => {
        if let Toggle::Failed(e) = self.controller.toggle(request).await {
          self.set_error(format!("{}: {}", title, e));
        }
      }
      Ok(OverlayAction::Open(location)) => {
        if let Err(e) = open_external(&location) {
          self.set_error(format!("{:#}", e));
        }
      }
      Ok(OverlayAction::Nothing) => {}
      Err(e) => {
        warn!(title = %title, err = %e, "cannot resolve card source");
        self.set_error(format!("{}: {:#}", title, e));
      }
    }
  }

  /// Open the selected card's external link, if it has one.
  pub fn open_selected_link(&mut self) {
    let Some(card) = self.selected_card() else { return };
    let link = card.external_link(&self.site);
    match link {
      Ok(Some(location)) => {
        if let Err(e) = open_external(&location) {
          self.set_error(format!("{:#}", e));
        }
      }
      Ok(None) => {}
      Err(e) => self.set_error(format!("{:#}", e)),
    }
  }

  pub async fn stop_all(&mut self) {
    self.controller.shutdown().await;
  }

  // --- Navigation ---

  pub fn move_selection(&mut self, dx: isize, dy: isize) {
    let count = self.cards.len();
    if count == 0 {
      return;
    }
    let columns = self.columns.max(1) as isize;
    let target = self.selected as isize + dx + dy * columns;
    if dy != 0 && (target < 0 || target >= count as isize) {
      // Moving down from a partial last row lands on the last card.
      if dy > 0 && (self.selected as isize / columns) < ((count as isize - 1) / columns) {
        self.selected = count - 1;
      }
      return;
    }
    self.selected = target.clamp(0, count as isize - 1) as usize;
  }

  pub async fn check_pending(&mut self) -> Result<()> {
    if let Some(mut rx) = self.tasks.load_rx.take() {
      match rx.try_recv() {
        Ok(result) => {
          self.status_message = None;
          match result {
            Ok(store) => self.apply_loaded(store).await,
            Err(e) => self.apply_load_error(&e),
          }
        }
        Err(oneshot::error::TryRecvError::Empty) => {
          self.tasks.load_rx = Some(rx);
        }
        Err(oneshot::error::TryRecvError::Closed) => {
          self.status_message = None;
          self.load = LoadState::Failed("Load task failed.".to_string());
        }
      }
    }

    while let Ok(result) = self.tasks.thumb_rx.try_recv() {
      self.handle_thumbnail(result);
    }

    while let Ok(event) = self.tasks.media_rx.try_recv() {
      self.handle_media_event(event).await;
    }

    Ok(())
  }
}

/// Open a link in the system browser, detached from the terminal.
pub fn open_external(location: &Location) -> Result<()> {
  #[cfg(target_os = "macos")]
  let cmd = "open";
  #[cfg(not(target_os = "macos"))]
  let cmd = "xdg-open";
  let mut child = std::process::Command::new(cmd)
    .arg(location.to_string())
    .stdin(std::process::Stdio::null())
    .stdout(std::process::Stdio::null())
    .stderr(std::process::Stdio::null())
    .spawn()
    .with_context(|| format!("Failed to open {}", location))?;
  info!(location = %location, "opened external link");
  // Reap the child in a background thread to avoid zombie processes.
  std::thread::spawn(move || {
    let _ = child.wait();
  });
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::controller::tests::FakeBackend;
  use crate::item::MediaItem;
  use crate::media::{MediaEventKind, PlaybackState};
  use std::path::PathBuf;

  fn make_app() -> (App<FakeBackend>, FakeBackend, mpsc::UnboundedSender<MediaEvent>) {
    let backend = FakeBackend::default();
    let (tx, rx) = mpsc::unbounded_channel();
    let site = Site::Local(PathBuf::from("/nonexistent/gridplay"));
    let app = App::new(site, DisplayMode::Ascii, MediaController::new(backend.clone()), rx);
    (app, backend, tx)
  }

  fn audio(title: &str, tags: &[&str]) -> MediaItem {
    MediaItem {
      title: title.to_string(),
      audio: Some(format!("media/{}.mp3", title.to_lowercase())),
      tags: tags.iter().map(|t| t.to_string()).collect(),
      ..Default::default()
    }
  }

  fn store() -> ItemStore {
    ItemStore::new(vec![audio("Rain", &["ambient"]), audio("Drums", &["rhythm"]), audio("Wind", &["ambient"])])
  }

  #[tokio::test]
  async fn every_keystroke_refilters() {
    let (mut app, _, _) = make_app();
    app.apply_loaded(store()).await;
    assert_eq!(app.cards.len(), 3);

    app.set_query("amb".to_string()).await;
    assert_eq!(app.cards.iter().map(|c| c.id).collect::<Vec<_>>(), vec![0, 2]);
    app.set_query("zzz".to_string()).await;
    assert!(app.cards.is_empty());
    assert_eq!(app.selected, 0);
    app.set_query(String::new()).await;
    assert_eq!(app.cards.len(), 3);
  }

  #[tokio::test]
  async fn selecting_another_card_pauses_the_first() {
    let (mut app, backend, _) = make_app();
    app.apply_loaded(store()).await;
    app.activate_selected().await;
    app.move_selection(1, 0);
    app.activate_selected().await;

    let log = backend.entries();
    let pause_first = log.iter().position(|e| e == "pause 0").unwrap();
    let play_second = log.iter().position(|e| e == "play 1").unwrap();
    assert!(pause_first < play_second);
    assert_eq!(app.controller.running(), vec![1]);
  }

  #[tokio::test]
  async fn filtering_out_a_playing_card_releases_it() {
    let (mut app, _, _) = make_app();
    app.apply_loaded(store()).await;
    app.move_selection(1, 0);
    app.activate_selected().await;
    assert_eq!(app.controller.running(), vec![1]);

    app.set_query("ambient".to_string()).await;
    assert!(app.controller.running().is_empty());
  }

  #[tokio::test]
  async fn overlay_state_follows_events() {
    let (mut app, _, tx) = make_app();
    app.apply_loaded(store()).await;
    app.activate_selected().await;
    assert!(!app.session(0).state.is_active());

    tx.send(MediaEvent::new(0, MediaEventKind::Loading)).unwrap();
    tx.send(MediaEvent::new(0, MediaEventKind::Playing)).unwrap();
    app.check_pending().await.unwrap();
    assert_eq!(app.session(0).state, PlaybackState::Playing);

    tx.send(MediaEvent::new(0, MediaEventKind::Ended)).unwrap();
    app.check_pending().await.unwrap();
    assert!(!app.session(0).state.is_active());
  }

  #[tokio::test]
  async fn queued_start_of_replaced_card_is_stale() {
    let (mut app, backend, tx) = make_app();
    app.apply_loaded(store()).await;
    app.activate_selected().await;
    tx.send(MediaEvent::new(0, MediaEventKind::Loading)).unwrap();
    tx.send(MediaEvent::new(0, MediaEventKind::Playing)).unwrap();

    // Second card chosen before the first card's events are drained.
    app.move_selection(1, 0);
    app.activate_selected().await;
    tx.send(MediaEvent::new(0, MediaEventKind::Paused)).unwrap();
    tx.send(MediaEvent::new(1, MediaEventKind::Loading)).unwrap();
    app.check_pending().await.unwrap();

    assert_eq!(app.controller.running(), vec![1]);
    assert!(!backend.entries().contains(&"pause 1".to_string()));
    assert_eq!(app.session(0).state, PlaybackState::Paused);
    assert_eq!(app.session(1).state, PlaybackState::Loading);
  }

  #[tokio::test]
  async fn load_failure_is_terminal() {
    let (mut app, _, _) = make_app();
    app.start_load();
    for _ in 0..200 {
      app.check_pending().await.unwrap();
      if app.load != LoadState::Loading {
        break;
      }
      tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let LoadState::Failed(msg) = &app.load else { panic!("expected failure, got {:?}", app.load) };
    assert!(msg.contains("items.json"));
    assert!(app.cards.is_empty());
  }

  #[tokio::test]
  async fn thumbnail_errors_fall_back_once() {
    let (mut app, _, _) = make_app();
    app.apply_loaded(ItemStore::new(vec![MediaItem { artwork: Some("art/x.jpg".into()), ..audio("Rain", &[]) }]))
      .await;
    let primary = app.site.resolve("art/x.jpg").unwrap();
    let fallback = app.site.default_artwork().unwrap();
    assert_eq!(app.thumbs[&0].location(), Some(&primary));

    let fail = |location: &Location| ThumbResult { item: 0, location: location.clone(), image: Err(anyhow::anyhow!("boom")) };
    app.handle_thumbnail(fail(&primary));
    assert_eq!(app.thumbs[&0].location(), Some(&fallback));
    app.handle_thumbnail(fail(&fallback));
    app.handle_thumbnail(fail(&fallback));
    assert_eq!(app.thumbs[&0].phase(), ThumbPhase::Broken);
    assert_eq!(app.thumbs[&0].location(), Some(&fallback));
  }

  #[tokio::test]
  async fn grid_navigation_respects_columns() {
    let (mut app, _, _) = make_app();
    app.apply_loaded(ItemStore::new((0..5).map(|i| audio(&format!("T{}", i), &[])).collect())).await;
    app.columns = 3;
    app.move_selection(0, 1);
    assert_eq!(app.selected, 3);
    app.move_selection(1, 0);
    assert_eq!(app.selected, 4);
    app.move_selection(1, 0);
    assert_eq!(app.selected, 4);
    app.move_selection(0, -1);
    assert_eq!(app.selected, 1);
    app.move_selection(-1, 0);
    app.move_selection(-1, 0);
    assert_eq!(app.selected, 0);
    app.selected = 2;
    app.move_selection(0, 1);
    assert_eq!(app.selected, 4);
  }
}
