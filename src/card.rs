use anyhow::Result;

use crate::controller::PlayRequest;
use crate::focus::{FocusPoint, resolve_focus, resolve_video_focus};
use crate::item::{MediaItem, stable_key};
use crate::media::{CardId, MediaKind, MediaSource, PlaybackSession, PlaybackState};
use crate::source::{Location, Site, cache_bust};

/// The single primary action of a card, chosen by priority video > audio > link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardKind {
  Video(String),
  Audio(String),
  Link(String),
  None,
}

impl CardKind {
  pub fn of(item: &MediaItem) -> Self {
    if let Some(video) = &item.video {
      CardKind::Video(video.clone())
    } else if let Some(audio) = &item.audio {
      CardKind::Audio(audio.clone())
    } else if let Some(url) = &item.url {
      CardKind::Link(url.clone())
    } else {
      CardKind::None
    }
  }
}

/// View model for one card.
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
  pub id: CardId,
  pub title: String,
  pub description: String,
  pub tags: Vec<String>,
  pub kind: CardKind,
  /// Raw artwork reference; `None` means the default asset.
  pub artwork: Option<String>,
  pub image_focus: Option<String>,
  pub video_focus: Option<String>,
  /// External link shown next to a media overlay.
  pub external_link: Option<String>,
}

pub fn render_card(id: CardId, item: &MediaItem) -> Card {
  let kind = CardKind::of(item);
  let image_focus = resolve_focus(&item.focus);
  let video_focus = match kind {
    CardKind::Video(_) => resolve_video_focus(&item.focus_video, image_focus.as_deref()),
    _ => None,
  };
  let external_link = match kind {
    CardKind::Video(_) | CardKind::Audio(_) => item.url.clone(),
    CardKind::Link(_) | CardKind::None => None,
  };
  Card {
    id,
    title: item.title.clone(),
    description: item.description.clone(),
    tags: item.tags.clone(),
    kind,
    artwork: item.artwork.clone(),
    image_focus,
    video_focus,
    external_link,
  }
}

/// What activating a card's overlay does.
#[derive(Debug, Clone)]
pub enum OverlayAction {
  Toggle(PlayRequest),
  Open(Location),
  Nothing,
}

impl Card {
  /// Resolve the overlay's action. Media sources are resolved here, at
  /// activation time, and cache-busted with the card's stable key.
  pub fn overlay_action(&self, site: &Site) -> Result<OverlayAction> {
    let (kind, raw) = match &self.kind {
      CardKind::Video(raw) => (MediaKind::Video, raw),
      CardKind::Audio(raw) => (MediaKind::Audio, raw),
      CardKind::Link(url) => return Ok(OverlayAction::Open(site.resolve(url)?)),
      CardKind::None => return Ok(OverlayAction::Nothing),
    };
    let location = cache_bust(site.resolve(raw)?, &stable_key(&self.title, raw));
    let focus = self.video_focus.as_deref().and_then(FocusPoint::parse);
    Ok(OverlayAction::Toggle(PlayRequest { id: self.id, source: MediaSource { kind, location, focus } }))
  }

  pub fn external_link(&self, site: &Site) -> Result<Option<Location>> {
    let url = match &self.kind {
      CardKind::Link(url) => Some(url),
      _ => self.external_link.as_ref(),
    };
    url.map(|u| site.resolve(u)).transpose()
  }

  pub fn thumbnail_focus(&self) -> FocusPoint {
    self.image_focus.as_deref().and_then(FocusPoint::parse).unwrap_or(FocusPoint::CENTER)
  }

  pub fn overlay_label(&self, session: &PlaybackSession) -> Option<&'static str> {
    let idle = match self.kind {
      CardKind::Video(_) => "▶ Play video",
      CardKind::Audio(_) => "▶ Play audio",
      CardKind::Link(_) => return Some("↗ Open link"),
      CardKind::None => return None,
    };
    Some(match session.state {
      PlaybackState::Loading => "… Loading",
      PlaybackState::Stalled => "… Buffering",
      PlaybackState::Playing => "⏸ Pause",
      _ => idle,
    })
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbPhase {
  Pending,
  Loading,
  Ready,
  /// Both the artwork and the fallback failed; the card shows a placeholder.
  Broken,
}

/// Thumbnail source selection with a single fallback swap.
#[derive(Debug, Clone, PartialEq)]
pub struct Thumbnail {
  location: Option<Location>,
  fallback: Option<Location>,
  fell_back: bool,
  phase: ThumbPhase,
}

impl Thumbnail {
  /// A card without artwork starts on the fallback and has no swap left.
  pub fn new(primary: Option<Location>, fallback: Option<Location>) -> Self {
    match primary {
      Some(location) => Self { location: Some(location), fallback, fell_back: false, phase: ThumbPhase::Pending },
      None => Self { location: fallback, fallback: None, fell_back: true, phase: ThumbPhase::Pending },
    }
  }

  pub fn for_card(card: &Card, site: &Site) -> Self {
    let primary = card.artwork.as_deref().and_then(|a| site.resolve(a).ok());
    Self::new(primary, site.default_artwork().ok())
  }

  pub fn phase(&self) -> ThumbPhase {
    self.phase
  }

  pub fn location(&self) -> Option<&Location> {
    self.location.as_ref()
  }

  /// Start loading if nothing has been requested yet.
  pub fn begin(&mut self) -> Option<Location> {
    if self.phase != ThumbPhase::Pending {
      return None;
    }
    match &self.location {
      Some(location) => {
        self.phase = ThumbPhase::Loading;
        Some(location.clone())
      }
      None => {
        self.phase = ThumbPhase::Broken;
        None
      }
    }
  }

  pub fn on_loaded(&mut self, location: &Location) -> bool {
    if self.location.as_ref() != Some(location) || self.phase != ThumbPhase::Loading {
      return false;
    }
    self.phase = ThumbPhase::Ready;
    true
  }

  /// Handle a load error. Returns the fallback to load on the first error;
  /// every later error is a no-op.
  pub fn on_error(&mut self, location: &Location) -> Option<Location> {
    if self.location.as_ref() != Some(location) || self.phase == ThumbPhase::Broken {
      return None;
    }
    if !self.fell_back {
      self.fell_back = true;
      if let Some(fallback) = self.fallback.take() {
        self.location = Some(fallback.clone());
        self.phase = ThumbPhase::Loading;
        return Some(fallback);
      }
    }
    self.phase = ThumbPhase::Broken;
    None
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::media::MediaError;
  use std::path::PathBuf;

  fn site() -> Site {
    Site::parse("https://gallery.example.net/").unwrap()
  }

  fn item() -> MediaItem {
    MediaItem { title: "Clip".into(), ..Default::default() }
  }

  #[test]
  fn video_wins_over_audio() {
    let item = MediaItem { video: Some("v.mp4".into()), audio: Some("a.mp3".into()), url: Some("u".into()), ..item() };
    let card = render_card(0, &item);
    assert_eq!(card.kind, CardKind::Video("v.mp4".into()));
    let OverlayAction::Toggle(req) = card.overlay_action(&site()).unwrap() else { panic!("expected media") };
    assert_eq!(req.source.kind, MediaKind::Video);
  }

  #[test]
  fn kind_priority_falls_through() {
    assert_eq!(CardKind::of(&MediaItem { audio: Some("a.mp3".into()), ..item() }), CardKind::Audio("a.mp3".into()));
    assert_eq!(CardKind::of(&MediaItem { url: Some("https://x.org".into()), ..item() }), CardKind::Link("https://x.org".into()));
    assert_eq!(CardKind::of(&item()), CardKind::None);
  }

  #[test]
  fn renders_with_every_optional_field_absent() {
    let card = render_card(4, &MediaItem::default());
    assert_eq!(card.kind, CardKind::None);
    assert!(card.tags.is_empty());
    assert!(card.artwork.is_none());
    assert!(matches!(card.overlay_action(&site()).unwrap(), OverlayAction::Nothing));
    assert_eq!(card.overlay_label(&PlaybackSession::default()), None);
    assert_eq!(card.external_link(&site()).unwrap(), None);
  }

  #[test]
  fn tags_keep_input_order() {
    let card = render_card(0, &MediaItem { tags: vec!["z".into(), "a".into(), "m".into()], ..item() });
    assert_eq!(card.tags, vec!["z", "a", "m"]);
  }

  #[test]
  fn same_media_different_titles_resolve_differently() {
    let raw = "media/shared.mp3";
    let a = render_card(0, &MediaItem { title: "One".into(), audio: Some(raw.into()), ..item() });
    let b = render_card(1, &MediaItem { title: "Two".into(), audio: Some(raw.into()), ..item() });
    let location = |card: &Card| match card.overlay_action(&site()).unwrap() {
      OverlayAction::Toggle(req) => req.source.location,
      other => panic!("unexpected {:?}", other),
    };
    assert_ne!(location(&a), location(&b));
    assert_eq!(location(&a), location(&a));
  }

  #[test]
  fn link_card_opens_resolved_url() {
    let card = render_card(0, &MediaItem { url: Some("about.html".into()), ..item() });
    let OverlayAction::Open(loc) = card.overlay_action(&site()).unwrap() else { panic!("expected link") };
    assert_eq!(loc.to_string(), "https://gallery.example.net/about.html");
  }

  #[test]
  fn url_alongside_media_is_an_external_link() {
    let card = render_card(0, &MediaItem { audio: Some("a.mp3".into()), url: Some("https://x.org/".into()), ..item() });
    assert_eq!(card.external_link(&site()).unwrap().unwrap().to_string(), "https://x.org/");
  }

  #[test]
  fn video_focus_inherits_image_focus() {
    let mut item = MediaItem { video: Some("v.mp4".into()), ..item() };
    item.focus.pair = Some((150.0, -10.0));
    let card = render_card(0, &item);
    assert_eq!(card.image_focus.as_deref(), Some("100% 0%"));
    assert_eq!(card.video_focus.as_deref(), Some("100% 0%"));
    let OverlayAction::Toggle(req) = card.overlay_action(&site()).unwrap() else { panic!("expected media") };
    assert_eq!(req.source.focus, Some(FocusPoint { x: 100.0, y: 0.0 }));
  }

  #[test]
  fn overlay_label_follows_observed_state() {
    let card = render_card(0, &MediaItem { audio: Some("a.mp3".into()), ..item() });
    let session = |state| PlaybackSession { attached: true, state };
    assert_eq!(card.overlay_label(&session(PlaybackState::Playing)), Some("⏸ Pause"));
    assert_eq!(card.overlay_label(&session(PlaybackState::Failed(MediaError::Unplayable))), Some("▶ Play audio"));
    assert_eq!(card.overlay_label(&session(PlaybackState::Ended)), Some("▶ Play audio"));
  }

  fn file(name: &str) -> Location {
    Location::File(PathBuf::from(name))
  }

  #[test]
  fn thumbnail_falls_back_exactly_once() {
    let mut thumb = Thumbnail::new(Some(file("art.jpg")), Some(file("default.png")));
    assert_eq!(thumb.begin(), Some(file("art.jpg")));
    assert_eq!(thumb.on_error(&file("art.jpg")), Some(file("default.png")));
    assert_eq!(thumb.on_error(&file("default.png")), None);
    assert_eq!(thumb.phase(), ThumbPhase::Broken);
    assert_eq!(thumb.on_error(&file("default.png")), None);
    assert_eq!(thumb.on_error(&file("art.jpg")), None);
    assert_eq!(thumb.location(), Some(&file("default.png")));
  }

  #[test]
  fn missing_artwork_starts_on_fallback_without_a_swap() {
    let mut thumb = Thumbnail::new(None, Some(file("default.png")));
    assert_eq!(thumb.begin(), Some(file("default.png")));
    assert_eq!(thumb.on_error(&file("default.png")), None);
    assert_eq!(thumb.phase(), ThumbPhase::Broken);
  }

  #[test]
  fn stale_results_are_ignored() {
    let mut thumb = Thumbnail::new(Some(file("art.jpg")), Some(file("default.png")));
    thumb.begin();
    assert!(!thumb.on_loaded(&file("other.jpg")));
    assert!(thumb.on_loaded(&file("art.jpg")));
    assert_eq!(thumb.phase(), ThumbPhase::Ready);
    assert_eq!(thumb.begin(), None);
  }
}
