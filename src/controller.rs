//! Single-active-player policy across all cards.
//!
//! At most one element plays at a time. Starting a card pauses every other
//! registered element, each pause awaited, before the target is asked to
//! play. Paused elements are detached immediately; the next play reattaches.

use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

use crate::media::{
  CardId, MediaBackend, MediaElement, MediaError, MediaEvent, MediaEventKind, MediaKind, MediaSource, PlaybackSession,
  PlaybackState, Transition,
};

/// An overlay activation for a media card.
#[derive(Debug, Clone)]
pub struct PlayRequest {
  pub id: CardId,
  pub source: MediaSource,
}

/// What an overlay activation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Toggle {
  Paused,
  PlayRequested,
  Failed(MediaError),
}

pub struct MediaController<B: MediaBackend> {
  backend: B,
  /// Registry of elements created so far, keyed by card.
  elements: HashMap<CardId, (MediaKind, B::Element)>,
  states: HashMap<CardId, PlaybackState>,
}

impl<B: MediaBackend> MediaController<B> {
  pub fn new(backend: B) -> Self {
    Self { backend, elements: HashMap::new(), states: HashMap::new() }
  }

  pub fn session(&self, id: CardId) -> PlaybackSession {
    PlaybackSession {
      attached: self.elements.get(&id).is_some_and(|(_, el)| el.is_attached()),
      state: self.states.get(&id).cloned().unwrap_or_default(),
    }
  }

  /// Cards whose elements are currently running.
  pub fn running(&self) -> Vec<CardId> {
    let mut ids: Vec<CardId> = self.elements.iter().filter(|(_, (_, el))| !el.is_paused()).map(|(id, _)| *id).collect();
    ids.sort_unstable();
    ids
  }

  /// Overlay click: pause a running card, otherwise lazily create and attach
  /// its element and start it exclusively.
  pub async fn toggle(&mut self, request: PlayRequest) -> Toggle {
    let id = request.id;
    let running = self.elements.get(&id).is_some_and(|(_, el)| !el.is_paused());
    if running {
      self.pause_element(id).await;
      return Toggle::Paused;
    }

    let kind = request.source.kind;
    let replace = self.elements.get(&id).is_some_and(|(k, _)| *k != kind);
    if replace {
      self.elements.remove(&id);
    }
    let (_, element) = self.elements.entry(id).or_insert_with(|| (kind, self.backend.create(id, kind)));
    if !element.is_attached() {
      debug!(id, source = %request.source.location, "attaching source");
      element.attach(request.source);
    }

    match self.activate(id).await {
      Ok(()) => Toggle::PlayRequested,
      Err(e) => Toggle::Failed(e),
    }
  }

  /// Pause every other element, then request play on `id`.
  pub async fn activate(&mut self, id: CardId) -> Result<(), MediaError> {
    self.pause_others(id).await;
    let Some((_, element)) = self.elements.get_mut(&id) else { return Ok(()) };
    info!(id, "play requested");
    if let Err(e) = element.play().await {
      warn!(id, err = %e, "play request failed");
      element.detach();
      self.states.insert(id, PlaybackState::Failed(e.clone()));
      return Err(e);
    }
    Ok(())
  }

  pub async fn pause_others(&mut self, id: CardId) {
    let others: Vec<CardId> = self.running().into_iter().filter(|other| *other != id).collect();
    for other in others {
      debug!(id = other, by = id, "pausing for exclusive playback");
      self.pause_element(other).await;
    }
  }

  async fn pause_element(&mut self, id: CardId) {
    if let Some((_, element)) = self.elements.get_mut(&id) {
      element.pause().await;
      element.detach();
    }
  }

  /// Fold an element event into its session. Events for cards that are no
  /// longer registered are dropped.
  pub fn observe(&mut self, event: MediaEvent) -> Option<Transition> {
    if !self.elements.contains_key(&event.id) {
      return None;
    }
    let previous = self.states.get(&event.id).cloned().unwrap_or_default();
    let current = previous.apply(&event.kind);
    if let MediaEventKind::Error(e) = &event.kind {
      warn!(id = event.id, err = %e, "playback failed");
    }
    self.states.insert(event.id, current.clone());
    (previous != current).then_some(Transition { id: event.id, previous, current })
  }

  /// Called when `id` is observed to start: nothing else may keep playing.
  /// A start from an element that was paused since the event was sent is
  /// stale and changes nothing.
  pub async fn enforce(&mut self, id: CardId) {
    if self.elements.get(&id).is_none_or(|(_, el)| el.is_paused()) {
      debug!(id, "ignoring start from a paused element");
      return;
    }
    self.pause_others(id).await;
  }

  /// Drop elements whose cards are no longer on screen.
  pub async fn release_hidden(&mut self, visible: &HashSet<CardId>) {
    let hidden: Vec<CardId> = self.elements.keys().copied().filter(|id| !visible.contains(id)).collect();
    for id in hidden {
      self.pause_element(id).await;
      self.elements.remove(&id);
      self.states.remove(&id);
    }
  }

  pub async fn shutdown(&mut self) {
    let ids: Vec<CardId> = self.elements.keys().copied().collect();
    for id in ids {
      self.pause_element(id).await;
    }
  }
}
