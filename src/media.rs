//! Media elements and the playback state observed from them.
//!
//! Elements report what actually happened (started, stalled, ended, failed)
//! through [`MediaEvent`]s. Both the card overlay and the exclusivity policy in
//! [`crate::controller`] read playback state from the same fold over those
//! events, never from what a key press intended.

use std::fmt;

use crate::focus::FocusPoint;
use crate::source::Location;

/// Cards are identified by their item's index in the store.
pub type CardId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
  Video,
  Audio,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
  /// The player executable could not be found.
  PlayerMissing,
  /// The player could not be started.
  Spawn(String),
  /// The player failed to initialize.
  Init,
  /// The source could not be opened or decoded.
  Unplayable,
  /// Playback was interrupted by a signal.
  Aborted,
  Exit(i32),
}

impl MediaError {
  /// Map an mpv exit code. `None` means the process was killed by a signal.
  pub fn from_exit_code(code: Option<i32>) -> Self {
    match code {
      Some(1) => MediaError::Init,
      Some(2) => MediaError::Unplayable,
      Some(4) | None => MediaError::Aborted,
      Some(n) => MediaError::Exit(n),
    }
  }
}

impl fmt::Display for MediaError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      MediaError::PlayerMissing => write!(f, "player not found"),
      MediaError::Spawn(msg) => write!(f, "cannot start player: {}", msg),
      MediaError::Init => write!(f, "cannot initialize"),
      MediaError::Unplayable => write!(f, "cannot play source"),
      MediaError::Aborted => write!(f, "aborted"),
      MediaError::Exit(n) => write!(f, "exit {}", n),
    }
  }
}

impl std::error::Error for MediaError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaEventKind {
  /// Source attached and requested; nothing audible yet.
  Loading,
  Playing,
  /// Playback is waiting on the network.
  Stalled,
  Paused,
  Ended,
  Error(MediaError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaEvent {
  pub id: CardId,
  pub kind: MediaEventKind,
}

impl MediaEvent {
  pub fn new(id: CardId, kind: MediaEventKind) -> Self {
    Self { id, kind }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PlaybackState {
  #[default]
  Idle,
  Loading,
  Playing,
  Stalled,
  Paused,
  Ended,
  Failed(MediaError),
}

impl PlaybackState {
  /// Fold one observed event into the state.
  pub fn apply(&self, event: &MediaEventKind) -> PlaybackState {
    match event {
      MediaEventKind::Loading => PlaybackState::Loading,
      MediaEventKind::Playing => PlaybackState::Playing,
      MediaEventKind::Stalled => PlaybackState::Stalled,
      // A late pause after a failure keeps the error visible.
      MediaEventKind::Paused => match self {
        PlaybackState::Failed(e) => PlaybackState::Failed(e.clone()),
        _ => PlaybackState::Paused,
      },
      MediaEventKind::Ended => PlaybackState::Ended,
      MediaEventKind::Error(e) => PlaybackState::Failed(e.clone()),
    }
  }

  /// Whether the overlay shows the "playing" treatment.
  pub fn is_active(&self) -> bool {
    matches!(self, PlaybackState::Loading | PlaybackState::Playing | PlaybackState::Stalled)
  }

  pub fn error(&self) -> Option<&MediaError> {
    match self {
      PlaybackState::Failed(e) => Some(e),
      _ => None,
    }
  }
}

/// What a card hands to its element when first played.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaSource {
  pub kind: MediaKind,
  /// Resolved and cache-busted location.
  pub location: Location,
  pub focus: Option<FocusPoint>,
}

/// One playable element. Attaching a source costs nothing; only `play`
/// touches the network.
#[allow(async_fn_in_trait)]
pub trait MediaElement {
  fn is_attached(&self) -> bool;

  fn attach(&mut self, source: MediaSource);

  /// Drop the source. A running element is stopped first.
  fn detach(&mut self);

  /// Whether the element is currently stopped (never started, paused, ended,
  /// or failed).
  fn is_paused(&self) -> bool;

  /// Request playback. Success means the request was accepted; whether
  /// playback actually starts is reported through events.
  async fn play(&mut self) -> Result<(), MediaError>;

  /// Stop playback. Returns once the element is no longer producing output.
  async fn pause(&mut self);
}

/// Creates elements for cards on first use.
pub trait MediaBackend {
  type Element: MediaElement;

  fn create(&self, id: CardId, kind: MediaKind) -> Self::Element;
}

/// Per-card playback session as seen by the overlay.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackSession {
  pub attached: bool,
  pub state: PlaybackState,
}

/// A state change produced by observing an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
  pub id: CardId,
  pub previous: PlaybackState,
  pub current: PlaybackState,
}

impl Transition {
  /// The element has just become audible.
  pub fn started(&self) -> bool {
    self.current == PlaybackState::Playing && !matches!(self.previous, PlaybackState::Playing | PlaybackState::Stalled)
  }
}
