use std::process::Stdio;
use tokio::{
  io::{AsyncBufReadExt, BufReader as TokioBufReader},
  process::{ChildStdout, Command},
  sync::{mpsc, oneshot},
  task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::media::{CardId, MediaBackend, MediaElement, MediaError, MediaEvent, MediaEventKind, MediaKind, MediaSource};

/// Prefix of the status line mpv prints while playing.
const STATUS_PREFIX: &str = "gridplay-status";

/// Creates one mpv-backed element per media card.
pub struct MpvBackend {
  player: String,
  events: mpsc::UnboundedSender<MediaEvent>,
}

impl MpvBackend {
  pub fn new(player: impl Into<String>, events: mpsc::UnboundedSender<MediaEvent>) -> Self {
    Self { player: player.into(), events }
  }
}

impl MediaBackend for MpvBackend {
  type Element = MpvElement;

  fn create(&self, id: CardId, kind: MediaKind) -> MpvElement {
    MpvElement { id, kind, player: self.player.clone(), events: self.events.clone(), source: None, running: None }
  }
}

struct Running {
  stop_tx: oneshot::Sender<()>,
  monitor: JoinHandle<()>,
}

/// A card's player. Each play spawns an mpv process; pausing ends it.
pub struct MpvElement {
  id: CardId,
  kind: MediaKind,
  player: String,
  events: mpsc::UnboundedSender<MediaEvent>,
  source: Option<MediaSource>,
  running: Option<Running>,
}

/// Command-line arguments for playing `source`.
pub fn mpv_args(source: &MediaSource) -> Vec<String> {
  let mut args = vec![
    format!("--term-status-msg={} ${{=paused-for-cache}} ${{=time-pos}}", STATUS_PREFIX),
    "--input-terminal=no".to_string(),
  ];
  match source.kind {
    MediaKind::Audio => {
      args.push("--no-video".to_string());
      args.push("--force-window=no".to_string());
    }
    MediaKind::Video => {
      args.push("--force-window=yes".to_string());
      if let Some(focus) = source.focus {
        let (x, y) = focus.video_align();
        args.push("--panscan=1.0".to_string());
        args.push(format!("--video-align-x={}", x));
        args.push(format!("--video-align-y={}", y));
      }
    }
  }
  args.push("--".to_string());
  args.push(source.location.to_string());
  args
}

/// Map one status line to an event. mpv may separate refreshes with `\r`,
/// so only the last segment counts.
pub fn parse_status(line: &str) -> Option<MediaEventKind> {
  let segment = line.split('\r').map(str::trim).rfind(|s| !s.is_empty())?;
  let rest = segment.strip_prefix(STATUS_PREFIX)?;
  match rest.split_whitespace().next() {
    Some("yes") => Some(MediaEventKind::Stalled),
    Some(_) => Some(MediaEventKind::Playing),
    None => None,
  }
}

async fn read_status(stdout: ChildStdout, id: CardId, events: mpsc::UnboundedSender<MediaEvent>) {
  let reader = TokioBufReader::new(stdout);
  let mut lines = reader.lines();
  let mut last = None;
  while let Ok(Some(line)) = lines.next_line().await {
    let Some(kind) = parse_status(&line) else { continue };
    if last.as_ref() != Some(&kind) {
      if events.send(MediaEvent::new(id, kind.clone())).is_err() {
        break;
      }
      last = Some(kind);
    }
  }
}

impl MpvElement {
  fn is_running(&self) -> bool {
    self.running.as_ref().is_some_and(|r| !r.monitor.is_finished())
  }
}

impl MediaElement for MpvElement {
  fn is_attached(&self) -> bool {
    self.source.is_some()
  }

  fn attach(&mut self, source: MediaSource) {
    self.source = Some(source);
  }

  fn detach(&mut self) {
    // Dropping the stop sender makes the monitor kill the process.
    self.running = None;
    self.source = None;
  }

  fn is_paused(&self) -> bool {
    !self.is_running()
  }

  async fn play(&mut self) -> Result<(), MediaError> {
    if self.is_running() {
      return Ok(());
    }
    let Some(source) = &self.source else {
      return Err(MediaError::Unplayable);
    };

    let mut cmd = Command::new(&self.player);
    cmd.args(mpv_args(source));
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    // Send stderr to null — if piped but never drained, the pipe buffer
    // fills and mpv blocks.
    cmd.stderr(Stdio::null());
    cmd.kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|e| {
      if e.kind() == std::io::ErrorKind::NotFound {
        MediaError::PlayerMissing
      } else {
        MediaError::Spawn(e.to_string())
      }
    })?;
    info!(id = self.id, kind = ?self.kind, source = %source.location, "player started");

    let stdout = child.stdout.take().ok_or_else(|| MediaError::Spawn("no stdout".to_string()))?;
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let id = self.id;
    let events = self.events.clone();
    let _ = events.send(MediaEvent::new(id, MediaEventKind::Loading));

    let monitor = tokio::spawn(async move {
      let reader = tokio::spawn(read_status(stdout, id, events.clone()));
      let kind = tokio::select! {
        status = child.wait() => match status {
          Ok(s) if s.success() => MediaEventKind::Ended,
          Ok(s) => MediaEventKind::Error(MediaError::from_exit_code(s.code())),
          Err(e) => MediaEventKind::Error(MediaError::Spawn(e.to_string())),
        },
        // Also fires when the sender is dropped.
        _ = stop_rx => {
          if let Err(e) = child.kill().await {
            warn!(id, err = %e, "failed to kill player");
          }
          MediaEventKind::Paused
        }
      };
      // The reader must be gone before the final event so no status line
      // can follow it.
      reader.abort();
      let _ = reader.await;
      debug!(id, event = ?kind, "player finished");
      let _ = events.send(MediaEvent::new(id, kind));
    });

    self.running = Some(Running { stop_tx, monitor });
    Ok(())
  }

  async fn pause(&mut self) {
    if let Some(running) = self.running.take() {
      let _ = running.stop_tx.send(());
      if let Err(e) = running.monitor.await {
        warn!(id = self.id, err = %e, "player monitor failed");
      }
    }
  }
}
