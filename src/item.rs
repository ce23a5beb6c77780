use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::focus::FocusHint;

/// One gallery record as supplied in `items.json`.
///
/// Loading never fails on a malformed field: wrong types fall back to empty
/// strings, empty tag lists, or no hint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaItem {
  pub title: String,
  pub description: String,
  pub artwork: Option<String>,
  pub tags: Vec<String>,
  pub video: Option<String>,
  pub audio: Option<String>,
  pub url: Option<String>,
  pub focus: FocusHint,
  pub focus_video: FocusHint,
}

/// Stringify a JSON scalar; `null` and compound values yield `None`.
fn scalar_text(value: &Value) -> Option<String> {
  match value {
    Value::String(s) => Some(s.clone()),
    Value::Number(n) => Some(n.to_string()),
    Value::Bool(b) => Some(b.to_string()),
    _ => None,
  }
}

/// Non-blank string references only; whitespace-only counts as absent.
fn reference(obj: &Map<String, Value>, key: &str) -> Option<String> {
  obj.get(key).and_then(Value::as_str).map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

impl MediaItem {
  pub fn from_value(value: &Value) -> Self {
    let Some(obj) = value.as_object() else { return Self::default() };
    let text = |key: &str| obj.get(key).and_then(scalar_text).unwrap_or_default();
    let tags = match obj.get("tags") {
      Some(Value::Array(tags)) => tags.iter().filter_map(scalar_text).collect(),
      _ => Vec::new(),
    };

    Self {
      title: text("title"),
      description: text("description"),
      artwork: reference(obj, "artwork"),
      tags,
      video: reference(obj, "video"),
      audio: reference(obj, "audio"),
      url: reference(obj, "url"),
      focus: FocusHint::from_values([obj.get("focus"), obj.get("focal")]),
      focus_video: FocusHint::from_values([obj.get("focusVideo"), obj.get("focalVideo")]),
    }
  }
}

/// Stable per-item key used to derive cache-busting tokens.
pub fn stable_key(title: &str, media_url: &str) -> String {
  format!("{}\n{}", title, media_url)
}

impl<'de> Deserialize<'de> for MediaItem {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    Value::deserialize(deserializer).map(|v| Self::from_value(&v))
  }
}

/// The loaded item list, held for the lifetime of the gallery.
#[derive(Debug, Default)]
pub struct ItemStore {
  items: Vec<MediaItem>,
}

impl ItemStore {
  pub fn new(items: Vec<MediaItem>) -> Self {
    Self { items }
  }

  /// Build a store from the raw document. A top-level value that isn't an
  /// array is treated as an empty collection.
  pub fn from_json(value: &Value) -> Self {
    match value {
      Value::Array(entries) => Self::new(entries.iter().map(MediaItem::from_value).collect()),
      _ => Self::default(),
    }
  }

  pub fn items(&self) -> &[MediaItem] {
    &self.items
  }

  pub fn get(&self, idx: usize) -> Option<&MediaItem> {
    self.items.get(idx)
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }
}
