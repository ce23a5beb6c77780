//! Resolution of item references against the gallery root.

use anyhow::{Context, Result, anyhow};
use std::fmt;
use std::path::{Path, PathBuf};
use url::Url;

use crate::constants::constants;

/// Where the gallery lives: a directory on disk or an `http(s)` base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Site {
  Local(PathBuf),
  Remote(Url),
}

/// A fully resolved reference to a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
  File(PathBuf),
  Network(Url),
}

impl Location {
  pub fn is_http(&self) -> bool {
    matches!(self, Location::Network(url) if matches!(url.scheme(), "http" | "https"))
  }
}

impl fmt::Display for Location {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Location::File(path) => write!(f, "{}", path.display()),
      Location::Network(url) => write!(f, "{}", url),
    }
  }
}

impl fmt::Display for Site {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Site::Local(path) => write!(f, "{}", path.display()),
      Site::Remote(url) => write!(f, "{}", url),
    }
  }
}

impl Site {
  pub fn parse(root: &str) -> Result<Self> {
    let root = root.trim();
    if root.starts_with("http://") || root.starts_with("https://") {
      let mut url = Url::parse(root).with_context(|| format!("Invalid gallery URL: {}", root))?;
      // Relative joins replace the last path segment unless the base ends in '/'.
      if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
      }
      Ok(Site::Remote(url))
    } else if root.is_empty() {
      Err(anyhow!("Gallery root must not be empty"))
    } else {
      Ok(Site::Local(PathBuf::from(root)))
    }
  }

  /// Resolve an item reference. Absolute URLs pass through (`file:` URLs
  /// become paths); anything else is relative to the site root.
  pub fn resolve(&self, reference: &str) -> Result<Location> {
    let reference = reference.trim();
    // Single-letter "schemes" are Windows drive letters, not URLs.
    if let Ok(url) = Url::parse(reference)
      && url.scheme().len() > 1
    {
      if url.scheme() == "file" {
        let path = url.to_file_path().map_err(|_| anyhow!("Invalid file URL: {}", reference))?;
        return Ok(Location::File(path));
      }
      return Ok(Location::Network(url));
    }

    match self {
      Site::Local(root) => Ok(Location::File(root.join(Path::new(reference)))),
      Site::Remote(base) => {
        base.join(reference).map(Location::Network).with_context(|| format!("Cannot resolve '{}' against {}", reference, base))
      }
    }
  }

  pub fn items_location(&self) -> Result<Location> {
    self.resolve(&constants().items_path)
  }

  pub fn default_artwork(&self) -> Result<Location> {
    self.resolve(&constants().default_artwork)
  }
}

/// Token derived from an item's stable key; identical keys give identical tokens.
pub fn cache_bust_token(key: &str) -> String {
  let hash = blake3::hash(key.as_bytes());
  hash.to_hex()[..16].to_string()
}

/// Append the cache-busting parameter to HTTP sources so a reload is never
/// served from a stale cache entry. Files are read directly and left alone.
pub fn cache_bust(location: Location, key: &str) -> Location {
  if !location.is_http() {
    return location;
  }
  match location {
    Location::Network(mut url) => {
      url.query_pairs_mut().append_pair(&constants().cache_bust_param, &cache_bust_token(key));
      Location::Network(url)
    }
    other => other,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::item::stable_key;

  fn remote() -> Site {
    Site::parse("https://media.example.org/gallery").unwrap()
  }

  #[test]
  fn remote_root_gets_trailing_slash() {
    assert_eq!(
      remote().items_location().unwrap(),
      Location::Network(Url::parse("https://media.example.org/gallery/data/items.json").unwrap())
    );
  }

  #[test]
  fn local_root_joins_paths() {
    let site = Site::parse("/srv/gallery").unwrap();
    assert_eq!(site.resolve("media/a.mp3").unwrap(), Location::File(PathBuf::from("/srv/gallery/media/a.mp3")));
  }

  #[test]
  fn absolute_urls_pass_through() {
    let site = Site::parse(".").unwrap();
    let loc = site.resolve("https://cdn.example.com/v.mp4").unwrap();
    assert!(loc.is_http());
    assert_eq!(loc.to_string(), "https://cdn.example.com/v.mp4");
  }

  #[test]
  fn empty_root_is_rejected() {
    assert!(Site::parse("  ").is_err());
  }

  #[test]
  fn cache_bust_differs_by_title() {
    let raw = "https://cdn.example.com/track.mp3";
    let a = cache_bust(remote().resolve(raw).unwrap(), &stable_key("Morning", raw));
    let b = cache_bust(remote().resolve(raw).unwrap(), &stable_key("Evening", raw));
    assert_ne!(a, b);
    assert!(a.to_string().starts_with("https://cdn.example.com/track.mp3?v="));
  }

  #[test]
  fn cache_bust_is_stable_for_same_key() {
    assert_eq!(cache_bust_token("t\nu"), cache_bust_token("t\nu"));
    assert_eq!(cache_bust_token("t\nu").len(), 16);
  }

  #[test]
  fn cache_bust_keeps_existing_query_and_fragment() {
    let loc = remote().resolve("https://cdn.example.com/a.mp4?res=720#t=10").unwrap();
    let busted = cache_bust(loc, "k").to_string();
    assert!(busted.starts_with("https://cdn.example.com/a.mp4?res=720&v="));
    assert!(busted.ends_with("#t=10"));
  }

  #[test]
  fn cache_bust_leaves_files_alone() {
    let loc = Location::File(PathBuf::from("/srv/a.mp3"));
    assert_eq!(cache_bust(loc.clone(), "k"), loc);
  }
}
