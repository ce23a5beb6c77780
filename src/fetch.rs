use anyhow::{Context, Result, anyhow};
use image::DynamicImage;
use reqwest::Client;
use reqwest::header::{CACHE_CONTROL, PRAGMA};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::constants::constants;
use crate::item::ItemStore;
use crate::source::{Location, Site};

/// Read a resource, bypassing HTTP caches. Non-success statuses are errors.
pub async fn fetch_bytes(client: &Client, location: &Location) -> Result<Vec<u8>> {
  match location {
    Location::File(path) => {
      tokio::fs::read(path).await.with_context(|| format!("Failed to read {}", path.display()))
    }
    Location::Network(url) => {
      let response = client
        .get(url.clone())
        .header(CACHE_CONTROL, "no-cache")
        .header(PRAGMA, "no-cache")
        .send()
        .await
        .with_context(|| format!("Request to {} failed", url))?;
      let status = response.status();
      if !status.is_success() {
        return Err(anyhow!("HTTP {}", status.as_u16()));
      }
      let bytes = response.bytes().await.with_context(|| format!("Failed to read body from {}", url))?;
      Ok(bytes.to_vec())
    }
  }
}

/// Load `items.json` from the site root.
pub async fn fetch_items(client: &Client, site: &Site) -> Result<ItemStore> {
  let location = site.items_location()?;
  debug!(location = %location, "fetching items");
  let bytes = fetch_bytes(client, &location).await?;
  let value: serde_json::Value =
    serde_json::from_slice(&bytes).with_context(|| format!("{} is not valid JSON", location))?;
  Ok(ItemStore::from_json(&value))
}

pub async fn fetch_thumbnail(client: &Client, location: &Location) -> Result<DynamicImage> {
  let bytes = fetch_bytes(client, location).await?;
  image::load_from_memory(&bytes).with_context(|| format!("Failed to decode image from {}", location))
}

/// A thumbnail request for one item; `location` is the source currently
/// selected by the card's thumbnail state.
#[derive(Debug, Clone)]
pub struct ThumbRequest {
  pub item: usize,
  pub location: Location,
}

#[derive(Debug)]
pub struct ThumbResult {
  pub item: usize,
  pub location: Location,
  pub image: Result<DynamicImage>,
}

/// Fetch thumbnails with bounded concurrency, sending each result through
/// `tx` as soon as it is available.
pub async fn fetch_thumbnails(client: Client, requests: Vec<ThumbRequest>, tx: mpsc::Sender<ThumbResult>) {
  use futures::stream::{self, StreamExt};

  stream::iter(requests)
    .map(|req| {
      let client = client.clone();
      let tx = tx.clone();
      async move {
        let image = fetch_thumbnail(&client, &req.location).await;
        if let Err(e) = &image {
          warn!(item = req.item, location = %req.location, err = %e, "thumbnail load failed");
        }
        let _ = tx.send(ThumbResult { item: req.item, location: req.location, image }).await;
      }
    })
    .buffer_unordered(constants().thumbnail_concurrency)
    .collect::<()>()
    .await;
}
