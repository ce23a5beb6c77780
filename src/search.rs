use crate::item::MediaItem;

/// Case-insensitive substring match against title, description, or any tag.
/// The query is trimmed; an empty query matches everything.
pub fn matches(query: &str, item: &MediaItem) -> bool {
  let needle = query.trim().to_lowercase();
  if needle.is_empty() {
    return true;
  }
  item.title.to_lowercase().contains(&needle)
    || item.description.to_lowercase().contains(&needle)
    || item.tags.iter().any(|t| t.to_lowercase().contains(&needle))
}

/// Indices of the items matching `query`, in store order.
pub fn filter(query: &str, items: &[MediaItem]) -> Vec<usize> {
  items.iter().enumerate().filter(|(_, item)| matches(query, item)).map(|(i, _)| i).collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn make_item(title: &str, description: &str, tags: &[&str]) -> MediaItem {
    MediaItem {
      title: title.to_string(),
      description: description.to_string(),
      tags: tags.iter().map(|t| t.to_string()).collect(),
      ..Default::default()
    }
  }

  #[test]
  fn empty_query_matches_all() {
    assert!(matches("", &MediaItem::default()));
    assert!(matches("   ", &make_item("Any", "", &[])));
  }

  #[test]
  fn title_match_is_case_insensitive() {
    let item = make_item("Rock Music Mix", "", &[]);
    assert!(matches("rock", &item));
    assert!(matches("MUSIC", &item));
    assert!(matches("  mix ", &item));
  }

  #[test]
  fn description_match() {
    let item = make_item("Untitled", "Field recording from Kyoto", &[]);
    assert!(matches("kyoto", &item));
  }

  #[test]
  fn tag_match() {
    let item = make_item("Some Video", "", &["rock", "Guitar"]);
    assert!(matches("guitar", &item));
    assert!(matches("ROC", &item));
  }

  #[test]
  fn no_match() {
    let item = make_item("Piano Sonata", "slow", &["classical"]);
    assert!(!matches("rock", &item));
    assert!(!matches("piano sonata no. 2", &item));
  }

  #[test]
  fn multibyte_text() {
    let item = make_item("夜の散歩", "", &["環境音"]);
    assert!(matches("散歩", &item));
    assert!(matches("環境", &item));
  }

  #[test]
  fn filter_keeps_store_order() {
    let items = vec![make_item("b rock", "", &[]), make_item("jazz", "", &[]), make_item("a", "", &["rock"])];
    assert_eq!(filter("rock", &items), vec![0, 2]);
    assert_eq!(filter("", &items), vec![0, 1, 2]);
    assert!(filter("polka", &items).is_empty());
  }
}
