//! Focal points for cropping thumbnails and aligning video.
//!
//! Items carry either a literal CSS-style position (`"center top"`, `"30% 70%"`)
//! or an `[x, y]` percentage pair. Both end up as the same position string, and
//! the string is parsed back into percentages when a crop is computed.

use serde_json::Value;

/// Raw focus hints collected from an item's `focus`/`focal` style fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FocusHint {
  pub text: Option<String>,
  pub pair: Option<(f64, f64)>,
}

impl FocusHint {
  /// Collect hints from candidate fields in priority order. The first string
  /// and the first well-formed pair are kept; anything else is ignored.
  pub fn from_values<'a>(values: impl IntoIterator<Item = Option<&'a Value>>) -> Self {
    let mut hint = Self::default();
    for value in values.into_iter().flatten() {
      match value {
        Value::String(s) if hint.text.is_none() && !s.trim().is_empty() => {
          hint.text = Some(s.trim().to_string());
        }
        Value::Array(arr) if hint.pair.is_none() => {
          hint.pair = parse_pair(arr);
        }
        _ => {}
      }
    }
    hint
  }
}

fn parse_pair(arr: &[Value]) -> Option<(f64, f64)> {
  let [x, y] = arr else { return None };
  let num = |v: &Value| -> Option<f64> {
    let n = match v {
      Value::Number(n) => n.as_f64()?,
      Value::String(s) => s.trim().parse().ok()?,
      _ => return None,
    };
    n.is_finite().then_some(n)
  };
  Some((num(x)?, num(y)?))
}

/// Format a percentage clamped to `[0, 100]` with the shortest decimal form.
fn format_pct(v: f64) -> String {
  // `+ 0.0` folds negative zero so it prints as "0".
  format!("{}%", v.clamp(0.0, 100.0) + 0.0)
}

/// Resolve a hint to a position string: the explicit string wins, otherwise
/// the clamped pair.
pub fn resolve_focus(hint: &FocusHint) -> Option<String> {
  if let Some(text) = &hint.text {
    return Some(text.clone());
  }
  hint.pair.map(|(x, y)| format!("{} {}", format_pct(x), format_pct(y)))
}

/// Video focus uses its own hints, otherwise inherits the image focus.
pub fn resolve_video_focus(video: &FocusHint, image_focus: Option<&str>) -> Option<String> {
  resolve_focus(video).or_else(|| image_focus.map(str::to_string))
}

/// A focal point in percent of the box, `(0, 0)` being top-left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FocusPoint {
  pub x: f64,
  pub y: f64,
}

impl FocusPoint {
  pub const CENTER: FocusPoint = FocusPoint { x: 50.0, y: 50.0 };

  /// Parse a one- or two-token position (`left|center|right|top|bottom|N%`).
  /// Length units other than percent are not understood and yield `None`.
  pub fn parse(position: &str) -> Option<Self> {
    enum Tok {
      X(f64),
      Y(f64),
      Either(f64),
    }
    let tok = |s: &str| -> Option<Tok> {
      match s.to_ascii_lowercase().as_str() {
        "left" => Some(Tok::X(0.0)),
        "right" => Some(Tok::X(100.0)),
        "top" => Some(Tok::Y(0.0)),
        "bottom" => Some(Tok::Y(100.0)),
        "center" => Some(Tok::Either(50.0)),
        other => {
          let n: f64 = other.strip_suffix('%')?.trim().parse().ok()?;
          n.is_finite().then(|| Tok::Either(n.clamp(0.0, 100.0)))
        }
      }
    };

    let parts: Vec<&str> = position.split_whitespace().collect();
    let (x, y) = match parts.as_slice() {
      [one] => match tok(one)? {
        Tok::X(x) | Tok::Either(x) => (x, 50.0),
        Tok::Y(y) => (50.0, y),
      },
      [a, b] => match (tok(a)?, tok(b)?) {
        (Tok::X(x), Tok::Y(y)) | (Tok::Y(y), Tok::X(x)) => (x, y),
        (Tok::X(x), Tok::Either(y)) | (Tok::Either(y), Tok::X(x)) => (x, y),
        (Tok::Either(x), Tok::Y(y)) | (Tok::Y(y), Tok::Either(x)) => (x, y),
        (Tok::Either(x), Tok::Either(y)) => (x, y),
        // left right, top bottom
        _ => return None,
      },
      _ => return None,
    };
    Some(Self { x, y })
  }

  /// mpv `--video-align-x/y` values in `[-1, 1]`.
  pub fn video_align(self) -> (f64, f64) {
    (self.x / 50.0 - 1.0, self.y / 50.0 - 1.0)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn pair(x: f64, y: f64) -> FocusHint {
    FocusHint { text: None, pair: Some((x, y)) }
  }

  #[test]
  fn pair_is_clamped_to_percent_range() {
    assert_eq!(resolve_focus(&pair(150.0, -10.0)).as_deref(), Some("100% 0%"));
  }

  #[test]
  fn pair_keeps_fractions() {
    assert_eq!(resolve_focus(&pair(33.5, 80.0)).as_deref(), Some("33.5% 80%"));
  }

  #[test]
  fn explicit_string_beats_pair() {
    let hint = FocusHint { text: Some("center top".into()), pair: Some((10.0, 10.0)) };
    assert_eq!(resolve_focus(&hint).as_deref(), Some("center top"));
  }

  #[test]
  fn no_hint_resolves_to_none() {
    assert_eq!(resolve_focus(&FocusHint::default()), None);
  }

  #[test]
  fn video_inherits_image_focus() {
    assert_eq!(resolve_video_focus(&FocusHint::default(), Some("20% 30%")).as_deref(), Some("20% 30%"));
    assert_eq!(resolve_video_focus(&pair(0.0, 100.0), Some("20% 30%")).as_deref(), Some("0% 100%"));
    assert_eq!(resolve_video_focus(&FocusHint::default(), None), None);
  }

  #[test]
  fn hints_from_json_fields() {
    let focus = json!([150, "-10"]);
    let focal = json!("left bottom");
    let hint = FocusHint::from_values([Some(&focus), Some(&focal)]);
    assert_eq!(hint.text.as_deref(), Some("left bottom"));
    assert_eq!(hint.pair, Some((150.0, -10.0)));
  }

  #[test]
  fn malformed_hints_are_ignored() {
    let three = json!([1, 2, 3]);
    let obj = json!({"x": 1});
    let blank = json!("   ");
    let hint = FocusHint::from_values([Some(&three), Some(&obj), Some(&blank), None]);
    assert_eq!(hint, FocusHint::default());
  }

  #[test]
  fn parse_keywords_and_percentages() {
    assert_eq!(FocusPoint::parse("center"), Some(FocusPoint::CENTER));
    assert_eq!(FocusPoint::parse("top"), Some(FocusPoint { x: 50.0, y: 0.0 }));
    assert_eq!(FocusPoint::parse("right"), Some(FocusPoint { x: 100.0, y: 50.0 }));
    assert_eq!(FocusPoint::parse("30% 70%"), Some(FocusPoint { x: 30.0, y: 70.0 }));
    assert_eq!(FocusPoint::parse("bottom left"), Some(FocusPoint { x: 0.0, y: 100.0 }));
    assert_eq!(FocusPoint::parse("left top"), Some(FocusPoint { x: 0.0, y: 0.0 }));
  }

  #[test]
  fn parse_rejects_unknown_units() {
    assert_eq!(FocusPoint::parse("10px 20px"), None);
    assert_eq!(FocusPoint::parse("left right"), None);
    assert_eq!(FocusPoint::parse(""), None);
  }

  #[test]
  fn video_align_maps_percent_to_unit_range() {
    assert_eq!(FocusPoint { x: 0.0, y: 100.0 }.video_align(), (-1.0, 1.0));
    assert_eq!(FocusPoint::CENTER.video_align(), (0.0, 0.0));
  }
}
