//! Attribute maps shared by nodes and text runs.
//!
//! Attributes are a shallow `String -> Value` map. A `null` value is never
//! stored: on merge it means "clear this key", in a delta retain it means
//! "remove this format from the retained run".

use std::collections::BTreeMap;

use serde_json::Value;

pub type Attributes = BTreeMap<String, Value>;

/// Build an attribute map from `(key, value)` pairs.
pub fn attributes<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Attributes
where
  K: Into<String>,
  V: Into<Value>,
{
  pairs
    .into_iter()
    .map(|(key, value)| (key.into(), value.into()))
    .collect()
}

/// Shallow merge `update` into `target`. `null` entries clear the key.
pub fn merge_attributes(target: &mut Attributes, update: &Attributes) {
  for (key, value) in update {
    if value.is_null() {
      target.remove(key);
    } else {
      target.insert(key.clone(), value.clone());
    }
  }
}

/// Compose two optional attribute sets, `b` taking precedence over `a`.
///
/// With `keep_null` the `null` entries of `b` survive, which is what a
/// composed retain needs so that it can still clear the format when applied.
pub fn compose_attributes(
  a: Option<&Attributes>,
  b: Option<&Attributes>,
  keep_null: bool,
) -> Option<Attributes> {
  let mut composed = b.cloned().unwrap_or_default();
  if !keep_null {
    composed.retain(|_, value| !value.is_null());
  }
  if let Some(a) = a {
    for (key, value) in a {
      if !composed.contains_key(key) && !(b.is_some_and(|b| b.contains_key(key))) {
        composed.insert(key.clone(), value.clone());
      }
    }
  }
  normalize(composed)
}

/// The attribute change that undoes applying `attr` on top of `base`.
pub fn invert_attributes(attr: Option<&Attributes>, base: Option<&Attributes>) -> Attributes {
  let empty = Attributes::new();
  let attr = attr.unwrap_or(&empty);
  let base = base.unwrap_or(&empty);

  let mut inverted = Attributes::new();
  for (key, value) in base {
    if attr.get(key).is_some_and(|new| new != value) {
      inverted.insert(key.clone(), value.clone());
    }
  }
  for (key, value) in attr {
    if !base.contains_key(key) && !value.is_null() {
      inverted.insert(key.clone(), Value::Null);
    }
  }
  inverted
}

/// The attribute change that turns `a` into `b`.
pub fn diff_attributes(a: &Attributes, b: &Attributes) -> Attributes {
  let mut diff = Attributes::new();
  for (key, value) in b {
    if a.get(key) != Some(value) {
      diff.insert(key.clone(), value.clone());
    }
  }
  for key in a.keys() {
    if !b.contains_key(key) {
      diff.insert(key.clone(), Value::Null);
    }
  }
  diff
}

/// Empty maps and `None` mean the same thing; collapse the former.
pub fn normalize(attributes: Attributes) -> Option<Attributes> {
  (!attributes.is_empty()).then_some(attributes)
}

/// Whether `attributes` carries `key == true`.
pub fn is_flag_set(attributes: Option<&Attributes>, key: &str) -> bool {
  attributes
    .and_then(|attrs| attrs.get(key))
    .is_some_and(|value| value == &Value::Bool(true))
}

#[cfg(test)]
mod test {
  use serde_json::json;

  use super::*;

  #[test]
  fn merge_clears_null_keys() {
    let mut target = attributes([("bold", json!(true)), ("color", json!("red"))]);
    merge_attributes(
      &mut target,
      &attributes([("bold", Value::Null), ("italic", json!(true))]),
    );
    assert_eq!(
      target,
      attributes([("color", json!("red")), ("italic", json!(true))])
    );
  }

  #[test]
  fn compose_respects_keep_null() {
    let a = attributes([("bold", json!(true))]);
    let b = attributes([("bold", Value::Null), ("italic", json!(true))]);
    assert_eq!(
      compose_attributes(Some(&a), Some(&b), false),
      Some(attributes([("italic", json!(true))]))
    );
    assert_eq!(
      compose_attributes(Some(&a), Some(&b), true),
      Some(b.clone())
    );
    assert_eq!(compose_attributes(None, None, true), None);
  }

  #[test]
  fn invert_restores_previous_values() {
    let base = attributes([("bold", json!(true)), ("color", json!("red"))]);
    let change = attributes([("color", json!("blue")), ("italic", json!(true))]);
    assert_eq!(
      invert_attributes(Some(&change), Some(&base)),
      attributes([("color", json!("red")), ("italic", Value::Null)])
    );
  }

  #[test]
  fn diff_produces_clearing_entries() {
    let a = attributes([("bold", json!(true))]);
    let b = attributes([("italic", json!(true))]);
    assert_eq!(
      diff_attributes(&a, &b),
      attributes([("bold", Value::Null), ("italic", json!(true))])
    );
  }
}
