//! The `values` aggregator (§4.7): an ordered, name-indexed heterogeneous
//! container used by ORM-style `TypeConversion<UserRecord>` impls to stream
//! fields in and out without the core special-casing record types.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::kind::Indicator;
use crate::row::CellValue;

/// One named field inside a `Values` aggregator.
#[derive(Debug, Clone)]
struct Field {
  value: CellValue,
  indicator: Indicator,
}

/// A tuple-like record's streamed field set (§4.2, §4.7). Bound as a use
/// binding it delegates to its contained sub-bindings by name (§4.5); bound
/// as an into binding it wraps a [`crate::row::Row`] internally.
#[derive(Debug, Clone, Default)]
pub struct Values {
  fields: HashMap<String, Field>,
  order: Vec<String>,
  /// Names looked up with `get`/`get_indicator` that matched no bound
  /// field are not tracked separately: per the pinned Open Question, names
  /// set but never consumed by a placeholder end up here instead.
  unused: Vec<String>,
}

impl Values {
  pub fn new() -> Self {
    Values::default()
  }

  pub fn set_i64(&mut self, name: &str, value: i64, indicator: Indicator) {
    self.set_raw(name, CellValue::Int64(value), indicator);
  }

  pub fn set_string(&mut self, name: &str, value: String, indicator: Indicator) {
    self.set_raw(name, CellValue::String(value), indicator);
  }

  pub fn set_f64(&mut self, name: &str, value: f64, indicator: Indicator) {
    self.set_raw(name, CellValue::Double(value), indicator);
  }

  fn set_raw(&mut self, name: &str, value: CellValue, indicator: Indicator) {
    if !self.fields.contains_key(name) {
      self.order.push(name.to_string());
    }
    self.fields.insert(name.to_string(), Field { value, indicator });
  }

  pub fn get_indicator(&self, name: &str) -> Result<Indicator> {
    self.fields.get(name).map(|f| f.indicator).ok_or_else(|| Error::missing_use_element(name))
  }

  pub fn get_i64(&self, name: &str) -> Result<i64> {
    match &self.fields.get(name).ok_or_else(|| Error::missing_use_element(name))?.value {
      CellValue::Int64(v) => Ok(*v),
      CellValue::UInt64(v) => i64::try_from(*v).map_err(|_| Error::bad_cast("i64", name)),
      _ => Err(Error::bad_cast("i64", name)),
    }
  }

  pub fn get_string(&self, name: &str) -> Result<String> {
    match &self.fields.get(name).ok_or_else(|| Error::missing_use_element(name))?.value {
      CellValue::String(v) => Ok(v.clone()),
      _ => Err(Error::bad_cast("string", name)),
    }
  }

  pub fn get_f64(&self, name: &str) -> Result<f64> {
    match &self.fields.get(name).ok_or_else(|| Error::missing_use_element(name))?.value {
      CellValue::Double(v) => Ok(*v),
      CellValue::Int64(v) => Ok(*v as f64),
      _ => Err(Error::bad_cast("f64", name)),
    }
  }

  /// Field names in first-set order, mirroring `values::get_properties`
  /// iteration order in the C++ original.
  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.order.iter().map(|s| s.as_str())
  }

  pub fn len(&self) -> usize {
    self.order.len()
  }

  pub fn is_empty(&self) -> bool {
    self.order.is_empty()
  }

  /// Moves a name that matched no placeholder in the query to the "unused"
  /// list (§4.5, §4.7). The application decides later whether this is an
  /// error by calling `unused_names` after execute.
  pub fn mark_unused(&mut self, name: &str) {
    if !self.unused.contains(&name.to_string()) {
      self.unused.push(name.to_string());
    }
  }

  pub fn unused_names(&self) -> &[String] {
    &self.unused
  }

  pub fn reset_get_counter(&mut self) {
    // Mirrors `values::reset_get_counter` in the C++ original; vellum's
    // `Values` has no streamed-cursor state of its own (unlike `Row`) since
    // callers address fields by name, so this is a documented no-op kept
    // for interface parity with the statement engine's post_use hook.
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_set_and_get_roundtrip() {
    let mut values = Values::new();
    values.set_i64("id", 7, Indicator::Ok);
    values.set_string("s", "hello".to_string(), Indicator::Ok);
    assert_eq!(values.get_i64("id").unwrap(), 7);
    assert_eq!(values.get_string("s").unwrap(), "hello");
  }

  #[test]
  fn test_missing_field_errors() {
    let values = Values::new();
    assert!(values.get_i64("nope").is_err());
  }

  #[test]
  fn test_null_indicator_round_trip() {
    let mut values = Values::new();
    values.set_i64("maybe", 0, Indicator::Null);
    assert_eq!(values.get_indicator("maybe").unwrap(), Indicator::Null);
  }

  #[test]
  fn test_unused_names_tracked_once() {
    let mut values = Values::new();
    values.mark_unused("ghost");
    values.mark_unused("ghost");
    assert_eq!(values.unused_names(), &["ghost".to_string()]);
  }
}
