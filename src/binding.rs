//! Into/use binding wrappers (C5): the objects pairing a user variable with
//! a backend buffer plus the lifecycle hooks the statement engine (C6)
//! drives in order. A binding is owned by the statement it is handed to via
//! `exchange()`/`into()`/`use_()`; in Rust that ownership is literal — the
//! binding holds the `&mut` borrow of the user's variable for the
//! statement's lifetime, so the borrow checker enforces what §3 states as
//! a prose invariant ("a binding's lifetime is a subset of the
//! statement's").

use crate::backend::{ExchangeValue, StandardIntoTypeBackend, StandardUseTypeBackend, StatementBackend, VectorIntoTypeBackend, VectorUseTypeBackend};
use crate::error::{Error, Result};
use crate::exchange::Exchange;
use crate::kind::Indicator;

/// Converts a user-facing scalar type to/from the wire-level
/// [`ExchangeValue`] union. Implemented directly for basic types; user
/// types get it for free via the blanket impl driven by
/// [`crate::convert::TypeConversion`] (mirrors `conversion_into_type` /
/// `conversion_use_type` in the C++ original recursing through
/// `type_conversion<T>::base_type`).
pub trait WireValue: Sized {
  fn to_wire(&self) -> (ExchangeValue, Indicator);
  fn from_wire(value: &ExchangeValue, indicator: Indicator) -> Result<Self>;
}

macro_rules! wire_int {
  ($ty:ty, $variant:ident) => {
    impl WireValue for $ty {
      fn to_wire(&self) -> (ExchangeValue, Indicator) {
        (ExchangeValue::$variant((*self).into()), Indicator::Ok)
      }
      fn from_wire(value: &ExchangeValue, indicator: Indicator) -> Result<Self> {
        if indicator == Indicator::Null {
          return Err(Error::missing_indicator());
        }
        match value {
          ExchangeValue::Int64(v) => <$ty>::try_from(*v).map_err(|_| Error::bad_cast(stringify!($ty), "<scalar>")),
          ExchangeValue::UInt64(v) => <$ty>::try_from(*v).map_err(|_| Error::bad_cast(stringify!($ty), "<scalar>")),
          _ => Err(Error::bad_cast(stringify!($ty), "<scalar>")),
        }
      }
    }
  };
}

wire_int!(i8, Int64);
wire_int!(u8, Int64);
wire_int!(i16, Int64);
wire_int!(u16, Int64);
wire_int!(i32, Int64);
wire_int!(u32, Int64);

impl WireValue for i64 {
  fn to_wire(&self) -> (ExchangeValue, Indicator) {
    (ExchangeValue::Int64(*self), Indicator::Ok)
  }
  fn from_wire(value: &ExchangeValue, indicator: Indicator) -> Result<Self> {
    if indicator == Indicator::Null {
      return Err(Error::missing_indicator());
    }
    match value {
      ExchangeValue::Int64(v) => Ok(*v),
      ExchangeValue::UInt64(v) => i64::try_from(*v).map_err(|_| Error::bad_cast("i64", "<scalar>")),
      _ => Err(Error::bad_cast("i64", "<scalar>")),
    }
  }
}

impl WireValue for u64 {
  fn to_wire(&self) -> (ExchangeValue, Indicator) {
    (ExchangeValue::UInt64(*self), Indicator::Ok)
  }
  fn from_wire(value: &ExchangeValue, indicator: Indicator) -> Result<Self> {
    if indicator == Indicator::Null {
      return Err(Error::missing_indicator());
    }
    match value {
      ExchangeValue::UInt64(v) => Ok(*v),
      // Per the pinned Open Question (SPEC_FULL.md): raise rather than
      // silently wrap a u64 read off a signed-i64 wire type that overflows.
      ExchangeValue::Int64(v) => u64::try_from(*v).map_err(|_| Error::bad_cast("u64", "<scalar>")),
      _ => Err(Error::bad_cast("u64", "<scalar>")),
    }
  }
}

impl WireValue for f64 {
  fn to_wire(&self) -> (ExchangeValue, Indicator) {
    (ExchangeValue::Double(*self), Indicator::Ok)
  }
  fn from_wire(value: &ExchangeValue, indicator: Indicator) -> Result<Self> {
    if indicator == Indicator::Null {
      return Err(Error::missing_indicator());
    }
    match value {
      ExchangeValue::Double(v) => Ok(*v),
      ExchangeValue::Int64(v) => Ok(*v as f64),
      _ => Err(Error::bad_cast("f64", "<scalar>")),
    }
  }
}

impl WireValue for char {
  fn to_wire(&self) -> (ExchangeValue, Indicator) {
    (ExchangeValue::String(self.to_string()), Indicator::Ok)
  }
  fn from_wire(value: &ExchangeValue, indicator: Indicator) -> Result<Self> {
    if indicator == Indicator::Null {
      return Err(Error::missing_indicator());
    }
    match value {
      ExchangeValue::String(s) => s.chars().next().ok_or_else(|| Error::bad_cast("char", "<scalar>")),
      _ => Err(Error::bad_cast("char", "<scalar>")),
    }
  }
}

impl WireValue for String {
  fn to_wire(&self) -> (ExchangeValue, Indicator) {
    // Inserting a fixed-size character array strips trailing NULs before
    // sending (§4.4); plain `String` has no NUL padding, but we trim any a
    // caller passed in explicitly for parity with that edge-case policy.
    (ExchangeValue::String(self.trim_end_matches('\0').to_string()), Indicator::Ok)
  }
  fn from_wire(value: &ExchangeValue, indicator: Indicator) -> Result<Self> {
    if indicator == Indicator::Null {
      return Err(Error::missing_indicator());
    }
    match value {
      ExchangeValue::String(s) => Ok(s.clone()),
      _ => Err(Error::bad_cast("String", "<scalar>")),
    }
  }
}

impl WireValue for chrono::NaiveDateTime {
  fn to_wire(&self) -> (ExchangeValue, Indicator) {
    (ExchangeValue::DateTime(*self), Indicator::Ok)
  }
  fn from_wire(value: &ExchangeValue, indicator: Indicator) -> Result<Self> {
    if indicator == Indicator::Null {
      return Err(Error::missing_indicator());
    }
    match value {
      ExchangeValue::DateTime(v) => Ok(*v),
      _ => Err(Error::bad_cast("NaiveDateTime", "<scalar>")),
    }
  }
}

/// User types reach the wire through their `TypeConversion::Base` chain
/// (I6), recursing until `Base` is itself a `WireValue` (a basic type).
impl<T> WireValue for T
where
  T: crate::convert::TypeConversion + crate::exchange::UserExchange,
  T::Base: WireValue + Default,
{
  fn to_wire(&self) -> (ExchangeValue, Indicator) {
    let mut base = T::Base::default();
    let mut indicator = Indicator::Ok;
    self.to_base(&mut base, &mut indicator);
    if indicator == Indicator::Null {
      (ExchangeValue::Null, Indicator::Null)
    } else {
      let (value, _) = base.to_wire();
      (value, indicator)
    }
  }

  fn from_wire(value: &ExchangeValue, indicator: Indicator) -> Result<Self> {
    let base = if indicator == Indicator::Null { T::Base::default() } else { T::Base::from_wire(value, indicator)? };
    T::from_base(&base, indicator)
  }
}

// --- standard (scalar) bindings -------------------------------------------

/// Object-safe surface the statement engine drives for every registered
/// into-binding, independent of the user type `T` behind it.
pub trait IntoBinding {
  fn define(&mut self, backend: &mut dyn StatementBackend, position: &mut usize) -> Result<()>;
  fn pre_fetch(&mut self) -> Result<()>;
  fn post_fetch(&mut self, got_data: bool, called_from_fetch: bool) -> Result<()>;
  fn clean_up(&mut self);
}

pub trait UseBinding {
  /// `None` name => positional; `Some(name)` => named (I2 mutual exclusion
  /// is enforced by the statement engine across all registered bindings).
  fn name(&self) -> Option<&str>;
  /// Binds at the explicit parameter position(s) resolved by the engine.
  /// A positional binding always gets a single-element slice (the next
  /// slot in registration order). A named binding gets every occurrence
  /// position `:name` was rewritten to in the query text (§4.5, §6) — on
  /// backends with no native `$N`-style repeat-reference (mysql, sqlite),
  /// the same value has to be bound once per `?` the name expanded to, so
  /// the binding may be asked to bind itself at more than one position.
  /// The engine, not this binding, reconciles "order of use() calls"
  /// against "where the name occurs in the query text" (§4.5/§4.8), since
  /// only the engine can see both.
  fn bind(&mut self, backend: &mut dyn StatementBackend, positions: &[usize]) -> Result<()>;
  fn pre_use(&mut self) -> Result<()>;
  fn post_use(&mut self, got_data: bool) -> Result<()>;
  fn clean_up(&mut self);
  /// For the error-context parameter dump (§4.5, §4.8).
  fn dump_value(&self) -> String;
}

pub struct StandardInto<'a, T: Exchange + WireValue> {
  value: &'a mut T,
  indicator: Option<&'a mut Indicator>,
  own_indicator: Indicator,
  backend: Option<Box<dyn StandardIntoTypeBackend>>,
}

impl<'a, T: Exchange + WireValue> StandardInto<'a, T> {
  pub fn new(value: &'a mut T) -> Self {
    StandardInto { value, indicator: None, own_indicator: Indicator::Ok, backend: None }
  }

  pub fn with_indicator(value: &'a mut T, indicator: &'a mut Indicator) -> Self {
    StandardInto { value, indicator: Some(indicator), own_indicator: Indicator::Ok, backend: None }
  }
}

impl<'a, T: Exchange + WireValue> IntoBinding for StandardInto<'a, T> {
  fn define(&mut self, backend: &mut dyn StatementBackend, position: &mut usize) -> Result<()> {
    let mut b = backend.make_into_type_backend(*position);
    b.define_by_pos(*position, T::kind())?;
    self.backend = Some(b);
    *position += 1;
    Ok(())
  }

  fn pre_fetch(&mut self) -> Result<()> {
    self.backend.as_mut().expect("define called before pre_fetch").pre_fetch()
  }

  fn post_fetch(&mut self, got_data: bool, called_from_fetch: bool) -> Result<()> {
    let (value, indicator) = self.backend.as_mut().expect("define called before post_fetch").post_fetch(got_data, called_from_fetch)?;
    let out_indicator = self.indicator.as_deref_mut().unwrap_or(&mut self.own_indicator);
    *out_indicator = indicator;
    if indicator == Indicator::Null && self.indicator.is_none() {
      return Err(Error::missing_indicator());
    }
    if indicator != Indicator::Null {
      *self.value = T::from_wire(&value, indicator)?;
    }
    Ok(())
  }

  fn clean_up(&mut self) {
    if let Some(b) = self.backend.as_mut() {
      b.clean_up();
    }
  }
}

pub struct StandardUse<'a, T: Exchange + WireValue> {
  value: &'a mut T,
  indicator: Option<&'a mut Indicator>,
  own_indicator: Indicator,
  name: Option<String>,
  read_only: bool,
  backend: Vec<Box<dyn StandardUseTypeBackend>>,
}

impl<'a, T: Exchange + WireValue> StandardUse<'a, T> {
  pub fn new(value: &'a mut T, name: Option<&str>) -> Self {
    StandardUse { value, indicator: None, own_indicator: Indicator::Ok, name: name.map(String::from), read_only: false, backend: Vec::new() }
  }

  pub fn read_only(value: &'a mut T, name: Option<&str>) -> Self {
    StandardUse { value, indicator: None, own_indicator: Indicator::Ok, name: name.map(String::from), read_only: true, backend: Vec::new() }
  }

  pub fn with_indicator(value: &'a mut T, indicator: &'a mut Indicator, name: Option<&str>) -> Self {
    StandardUse { value, indicator: Some(indicator), own_indicator: Indicator::Ok, name: name.map(String::from), read_only: false, backend: Vec::new() }
  }
}

impl<'a, T: Exchange + WireValue> UseBinding for StandardUse<'a, T> {
  fn name(&self) -> Option<&str> {
    self.name.as_deref()
  }

  fn bind(&mut self, backend: &mut dyn StatementBackend, positions: &[usize]) -> Result<()> {
    self.backend.clear();
    for &position in positions {
      let mut b = backend.make_use_type_backend(position);
      match &self.name {
        Some(name) => b.bind_by_name(name, T::kind())?,
        None => b.bind_by_pos(position, T::kind())?,
      }
      self.backend.push(b);
    }
    Ok(())
  }

  fn pre_use(&mut self) -> Result<()> {
    let indicator = self.indicator.as_deref().copied().unwrap_or(self.own_indicator);
    let (value, indicator) = if indicator == Indicator::Null {
      (ExchangeValue::Null, Indicator::Null)
    } else {
      self.value.to_wire()
    };
    for b in self.backend.iter_mut() {
      b.pre_use(&value, indicator)?;
    }
    Ok(())
  }

  fn post_use(&mut self, got_data: bool) -> Result<()> {
    for b in self.backend.iter_mut() {
      b.post_use(got_data)?;
    }
    // A read-only input must not be written back even if the backend
    // echoes the buffer (§4.4): vellum never calls `from_wire` here at
    // all for use-bindings, so a read-only violation can only come from a
    // backend that mutates through a channel vellum doesn't expose -
    // there is none, so this is structurally impossible rather than
    // merely policed at runtime. The `read_only` flag is retained for
    // API symmetry with the C++ original's `conversion_use_type`.
    let _ = self.read_only;
    Ok(())
  }

  fn clean_up(&mut self) {
    for b in self.backend.iter_mut() {
      b.clean_up();
    }
  }

  fn dump_value(&self) -> String {
    let (value, indicator) = self.value.to_wire();
    if indicator == Indicator::Null {
      "NULL".to_string()
    } else {
      format!("{value:?}")
    }
  }
}

// --- vector bindings --------------------------------------------------

pub trait IntoBindingVector {
  fn define(&mut self, backend: &mut dyn StatementBackend, position: &mut usize) -> Result<()>;
  fn pre_fetch(&mut self) -> Result<()>;
  fn post_fetch(&mut self, got_data: bool, called_from_fetch: bool) -> Result<()>;
  fn size(&self) -> usize;
  fn resize(&mut self, n: usize);
  fn clean_up(&mut self);
}

pub trait UseBindingVector {
  fn name(&self) -> Option<&str>;
  fn bind(&mut self, backend: &mut dyn StatementBackend, positions: &[usize]) -> Result<()>;
  fn pre_use(&mut self) -> Result<()>;
  fn post_use(&mut self, got_data: bool) -> Result<()>;
  fn size(&self) -> usize;
  fn clean_up(&mut self);
}

pub struct VectorInto<'a, T: Exchange + WireValue + Default + Clone> {
  values: &'a mut Vec<T>,
  indicators: Option<&'a mut Vec<Indicator>>,
  backend: Option<Box<dyn VectorIntoTypeBackend>>,
}

impl<'a, T: Exchange + WireValue + Default + Clone> VectorInto<'a, T> {
  pub fn new(values: &'a mut Vec<T>) -> Self {
    VectorInto { values, indicators: None, backend: None }
  }

  pub fn with_indicators(values: &'a mut Vec<T>, indicators: &'a mut Vec<Indicator>) -> Self {
    VectorInto { values, indicators: Some(indicators), backend: None }
  }
}

impl<'a, T: Exchange + WireValue + Default + Clone> IntoBindingVector for VectorInto<'a, T> {
  fn define(&mut self, backend: &mut dyn StatementBackend, position: &mut usize) -> Result<()> {
    let mut b = backend.make_vector_into_type_backend(*position);
    b.define_by_pos(*position, T::kind())?;
    b.resize(self.values.len());
    self.backend = Some(b);
    *position += 1;
    Ok(())
  }

  fn pre_fetch(&mut self) -> Result<()> {
    self.backend.as_mut().expect("define called before pre_fetch").pre_fetch()
  }

  fn post_fetch(&mut self, got_data: bool, called_from_fetch: bool) -> Result<()> {
    let rows = self.backend.as_mut().expect("define called before post_fetch").post_fetch(got_data, called_from_fetch)?;
    self.values.clear();
    if let Some(inds) = self.indicators.as_deref_mut() {
      inds.clear();
    }
    for (value, indicator) in rows {
      if indicator == Indicator::Null && self.indicators.is_none() {
        return Err(Error::missing_indicator());
      }
      let decoded = if indicator == Indicator::Null { T::default() } else { T::from_wire(&value, indicator)? };
      self.values.push(decoded);
      if let Some(inds) = self.indicators.as_deref_mut() {
        inds.push(indicator);
      }
    }
    Ok(())
  }

  fn size(&self) -> usize {
    self.values.len()
  }

  fn resize(&mut self, n: usize) {
    self.values.resize(n, T::default());
    if let Some(inds) = self.indicators.as_deref_mut() {
      inds.resize(n, Indicator::Ok);
    }
    if let Some(b) = self.backend.as_mut() {
      b.resize(n);
    }
  }

  fn clean_up(&mut self) {
    if let Some(b) = self.backend.as_mut() {
      b.clean_up();
    }
  }
}

pub struct VectorUse<'a, T: Exchange + WireValue + Clone> {
  values: &'a Vec<T>,
  indicators: Option<&'a Vec<Indicator>>,
  name: Option<String>,
  backend: Vec<Box<dyn VectorUseTypeBackend>>,
}

impl<'a, T: Exchange + WireValue + Clone> VectorUse<'a, T> {
  pub fn new(values: &'a Vec<T>, name: Option<&str>) -> Self {
    VectorUse { values, indicators: None, name: name.map(String::from), backend: Vec::new() }
  }

  pub fn with_indicators(values: &'a Vec<T>, indicators: &'a Vec<Indicator>, name: Option<&str>) -> Self {
    VectorUse { values, indicators: Some(indicators), name: name.map(String::from), backend: Vec::new() }
  }
}

impl<'a, T: Exchange + WireValue + Clone> UseBindingVector for VectorUse<'a, T> {
  fn name(&self) -> Option<&str> {
    self.name.as_deref()
  }

  fn bind(&mut self, backend: &mut dyn StatementBackend, positions: &[usize]) -> Result<()> {
    self.backend.clear();
    for &position in positions {
      let mut b = backend.make_vector_use_type_backend(position);
      match &self.name {
        Some(name) => b.bind_by_name(name, T::kind())?,
        None => b.bind_by_pos(position, T::kind())?,
      }
      b.resize(self.values.len());
      self.backend.push(b);
    }
    Ok(())
  }

  fn pre_use(&mut self) -> Result<()> {
    if self.values.is_empty() {
      return Err(Error::vector_of_size_zero());
    }
    let encoded: Vec<(ExchangeValue, Indicator)> = self
      .values
      .iter()
      .enumerate()
      .map(|(i, v)| {
        let forced_null = self.indicators.map(|inds| inds[i] == Indicator::Null).unwrap_or(false);
        if forced_null { (ExchangeValue::Null, Indicator::Null) } else { v.to_wire() }
      })
      .collect();
    for b in self.backend.iter_mut() {
      b.pre_use(&encoded)?;
    }
    Ok(())
  }

  fn post_use(&mut self, got_data: bool) -> Result<()> {
    for b in self.backend.iter_mut() {
      b.post_use(got_data)?;
    }
    Ok(())
  }

  fn size(&self) -> usize {
    self.values.len()
  }

  fn clean_up(&mut self) {
    for b in self.backend.iter_mut() {
      b.clean_up();
    }
  }
}
