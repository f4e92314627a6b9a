//! Closed exchange-kind taxonomy (C1): the wire-level vocabulary every
//! backend's scalar/vector binding backend switches over.

/// The finite set of primitive types understood by every backend (§3).
///
/// Extending this enum means extending every backend's binding switch, too
/// (§4.1) — it is deliberately not left open for per-backend extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ExchangeKind {
  Char,
  Int8,
  UInt8,
  Int16,
  UInt16,
  Int32,
  UInt32,
  Int64,
  UInt64,
  Double,
  CString,
  StdString,
  WideString,
  StdTm,
  Statement,
  RowId,
  Blob,
  LongString,
  Xml,
}

/// Three-valued null/truncation marker carried alongside every exchange
/// value (§3, §6). `Ok` on every successful, non-truncated value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indicator {
  Ok,
  Null,
  Truncated,
}

impl Default for Indicator {
  fn default() -> Self {
    Indicator::Ok
  }
}
