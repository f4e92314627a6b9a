//! Backend capability interfaces (C4).
//!
//! Every driver (postgres, mysql, sqlite here; firebird/oracle/odbc/etc. are
//! out of scope beyond this contract, per §1) implements these traits.
//! Per [`crate::SPEC_FULL`]'s async-to-sync bridge, every method is a plain
//! blocking `fn`: a concrete backend wraps its own async client (here,
//! `sqlx`) behind a dedicated tokio runtime and calls `block_on` internally,
//! so the core never sees a future.

pub(crate) mod any_engine;
pub mod mysql;
pub mod postgres;
pub mod registry;
pub mod sqlite;

use crate::error::{Error, Result};
use crate::kind::{ExchangeKind, Indicator};
use crate::session::ConnectionParameters;

/// Assembles a `scheme://[user[:password]@]host[:port]/dbname` URL from
/// whatever of those keys are present in `params` (§6's "backend-specific
/// keys, passed through"), or returns the `url` key verbatim if the caller
/// already supplied a full connection string.
///
/// Simplification: unlike `rainfrog`'s `config.rs` (which percent-encodes
/// passwords with a dedicated `AsciiSet`), this does not percent-encode any
/// component — a `user`/`password`/`dbname` containing URL-reserved
/// characters should be passed pre-encoded, or via the `url` passthrough
/// key instead.
fn build_url(scheme: &str, params: &ConnectionParameters) -> String {
  if let Some(url) = params.get("url") {
    return url.to_string();
  }

  let mut url = format!("{scheme}://");
  if let Some(user) = params.get("user") {
    url.push_str(user);
    if let Some(password) = params.get("password") {
      url.push(':');
      url.push_str(password);
    }
    url.push('@');
  }
  url.push_str(params.get("host").unwrap_or("localhost"));
  if let Some(port) = params.get("port") {
    url.push(':');
    url.push_str(port);
  }
  if let Some(dbname) = params.get("dbname") {
    url.push('/');
    url.push_str(dbname);
  }
  url
}

/// Whether a backend call produced rows/made progress, or the rowset/insert
/// is exhausted. Deliberately not an error (§4.3, §9): end-of-rowset is
/// ordinary control flow, not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecResult {
  Success,
  NoData,
}

/// Coarse statement classification passed to `prepare`, mirroring SOCI's
/// `eStatementType` (repeatable prepared statements vs. one-shot).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementType {
  RepeatableQuery,
  OneTimeQuery,
}

/// A single described output column (§4.6 describe phase).
#[derive(Debug, Clone)]
pub struct ColumnDescription {
  pub name: String,
  pub kind: ExchangeKind,
}

/// `backend_factory::make_session` (§4.3): one call per backend producing a
/// ready (but not yet connected-asserted) session backend.
pub trait BackendFactory: Send + Sync {
  fn make_session(&self, params: &ConnectionParameters) -> Result<Box<dyn SessionBackend>>;
  fn backend_name(&self) -> &'static str;
}

/// `session_backend` (§4.3).
pub trait SessionBackend: Send {
  fn begin(&mut self) -> Result<()>;
  fn commit(&mut self) -> Result<()>;
  fn rollback(&mut self) -> Result<()>;
  fn is_connected(&mut self) -> bool;
  fn reconnect(&mut self) -> Result<()>;

  fn make_statement_backend(&self) -> Box<dyn StatementBackend>;
  fn make_blob_backend(&self) -> Result<Box<dyn BlobBackend>> {
    Err(Error::new(crate::error::Category::SystemError, "this backend does not support BLOBs"))
  }
  fn make_rowid_backend(&self) -> Result<Box<dyn RowIdBackend>> {
    Err(Error::new(crate::error::Category::SystemError, "this backend does not support RowIds"))
  }

  fn get_last_insert_id(&mut self, _sequence_or_table: &str) -> Result<Option<i64>> {
    Ok(None)
  }
  fn get_next_sequence_value(&mut self, _sequence: &str) -> Result<Option<i64>> {
    Ok(None)
  }

  fn get_table_names_query(&self) -> Option<String> {
    None
  }
  fn get_column_descriptions_query(&self, _table: &str) -> Option<String> {
    None
  }
  fn get_dummy_from_table(&self) -> Option<String> {
    None
  }

  fn backend_name(&self) -> &'static str;
}

/// `statement_backend` (§4.3): the per-statement driver handle plus the
/// describe/execute/fetch triad the engine (C6) drives.
pub trait StatementBackend: Send {
  fn alloc(&mut self) -> Result<()>;
  fn prepare(&mut self, sql: &str, statement_type: StatementType) -> Result<()>;
  fn execute(&mut self, rows_requested: usize) -> Result<ExecResult>;
  fn fetch(&mut self, rows_requested: usize) -> Result<ExecResult>;

  fn get_affected_rows(&mut self) -> u64;
  fn get_number_of_rows(&mut self) -> usize;

  /// Name bound to a positional parameter, if the backend exposes one
  /// (drives the `name -> position` map built during prepare, §4.5).
  fn get_parameter_name(&self, position: usize) -> Option<String>;

  fn prepare_for_describe(&mut self) -> Result<usize>;
  fn describe_column(&mut self, index: usize) -> Result<ColumnDescription>;

  fn rewrite_for_procedure_call(&self, query: &str) -> String {
    query.to_string()
  }

  fn make_into_type_backend(&mut self, position: usize) -> Box<dyn StandardIntoTypeBackend>;
  fn make_use_type_backend(&mut self, position: usize) -> Box<dyn StandardUseTypeBackend>;
  fn make_vector_into_type_backend(&mut self, position: usize) -> Box<dyn VectorIntoTypeBackend>;
  fn make_vector_use_type_backend(&mut self, position: usize) -> Box<dyn VectorUseTypeBackend>;

  fn clean_up(&mut self) {}
}

/// One transported scalar value plus its indicator, the unit that crosses
/// between C5 bindings and the C4 scalar backends below.
#[derive(Debug, Clone)]
pub enum ExchangeValue {
  Null,
  Int64(i64),
  UInt64(u64),
  Double(f64),
  String(String),
  Bytes(Vec<u8>),
  DateTime(chrono::NaiveDateTime),
}

pub trait StandardIntoTypeBackend: Send {
  fn define_by_pos(&mut self, position: usize, kind: ExchangeKind) -> Result<()>;
  fn pre_fetch(&mut self) -> Result<()> {
    Ok(())
  }
  /// Returns the value fetched for this position plus its indicator.
  fn post_fetch(&mut self, got_data: bool, called_from_fetch: bool) -> Result<(ExchangeValue, Indicator)>;
  fn clean_up(&mut self) {}
}

pub trait StandardUseTypeBackend: Send {
  fn bind_by_pos(&mut self, position: usize, kind: ExchangeKind) -> Result<()>;
  fn bind_by_name(&mut self, name: &str, kind: ExchangeKind) -> Result<()>;
  fn pre_use(&mut self, value: &ExchangeValue, indicator: Indicator) -> Result<()>;
  fn post_use(&mut self, _got_data: bool) -> Result<()> {
    Ok(())
  }
  fn clean_up(&mut self) {}
}

pub trait VectorIntoTypeBackend: Send {
  fn define_by_pos(&mut self, position: usize, kind: ExchangeKind) -> Result<()>;
  fn pre_fetch(&mut self) -> Result<()> {
    Ok(())
  }
  fn post_fetch(&mut self, got_data: bool, called_from_fetch: bool) -> Result<Vec<(ExchangeValue, Indicator)>>;
  fn size(&self) -> usize;
  fn resize(&mut self, n: usize);
  fn clean_up(&mut self) {}
}

pub trait VectorUseTypeBackend: Send {
  fn bind_by_pos(&mut self, position: usize, kind: ExchangeKind) -> Result<()>;
  fn bind_by_name(&mut self, name: &str, kind: ExchangeKind) -> Result<()>;
  fn pre_use(&mut self, values: &[(ExchangeValue, Indicator)]) -> Result<()>;
  fn post_use(&mut self, _got_data: bool) -> Result<()> {
    Ok(())
  }
  fn size(&self) -> usize;
  fn resize(&mut self, n: usize);
  fn clean_up(&mut self) {}
}

pub trait BlobBackend: Send {
  fn get_len(&mut self) -> Result<u64>;
  fn read_from_start(&mut self, buf: &mut [u8], offset: u64) -> Result<usize>;
  fn write_from_start(&mut self, buf: &[u8], offset: u64) -> Result<usize>;
  fn append(&mut self, buf: &[u8]) -> Result<usize>;
  fn trim(&mut self, new_len: u64) -> Result<()>;
}

pub trait RowIdBackend: Send {
  fn as_str(&self) -> &str;
}
