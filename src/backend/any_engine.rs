//! Shared execution engine backing `postgres`, `mysql`, and `sqlite`
//! ([`crate::backend::postgres`], [`mysql`][crate::backend::mysql],
//! [`sqlite`][crate::backend::sqlite]): one generic implementation over
//! `sqlx::Any` instead of three near-identical ones over
//! `sqlx::{Postgres,MySql,Sqlite}`, grounded in `rainfrog`'s
//! `src/database/postgresql.rs` (`query_with_stream`, `Either::Left|Right`
//! row/result dispatch, type-name-keyed `parse_value`) and
//! `src/database/mysql.rs`'s analogous type-name switch — adapted to
//! `AnyTypeInfoKind` since `Any` erases the per-backend type name strings
//! those two switch over.
//!
//! Per the async-to-sync bridge (SPEC_FULL.md §0), this module owns a
//! dedicated single-threaded `tokio::runtime::Runtime` and exposes plain
//! blocking methods that `block_on` the underlying `sqlx` futures — the
//! exchange core above never sees a future.
//!
//! Simplification, recorded in DESIGN.md: fetch is eager-then-windowed —
//! `execute`/`fetch` each run the query (or advance a window) and buffer the
//! full `AnyRow` result set rather than streaming row-by-row, since `sqlx`'s
//! `Any` driver's stream type does not implement `Send` the way this
//! engine's single dedicated runtime thread would need to hold it across
//! `block_on` calls spanning multiple `StatementBackend` method
//! invocations.

use std::sync::{Arc, Mutex};

use sqlx::any::{AnyArguments, AnyConnection, AnyRow, AnyTypeInfoKind};
use sqlx::{Arguments, Column, Connection, Row, TypeInfo, ValueRef};
use tokio::runtime::Runtime;

use crate::backend::{
  ColumnDescription, ExchangeValue, ExecResult, SessionBackend, StandardIntoTypeBackend, StandardUseTypeBackend,
  StatementBackend, StatementType, VectorIntoTypeBackend, VectorUseTypeBackend,
};
use crate::error::{Category, Error, Result};
use crate::kind::{ExchangeKind, Indicator};

/// Which transaction-control statements to send — `Any` has no uniform
/// `BEGIN`/`COMMIT` spelling across backends, so the session backend picks
/// one per dialect at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Dialect {
  Postgres,
  MySql,
  Sqlite,
}

impl Dialect {
  pub(crate) fn begin_sql(self) -> &'static str {
    match self {
      Dialect::MySql => "START TRANSACTION",
      Dialect::Postgres | Dialect::Sqlite => "BEGIN",
    }
  }

  pub(crate) fn is_dollar_style(self) -> bool {
    matches!(self, Dialect::Postgres)
  }

  pub(crate) fn backend_name(self) -> &'static str {
    match self {
      Dialect::Postgres => "postgres",
      Dialect::MySql => "mysql",
      Dialect::Sqlite => "sqlite",
    }
  }
}

pub(crate) fn map_connect_error(e: sqlx::Error) -> Error {
  Error::from_backend(Category::ConnectionError, e.to_string(), "any", None, None)
}

fn map_sql_error(e: sqlx::Error) -> Error {
  let sql_state = match &e {
    sqlx::Error::Database(db) => db.code().map(|c| c.into_owned()),
    _ => None,
  };
  let category = match &e {
    sqlx::Error::Database(db) if db.is_unique_violation() || db.is_foreign_key_violation() || db.is_check_violation() => {
      Category::ConstraintViolation
    },
    sqlx::Error::Io(_) | sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => Category::ConnectionError,
    sqlx::Error::RowNotFound => Category::NoData,
    _ => Category::Unknown,
  };
  Error::from_backend(category, e.to_string(), "any", None, sql_state)
}

/// A single bound use-value plus its originating kind, held at a fixed
/// parameter position (1-based positions are translated to 0-based slots
/// here; the wire placeholder numbering is handled upstream in
/// `statement::rewrite_named_params`).
#[derive(Debug, Clone)]
struct BoundParam {
  value: ExchangeValue,
  indicator: Indicator,
}

/// State shared between an [`AnyStatementBackend`] and every `*TypeBackend`
/// it hands out — the `Rc<RefCell<_>>` sharing pattern used elsewhere in
/// this crate (`row.rs`, `rowset.rs`) can't cross this module's `Send`
/// boundary (every C4 trait requires `Send`), so an `Arc<Mutex<_>>` plays
/// the same role here.
struct Shared {
  params: Vec<Option<BoundParam>>,
  /// Positions bound by a vector (bulk) use binding: one entry per row to
  /// send, keyed by parameter position. Non-empty only for bulk inserts —
  /// combining one with a vector into-binding is rejected upstream in
  /// `statement.rs` (`bulk_insert_and_select_combined`).
  vector_params: std::collections::HashMap<usize, Vec<(ExchangeValue, Indicator)>>,
  rows: Vec<AnyRow>,
  /// Index of the first row in the current fetch window.
  window_start: usize,
  /// Number of rows in the current fetch window, starting at `window_start`
  /// — `get_number_of_rows` reports this rather than `rows.len()`, so a
  /// vector into-binding resizes to "rows fetched this round" and not the
  /// whole buffered result set.
  window_len: usize,
  affected_rows: u64,
}

impl Shared {
  fn new() -> Self {
    Shared {
      params: Vec::new(),
      vector_params: std::collections::HashMap::new(),
      rows: Vec::new(),
      window_start: 0,
      window_len: 0,
      affected_rows: 0,
    }
  }
}

pub struct AnyStatementBackend {
  conn: Arc<Mutex<AnyConnection>>,
  runtime: Arc<Runtime>,
  sql: String,
  shared: Arc<Mutex<Shared>>,
}

impl AnyStatementBackend {
  pub(crate) fn new(conn: Arc<Mutex<AnyConnection>>, runtime: Arc<Runtime>) -> Self {
    AnyStatementBackend { conn, runtime, sql: String::new(), shared: Arc::new(Mutex::new(Shared::new())) }
  }

  fn bind_one(args: &mut AnyArguments<'static>, value: &ExchangeValue, indicator: Indicator) -> Result<()> {
    if indicator == Indicator::Null {
      return args.add(Option::<String>::None).map_err(|e| Error::new(Category::InvalidStatement, e.to_string()));
    }
    match value {
      ExchangeValue::Null => args.add(Option::<String>::None).map_err(|e| Error::new(Category::InvalidStatement, e.to_string())),
      ExchangeValue::Int64(v) => args.add(*v).map_err(|e| Error::new(Category::InvalidStatement, e.to_string())),
      // Any's bind surface is signed-integer-centric; a u64 that overflows
      // i64 is bound as text rather than silently truncated.
      ExchangeValue::UInt64(v) => match i64::try_from(*v) {
        Ok(v) => args.add(v).map_err(|e| Error::new(Category::InvalidStatement, e.to_string())),
        Err(_) => args.add(v.to_string()).map_err(|e| Error::new(Category::InvalidStatement, e.to_string())),
      },
      ExchangeValue::Double(v) => args.add(*v).map_err(|e| Error::new(Category::InvalidStatement, e.to_string())),
      ExchangeValue::String(v) => args.add(v.clone()).map_err(|e| Error::new(Category::InvalidStatement, e.to_string())),
      ExchangeValue::Bytes(v) => args.add(v.clone()).map_err(|e| Error::new(Category::InvalidStatement, e.to_string())),
      ExchangeValue::DateTime(v) => args.add(*v).map_err(|e| Error::new(Category::InvalidStatement, e.to_string())),
    }
  }

  /// Builds the argument list for one execution. `row_index` selects which
  /// element of a vector (bulk) use binding to send; ignored for positions
  /// bound by an ordinary scalar use binding.
  fn build_arguments(&self, row_index: usize) -> Result<AnyArguments<'static>> {
    let shared = self.shared.lock().expect("any engine shared state poisoned");
    let total_positions = shared.params.len().max(shared.vector_params.keys().copied().map(|p| p + 1).max().unwrap_or(0));
    let mut args = AnyArguments::default();
    for position in 0..total_positions {
      if let Some(values) = shared.vector_params.get(&position) {
        let (value, indicator) =
          values.get(row_index).ok_or_else(|| Error::new(Category::InvalidStatement, "vector use binding index out of range"))?;
        Self::bind_one(&mut args, value, *indicator)?;
        continue;
      }
      match shared.params.get(position) {
        Some(Some(BoundParam { value, indicator })) => Self::bind_one(&mut args, value, *indicator)?,
        _ => return Err(Error::new(Category::InvalidStatement, "use binding registered but never bound a value")),
      }
    }
    Ok(args)
  }

  fn execute_once(&self, row_index: usize) -> Result<(Vec<AnyRow>, u64)> {
    let args = self.build_arguments(row_index)?;
    let sql = self.sql.clone();
    let conn = self.conn.clone();
    let result: std::result::Result<(Vec<AnyRow>, u64), sqlx::Error> = self.runtime.block_on(async move {
      let mut conn = conn.lock().expect("any engine connection mutex poisoned");
      let query = sqlx::query_with(&sql, args);
      let mut affected = 0u64;
      let mut rows = Vec::new();
      let mut stream = query.fetch_many(&mut *conn);
      use futures::StreamExt;
      while let Some(item) = stream.next().await {
        match item? {
          sqlx::Either::Left(result) => affected += result.rows_affected(),
          sqlx::Either::Right(row) => rows.push(row),
        }
      }
      Ok((rows, affected))
    });
    result.map_err(map_sql_error)
  }

  /// Bulk use bindings run as one `execute` per row (§4.5's "bulk insert via
  /// repeated execute" simplification — `sqlx`'s `Any` driver has no native
  /// multi-row bind protocol). A single execution's `affected_rows` is
  /// reported for the whole bulk batch truncated at the first row that
  /// fails, so the caller sees a partial `affected_rows` count matching how
  /// far the batch actually got before the error propagated.
  fn run_query(&mut self, rows_requested: usize) -> Result<()> {
    let bulk_size = {
      let shared = self.shared.lock().expect("any engine shared state poisoned");
      shared.vector_params.values().map(|v| v.len()).max()
    };

    match bulk_size {
      None => {
        let (rows, affected) = self.execute_once(0)?;
        let mut shared = self.shared.lock().expect("any engine shared state poisoned");
        let window_len = rows.len().min(rows_requested.max(1));
        shared.rows = rows;
        shared.affected_rows = affected;
        shared.window_start = 0;
        shared.window_len = window_len;
      },
      Some(n) => {
        let mut total_affected = 0u64;
        for row_index in 0..n {
          let (_, affected) = self.execute_once(row_index).map_err(|e| {
            let mut shared = self.shared.lock().expect("any engine shared state poisoned");
            shared.affected_rows = total_affected;
            shared.window_start = 0;
            shared.window_len = 0;
            drop(shared);
            e
          })?;
          total_affected += affected;
        }
        let mut shared = self.shared.lock().expect("any engine shared state poisoned");
        shared.rows = Vec::new();
        shared.affected_rows = total_affected;
        shared.window_start = 0;
        shared.window_len = 0;
      },
    }
    Ok(())
  }
}

impl StatementBackend for AnyStatementBackend {
  fn alloc(&mut self) -> Result<()> {
    Ok(())
  }

  fn prepare(&mut self, sql: &str, _statement_type: StatementType) -> Result<()> {
    self.sql = sql.to_string();
    Ok(())
  }

  fn execute(&mut self, rows_requested: usize) -> Result<ExecResult> {
    self.run_query(rows_requested)?;
    let has_rows = self.shared.lock().expect("any engine shared state poisoned").window_len > 0;
    Ok(if has_rows { ExecResult::Success } else { ExecResult::NoData })
  }

  fn fetch(&mut self, rows_requested: usize) -> Result<ExecResult> {
    let mut shared = self.shared.lock().expect("any engine shared state poisoned");
    shared.window_start += shared.window_len;
    let remaining = shared.rows.len().saturating_sub(shared.window_start);
    shared.window_len = remaining.min(rows_requested.max(1));
    if shared.window_len == 0 { Ok(ExecResult::NoData) } else { Ok(ExecResult::Success) }
  }

  fn get_affected_rows(&mut self) -> u64 {
    self.shared.lock().expect("any engine shared state poisoned").affected_rows
  }

  fn get_number_of_rows(&mut self) -> usize {
    self.shared.lock().expect("any engine shared state poisoned").window_len
  }

  fn get_parameter_name(&self, _position: usize) -> Option<String> {
    // Any erases parameter names at the wire level; the engine relies
    // entirely on the core's own name -> position map built during
    // `statement::rewrite_named_params`.
    None
  }

  fn prepare_for_describe(&mut self) -> Result<usize> {
    let shared = self.shared.lock().expect("any engine shared state poisoned");
    if let Some(row) = shared.rows.first() {
      return Ok(row.columns().len());
    }
    Ok(0)
  }

  fn describe_column(&mut self, index: usize) -> Result<ColumnDescription> {
    let shared = self.shared.lock().expect("any engine shared state poisoned");
    let row = shared.rows.first().ok_or_else(Error::no_data)?;
    let col = row.columns().get(index).ok_or_else(|| Error::new(Category::InvalidStatement, "column index out of range"))?;
    Ok(ColumnDescription { name: col.name().to_string(), kind: kind_from_type_info(col.type_info().kind()) })
  }

  fn make_into_type_backend(&mut self, position: usize) -> Box<dyn StandardIntoTypeBackend> {
    Box::new(AnyStandardInto { shared: self.shared.clone(), position })
  }

  fn make_use_type_backend(&mut self, position: usize) -> Box<dyn StandardUseTypeBackend> {
    ensure_slot(&self.shared, position);
    Box::new(AnyStandardUse { shared: self.shared.clone(), position })
  }

  fn make_vector_into_type_backend(&mut self, position: usize) -> Box<dyn VectorIntoTypeBackend> {
    Box::new(AnyVectorInto { shared: self.shared.clone(), position, size: 0 })
  }

  fn make_vector_use_type_backend(&mut self, position: usize) -> Box<dyn VectorUseTypeBackend> {
    Box::new(AnyVectorUse { shared: self.shared.clone(), position, values: Vec::new() })
  }

  /// Releases buffered rows and bound parameters, but deliberately leaves
  /// `affected_rows` in place: the statement engine calls `clean_up` on
  /// every error exit (§4.5), including a partial bulk failure, and §8's
  /// "Affected rows" property requires `get_affected_rows()` to still
  /// report the partial count afterwards.
  fn clean_up(&mut self) {
    let mut shared = self.shared.lock().expect("any engine shared state poisoned");
    shared.params.clear();
    shared.vector_params.clear();
    shared.rows.clear();
    shared.window_start = 0;
    shared.window_len = 0;
  }
}

fn ensure_slot(shared: &Arc<Mutex<Shared>>, position: usize) {
  let mut shared = shared.lock().expect("any engine shared state poisoned");
  if shared.params.len() <= position {
    shared.params.resize(position + 1, None);
  }
}

fn kind_from_type_info(kind: AnyTypeInfoKind) -> ExchangeKind {
  match kind {
    AnyTypeInfoKind::Bool => ExchangeKind::Int8,
    AnyTypeInfoKind::SmallInt => ExchangeKind::Int16,
    AnyTypeInfoKind::Integer => ExchangeKind::Int32,
    AnyTypeInfoKind::BigInt => ExchangeKind::Int64,
    AnyTypeInfoKind::Real => ExchangeKind::Double,
    AnyTypeInfoKind::Double => ExchangeKind::Double,
    AnyTypeInfoKind::Text => ExchangeKind::StdString,
    AnyTypeInfoKind::Blob => ExchangeKind::LongString,
    AnyTypeInfoKind::Null => ExchangeKind::StdString,
  }
}

/// Decodes one column of one already-fetched row, following the same
/// null-check-then-type-switch shape as `rainfrog`'s `parse_value`
/// (`src/database/postgresql.rs`), but switching on `AnyTypeInfoKind`
/// instead of a backend type-name string.
fn decode_any(row: &AnyRow, index: usize) -> Result<(ExchangeValue, Indicator)> {
  let raw = row.try_get_raw(index).map_err(map_sql_error)?;
  if raw.is_null() {
    return Ok((ExchangeValue::Null, Indicator::Null));
  }
  let kind = row.column(index).type_info().kind();
  let value = match kind {
    AnyTypeInfoKind::Bool => ExchangeValue::Int64(row.try_get::<bool, _>(index).map_err(map_sql_error)? as i64),
    AnyTypeInfoKind::SmallInt => ExchangeValue::Int64(row.try_get::<i16, _>(index).map_err(map_sql_error)? as i64),
    AnyTypeInfoKind::Integer => ExchangeValue::Int64(row.try_get::<i32, _>(index).map_err(map_sql_error)? as i64),
    AnyTypeInfoKind::BigInt => ExchangeValue::Int64(row.try_get::<i64, _>(index).map_err(map_sql_error)?),
    AnyTypeInfoKind::Real => ExchangeValue::Double(row.try_get::<f32, _>(index).map_err(map_sql_error)? as f64),
    AnyTypeInfoKind::Double => ExchangeValue::Double(row.try_get::<f64, _>(index).map_err(map_sql_error)?),
    AnyTypeInfoKind::Text => ExchangeValue::String(row.try_get::<String, _>(index).map_err(map_sql_error)?),
    AnyTypeInfoKind::Blob => ExchangeValue::Bytes(row.try_get::<Vec<u8>, _>(index).map_err(map_sql_error)?),
    AnyTypeInfoKind::Null => ExchangeValue::Null,
  };
  Ok((value, Indicator::Ok))
}

struct AnyStandardInto {
  shared: Arc<Mutex<Shared>>,
  position: usize,
}

impl StandardIntoTypeBackend for AnyStandardInto {
  fn define_by_pos(&mut self, _position: usize, _kind: ExchangeKind) -> Result<()> {
    Ok(())
  }

  fn post_fetch(&mut self, got_data: bool, _called_from_fetch: bool) -> Result<(ExchangeValue, Indicator)> {
    if !got_data {
      return Ok((ExchangeValue::Null, Indicator::Null));
    }
    let shared = self.shared.lock().expect("any engine shared state poisoned");
    let row = shared.rows.get(shared.window_start).ok_or_else(Error::no_data)?;
    decode_any(row, self.position)
  }
}

struct AnyStandardUse {
  shared: Arc<Mutex<Shared>>,
  position: usize,
}

impl StandardUseTypeBackend for AnyStandardUse {
  fn bind_by_pos(&mut self, position: usize, _kind: ExchangeKind) -> Result<()> {
    self.position = position;
    ensure_slot(&self.shared, position);
    Ok(())
  }

  fn bind_by_name(&mut self, _name: &str, _kind: ExchangeKind) -> Result<()> {
    // The position was already resolved and this backend constructed for it
    // by `statement::resolve_bind_positions` before `make_use_type_backend`
    // was called; nothing further to record here.
    Ok(())
  }

  fn pre_use(&mut self, value: &ExchangeValue, indicator: Indicator) -> Result<()> {
    let mut shared = self.shared.lock().expect("any engine shared state poisoned");
    if shared.params.len() <= self.position {
      shared.params.resize(self.position + 1, None);
    }
    shared.params[self.position] = Some(BoundParam { value: value.clone(), indicator });
    Ok(())
  }
}

struct AnyVectorInto {
  shared: Arc<Mutex<Shared>>,
  position: usize,
  size: usize,
}

impl VectorIntoTypeBackend for AnyVectorInto {
  fn define_by_pos(&mut self, _position: usize, _kind: ExchangeKind) -> Result<()> {
    Ok(())
  }

  fn post_fetch(&mut self, got_data: bool, _called_from_fetch: bool) -> Result<Vec<(ExchangeValue, Indicator)>> {
    if !got_data {
      return Ok(Vec::new());
    }
    let shared = self.shared.lock().expect("any engine shared state poisoned");
    let mut out = Vec::with_capacity(self.size);
    for i in 0..self.size {
      let Some(row) = shared.rows.get(shared.window_start + i) else { break };
      out.push(decode_any(row, self.position)?);
    }
    Ok(out)
  }

  fn size(&self) -> usize {
    self.size
  }

  fn resize(&mut self, n: usize) {
    self.size = n;
  }
}

struct AnyVectorUse {
  shared: Arc<Mutex<Shared>>,
  position: usize,
  values: Vec<Option<(ExchangeValue, Indicator)>>,
}

impl VectorUseTypeBackend for AnyVectorUse {
  fn bind_by_pos(&mut self, position: usize, _kind: ExchangeKind) -> Result<()> {
    self.position = position;
    Ok(())
  }

  fn bind_by_name(&mut self, _name: &str, _kind: ExchangeKind) -> Result<()> {
    Ok(())
  }

  /// Stashes the whole vector under this position in `Shared::vector_params`;
  /// `AnyStatementBackend::run_query` drives one `execute` per element.
  fn pre_use(&mut self, values: &[(ExchangeValue, Indicator)]) -> Result<()> {
    self.values = values.iter().cloned().map(Some).collect();
    let mut shared = self.shared.lock().expect("any engine shared state poisoned");
    shared.vector_params.insert(self.position, values.to_vec());
    Ok(())
  }

  fn size(&self) -> usize {
    self.values.len()
  }

  fn resize(&mut self, n: usize) {
    self.values.resize(n, None);
  }
}

static INSTALL_DRIVERS: std::sync::Once = std::sync::Once::new();

/// `session_backend` over `sqlx::Any` (§4.3): every backend crate
/// (`postgres`/`mysql`/`sqlite`) builds one of these from its own connect
/// URL and dialect, and everything past connection establishment —
/// transactions, statement preparation, describe/execute/fetch — is shared.
pub struct AnySessionBackend {
  conn: Arc<Mutex<AnyConnection>>,
  runtime: Arc<Runtime>,
  dialect: Dialect,
  url: String,
}

impl AnySessionBackend {
  pub(crate) fn connect(dialect: Dialect, url: String) -> Result<Self> {
    INSTALL_DRIVERS.call_once(|| sqlx::any::install_default_drivers());
    let runtime = Arc::new(
      tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| Error::new(Category::SystemError, format!("failed to start backend runtime: {e}")))?,
    );
    let conn = runtime.block_on(AnyConnection::connect(&url)).map_err(map_connect_error)?;
    Ok(AnySessionBackend { conn: Arc::new(Mutex::new(conn)), runtime, dialect, url })
  }

  fn exec_raw(&self, sql: &'static str) -> Result<()> {
    let conn = self.conn.clone();
    let sql = sql.to_string();
    self
      .runtime
      .block_on(async move {
        let mut conn = conn.lock().expect("any engine connection mutex poisoned");
        sqlx::query(&sql).execute(&mut *conn).await
      })
      .map_err(map_sql_error)?;
    Ok(())
  }
}

impl SessionBackend for AnySessionBackend {
  fn begin(&mut self) -> Result<()> {
    self.exec_raw(self.dialect.begin_sql())
  }

  fn commit(&mut self) -> Result<()> {
    self.exec_raw("COMMIT")
  }

  fn rollback(&mut self) -> Result<()> {
    self.exec_raw("ROLLBACK")
  }

  /// Never propagates (§4.8, §7): any ping failure collapses to `false`.
  fn is_connected(&mut self) -> bool {
    let conn = self.conn.clone();
    self.runtime.block_on(async move { conn.lock().expect("any engine connection mutex poisoned").ping().await }).is_ok()
  }

  fn reconnect(&mut self) -> Result<()> {
    let conn = self.runtime.block_on(AnyConnection::connect(&self.url)).map_err(map_connect_error)?;
    *self.conn.lock().expect("any engine connection mutex poisoned") = conn;
    Ok(())
  }

  fn make_statement_backend(&self) -> Box<dyn StatementBackend> {
    Box::new(AnyStatementBackend::new(self.conn.clone(), self.runtime.clone()))
  }

  fn backend_name(&self) -> &'static str {
    self.dialect.backend_name()
  }
}
