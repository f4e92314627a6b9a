//! Logging hook protocol (§4.8, §6): `start_query` / `add_query_parameter` /
//! `clear_query_parameters`, cloneable so a pooled session can own one each.
//!
//! This is a *user-facing* pluggable sink, distinct from the crate's
//! internal `tracing` instrumentation — the statement engine drives both on
//! every execute (see `statement.rs`).

use std::fmt;

#[derive(Debug, Clone)]
pub struct QueryParameter {
  pub name: String,
  pub value: String,
}

/// Implemented by applications that want to capture the SQL and bound
/// parameter values vellum executes, e.g. to feed a slow-query log.
pub trait Logger: Send {
  fn start_query(&mut self, query: &str);
  fn add_query_parameter(&mut self, name: &str, value: &str);
  fn clear_query_parameters(&mut self);
  fn get_last_query(&self) -> Option<&str>;
  /// `None` when no parameters have been recorded since the last
  /// `clear_query_parameters` (§4.5, §4.8) — e.g. `OnError` mode before an
  /// error actually occurs, since nothing populates them until then.
  fn get_last_query_context(&self) -> Option<String>;
  fn clone_box(&self) -> Box<dyn Logger>;
}

/// Default logger: records just enough state to answer
/// `get_last_query`/`get_last_query_context`, and additionally forwards
/// every query to a `tracing::info!` span the way `rainfrog`'s drivers log
/// queries through `log::info!` (`src/database/postgresql.rs`).
#[derive(Debug, Clone, Default)]
pub struct BasicLogger {
  last_query: Option<String>,
  params: Vec<QueryParameter>,
}

impl Logger for BasicLogger {
  fn start_query(&mut self, query: &str) {
    tracing::info!(query, "starting query");
    self.last_query = Some(query.to_string());
    self.params.clear();
  }

  fn add_query_parameter(&mut self, name: &str, value: &str) {
    self.params.push(QueryParameter { name: name.to_string(), value: value.to_string() });
  }

  fn clear_query_parameters(&mut self) {
    self.params.clear();
  }

  fn get_last_query(&self) -> Option<&str> {
    self.last_query.as_deref()
  }

  fn get_last_query_context(&self) -> Option<String> {
    if self.params.is_empty() { None } else { Some(self.format_parameters()) }
  }

  fn clone_box(&self) -> Box<dyn Logger> {
    Box::new(self.clone())
  }
}

impl BasicLogger {
  pub fn new() -> Self {
    BasicLogger::default()
  }

  /// `:name=value` pairs, used by the statement engine to format the
  /// parameter list appended to an error's context (§4.5, §4.8).
  pub fn format_parameters(&self) -> String {
    self.params.iter().map(|p| format!(":{}={}", p.name, p.value)).collect::<Vec<_>>().join(", ")
  }
}

impl fmt::Display for QueryParameter {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, ":{}={}", self.name, self.value)
  }
}

/// When the session logs bound `use` parameter values in an error context
/// (§4.5, §4.8). In `on_error` mode, parameters are materialized lazily,
/// only once an exception is about to propagate (`src/core/logger.cpp`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogContextMode {
  Never,
  #[default]
  OnError,
  Always,
}
