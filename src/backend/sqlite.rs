//! SQLite backend factory. Unlike postgres/mysql, a SQLite "connection
//! string" (§6) is a bare filesystem path or `:memory:`, not a `key=value`
//! connection string in the usual sense — the teacher's own
//! `src/database/sqlite.rs` was an unfinished stub with no connection
//! logic to ground this on, so the URL assembly here follows `sqlx`'s own
//! `sqlite://<path>` convention directly.

use std::sync::Arc;

use crate::backend::any_engine::{AnySessionBackend, Dialect};
use crate::backend::{BackendFactory, SessionBackend};
use crate::error::Result;
use crate::session::ConnectionParameters;

pub struct SqliteFactory;

impl SqliteFactory {
  pub fn new() -> Arc<Self> {
    Arc::new(SqliteFactory)
  }

  pub fn register() {
    crate::backend::registry::register(SqliteFactory::new());
  }
}

impl BackendFactory for SqliteFactory {
  fn make_session(&self, params: &ConnectionParameters) -> Result<Box<dyn SessionBackend>> {
    let path = params.get("path").or_else(|| params.get("db")).unwrap_or(":memory:");
    let url = if path == ":memory:" { "sqlite::memory:".to_string() } else { format!("sqlite://{path}?mode=rwc") };
    Ok(Box::new(AnySessionBackend::connect(Dialect::Sqlite, url)?))
  }

  fn backend_name(&self) -> &'static str {
    "sqlite"
  }
}
