//! MySQL backend factory — the `mysql://` counterpart to
//! [`crate::backend::postgres::PostgresFactory`], grounded the same way in
//! `rainfrog`'s `MySqlDriver::build_connection_opts` (`src/database/mysql.rs`)
//! but producing a URL for the shared `sqlx::Any` engine.

use std::sync::Arc;

use crate::backend::any_engine::{AnySessionBackend, Dialect};
use crate::backend::{BackendFactory, SessionBackend};
use crate::error::Result;
use crate::session::ConnectionParameters;

pub struct MySqlFactory;

impl MySqlFactory {
  pub fn new() -> Arc<Self> {
    Arc::new(MySqlFactory)
  }

  pub fn register() {
    crate::backend::registry::register(MySqlFactory::new());
  }
}

impl BackendFactory for MySqlFactory {
  fn make_session(&self, params: &ConnectionParameters) -> Result<Box<dyn SessionBackend>> {
    let url = super::build_url("mysql", params);
    Ok(Box::new(AnySessionBackend::connect(Dialect::MySql, url)?))
  }

  fn backend_name(&self) -> &'static str {
    "mysql"
  }
}
