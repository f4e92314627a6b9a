//! PostgreSQL backend factory: builds a `postgres://` URL from
//! [`ConnectionParameters`] and hands it to the shared `sqlx::Any` engine
//! (`any_engine.rs`), the way `rainfrog`'s `PostgresDriver::build_connection_opts`
//! (`src/database/postgresql.rs`) turns CLI args into `PgConnectOptions` —
//! just producing a URL string instead of a typed options struct, since the
//! shared engine connects generically through `AnyConnection::connect`.

use std::sync::Arc;

use crate::backend::any_engine::{AnySessionBackend, Dialect};
use crate::backend::{BackendFactory, SessionBackend};
use crate::error::Result;
use crate::session::ConnectionParameters;

pub struct PostgresFactory;

impl PostgresFactory {
  pub fn new() -> Arc<Self> {
    Arc::new(PostgresFactory)
  }

  /// Registers this factory under the name `"postgres"` in the process-wide
  /// registry (§4.8) — applications opt in by calling this once, e.g. from
  /// `main` or a `ctor`-free init path, rather than relying on static
  /// link-time registration.
  pub fn register() {
    crate::backend::registry::register(PostgresFactory::new());
  }
}

impl BackendFactory for PostgresFactory {
  fn make_session(&self, params: &ConnectionParameters) -> Result<Box<dyn SessionBackend>> {
    let url = super::build_url("postgres", params);
    Ok(Box::new(AnySessionBackend::connect(Dialect::Postgres, url)?))
  }

  fn backend_name(&self) -> &'static str {
    "postgres"
  }
}
