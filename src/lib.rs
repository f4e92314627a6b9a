//! `vellum` — a backend-agnostic SQL exchange core: bind, execute, fetch,
//! without committing to one driver.
//!
//! The crate is organised around the same layering its design follows:
//! a type-exchange subsystem ([`kind`], [`exchange`], [`convert`]), the
//! binding layer that sits between application values and a backend
//! ([`binding`], [`values`]), the statement state machine that drives a
//! backend through bind/execute/fetch ([`statement`], [`rowset`]), the
//! dynamic row model for shape-unknown-at-call-time queries ([`row`]), the
//! backend capability interfaces every driver implements ([`backend`]), and
//! the session/pool/transaction layer on top ([`session`], [`pool`],
//! [`transaction`]). [`error`] and [`logger`] are shared across all of it.

pub mod backend;
pub mod binding;
pub mod blob;
pub mod connection_string;
pub mod convert;
pub mod error;
pub mod exchange;
pub mod kind;
pub mod logger;
pub mod pool;
pub mod row;
pub mod rowid;
pub mod rowset;
pub mod session;
pub mod statement;
pub mod transaction;
pub mod values;

pub use binding::{StandardInto, StandardUse, VectorInto, VectorUse};
pub use blob::Blob;
pub use error::{Category, Error, Result};
pub use exchange::Exchange;
pub use kind::{ExchangeKind, Indicator};
pub use logger::{BasicLogger, LogContextMode, Logger};
pub use pool::{PooledSession, SessionPool};
pub use row::Row;
pub use rowid::RowId;
pub use rowset::{RowSet, RowSetIterator};
pub use session::{ConnectionConfig, ConnectionParameters, Session};
pub use statement::Statement;
pub use transaction::Transaction;
pub use values::Values;

/// Registers every backend enabled by this build's Cargo features in the
/// process-wide factory registry (§4.8), so `Session::open`/`open_str` can
/// find them by name without each application having to call every
/// `register()` itself. Idempotent — safe to call more than once, e.g. once
/// per test.
pub fn register_builtin_backends() {
  #[cfg(feature = "postgres")]
  backend::postgres::PostgresFactory::register();
  #[cfg(feature = "mysql")]
  backend::mysql::MySqlFactory::register();
  #[cfg(feature = "sqlite")]
  backend::sqlite::SqliteFactory::register();
}
