//! Error taxonomy shared by every backend (C10).
//!
//! Mirrors `soci::soci_error`/`soci::sql_error`: one concrete error type,
//! tagged with a [`Category`] orthogonal to the backend's own error code, plus
//! whatever context the statement engine appended on the way out.

use std::fmt;

/// Categories a core-originated or backend-originated failure falls into.
///
/// `Category::Unknown` is reserved for backend errors the backend's own
/// classifier could not place; the core itself never raises with this tag
/// (§7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
  Unknown,
  ConnectionError,
  InvalidStatement,
  NoPrivilege,
  NoData,
  ConstraintViolation,
  UnknownTransactionState,
  SystemError,
}

impl fmt::Display for Category {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      Category::Unknown => "unknown",
      Category::ConnectionError => "connection_error",
      Category::InvalidStatement => "invalid_statement",
      Category::NoPrivilege => "no_privilege",
      Category::NoData => "no_data",
      Category::ConstraintViolation => "constraint_violation",
      Category::UnknownTransactionState => "unknown_transaction_state",
      Category::SystemError => "system_error",
    };
    f.write_str(s)
  }
}

/// A structured failure raised anywhere in the exchange core or a backend.
///
/// Intentionally a single flat struct rather than a tree of exception
/// subclasses (`soci_error` / `sql_error` in the C++ original): a category
/// tag plus optional backend provenance covers everything a caller needs to
/// decide how to react, without requiring `downcast`.
#[derive(Debug, Clone)]
pub struct Error {
  message: String,
  category: Category,
  backend_name: Option<String>,
  native_code: Option<i64>,
  sql_state: Option<String>,
  context: Vec<String>,
}

impl Error {
  pub fn new(category: Category, message: impl Into<String>) -> Self {
    Error { message: message.into(), category, backend_name: None, native_code: None, sql_state: None, context: Vec::new() }
  }

  pub fn from_backend(
    category: Category,
    message: impl Into<String>,
    backend_name: impl Into<String>,
    native_code: Option<i64>,
    sql_state: Option<String>,
  ) -> Self {
    Error {
      message: message.into(),
      category,
      backend_name: Some(backend_name.into()),
      native_code,
      sql_state,
      context: Vec::new(),
    }
  }

  pub fn category(&self) -> Category {
    self.category
  }

  pub fn backend_name(&self) -> Option<&str> {
    self.backend_name.as_deref()
  }

  pub fn native_code(&self) -> Option<i64> {
    self.native_code
  }

  pub fn sql_state(&self) -> Option<&str> {
    self.sql_state.as_deref()
  }

  /// Appends a context line (e.g. "while executing select ..."); the
  /// statement engine calls this on every propagation point so the
  /// outermost caller sees the full phase trail, most-recent first.
  pub fn with_context(mut self, context: impl Into<String>) -> Self {
    self.context.push(context.into());
    self
  }

  pub fn context(&self) -> &[String] {
    &self.context
  }

  // --- constructors for the core-originated failures enumerated in §7 ---

  pub fn mixed_binding_modes() -> Self {
    Error::new(Category::InvalidStatement, "cannot mix positional and named use bindings in one statement")
  }

  pub fn vector_of_size_zero() -> Self {
    Error::new(Category::InvalidStatement, "vectors of size 0 are not allowed")
  }

  pub fn vector_size_mismatch() -> Self {
    Error::new(Category::InvalidStatement, "vector bindings in the same statement must have matching sizes")
  }

  pub fn missing_indicator() -> Self {
    Error::new(Category::InvalidStatement, "fetched a null value with no indicator attached")
  }

  pub fn missing_use_element(name: &str) -> Self {
    Error::new(Category::InvalidStatement, format!("no use element bound under the name \"{name}\""))
  }

  pub fn read_only_violated(name: &str) -> Self {
    Error::new(Category::InvalidStatement, format!("use element \"{name}\" is read-only but the backend modified it"))
  }

  pub fn already_described() -> Self {
    Error::new(Category::InvalidStatement, "statement row was already described")
  }

  pub fn vector_size_increased() -> Self {
    Error::new(Category::InvalidStatement, "increasing the size of the output vector between fetches is not supported")
  }

  pub fn bulk_insert_and_select_combined() -> Self {
    Error::new(Category::InvalidStatement, "cannot combine a bulk (vector) use binding with a bulk (vector) into binding")
  }

  pub fn bad_cast(expected: &str, column: &str) -> Self {
    Error::new(Category::InvalidStatement, format!("column \"{column}\" does not hold a {expected}"))
  }

  pub fn no_data() -> Self {
    Error::new(Category::NoData, "no data")
  }

  pub fn invalid_connection_string(reason: impl Into<String>) -> Self {
    Error::new(Category::InvalidStatement, format!("invalid connection string: {}", reason.into()))
  }

  pub fn unknown_backend(name: &str) -> Self {
    Error::new(Category::SystemError, format!("no backend registered under the name \"{name}\""))
  }
}

impl fmt::Display for Error {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.message)?;
    if let Some(backend) = &self.backend_name {
      write!(f, " ({backend})")?;
    }
    for ctx in self.context.iter().rev() {
      write!(f, "\n{ctx}")?;
    }
    Ok(())
  }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
