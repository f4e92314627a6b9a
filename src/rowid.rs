//! RowID handle (§3 ownership rules, §4.3): an opaque backend-owned locator
//! for a single row, move-only like [`crate::blob::Blob`].

use crate::backend::RowIdBackend;

pub struct RowId {
  backend: Box<dyn RowIdBackend>,
}

impl RowId {
  pub fn new(backend: Box<dyn RowIdBackend>) -> Self {
    RowId { backend }
  }

  pub fn as_str(&self) -> &str {
    self.backend.as_str()
  }
}

impl std::fmt::Debug for RowId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("RowId").field("value", &self.backend.as_str()).finish()
  }
}
