//! Transaction RAII guard, supplemented from `include/soci/transaction.h`:
//! a thin veneer over [`Session::begin`]/[`commit`][Session::commit]/
//! [`rollback`][Session::rollback] that rolls back on drop unless the
//! caller already committed or rolled back explicitly (§1's "transactions
//! ... are thin veneers").

use crate::error::Result;
use crate::session::Session;

/// Begins a transaction on construction; on drop, rolls back if neither
/// [`Transaction::commit`] nor [`Transaction::rollback`] was called. Best
/// effort: a rollback failure during drop is logged via `tracing` rather
/// than propagated, since a destructor cannot return a `Result`.
pub struct Transaction<'a> {
  session: &'a mut Session,
  finished: bool,
}

impl<'a> Transaction<'a> {
  pub fn begin(session: &'a mut Session) -> Result<Self> {
    session.begin()?;
    Ok(Transaction { session, finished: false })
  }

  pub fn commit(mut self) -> Result<()> {
    self.finished = true;
    self.session.commit()
  }

  pub fn rollback(mut self) -> Result<()> {
    self.finished = true;
    self.session.rollback()
  }

  pub fn session(&self) -> &Session {
    self.session
  }

  pub fn session_mut(&mut self) -> &mut Session {
    self.session
  }
}

impl<'a> Drop for Transaction<'a> {
  fn drop(&mut self) {
    if !self.finished {
      if let Err(e) = self.session.rollback() {
        tracing::warn!(error = %e, "rollback on transaction guard drop failed");
      }
    }
  }
}
