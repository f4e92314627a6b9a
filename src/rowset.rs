//! The row-set iterator (C9): a forward-only view over a [`Statement`]'s
//! dynamic row that advances `fetch()` under the hood, mirroring `rowset<T>`
//! / `rowset_iterator<T>` from the C++ original, specialized here to the
//! dynamic `Row` case (§4.9 names `Row` as the default element type;
//! typed rowsets are left to application code via `Row::get::<U>`).

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::Result;
use crate::row::Row;
use crate::statement::Statement;

/// Wraps a prepared, already-bound [`Statement`] that has had `into_row`
/// called on it. Cloning a `RowSet` shares the same underlying statement and
/// cursor state (the C++ original's "copying the iterator shares state"
/// requirement), which is why the statement is held behind `Rc<RefCell<_>>`
/// rather than owned outright.
pub struct RowSet<'a> {
  statement: Rc<RefCell<Statement<'a>>>,
  row: Rc<RefCell<Row>>,
  has_data: bool,
}

impl<'a> RowSet<'a> {
  /// `statement` must already have `into_row()` called on it and be bound
  /// and executed; `row` is the handle that call returned. `has_data` is
  /// whatever that `execute(true)` call returned: `begin()` (§4.6/§4.9)
  /// already fetched the first row as part of executing, so the iterator
  /// must surface it directly rather than calling `fetch()` again for it.
  pub fn new(statement: Rc<RefCell<Statement<'a>>>, row: Rc<RefCell<Row>>, has_data: bool) -> Self {
    RowSet { statement, row, has_data }
  }

  /// A forward-only cursor over this row set, starting at the first row.
  pub fn iter(&self) -> RowSetIterator<'a> {
    RowSetIterator { statement: self.statement.clone(), row: self.row.clone(), done: !self.has_data, first: true }
  }
}

/// Forward-only; there is no way to re-seek to an earlier row, matching
/// §4.9's "single pass" invariant.
#[derive(Clone)]
pub struct RowSetIterator<'a> {
  statement: Rc<RefCell<Statement<'a>>>,
  row: Rc<RefCell<Row>>,
  done: bool,
  first: bool,
}

impl<'a> RowSetIterator<'a> {
  /// Advances to the next row, returning `false` once the row set is
  /// exhausted. Mirrors `rowset_iterator::increment` / `Statement::fetch`.
  /// The first advance just surfaces the row the statement's own `execute`
  /// already fetched; only the second and later advances call
  /// `Statement::fetch` themselves.
  pub fn advance(&mut self) -> Result<bool> {
    if self.done {
      return Ok(false);
    }
    if self.first {
      self.first = false;
      return Ok(true);
    }
    let got = self.statement.borrow_mut().fetch()?;
    if !got {
      self.done = true;
    }
    Ok(got)
  }

  pub fn row(&self) -> Rc<RefCell<Row>> {
    self.row.clone()
  }

  pub fn is_done(&self) -> bool {
    self.done
  }
}

impl<'a> Iterator for RowSetIterator<'a> {
  type Item = Result<Rc<RefCell<Row>>>;

  fn next(&mut self) -> Option<Self::Item> {
    match self.advance() {
      Ok(true) => Some(Ok(self.row.clone())),
      Ok(false) => None,
      Err(e) => {
        self.done = true;
        Some(Err(e))
      },
    }
  }
}
