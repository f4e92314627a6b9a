//! The statement engine (C6) — the core of the core: a state machine
//! interleaving data conversion in, driver execution, and data conversion
//! out, in the fixed order §2/§4.5 lays out, with `clean_up` reachable
//! and safe from any state.

use std::cell::RefCell;
use std::rc::Rc;

use crate::backend::{ColumnDescription, ExecResult, StatementBackend, StatementType};
use crate::binding::{IntoBinding, IntoBindingVector, UseBinding, UseBindingVector};
use crate::error::{Error, Result};
use crate::kind::Indicator;
use crate::logger::{LogContextMode, Logger};
use crate::row::{CellValue, Row};
use crate::values::Values;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BindingMode {
  Unset,
  Positional,
  Named,
}

/// An into-binding synthesized during the describe phase (§4.6) that writes
/// a decoded column straight into the attached [`Row`] instead of a
/// caller-owned variable. Internal to the engine; never constructed by
/// application code.
struct RowColumnInto {
  row: Rc<RefCell<Row>>,
  column: usize,
  kind: crate::kind::ExchangeKind,
  backend: Option<Box<dyn crate::backend::StandardIntoTypeBackend>>,
}

impl IntoBinding for RowColumnInto {
  fn define(&mut self, backend: &mut dyn StatementBackend, position: &mut usize) -> Result<()> {
    let mut b = backend.make_into_type_backend(*position);
    b.define_by_pos(*position, self.kind)?;
    self.backend = Some(b);
    *position += 1;
    Ok(())
  }

  fn pre_fetch(&mut self) -> Result<()> {
    self.backend.as_mut().expect("define called before pre_fetch").pre_fetch()
  }

  fn post_fetch(&mut self, got_data: bool, called_from_fetch: bool) -> Result<()> {
    let (value, indicator) = self.backend.as_mut().expect("define called before post_fetch").post_fetch(got_data, called_from_fetch)?;
    let cell = if indicator == Indicator::Null {
      None
    } else {
      Some(match value {
        crate::backend::ExchangeValue::Int64(v) => CellValue::Int64(v),
        crate::backend::ExchangeValue::UInt64(v) => CellValue::UInt64(v),
        crate::backend::ExchangeValue::Double(v) => CellValue::Double(v),
        crate::backend::ExchangeValue::String(v) => CellValue::String(v),
        crate::backend::ExchangeValue::DateTime(v) => CellValue::DateTime(v),
        crate::backend::ExchangeValue::Bytes(v) => CellValue::String(String::from_utf8_lossy(&v).into_owned()),
        crate::backend::ExchangeValue::Null => unreachable!("handled by the indicator check above"),
      })
    };
    self.row.borrow_mut().set_value(self.column, cell, indicator);
    Ok(())
  }

  fn clean_up(&mut self) {
    if let Some(b) = self.backend.as_mut() {
      b.clean_up();
    }
  }
}

/// A snapshot of one `Values` field bound by name (§4.5, §4.7): vellum reads
/// the field at bind time rather than holding a live back-reference, since
/// an application is expected to finish populating a `Values` before
/// binding it (documented simplification, see DESIGN.md).
struct ValuesFieldUse {
  name: String,
  value: crate::backend::ExchangeValue,
  indicator: Indicator,
  backend: Vec<Box<dyn crate::backend::StandardUseTypeBackend>>,
}

impl UseBinding for ValuesFieldUse {
  fn name(&self) -> Option<&str> {
    Some(&self.name)
  }

  fn bind(&mut self, backend: &mut dyn StatementBackend, positions: &[usize]) -> Result<()> {
    let kind = match &self.value {
      crate::backend::ExchangeValue::Int64(_) | crate::backend::ExchangeValue::UInt64(_) => crate::kind::ExchangeKind::Int64,
      crate::backend::ExchangeValue::Double(_) => crate::kind::ExchangeKind::Double,
      crate::backend::ExchangeValue::String(_) => crate::kind::ExchangeKind::StdString,
      crate::backend::ExchangeValue::DateTime(_) => crate::kind::ExchangeKind::StdTm,
      crate::backend::ExchangeValue::Bytes(_) => crate::kind::ExchangeKind::Blob,
      crate::backend::ExchangeValue::Null => crate::kind::ExchangeKind::StdString,
    };
    self.backend.clear();
    for &position in positions {
      let mut b = backend.make_use_type_backend(position);
      b.bind_by_name(&self.name, kind)?;
      self.backend.push(b);
    }
    Ok(())
  }

  fn pre_use(&mut self) -> Result<()> {
    for b in self.backend.iter_mut() {
      b.pre_use(&self.value, self.indicator)?;
    }
    Ok(())
  }

  fn post_use(&mut self, got_data: bool) -> Result<()> {
    for b in self.backend.iter_mut() {
      b.post_use(got_data)?;
    }
    Ok(())
  }

  fn clean_up(&mut self) {
    for b in self.backend.iter_mut() {
      b.clean_up();
    }
  }

  fn dump_value(&self) -> String {
    format!("{:?}", self.value)
  }
}

/// Rewrites `:name` placeholders (§6: `[A-Za-z_][A-Za-z0-9_]*`, not followed
/// by an alphanumeric character) into the backend's positional syntax.
///
/// Returns the rewritten SQL, the first-occurrence order of each distinct
/// name, and a `name -> bind positions` map (0-based, matching the running
/// counter convention `define_and_bind` uses elsewhere). On a `$N`-style
/// backend a name's positions list always has one entry, since repeating
/// `$N` in the text already refers back to the same bound parameter; on a
/// `?`-style backend (mysql, sqlite) there is no such back-reference, so a
/// name used twice gets one position per occurrence and the bound value
/// has to be re-sent at each one (§4.5).
pub fn rewrite_named_params(sql: &str, dollar_style: bool) -> (String, Vec<String>, std::collections::HashMap<String, Vec<usize>>) {
  let mut out = String::with_capacity(sql.len());
  let mut names = Vec::new();
  let mut positions: std::collections::HashMap<String, Vec<usize>> = std::collections::HashMap::new();
  let chars: Vec<char> = sql.chars().collect();
  let mut i = 0usize;
  let mut next_pos = 0usize;

  while i < chars.len() {
    if chars[i] == ':' && i + 1 < chars.len() && (chars[i + 1].is_alphabetic() || chars[i + 1] == '_') {
      let start = i + 1;
      let mut j = start;
      while j < chars.len() && (chars[j].is_alphanumeric() || chars[j] == '_') {
        j += 1;
      }
      let name: String = chars[start..j].iter().collect();

      if dollar_style {
        if let Some(existing) = positions.get(&name) {
          out.push('$');
          out.push_str(&(existing[0] + 1).to_string());
        } else {
          let pos = next_pos;
          next_pos += 1;
          positions.insert(name.clone(), vec![pos]);
          names.push(name.clone());
          out.push('$');
          out.push_str(&(pos + 1).to_string());
        }
      } else {
        let pos = next_pos;
        next_pos += 1;
        positions.entry(name.clone()).or_insert_with(Vec::new).push(pos);
        if !names.contains(&name) {
          names.push(name.clone());
        }
        out.push('?');
      }
      i = j;
    } else {
      out.push(chars[i]);
      i += 1;
    }
  }

  (out, names, positions)
}

/// The state machine: `fresh -> allocated -> prepared -> bound -> executing
/// <-> fetching -> cleaned` (§4.5). Bindings borrow the user's variables for
/// `'a`, so a `Statement` cannot outlive the data it was handed.
pub struct Statement<'a> {
  backend: Box<dyn StatementBackend>,
  intos: Vec<Box<dyn IntoBinding + 'a>>,
  into_vecs: Vec<Box<dyn IntoBindingVector + 'a>>,
  uses: Vec<Box<dyn UseBinding + 'a>>,
  use_vecs: Vec<Box<dyn UseBindingVector + 'a>>,
  row_intos: Vec<RowColumnInto>,
  row: Option<Rc<RefCell<Row>>>,
  query: String,
  binding_mode: BindingMode,
  fetch_size: usize,
  initial_fetch_size: usize,
  already_described: bool,
  logger: Option<Box<dyn Logger>>,
  log_context_mode: LogContextMode,
  /// `:name -> bind positions` resolved by `prepare`'s rewrite pass (§4.5);
  /// consulted by `define_and_bind` instead of registration order, since
  /// registration order and textual occurrence order can disagree.
  name_to_positions: std::collections::HashMap<String, Vec<usize>>,
}

impl<'a> Statement<'a> {
  pub fn new(backend: Box<dyn StatementBackend>) -> Self {
    Statement {
      backend,
      intos: Vec::new(),
      into_vecs: Vec::new(),
      uses: Vec::new(),
      use_vecs: Vec::new(),
      row_intos: Vec::new(),
      row: None,
      query: String::new(),
      binding_mode: BindingMode::Unset,
      fetch_size: 1,
      initial_fetch_size: 1,
      already_described: false,
      logger: None,
      log_context_mode: LogContextMode::OnError,
      name_to_positions: std::collections::HashMap::new(),
    }
  }

  pub fn with_logger(mut self, logger: Option<Box<dyn Logger>>, mode: LogContextMode) -> Self {
    self.logger = logger;
    self.log_context_mode = mode;
    self
  }

  pub fn alloc(&mut self) -> Result<()> {
    self.backend.alloc()
  }

  /// `dollar_style` picks the backend's positional placeholder syntax
  /// (`$1, $2, ...` for postgres, `?` for mysql/sqlite) used to rewrite any
  /// `:name` parameters before handing the SQL to the driver.
  pub fn prepare(&mut self, sql: &str, statement_type: StatementType, dollar_style: bool) -> Result<()> {
    let (rewritten, _names, positions) = rewrite_named_params(sql, dollar_style);
    self.name_to_positions = positions;
    self.query = sql.to_string();
    if let Some(logger) = self.logger.as_mut() {
      logger.start_query(sql);
    }
    self.backend.prepare(&rewritten, statement_type).map_err(|e| e.with_context(format!("while preparing \"{sql}\"")))
  }

  pub fn exchange_into<B: IntoBinding + 'a>(&mut self, binding: B) {
    self.intos.push(Box::new(binding));
  }

  pub fn exchange_into_vector<B: IntoBindingVector + 'a>(&mut self, binding: B) {
    self.into_vecs.push(Box::new(binding));
  }

  /// Registers a use-binding; enforces I2 (mutual exclusion of positional
  /// vs. named binding modes within one statement) immediately, matching
  /// the "Binding-mode exclusivity" testable property (§8).
  pub fn exchange_use<B: UseBinding + 'a>(&mut self, binding: B) -> Result<()> {
    let mode = if binding.name().is_some() { BindingMode::Named } else { BindingMode::Positional };
    self.check_and_set_mode(mode)?;
    self.uses.push(Box::new(binding));
    Ok(())
  }

  pub fn exchange_use_vector<B: UseBindingVector + 'a>(&mut self, binding: B) -> Result<()> {
    let mode = if binding.name().is_some() { BindingMode::Named } else { BindingMode::Positional };
    self.check_and_set_mode(mode)?;
    self.use_vecs.push(Box::new(binding));
    Ok(())
  }

  fn check_and_set_mode(&mut self, mode: BindingMode) -> Result<()> {
    match self.binding_mode {
      BindingMode::Unset => {
        self.binding_mode = mode;
        Ok(())
      },
      m if m == mode => Ok(()),
      _ => Err(Error::mixed_binding_modes()),
    }
  }

  /// Binds a `Values` aggregator's fields as named use-bindings, scanning
  /// the query text for each `:name` exactly like `statement_impl::bind`
  /// (`core/statement.cpp`): first match wins, unmatched names move to the
  /// aggregator's unused list rather than failing immediately.
  pub fn bind_values(&mut self, values: &Values) -> Result<()> {
    for name in values.names() {
      let placeholder = format!(":{name}");
      if find_unescaped_placeholder(&self.query, &placeholder).is_some() {
        let indicator = values.get_indicator(name)?;
        let value = values_field_to_exchange(values, name)?;
        self.exchange_use(ValuesFieldUse { name: name.to_string(), value, indicator, backend: Vec::new() })?;
      }
    }
    Ok(())
  }

  /// Attaches a dynamic row: the describe phase (§4.6) runs inline during
  /// `define_and_bind`, using the next free position after every scalar and
  /// vector into-binding already registered. Returns the shared handle the
  /// caller reads decoded columns from.
  pub fn into_row(&mut self) -> Rc<RefCell<Row>> {
    let row = Rc::new(RefCell::new(Row::new()));
    self.row = Some(row.clone());
    row
  }

  /// Runs the describe phase at the given running position counter,
  /// advancing it past every column it defines. A no-op past the first
  /// successful describe (I5): a redundant later call, whether from
  /// `define_and_bind` or a backend that only learns its column count after
  /// `execute`, is harmless per the pinned Open Question in SPEC_FULL.md.
  fn describe_if_needed(&mut self, position: &mut usize) -> Result<()> {
    let Some(row) = self.row.clone() else { return Ok(()) };
    if self.already_described {
      return Ok(());
    }
    let n_cols = self.backend.prepare_for_describe()?;
    if n_cols == 0 {
      return Ok(());
    }
    for i in 0..n_cols {
      let desc = self.backend.describe_column(i)?;
      let kind = desc.kind;
      row.borrow_mut().add_properties(desc);
      let mut binding = RowColumnInto { row: row.clone(), column: i, kind, backend: None };
      binding.define(self.backend.as_mut(), position)?;
      self.row_intos.push(binding);
    }
    row.borrow_mut().mark_described();
    self.already_described = true;
    Ok(())
  }

  /// `define_and_bind` (§4.5): scalar intos, vector intos, and described
  /// row columns share one running "output column" counter; use-bindings
  /// share an entirely separate "bind parameter" counter, since the two
  /// address different index spaces (result-column ordinals vs. query
  /// placeholder ordinals) even though both start counting from the same
  /// live backend. A named use-binding's position(s) come from the
  /// `:name -> position` map `prepare` resolved instead of this counter;
  /// an unnamed one just takes the next free slot (I2 guarantees a
  /// statement never mixes the two within its use-bindings).
  pub fn define_and_bind(&mut self) -> Result<()> {
    let mut define_position = 0usize;
    for into in self.intos.iter_mut() {
      into.define(self.backend.as_mut(), &mut define_position)?;
    }
    for into in self.into_vecs.iter_mut() {
      into.define(self.backend.as_mut(), &mut define_position)?;
    }
    self.describe_if_needed(&mut define_position)?;

    let mut bind_position = 0usize;
    for u in self.uses.iter_mut() {
      let positions = self.resolve_bind_positions(u.name(), &mut bind_position);
      u.bind(self.backend.as_mut(), &positions)?;
    }
    for u in self.use_vecs.iter_mut() {
      let positions = self.resolve_bind_positions(u.name(), &mut bind_position);
      u.bind(self.backend.as_mut(), &positions)?;
    }
    Ok(())
  }

  /// Looks up a named binding's occurrence positions in the `:name ->
  /// position` map built during `prepare`, falling back to the next free
  /// slot for an unnamed (positional) binding or a name that matched no
  /// placeholder in the query text. Advances `bind_position` past whatever
  /// it hands out so later positional bindings don't collide.
  fn resolve_bind_positions(&self, name: Option<&str>, bind_position: &mut usize) -> Vec<usize> {
    if let Some(name) = name {
      if let Some(positions) = self.name_to_positions.get(name) {
        *bind_position = (*bind_position).max(positions.iter().copied().max().unwrap_or(0) + 1);
        return positions.clone();
      }
    }
    let pos = *bind_position;
    *bind_position += 1;
    vec![pos]
  }

  fn scalar_into_len(&self) -> Option<usize> {
    if self.intos.is_empty() { None } else { Some(1) }
  }

  fn vector_sizes(sizes: impl Iterator<Item = usize>) -> Result<Option<usize>> {
    let mut common: Option<usize> = None;
    for s in sizes {
      match common {
        None => common = Some(s),
        Some(c) if c == s => {},
        Some(_) => return Err(Error::vector_size_mismatch()),
      }
    }
    Ok(common)
  }

  /// `execute(with_data_exchange)` (§4.5).
  pub fn execute(&mut self, with_data_exchange: bool) -> Result<bool> {
    let into_vec_size = Self::vector_sizes(self.into_vecs.iter().map(|v| v.size()))?;
    self.initial_fetch_size = into_vec_size.unwrap_or(self.scalar_into_len().unwrap_or(1));
    if self.initial_fetch_size == 0 && !self.into_vecs.is_empty() {
      return Err(Error::vector_of_size_zero());
    }
    self.fetch_size = self.initial_fetch_size;

    for u in self.uses.iter_mut() {
      u.pre_use().map_err(|e| build_error_context(&self.query, self.log_context_mode, self.logger.as_deref(), e))?;
    }
    for u in self.use_vecs.iter_mut() {
      u.pre_use().map_err(|e| build_error_context(&self.query, self.log_context_mode, self.logger.as_deref(), e))?;
    }
    self.stash_query_parameters();

    let use_vec_size = Self::vector_sizes(self.use_vecs.iter().map(|v| v.size()))?;
    if let (Some(bind_size), true) = (use_vec_size, self.fetch_size > 1) {
      if bind_size > 1 {
        return Err(self.annotate(Error::bulk_insert_and_select_combined()));
      }
    }

    let mut position = self.intos.len() + self.into_vecs.len() + self.row_intos.len();
    self.describe_if_needed(&mut position).map_err(|e| build_error_context(&self.query, self.log_context_mode, self.logger.as_deref(), e))?;

    for into in self.intos.iter_mut() {
      into.pre_fetch().map_err(|e| build_error_context(&self.query, self.log_context_mode, self.logger.as_deref(), e))?;
    }
    for into in self.into_vecs.iter_mut() {
      into.pre_fetch().map_err(|e| build_error_context(&self.query, self.log_context_mode, self.logger.as_deref(), e))?;
    }

    let rows_requested = if with_data_exchange { self.fetch_size.max(use_vec_size.unwrap_or(1)).max(1) } else { 0 };
    let result = self.backend.execute(rows_requested).map_err(|e| {
      let e = build_error_context(&self.query, self.log_context_mode, self.logger.as_deref(), e);
      self.clean_up();
      e
    })?;

    let mut got_data = matches!(result, ExecResult::Success);
    if !got_data && !self.into_vecs.is_empty() {
      // Partial vector data may already be populated even on `no_data`.
      got_data = self.into_vecs.iter().any(|v| v.size() > 0);
    }

    if result == ExecResult::Success {
      if let Some(n) = self.backend_row_count() {
        for into in self.into_vecs.iter_mut() {
          into.resize(n);
        }
      }
    }

    // The `sqlx::Any` engine only learns its column count once the query has
    // actually run (its `prepare_for_describe` reads the first fetched row),
    // so the pre-execute describe above sees zero columns; retry it here now
    // that a result set may exist. `describe_if_needed` is idempotent (I5).
    self.describe_if_needed(&mut position).map_err(|e| build_error_context(&self.query, self.log_context_mode, self.logger.as_deref(), e))?;

    for binding in self.row_intos.iter_mut() {
      binding.post_fetch(got_data, false).map_err(|e| build_error_context(&self.query, self.log_context_mode, self.logger.as_deref(), e))?;
    }
    for into in self.intos.iter_mut() {
      into.post_fetch(got_data, false).map_err(|e| build_error_context(&self.query, self.log_context_mode, self.logger.as_deref(), e))?;
    }
    for into in self.into_vecs.iter_mut() {
      into.post_fetch(got_data, false).map_err(|e| build_error_context(&self.query, self.log_context_mode, self.logger.as_deref(), e))?;
    }

    for u in self.uses.iter_mut().rev() {
      u.post_use(got_data).map_err(|e| build_error_context(&self.query, self.log_context_mode, self.logger.as_deref(), e))?;
    }
    for u in self.use_vecs.iter_mut().rev() {
      u.post_use(got_data).map_err(|e| build_error_context(&self.query, self.log_context_mode, self.logger.as_deref(), e))?;
    }

    Ok(got_data)
  }

  fn backend_row_count(&mut self) -> Option<usize> {
    let n = self.backend.get_number_of_rows();
    if n > 0 { Some(n) } else { None }
  }

  /// `fetch()` (§4.5): returns `false` exactly once rowset is exhausted;
  /// subsequent calls also return `false` without calling the backend
  /// again (§8 "Fetch termination").
  pub fn fetch(&mut self) -> Result<bool> {
    if self.fetch_size == 0 {
      for into in self.into_vecs.iter_mut() {
        into.resize(0);
      }
      return Ok(false);
    }

    let new_fetch_size = Self::vector_sizes(self.into_vecs.iter().map(|v| v.size()))?.unwrap_or(1);
    if new_fetch_size > self.initial_fetch_size {
      return Err(self.annotate(Error::vector_size_increased()));
    }

    let result = self.backend.fetch(new_fetch_size).map_err(|e| build_error_context(&self.query, self.log_context_mode, self.logger.as_deref(), e))?;
    match result {
      ExecResult::Success => {
        if let Some(n) = self.backend_row_count() {
          for into in self.into_vecs.iter_mut() {
            into.resize(n);
          }
        }
        for binding in self.row_intos.iter_mut() {
          binding.post_fetch(true, true).map_err(|e| build_error_context(&self.query, self.log_context_mode, self.logger.as_deref(), e))?;
        }
        for into in self.intos.iter_mut() {
          into.post_fetch(true, true).map_err(|e| build_error_context(&self.query, self.log_context_mode, self.logger.as_deref(), e))?;
        }
        for into in self.into_vecs.iter_mut() {
          into.post_fetch(true, true).map_err(|e| build_error_context(&self.query, self.log_context_mode, self.logger.as_deref(), e))?;
        }
        Ok(true)
      },
      ExecResult::NoData => {
        if !self.into_vecs.is_empty() {
          if let Some(n) = self.backend_row_count() {
            for into in self.into_vecs.iter_mut() {
              into.resize(n);
            }
          }
          self.fetch_size = 0;
          let produced = self.into_vecs.iter().any(|v| v.size() > 0);
          Ok(produced)
        } else {
          self.fetch_size = 0;
          for into in self.intos.iter_mut() {
            into.clean_up();
          }
          Ok(false)
        }
      },
    }
  }

  pub fn get_affected_rows(&mut self) -> u64 {
    self.backend.get_affected_rows()
  }

  /// Appends the query text, and - in `Always`/`OnError` mode - the bound
  /// parameter dump already stashed in the logger (§4.5, §4.8) by
  /// `stash_query_parameters`, to an error's context before it propagates.
  ///
  /// A free function rather than a `&self` method: every call site sits
  /// inside a `self.<field>.iter_mut()` loop (e.g. over `self.uses`), and a
  /// `&self` method call would need to borrow the whole of `self` there,
  /// conflicting with that loop's live mutable borrow of one field. Taking
  /// only the three fields this actually needs keeps the borrows disjoint.
  fn annotate(&self, e: Error) -> Error {
    build_error_context(&self.query, self.log_context_mode, self.logger.as_deref(), e)
  }

  /// Eagerly formats every currently-bound use-binding's value into the
  /// logger (§4.8), right after `pre_use` succeeds. Real lazy
  /// materialization (format only once an error is actually about to
  /// propagate) would need read access to `self.uses`/`self.use_vecs` from
  /// inside `annotate`, which by then may be borrowed mutably by whatever
  /// loop is erroring; stashing the formatted strings up front avoids that
  /// and costs only string formatting, not I/O (documented simplification,
  /// see DESIGN.md). `Never` mode skips this entirely since nothing would
  /// ever read it back.
  fn stash_query_parameters(&mut self) {
    if matches!(self.log_context_mode, LogContextMode::Never) {
      return;
    }
    let Some(logger) = self.logger.as_mut() else { return };
    logger.clear_query_parameters();
    for (i, u) in self.uses.iter().enumerate() {
      let name = u.name().map(str::to_string).unwrap_or_else(|| format!("${}", i + 1));
      logger.add_query_parameter(&name, &u.dump_value());
    }
    for (i, u) in self.use_vecs.iter().enumerate() {
      let name = u.name().map(str::to_string).unwrap_or_else(|| format!("${}", i + 1));
      logger.add_query_parameter(&name, "<vector>");
    }
  }

  /// Idempotent from any state (§4.5, §5): releases every binding's
  /// backend resources.
  pub fn clean_up(&mut self) {
    for into in self.intos.iter_mut() {
      into.clean_up();
    }
    for into in self.into_vecs.iter_mut() {
      into.clean_up();
    }
    for binding in self.row_intos.iter_mut() {
      binding.clean_up();
    }
    for u in self.uses.iter_mut() {
      u.clean_up();
    }
    for u in self.use_vecs.iter_mut() {
      u.clean_up();
    }
    self.backend.clean_up();
  }
}

impl<'a> Drop for Statement<'a> {
  fn drop(&mut self) {
    self.clean_up();
  }
}

fn build_error_context(query: &str, mode: LogContextMode, logger: Option<&dyn Logger>, e: Error) -> Error {
  let mut e = e.with_context(format!("while executing \"{query}\""));
  if matches!(mode, LogContextMode::Always | LogContextMode::OnError) {
    if let Some(logger) = logger {
      if let Some(ctx) = logger.get_last_query_context() {
        e = e.with_context(ctx);
      }
    }
  }
  e
}

fn find_unescaped_placeholder(query: &str, placeholder: &str) -> Option<usize> {
  let mut search_from = 0;
  while let Some(rel) = query[search_from..].find(placeholder) {
    let pos = search_from + rel;
    let next_char = query[pos + placeholder.len()..].chars().next();
    match next_char {
      Some(c) if c.is_alphanumeric() || c == '_' => {
        search_from = pos + placeholder.len();
      },
      _ => return Some(pos),
    }
  }
  None
}

fn values_field_to_exchange(values: &Values, name: &str) -> Result<crate::backend::ExchangeValue> {
  if let Ok(v) = values.get_i64(name) {
    return Ok(crate::backend::ExchangeValue::Int64(v));
  }
  if let Ok(v) = values.get_f64(name) {
    return Ok(crate::backend::ExchangeValue::Double(v));
  }
  if let Ok(v) = values.get_string(name) {
    return Ok(crate::backend::ExchangeValue::String(v));
  }
  Err(Error::missing_use_element(name))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_rewrite_named_params_dollar_style() {
    let (sql, names, positions) = rewrite_named_params("select * from t where id = :id and s = :name", true);
    assert_eq!(sql, "select * from t where id = $1 and s = $2");
    assert_eq!(names, vec!["id".to_string(), "name".to_string()]);
    assert_eq!(positions.get("id"), Some(&vec![0]));
    assert_eq!(positions.get("name"), Some(&vec![1]));
  }

  #[test]
  fn test_rewrite_named_params_question_mark_style() {
    let (sql, names, positions) = rewrite_named_params("insert into t(a, b) values(:a, :b)", false);
    assert_eq!(sql, "insert into t(a, b) values(?, ?)");
    assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    assert_eq!(positions.get("a"), Some(&vec![0]));
    assert_eq!(positions.get("b"), Some(&vec![1]));
  }

  #[test]
  fn test_rewrite_named_params_does_not_match_prefix() {
    // `:xa` must not be mistaken for `:x` (§6).
    let (sql, names, _positions) = rewrite_named_params("select :xa", true);
    assert_eq!(sql, "select $1");
    assert_eq!(names, vec!["xa".to_string()]);
  }

  #[test]
  fn test_rewrite_named_params_dollar_style_dedupes_repeat() {
    let (sql, names, positions) = rewrite_named_params("select * from t where a = :x or b = :x", true);
    assert_eq!(sql, "select * from t where a = $1 or b = $1");
    assert_eq!(names, vec!["x".to_string()]);
    assert_eq!(positions.get("x"), Some(&vec![0]));
  }

  #[test]
  fn test_rewrite_named_params_question_mark_style_repeats_position_per_occurrence() {
    let (sql, names, positions) = rewrite_named_params("select * from t where a = :x or b = :x", false);
    assert_eq!(sql, "select * from t where a = ? or b = ?");
    assert_eq!(names, vec!["x".to_string()]);
    assert_eq!(positions.get("x"), Some(&vec![0, 1]));
  }

  #[test]
  fn test_find_unescaped_placeholder_skips_prefix_match() {
    assert_eq!(find_unescaped_placeholder("where x = :xa", ":x"), None);
    assert_eq!(find_unescaped_placeholder("where x = :x", ":x"), Some(10));
  }
}
