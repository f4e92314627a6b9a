//! Session pool (§5): a fixed number of session slots guarded by a mutex +
//! condition variable, mirroring `rainfrog`'s `init_pool` (`src/database.rs`)
//! sizing convention but adapted to the blocking, lease/give-back protocol
//! §5 specifies instead of `sqlx::Pool`'s own async acquire/release.
//!
//! A leased session is usable only by the leasing thread until it is
//! returned; reentrant leasing on the same thread is not supported (§5) —
//! nothing here detects that misuse, it is simply undocumented to attempt.

use std::sync::{Arc, Condvar, Mutex};

use crate::backend::BackendFactory;
use crate::error::Result;
use crate::session::{ConnectionParameters, Session};

struct Slot {
  session: Option<Session>,
  in_use: bool,
}

struct Inner {
  slots: Mutex<Vec<Slot>>,
  available: Condvar,
}

/// Owns `capacity` backend sessions, all opened eagerly against the same
/// connection parameters at construction time.
pub struct SessionPool {
  inner: Arc<Inner>,
}

impl SessionPool {
  pub fn new(factory: Arc<dyn BackendFactory>, params: ConnectionParameters, capacity: usize) -> Result<Self> {
    let mut slots = Vec::with_capacity(capacity);
    for _ in 0..capacity {
      let backend = factory.make_session(&params)?;
      let session = Session::from_backend_for_pool(backend, params.clone(), slots.len());
      slots.push(Slot { session: Some(session), in_use: false });
    }
    Ok(SessionPool { inner: Arc::new(Inner { slots: Mutex::new(slots), available: Condvar::new() }) })
  }

  /// Blocks until a slot is free, then hands back a RAII view that returns
  /// the slot to the pool on drop (§5).
  pub fn lease(&self) -> PooledSession {
    let mut slots = self.inner.slots.lock().expect("session pool mutex poisoned");
    loop {
      if let Some((index, slot)) = slots.iter_mut().enumerate().find(|(_, s)| !s.in_use) {
        slot.in_use = true;
        let session = slot.session.take().expect("slot marked free but holds no session");
        return PooledSession { pool: self.inner.clone(), index, session: Some(session) };
      }
      slots = self.inner.available.wait(slots).expect("session pool mutex poisoned");
    }
  }

  pub fn capacity(&self) -> usize {
    self.inner.slots.lock().expect("session pool mutex poisoned").len()
  }
}

/// A leased session slot. Returns the underlying [`Session`] to the pool on
/// drop, waking one thread blocked in [`SessionPool::lease`].
pub struct PooledSession {
  pool: Arc<Inner>,
  index: usize,
  session: Option<Session>,
}

impl PooledSession {
  pub fn session(&self) -> &Session {
    self.session.as_ref().expect("session taken before PooledSession was dropped")
  }

  pub fn session_mut(&mut self) -> &mut Session {
    self.session.as_mut().expect("session taken before PooledSession was dropped")
  }
}

impl std::ops::Deref for PooledSession {
  type Target = Session;

  fn deref(&self) -> &Session {
    self.session()
  }
}

impl std::ops::DerefMut for PooledSession {
  fn deref_mut(&mut self) -> &mut Session {
    self.session_mut()
  }
}

impl Drop for PooledSession {
  fn drop(&mut self) {
    if let Some(session) = self.session.take() {
      let mut slots = self.pool.slots.lock().expect("session pool mutex poisoned");
      if let Some(slot) = slots.get_mut(self.index) {
        slot.session = Some(session);
        slot.in_use = false;
      }
      drop(slots);
      self.pool.available.notify_one();
    }
  }
}
