//! Factory registry (C8): a process-wide `backend name -> factory` map.
//!
//! Registration happens either statically — a driver crate calls
//! [`register`] from an initializer — or by *dynamic lookup* when the
//! `dynamic-loading` feature is enabled: `backend_name -> shared library path
//! -> resolved symbol factory_<name>` (§6). The search path is configurable
//! via the `VELLUM_BACKEND_PATH` environment variable, analogous to
//! `rainfrog`'s `get_config_dir` env-var override (`src/config.rs`).

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use lazy_static::lazy_static;

use crate::backend::BackendFactory;
use crate::error::{Error, Result};

lazy_static! {
  static ref FACTORIES: RwLock<HashMap<String, Arc<dyn BackendFactory>>> = RwLock::new(HashMap::new());
}

/// Registers a factory under its own `backend_name()`, overwriting any
/// previous registration for that name. Called once per backend, typically
/// from a `ctor`-free explicit init path (e.g. `vellum::backend::postgres::register()`)
/// rather than link-time magic.
pub fn register(factory: Arc<dyn BackendFactory>) {
  let name = factory.backend_name().to_string();
  FACTORIES.write().expect("factory registry lock poisoned").insert(name, factory);
}

/// Looks up a previously registered factory, falling back to dynamic
/// shared-library lookup (behind the `dynamic-loading` feature) when nothing
/// is statically registered under `name`.
pub fn lookup(name: &str) -> Result<Arc<dyn BackendFactory>> {
  if let Some(factory) = FACTORIES.read().expect("factory registry lock poisoned").get(name) {
    return Ok(factory.clone());
  }

  #[cfg(feature = "dynamic-loading")]
  {
    if let Some(factory) = dynamic::load(name)? {
      register(factory.clone());
      return Ok(factory);
    }
  }

  Err(Error::unknown_backend(name))
}

pub fn is_registered(name: &str) -> bool {
  FACTORIES.read().expect("factory registry lock poisoned").contains_key(name)
}

#[cfg(feature = "dynamic-loading")]
mod dynamic {
  use std::path::PathBuf;
  use std::sync::Arc;

  use libloading::{Library, Symbol};

  use crate::backend::BackendFactory;
  use crate::error::{Category, Error, Result};

  /// Env var holding a `:`-separated list of directories to search for
  /// `vellum_<backend>.<platform-ext>` shared objects (§6's
  /// "dynamic backend discovery", generalized from the env-var search path
  /// the spec describes but leaves platform-specific).
  const SEARCH_PATH_VAR: &str = "VELLUM_BACKEND_PATH";

  type FactoryCtor = unsafe extern "C" fn() -> *mut dyn BackendFactory;

  /// Attempts to find and load `vellum_<name>` from every directory in
  /// `VELLUM_BACKEND_PATH`, returning `Ok(None)` if the variable is unset or
  /// no candidate file exists (so the caller can still report
  /// `unknown_backend` rather than a confusing load failure).
  pub fn load(name: &str) -> Result<Option<Arc<dyn BackendFactory>>> {
    let Ok(search_path) = std::env::var(SEARCH_PATH_VAR) else {
      return Ok(None);
    };

    let file_name = format!("{}vellum_{name}{}", std::env::consts::DLL_PREFIX, std::env::consts::DLL_SUFFIX);

    for dir in std::env::split_paths(&search_path) {
      let candidate: PathBuf = dir.join(&file_name);
      if !candidate.is_file() {
        continue;
      }

      // SAFETY: the caller opts into loading arbitrary native code for this
      // backend name by setting VELLUM_BACKEND_PATH and placing the file there.
      let lib = unsafe {
        Library::new(&candidate)
          .map_err(|e| Error::new(Category::SystemError, format!("failed to load {}: {e}", candidate.display())))?
      };

      let symbol_name = format!("factory_{name}");
      // SAFETY: the loaded library is expected to export a symbol of this
      // name and signature, per the backend-authoring contract (§6).
      let ctor: Symbol<FactoryCtor> = unsafe {
        lib.get(symbol_name.as_bytes())
          .map_err(|e| Error::new(Category::SystemError, format!("{} does not export {symbol_name}: {e}", candidate.display())))?
      };

      // SAFETY: the exported constructor hands back an owned boxed trait
      // object; we take ownership and leak the library handle so the vtable
      // stays valid for the process lifetime (ref-counted unload per §4.8 is
      // not implemented: this crate never unloads a backend once loaded).
      let raw = unsafe { ctor() };
      let factory: Arc<dyn BackendFactory> = unsafe { Arc::from(Box::from_raw(raw)) };
      std::mem::forget(lib);
      return Ok(Some(factory));
    }

    Ok(None)
  }
}
