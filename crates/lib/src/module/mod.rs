//! Module resolution and loading.
//!
//! A [`ModuleLoader`] turns `(specifier, base_dir)` pairs into caller-defined
//! instances. Loads are single-flight: concurrent or repeated requests for the
//! same pair share one in-flight load and observe the same success or failure.
//! The cache lives on the loader, so its lifetime is the lifetime of whatever
//! owns the loader (normally one model build).

mod resolve;
mod types;

pub use resolve::{is_path_like, resolve};
pub use types::{LoadError, LoadManyOptions, ResolveError, ResolveOptions};

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use async_trait::async_trait;
use futures::future::{FutureExt, LocalBoxFuture, Shared, join_all, try_join_all};
use mlua::prelude::*;
use tracing::{debug, warn};

use crate::lua::loaders::load_file_with_dir;

/// Executes a resolved module file and returns its exports.
#[async_trait(?Send)]
pub trait Importer {
  async fn import(&self, location: &Path) -> Result<LuaValue, LoadError>;
}

/// Imports modules by executing them in a Lua VM.
pub struct LuaImporter {
  lua: Lua,
}

impl LuaImporter {
  pub fn new(lua: Lua) -> Self {
    Self { lua }
  }
}

#[async_trait(?Send)]
impl Importer for LuaImporter {
  async fn import(&self, location: &Path) -> Result<LuaValue, LoadError> {
    load_file_with_dir(&self.lua, location).map_err(|source| LoadError::Import {
      location: location.to_path_buf(),
      source,
    })
  }
}

/// Projects a module's exports into the instance a caller wants.
///
/// Receives the exports, the specifier as written and the resolved location.
pub type ToInstance<T> = dyn Fn(LuaValue, &str, &Path) -> Result<T, LoadError>;

type SharedLoad<T> = Shared<LocalBoxFuture<'static, Result<T, LoadError>>>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
  base_dir: PathBuf,
  specifier: String,
}

/// Single-flight module loader.
pub struct ModuleLoader<T> {
  importer: Rc<dyn Importer>,
  options: Rc<ResolveOptions>,
  cache: RefCell<HashMap<CacheKey, SharedLoad<T>>>,
}

impl<T: Clone + 'static> ModuleLoader<T> {
  pub fn new(importer: Rc<dyn Importer>, options: ResolveOptions) -> Self {
    Self {
      importer,
      options: Rc::new(options),
      cache: RefCell::new(HashMap::new()),
    }
  }

  pub fn options(&self) -> &ResolveOptions {
    &self.options
  }

  /// Load one module, reusing any load already started for the same pair.
  ///
  /// The projection of the first request wins; later requests for the same
  /// pair share its result.
  pub async fn load(&self, specifier: &str, base_dir: &Path, to_instance: Rc<ToInstance<T>>) -> Result<T, LoadError> {
    let key = CacheKey {
      base_dir: base_dir.to_path_buf(),
      specifier: specifier.to_string(),
    };

    let pending = {
      let mut cache = self.cache.borrow_mut();
      cache
        .entry(key)
        .or_insert_with(|| self.start_load(specifier, base_dir, to_instance))
        .clone()
    };

    pending.await
  }

  fn start_load(&self, specifier: &str, base_dir: &Path, to_instance: Rc<ToInstance<T>>) -> SharedLoad<T> {
    let importer = Rc::clone(&self.importer);
    let options = Rc::clone(&self.options);
    let specifier = specifier.to_string();
    let base_dir = base_dir.to_path_buf();

    async move {
      let location = resolve(&specifier, &base_dir, &options)?;
      debug!(specifier = %specifier, location = %location.display(), "loading module");
      let exports = importer.import(&location).await?;
      to_instance(exports, &specifier, &location)
    }
    .boxed_local()
    .shared()
  }

  /// Load several modules concurrently.
  ///
  /// By default the first failure aborts the batch. With `continue_on_error`
  /// every specifier is attempted and all failures are returned together, or
  /// logged and dropped when `swallow_errors` is also set.
  pub async fn load_many(
    &self,
    specifiers: &[String],
    base_dir: &Path,
    to_instance: Rc<ToInstance<T>>,
    options: LoadManyOptions,
  ) -> Result<BTreeMap<String, T>, LoadError> {
    let loads = specifiers.iter().map(|specifier| {
      let to_instance = Rc::clone(&to_instance);
      async move {
        self
          .load(specifier, base_dir, to_instance)
          .await
          .map(|instance| (specifier.clone(), instance))
          .map_err(|e| e.for_specifier(specifier))
      }
    });

    if !options.continue_on_error {
      let loaded = try_join_all(loads).await?;
      return Ok(loaded.into_iter().collect());
    }

    let mut loaded = BTreeMap::new();
    let mut errors = Vec::new();
    for result in join_all(loads).await {
      match result {
        Ok((specifier, instance)) => {
          loaded.insert(specifier, instance);
        }
        Err(e) => errors.push(e),
      }
    }

    if !errors.is_empty() {
      if !options.swallow_errors {
        return Err(LoadError::Aggregate(errors));
      }
      for error in &errors {
        warn!(error = %error, "skipping module that failed to load");
      }
    }

    Ok(loaded)
  }
}
