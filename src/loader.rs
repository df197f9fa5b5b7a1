//! The Loader is the public entry point for importing modules and running scripts.
//!
//! It wraps a [LoaderEngine] which does the real work and a [ModuleRegistry] which holds registered
//! modules. Every asynchronous operation is issued immediately and runs as its own task on the
//! Loader's [EventLoop]; the returned [Promise] only observes that task, dropping it does not
//! cancel anything.
//!
//! #Example
//! ```rust
//! use hirofa_loader::loader::engine::{CodeUnit, Goal, LoadReferrer, LoaderEngine, LoaderOptions, SourceMapInfo};
//! use hirofa_loader::loader::errors::LoaderError;
//! use hirofa_loader::loader::hooks::HookSet;
//! use hirofa_loader::loader::Loader;
//! use hirofa_loader::registry::ModuleStore;
//! use futures::executor::block_on;
//! use futures::future::{ready, BoxFuture};
//! use futures::FutureExt;
//! use std::sync::Arc;
//!
//! struct EchoEngine {
//!     options: LoaderOptions,
//! }
//!
//! impl LoaderEngine for EchoEngine {
//!     type Value = String;
//!     fn load(&self, name: &str, _referrer: &LoadReferrer, goal: Goal) -> BoxFuture<'static, Result<CodeUnit<String>, LoaderError>> {
//!         let unit = CodeUnit { normalized_name: name.to_string(), goal, result: format!("{} {}", goal, name) };
//!         ready(Ok(unit)).boxed()
//!     }
//!     fn script(&self, source: &str, _name: Option<&str>, _referrer: &LoadReferrer) -> BoxFuture<'static, Result<String, LoaderError>> {
//!         ready(Ok(source.to_string())).boxed()
//!     }
//!     fn options(&self) -> &LoaderOptions {
//!         &self.options
//!     }
//!     fn source_map_info(&self, _normalized_name: &str, _goal: Goal) -> Option<SourceMapInfo> {
//!         None
//!     }
//! }
//!
//! let registry: Arc<ModuleStore<String>> = Arc::new(ModuleStore::new());
//! let loader = Loader::new(HookSet::new("/"), registry, |_hooks, _registry| {
//!     Ok(EchoEngine { options: LoaderOptions::default() })
//! }).expect("loader failed");
//!
//! let res = block_on(loader.import("a.js", &LoadReferrer::default()));
//! assert_eq!(res, Ok("module a.js".to_string()));
//! ```

use crate::eventloop::{panic_message, EventLoop};
use crate::loader::engine::{Goal, LoadReferrer, LoaderEngine, LoaderOptions, SourceMapInfo};
use crate::loader::errors::{LoaderError, LoaderErrorKind};
use crate::loader::hooks::{HookSet, LoaderHooks};
use crate::loader::semver::AliasMap;
use crate::registry::{ModuleFactory, ModuleRegistry};
use crate::resolvable_future::ResolvableFuture;
use futures::future::try_join_all;
use futures::task::{Context, Poll};
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;

pub mod engine;
pub mod errors;
pub mod hooks;
pub mod semver;

/// the versioned name of this crate, e.g. hirofa_loader@0.1.0
pub const VERSION: &str = concat!(env!("CARGO_PKG_NAME"), "@", env!("CARGO_PKG_VERSION"));

/// the pending result of an asynchronous Loader operation
/// it always settles, a task which ends without producing a result rejects with an Evaluate error
pub struct Promise<T> {
    inner: ResolvableFuture<Result<T, LoaderError>>,
}

impl<T> From<ResolvableFuture<Result<T, LoaderError>>> for Promise<T> {
    fn from(inner: ResolvableFuture<Result<T, LoaderError>>) -> Self {
        Self { inner }
    }
}

impl<T> Future for Promise<T> {
    type Output = Result<T, LoaderError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.inner.poll_resolution(cx) {
            Poll::Ready(Some(res)) => Poll::Ready(res),
            Poll::Ready(None) => Poll::Ready(Err(LoaderError::new_str(
                LoaderErrorKind::Evaluate,
                "the task ended without a result",
            ))),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// the Loader runs every load on its own EventLoop and hands out a [Promise] per operation
pub struct Loader<E: LoaderEngine, R: ModuleRegistry> {
    hooks: Arc<LoaderHooks>,
    registry: Arc<R>,
    engine: Arc<E>,
    event_loop: EventLoop,
}

impl<E: LoaderEngine, R: ModuleRegistry> Loader<E, R> {
    /// create a new Loader
    /// the hooks are resolved once (a synchronous translate hook becomes an asynchronous one) and
    /// passed to build_engine together with the registry
    pub fn new<B>(hooks: HookSet, registry: Arc<R>, build_engine: B) -> Result<Self, LoaderError>
    where
        B: FnOnce(Arc<LoaderHooks>, Arc<R>) -> Result<E, LoaderError>,
    {
        let hooks = Arc::new(hooks.resolve_hooks());
        let engine = build_engine(hooks.clone(), registry.clone())?;
        log::debug!("Loader::new base_url: {}", hooks.base_url());
        Ok(Self {
            hooks,
            registry,
            engine: Arc::new(engine),
            event_loop: EventLoop::new(),
        })
    }

    /// import a module, resolves with the module namespace
    pub fn import(&self, name: &str, referrer: &LoadReferrer) -> Promise<E::Value> {
        self.load(name, referrer, Goal::Module)
    }

    /// import multiple modules concurrently
    /// resolves with all namespaces in the order of names or rejects with the first error,
    /// the other imports keep running when one fails
    pub fn import_all<S: AsRef<str>>(
        &self,
        names: &[S],
        referrer: &LoadReferrer,
    ) -> Promise<Vec<E::Value>> {
        self.load_all(names, referrer, Goal::Module)
    }

    /// load a script and run it, resolves with the value the script evaluated to
    ///
    /// this is the same as import, except that the source is parsed as a script instead of a
    /// module. The script may import modules, but only ones that are already loaded.
    pub fn load_as_script(&self, name: &str, referrer: &LoadReferrer) -> Promise<E::Value> {
        self.load(name, referrer, Goal::Script)
    }

    /// load and run multiple scripts concurrently, see import_all
    pub fn load_as_script_all<S: AsRef<str>>(
        &self,
        names: &[S],
        referrer: &LoadReferrer,
    ) -> Promise<Vec<E::Value>> {
        self.load_all(names, referrer, Goal::Script)
    }

    /// evaluate source as a script, like eval but with all hooks applied first
    pub fn script(
        &self,
        source: &str,
        name: Option<&str>,
        referrer: &LoadReferrer,
    ) -> Promise<E::Value> {
        log::trace!("Loader::script {:?}", name);
        let fut = self.engine.script(source, name, referrer);
        self.spawn(fut)
    }

    /// the aliases for the package version of a normalized name, see [semver::semver_map]
    pub fn semver_map(&self, normalized_name: &str) -> AliasMap {
        semver::semver_map(normalized_name)
    }

    /// register a module with the registry
    pub fn register(
        &self,
        normalized_name: &str,
        dependencies: Vec<String>,
        factory: ModuleFactory<R::Module>,
    ) -> Result<(), LoaderError> {
        self.registry.register(normalized_name, dependencies, factory)
    }

    /// the versioned name of this crate, see [VERSION]
    pub fn version(&self) -> &'static str {
        VERSION
    }

    /// the engine's options
    pub fn options(&self) -> &LoaderOptions {
        self.engine.options()
    }

    /// the engine's source map information for a loaded code unit, if it has any
    pub fn source_map_info(&self, normalized_name: &str, goal: Goal) -> Option<SourceMapInfo> {
        self.engine.source_map_info(normalized_name, goal)
    }

    /// the base url the hooks resolve against
    pub fn base_url(&self) -> String {
        self.hooks.base_url()
    }

    /// change the base url, the engine sees the new value for every load which starts afterwards
    pub fn set_base_url(&self, base_url: &str) {
        self.hooks.set_base_url(base_url);
    }

    fn load(&self, name: &str, referrer: &LoadReferrer, goal: Goal) -> Promise<E::Value> {
        log::trace!("Loader::load {} as {}", name, goal);
        let fut = self.engine.load(name, referrer, goal);
        self.spawn(async move { fut.await.map(|code_unit| code_unit.result) })
    }

    fn load_all<S: AsRef<str>>(
        &self,
        names: &[S],
        referrer: &LoadReferrer,
        goal: Goal,
    ) -> Promise<Vec<E::Value>> {
        if names.is_empty() {
            return ResolvableFuture::resolved(Ok(vec![])).into();
        }
        let promises: Vec<Promise<E::Value>> = names
            .iter()
            .map(|name| self.load(name.as_ref(), referrer, goal))
            .collect();
        self.spawn(try_join_all(promises))
    }

    /// run a task on the event loop, a panic in the task rejects its promise
    fn spawn<T, F>(&self, fut: F) -> Promise<T>
    where
        T: Send + 'static,
        F: Future<Output = Result<T, LoaderError>> + Send + 'static,
    {
        let guarded = AssertUnwindSafe(fut).catch_unwind().map(|res| match res {
            Ok(res) => res,
            Err(payload) => {
                let msg = panic_message(payload.as_ref());
                log::error!("Loader task panicked: {}", msg);
                Err(LoaderError::new(
                    LoaderErrorKind::Evaluate,
                    format!("panicked: {}", msg),
                ))
            }
        });
        self.event_loop.add_future(guarded).into()
    }
}
