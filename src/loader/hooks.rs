//! Hooks let the embedder customize how specifiers are normalized and resolved and how source is
//! fetched, translated and instantiated.
//!
//! A [HookSet] is what the embedder builds, a [LoaderHooks] is what the engine gets: the same hooks
//! with the translate hook resolved to its asynchronous shape.

use crate::loader::engine::Goal;
use crate::loader::errors::LoaderError;
use futures::future::{ready, BoxFuture};
use futures::FutureExt;
use parking_lot::RwLock;
use std::sync::Arc;

/// the state of a single code unit as it passes through the hooks
#[derive(Clone, Debug, PartialEq)]
pub struct Load {
    pub normalized_name: String,
    pub goal: Goal,
    pub address: Option<String>,
    pub source: Option<String>,
}

impl Load {
    pub fn new(normalized_name: &str, goal: Goal) -> Self {
        Self {
            normalized_name: normalized_name.to_string(),
            goal,
            address: None,
            source: None,
        }
    }
}

/// returned by an instantiate hook which handles a Load itself
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Instantiation {
    /// unnormalized dependency specifiers
    pub dependencies: Vec<String>,
}

/// normalize(name, referrer_name, referrer_address)
pub type NormalizeHook =
    Arc<dyn Fn(&str, Option<&str>, Option<&str>) -> Result<String, LoaderError> + Send + Sync>;
/// produce the address for a Load
pub type ResolveHook = Arc<dyn Fn(&Load) -> Result<String, LoaderError> + Send + Sync>;
pub type FetchHook =
    Arc<dyn Fn(&Load) -> BoxFuture<'static, Result<String, LoaderError>> + Send + Sync>;
pub type AsyncTranslateHook =
    Arc<dyn Fn(&Load) -> BoxFuture<'static, Result<String, LoaderError>> + Send + Sync>;
pub type SyncTranslateHook = Arc<dyn Fn(&Load) -> Result<String, LoaderError> + Send + Sync>;
/// return None to let the engine instantiate the Load itself
pub type InstantiateHook =
    Arc<dyn Fn(&Load) -> Result<Option<Instantiation>, LoaderError> + Send + Sync>;

/// the two styles a translate hook can be written in
#[derive(Clone)]
pub enum TranslateHook {
    Async(AsyncTranslateHook),
    Synchronous(SyncTranslateHook),
}

impl TranslateHook {
    /// the asynchronous shape of this hook, a synchronous hook resolves immediately with its own result
    pub fn into_async(self) -> AsyncTranslateHook {
        match self {
            TranslateHook::Async(hook) => hook,
            TranslateHook::Synchronous(hook) => Arc::new(move |load: &Load| {
                let res = hook(load);
                ready(res).boxed()
            }),
        }
    }
}

/// the hooks as supplied by the embedder
/// #Example
/// ```rust
/// use hirofa_loader::loader::hooks::HookSet;
/// let hooks = HookSet::new("file:///app/")
///     .translate_synchronous(|load| Ok(load.source.clone().unwrap_or_default()));
/// assert!(hooks.has_translate());
/// ```
#[derive(Clone, Default)]
pub struct HookSet {
    base_url: String,
    normalize: Option<NormalizeHook>,
    resolve: Option<ResolveHook>,
    fetch: Option<FetchHook>,
    translate: Option<TranslateHook>,
    instantiate: Option<InstantiateHook>,
}

impl HookSet {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            ..Default::default()
        }
    }
    pub fn normalize<H>(mut self, hook: H) -> Self
    where
        H: Fn(&str, Option<&str>, Option<&str>) -> Result<String, LoaderError>
            + Send
            + Sync
            + 'static,
    {
        self.normalize = Some(Arc::new(hook));
        self
    }
    pub fn resolve<H>(mut self, hook: H) -> Self
    where
        H: Fn(&Load) -> Result<String, LoaderError> + Send + Sync + 'static,
    {
        self.resolve = Some(Arc::new(hook));
        self
    }
    pub fn fetch<H>(mut self, hook: H) -> Self
    where
        H: Fn(&Load) -> BoxFuture<'static, Result<String, LoaderError>> + Send + Sync + 'static,
    {
        self.fetch = Some(Arc::new(hook));
        self
    }
    /// set an asynchronous translate hook, replaces a synchronous one
    pub fn translate<H>(mut self, hook: H) -> Self
    where
        H: Fn(&Load) -> BoxFuture<'static, Result<String, LoaderError>> + Send + Sync + 'static,
    {
        self.translate = Some(TranslateHook::Async(Arc::new(hook)));
        self
    }
    /// set a synchronous translate hook, replaces an asynchronous one
    pub fn translate_synchronous<H>(mut self, hook: H) -> Self
    where
        H: Fn(&Load) -> Result<String, LoaderError> + Send + Sync + 'static,
    {
        self.translate = Some(TranslateHook::Synchronous(Arc::new(hook)));
        self
    }
    pub fn instantiate<H>(mut self, hook: H) -> Self
    where
        H: Fn(&Load) -> Result<Option<Instantiation>, LoaderError> + Send + Sync + 'static,
    {
        self.instantiate = Some(Arc::new(hook));
        self
    }
    pub fn has_translate(&self) -> bool {
        self.translate.is_some()
    }
    pub fn get_base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// resolve the hook styles into the shape the engine uses
    pub fn resolve_hooks(self) -> LoaderHooks {
        let translate = match self.translate {
            Some(hook) => hook.into_async(),
            None => {
                let pass_through: AsyncTranslateHook = Arc::new(|load: &Load| {
                    let source = load.source.clone().unwrap_or_default();
                    ready(Ok::<String, LoaderError>(source)).boxed()
                });
                pass_through
            }
        };
        LoaderHooks {
            base_url: RwLock::new(self.base_url),
            normalize: self.normalize,
            resolve: self.resolve,
            fetch: self.fetch,
            translate,
            instantiate: self.instantiate,
        }
    }
}

/// the resolved hooks, shared between a Loader and its engine
/// only the base url may change after construction
pub struct LoaderHooks {
    base_url: RwLock<String>,
    normalize: Option<NormalizeHook>,
    resolve: Option<ResolveHook>,
    fetch: Option<FetchHook>,
    translate: AsyncTranslateHook,
    instantiate: Option<InstantiateHook>,
}

impl LoaderHooks {
    pub fn base_url(&self) -> String {
        self.base_url.read().clone()
    }
    pub fn set_base_url(&self, base_url: &str) {
        log::debug!("LoaderHooks::set_base_url {}", base_url);
        *self.base_url.write() = base_url.to_string();
    }

    /// run the normalize hook, without one the name is already normalized
    pub fn normalize(
        &self,
        name: &str,
        referrer_name: Option<&str>,
        referrer_address: Option<&str>,
    ) -> Result<String, LoaderError> {
        match &self.normalize {
            Some(hook) => hook(name, referrer_name, referrer_address),
            None => Ok(name.to_string()),
        }
    }

    pub fn translate(&self, load: &Load) -> BoxFuture<'static, Result<String, LoaderError>> {
        (self.translate)(load)
    }

    pub fn resolve_hook(&self) -> Option<&ResolveHook> {
        self.resolve.as_ref()
    }
    pub fn fetch_hook(&self) -> Option<&FetchHook> {
        self.fetch.as_ref()
    }
    pub fn instantiate_hook(&self) -> Option<&InstantiateHook> {
        self.instantiate.as_ref()
    }
}

#[cfg(test)]
pub mod tests {
    use crate::loader::engine::Goal;
    use crate::loader::errors::{LoaderError, LoaderErrorKind};
    use crate::loader::hooks::{HookSet, Load};
    use futures::executor::block_on;
    use futures::future::ready;

    fn load_with_source(source: &str) -> Load {
        let mut load = Load::new("pkg@1.0.0/a.js", Goal::Module);
        load.source = Some(source.to_string());
        load
    }

    #[test]
    fn test_translate_synchronous_is_wrapped() {
        let hooks = HookSet::new("/")
            .translate_synchronous(|load| {
                Ok(format!("// translated\n{}", load.source.as_deref().unwrap_or("")))
            })
            .resolve_hooks();
        let res = block_on(hooks.translate(&load_with_source("let a = 1;")));
        assert_eq!(res, Ok("// translated\nlet a = 1;".to_string()));
    }

    #[test]
    fn test_translate_synchronous_error_passes_through() {
        let hooks = HookSet::new("/")
            .translate_synchronous(|_load| {
                Err(LoaderError::new_str(LoaderErrorKind::Translate, "bad source"))
            })
            .resolve_hooks();
        let err = block_on(hooks.translate(&load_with_source("???"))).expect_err("should fail");
        assert_eq!(err.get_kind(), LoaderErrorKind::Translate);
    }

    #[test]
    fn test_last_translate_style_wins() {
        let hooks = HookSet::new("/")
            .translate_synchronous(|_load| Ok("sync".to_string()))
            .translate(|_load| Box::pin(ready(Ok("async".to_string()))))
            .resolve_hooks();
        assert_eq!(
            block_on(hooks.translate(&load_with_source(""))),
            Ok("async".to_string())
        );
    }

    #[test]
    fn test_default_translate_passes_source() {
        let hooks = HookSet::new("/").resolve_hooks();
        assert_eq!(
            block_on(hooks.translate(&load_with_source("x"))),
            Ok("x".to_string())
        );
    }

    #[test]
    fn test_normalize() {
        let hooks = HookSet::new("/")
            .normalize(|name, referrer, _address| {
                Ok(format!("{}/{}", referrer.unwrap_or("root"), name))
            })
            .resolve_hooks();
        assert_eq!(hooks.normalize("b.js", Some("a"), None), Ok("a/b.js".to_string()));

        let hooks = HookSet::new("/").resolve_hooks();
        assert_eq!(hooks.normalize("b.js", Some("a"), None), Ok("b.js".to_string()));
    }

    #[test]
    fn test_base_url() {
        let hook_set = HookSet::new("file:///a/");
        assert_eq!(hook_set.get_base_url(), "file:///a/");
        let hooks = hook_set.resolve_hooks();
        assert_eq!(hooks.base_url(), "file:///a/");
        hooks.set_base_url("file:///b/");
        assert_eq!(hooks.base_url(), "file:///b/");
    }
}
