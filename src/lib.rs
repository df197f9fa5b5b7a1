//! A Loader for dynamically importing modules and running scripts through a pluggable loading engine
//!
//! * [loader::Loader] is the entry point: import, import_all, load_as_script, load_as_script_all, script and semver_map
//! * [registry::ModuleStore] is a registry which evaluates registered modules on demand
//! * [eventloop::EventLoop] is the single threaded executor every Loader task runs on
//! * [resolvable_future::ResolvableFuture] is the promise-like future those tasks resolve

pub mod eventloop;
pub mod loader;
pub mod registry;
pub mod resolvable_future;
