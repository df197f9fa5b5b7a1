//! The module registry holds registered module records and evaluates them on demand.
//!
//! A [Loader](crate::loader::Loader) only delegates registration to a [ModuleRegistry], engines use
//! a registry to look up and evaluate what was registered.

use crate::loader::errors::{LoaderError, LoaderErrorKind};
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::thread::ThreadId;

/// a module factory gets the evaluated dependencies (in the order they were declared) and produces the module
pub type ModuleFactory<M> = Arc<dyn Fn(&[M]) -> Result<M, LoaderError> + Send + Sync>;

pub trait ModuleRegistry: Send + Sync + 'static {
    type Module: Send + 'static;

    /// register a module, its dependencies are not checked until the module is evaluated
    fn register(
        &self,
        normalized_name: &str,
        dependencies: Vec<String>,
        factory: ModuleFactory<Self::Module>,
    ) -> Result<(), LoaderError>;
}

enum ModuleState<M> {
    Registered(ModuleFactory<M>),
    /// being evaluated by the given thread
    Evaluating(ThreadId),
    Evaluated(M),
}

struct ModuleRecord<M> {
    dependencies: Vec<String>,
    state: ModuleState<M>,
}

struct StoreState<M> {
    records: HashMap<String, ModuleRecord<M>>,
    /// the module each blocked evaluating thread waits for
    waiting: HashMap<ThreadId, String>,
}

impl<M> StoreState<M> {
    /// follow the chain of owners and the modules they wait for, a cycle exists when it leads back
    /// to the current thread
    fn leads_to(&self, normalized_name: &str, current: ThreadId) -> bool {
        let mut name = normalized_name;
        // every step visits another waiting thread, so the chain is at most that long
        for _ in 0..=self.waiting.len() {
            let owner = match self.records.get(name).map(|record| &record.state) {
                Some(ModuleState::Evaluating(owner)) => *owner,
                _ => return false,
            };
            if owner == current {
                return true;
            }
            match self.waiting.get(&owner) {
                Some(next) => name = next.as_str(),
                None => return false,
            }
        }
        false
    }
}

fn circular(normalized_name: &str) -> LoaderError {
    LoaderError::new(
        LoaderErrorKind::Link,
        format!("circular dependency on module {}", normalized_name),
    )
}

/// a ModuleRegistry which evaluates modules lazily and keeps their values
///
/// a module is evaluated once, a thread which asks for a module another thread is evaluating
/// waits for that result
/// #Example
/// ```rust
/// use hirofa_loader::registry::{ModuleRegistry, ModuleStore};
/// use std::sync::Arc;
/// let store: ModuleStore<i32> = ModuleStore::new();
/// store.register("a", vec![], Arc::new(|_deps: &[i32]| Ok(1))).expect("register failed");
/// store.register("b", vec!["a".to_string()], Arc::new(|deps: &[i32]| Ok(deps[0] + 1))).expect("register failed");
/// assert_eq!(store.evaluate("b").expect("eval failed"), 2);
/// ```
pub struct ModuleStore<M> {
    state: Mutex<StoreState<M>>,
    evaluated: Condvar,
}

impl<M: Clone + Send + 'static> ModuleStore<M> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StoreState {
                records: HashMap::new(),
                waiting: HashMap::new(),
            }),
            evaluated: Condvar::new(),
        }
    }

    pub fn is_registered(&self, normalized_name: &str) -> bool {
        self.state.lock().records.contains_key(normalized_name)
    }

    pub fn registered_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.lock().records.keys().cloned().collect();
        names.sort();
        names
    }

    /// get the value of a module, evaluating it and its dependencies first when needed
    /// evaluation fails when a dependency was never registered or depends on itself
    pub fn evaluate(&self, normalized_name: &str) -> Result<M, LoaderError> {
        let current = std::thread::current().id();
        let (dependencies, factory) = {
            let mut state = self.state.lock();
            loop {
                let record = state.records.get_mut(normalized_name).ok_or_else(|| {
                    LoaderError::new(
                        LoaderErrorKind::Link,
                        format!("module {} is not registered", normalized_name),
                    )
                })?;
                match &record.state {
                    ModuleState::Evaluated(module) => return Ok(module.clone()),
                    ModuleState::Registered(factory) => {
                        let factory = factory.clone();
                        record.state = ModuleState::Evaluating(current);
                        break (record.dependencies.clone(), factory);
                    }
                    ModuleState::Evaluating(_) => {}
                }
                if state.leads_to(normalized_name, current) {
                    return Err(circular(normalized_name));
                }
                log::trace!("ModuleStore::evaluate {} waits", normalized_name);
                state.waiting.insert(current, normalized_name.to_string());
                self.evaluated.wait(&mut state);
                state.waiting.remove(&current);
            }
        };

        log::trace!("ModuleStore::evaluate {}", normalized_name);

        // the lock is not held while evaluating so factories may use this store
        let evaluation = std::panic::catch_unwind(AssertUnwindSafe(|| {
            dependencies
                .iter()
                .map(|dependency| self.evaluate(dependency))
                .collect::<Result<Vec<M>, LoaderError>>()
                .and_then(|values| factory(values.as_slice()))
        }));
        match evaluation {
            Ok(res) => {
                self.settle(normalized_name, factory, res.as_ref().ok().cloned());
                res
            }
            Err(payload) => {
                // release the waiting threads before unwinding
                self.settle(normalized_name, factory, None);
                std::panic::resume_unwind(payload)
            }
        }
    }

    fn settle(&self, normalized_name: &str, factory: ModuleFactory<M>, module: Option<M>) {
        {
            let mut state = self.state.lock();
            if let Some(record) = state.records.get_mut(normalized_name) {
                record.state = match module {
                    Some(module) => ModuleState::Evaluated(module),
                    // a failed evaluation may be retried, e.g. after a missing dependency was registered
                    None => ModuleState::Registered(factory),
                };
            }
        }
        self.evaluated.notify_all();
    }
}

impl<M: Clone + Send + 'static> Default for ModuleStore<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Clone + Send + 'static> ModuleRegistry for ModuleStore<M> {
    type Module = M;

    fn register(
        &self,
        normalized_name: &str,
        dependencies: Vec<String>,
        factory: ModuleFactory<M>,
    ) -> Result<(), LoaderError> {
        let mut state = self.state.lock();
        let records = &mut state.records;
        if records.contains_key(normalized_name) {
            return Err(LoaderError::new(
                LoaderErrorKind::Registration,
                format!("module {} is already registered", normalized_name),
            ));
        }
        log::debug!(
            "ModuleStore::register {} deps: {:?}",
            normalized_name,
            dependencies
        );
        records.insert(
            normalized_name.to_string(),
            ModuleRecord {
                dependencies,
                state: ModuleState::Registered(factory),
            },
        );
        Ok(())
    }
}
