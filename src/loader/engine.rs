//! The interface of the loading engine which does the actual work behind a [Loader](crate::loader::Loader)
//!
//! An engine normalizes, fetches, translates, instantiates, links and evaluates code units.
//! It is built by the Loader and receives the resolved [LoaderHooks](crate::loader::hooks::LoaderHooks)
//! and the [ModuleRegistry](crate::registry::ModuleRegistry) it should use.

use crate::loader::errors::{LoaderError, LoaderErrorKind};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{Display, Formatter};

/// the parse target of a unit of source
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Goal {
    Module,
    Script,
}

impl Display for Goal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Goal::Module => f.write_str("module"),
            Goal::Script => f.write_str("script"),
        }
    }
}

/// who is requesting a load, passed to the engine untouched
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadReferrer {
    pub referrer_name: Option<String>,
    pub address: Option<String>,
}

impl LoadReferrer {
    pub fn new(referrer_name: &str, address: &str) -> Self {
        Self {
            referrer_name: Some(referrer_name.to_string()),
            address: Some(address.to_string()),
        }
    }
}

/// one fetched, translated and evaluated unit of source
/// for Goal::Module the result is the module namespace, for Goal::Script the value the script evaluated to
#[derive(Clone, Debug, PartialEq)]
pub struct CodeUnit<V> {
    pub normalized_name: String,
    pub goal: Goal,
    pub result: V,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMapInfo {
    pub normalized_name: String,
    pub url: Option<String>,
    pub source_map: Option<String>,
}

/// the engine's options, the Loader only hands out a shared reference
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoaderOptions {
    values: Map<String, Value>,
}

impl LoaderOptions {
    pub fn new(values: Map<String, Value>) -> Self {
        Self { values }
    }

    /// parse options from a json object
    pub fn from_json(json: &str) -> Result<Self, LoaderError> {
        serde_json::from_str(json).map_err(|e| {
            LoaderError::new(
                LoaderErrorKind::Configuration,
                format!("invalid loader options: {}", e),
            )
        })
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

pub trait LoaderEngine: Send + Sync + 'static {
    /// module namespaces and script results
    type Value: Send + 'static;

    /// load, link and evaluate a code unit by name
    fn load(
        &self,
        name: &str,
        referrer: &LoadReferrer,
        goal: Goal,
    ) -> BoxFuture<'static, Result<CodeUnit<Self::Value>, LoaderError>>;

    /// evaluate source text as a script, all hooks apply before evaluation
    fn script(
        &self,
        source: &str,
        name: Option<&str>,
        referrer: &LoadReferrer,
    ) -> BoxFuture<'static, Result<Self::Value, LoaderError>>;

    fn options(&self) -> &LoaderOptions;

    fn source_map_info(&self, normalized_name: &str, goal: Goal) -> Option<SourceMapInfo>;
}
