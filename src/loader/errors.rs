use std::fmt::{Display, Formatter};

/// the origin of a LoaderError
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LoaderErrorKind {
    /// the loader could not be constructed from the given hooks
    Configuration,
    /// normalize or resolve failed
    Resolve,
    Fetch,
    Translate,
    Instantiate,
    /// the code unit threw during evaluation
    Evaluate,
    /// a dependency could not be linked, e.g. it was never registered
    Link,
    /// the module registry refused a registration
    Registration,
}

impl LoaderErrorKind {
    pub fn name(&self) -> &'static str {
        match self {
            LoaderErrorKind::Configuration => "ConfigurationError",
            LoaderErrorKind::Resolve => "ResolveError",
            LoaderErrorKind::Fetch => "FetchError",
            LoaderErrorKind::Translate => "TranslateError",
            LoaderErrorKind::Instantiate => "InstantiateError",
            LoaderErrorKind::Evaluate => "EvaluateError",
            LoaderErrorKind::Link => "LinkError",
            LoaderErrorKind::Registration => "RegistrationError",
        }
    }
}

/// the error type for everything that can go wrong while loading
/// errors produced by an engine or registry are passed to the caller as is
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoaderError {
    kind: LoaderErrorKind,
    message: String,
}

impl LoaderError {
    pub fn new(kind: LoaderErrorKind, message: String) -> Self {
        Self { kind, message }
    }
    pub fn new_str(kind: LoaderErrorKind, message: &str) -> Self {
        Self::new(kind, message.to_string())
    }
    pub fn get_kind(&self) -> LoaderErrorKind {
        self.kind
    }
    pub fn get_name(&self) -> &str {
        self.kind.name()
    }
    pub fn get_message(&self) -> &str {
        self.message.as_str()
    }
}

impl Display for LoaderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.get_name(), self.message)
    }
}

impl std::error::Error for LoaderError {}

impl From<anyhow::Error> for LoaderError {
    fn from(err: anyhow::Error) -> Self {
        // hooks written with anyhow have no kind of their own, an existing LoaderError in the chain wins
        match err.downcast::<LoaderError>() {
            Ok(loader_error) => loader_error,
            Err(err) => LoaderError::new(LoaderErrorKind::Evaluate, format!("{:#}", err)),
        }
    }
}
