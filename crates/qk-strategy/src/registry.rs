//! Catalogue of available strategies.
//!
//! [`StrategyHost`](crate::StrategyHost) runs one strategy; the registry is
//! the step before that. Each entry pairs [`StrategyMeta`] with a factory that
//! produces a fresh instance, so the CLI can list strategies and pick one by
//! name without coupling discovery to execution.

use crate::types::Strategy;

pub type StrategyFactory = Box<dyn Fn() -> Box<dyn Strategy> + Send + Sync>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StrategyMeta {
    /// Registry key. ASCII alphanumerics, `-` and `_`.
    pub name: String,
    pub version: String,
    pub description: String,
}

impl StrategyMeta {
    pub fn new(name: impl Into<String>, version: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: description.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegistryError {
    DuplicateName { name: String },
    UnknownStrategy { name: String },
    InvalidName { name: String },
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateName { name } => write!(f, "strategy '{name}' is already registered"),
            Self::UnknownStrategy { name } => write!(f, "no strategy named '{name}' is registered"),
            Self::InvalidName { name } => write!(f, "invalid strategy name '{name}'"),
        }
    }
}

impl std::error::Error for RegistryError {}

struct RegistryEntry {
    meta: StrategyMeta,
    factory: StrategyFactory,
}

/// Insertion-ordered, case-sensitive.
#[derive(Default)]
pub struct StrategyRegistry {
    entries: Vec<RegistryEntry>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, meta: StrategyMeta, factory: F) -> Result<(), RegistryError>
    where
        F: Fn() -> Box<dyn Strategy> + Send + Sync + 'static,
    {
        let valid = !meta.name.is_empty()
            && meta
                .name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(RegistryError::InvalidName { name: meta.name });
        }
        if self.contains(&meta.name) {
            return Err(RegistryError::DuplicateName { name: meta.name });
        }
        self.entries.push(RegistryEntry {
            meta,
            factory: Box::new(factory),
        });
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.meta.name == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn list(&self) -> Vec<&StrategyMeta> {
        self.entries.iter().map(|e| &e.meta).collect()
    }

    /// Fresh instance per call; state never leaks across runs.
    pub fn instantiate(&self, name: &str) -> Result<Box<dyn Strategy>, RegistryError> {
        self.entries
            .iter()
            .find(|e| e.meta.name == name)
            .map(|e| (e.factory)())
            .ok_or_else(|| RegistryError::UnknownStrategy { name: name.to_string() })
    }
}
