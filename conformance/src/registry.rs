//! Test registration.
//!
//! The registry is filled once at startup and read-only afterwards. Names
//! are unique; each case carries its own script and peer factory.

use std::sync::Arc;

use pdureplay_core::{Direction, Script};

use crate::CatalogCase;
use crate::error::RegistryError;
use crate::peer::PeerFactory;
use crate::testcase::TestCase;

#[derive(Debug, Default)]
pub struct Registry {
    cases: Vec<TestCase>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every case submitted to the built-in catalog, sorted by name, all
    /// driven through `factory`.
    pub fn with_catalog(factory: Arc<dyn PeerFactory>) -> Result<Self, RegistryError> {
        let mut entries: Vec<&CatalogCase> = inventory::iter::<CatalogCase>.into_iter().collect();
        entries.sort_by_key(|entry| entry.name);

        let mut registry = Self::new();
        for entry in entries {
            let script = (entry.script)().map_err(|error| RegistryError::Script {
                name: entry.name.to_string(),
                error,
            })?;
            registry.register(entry.name, script, factory.clone())?;
        }

        tracing::debug!(cases = registry.len(), "catalog registered");
        Ok(registry)
    }

    /// Register a test. `factory` is the test's entry point: it is invoked
    /// once per run to build the peer under test.
    pub fn register(
        &mut self,
        name: &str,
        script: Script,
        factory: Arc<dyn PeerFactory>,
    ) -> Result<&TestCase, RegistryError> {
        if self.get(name).is_some() {
            return Err(RegistryError::Duplicate(name.to_string()));
        }

        tracing::trace!(name, steps = script.len(), "registering test case");
        self.cases.push(TestCase::new(name, script, factory));
        Ok(&self.cases[self.cases.len() - 1])
    }

    /// Register a test from a position-alternating PDU table whose first
    /// entry travels in direction `first`.
    pub fn register_pdus<P: AsRef<[u8]>>(
        &mut self,
        name: &str,
        first: Direction,
        pdus: &[P],
        factory: Arc<dyn PeerFactory>,
    ) -> Result<&TestCase, RegistryError> {
        let script = Script::alternating(first, pdus).map_err(|error| RegistryError::Script {
            name: name.to_string(),
            error,
        })?;
        self.register(name, script, factory)
    }

    pub fn get(&self, name: &str) -> Option<&TestCase> {
        self.cases.iter().find(|case| case.name() == name)
    }

    /// All cases in registration order.
    pub fn cases(&self) -> &[TestCase] {
        &self.cases
    }

    /// Cases matching `filter`, in registration order.
    pub fn select(&self, filter: &CaseFilter) -> Vec<&TestCase> {
        self.cases
            .iter()
            .filter(|case| filter.matches(case.name()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}

/// Case selection by name. An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaseFilter {
    pub prefix: Option<String>,
    pub substring: Option<String>,
}

impl CaseFilter {
    pub fn matches(&self, name: &str) -> bool {
        if let Some(prefix) = &self.prefix
            && !name.starts_with(prefix.as_str())
        {
            return false;
        }
        if let Some(substring) = &self.substring
            && !name.contains(substring.as_str())
        {
            return false;
        }
        true
    }
}
