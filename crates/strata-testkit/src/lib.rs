//! Strata testing infrastructure
//!
//! Common fixtures for exercising the composition engine: an order-recording
//! log for hook-sequencing assertions, canned multi-level chains, a registry
//! factory with a `routes` section configured, and a stub definition loader.
//!
//! # Usage
//!
//! Add this to your crate's `Cargo.toml` dev-dependencies:
//! ```toml
//! [dev-dependencies]
//! strata-testkit = { path = "../strata-testkit" }
//! ```

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use strata_compose::{
    Definition, DefinitionLoader, Registry, RegistryConfig, Result,
};

/// Install a fmt subscriber honoring `RUST_LOG` for test debugging. Safe to
/// call from every test; only the first call wins.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// A shared, clonable log of labels, for asserting hook execution order.
#[derive(Clone, Default)]
pub struct OrderLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl OrderLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a label.
    pub fn push(&self, label: impl Into<String>) {
        self.entries.lock().push(label.into());
    }

    /// Snapshot the labels recorded so far.
    pub fn snapshot(&self) -> Vec<String> {
        self.entries.lock().clone()
    }
}

/// A definition whose init hook records `label` into `log`.
pub fn recording_definition(log: &OrderLog, label: &str) -> Definition {
    let log = log.clone();
    let label = label.to_string();
    Definition::builder()
        .init(move |_| {
            log.push(label.clone());
            Ok(())
        })
        .build()
}

/// Define the canned `alpha` ← `beta` ← `gamma` chain, each step recording
/// its label on init.
pub fn define_three_level_chain(registry: &Registry, log: &OrderLog) -> Result<()> {
    for (name, parent) in [("alpha", None), ("beta", Some("alpha")), ("gamma", Some("beta"))] {
        let log = log.clone();
        let label = name.to_string();
        let mut builder = Definition::builder().init(move |_| {
            log.push(label.clone());
            Ok(())
        });
        if let Some(parent) = parent {
            builder = builder.extend(parent);
        }
        registry.define(name, Some(builder.build()))?;
    }
    Ok(())
}

/// A registry configured with a `routes` section, the shape most section
/// tests want.
pub fn registry_with_routes() -> Registry {
    Registry::with_config(RegistryConfig {
        sections: vec!["routes".to_string()],
        ..RegistryConfig::default()
    })
}

/// A stub autoload collaborator backed by a static map of definitions.
#[derive(Default)]
pub struct StaticLoader {
    definitions: HashMap<String, Definition>,
}

impl StaticLoader {
    /// Create an empty loader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a definition the loader will supply for `name`.
    pub fn with_definition(mut self, name: impl Into<String>, definition: Definition) -> Self {
        self.definitions.insert(name.into(), definition);
        self
    }
}

impl DefinitionLoader for StaticLoader {
    fn load(&self, name: &str) -> Option<Definition> {
        self.definitions.get(name).cloned()
    }
}
