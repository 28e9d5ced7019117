//! Composed instances and chain metadata
//!
//! An [`Instance`] is the product of one `create` call: a single merged
//! options object, the composed `methods` section attached directly to the
//! instance, any additional named sections, and chain metadata enabling
//! `instance_of`-style polymorphism checks without language-level inheritance.

use std::any::Any;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;

use crate::error::ComposeError;
use crate::section::{MethodFn, SectionEntry, SectionMap};

/// An arbitrary options object, as merged across the chain.
pub type OptionMap = serde_json::Map<String, Value>;

/// One step of an instance's ancestry, base-to-derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainLink {
    /// The definition's metadata name (implicit subclasses carry a `my-` prefix)
    pub name: String,
    /// The definition's registration ordinal
    pub ordinal: u64,
}

/// Chain metadata attached to every instance.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceMeta {
    /// The class name the instance was created as
    pub name: String,
    /// Ancestry, base-to-derived
    pub chain: Vec<ChainLink>,
}

/// A fully composed instance.
///
/// Structure is fixed after construction; the engine never revisits it. The
/// options and free-form state remain mutable so init hooks and methods can
/// read and write them.
pub struct Instance {
    meta: InstanceMeta,
    options: RwLock<OptionMap>,
    state: RwLock<OptionMap>,
    methods: RwLock<SectionMap>,
    sections: RwLock<IndexMap<String, SectionMap>>,
}

impl Instance {
    pub(crate) fn new(meta: InstanceMeta) -> Self {
        Self {
            meta,
            options: RwLock::new(OptionMap::new()),
            state: RwLock::new(OptionMap::new()),
            methods: RwLock::new(SectionMap::new()),
            sections: RwLock::new(IndexMap::new()),
        }
    }

    /// Chain metadata for this instance.
    pub fn meta(&self) -> &InstanceMeta {
        &self.meta
    }

    /// The class name the instance was created as.
    pub fn class_name(&self) -> &str {
        &self.meta.name
    }

    /// True iff this instance's chain contains a step named `name`.
    pub fn is_a(&self, name: &str) -> bool {
        self.meta.chain.iter().any(|link| link.name == name)
    }

    /// Snapshot of the merged options.
    pub fn options(&self) -> OptionMap {
        self.options.read().clone()
    }

    /// One merged option by key.
    pub fn option(&self, key: &str) -> Option<Value> {
        self.options.read().get(key).cloned()
    }

    /// Read a free-form state value set by an init hook or method.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.state.read().get(key).cloned()
    }

    /// Write a free-form state value.
    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.state.write().insert(key.into(), value);
    }

    /// True if a callable method named `name` exists on the instance.
    pub fn has_method(&self, name: &str) -> bool {
        matches!(self.methods.read().get(name), Some(SectionEntry::Fn(_)))
    }

    /// Invoke a composed method.
    ///
    /// # Errors
    ///
    /// `MethodNotFound` when no callable entry exists under `name`;
    /// `MethodFailed` wrapping whatever the method itself returned.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, ComposeError> {
        let method = self.lookup_method(name)?;
        self.invoke(name, &method, args)
    }

    /// Invoke a function inside a named section, walking `path` through any
    /// nested groups (e.g. `call_section("routes", &["post", "list"], &[])`).
    pub fn call_section(
        &self,
        section: &str,
        path: &[&str],
        args: &[Value],
    ) -> Result<Value, ComposeError> {
        let dotted = path.join(".");
        let entry = self.section_entry(section, path).ok_or_else(|| {
            ComposeError::MethodNotFound {
                class: self.meta.name.clone(),
                method: dotted.clone(),
                section: Some(section.to_string()),
            }
        })?;
        match entry {
            SectionEntry::Fn(method) => self.invoke(&dotted, &method, args),
            _ => Err(ComposeError::MethodNotFound {
                class: self.meta.name.clone(),
                method: dotted,
                section: Some(section.to_string()),
            }),
        }
    }

    /// Look up one entry of a named section, walking `path` through nested
    /// groups. Useful for inspecting sequence entries directly.
    pub fn section_entry(&self, section: &str, path: &[&str]) -> Option<SectionEntry> {
        let sections = self.sections.read();
        let mut entries = sections.get(section)?;
        let (last, parents) = path.split_last()?;
        for key in parents {
            match entries.get(*key)? {
                SectionEntry::Group(group) => entries = group,
                _ => return None,
            }
        }
        entries.get(*last).cloned()
    }

    /// Names of the configured sections that received entries.
    pub fn section_names(&self) -> Vec<String> {
        self.sections.read().keys().cloned().collect()
    }

    fn lookup_method(&self, name: &str) -> Result<MethodFn, ComposeError> {
        match self.methods.read().get(name) {
            Some(SectionEntry::Fn(method)) => Ok(method.clone()),
            _ => Err(ComposeError::MethodNotFound {
                class: self.meta.name.clone(),
                method: name.to_string(),
                section: None,
            }),
        }
    }

    fn invoke(&self, name: &str, method: &MethodFn, args: &[Value]) -> Result<Value, ComposeError> {
        method(self, args).map_err(|source| ComposeError::MethodFailed {
            class: self.meta.name.clone(),
            method: name.to_string(),
            source,
        })
    }

    pub(crate) fn install_options(&self, options: OptionMap) {
        *self.options.write() = options;
    }

    pub(crate) fn merge_options(&self, overrides: OptionMap) {
        self.options.write().extend(overrides);
    }

    pub(crate) fn install_methods(&self, entries: SectionMap) {
        *self.methods.write() = entries;
    }

    pub(crate) fn install_section(&self, section: &str, entries: SectionMap) {
        self.sections.write().insert(section.to_string(), entries);
    }
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("meta", &self.meta)
            .field("options", &*self.options.read())
            .field("methods", &self.methods.read().keys().collect::<Vec<_>>())
            .field("sections", &self.sections.read().keys().collect::<Vec<_>>())
            .finish()
    }
}

/// True iff `value` is a composed instance whose chain contains `name`.
///
/// Foreign values of any type yield `false`; this never panics.
pub fn instance_of(value: &dyn Any, name: &str) -> bool {
    if let Some(instance) = value.downcast_ref::<Instance>() {
        return instance.is_a(name);
    }
    if let Some(instance) = value.downcast_ref::<Arc<Instance>>() {
        return instance.is_a(name);
    }
    false
}
