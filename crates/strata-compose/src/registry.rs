//! The definition registry and the `create`/`create_sync` entry points
//!
//! A [`Registry`] is an explicit owned object — one per application or test,
//! never a process-wide singleton — holding named definitions, the ordinal
//! counter used for cycle detection, and the configuration that drives
//! instance building.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

use crate::definition::{DefMeta, Definition, DefinitionRecord, Extend, InitHook, ParentRef};
use crate::error::{ComposeError, Result};
use crate::instance::{Instance, OptionMap};
use crate::naming;

/// The autoload collaborator: supplies a definition for a name not yet
/// registered. Implemented outside the engine (typically filesystem or
/// package resolution); the registry only calls it when a name cannot be
/// resolved locally.
pub trait DefinitionLoader: Send + Sync {
    /// Attempt to supply a definition for `name`.
    fn load(&self, name: &str) -> Option<Definition>;
}

/// Construction-time configuration for a [`Registry`].
#[derive(Default)]
pub struct RegistryConfig {
    /// Parent assigned to definitions that neither extend anything nor opt
    /// out, unless they *are* this class.
    pub default_base_class: Option<String>,
    /// Non-`methods` sections the instance builder processes, in order.
    pub sections: Vec<String>,
    /// Optional autoload collaborator.
    pub loader: Option<Box<dyn DefinitionLoader>>,
}

impl std::fmt::Debug for RegistryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryConfig")
            .field("default_base_class", &self.default_base_class)
            .field("sections", &self.sections)
            .field("loader", &self.loader.is_some())
            .finish()
    }
}

struct RegistryInner {
    definitions: HashMap<String, Arc<DefinitionRecord>>,
    next_ordinal: u64,
}

/// Named-definition registry and composition engine.
pub struct Registry {
    inner: RwLock<RegistryInner>,
    pub(crate) config: RegistryConfig,
}

impl Registry {
    /// Create a registry with default configuration.
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a registry with the given configuration.
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            inner: RwLock::new(RegistryInner {
                definitions: HashMap::new(),
                next_ordinal: 0,
            }),
            config,
        }
    }

    /// Register a definition under `name`, or autoload one when `definition`
    /// is `None`.
    ///
    /// Defining the same name twice is additive: the second definition
    /// becomes an implicit subclass of the first (its metadata name gains the
    /// `my-` prefix), not a replacement. Contrast with [`Registry::redefine`].
    ///
    /// # Errors
    ///
    /// `NotDefined` when `definition` is `None` and no loader can supply one.
    pub fn define(
        &self,
        name: &str,
        definition: Option<Definition>,
    ) -> Result<Arc<DefinitionRecord>> {
        self.define_with_context(name, definition, None)
    }

    /// Replace any existing definition under `name`, then define. Unlike a
    /// second `define`, this fully discards the previous definition.
    pub fn redefine(&self, name: &str, definition: Definition) -> Result<Arc<DefinitionRecord>> {
        self.inner.write().definitions.remove(name);
        self.define(name, Some(definition))
    }

    /// True if `name` is registered; with `autoload`, also probes the loader
    /// (without leaving any lasting registration).
    pub fn is_defined(&self, name: &str, autoload: bool) -> bool {
        if self.inner.read().definitions.contains_key(name) {
            return true;
        }
        autoload
            && self
                .config
                .loader
                .as_ref()
                .is_some_and(|loader| loader.load(name).is_some())
    }

    /// Look up a registered definition record.
    pub fn definition(&self, name: &str) -> Option<Arc<DefinitionRecord>> {
        self.inner.read().definitions.get(name).cloned()
    }

    /// Build and initialize an instance of `name`.
    ///
    /// Init hooks run base-first; async hooks are awaited in turn, so mixed
    /// sync/async chains behave like natural `await` semantics. The
    /// caller-supplied `options` are shallow-assigned onto the finalized
    /// options only *after* every init hook has run — init hooks never
    /// observe per-call overrides. That ordering is a preserved compatibility
    /// quirk, not a bug.
    pub async fn create(&self, name: &str, options: Value) -> Result<Arc<Instance>> {
        let built = self.build_without_init(name)?;
        for (class, hook) in &built.inits {
            match hook {
                InitHook::Sync(hook) => {
                    hook(&built.instance).map_err(|source| ComposeError::init_failed(class, source))?;
                }
                InitHook::Async(hook) => {
                    hook(Arc::clone(&built.instance))
                        .await
                        .map_err(|source| ComposeError::init_failed(class, source))?;
                }
            }
        }
        built.instance.merge_options(into_option_map(options));
        debug!(class = name, "created instance");
        Ok(built.instance)
    }

    /// Build and initialize an instance without touching the event loop.
    ///
    /// Identical to [`Registry::create`] except that an async init hook
    /// anywhere in the chain fails with `SyncInitViolation` naming the
    /// offending class. Init hooks earlier in the chain have already run at
    /// that point. Caller-supplied `options` land after init, as in `create`.
    pub fn create_sync(&self, name: &str, options: Value) -> Result<Arc<Instance>> {
        let built = self.build_without_init(name)?;
        for (class, hook) in &built.inits {
            match hook {
                InitHook::Sync(hook) => {
                    hook(&built.instance).map_err(|source| ComposeError::init_failed(class, source))?;
                }
                InitHook::Async(_) => {
                    return Err(ComposeError::sync_init_violation(class));
                }
            }
        }
        built.instance.merge_options(into_option_map(options));
        debug!(class = name, "created instance (sync)");
        Ok(built.instance)
    }

    pub(crate) fn define_with_context(
        &self,
        name: &str,
        definition: Option<Definition>,
        referenced_by: Option<&str>,
    ) -> Result<Arc<DefinitionRecord>> {
        let (mut definition, explicit) = match definition {
            Some(definition) => (definition, true),
            None => {
                let loaded = self
                    .config
                    .loader
                    .as_ref()
                    .and_then(|loader| loader.load(name));
                match loaded {
                    Some(definition) => (definition, false),
                    None => return Err(ComposeError::not_defined(name, referenced_by)),
                }
            }
        };

        let mut inner = self.inner.write();
        let ordinal = inner.next_ordinal;
        inner.next_ordinal += 1;

        let previous = inner.definitions.get(name).cloned();
        if previous.is_none() {
            if let Some(promoted) = definition.extend_if_first.take() {
                definition.extend = promoted;
            }
        }

        let mut meta_name = name.to_string();
        if matches!(definition.extend, Extend::Auto) {
            if let Some(previous) = previous.clone() {
                // Implicit subclassing: the new definition extends the
                // previous record directly and takes a distinguishable name.
                definition.extend = Extend::To(ParentRef::ByValue(previous));
                meta_name = naming::original_to_my(name);
            } else {
                definition.extend = match self.config.default_base_class.as_deref() {
                    Some(base) if base != name => {
                        Extend::To(ParentRef::ByName(base.to_string()))
                    }
                    _ => Extend::None,
                };
            }
        }

        let record = Arc::new(DefinitionRecord {
            meta: DefMeta {
                name: meta_name,
                ordinal,
                explicit,
            },
            definition,
        });
        debug!(
            class = name,
            ordinal,
            implicit = previous.is_some(),
            explicit,
            "registered definition"
        );
        inner.definitions.insert(name.to_string(), record.clone());
        Ok(record)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("Registry")
            .field("definitions", &inner.definitions.len())
            .field("next_ordinal", &inner.next_ordinal)
            .field("config", &self.config)
            .finish()
    }
}

fn into_option_map(options: Value) -> OptionMap {
    match options {
        Value::Object(map) => map,
        _ => OptionMap::new(),
    }
}
