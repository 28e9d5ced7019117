//! Class definitions: the registered blueprints instances are composed from

use std::sync::Arc;

use futures::future::BoxFuture;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::error::BoxError;
use crate::instance::{Instance, OptionMap};
use crate::section::{ExtensionMap, SectionMap};

/// Result of an init or before-super-class hook.
pub type HookResult = std::result::Result<(), BoxError>;

/// Synchronous hook run before parent option-merging; mutates `options` only.
pub type BeforeHook = Arc<dyn Fn(&Instance, &mut OptionMap) + Send + Sync>;

/// A synchronous init hook.
pub type SyncInitFn = Arc<dyn Fn(&Instance) -> HookResult + Send + Sync>;

/// An async init hook. Takes the instance by `Arc` so the returned future is
/// `'static` and may await I/O.
pub type AsyncInitFn =
    Arc<dyn Fn(Arc<Instance>) -> BoxFuture<'static, HookResult> + Send + Sync>;

/// A section provider: returns the entries one definition contributes.
pub type SectionProvider = Arc<dyn Fn(&Instance, &OptionMap) -> SectionMap + Send + Sync>;

/// A section extender: returns wrapping extensions over entries contributed
/// by earlier steps of the chain.
pub type SectionExtender = Arc<dyn Fn(&Instance, &OptionMap) -> ExtensionMap + Send + Sync>;

/// An init hook, tagged by invocation style.
///
/// `create` runs both kinds; `create_sync` fails fast on [`InitHook::Async`].
#[derive(Clone)]
pub enum InitHook {
    /// Runs inline, no event loop required
    Sync(SyncInitFn),
    /// Returns a future that `create` awaits
    Async(AsyncInitFn),
}

/// Reference to a parent definition.
#[derive(Clone)]
pub enum ParentRef {
    /// Resolved through the registry (or the loader) at create time
    ByName(String),
    /// A direct pointer, set internally on duplicate registration
    ByValue(Arc<DefinitionRecord>),
}

/// A definition's `extend` value.
#[derive(Clone, Default)]
pub enum Extend {
    /// Absent: the registry applies implicit-subclassing and default-base rules
    #[default]
    Auto,
    /// Explicitly no parent
    None,
    /// A specific parent
    To(ParentRef),
}

/// Schema-field adjustments accumulated into the merged options under the
/// `addFields` / `removeFields` / `arrangeFields` keys.
#[derive(Clone, Default)]
pub struct FieldSet {
    /// Fields to add: name → field spec
    pub add: IndexMap<String, Value>,
    /// Field names to remove
    pub remove: Vec<String>,
    /// Arrangement groups: name → arrangement spec
    pub arrange: IndexMap<String, Value>,
}

impl FieldSet {
    fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty() && self.arrange.is_empty()
    }
}

/// A named, immutable-once-registered blueprint.
///
/// Built with [`Definition::builder`], registered with
/// [`Registry::define`](crate::Registry::define).
#[derive(Clone, Default)]
pub struct Definition {
    pub(crate) extend: Extend,
    pub(crate) extend_if_first: Option<Extend>,
    pub(crate) options: OptionMap,
    pub(crate) fields: Option<FieldSet>,
    pub(crate) before_super_class: Option<BeforeHook>,
    pub(crate) init: Option<InitHook>,
    pub(crate) providers: IndexMap<String, SectionProvider>,
    pub(crate) extenders: IndexMap<String, SectionExtender>,
}

impl Definition {
    /// Start building a definition.
    pub fn builder() -> DefinitionBuilder {
        DefinitionBuilder {
            definition: Definition::default(),
        }
    }
}

impl std::fmt::Debug for Definition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Definition")
            .field("options", &self.options)
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .field("extenders", &self.extenders.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Builder for [`Definition`].
pub struct DefinitionBuilder {
    definition: Definition,
}

impl DefinitionBuilder {
    /// Extend the named parent class.
    pub fn extend(mut self, name: impl Into<String>) -> Self {
        self.definition.extend = Extend::To(ParentRef::ByName(name.into()));
        self
    }

    /// Explicitly declare no parent (suppresses the default base class).
    pub fn extend_none(mut self) -> Self {
        self.definition.extend = Extend::None;
        self
    }

    /// Alternate parent used only if this is the first registration of the
    /// name.
    pub fn extend_if_first(mut self, name: impl Into<String>) -> Self {
        self.definition.extend_if_first = Some(Extend::To(ParentRef::ByName(name.into())));
        self
    }

    /// Static configuration merged into the instance's options. Non-object
    /// values are treated as empty.
    pub fn options(mut self, options: Value) -> Self {
        self.definition.options = options.as_object().cloned().unwrap_or_default();
        self
    }

    /// Add a schema field (accumulated into `options.addFields`).
    pub fn field_add(mut self, name: impl Into<String>, spec: Value) -> Self {
        self.fields().add.insert(name.into(), spec);
        self
    }

    /// Remove a schema field (accumulated into `options.removeFields`).
    pub fn field_remove(mut self, name: impl Into<String>) -> Self {
        self.fields().remove.push(name.into());
        self
    }

    /// Arrange schema fields (accumulated into `options.arrangeFields`).
    pub fn field_arrange(mut self, name: impl Into<String>, spec: Value) -> Self {
        self.fields().arrange.insert(name.into(), spec);
        self
    }

    /// Hook run before parent option-merging; both passes, see
    /// [`Registry::create`](crate::Registry::create) for the ordering.
    pub fn before_super_class<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Instance, &mut OptionMap) + Send + Sync + 'static,
    {
        self.definition.before_super_class = Some(Arc::new(hook));
        self
    }

    /// Synchronous init hook, run base-first after all sections are built.
    pub fn init<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Instance) -> HookResult + Send + Sync + 'static,
    {
        self.definition.init = Some(InitHook::Sync(Arc::new(hook)));
        self
    }

    /// Async init hook. Makes the class unusable with `create_sync`.
    pub fn init_async<F>(mut self, hook: F) -> Self
    where
        F: Fn(Arc<Instance>) -> BoxFuture<'static, HookResult> + Send + Sync + 'static,
    {
        self.definition.init = Some(InitHook::Async(Arc::new(hook)));
        self
    }

    /// Provider for the `methods` section (attached directly to the instance).
    pub fn methods<F>(self, provider: F) -> Self
    where
        F: Fn(&Instance, &OptionMap) -> SectionMap + Send + Sync + 'static,
    {
        self.section(METHODS_SECTION, provider)
    }

    /// Extender for the `methods` section: wrap rather than replace.
    pub fn extend_methods<F>(self, extender: F) -> Self
    where
        F: Fn(&Instance, &OptionMap) -> ExtensionMap + Send + Sync + 'static,
    {
        self.extend_section(METHODS_SECTION, extender)
    }

    /// Provider for an arbitrary named section (built only if the registry's
    /// configuration lists the section).
    pub fn section<F>(mut self, name: impl Into<String>, provider: F) -> Self
    where
        F: Fn(&Instance, &OptionMap) -> SectionMap + Send + Sync + 'static,
    {
        self.definition
            .providers
            .insert(name.into(), Arc::new(provider));
        self
    }

    /// Extender for an arbitrary named section.
    pub fn extend_section<F>(mut self, name: impl Into<String>, extender: F) -> Self
    where
        F: Fn(&Instance, &OptionMap) -> ExtensionMap + Send + Sync + 'static,
    {
        self.definition
            .extenders
            .insert(name.into(), Arc::new(extender));
        self
    }

    /// Finish building.
    pub fn build(mut self) -> Definition {
        if self.definition.fields.as_ref().is_some_and(FieldSet::is_empty) {
            self.definition.fields = None;
        }
        self.definition
    }

    fn fields(&mut self) -> &mut FieldSet {
        self.definition.fields.get_or_insert_with(FieldSet::default)
    }
}

/// The section whose entries land directly on the instance.
pub(crate) const METHODS_SECTION: &str = "methods";

/// Retired predecessor hook names and their replacements. Definitions carrying
/// a section or extender under one of these fail fast at create time with
/// migration guidance.
pub(crate) const RETIRED_HOOKS: [(&str, &str); 3] = [
    ("construct", "methods"),
    ("beforeConstruct", "beforeSuperClass"),
    ("afterConstruct", "init"),
];

/// Registry bookkeeping attached to every registered definition.
#[derive(Debug, Clone, Serialize)]
pub struct DefMeta {
    /// Metadata name; implicit subclasses carry the `my-` prefix
    pub name: String,
    /// Strictly increasing registration counter, used for cycle detection
    pub ordinal: u64,
    /// True when the definition was passed directly to `define`, false when
    /// the loader supplied it
    pub explicit: bool,
}

/// A definition as registered: the blueprint plus its metadata.
pub struct DefinitionRecord {
    pub(crate) meta: DefMeta,
    pub(crate) definition: Definition,
}

impl DefinitionRecord {
    /// Registry metadata for this record.
    pub fn meta(&self) -> &DefMeta {
        &self.meta
    }

    /// The underlying definition.
    pub fn definition(&self) -> &Definition {
        &self.definition
    }
}

impl std::fmt::Debug for DefinitionRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefinitionRecord")
            .field("meta", &self.meta)
            .field("definition", &self.definition)
            .finish()
    }
}
