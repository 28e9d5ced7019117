//! Class-composition engine: named definitions, extend chains, merged
//! sections, and lifecycle hooks
//!
//! This crate implements a generic object-composition protocol independent of
//! any web or storage concerns: callers register named class definitions,
//! possibly extending one another, and ask the registry to compose instances.
//!
//! # Architecture
//!
//! - **Definition registry** — stores named definitions, assigns creation
//!   ordinals, turns duplicate definitions into implicit subclasses
//! - **Chain resolver** — walks `extend` pointers most-derived-to-base,
//!   detecting cycles by ordinal
//! - **Instance builder** — runs `before_super_class` hooks, merges options
//!   and fields base-first, then builds named sections with super-method
//!   wrapping
//! - **Lifecycle runner** — runs `init` hooks base-first; [`Registry::create`]
//!   awaits async hooks, [`Registry::create_sync`] rejects them
//! - **Metadata** — every instance carries its chain, enabling
//!   [`instance_of`] checks without language-level inheritance
//!
//! # Example
//!
//! ```rust,no_run
//! use serde_json::json;
//! use strata_compose::{Definition, Registry};
//!
//! let registry = Registry::new();
//! registry.define(
//!     "base",
//!     Some(Definition::builder().options(json!({"color": "blue"})).build()),
//! )?;
//! registry.define(
//!     "sub",
//!     Some(
//!         Definition::builder()
//!             .extend("base")
//!             .options(json!({"color": "red"}))
//!             .build(),
//!     ),
//! )?;
//! let instance = registry.create_sync("sub", json!({}))?;
//! assert_eq!(instance.option("color"), Some(json!("red")));
//! # Ok::<(), strata_compose::ComposeError>(())
//! ```

mod builder;
mod chain;
mod definition;
mod error;
mod instance;
mod naming;
mod registry;
mod section;

pub use definition::{
    AsyncInitFn, BeforeHook, DefMeta, Definition, DefinitionBuilder, DefinitionRecord, Extend,
    FieldSet, HookResult, InitHook, ParentRef, SectionExtender, SectionProvider, SyncInitFn,
};
pub use error::{BoxError, ComposeError, Result};
pub use instance::{instance_of, ChainLink, Instance, InstanceMeta, OptionMap};
pub use naming::{is_my, my_to_original, original_to_my};
pub use registry::{DefinitionLoader, Registry, RegistryConfig};
pub use section::{
    wrap, ExtendFn, ExtensionMap, MethodFn, MethodResult, SectionEntry, SectionExtension,
    SectionMap,
};
