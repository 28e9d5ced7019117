//! Section entries and super-method wrapping
//!
//! A "section" is a named bundle of functions attached to an instance. The
//! `methods` section lands directly on the instance; every other configured
//! section lands under its own name. Entries form a small discriminated type:
//! a leaf function, a group of named entries, or an ordered sequence used for
//! middleware-style chains.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::{BoxError, ComposeError};
use crate::instance::Instance;

/// Result of invoking a composed method.
pub type MethodResult = std::result::Result<Value, BoxError>;

/// A composed function attached to an instance.
pub type MethodFn = Arc<dyn Fn(&Instance, &[Value]) -> MethodResult + Send + Sync>;

/// An extension function: receives the previous value at its key as
/// `super_method` and may call through to it any number of times.
pub type ExtendFn = Arc<dyn Fn(&Instance, MethodFn, &[Value]) -> MethodResult + Send + Sync>;

/// An insertion-ordered map of section entries.
pub type SectionMap = IndexMap<String, SectionEntry>;

/// An insertion-ordered map of section extensions.
pub type ExtensionMap = IndexMap<String, SectionExtension>;

/// One value inside a section.
#[derive(Clone)]
pub enum SectionEntry {
    /// A callable leaf
    Fn(MethodFn),
    /// Named entries grouped under one key (e.g. handlers under an event type)
    Group(SectionMap),
    /// An ordered sequence of entries (middleware-style chain)
    Seq(Vec<SectionEntry>),
}

impl SectionEntry {
    /// Wrap a closure as a callable leaf entry.
    pub fn func<F>(f: F) -> Self
    where
        F: Fn(&Instance, &[Value]) -> MethodResult + Send + Sync + 'static,
    {
        Self::Fn(Arc::new(f))
    }

    /// Build a group entry from named sub-entries.
    pub fn group(entries: SectionMap) -> Self {
        Self::Group(entries)
    }

    /// Build a sequence entry.
    pub fn seq(entries: Vec<SectionEntry>) -> Self {
        Self::Seq(entries)
    }
}

impl std::fmt::Debug for SectionEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fn(_) => f.write_str("Fn"),
            Self::Group(entries) => f.debug_map().entries(entries.iter()).finish(),
            Self::Seq(entries) => f.debug_list().entries(entries.iter()).finish(),
        }
    }
}

/// One value inside an `extend_*` provider's result: either a wrapping
/// function or a nested group that recurses the wrap-or-create logic.
///
/// When an extension wraps a key with no previous value, the `super_method`
/// handed to it returns `Value::Null`.
#[derive(Clone)]
pub enum SectionExtension {
    /// Wrap the previous function at this key
    Fn(ExtendFn),
    /// Recurse into a group at this key
    Group(ExtensionMap),
}

impl SectionExtension {
    /// Wrap a closure as a wrapping extension.
    pub fn func<F>(f: F) -> Self
    where
        F: Fn(&Instance, MethodFn, &[Value]) -> MethodResult + Send + Sync + 'static,
    {
        Self::Fn(Arc::new(f))
    }

    /// Build a nested group extension.
    pub fn group(entries: ExtensionMap) -> Self {
        Self::Group(entries)
    }
}

/// Compose a previous function with an extension.
///
/// The returned function invokes `extension` with `previous` as its
/// `super_method` argument, enabling open-ended override chains of arbitrary
/// depth without language-level inheritance.
pub fn wrap(previous: MethodFn, extension: ExtendFn) -> MethodFn {
    Arc::new(move |instance, args| extension(instance, previous.clone(), args))
}

/// The `super_method` used when an extension wraps a key with no previous
/// value.
fn missing_super() -> MethodFn {
    Arc::new(|_, _| Ok(Value::Null))
}

/// Merge a provider's entries onto the running section map.
///
/// Groups merge recursively; leaves (functions and sequences) replace.
pub(crate) fn merge_entries(target: &mut SectionMap, incoming: SectionMap) {
    for (key, entry) in incoming {
        match entry {
            SectionEntry::Group(group) => {
                if let Some(SectionEntry::Group(existing)) = target.get_mut(&key) {
                    merge_entries(existing, group);
                } else {
                    target.insert(key, SectionEntry::Group(group));
                }
            }
            leaf => {
                target.insert(key, leaf);
            }
        }
    }
}

/// Apply an extender's wrap-or-create logic onto the running section map.
pub(crate) fn extend_entries(
    target: &mut SectionMap,
    extensions: ExtensionMap,
    section: &str,
) -> Result<(), ComposeError> {
    for (key, extension) in extensions {
        match extension {
            SectionExtension::Fn(ext) => match target.get_mut(&key) {
                Some(SectionEntry::Fn(previous)) => {
                    let wrapped = wrap(previous.clone(), ext);
                    *previous = wrapped;
                }
                Some(SectionEntry::Seq(seq)) => {
                    // Only the terminal element of a sequence is wrapped;
                    // earlier elements stay untouched.
                    let Some(last) = seq.last_mut() else {
                        return Err(ComposeError::section_shape(section, &key));
                    };
                    let previous = match last {
                        SectionEntry::Fn(f) => f.clone(),
                        _ => return Err(ComposeError::section_shape(section, &key)),
                    };
                    *last = SectionEntry::Fn(wrap(previous, ext));
                }
                Some(SectionEntry::Group(_)) => {
                    return Err(ComposeError::section_shape(section, &key));
                }
                None => {
                    target.insert(key, SectionEntry::Fn(wrap(missing_super(), ext)));
                }
            },
            SectionExtension::Group(nested) => match target.get_mut(&key) {
                Some(SectionEntry::Group(existing)) => {
                    extend_entries(existing, nested, section)?;
                }
                Some(_) => return Err(ComposeError::section_shape(section, &key)),
                None => {
                    let mut created = SectionMap::new();
                    extend_entries(&mut created, nested, section)?;
                    target.insert(key, SectionEntry::Group(created));
                }
            },
        }
    }
    Ok(())
}
