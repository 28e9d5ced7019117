//! Error types for the composition engine

use thiserror::Error;

/// Boxed error produced by user-supplied hooks and methods.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for composition operations
pub type Result<T> = std::result::Result<T, ComposeError>;

/// Composition error types
///
/// Every variant is fatal to the in-progress `define`/`create` call; nothing
/// is retried internally and a failed `create` yields no instance at all.
#[derive(Debug, Error)]
pub enum ComposeError {
    /// A referenced class name cannot be resolved locally or via the loader
    #[error("class `{name}` is not defined{}", referenced_suffix(.referenced_by))]
    NotDefined {
        /// The missing class name
        name: String,
        /// The class whose `extend` pointed at the missing name, when known
        referenced_by: Option<String>,
    },

    /// The extend chain revisits a definition
    #[error("class `{name}` has a cyclic extend chain")]
    Cycle {
        /// The root class whose chain loops
        name: String,
    },

    /// A definition carries a retired hook name
    #[error("class `{class}` uses retired hook `{hook}`; migrate to `{replacement}`")]
    LegacyApi {
        /// The offending definition
        class: String,
        /// The retired hook name
        hook: String,
        /// The hook that replaces it
        replacement: String,
    },

    /// A section extension does not match the shape of the existing entry
    #[error("section `{section}` has an invalid entry for key `{key}`")]
    SectionShape {
        /// The section being built
        section: String,
        /// The offending key
        key: String,
    },

    /// `create_sync` encountered an async init hook
    #[error("class `{class}` has an async init hook; use `create` instead of `create_sync`")]
    SyncInitViolation {
        /// The definition whose init hook is async
        class: String,
    },

    /// An init hook returned an error
    #[error("init hook of class `{class}` failed")]
    InitFailed {
        /// The definition whose init hook failed
        class: String,
        /// The underlying hook error
        #[source]
        source: BoxError,
    },

    /// A composed method returned an error
    #[error("method `{method}` of class `{class}` failed")]
    MethodFailed {
        /// The class of the instance
        class: String,
        /// The method that failed
        method: String,
        /// The underlying method error
        #[source]
        source: BoxError,
    },

    /// A method or section entry lookup failed
    #[error("class `{class}` has no callable `{method}`{}", section_suffix(.section))]
    MethodNotFound {
        /// The class of the instance
        class: String,
        /// The missing method name (or dotted path for nested sections)
        method: String,
        /// The section searched, when not `methods`
        section: Option<String>,
    },
}

impl ComposeError {
    /// Create a not-defined error
    pub fn not_defined(name: impl Into<String>, referenced_by: Option<&str>) -> Self {
        Self::NotDefined {
            name: name.into(),
            referenced_by: referenced_by.map(str::to_string),
        }
    }

    /// Create a cycle error for the given root class
    pub fn cycle(name: impl Into<String>) -> Self {
        Self::Cycle { name: name.into() }
    }

    /// Create a legacy-hook error with migration guidance
    pub fn legacy_api(
        class: impl Into<String>,
        hook: impl Into<String>,
        replacement: impl Into<String>,
    ) -> Self {
        Self::LegacyApi {
            class: class.into(),
            hook: hook.into(),
            replacement: replacement.into(),
        }
    }

    /// Create a section-shape error
    pub fn section_shape(section: impl Into<String>, key: impl Into<String>) -> Self {
        Self::SectionShape {
            section: section.into(),
            key: key.into(),
        }
    }

    /// Create a sync-init violation error
    pub fn sync_init_violation(class: impl Into<String>) -> Self {
        Self::SyncInitViolation {
            class: class.into(),
        }
    }

    /// Wrap a hook error with the class it came from
    pub fn init_failed(class: impl Into<String>, source: BoxError) -> Self {
        Self::InitFailed {
            class: class.into(),
            source,
        }
    }
}

fn referenced_suffix(referenced_by: &Option<String>) -> String {
    match referenced_by {
        Some(class) => format!(" (extended by `{class}`)"),
        None => String::new(),
    }
}

fn section_suffix(section: &Option<String>) -> String {
    match section {
        Some(section) => format!(" in section `{section}`"),
        None => String::new(),
    }
}
