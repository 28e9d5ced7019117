//! Extend-chain resolution
//!
//! Given a class name, walk the `extend` pointers to build the ordered list
//! of definitions from the most-derived class back to its root ancestor,
//! detecting cycles along the way.

use std::collections::HashSet;
use std::sync::Arc;

use crate::definition::{DefinitionRecord, Extend, ParentRef};
use crate::error::{ComposeError, Result};
use crate::instance::ChainLink;
use crate::registry::Registry;

/// The resolved ancestry for one `create` call.
#[derive(Debug)]
pub(crate) struct Chain {
    /// Definitions, most-derived first
    pub steps: Vec<Arc<DefinitionRecord>>,
    /// Metadata links, base-to-derived, for attaching to the instance
    pub links: Vec<ChainLink>,
}

impl Registry {
    /// Resolve the ancestor chain for `name`.
    ///
    /// String parents resolve through the registry, falling back to the
    /// loader (with a lasting registration, so repeated creates do not
    /// re-load). Direct parent pointers — the implicit-subclass case — are
    /// used as-is. A revisited ordinal means the chain loops.
    pub(crate) fn resolve_chain(&self, name: &str) -> Result<Chain> {
        let root = self
            .definition(name)
            .ok_or_else(|| ComposeError::not_defined(name, None))?;

        let mut steps = Vec::new();
        let mut visited = HashSet::new();
        let mut current = root;
        loop {
            if !visited.insert(current.meta.ordinal) {
                return Err(ComposeError::cycle(name));
            }
            let next = match &current.definition.extend {
                Extend::To(ParentRef::ByName(parent)) => match self.definition(parent) {
                    Some(record) => Some(record),
                    None => Some(self.define_with_context(
                        parent,
                        None,
                        Some(&current.meta.name),
                    )?),
                },
                Extend::To(ParentRef::ByValue(record)) => Some(record.clone()),
                // `define_with_context` resolves `Auto` before storing a
                // record, so stored records only ever carry `None` or `To`.
                Extend::None | Extend::Auto => {
                    debug_assert!(
                        matches!(current.definition.extend, Extend::None),
                        "stored records never carry Extend::Auto"
                    );
                    None
                }
            };
            steps.push(current);
            match next {
                Some(record) => current = record,
                None => break,
            }
        }

        let links = steps
            .iter()
            .rev()
            .map(|step| ChainLink {
                name: step.meta.name.clone(),
                ordinal: step.meta.ordinal,
            })
            .collect();
        Ok(Chain { steps, links })
    }
}
