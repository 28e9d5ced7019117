//! The instance-build pipeline
//!
//! Ordering is the crux of correctness here: `before_super_class` runs twice
//! (most-derived first over the raw options, then again after the base-first
//! option/fields merge), legacy hook names fail fast, and the `methods`
//! section is built before any other section so instance methods exist by the
//! time other providers run.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::trace;

use crate::definition::{DefinitionRecord, InitHook, METHODS_SECTION, RETIRED_HOOKS};
use crate::error::{ComposeError, Result};
use crate::instance::{Instance, InstanceMeta, OptionMap};
use crate::registry::Registry;
use crate::section::{self, SectionMap};

/// A built-but-uninitialized instance plus its init hooks, base-first.
pub(crate) struct Built {
    pub instance: Arc<Instance>,
    pub inits: Vec<(String, InitHook)>,
}

impl Registry {
    /// Run the build pipeline for `name`: everything up to (but not
    /// including) the init hooks.
    pub(crate) fn build_without_init(&self, name: &str) -> Result<Built> {
        let chain = self.resolve_chain(name)?;
        trace!(class = name, steps = chain.steps.len(), "resolved chain");

        let instance = Arc::new(Instance::new(InstanceMeta {
            name: name.to_string(),
            chain: chain.links,
        }));

        // Pass one: most-derived first, before any option merging, so derived
        // classes can pre-seed options their bases will merge against.
        let mut options = OptionMap::new();
        for step in &chain.steps {
            if let Some(hook) = &step.definition.before_super_class {
                hook(&instance, &mut options);
            }
        }

        // Base-first option and field merge; more-derived steps override.
        let base_first: Vec<&Arc<DefinitionRecord>> = chain.steps.iter().rev().collect();
        for step in &base_first {
            for (key, value) in &step.definition.options {
                options.insert(key.clone(), value.clone());
            }
            if let Some(fields) = &step.definition.fields {
                accumulate_fields(&mut options, fields);
            }
        }

        // Pass two: backward loop over the base-first order (derived-first
        // again), now that options and fields are final. Some hooks need to
        // react to the fully merged options, not just pre-seed them.
        for step in base_first.iter().rev() {
            if let Some(hook) = &step.definition.before_super_class {
                hook(&instance, &mut options);
            }
        }

        for step in &base_first {
            validate_no_retired_hooks(step)?;
        }

        instance.install_options(options.clone());
        trace!(class = name, "options finalized");

        self.build_methods(&instance, &options, &base_first)?;
        for section_name in &self.config.sections {
            if section_name == METHODS_SECTION {
                continue;
            }
            self.build_section(&instance, &options, &base_first, section_name)?;
        }

        let inits = base_first
            .iter()
            .filter_map(|step| {
                step.definition
                    .init
                    .clone()
                    .map(|hook| (step.meta.name.clone(), hook))
            })
            .collect();
        Ok(Built { instance, inits })
    }

    /// Build the `methods` section, installing after every step so providers
    /// of later steps (and other sections) can already call earlier methods.
    fn build_methods(
        &self,
        instance: &Arc<Instance>,
        options: &OptionMap,
        base_first: &[&Arc<DefinitionRecord>],
    ) -> Result<()> {
        let mut entries = SectionMap::new();
        for step in base_first {
            if let Some(provider) = step.definition.providers.get(METHODS_SECTION) {
                let provided = provider(instance, options);
                section::merge_entries(&mut entries, provided);
            }
            if let Some(extender) = step.definition.extenders.get(METHODS_SECTION) {
                let extensions = extender(instance, options);
                section::extend_entries(&mut entries, extensions, METHODS_SECTION)?;
            }
            instance.install_methods(entries.clone());
        }
        Ok(())
    }

    fn build_section(
        &self,
        instance: &Arc<Instance>,
        options: &OptionMap,
        base_first: &[&Arc<DefinitionRecord>],
        section_name: &str,
    ) -> Result<()> {
        let mut entries = SectionMap::new();
        let mut touched = false;
        for step in base_first {
            if let Some(provider) = step.definition.providers.get(section_name) {
                let provided = provider(instance, options);
                section::merge_entries(&mut entries, provided);
                touched = true;
            }
            if let Some(extender) = step.definition.extenders.get(section_name) {
                let extensions = extender(instance, options);
                section::extend_entries(&mut entries, extensions, section_name)?;
                touched = true;
            }
        }
        if touched {
            instance.install_section(section_name, entries);
        }
        Ok(())
    }
}

/// Accumulate a step's field adjustments into the running options under the
/// `addFields` / `removeFields` / `arrangeFields` keys.
fn accumulate_fields(options: &mut OptionMap, fields: &crate::definition::FieldSet) {
    for (name, spec) in &fields.add {
        push_named(options, "addFields", name, spec);
    }
    if !fields.remove.is_empty() {
        let removed = array_entry(options, "removeFields");
        removed.extend(fields.remove.iter().map(|name| Value::String(name.clone())));
    }
    for (name, spec) in &fields.arrange {
        push_named(options, "arrangeFields", name, spec);
    }
}

/// Append `{ "name": name, ...spec }` to the array at `key`.
fn push_named(options: &mut OptionMap, key: &str, name: &str, spec: &Value) {
    let mut entry = Map::new();
    entry.insert("name".to_string(), Value::String(name.to_string()));
    if let Some(spec) = spec.as_object() {
        for (k, v) in spec {
            entry.insert(k.clone(), v.clone());
        }
    }
    array_entry(options, key).push(Value::Object(entry));
}

fn array_entry<'a>(options: &'a mut OptionMap, key: &str) -> &'a mut Vec<Value> {
    let slot = options
        .entry(key.to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    if !slot.is_array() {
        *slot = Value::Array(Vec::new());
    }
    match slot {
        Value::Array(array) => array,
        _ => unreachable!("slot was just normalized to an array"),
    }
}

fn validate_no_retired_hooks(step: &DefinitionRecord) -> Result<()> {
    for key in step
        .definition
        .providers
        .keys()
        .chain(step.definition.extenders.keys())
    {
        if let Some((hook, replacement)) = RETIRED_HOOKS
            .iter()
            .find(|(hook, _)| *hook == key.as_str())
        {
            return Err(ComposeError::legacy_api(&step.meta.name, *hook, *replacement));
        }
    }
    Ok(())
}
