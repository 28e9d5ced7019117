//! Chain composition: ordering, implicit subclassing, option merging,
//! section building, and super-method wrapping.

#![allow(clippy::unwrap_used, clippy::expect_used, missing_docs)]

use serde_json::{json, Value};
use strata_compose::{
    Definition, ExtensionMap, Instance, OptionMap, Registry, RegistryConfig, SectionEntry,
    SectionExtension, SectionMap,
};
use strata_testkit::{
    define_three_level_chain, init_tracing, recording_definition, registry_with_routes, OrderLog,
    StaticLoader,
};

/// A before-super-class hook appending `label` to `options.order`.
fn order_hook(label: &'static str) -> impl Fn(&Instance, &mut OptionMap) {
    move |_, options| {
        let order = options
            .entry("order".to_string())
            .or_insert_with(|| json!([]));
        if let Some(order) = order.as_array_mut() {
            order.push(json!(label));
        }
    }
}

#[test]
fn init_runs_base_first_and_chain_lists_base_to_derived() -> anyhow::Result<()> {
    init_tracing();
    let registry = Registry::new();
    let log = OrderLog::new();
    define_three_level_chain(&registry, &log)?;

    let instance = registry.create_sync("gamma", json!({}))?;
    assert_eq!(log.snapshot(), vec!["alpha", "beta", "gamma"]);

    let chain_names: Vec<_> = instance
        .meta()
        .chain
        .iter()
        .map(|link| link.name.as_str())
        .collect();
    assert_eq!(chain_names, vec!["alpha", "beta", "gamma"]);
    assert_eq!(instance.meta().name, "gamma");
    Ok(())
}

#[test]
fn double_define_is_additive_redefine_is_not() -> anyhow::Result<()> {
    let registry = Registry::new();
    let log = OrderLog::new();
    registry.define("x", Some(recording_definition(&log, "def1")))?;
    registry.define("x", Some(recording_definition(&log, "def2")))?;

    registry.create_sync("x", json!({}))?;
    assert_eq!(log.snapshot(), vec!["def1", "def2"]);

    let registry = Registry::new();
    let log = OrderLog::new();
    registry.define("x", Some(recording_definition(&log, "def1")))?;
    registry.redefine("x", recording_definition(&log, "def2"))?;

    registry.create_sync("x", json!({}))?;
    assert_eq!(log.snapshot(), vec!["def2"]);
    Ok(())
}

#[test]
fn implicit_subclass_still_answers_for_the_original_name() -> anyhow::Result<()> {
    let registry = Registry::new();
    registry.define("widget", Some(Definition::default()))?;
    registry.define("widget", Some(Definition::default()))?;

    let instance = registry.create_sync("widget", json!({}))?;
    assert!(instance.is_a("widget"));
    assert!(instance.is_a("my-widget"));
    Ok(())
}

#[test]
fn derived_options_override_base_options() -> anyhow::Result<()> {
    let registry = Registry::new();
    registry.define(
        "baseClass",
        Some(Definition::builder().options(json!({"color": "blue", "size": 3})).build()),
    )?;
    registry.define(
        "subClass",
        Some(
            Definition::builder()
                .extend("baseClass")
                .options(json!({"color": "red"}))
                .build(),
        ),
    )?;

    let instance = registry.create_sync("subClass", json!({}))?;
    assert_eq!(instance.option("color"), Some(json!("red")));
    // Untouched base options survive.
    assert_eq!(instance.option("size"), Some(json!(3)));
    Ok(())
}

#[test]
fn before_super_class_runs_derived_first_in_both_passes() -> anyhow::Result<()> {
    let registry = Registry::new();
    registry.define(
        "a",
        Some(Definition::builder().before_super_class(order_hook("a")).build()),
    )?;
    registry.define(
        "b",
        Some(
            Definition::builder()
                .extend("a")
                .before_super_class(order_hook("b"))
                .build(),
        ),
    )?;
    registry.define(
        "c",
        Some(
            Definition::builder()
                .extend("b")
                .before_super_class(order_hook("c"))
                .build(),
        ),
    )?;

    let instance = registry.create_sync("c", json!({}))?;
    // The most-derived label comes first, and the hook runs twice per step:
    // once before the option merge and once after it.
    assert_eq!(
        instance.option("order"),
        Some(json!(["c", "b", "a", "c", "b", "a"]))
    );
    Ok(())
}

#[test]
fn methods_override_and_extend_across_the_chain() -> anyhow::Result<()> {
    let registry = Registry::new();
    registry.define(
        "base",
        Some(
            Definition::builder()
                .methods(|_, _| {
                    let mut methods = SectionMap::new();
                    methods.insert(
                        "overridden".to_string(),
                        SectionEntry::func(|_, _| Ok(json!(false))),
                    );
                    methods.insert(
                        "extended".to_string(),
                        SectionEntry::func(|_, args| {
                            let times = args.first().and_then(Value::as_i64).unwrap_or(0);
                            Ok(json!(times * 2))
                        }),
                    );
                    methods
                })
                .build(),
        ),
    )?;
    registry.define(
        "derived",
        Some(
            Definition::builder()
                .extend("base")
                .methods(|_, _| {
                    let mut methods = SectionMap::new();
                    methods.insert(
                        "overridden".to_string(),
                        SectionEntry::func(|_, _| Ok(json!(true))),
                    );
                    methods
                })
                .extend_methods(|_, _| {
                    let mut extensions = ExtensionMap::new();
                    extensions.insert(
                        "extended".to_string(),
                        SectionExtension::func(|instance, super_method, args| {
                            let inner = super_method(instance, args)?;
                            Ok(json!(inner.as_i64().unwrap_or(0) * 2))
                        }),
                    );
                    extensions
                })
                .build(),
        ),
    )?;

    let instance = registry.create_sync("derived", json!({}))?;
    assert_eq!(instance.call("overridden", &[])?, json!(true));
    assert_eq!(instance.call("extended", &[json!(5)])?, json!(20));
    Ok(())
}

#[test]
fn nested_route_groups_wrap_through_super() -> anyhow::Result<()> {
    let registry = registry_with_routes();
    registry.define(
        "classOne",
        Some(
            Definition::builder()
                .section("routes", |_, _| {
                    let mut post = SectionMap::new();
                    post.insert(
                        "insert".to_string(),
                        SectionEntry::func(|_, _| Ok(json!("inserted"))),
                    );
                    post.insert(
                        "list".to_string(),
                        SectionEntry::func(|_, _| Ok(json!("listed"))),
                    );
                    let mut routes = SectionMap::new();
                    routes.insert("post".to_string(), SectionEntry::group(post));
                    routes
                })
                .build(),
        ),
    )?;
    registry.define(
        "classTwo",
        Some(
            Definition::builder()
                .extend("classOne")
                .extend_section("routes", |_, _| {
                    let mut post = ExtensionMap::new();
                    post.insert(
                        "list".to_string(),
                        SectionExtension::func(|instance, super_method, args| {
                            let inner = super_method(instance, args)?;
                            Ok(json!(format!("{}-suffix", inner.as_str().unwrap_or(""))))
                        }),
                    );
                    let mut routes = ExtensionMap::new();
                    routes.insert("post".to_string(), SectionExtension::group(post));
                    routes
                })
                .build(),
        ),
    )?;

    let instance = registry.create_sync("classTwo", json!({}))?;
    assert_eq!(
        instance.call_section("routes", &["post", "list"], &[])?,
        json!("listed-suffix")
    );
    assert_eq!(
        instance.call_section("routes", &["post", "insert"], &[])?,
        json!("inserted")
    );
    Ok(())
}

#[test]
fn sequence_sections_wrap_only_the_terminal_handler() -> anyhow::Result<()> {
    let registry = registry_with_routes();
    registry.define(
        "pipelineBase",
        Some(
            Definition::builder()
                .section("routes", |_, _| {
                    let mut routes = SectionMap::new();
                    routes.insert(
                        "middleware".to_string(),
                        SectionEntry::seq(vec![
                            SectionEntry::func(|_, _| Ok(json!("auth"))),
                            SectionEntry::func(|_, _| Ok(json!("handle"))),
                        ]),
                    );
                    routes
                })
                .build(),
        ),
    )?;
    registry.define(
        "pipelineSub",
        Some(
            Definition::builder()
                .extend("pipelineBase")
                .extend_section("routes", |_, _| {
                    let mut extensions = ExtensionMap::new();
                    extensions.insert(
                        "middleware".to_string(),
                        SectionExtension::func(|instance, super_method, args| {
                            let inner = super_method(instance, args)?;
                            Ok(json!(format!("{}+filter", inner.as_str().unwrap_or(""))))
                        }),
                    );
                    extensions
                })
                .build(),
        ),
    )?;

    let instance = registry.create_sync("pipelineSub", json!({}))?;
    let Some(SectionEntry::Seq(seq)) = instance.section_entry("routes", &["middleware"]) else {
        panic!("middleware sequence missing");
    };
    assert_eq!(seq.len(), 2);
    let call = |entry: &SectionEntry| match entry {
        SectionEntry::Fn(f) => f(&instance, &[]).expect("call failed"),
        other => panic!("expected Fn, got {other:?}"),
    };
    // Earlier elements stay untouched; only the terminal handler is wrapped.
    assert_eq!(call(&seq[0]), json!("auth"));
    assert_eq!(call(&seq[1]), json!("handle+filter"));
    Ok(())
}

#[test]
fn default_base_class_contributes_to_composed_instances() -> anyhow::Result<()> {
    let registry = Registry::with_config(RegistryConfig {
        default_base_class: Some("module".to_string()),
        ..RegistryConfig::default()
    });
    registry.define(
        "module",
        Some(Definition::builder().options(json!({"enabled": true})).build()),
    )?;
    registry.define(
        "widget",
        Some(Definition::builder().options(json!({"label": "w"})).build()),
    )?;

    let instance = registry.create_sync("widget", json!({}))?;
    assert!(instance.is_a("module"));
    assert_eq!(instance.option("enabled"), Some(json!(true)));
    assert_eq!(instance.option("label"), Some(json!("w")));
    Ok(())
}

#[test]
fn field_adjustments_accumulate_base_first() -> anyhow::Result<()> {
    let registry = Registry::new();
    registry.define(
        "piece",
        Some(
            Definition::builder()
                .field_add("title", json!({"type": "string"}))
                .build(),
        ),
    )?;
    registry.define(
        "article",
        Some(
            Definition::builder()
                .extend("piece")
                .field_add("body", json!({"type": "string"}))
                .field_remove("title")
                .field_arrange("basics", json!({"fields": ["body"]}))
                .build(),
        ),
    )?;

    let instance = registry.create_sync("article", json!({}))?;
    assert_eq!(
        instance.option("addFields"),
        Some(json!([
            {"name": "title", "type": "string"},
            {"name": "body", "type": "string"},
        ]))
    );
    assert_eq!(instance.option("removeFields"), Some(json!(["title"])));
    assert_eq!(
        instance.option("arrangeFields"),
        Some(json!([{"name": "basics", "fields": ["body"]}]))
    );
    Ok(())
}

#[test]
fn missing_parents_are_pulled_from_the_loader() -> anyhow::Result<()> {
    let loader = StaticLoader::new().with_definition(
        "storedBase",
        Definition::builder().options(json!({"loaded": true})).build(),
    );
    let registry = Registry::with_config(RegistryConfig {
        loader: Some(Box::new(loader)),
        ..RegistryConfig::default()
    });
    registry.define(
        "child",
        Some(Definition::builder().extend("storedBase").build()),
    )?;

    let instance = registry.create_sync("child", json!({}))?;
    assert_eq!(instance.option("loaded"), Some(json!(true)));
    // The loaded parent is registered for good, not re-fetched per create.
    assert!(registry.is_defined("storedBase", false));
    Ok(())
}

#[test]
fn methods_are_available_while_later_sections_build() -> anyhow::Result<()> {
    let registry = registry_with_routes();
    registry.define(
        "helper",
        Some(
            Definition::builder()
                .methods(|_, _| {
                    let mut methods = SectionMap::new();
                    methods.insert(
                        "greeting".to_string(),
                        SectionEntry::func(|_, _| Ok(json!("hello"))),
                    );
                    methods
                })
                .section("routes", |instance, _| {
                    // Instance methods are already composed when other
                    // sections are built.
                    let greeting = instance
                        .call("greeting", &[])
                        .expect("methods should be built first");
                    let mut routes = SectionMap::new();
                    routes.insert(
                        "greet".to_string(),
                        SectionEntry::func(move |_, _| Ok(greeting.clone())),
                    );
                    routes
                })
                .build(),
        ),
    )?;

    let instance = registry.create_sync("helper", json!({}))?;
    assert_eq!(instance.call_section("routes", &["greet"], &[])?, json!("hello"));
    Ok(())
}
