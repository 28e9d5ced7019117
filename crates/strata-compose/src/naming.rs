//! Naming-convention helpers for implicit subclasses
//!
//! When the same class name is defined twice, the second definition becomes an
//! implicit subclass of the first and its metadata name is prefixed with `my-`
//! so the two remain distinguishable. These helpers implement that reversible
//! convention, including the scoped form (`@ns/foo` → `@ns/my-foo`). They
//! operate purely on strings and are independent of any registry.

/// True if `name` carries the `my-` prefix (after any `@scope/` part).
pub fn is_my(name: &str) -> bool {
    split_scope(name).1.starts_with("my-")
}

/// Strip the `my-` prefix, preserving any `@scope/` part.
///
/// Names without the prefix are returned unchanged.
pub fn my_to_original(name: &str) -> String {
    let (scope, local) = split_scope(name);
    format!("{scope}{}", local.strip_prefix("my-").unwrap_or(local))
}

/// Add the `my-` prefix after any `@scope/` part.
///
/// Inverse of [`my_to_original`] for well-formed (unprefixed) names. Behavior
/// for input that already carries the prefix is unspecified; the current
/// implementation prefixes again, so do not rely on it.
pub fn original_to_my(name: &str) -> String {
    let (scope, local) = split_scope(name);
    format!("{scope}my-{local}")
}

/// Split `@ns/foo` into `("@ns/", "foo")`; unscoped names get an empty scope.
fn split_scope(name: &str) -> (&str, &str) {
    if name.starts_with('@') {
        if let Some(slash) = name.find('/') {
            return name.split_at(slash + 1);
        }
    }
    ("", name)
}
