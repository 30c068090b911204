//! Process-wide (per-thread) default entry point: a single [`Writer`]
//! instance wrapped behind thread-local state so callers can use the engine
//! without constructing their own.
//!
//! The contract (§9) describes this state as living behind a
//! `LazyLock`/`RwLock` pair. `Writer`'s own fields are already
//! reference-counted interior-mutable cells (so that a `promise` callback
//! can outlive the `render` call that registered it, see `writer.rs`), which
//! makes the cells `!Sync`; a `thread_local!` gives the same "one shared
//! instance, mutate through `&self`" ergonomics without claiming a
//! `Rc`-based value is safe to share across threads. See DESIGN.md.

use crate::error::Result;
use crate::escape::EscapeFn;
use crate::handlers::HandlerFn;
use crate::host::HostEnv;
use crate::value::Value;
use crate::writer::Writer;
use parking_lot::RwLock;

thread_local! {
    static WRITER: RwLock<Writer> = RwLock::new(Writer::new());
}

/// Runs `f` against the thread's default writer.
fn with_writer<T>(f: impl FnOnce(&Writer) -> T) -> T {
    WRITER.with(|writer| f(&writer.read()))
}

/// Compiles `source` and caches it under `name`.
pub fn parse(name: &str, source: &str) {
    with_writer(|w| w.parse(name, source));
}

/// Renders the template cached under `name` against `view`.
pub fn render(name: &str, view: Value) -> Result<String> {
    with_writer(|w| w.render(name, view))
}

/// True if a template is cached under `name`.
pub fn exists(name: &str) -> bool {
    with_writer(|w| w.exists(name))
}

/// The cached template names.
pub fn list_templates() -> Vec<String> {
    with_writer(|w| w.list_templates())
}

/// Drops every cached template.
pub fn clear_cache() {
    with_writer(|w| w.clear_cache());
}

/// Registers a new token kind on the default writer.
pub fn add_token_handler(keyword: &str, is_section: bool, handler: HandlerFn) {
    with_writer(|w| w.add_token_handler(keyword, is_section, handler));
}

/// The current open/close delimiter pair.
pub fn tags() -> (String, String) {
    with_writer(|w| w.tags())
}

/// Overrides the delimiter pair. Rejects a non-pair by construction (the
/// signature only accepts exactly two strings).
pub fn set_tags(open: impl Into<String>, close: impl Into<String>) {
    with_writer(|w| w.set_tags(open.into(), close.into()));
}

/// Replaces the HTML escaper used for `name` token output.
pub fn set_escape(escape: EscapeFn) {
    with_writer(|w| w.set_escape(escape));
}

/// Replaces the host-global namespace reachable through `&` and unscoped
/// function calls.
pub fn set_host_env(host: HostEnv) {
    with_writer(|w| w.set_host_env(host));
}

/// Convenience predicate for use inside templates: the length of an array,
/// object, or string, or `None` for scalars that have no length.
pub fn array_length(value: &Value) -> Option<usize> {
    value.length()
}

/// Convenience predicate for use inside templates: true if `value` is an
/// object (as opposed to an array, scalar, or callable).
pub fn is_object(value: &Value) -> bool {
    matches!(value, Value::Object(_))
}

/// Convenience predicate for use inside templates: true if `needle` is
/// present in `haystack` when treated as an array.
pub fn in_array(haystack: &Value, needle: &Value) -> bool {
    haystack.contains(needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    #[test]
    fn default_writer_is_usable_without_construction() {
        clear_cache();
        parse("greet", "Hello, {{name}}!");
        assert!(exists("greet"));
        assert_eq!(list_templates(), vec!["greet".to_string()]);
        let mut view = IndexMap::new();
        view.insert("name".to_string(), Value::from("World"));
        let out = render("greet", Value::Object(view)).unwrap();
        assert_eq!(out, "Hello, World!");
        clear_cache();
    }

    #[test]
    fn tags_getter_and_setter_round_trip() {
        let original = tags();
        set_tags("<%", "%>");
        assert_eq!(tags(), ("<%".to_string(), "%>".to_string()));
        set_tags(original.0, original.1);
    }
}
