//! Host collaborators: the `&`-scoped global namespace, DOM serialization,
//! and deferred ("promise") values.
//!
//! §9 of the contract abstracts the original system's two browser-specific
//! integrations behind small traits so that the core pipeline never assumes
//! a real DOM is present. This module is the non-DOM stub a plain Rust host
//! satisfies; an embedder targeting a real browser (e.g. via `wasm-bindgen`)
//! would supply its own `DomSink`.

use crate::value::Value;
use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};

/// The host-global namespace reachable through the `&` scope selector and
/// through unscoped `functionCall` heads.
///
/// A caller whitelists the functions and values it wants template authors to
/// be able to reach; there is no reflective access to arbitrary process
/// state.
#[derive(Clone, Default)]
pub struct HostEnv {
    globals: Value,
}

impl HostEnv {
    /// Creates a host environment backed by the given object value.
    ///
    /// # Panics
    /// Panics if `globals` is not `Value::Object`.
    pub fn new(globals: Value) -> Self {
        assert!(
            matches!(globals, Value::Object(_)),
            "host environment must be an object"
        );
        Self { globals }
    }

    /// Returns the namespace object itself.
    pub fn globals(&self) -> &Value {
        &self.globals
    }
}

/// A computation that has not resolved yet.
///
/// The `promise` token emits a placeholder when it resolves a `Value` of
/// this kind, and arranges for the placeholder to be replaced once the
/// computation finishes. In a non-DOM host, "replacement" means calling back
/// into the registered [`DomSink`].
type ResolveCallback = Box<dyn FnOnce(&Value)>;

pub struct Deferred {
    id: u64,
    callbacks: RefCell<Vec<ResolveCallback>>,
    resolved: RefCell<Option<Value>>,
}

static NEXT_PLACEHOLDER_ID: AtomicU64 = AtomicU64::new(1);

impl Deferred {
    /// Creates a new, unresolved deferred value with a fresh placeholder id.
    pub fn new() -> Self {
        Self {
            id: NEXT_PLACEHOLDER_ID.fetch_add(1, Ordering::Relaxed),
            callbacks: RefCell::new(Vec::new()),
            resolved: RefCell::new(None),
        }
    }

    /// The placeholder id assigned to this deferred value at construction.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Registers a callback to run once this value resolves. If it has
    /// already resolved, the callback runs immediately.
    pub fn on_resolve(&self, callback: impl FnOnce(&Value) + 'static) {
        if let Some(value) = self.resolved.borrow().as_ref() {
            callback(value);
            return;
        }
        self.callbacks.borrow_mut().push(Box::new(callback));
    }

    /// Resolves this deferred value, running every registered callback.
    ///
    /// If the caller discarded the host node associated with this
    /// placeholder before calling this, the callbacks it would have driven
    /// simply never ran; resolving after that point is a no-op beyond
    /// recording the value.
    pub fn resolve(&self, value: Value) {
        *self.resolved.borrow_mut() = Some(value.clone());
        for callback in self.callbacks.borrow_mut().drain(..) {
            callback(&value);
        }
    }
}

impl Default for Deferred {
    fn default() -> Self {
        Self::new()
    }
}

/// A host DOM sink, satisfied by a real browser DOM or, as here, an
/// in-memory stand-in sufficient for a non-DOM host's own tests.
pub trait DomSink {
    /// Serializes a host element's outer form, for the `html` token.
    fn serialize(&self, element: &Value) -> String;

    /// Replaces the content of the placeholder with the given `id` with
    /// `markup`, once a `promise` token's value resolves.
    fn replace_content(&self, id: u64, markup: &str);
}

/// An in-memory [`DomSink`] that records replacements instead of touching a
/// real document; used by the demonstration binary and by tests.
#[derive(Default)]
pub struct RecordingDomSink {
    replacements: RefCell<Vec<(u64, String)>>,
}

impl RecordingDomSink {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the `(placeholder id, markup)` pairs recorded so far.
    pub fn replacements(&self) -> Vec<(u64, String)> {
        self.replacements.borrow().clone()
    }
}

impl DomSink for RecordingDomSink {
    fn serialize(&self, element: &Value) -> String {
        element.to_display_string()
    }

    fn replace_content(&self, id: u64, markup: &str) {
        self.replacements.borrow_mut().push((id, markup.to_string()));
    }
}
