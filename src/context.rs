//! Rendering stack frames and the dotted-name resolution algorithm (§4.3).

use crate::host::HostEnv;
use crate::name::{self, Scope};
use crate::value::Value;
use crate::writer::Writer;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// A stack frame of data during rendering.
///
/// Frames form a tree via `parent`: `render` creates the root frame, and
/// section handlers call [`Context::push`] to create children, which never
/// outlive the handler invocation that created them. `root` always points
/// back at the frame `render` created, however deeply nested the current
/// render has gone.
pub struct Context {
    view: Value,
    parent: Option<Rc<Context>>,
    /// `None` means "this frame is the root".
    root: Option<Rc<Context>>,
    host: Rc<HostEnv>,
    /// `None` disables memoization entirely (the synthesized `&`-scope frame).
    cache: Option<RefCell<HashMap<String, Value>>>,
}

impl Context {
    /// Creates the root frame for a `render` call.
    pub fn new_root(view: Value, host: Rc<HostEnv>) -> Rc<Self> {
        Rc::new(Self {
            view,
            parent: None,
            root: None,
            host,
            cache: Some(RefCell::new(HashMap::new())),
        })
    }

    /// Creates a child frame whose view is `view`, with `self` as parent and
    /// the same root preserved.
    pub fn push(self: &Rc<Self>, view: Value) -> Rc<Self> {
        Rc::new(Self {
            view,
            parent: Some(self.clone()),
            root: Some(self.root_frame()),
            host: self.host.clone(),
            cache: Some(RefCell::new(HashMap::new())),
        })
    }

    /// A frame with caching disabled, used when an `&`-scoped lookup targets
    /// the host global namespace.
    fn host_frame(self: &Rc<Self>) -> Rc<Self> {
        Rc::new(Self {
            view: self.host.globals().clone(),
            parent: None,
            root: None,
            host: self.host.clone(),
            cache: None,
        })
    }

    /// This frame's data view.
    pub fn view(&self) -> &Value {
        &self.view
    }

    /// The frame `render` created, preserved across any number of `push`es.
    pub fn root_frame(self: &Rc<Self>) -> Rc<Self> {
        self.root.clone().unwrap_or_else(|| self.clone())
    }

    fn cache_get(&self, key: &str) -> Option<Value> {
        self.cache.as_ref()?.borrow().get(key).cloned()
    }

    fn cache_set(&self, key: String, value: Value) {
        if let Some(cache) = &self.cache {
            cache.borrow_mut().insert(key, value);
        }
    }

    /// Resolves a dotted name to a value, per §4.3.1.
    pub fn lookup(self: &Rc<Self>, raw_name: &str, args: Option<&[Value]>, writer: &Writer) -> Value {
        // Rule 1: function syntax.
        if raw_name.contains('(') {
            return self.function_call(raw_name, writer);
        }

        // Rule 2: negation.
        let negated = name::strip_negation(raw_name);
        let negate = negated.negate;
        let name = negated.rest;

        // Rule 3: string literal.
        if let Some(literal) = name::quoted_literal(name) {
            let value = Value::String(literal.to_string());
            return if negate {
                Value::Bool(!value.is_truthy())
            } else {
                value
            };
        }

        // Rule 4: scope selector.
        let (scope, rest) = name::strip_scope(name);
        let (frame, rest): (Rc<Context>, &str) = match scope {
            Scope::Current => (self.clone(), rest),
            Scope::Root => (self.root_frame(), rest),
            Scope::HostGlobal => (self.host_frame(), rest),
        };

        // Rule 5: cache short-circuit.
        if rest == "$" {
            let value = frame.view.clone();
            return if negate {
                Value::Bool(!value.is_truthy())
            } else {
                value
            };
        }
        if let Some(cached) = frame.cache_get(rest) {
            return if negate {
                Value::Bool(!cached.is_truthy())
            } else {
                cached
            };
        }

        // Rule 6: scope-restricted form.
        let (local_only, rest) = name::strip_local_only(rest);

        // Rule 7: walk.
        let mut value = None;
        let mut this_binding = None;
        let mut current = Some(frame.clone());
        while let Some(frame_ref) = current {
            if let Some((resolved, this)) = resolve_in_view(&frame_ref.view, rest) {
                value = Some(resolved);
                this_binding = this;
                break;
            }
            if local_only {
                break;
            }
            current = frame_ref.parent.clone();
        }
        if value.is_none() && !local_only {
            // Latest-revision behaviour: after exhausting parents, try root
            // once with non-ascending semantics (DESIGN.md Open Question).
            let root = self.root_frame();
            if let Some((resolved, this)) = resolve_in_view(&root.view, rest) {
                value = Some(resolved);
                this_binding = this;
            }
        }

        let mut result = value.unwrap_or(Value::Null);

        // Rule 8: invocation.
        if result.is_callable() {
            let args = args.unwrap_or(&[]);
            result = result.call(this_binding.as_ref(), args);
        } else {
            frame.cache_set(rest.to_string(), result.clone());
        }

        // Rule 9: negation.
        if negate {
            Value::Bool(!result.is_truthy())
        } else {
            result
        }
    }

    /// Resolves a name, recognizing reserved literals first (§4.3.2).
    pub fn lookup_with_reserved(self: &Rc<Self>, raw: &str, writer: &Writer) -> Value {
        let trimmed = raw.trim();
        match trimmed {
            "undefined" | "null" => return Value::Null,
            "true" => return Value::Bool(true),
            "false" => return Value::Bool(false),
            _ => {}
        }
        if let Some(literal) = name::quoted_literal(trimmed) {
            return Value::String(literal.to_string());
        }
        if let Some(number) = Value::parse_integer(trimmed) {
            return number;
        }
        self.lookup(trimmed, None, writer)
    }

    /// Parses and evaluates a function-call name (§4.3.3).
    pub fn function_call(self: &Rc<Self>, raw_name: &str, writer: &Writer) -> Value {
        let negated = name::strip_negation(raw_name);
        let negate = negated.negate;
        let name = negated.rest;

        let Some((head, raw_args)) = name::split_function_call(name) else {
            return Value::Null;
        };
        let args: Vec<Value> = raw_args
            .iter()
            .filter(|a| !a.trim().is_empty())
            .map(|a| self.lookup_with_reserved(a.trim(), writer))
            .collect();

        let result = if head.starts_with('$') || head.starts_with('#') {
            // The function lives on the view; resolve it like any other
            // name and invoke with the resolved arguments.
            self.lookup(head, Some(&args), writer)
        } else {
            // Dotted path rooted at the host global.
            let segments = name::split_dotted(head);
            let host_view = self.host.globals().clone();
            match resolve_in_view(&host_view, head) {
                Some((value, this)) if value.is_callable() => value.call(this.as_ref(), &args),
                Some((value, _)) if !segments.is_empty() => {
                    log::error!(
                        "functionCall: '{head}' resolved to a non-callable value, invoking anyway"
                    );
                    value
                }
                _ => {
                    log::error!("functionCall: could not resolve '{head}' on the host global");
                    Value::Null
                }
            }
        };

        if negate {
            Value::Bool(!result.is_truthy())
        } else {
            result
        }
    }
}

/// Resolves a (possibly dotted) name within a single view, returning the
/// value found and the "second-to-last" object reached, for use as a `this`
/// binding on a subsequent function call. Returns `None` if nothing along
/// the path exists (the caller then tries a parent frame).
fn resolve_in_view(view: &Value, name: &str) -> Option<(Value, Option<Value>)> {
    if name.is_empty() {
        return None;
    }
    if let Some((base, index)) = name::split_bracket(name) {
        let base_value = resolve_in_view(view, base)?.0;
        let value = base_value.get(index);
        return value.map(|v| (v, Some(base_value)));
    }
    let segments = name::split_dotted(name);
    let mut this_binding: Option<Value> = None;
    let mut current = view.clone();
    for (i, segment) in segments.iter().enumerate() {
        let next = current.get(segment)?;
        if i + 1 < segments.len() {
            this_binding = Some(current.clone());
        } else if segments.len() == 1 {
            this_binding = Some(view.clone());
        } else {
            this_binding = Some(current.clone());
        }
        current = next;
    }
    Some((current, this_binding))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::Writer;
    use indexmap::IndexMap;

    fn writer() -> Writer {
        Writer::new()
    }

    fn object(pairs: Vec<(&str, Value)>) -> Value {
        let mut map = IndexMap::new();
        for (k, v) in pairs {
            map.insert(k.to_string(), v);
        }
        Value::Object(map)
    }

    #[test]
    fn lookup_reads_top_level_and_dotted_keys() {
        let w = writer();
        let view = object(vec![
            ("name", Value::from("World")),
            ("user", object(vec![("age", Value::from(30i64))])),
        ]);
        let ctx = Context::new_root(view, Rc::new(HostEnv::default()));
        assert_eq!(ctx.lookup("name", None, &w).to_display_string(), "World");
        assert_eq!(ctx.lookup("user.age", None, &w).to_display_string(), "30");
        assert!(ctx.lookup("missing", None, &w).is_null());
    }

    #[test]
    fn lookup_ascends_to_parent_and_then_root() {
        let w = writer();
        let root_view = object(vec![("title", Value::from("root"))]);
        let root = Context::new_root(root_view, Rc::new(HostEnv::default()));
        let child = root.push(object(vec![("local", Value::from(1i64))]));
        assert_eq!(child.lookup("local", None, &w).to_display_string(), "1");
        assert_eq!(child.lookup("title", None, &w).to_display_string(), "root");
    }

    #[test]
    fn root_selector_matches_dollar_at_root_frame() {
        let w = writer();
        let root = Context::new_root(Value::from("root-view"), Rc::new(HostEnv::default()));
        let child = root.push(Value::from("child-view"));
        assert_eq!(
            child.lookup("#", None, &w).to_display_string(),
            root.lookup("$", None, &w).to_display_string()
        );
    }

    #[test]
    fn negation_inverts_truthiness() {
        let w = writer();
        let ctx = Context::new_root(object(vec![("flag", Value::Bool(true))]), Rc::new(HostEnv::default()));
        assert_eq!(ctx.lookup("!flag", None, &w).to_display_string(), "false");
    }

    #[test]
    fn reserved_literals_are_recognized_regardless_of_view() {
        let w = writer();
        let ctx = Context::new_root(Value::empty_object(), Rc::new(HostEnv::default()));
        assert!(matches!(ctx.lookup_with_reserved("true", &w), Value::Bool(true)));
        assert!(matches!(ctx.lookup_with_reserved("false", &w), Value::Bool(false)));
        assert!(ctx.lookup_with_reserved("undefined", &w).is_null());
    }

    #[test]
    fn missing_lookup_memoizes_null() {
        let w = writer();
        let ctx = Context::new_root(Value::empty_object(), Rc::new(HostEnv::default()));
        assert!(ctx.lookup("missing", None, &w).is_null());
        assert!(matches!(ctx.cache_get("missing"), Some(Value::Null)));
    }

    #[test]
    fn local_only_lookup_does_not_ascend() {
        let w = writer();
        let root = Context::new_root(object(vec![("title", Value::from("root"))]), Rc::new(HostEnv::default()));
        let child = root.push(object(vec![("local", Value::from(1i64))]));
        assert!(child.lookup("$.title", None, &w).is_null());
    }
}
