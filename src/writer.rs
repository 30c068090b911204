//! Owns the template cache and drives rendering: token dispatch, the `if`
//! expression evaluator, and the builtin per-kind handlers (§4.5, §4.6).

use crate::context::Context;
use crate::error::{Error, Result};
use crate::escape::{default_escape, EscapeFn};
use crate::handlers::HandlerTable;
use crate::host::{DomSink, HostEnv};
use crate::name;
use crate::parser::parse_template;
use crate::token::{Kind, Token};
use crate::value::Value;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// A compiled template: its original source (kept for diagnostics/re-parse)
/// and its token tree.
struct Compiled {
    #[allow(dead_code)]
    source: String,
    tree: Vec<Token>,
}

/// Renders token trees against a [`Context`], owning the template cache, the
/// handler registry, the delimiter pair, and the escaper.
///
/// Cheaply `Clone`-able: every field is reference-counted, so a promise
/// callback can capture an owned copy and render into it long after the
/// `render` call that created the placeholder has returned.
#[derive(Clone)]
pub struct Writer {
    cache: Rc<RefCell<HashMap<String, Compiled>>>,
    handlers: Rc<RefCell<HandlerTable>>,
    tags: Rc<RefCell<(String, String)>>,
    escape: Rc<RefCell<EscapeFn>>,
    dom: Rc<dyn DomSink>,
    host: Rc<RefCell<Rc<HostEnv>>>,
}

impl Writer {
    /// Builds a writer with the default delimiter pair, the builtin handler
    /// set, the default escaper, and an in-memory `DomSink`.
    pub fn new() -> Self {
        Self {
            cache: Rc::new(RefCell::new(HashMap::new())),
            handlers: Rc::new(RefCell::new(HandlerTable::with_builtins())),
            tags: Rc::new(RefCell::new(("{{".to_string(), "}}".to_string()))),
            escape: Rc::new(RefCell::new(Rc::new(default_escape) as EscapeFn)),
            dom: Rc::new(crate::host::RecordingDomSink::new()),
            host: Rc::new(RefCell::new(Rc::new(HostEnv::default()))),
        }
    }

    /// Replaces the host-global namespace reachable through the `&` scope
    /// selector and unscoped `functionCall` heads.
    pub fn set_host_env(&self, host: HostEnv) {
        *self.host.borrow_mut() = Rc::new(host);
    }

    /// Builds a writer using the given `DomSink` instead of the default
    /// in-memory recorder.
    pub fn with_dom_sink(dom: Rc<dyn DomSink>) -> Self {
        let mut writer = Self::new();
        writer.dom = dom;
        writer
    }

    /// Compiles `source` under `name` and caches the result.
    pub fn parse(&self, name: &str, source: &str) {
        let (open, close) = self.tags();
        let tree = {
            let handlers = self.handlers.borrow();
            parse_template(name, source, &handlers, &open, &close)
        };
        self.cache.borrow_mut().insert(
            name.to_string(),
            Compiled {
                source: source.to_string(),
                tree,
            },
        );
    }

    /// Renders the template cached under `name` against `view`.
    ///
    /// # Errors
    /// Returns [`Error::NoSuchTemplate`] if `name` was never [`parse`](Self::parse)d.
    pub fn render(&self, name: &str, view: Value) -> Result<String> {
        let tree = {
            let cache = self.cache.borrow();
            let compiled = cache
                .get(name)
                .ok_or_else(|| Error::NoSuchTemplate(name.to_string()))?;
            compiled.tree.clone()
        };
        let host = self.host.borrow().clone();
        let ctx = Context::new_root(view, host);
        Ok(self.render_tokens(&tree, &ctx))
    }

    /// True if a template is cached under `name`.
    pub fn exists(&self, name: &str) -> bool {
        self.cache.borrow().contains_key(name)
    }

    /// Drops every cached template.
    pub fn clear_cache(&self) {
        self.cache.borrow_mut().clear();
    }

    /// The cached template names, in insertion order.
    pub fn list_templates(&self) -> Vec<String> {
        self.cache.borrow().keys().cloned().collect()
    }

    /// Registers a new token kind; see [`HandlerTable::add_token_handler`].
    pub fn add_token_handler(&self, keyword: &str, is_section: bool, handler: crate::handlers::HandlerFn) {
        self.handlers.borrow_mut().add_token_handler(keyword, is_section, handler);
    }

    /// The current open/close delimiter pair.
    pub fn tags(&self) -> (String, String) {
        self.tags.borrow().clone()
    }

    /// Overrides the delimiter pair.
    pub fn set_tags(&self, open: String, close: String) {
        *self.tags.borrow_mut() = (open, close);
    }

    /// Replaces the HTML escaper.
    pub fn set_escape(&self, escape: EscapeFn) {
        *self.escape.borrow_mut() = escape;
    }

    fn escape(&self, value: &Value) -> String {
        (self.escape.borrow())(value)
    }

    /// Renders a token list, dispatching each token through the handler
    /// table, and concatenates the results.
    pub fn render_tokens(&self, tokens: &[Token], ctx: &Rc<Context>) -> String {
        let mut out = String::new();
        for token in tokens {
            if let Some(piece) = self.render_token(token, ctx) {
                out.push_str(&piece);
            }
        }
        out
    }

    fn render_token(&self, token: &Token, ctx: &Rc<Context>) -> Option<String> {
        match &token.kind {
            Kind::Text => Some(token.payload.clone()),
            Kind::Name => Some(self.render_name(&token.payload, ctx)),
            Kind::CallVoid => {
                ctx.function_call(&token.payload, self);
                None
            }
            Kind::Call => Some(ctx.function_call(&token.payload, self).to_display_string()),
            Kind::SubTemplate => self.render_sub_template(&token.payload, ctx),
            Kind::Else | Kind::Close => None,
            kind => {
                let handler = self.handlers.borrow().handler_for(kind).cloned();
                match handler {
                    Some(handler) => match handler(token, ctx, self) {
                        Ok(piece) => piece,
                        Err(err) => {
                            log::error!("handler for '{}' failed: {err}", kind.keyword().unwrap_or("?"));
                            None
                        }
                    },
                    None => None,
                }
            }
        }
    }

    fn render_name(&self, payload: &str, ctx: &Rc<Context>) -> String {
        let value = if let Some((base, index)) = name::split_bracket(payload) {
            let base_value = ctx.lookup(base, None, self);
            let index_value = ctx.lookup(index, None, self);
            let key = if index_value.is_null() {
                index.to_string()
            } else {
                index_value.to_display_string()
            };
            base_value.get(&key).unwrap_or(Value::Null)
        } else {
            ctx.lookup(payload, None, self)
        };
        if value.is_null() {
            log::debug!("lookup miss for '{payload}'");
        }
        self.escape(&value)
    }

    fn render_sub_template(&self, payload: &str, ctx: &Rc<Context>) -> Option<String> {
        let resolved = ctx.lookup(payload, None, self);
        let template_name = if resolved.is_null() {
            payload.to_string()
        } else {
            resolved.to_display_string()
        };
        let tree = {
            let cache = self.cache.borrow();
            cache.get(&template_name).map(|compiled| compiled.tree.clone())
        };
        match tree {
            Some(tree) => Some(self.render_tokens(&tree, ctx)),
            None => {
                log::error!("missing sub-template '{template_name}'");
                None
            }
        }
    }
}

impl Default for Writer {
    fn default() -> Self {
        Self::new()
    }
}

/// `if`: evaluates the payload expression and renders the effective child
/// list, splitting out an `else` marker if present (§4.6).
pub fn handle_if(token: &Token, ctx: &Rc<Context>, writer: &Writer) -> Result<Option<String>> {
    let condition = eval_if(&token.payload, ctx, writer);
    let children = token.children.as_deref().unwrap_or(&[]);
    let else_pos = children.iter().position(|t| matches!(t.kind, Kind::Else));
    let effective: &[Token] = match else_pos {
        Some(pos) if condition => &children[..pos],
        Some(pos) => &children[pos + 1..],
        None if condition => children,
        None => &[],
    };
    Ok(Some(writer.render_tokens(effective, ctx)))
}

/// `each`: iterates a list, a keyed mapping, or a scalar view, per §4.5.
pub fn handle_each(token: &Token, ctx: &Rc<Context>, writer: &Writer) -> Result<Option<String>> {
    let looked_up = ctx.lookup(&token.payload, None, writer);
    if !looked_up.is_truthy() {
        return Ok(None);
    }
    let value = if looked_up.is_callable() {
        looked_up.call(Some(ctx.view()), &[])
    } else {
        looked_up
    };
    let children = token.children.as_deref().unwrap_or(&[]);
    let mut out = String::new();
    match &value {
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                let child_view = match item {
                    Value::Object(map) => {
                        let mut augmented = map.clone();
                        augmented.insert("$index".to_string(), Value::from(index as i64));
                        Value::Object(augmented)
                    }
                    other => each_wrapper(index, other.clone()),
                };
                let child_ctx = ctx.push(child_view);
                out.push_str(&writer.render_tokens(children, &child_ctx));
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                let child_ctx = ctx.push(each_keyed_wrapper(key, item.clone()));
                out.push_str(&writer.render_tokens(children, &child_ctx));
            }
        }
        scalar => {
            let child_ctx = ctx.push(scalar.clone());
            out.push_str(&writer.render_tokens(children, &child_ctx));
        }
    }
    Ok(Some(out))
}

fn each_wrapper(index: usize, value: Value) -> Value {
    let mut map = IndexMap::new();
    map.insert("$index".to_string(), Value::from(index as i64));
    map.insert("$value".to_string(), value);
    Value::Object(map)
}

fn each_keyed_wrapper(key: &str, value: Value) -> Value {
    let mut map = IndexMap::new();
    map.insert("$index".to_string(), Value::from(key));
    map.insert("$value".to_string(), value);
    Value::Object(map)
}

/// `get`: renders the children against a child context whose view is the
/// looked-up value, if truthy.
pub fn handle_get(token: &Token, ctx: &Rc<Context>, writer: &Writer) -> Result<Option<String>> {
    let value = ctx.lookup(&token.payload, None, writer);
    if !value.is_truthy() {
        return Ok(None);
    }
    let children = token.children.as_deref().unwrap_or(&[]);
    let child_ctx = ctx.push(value);
    Ok(Some(writer.render_tokens(children, &child_ctx)))
}

/// `promise`: emits a placeholder for a deferred value and arranges for the
/// placeholder to be replaced with the rendering of the children once the
/// value resolves (§4.5, §6).
pub fn handle_promise(token: &Token, ctx: &Rc<Context>, writer: &Writer) -> Result<Option<String>> {
    let value = ctx.lookup(&token.payload, None, writer);
    let Value::Deferred(deferred) = value else {
        log::error!("'promise' expects a deferred value for '{}'", token.payload);
        return Ok(None);
    };
    let id = deferred.id();
    let children = token.children.clone().unwrap_or_default();
    let ctx = ctx.clone();
    let writer = writer.clone();
    let dom = writer.dom.clone();
    deferred.on_resolve(move |resolved| {
        let markup = render_resolved(&writer, &children, &ctx, resolved);
        dom.replace_content(id, &markup);
    });
    Ok(Some(placeholder_markup(id)))
}

fn placeholder_markup(id: u64) -> String {
    format!("<late-placeholder id=\"{id}\"></late-placeholder>")
}

fn render_resolved(writer: &Writer, children: &[Token], ctx: &Rc<Context>, resolved: &Value) -> String {
    match resolved {
        Value::Array(items) => items
            .iter()
            .map(|item| writer.render_tokens(children, &ctx.push(item.clone())))
            .collect(),
        other => writer.render_tokens(children, &ctx.push(other.clone())),
    }
}

/// `html`: emits a serialized DOM element, or the value verbatim if it is
/// not one.
pub fn handle_html(token: &Token, ctx: &Rc<Context>, writer: &Writer) -> Result<Option<String>> {
    let value = ctx.lookup(&token.payload, None, writer);
    Ok(Some(writer.dom.serialize(&value)))
}

/// Evaluates an `if` payload per §4.6: split on `&&`/`||`, then on comparison
/// operators, fold left-to-right with short-circuit semantics.
fn eval_if(payload: &str, ctx: &Rc<Context>, writer: &Writer) -> bool {
    let stripped: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    let groups = split_logical(&stripped);
    if groups.is_empty() {
        return false;
    }
    let mut acc = eval_subexpression(&groups[0], ctx, writer);
    let mut i = 1;
    while i + 1 < groups.len() {
        let separator = groups[i].as_str();
        let rhs = &groups[i + 1];
        match separator {
            "&&" if acc => acc = eval_subexpression(rhs, ctx, writer),
            "||" if !acc => acc = eval_subexpression(rhs, ctx, writer),
            _ => {}
        }
        i += 2;
    }
    acc
}

/// Splits on `&&`/`||`, preserving the separators as their own list entries.
fn split_logical(s: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut last = 0;
    let mut i = 0;
    while i < s.len() {
        if s[i..].starts_with("&&") || s[i..].starts_with("||") {
            parts.push(s[last..i].to_string());
            parts.push(s[i..i + 2].to_string());
            i += 2;
            last = i;
        } else {
            i += 1;
        }
    }
    parts.push(s[last..].to_string());
    parts
}

const COMPARISON_OPERATORS: [&str; 8] = ["===", "!==", "==", "!=", ">=", "<=", "<", ">"];

/// Splits a sub-expression on the first comparison operator it contains,
/// preserving the operator as the middle element.
fn split_comparison(expr: &str) -> Vec<String> {
    for op in COMPARISON_OPERATORS {
        if let Some(index) = expr.find(op) {
            return vec![
                expr[..index].to_string(),
                op.to_string(),
                expr[index + op.len()..].to_string(),
            ];
        }
    }
    vec![expr.to_string()]
}

fn eval_subexpression(expr: &str, ctx: &Rc<Context>, writer: &Writer) -> bool {
    let parts = split_comparison(expr);
    match parts.as_slice() {
        [single] => ctx.lookup(single, None, writer).is_truthy(),
        [lhs, op, rhs] => {
            let lhs = ctx.lookup_with_reserved(lhs, writer);
            let rhs = ctx.lookup_with_reserved(rhs, writer);
            match op.as_str() {
                "===" => lhs.loosely_equals(&rhs),
                "!==" => !lhs.loosely_equals(&rhs),
                ">" => lhs.partial_cmp(&rhs) == Some(std::cmp::Ordering::Greater),
                ">=" => matches!(
                    lhs.partial_cmp(&rhs),
                    Some(std::cmp::Ordering::Greater | std::cmp::Ordering::Equal)
                ),
                "<" => lhs.partial_cmp(&rhs) == Some(std::cmp::Ordering::Less),
                "<=" => matches!(
                    lhs.partial_cmp(&rhs),
                    Some(std::cmp::Ordering::Less | std::cmp::Ordering::Equal)
                ),
                _ => {
                    log::error!("unsupported conditional operator '{op}'");
                    false
                }
            }
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn object(pairs: Vec<(&str, Value)>) -> Value {
        let mut map = IndexMap::new();
        for (k, v) in pairs {
            map.insert(k.to_string(), v);
        }
        Value::Object(map)
    }

    #[test]
    fn renders_plain_interpolation() {
        let w = Writer::new();
        w.parse("t", "Hello, {{name}}!");
        let out = w.render("t", object(vec![("name", Value::from("World"))])).unwrap();
        assert_eq!(out, "Hello, World!");
    }

    #[test]
    fn renders_if_else() {
        let w = Writer::new();
        w.parse("t", "{{if x === 1}}A{{else}}B{{/if}}");
        assert_eq!(w.render("t", object(vec![("x", Value::from(1i64))])).unwrap(), "A");
        assert_eq!(w.render("t", object(vec![("x", Value::from(2i64))])).unwrap(), "B");
    }

    #[test]
    fn renders_each_over_array_with_index_and_value() {
        let w = Writer::new();
        w.parse("t", "{{each xs}}[{{$index}}:{{$value}}]{{/each}}");
        let out = w
            .render("t", object(vec![("xs", Value::from(vec![10i64, 20]))]))
            .unwrap();
        assert_eq!(out, "[0:10][1:20]");
    }

    #[test]
    fn renders_each_over_array_of_objects() {
        let w = Writer::new();
        w.parse("t", "{{each xs}}{{name}}-{{$index}};{{/each}}");
        let xs = Value::Array(vec![
            object(vec![("name", Value::from("a"))]),
            object(vec![("name", Value::from("b"))]),
        ]);
        let out = w.render("t", object(vec![("xs", xs)])).unwrap();
        assert_eq!(out, "a-0;b-1;");
    }

    #[test]
    fn renders_get_section() {
        let w = Writer::new();
        w.parse("t", "{{get obj}}{{a}}/{{b}}{{/get}}");
        let obj = object(vec![("a", Value::from(1i64)), ("b", Value::from(2i64))]);
        let out = w.render("t", object(vec![("obj", obj)])).unwrap();
        assert_eq!(out, "1/2");
    }

    #[test]
    fn logical_and_short_circuits_false() {
        let w = Writer::new();
        w.parse("t", "{{if a && b}}y{{/if}}");
        let out = w
            .render("t", object(vec![("a", Value::Bool(true)), ("b", Value::Bool(false))]))
            .unwrap();
        assert_eq!(out, "");
    }

    #[test]
    fn render_of_unparsed_name_is_an_error() {
        let w = Writer::new();
        assert!(w.render("missing", Value::empty_object()).is_err());
    }

    #[test]
    fn exists_and_list_templates_and_clear_cache() {
        let w = Writer::new();
        assert!(!w.exists("t"));
        w.parse("t", "x");
        assert!(w.exists("t"));
        assert_eq!(w.list_templates(), vec!["t".to_string()]);
        w.clear_cache();
        assert!(!w.exists("t"));
    }

    #[test]
    fn each_over_keyed_mapping_synthesizes_index_value_wrapper() {
        let w = Writer::new();
        w.parse("t", "{{each m}}{{$index}}={{$value}};{{/each}}");
        let m = object(vec![("a", Value::from(1i64)), ("b", Value::from(2i64))]);
        let out = w.render("t", object(vec![("m", m)])).unwrap();
        assert_eq!(out, "a=1;b=2;");
    }
}
