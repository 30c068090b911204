//! The handler table: per-token-kind render dispatch, extensible at runtime.

use crate::context::Context;
use crate::error::Result;
use crate::token::{Kind, Token};
use crate::writer::Writer;
use indexmap::IndexMap;
use regex::{Regex, RegexBuilder};
use std::rc::Rc;

/// A per-kind render handler.
///
/// Returning `Ok(None)` appends nothing to the output (the "undefined return
/// value" case of §4.5); returning `Ok(Some(s))` appends `s`.
pub type HandlerFn = Rc<dyn Fn(&Token, &Rc<Context>, &Writer) -> Result<Option<String>>>;

/// A single handler-table entry.
struct Entry {
    kind: Kind,
    /// Section kinds have their children dispatched by the handler itself
    /// (by calling `writer.render_tokens` on `token.children`); leaf kinds do
    /// not. The parser's section-opener set is exactly the kinds registered
    /// here with `is_section = true`, union the closed builtin section set.
    is_section: bool,
    handler: HandlerFn,
}

/// The process-wide (or, for an embedded `Writer`, per-instance) mapping
/// from tag keyword to render handler, plus the compiled tag-recognition
/// pattern derived from it.
pub struct HandlerTable {
    entries: IndexMap<String, Entry>,
    tag_re: Regex,
}

impl HandlerTable {
    /// Builds a handler table seeded with the closed builtin set:
    /// `if`, `each`, `get`, `promise`, `html`.
    pub fn with_builtins() -> Self {
        let mut table = Self {
            entries: IndexMap::new(),
            tag_re: Regex::new("^$").unwrap(),
        };
        table.insert_builtin("if", Kind::If, true, crate::writer::handle_if);
        table.insert_builtin("each", Kind::Each, true, crate::writer::handle_each);
        table.insert_builtin("get", Kind::Get, true, crate::writer::handle_get);
        table.insert_builtin("promise", Kind::Promise, true, crate::writer::handle_promise);
        table.insert_builtin("html", Kind::Html, false, crate::writer::handle_html);
        table.rebuild_tag_re();
        table
    }

    fn insert_builtin(
        &mut self,
        keyword: &str,
        kind: Kind,
        is_section: bool,
        handler: fn(&Token, &Rc<Context>, &Writer) -> Result<Option<String>>,
    ) {
        self.entries.insert(
            keyword.to_string(),
            Entry {
                kind,
                is_section,
                handler: Rc::new(handler),
            },
        );
    }

    /// Registers a new tag kind. It is an error (logged, not fatal) to
    /// register a keyword that is already present; the existing handler is
    /// preserved in that case (§7 "Handler-registration conflict").
    pub fn add_token_handler(&mut self, keyword: &str, is_section: bool, handler: HandlerFn) {
        let lower = keyword.to_lowercase();
        if self.entries.contains_key(&lower) {
            log::error!("addTokenHandler: a handler for '{keyword}' is already registered");
            return;
        }
        self.entries.insert(
            lower,
            Entry {
                kind: Kind::Custom(keyword.to_string()),
                is_section,
                handler,
            },
        );
        self.rebuild_tag_re();
    }

    /// Resolves a scanned, lowercased keyword to its `Kind` and handler, if
    /// one is registered.
    pub fn lookup(&self, keyword: &str) -> Option<(&Kind, &HandlerFn)> {
        self.entries
            .get(keyword)
            .map(|entry| (&entry.kind, &entry.handler))
    }

    /// True if `keyword` names a registered section kind (participates in
    /// parse-time nesting).
    pub fn is_section_keyword(&self, keyword: &str) -> bool {
        self.entries
            .get(keyword)
            .is_some_and(|entry| entry.is_section)
    }

    /// The handler registered for `kind`, if any. Used by `render_tokens`
    /// dispatch for leaf and section kinds alike.
    pub fn handler_for(&self, kind: &Kind) -> Option<&HandlerFn> {
        let keyword = kind.keyword()?;
        self.entries.get(&keyword.to_lowercase()).map(|e| &e.handler)
    }

    /// The compiled tag-recognition pattern: the alternation of `^keyword `
    /// for every registered kind, plus `^else` and `^/`, case-insensitive.
    pub fn tag_re(&self) -> &Regex {
        &self.tag_re
    }

    fn rebuild_tag_re(&mut self) {
        let mut alternatives: Vec<String> = self
            .entries
            .keys()
            .map(|keyword| format!("^{} ", regex::escape(keyword)))
            .collect();
        alternatives.push("^else".to_string());
        alternatives.push("^/".to_string());
        let pattern = alternatives.join("|");
        self.tag_re = RegexBuilder::new(&pattern)
            .case_insensitive(true)
            .build()
            .expect("tag_re alternatives are all literal and escaped");
    }
}
