//! The small lookup-name grammar: scope selectors, negation, quoted
//! literals, dotted paths, and function-call syntax (§4.3, §9).
//!
//! Rather than re-deriving this grammar by repeated substring slicing at
//! every call site, the handful of productions it has are each given one
//! small, independently testable function here.

/// The scope a name expression resolves relative to.
#[derive(Debug, PartialEq, Eq)]
pub enum Scope {
    /// The current frame (no selector present).
    Current,
    /// The `#` selector: the root frame. Carries the remainder after the
    /// selector and its one-character separator are consumed.
    Root,
    /// The `&` selector: the host-global namespace, with caching disabled.
    HostGlobal,
}

/// A name with its leading `!` negation stripped, if present.
pub struct Negated<'a> {
    /// True if the name had a leading `!`.
    pub negate: bool,
    /// The name with the `!` removed.
    pub rest: &'a str,
}

/// Strips a leading `!` negation marker.
pub fn strip_negation(name: &str) -> Negated<'_> {
    match name.strip_prefix('!') {
        Some(rest) => Negated { negate: true, rest },
        None => Negated {
            negate: false,
            rest: name,
        },
    }
}

/// Recognizes a single- or double-quoted string literal and returns its
/// body (no escape handling, per §4.3.1 rule 3).
pub fn quoted_literal(name: &str) -> Option<&str> {
    let mut chars = name.chars();
    let quote = chars.next()?;
    if quote != '"' && quote != '\'' {
        return None;
    }
    let rest = &name[quote.len_utf8()..];
    let end = rest.rfind(quote)?;
    Some(&rest[..end])
}

/// Splits off a leading scope selector (`#`, `&`) and returns the remainder
/// to resolve within that scope.
pub fn strip_scope(name: &str) -> (Scope, &str) {
    if let Some(rest) = name.strip_prefix('#') {
        // Consume '#' plus its following separator character; an empty
        // remainder after that means "the root view itself" (`$`).
        let mut chars = rest.chars();
        match chars.next() {
            Some(_separator) => {
                let after = chars.as_str();
                if after.is_empty() {
                    (Scope::Root, "$")
                } else {
                    (Scope::Root, after)
                }
            }
            None => (Scope::Root, "$"),
        }
    } else if let Some(rest) = name.strip_prefix('&') {
        // Consume '&' plus one more character (the separator).
        let mut chars = rest.chars();
        chars.next();
        (Scope::HostGlobal, chars.as_str())
    } else {
        (Scope::Current, name)
    }
}

/// Strips the `$.` scope-restriction prefix, reporting whether the lookup
/// should be prevented from ascending to parent frames.
pub fn strip_local_only(name: &str) -> (bool, &str) {
    match name.strip_prefix("$.") {
        Some(rest) => (true, rest),
        None => (false, name),
    }
}

/// Splits a dotted path into its segments, e.g. `"a.b.c"` into `["a", "b",
/// "c"]`. A single segment with no dot is returned as a one-element slice.
pub fn split_dotted(name: &str) -> Vec<&str> {
    if name.is_empty() {
        Vec::new()
    } else {
        name.split('.').collect()
    }
}

/// Splits a `name[index]` member-access payload into its base and index
/// parts.
pub fn split_bracket(payload: &str) -> Option<(&str, &str)> {
    let open = payload.find('[')?;
    let close = payload.rfind(']')?;
    if close < open {
        return None;
    }
    Some((&payload[..open], &payload[open + 1..close]))
}

/// Splits a function-call payload `head(a, b, c)` into the head and its raw,
/// comma-separated argument tokens (not yet resolved). Splits on the
/// *outermost* parentheses, so a head containing no `(` yields `None`.
pub fn split_function_call(payload: &str) -> Option<(&str, Vec<&str>)> {
    let open = payload.find('(')?;
    let close = payload.rfind(')')?;
    if close < open {
        return None;
    }
    let head = &payload[..open];
    let args_src = &payload[open + 1..close];
    let args = if args_src.is_empty() {
        Vec::new()
    } else {
        split_top_level_commas(args_src)
    };
    Some((head, args))
}

/// Splits on commas that are not nested inside parentheses or quotes, so
/// that a nested function-call argument is not itself torn apart.
fn split_top_level_commas(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '"' | '\'' => quote = Some(c),
                '(' => depth += 1,
                ')' => depth -= 1,
                ',' if depth == 0 => {
                    parts.push(&s[start..i]);
                    start = i + 1;
                }
                _ => {}
            },
        }
    }
    parts.push(&s[start..]);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negation_strips_leading_bang() {
        let n = strip_negation("!visible");
        assert!(n.negate);
        assert_eq!(n.rest, "visible");

        let n = strip_negation("visible");
        assert!(!n.negate);
        assert_eq!(n.rest, "visible");
    }

    #[test]
    fn quoted_literal_matches_either_quote_kind() {
        assert_eq!(quoted_literal(r#""hi""#), Some("hi"));
        assert_eq!(quoted_literal("'hi'"), Some("hi"));
        assert_eq!(quoted_literal("hi"), None);
    }

    #[test]
    fn scope_selectors_split_correctly() {
        assert_eq!(strip_scope("#.user"), (Scope::Root, "user"));
        assert_eq!(strip_scope("#"), (Scope::Root, "$"));
        assert_eq!(strip_scope("&.String"), (Scope::HostGlobal, "String"));
        assert_eq!(strip_scope("user.name"), (Scope::Current, "user.name"));
    }

    #[test]
    fn function_call_splits_head_and_args() {
        let (head, args) = split_function_call("String(n, 2)").unwrap();
        assert_eq!(head, "String");
        assert_eq!(args, vec!["n", " 2"]);

        let (head, args) = split_function_call("noop()").unwrap();
        assert_eq!(head, "noop");
        assert!(args.is_empty());

        assert!(split_function_call("plain.name").is_none());
    }

    #[test]
    fn function_call_args_respect_nested_parens() {
        let (_, args) = split_function_call("f(g(1,2),3)").unwrap();
        assert_eq!(args, vec!["g(1,2)", "3"]);
    }

    #[test]
    fn bracket_access_splits_base_and_index() {
        assert_eq!(split_bracket("xs[0]"), Some(("xs", "0")));
        assert_eq!(split_bracket("xs[idx]"), Some(("xs", "idx")));
        assert_eq!(split_bracket("plain"), None);
    }
}
