//! Scans a template source into a flat token list, then squashes consecutive
//! text tokens and nests section openers against their closes (§4.2).

use crate::handlers::HandlerTable;
use crate::scanner::{normalize, Scanner};
use crate::token::{Kind, Token};
use regex::{Regex, RegexBuilder};

/// Parses `source` (under the template name `name`, used only for
/// diagnostics) into a nested token tree, using the delimiter pair and
/// handler registry currently configured on `handlers`.
pub fn parse_template(name: &str, source: &str, handlers: &HandlerTable, open: &str, close: &str) -> Vec<Token> {
    let normalized = normalize(source);
    let flat = scan_flat(name, &normalized, handlers, open, close);
    let squashed = squash(flat);
    nest(name, squashed, handlers)
}

/// True if `kind` opens a section, consulting the handler table for
/// `Kind::Custom` (whose section-ness depends on the `is_section` flag the
/// kind was registered with, not the kind alone).
fn is_section(kind: &Kind, handlers: &HandlerTable) -> bool {
    match kind {
        Kind::Custom(name) => handlers.is_section_keyword(&name.to_lowercase()),
        other => other.is_section_opener(),
    }
}

fn scan_flat(name: &str, source: &str, handlers: &HandlerTable, open: &str, close: &str) -> Vec<Token> {
    let open_re = RegexBuilder::new(&format!(r"{}\s*", regex::escape(open)))
        .build()
        .expect("delimiter pattern is a literal escape");
    let close_re = RegexBuilder::new(&format!(r"\s*{}", regex::escape(close)))
        .build()
        .expect("delimiter pattern is a literal escape");
    let call_value_re = Regex::new(r"^>>\s*").unwrap();
    let call_void_re = Regex::new(r"^>\s*").unwrap();
    let sub_template_re = Regex::new(r"^%\s*").unwrap();
    let whitespace_re = Regex::new(r"^\s*").unwrap();

    let mut scanner = Scanner::new(source);
    let mut tokens = Vec::new();
    // Stack of (keyword, start offset) for open sections, used to validate
    // `/` and `else` placement while scanning.
    let mut sections: Vec<(String, usize)> = Vec::new();

    loop {
        let start = scanner.pos();
        let text = scanner.scan_until(&open_re);
        if !text.is_empty() {
            tokens.push(Token::text(text.to_string(), start, start + text.len()));
        }
        let tag_start = scanner.pos();
        if scanner.scan(&open_re).is_empty() {
            break;
        }

        let kind = if !scanner.scan(&call_value_re).is_empty() {
            Kind::Call
        } else if !scanner.scan(&call_void_re).is_empty() {
            Kind::CallVoid
        } else if !scanner.scan(&sub_template_re).is_empty() {
            Kind::SubTemplate
        } else {
            let matched = scanner.scan(handlers.tag_re());
            let trimmed = matched.trim();
            if trimmed.is_empty() {
                Kind::Name
            } else if trimmed.eq_ignore_ascii_case("else") {
                Kind::Else
            } else if trimmed == "/" {
                Kind::Close
            } else {
                let keyword = trimmed.to_lowercase();
                handlers
                    .lookup(&keyword)
                    .map(|(kind, _)| kind.clone())
                    .unwrap_or(Kind::Name)
            }
        };
        scanner.scan(&whitespace_re);

        let raw_payload = scanner.scan_until(&close_re);
        let payload: String = raw_payload.chars().filter(|c| !c.is_whitespace()).collect();
        if scanner.scan(&close_re).is_empty() && !scanner.eos() {
            log::error!("{name}: unclosed tag at position {tag_start}");
        }
        let end = scanner.pos();

        match &kind {
            Kind::Close => {
                let closed = payload.to_lowercase();
                match sections.pop() {
                    Some((open_keyword, _)) if open_keyword == closed => {}
                    Some((open_keyword, _)) => {
                        log::error!(
                            "{name}: mismatched close at position {tag_start}: expected '/{open_keyword}', found '/{closed}'"
                        );
                    }
                    None => {
                        log::error!("{name}: unopened section closed at position {tag_start}: '/{closed}'");
                    }
                }
            }
            Kind::Else if sections.last().is_none_or(|(k, _)| k != "if") => {
                log::error!("{name}: 'else' outside of an 'if' section at position {tag_start}");
            }
            Kind::Else => {}
            _ if is_section(&kind, handlers) => {
                let keyword = kind.keyword().unwrap_or_default().to_lowercase();
                sections.push((keyword, tag_start));
            }
            _ => {}
        }

        tokens.push(Token {
            kind,
            payload,
            start: tag_start,
            end,
            children: None,
            close_end: None,
        });

        if scanner.eos() {
            break;
        }
    }

    for (keyword, start) in sections {
        log::error!("{name}: unclosed section '{keyword}' opened at position {start}");
    }

    tokens
}

/// Merges consecutive `text` tokens into one.
fn squash(tokens: Vec<Token>) -> Vec<Token> {
    let mut out: Vec<Token> = Vec::with_capacity(tokens.len());
    for token in tokens {
        if token.is_text()
            && let Some(last) = out.last_mut()
            && last.is_text()
        {
            last.payload.push_str(&token.payload);
            last.end = token.end;
            continue;
        }
        out.push(token);
    }
    out
}

/// Builds the tree from the flat, squashed list: section openers collect
/// their children until the matching `/`.
fn nest(name: &str, tokens: Vec<Token>, handlers: &HandlerTable) -> Vec<Token> {
    let mut root: Vec<Token> = Vec::new();
    // Stack of section-opener tokens currently open, each owning the child
    // list it is accumulating into.
    let mut stack: Vec<Token> = Vec::new();

    for mut token in tokens {
        match token.kind {
            Kind::Close => {
                let close_end = token.end;
                match stack.pop() {
                    Some(mut opener) => {
                        opener.close_end = Some(close_end);
                        if let Some(parent) = stack.last_mut() {
                            parent.children.get_or_insert_with(Vec::new).push(opener);
                        } else {
                            root.push(opener);
                        }
                    }
                    None => {
                        log::error!("{name}: unopened section closed during nesting at position {}", token.start);
                    }
                }
            }
            ref kind if is_section(kind, handlers) => {
                token.children = Some(Vec::new());
                stack.push(token);
            }
            _ => {
                if let Some(top) = stack.last_mut() {
                    top.children.get_or_insert_with(Vec::new).push(token);
                } else {
                    root.push(token);
                }
            }
        }
    }

    // Any sections left open (a malformed template) are flushed into the
    // tree as best-effort, rather than silently dropping their content.
    while let Some(opener) = stack.pop() {
        log::error!(
            "{name}: section '{}' never closed",
            opener.kind.keyword().unwrap_or("?")
        );
        if let Some(parent) = stack.last_mut() {
            parent.children.get_or_insert_with(Vec::new).push(opener);
        } else {
            root.push(opener);
        }
    }

    root
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_text_and_name_tokens() {
        let handlers = HandlerTable::with_builtins();
        let tree = parse_template("t", "Hello, {{name}}!", &handlers, "{{", "}}");
        assert_eq!(tree.len(), 3);
        assert!(matches!(tree[0].kind, Kind::Text));
        assert_eq!(tree[0].payload, "Hello, ");
        assert!(matches!(tree[1].kind, Kind::Name));
        assert_eq!(tree[1].payload, "name");
        assert!(matches!(tree[2].kind, Kind::Text));
        assert_eq!(tree[2].payload, "!");
    }

    #[test]
    fn if_section_nests_its_children() {
        let handlers = HandlerTable::with_builtins();
        let tree = parse_template("t", "{{if x}}A{{else}}B{{/if}}", &handlers, "{{", "}}");
        assert_eq!(tree.len(), 1);
        assert!(matches!(tree[0].kind, Kind::If));
        let children = tree[0].children.as_ref().unwrap();
        assert_eq!(children.len(), 3);
        assert!(matches!(children[1].kind, Kind::Else));
    }

    #[test]
    fn each_section_nests_and_closes() {
        let handlers = HandlerTable::with_builtins();
        let tree = parse_template("t", "{{each xs}}[{{$index}}]{{/each}}", &handlers, "{{", "}}");
        assert_eq!(tree.len(), 1);
        assert!(matches!(tree[0].kind, Kind::Each));
        assert_eq!(tree[0].payload, "xs");
        assert!(tree[0].close_end.is_some());
    }

    #[test]
    fn call_void_and_call_value_and_sub_template_markers() {
        let handlers = HandlerTable::with_builtins();
        let tree = parse_template("t", "{{>log(x)}}{{>>String(n)}}{{%header}}", &handlers, "{{", "}}");
        assert!(matches!(tree[0].kind, Kind::CallVoid));
        assert!(matches!(tree[1].kind, Kind::Call));
        assert!(matches!(tree[2].kind, Kind::SubTemplate));
    }

    #[test]
    fn squash_merges_consecutive_text_tokens() {
        let tokens = vec![
            Token::text("a".to_string(), 0, 1),
            Token::text("b".to_string(), 1, 2),
        ];
        let squashed = squash(tokens);
        assert_eq!(squashed.len(), 1);
        assert_eq!(squashed[0].payload, "ab");
    }

    #[test]
    fn custom_section_kind_nests_like_a_builtin() {
        let mut handlers = HandlerTable::with_builtins();
        handlers.add_token_handler("widget", true, std::rc::Rc::new(|_, _, _| Ok(None)));
        let tree = parse_template("t", "{{widget a}}X{{/widget}}", &handlers, "{{", "}}");
        assert_eq!(tree.len(), 1);
        assert!(matches!(&tree[0].kind, Kind::Custom(name) if name == "widget"));
        assert_eq!(tree[0].children.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn custom_leaf_kind_does_not_swallow_trailing_tokens() {
        let mut handlers = HandlerTable::with_builtins();
        handlers.add_token_handler("badge", false, std::rc::Rc::new(|_, _, _| Ok(None)));
        let tree = parse_template("t", "{{badge a}}after", &handlers, "{{", "}}");
        assert_eq!(tree.len(), 2);
        assert!(matches!(&tree[0].kind, Kind::Custom(name) if name == "badge"));
        assert!(tree[0].children.is_none());
        assert!(matches!(tree[1].kind, Kind::Text));
        assert_eq!(tree[1].payload, "after");
    }
}
