//! The parsed token type and its kind discriminator.

/// A token kind.
///
/// The builtin kinds are the closed set the handler table is seeded with;
/// [`Kind::Custom`] carries the name of a kind registered at runtime via
/// `add_token_handler`, since the parser's section-opener set is derived
/// from whatever is currently registered (§4.4).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    /// Literal text.
    Text,
    /// A plain name lookup, e.g. `{{user.name}}`.
    Name,
    /// A void function call, e.g. `{{>log(x)}}`.
    CallVoid,
    /// A value-emitting function call, e.g. `{{>>String(n)}}`.
    Call,
    /// A sub-template call, e.g. `{{%header}}`.
    SubTemplate,
    /// An `if` section.
    If,
    /// An `else` marker inside an `if` section's children.
    Else,
    /// An `each` section.
    Each,
    /// A `get` section.
    Get,
    /// A `promise` section.
    Promise,
    /// An `html` leaf.
    Html,
    /// A section close, e.g. `{{/if}}`.
    Close,
    /// A runtime-registered kind.
    Custom(String),
}

impl Kind {
    /// The bare keyword used in the tag syntax for this kind, or `None` for
    /// kinds with no keyword (`text`, `name`, `>`, `>>`, `%`, `close`, which
    /// are recognized by punctuation or by absence of a keyword instead).
    pub fn keyword(&self) -> Option<&str> {
        match self {
            Kind::If => Some("if"),
            Kind::Each => Some("each"),
            Kind::Get => Some("get"),
            Kind::Promise => Some("promise"),
            Kind::Html => Some("html"),
            Kind::Else => Some("else"),
            Kind::Custom(name) => Some(name.as_str()),
            Kind::Text | Kind::Name | Kind::CallVoid | Kind::Call | Kind::SubTemplate | Kind::Close => {
                None
            }
        }
    }

    /// True for the builtin kinds that open a section and therefore
    /// participate in the parser's nesting stack.
    ///
    /// `Kind::Custom` is deliberately excluded: whether a runtime-registered
    /// kind is a section depends on the `is_section` flag passed to
    /// `add_token_handler`, not on the kind alone. Callers that may see a
    /// `Custom` kind must consult `HandlerTable::is_section_keyword` instead.
    pub fn is_section_opener(&self) -> bool {
        matches!(self, Kind::If | Kind::Each | Kind::Get | Kind::Promise)
    }
}

/// A parsed token.
///
/// Field 4 (`children`) and field 5 (`close_end`) of the original positional
/// record are carried as `Option`s here, populated only for section-opening
/// kinds, per the Design Notes resolution recorded in DESIGN.md.
#[derive(Clone, Debug)]
pub struct Token {
    /// The token's kind.
    pub kind: Kind,
    /// The tag payload (spaces already stripped) or, for `text`, the literal
    /// text.
    pub payload: String,
    /// Start offset in the normalized source.
    pub start: usize,
    /// End offset in the normalized source (for `text`, `start + payload.len()`).
    pub end: usize,
    /// Child tokens, for section-opening kinds.
    pub children: Option<Vec<Token>>,
    /// The offset of the matching close tag, for section-opening kinds.
    pub close_end: Option<usize>,
}

impl Token {
    /// Builds a `text` token.
    pub fn text(payload: String, start: usize, end: usize) -> Self {
        Self {
            kind: Kind::Text,
            payload,
            start,
            end,
            children: None,
            close_end: None,
        }
    }

    /// Builds a leaf (non-section) token of the given kind.
    pub fn leaf(kind: Kind, payload: String, start: usize, end: usize) -> Self {
        Self {
            kind,
            payload,
            start,
            end,
            children: None,
            close_end: None,
        }
    }

    /// Builds a section-opening token with an empty child list, to be filled
    /// in by the nest phase.
    pub fn section(kind: Kind, payload: String, start: usize, end: usize) -> Self {
        Self {
            kind,
            payload,
            start,
            end,
            children: Some(Vec::new()),
            close_end: None,
        }
    }

    /// True iff this token is a `text` token.
    pub fn is_text(&self) -> bool {
        matches!(self.kind, Kind::Text)
    }
}
