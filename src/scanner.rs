//! Position-tracked walker over a normalized template string.

use regex::Regex;

/// Scans a normalized template source one regex match at a time, tracking a
/// byte offset into the original source as it consumes its `tail`.
pub(crate) struct Scanner<'a> {
    tail: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    /// Creates a scanner over the given (already-normalized) source.
    pub fn new(source: &'a str) -> Self {
        Self {
            tail: source,
            pos: 0,
        }
    }

    /// The number of bytes consumed so far.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// True iff the scanner has consumed the entire source.
    pub fn eos(&self) -> bool {
        self.tail.is_empty()
    }

    /// If `pattern` matches at the start of `tail`, consumes the match,
    /// advances `pos`, and returns the matched text. Otherwise returns an
    /// empty string without advancing.
    pub fn scan(&mut self, pattern: &Regex) -> &'a str {
        if let Some(m) = pattern.find(self.tail)
            && m.start() == 0
        {
            let matched = &self.tail[..m.end()];
            self.tail = &self.tail[m.end()..];
            self.pos += matched.len();
            return matched;
        }
        ""
    }

    /// If `pattern` occurs anywhere in `tail`, consumes everything before
    /// the match and returns it. If it does not occur, consumes the entire
    /// remaining `tail`.
    pub fn scan_until(&mut self, pattern: &Regex) -> &'a str {
        let consumed = match pattern.find(self.tail) {
            Some(m) => m.start(),
            None => self.tail.len(),
        };
        let text = &self.tail[..consumed];
        self.tail = &self.tail[consumed..];
        self.pos += consumed;
        text
    }
}

/// Normalizes a template source: runs of spaces collapse to one, tabs and
/// newlines are removed outright. This is observable and part of the
/// contract (§3, §8 property 3).
pub fn normalize(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut last_was_space = false;
    for c in source.chars() {
        match c {
            '\t' | '\n' | '\r' => continue,
            ' ' => {
                if !last_was_space {
                    out.push(' ');
                }
                last_was_space = true;
            }
            _ => {
                out.push(c);
                last_was_space = false;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_spaces_and_strips_tabs_and_newlines() {
        assert_eq!(normalize("a   b\tc\nd\r\ne"), "a bcde");
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = normalize("a   b\tc\nd");
        let twice = normalize(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn scan_advances_only_on_match() {
        let re = Regex::new(r"^\{\{").unwrap();
        let mut s = Scanner::new("{{name}}");
        assert_eq!(s.scan(&re), "{{");
        assert_eq!(s.pos(), 2);
        assert_eq!(s.scan(&re), "");
        assert_eq!(s.pos(), 2);
    }

    #[test]
    fn scan_until_consumes_to_match_or_end() {
        let re = Regex::new(r"\{\{").unwrap();
        let mut s = Scanner::new("hello {{name}}");
        assert_eq!(s.scan_until(&re), "hello ");
        assert_eq!(s.pos(), 6);

        let mut s2 = Scanner::new("hello");
        assert_eq!(s2.scan_until(&re), "hello");
        assert!(s2.eos());
    }
}
