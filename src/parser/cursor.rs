//! Text Cursor
//!
//! An immutable source string with a mutable read position. Every grammar
//! production in this crate is written against this cursor: it tries to
//! consume something, and on failure resets to a mark taken before the
//! attempt. Marks are plain copies of the remaining text, so backtracking
//! costs nothing.

use regex_lite::{Captures, Regex};
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::ast::types::Expr;

// =============================================================================
// BYTE SETS
// =============================================================================

/// A set of bytes, written like a regex character class without the brackets.
///
/// `ByteSet::new("A-Za-z0-9_")` contains letters, digits and the underscore.
/// A `-` that does not sit between two bytes is taken literally.
#[derive(Clone)]
pub struct ByteSet {
    bits: [bool; 256],
}

impl ByteSet {
    pub fn new(ranges: &str) -> Self {
        let mut bits = [false; 256];
        let bytes = ranges.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            if i + 2 < bytes.len() && bytes[i + 1] == b'-' {
                for b in bytes[i]..=bytes[i + 2] {
                    bits[b as usize] = true;
                }
                i += 3;
            } else {
                bits[bytes[i] as usize] = true;
                i += 1;
            }
        }
        ByteSet { bits }
    }

    /// The set of all bytes not in this set.
    pub fn inverse(&self) -> Self {
        let mut bits = [false; 256];
        for (i, bit) in bits.iter_mut().enumerate() {
            *bit = !self.bits[i];
        }
        ByteSet { bits }
    }

    pub fn contains(&self, b: u8) -> bool {
        self.bits[b as usize]
    }
}

impl std::fmt::Debug for ByteSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let members: String = (0u8..=127)
            .filter(|b| self.contains(*b))
            .map(|b| b as char)
            .collect();
        write!(f, "ByteSet({:?})", members)
    }
}

// =============================================================================
// REGEX CACHE
// =============================================================================

lazy_static::lazy_static! {
    static ref REGEX_CACHE: Mutex<HashMap<String, Regex>> = Mutex::new(HashMap::new());
}

/// Compiles a regular expression, reusing an earlier compilation of the same
/// pattern text. Returns `None` for invalid patterns.
pub fn regcomp(pattern: &str) -> Option<Regex> {
    let mut cache = match REGEX_CACHE.lock() {
        Ok(cache) => cache,
        Err(poisoned) => poisoned.into_inner(),
    };
    if let Some(re) = cache.get(pattern) {
        return Some(re.clone());
    }
    match Regex::new(pattern) {
        Ok(re) => {
            tracing::trace!(pattern, "compiled regular expression");
            cache.insert(pattern.to_string(), re.clone());
            Some(re)
        }
        Err(err) => {
            tracing::debug!(pattern, error = %err, "invalid regular expression");
            None
        }
    }
}

// =============================================================================
// LEXER
// =============================================================================

/// A position in a [`Lexer`], to return to later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LexerMark<'s>(&'s str);

/// The low-level cursor over a source string.
#[derive(Debug, Clone, Copy)]
pub struct Lexer<'s> {
    rest: &'s str,
}

impl<'s> Lexer<'s> {
    pub fn new(text: &'s str) -> Self {
        Lexer { rest: text }
    }

    /// The text that has not been consumed yet.
    pub fn rest(&self) -> &'s str {
        self.rest
    }

    pub fn eof(&self) -> bool {
        self.rest.is_empty()
    }

    pub fn peek_byte(&self) -> Option<u8> {
        self.rest.as_bytes().first().copied()
    }

    /// Skips the next `n` bytes, which must end at a character boundary.
    pub fn skip(&mut self, n: usize) -> bool {
        self.rest = &self.rest[n..];
        n > 0
    }

    /// Skips the next character, however many bytes it takes.
    pub fn skip_char(&mut self) -> bool {
        match self.rest.chars().next() {
            Some(c) => self.skip(c.len_utf8()),
            None => false,
        }
    }

    pub fn skip_byte(&mut self, b: u8) -> bool {
        if self.peek_byte() == Some(b) {
            self.rest = &self.rest[1..];
            true
        } else {
            false
        }
    }

    pub fn skip_string(&mut self, s: &str) -> bool {
        if !s.is_empty() && self.rest.starts_with(s) {
            self.rest = &self.rest[s.len()..];
            true
        } else {
            false
        }
    }

    pub fn next_string(&mut self, s: &str) -> Option<&'s str> {
        let start = self.rest;
        if self.skip_string(s) {
            Some(&start[..s.len()])
        } else {
            None
        }
    }

    /// Skips spaces and tabs.
    pub fn skip_hspace(&mut self) -> bool {
        !self.next_bytes_func(|b| b == b' ' || b == b'\t').is_empty()
    }

    pub fn test_byte_set(&self, set: &ByteSet) -> bool {
        self.peek_byte().map_or(false, |b| set.contains(b))
    }

    pub fn next_bytes_set(&mut self, set: &ByteSet) -> &'s str {
        self.next_bytes_func(|b| set.contains(b))
    }

    /// Consumes the longest prefix whose bytes all satisfy `pred`.
    ///
    /// The prefix is shortened to the nearest character boundary, so a
    /// predicate that accepts only some bytes of a multibyte character
    /// never splits it.
    pub fn next_bytes_func(&mut self, pred: impl Fn(u8) -> bool) -> &'s str {
        let bytes = self.rest.as_bytes();
        let mut end = bytes.iter().position(|&b| !pred(b)).unwrap_or(bytes.len());
        while !self.rest.is_char_boundary(end) {
            end -= 1;
        }
        let (prefix, rest) = self.rest.split_at(end);
        self.rest = rest;
        prefix
    }

    /// Consumes a match of `re`, which must match at the current position.
    pub fn skip_regex(&mut self, re: &Regex) -> bool {
        match re.find(self.rest) {
            Some(m) if m.start() == 0 && m.end() > 0 => {
                self.rest = &self.rest[m.end()..];
                true
            }
            _ => false,
        }
    }

    /// Like [`Lexer::skip_regex`], but returns the capture groups.
    pub fn next_regex(&mut self, re: &Regex) -> Option<Captures<'s>> {
        let rest = self.rest;
        let caps = re.captures(rest)?;
        let whole = caps.get(0)?;
        if whole.start() != 0 {
            return None;
        }
        self.rest = &rest[whole.end()..];
        Some(caps)
    }

    pub fn mark(&self) -> LexerMark<'s> {
        LexerMark(self.rest)
    }

    pub fn reset(&mut self, mark: LexerMark<'s>) {
        self.rest = mark.0;
    }

    /// The text consumed since `mark` was taken.
    pub fn since(&self, mark: LexerMark<'s>) -> &'s str {
        &mark.0[..mark.0.len() - self.rest.len()]
    }
}

// =============================================================================
// EXPRESSION CURSOR
// =============================================================================

/// The cursor contract shared by raw text and pre-split token lists.
///
/// Grammar code written against this trait runs unchanged over a source
/// string (expressions are lexed on the fly) and over a list of tokens
/// (expressions come out whole).
pub trait ExprCursor<'s> {
    type Mark: Copy;

    fn mark(&self) -> Self::Mark;
    fn reset(&mut self, mark: Self::Mark);
    fn since(&self, mark: Self::Mark) -> Cow<'s, str>;
    fn rest(&self) -> Cow<'s, str>;
    fn eof(&self) -> bool;
    fn peek_byte(&self) -> Option<u8>;
    /// Skips `n` bytes of literal text.
    fn skip(&mut self, n: usize);
    fn skip_byte(&mut self, b: u8) -> bool;
    fn skip_string(&mut self, s: &str) -> bool;
    fn next_bytes_set(&mut self, set: &ByteSet) -> &'s str;
    fn skip_regex(&mut self, re: &Regex) -> bool;
    /// The expression at the current position, if there is one.
    fn next_expr(&mut self) -> Option<Expr>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_set_ranges() {
        let set = ByteSet::new("A-Za-z0-9_+-");
        assert!(set.contains(b'a'));
        assert!(set.contains(b'Z'));
        assert!(set.contains(b'5'));
        assert!(set.contains(b'_'));
        assert!(set.contains(b'+'));
        assert!(set.contains(b'-'));
        assert!(!set.contains(b'.'));
        assert!(!set.contains(b','));
        assert!(set.inverse().contains(b'.'));
    }

    #[test]
    fn test_mark_reset_since() {
        let mut lexer = Lexer::new("hello world");
        let mark = lexer.mark();
        assert_eq!(lexer.next_bytes_set(&ByteSet::new("a-z")), "hello");
        assert!(lexer.skip_hspace());
        assert_eq!(lexer.since(mark), "hello ");
        lexer.reset(mark);
        assert_eq!(lexer.rest(), "hello world");
    }

    #[test]
    fn test_next_bytes_func_keeps_char_boundaries() {
        let mut lexer = Lexer::new("aé$");
        let text = lexer.next_bytes_func(|b| b != b'$' && b != 0xA9);
        assert_eq!(text, "a");
        assert_eq!(lexer.rest(), "é$");
        assert!(lexer.skip_char());
        assert_eq!(lexer.rest(), "$");
    }

    #[test]
    fn test_skip_regex_requires_anchor_position() {
        let re = Regex::new(r"\d+").unwrap();
        let mut lexer = Lexer::new("abc123");
        assert!(!lexer.skip_regex(&re));
        assert_eq!(lexer.rest(), "abc123");
        lexer.skip(3);
        assert!(lexer.skip_regex(&re));
        assert!(lexer.eof());
    }

    #[test]
    fn test_next_regex_captures() {
        let re = Regex::new(r"^(<=|<|==)[\t ]*(\d+)").unwrap();
        let mut lexer = Lexer::new("<= 5 rest");
        let caps = lexer.next_regex(&re).unwrap();
        assert_eq!(&caps[1], "<=");
        assert_eq!(&caps[2], "5");
        assert_eq!(lexer.rest(), " rest");
    }

    #[test]
    fn test_regcomp_caches_and_rejects() {
        let first = regcomp("^a+b$").unwrap();
        let second = regcomp("^a+b$").unwrap();
        assert!(first.is_match("aab"));
        assert_eq!(first.as_str(), second.as_str());
        assert!(regcomp("(unclosed").is_none());
    }
}
