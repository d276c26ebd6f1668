//! Token Stream Cursor
//!
//! Walks a list of already-lexed tokens with the same mark/reset contract as
//! the text cursor. Literal tokens are scanned byte by byte; expression
//! tokens only ever come out whole, through [`ExprCursor::next_expr`].

use regex_lite::Regex;
use std::borrow::Cow;

use crate::ast::types::{Expr, Token};
use crate::parser::cursor::{ByteSet, ExprCursor, Lexer};

/// A cursor over a token list.
#[derive(Debug, Clone, Copy)]
pub struct TokenCursor<'t> {
    /// The unread part of the current literal token.
    lexer: Lexer<'t>,
    /// The tokens after the current literal token.
    tokens: &'t [Token],
}

/// A position in a [`TokenCursor`].
#[derive(Debug, Clone, Copy)]
pub struct TokenMark<'t> {
    rest: &'t str,
    tokens: &'t [Token],
}

impl<'t> TokenCursor<'t> {
    pub fn new(tokens: &'t [Token]) -> Self {
        let mut cursor = TokenCursor {
            lexer: Lexer::new(""),
            tokens,
        };
        cursor.load();
        cursor
    }

    /// Moves to the next literal token once the current one is drained.
    fn load(&mut self) {
        while self.lexer.eof() {
            match self.tokens.split_first() {
                Some((first, rest)) if first.expr.is_none() => {
                    self.lexer = Lexer::new(&first.text);
                    self.tokens = rest;
                }
                _ => break,
            }
        }
    }

    /// The tokens that have not been entered yet.
    pub fn remaining_tokens(&self) -> &'t [Token] {
        self.tokens
    }

    fn rest_len(&self) -> usize {
        self.lexer.rest().len() + self.tokens.iter().map(|t| t.text.len()).sum::<usize>()
    }
}

impl<'t> ExprCursor<'t> for TokenCursor<'t> {
    type Mark = TokenMark<'t>;

    fn mark(&self) -> Self::Mark {
        TokenMark {
            rest: self.lexer.rest(),
            tokens: self.tokens,
        }
    }

    fn reset(&mut self, mark: Self::Mark) {
        self.lexer = Lexer::new(mark.rest);
        self.tokens = mark.tokens;
    }

    fn since(&self, mark: Self::Mark) -> Cow<'t, str> {
        if mark.tokens.len() == self.tokens.len() {
            return Cow::Borrowed(&mark.rest[..mark.rest.len() - self.lexer.rest().len()]);
        }
        let mut text = mark.rest.to_string();
        for token in &mark.tokens[..mark.tokens.len() - self.tokens.len()] {
            text.push_str(&token.text);
        }
        text.truncate(text.len() - self.lexer.rest().len());
        Cow::Owned(text)
    }

    fn rest(&self) -> Cow<'t, str> {
        if self.tokens.is_empty() {
            return Cow::Borrowed(self.lexer.rest());
        }
        let mut text = String::with_capacity(self.rest_len());
        text.push_str(self.lexer.rest());
        for token in self.tokens {
            text.push_str(&token.text);
        }
        Cow::Owned(text)
    }

    fn eof(&self) -> bool {
        self.lexer.eof() && self.tokens.is_empty()
    }

    /// The next byte of literal text; `None` in front of an expression.
    fn peek_byte(&self) -> Option<u8> {
        self.lexer.peek_byte()
    }

    /// Skips `n` bytes of the current literal token.
    ///
    /// # Panics
    ///
    /// Panics if that would enter the following expression.
    fn skip(&mut self, n: usize) {
        if n > self.lexer.rest().len() {
            panic!(
                "cannot skip {} bytes, only {} remain before the next expression",
                n,
                self.lexer.rest().len()
            );
        }
        self.lexer.skip(n);
        self.load();
    }

    fn skip_byte(&mut self, b: u8) -> bool {
        let ok = self.lexer.skip_byte(b);
        self.load();
        ok
    }

    fn skip_string(&mut self, s: &str) -> bool {
        let ok = self.lexer.skip_string(s);
        self.load();
        ok
    }

    fn next_bytes_set(&mut self, set: &ByteSet) -> &'t str {
        let text = self.lexer.next_bytes_set(set);
        self.load();
        text
    }

    fn skip_regex(&mut self, re: &Regex) -> bool {
        let ok = self.lexer.skip_regex(re);
        self.load();
        ok
    }

    fn next_expr(&mut self) -> Option<Expr> {
        if !self.lexer.eof() {
            return None;
        }
        let (first, rest) = self.tokens.split_first()?;
        let expr = first.expr.clone()?;
        self.tokens = rest;
        self.load();
        Some(expr)
    }
}
