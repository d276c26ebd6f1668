//! Expression Lexer
//!
//! Splits text into literal runs and expressions, and parses a single
//! expression with its modifier chain. It handles:
//! - `${VAR}`, `$(VAR)` and the bare `$X` forms
//! - nested expressions inside variable names and modifier arguments
//! - every modifier bmake knows, including the chaining of `:S`/`:C`
//!   without a separating colon
//!
//! Malformed input never stops the lexer. It reports a diagnostic, takes
//! the best-effort extent of the construct, and continues.

use regex_lite::Regex;
use std::borrow::Cow;

use crate::ast::modifier::{Modifier, ModifierKind, Subst};
use crate::ast::types::{Expr, Token};
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::parser::cursor::{ByteSet, ExprCursor, Lexer, LexerMark};
use crate::parser::types::{
    ALNUM, ALNUM_DOT, ALNUM_U, ASSIGN_MODIFIER, BUILTIN_VARS, INDEX_MODIFIER, KEYWORD_MODIFIERS,
    MULTI_PART_PREFIX, NUMERIC_SEPARATOR, VARBASE_CHARS, VARPARAM_CHARS,
};

/// Splits `text` into tokens, returning them and the text that could not
/// be tokenized.
pub fn tokenize<'s>(text: &'s str, diag: Option<&mut dyn DiagnosticSink>) -> (Vec<Token>, &'s str) {
    let mut lexer = MkLexer::new(text, diag);
    let tokens = lexer.tokens();
    (tokens, lexer.rest())
}

/// The lexer for expressions in makefile text.
pub struct MkLexer<'s, 'd> {
    lexer: Lexer<'s>,
    diag: Option<&'d mut dyn DiagnosticSink>,
}

impl<'s, 'd> MkLexer<'s, 'd> {
    pub fn new(text: &'s str, diag: Option<&'d mut dyn DiagnosticSink>) -> Self {
        MkLexer {
            lexer: Lexer::new(text),
            diag,
        }
    }

    /// The underlying cursor, for grammar code that mixes raw scanning with
    /// expression parsing.
    pub fn cursor(&mut self) -> &mut Lexer<'s> {
        &mut self.lexer
    }

    pub fn rest(&self) -> &'s str {
        self.lexer.rest()
    }

    pub fn eof(&self) -> bool {
        self.lexer.eof()
    }

    fn report(&mut self, diagnostic: Diagnostic) {
        if let Some(sink) = self.diag.as_deref_mut() {
            sink.report(diagnostic);
        }
    }

    // =========================================================================
    // TOKENS
    // =========================================================================

    /// Consumes literal text and expressions until the end of the input or
    /// until a `$` that starts neither.
    pub fn tokens(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        while !self.lexer.eof() {
            let mark = self.lexer.mark();
            if let Some(expr) = self.expr() {
                tokens.push(Token::expression(self.lexer.since(mark), expr));
                continue;
            }

            while !self.lexer.next_bytes_func(|b| b != b'$').is_empty() || self.lexer.skip_string("$$") {}
            let text = self.lexer.since(mark);
            if text.is_empty() {
                break;
            }
            tokens.push(Token::literal(text));
        }
        tokens
    }

    // =========================================================================
    // EXPRESSIONS
    // =========================================================================

    /// Parses the expression at the current position.
    ///
    /// Returns `None` and leaves the position unchanged if there is none;
    /// this includes the escaped dollar `$$`.
    pub fn expr(&mut self) -> Option<Expr> {
        let mark = self.lexer.mark();
        if !self.lexer.skip_byte(b'$') {
            return None;
        }

        match self.lexer.peek_byte() {
            Some(opener @ (b'{' | b'(')) => {
                self.lexer.skip(1);
                Some(self.expr_brace(mark, opener == b'('))
            }
            Some(b) if BUILTIN_VARS.contains(b) => {
                self.lexer.skip(1);
                Some(Expr::var((b as char).to_string()))
            }
            Some(b) if ALNUM_U.contains(b) => Some(self.expr_alnum()),
            _ => {
                self.lexer.reset(mark);
                None
            }
        }
    }

    fn expr_brace(&mut self, mark: LexerMark<'s>, paren: bool) -> Expr {
        let closer = if paren { b')' } else { b'}' };

        let varname_mark = self.lexer.mark();
        let varname = self.varname();
        self.expr_text(closer);
        let var_expr = self.lexer.since(varname_mark);

        let modifiers = self.modifiers(var_expr, closer);
        let closed = self.lexer.skip_byte(closer);
        let expr = Expr::new(var_expr, modifiers);

        if !closed {
            self.report(Diagnostic::warning(format!(
                "Missing closing \"{}\" for \"{}\".",
                closer as char, var_expr
            )));
        }

        if paren && closed {
            let paren_text = self.lexer.since(mark);
            let brace_text = format!("${{{}}}", &paren_text[2..paren_text.len() - 1]);
            self.report(
                Diagnostic::warning(format!(
                    "Please use curly braces {{}} instead of round parentheses () for {}.",
                    var_expr
                ))
                .with_autofix(
                    paren_text,
                    brace_text,
                    &[
                        "Both forms are accepted by make,",
                        "but curly braces are the conventional form",
                        "and cannot be confused with shell command substitution.",
                    ],
                ),
            );
        }

        if var_expr.len() > varname.len() && !expr.is_expression() {
            self.report(Diagnostic::warning(format!(
                "Invalid part \"{}\" after variable name \"{}\".",
                &var_expr[varname.len()..],
                varname
            )));
        }

        expr
    }

    /// `$VAR` means `${V}AR`. Only the first character is the variable name.
    fn expr_alnum(&mut self) -> Expr {
        let mut probe = self.lexer;
        let apparent = probe.next_bytes_set(&ALNUM_U);
        self.lexer.skip(1);

        let message = format!(
            "${0} is ambiguous. Use ${{{0}}} if you mean a Make variable or $${0} if you mean a shell variable.",
            apparent
        );
        if apparent.len() > 1 {
            self.report(Diagnostic::error(message).with_explanation(&[
                "Only the first character after the dollar is the variable name.",
                "Everything following it is normal text,",
                "even if it looks like a variable name to human readers.",
            ]));
        } else {
            self.report(Diagnostic::warning(message).with_explanation(&[
                "In its current form, this variable is parsed as a Make variable.",
                "For human readers though, $x looks more like a shell variable than a Make variable,",
                "since Make variables are usually written using braces (BSD-style)",
                "or parentheses (GNU-style).",
            ]));
        }

        Expr::var(&apparent[..1])
    }

    /// Parses a variable name, which may contain nested expressions, such as
    /// `VAR.${param}` or `SITES_${file}`.
    pub fn varname(&mut self) -> &'s str {
        let mark = self.lexer.mark();
        self.lexer.skip_byte(b'.');
        while !self.lexer.next_bytes_set(&VARBASE_CHARS).is_empty() || self.expr().is_some() {}

        if self.lexer.skip_byte(b'.') || self.lexer.since(mark).starts_with(MULTI_PART_PREFIX) {
            while !self.lexer.next_bytes_set(&VARPARAM_CHARS).is_empty() || self.expr().is_some() {}
        }
        self.lexer.since(mark)
    }

    /// Parses free text up to the next unescaped `:` or `closer`.
    fn expr_text(&mut self, closer: u8) -> &'s str {
        let mark = self.lexer.mark();
        loop {
            if !self
                .lexer
                .next_bytes_func(|b| b != b'$' && b != b':' && b != closer && b != b'\\')
                .is_empty()
                || self.lexer.skip_string("$$")
                || self.skip_escape()
                || self.expr().is_some()
            {
                continue;
            }
            break;
        }
        self.lexer.since(mark)
    }

    /// Skips a backslash and the character after it.
    fn skip_escape(&mut self) -> bool {
        if self.lexer.peek_byte() == Some(b'\\') && self.lexer.rest().len() >= 2 {
            self.lexer.skip(1);
            self.lexer.skip_char();
            true
        } else {
            false
        }
    }

    // =========================================================================
    // MODIFIERS
    // =========================================================================

    /// Parses the modifier chain after the variable name.
    pub(crate) fn modifiers(&mut self, varname: &str, closer: u8) -> Vec<Modifier> {
        let mut modifiers = Vec::new();
        // :S and :C may be followed by the next modifier without a colon.
        let mut may_omit_colon = false;
        while self.lexer.skip_byte(b':') || may_omit_colon {
            may_omit_colon = false;
            if let Some(modifier) = self.modifier(varname, closer) {
                may_omit_colon = modifier.is_chainable();
                modifiers.push(modifier);
            }
        }
        modifiers
    }

    fn modifier(&mut self, varname: &str, closer: u8) -> Option<Modifier> {
        let mark = self.lexer.mark();

        match self.lexer.peek_byte() {
            Some(b'E' | b'H' | b'L' | b'O' | b'Q' | b'R' | b'T' | b's' | b't' | b'u') => {
                let word = self.lexer.next_bytes_set(&ALNUM);
                let delimited = match self.lexer.peek_byte() {
                    None | Some(b':') => true,
                    Some(b) => b == closer,
                };
                if delimited && KEYWORD_MODIFIERS.contains(&word) {
                    return Some(Modifier::keyword(word));
                }
                if word.starts_with("ts") {
                    return Some(self.modifier_ts(mark, varname, closer));
                }
            }

            Some(first @ (b'D' | b'U')) => {
                self.lexer.skip(1);
                let value = self.expr_text(closer).to_string();
                let kind = if first == b'D' {
                    ModifierKind::Defined(value)
                } else {
                    ModifierKind::Undefined(value)
                };
                return Some(Modifier::new(self.lexer.since(mark), kind));
            }

            Some(b'M' | b'N') => return Some(self.modifier_match(closer)),

            Some(b'C' | b'S') => {
                if let Some(subst) = self.modifier_subst(closer) {
                    return Some(Modifier::new(self.lexer.since(mark), ModifierKind::Subst(subst)));
                }
            }

            Some(b'@') => {
                if let Some((var, body)) = self.modifier_loop(varname) {
                    return Some(Modifier::new(self.lexer.since(mark), ModifierKind::Loop { var, body }));
                }
            }

            Some(b'[') => {
                if self.lexer.skip_regex(&INDEX_MODIFIER) {
                    let text = self.lexer.since(mark);
                    let selector = text[1..text.len() - 1].to_string();
                    return Some(Modifier::new(text, ModifierKind::Index(selector)));
                }
            }

            Some(b'?') => {
                self.lexer.skip(1);
                let then = self.expr_text(closer).to_string();
                if self.lexer.skip_byte(b':') {
                    let otherwise = self.expr_text(closer).to_string();
                    return Some(Modifier::new(
                        self.lexer.since(mark),
                        ModifierKind::Ternary { then, otherwise },
                    ));
                }
            }

            Some(b':') => {
                if let Some(op) = self.lexer.next_regex(&ASSIGN_MODIFIER).map(|caps| caps[0].to_string()) {
                    return Some(self.modifier_assign(mark, op, varname, closer));
                }
            }

            _ => {}
        }

        self.lexer.reset(mark);
        let (text, noexpr) = self.modifier_sysv(closer);
        if text.contains('=') {
            self.check_sysv_colon(&noexpr);
            let (from, to) = split_sysv(text);
            return Some(Modifier::new(text, ModifierKind::SysV { from, to }));
        }

        self.lexer.reset(mark);
        if let Some(command) = self.modifier_shell(closer) {
            return Some(Modifier::new(self.lexer.since(mark), ModifierKind::Shell(command)));
        }

        self.lexer.reset(mark);
        let invalid = self.expr_text(closer);
        if !invalid.is_empty() {
            self.report(Diagnostic::warning(format!(
                "Invalid variable modifier \"{}\" for \"{}\".",
                invalid, varname
            )));
        }
        None
    }

    /// Parses `:ts<separator>`. The separator is empty, a single character,
    /// or a backslash followed by a decimal number.
    fn modifier_ts(&mut self, mark: LexerMark<'s>, varname: &str, closer: u8) -> Modifier {
        self.lexer.reset(mark);
        self.lexer.skip(2);

        let sep_mark = self.lexer.mark();
        let rest = self.lexer.rest().as_bytes();
        let first = rest.first().copied();
        let second = rest.get(1).copied();
        match first {
            None => {}
            Some(b) if b != closer && (second == Some(closer) || second == Some(b':')) => {
                self.lexer.skip_char();
            }
            Some(b) if b == closer || b == b':' => {}
            Some(_) => {
                let sep = self.expr_text(closer);
                if !NUMERIC_SEPARATOR.is_match(sep) {
                    self.report(
                        Diagnostic::warning(format!(
                            "Invalid separator \"{}\" for :ts modifier of \"{}\".",
                            sep, varname
                        ))
                        .with_explanation(&[
                            "The separator for the :ts modifier must be either a single character",
                            "or a backslash followed by a decimal number.",
                        ]),
                    );
                }
            }
        }

        let sep = self.lexer.since(sep_mark).to_string();
        Modifier::new(self.lexer.since(mark), ModifierKind::Separator(sep))
    }

    /// Parses `:Mpattern` or `:Npattern`.
    ///
    /// A colon ends the pattern only outside nested expressions. A backslash
    /// before `:` or one of the expression's own delimiters escapes it and is
    /// removed from the pattern; an escaped opening delimiter does not count
    /// towards the nesting.
    fn modifier_match(&mut self, closer: u8) -> Modifier {
        let mark = self.lexer.mark();
        let negated = self.lexer.peek_byte() == Some(b'N');
        self.lexer.skip(1);
        let opener = if closer == b'}' { b'{' } else { b'(' };

        let rest = self.lexer.rest();
        let bytes = rest.as_bytes();
        let mut pattern = String::new();
        let mut literal_start = 0;
        let mut nesting = 1;
        let mut i = 0;
        while i < bytes.len() {
            let b = bytes[i];
            if b == b'\\' {
                if let Some(&next) = bytes.get(i + 1) {
                    if next == b':' || next == opener || next == closer {
                        pattern.push_str(&rest[literal_start..i]);
                        literal_start = i + 1;
                        i += 2;
                        continue;
                    }
                }
            }
            if b == opener {
                nesting += 1;
            } else if b == closer {
                if nesting == 1 {
                    break;
                }
                nesting -= 1;
            } else if b == b':' && nesting == 1 {
                break;
            }
            i += 1;
        }
        pattern.push_str(&rest[literal_start..i]);
        self.lexer.skip(i);

        Modifier::new(self.lexer.since(mark), ModifierKind::Match { negated, pattern })
    }

    /// Parses `:S,from,to,options` or `:C,from,to,options`, with any
    /// separator except the closing delimiter.
    fn modifier_subst(&mut self, closer: u8) -> Option<Subst> {
        let regex = self.lexer.peek_byte() == Some(b'C');
        self.lexer.skip(1);

        let sep = match self.lexer.peek_byte() {
            Some(b) if b != closer && b.is_ascii() => b,
            _ => return None,
        };
        self.lexer.skip(1);

        let from_mark = self.lexer.mark();
        self.lexer.skip_byte(b'^');
        self.subst_part(sep);
        self.lexer.skip_byte(b'$');
        let from = unescape_separator(self.lexer.since(from_mark), sep);

        if !self.lexer.skip_byte(sep) {
            return None;
        }

        let to_mark = self.lexer.mark();
        self.subst_part(sep);
        let to = unescape_separator(self.lexer.since(to_mark), sep);

        if !self.lexer.skip_byte(sep) {
            return None;
        }

        let options = self.lexer.next_bytes_func(|b| b == b'1' || b == b'g' || b == b'W');

        Some(Subst {
            regex,
            separator: sep as char,
            from,
            to,
            options: options.to_string(),
        })
    }

    fn subst_part(&mut self, sep: u8) {
        loop {
            if self.expr().is_some()
                || self.lexer.skip_string("$$")
                || !self
                    .lexer
                    .next_bytes_func(|b| b != sep && b != b'$' && b != b'\\')
                    .is_empty()
                || self.skip_escape()
            {
                continue;
            }
            break;
        }
    }

    /// Parses `:@var@body@`. A missing final `@` is reported, but the
    /// modifier still counts as parsed.
    fn modifier_loop(&mut self, varname: &str) -> Option<(String, String)> {
        self.lexer.skip(1);

        let var = self.lexer.next_bytes_set(&ALNUM_DOT);
        if var.is_empty() || !self.lexer.skip_byte(b'@') {
            return None;
        }

        let body_mark = self.lexer.mark();
        loop {
            if self.expr().is_some()
                || self.lexer.skip_string("$$")
                || !self
                    .lexer
                    .next_bytes_func(|b| b != b'$' && b != b'@' && b != b'\\')
                    .is_empty()
                || self.skip_escape()
            {
                continue;
            }
            break;
        }
        let body = self.lexer.since(body_mark);

        if !self.lexer.skip_byte(b'@') {
            self.report(Diagnostic::warning(format!(
                "Modifier ${{{}:@{}@...@}} is missing the final \"@\".",
                varname, var
            )));
        }

        Some((var.to_string(), body.to_string()))
    }

    /// Parses `::=value` and its siblings, which assign to another variable
    /// as a side effect of evaluating this one.
    fn modifier_assign(&mut self, mark: LexerMark<'s>, op: String, varname: &str, closer: u8) -> Modifier {
        let value = self.expr_text(closer).to_string();
        let text = self.lexer.since(mark);

        if varname.is_empty() {
            self.report(Diagnostic::error(format!(
                "The assignment modifier \":{}\" has no variable name to assign to.",
                op
            )));
        } else {
            self.report(
                Diagnostic::error(format!("Assignment modifiers like \":{}\" must not be used at all.", op))
                    .with_explanation(&[
                        "These modifiers modify other variables when they are evaluated.",
                        "This makes it harder to see at a glance what a variable contains.",
                    ]),
            );
        }

        Modifier::new(text, ModifierKind::Assign { op, value })
    }

    /// Parses the text of a `:from=to` modifier, which extends to the end of
    /// the expression, colons included.
    ///
    /// The second value is the same text with all nested expressions
    /// removed.
    fn modifier_sysv(&mut self, closer: u8) -> (&'s str, String) {
        let mark = self.lexer.mark();
        let mut noexpr = String::new();
        loop {
            let run = self.lexer.next_bytes_func(|b| b != b'$' && b != closer && b != b'\\');
            if !run.is_empty() {
                noexpr.push_str(run);
                continue;
            }
            if self.lexer.skip_string("$$") {
                noexpr.push_str("$$");
                continue;
            }
            let escape_mark = self.lexer.mark();
            if self.skip_escape() {
                noexpr.push_str(self.lexer.since(escape_mark));
                continue;
            }
            if self.expr().is_some() {
                continue;
            }
            break;
        }
        (self.lexer.since(mark), noexpr)
    }

    fn check_sysv_colon(&mut self, noexpr: &str) {
        let bytes = noexpr.as_bytes();
        let stray = (0..bytes.len()).find(|&i| bytes[i] == b':' && (i == 0 || bytes[i - 1] != b'='));
        if let Some(i) = stray {
            self.report(
                Diagnostic::warning(format!("The text \"{}\" looks like a modifier but isn't.", &noexpr[i..]))
                    .with_explanation(&[
                        "The :from=to modifier consumes all the text until the end of the expression.",
                        "There cannot be any further modifiers after it.",
                    ]),
            );
        }
    }

    /// Parses `:!command!`.
    fn modifier_shell(&mut self, closer: u8) -> Option<String> {
        if !self.lexer.skip_byte(b'!') {
            return None;
        }
        let command_mark = self.lexer.mark();
        loop {
            if self.expr().is_some()
                || self.lexer.skip_string("$$")
                || !self
                    .lexer
                    .next_bytes_func(|b| b != b'!' && b != b'$' && b != closer)
                    .is_empty()
            {
                continue;
            }
            break;
        }
        let command = self.lexer.since(command_mark).to_string();
        if !self.lexer.skip_byte(b'!') {
            return None;
        }
        Some(command)
    }
}

fn unescape_separator(text: &str, sep: u8) -> String {
    let sep = (sep as char).to_string();
    text.replace(&format!("\\{}", sep), &sep)
}

/// Splits the text of a `:from=to` modifier at the first `=` outside of
/// nested expressions.
fn split_sysv(text: &str) -> (String, String) {
    let (tokens, rest) = tokenize(text, None);
    let mut from = String::new();
    let mut to = String::new();
    let mut seen = false;
    for token in &tokens {
        if seen {
            to.push_str(&token.text);
            continue;
        }
        match (&token.expr, token.text.find('=')) {
            (None, Some(i)) => {
                from.push_str(&token.text[..i]);
                to.push_str(&token.text[i + 1..]);
                seen = true;
            }
            _ => from.push_str(&token.text),
        }
    }
    to.push_str(rest);
    (from, to)
}

impl<'s, 'd> ExprCursor<'s> for MkLexer<'s, 'd> {
    type Mark = LexerMark<'s>;

    fn mark(&self) -> Self::Mark {
        self.lexer.mark()
    }

    fn reset(&mut self, mark: Self::Mark) {
        self.lexer.reset(mark);
    }

    fn since(&self, mark: Self::Mark) -> Cow<'s, str> {
        Cow::Borrowed(self.lexer.since(mark))
    }

    fn rest(&self) -> Cow<'s, str> {
        Cow::Borrowed(self.lexer.rest())
    }

    fn eof(&self) -> bool {
        self.lexer.eof()
    }

    fn peek_byte(&self) -> Option<u8> {
        self.lexer.peek_byte()
    }

    fn skip(&mut self, n: usize) {
        self.lexer.skip(n);
    }

    fn skip_byte(&mut self, b: u8) -> bool {
        self.lexer.skip_byte(b)
    }

    fn skip_string(&mut self, s: &str) -> bool {
        self.lexer.skip_string(s)
    }

    fn next_bytes_set(&mut self, set: &ByteSet) -> &'s str {
        self.lexer.next_bytes_set(set)
    }

    fn skip_regex(&mut self, re: &Regex) -> bool {
        self.lexer.skip_regex(re)
    }

    fn next_expr(&mut self) -> Option<Expr> {
        self.expr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Severity;

    fn lex(text: &str) -> (Vec<Token>, String, Vec<Diagnostic>) {
        let mut diags: Vec<Diagnostic> = Vec::new();
        let (tokens, rest) = tokenize(text, Some(&mut diags));
        (tokens, rest.to_string(), diags)
    }

    fn expr(text: &str) -> (Expr, Vec<Diagnostic>) {
        let mut diags: Vec<Diagnostic> = Vec::new();
        let mut lexer = MkLexer::new(text, Some(&mut diags));
        let expr = lexer.expr().expect("expression");
        assert_eq!(lexer.rest(), "", "unparsed rest of {}", text);
        drop(lexer);
        (expr, diags)
    }

    fn mods(expr: &Expr) -> Vec<&str> {
        expr.modifiers.iter().map(|m| m.text()).collect()
    }

    fn messages(diags: &[Diagnostic]) -> Vec<String> {
        diags.iter().map(|d| d.to_string()).collect()
    }

    #[test]
    fn test_tokens_literal_and_expressions() {
        let (tokens, rest, diags) = lex("prefix ${VAR} middle $${shell} $@ end");
        assert_eq!(rest, "");
        assert!(diags.is_empty());
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["prefix ", "${VAR}", " middle $${shell} ", "$@", " end"]);
        assert_eq!(tokens[1].expr, Some(Expr::var("VAR")));
        assert_eq!(tokens[3].expr, Some(Expr::var("@")));
    }

    #[test]
    fn test_tokens_stop_at_lone_dollar() {
        let (tokens, rest, _) = lex("abc$\"def");
        assert_eq!(tokens, vec![Token::literal("abc")]);
        assert_eq!(rest, "$\"def");
    }

    #[test]
    fn test_escaped_dollar_is_not_an_expression() {
        let mut lexer = MkLexer::new("$$VAR", None);
        assert!(lexer.expr().is_none());
        assert_eq!(lexer.rest(), "$$VAR");
    }

    #[test]
    fn test_nested_varname() {
        let (e, diags) = expr("${A.${B.${C.${D}}}}");
        assert_eq!(e.varname, "A.${B.${C.${D}}}");
        assert!(e.modifiers.is_empty());
        assert!(diags.is_empty());
    }

    #[test]
    fn test_multi_part_varname() {
        let (e, diags) = expr("${SITES_${file:T}}");
        assert_eq!(e.varname, "SITES_${file:T}");
        assert!(diags.is_empty());
    }

    #[test]
    fn test_dotted_varname() {
        let (e, _) = expr("${.CURDIR}");
        assert_eq!(e.varname, ".CURDIR");
        let (e, _) = expr("${PKG_OPTIONS.pkg-name:Mx11}");
        assert_eq!(e.varname, "PKG_OPTIONS.pkg-name");
        assert_eq!(mods(&e), vec!["Mx11"]);
    }

    #[test]
    fn test_parenthesized_offers_autofix() {
        let (e, diags) = expr("$(VAR:Q)");
        assert_eq!(e, expr("${VAR:Q}").0);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].severity, Severity::Warning);
        let fix = diags[0].autofix.as_ref().unwrap();
        assert_eq!(fix.old, "$(VAR:Q)");
        assert_eq!(fix.new, "${VAR:Q}");
    }

    #[test]
    fn test_missing_closer() {
        let mut diags: Vec<Diagnostic> = Vec::new();
        let mut lexer = MkLexer::new("${VAR:Q", Some(&mut diags));
        let e = lexer.expr().unwrap();
        drop(lexer);
        assert_eq!(e.varname, "VAR");
        assert_eq!(mods(&e), vec!["Q"]);
        assert_eq!(messages(&diags), vec!["WARN: Missing closing \"}\" for \"VAR\"."]);
    }

    #[test]
    fn test_missing_closer_paren_has_no_autofix() {
        let mut diags: Vec<Diagnostic> = Vec::new();
        MkLexer::new("$(VAR", Some(&mut diags)).expr().unwrap();
        assert_eq!(messages(&diags), vec!["WARN: Missing closing \")\" for \"VAR\"."]);
    }

    #[test]
    fn test_invalid_part_after_varname() {
        let (e, diags) = expr("${VAR&&x}");
        assert_eq!(e.varname, "VAR&&x");
        assert_eq!(
            messages(&diags),
            vec!["WARN: Invalid part \"&&x\" after variable name \"VAR\"."]
        );
    }

    #[test]
    fn test_dynamic_varname_is_not_invalid() {
        let (e, diags) = expr("${a b c:L}");
        assert_eq!(e.varname, "a b c");
        assert!(diags.is_empty());
        let (e, diags) = expr("${VAR == yes:?on:off}");
        assert_eq!(mods(&e), vec!["?on:off"]);
        assert!(diags.is_empty());
    }

    #[test]
    fn test_bare_single_letter() {
        let (tokens, _, diags) = lex("$VAR");
        assert_eq!(tokens[0].expr, Some(Expr::var("V")));
        assert_eq!(tokens[1], Token::literal("AR"));
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].severity, Severity::Error);
        assert!(diags[0].message.starts_with("$VAR is ambiguous."));

        let (tokens, _, diags) = lex("$x/");
        assert_eq!(tokens[0].expr, Some(Expr::var("x")));
        assert_eq!(diags[0].severity, Severity::Warning);
    }

    #[test]
    fn test_builtin_variables() {
        for text in ["$@", "$<", "$>", "$!", "$%", "$?", "$*", "$ "] {
            let (e, diags) = expr(text);
            assert_eq!(e.varname, &text[1..]);
            assert!(diags.is_empty());
        }
    }

    #[test]
    fn test_keyword_modifiers() {
        let (e, diags) = expr("${VAR:E:H:L:O:Ox:Q:R:T:sh:tA:tW:tl:tu:tw:u}");
        assert_eq!(
            mods(&e),
            vec!["E", "H", "L", "O", "Ox", "Q", "R", "T", "sh", "tA", "tW", "tl", "tu", "tw", "u"]
        );
        assert!(diags.is_empty());
    }

    #[test]
    fn test_subst_chaining_without_colon() {
        let (e, diags) = expr("${VAR:S/a/b/S/c/d/}");
        assert_eq!(mods(&e), vec!["S/a/b/", "S/c/d/"]);
        assert!(diags.is_empty());

        let (e, _) = expr("${VAR:C/a/b/gS,x,y,1}");
        assert_eq!(mods(&e), vec!["C/a/b/g", "S,x,y,1"]);
    }

    #[test]
    fn test_chaining_requires_colon_after_other_modifiers() {
        let (e, diags) = expr("${VAR:Q:S/a/b/}");
        assert_eq!(mods(&e), vec!["Q", "S/a/b/"]);
        assert!(diags.is_empty());

        let (e, diags) = expr("${VAR:QS/a/b/}");
        assert!(e.modifiers.is_empty());
        assert_eq!(
            messages(&diags),
            vec!["WARN: Invalid variable modifier \"QS/a/b/\" for \"VAR\"."]
        );
    }

    #[test]
    fn test_subst_with_too_many_fields() {
        let (e, diags) = expr("${VAR:S,a,b,c,d,e,f}");
        assert_eq!(e.varname, "VAR");
        assert_eq!(mods(&e), vec!["S,a,b,"]);
        assert_eq!(
            messages(&diags),
            vec!["WARN: Invalid variable modifier \"c,d,e,f\" for \"VAR\"."]
        );
    }

    #[test]
    fn test_subst_anchors_and_nested() {
        let (e, diags) = expr("${VAR:S/^${PREFIX}//:S/.tar.gz$//}");
        assert_eq!(mods(&e), vec!["S/^${PREFIX}//", "S/.tar.gz$//"]);
        assert!(diags.is_empty());
        let subst = e.modifiers[0].subst_parts().unwrap();
        assert_eq!(subst.from, "^${PREFIX}");
        assert!(subst.left_anchored());
    }

    #[test]
    fn test_default_modifiers_take_text() {
        let (e, diags) = expr("${VAR:Ufallback value:Dyes}");
        assert_eq!(mods(&e), vec!["Ufallback value", "Dyes"]);
        assert_eq!(
            e.modifiers[0].kind(),
            &ModifierKind::Undefined("fallback value".to_string())
        );
        assert!(diags.is_empty());

        let (e, _) = expr("${:U${A}.${B}}");
        assert_eq!(e.varname, "");
        assert_eq!(mods(&e), vec!["U${A}.${B}"]);
    }

    #[test]
    fn test_match_modifier_nesting() {
        let (e, diags) = expr("${VAR:M${PATTERN:S,a,b,}:Q}");
        assert_eq!(mods(&e), vec!["M${PATTERN:S,a,b,}", "Q"]);
        assert!(diags.is_empty());
    }

    #[test]
    fn test_match_modifier_escapes() {
        let (e, _) = expr("${VAR:M*\\:*}");
        assert_eq!(e.modifiers[0].match_pattern(), Some((true, "*:*")));
        assert_eq!(e.modifiers[0].text(), "M*\\:*");

        let (e, _) = expr("${VAR:N\\}}");
        assert_eq!(e.modifiers[0].match_pattern(), Some((false, "}")));
    }

    #[test]
    fn test_match_modifier_escaped_opener_does_not_nest() {
        // The escaped "{" is not counted, so the first "}" ends the expression.
        let mut lexer = MkLexer::new("${VAR:M\\{}rest}", None);
        let e = lexer.expr().unwrap();
        assert_eq!(e.modifiers[0].match_pattern(), Some((true, "{")));
        assert_eq!(lexer.rest(), "rest}");
    }

    #[test]
    fn test_loop_modifier() {
        let (e, diags) = expr("${VAR:@f@${f}.c@}");
        assert_eq!(mods(&e), vec!["@f@${f}.c@"]);
        assert!(diags.is_empty());
    }

    #[test]
    fn test_loop_modifier_missing_final_at() {
        let mut diags: Vec<Diagnostic> = Vec::new();
        let mut lexer = MkLexer::new("${VAR:@f@${f}.c}", Some(&mut diags));
        let e = lexer.expr().unwrap();
        drop(lexer);
        assert_eq!(e.modifiers[0].loop_parts(), Some(("f", "${f}.c}")));
        assert_eq!(
            messages(&diags),
            vec![
                "WARN: Modifier ${VAR:@f@...@} is missing the final \"@\".",
                "WARN: Missing closing \"}\" for \"VAR\".",
            ]
        );
    }

    #[test]
    fn test_index_modifier() {
        let (e, diags) = expr("${VAR:[1]:[-1]:[2..3]:[#]}");
        assert_eq!(mods(&e), vec!["[1]", "[-1]", "[2..3]", "[#]"]);
        assert!(diags.is_empty());
    }

    #[test]
    fn test_ternary_modifier() {
        let (e, diags) = expr("${VAR:?yes:no}");
        assert_eq!(
            e.modifiers[0].kind(),
            &ModifierKind::Ternary {
                then: "yes".to_string(),
                otherwise: "no".to_string()
            }
        );
        assert!(diags.is_empty());
    }

    #[test]
    fn test_ts_modifier() {
        let (e, diags) = expr("${VAR:ts,:ts:}");
        assert_eq!(mods(&e), vec!["ts,", "ts:"]);
        assert!(diags.is_empty());

        let (e, diags) = expr("${VAR:ts\\012:ts}");
        assert_eq!(mods(&e), vec!["ts\\012", "ts"]);
        assert!(diags.is_empty());

        let (e, diags) = expr("${VAR:tsabc}");
        assert_eq!(mods(&e), vec!["tsabc"]);
        assert_eq!(
            messages(&diags),
            vec!["WARN: Invalid separator \"abc\" for :ts modifier of \"VAR\"."]
        );
    }

    #[test]
    fn test_ts_modifier_with_nested_expression() {
        let mut diags: Vec<Diagnostic> = Vec::new();
        let (tokens, rest) = tokenize("${VAR:ts${SEP}}", Some(&mut diags));
        assert_eq!(rest, "");
        assert_eq!(tokens.len(), 1);
        let e = tokens[0].expr.as_ref().unwrap();
        assert_eq!(mods(e), vec!["ts${SEP}"]);
        assert_eq!(
            messages(&diags),
            vec!["WARN: Invalid separator \"${SEP}\" for :ts modifier of \"VAR\"."]
        );
    }

    #[test]
    fn test_keyword_needs_delimiter() {
        let (e, diags) = expr("${FILES:T=.o}");
        assert_eq!(
            e.modifiers[0].kind(),
            &ModifierKind::SysV {
                from: "T".to_string(),
                to: ".o".to_string()
            }
        );
        assert!(diags.is_empty());

        let (e, diags) = expr("${FILES:tl=x:Q}");
        assert_eq!(mods(&e), vec!["tl=x:Q"]);
        assert_eq!(diags.len(), 1);

        let mut diags: Vec<Diagnostic> = Vec::new();
        let mut lexer = MkLexer::new("$(FILES:Q)", Some(&mut diags));
        let e = lexer.expr().unwrap();
        drop(lexer);
        assert_eq!(mods(&e), vec!["Q"]);
    }

    #[test]
    fn test_assignment_modifiers_are_errors() {
        let (e, diags) = expr("${VAR::=value:Q}");
        assert_eq!(mods(&e), vec![":=value", "Q"]);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].severity, Severity::Error);
        assert_eq!(diags[0].message, "Assignment modifiers like \"::=\" must not be used at all.");

        let (_, diags) = expr("${VAR::+=value}");
        assert_eq!(diags[0].message, "Assignment modifiers like \"::+=\" must not be used at all.");

        let (_, diags) = expr("${::!=cmd}");
        assert_eq!(diags[0].severity, Severity::Error);
        assert_eq!(
            diags[0].message,
            "The assignment modifier \"::!=\" has no variable name to assign to."
        );
    }

    #[test]
    fn test_sysv_modifier() {
        let (e, diags) = expr("${SRCS:.c=.o}");
        assert_eq!(
            e.modifiers[0].kind(),
            &ModifierKind::SysV {
                from: ".c".to_string(),
                to: ".o".to_string()
            }
        );
        assert!(diags.is_empty());

        let (e, _) = expr("${SRCS:${EXT}=${OBJ}}");
        assert_eq!(mods(&e), vec!["${EXT}=${OBJ}"]);
    }

    #[test]
    fn test_sysv_modifier_swallows_colons() {
        let (e, diags) = expr("${SRCS:%.c=%.o:Q}");
        assert_eq!(mods(&e), vec!["%.c=%.o:Q"]);
        assert_eq!(
            messages(&diags),
            vec!["WARN: The text \":Q\" looks like a modifier but isn't."]
        );
    }

    #[test]
    fn test_shell_modifier() {
        let (e, diags) = expr("${:!uname -a!:[2]}");
        assert_eq!(mods(&e), vec!["!uname -a!", "[2]"]);
        assert_eq!(e.modifiers[0].kind(), &ModifierKind::Shell("uname -a".to_string()));
        assert!(diags.is_empty());
    }

    #[test]
    fn test_stray_colon_is_skipped() {
        let (e, diags) = expr("${VAR::Q}");
        assert_eq!(mods(&e), vec!["Q"]);
        assert!(diags.is_empty());
    }

    #[test]
    fn test_no_diagnostics_without_sink() {
        let (tokens, rest) = tokenize("$(VAR) $X ${VAR:S,a,b,c}", None);
        assert_eq!(tokens.len(), 5);
        assert_eq!(rest, "");
    }
}
