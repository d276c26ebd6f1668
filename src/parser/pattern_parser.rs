//! Package Pattern Parser
//!
//! Parses dependency patterns such as `pkg>=1.0<2`, `pkg-[0-9]*` and
//! `{gcc48,gcc48-libs}-4.8.*`. The grammar is written against
//! [`ExprCursor`], so it runs both on raw text and on token lists.

use crate::ast::types::{Dependency, DependencyPattern, Token};
use crate::parser::cursor::{ExprCursor, Lexer};
use crate::parser::lexer::MkLexer;
use crate::parser::token_cursor::TokenCursor;
use crate::parser::types::{
    ALPHA, BRACKET_CLASS, PKGBASE_CHARS, VERSION_CHARS, WILDCARD_CHARS, WILDCARD_CLASS,
};

const REVISION_WILDCARDS: &[&str] = &["{,nb*}", "{,nb[0-9]*}"];

/// Parses `text` as a package pattern, which must make up the whole text.
pub fn parse_package_pattern(text: &str) -> Option<DependencyPattern> {
    let mut lexer = MkLexer::new(text, None);
    let pattern = dependency_pattern(&mut lexer)?;
    if !lexer.eof() {
        return None;
    }
    Some(pattern)
}

/// Parses a dependency of the form `pattern:../../category/package`.
pub fn parse_dependency(text: &str) -> Option<Dependency> {
    let mut lexer = MkLexer::new(text, None);
    let pattern = dependency_pattern(&mut lexer)?;
    if !lexer.cursor().skip_byte(b':') || lexer.eof() {
        return None;
    }
    Some(Dependency {
        pattern,
        path: lexer.rest().to_string(),
    })
}

/// Parses a package pattern from already-lexed tokens, which it must
/// consume completely.
pub fn dependency_pattern_in_tokens(tokens: &[Token]) -> Option<DependencyPattern> {
    let mut cursor = TokenCursor::new(tokens);
    let pattern = dependency_pattern(&mut cursor)?;
    if !cursor.eof() {
        return None;
    }
    Some(pattern)
}

/// Parses a package pattern at the current position.
///
/// After the package base comes exactly one of: version bounds, a hyphen
/// and a version wildcard, or (only if the base ends in an expression) an
/// optional revision wildcard.
pub fn dependency_pattern<'s, C: ExprCursor<'s>>(cursor: &mut C) -> Option<DependencyPattern> {
    let mark = cursor.mark();

    let base = pkgbase_pattern(cursor);
    if base.is_empty() {
        return None;
    }
    let mut pattern = DependencyPattern {
        base,
        ..DependencyPattern::default()
    };

    let lower_op = next_op(cursor, &[">=", ">"]);
    if let Some(op) = lower_op {
        match version(cursor) {
            Some(v) => {
                pattern.lower_op = op.to_string();
                pattern.lower = v;
            }
            None => {
                cursor.reset(mark);
                return None;
            }
        }
    }

    let upper_op = next_op(cursor, &["<=", "<"]);
    if let Some(op) = upper_op {
        match version(cursor) {
            Some(v) => {
                pattern.upper_op = op.to_string();
                pattern.upper = v;
            }
            None => {
                cursor.reset(mark);
                return None;
            }
        }
    }

    if lower_op.is_some() || upper_op.is_some() {
        return Some(pattern);
    }

    let hyphen = cursor.mark();
    if cursor.skip_byte(b'-') {
        let wildcard_mark = cursor.mark();
        while cursor.next_expr().is_some()
            || cursor.skip_regex(&WILDCARD_CLASS)
            || !cursor.next_bytes_set(&WILDCARD_CHARS).is_empty()
        {}
        skip_revision_wildcard(cursor);
        let wildcard = cursor.since(wildcard_mark);
        if !wildcard.is_empty() {
            pattern.wildcard = wildcard.into_owned();
            return Some(pattern);
        }
        cursor.reset(hyphen);
    }

    if pattern.base.ends_with('}') && ends_with_expr(&pattern.base) {
        let tail = cursor.mark();
        skip_revision_wildcard(cursor);
        pattern.wildcard = cursor.since(tail).into_owned();
        return Some(pattern);
    }

    cursor.reset(mark);
    None
}

fn next_op<'s, C: ExprCursor<'s>>(cursor: &mut C, ops: &[&'static str]) -> Option<&'static str> {
    ops.iter().copied().find(|op| cursor.skip_string(op))
}

fn skip_revision_wildcard<'s, C: ExprCursor<'s>>(cursor: &mut C) -> bool {
    REVISION_WILDCARDS.iter().any(|tail| cursor.skip_string(tail))
}

/// A version starts with a digit or an expression.
fn version<'s, C: ExprCursor<'s>>(cursor: &mut C) -> Option<String> {
    let mark = cursor.mark();
    let starts_ok = cursor.next_expr().is_some() || cursor.peek_byte().map_or(false, |b| b.is_ascii_digit());
    if !starts_ok {
        return None;
    }
    while cursor.next_expr().is_some() || !cursor.next_bytes_set(&VERSION_CHARS).is_empty() {}
    Some(cursor.since(mark).into_owned())
}

fn ends_with_expr(text: &str) -> bool {
    let (tokens, rest) = crate::parser::lexer::tokenize(text, None);
    rest.is_empty() && tokens.last().map_or(false, Token::is_expr)
}

/// Parses the package name part of a pattern, such as `pkg`,
/// `py${PYVER}-module` or `{ssh,openssh}`.
///
/// Returns an empty string and consumes nothing if the braces in the
/// result are unbalanced.
pub fn pkgbase_pattern<'s, C: ExprCursor<'s>>(cursor: &mut C) -> String {
    let start = cursor.mark();

    loop {
        if cursor.next_expr().is_some() || cursor.skip_regex(&BRACKET_CLASS) {
            continue;
        }

        let run_mark = cursor.mark();
        let run = cursor.next_bytes_set(&PKGBASE_CHARS);
        if !run.is_empty() {
            // The revision wildcard "{,nb*}" is not part of the name.
            match run.find("{,nb") {
                Some(0) => {
                    cursor.reset(run_mark);
                    break;
                }
                Some(i) => {
                    cursor.reset(run_mark);
                    cursor.skip(i);
                }
                None => {}
            }
            continue;
        }

        if cursor.peek_byte() == Some(b'-') && is_pkgbase_part(&cursor.rest()[1..]) {
            cursor.skip(1);
            continue;
        }
        break;
    }

    let base = cursor.since(start).into_owned();
    if base.matches('{').count() != base.matches('}').count() {
        tracing::trace!(base = %base, "unbalanced braces in package base");
        cursor.reset(start);
        return String::new();
    }
    base
}

/// Whether the text after a hyphen continues the package name rather than
/// starting its version.
fn is_pkgbase_part(text: &str) -> bool {
    let mut lexer = Lexer::new(text);
    if !lexer.skip_byte(b'{') {
        lexer.skip_byte(b'[');
    }
    if !lexer.next_bytes_set(&ALPHA).is_empty() {
        return true;
    }

    let mut mk = MkLexer::new(lexer.rest(), None);
    match mk.expr() {
        Some(expr) => !expr.varname.contains("VER") && expr.modifiers.is_empty(),
        None => false,
    }
}
