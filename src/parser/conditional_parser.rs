//! Condition Parser
//!
//! Parses the conditions of `.if` and `.elif` directives, such as
//! `defined(VAR) && ${VAR:tl} != "no"`.
//!
//! Binding from weakest to strongest: `||`, `&&`, `!`, then the atoms
//! (parentheses, function calls, comparisons). Since `!` binds tighter than
//! the comparison operators, `!${VAR} == value` negates the whole comparison.
//!
//! A production that does not match returns `None` and leaves the cursor
//! where it started. Only the caller knows whether that is a syntax error.

use crate::ast::types::{Cond, CondTerm, DependencyPattern, Expr};
use crate::diagnostics::DiagnosticSink;
use crate::parser::cursor::Lexer;
use crate::parser::lexer::MkLexer;
use crate::parser::pattern_parser;
use crate::parser::types::{
    COMPARE_NUMBER, COMPARE_OP, CONDITION_FUNCTIONS, LOWER, NUMBER, QUOTED_PLAIN, UNQUOTED_LITERAL,
};

/// Parses `text` as a complete condition.
///
/// Returns `None` if the text is not a condition or has unparsed text left.
pub fn parse_condition(text: &str, diag: Option<&mut dyn DiagnosticSink>) -> Option<Cond> {
    let mut parser = MkParser::new(text, diag);
    let cond = parser.condition()?;
    parser.lexer().skip_hspace();
    if !parser.eof() {
        tracing::debug!(condition = text, rest = parser.rest(), "unparsed text after condition");
        return None;
    }
    Some(cond)
}

/// The parser for conditions and package patterns.
pub struct MkParser<'s, 'd> {
    mk: MkLexer<'s, 'd>,
}

impl<'s, 'd> MkParser<'s, 'd> {
    pub fn new(text: &'s str, diag: Option<&'d mut dyn DiagnosticSink>) -> Self {
        MkParser {
            mk: MkLexer::new(text, diag),
        }
    }

    pub fn rest(&self) -> &'s str {
        self.mk.rest()
    }

    pub fn eof(&self) -> bool {
        self.mk.eof()
    }

    fn lexer(&mut self) -> &mut Lexer<'s> {
        self.mk.cursor()
    }

    /// Parses a condition, leaving any text after it unconsumed.
    pub fn condition(&mut self) -> Option<Cond> {
        let mut ors = Vec::new();
        loop {
            let mark = self.lexer().mark();
            if !ors.is_empty() {
                self.lexer().skip_hspace();
                if !self.lexer().skip_string("||") {
                    self.lexer().reset(mark);
                    break;
                }
            }
            match self.cond_and() {
                Some(cond) => ors.push(cond),
                None => {
                    self.lexer().reset(mark);
                    break;
                }
            }
        }
        join(ors, Cond::Or)
    }

    fn cond_and(&mut self) -> Option<Cond> {
        let mut ands = Vec::new();
        loop {
            let mark = self.lexer().mark();
            if !ands.is_empty() {
                self.lexer().skip_hspace();
                if !self.lexer().skip_string("&&") {
                    self.lexer().reset(mark);
                    break;
                }
            }
            match self.cond_atom() {
                Some(cond) => ands.push(cond),
                None => {
                    self.lexer().reset(mark);
                    break;
                }
            }
        }
        join(ands, Cond::And)
    }

    fn cond_atom(&mut self) -> Option<Cond> {
        let mark = self.lexer().mark();
        self.lexer().skip_hspace();

        if self.lexer().skip_byte(b'!') {
            if let Some(cond) = self.cond_atom() {
                return Some(Cond::Not(Box::new(cond)));
            }
        } else if self.lexer().skip_byte(b'(') {
            if let Some(cond) = self.condition() {
                self.lexer().skip_hspace();
                if self.lexer().skip_byte(b')') {
                    return Some(Cond::Paren(Box::new(cond)));
                }
            }
        } else if self.lexer().test_byte_set(&LOWER) {
            if let Some(cond) = self.cond_func() {
                return Some(cond);
            }
        } else if let Some(cond) = self.cond_compare() {
            return Some(cond);
        }

        self.lexer().reset(mark);
        None
    }

    /// Parses a comparison, or a lone term used as a truth value.
    fn cond_compare(&mut self) -> Option<Cond> {
        let lhs = self.cond_term()?;
        let after_lhs = self.lexer().mark();
        self.lexer().skip_hspace();

        if let Some(caps) = self.lexer().next_regex(&COMPARE_NUMBER) {
            return Some(Cond::Compare {
                left: lhs,
                op: caps[1].to_string(),
                right: CondTerm::Num(caps[2].to_string()),
            });
        }

        let op = match self.lexer().next_regex(&COMPARE_OP) {
            Some(caps) => caps[0].to_string(),
            None => {
                self.lexer().reset(after_lhs);
                return Some(Cond::Term(lhs));
            }
        };

        self.lexer().skip_hspace();

        let right = if (op == "==" || op == "!=") && self.lexer().rest().starts_with('"') {
            match self.lexer().next_regex(&QUOTED_PLAIN) {
                Some(caps) => Some(CondTerm::Str(caps[1].to_string())),
                None => self.cond_term(),
            }
        } else {
            self.cond_term()
        };
        let right = match right {
            Some(term) => term,
            None => {
                let literal = self.lexer().next_bytes_set(&UNQUOTED_LITERAL);
                if literal.is_empty() {
                    return None;
                }
                CondTerm::Str(literal.to_string())
            }
        };

        Some(Cond::Compare { left: lhs, op, right })
    }

    /// Parses an operand: an expression, a number, a quoted expression, or a
    /// quoted string that may contain expressions.
    fn cond_term(&mut self) -> Option<CondTerm> {
        let mark = self.lexer().mark();

        if let Some(expr) = self.mk.expr() {
            return Some(CondTerm::Expr(expr));
        }

        if let Some(caps) = self.lexer().next_regex(&NUMBER) {
            return Some(CondTerm::Num(caps[0].to_string()));
        }

        if !self.lexer().skip_byte(b'"') {
            return None;
        }

        let inner = self.lexer().mark();
        if let Some(expr) = self.mk.expr() {
            if self.lexer().skip_byte(b'"') {
                return Some(CondTerm::Expr(expr));
            }
        }
        self.lexer().reset(inner);

        let mut text = String::new();
        loop {
            let part = self.lexer().mark();
            if self.mk.expr().is_some()
                || !self
                    .lexer()
                    .next_bytes_func(|b| b != b'"' && b != b'\\' && b != b'$')
                    .is_empty()
                || self.lexer().skip_byte(b'$')
            {
                text.push_str(self.lexer().since(part));
            } else if self.lexer().skip_string("\\\"") || self.lexer().skip_string("\\\\") {
                text.push_str(&self.lexer().since(part)[1..]);
            } else if self.lexer().skip_byte(b'"') {
                return Some(CondTerm::Str(text));
            } else {
                break;
            }
        }

        self.lexer().reset(mark);
        None
    }

    /// Parses a function call such as `defined(VAR)` or `exists(/file)`.
    fn cond_func(&mut self) -> Option<Cond> {
        let mark = self.lexer().mark();

        let name = self.lexer().next_bytes_set(&LOWER);
        self.lexer().skip_hspace();
        if !CONDITION_FUNCTIONS.contains(&name) || !self.lexer().skip_byte(b'(') {
            self.lexer().reset(mark);
            return None;
        }

        match name {
            "defined" => {
                let varname = self.mk.varname();
                if !varname.is_empty() && self.lexer().skip_byte(b')') {
                    return Some(Cond::Defined(varname.to_string()));
                }
            }
            "empty" => {
                let varname = self.mk.varname();
                if !varname.is_empty() {
                    let modifiers = self.mk.modifiers(varname, b')');
                    if self.lexer().skip_byte(b')') {
                        return Some(Cond::Empty(Expr::new(varname, modifiers)));
                    }
                }
            }
            "commands" | "exists" | "make" | "target" => {
                let arg_mark = self.lexer().mark();
                while self.mk.expr().is_some()
                    || !self.lexer().next_bytes_func(|b| b != b'$' && b != b')').is_empty()
                {}
                let arg = self.lexer().since(arg_mark);
                if self.lexer().skip_byte(b')') {
                    return Some(Cond::Call {
                        name: name.to_string(),
                        arg: arg.to_string(),
                    });
                }
            }
            _ => {}
        }

        self.lexer().reset(mark);
        None
    }

    /// Parses a package pattern like `pkg>=1.0` at the current position.
    pub fn dependency_pattern(&mut self) -> Option<DependencyPattern> {
        pattern_parser::dependency_pattern(&mut self.mk)
    }
}

fn join(mut conds: Vec<Cond>, combine: fn(Vec<Cond>) -> Cond) -> Option<Cond> {
    match conds.len() {
        0 => None,
        1 => conds.pop(),
        _ => Some(combine(conds)),
    }
}
