//! Syntax Tree Types for Makefile Fragments
//!
//! This module defines every value the parsers produce. All of them are
//! plain owned data, built fresh for each parse and never shared.

use serde::Serialize;
use std::borrow::Cow;
use std::fmt;

use crate::ast::modifier::Modifier;

// =============================================================================
// TOKENS & EXPRESSIONS
// =============================================================================

/// A piece of text that is either literal or a single expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    /// The source text of this token, exactly as written.
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expr: Option<Expr>,
}

impl Token {
    pub fn literal(text: impl Into<String>) -> Self {
        Token {
            text: text.into(),
            expr: None,
        }
    }

    pub fn expression(text: impl Into<String>, expr: Expr) -> Self {
        Token {
            text: text.into(),
            expr: Some(expr),
        }
    }

    pub fn is_expr(&self) -> bool {
        self.expr.is_some()
    }

    /// The literal text, or the canonical `${...}` form of the expression.
    pub fn canonical(&self) -> Cow<'_, str> {
        match &self.expr {
            Some(expr) => Cow::Owned(expr.to_string()),
            None => Cow::Borrowed(&self.text),
        }
    }
}

/// A variable reference such as `${VAR:Mpattern:Q}`.
///
/// The variable name is kept as written. It may contain nested expressions
/// (`VAR.${param}`), which stay unresolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Expr {
    pub varname: String,
    pub modifiers: Vec<Modifier>,
}

impl Expr {
    pub fn new(varname: impl Into<String>, modifiers: Vec<Modifier>) -> Self {
        Expr {
            varname: varname.into(),
            modifiers,
        }
    }

    /// An expression without modifiers.
    pub fn var(varname: impl Into<String>) -> Self {
        Expr::new(varname, Vec::new())
    }

    /// The modifiers in source form, each prefixed with a colon.
    pub fn mod_string(&self) -> String {
        let mut s = String::new();
        for m in &self.modifiers {
            s.push(':');
            s.push_str(m.text());
        }
        s
    }

    /// Whether the "variable name" is really a value, as in `${value:L}`
    /// or `${cond:?yes:no}`.
    pub fn is_expression(&self) -> bool {
        match self.modifiers.first() {
            Some(m) => m.text() == "L" || m.text().starts_with('?'),
            None => false,
        }
    }

    /// Whether the last modifier is `:Q`.
    pub fn is_quoted(&self) -> bool {
        self.modifiers.last().map_or(false, |m| m.is_quote())
    }

    pub fn has_modifier(&self, prefix: &str) -> bool {
        self.modifiers.iter().any(|m| m.text().starts_with(prefix))
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${{{}{}}}", self.varname, self.mod_string())
    }
}

// =============================================================================
// CONDITIONS
// =============================================================================

/// A parsed `.if` or `.elif` condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Cond {
    Or(Vec<Cond>),
    And(Vec<Cond>),
    Not(Box<Cond>),
    /// `defined(VAR)`
    Defined(String),
    /// `empty(VAR:modifiers)`
    Empty(Expr),
    /// A lone term used as a truth value, like `${VAR}`.
    Term(CondTerm),
    Compare {
        left: CondTerm,
        op: String,
        right: CondTerm,
    },
    /// `exists(file)`, `make(target)` and friends.
    Call { name: String, arg: String },
    Paren(Box<Cond>),
}

/// An operand of a comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CondTerm {
    /// String contents; embedded expressions are flattened into the text.
    Str(String),
    Num(String),
    Expr(Expr),
}

impl CondTerm {
    pub fn as_expr(&self) -> Option<&Expr> {
        match self {
            CondTerm::Expr(expr) => Some(expr),
            _ => None,
        }
    }
}

// =============================================================================
// PACKAGE PATTERNS
// =============================================================================

/// A package pattern with an optional version constraint.
///
/// Examples: `pkg>=1.0<2`, `pkg-[0-9]*`, `{gcc48,gcc48-libs}-4.8.*`,
/// `${PYPKGPREFIX}-foo>=${PYVER}`. Either the bounds or the wildcard is set,
/// never both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DependencyPattern {
    pub base: String,
    pub lower_op: String,
    pub lower: String,
    pub upper_op: String,
    pub upper: String,
    pub wildcard: String,
}

/// A dependency entry of the form `pattern:../../category/package`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dependency {
    pub pattern: DependencyPattern,
    pub path: String,
}

// =============================================================================
// STATEMENTS
// =============================================================================

/// The kind of a line, as far as block nesting is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Directive {
    If,
    Elif,
    Else,
    Endif,
    For,
    Endfor,
    Other,
}

/// The block structure of a sequence of lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stmt<L> {
    Line(L),
    Block(Vec<Stmt<L>>),
    /// `.if`/`.elif`/`.else`. There is one branch per condition, plus one
    /// more if the block has an `.else`.
    Cond {
        conds: Vec<L>,
        branches: Vec<Vec<Stmt<L>>>,
    },
    Loop { head: L, body: Vec<Stmt<L>> },
}

impl<L> Stmt<L> {
    /// Whether a `.if` block has a trailing `.else` branch.
    pub fn has_else(&self) -> bool {
        match self {
            Stmt::Cond { conds, branches } => branches.len() > conds.len(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expr_display() {
        let expr = Expr::new("VAR", vec![Modifier::keyword("Q")]);
        assert_eq!(expr.to_string(), "${VAR:Q}");
        assert_eq!(Expr::var("X").to_string(), "${X}");
    }

    #[test]
    fn test_expr_is_expression() {
        assert!(Expr::new("a b", vec![Modifier::keyword("L")]).is_expression());
        assert!(!Expr::new("VAR", vec![Modifier::keyword("Q")]).is_expression());
        assert!(!Expr::var("VAR").is_expression());
    }

    #[test]
    fn test_token_canonical() {
        assert_eq!(Token::literal("abc").canonical(), "abc");
        let token = Token::expression("$(X)", Expr::var("X"));
        assert_eq!(token.canonical(), "${X}");
    }

    #[test]
    fn test_stmt_has_else() {
        let stmt: Stmt<&str> = Stmt::Cond {
            conds: vec![".if 1"],
            branches: vec![vec![], vec![]],
        };
        assert!(stmt.has_else());
    }
}
