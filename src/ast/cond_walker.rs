//! Condition Walker
//!
//! Visits a parsed condition. A visitor overrides only the callbacks it
//! needs; the rest default to doing nothing.
//!
//! There are two granularities. The structural callbacks (`and`, `not`,
//! `compare`, ...) see the shape of the condition, while [`CondVisitor::expr`]
//! fires for every expression anywhere in it, including the ones inside
//! quoted strings, function arguments, variable names and modifiers.

use crate::ast::types::{Cond, CondTerm, Expr};
use crate::parser::lexer::tokenize;

pub trait CondVisitor {
    fn and(&mut self, _conds: &[Cond]) {}
    fn not(&mut self, _cond: &Cond) {}
    fn defined(&mut self, _varname: &str) {}
    fn empty(&mut self, _expr: &Expr) {}
    fn compare(&mut self, _left: &CondTerm, _op: &str, _right: &CondTerm) {}
    fn call(&mut self, _name: &str, _arg: &str) {}
    fn paren(&mut self, _cond: &Cond) {}
    /// An expression used alone as a truth value, as in `.if ${VAR}`.
    fn var(&mut self, _expr: &Expr) {}
    fn expr(&mut self, _expr: &Expr) {}
}

/// Visits `cond` and everything below it, in source order.
///
/// `||` has no callback of its own; its operands are visited directly.
pub fn walk_cond<V: CondVisitor + ?Sized>(cond: &Cond, visitor: &mut V) {
    match cond {
        Cond::Or(conds) => {
            for c in conds {
                walk_cond(c, visitor);
            }
        }
        Cond::And(conds) => {
            visitor.and(conds);
            for c in conds {
                walk_cond(c, visitor);
            }
        }
        Cond::Not(c) => {
            visitor.not(c);
            walk_cond(c, visitor);
        }
        Cond::Defined(varname) => {
            visitor.defined(varname);
            walk_expr(&Expr::var(varname.as_str()), visitor);
        }
        Cond::Empty(expr) => {
            visitor.empty(expr);
            walk_expr(expr, visitor);
        }
        Cond::Term(term) => {
            if let CondTerm::Expr(expr) = term {
                visitor.var(expr);
            }
            walk_term(term, visitor);
        }
        Cond::Compare { left, op, right } => {
            visitor.compare(left, op, right);
            walk_term(left, visitor);
            walk_term(right, visitor);
        }
        Cond::Call { name, arg } => {
            visitor.call(name, arg);
            walk_text(arg, visitor);
        }
        Cond::Paren(c) => {
            visitor.paren(c);
            walk_cond(c, visitor);
        }
    }
}

fn walk_term<V: CondVisitor + ?Sized>(term: &CondTerm, visitor: &mut V) {
    match term {
        CondTerm::Expr(expr) => walk_expr(expr, visitor),
        CondTerm::Str(text) => walk_text(text, visitor),
        CondTerm::Num(_) => {}
    }
}

fn walk_expr<V: CondVisitor + ?Sized>(expr: &Expr, visitor: &mut V) {
    visitor.expr(expr);
    walk_text(&expr.varname, visitor);
    for modifier in &expr.modifiers {
        walk_text(modifier.text(), visitor);
    }
}

fn walk_text<V: CondVisitor + ?Sized>(text: &str, visitor: &mut V) {
    if !text.contains('$') {
        return;
    }
    let (tokens, _) = tokenize(text, None);
    for token in &tokens {
        if let Some(expr) = &token.expr {
            walk_expr(expr, visitor);
        }
    }
}

#[derive(Default)]
struct ExprCollector {
    exprs: Vec<Expr>,
}

impl CondVisitor for ExprCollector {
    fn expr(&mut self, expr: &Expr) {
        self.exprs.push(expr.clone());
    }
}

impl Cond {
    /// All expressions in the condition, outermost first.
    pub fn referenced_exprs(&self) -> Vec<Expr> {
        let mut collector = ExprCollector::default();
        walk_cond(self, &mut collector);
        collector.exprs
    }

    /// The names of all variables the condition refers to, without
    /// duplicates.
    pub fn referenced_varnames(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for expr in self.referenced_exprs() {
            if !names.contains(&expr.varname) {
                names.push(expr.varname);
            }
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::conditional_parser::parse_condition;

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl CondVisitor for Recorder {
        fn and(&mut self, conds: &[Cond]) {
            self.events.push(format!("and {}", conds.len()));
        }
        fn not(&mut self, _cond: &Cond) {
            self.events.push("not".to_string());
        }
        fn defined(&mut self, varname: &str) {
            self.events.push(format!("defined {}", varname));
        }
        fn empty(&mut self, expr: &Expr) {
            self.events.push(format!("empty {}", expr));
        }
        fn compare(&mut self, _left: &CondTerm, op: &str, _right: &CondTerm) {
            self.events.push(format!("compare {}", op));
        }
        fn call(&mut self, name: &str, arg: &str) {
            self.events.push(format!("call {}({})", name, arg));
        }
        fn paren(&mut self, _cond: &Cond) {
            self.events.push("paren".to_string());
        }
        fn var(&mut self, expr: &Expr) {
            self.events.push(format!("var {}", expr));
        }
        fn expr(&mut self, expr: &Expr) {
            self.events.push(format!("expr {}", expr));
        }
    }

    fn walk(text: &str) -> Vec<String> {
        let cond = parse_condition(text, None).unwrap();
        let mut recorder = Recorder::default();
        walk_cond(&cond, &mut recorder);
        recorder.events
    }

    #[test]
    fn test_walk_structure() {
        assert_eq!(
            walk("${A} || !defined(B) && (${C:Q} == 1)"),
            vec![
                "var ${A}",
                "expr ${A}",
                "and 2",
                "not",
                "defined B",
                "expr ${B}",
                "paren",
                "compare ==",
                "expr ${C:Q}",
            ]
        );
    }

    #[test]
    fn test_walk_finds_buried_expressions() {
        assert_eq!(
            walk("exists(${PREFIX}/bin) && ${A} == \"x${B}y\""),
            vec![
                "and 2",
                "call exists(${PREFIX}/bin)",
                "expr ${PREFIX}",
                "compare ==",
                "expr ${A}",
                "expr ${B}",
            ]
        );
    }

    #[test]
    fn test_walk_nested_in_varname_and_modifiers() {
        assert_eq!(
            walk("!empty(VAR.${PARAM}:M${PATTERN})"),
            vec![
                "not",
                "empty ${VAR.${PARAM}:M${PATTERN}}",
                "expr ${VAR.${PARAM}:M${PATTERN}}",
                "expr ${PARAM}",
                "expr ${PATTERN}",
            ]
        );
    }

    #[test]
    fn test_referenced_varnames() {
        let cond = parse_condition("${A} == ${B} || defined(A) || make(${C})", None).unwrap();
        assert_eq!(cond.referenced_varnames(), vec!["A", "B", "C"]);
    }
}
