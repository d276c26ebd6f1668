//! mkparse - A parser for BSD make expressions and conditions
//!
//! This library lexes `${VAR:modifiers}` expressions, parses `.if`
//! conditions and package dependency patterns, and builds the block
//! structure of `.if`/`.for` directives. Findings are reported to a
//! caller-supplied diagnostic sink.

pub mod ast;
pub mod diagnostics;
pub mod parser;

pub use ast::cond_walker::{walk_cond, CondVisitor};
pub use ast::modifier::{Modifier, ModifierKind, Subst};
pub use ast::stmt_walker::{walk_stmt, StmtVisitor};
pub use ast::types::*;
pub use diagnostics::{Diagnostic, DiagnosticSink, LineDiagnostics, Location, Severity};
pub use parser::{
    build_stmt_tree, dependency_pattern_in_tokens, parse_condition, parse_dependency, parse_package_pattern,
    tokenize, try_build_stmt_tree, MkLexer, MkParser, NestingError,
};
