//! Syntax Tree for Makefile Fragments
//!
//! Architecture:
//!   Text → MkLexer → Token/Expr → MkParser → Cond/DependencyPattern
//!   Lines → compound_parser → Stmt → stmt_walker

pub mod types;
pub mod modifier;
pub mod cond_walker;
pub mod stmt_walker;
