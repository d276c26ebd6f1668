//! Parser module for makefile fragments
//!
//! This module contains the expression lexer, the condition and package
//! pattern parsers, and the block structure builder.

pub mod types;
pub mod cursor;
pub mod lexer;
pub mod token_cursor;
pub mod conditional_parser;
pub mod pattern_parser;
pub mod compound_parser;

// Re-exports
pub use types::NestingError;
pub use cursor::{regcomp, ByteSet, ExprCursor, Lexer};
pub use lexer::{tokenize, MkLexer};
pub use token_cursor::TokenCursor;
pub use conditional_parser::{parse_condition, MkParser};
pub use pattern_parser::{dependency_pattern_in_tokens, parse_dependency, parse_package_pattern};
pub use compound_parser::{build_stmt_tree, directive_args, try_build_stmt_tree};
