//! Parser Types and Constants
//!
//! Shared character classes, regular expressions and error types used across
//! parser modules.

use regex_lite::Regex;
use thiserror::Error;

use crate::ast::types::Directive;
use crate::parser::cursor::ByteSet;

/// Variable names that start with this prefix take a parameter without a dot,
/// as in `SITES_${distfile}`.
pub const MULTI_PART_PREFIX: &str = "SITES_";

/// Modifiers that take no argument.
pub const KEYWORD_MODIFIERS: &[&str] = &[
    "E",  // suffix of each word
    "H",  // directory part of each word
    "L",  // the variable name is the value
    "O",  // sort
    "Ox", // shuffle
    "Q",  // quote shell meta-characters
    "R",  // remove the suffix
    "T",  // basename
    "sh", // run as shell command
    "tA", // absolute path
    "tW", // treat the value as a single word
    "tl", // lowercase
    "tu", // uppercase
    "tw", // treat the value as a list of words
    "u",  // remove adjacent duplicate words
];

/// Functions that may appear in `.if` conditions.
pub const CONDITION_FUNCTIONS: &[&str] = &["defined", "empty", "commands", "exists", "make", "target"];

lazy_static::lazy_static! {
    pub static ref ALNUM: ByteSet = ByteSet::new("A-Za-z0-9");
    pub static ref ALNUM_U: ByteSet = ByteSet::new("A-Za-z0-9_");
    pub static ref ALNUM_DOT: ByteSet = ByteSet::new("A-Za-z0-9_.");
    pub static ref LOWER: ByteSet = ByteSet::new("a-z");
    pub static ref ALPHA: ByteSet = ByteSet::new("A-Za-z");

    /// Characters of a plain variable name.
    pub static ref VARBASE_CHARS: ByteSet = ByteSet::new("A-Za-z0-9_+-");
    /// Characters of the parameter part of `VAR.param`.
    pub static ref VARPARAM_CHARS: ByteSet = ByteSet::new("A-Za-z0-9_#*+./[-");
    /// Single-character variables that `$X` may refer to without braces.
    pub static ref BUILTIN_VARS: ByteSet = ByteSet::new("><!%?*@ ");

    /// Unquoted string literals on the right side of a comparison.
    pub static ref UNQUOTED_LITERAL: ByteSet = ByteSet::new("A-Za-z0-9_+./@-");

    pub static ref PKGBASE_CHARS: ByteSet = ByteSet::new("A-Za-z0-9_.*+,{}");
    pub static ref VERSION_CHARS: ByteSet = ByteSet::new("A-Za-z0-9_.");
    pub static ref WILDCARD_CHARS: ByteSet = ByteSet::new("A-Za-z0-9_.*+?-");

    pub static ref INDEX_MODIFIER: Regex = Regex::new(r"^\[(?:[-.\d]+|#)\]").unwrap();
    pub static ref ASSIGN_MODIFIER: Regex = Regex::new(r"^:[!+?]?=").unwrap();
    pub static ref NUMERIC_SEPARATOR: Regex = Regex::new(r"^\\\d+$").unwrap();

    pub static ref COMPARE_NUMBER: Regex =
        Regex::new(r"^(<=|<|==|!=|>=|>)[\t ]*(0x[0-9A-Fa-f]+|\d+(?:\.\d+)?)").unwrap();
    pub static ref NUMBER: Regex = Regex::new(r"^(?:0x[0-9A-Fa-f]+|\d+(?:\.\d+)?)").unwrap();
    pub static ref COMPARE_OP: Regex = Regex::new(r"^(?:<=|<|==|!=|>=|>)").unwrap();
    pub static ref QUOTED_PLAIN: Regex = Regex::new(r#"^"([^"$\\]*)""#).unwrap();

    pub static ref BRACKET_CLASS: Regex = Regex::new(r"^\[[\w-]+\]").unwrap();
    pub static ref WILDCARD_CLASS: Regex = Regex::new(r"^\[[^\]]+\]").unwrap();
}

/// Why a sequence of lines does not form properly nested blocks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NestingError {
    #[error("line {line}: .elif without matching .if")]
    UnexpectedElif { line: usize },
    #[error("line {line}: .else without matching .if")]
    UnexpectedElse { line: usize },
    #[error("line {line}: {directive:?} without matching start")]
    UnexpectedEnd { line: usize, directive: Directive },
    #[error("line {line}: {found:?} closes a block opened by {expected:?}")]
    MismatchedEnd {
        line: usize,
        expected: Directive,
        found: Directive,
    },
    #[error("{open} block(s) not closed at end of input")]
    Unclosed { open: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_modifiers_list() {
        assert!(KEYWORD_MODIFIERS.contains(&"Q"));
        assert!(KEYWORD_MODIFIERS.contains(&"Ox"));
        assert!(!KEYWORD_MODIFIERS.contains(&"q"));
    }

    #[test]
    fn test_compare_number_prefers_longer_operator() {
        let caps = COMPARE_NUMBER.captures("<= 0x1F").unwrap();
        assert_eq!(&caps[1], "<=");
        assert_eq!(&caps[2], "0x1F");
    }

    #[test]
    fn test_nesting_error_message() {
        let err = NestingError::MismatchedEnd {
            line: 4,
            expected: Directive::For,
            found: Directive::Endif,
        };
        assert_eq!(err.to_string(), "line 4: Endif closes a block opened by For");
    }
}
