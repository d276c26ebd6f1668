//! Block Structure Builder
//!
//! Turns a flat sequence of lines into nested `.if` and `.for` blocks. The
//! lines themselves stay opaque; a classifier tells the builder which ones
//! open, continue or close a block.

use crate::ast::types::{Directive, Stmt};
use crate::parser::cursor::Lexer;
use crate::parser::types::{NestingError, LOWER};

impl Directive {
    /// Classifies a makefile line by its directive, if any.
    ///
    /// Whitespace between the dot and the directive name is allowed, as in
    /// `.  if`.
    pub fn of_line(text: &str) -> Directive {
        let mut lexer = Lexer::new(text);
        if !lexer.skip_byte(b'.') {
            return Directive::Other;
        }
        lexer.skip_hspace();
        match lexer.next_bytes_set(&LOWER) {
            "if" | "ifdef" | "ifndef" | "ifmake" | "ifnmake" => Directive::If,
            "elif" | "elifdef" | "elifndef" | "elifmake" | "elifnmake" => Directive::Elif,
            "else" => Directive::Else,
            "endif" => Directive::Endif,
            "for" => Directive::For,
            "endfor" => Directive::Endfor,
            _ => Directive::Other,
        }
    }
}

/// The arguments of a directive line, without the trailing comment.
///
/// `.if ${A} # comment` yields `${A}`. Returns `None` if the line is not a
/// directive.
pub fn directive_args(text: &str) -> Option<&str> {
    let mut lexer = Lexer::new(text);
    if !lexer.skip_byte(b'.') {
        return None;
    }
    lexer.skip_hspace();
    if lexer.next_bytes_set(&LOWER).is_empty() {
        return None;
    }

    let args = lexer.rest();
    let bytes = args.as_bytes();
    let end = (0..bytes.len())
        .find(|&i| bytes[i] == b'#' && (i == 0 || bytes[i - 1] != b'\\'))
        .unwrap_or(bytes.len());
    Some(args[..end].trim_matches(|c| c == ' ' || c == '\t'))
}

// =============================================================================
// BUILDER
// =============================================================================

enum Frame<L> {
    Cond {
        conds: Vec<L>,
        branches: Vec<Vec<Stmt<L>>>,
    },
    Loop {
        head: L,
        body: Vec<Stmt<L>>,
    },
}

impl<L> Frame<L> {
    fn kind(&self) -> Directive {
        match self {
            Frame::Cond { .. } => Directive::If,
            Frame::Loop { .. } => Directive::For,
        }
    }

    fn into_stmt(self) -> Stmt<L> {
        match self {
            Frame::Cond { conds, branches } => Stmt::Cond { conds, branches },
            Frame::Loop { head, body } => Stmt::Loop { head, body },
        }
    }
}

struct Builder<L> {
    root: Vec<Stmt<L>>,
    stack: Vec<Frame<L>>,
}

impl<L> Builder<L> {
    fn body(&mut self) -> &mut Vec<Stmt<L>> {
        match self.stack.last_mut() {
            None => &mut self.root,
            Some(Frame::Loop { body, .. }) => body,
            Some(Frame::Cond { branches, .. }) => match branches.last_mut() {
                Some(branch) => branch,
                None => unreachable!("a conditional frame always has a branch"),
            },
        }
    }

    fn add(&mut self, line: usize, l: L, directive: Directive) -> Result<(), NestingError> {
        match directive {
            Directive::If => self.stack.push(Frame::Cond {
                conds: vec![l],
                branches: vec![Vec::new()],
            }),
            Directive::For => self.stack.push(Frame::Loop {
                head: l,
                body: Vec::new(),
            }),
            // After the .else branch, no further branch may follow.
            Directive::Elif => match self.stack.last_mut() {
                Some(Frame::Cond { conds, branches }) if conds.len() == branches.len() => {
                    conds.push(l);
                    branches.push(Vec::new());
                }
                _ => return Err(NestingError::UnexpectedElif { line }),
            },
            Directive::Else => match self.stack.last_mut() {
                Some(Frame::Cond { conds, branches }) if conds.len() == branches.len() => {
                    branches.push(Vec::new());
                }
                _ => return Err(NestingError::UnexpectedElse { line }),
            },
            Directive::Endif | Directive::Endfor => {
                let expected = if directive == Directive::Endif {
                    Directive::If
                } else {
                    Directive::For
                };
                match self.stack.last() {
                    None => return Err(NestingError::UnexpectedEnd { line, directive }),
                    Some(frame) if frame.kind() != expected => {
                        return Err(NestingError::MismatchedEnd {
                            line,
                            expected: frame.kind(),
                            found: directive,
                        })
                    }
                    Some(_) => {}
                }
                if let Some(frame) = self.stack.pop() {
                    let stmt = frame.into_stmt();
                    self.body().push(stmt);
                }
            }
            Directive::Other => self.body().push(Stmt::Line(l)),
        }
        Ok(())
    }
}

/// Builds the block structure of `lines`.
///
/// The `.else`, `.endif` and `.endfor` lines are not part of the result;
/// their position is implied by the structure. Line numbers in errors count
/// from 1.
pub fn try_build_stmt_tree<L>(
    lines: impl IntoIterator<Item = L>,
    classify: impl Fn(&L) -> Directive,
) -> Result<Stmt<L>, NestingError> {
    let mut builder = Builder {
        root: Vec::new(),
        stack: Vec::new(),
    };
    for (i, l) in lines.into_iter().enumerate() {
        let directive = classify(&l);
        builder.add(i + 1, l, directive)?;
    }
    if !builder.stack.is_empty() {
        return Err(NestingError::Unclosed {
            open: builder.stack.len(),
        });
    }
    Ok(Stmt::Block(builder.root))
}

/// Like [`try_build_stmt_tree`], but only says whether the lines nest.
pub fn build_stmt_tree<L>(
    lines: impl IntoIterator<Item = L>,
    classify: impl Fn(&L) -> Directive,
) -> Option<Stmt<L>> {
    match try_build_stmt_tree(lines, classify) {
        Ok(stmt) => Some(stmt),
        Err(err) => {
            tracing::debug!(error = %err, "lines are not properly nested");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(lines: &[&'static str]) -> Result<Stmt<&'static str>, NestingError> {
        try_build_stmt_tree(lines.iter().copied(), |l| Directive::of_line(l))
    }

    #[test]
    fn test_directive_of_line() {
        assert_eq!(Directive::of_line(".if ${A}"), Directive::If);
        assert_eq!(Directive::of_line(".  ifndef A"), Directive::If);
        assert_eq!(Directive::of_line(".if!defined(A)"), Directive::If);
        assert_eq!(Directive::of_line(".elifmake install"), Directive::Elif);
        assert_eq!(Directive::of_line(".else"), Directive::Else);
        assert_eq!(Directive::of_line(".endif # A"), Directive::Endif);
        assert_eq!(Directive::of_line(".for f in a b"), Directive::For);
        assert_eq!(Directive::of_line(".endfor"), Directive::Endfor);
        assert_eq!(Directive::of_line(".include \"x.mk\""), Directive::Other);
        assert_eq!(Directive::of_line("VAR= value"), Directive::Other);
        assert_eq!(Directive::of_line("\t.if"), Directive::Other);
    }

    #[test]
    fn test_directive_args() {
        assert_eq!(directive_args(".if ${A} # comment"), Some("${A}"));
        assert_eq!(directive_args(".  for f in a b"), Some("f in a b"));
        assert_eq!(directive_args(".if ${A:M\\#*}"), Some("${A:M\\#*}"));
        assert_eq!(directive_args(".endif"), Some(""));
        assert_eq!(directive_args("VAR= value"), None);
    }

    #[test]
    fn test_flat_lines() {
        assert_eq!(
            build(&["A=1", "B=2"]),
            Ok(Stmt::Block(vec![Stmt::Line("A=1"), Stmt::Line("B=2")]))
        );
        assert_eq!(build(&[]), Ok(Stmt::Block(vec![])));
    }

    #[test]
    fn test_if_elif_else() {
        let lines = [".if a", "info", ".elif b", ".else", ".for x in y", ".endfor", ".endif"];
        let tree = build(&lines).unwrap();
        assert_eq!(
            tree,
            Stmt::Block(vec![Stmt::Cond {
                conds: vec![".if a", ".elif b"],
                branches: vec![
                    vec![Stmt::Line("info")],
                    vec![],
                    vec![Stmt::Loop {
                        head: ".for x in y",
                        body: vec![]
                    }],
                ],
            }])
        );
        if let Stmt::Block(stmts) = &tree {
            assert!(stmts[0].has_else());
        }
    }

    #[test]
    fn test_nested_loops() {
        let tree = build(&[".for a in 1", ".for b in 2", "x", ".endfor", ".endfor"]).unwrap();
        assert_eq!(
            tree,
            Stmt::Block(vec![Stmt::Loop {
                head: ".for a in 1",
                body: vec![Stmt::Loop {
                    head: ".for b in 2",
                    body: vec![Stmt::Line("x")]
                }],
            }])
        );
    }

    #[test]
    fn test_nesting_errors() {
        assert_eq!(build(&[".if a", "x"]), Err(NestingError::Unclosed { open: 1 }));
        assert_eq!(build(&[".elif a"]), Err(NestingError::UnexpectedElif { line: 1 }));
        assert_eq!(
            build(&[".if a", ".else", ".elif b", ".endif"]),
            Err(NestingError::UnexpectedElif { line: 3 })
        );
        assert_eq!(
            build(&[".if a", ".else", ".else", ".endif"]),
            Err(NestingError::UnexpectedElse { line: 3 })
        );
        assert_eq!(
            build(&[".for a in b", ".else", ".endfor"]),
            Err(NestingError::UnexpectedElse { line: 2 })
        );
        assert_eq!(
            build(&["x", ".endif"]),
            Err(NestingError::UnexpectedEnd {
                line: 2,
                directive: Directive::Endif
            })
        );
        assert_eq!(
            build(&[".for a in b", ".endif"]),
            Err(NestingError::MismatchedEnd {
                line: 2,
                expected: Directive::For,
                found: Directive::Endif
            })
        );
    }

    #[test]
    fn test_build_stmt_tree_discards_partial_result() {
        let lines = [".if a", "x", ".for b in c", ".endif"];
        assert!(build_stmt_tree(lines, |l| Directive::of_line(l)).is_none());
    }
}
