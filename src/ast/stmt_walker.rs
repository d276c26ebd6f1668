//! Statement Walker
//!
//! Visits the lines of a block structure in source order.

use crate::ast::types::Stmt;

pub trait StmtVisitor<L> {
    /// A line that neither opens nor continues a block.
    fn line(&mut self, _line: &L) {}
    /// An `.if` or `.elif` line, right before the statements of its branch.
    fn condition(&mut self, _line: &L) {}
    /// A `.for` line, right before the loop body.
    fn loop_head(&mut self, _line: &L) {}
}

/// Visits `stmt` and everything below it. The statements of an `.else`
/// branch are visited without a preceding callback.
pub fn walk_stmt<L, V: StmtVisitor<L> + ?Sized>(stmt: &Stmt<L>, visitor: &mut V) {
    match stmt {
        Stmt::Line(line) => visitor.line(line),
        Stmt::Block(stmts) => walk_stmts(stmts, visitor),
        Stmt::Cond { conds, branches } => {
            for (i, branch) in branches.iter().enumerate() {
                if let Some(cond) = conds.get(i) {
                    visitor.condition(cond);
                }
                walk_stmts(branch, visitor);
            }
        }
        Stmt::Loop { head, body } => {
            visitor.loop_head(head);
            walk_stmts(body, visitor);
        }
    }
}

fn walk_stmts<L, V: StmtVisitor<L> + ?Sized>(stmts: &[Stmt<L>], visitor: &mut V) {
    for stmt in stmts {
        walk_stmt(stmt, visitor);
    }
}
