//! Logic blocks — named, parameterized IR fragments.
//!
//! A block is recorded once with placeholder variables and expanded at each
//! use site. Expansion deep-copies the body and replaces every variable
//! reference whose name matches a placeholder with a fresh copy of the
//! argument expression.
//!
//! Substitution is a flat name match: there is no scoping, so any variable
//! in the body that happens to share a placeholder's name is substituted as
//! well. Assignment targets and loop counters are names, not references, and
//! are left alone.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::expr::Expr;
use crate::record::Recorder;
use crate::stmt::{Stmt, StmtKind};
use crate::{IrError, Result};

/// Placeholder name → bound argument.
pub type Substitutions = HashMap<String, Expr>;

/// A reusable, parameterized statement list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicBlock {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
}

impl LogicBlock {
    pub fn new(name: impl Into<String>, params: Vec<String>, body: Vec<Stmt>) -> Self {
        Self {
            name: name.into(),
            params,
            body,
        }
    }

    /// Record a block body with `rec`.
    pub fn record<F>(rec: &mut Recorder, name: impl Into<String>, params: &[&str], block: F) -> Result<Self>
    where
        F: FnOnce(&mut Recorder) -> Result<()>,
    {
        let body = rec.record(block)?;
        Ok(Self::new(
            name,
            params.iter().map(|p| p.to_string()).collect(),
            body,
        ))
    }

    /// Produce an independent copy of the body with placeholders bound to
    /// `args`, positionally.
    pub fn expand(&self, args: &[Expr]) -> Result<Vec<Stmt>> {
        if args.len() != self.params.len() {
            return Err(IrError::ArityMismatch {
                block: self.name.clone(),
                expected: self.params.len(),
                found: args.len(),
            });
        }
        let subs: Substitutions = self
            .params
            .iter()
            .cloned()
            .zip(args.iter().cloned())
            .collect();
        Ok(self.body.iter().map(|s| s.deep_copy(&subs)).collect())
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Deep copy
// ══════════════════════════════════════════════════════════════════════════════

impl Expr {
    /// Copy this tree, replacing matching variable references with fresh
    /// copies of their bound expressions.
    pub fn deep_copy(&self, subs: &Substitutions) -> Expr {
        match self {
            Expr::Literal(lit) => Expr::Literal(lit.clone()),
            Expr::Var(name) => match subs.get(name) {
                // Bound expressions are copied verbatim; substitution does
                // not recurse into the argument itself.
                Some(bound) => bound.deep_copy(&Substitutions::new()),
                None => Expr::Var(name.clone()),
            },
            Expr::Binary { left, op, right } => {
                Expr::binary(left.deep_copy(subs), *op, right.deep_copy(subs))
            }
            Expr::Unary { op, operand } => Expr::unary(*op, operand.deep_copy(subs)),
            Expr::Index { array, index } => Expr::index(array.clone(), index.deep_copy(subs)),
            Expr::Call { name, args } => Expr::call(
                name.clone(),
                args.iter().map(|a| a.deep_copy(subs)).collect(),
            ),
            Expr::Ternary {
                cond,
                then_expr,
                else_expr,
            } => Expr::ternary(
                cond.deep_copy(subs),
                then_expr.deep_copy(subs),
                else_expr.deep_copy(subs),
            ),
        }
    }
}

impl Stmt {
    /// Copy this statement tree, substituting placeholders in every
    /// expression it contains.
    pub fn deep_copy(&self, subs: &Substitutions) -> Stmt {
        let kind = match &self.kind {
            StmtKind::Assign { target, op, value } => StmtKind::Assign {
                target: target.clone(),
                op: *op,
                value: value.deep_copy(subs),
            },
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => StmtKind::If {
                cond: cond.deep_copy(subs),
                then_branch: copy_all(then_branch, subs),
                else_branch: else_branch.as_deref().map(|b| copy_all(b, subs)),
            },
            StmtKind::While { cond, body } => StmtKind::While {
                cond: cond.deep_copy(subs),
                body: copy_all(body, subs),
            },
            StmtKind::For {
                counter,
                start,
                end,
                body,
            } => StmtKind::For {
                counter: counter.clone(),
                start: *start,
                end: *end,
                body: copy_all(body, subs),
            },
            StmtKind::Call { name, args } => StmtKind::Call {
                name: name.clone(),
                args: args.iter().map(|a| a.deep_copy(subs)).collect(),
            },
            StmtKind::ChangeScene(scene) => StmtKind::ChangeScene(scene.clone()),
            StmtKind::Raw(text) => StmtKind::Raw(text.clone()),
            StmtKind::AssignIndex {
                array,
                index,
                op,
                value,
            } => StmtKind::AssignIndex {
                array: array.clone(),
                index: index.deep_copy(subs),
                op: *op,
                value: value.deep_copy(subs),
            },
        };
        Stmt {
            kind,
            location: self.location.clone(),
        }
    }
}

fn copy_all(stmts: &[Stmt], subs: &Substitutions) -> Vec<Stmt> {
    stmts.iter().map(|s| s.deep_copy(subs)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::BinOp;

    fn damage_block() -> LogicBlock {
        let mut rec = Recorder::new();
        LogicBlock::record(&mut rec, "damage", &["amount"], |r| {
            r.assign("hp", Expr::binary(Expr::var("hp"), BinOp::Sub, Expr::var("amount")))?;
            r.when(
                Expr::binary(Expr::var("amount"), BinOp::Gt, Expr::int(3)),
                |r| r.call("shake", vec![Expr::var("amount")]),
            )
        })
        .unwrap()
    }

    #[test]
    fn test_expand_substitutes_placeholders() {
        let block = damage_block();
        let stmts = block.expand(&[Expr::int(5)]).unwrap();
        match &stmts[0].kind {
            StmtKind::Assign { value, .. } => assert_eq!(
                value,
                &Expr::binary(Expr::var("hp"), BinOp::Sub, Expr::int(5))
            ),
            other => panic!("expected assign, got {other:?}"),
        }
        let mut vars = Vec::new();
        for s in &stmts {
            s.walk(&mut |s| {
                if let StmtKind::Call { args, .. } = &s.kind {
                    args[0].for_each_var(&mut |v| vars.push(v.to_string()));
                }
            });
        }
        assert!(vars.is_empty(), "placeholder survived: {vars:?}");
    }

    #[test]
    fn test_arity_mismatch() {
        let block = damage_block();
        let err = block.expand(&[]).unwrap_err();
        assert_eq!(
            err,
            IrError::ArityMismatch {
                block: "damage".into(),
                expected: 1,
                found: 0
            }
        );
    }

    #[test]
    fn test_bound_expression_not_resubstituted() {
        // Binding `amount := amount + 1` must not loop or recurse.
        let block = damage_block();
        let arg = Expr::binary(Expr::var("amount"), BinOp::Add, Expr::int(1));
        let stmts = block.expand(&[arg.clone()]).unwrap();
        match &stmts[0].kind {
            StmtKind::Assign { value, .. } => {
                assert_eq!(value, &Expr::binary(Expr::var("hp"), BinOp::Sub, arg))
            }
            other => panic!("expected assign, got {other:?}"),
        }
    }

    #[test]
    fn test_expansion_leaves_block_untouched() {
        let block = damage_block();
        let before = block.clone();
        let _ = block.expand(&[Expr::var("x")]).unwrap();
        assert_eq!(block, before);
    }
}
