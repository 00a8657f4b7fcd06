//! Constant folding and algebraic simplification.
//!
//! A single bottom-up pass: children are folded first, then the rules below
//! are applied to the node until none fires. The pass is idempotent.
//!
//! - Both-literal operations are evaluated; `+ - *`, bitwise and shift
//!   results are wrapped into the numeric domain.
//! - Division or modulo by a literal zero is never folded.
//! - Shifts by an amount outside `0..bits` are never folded.
//! - Identities `x+0 x-0 x*1 x/1 x|0 x^0` drop the literal; `x*0` and `x&0`
//!   collapse to `0` only when `x` has no side effects.
//! - `x-x`, `x^x` become `0` and `x&x`, `x|x` become `x` for identical
//!   variable references.
//! - `*` and `/` by a power of two become shifts when the operand is known
//!   to be unsigned.
//! - A unary operator applied twice cancels.

use std::collections::HashMap;

use gbdsl_ir::{BinOp, Expr, Literal, NumericDomain, UnaryOp};
use tracing::debug;

/// Folds expressions in one numeric domain.
#[derive(Debug, Clone, Copy)]
pub struct Folder<'a> {
    domain: NumericDomain,
    vars: Option<&'a HashMap<String, NumericDomain>>,
}

impl<'a> Folder<'a> {
    pub fn new(domain: NumericDomain) -> Self {
        Self { domain, vars: None }
    }

    /// Declared domains of variables and arrays, consulted for strength
    /// reduction.
    pub fn with_vars(mut self, vars: &'a HashMap<String, NumericDomain>) -> Self {
        self.vars = Some(vars);
        self
    }

    pub fn domain(&self) -> NumericDomain {
        self.domain
    }

    /// Fold `expr`. Returns `None` when nothing changed.
    pub fn fold(&self, expr: &Expr) -> Option<Expr> {
        let folded = self.fold_tree(expr);
        if &folded == expr {
            None
        } else {
            Some(folded)
        }
    }

    /// Fold `expr`, returning a copy when nothing changed.
    pub fn simplify(&self, expr: &Expr) -> Expr {
        self.fold(expr).unwrap_or_else(|| expr.clone())
    }

    fn fold_tree(&self, expr: &Expr) -> Expr {
        let node = match expr {
            Expr::Literal(_) | Expr::Var(_) => return expr.clone(),
            Expr::Binary { left, op, right } => {
                Expr::binary(self.fold_tree(left), *op, self.fold_tree(right))
            }
            Expr::Unary { op, operand } => Expr::unary(*op, self.fold_tree(operand)),
            Expr::Index { array, index } => Expr::index(array.clone(), self.fold_tree(index)),
            Expr::Call { name, args } => {
                Expr::call(name.clone(), args.iter().map(|a| self.fold_tree(a)).collect())
            }
            Expr::Ternary {
                cond,
                then_expr,
                else_expr,
            } => Expr::ternary(
                self.fold_tree(cond),
                self.fold_tree(then_expr),
                self.fold_tree(else_expr),
            ),
        };
        let mut node = node;
        while let Some(next) = self.rewrite(&node) {
            node = next;
        }
        node
    }

    /// One rule application at the root of `expr`.
    fn rewrite(&self, expr: &Expr) -> Option<Expr> {
        match expr {
            Expr::Binary { left, op, right } => self
                .fold_literals(left, *op, right)
                .or_else(|| self.identity(left, *op, right))
                .or_else(|| self.self_cancel(left, *op, right))
                .or_else(|| self.strength_reduce(left, *op, right)),
            Expr::Unary { op, operand } => self.fold_unary(*op, operand),
            Expr::Ternary {
                cond,
                then_expr,
                else_expr,
            } => cond.as_int().map(|c| {
                if c != 0 {
                    (**then_expr).clone()
                } else {
                    (**else_expr).clone()
                }
            }),
            _ => None,
        }
    }

    // ── Rules ────────────────────────────────────────────────────────────

    fn fold_literals(&self, left: &Expr, op: BinOp, right: &Expr) -> Option<Expr> {
        let (a, b) = (left.as_int()?, right.as_int()?);
        let d = self.domain;
        let value = match op {
            BinOp::Add => d.wrap(a.wrapping_add(b)),
            BinOp::Sub => d.wrap(a.wrapping_sub(b)),
            BinOp::Mul => d.wrap(a.wrapping_mul(b)),
            BinOp::Div => d.wrap(a.checked_div(b)?),
            BinOp::Mod => d.wrap(a.checked_rem(b)?),
            BinOp::Shl | BinOp::Shr => {
                if b < 0 || b as u32 >= d.bits() {
                    return None;
                }
                match op {
                    BinOp::Shl => d.wrap(a << b),
                    _ => d.wrap(a) >> b,
                }
            }
            BinOp::Lt => (a < b) as i32,
            BinOp::Le => (a <= b) as i32,
            BinOp::Gt => (a > b) as i32,
            BinOp::Ge => (a >= b) as i32,
            BinOp::Eq => (a == b) as i32,
            BinOp::Ne => (a != b) as i32,
            BinOp::BitAnd => d.wrap(a & b),
            BinOp::BitXor => d.wrap(a ^ b),
            BinOp::BitOr => d.wrap(a | b),
            BinOp::And => (a != 0 && b != 0) as i32,
            BinOp::Or => (a != 0 || b != 0) as i32,
        };
        Some(Expr::int(value))
    }

    fn identity(&self, left: &Expr, op: BinOp, right: &Expr) -> Option<Expr> {
        let (l, r) = (left.as_int(), right.as_int());
        match (op, l, r) {
            (BinOp::Add | BinOp::BitOr | BinOp::BitXor, _, Some(0)) => Some(left.clone()),
            (BinOp::Add | BinOp::BitOr | BinOp::BitXor, Some(0), _) => Some(right.clone()),
            (BinOp::Sub, _, Some(0)) => Some(left.clone()),
            (BinOp::Mul, _, Some(1)) | (BinOp::Div, _, Some(1)) => Some(left.clone()),
            (BinOp::Mul, Some(1), _) => Some(right.clone()),
            (BinOp::Mul | BinOp::BitAnd, _, Some(0)) if left.is_pure() => Some(Expr::int(0)),
            (BinOp::Mul | BinOp::BitAnd, Some(0), _) if right.is_pure() => Some(Expr::int(0)),
            _ => None,
        }
    }

    fn self_cancel(&self, left: &Expr, op: BinOp, right: &Expr) -> Option<Expr> {
        let (a, b) = (left.as_var()?, right.as_var()?);
        if a != b {
            return None;
        }
        match op {
            BinOp::Sub | BinOp::BitXor => Some(Expr::int(0)),
            BinOp::BitAnd | BinOp::BitOr => Some(left.clone()),
            _ => None,
        }
    }

    fn strength_reduce(&self, left: &Expr, op: BinOp, right: &Expr) -> Option<Expr> {
        let (operand, shift, new_op) = match op {
            BinOp::Mul => match (power_of_two(left), power_of_two(right)) {
                (_, Some(k)) => (left, k, BinOp::Shl),
                (Some(k), None) => (right, k, BinOp::Shl),
                (None, None) => return None,
            },
            BinOp::Div => (left, power_of_two(right)?, BinOp::Shr),
            _ => return None,
        };
        if !self.is_unsigned(operand) {
            return None;
        }
        debug!(op = op.as_str(), shift, "strength reduction");
        Some(Expr::binary(operand.clone(), new_op, Expr::int(shift)))
    }

    fn fold_unary(&self, op: UnaryOp, operand: &Expr) -> Option<Expr> {
        if let Expr::Unary {
            op: inner,
            operand: x,
        } = operand
        {
            if *inner == op {
                return Some((**x).clone());
            }
        }
        let a = operand.as_int()?;
        let value = match op {
            UnaryOp::Neg => self.domain.wrap(a.wrapping_neg()),
            UnaryOp::Not => (a == 0) as i32,
            UnaryOp::BitNot => self.domain.wrap(!a),
        };
        Some(Expr::int(value))
    }

    /// Whether the operand's representation is known to be unsigned.
    fn is_unsigned(&self, expr: &Expr) -> bool {
        let declared = |name: &str| self.vars.and_then(|v| v.get(name)).copied();
        match expr {
            Expr::Literal(Literal::Int(v)) => *v >= 0,
            Expr::Var(name) | Expr::Index { array: name, .. } => {
                !declared(name).unwrap_or(self.domain).is_signed()
            }
            _ => !self.domain.is_signed(),
        }
    }
}

/// `Some(k)` when `expr` is the literal `2^k` with `k >= 1`.
fn power_of_two(expr: &Expr) -> Option<i32> {
    let v = expr.as_int()?;
    if v > 1 && (v & (v - 1)) == 0 && v <= 1 << 15 {
        Some(v.trailing_zeros() as i32)
    } else {
        None
    }
}
