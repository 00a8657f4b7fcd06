//! Precedence-aware C expression emission.
//!
//! Parentheses are added only where C's precedence and associativity would
//! otherwise change the meaning:
//!
//! - a binary child binds looser than its parent;
//! - a binary child of equal precedence sits on the right, unless the parent
//!   and child regroup freely (`a + (b - c)`, `a * (b * c)`, `a & (b & c)`);
//! - a ternary is not the outermost expression;
//! - a binary or ternary is the operand of a unary operator;
//! - a negation is applied to another negation or a negative literal, where
//!   `--` would lex as a decrement.
//!
//! Call arguments and array subscripts are emitted as outermost expressions.

use gbdsl_ir::{BinOp, Expr, Literal, UnaryOp};

/// Emit `expr` as C source text.
pub fn emit_expr(expr: &Expr) -> String {
    let mut out = String::new();
    write_expr(&mut out, expr, true);
    out
}

fn write_expr(out: &mut String, expr: &Expr, root: bool) {
    match expr {
        Expr::Literal(lit) => write_literal(out, lit),
        Expr::Var(name) => out.push_str(name),
        Expr::Binary { left, op, right } => {
            write_operand(out, *op, left, false);
            out.push(' ');
            out.push_str(op.as_str());
            out.push(' ');
            write_operand(out, *op, right, true);
        }
        Expr::Unary { op, operand } => {
            out.push_str(op.as_str());
            if unary_needs_parens(*op, operand) {
                out.push('(');
                write_expr(out, operand, true);
                out.push(')');
            } else {
                write_expr(out, operand, false);
            }
        }
        Expr::Index { array, index } => {
            out.push_str(array);
            out.push('[');
            write_expr(out, index, true);
            out.push(']');
        }
        Expr::Call { name, args } => {
            out.push_str(name);
            out.push('(');
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_expr(out, arg, true);
            }
            out.push(')');
        }
        Expr::Ternary {
            cond,
            then_expr,
            else_expr,
        } => {
            if !root {
                out.push('(');
            }
            write_expr(out, cond, false);
            out.push_str(" ? ");
            write_expr(out, then_expr, false);
            out.push_str(" : ");
            write_expr(out, else_expr, false);
            if !root {
                out.push(')');
            }
        }
    }
}

fn write_operand(out: &mut String, parent: BinOp, child: &Expr, right: bool) {
    if binary_needs_parens(parent, child, right) {
        out.push('(');
        write_expr(out, child, true);
        out.push(')');
    } else {
        write_expr(out, child, false);
    }
}

fn binary_needs_parens(parent: BinOp, child: &Expr, right: bool) -> bool {
    let Expr::Binary { op: child_op, .. } = child else {
        // Ternaries parenthesize themselves; everything else binds tighter.
        return false;
    };
    let (p, c) = (parent.precedence(), child_op.precedence());
    if c != p {
        return c < p;
    }
    right && !regroups(parent, *child_op)
}

/// `a parent (b child c) == (a parent b) child c`.
fn regroups(parent: BinOp, child: BinOp) -> bool {
    match parent {
        BinOp::Add => matches!(child, BinOp::Add | BinOp::Sub),
        BinOp::Mul | BinOp::BitAnd | BinOp::BitXor | BinOp::BitOr | BinOp::And | BinOp::Or => {
            child == parent
        }
        _ => false,
    }
}

fn unary_needs_parens(op: UnaryOp, operand: &Expr) -> bool {
    match operand {
        Expr::Binary { .. } | Expr::Ternary { .. } => true,
        Expr::Unary {
            op: UnaryOp::Neg, ..
        } => op == UnaryOp::Neg,
        Expr::Literal(Literal::Int(v)) => op == UnaryOp::Neg && *v < 0,
        _ => false,
    }
}

fn write_literal(out: &mut String, lit: &Literal) {
    match lit {
        Literal::Int(v) => out.push_str(&v.to_string()),
        Literal::Str(s) => {
            out.push('"');
            out.push_str(&escape_c(s));
            out.push('"');
        }
    }
}

/// Escape a string for a C string literal.
pub fn escape_c(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_ascii_graphic() || c == ' ' => out.push(c),
            c => {
                let mut buf = [0u8; 4];
                for b in c.encode_utf8(&mut buf).bytes() {
                    out.push_str(&format!("\\x{b:02x}"));
                }
            }
        }
    }
    out
}
