//! IR expression nodes.
//!
//! Expressions form an owned tree; every `Box` is uniquely owned, so two
//! trees never share a node.

use serde::{Deserialize, Serialize};

// ══════════════════════════════════════════════════════════════════════════════
// Expressions
// ══════════════════════════════════════════════════════════════════════════════

/// An expression node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expr {
    /// `42`, `"hello"`
    Literal(Literal),
    /// `score`
    Var(String),
    /// `left op right`
    Binary {
        left: Box<Expr>,
        op: BinOp,
        right: Box<Expr>,
    },
    /// `op operand`
    Unary { op: UnaryOp, operand: Box<Expr> },
    /// `array[index]`
    Index { array: String, index: Box<Expr> },
    /// `name(args...)`
    Call { name: String, args: Vec<Expr> },
    /// `cond ? then_expr : else_expr`
    Ternary {
        cond: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
}

/// Literal values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Literal {
    Int(i32),
    Str(String),
}

impl Expr {
    pub fn int(value: i32) -> Self {
        Expr::Literal(Literal::Int(value))
    }

    pub fn str(value: impl Into<String>) -> Self {
        Expr::Literal(Literal::Str(value.into()))
    }

    pub fn var(name: impl Into<String>) -> Self {
        Expr::Var(name.into())
    }

    pub fn binary(left: Expr, op: BinOp, right: Expr) -> Self {
        Expr::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        Expr::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn index(array: impl Into<String>, index: Expr) -> Self {
        Expr::Index {
            array: array.into(),
            index: Box::new(index),
        }
    }

    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Call {
            name: name.into(),
            args,
        }
    }

    pub fn ternary(cond: Expr, then_expr: Expr, else_expr: Expr) -> Self {
        Expr::Ternary {
            cond: Box::new(cond),
            then_expr: Box::new(then_expr),
            else_expr: Box::new(else_expr),
        }
    }

    /// The integer value if this is an integer literal.
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Expr::Literal(Literal::Int(v)) => Some(*v),
            _ => None,
        }
    }

    /// The variable name if this is a plain variable reference.
    pub fn as_var(&self) -> Option<&str> {
        match self {
            Expr::Var(name) => Some(name),
            _ => None,
        }
    }

    /// True if evaluating the expression cannot have side effects.
    pub fn is_pure(&self) -> bool {
        match self {
            Expr::Literal(_) | Expr::Var(_) => true,
            Expr::Binary { left, right, .. } => left.is_pure() && right.is_pure(),
            Expr::Unary { operand, .. } => operand.is_pure(),
            Expr::Index { index, .. } => index.is_pure(),
            Expr::Call { .. } => false,
            Expr::Ternary {
                cond,
                then_expr,
                else_expr,
            } => cond.is_pure() && then_expr.is_pure() && else_expr.is_pure(),
        }
    }

    /// Visit every variable name referenced by this expression.
    pub fn for_each_var<F: FnMut(&str)>(&self, f: &mut F) {
        match self {
            Expr::Literal(_) => {}
            Expr::Var(name) => f(name),
            Expr::Binary { left, right, .. } => {
                left.for_each_var(f);
                right.for_each_var(f);
            }
            Expr::Unary { operand, .. } => operand.for_each_var(f),
            Expr::Index { index, .. } => index.for_each_var(f),
            Expr::Call { args, .. } => {
                for arg in args {
                    arg.for_each_var(f);
                }
            }
            Expr::Ternary {
                cond,
                then_expr,
                else_expr,
            } => {
                cond.for_each_var(f);
                then_expr.for_each_var(f);
                else_expr.for_each_var(f);
            }
        }
    }
}

impl From<i32> for Expr {
    fn from(value: i32) -> Self {
        Expr::int(value)
    }
}

impl From<&str> for Expr {
    fn from(name: &str) -> Self {
        Expr::var(name)
    }
}

// ── Binary Operators ──────────────────────────────────────────────────────────

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinOp {
    // Multiplicative
    Mul,
    Div,
    Mod,
    // Additive
    Add,
    Sub,
    // Shift
    Shl,
    Shr,
    // Relational
    Lt,
    Le,
    Gt,
    Ge,
    // Equality
    Eq,
    Ne,
    // Bitwise
    BitAnd,
    BitXor,
    BitOr,
    // Logical
    And,
    Or,
}

/// C operator precedence levels, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Precedence {
    LogicalOr,
    LogicalAnd,
    BitOr,
    BitXor,
    BitAnd,
    Equality,
    Relational,
    Shift,
    Additive,
    Multiplicative,
}

impl BinOp {
    /// Returns the C operator token.
    pub fn as_str(&self) -> &'static str {
        match self {
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::BitAnd => "&",
            BinOp::BitXor => "^",
            BinOp::BitOr => "|",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }

    pub fn precedence(&self) -> Precedence {
        match self {
            BinOp::Mul | BinOp::Div | BinOp::Mod => Precedence::Multiplicative,
            BinOp::Add | BinOp::Sub => Precedence::Additive,
            BinOp::Shl | BinOp::Shr => Precedence::Shift,
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => Precedence::Relational,
            BinOp::Eq | BinOp::Ne => Precedence::Equality,
            BinOp::BitAnd => Precedence::BitAnd,
            BinOp::BitXor => Precedence::BitXor,
            BinOp::BitOr => Precedence::BitOr,
            BinOp::And => Precedence::LogicalAnd,
            BinOp::Or => Precedence::LogicalOr,
        }
    }

    /// `a op b == b op a`.
    pub fn is_commutative(&self) -> bool {
        matches!(
            self,
            BinOp::Mul
                | BinOp::Add
                | BinOp::Eq
                | BinOp::Ne
                | BinOp::BitAnd
                | BinOp::BitXor
                | BinOp::BitOr
                | BinOp::And
                | BinOp::Or
        )
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    /// `-x`
    Neg,
    /// `!x`
    Not,
    /// `~x`
    BitNot,
}

impl UnaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "~",
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Numeric domains
// ══════════════════════════════════════════════════════════════════════════════

/// Integer representation of a value on the target CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumericDomain {
    #[default]
    U8,
    I8,
    U16,
    I16,
}

impl NumericDomain {
    pub fn bits(self) -> u32 {
        match self {
            NumericDomain::U8 | NumericDomain::I8 => 8,
            NumericDomain::U16 | NumericDomain::I16 => 16,
        }
    }

    pub fn is_signed(self) -> bool {
        matches!(self, NumericDomain::I8 | NumericDomain::I16)
    }

    /// Reduce a value to what the runtime representation can hold,
    /// with two's-complement wraparound.
    pub fn wrap(self, value: i32) -> i32 {
        match self {
            NumericDomain::U8 => value & 0xFF,
            NumericDomain::I8 => value as i8 as i32,
            NumericDomain::U16 => value & 0xFFFF,
            NumericDomain::I16 => value as i16 as i32,
        }
    }

    pub fn c_type(self) -> &'static str {
        match self {
            NumericDomain::U8 => "uint8_t",
            NumericDomain::I8 => "int8_t",
            NumericDomain::U16 => "uint16_t",
            NumericDomain::I16 => "int16_t",
        }
    }
}
