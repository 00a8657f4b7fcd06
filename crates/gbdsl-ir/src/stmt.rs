//! IR statement nodes.

use serde::{Deserialize, Serialize};

use crate::expr::Expr;
use crate::SourceLocation;

/// A recorded statement. The location feeds the source map only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stmt {
    pub kind: StmtKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}

/// The kind of statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StmtKind {
    /// `target op value`
    Assign {
        target: String,
        op: AssignOp,
        value: Expr,
    },
    /// `if cond { then } [else { else }]`
    If {
        cond: Expr,
        then_branch: Vec<Stmt>,
        else_branch: Option<Vec<Stmt>>,
    },
    /// `while cond { body }`
    While { cond: Expr, body: Vec<Stmt> },
    /// `for counter in start..end { body }`
    For {
        counter: String,
        start: i32,
        end: i32,
        body: Vec<Stmt>,
    },
    /// `name(args...)`
    Call { name: String, args: Vec<Expr> },
    /// Switch to another scene at the end of the frame.
    ChangeScene(String),
    /// Target source text emitted verbatim.
    Raw(String),
    /// `array[index] op value`
    AssignIndex {
        array: String,
        index: Expr,
        op: AssignOp,
        value: Expr,
    },
}

/// Assignment operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AssignOp {
    #[default]
    Set,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl AssignOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignOp::Set => "=",
            AssignOp::Add => "+=",
            AssignOp::Sub => "-=",
            AssignOp::Mul => "*=",
            AssignOp::Div => "/=",
            AssignOp::Mod => "%=",
            AssignOp::BitAnd => "&=",
            AssignOp::BitOr => "|=",
            AssignOp::BitXor => "^=",
            AssignOp::Shl => "<<=",
            AssignOp::Shr => ">>=",
        }
    }
}

impl Stmt {
    pub fn new(kind: StmtKind) -> Self {
        Self {
            kind,
            location: None,
        }
    }

    /// Attach an authoring location.
    pub fn at(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn assign(target: impl Into<String>, value: Expr) -> Self {
        Self::compound(target, AssignOp::Set, value)
    }

    pub fn compound(target: impl Into<String>, op: AssignOp, value: Expr) -> Self {
        Self::new(StmtKind::Assign {
            target: target.into(),
            op,
            value,
        })
    }

    pub fn if_then(cond: Expr, then_branch: Vec<Stmt>, else_branch: Option<Vec<Stmt>>) -> Self {
        Self::new(StmtKind::If {
            cond,
            then_branch,
            else_branch,
        })
    }

    pub fn while_loop(cond: Expr, body: Vec<Stmt>) -> Self {
        Self::new(StmtKind::While { cond, body })
    }

    pub fn for_range(counter: impl Into<String>, start: i32, end: i32, body: Vec<Stmt>) -> Self {
        Self::new(StmtKind::For {
            counter: counter.into(),
            start,
            end,
            body,
        })
    }

    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::new(StmtKind::Call {
            name: name.into(),
            args,
        })
    }

    pub fn change_scene(scene: impl Into<String>) -> Self {
        Self::new(StmtKind::ChangeScene(scene.into()))
    }

    pub fn raw(text: impl Into<String>) -> Self {
        Self::new(StmtKind::Raw(text.into()))
    }

    pub fn assign_index(array: impl Into<String>, index: Expr, op: AssignOp, value: Expr) -> Self {
        Self::new(StmtKind::AssignIndex {
            array: array.into(),
            index,
            op,
            value,
        })
    }

    /// Visit this statement and every nested statement, depth first.
    pub fn walk<F: FnMut(&Stmt)>(&self, f: &mut F) {
        f(self);
        match &self.kind {
            StmtKind::If {
                then_branch,
                else_branch,
                ..
            } => {
                for s in then_branch {
                    s.walk(f);
                }
                if let Some(else_branch) = else_branch {
                    for s in else_branch {
                        s.walk(f);
                    }
                }
            }
            StmtKind::While { body, .. } | StmtKind::For { body, .. } => {
                for s in body {
                    s.walk(f);
                }
            }
            _ => {}
        }
    }
}
