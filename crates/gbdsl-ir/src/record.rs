//! Recording engine — turns authoring calls into IR statement lists.
//!
//! A [`Recorder`] owns a stack of statement sinks. [`Recorder::record`]
//! pushes a fresh sink, runs the authoring block, and pops it again, so a
//! block recorded inside another block (an `if` inside a frame handler)
//! composes without any ambient state. The stack is strictly LIFO: push and
//! pop happen in the same call frame.

use crate::expr::Expr;
use crate::logic::LogicBlock;
use crate::stmt::{AssignOp, Stmt, StmtKind};
use crate::{IrError, Result, SourceLocation};

// ══════════════════════════════════════════════════════════════════════════════
// Sink abstraction
// ══════════════════════════════════════════════════════════════════════════════

/// Anything authoring code can append statements to.
pub trait StatementSink {
    /// Append a statement to the active sink.
    fn emit(&mut self, stmt: Stmt) -> Result<()>;
}

// ══════════════════════════════════════════════════════════════════════════════
// Recorder
// ══════════════════════════════════════════════════════════════════════════════

/// A stack of open statement lists.
#[derive(Debug, Default)]
pub struct Recorder {
    frames: Vec<Vec<Stmt>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self { frames: Vec::new() }
    }

    /// Number of open recording blocks.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_recording(&self) -> bool {
        !self.frames.is_empty()
    }

    /// Run `block` with a fresh sink on top of the stack and return what it
    /// recorded. The sink is popped even when `block` fails.
    pub fn record<F>(&mut self, block: F) -> Result<Vec<Stmt>>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        let depth = self.frames.len();
        self.frames.push(Vec::new());
        let outcome = block(self);
        // A nested `record` always pops its own frame before returning.
        debug_assert_eq!(self.frames.len(), depth + 1, "recording stack corrupted");
        let recorded = self.frames.pop().unwrap_or_default();
        outcome.map(|()| recorded)
    }

    /// Append a statement to the innermost sink.
    pub fn emit(&mut self, stmt: Stmt) -> Result<()> {
        self.frames
            .last_mut()
            .ok_or(IrError::NoActiveRecordingContext)?
            .push(stmt);
        Ok(())
    }

    /// The most recently emitted statement of the innermost sink.
    pub fn last(&self) -> Option<&Stmt> {
        self.frames.last().and_then(|f| f.last())
    }

    /// Replace the most recently emitted statement, returning the old one.
    pub fn replace_last(&mut self, stmt: Stmt) -> Result<Stmt> {
        let frame = self
            .frames
            .last_mut()
            .ok_or(IrError::NoActiveRecordingContext)?;
        let slot = frame.last_mut().ok_or(IrError::NoConditionalToExtend)?;
        Ok(std::mem::replace(slot, stmt))
    }

    /// Attach `else_branch` to the last `if` of an if / else-if chain.
    fn attach_else(&mut self, else_branch: Vec<Stmt>) -> Result<()> {
        let last = self
            .last()
            .ok_or_else(|| {
                if self.is_recording() {
                    IrError::NoConditionalToExtend
                } else {
                    IrError::NoActiveRecordingContext
                }
            })?
            .clone();
        let extended = extend_chain(last, else_branch)?;
        self.replace_last(extended)?;
        Ok(())
    }

    // ── Authoring helpers ────────────────────────────────────────────────

    #[track_caller]
    pub fn assign(&mut self, target: impl Into<String>, value: impl Into<Expr>) -> Result<()> {
        let loc = SourceLocation::caller();
        self.emit(Stmt::assign(target, value.into()).at(loc))
    }

    #[track_caller]
    pub fn compound(
        &mut self,
        target: impl Into<String>,
        op: AssignOp,
        value: impl Into<Expr>,
    ) -> Result<()> {
        let loc = SourceLocation::caller();
        self.emit(Stmt::compound(target, op, value.into()).at(loc))
    }

    #[track_caller]
    pub fn assign_index(
        &mut self,
        array: impl Into<String>,
        index: impl Into<Expr>,
        value: impl Into<Expr>,
    ) -> Result<()> {
        let loc = SourceLocation::caller();
        self.emit(Stmt::assign_index(array, index.into(), AssignOp::Set, value.into()).at(loc))
    }

    /// Record `then` as the body of a new conditional.
    #[track_caller]
    pub fn when<F>(&mut self, cond: impl Into<Expr>, then: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        let loc = SourceLocation::caller();
        let then_branch = self.record(then)?;
        self.emit(Stmt::if_then(cond.into(), then_branch, None).at(loc))
    }

    /// Attach an else-branch to the conditional just recorded.
    pub fn otherwise<F>(&mut self, block: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        let else_branch = self.record(block)?;
        self.attach_else(else_branch)
    }

    /// Attach an else-if branch to the conditional just recorded.
    #[track_caller]
    pub fn otherwise_when<F>(&mut self, cond: impl Into<Expr>, then: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        let loc = SourceLocation::caller();
        let then_branch = self.record(then)?;
        self.attach_else(vec![Stmt::if_then(cond.into(), then_branch, None).at(loc)])
    }

    #[track_caller]
    pub fn repeat_while<F>(&mut self, cond: impl Into<Expr>, body: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        let loc = SourceLocation::caller();
        let body = self.record(body)?;
        self.emit(Stmt::while_loop(cond.into(), body).at(loc))
    }

    #[track_caller]
    pub fn for_range<F>(&mut self, counter: impl Into<String>, start: i32, end: i32, body: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        let loc = SourceLocation::caller();
        let body = self.record(body)?;
        self.emit(Stmt::for_range(counter, start, end, body).at(loc))
    }

    #[track_caller]
    pub fn call(&mut self, name: impl Into<String>, args: Vec<Expr>) -> Result<()> {
        let loc = SourceLocation::caller();
        self.emit(Stmt::call(name, args).at(loc))
    }

    #[track_caller]
    pub fn change_scene(&mut self, scene: impl Into<String>) -> Result<()> {
        let loc = SourceLocation::caller();
        self.emit(Stmt::change_scene(scene).at(loc))
    }

    #[track_caller]
    pub fn raw(&mut self, text: impl Into<String>) -> Result<()> {
        let loc = SourceLocation::caller();
        self.emit(Stmt::raw(text).at(loc))
    }

    /// Expand a logic block into the innermost sink.
    pub fn expand(&mut self, block: &LogicBlock, args: &[Expr]) -> Result<()> {
        if !self.is_recording() {
            return Err(IrError::NoActiveRecordingContext);
        }
        for stmt in block.expand(args)? {
            self.emit(stmt)?;
        }
        Ok(())
    }
}

impl StatementSink for Recorder {
    fn emit(&mut self, stmt: Stmt) -> Result<()> {
        Recorder::emit(self, stmt)
    }
}

/// Walk down an else-if chain and hang `else_branch` off its last link.
fn extend_chain(mut stmt: Stmt, else_branch: Vec<Stmt>) -> Result<Stmt> {
    let StmtKind::If {
        else_branch: slot, ..
    } = &mut stmt.kind
    else {
        return Err(IrError::NoConditionalToExtend);
    };
    match slot.take() {
        None => *slot = Some(else_branch),
        Some(mut existing) => {
            let is_else_if = existing.len() == 1
                && matches!(existing[0].kind, StmtKind::If { .. });
            if !is_else_if {
                *slot = Some(existing);
                return Err(IrError::NoConditionalToExtend);
            }
            let nested = existing.remove(0);
            *slot = Some(vec![extend_chain(nested, else_branch)?]);
        }
    }
    Ok(stmt)
}
