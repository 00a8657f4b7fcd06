//! Statement lowering.
//!
//! Every expression goes through the same three steps: fold in the domain of
//! the value's destination, check array subscripts, emit.

use gbdsl_ir::{DiagnosticCode, Expr, NumericDomain, Stmt, StmtKind};

use crate::context::LowerContext;
use crate::emit::emit_expr;
use crate::error::{LowerError, LowerResult};
use crate::symbols::{len_const, scene_const};

/// Lower a statement list at the current indentation.
pub fn lower_block(ctx: &mut LowerContext<'_>, stmts: &[Stmt]) -> LowerResult<()> {
    for stmt in stmts {
        lower_stmt(ctx, stmt)?;
    }
    Ok(())
}

/// Lower a single statement.
pub fn lower_stmt(ctx: &mut LowerContext<'_>, stmt: &Stmt) -> LowerResult<()> {
    ctx.mark(stmt.location.as_ref());
    match &stmt.kind {
        StmtKind::Assign { target, op, value } => {
            let domain = ctx.symbols.domain_of(target).unwrap_or(ctx.options.domain);
            let value = lower_expr(ctx, value, domain)?;
            ctx.out.line(format!("{target} {} {value};", op.as_str()));
        }
        StmtKind::AssignIndex {
            array,
            index,
            op,
            value,
        } => {
            let domain = ctx.symbols.domain_of(array).unwrap_or(ctx.options.domain);
            let index = ctx.folder(ctx.options.domain).simplify(index);
            let index = guard_indices(ctx, index)?;
            let index = emit_expr(&checked_subscript(ctx, array, index)?);
            let value = lower_expr(ctx, value, domain)?;
            ctx.out
                .line(format!("{array}[{index}] {} {value};", op.as_str()));
        }
        StmtKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            let c = lower_cond(ctx, cond)?;
            ctx.out.open(format!("if ({c})"));
            lower_block(ctx, then_branch)?;
            let mut rest = else_branch.as_deref();
            while let Some(branch) = rest {
                match branch {
                    [Stmt {
                        kind:
                            StmtKind::If {
                                cond,
                                then_branch,
                                else_branch,
                            },
                        location,
                    }] => {
                        let c = lower_cond(ctx, cond)?;
                        ctx.mark(location.as_ref());
                        ctx.out.reopen(format!("}} else if ({c}) {{"));
                        lower_block(ctx, then_branch)?;
                        rest = else_branch.as_deref();
                    }
                    other => {
                        ctx.out.reopen("} else {");
                        lower_block(ctx, other)?;
                        rest = None;
                    }
                }
            }
            ctx.out.close();
        }
        StmtKind::While { cond, body } => {
            let c = lower_cond(ctx, cond)?;
            ctx.out.open(format!("while ({c})"));
            lower_block(ctx, body)?;
            ctx.out.close();
        }
        StmtKind::For {
            counter,
            start,
            end,
            body,
        } => {
            let ty = counter_type(*start, *end);
            ctx.out.open(format!(
                "for ({ty} {counter} = {start}; {counter} < {end}; {counter}++)"
            ));
            lower_block(ctx, body)?;
            ctx.out.close();
        }
        StmtKind::Call { name, args } => {
            let call = lower_expr(ctx, &Expr::call(name.clone(), args.clone()), ctx.options.domain)?;
            ctx.out.line(format!("{call};"));
        }
        StmtKind::ChangeScene(scene) => match ctx.symbols.scene_index(scene) {
            Some(_) => ctx.out.line(format!("change_scene({});", scene_const(scene))),
            None => ctx.error(
                DiagnosticCode::UNKNOWN_SCENE,
                format!("unknown scene '{scene}'"),
                stmt.location.as_ref(),
            ),
        },
        StmtKind::Raw(text) => {
            for line in text.lines() {
                ctx.out.line(line);
            }
        }
    }
    Ok(())
}

/// Fold `expr` in `domain`, check its subscripts and emit it.
pub fn lower_expr(ctx: &LowerContext<'_>, expr: &Expr, domain: NumericDomain) -> LowerResult<String> {
    let folded = ctx.folder(domain).simplify(expr);
    Ok(emit_expr(&guard_indices(ctx, folded)?))
}

/// Lower a condition in the default domain.
pub fn lower_cond(ctx: &LowerContext<'_>, expr: &Expr) -> LowerResult<String> {
    lower_expr(ctx, expr, ctx.options.domain)
}

/// Narrowest C type that holds every value of `start..=end`.
pub fn counter_type(start: i32, end: i32) -> &'static str {
    if start >= 0 && end <= 0xFF {
        "uint8_t"
    } else if start >= 0 && end <= 0xFFFF {
        "uint16_t"
    } else if start >= i8::MIN as i32 && end <= i8::MAX as i32 {
        "int8_t"
    } else if start >= i16::MIN as i32 && end <= i16::MAX as i32 {
        "int16_t"
    } else {
        "int32_t"
    }
}

fn guard_indices(ctx: &LowerContext<'_>, expr: Expr) -> LowerResult<Expr> {
    Ok(match expr {
        Expr::Literal(_) | Expr::Var(_) => expr,
        Expr::Index { array, index } => {
            let index = guard_indices(ctx, *index)?;
            let index = checked_subscript(ctx, &array, index)?;
            Expr::index(array, index)
        }
        Expr::Binary { left, op, right } => {
            Expr::binary(guard_indices(ctx, *left)?, op, guard_indices(ctx, *right)?)
        }
        Expr::Unary { op, operand } => Expr::unary(op, guard_indices(ctx, *operand)?),
        Expr::Call { name, args } => Expr::call(
            name,
            args.into_iter()
                .map(|a| guard_indices(ctx, a))
                .collect::<LowerResult<Vec<_>>>()?,
        ),
        Expr::Ternary {
            cond,
            then_expr,
            else_expr,
        } => Expr::ternary(
            guard_indices(ctx, *cond)?,
            guard_indices(ctx, *then_expr)?,
            guard_indices(ctx, *else_expr)?,
        ),
    })
}

/// Reject literal out-of-bounds subscripts of declared arrays and wrap
/// dynamic ones in `BOUNDS_CHECK`.
fn checked_subscript(ctx: &LowerContext<'_>, array: &str, index: Expr) -> LowerResult<Expr> {
    let Some(len) = ctx.symbols.array_len(array) else {
        return Ok(index);
    };
    match index.as_int() {
        Some(i) if i < 0 || i >= len as i32 => Err(LowerError::IndexOutOfBounds {
            array: array.to_string(),
            index: i,
            len,
        }),
        Some(_) => Ok(index),
        None if ctx.options.bounds_checks => Ok(Expr::call(
            "BOUNDS_CHECK",
            vec![index, Expr::var(len_const(array))],
        )),
        None => Ok(index),
    }
}
