//! Finite state machines.
//!
//! Each machine gets an enum of its states, a state variable, and an
//! `update` routine that runs the current state's handler and then fires
//! the first transition whose condition holds: exit the old state, switch,
//! enter the new one.

use gbdsl_ir::game::{StateDef, StateMachineDef};
use gbdsl_ir::{Expr, Stmt};
use tracing::debug;

use crate::context::LowerContext;
use crate::error::LowerResult;
use crate::stmt::lower_block;
use crate::symbols::{c_ident, state_const, upper_ident};

pub fn prototypes(ctx: &LowerContext<'_>) -> Vec<String> {
    ctx.game
        .state_machines
        .iter()
        .flat_map(|sm| {
            let name = c_ident(&sm.name);
            [format!("void {name}_init(void);"), format!("void {name}_update(void);")]
        })
        .collect()
}

/// State enums and state variables.
pub fn emit_enums(ctx: &mut LowerContext<'_>) -> LowerResult<()> {
    let game = ctx.game;
    if game.state_machines.is_empty() {
        return Ok(());
    }
    for sm in &game.state_machines {
        sm.validate()?;
    }
    ctx.banner();
    for sm in &game.state_machines {
        let mut members: Vec<String> = sm
            .states
            .iter()
            .map(|s| state_const(&sm.name, &s.name))
            .collect();
        members.push(format!("{}_STATE_COUNT", upper_ident(&sm.name)));
        ctx.out.line(format!("enum {{ {} }};", members.join(", ")));
        ctx.out.line(format!("uint8_t {}_state;", c_ident(&sm.name)));
    }
    ctx.out.blank();
    Ok(())
}

/// Handler dispatch, `init` and `update` routines.
pub fn emit_update(ctx: &mut LowerContext<'_>) -> LowerResult<()> {
    let game = ctx.game;
    if game.state_machines.is_empty() {
        return Ok(());
    }
    ctx.banner();
    for sm in &game.state_machines {
        sm.validate()?;
        emit_machine(ctx, sm)?;
        debug!(
            machine = %sm.name,
            states = sm.states.len(),
            transitions = sm.transitions.len(),
            "state machine lowered"
        );
    }
    Ok(())
}

fn emit_machine(ctx: &mut LowerContext<'_>, sm: &StateMachineDef) -> LowerResult<()> {
    let name = c_ident(&sm.name);
    let var = format!("{name}_state");

    emit_dispatch(ctx, sm, "enter", |s| &s.on_enter)?;
    emit_dispatch(ctx, sm, "exit", |s| &s.on_exit)?;

    ctx.function(
        &format!("{name}_transition"),
        &format!("static void {name}_transition(uint8_t to)"),
        |ctx| {
            ctx.out.line(format!("{name}_exit({var});"));
            ctx.out.line(format!("{var} = to;"));
            ctx.out.line(format!("{name}_enter(to);"));
            Ok(())
        },
    )?;

    ctx.function(
        &format!("{name}_init"),
        &format!("void {name}_init(void)"),
        |ctx| {
            ctx.out
                .line(format!("{var} = {};", state_const(&sm.name, &sm.initial)));
            ctx.out.line(format!("{name}_enter({var});"));
            Ok(())
        },
    )?;

    ctx.function(
        &format!("{name}_update"),
        &format!("void {name}_update(void)"),
        |ctx| {
            ctx.out.open(format!("switch ({var})"));
            for state in &sm.states {
                ctx.out
                    .line(format!("case {}:", state_const(&sm.name, &state.name)));
                ctx.out.indent();
                lower_block(ctx, &state.on_update)?;
                if let Some(chain) = transition_chain(sm, state) {
                    lower_block(ctx, &[chain])?;
                }
                ctx.out.line("break;");
                ctx.out.dedent();
            }
            ctx.out.line("default:");
            ctx.out.indent();
            ctx.out.line("break;");
            ctx.out.dedent();
            ctx.out.close();
            Ok(())
        },
    )
}

/// `static void <machine>_<kind>(uint8_t s)` switching over states.
fn emit_dispatch<F>(ctx: &mut LowerContext<'_>, sm: &StateMachineDef, kind: &str, handler: F) -> LowerResult<()>
where
    F: Fn(&StateDef) -> &Vec<Stmt>,
{
    let name = c_ident(&sm.name);
    ctx.function(
        &format!("{name}_{kind}"),
        &format!("static void {name}_{kind}(uint8_t s)"),
        |ctx| {
            ctx.out.open("switch (s)");
            for state in &sm.states {
                let body = handler(state);
                if body.is_empty() {
                    continue;
                }
                ctx.out
                    .line(format!("case {}:", state_const(&sm.name, &state.name)));
                ctx.out.indent();
                lower_block(ctx, body)?;
                ctx.out.line("break;");
                ctx.out.dedent();
            }
            ctx.out.line("default:");
            ctx.out.indent();
            ctx.out.line("break;");
            ctx.out.dedent();
            ctx.out.close();
            Ok(())
        },
    )
}

/// The transitions leaving `state` as one if / else-if chain, first
/// declared first tested.
fn transition_chain(sm: &StateMachineDef, state: &StateDef) -> Option<Stmt> {
    let name = c_ident(&sm.name);
    sm.transitions
        .iter()
        .filter(|t| t.from == state.name)
        .rev()
        .fold(None, |else_branch, t| {
            let fire = Stmt::call(
                format!("{name}_transition"),
                vec![Expr::var(state_const(&sm.name, &t.to))],
            );
            Some(Stmt::if_then(
                t.when.clone(),
                vec![fire],
                else_branch.map(|s| vec![s]),
            ))
        })
}
