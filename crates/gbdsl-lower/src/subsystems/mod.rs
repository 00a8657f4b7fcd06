//! Built-in subsystem compilers.
//!
//! Each compiler reads its part of the [`Game`](gbdsl_ir::Game), writes into
//! the section it owns, and lists the functions it defines so the preamble
//! can prototype them.

pub mod collision;
pub mod cutscene;
pub mod pathfind;
pub mod physics;
pub mod pool;
pub mod preamble;
pub mod save;
pub mod scene;
pub mod state_machine;
pub mod transition;
pub mod validate;
pub mod variables;

use crate::context::LowerContext;
use crate::error::LowerResult;
use crate::section::Section;

/// Emit the built-in content of `section`. External sections get nothing
/// here; the caller's registered emitter fills them.
pub fn emit_builtin(section: Section, ctx: &mut LowerContext<'_>) -> LowerResult<()> {
    match section {
        Section::CollisionHelpers => collision::emit(ctx),
        Section::SaveData => save::emit(ctx),
        Section::PoolData => pool::emit_data(ctx),
        Section::Variables => variables::emit(ctx),
        Section::StateMachineEnums => state_machine::emit_enums(ctx),
        Section::SceneEnum => scene::emit_enum(ctx),
        Section::PoolFunctions => pool::emit_functions(ctx),
        Section::CutsceneFunctions => cutscene::emit(ctx),
        Section::StateMachineUpdate => state_machine::emit_update(ctx),
        Section::CameraTransition => transition::emit(ctx),
        Section::Navigation => pathfind::emit(ctx),
        Section::PhysicsFunctions => physics::emit(ctx),
        Section::SceneFunctions => scene::emit_functions(ctx),
        Section::EntryPoint => scene::emit_entry(ctx),
        Section::PaletteData
        | Section::TileData
        | Section::MapData
        | Section::SoundData
        | Section::MixerData
        | Section::DialogData
        | Section::MenuData
        | Section::AnimationData
        | Section::MixerFunctions
        | Section::LinkFunctions
        | Section::AnimationUpdate
        | Section::TweenData => Ok(()),
    }
}

/// Prototypes of every built-in cross-section function, in section order.
pub fn prototypes(ctx: &LowerContext<'_>) -> Vec<String> {
    let mut out = Vec::new();
    for section in Section::ORDER {
        out.extend(match section {
            Section::CollisionHelpers => collision::prototypes(ctx),
            Section::SaveData => save::prototypes(ctx),
            Section::PoolFunctions => pool::prototypes(ctx),
            Section::CutsceneFunctions => cutscene::prototypes(ctx),
            Section::StateMachineUpdate => state_machine::prototypes(ctx),
            Section::CameraTransition => transition::prototypes(ctx),
            Section::Navigation => pathfind::prototypes(ctx),
            Section::PhysicsFunctions => physics::prototypes(ctx),
            Section::SceneFunctions => scene::prototypes(ctx),
            _ => Vec::new(),
        });
    }
    out
}
