//! Output sections and their fixed order.
//!
//! Data must be declared before the code that reads it, so the order is
//! load-bearing. Functions are prototyped in the preamble and may appear in
//! any section.

use std::fmt;

use gbdsl_ir::Game;
use serde::{Deserialize, Serialize};

use crate::error::LowerResult;
use crate::writer::CodeWriter;

/// One section of the generated file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    PaletteData,
    TileData,
    MapData,
    CollisionHelpers,
    SoundData,
    MixerData,
    SaveData,
    DialogData,
    MenuData,
    PoolData,
    Variables,
    StateMachineEnums,
    AnimationData,
    SceneEnum,
    PoolFunctions,
    MixerFunctions,
    LinkFunctions,
    CutsceneFunctions,
    AnimationUpdate,
    StateMachineUpdate,
    TweenData,
    CameraTransition,
    Navigation,
    PhysicsFunctions,
    SceneFunctions,
    EntryPoint,
}

impl Section {
    /// Every section, in emission order.
    pub const ORDER: [Section; 26] = [
        Section::PaletteData,
        Section::TileData,
        Section::MapData,
        Section::CollisionHelpers,
        Section::SoundData,
        Section::MixerData,
        Section::SaveData,
        Section::DialogData,
        Section::MenuData,
        Section::PoolData,
        Section::Variables,
        Section::StateMachineEnums,
        Section::AnimationData,
        Section::SceneEnum,
        Section::PoolFunctions,
        Section::MixerFunctions,
        Section::LinkFunctions,
        Section::CutsceneFunctions,
        Section::AnimationUpdate,
        Section::StateMachineUpdate,
        Section::TweenData,
        Section::CameraTransition,
        Section::Navigation,
        Section::PhysicsFunctions,
        Section::SceneFunctions,
        Section::EntryPoint,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Section::PaletteData => "palette data",
            Section::TileData => "tile data",
            Section::MapData => "map data",
            Section::CollisionHelpers => "collision helpers",
            Section::SoundData => "sound data",
            Section::MixerData => "mixer data",
            Section::SaveData => "save data",
            Section::DialogData => "dialog data",
            Section::MenuData => "menu data",
            Section::PoolData => "pool data",
            Section::Variables => "variables",
            Section::StateMachineEnums => "state machine enums",
            Section::AnimationData => "animation data",
            Section::SceneEnum => "scene enum",
            Section::PoolFunctions => "pool functions",
            Section::MixerFunctions => "mixer functions",
            Section::LinkFunctions => "link functions",
            Section::CutsceneFunctions => "cutscene functions",
            Section::AnimationUpdate => "animation update",
            Section::StateMachineUpdate => "state machine update",
            Section::TweenData => "tween data",
            Section::CameraTransition => "camera transition",
            Section::Navigation => "navigation",
            Section::PhysicsFunctions => "physics functions",
            Section::SceneFunctions => "scene functions",
            Section::EntryPoint => "entry point",
        }
    }

    /// Sections produced by caller-registered emitters. Nothing is written
    /// for them unless an emitter is registered.
    pub fn is_external(self) -> bool {
        matches!(
            self,
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
                | Section::TweenData
        )
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A subsystem compiler supplied by the caller, e.g. for dialog or audio.
pub trait SectionEmitter {
    /// Write this section's declarations and code.
    fn emit(&self, game: &Game, out: &mut CodeWriter) -> LowerResult<()>;

    /// Prototypes of functions this section defines, added to the preamble.
    fn prototypes(&self, _game: &Game) -> Vec<String> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_is_sorted_and_complete() {
        let mut sorted = Section::ORDER;
        sorted.sort();
        assert_eq!(sorted, Section::ORDER);
        let pos = |s| Section::ORDER.iter().position(|x| *x == s).unwrap();
        assert!(pos(Section::CameraTransition) < pos(Section::Navigation));
        assert!(pos(Section::Navigation) < pos(Section::PhysicsFunctions));
        assert!(pos(Section::PoolData) < pos(Section::Variables));
        assert_eq!(Section::ORDER.last(), Some(&Section::EntryPoint));
    }

    #[test]
    fn test_external_sections() {
        assert!(Section::DialogData.is_external());
        assert!(!Section::SaveData.is_external());
        assert!(!Section::Navigation.is_external());
    }
}
