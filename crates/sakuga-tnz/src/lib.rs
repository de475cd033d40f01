//! # sakuga-tnz
//!
//! Scene serialization — renders a [`sakuga_ir::SceneGraph`] to the
//! ToonzScript text that OpenToonz executes to build and save the `.tnz`
//! scene. Serialization is a pure function of the graph: identical input
//! yields byte-identical output, with no timestamps and no nondeterministic
//! ordering.

pub mod script;

pub use script::{scene_script, write_scene_script, SCRIPT_SUCCESS_SENTINEL};
