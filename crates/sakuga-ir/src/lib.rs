//! # sakuga-ir
//!
//! The Sakuga intermediate representation — both ends of the translation.
//!
//! The *source* side models the layered, keyframed animation document as an
//! arena of layer nodes plus sparse per-layer keyframe events. The *target*
//! side models the OpenToonz scene: export units, dense exposure sequences,
//! deduplicated canonical frames, and the level/column scene graph that the
//! serializer renders to ToonzScript.

pub mod canonical;
pub mod exposure;
pub mod keyframe;
pub mod scene;
pub mod source;
pub mod unit;
pub mod validate;

pub use canonical::{CanonicalFrame, FramePartition};
pub use exposure::ExposureSequence;
pub use keyframe::{ContentRef, KeyframeEvent};
pub use scene::{Column, ExposureRun, Level, LevelId, SceneGraph};
pub use source::{DocumentInfo, LayerId, LayerKind, LayerNode, LayerTree, NodeId, SourceDocument};
pub use unit::{ExportUnit, SourceKind, UnitId, UnitSource};
pub use validate::validate_scene;
