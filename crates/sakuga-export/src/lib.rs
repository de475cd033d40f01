//! # sakuga-export
//!
//! The export pipeline — turns a layered, keyframed source document into
//! numbered image sequences on disk plus an OpenToonz scene graph.
//!
//! Stages run strictly forward: normalize the layer tree into export units,
//! resolve each unit's sparse keyframes into a dense exposure sequence,
//! deduplicate cloned content into canonical frames, plan and drive the
//! render/encode collaborator once per canonical frame, assemble the scene
//! graph, and hand it to the serializer. Per-unit work runs on a bounded
//! rayon pool; cancellation is cooperative between frame exports.

pub mod builder;
pub mod cancel;
pub mod dedup;
pub mod normalize;
pub mod pipeline;
pub mod planner;
pub mod render;
pub mod timeline;

pub use builder::{build_scene, UnitArtifacts};
pub use cancel::CancelFlag;
pub use dedup::partition_sequence;
pub use normalize::normalize_layers;
pub use pipeline::{preview_scene, ExportPipeline, ExportReport, ScenePreview};
pub use planner::{
    claim_unit, plan_unit, plan_unit_dry, render_unit, FramePlan, RenderedFrames,
    SharedDedupTable,
};
pub use render::FrameRenderer;
pub use timeline::{resolve_timeline, ResolvedTimeline};
