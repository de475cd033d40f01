//! The export pipeline: orchestrates all stages over one source document.

use std::path::{Path, PathBuf};

use rayon::prelude::*;

use sakuga_core::{sanitize_name, ExportConfig, SakugaError, SakugaResult};
use sakuga_ir::{
    validate_scene, CanonicalFrame, ContentRef, ExportUnit, FramePartition, SceneGraph,
    SourceDocument,
};

use crate::builder::{build_scene, UnitArtifacts};
use crate::cancel::CancelFlag;
use crate::dedup::partition_sequence;
use crate::normalize::normalize_layers;
use crate::planner::{
    claim_unit, plan_unit, plan_unit_dry, render_unit, RenderedFrames, SharedDedupTable,
};
use crate::render::FrameRenderer;
use crate::timeline::resolve_timeline;

/// Summary of one export run: what succeeded, what failed, and where the
/// scene file landed. Never a silent partial export — callers render this
/// to the user.
#[derive(Debug)]
pub struct ExportReport {
    pub scene_name: String,
    /// The written scene script, `None` if the run was cancelled or nothing
    /// could be serialized.
    pub scene_path: Option<PathBuf>,
    /// Units that made it into the scene.
    pub units_exported: usize,
    /// Distinct canonical frames across all units.
    pub canonical_frames: usize,
    /// Image files actually written (after deduplication).
    pub files_written: u32,
    /// Unit-scoped failures: (unit name, error). Sibling units continued.
    pub unit_errors: Vec<(String, SakugaError)>,
    /// Frame-scoped export failures. Sibling frames continued.
    pub frame_failures: Vec<SakugaError>,
    pub cancelled: bool,
}

impl ExportReport {
    /// Whether anything at all went wrong.
    pub fn is_partial(&self) -> bool {
        self.cancelled || !self.unit_errors.is_empty() || !self.frame_failures.is_empty()
    }
}

impl std::fmt::Display for ExportReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.cancelled {
            write!(
                f,
                "export cancelled: {} of {} frames completed",
                self.files_written, self.canonical_frames
            )
        } else if self.is_partial() {
            write!(
                f,
                "export partially failed: {} units, {} frames written, {} unit errors, {} frame failures",
                self.units_exported,
                self.files_written,
                self.unit_errors.len(),
                self.frame_failures.len()
            )
        } else {
            write!(
                f,
                "export complete: {} units, {} frames",
                self.units_exported, self.files_written
            )
        }
    }
}

/// What the parallel stage needs per unit, snapshotted from the source
/// collaborator up front so workers never call back into it.
enum UnitInput {
    Events(Vec<sakuga_ir::KeyframeEvent>),
    Static(ContentRef),
}

struct UnitOutcome {
    unit_name: String,
    result: Result<UnitArtifacts, SakugaError>,
}

/// Drives a full export run.
pub struct ExportPipeline<'a> {
    source: &'a dyn SourceDocument,
    renderer: &'a dyn FrameRenderer,
    config: &'a ExportConfig,
    cancel: CancelFlag,
}

impl<'a> ExportPipeline<'a> {
    pub fn new(
        source: &'a dyn SourceDocument,
        renderer: &'a dyn FrameRenderer,
        config: &'a ExportConfig,
    ) -> Self {
        Self {
            source,
            renderer,
            config,
            cancel: CancelFlag::new(),
        }
    }

    /// A handle for requesting cooperative cancellation from outside the
    /// run (another thread, a signal handler).
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Execute the export: normalize, resolve, deduplicate, render, build,
    /// serialize. Returns the run report; only a total absence of
    /// exportable content, a filesystem failure at setup, or a scene
    /// serialization failure surface as `Err`.
    pub fn run(&self) -> SakugaResult<ExportReport> {
        let info = self.source.info();
        let scene_name = match &self.config.scene_name {
            Some(name) => sanitize_name(name),
            None => sanitize_name(&info.name),
        };
        tracing::info!(scene = %scene_name, duration = info.duration, "starting export");

        let tree = self.source.layer_tree()?;
        let units = normalize_layers(&tree, &self.config.policy, info.duration)?;

        let mut unit_errors: Vec<(String, SakugaError)> = Vec::new();

        // Snapshot timing data serially; rendering is the only stage that
        // earns parallel workers.
        let mut inputs: Vec<(ExportUnit, UnitInput)> = Vec::new();
        for unit in units {
            let fetched = if unit.is_animated() {
                self.source
                    .keyframes(unit.source.layer_id())
                    .map(UnitInput::Events)
            } else {
                self.source
                    .static_content(unit.source.layer_id())
                    .map(UnitInput::Static)
            };
            match fetched {
                Ok(input) => inputs.push((unit, input)),
                Err(e) => unit_errors.push((unit.id.0.clone(), e)),
            }
        }

        let scene_dir = self.config.output_dir.join(&scene_name);
        std::fs::create_dir_all(&scene_dir)?;

        // Workers never touch the source collaborator; only the renderer,
        // which is thread-safe by contract.
        let renderer = self.renderer;
        let pad_width = self.config.pad_width;
        let cancel = &self.cancel;
        let outcomes: Vec<UnitOutcome> = if self.config.policy.cross_layer_dedup {
            // Two phases: render in parallel, then claim dedup ownership
            // sequentially in stacking order. Arrival order of the workers
            // never decides which unit owns a shared file, so identical
            // inputs produce identical scenes.
            let shared = SharedDedupTable::new();
            let rendered: Vec<RenderedOutcome> = inputs
                .into_par_iter()
                .map(|(unit, input)| render_stage(unit, input, renderer, cancel))
                .collect();
            rendered
                .into_iter()
                .map(|outcome| {
                    claim_stage(outcome, renderer, &scene_dir, pad_width, &shared, cancel)
                })
                .collect()
        } else {
            inputs
                .into_par_iter()
                .map(|(unit, input)| {
                    process_unit(unit, input, renderer, &scene_dir, pad_width, cancel)
                })
                .collect()
        };

        // Join barrier: every planned frame has completed or permanently
        // failed before anything below runs.
        let mut artifacts: Vec<UnitArtifacts> = Vec::new();
        let mut frame_failures: Vec<SakugaError> = Vec::new();
        let mut cancelled = self.cancel.is_cancelled();
        for outcome in outcomes {
            match outcome.result {
                Ok(mut artifact) => {
                    cancelled |= artifact.plan.cancelled;
                    frame_failures.append(&mut artifact.plan.failures);
                    artifacts.push(artifact);
                }
                Err(e) => unit_errors.push((outcome.unit_name, e)),
            }
        }

        let canonical_frames: usize = artifacts.iter().map(|a| a.partition.len()).sum();
        let files_written: u32 = artifacts.iter().map(|a| a.plan.frames_written).sum();

        if cancelled {
            tracing::warn!(
                written = files_written,
                planned = canonical_frames,
                "export cancelled, scene not serialized"
            );
            return Ok(ExportReport {
                scene_name,
                scene_path: None,
                units_exported: 0,
                canonical_frames,
                files_written,
                unit_errors,
                frame_failures,
                cancelled: true,
            });
        }

        let scene = build_scene(&info, &scene_name, &artifacts);
        let scene_path = if scene.columns.is_empty() {
            tracing::warn!("no unit survived export, skipping scene serialization");
            None
        } else {
            validate_scene(&scene).map_err(|errors| {
                let joined = errors
                    .iter()
                    .map(|e| e.to_string())
                    .collect::<Vec<_>>()
                    .join("; ");
                SakugaError::SerializationFailed(joined)
            })?;
            Some(sakuga_tnz::write_scene_script(&scene, &scene_dir)?)
        };

        let report = ExportReport {
            scene_name,
            scene_path,
            units_exported: scene.columns.len(),
            canonical_frames,
            files_written,
            unit_errors,
            frame_failures,
            cancelled: false,
        };
        tracing::info!(%report, "export finished");
        Ok(report)
    }

}

/// Resolve a unit's snapshotted input into a frame partition plus the rows
/// that break exposure runs.
fn resolve_input(
    unit: &ExportUnit,
    input: &UnitInput,
) -> SakugaResult<(FramePartition, Vec<u32>)> {
    match input {
        UnitInput::Events(events) => {
            let resolved = resolve_timeline(unit, events)?;
            Ok((partition_sequence(&resolved.sequence), resolved.event_rows))
        }
        UnitInput::Static(content) => Ok((static_partition(content, unit.duration), Vec::new())),
    }
}

fn process_unit(
    unit: ExportUnit,
    input: UnitInput,
    renderer: &dyn FrameRenderer,
    scene_dir: &Path,
    pad_width: usize,
    cancel: &CancelFlag,
) -> UnitOutcome {
    let unit_name = unit.id.0.clone();
    let result = (|| {
        let (partition, event_rows) = resolve_input(&unit, &input)?;
        let plan = plan_unit(&unit, &partition, renderer, scene_dir, pad_width, cancel)?;
        Ok(UnitArtifacts {
            unit,
            partition,
            plan,
            event_rows,
        })
    })();
    UnitOutcome { unit_name, result }
}

/// A unit after the parallel render phase of a cross-layer-dedup run,
/// waiting for the sequential claim pass.
struct RenderedUnit {
    unit: ExportUnit,
    partition: FramePartition,
    event_rows: Vec<u32>,
    frames: RenderedFrames,
}

struct RenderedOutcome {
    unit_name: String,
    result: Result<RenderedUnit, SakugaError>,
}

fn render_stage(
    unit: ExportUnit,
    input: UnitInput,
    renderer: &dyn FrameRenderer,
    cancel: &CancelFlag,
) -> RenderedOutcome {
    let unit_name = unit.id.0.clone();
    let result = (|| {
        let (partition, event_rows) = resolve_input(&unit, &input)?;
        let frames = render_unit(&unit, &partition, renderer, cancel);
        Ok(RenderedUnit {
            unit,
            partition,
            event_rows,
            frames,
        })
    })();
    RenderedOutcome { unit_name, result }
}

fn claim_stage(
    outcome: RenderedOutcome,
    renderer: &dyn FrameRenderer,
    scene_dir: &Path,
    pad_width: usize,
    shared: &SharedDedupTable,
    cancel: &CancelFlag,
) -> UnitOutcome {
    let RenderedOutcome { unit_name, result } = outcome;
    let result = result.and_then(|rendered| {
        let plan = claim_unit(
            &rendered.unit,
            rendered.frames,
            renderer,
            scene_dir,
            pad_width,
            shared,
            cancel,
        )?;
        Ok(UnitArtifacts {
            unit: rendered.unit,
            partition: rendered.partition,
            plan,
            event_rows: rendered.event_rows,
        })
    });
    UnitOutcome { unit_name, result }
}

/// What a dry run produced: the scene graph plus the unit-scoped errors
/// that kept layers out of it.
#[derive(Debug)]
pub struct ScenePreview {
    pub scene: SceneGraph,
    /// Unit-scoped failures: (unit name, error). Sibling units continued,
    /// same policy as a real run.
    pub unit_errors: Vec<(String, SakugaError)>,
}

/// Build the scene graph a run *would* produce, without rendering or
/// touching the filesystem. Assumes every frame exports cleanly and no
/// cross-layer dedup applies; used for script previews and dry checks.
/// A broken unit is reported and skipped rather than aborting the preview,
/// so one pass surfaces every bad layer.
pub fn preview_scene(
    source: &dyn SourceDocument,
    config: &ExportConfig,
) -> SakugaResult<ScenePreview> {
    let info = source.info();
    let scene_name = match &config.scene_name {
        Some(name) => sanitize_name(name),
        None => sanitize_name(&info.name),
    };

    let tree = source.layer_tree()?;
    let units = normalize_layers(&tree, &config.policy, info.duration)?;

    let mut artifacts = Vec::new();
    let mut unit_errors: Vec<(String, SakugaError)> = Vec::new();
    for unit in units {
        let resolved: SakugaResult<(FramePartition, Vec<u32>)> = if unit.is_animated() {
            source
                .keyframes(unit.source.layer_id())
                .and_then(|events| resolve_timeline(&unit, &events))
                .map(|r| (partition_sequence(&r.sequence), r.event_rows))
        } else {
            source
                .static_content(unit.source.layer_id())
                .map(|content| (static_partition(&content, unit.duration), Vec::new()))
        };
        let (partition, event_rows) = match resolved {
            Ok(resolved) => resolved,
            Err(e) => {
                unit_errors.push((unit.id.0.clone(), e));
                continue;
            }
        };
        let plan = plan_unit_dry(&unit, &partition);
        artifacts.push(UnitArtifacts {
            unit,
            partition,
            plan,
            event_rows,
        });
    }

    Ok(ScenePreview {
        scene: build_scene(&info, &scene_name, &artifacts),
        unit_errors,
    })
}

/// A static unit's partition: one canonical frame exposed on every row.
fn static_partition(content: &ContentRef, duration: u32) -> FramePartition {
    FramePartition {
        frames: vec![CanonicalFrame {
            number: 1,
            content: content.clone(),
            exposed_at: (0..duration).collect(),
        }],
        by_row: vec![Some(1); duration as usize],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_partition_shape() {
        let partition = static_partition(&ContentRef::new("bg"), 48);
        assert_eq!(partition.len(), 1);
        assert_eq!(partition.by_row.len(), 48);
        assert_eq!(partition.frames[0].exposed_at.len(), 48);
        assert!(partition.by_row.iter().all(|n| *n == Some(1)));
    }
}
