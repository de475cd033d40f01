//! Scene graph assembly: units + partitions + frame plans → [`SceneGraph`].

use std::collections::HashSet;

use sakuga_ir::{
    Column, DocumentInfo, ExportUnit, ExposureRun, FramePartition, Level, LevelId, SceneGraph,
};

use crate::planner::{path_pattern, unit_level_id, FramePlan};

/// Everything the builder needs about one unit, produced by the earlier
/// stages and read here without modification.
#[derive(Debug)]
pub struct UnitArtifacts {
    pub unit: ExportUnit,
    pub partition: FramePartition,
    pub plan: FramePlan,
    /// Rows holding authored keyframe events. Exposure runs break here, so
    /// a declared clone starts its own run even though the level frame
    /// matches the hold before it. Empty for static units.
    pub event_rows: Vec<u32>,
}

/// Assemble the target scene graph.
///
/// One column per unit, in stacking order; group-flattened units are
/// indistinguishable from ordinary animated units here, flattening was
/// fully resolved upstream. Units that produced no frames at all (every
/// export failed, or cancellation hit before the first frame) contribute
/// neither level nor column; their failures are already in the report.
pub fn build_scene(info: &DocumentInfo, scene_name: &str, artifacts: &[UnitArtifacts]) -> SceneGraph {
    let mut scene = SceneGraph::new(
        scene_name,
        info.width,
        info.height,
        info.duration,
        info.frame_rate,
    );

    for artifact in artifacts {
        if artifact.plan.frames_written > 0 {
            scene.add_level(Level {
                id: unit_level_id(&artifact.unit),
                path_pattern: path_pattern(&artifact.unit),
                frame_count: artifact.plan.frames_written,
            });
        }
    }

    let mut stack_index = 0u32;
    for artifact in artifacts {
        let runs = exposure_runs(artifact);
        if runs.is_empty() {
            tracing::warn!(unit = %artifact.unit.id, "unit produced no exposures, dropping column");
            continue;
        }
        let level = if artifact.plan.frames_written > 0 {
            unit_level_id(&artifact.unit)
        } else {
            // Every frame deduplicated into other units' levels; bind the
            // column to the level its first run exposes.
            runs[0].level.clone()
        };
        scene.add_column(Column {
            name: artifact.unit.id.0.clone(),
            stack_index,
            level,
            runs,
        });
        stack_index += 1;
    }

    scene
}

/// Run-length-encode a unit's exposure table.
///
/// A run extends while consecutive rows expose the same level frame and no
/// authored event lands on the row. Rows whose canonical frame failed to
/// export, and rows after a stop frame, carry no cell and end the run.
fn exposure_runs(artifact: &UnitArtifacts) -> Vec<ExposureRun> {
    let event_rows: HashSet<u32> = artifact.event_rows.iter().copied().collect();
    let mut runs: Vec<ExposureRun> = Vec::new();

    for (row, canonical) in artifact.partition.by_row.iter().enumerate() {
        let row = row as u32;
        let binding: Option<&(LevelId, u32)> = canonical
            .and_then(|n| artifact.plan.bindings.get(n as usize - 1))
            .and_then(|b| b.as_ref());

        let Some((level, level_frame)) = binding else {
            continue;
        };

        let extends = runs.last().is_some_and(|run| {
            run.start_row + run.row_count == row
                && &run.level == level
                && run.level_frame == *level_frame
                && !event_rows.contains(&row)
        });

        if extends {
            runs.last_mut().unwrap().row_count += 1;
        } else {
            runs.push(ExposureRun {
                start_row: row,
                row_count: 1,
                level: level.clone(),
                level_frame: *level_frame,
            });
        }
    }

    runs
}
