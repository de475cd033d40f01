use crate::scene::SceneGraph;
use sakuga_core::SakugaError;

/// Validate a SceneGraph for referential integrity before serialization.
///
/// Every defect a half-written scene file could carry is caught here:
/// broken column→level links, exposure cells pointing at frames that were
/// never planned, rows outside the clip, and stacking order drift.
pub fn validate_scene(scene: &SceneGraph) -> Result<(), Vec<SakugaError>> {
    let mut errors = Vec::new();

    if scene.duration == 0 {
        errors.push(SakugaError::SceneValidation(
            "scene duration must be non-zero".into(),
        ));
    }

    // Duplicate level ids
    let mut level_ids = std::collections::HashSet::new();
    for level in &scene.levels {
        if !level_ids.insert(&level.id) {
            errors.push(SakugaError::SceneValidation(format!(
                "duplicate level id: {}",
                level.id
            )));
        }
        if level.frame_count == 0 {
            errors.push(SakugaError::SceneValidation(format!(
                "level '{}' has no frames",
                level.id
            )));
        }
    }

    for (index, column) in scene.columns.iter().enumerate() {
        if column.stack_index as usize != index {
            errors.push(SakugaError::SceneValidation(format!(
                "column '{}' has stack index {} but sits at position {}",
                column.name, column.stack_index, index
            )));
        }

        if scene.level(&column.level).is_none() {
            errors.push(SakugaError::SceneValidation(format!(
                "column '{}' is bound to unknown level '{}'",
                column.name, column.level
            )));
        }

        let mut next_free_row = 0u32;
        for run in &column.runs {
            if run.row_count == 0 {
                errors.push(SakugaError::SceneValidation(format!(
                    "column '{}' has an empty exposure run at row {}",
                    column.name, run.start_row
                )));
            }
            if run.start_row < next_free_row {
                errors.push(SakugaError::SceneValidation(format!(
                    "column '{}' has overlapping or unordered runs at row {}",
                    column.name, run.start_row
                )));
            }
            next_free_row = run.start_row + run.row_count;
            if next_free_row > scene.duration {
                errors.push(SakugaError::SceneValidation(format!(
                    "column '{}' exposes rows past the clip end ({} > {})",
                    column.name, next_free_row, scene.duration
                )));
            }

            match scene.level(&run.level) {
                None => errors.push(SakugaError::SceneValidation(format!(
                    "column '{}' exposes unknown level '{}'",
                    column.name, run.level
                ))),
                Some(level) => {
                    if run.level_frame == 0 || run.level_frame > level.frame_count {
                        errors.push(SakugaError::SceneValidation(format!(
                            "column '{}' exposes frame {} of level '{}' which has {} frames",
                            column.name, run.level_frame, level.id, level.frame_count
                        )));
                    }
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Column, ExposureRun, Level, LevelId};

    fn scene_with_one_column() -> SceneGraph {
        let mut scene = SceneGraph::new("Cut01", 1920, 1080, 48, 24.0);
        scene.add_level(Level {
            id: LevelId::new("Ink"),
            path_pattern: "Ink/Ink..png".into(),
            frame_count: 2,
        });
        scene.add_column(Column {
            name: "Ink".into(),
            stack_index: 0,
            level: LevelId::new("Ink"),
            runs: vec![ExposureRun {
                start_row: 0,
                row_count: 48,
                level: LevelId::new("Ink"),
                level_frame: 1,
            }],
        });
        scene
    }

    #[test]
    fn test_valid_scene_passes() {
        assert!(validate_scene(&scene_with_one_column()).is_ok());
    }

    #[test]
    fn test_unknown_level_rejected() {
        let mut scene = scene_with_one_column();
        scene.columns[0].level = LevelId::new("Missing");
        assert!(validate_scene(&scene).is_err());
    }

    #[test]
    fn test_exposure_past_level_end_rejected() {
        let mut scene = scene_with_one_column();
        scene.columns[0].runs[0].level_frame = 3; // level has 2 frames
        assert!(validate_scene(&scene).is_err());
    }

    #[test]
    fn test_exposure_past_clip_end_rejected() {
        let mut scene = scene_with_one_column();
        scene.columns[0].runs[0].row_count = 49;
        assert!(validate_scene(&scene).is_err());
    }

    #[test]
    fn test_stack_index_drift_rejected() {
        let mut scene = scene_with_one_column();
        scene.columns[0].stack_index = 5;
        assert!(validate_scene(&scene).is_err());
    }

    #[test]
    fn test_overlapping_runs_rejected() {
        let mut scene = scene_with_one_column();
        scene.columns[0].runs = vec![
            ExposureRun {
                start_row: 0,
                row_count: 10,
                level: LevelId::new("Ink"),
                level_frame: 1,
            },
            ExposureRun {
                start_row: 5,
                row_count: 10,
                level: LevelId::new("Ink"),
                level_frame: 2,
            },
        ];
        assert!(validate_scene(&scene).is_err());
    }
}
