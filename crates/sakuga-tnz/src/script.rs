use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use sakuga_core::{SakugaError, SakugaResult};
use sakuga_ir::{LevelId, SceneGraph};

/// Printed by the generated script on success. OpenToonz may exit non-zero
/// even when the script ran, so callers grep for this instead of trusting
/// the exit code.
pub const SCRIPT_SUCCESS_SENTINEL: &str = "Scene created successfully!";

/// Render a scene graph to ToonzScript.
///
/// Layout, in order: an `expose` helper, scene creation and metadata, one
/// `loadLevel` per level, the run-length-encoded cell assignments per
/// column back to front, then save and the success sentinel. Level
/// variables are numbered by position so identical graphs always produce
/// identical text.
pub fn scene_script(scene: &SceneGraph) -> SakugaResult<String> {
    let mut level_vars: HashMap<&LevelId, String> = HashMap::new();
    for (index, level) in scene.levels.iter().enumerate() {
        level_vars.insert(&level.id, format!("level_{}", index));
    }

    let mut out = String::new();

    out.push_str("function expose(column, row, count, level, frame) {\n");
    out.push_str("  for (var i = 0; i < count; i++) {\n");
    out.push_str("    scene.setCell(column, row + i, level, frame);\n");
    out.push_str("  }\n");
    out.push_str("}\n\n");

    out.push_str("var scene = new Scene();\n");
    writeln!(out, "scene.setName({});", quote(&scene.name)).ok();
    writeln!(out, "scene.setSize({}, {});", scene.width, scene.height).ok();
    writeln!(out, "scene.setFrameRate({});", scene.frame_rate).ok();
    writeln!(out, "scene.setSceneLength({});", scene.duration).ok();
    out.push('\n');

    for level in &scene.levels {
        let var = &level_vars[&level.id];
        writeln!(
            out,
            "var {} = scene.loadLevel({}, {});",
            var,
            quote(&level.id.0),
            quote(&level.path_pattern)
        )
        .ok();
    }
    if !scene.levels.is_empty() {
        out.push('\n');
    }

    for column in &scene.columns {
        for run in &column.runs {
            let var = level_vars.get(&run.level).ok_or_else(|| {
                SakugaError::SerializationFailed(format!(
                    "column '{}' exposes level '{}' which is not in the scene",
                    column.name, run.level
                ))
            })?;
            writeln!(
                out,
                "expose({}, {}, {}, {}, {});",
                column.stack_index, run.start_row, run.row_count, var, run.level_frame
            )
            .ok();
        }
    }
    if !scene.columns.is_empty() {
        out.push('\n');
    }

    writeln!(out, "scene.save({});", quote(&format!("{}.tnz", scene.name))).ok();
    writeln!(out, "print({});", quote(SCRIPT_SUCCESS_SENTINEL)).ok();

    Ok(out)
}

/// Serialize the scene and write `<name>.toonzscript` into `scene_dir`.
///
/// The text is produced in full before the file is created, so a
/// serialization failure writes nothing — no half-written scene file ever
/// references incomplete columns.
pub fn write_scene_script(scene: &SceneGraph, scene_dir: &Path) -> SakugaResult<PathBuf> {
    let text = scene_script(scene)?;
    let path = scene_dir.join(format!("{}.toonzscript", scene.name));
    std::fs::write(&path, &text)?;
    tracing::info!(
        path = %path.display(),
        levels = scene.levels.len(),
        columns = scene.columns.len(),
        "wrote scene script"
    );
    Ok(path)
}

/// Quote a string for ToonzScript source.
fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sakuga_ir::{Column, ExposureRun, Level};

    fn sample_scene() -> SceneGraph {
        let mut scene = SceneGraph::new("Cut01", 1920, 1080, 48, 24.0);
        scene.add_level(Level {
            id: LevelId::new("Ink"),
            path_pattern: "Ink/Ink..png".into(),
            frame_count: 1,
        });
        scene.add_column(Column {
            name: "Ink".into(),
            stack_index: 0,
            level: LevelId::new("Ink"),
            runs: vec![
                ExposureRun {
                    start_row: 0,
                    row_count: 24,
                    level: LevelId::new("Ink"),
                    level_frame: 1,
                },
                ExposureRun {
                    start_row: 24,
                    row_count: 24,
                    level: LevelId::new("Ink"),
                    level_frame: 1,
                },
            ],
        });
        scene
    }

    #[test]
    fn test_script_is_deterministic() {
        let scene = sample_scene();
        let first = scene_script(&scene).unwrap();
        let second = scene_script(&scene).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_script_structure() {
        let text = scene_script(&sample_scene()).unwrap();
        assert!(text.contains("scene.setFrameRate(24);"));
        assert!(text.contains("scene.setSceneLength(48);"));
        assert!(text.contains("var level_0 = scene.loadLevel(\"Ink\", \"Ink/Ink..png\");"));
        assert!(text.contains("expose(0, 0, 24, level_0, 1);"));
        assert!(text.contains("expose(0, 24, 24, level_0, 1);"));
        assert!(text.contains("scene.save(\"Cut01.tnz\");"));
        assert!(text.ends_with(&format!("print(\"{}\");\n", SCRIPT_SUCCESS_SENTINEL)));
    }

    #[test]
    fn test_columns_emitted_back_to_front() {
        let mut scene = sample_scene();
        scene.add_level(Level {
            id: LevelId::new("Paint"),
            path_pattern: "Paint/Paint..png".into(),
            frame_count: 1,
        });
        scene.add_column(Column {
            name: "Paint".into(),
            stack_index: 1,
            level: LevelId::new("Paint"),
            runs: vec![ExposureRun {
                start_row: 0,
                row_count: 48,
                level: LevelId::new("Paint"),
                level_frame: 1,
            }],
        });

        let text = scene_script(&scene).unwrap();
        let ink = text.find("expose(0, 0, 24, level_0").unwrap();
        let paint = text.find("expose(1, 0, 48, level_1").unwrap();
        assert!(ink < paint);
    }

    #[test]
    fn test_unknown_level_fails_serialization() {
        let mut scene = sample_scene();
        scene.columns[0].runs[0].level = LevelId::new("Missing");
        let result = scene_script(&scene);
        assert!(matches!(result, Err(SakugaError::SerializationFailed(_))));
    }

    #[test]
    fn test_names_are_escaped() {
        let mut scene = sample_scene();
        scene.name = "Cut \"A\"".into();
        let text = scene_script(&scene).unwrap();
        assert!(text.contains("scene.setName(\"Cut \\\"A\\\"\");"));
    }
}
