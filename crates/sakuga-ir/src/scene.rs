use serde::{Deserialize, Serialize};

/// Unique identifier for a level (an image-sequence reference).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LevelId(pub String);

impl LevelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for LevelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A level: one numbered image sequence on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    pub id: LevelId,
    /// Sequence path pattern relative to the scene directory, in the
    /// OpenToonz `..` placeholder form (for example `Ink/Ink..png`).
    pub path_pattern: String,
    /// Number of frames actually written for this level.
    pub frame_count: u32,
}

/// A run of consecutive rows exposing one level frame.
///
/// Rows between runs carry no cell. Runs never overlap and are ordered by
/// `start_row`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExposureRun {
    /// First xsheet row of the run (0-based).
    pub start_row: u32,
    /// Number of rows, always at least 1.
    pub row_count: u32,
    /// The level the cells come from. Usually the column's own level;
    /// cross-layer deduplication may point a run at another unit's level.
    pub level: LevelId,
    /// 1-based frame number within the level.
    pub level_frame: u32,
}

/// A column: one stage object in the xsheet, bound to a level and carrying
/// a run-length-encoded exposure table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name, shown in the xsheet header.
    pub name: String,
    /// Paint order. 0 is the backmost column. Matches the column's position
    /// in [`SceneGraph::columns`].
    pub stack_index: u32,
    /// The level this column is bound to.
    pub level: LevelId,
    /// Run-length-encoded exposure table.
    pub runs: Vec<ExposureRun>,
}

impl Column {
    /// Total number of exposed rows across all runs.
    pub fn exposed_rows(&self) -> u32 {
        self.runs.iter().map(|r| r.row_count).sum()
    }
}

/// The target-model representation of the whole export: document metadata
/// plus ordered levels and columns.
///
/// Built once from read-only unit data, after which the per-unit working
/// set can be dropped; the serializer consumes only this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneGraph {
    /// Scene name; also the run directory and `.tnz` file stem.
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// Clip duration in frames.
    pub duration: u32,
    /// Frame rate, serialized as a string to keep scene output byte-stable.
    pub frame_rate: String,
    /// Levels in the order their columns appear.
    pub levels: Vec<Level>,
    /// Columns back to front; `columns[i].stack_index == i`.
    pub columns: Vec<Column>,
}

impl SceneGraph {
    pub fn new(name: impl Into<String>, width: u32, height: u32, duration: u32, fps: f64) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            duration,
            frame_rate: format_frame_rate(fps),
            levels: Vec::new(),
            columns: Vec::new(),
        }
    }

    pub fn add_level(&mut self, level: Level) {
        self.levels.push(level);
    }

    pub fn add_column(&mut self, column: Column) {
        self.columns.push(column);
    }

    pub fn level(&self, id: &LevelId) -> Option<&Level> {
        self.levels.iter().find(|l| &l.id == id)
    }
}

/// Render a frame rate without trailing float noise: `24` not `24.0`,
/// `23.976` kept as-is.
pub fn format_frame_rate(fps: f64) -> String {
    if (fps - fps.round()).abs() < 1e-9 {
        format!("{}", fps.round() as u64)
    } else {
        format!("{}", fps)
    }
}
