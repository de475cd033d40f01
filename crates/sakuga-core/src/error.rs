/// Core error types for the Sakuga exporter.
use std::path::PathBuf;

/// A specialized Result type for Sakuga operations.
pub type SakugaResult<T> = Result<T, SakugaError>;

/// Top-level error type encompassing all Sakuga subsystems.
#[derive(Debug, thiserror::Error)]
pub enum SakugaError {
    /// The inclusion policy filtered out every layer. Reported before any
    /// file is written.
    #[error("no exportable content: the inclusion policy matched no layers")]
    NoExportableContent,

    /// A unit's keyframe list violates timeline structure (for example two
    /// events on the same frame). Scoped to one unit.
    #[error("malformed timeline in '{unit}': {message}")]
    MalformedTimeline { unit: String, message: String },

    /// A unit's first keyframe does not sit at frame 0, so frames before it
    /// would have undefined content. Scoped to one unit.
    #[error("unit '{unit}' has no keyframe at frame 0 (first event at frame {first})")]
    MissingInitialKeyframe { unit: String, first: u32 },

    /// A clone-flagged event names a content reference the unit has never
    /// seen. Scoped to one unit.
    #[error("dangling clone reference in '{unit}' at frame {frame}")]
    DanglingCloneReference { unit: String, frame: u32 },

    /// A single canonical frame failed to render or encode. Collected, not
    /// fatal; the run continues with the remaining frames.
    #[error("frame export failed for '{unit}' canonical frame {canonical}: {message}")]
    FrameExportFailed {
        unit: String,
        canonical: u32,
        message: String,
    },

    /// The scene graph could not be serialized. Fatal: no scene file is
    /// written at all rather than a half-written one.
    #[error("scene serialization failed: {0}")]
    SerializationFailed(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("encode error: {message} ({path:?})")]
    Encode { message: String, path: PathBuf },

    #[error("scene graph validation error: {0}")]
    SceneValidation(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("export cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl SakugaError {
    /// Create a malformed-timeline error for a unit.
    pub fn malformed_timeline(unit: impl Into<String>, message: impl Into<String>) -> Self {
        SakugaError::MalformedTimeline {
            unit: unit.into(),
            message: message.into(),
        }
    }

    /// Create a frame-export error.
    pub fn frame_export(
        unit: impl Into<String>,
        canonical: u32,
        message: impl Into<String>,
    ) -> Self {
        SakugaError::FrameExportFailed {
            unit: unit.into(),
            canonical,
            message: message.into(),
        }
    }

    /// Create an encode error.
    pub fn encode(message: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        SakugaError::Encode {
            message: message.into(),
            path: path.into(),
        }
    }

    /// Whether this error aborts only the unit it names, leaving sibling
    /// units to continue.
    pub fn is_unit_scoped(&self) -> bool {
        matches!(
            self,
            SakugaError::MalformedTimeline { .. }
                | SakugaError::MissingInitialKeyframe { .. }
                | SakugaError::DanglingCloneReference { .. }
        )
    }
}
