use serde::{Deserialize, Serialize};

use crate::source::LayerId;

/// Unique identifier for an export unit. Derived from the sanitized,
/// uniquified layer name, so it doubles as the on-disk level name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitId(pub String);

impl UnitId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for UnitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where an export unit's content comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    /// A single animated paint layer.
    AnimatedLayer,
    /// A group with animated descendants, composited into one channel.
    FlattenedGroup,
    /// A paint layer with no keyframes; a single image held for the whole
    /// clip.
    StaticLayer,
}

/// The source binding the rendering collaborator needs to produce this
/// unit's pixels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitSource {
    /// Render one paint layer's content.
    Layer(LayerId),
    /// Render a group's composited projection.
    Group(LayerId),
}

impl UnitSource {
    pub fn layer_id(&self) -> &LayerId {
        match self {
            UnitSource::Layer(id) | UnitSource::Group(id) => id,
        }
    }
}

/// One exportable animation channel, produced by the normalizer.
///
/// Units are immutable once emitted; the resolver and deduplicator attach
/// their results alongside rather than mutating the unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportUnit {
    pub id: UnitId,
    /// Original display name, before sanitization.
    pub display_name: String,
    /// Paint order. 0 is the backmost column; indices are unique and
    /// total-ordered across one export.
    pub stack_index: u32,
    pub kind: SourceKind,
    pub source: UnitSource,
    pub visible: bool,
    pub reference_labeled: bool,
    /// Total document duration in frames.
    pub duration: u32,
}

impl ExportUnit {
    /// Whether this unit carries an exposure sequence. Static layers have a
    /// single canonical frame and no timeline.
    pub fn is_animated(&self) -> bool {
        self.kind != SourceKind::StaticLayer
    }
}
