use std::path::Path;

use sakuga_core::{FrameBuffer, SakugaResult};
use sakuga_ir::{ContentRef, UnitSource};

/// The rendering + encoding collaborator.
///
/// The planner calls `render_frame` exactly once per canonical frame —
/// never once per exposure — and `encode_image` once per file actually
/// written. Implementations must be thread-safe: units render on parallel
/// workers.
pub trait FrameRenderer: Send + Sync {
    /// Render one piece of content for a unit (a single layer's frame, or
    /// a group's composited projection) to a pixel buffer.
    fn render_frame(&self, source: &UnitSource, content: &ContentRef)
        -> SakugaResult<FrameBuffer>;

    /// Encode a rendered buffer to an image file at `path`. The parent
    /// directory exists by the time this is called.
    fn encode_image(&self, frame: &FrameBuffer, path: &Path) -> SakugaResult<()>;
}
