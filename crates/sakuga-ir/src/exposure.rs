use serde::{Deserialize, Serialize};

use crate::keyframe::{ContentRef, KeyframeEvent};

/// A dense, frame-indexed exposure sequence for one unit.
///
/// One cell per frame of the document, no gaps. A cell of `None` means the
/// row carries no exposure (a stop frame ended the hold).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExposureSequence {
    cells: Vec<Option<ContentRef>>,
}

impl ExposureSequence {
    /// Build from already-expanded cells. The length is the document
    /// duration.
    pub fn from_cells(cells: Vec<Option<ContentRef>>) -> Self {
        Self { cells }
    }

    /// Number of frames covered (always the document duration).
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// The content exposed at a frame, if any.
    pub fn cell(&self, frame: u32) -> Option<&ContentRef> {
        self.cells.get(frame as usize).and_then(|c| c.as_ref())
    }

    pub fn cells(&self) -> &[Option<ContentRef>] {
        &self.cells
    }

    /// Distinct content references in first-exposure order.
    pub fn distinct_contents(&self) -> Vec<&ContentRef> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for cell in self.cells.iter().flatten() {
            if seen.insert(cell) {
                out.push(cell);
            }
        }
        out
    }

    /// Re-collapse the dense sequence into the sparse keyframe set that
    /// produced it: one event per change of exposed content. Inverse of
    /// hold-frame expansion, up to clone flags.
    pub fn collapse(&self) -> Vec<KeyframeEvent> {
        let mut events = Vec::new();
        let mut previous: Option<&Option<ContentRef>> = None;
        for (frame, cell) in self.cells.iter().enumerate() {
            if previous != Some(cell) {
                let event = match cell {
                    Some(content) => KeyframeEvent::drawing(frame as u32, content.clone()),
                    None => KeyframeEvent::stop(frame as u32),
                };
                // A leading run of empty cells has no authored event behind
                // it, so a stop at frame 0 is only emitted if explicit.
                events.push(event);
                previous = Some(cell);
            }
        }
        events
    }
}
