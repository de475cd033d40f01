use serde::{Deserialize, Serialize};

use crate::keyframe::ContentRef;

/// A deduplicated identity for one piece of rendered content within a unit.
///
/// Every distinct content reference in a unit's exposure sequence maps to
/// exactly one canonical frame; declared clones land in the class of the
/// content they reference. The planner requests exactly one render per
/// canonical frame, however many rows expose it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalFrame {
    /// 1-based output sequence number within the unit, in first-exposure
    /// order.
    pub number: u32,
    /// The content this frame renders.
    pub content: ContentRef,
    /// Every exposure-sequence frame index that shows this frame. Never
    /// empty.
    pub exposed_at: Vec<u32>,
}

/// The result of deduplicating one unit's exposure sequence: the canonical
/// frames plus the row → canonical-number mapping the scene builder reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FramePartition {
    /// Canonical frames in first-exposure order; `frames[i].number == i + 1`.
    pub frames: Vec<CanonicalFrame>,
    /// For each row of the document, the canonical frame number exposed
    /// there, or `None` for rows with no cell.
    pub by_row: Vec<Option<u32>>,
}

impl FramePartition {
    /// Look up a canonical frame by its 1-based number.
    pub fn frame(&self, number: u32) -> Option<&CanonicalFrame> {
        self.frames.get(number.checked_sub(1)? as usize)
    }

    /// Number of distinct canonical frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_lookup_is_one_based() {
        let partition = FramePartition {
            frames: vec![CanonicalFrame {
                number: 1,
                content: ContentRef::new("a"),
                exposed_at: vec![0, 1],
            }],
            by_row: vec![Some(1), Some(1)],
        };
        assert_eq!(partition.frame(1).unwrap().content, ContentRef::new("a"));
        assert!(partition.frame(0).is_none());
        assert!(partition.frame(2).is_none());
    }
}
