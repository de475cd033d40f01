//! Clone deduplication: exposure sequences → canonical frame partitions.

use std::collections::HashMap;

use sakuga_ir::{CanonicalFrame, ContentRef, ExposureSequence, FramePartition};

/// Partition one unit's exposure sequence into canonical frames.
///
/// Cells group by content-reference equality: a declared clone carries the
/// same reference as the content it clones, so it lands in the original's
/// class. Two independently authored drawings keep distinct references and
/// never share a class, pixel-identical or not — widening that to rendered
/// content is the planner's cross-layer hashing, not this stage.
///
/// Canonical numbers are 1-based in first-exposure order, so the partition
/// is a pure function of the sequence and running it twice yields the same
/// result.
pub fn partition_sequence(sequence: &ExposureSequence) -> FramePartition {
    let mut numbers: HashMap<&ContentRef, u32> = HashMap::new();
    let mut frames: Vec<CanonicalFrame> = Vec::new();
    let mut by_row = Vec::with_capacity(sequence.len());

    for (row, cell) in sequence.cells().iter().enumerate() {
        match cell {
            None => by_row.push(None),
            Some(content) => {
                let number = *numbers.entry(content).or_insert_with(|| {
                    frames.push(CanonicalFrame {
                        number: frames.len() as u32 + 1,
                        content: content.clone(),
                        exposed_at: Vec::new(),
                    });
                    frames.len() as u32
                });
                frames[number as usize - 1].exposed_at.push(row as u32);
                by_row.push(Some(number));
            }
        }
    }

    FramePartition { frames, by_row }
}
