//! Timeline resolution: sparse keyframe events → dense exposure sequence.

use std::collections::HashSet;

use sakuga_core::{SakugaError, SakugaResult};
use sakuga_ir::{ContentRef, ExportUnit, ExposureSequence, KeyframeEvent};

/// A unit's resolved timeline: the dense exposure sequence plus the rows
/// where authored events sit. The scene builder breaks exposure runs at
/// event rows, so a declared clone starts a fresh cell entry even though
/// its content matches the held frame before it.
#[derive(Debug, Clone)]
pub struct ResolvedTimeline {
    pub sequence: ExposureSequence,
    pub event_rows: Vec<u32>,
}

/// Expand a unit's keyframe events into one cell per frame of the document.
///
/// Hold-frame semantics: each cell carries the content of the most recent
/// event at or before it. Stop frames (blank keyframes) end a hold; the
/// rows after one carry no cell until the next drawing.
///
/// Rejected inputs, all scoped to this unit:
/// - duplicate frame indices or an empty event list (`MalformedTimeline`)
/// - a first event after frame 0 (`MissingInitialKeyframe`) — frames
///   before the first event would have undefined content
/// - a clone event whose content reference was never seen earlier in the
///   unit (`DanglingCloneReference`)
pub fn resolve_timeline(
    unit: &ExportUnit,
    events: &[KeyframeEvent],
) -> SakugaResult<ResolvedTimeline> {
    if events.is_empty() {
        return Err(SakugaError::malformed_timeline(
            &unit.id.0,
            "unit has no keyframes",
        ));
    }

    let mut sorted: Vec<&KeyframeEvent> = events.iter().collect();
    sorted.sort_by_key(|e| e.frame);

    for pair in sorted.windows(2) {
        if pair[0].frame == pair[1].frame {
            return Err(SakugaError::malformed_timeline(
                &unit.id.0,
                format!("duplicate keyframe at frame {}", pair[0].frame),
            ));
        }
    }

    if sorted[0].frame != 0 {
        return Err(SakugaError::MissingInitialKeyframe {
            unit: unit.id.0.clone(),
            first: sorted[0].frame,
        });
    }

    // Clone verification: a clone must reference content already seen in
    // this unit's history.
    let mut seen: HashSet<&ContentRef> = HashSet::new();
    for event in &sorted {
        if let Some(content) = &event.content {
            if event.is_clone && !seen.contains(content) {
                return Err(SakugaError::DanglingCloneReference {
                    unit: unit.id.0.clone(),
                    frame: event.frame,
                });
            }
            seen.insert(content);
        }
    }

    let duration = unit.duration as usize;
    let mut cells: Vec<Option<ContentRef>> = Vec::with_capacity(duration);
    let mut event_rows = Vec::with_capacity(sorted.len());
    let mut next = 0usize;
    let mut current: Option<ContentRef> = None;

    for frame in 0..duration {
        while next < sorted.len() && sorted[next].frame as usize == frame {
            current = sorted[next].content.clone();
            event_rows.push(sorted[next].frame);
            next += 1;
        }
        cells.push(current.clone());
    }

    Ok(ResolvedTimeline {
        sequence: ExposureSequence::from_cells(cells),
        event_rows,
    })
}
