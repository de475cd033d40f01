//! Frame sequence planning: canonical frames → numbered files on disk.

use std::path::{Path, PathBuf};

use dashmap::DashMap;

use sakuga_core::hash::{hash_frame, ContentHash};
use sakuga_core::{zero_pad, SakugaError, SakugaResult};
use sakuga_ir::{ExportUnit, FramePartition, LevelId};

use crate::cancel::CancelFlag;
use crate::render::FrameRenderer;

/// Shared cross-layer dedup table: rendered-content hash → the level frame
/// already written for that content. Append-only for the run. Entries are
/// claimed by [`claim_unit`] one unit at a time in stacking order, so the
/// backmost unit exposing a piece of content always owns its file.
pub type SharedDedupTable = DashMap<ContentHash, (LevelId, u32)>;

/// Where one unit's canonical frames ended up.
#[derive(Debug)]
pub struct FramePlan {
    /// For canonical frame `n`, `bindings[n - 1]` names the level frame
    /// holding its pixels — usually this unit's own level, possibly another
    /// unit's when cross-layer dedup matched, `None` when export failed.
    pub bindings: Vec<Option<(LevelId, u32)>>,
    /// Files written into this unit's own sequence.
    pub frames_written: u32,
    /// Per-frame export failures, collected rather than fatal.
    pub failures: Vec<SakugaError>,
    /// True if cancellation stopped the unit before all frames were issued.
    pub cancelled: bool,
}

/// The level id a unit's own files belong to.
pub fn unit_level_id(unit: &ExportUnit) -> LevelId {
    LevelId::new(unit.id.0.clone())
}

/// The level's sequence path pattern relative to the scene directory, in
/// OpenToonz `..` placeholder form. Animated units get a subdirectory;
/// static images sit directly in the run directory.
pub fn path_pattern(unit: &ExportUnit) -> String {
    if unit.is_animated() {
        format!("{}/{}..png", unit.id, unit.id)
    } else {
        format!("{}..png", unit.id)
    }
}

/// Render and encode one unit's canonical frames, no cross-layer sharing.
///
/// Output indices are 1-based, zero-padded, and gap-free in first-exposure
/// order: frames that fail do not consume an index. Exactly one render call
/// is issued per canonical frame; the sequence on disk is written in
/// strictly increasing order.
pub fn plan_unit(
    unit: &ExportUnit,
    partition: &FramePartition,
    renderer: &dyn FrameRenderer,
    scene_dir: &Path,
    pad_width: usize,
    cancel: &CancelFlag,
) -> SakugaResult<FramePlan> {
    let level = unit_level_id(unit);
    let dir = if unit.is_animated() {
        scene_dir.join(&unit.id.0)
    } else {
        scene_dir.to_path_buf()
    };
    std::fs::create_dir_all(&dir)?;

    let mut plan = FramePlan {
        bindings: vec![None; partition.len()],
        frames_written: 0,
        failures: Vec::new(),
        cancelled: false,
    };

    for canonical in &partition.frames {
        if cancel.is_cancelled() {
            plan.cancelled = true;
            tracing::info!(unit = %unit.id, "cancellation requested, stopping unit");
            break;
        }

        let slot = (canonical.number - 1) as usize;
        let buffer = match renderer.render_frame(&unit.source, &canonical.content) {
            Ok(buffer) => buffer,
            Err(e) => {
                plan.failures.push(SakugaError::frame_export(
                    &unit.id.0,
                    canonical.number,
                    e.to_string(),
                ));
                continue;
            }
        };

        let number = plan.frames_written + 1;
        match write_frame(unit, renderer, &dir, pad_width, number, &buffer) {
            Ok(()) => {
                plan.frames_written = number;
                plan.bindings[slot] = Some((level.clone(), number));
            }
            Err(e) => plan.failures.push(SakugaError::frame_export(
                &unit.id.0,
                canonical.number,
                e.to_string(),
            )),
        }
    }

    tracing::debug!(
        unit = %unit.id,
        written = plan.frames_written,
        failed = plan.failures.len(),
        "planned frame sequence"
    );
    Ok(plan)
}

/// One unit's rendered canonical frames, held in memory between the
/// parallel render phase and the sequential claim phase of a
/// cross-layer-dedup run.
#[derive(Debug)]
pub struct RenderedFrames {
    /// For canonical frame `n`, `buffers[n - 1]` holds its rendered pixels,
    /// `None` when rendering failed.
    pub buffers: Vec<Option<sakuga_core::FrameBuffer>>,
    pub failures: Vec<SakugaError>,
    pub cancelled: bool,
}

/// Render one unit's canonical frames without encoding anything.
///
/// The parallel half of a cross-layer-dedup run: workers may render in any
/// order because no dedup ownership is decided here.
pub fn render_unit(
    unit: &ExportUnit,
    partition: &FramePartition,
    renderer: &dyn FrameRenderer,
    cancel: &CancelFlag,
) -> RenderedFrames {
    let mut rendered = RenderedFrames {
        buffers: (0..partition.len()).map(|_| None).collect(),
        failures: Vec::new(),
        cancelled: false,
    };

    for canonical in &partition.frames {
        if cancel.is_cancelled() {
            rendered.cancelled = true;
            tracing::info!(unit = %unit.id, "cancellation requested, stopping unit");
            break;
        }
        let slot = (canonical.number - 1) as usize;
        match renderer.render_frame(&unit.source, &canonical.content) {
            Ok(buffer) => rendered.buffers[slot] = Some(buffer),
            Err(e) => rendered.failures.push(SakugaError::frame_export(
                &unit.id.0,
                canonical.number,
                e.to_string(),
            )),
        }
    }

    rendered
}

/// Claim dedup-table entries and encode the frames this unit owns.
///
/// The sequential half of a cross-layer-dedup run: called unit by unit in
/// stacking order, so for any piece of shared content the backmost unit
/// that rendered it successfully owns the file, regardless of how the
/// render phase was scheduled. Identical inputs therefore produce the same
/// level list and bindings on every run.
pub fn claim_unit(
    unit: &ExportUnit,
    rendered: RenderedFrames,
    renderer: &dyn FrameRenderer,
    scene_dir: &Path,
    pad_width: usize,
    shared: &SharedDedupTable,
    cancel: &CancelFlag,
) -> SakugaResult<FramePlan> {
    let level = unit_level_id(unit);
    let dir = if unit.is_animated() {
        scene_dir.join(&unit.id.0)
    } else {
        scene_dir.to_path_buf()
    };
    std::fs::create_dir_all(&dir)?;

    let mut plan = FramePlan {
        bindings: vec![None; rendered.buffers.len()],
        frames_written: 0,
        failures: rendered.failures,
        cancelled: rendered.cancelled,
    };

    for (slot, buffer) in rendered.buffers.into_iter().enumerate() {
        let Some(buffer) = buffer else { continue };
        if cancel.is_cancelled() {
            plan.cancelled = true;
            break;
        }

        match shared.entry(hash_frame(&buffer)) {
            dashmap::mapref::entry::Entry::Occupied(existing) => {
                tracing::debug!(
                    unit = %unit.id,
                    canonical = slot + 1,
                    "cross-layer dedup hit, reusing existing frame"
                );
                plan.bindings[slot] = Some(existing.get().clone());
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                let number = plan.frames_written + 1;
                match write_frame(unit, renderer, &dir, pad_width, number, &buffer) {
                    Ok(()) => {
                        plan.frames_written = number;
                        plan.bindings[slot] = Some((level.clone(), number));
                        vacant.insert((level.clone(), number));
                    }
                    Err(e) => plan.failures.push(SakugaError::frame_export(
                        &unit.id.0,
                        slot as u32 + 1,
                        e.to_string(),
                    )),
                }
            }
        }
    }

    tracing::debug!(
        unit = %unit.id,
        written = plan.frames_written,
        failed = plan.failures.len(),
        "claimed frame sequence"
    );
    Ok(plan)
}

/// Plan a unit without touching the renderer or the filesystem: every
/// canonical frame binds to its own level, numbered sequentially. Used for
/// scene-script previews.
pub fn plan_unit_dry(unit: &ExportUnit, partition: &FramePartition) -> FramePlan {
    let level = unit_level_id(unit);
    FramePlan {
        bindings: partition
            .frames
            .iter()
            .map(|f| Some((level.clone(), f.number)))
            .collect(),
        frames_written: partition.len() as u32,
        failures: Vec::new(),
        cancelled: false,
    }
}

fn write_frame(
    unit: &ExportUnit,
    renderer: &dyn FrameRenderer,
    dir: &Path,
    pad_width: usize,
    number: u32,
    buffer: &sakuga_core::FrameBuffer,
) -> SakugaResult<()> {
    let path: PathBuf = dir.join(format!("{}.{}.png", unit.id, zero_pad(number, pad_width)));
    renderer.encode_image(buffer, &path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::partition_sequence;
    use sakuga_core::{FrameBuffer, PixelFormat};
    use sakuga_ir::{ContentRef, ExposureSequence, LayerId, SourceKind, UnitId, UnitSource};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingRenderer {
        renders: AtomicUsize,
        encodes: AtomicUsize,
        fail_on: Option<ContentRef>,
    }

    impl CountingRenderer {
        fn new() -> Self {
            Self {
                renders: AtomicUsize::new(0),
                encodes: AtomicUsize::new(0),
                fail_on: None,
            }
        }
    }

    impl FrameRenderer for CountingRenderer {
        fn render_frame(
            &self,
            _source: &UnitSource,
            content: &ContentRef,
        ) -> SakugaResult<FrameBuffer> {
            self.renders.fetch_add(1, Ordering::SeqCst);
            if self.fail_on.as_ref() == Some(content) {
                return Err(SakugaError::Render(format!("cannot render {}", content)));
            }
            let mut fb = FrameBuffer::new(2, 2, PixelFormat::Rgba8);
            // Distinct pixel content per token so hashing sees real data.
            fb.set_pixel(0, 0, [content.0.len() as u8, 0, 0, 255]);
            Ok(fb)
        }

        fn encode_image(&self, _frame: &FrameBuffer, path: &Path) -> SakugaResult<()> {
            self.encodes.fetch_add(1, Ordering::SeqCst);
            std::fs::write(path, b"png")?;
            Ok(())
        }
    }

    fn unit(name: &str) -> ExportUnit {
        ExportUnit {
            id: UnitId::new(name),
            display_name: name.into(),
            stack_index: 0,
            kind: SourceKind::AnimatedLayer,
            source: UnitSource::Layer(LayerId::new("l1")),
            visible: true,
            reference_labeled: false,
            duration: 48,
        }
    }

    fn hold_and_clone_partition() -> FramePartition {
        // One drawing held for 24 frames, then a declared clone of it for
        // another 24: one canonical frame, 48 exposures.
        let cells: Vec<Option<ContentRef>> = (0..48).map(|_| Some(ContentRef::new("a"))).collect();
        partition_sequence(&ExposureSequence::from_cells(cells))
    }

    fn temp_scene_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("sakuga_planner_{}", tag));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_one_render_per_canonical_frame() {
        let dir = temp_scene_dir("one_render");
        let renderer = CountingRenderer::new();
        let unit = unit("Ink");
        let partition = hold_and_clone_partition();

        let plan = plan_unit(&unit, &partition, &renderer, &dir, 4, &CancelFlag::new()).unwrap();

        assert_eq!(renderer.renders.load(Ordering::SeqCst), 1);
        assert_eq!(renderer.encodes.load(Ordering::SeqCst), 1);
        assert_eq!(plan.frames_written, 1);
        assert!(dir.join("Ink/Ink.0001.png").exists());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_failed_frame_collected_and_numbering_gap_free() {
        let dir = temp_scene_dir("gap_free");
        let mut renderer = CountingRenderer::new();
        renderer.fail_on = Some(ContentRef::new("b"));
        let unit = unit("Ink");
        let cells = vec![
            Some(ContentRef::new("a")),
            Some(ContentRef::new("b")),
            Some(ContentRef::new("c")),
        ];
        let partition = partition_sequence(&ExposureSequence::from_cells(cells));

        let plan = plan_unit(&unit, &partition, &renderer, &dir, 4, &CancelFlag::new()).unwrap();

        assert_eq!(plan.failures.len(), 1);
        assert_eq!(plan.frames_written, 2);
        // "c" takes index 2, not 3: the failed frame leaves no gap.
        assert_eq!(
            plan.bindings[2],
            Some((LevelId::new("Ink"), 2))
        );
        assert!(plan.bindings[1].is_none());
        assert!(dir.join("Ink/Ink.0002.png").exists());
        assert!(!dir.join("Ink/Ink.0003.png").exists());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_cancelled_unit_stops_issuing_renders() {
        let dir = temp_scene_dir("cancel");
        let renderer = CountingRenderer::new();
        let unit = unit("Ink");
        let partition = hold_and_clone_partition();
        let cancel = CancelFlag::new();
        cancel.request();

        let plan = plan_unit(&unit, &partition, &renderer, &dir, 4, &cancel).unwrap();
        assert!(plan.cancelled);
        assert_eq!(renderer.renders.load(Ordering::SeqCst), 0);
        assert_eq!(plan.frames_written, 0);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_cross_layer_dedup_shares_files() {
        let dir = temp_scene_dir("cross");
        let renderer = CountingRenderer::new();
        let table = SharedDedupTable::new();
        let cancel = CancelFlag::new();

        let unit_a = unit("A");
        let unit_b = unit("B");
        // Both units expose one drawing whose rendered pixels are identical
        // (same token length drives the mock renderer's pixel data).
        let cells_a = vec![Some(ContentRef::new("x"))];
        let cells_b = vec![Some(ContentRef::new("y"))];
        let part_a = partition_sequence(&ExposureSequence::from_cells(cells_a));
        let part_b = partition_sequence(&ExposureSequence::from_cells(cells_b));

        let rendered_a = render_unit(&unit_a, &part_a, &renderer, &cancel);
        let rendered_b = render_unit(&unit_b, &part_b, &renderer, &cancel);
        let plan_a = claim_unit(&unit_a, rendered_a, &renderer, &dir, 4, &table, &cancel).unwrap();
        let plan_b = claim_unit(&unit_b, rendered_b, &renderer, &dir, 4, &table, &cancel).unwrap();

        assert_eq!(plan_a.frames_written, 1);
        assert_eq!(plan_b.frames_written, 0);
        assert_eq!(plan_b.bindings[0], Some((LevelId::new("A"), 1)));
        // Both rendered, only one encoded.
        assert_eq!(renderer.renders.load(Ordering::SeqCst), 2);
        assert_eq!(renderer.encodes.load(Ordering::SeqCst), 1);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_claim_order_decides_dedup_ownership() {
        // Render order must not matter: B is claimed first (backmost in a
        // stacking-order pass), so B owns the shared file even though A
        // rendered first.
        let dir = temp_scene_dir("claim_order");
        let renderer = CountingRenderer::new();
        let table = SharedDedupTable::new();
        let cancel = CancelFlag::new();

        let unit_a = unit("A");
        let unit_b = unit("B");
        let part_a = partition_sequence(&ExposureSequence::from_cells(vec![Some(
            ContentRef::new("x"),
        )]));
        let part_b = partition_sequence(&ExposureSequence::from_cells(vec![Some(
            ContentRef::new("y"),
        )]));

        let rendered_a = render_unit(&unit_a, &part_a, &renderer, &cancel);
        let rendered_b = render_unit(&unit_b, &part_b, &renderer, &cancel);
        let plan_b = claim_unit(&unit_b, rendered_b, &renderer, &dir, 4, &table, &cancel).unwrap();
        let plan_a = claim_unit(&unit_a, rendered_a, &renderer, &dir, 4, &table, &cancel).unwrap();

        assert_eq!(plan_b.frames_written, 1);
        assert_eq!(plan_a.frames_written, 0);
        assert_eq!(plan_a.bindings[0], Some((LevelId::new("B"), 1)));
        assert!(dir.join("B/B.0001.png").exists());
        assert!(!dir.join("A/A.0001.png").exists());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_dry_plan_binds_own_level() {
        let unit = unit("Ink");
        let partition = hold_and_clone_partition();
        let plan = plan_unit_dry(&unit, &partition);
        assert_eq!(plan.frames_written, 1);
        assert_eq!(plan.bindings, vec![Some((LevelId::new("Ink"), 1))]);
    }
}
