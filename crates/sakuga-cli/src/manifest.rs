//! JSON document manifests.
//!
//! A manifest describes a layered, keyframed document whose content lives in
//! image files next to it: the layer hierarchy, each paint layer's keyframe
//! timing, and the image file every keyframe exposes. Loading one produces a
//! [`DocumentManifest`] that the export pipeline consumes as its source
//! collaborator.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use sakuga_core::{SakugaError, SakugaResult};
use sakuga_ir::{
    ContentRef, DocumentInfo, KeyframeEvent, LayerId, LayerKind, LayerNode, LayerTree, NodeId,
    SourceDocument,
};

/// Separator between image paths in a flattened-group content token. Never
/// valid inside a path, so joined tokens stay unambiguous.
pub const COMPOSITE_SEPARATOR: char = '\n';

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawManifest {
    name: String,
    width: u32,
    height: u32,
    /// Total frame count of the clip.
    duration: u32,
    #[serde(default = "default_frame_rate")]
    frame_rate: f64,
    /// Top-level layers, topmost first.
    layers: Vec<RawLayer>,
}

fn default_frame_rate() -> f64 {
    24.0
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawLayer {
    name: String,
    #[serde(default = "default_true")]
    visible: bool,
    /// The reference (guide) marker.
    #[serde(default)]
    reference: bool,
    /// Child layers, topmost first. Presence makes this a group.
    #[serde(default)]
    children: Vec<RawLayer>,
    /// Keyframe events of an animated paint layer (or a pre-flattened
    /// group), in any order.
    #[serde(default)]
    keyframes: Vec<RawKeyframe>,
    /// Single image of a static paint layer.
    #[serde(default)]
    image: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

/// One keyframe entry. Exactly one of `image`, `clone`, `stop` applies.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawKeyframe {
    frame: u32,
    /// New drawing: path to its image file, relative to the manifest.
    #[serde(default)]
    image: Option<PathBuf>,
    /// Declared clone of an earlier keyframe's image.
    #[serde(default)]
    clone: Option<PathBuf>,
    /// Blank keyframe ending the current hold.
    #[serde(default)]
    stop: bool,
}

/// A loaded manifest, indexed for the pipeline's lookups.
///
/// Content tokens are the referenced images' resolved paths, so two
/// keyframes naming the same file compare equal and deduplicate.
pub struct DocumentManifest {
    info: DocumentInfo,
    tree: LayerTree,
    channels: HashMap<LayerId, Vec<KeyframeEvent>>,
    statics: HashMap<LayerId, ContentRef>,
}

impl DocumentManifest {
    /// Load and index a manifest file. Keyframe content paths resolve
    /// relative to the manifest's directory.
    pub fn load(path: &Path) -> SakugaResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let raw: RawManifest = serde_json::from_str(&text)?;
        let base_dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();
        Self::from_raw(raw, &base_dir)
    }

    fn from_raw(raw: RawManifest, base_dir: &Path) -> SakugaResult<Self> {
        if raw.duration == 0 {
            return Err(SakugaError::InvalidArgument(
                "manifest duration must be at least 1 frame".into(),
            ));
        }

        let mut manifest = Self {
            info: DocumentInfo {
                name: raw.name,
                width: raw.width,
                height: raw.height,
                duration: raw.duration,
                frame_rate: raw.frame_rate,
            },
            tree: LayerTree::new(),
            channels: HashMap::new(),
            statics: HashMap::new(),
        };

        let mut used_ids = HashSet::new();
        for layer in &raw.layers {
            manifest.index_layer(layer, None, "", base_dir, &mut used_ids)?;
        }

        // Groups without baked keyframes expose the union of their animated
        // descendants.
        for root in manifest.tree.roots().to_vec() {
            manifest.derive_group_channels(root)?;
        }

        Ok(manifest)
    }

    fn index_layer(
        &mut self,
        raw: &RawLayer,
        parent: Option<NodeId>,
        parent_path: &str,
        base_dir: &Path,
        used_ids: &mut HashSet<String>,
    ) -> SakugaResult<NodeId> {
        let mut id = if parent_path.is_empty() {
            raw.name.clone()
        } else {
            format!("{}/{}", parent_path, raw.name)
        };
        if !used_ids.insert(id.clone()) {
            let mut n = 1;
            while !used_ids.insert(format!("{}#{}", id, n)) {
                n += 1;
            }
            id = format!("{}#{}", id, n);
        }

        let is_group = !raw.children.is_empty();
        if is_group && raw.image.is_some() {
            return Err(SakugaError::InvalidArgument(format!(
                "layer '{}' has both children and a static image",
                id
            )));
        }
        if !is_group && raw.keyframes.is_empty() && raw.image.is_none() {
            return Err(SakugaError::InvalidArgument(format!(
                "paint layer '{}' has neither keyframes nor a static image",
                id
            )));
        }

        let layer_id = LayerId::new(id.clone());
        let animated = !is_group && !raw.keyframes.is_empty();

        let node = self.tree.add_node(
            parent,
            LayerNode {
                id: layer_id.clone(),
                name: raw.name.clone(),
                kind: if is_group {
                    LayerKind::Group
                } else {
                    LayerKind::Paint
                },
                visible: raw.visible,
                reference_labeled: raw.reference,
                animated,
                children: Vec::new(),
            },
        );

        if !raw.keyframes.is_empty() {
            let events = convert_keyframes(&id, &raw.keyframes, base_dir)?;
            self.channels.insert(layer_id.clone(), events);
        }
        if let Some(image) = &raw.image {
            self.statics
                .insert(layer_id, content_token(base_dir, image));
        }

        for child in &raw.children {
            self.index_layer(child, Some(node), &id, base_dir, used_ids)?;
        }
        Ok(node)
    }

    /// Fill in keyframe channels for groups that did not bake their own:
    /// the union of descendant events, each exposing a composite token of
    /// the images visible at that frame, backmost first.
    fn derive_group_channels(&mut self, node: NodeId) -> SakugaResult<()> {
        for child in self.tree.node(node).children.clone() {
            self.derive_group_channels(child)?;
        }

        let layer = self.tree.node(node);
        if layer.kind != LayerKind::Group || self.channels.contains_key(&layer.id) {
            return Ok(());
        }

        let mut tracks: Vec<&[KeyframeEvent]> = Vec::new();
        let mut statics: Vec<&ContentRef> = Vec::new();
        self.collect_visible_content(node, &mut tracks, &mut statics);
        if tracks.is_empty() {
            return Ok(());
        }

        let mut frames: Vec<u32> = tracks
            .iter()
            .flat_map(|events| events.iter().map(|e| e.frame))
            .collect();
        frames.sort_unstable();
        frames.dedup();

        let mut events = Vec::with_capacity(frames.len());
        for &frame in &frames {
            let mut parts: Vec<&str> = statics.iter().map(|c| c.0.as_str()).collect();
            for track in &tracks {
                if let Some(content) = exposed_at(track, frame) {
                    parts.push(&content.0);
                }
            }
            if parts.is_empty() {
                events.push(KeyframeEvent::stop(frame));
            } else {
                let sep = COMPOSITE_SEPARATOR.to_string();
                events.push(KeyframeEvent::drawing(
                    frame,
                    ContentRef::new(parts.join(&sep)),
                ));
            }
        }

        let id = self.tree.node(node).id.clone();
        self.channels.insert(id, events);
        Ok(())
    }

    /// Animated tracks and static images of the visible descendants of
    /// `node`, backmost first, matching paint order.
    fn collect_visible_content<'a>(
        &'a self,
        node: NodeId,
        tracks: &mut Vec<&'a [KeyframeEvent]>,
        statics: &mut Vec<&'a ContentRef>,
    ) {
        // Children are stored topmost first; walk them in reverse.
        for &child in self.tree.node(node).children.iter().rev() {
            let layer = self.tree.node(child);
            if !layer.visible {
                continue;
            }
            match layer.kind {
                LayerKind::Group => self.collect_visible_content(child, tracks, statics),
                LayerKind::Paint => {
                    if let Some(events) = self.channels.get(&layer.id) {
                        tracks.push(events);
                    } else if let Some(content) = self.statics.get(&layer.id) {
                        statics.push(content);
                    }
                }
            }
        }
    }
}

/// The image a track exposes at `frame`: the latest event at or before it,
/// `None` before the first event or after a stop.
fn exposed_at(events: &[KeyframeEvent], frame: u32) -> Option<&ContentRef> {
    events
        .iter()
        .filter(|e| e.frame <= frame)
        .max_by_key(|e| e.frame)
        .and_then(|e| e.content.as_ref())
}

fn convert_keyframes(
    layer: &str,
    raw: &[RawKeyframe],
    base_dir: &Path,
) -> SakugaResult<Vec<KeyframeEvent>> {
    let mut events = Vec::with_capacity(raw.len());
    for kf in raw {
        let event = match (&kf.image, &kf.clone, kf.stop) {
            (Some(image), None, false) => {
                KeyframeEvent::drawing(kf.frame, content_token(base_dir, image))
            }
            (None, Some(original), false) => {
                KeyframeEvent::clone_of(kf.frame, content_token(base_dir, original))
            }
            (None, None, true) => KeyframeEvent::stop(kf.frame),
            _ => {
                return Err(SakugaError::InvalidArgument(format!(
                    "keyframe at frame {} of '{}' must set exactly one of image, clone, stop",
                    kf.frame, layer
                )))
            }
        };
        events.push(event);
    }
    Ok(events)
}

fn content_token(base_dir: &Path, image: &Path) -> ContentRef {
    let resolved = if image.is_absolute() {
        image.to_path_buf()
    } else {
        base_dir.join(image)
    };
    ContentRef::new(resolved.display().to_string())
}

impl SourceDocument for DocumentManifest {
    fn info(&self) -> DocumentInfo {
        self.info.clone()
    }

    fn layer_tree(&self) -> SakugaResult<LayerTree> {
        Ok(self.tree.clone())
    }

    fn keyframes(&self, layer: &LayerId) -> SakugaResult<Vec<KeyframeEvent>> {
        self.channels.get(layer).cloned().ok_or_else(|| {
            SakugaError::InvalidArgument(format!("no keyframe channel for layer '{}'", layer))
        })
    }

    fn static_content(&self, layer: &LayerId) -> SakugaResult<ContentRef> {
        self.statics.get(layer).cloned().ok_or_else(|| {
            SakugaError::InvalidArgument(format!("no static image for layer '{}'", layer))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load_str(json: &str) -> SakugaResult<DocumentManifest> {
        let raw: RawManifest = serde_json::from_str(json).unwrap();
        DocumentManifest::from_raw(raw, Path::new("/doc"))
    }

    #[test]
    fn test_flat_manifest_indexes_channels() {
        let manifest = load_str(
            r#"{
                "name": "Cut01", "width": 1920, "height": 1080, "duration": 48,
                "layers": [
                    {"name": "Ink", "keyframes": [
                        {"frame": 0, "image": "ink_a.png"},
                        {"frame": 12, "clone": "ink_a.png"},
                        {"frame": 24, "stop": true}
                    ]},
                    {"name": "BG", "image": "bg.png"}
                ]
            }"#,
        )
        .unwrap();

        let events = manifest.keyframes(&LayerId::new("Ink")).unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].content, Some(ContentRef::new("/doc/ink_a.png")));
        assert!(events[1].is_clone);
        assert!(events[2].content.is_none());

        let bg = manifest.static_content(&LayerId::new("BG")).unwrap();
        assert_eq!(bg, ContentRef::new("/doc/bg.png"));
    }

    #[test]
    fn test_group_union_composites_backmost_first() {
        let manifest = load_str(
            r#"{
                "name": "Cut01", "width": 100, "height": 100, "duration": 24,
                "layers": [
                    {"name": "Cut", "children": [
                        {"name": "Ink", "keyframes": [
                            {"frame": 0, "image": "ink_0.png"},
                            {"frame": 8, "image": "ink_8.png"}
                        ]},
                        {"name": "Paint", "keyframes": [
                            {"frame": 0, "image": "paint_0.png"}
                        ]}
                    ]}
                ]
            }"#,
        )
        .unwrap();

        let events = manifest.keyframes(&LayerId::new("Cut")).unwrap();
        assert_eq!(events.len(), 2);
        // Paint is below Ink in source order, so it composites first.
        assert_eq!(
            events[0].content,
            Some(ContentRef::new("/doc/paint_0.png\n/doc/ink_0.png"))
        );
        assert_eq!(
            events[1].content,
            Some(ContentRef::new("/doc/paint_0.png\n/doc/ink_8.png"))
        );
    }

    #[test]
    fn test_group_union_skips_invisible_descendants() {
        let manifest = load_str(
            r#"{
                "name": "Cut01", "width": 100, "height": 100, "duration": 24,
                "layers": [
                    {"name": "Cut", "children": [
                        {"name": "Rough", "visible": false, "keyframes": [
                            {"frame": 0, "image": "rough.png"}
                        ]},
                        {"name": "Ink", "keyframes": [
                            {"frame": 0, "image": "ink.png"}
                        ]}
                    ]}
                ]
            }"#,
        )
        .unwrap();

        let events = manifest.keyframes(&LayerId::new("Cut")).unwrap();
        assert_eq!(events[0].content, Some(ContentRef::new("/doc/ink.png")));
    }

    #[test]
    fn test_conflicting_keyframe_fields_rejected() {
        let result = load_str(
            r#"{
                "name": "Cut01", "width": 100, "height": 100, "duration": 24,
                "layers": [
                    {"name": "Ink", "keyframes": [
                        {"frame": 0, "image": "a.png", "stop": true}
                    ]}
                ]
            }"#,
        );
        assert!(matches!(result, Err(SakugaError::InvalidArgument(_))));
    }

    #[test]
    fn test_duplicate_sibling_names_get_distinct_ids() {
        let manifest = load_str(
            r#"{
                "name": "Cut01", "width": 100, "height": 100, "duration": 24,
                "layers": [
                    {"name": "Cel", "keyframes": [{"frame": 0, "image": "a.png"}]},
                    {"name": "Cel", "keyframes": [{"frame": 0, "image": "b.png"}]}
                ]
            }"#,
        )
        .unwrap();

        assert!(manifest.keyframes(&LayerId::new("Cel")).is_ok());
        assert!(manifest.keyframes(&LayerId::new("Cel#1")).is_ok());
    }

    #[test]
    fn test_zero_duration_rejected() {
        let result = load_str(
            r#"{
                "name": "Cut01", "width": 100, "height": 100, "duration": 0,
                "layers": [
                    {"name": "Ink", "keyframes": [{"frame": 0, "image": "a.png"}]}
                ]
            }"#,
        );
        assert!(matches!(result, Err(SakugaError::InvalidArgument(_))));
    }
}
