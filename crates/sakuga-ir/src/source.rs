use serde::{Deserialize, Serialize};

use crate::keyframe::KeyframeEvent;
use sakuga_core::SakugaResult;

/// Unique identifier for a source layer, as assigned by the source document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerId(pub String);

impl LayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for LayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a source layer is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayerKind {
    /// A container of other layers.
    Group,
    /// A drawable layer that can carry keyframes.
    Paint,
}

/// Index of a node within a [`LayerTree`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub usize);

/// One node of the source layer hierarchy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerNode {
    /// Stable identity in the source document.
    pub id: LayerId,
    /// Display name.
    pub name: String,
    pub kind: LayerKind,
    /// Whether the layer is visible in the source document.
    pub visible: bool,
    /// Whether the layer carries the reference (guide) marker.
    pub reference_labeled: bool,
    /// Whether the layer carries any keyframes. Always false for groups.
    pub animated: bool,
    /// Child nodes, topmost first, in source sibling order.
    pub children: Vec<NodeId>,
}

/// The source layer hierarchy as an arena of nodes.
///
/// Nodes are addressed by [`NodeId`] so the normalizer can walk the tree and
/// build a flat unit list without holding live references into the source
/// collaborator's own structures.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayerTree {
    nodes: Vec<LayerNode>,
    /// Top-level nodes, topmost first.
    roots: Vec<NodeId>,
}

impl LayerTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node. With `parent` None it becomes a root, otherwise it is
    /// appended to the parent's children (after its existing siblings).
    pub fn add_node(&mut self, parent: Option<NodeId>, node: LayerNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        match parent {
            Some(p) => self.nodes[p.0].children.push(id),
            None => self.roots.push(id),
        }
        id
    }

    pub fn node(&self, id: NodeId) -> &LayerNode {
        &self.nodes[id.0]
    }

    /// Top-level nodes, topmost first.
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether the subtree under `id` contains any animated paint layer.
    pub fn has_animated_content(&self, id: NodeId) -> bool {
        let node = self.node(id);
        match node.kind {
            LayerKind::Paint => node.animated,
            LayerKind::Group => node
                .children
                .iter()
                .any(|&child| self.has_animated_content(child)),
        }
    }
}

/// Document-level metadata the export carries into the scene header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// Total frame count of the clip.
    pub duration: u32,
    pub frame_rate: f64,
}

/// The source-document collaborator: everything the pipeline reads from the
/// authoring application.
///
/// Rendering and encoding live on a separate trait in the export crate; this
/// one is purely metadata and timing.
pub trait SourceDocument {
    /// Document metadata (name, dimensions, duration, frame rate).
    fn info(&self) -> DocumentInfo;

    /// The full layer hierarchy, snapshotted into an arena.
    fn layer_tree(&self) -> SakugaResult<LayerTree>;

    /// The ordered keyframe events of one paint layer. For a group this is
    /// the per-frame union of all animated descendants' events.
    fn keyframes(&self, layer: &LayerId) -> SakugaResult<Vec<KeyframeEvent>>;

    /// The content reference of a non-animated paint layer's single image.
    fn static_content(&self, layer: &LayerId) -> SakugaResult<crate::keyframe::ContentRef>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paint(id: &str, animated: bool) -> LayerNode {
        LayerNode {
            id: LayerId::new(id),
            name: id.to_string(),
            kind: LayerKind::Paint,
            visible: true,
            reference_labeled: false,
            animated,
            children: Vec::new(),
        }
    }

    fn group(id: &str) -> LayerNode {
        LayerNode {
            id: LayerId::new(id),
            name: id.to_string(),
            kind: LayerKind::Group,
            visible: true,
            reference_labeled: false,
            animated: false,
            children: Vec::new(),
        }
    }

    #[test]
    fn test_arena_structure() {
        let mut tree = LayerTree::new();
        let g = tree.add_node(None, group("g"));
        let a = tree.add_node(Some(g), paint("a", true));
        let b = tree.add_node(None, paint("b", false));

        assert_eq!(tree.roots(), &[g, b]);
        assert_eq!(tree.node(g).children, vec![a]);
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn test_has_animated_content_recurses() {
        let mut tree = LayerTree::new();
        let outer = tree.add_node(None, group("outer"));
        let inner = tree.add_node(Some(outer), group("inner"));
        tree.add_node(Some(inner), paint("cel", true));
        let still = tree.add_node(None, paint("bg", false));

        assert!(tree.has_animated_content(outer));
        assert!(tree.has_animated_content(inner));
        assert!(!tree.has_animated_content(still));
    }
}
