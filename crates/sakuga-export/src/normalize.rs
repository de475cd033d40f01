//! Layer tree normalization: source hierarchy → ordered export units.

use std::collections::HashSet;

use sakuga_core::{sanitize_name, ExportPolicy, SakugaError, SakugaResult};
use sakuga_ir::{ExportUnit, LayerKind, LayerTree, NodeId, SourceKind, UnitId, UnitSource};

/// Light-table layers are working aids and never export, whatever the
/// policy says.
const LIGHT_TABLE_PREFIX: &str = "LT_";
const LIGHT_TABLE_NAME: &str = "Light Table";

fn is_light_table(name: &str) -> bool {
    name == LIGHT_TABLE_NAME || name.starts_with(LIGHT_TABLE_PREFIX)
}

/// Apply the inclusion policy to the layer tree and emit export units in
/// stacking order.
///
/// The walk is depth-first, preserving sibling order. Animated units come
/// first, then static units, each group ordered bottommost source layer
/// first: unit 0 lands in column 0, the backmost, so the topmost source
/// layer ends up in the frontmost column.
///
/// Fails with [`SakugaError::NoExportableContent`] if nothing survives the
/// policy — reportable before any file is touched.
pub fn normalize_layers(
    tree: &LayerTree,
    policy: &ExportPolicy,
    duration: u32,
) -> SakugaResult<Vec<ExportUnit>> {
    // Collected topmost-first, in source order.
    let mut animated: Vec<(NodeId, SourceKind)> = Vec::new();
    let mut statics: Vec<NodeId> = Vec::new();

    collect(tree, tree.roots(), policy, &mut animated, &mut statics);

    // Reverse so the topmost source layer maps to the highest column.
    animated.reverse();
    statics.reverse();

    let mut units = Vec::new();
    let mut used_names = HashSet::new();
    let mut stack_index = 0u32;

    for (node_id, kind) in animated {
        let node = tree.node(node_id);
        let name = unique_unit_name(&node.name, &mut used_names);
        let source = match kind {
            SourceKind::FlattenedGroup => UnitSource::Group(node.id.clone()),
            _ => UnitSource::Layer(node.id.clone()),
        };
        units.push(ExportUnit {
            id: UnitId::new(name),
            display_name: node.name.clone(),
            stack_index,
            kind,
            source,
            visible: node.visible,
            reference_labeled: node.reference_labeled,
            duration,
        });
        stack_index += 1;
    }

    if policy.include_static {
        for node_id in statics {
            let node = tree.node(node_id);
            let name = unique_unit_name(&node.name, &mut used_names);
            units.push(ExportUnit {
                id: UnitId::new(name),
                display_name: node.name.clone(),
                stack_index,
                kind: SourceKind::StaticLayer,
                source: UnitSource::Layer(node.id.clone()),
                visible: node.visible,
                reference_labeled: node.reference_labeled,
                duration,
            });
            stack_index += 1;
        }
    }

    if units.is_empty() {
        return Err(SakugaError::NoExportableContent);
    }

    tracing::debug!(
        units = units.len(),
        "normalized layer tree into export units"
    );
    Ok(units)
}

fn unique_unit_name(display: &str, used: &mut HashSet<String>) -> String {
    sakuga_core::make_unique_name(&sanitize_name(display), used)
}

fn collect(
    tree: &LayerTree,
    nodes: &[NodeId],
    policy: &ExportPolicy,
    animated: &mut Vec<(NodeId, SourceKind)>,
    statics: &mut Vec<NodeId>,
) {
    for &id in nodes {
        let node = tree.node(id);

        if !policy.include_invisible && !node.visible {
            continue;
        }
        if !policy.include_reference && node.reference_labeled {
            continue;
        }
        if is_light_table(&node.name) {
            continue;
        }

        match node.kind {
            LayerKind::Group => {
                if policy.flatten_animated_groups && tree.has_animated_content(id) {
                    // The whole subtree is consumed by the flattened
                    // composite; no descendants export on their own.
                    animated.push((id, SourceKind::FlattenedGroup));
                } else {
                    collect(tree, &node.children, policy, animated, statics);
                }
            }
            LayerKind::Paint => {
                if node.animated {
                    animated.push((id, SourceKind::AnimatedLayer));
                } else {
                    statics.push(id);
                }
            }
        }
    }
}
