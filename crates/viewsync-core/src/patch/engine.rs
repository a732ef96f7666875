//! Ordered application of update instructions.

use std::ops::Range;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::binding::{BindingKind, BindingRegistry};
use crate::domain::instruction::Instruction;
use crate::domain::node::{Element, Node, PropValue};
use crate::domain::path::{Path, Segment};
use crate::patch::hydrate::{hydrate_node, hydrate_prop, rebind_subtree};
use crate::patch::{ApplyError, ProtocolError};
use crate::protocol::messages::TreeSnapshot;

/// Applies `instructions` to `root` in order and returns the new root.
///
/// Each instruction sees the result of every earlier one.  `root` itself is
/// never modified; on error the caller still holds the previous tree.
/// Registry deltas that ran before a failing instruction stay applied.
///
/// # Errors
///
/// Returns the first [`ApplyError`] raised by any instruction.
pub fn apply_batch(
    root: &Arc<Node>,
    instructions: &[Instruction],
    registry: &mut BindingRegistry,
) -> Result<Arc<Node>, ApplyError> {
    let mut current = Arc::clone(root);
    for (i, instruction) in instructions.iter().enumerate() {
        current = apply_one(&current, instruction, registry).map_err(|e| {
            warn!(
                index = i,
                op = instruction.op_name(),
                path = %instruction.path(),
                error = %e,
                "patch instruction failed"
            );
            e
        })?;
    }
    debug!(count = instructions.len(), "patch batch applied");
    Ok(current)
}

fn apply_one(
    root: &Arc<Node>,
    instruction: &Instruction,
    registry: &mut BindingRegistry,
) -> Result<Arc<Node>, ApplyError> {
    match instruction {
        Instruction::Replace { path, node } => {
            rewrite(root, path, 0, |_| hydrate_node(node, path, registry))
        }

        Instruction::Insert { path, index, node } => rewrite(root, path, 0, |target| {
            let el = element_at(target, path)?;
            let index = *index;
            if index > el.children.len() {
                return Err(out_of_range(path, index, el.children.len()));
            }
            let child = hydrate_node(node, &path.child(index), registry)?;
            let mut copy = el.clone();
            copy.children.insert(index, child);
            let shifted = index + 1..copy.children.len();
            rebind_children(&mut copy, path, shifted, registry);
            Ok(Arc::new(Node::Element(copy)))
        }),

        Instruction::Remove { path, index } => rewrite(root, path, 0, |target| {
            let el = element_at(target, path)?;
            let index = *index;
            if index >= el.children.len() {
                return Err(out_of_range(path, index, el.children.len()));
            }
            let mut copy = el.clone();
            copy.children.remove(index);
            let shifted = index..copy.children.len();
            rebind_children(&mut copy, path, shifted, registry);
            Ok(Arc::new(Node::Element(copy)))
        }),

        Instruction::Move { path, from, to } => rewrite(root, path, 0, |target| {
            let el = element_at(target, path)?;
            let (from, to) = (*from, *to);
            let len = el.children.len();
            if from >= len {
                return Err(out_of_range(path, from, len));
            }
            if to >= len {
                return Err(out_of_range(path, to, len));
            }
            if from == to {
                return Ok(Arc::clone(target));
            }
            let mut copy = el.clone();
            let child = copy.children.remove(from);
            copy.children.insert(to, child);
            rebind_children(&mut copy, path, from.min(to)..from.max(to) + 1, registry);
            Ok(Arc::new(Node::Element(copy)))
        }),

        Instruction::UpdateProps { path, set, remove } => rewrite(root, path, 0, |target| {
            let mut copy = element_at(target, path)?.clone();
            for key in remove {
                copy.props.remove(key);
            }
            for (key, value) in set {
                let prop = hydrate_prop(path, key, value, registry)?;
                copy.props.insert(key.clone(), prop);
            }
            Ok(Arc::new(Node::Element(copy)))
        }),

        Instruction::UpdateCallbacks { path, add, remove } => {
            registry.apply_delta(BindingKind::Callbacks, path, add, remove);
            Ok(Arc::clone(root))
        }
        Instruction::UpdateRenderProps { path, add, remove } => {
            registry.apply_delta(BindingKind::RenderProps, path, add, remove);
            Ok(Arc::clone(root))
        }
        Instruction::UpdateCssRefs { path, add, remove } => {
            registry.apply_delta(BindingKind::CssRefs, path, add, remove);
            Ok(Arc::clone(root))
        }
    }
}

/// Rebuilds the ancestors of `path[depth..]` around the node produced by
/// `edit`.
///
/// Only the elements on the root-to-target path are copied, and those copies
/// are shallow: every other child keeps its `Arc`.
fn rewrite<F>(node: &Arc<Node>, path: &Path, depth: usize, edit: F) -> Result<Arc<Node>, ApplyError>
where
    F: FnOnce(&Arc<Node>) -> Result<Arc<Node>, ApplyError>,
{
    let Some(segment) = path.segments().get(depth) else {
        return edit(node);
    };
    let here = path.prefix(depth);
    let el = element_at(node, &here)?;

    let mut copy = el.clone();
    match segment {
        Segment::Index(index) => {
            let child = el
                .children
                .get(*index)
                .ok_or_else(|| out_of_range(&here, *index, el.children.len()))?;
            copy.children[*index] = rewrite(child, path, depth + 1, edit)?;
        }
        Segment::Key(key) => {
            let sub = el.props.get(key).and_then(|p| p.as_node()).ok_or_else(|| {
                ProtocolError::NotARenderProp {
                    path: here.to_string(),
                    key: key.clone(),
                }
            })?;
            let replaced = rewrite(sub, path, depth + 1, edit)?;
            copy.props.insert(key.clone(), PropValue::Node(replaced));
        }
    }
    Ok(Arc::new(Node::Element(copy)))
}

fn rebind_children(
    el: &mut Element,
    path: &Path,
    range: Range<usize>,
    registry: &mut BindingRegistry,
) {
    for index in range {
        let child_path = path.child(index);
        let rebound = rebind_subtree(&el.children[index], &child_path, registry);
        el.children[index] = rebound;
    }
}

fn element_at<'a>(node: &'a Arc<Node>, path: &Path) -> Result<&'a Element, ProtocolError> {
    node.as_element().ok_or_else(|| ProtocolError::NotAnElement {
        path: path.to_string(),
    })
}

fn out_of_range(path: &Path, index: usize, len: usize) -> ApplyError {
    ProtocolError::IndexOutOfRange {
        path: path.to_string(),
        index,
        len,
    }
    .into()
}

// ── ViewTree ──────────────────────────────────────────────────────────────────

/// The tree of one mounted view together with its binding registry.
///
/// A batch is committed only when every instruction in it succeeds, so a
/// caller never observes a partially applied batch.
#[derive(Debug)]
pub struct ViewTree {
    root: Arc<Node>,
    registry: BindingRegistry,
}

impl ViewTree {
    /// Seeds `registry` from the snapshot and hydrates the initial tree.
    pub fn from_snapshot(
        snapshot: &TreeSnapshot,
        mut registry: BindingRegistry,
    ) -> Result<Self, ApplyError> {
        registry.seed(snapshot.seed());
        let root = hydrate_node(&snapshot.tree, &Path::root(), &mut registry)?;
        debug!(root = root.kind(), "view tree initialized");
        Ok(Self { root, registry })
    }

    /// Applies a batch and commits the result.
    pub fn apply(&mut self, instructions: &[Instruction]) -> Result<&Arc<Node>, ApplyError> {
        self.root = apply_batch(&self.root, instructions, &mut self.registry)?;
        Ok(&self.root)
    }

    pub fn root(&self) -> &Arc<Node> {
        &self.root
    }

    pub fn registry(&self) -> &BindingRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut BindingRegistry {
        &mut self.registry
    }

    /// Gives the registry back, for example to seed it with a new snapshot.
    pub fn into_registry(self) -> BindingRegistry {
        self.registry
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
