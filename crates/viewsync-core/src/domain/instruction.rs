//! Update instructions: the ordered, path-addressed tree mutations carried by
//! a `patch_batch` message.
//!
//! Every instruction serializes as a JSON object tagged by `"op"`:
//!
//! ```json
//! {"op": "insert", "path": "0", "index": 1, "node": "hello"}
//! {"op": "update_callbacks", "path": "0", "add": ["2.onClick"], "remove": []}
//! ```
//!
//! The last three variants only touch the binding registry.  Their entries
//! are *relative* to `path`, so a root path carries absolute entries.

use serde::{Deserialize, Serialize};

use crate::domain::node::WireNode;
use crate::domain::path::Path;

/// One tree or registry mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Instruction {
    /// Swap the node at `path` wholesale.
    Replace { path: Path, node: WireNode },

    /// Insert `node` into the children of the element at `path`.
    /// `index == len` appends.
    Insert {
        path: Path,
        index: usize,
        node: WireNode,
    },

    /// Delete the child at `index` of the element at `path`.
    Remove { path: Path, index: usize },

    /// Remove the child at `from` and re-insert it at `to`.
    Move { path: Path, from: usize, to: usize },

    /// Change props of the element at `path`.  Removals run before sets.
    UpdateProps {
        path: Path,
        #[serde(default)]
        set: serde_json::Map<String, serde_json::Value>,
        #[serde(default)]
        remove: Vec<String>,
    },

    UpdateCallbacks {
        path: Path,
        #[serde(default)]
        add: Vec<String>,
        #[serde(default)]
        remove: Vec<String>,
    },

    UpdateRenderProps {
        path: Path,
        #[serde(default)]
        add: Vec<String>,
        #[serde(default)]
        remove: Vec<String>,
    },

    UpdateCssRefs {
        path: Path,
        #[serde(default)]
        add: Vec<String>,
        #[serde(default)]
        remove: Vec<String>,
    },
}

impl Instruction {
    /// The path this instruction addresses.
    pub fn path(&self) -> &Path {
        match self {
            Instruction::Replace { path, .. }
            | Instruction::Insert { path, .. }
            | Instruction::Remove { path, .. }
            | Instruction::Move { path, .. }
            | Instruction::UpdateProps { path, .. }
            | Instruction::UpdateCallbacks { path, .. }
            | Instruction::UpdateRenderProps { path, .. }
            | Instruction::UpdateCssRefs { path, .. } => path,
        }
    }

    /// Wire name of the instruction, for logging.
    pub fn op_name(&self) -> &'static str {
        match self {
            Instruction::Replace { .. } => "replace",
            Instruction::Insert { .. } => "insert",
            Instruction::Remove { .. } => "remove",
            Instruction::Move { .. } => "move",
            Instruction::UpdateProps { .. } => "update_props",
            Instruction::UpdateCallbacks { .. } => "update_callbacks",
            Instruction::UpdateRenderProps { .. } => "update_render_props",
            Instruction::UpdateCssRefs { .. } => "update_css_refs",
        }
    }

    /// Returns `true` for the instructions that only mutate the registry.
    pub fn is_registry_delta(&self) -> bool {
        matches!(
            self,
            Instruction::UpdateCallbacks { .. }
                | Instruction::UpdateRenderProps { .. }
                | Instruction::UpdateCssRefs { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_insert_deserializes_from_tagged_object() {
        let ins: Instruction = serde_json::from_value(json!({
            "op": "insert", "path": "0", "index": 1, "node": "hello"
        }))
        .unwrap();

        assert_eq!(
            ins,
            Instruction::Insert {
                path: "0".parse().unwrap(),
                index: 1,
                node: WireNode::Text("hello".into()),
            }
        );
        assert_eq!(ins.op_name(), "insert");
    }

    #[test]
    fn test_update_props_defaults_missing_lists() {
        let ins: Instruction =
            serde_json::from_value(json!({"op": "update_props", "path": ""})).unwrap();

        match ins {
            Instruction::UpdateProps { path, set, remove } => {
                assert!(path.is_root());
                assert!(set.is_empty());
                assert!(remove.is_empty());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_unknown_op_is_rejected() {
        let result = serde_json::from_value::<Instruction>(json!({"op": "teleport", "path": ""}));
        assert!(result.is_err());
    }

    #[test]
    fn test_malformed_path_is_rejected() {
        let result =
            serde_json::from_value::<Instruction>(json!({"op": "remove", "path": "0..", "index": 0}));
        assert!(result.is_err());
    }

    #[test]
    fn test_registry_delta_classification() {
        let delta: Instruction = serde_json::from_value(json!({
            "op": "update_css_refs", "path": "1", "add": ["className"]
        }))
        .unwrap();
        assert!(delta.is_registry_delta());
        assert_eq!(delta.path().to_string(), "1");

        let mv = Instruction::Move { path: Path::root(), from: 0, to: 2 };
        assert!(!mv.is_registry_delta());
    }

    #[test]
    fn test_serializes_with_op_tag() {
        let ins = Instruction::Remove { path: "2".parse().unwrap(), index: 0 };
        assert_eq!(
            serde_json::to_value(&ins).unwrap(),
            json!({"op": "remove", "path": "2", "index": 0})
        );
    }
}
