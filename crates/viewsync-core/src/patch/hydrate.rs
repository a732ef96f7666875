//! Conversion of wire nodes into hydrated nodes, and re-binding of callables
//! after a subtree changes position.

use std::sync::Arc;

use serde_json::Value as Json;

use crate::binding::BindingRegistry;
use crate::domain::callback::CALLBACK_PLACEHOLDER;
use crate::domain::node::{Element, Node, PropValue, Tag, WireNode};
use crate::domain::path::Path;
use crate::patch::{ApplyError, ProtocolError};

/// Hydrates `wire` as the node living at `path`.
///
/// Mount-point tags are checked against the registry's component lookup, and
/// every prop goes through [`hydrate_prop`].
///
/// # Errors
///
/// - [`ProtocolError::InvalidNode`] for an unknown reserved or empty tag.
/// - [`ProtocolError::MalformedNode`] for a render prop that is not a node.
/// - [`crate::binding::MissingRegistryEntry`] for an unknown component key or
///   style token.
pub fn hydrate_node(
    wire: &WireNode,
    path: &Path,
    registry: &mut BindingRegistry,
) -> Result<Arc<Node>, ApplyError> {
    let el = match wire {
        WireNode::Text(text) => return Ok(Arc::new(Node::Text(text.clone()))),
        WireNode::Element(el) => el,
    };

    let tag = Tag::parse_wire(&el.tag).map_err(|source| ProtocolError::InvalidNode {
        path: path.to_string(),
        source,
    })?;
    if let Tag::MountPoint(key) = &tag {
        registry.check_component(key)?;
    }

    let mut element = Element::with_tag(tag);
    element.key = el.key.clone();
    for (key, value) in &el.props {
        let prop = hydrate_prop(path, key, value, registry)?;
        element.props.insert(key.clone(), prop);
    }
    element.children = el
        .children
        .iter()
        .enumerate()
        .map(|(i, child)| hydrate_node(child, &path.child(i), registry))
        .collect::<Result<_, _>>()?;

    Ok(Arc::new(Node::Element(element)))
}

/// Hydrates the value of prop `key` on the element at `path`.
///
/// The first matching rule wins:
///
/// 1. callback slot holding the placeholder: the cached bound callable;
/// 2. render-prop slot: a hydrated sub-tree (`null` stays data);
/// 3. style-token slot holding a string: the resolved class list;
/// 4. anything else: plain data.
pub fn hydrate_prop(
    path: &Path,
    key: &str,
    value: &Json,
    registry: &mut BindingRegistry,
) -> Result<PropValue, ApplyError> {
    let slot = path.slot(key);

    if is_placeholder(value) {
        if let Some(callback) = registry.resolve(path, key) {
            return Ok(PropValue::Callback(callback));
        }
    }

    if registry.is_render_prop_path(&slot) {
        if value.is_null() {
            return Ok(PropValue::Data(Json::Null));
        }
        let wire: WireNode =
            serde_json::from_value(value.clone()).map_err(|e| ProtocolError::MalformedNode {
                path: slot.clone(),
                message: e.to_string(),
            })?;
        let node = hydrate_node(&wire, &path.prop(key), registry)?;
        return Ok(PropValue::Node(node));
    }

    if registry.is_style_token_path(&slot) {
        if let Json::String(tokens) = value {
            return Ok(PropValue::Data(Json::String(registry.resolve_style(tokens)?)));
        }
    }

    Ok(PropValue::Data(value.clone()))
}

/// Re-binds the callables of `node`, which now lives at `path`.
///
/// Subtrees with no callback path at or below their new position are
/// returned as-is, so their identity survives.  Inside a rebuilt element:
///
/// - a callable whose slot is still registered gets a fresh binding;
/// - a callable whose slot is gone becomes the unbound placeholder;
/// - a placeholder whose slot is registered becomes bound.
pub(crate) fn rebind_subtree(
    node: &Arc<Node>,
    path: &Path,
    registry: &mut BindingRegistry,
) -> Arc<Node> {
    let el = match node.as_ref() {
        Node::Element(el) if registry.has_any_under(&path.to_string()) => el,
        _ => return Arc::clone(node),
    };

    let mut copy = el.clone();
    for (key, value) in copy.props.iter_mut() {
        let rebound = match value {
            PropValue::Callback(_) => Some(match registry.rebind(path, key) {
                Some(callback) => PropValue::Callback(callback),
                None => PropValue::Data(Json::String(CALLBACK_PLACEHOLDER.to_string())),
            }),
            PropValue::Data(data) if is_placeholder(data) => {
                registry.rebind(path, key).map(PropValue::Callback)
            }
            PropValue::Node(sub) => Some(PropValue::Node(rebind_subtree(
                sub,
                &path.prop(key),
                registry,
            ))),
            PropValue::Data(_) => None,
        };
        if let Some(rebound) = rebound {
            *value = rebound;
        }
    }
    for (i, child) in copy.children.iter_mut().enumerate() {
        *child = rebind_subtree(child, &path.child(i), registry);
    }

    Arc::new(Node::Element(copy))
}

fn is_placeholder(value: &Json) -> bool {
    value.as_str() == Some(CALLBACK_PLACEHOLDER)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{BindingSeed, MissingRegistryEntry, StyleTable};
    use crate::binding::components::MockComponentLookup;
    use crate::domain::callback::MockCallbackSink;
    use crate::domain::node::NodeError;
    use serde_json::json;

    fn registry(seed: BindingSeed) -> BindingRegistry {
        let mut reg = BindingRegistry::new(Arc::new(MockCallbackSink::new()));
        reg.seed(seed);
        reg
    }

    fn wire(value: Json) -> WireNode {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_placeholder_in_callback_slot_becomes_callable() {
        // Arrange
        let mut reg = registry(BindingSeed {
            callbacks: vec!["onClick".into()],
            ..Default::default()
        });
        let tree = wire(json!({"tag": "button", "props": {"onClick": "$cb"}}));

        // Act
        let node = hydrate_node(&tree, &Path::root(), &mut reg).unwrap();

        // Assert
        let cb = node.as_element().unwrap().prop("onClick").unwrap().as_callback().unwrap();
        assert!(cb.path().is_root());
        assert_eq!(cb.key(), "onClick");
    }

    #[test]
    fn test_placeholder_outside_callback_set_stays_data() {
        let mut reg = registry(BindingSeed::default());
        let tree = wire(json!({"tag": "button", "props": {"onClick": "$cb"}}));

        let node = hydrate_node(&tree, &Path::root(), &mut reg).unwrap();

        assert_eq!(
            node.as_element().unwrap().prop("onClick"),
            Some(&PropValue::Data(json!("$cb")))
        );
    }

    #[test]
    fn test_render_prop_is_hydrated_at_named_path() {
        // Arrange: a callback inside a render prop uses the prop name as a segment
        let mut reg = registry(BindingSeed {
            callbacks: vec!["0.header.onClick".into()],
            render_props: vec!["0.header".into()],
            ..Default::default()
        });
        let tree = wire(json!({"tag": "div", "children": [
            {"tag": "card", "props": {"header": {"tag": "a", "props": {"onClick": "$cb"}}}}
        ]}));

        // Act
        let node = hydrate_node(&tree, &Path::root(), &mut reg).unwrap();

        // Assert
        let card = node.as_element().unwrap().child(0).unwrap().as_element().unwrap();
        let header = card.prop("header").unwrap().as_node().unwrap();
        let cb = header.as_element().unwrap().prop("onClick").unwrap().as_callback().unwrap();
        assert_eq!(cb.path().to_string(), "0.header");
    }

    #[test]
    fn test_null_render_prop_stays_data() {
        let mut reg = registry(BindingSeed {
            render_props: vec!["footer".into()],
            ..Default::default()
        });
        let tree = wire(json!({"tag": "card", "props": {"footer": null}}));

        let node = hydrate_node(&tree, &Path::root(), &mut reg).unwrap();

        assert_eq!(node.as_element().unwrap().prop("footer"), Some(&PropValue::Data(Json::Null)));
    }

    #[test]
    fn test_malformed_render_prop_is_protocol_error() {
        let mut reg = registry(BindingSeed {
            render_props: vec!["footer".into()],
            ..Default::default()
        });
        let tree = wire(json!({"tag": "card", "props": {"footer": 42}}));

        let err = hydrate_node(&tree, &Path::root(), &mut reg).unwrap_err();

        assert!(matches!(
            err,
            ApplyError::Protocol(ProtocolError::MalformedNode { ref path, .. }) if path == "footer"
        ));
    }

    #[test]
    fn test_style_tokens_are_resolved() {
        let mut reg = registry(BindingSeed {
            css_refs: vec!["className".into()],
            ..Default::default()
        })
        .with_styles(StyleTable::new().with("btn", "primary", "btn_primary__9"));
        let tree = wire(json!({"tag": "button", "props": {"className": "btn:primary wide"}}));

        let node = hydrate_node(&tree, &Path::root(), &mut reg).unwrap();

        assert_eq!(
            node.as_element().unwrap().prop("className"),
            Some(&PropValue::Data(json!("btn_primary__9 wide")))
        );
    }

    #[test]
    fn test_unknown_style_module_is_fatal() {
        let mut reg = registry(BindingSeed {
            css_refs: vec!["className".into()],
            ..Default::default()
        });
        let tree = wire(json!({"tag": "p", "props": {"className": "ghost:x"}}));

        let err = hydrate_node(&tree, &Path::root(), &mut reg).unwrap_err();

        assert_eq!(
            err,
            ApplyError::MissingRegistryEntry(MissingRegistryEntry::StyleModule {
                module: "ghost".into()
            })
        );
    }

    #[test]
    fn test_unknown_mount_point_is_missing_entry() {
        let mut lookup = MockComponentLookup::new();
        lookup.expect_has_component().returning(|_| false);
        let mut reg = registry(BindingSeed::default()).with_components(Arc::new(lookup));
        let tree = wire(json!({"tag": "@mount:Chart"}));

        let err = hydrate_node(&tree, &Path::root(), &mut reg).unwrap_err();

        assert_eq!(
            err,
            ApplyError::MissingRegistryEntry(MissingRegistryEntry::Component { key: "Chart".into() })
        );
    }

    #[test]
    fn test_unknown_reserved_tag_is_protocol_error() {
        let mut reg = registry(BindingSeed::default());
        let tree = wire(json!({"tag": "div", "children": [{"tag": "@portal"}]}));

        let err = hydrate_node(&tree, &Path::root(), &mut reg).unwrap_err();

        assert_eq!(
            err,
            ApplyError::Protocol(ProtocolError::InvalidNode {
                path: "0".into(),
                source: NodeError::UnknownReservedTag("@portal".into()),
            })
        );
    }

    #[test]
    fn test_rebind_leaves_subtrees_without_callbacks_identical() {
        // Arrange
        let mut reg = registry(BindingSeed::default());
        let tree = wire(json!({"tag": "ul", "children": [{"tag": "li"}]}));
        let node = hydrate_node(&tree, &Path::root(), &mut reg).unwrap();

        // Act
        let rebound = rebind_subtree(&node, &"3".parse().unwrap(), &mut reg);

        // Assert
        assert!(Arc::ptr_eq(&node, &rebound));
    }

    #[test]
    fn test_rebind_downgrades_unregistered_callable() {
        // Arrange: bound at "0", then moved to "1" where no callback is registered
        let mut reg = registry(BindingSeed {
            callbacks: vec!["0.onClick".into(), "1.other".into()],
            ..Default::default()
        });
        let tree = wire(json!({"tag": "button", "props": {"onClick": "$cb"}}));
        let node = hydrate_node(&tree, &"0".parse().unwrap(), &mut reg).unwrap();

        // Act
        let rebound = rebind_subtree(&node, &"1".parse().unwrap(), &mut reg);

        // Assert
        assert_eq!(
            rebound.as_element().unwrap().prop("onClick"),
            Some(&PropValue::Data(json!("$cb")))
        );
    }
}
