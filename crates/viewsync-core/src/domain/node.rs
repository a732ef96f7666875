//! The synchronized node tree.
//!
//! # Two representations (for beginners)
//!
//! A node exists in two forms:
//!
//! - [`WireNode`] is the JSON shape the server sends.  Its props are raw JSON;
//!   nothing in it says whether a prop is a callable or a nested sub-tree.
//! - [`Node`] is the *hydrated* in-memory form the rendering host consumes.
//!   Its props are [`PropValue`]s: plain data, a render-prop sub-tree, or a
//!   [`BoundCallback`].  Converting a wire node into a `Node` is done by the
//!   patch engine's hydrator, which asks the binding registry how to treat
//!   each prop slot.
//!
//! # Identity
//!
//! Children and render-prop sub-trees are stored behind `Arc`.  Patching
//! produces a new root but reuses every untouched subtree, so two trees can
//! be compared cheaply with [`Arc::ptr_eq`].
//!
//! # Reserved tags
//!
//! Tags starting with [`RESERVED_TAG_PREFIX`] are reserved for fragments
//! (`@fragment`) and mount points (`@mount:<key>`).  Ordinary element
//! construction refuses them.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::callback::{BoundCallback, CALLBACK_PLACEHOLDER};

/// Prefix that marks tags the framework owns.
pub const RESERVED_TAG_PREFIX: char = '@';

/// Wire tag of a fragment element.
pub const FRAGMENT_TAG: &str = "@fragment";

/// Wire tag prefix of a mount-point element; the component key follows it.
pub const MOUNT_TAG_PREFIX: &str = "@mount:";

/// Errors raised while constructing nodes.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NodeError {
    /// An ordinary element was given a reserved tag.
    #[error("tag {0:?} uses the reserved '@' prefix")]
    ReservedTag(String),

    /// A wire tag used the reserved prefix but is neither a fragment nor a mount point.
    #[error("unknown reserved tag {0:?}")]
    UnknownReservedTag(String),

    /// The tag (or mount-point key) is empty.
    #[error("empty tag")]
    EmptyTag,
}

// ── Tags ──────────────────────────────────────────────────────────────────────

/// What kind of element a node is.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    /// A host element such as `div` or `button`.
    Host(String),
    /// A grouping element without a host-visible wrapper.
    Fragment,
    /// A placeholder for an externally registered component.
    MountPoint(String),
}

impl Tag {
    /// Builds a host tag, refusing reserved names.
    pub fn host(name: impl Into<String>) -> Result<Self, NodeError> {
        let name = name.into();
        if name.is_empty() {
            return Err(NodeError::EmptyTag);
        }
        if name.starts_with(RESERVED_TAG_PREFIX) {
            return Err(NodeError::ReservedTag(name));
        }
        Ok(Tag::Host(name))
    }

    /// Parses a tag as it appears on the wire, where reserved forms are allowed.
    pub fn parse_wire(raw: &str) -> Result<Self, NodeError> {
        if raw == FRAGMENT_TAG {
            return Ok(Tag::Fragment);
        }
        if let Some(key) = raw.strip_prefix(MOUNT_TAG_PREFIX) {
            if key.is_empty() {
                return Err(NodeError::EmptyTag);
            }
            return Ok(Tag::MountPoint(key.to_string()));
        }
        if raw.starts_with(RESERVED_TAG_PREFIX) {
            return Err(NodeError::UnknownReservedTag(raw.to_string()));
        }
        Tag::host(raw)
    }

    /// The wire form of this tag.
    pub fn as_wire(&self) -> Cow<'_, str> {
        match self {
            Tag::Host(name) => Cow::Borrowed(name),
            Tag::Fragment => Cow::Borrowed(FRAGMENT_TAG),
            Tag::MountPoint(key) => Cow::Owned(format!("{MOUNT_TAG_PREFIX}{key}")),
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_wire())
    }
}

// ── Props ─────────────────────────────────────────────────────────────────────

/// The value of one element prop after hydration.
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    /// Plain JSON data, passed to the host unchanged.
    Data(serde_json::Value),
    /// A render-prop sub-tree.
    Node(Arc<Node>),
    /// A bound callable.
    Callback(BoundCallback),
}

impl PropValue {
    pub fn as_data(&self) -> Option<&serde_json::Value> {
        match self {
            PropValue::Data(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&Arc<Node>> {
        match self {
            PropValue::Node(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_callback(&self) -> Option<&BoundCallback> {
        match self {
            PropValue::Callback(cb) => Some(cb),
            _ => None,
        }
    }

    /// The JSON this prop would be sent as.
    pub fn to_wire_value(&self) -> serde_json::Value {
        match self {
            PropValue::Data(v) => v.clone(),
            PropValue::Node(n) => n.to_wire().to_json(),
            PropValue::Callback(_) => serde_json::Value::String(CALLBACK_PLACEHOLDER.to_string()),
        }
    }
}

impl From<serde_json::Value> for PropValue {
    fn from(value: serde_json::Value) -> Self {
        PropValue::Data(value)
    }
}

// ── Nodes ─────────────────────────────────────────────────────────────────────

/// A hydrated element.
///
/// Fields are crate-private so that the reserved-tag invariant can only be
/// bypassed by the hydrator, which parses wire tags explicitly.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub(crate) tag: Tag,
    pub(crate) props: BTreeMap<String, PropValue>,
    pub(crate) children: Vec<Arc<Node>>,
    pub(crate) key: Option<String>,
}

impl Element {
    /// Creates a host element.
    ///
    /// # Errors
    ///
    /// Returns [`NodeError::ReservedTag`] for tags starting with `@`, and
    /// [`NodeError::EmptyTag`] for an empty tag.
    ///
    /// # Example
    ///
    /// ```rust
    /// use viewsync_core::domain::node::{Element, NodeError};
    ///
    /// assert!(Element::new("div").is_ok());
    /// assert_eq!(
    ///     Element::new("@fragment").unwrap_err(),
    ///     NodeError::ReservedTag("@fragment".into())
    /// );
    /// ```
    pub fn new(tag: impl Into<String>) -> Result<Self, NodeError> {
        Ok(Self::with_tag(Tag::host(tag)?))
    }

    /// Creates a fragment element.
    pub fn fragment() -> Self {
        Self::with_tag(Tag::Fragment)
    }

    /// Creates a mount point for the component registered under `key`.
    pub fn mount_point(key: impl Into<String>) -> Result<Self, NodeError> {
        let key = key.into();
        if key.is_empty() {
            return Err(NodeError::EmptyTag);
        }
        Ok(Self::with_tag(Tag::MountPoint(key)))
    }

    pub(crate) fn with_tag(tag: Tag) -> Self {
        Self {
            tag,
            props: BTreeMap::new(),
            children: Vec::new(),
            key: None,
        }
    }

    pub fn with_prop(mut self, name: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.props.insert(name.into(), value.into());
        self
    }

    pub fn with_child(mut self, child: impl Into<Arc<Node>>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn tag(&self) -> &Tag {
        &self.tag
    }

    pub fn props(&self) -> &BTreeMap<String, PropValue> {
        &self.props
    }

    pub fn prop(&self, name: &str) -> Option<&PropValue> {
        self.props.get(name)
    }

    pub fn children(&self) -> &[Arc<Node>] {
        &self.children
    }

    pub fn child(&self, index: usize) -> Option<&Arc<Node>> {
        self.children.get(index)
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn is_fragment(&self) -> bool {
        self.tag == Tag::Fragment
    }

    pub fn is_mount_point(&self) -> bool {
        matches!(self.tag, Tag::MountPoint(_))
    }
}

/// A node of the synchronized tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    Element(Element),
}

impl Node {
    pub fn text(content: impl Into<String>) -> Self {
        Node::Text(content.into())
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Node::Text(t) => Some(t),
            Node::Element(_) => None,
        }
    }

    /// Short description used in log and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Text(_) => "text",
            Node::Element(el) => match el.tag {
                Tag::Host(_) => "element",
                Tag::Fragment => "fragment",
                Tag::MountPoint(_) => "mount point",
            },
        }
    }

    /// Converts back to the wire shape.
    ///
    /// Callables become the placeholder literal; style tokens stay resolved.
    pub fn to_wire(&self) -> WireNode {
        match self {
            Node::Text(t) => WireNode::Text(t.clone()),
            Node::Element(el) => WireNode::Element(WireElement {
                tag: el.tag.as_wire().into_owned(),
                props: el
                    .props
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_wire_value()))
                    .collect(),
                children: el.children.iter().map(|c| c.to_wire()).collect(),
                key: el.key.clone(),
            }),
        }
    }
}

impl From<Element> for Node {
    fn from(el: Element) -> Self {
        Node::Element(el)
    }
}

impl From<Element> for Arc<Node> {
    fn from(el: Element) -> Self {
        Arc::new(Node::Element(el))
    }
}

// ── Wire form ─────────────────────────────────────────────────────────────────

/// An element as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireElement {
    pub tag: String,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub props: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<WireNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

/// A node as it appears on the wire: a bare JSON string for text, an object
/// for elements.
///
/// ```json
/// {"tag": "div", "props": {"id": "root"}, "children": ["B"]}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireNode {
    Text(String),
    Element(WireElement),
}

impl WireNode {
    /// Builds the JSON value for this node without going through serde.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            WireNode::Text(t) => serde_json::Value::String(t.clone()),
            WireNode::Element(el) => {
                let mut obj = serde_json::Map::new();
                obj.insert("tag".into(), serde_json::Value::String(el.tag.clone()));
                if !el.props.is_empty() {
                    obj.insert("props".into(), serde_json::Value::Object(el.props.clone()));
                }
                if !el.children.is_empty() {
                    obj.insert(
                        "children".into(),
                        serde_json::Value::Array(el.children.iter().map(WireNode::to_json).collect()),
                    );
                }
                if let Some(key) = &el.key {
                    obj.insert("key".into(), serde_json::Value::String(key.clone()));
                }
                serde_json::Value::Object(obj)
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
