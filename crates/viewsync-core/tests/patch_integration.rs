//! Integration tests for the viewsync-core patch engine.
//!
//! These tests drive the public API the way a client session does: parse
//! server messages, build a `ViewTree` from the snapshot, apply patch batches,
//! and invoke the callables the tree ends up holding.

use std::sync::{Arc, Mutex};

use serde_json::{json, Value as Json};
use viewsync_core::{
    apply_batch, BindingRegistry, BindingSeed, CallbackInvocation, CallbackSink, Instruction,
    Node, PropValue, ServerMessage, TreeSnapshot, ViewTree,
};

/// Records every invocation it receives.
#[derive(Default)]
struct RecordingSink {
    calls: Mutex<Vec<CallbackInvocation>>,
}

impl CallbackSink for RecordingSink {
    fn invoke(&self, invocation: CallbackInvocation) -> Result<(), String> {
        self.calls
            .lock()
            .map_err(|e| e.to_string())?
            .push(invocation);
        Ok(())
    }
}

fn snapshot(value: Json) -> TreeSnapshot {
    serde_json::from_value(value).expect("snapshot fixture must parse")
}

fn batch(value: Json) -> Vec<Instruction> {
    serde_json::from_value(value).expect("batch fixture must parse")
}

fn view(value: Json, sink: Arc<RecordingSink>) -> ViewTree {
    ViewTree::from_snapshot(&snapshot(value), BindingRegistry::new(sink)).expect("snapshot must hydrate")
}

fn child(node: &Arc<Node>, index: usize) -> &Arc<Node> {
    &node.as_element().expect("element").children()[index]
}

fn callback_path(node: &Arc<Node>, key: &str) -> String {
    node.as_element()
        .and_then(|el| el.prop(key))
        .and_then(PropValue::as_callback)
        .map(|cb| cb.path().to_string())
        .expect("bound callable")
}

#[test]
fn test_replace_root_with_new_element() {
    // Arrange: {div:[{span:["A"]}]}
    let mut tree = view(
        json!({"tree": {"tag": "div", "children": [{"tag": "span", "children": ["A"]}]}}),
        Arc::default(),
    );

    // Act
    let root = tree
        .apply(&batch(json!([{"op": "replace", "path": "",
            "node": {"tag": "div", "props": {"id": "root"}, "children": ["B"]}}])))
        .unwrap();

    // Assert
    let el = root.as_element().unwrap();
    assert_eq!(el.tag().to_string(), "div");
    assert_eq!(el.prop("id").and_then(PropValue::as_data), Some(&json!("root")));
    assert_eq!(el.children().len(), 1);
    assert_eq!(el.children()[0].as_text(), Some("B"));
}

#[test]
fn test_invoking_resolved_callable_forwards_path_key_and_args() {
    // Arrange
    let sink = Arc::new(RecordingSink::default());
    let tree = view(
        json!({"tree": {"tag": "button", "props": {"onClick": "$cb"}}, "callbacks": ["onClick"]}),
        Arc::clone(&sink),
    );

    // Act
    let cb = tree.root().as_element().unwrap().prop("onClick").unwrap().as_callback().unwrap();
    cb.call(vec![json!("value")]).unwrap();

    // Assert
    let calls = sink.calls.lock().unwrap();
    assert_eq!(
        *calls,
        vec![CallbackInvocation {
            path: String::new(),
            key: "onClick".into(),
            args: vec![json!("value")],
        }]
    );
}

#[test]
fn test_incremental_batch_equals_replacing_with_final_tree() {
    // Arrange
    let initial = json!({"tag": "ul", "children": [
        {"tag": "li", "children": ["a"]},
        {"tag": "li", "children": ["b"]},
        {"tag": "li", "children": ["c"]}
    ]});
    let final_tree = json!({"tag": "ul", "props": {"class": "done"}, "children": [
        {"tag": "li", "children": ["c"]},
        {"tag": "li", "props": {"title": "x"}, "children": ["a"]},
        {"tag": "li", "children": ["d"]}
    ]});
    let mut incremental = view(json!({"tree": initial}), Arc::default());
    let mut wholesale = view(json!({"tree": initial}), Arc::default());

    // Act
    incremental
        .apply(&batch(json!([
            {"op": "remove", "path": "", "index": 1},
            {"op": "move", "path": "", "from": 1, "to": 0},
            {"op": "insert", "path": "", "index": 2, "node": {"tag": "li", "children": ["d"]}},
            {"op": "update_props", "path": "1", "set": {"title": "x"}},
            {"op": "update_props", "path": "", "set": {"class": "done"}}
        ])))
        .unwrap();
    wholesale
        .apply(&batch(json!([{"op": "replace", "path": "", "node": final_tree}])))
        .unwrap();

    // Assert
    assert_eq!(incremental.root(), wholesale.root());
    assert_eq!(incremental.root().to_wire(), wholesale.root().to_wire());
}

/// Every bound callable in the tree as `(path, key)`, props before children.
fn bindings(node: &Arc<Node>, out: &mut Vec<(String, String)>) {
    let Some(el) = node.as_element() else {
        return;
    };
    for value in el.props().values() {
        match value {
            PropValue::Callback(cb) => out.push((cb.path().to_string(), cb.key().to_string())),
            PropValue::Node(sub) => bindings(sub, out),
            PropValue::Data(_) => {}
        }
    }
    for child in el.children() {
        bindings(child, out);
    }
}

/// A list row whose button carries a callback at `<row>.0.onClick`.
fn row(label: &str) -> Json {
    json!({"tag": "li", "children": [{"tag": "button", "props": {"onClick": "$cb"}}, label]})
}

/// A list row whose `body` render prop holds a button with a callback.
fn panel(label: &str) -> Json {
    json!({"tag": "li", "props": {"body": {"tag": "button", "props": {"onClick": "$cb"}, "children": [label]}}})
}

struct EquivalenceCase {
    name: &'static str,
    snapshot: Json,
    batch: Json,
    final_tree: Json,
}

fn equivalence_cases() -> Vec<EquivalenceCase> {
    vec![
        EquivalenceCase {
            name: "insert shifts bound rows up",
            snapshot: json!({"tree": {"tag": "ul", "children": [row("a"), row("b")]},
                "callbacks": ["0.0.onClick", "1.0.onClick"]}),
            batch: json!([
                {"op": "update_callbacks", "path": "", "remove": ["0.0.onClick"], "add": ["2.0.onClick"]},
                {"op": "insert", "path": "", "index": 0, "node": {"tag": "li", "children": ["new"]}}
            ]),
            final_tree: json!({"tag": "ul", "children": [{"tag": "li", "children": ["new"]}, row("a"), row("b")]}),
        },
        EquivalenceCase {
            name: "remove shifts bound rows down",
            snapshot: json!({"tree": {"tag": "ul", "children": [{"tag": "li", "children": ["x"]}, row("a"), row("b")]},
                "callbacks": ["1.0.onClick", "2.0.onClick"]}),
            batch: json!([
                {"op": "update_callbacks", "path": "", "remove": ["2.0.onClick"], "add": ["0.0.onClick"]},
                {"op": "remove", "path": "", "index": 0}
            ]),
            final_tree: json!({"tag": "ul", "children": [row("a"), row("b")]}),
        },
        EquivalenceCase {
            name: "move rotates every bound row",
            snapshot: json!({"tree": {"tag": "ul", "children": [row("a"), row("b"), row("c")]},
                "callbacks": ["0.0.onClick", "1.0.onClick", "2.0.onClick"]}),
            batch: json!([{"op": "move", "path": "", "from": 0, "to": 2}]),
            final_tree: json!({"tag": "ul", "children": [row("b"), row("c"), row("a")]}),
        },
        EquivalenceCase {
            name: "move carries the only bound row past plain rows",
            snapshot: json!({"tree": {"tag": "ul", "children": [
                row("a"), {"tag": "li", "children": ["b"]}, {"tag": "li", "children": ["c"]}
            ]}, "callbacks": ["0.0.onClick"]}),
            batch: json!([
                {"op": "update_callbacks", "path": "", "remove": ["0.0.onClick"], "add": ["2.0.onClick"]},
                {"op": "move", "path": "", "from": 0, "to": 2}
            ]),
            final_tree: json!({"tag": "ul", "children": [
                {"tag": "li", "children": ["b"]}, {"tag": "li", "children": ["c"]}, row("a")
            ]}),
        },
        EquivalenceCase {
            name: "insert below a nested path with relative deltas",
            snapshot: json!({"tree": {"tag": "div", "children": [{"tag": "ul", "children": [row("a")]}]},
                "callbacks": ["0.0.0.onClick"]}),
            batch: json!([
                {"op": "update_callbacks", "path": "0", "remove": ["0.0.onClick"], "add": ["1.0.onClick"]},
                {"op": "insert", "path": "0", "index": 0, "node": {"tag": "li", "children": ["first"]}}
            ]),
            final_tree: json!({"tag": "div", "children": [
                {"tag": "ul", "children": [{"tag": "li", "children": ["first"]}, row("a")]}
            ]}),
        },
        EquivalenceCase {
            name: "move rows whose render props hold callbacks",
            snapshot: json!({"tree": {"tag": "ul", "children": [panel("a"), panel("b")]},
                "render_props": ["0.body", "1.body"],
                "callbacks": ["0.body.onClick", "1.body.onClick"]}),
            batch: json!([{"op": "move", "path": "", "from": 1, "to": 0}]),
            final_tree: json!({"tag": "ul", "children": [panel("b"), panel("a")]}),
        },
        EquivalenceCase {
            name: "replace and update_props under a render-prop segment",
            snapshot: json!({"tree": {"tag": "card", "props": {"header": {"tag": "h1", "children": ["old"]}}},
                "render_props": ["header"]}),
            batch: json!([
                {"op": "update_callbacks", "path": "", "add": ["header.0.onClick"]},
                {"op": "replace", "path": "header.0",
                    "node": {"tag": "button", "props": {"onClick": "$cb"}, "children": ["go"]}},
                {"op": "update_props", "path": "header", "set": {"class": "title"}}
            ]),
            final_tree: json!({"tag": "card", "props": {"header": {"tag": "h1", "props": {"class": "title"},
                "children": [{"tag": "button", "props": {"onClick": "$cb"}, "children": ["go"]}]}}}),
        },
    ]
}

#[test]
fn test_incremental_batches_equal_wholesale_replace_including_bindings() {
    for case in equivalence_cases() {
        // Arrange: the wholesale side replays the registry deltas, then swaps
        // the whole tree
        let incremental_batch = batch(case.batch);
        let mut wholesale_batch: Vec<Instruction> = incremental_batch
            .iter()
            .filter(|i| i.is_registry_delta())
            .cloned()
            .collect();
        wholesale_batch.extend(batch(json!([{"op": "replace", "path": "", "node": case.final_tree}])));
        let mut incremental = view(case.snapshot.clone(), Arc::default());
        let mut wholesale = view(case.snapshot, Arc::default());

        // Act
        incremental.apply(&incremental_batch).unwrap();
        wholesale.apply(&wholesale_batch).unwrap();

        // Assert
        assert_eq!(
            incremental.root().to_wire(),
            wholesale.root().to_wire(),
            "wire form differs: {}",
            case.name
        );
        let (mut got, mut want) = (Vec::new(), Vec::new());
        bindings(incremental.root(), &mut got);
        bindings(wholesale.root(), &mut want);
        assert!(!want.is_empty(), "case binds nothing: {}", case.name);
        assert_eq!(got, want, "bound callables differ: {}", case.name);
        assert_eq!(incremental.root(), wholesale.root(), "hydrated trees differ: {}", case.name);
    }
}

#[test]
fn test_move_changes_callable_identity_only_inside_range() {
    // Arrange: five rows with a callback each
    let row = json!({"tag": "li", "children": [{"tag": "button", "props": {"onClick": "$cb"}}]});
    let callbacks: Vec<String> = (0..5).map(|i| format!("{i}.0.onClick")).collect();
    let mut tree = view(
        json!({"tree": {"tag": "ul", "children": [row, row, row, row, row]}, "callbacks": callbacks}),
        Arc::default(),
    );
    let before = Arc::clone(tree.root());

    // Act: move row 3 to position 1
    let after = Arc::clone(
        tree.apply(&batch(json!([{"op": "move", "path": "", "from": 3, "to": 1}])))
            .unwrap(),
    );

    // Assert
    for index in [0, 4] {
        assert!(Arc::ptr_eq(child(&before, index), child(&after, index)));
    }
    for index in 1..=3 {
        let button = child(child(&after, index), 0);
        assert_eq!(callback_path(button, "onClick"), format!("{index}.0"));
    }
}

#[test]
fn test_callback_added_by_delta_binds_on_next_update() {
    // Arrange
    let sink = Arc::new(RecordingSink::default());
    let mut tree = view(
        json!({"tree": {"tag": "div", "children": [{"tag": "input"}]}}),
        Arc::clone(&sink),
    );

    // Act
    let root = tree
        .apply(&batch(json!([
            {"op": "update_callbacks", "path": "0", "add": ["onInput"]},
            {"op": "update_props", "path": "0", "set": {"onInput": "$cb"}}
        ])))
        .unwrap();
    let input = child(root, 0);
    input
        .as_element()
        .unwrap()
        .prop("onInput")
        .unwrap()
        .as_callback()
        .unwrap()
        .call(vec![json!("hello")])
        .unwrap();

    // Assert
    let calls = sink.calls.lock().unwrap();
    assert_eq!(calls[0].path, "0");
    assert_eq!(calls[0].key, "onInput");
}

#[test]
fn test_move_keeps_subtrees_without_callback_paths_identical() {
    // Arrange
    let mut tree = view(
        json!({"tree": {"tag": "div", "children": [
            {"tag": "a", "props": {"onClick": "$cb"}},
            {"tag": "b", "props": {"onClick": "$cb"}}
        ]}, "callbacks": ["0.onClick", "1.onClick"]}),
        Arc::default(),
    );
    let before = Arc::clone(tree.root());
    assert!(tree.registry().is_cached("1.onClick"));

    // Act: server drops the callback of the second slot, then swaps the two
    let root = Arc::clone(
        tree.apply(&batch(json!([
            {"op": "update_callbacks", "path": "", "remove": ["1.onClick"]},
            {"op": "move", "path": "", "from": 0, "to": 1}
        ])))
        .unwrap(),
    );

    // Assert: the cache was pruned, the element now at 0 is rebound, and
    // nothing is registered under 1 so that subtree is shared as-is
    assert!(!tree.registry().is_cached("1.onClick"));
    assert_eq!(callback_path(child(&root, 0), "onClick"), "0");
    assert!(Arc::ptr_eq(child(&before, 0), child(&root, 1)));
}

#[test]
fn test_patch_inside_render_prop() {
    // Arrange
    let mut tree = view(
        json!({"tree": {"tag": "card", "props": {"header": {"tag": "h1", "children": ["old"]}}},
               "render_props": ["header"]}),
        Arc::default(),
    );

    // Act
    let root = tree
        .apply(&batch(json!([{"op": "replace", "path": "header.0", "node": "new"}])))
        .unwrap();

    // Assert
    let header = root.as_element().unwrap().prop("header").unwrap().as_node().unwrap();
    assert_eq!(child(header, 0).as_text(), Some("new"));
}

#[test]
fn test_failed_batch_is_not_committed() {
    // Arrange
    let mut tree = view(json!({"tree": {"tag": "ul"}}), Arc::default());
    let before = Arc::clone(tree.root());

    // Act
    let result = tree.apply(&batch(json!([
        {"op": "insert", "path": "", "index": 0, "node": "a"},
        {"op": "update_props", "path": "5", "set": {}}
    ])));

    // Assert
    assert!(result.is_err());
    assert!(Arc::ptr_eq(&before, tree.root()));
}

#[test]
fn test_server_messages_drive_view_tree() {
    // Arrange
    let init: ServerMessage = serde_json::from_str(
        r#"{"type":"tree_init","tree":{"tag":"p","children":["hi"]}}"#,
    )
    .unwrap();
    let patch: ServerMessage = serde_json::from_str(
        r#"{"type":"patch_batch","instructions":[{"op":"insert","path":"","index":1,"node":"!"}]}"#,
    )
    .unwrap();
    let (ServerMessage::TreeInit(snapshot), ServerMessage::PatchBatch { instructions }) = (init, patch) else {
        panic!("unexpected message kinds");
    };
    let mut tree =
        ViewTree::from_snapshot(&snapshot, BindingRegistry::new(Arc::new(RecordingSink::default()))).unwrap();

    // Act
    let out = tree.apply(&instructions).unwrap();

    // Assert
    assert_eq!(out.to_wire().to_json(), json!({"tag": "p", "children": ["hi", "!"]}));
}

#[test]
fn test_apply_batch_leaves_input_root_untouched() {
    // Arrange
    let tree = view(json!({"tree": {"tag": "ol", "children": ["x"]}}), Arc::default());
    let mut registry = BindingRegistry::new(Arc::new(RecordingSink::default()));
    registry.seed(BindingSeed::default());

    // Act
    let out = apply_batch(
        tree.root(),
        &batch(json!([{"op": "remove", "path": "", "index": 0}])),
        &mut registry,
    )
    .unwrap();

    // Assert
    assert_eq!(tree.root().as_element().unwrap().children().len(), 1);
    assert!(out.as_element().unwrap().children().is_empty());
}
