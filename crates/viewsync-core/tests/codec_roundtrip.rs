//! Integration tests for the viewsync-core graph codec.
//!
//! These tests verify complete round-trips through the public API, including
//! the JSON text form, and check that shared and cyclic structure survives.

use viewsync_core::protocol::codec::{decode, decode_from_str, encode, encode_to_string};
use viewsync_core::protocol::value::{Timestamp, Value};

/// Encodes to text and back, asserting structural equality.
fn roundtrip(value: &Value) -> Value {
    let text = encode_to_string(value).expect("encode must succeed");
    let decoded = decode_from_str(&text).expect("decode must succeed");
    assert_eq!(&decoded, value);
    decoded
}

#[test]
fn test_roundtrip_primitives() {
    for value in [
        Value::Null,
        Value::from(true),
        Value::from(0),
        Value::from(-17.25),
        Value::from(""),
        Value::from("unicode ✓"),
        Value::date(Timestamp::from_millis(-86_400_000)),
    ] {
        roundtrip(&value);
    }
}

#[test]
fn test_roundtrip_nested_collections() {
    let value = Value::object([
        ("list", Value::array(vec![Value::from(1), Value::array(vec![Value::from("deep")])])),
        ("set", Value::set([Value::from("a"), Value::from("b")])),
        (
            "map",
            Value::map([
                (Value::from(1), Value::from("number key")),
                (Value::array(vec![]), Value::from("composite key")),
            ]),
        ),
        ("when", Value::date(Timestamp::from_millis(1_700_000_000_123))),
    ]);

    roundtrip(&value);
}

#[test]
fn test_shared_set_of_one_timestamp_stays_shared() {
    // Arrange: {s: Set([d, d]), also: s}
    let d = Value::date(Timestamp::from_millis(1_700_000_000_000));
    let s = Value::set([d.clone(), d.clone()]);
    let root = Value::object([("s", s.clone()), ("also", s)]);

    // Act
    let decoded = roundtrip(&root);

    // Assert
    let s = decoded.get("s").unwrap();
    let also = decoded.get("also").unwrap();
    assert!(s.ptr_eq(&also));
    assert_eq!(s.len(), Some(1));
    match &s {
        Value::Set(items) => assert_eq!(items.borrow()[0], d),
        other => panic!("expected a set, got {other:?}"),
    }
}

#[test]
fn test_self_referencing_object() {
    // Arrange
    let node = Value::object([("name", Value::from("root"))]);
    node.set_field("self", node.clone());

    // Act
    let decoded = roundtrip(&node);

    // Assert
    assert!(decoded.get("self").unwrap().ptr_eq(&decoded));
}

#[test]
fn test_mutual_cycle_through_map_and_array() {
    // Arrange: list -> map -> list
    let list = Value::array(vec![]);
    let map = Value::map([(Value::from("back"), list.clone())]);
    list.push(map.clone());

    // Act
    let decoded = roundtrip(&list);

    // Assert
    let Value::Array(items) = &decoded else {
        panic!("expected an array");
    };
    let inner = items.borrow()[0].clone();
    let Value::Map(entries) = &inner else {
        panic!("expected a map");
    };
    assert!(entries.borrow()[0].1.ptr_eq(&decoded));
}

#[test]
fn test_same_composite_under_distinct_parents() {
    let shared = Value::object([("n", Value::from(1))]);
    let root = Value::array(vec![
        Value::array(vec![shared.clone()]),
        Value::set([shared.clone()]),
        Value::map([(shared.clone(), shared)]),
    ]);

    let decoded = decode(&encode(&root).unwrap()).unwrap();

    let Value::Array(top) = &decoded else {
        panic!("expected an array");
    };
    let top = top.borrow();
    let first = match &top[0] {
        Value::Array(items) => items.borrow()[0].clone(),
        other => panic!("unexpected {other:?}"),
    };
    let in_set = match &top[1] {
        Value::Set(items) => items.borrow()[0].clone(),
        other => panic!("unexpected {other:?}"),
    };
    let (key, value) = match &top[2] {
        Value::Map(entries) => entries.borrow()[0].clone(),
        other => panic!("unexpected {other:?}"),
    };
    assert!(first.ptr_eq(&in_set));
    assert!(first.ptr_eq(&key));
    assert!(first.ptr_eq(&value));
}

#[test]
fn test_equal_but_distinct_composites_stay_distinct() {
    let root = Value::array(vec![Value::array(vec![]), Value::array(vec![])]);

    let decoded = roundtrip(&root);

    let Value::Array(items) = &decoded else {
        panic!("expected an array");
    };
    let items = items.borrow();
    assert!(!items[0].ptr_eq(&items[1]));
}

#[test]
fn test_object_key_order_is_preserved() {
    let root = Value::object([("z", Value::from(1)), ("a", Value::from(2)), ("m", Value::from(3))]);

    let text = encode_to_string(&root).unwrap();

    assert_eq!(text, r#"[[[],[],[],[]],{"z":1,"a":2,"m":3}]"#);
}
