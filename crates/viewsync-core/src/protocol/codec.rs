//! Graph wire codec.
//!
//! Wire format (JSON):
//! ```text
//! [[refs, dates, sets, maps], tree]
//! ```
//!
//! # How the index-keyed encoding works (for beginners)
//!
//! The encoder walks the graph depth-first (array items in order, object
//! fields in insertion order, map entries as key then value) and gives every
//! value it visits the next number from a single counter, *including* plain
//! numbers, strings, and booleans.  The tree itself is ordinary JSON:
//!
//! - a timestamp is written as integer milliseconds and its index goes into
//!   `dates`;
//! - a set is written as an array and its index goes into `sets`;
//! - a map is written as an array of `[key, value]` pairs and its index goes
//!   into `maps` (the pair arrays are scaffolding and get no index);
//! - a composite seen a second time is written as the *index it was first
//!   given*, and the index of this occurrence goes into `refs`.
//!
//! The decoder walks the tree in the same order with the same counter, so at
//! every value it knows its index and can look it up in the four lists.  That
//! is also why scalars must consume indices: a back-reference is written as a
//! plain number, and only its index in `refs` tells the two apart.
//!
//! Composites are registered *before* their children are decoded, so a child
//! may refer back to any ancestor.  Cycles decode into cycles.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use thiserror::Error;

use crate::protocol::value::{Timestamp, Value};

/// Largest integer an `f64` represents exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Errors raised by [`encode`] and [`decode`].
#[derive(Debug, Error)]
pub enum SerializationError {
    /// The graph contains a kind that cannot cross the wire.
    #[error("cannot serialize {kind} at {path:?}")]
    Unsupported { kind: &'static str, path: String },

    /// NaN and the infinities have no JSON form.
    #[error("cannot serialize non-finite number at {path:?}")]
    NonFiniteNumber { path: String },

    /// The payload does not describe a valid graph.
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// The payload text is not valid JSON of the expected shape.
    #[error("invalid payload JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Indices of the values that need more than their plain JSON reading.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KindLists {
    pub refs: Vec<usize>,
    pub dates: Vec<usize>,
    pub sets: Vec<usize>,
    pub maps: Vec<usize>,
}

/// An encoded graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "PayloadRepr", into = "PayloadRepr")]
pub struct Payload {
    pub kinds: KindLists,
    pub data: Json,
}

#[derive(Serialize, Deserialize)]
struct PayloadRepr(
    (Vec<usize>, Vec<usize>, Vec<usize>, Vec<usize>),
    Json,
);

impl From<PayloadRepr> for Payload {
    fn from(PayloadRepr((refs, dates, sets, maps), data): PayloadRepr) -> Self {
        Payload {
            kinds: KindLists {
                refs,
                dates,
                sets,
                maps,
            },
            data,
        }
    }
}

impl From<Payload> for PayloadRepr {
    fn from(p: Payload) -> Self {
        let k = p.kinds;
        PayloadRepr((k.refs, k.dates, k.sets, k.maps), p.data)
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes a value graph.
///
/// # Errors
///
/// - [`SerializationError::Unsupported`] when a function or symbol is reachable.
/// - [`SerializationError::NonFiniteNumber`] for NaN or an infinity.
///
/// Both name the dot-joined path of the offending value.
///
/// # Examples
///
/// ```rust
/// use viewsync_core::protocol::codec::{decode, encode};
/// use viewsync_core::protocol::value::Value;
///
/// let shared = Value::array(vec![Value::from(1)]);
/// let root = Value::object([("a", shared.clone()), ("b", shared)]);
///
/// let payload = encode(&root).unwrap();
/// let back = decode(&payload).unwrap();
///
/// assert_eq!(back, root);
/// assert!(back.get("a").unwrap().ptr_eq(&back.get("b").unwrap()));
/// ```
pub fn encode(value: &Value) -> Result<Payload, SerializationError> {
    let mut encoder = Encoder::default();
    let mut path = Vec::new();
    let data = encoder.encode_value(value, &mut path)?;
    Ok(Payload {
        kinds: encoder.kinds,
        data,
    })
}

/// Reconstructs the graph described by `payload`.
///
/// # Errors
///
/// Returns [`SerializationError::Malformed`] for back-references to an index
/// that is not an earlier composite, kind-list entries whose JSON has the
/// wrong shape, and kind-list indices beyond the tree.
pub fn decode(payload: &Payload) -> Result<Value, SerializationError> {
    let mut decoder = Decoder::new(&payload.kinds);
    let value = decoder.decode_value(&payload.data)?;
    let visited = decoder.next;
    let k = &payload.kinds;
    if let Some(stray) = k
        .refs
        .iter()
        .chain(&k.dates)
        .chain(&k.sets)
        .chain(&k.maps)
        .find(|&&i| i >= visited)
    {
        return Err(SerializationError::Malformed(format!(
            "kind list names index {stray} but the tree has only {visited} values"
        )));
    }
    Ok(value)
}

/// Encodes straight to JSON text.
pub fn encode_to_string(value: &Value) -> Result<String, SerializationError> {
    Ok(serde_json::to_string(&encode(value)?)?)
}

/// Decodes from JSON text.
pub fn decode_from_str(text: &str) -> Result<Value, SerializationError> {
    let payload: Payload = serde_json::from_str(text)?;
    decode(&payload)
}

// ── Encoder ───────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Encoder {
    next: usize,
    seen: HashMap<*const (), usize>,
    kinds: KindLists,
}

impl Encoder {
    fn encode_value(&mut self, value: &Value, path: &mut Vec<String>) -> Result<Json, SerializationError> {
        let index = self.next;
        self.next += 1;

        if let Some(id) = value.identity() {
            if let Some(&first) = self.seen.get(&id) {
                self.kinds.refs.push(index);
                return Ok(Json::from(first));
            }
            self.seen.insert(id, index);
        }

        match value {
            Value::Null => Ok(Json::Null),
            Value::Bool(b) => Ok(Json::Bool(*b)),
            Value::Number(n) => encode_number(*n, path),
            Value::String(s) => Ok(Json::String(s.clone())),
            Value::Date(ts) => {
                self.kinds.dates.push(index);
                Ok(Json::from(ts.millis()))
            }
            Value::Array(items) => {
                let items = items.borrow();
                self.encode_items(&items, path).map(Json::Array)
            }
            Value::Set(items) => {
                self.kinds.sets.push(index);
                let items = items.borrow();
                self.encode_items(&items, path).map(Json::Array)
            }
            Value::Object(fields) => {
                let fields = fields.borrow();
                let mut out = serde_json::Map::with_capacity(fields.len());
                for (key, field) in fields.iter() {
                    path.push(key.clone());
                    let encoded = self.encode_value(field, path);
                    path.pop();
                    out.insert(key.clone(), encoded?);
                }
                Ok(Json::Object(out))
            }
            Value::Map(entries) => {
                self.kinds.maps.push(index);
                let entries = entries.borrow();
                let mut pairs = Vec::with_capacity(entries.len());
                for (i, (key, entry)) in entries.iter().enumerate() {
                    path.push(i.to_string());
                    let pair = self.encode_pair(key, entry, path);
                    path.pop();
                    pairs.push(pair?);
                }
                Ok(Json::Array(pairs))
            }
            Value::Function(_) | Value::Symbol(_) => Err(SerializationError::Unsupported {
                kind: value.kind(),
                path: path.join("."),
            }),
        }
    }

    fn encode_items(&mut self, items: &[Value], path: &mut Vec<String>) -> Result<Vec<Json>, SerializationError> {
        let mut out = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            path.push(i.to_string());
            let encoded = self.encode_value(item, path);
            path.pop();
            out.push(encoded?);
        }
        Ok(out)
    }

    fn encode_pair(&mut self, key: &Value, value: &Value, path: &mut Vec<String>) -> Result<Json, SerializationError> {
        path.push("key".to_string());
        let k = self.encode_value(key, path);
        path.pop();
        let k = k?;
        path.push("value".to_string());
        let v = self.encode_value(value, path);
        path.pop();
        Ok(Json::Array(vec![k, v?]))
    }
}

fn encode_number(n: f64, path: &[String]) -> Result<Json, SerializationError> {
    if !n.is_finite() {
        return Err(SerializationError::NonFiniteNumber {
            path: path.join("."),
        });
    }
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER && !(n == 0.0 && n.is_sign_negative()) {
        return Ok(Json::from(n as i64));
    }
    serde_json::Number::from_f64(n)
        .map(Json::Number)
        .ok_or_else(|| SerializationError::NonFiniteNumber {
            path: path.join("."),
        })
}

// ── Decoder ───────────────────────────────────────────────────────────────────

struct Decoder {
    next: usize,
    composites: HashMap<usize, Value>,
    refs: HashSet<usize>,
    dates: HashSet<usize>,
    sets: HashSet<usize>,
    maps: HashSet<usize>,
}

impl Decoder {
    fn new(kinds: &KindLists) -> Self {
        Self {
            next: 0,
            composites: HashMap::new(),
            refs: kinds.refs.iter().copied().collect(),
            dates: kinds.dates.iter().copied().collect(),
            sets: kinds.sets.iter().copied().collect(),
            maps: kinds.maps.iter().copied().collect(),
        }
    }

    fn decode_value(&mut self, json: &Json) -> Result<Value, SerializationError> {
        let index = self.next;
        self.next += 1;

        if self.refs.contains(&index) {
            let target = json
                .as_u64()
                .ok_or_else(|| malformed(index, "back-reference is not an index"))?;
            return usize::try_from(target)
                .ok()
                .and_then(|t| self.composites.get(&t))
                .cloned()
                .ok_or_else(|| malformed(index, "back-reference to an unknown composite"));
        }

        if self.dates.contains(&index) {
            let millis = json
                .as_i64()
                .ok_or_else(|| malformed(index, "date is not an integer"))?;
            return Ok(Value::Date(Timestamp::from_millis(millis)));
        }

        if self.sets.contains(&index) {
            let items = json
                .as_array()
                .ok_or_else(|| malformed(index, "set is not an array"))?;
            let shared = Rc::new(RefCell::new(Vec::with_capacity(items.len())));
            self.composites.insert(index, Value::Set(Rc::clone(&shared)));
            for item in items {
                let decoded = self.decode_value(item)?;
                shared.borrow_mut().push(decoded);
            }
            return Ok(Value::Set(shared));
        }

        if self.maps.contains(&index) {
            let pairs = json
                .as_array()
                .ok_or_else(|| malformed(index, "map is not an array"))?;
            let shared = Rc::new(RefCell::new(Vec::with_capacity(pairs.len())));
            self.composites.insert(index, Value::Map(Rc::clone(&shared)));
            for pair in pairs {
                let (k, v) = match pair.as_array().map(Vec::as_slice) {
                    Some([k, v]) => (k, v),
                    _ => return Err(malformed(index, "map entry is not a [key, value] pair")),
                };
                let key = self.decode_value(k)?;
                let value = self.decode_value(v)?;
                shared.borrow_mut().push((key, value));
            }
            return Ok(Value::Map(shared));
        }

        match json {
            Json::Null => Ok(Value::Null),
            Json::Bool(b) => Ok(Value::Bool(*b)),
            Json::Number(n) => n
                .as_f64()
                .map(Value::Number)
                .ok_or_else(|| malformed(index, "number out of range")),
            Json::String(s) => Ok(Value::String(s.clone())),
            Json::Array(items) => {
                let shared = Rc::new(RefCell::new(Vec::with_capacity(items.len())));
                self.composites.insert(index, Value::Array(Rc::clone(&shared)));
                for item in items {
                    let decoded = self.decode_value(item)?;
                    shared.borrow_mut().push(decoded);
                }
                Ok(Value::Array(shared))
            }
            Json::Object(fields) => {
                let shared = Rc::new(RefCell::new(Vec::with_capacity(fields.len())));
                self.composites.insert(index, Value::Object(Rc::clone(&shared)));
                for (key, field) in fields {
                    let decoded = self.decode_value(field)?;
                    shared.borrow_mut().push((key.clone(), decoded));
                }
                Ok(Value::Object(shared))
            }
        }
    }
}

fn malformed(index: usize, what: &str) -> SerializationError {
    SerializationError::Malformed(format!("value {index}: {what}"))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
