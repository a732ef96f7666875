//! Object-graph values carried through the wire codec.
//!
//! # Why not `serde_json::Value`? (for beginners)
//!
//! A JSON value is a tree: every array or object has exactly one parent.
//! Application payloads are often *graphs*: the same list can be reachable
//! from two places, or a node can point back at its own ancestor.  [`Value`]
//! models that by keeping composites behind `Rc<RefCell<..>>`: cloning a
//! composite `Value` clones the pointer, so both copies refer to the *same*
//! collection, and mutating one is visible through the other.
//!
//! `Value` also has kinds JSON lacks: timestamps, deduplicating sets, maps
//! whose keys can be any value, and two kinds the codec deliberately refuses
//! to encode (functions and symbols).

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(i64);

impl Timestamp {
    pub fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    pub fn millis(self) -> i64 {
        self.0
    }

    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    /// Converts with millisecond precision; sub-millisecond parts are dropped.
    pub fn from_system_time(time: SystemTime) -> Self {
        match time.duration_since(UNIX_EPOCH) {
            Ok(after) => Self(after.as_millis() as i64),
            Err(before) => Self(-(before.duration().as_millis() as i64)),
        }
    }

    pub fn to_system_time(self) -> SystemTime {
        if self.0 >= 0 {
            UNIX_EPOCH + Duration::from_millis(self.0 as u64)
        } else {
            UNIX_EPOCH - Duration::from_millis(self.0.unsigned_abs())
        }
    }
}

/// A host function.  Present so that graphs containing one can be built and
/// rejected by the encoder.
#[derive(Clone)]
pub struct NativeFunction(Rc<dyn Fn(&[Value]) -> Value>);

impl NativeFunction {
    pub fn new(f: impl Fn(&[Value]) -> Value + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self, args: &[Value]) -> Value {
        (self.0)(args)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[function]")
    }
}

pub type Shared<T> = Rc<RefCell<T>>;

/// A node of an object graph.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Date(Timestamp),
    Array(Shared<Vec<Value>>),
    /// Insertion-ordered string-keyed record.
    Object(Shared<Vec<(String, Value)>>),
    /// Insertion-ordered collection without duplicates.
    Set(Shared<Vec<Value>>),
    /// Insertion-ordered association with arbitrary keys.
    Map(Shared<Vec<(Value, Value)>>),
    Function(NativeFunction),
    /// A unique token; two symbols are equal only if they are the same symbol.
    Symbol(Rc<str>),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    pub fn date(ts: Timestamp) -> Self {
        Value::Date(ts)
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    /// Builds an object; a repeated key keeps its first position and last value.
    pub fn object<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        let obj = Value::Object(Rc::default());
        for (key, value) in entries {
            obj.set_field(key, value);
        }
        obj
    }

    /// Builds a set, dropping items equal (same-value-zero) to an earlier one.
    pub fn set(items: impl IntoIterator<Item = Value>) -> Self {
        let set = Value::Set(Rc::default());
        for item in items {
            set.push(item);
        }
        set
    }

    /// Builds a map; a repeated key keeps its first position and last value.
    pub fn map(entries: impl IntoIterator<Item = (Value, Value)>) -> Self {
        let map = Value::Map(Rc::default());
        for (key, value) in entries {
            map.map_insert(key, value);
        }
        map
    }

    pub fn function(f: impl Fn(&[Value]) -> Value + 'static) -> Self {
        Value::Function(NativeFunction::new(f))
    }

    pub fn symbol(description: &str) -> Self {
        Value::Symbol(Rc::from(description))
    }

    /// Appends to an array, or inserts into a set if no equal item exists.
    ///
    /// Returns `false` when nothing was added (duplicate set item, or `self`
    /// is neither an array nor a set).
    pub fn push(&self, item: Value) -> bool {
        match self {
            Value::Array(items) => {
                items.borrow_mut().push(item);
                true
            }
            Value::Set(items) => {
                let mut items = items.borrow_mut();
                if items.iter().any(|existing| existing.same_value_zero(&item)) {
                    return false;
                }
                items.push(item);
                true
            }
            _ => false,
        }
    }

    /// Sets an object field.  Returns `false` when `self` is not an object.
    pub fn set_field(&self, key: impl Into<String>, value: Value) -> bool {
        let Value::Object(fields) = self else {
            return false;
        };
        let key = key.into();
        let mut fields = fields.borrow_mut();
        match fields.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => fields.push((key, value)),
        }
        true
    }

    /// Inserts a map entry.  Returns `false` when `self` is not a map.
    pub fn map_insert(&self, key: Value, value: Value) -> bool {
        let Value::Map(entries) = self else {
            return false;
        };
        let mut entries = entries.borrow_mut();
        match entries.iter_mut().find(|(k, _)| k.same_value_zero(&key)) {
            Some(slot) => slot.1 = value,
            None => entries.push((key, value)),
        }
        true
    }

    /// Reads an object field.
    pub fn get(&self, key: &str) -> Option<Value> {
        match self {
            Value::Object(fields) => fields
                .borrow()
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone()),
            _ => None,
        }
    }

    /// Number of items of a composite; `None` for scalars.
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::Array(items) | Value::Set(items) => Some(items.borrow().len()),
            Value::Object(fields) => Some(fields.borrow().len()),
            Value::Map(entries) => Some(entries.borrow().len()),
            _ => None,
        }
    }

    /// Name of the kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Date(_) => "date",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Set(_) => "set",
            Value::Map(_) => "map",
            Value::Function(_) => "function",
            Value::Symbol(_) => "symbol",
        }
    }

    /// Address of the shared allocation, for composites.
    pub fn identity(&self) -> Option<*const ()> {
        match self {
            Value::Array(rc) | Value::Set(rc) => Some(Rc::as_ptr(rc) as *const ()),
            Value::Object(rc) => Some(Rc::as_ptr(rc) as *const ()),
            Value::Map(rc) => Some(Rc::as_ptr(rc) as *const ()),
            _ => None,
        }
    }

    /// Returns `true` when both values are the same composite allocation.
    pub fn ptr_eq(&self, other: &Value) -> bool {
        match (self.identity(), other.identity()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Same-value-zero comparison used for set items and map keys.
    ///
    /// Scalars compare by value (`NaN` equals `NaN`, `0.0` equals `-0.0`),
    /// timestamps by instant, everything else by identity.
    pub fn same_value_zero(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            (Value::Symbol(a), Value::Symbol(b)) => Rc::ptr_eq(a, b),
            _ => self.ptr_eq(other),
        }
    }

    fn deep_eq(&self, other: &Value, visited: &mut HashSet<(*const (), *const ())>) -> bool {
        if let (Some(a), Some(b)) = (self.identity(), other.identity()) {
            // A pair already under comparison is assumed equal; any real
            // difference shows up elsewhere on the path.
            if !visited.insert((a, b)) {
                return true;
            }
        }
        match (self, other) {
            (Value::Array(a), Value::Array(b)) | (Value::Set(a), Value::Set(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.deep_eq(y, visited))
            }
            (Value::Object(a), Value::Object(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len()
                    && a.iter()
                        .zip(b.iter())
                        .all(|((ka, va), (kb, vb))| ka == kb && va.deep_eq(vb, visited))
            }
            (Value::Map(a), Value::Map(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len()
                    && a.iter().zip(b.iter()).all(|((ka, va), (kb, vb))| {
                        ka.deep_eq(kb, visited) && va.deep_eq(vb, visited)
                    })
            }
            _ => self.same_value_zero(other),
        }
    }

    fn fmt_tracked(&self, f: &mut fmt::Formatter<'_>, stack: &mut Vec<*const ()>) -> fmt::Result {
        if let Some(id) = self.identity() {
            if stack.contains(&id) {
                return write!(f, "<cycle {}>", self.kind());
            }
            stack.push(id);
        }
        let result = match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Date(ts) => write!(f, "Date({})", ts.millis()),
            Value::Function(func) => write!(f, "{func:?}"),
            Value::Symbol(s) => write!(f, "Symbol({s})"),
            Value::Array(items) => fmt_seq(f, "[", "]", &items.borrow(), stack),
            Value::Set(items) => fmt_seq(f, "Set{", "}", &items.borrow(), stack),
            Value::Object(fields) => {
                f.write_str("{")?;
                for (i, (k, v)) in fields.borrow().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k:?}: ")?;
                    v.fmt_tracked(f, stack)?;
                }
                f.write_str("}")
            }
            Value::Map(entries) => {
                f.write_str("Map{")?;
                for (i, (k, v)) in entries.borrow().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    k.fmt_tracked(f, stack)?;
                    f.write_str(" => ")?;
                    v.fmt_tracked(f, stack)?;
                }
                f.write_str("}")
            }
        };
        if self.identity().is_some() {
            stack.pop();
        }
        result
    }
}

fn fmt_seq(
    f: &mut fmt::Formatter<'_>,
    open: &str,
    close: &str,
    items: &[Value],
    stack: &mut Vec<*const ()>,
) -> fmt::Result {
    f.write_str(open)?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        item.fmt_tracked(f, stack)?;
    }
    f.write_str(close)
}

/// Structural equality.  Terminates on cyclic graphs.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.deep_eq(other, &mut HashSet::new())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_tracked(f, &mut Vec::new())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Timestamp> for Value {
    fn from(ts: Timestamp) -> Self {
        Value::Date(ts)
    }
}
