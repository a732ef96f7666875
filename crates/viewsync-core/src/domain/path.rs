//! Dot-joined addresses into the node tree.
//!
//! # How paths work (for beginners)
//!
//! Every node in the synchronized tree can be reached from the root by a
//! sequence of steps.  Each step is a [`Segment`]:
//!
//! - A **numeric** segment (`"2"`) descends into the children list of the
//!   current element at that index.
//! - A **named** segment (`"header"`) descends into the prop of that name,
//!   which must hold a render-prop sub-tree (a node stored as a prop value).
//!
//! The text form joins the segments with dots, so `"0.header.1"` means
//! "first child, then the `header` render prop, then its second child".  The
//! empty string is the root itself.
//!
//! The same text form is used by the binding registry to name *prop slots*:
//! the `onClick` prop of the element at `"0.1"` lives at `"0.1.onClick"`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Separator between path segments in the text form.
pub const PATH_SEPARATOR: char = '.';

/// Error returned when a path string cannot be parsed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("malformed path {path:?}: segment {position} is empty")]
pub struct PathParseError {
    /// The offending input.
    pub path: String,
    /// Zero-based position of the empty segment.
    pub position: usize,
}

/// One step of a [`Path`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Segment {
    /// Index into the children list of an element.
    Index(usize),
    /// Name of a prop holding a render-prop sub-tree.
    Key(String),
}

impl Segment {
    /// Classifies a raw segment: all-digit text is an index, anything else a key.
    fn parse(raw: &str) -> Self {
        if raw.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(index) = raw.parse::<usize>() {
                return Segment::Index(index);
            }
        }
        Segment::Key(raw.to_string())
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Index(i) => write!(f, "{i}"),
            Segment::Key(k) => f.write_str(k),
        }
    }
}

/// An address relative to the tree root.
///
/// Paths are cheap to extend ([`Path::child`], [`Path::prop`]) because the
/// patch engine builds one per visited node while it walks a subtree.
///
/// # Example
///
/// ```rust
/// use viewsync_core::domain::path::{Path, Segment};
///
/// let path: Path = "0.header.1".parse().unwrap();
/// assert_eq!(path.segments()[1], Segment::Key("header".into()));
/// assert_eq!(path.child(3).to_string(), "0.header.1.3");
/// assert!(Path::root().is_root());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Path {
    segments: Vec<Segment>,
}

impl Path {
    /// The empty path, addressing the tree root.
    pub fn root() -> Self {
        Self::default()
    }

    /// Builds a path from already-classified segments.
    pub fn from_segments(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns this path extended by a child index.
    pub fn child(&self, index: usize) -> Self {
        let mut segments = self.segments.clone();
        segments.push(Segment::Index(index));
        Self { segments }
    }

    /// Returns this path extended by a prop name.
    pub fn prop(&self, key: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(Segment::parse(key));
        Self { segments }
    }

    /// Returns this path extended by every segment of `relative`.
    pub fn join(&self, relative: &Path) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(relative.segments.iter().cloned());
        Self { segments }
    }

    /// Returns the first `len` segments as a new path.
    pub fn prefix(&self, len: usize) -> Self {
        Self {
            segments: self.segments[..len.min(self.segments.len())].to_vec(),
        }
    }

    /// Text form of the prop slot `key` on the element at this path.
    ///
    /// This is the string the binding registry stores for callback,
    /// render-prop, and style-token entries.
    pub fn slot(&self, key: &str) -> String {
        if self.is_root() {
            key.to_string()
        } else {
            format!("{self}{PATH_SEPARATOR}{key}")
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, "{PATH_SEPARATOR}")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = PathParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Self::root());
        }
        let segments = s
            .split(PATH_SEPARATOR)
            .enumerate()
            .map(|(position, raw)| {
                if raw.is_empty() {
                    Err(PathParseError {
                        path: s.to_string(),
                        position,
                    })
                } else {
                    Ok(Segment::parse(raw))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { segments })
    }
}

impl TryFrom<String> for Path {
    type Error = PathParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Path> for String {
    fn from(path: Path) -> Self {
        path.to_string()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
