//! Slash-delimited project paths.
//!
//! A path is parsed once into a segment vector; equality and ordering are
//! segment-wise, so `a//b`, `/a/b/` and `a\b` all denote the same path.
//! Paths are value types: immutable and cheap to clone.

use std::fmt;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::PathError;

/// An ordered sequence of non-empty path segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProjectPath {
    segments: Vec<String>,
}

impl ProjectPath {
    /// Parse a raw string into a normalized path.
    ///
    /// Surrounding whitespace is trimmed, `\` separators are normalized to
    /// `/`, and repeated separators collapse. Fails only when nothing
    /// remains after normalization.
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        let segments: Vec<String> = raw
            .trim()
            .replace('\\', "/")
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        if segments.is_empty() {
            return Err(PathError::Empty);
        }
        Ok(Self { segments })
    }

    /// Build a path from pre-split segments, dropping empty ones.
    pub fn from_segments<I, S>(segments: I) -> Result<Self, PathError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments
            .into_iter()
            .map(Into::into)
            .filter(|s| !s.is_empty())
            .collect();
        if segments.is_empty() {
            return Err(PathError::Empty);
        }
        Ok(Self { segments })
    }

    /// The path segments, in order.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Root-less rendering: `a/b`.
    pub fn rootless(&self) -> String {
        self.segments.join("/")
    }

    /// Root-anchored rendering: `/a/b`.
    pub fn rooted(&self) -> String {
        format!("/{}", self.rootless())
    }

    /// The last segment.
    pub fn name(&self) -> &str {
        // Non-empty by construction.
        &self.segments[self.segments.len() - 1]
    }

    /// All-but-last segments, or `None` for a single-segment path.
    pub fn parent(&self) -> Option<ProjectPath> {
        if self.segments.len() <= 1 {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Concatenate a segment or sub-path: `a/b` + `c/d` = `a/b/c/d`.
    ///
    /// The suffix goes through the same normalization as [`parse`]; an
    /// empty suffix is the identity.
    ///
    /// [`parse`]: ProjectPath::parse
    pub fn append(&self, suffix: &str) -> ProjectPath {
        let mut segments = self.segments.clone();
        segments.extend(
            suffix
                .trim()
                .replace('\\', "/")
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        );
        Self { segments }
    }
}

impl fmt::Display for ProjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.rooted())
    }
}

impl Serialize for ProjectPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.rooted())
    }
}

impl<'de> Deserialize<'de> for ProjectPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        ProjectPath::parse(&raw).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes_separators() {
        let variants = ["a/b/c", "/a/b/c", "a//b///c", "a\\b\\c", " /a/b/c/ ", "\\a\\b//c"];
        let canonical = ProjectPath::parse("a/b/c").unwrap();
        for raw in variants {
            assert_eq!(ProjectPath::parse(raw).unwrap(), canonical, "input: {raw:?}");
        }
    }

    #[test]
    fn test_parse_empty_inputs_fail() {
        for raw in ["", "/", "///", "\\", "  ", " // "] {
            assert_eq!(ProjectPath::parse(raw), Err(PathError::Empty), "input: {raw:?}");
        }
    }

    #[test]
    fn test_renderings() {
        let p = ProjectPath::parse("docs/chapter one.typ").unwrap();
        assert_eq!(p.rootless(), "docs/chapter one.typ");
        assert_eq!(p.rooted(), "/docs/chapter one.typ");
        assert_eq!(p.to_string(), "/docs/chapter one.typ");
    }

    #[test]
    fn test_name_and_parent() {
        let p = ProjectPath::parse("/a/b/c").unwrap();
        assert_eq!(p.name(), "c");
        let parent = p.parent().unwrap();
        assert_eq!(parent, ProjectPath::parse("a/b").unwrap());
        assert_eq!(parent.parent().unwrap().parent(), None);
    }

    #[test]
    fn test_append_subpath() {
        let p = ProjectPath::parse("a/b").unwrap();
        assert_eq!(p.append("c/d"), ProjectPath::parse("a/b/c/d").unwrap());
        assert_eq!(p.append("//c"), ProjectPath::parse("a/b/c").unwrap());
        assert_eq!(p.append(""), p);
    }

    #[test]
    fn test_equality_is_segment_wise() {
        let a = ProjectPath::parse("/main.typ").unwrap();
        let b = ProjectPath::parse("main.typ").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, ProjectPath::parse("main.typ/x").unwrap());
    }

    #[test]
    fn test_serde_as_rooted_string() {
        let p = ProjectPath::parse("a\\b").unwrap();
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, "\"/a/b\"");
        let back: ProjectPath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
        assert!(serde_json::from_str::<ProjectPath>("\"//\"").is_err());
    }
}
