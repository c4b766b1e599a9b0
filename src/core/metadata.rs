//! Ordered string key/value metadata attached to objects and properties.
//!
//! Serialized form is `key=value;key=value`, with `\`, `;` and `=` escaped
//! by a backslash. Parsing a serialized string yields the same entries in
//! the same order.

use smallvec::SmallVec;
use std::fmt;

/// Ordered key/value bag; keys are unique.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct MetaData {
    entries: SmallVec<[(String, String); 4]>,
}

impl MetaData {
    /// Schema tag identifying an object's or compound's role.
    pub const SCHEMA: &'static str = "schema";
    /// `<schema>:<compound name>` on objects carrying a schema.
    pub const SCHEMA_OBJ_TITLE: &'static str = "schemaObjTitle";
    /// Parent schema family, e.g. `AbcGeom_GeomBase_v1`.
    pub const SCHEMA_BASE_TYPE: &'static str = "schemaBaseType";
    /// Semantic role of a value (`point`, `normal`, `vector`, ...).
    pub const INTERPRETATION: &'static str = "interpretation";
    /// Marks a GeomParam as texture coordinates.
    pub const IS_UV: &'static str = "isUV";
    /// Marks a reference-only object.
    pub const REFERENCE: &'static str = "reference";
    /// Layering directive: override subtree replaces earlier layers.
    pub const REPLACE: &'static str = "replace";
    /// Layering directive: remove this path from the merged tree.
    pub const PRUNE: &'static str = "prune";

    /// Empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value, replacing an existing key in place.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Builder form of [`set`](Self::set).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Value of `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Remove `key`, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Overlay `other` onto self: existing keys take the new value, new
    /// keys append in `other`'s order.
    pub fn merge_from(&mut self, other: &MetaData) {
        for (k, v) in other.iter() {
            self.set(k, v);
        }
    }

    /// Boolean flag convention: `1` or `true`.
    pub fn flag(&self, key: &str) -> bool {
        matches!(self.get(key), Some("1") | Some("true"))
    }

    /// The `schema` value.
    pub fn schema(&self) -> Option<&str> {
        self.get(Self::SCHEMA)
    }

    pub fn set_schema(&mut self, schema: &str) {
        self.set(Self::SCHEMA, schema);
    }

    /// The `interpretation` value, e.g. `box` or `point`.
    pub fn interpretation(&self) -> Option<&str> {
        self.get(Self::INTERPRETATION)
    }

    /// True when `schema` equals `title`.
    pub fn matches_schema(&self, title: &str) -> bool {
        self.schema() == Some(title)
    }

    /// Carries the prune directive.
    pub fn is_prune(&self) -> bool {
        self.flag(Self::PRUNE)
    }

    /// Carries the replace directive.
    pub fn is_replace(&self) -> bool {
        self.flag(Self::REPLACE)
    }

    /// Serialize to `key=value;...`.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for (i, (k, v)) in self.entries.iter().enumerate() {
            if i > 0 {
                out.push(';');
            }
            push_escaped(&mut out, k);
            out.push('=');
            push_escaped(&mut out, v);
        }
        out
    }

    /// Parse the serialized form. Fragments without an unescaped `=` and
    /// empty keys are skipped.
    pub fn parse(s: &str) -> Self {
        let mut meta = Self::new();
        let mut key = String::new();
        let mut value = String::new();
        let mut in_value = false;
        let mut chars = s.chars();

        let flush = |key: &mut String, value: &mut String, in_value: bool, meta: &mut MetaData| {
            if in_value && !key.is_empty() {
                meta.set(std::mem::take(key), std::mem::take(value));
            }
            key.clear();
            value.clear();
        };

        while let Some(c) = chars.next() {
            let target = if in_value { &mut value } else { &mut key };
            match c {
                '\\' => match chars.next() {
                    Some(next @ ('\\' | ';' | '=')) => target.push(next),
                    Some(other) => {
                        target.push('\\');
                        target.push(other);
                    }
                    None => target.push('\\'),
                },
                '=' if !in_value => in_value = true,
                ';' => {
                    flush(&mut key, &mut value, in_value, &mut meta);
                    in_value = false;
                }
                _ => target.push(c),
            }
        }
        flush(&mut key, &mut value, in_value, &mut meta);
        meta
    }
}

fn push_escaped(out: &mut String, s: &str) {
    for c in s.chars() {
        if matches!(c, '\\' | ';' | '=') {
            out.push('\\');
        }
        out.push(c);
    }
}

impl fmt::Debug for MetaData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(k, v)| (k, v)))
            .finish()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MetaData {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut meta = Self::new();
        for (k, v) in iter {
            meta.set(k, v);
        }
        meta
    }
}
