// Copyright 2025 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

///
/// An attribute value that may participate in a `TargetId`.
///
/// The value domain is deliberately JSON-like and closed: canonicalization must be deterministic,
/// and every admitted value must render identically everywhere. Floats are only admitted when
/// finite (see `IdValue::float`).
///
#[derive(Clone, Debug, PartialEq)]
pub enum IdValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<IdValue>),
}

impl IdValue {
    ///
    /// Floats participate in identity only when finite: NaN and the infinities have no stable
    /// total order with the rest of the domain, and are rejected outright rather than silently
    /// coerced.
    ///
    pub fn float(value: f64) -> Result<IdValue, String> {
        if value.is_finite() {
            Ok(IdValue::Float(value))
        } else {
            Err(format!(
                "Non-finite number {value} cannot participate in a target id."
            ))
        }
    }

    fn to_json(&self) -> serde_json::Value {
        match self {
            IdValue::Bool(b) => serde_json::Value::Bool(*b),
            IdValue::Int(i) => serde_json::Value::Number((*i).into()),
            IdValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .expect("IdValue floats are finite by construction"),
            IdValue::Str(s) => serde_json::Value::String(s.clone()),
            IdValue::List(items) => {
                serde_json::Value::Array(items.iter().map(IdValue::to_json).collect())
            }
        }
    }
}

impl From<bool> for IdValue {
    fn from(value: bool) -> IdValue {
        IdValue::Bool(value)
    }
}

impl From<i64> for IdValue {
    fn from(value: i64) -> IdValue {
        IdValue::Int(value)
    }
}

impl From<i32> for IdValue {
    fn from(value: i32) -> IdValue {
        IdValue::Int(i64::from(value))
    }
}

impl From<u32> for IdValue {
    fn from(value: u32) -> IdValue {
        IdValue::Int(i64::from(value))
    }
}

impl From<&str> for IdValue {
    fn from(value: &str) -> IdValue {
        IdValue::Str(value.to_owned())
    }
}

impl From<String> for IdValue {
    fn from(value: String) -> IdValue {
        IdValue::Str(value)
    }
}

impl From<&Path> for IdValue {
    fn from(value: &Path) -> IdValue {
        IdValue::Str(value.to_string_lossy().into_owned())
    }
}

impl From<PathBuf> for IdValue {
    fn from(value: PathBuf) -> IdValue {
        IdValue::from(value.as_path())
    }
}

impl<T: Into<IdValue>> From<Vec<T>> for IdValue {
    fn from(value: Vec<T>) -> IdValue {
        IdValue::List(value.into_iter().map(Into::into).collect())
    }
}

///
/// The canonical identity of a target.
///
/// Two targets with equal ids are interchangeable, and the graph stores at most one node per id.
/// The canonical form is the compact JSON rendering of the identifying attributes with
/// lexicographically sorted keys, so the order in which attributes were declared never affects
/// equality or hashing.
///
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId {
    canonical: String,
}

impl TargetId {
    ///
    /// Begins a new id for a target of the given kind. The kind is recorded as the reserved
    /// `type` attribute, so two target types with otherwise identical attributes have distinct
    /// identities.
    ///
    pub fn builder(kind: &str) -> TargetIdBuilder {
        let mut attrs = BTreeMap::new();
        attrs.insert("type".to_owned(), IdValue::from(kind));
        TargetIdBuilder { attrs }
    }

    pub fn as_str(&self) -> &str {
        &self.canonical
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

///
/// Accumulates the identifying attributes of one target instance.
///
/// Identity is declared per instance rather than per type: a target constructor chooses which of
/// its fields participate, so one target type may produce several equivalence classes of ids.
///
pub struct TargetIdBuilder {
    attrs: BTreeMap<String, IdValue>,
}

impl TargetIdBuilder {
    /// `type` is reserved for the kind passed to `TargetId::builder`.
    pub fn attr(mut self, name: &str, value: impl Into<IdValue>) -> TargetIdBuilder {
        debug_assert_ne!(name, "type", "the `type` attribute is reserved");
        self.attrs.insert(name.to_owned(), value.into());
        self
    }

    pub fn build(self) -> TargetId {
        let rendered: serde_json::Map<String, serde_json::Value> = self
            .attrs
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect();
        TargetId {
            canonical: serde_json::Value::Object(rendered).to_string(),
        }
    }
}
