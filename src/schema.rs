//! Declarative field schemas and the coercion engine.
//!
//! Each entity kind describes its fields as data: an ordered list of
//! [`FieldDef`] entries mapping a logical field name to a source child
//! tag and a [`FieldRule`]. One schema-agnostic engine interprets the
//! rules against a parsed tree; the entity modules never hand-roll
//! their own extraction logic.
//!
//! The engine is deliberately permissive about absent nodes: a missing
//! optional child omits the field (or yields an empty sequence for
//! collections) so that remote-side schema evolution cannot break
//! parsing of the fields we do know. Only a present node with content
//! that violates its declared type is an error.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{ClientError, Result};
use crate::xml::XmlNode;

/// How a field is extracted and coerced from the entity tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRule {
    /// Integer text content of the source child.
    Int,
    /// String text content of the source child (empty if no text).
    Str,
    /// Nested structure built from the sub-tree at the source tag.
    SubTree,
    /// Ordered integers from the immediate children of the source tag.
    /// An absent source yields an empty sequence, not an omitted field.
    IntList,
    /// The sub-tree at the source tag serialized back to XML text.
    Raw,
}

/// One schema entry: logical field name, source child tag, rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    pub name: &'static str,
    pub tag: &'static str,
    pub rule: FieldRule,
}

impl FieldDef {
    pub const fn int(name: &'static str, tag: &'static str) -> Self {
        Self { name, tag, rule: FieldRule::Int }
    }

    pub const fn string(name: &'static str, tag: &'static str) -> Self {
        Self { name, tag, rule: FieldRule::Str }
    }

    pub const fn subtree(name: &'static str, tag: &'static str) -> Self {
        Self { name, tag, rule: FieldRule::SubTree }
    }

    pub const fn int_list(name: &'static str, tag: &'static str) -> Self {
        Self { name, tag, rule: FieldRule::IntList }
    }

    pub const fn raw(name: &'static str, tag: &'static str) -> Self {
        Self { name, tag, rule: FieldRule::Raw }
    }
}

/// When an element materializes its fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoercionPolicy {
    /// Coerce at construction; a bad payload fails the pool refresh.
    Eager,
    /// Coerce on first field access.
    Lazy,
}

/// The complete field schema of one entity kind.
#[derive(Debug)]
pub struct FieldSchema {
    /// Root tag an entity tree of this kind must carry (e.g. `HOST`).
    pub kind: &'static str,
    pub policy: CoercionPolicy,
    pub fields: &'static [FieldDef],
}

impl FieldSchema {
    /// Whether the schema declares a logical field name.
    pub fn declares(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }
}

/// A coerced field value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int(i64),
    Str(String),
    IntList(Vec<i64>),
    /// Raw XML text of a passthrough sub-tree.
    Xml(String),
    /// Nested structure from a sub-tree rule.
    Template(Template),
}

impl FieldValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_int_list(&self) -> Option<&[i64]> {
        match self {
            FieldValue::IntList(v) => Some(v),
            _ => None,
        }
    }
}

/// A nested key/value structure, as carried by `<TEMPLATE>`-style
/// sub-trees: each immediate child is a key whose text is the value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(into = "BTreeMap<String, String>")]
pub struct Template {
    root: XmlNode,
}

impl Template {
    pub(crate) fn new(root: XmlNode) -> Self {
        Self { root }
    }

    /// Text value of an immediate child key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.root.text_of(key)
    }

    /// Keys in document order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.root.children().iter().map(|c| c.tag())
    }

    /// The underlying sub-tree.
    pub fn node(&self) -> &XmlNode {
        &self.root
    }

    /// Serialize the structure back to XML text.
    pub fn to_xml(&self) -> String {
        self.root.serialize()
    }
}

impl From<Template> for BTreeMap<String, String> {
    fn from(template: Template) -> Self {
        template
            .root
            .children()
            .iter()
            .map(|c| (c.tag().to_string(), c.text().unwrap_or("").to_string()))
            .collect()
    }
}

/// Materialized field mapping of one element.
pub type FieldMap = BTreeMap<&'static str, FieldValue>;

fn parse_int(field: &str, text: &str) -> Result<i64> {
    text.trim()
        .parse::<i64>()
        .map_err(|_| ClientError::TypeMismatch {
            field: field.to_string(),
            value: text.to_string(),
        })
}

/// Apply a schema to a parsed entity tree.
///
/// Absent source nodes omit the field (collections yield an empty
/// sequence instead); a present node whose text is not a valid integer
/// under an [`FieldRule::Int`] rule fails with `TypeMismatch`.
pub fn coerce_fields(root: &XmlNode, schema: &FieldSchema) -> Result<FieldMap> {
    let mut map = FieldMap::new();

    for def in schema.fields {
        match def.rule {
            FieldRule::Int => {
                if let Some(node) = root.find(def.tag) {
                    let text = node.text().unwrap_or("");
                    map.insert(def.name, FieldValue::Int(parse_int(def.name, text)?));
                }
            }
            FieldRule::Str => {
                if let Some(node) = root.find(def.tag) {
                    let text = node.text().unwrap_or("").to_string();
                    map.insert(def.name, FieldValue::Str(text));
                }
            }
            FieldRule::SubTree => {
                if let Some(node) = root.find(def.tag) {
                    map.insert(def.name, FieldValue::Template(Template::new(node.clone())));
                }
            }
            FieldRule::IntList => {
                let mut items = Vec::new();
                if let Some(parent) = root.find(def.tag) {
                    for child in parent.children() {
                        let text = child.text().unwrap_or("");
                        items.push(parse_int(def.name, text)?);
                    }
                }
                map.insert(def.name, FieldValue::IntList(items));
            }
            FieldRule::Raw => {
                if let Some(node) = root.find(def.tag) {
                    map.insert(def.name, FieldValue::Xml(node.serialize()));
                }
            }
        }
    }

    Ok(map)
}
