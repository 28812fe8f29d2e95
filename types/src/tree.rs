//! Hypertext document tree.
//!
//! A closed set of node variants modeled on the hast shape used by HTML
//! processing pipelines: a `root` holding children, `element` nodes with a tag
//! name, an ordered property map and ordered children, plus `text`, `comment`,
//! `doctype`, and `raw` leaves. Serializes to and from the same JSON layout
//! (`{"type": "element", "tagName": "p", ...}`). Leaves other than `text` are
//! carried through untouched.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::text::normalize_whitespace;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Node {
    Root(Root),
    Element(Element),
    Text(Text),
    Comment(Comment),
    Doctype,
    /// Markup passed through verbatim (`rehype-raw` style).
    Raw(Raw),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Root {
    #[serde(default)]
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    #[serde(rename = "tagName")]
    pub tag_name: String,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default)]
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Text {
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Raw {
    pub value: String,
}

/// A single property value.
///
/// `className` and other space-separated attributes are lists; boolean
/// attributes such as `hidden` are booleans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<String>),
    Null,
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl<const N: usize> From<[&str; N]> for PropertyValue {
    fn from(values: [&str; N]) -> Self {
        PropertyValue::List(values.iter().map(|v| (*v).to_string()).collect())
    }
}

/// Element properties, keyed by property name.
///
/// Iteration order is the sorted key order, so serialized output is stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Properties(BTreeMap<String, PropertyValue>);

impl Properties {
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.0.get(key)
    }

    /// String view of a property: the value itself, or the first entry of a list.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.0.get(key)? {
            PropertyValue::String(value) => Some(value),
            PropertyValue::List(values) => values.first().map(String::as_str),
            PropertyValue::Bool(_) | PropertyValue::Number(_) | PropertyValue::Null => None,
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<PropertyValue>) {
        self.0.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PropertyValue)> {
        self.0.iter()
    }

    /// Class list, empty when `className` is absent.
    #[must_use]
    pub fn class_names(&self) -> Vec<&str> {
        match self.0.get("className") {
            Some(PropertyValue::List(values)) => values.iter().map(String::as_str).collect(),
            Some(PropertyValue::String(value)) => value.split_whitespace().collect(),
            _ => Vec::new(),
        }
    }
}

impl<K: Into<String>, V: Into<PropertyValue>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl Element {
    #[must_use]
    pub fn new(tag_name: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into(),
            properties: Properties::default(),
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key, value);
        self
    }

    #[must_use]
    pub fn with_class<const N: usize>(self, classes: [&str; N]) -> Self {
        self.with_property("className", classes)
    }

    #[must_use]
    pub fn with_children(mut self, children: Vec<Node>) -> Self {
        self.children = children;
        self
    }

    #[must_use]
    pub fn is(&self, tag_name: &str) -> bool {
        self.tag_name == tag_name
    }
}

impl Text {
    /// True when the text is empty after whitespace normalization.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        normalize_whitespace(&self.value).is_empty()
    }
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Node::Element(element)
    }
}

impl Node {
    #[must_use]
    pub fn root(children: Vec<Node>) -> Self {
        Node::Root(Root { children })
    }

    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Node::Text(Text {
            value: value.into(),
        })
    }

    #[must_use]
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(element) => Some(element),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&Text> {
        match self {
            Node::Text(text) => Some(text),
            _ => None,
        }
    }

    #[must_use]
    pub fn children(&self) -> Option<&[Node]> {
        match self {
            Node::Root(root) => Some(&root.children),
            Node::Element(element) => Some(&element.children),
            Node::Text(_) | Node::Comment(_) | Node::Doctype | Node::Raw(_) => None,
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<Node>> {
        match self {
            Node::Root(root) => Some(&mut root.children),
            Node::Element(element) => Some(&mut element.children),
            Node::Text(_) | Node::Comment(_) | Node::Doctype | Node::Raw(_) => None,
        }
    }

    /// Walk `path` (child indices from this node) and return the node found there.
    pub fn at_path_mut(&mut self, path: &[usize]) -> Option<&mut Node> {
        let mut current = self;
        for &index in path {
            current = current.children_mut()?.get_mut(index)?;
        }
        Some(current)
    }
}

/// Concatenated value of every text node under `node`.
#[must_use]
pub fn text_content(node: &Node) -> String {
    fn collect(node: &Node, out: &mut String) {
        match node {
            Node::Text(text) => out.push_str(&text.value),
            Node::Comment(_) | Node::Doctype | Node::Raw(_) => {}
            Node::Root(_) | Node::Element(_) => {
                for child in node.children().unwrap_or_default() {
                    collect(child, out);
                }
            }
        }
    }

    let mut out = String::new();
    collect(node, &mut out);
    out
}
