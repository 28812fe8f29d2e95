//! Bridge between HTML text and the document tree.
//!
//! [`parse_fragment`] builds a tree from an HTML fragment with `scraper`;
//! [`to_html`] serializes a tree back to markup.

use linkcard_types::{Comment, Element, Node, Properties, PropertyValue};
use scraper::node::Node as HtmlNode;
use scraper::{ElementRef, Html};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Property names that differ from their attribute spelling.
const ATTRIBUTE_NAMES: &[(&str, &str)] = &[
    ("className", "class"),
    ("htmlFor", "for"),
    ("httpEquiv", "http-equiv"),
    ("acceptCharset", "accept-charset"),
];

/// Parse an HTML fragment into a `root` node.
///
/// `class` attributes become the `className` list; every other attribute is
/// kept as a string under its HTML name.
#[must_use]
pub fn parse_fragment(html: &str) -> Node {
    let fragment = Html::parse_fragment(html);
    if !fragment.errors.is_empty() {
        tracing::debug!(errors = fragment.errors.len(), "HTML fragment parsed with recoverable errors");
    }
    Node::root(convert_children(fragment.root_element()))
}

fn convert_children(parent: ElementRef<'_>) -> Vec<Node> {
    let mut children = Vec::new();
    for child in parent.children() {
        match child.value() {
            HtmlNode::Text(text) => children.push(Node::text(text.text.to_string())),
            HtmlNode::Comment(comment) => children.push(Node::Comment(Comment {
                value: comment.comment.to_string(),
            })),
            HtmlNode::Element(_) => {
                if let Some(element) = ElementRef::wrap(child) {
                    children.push(convert_element(element));
                }
            }
            _ => {}
        }
    }
    children
}

fn convert_element(element: ElementRef<'_>) -> Node {
    let source = element.value();
    let properties: Properties = source
        .attrs()
        .map(|(name, value)| {
            if name == "class" {
                let classes = value.split_whitespace().map(str::to_string).collect();
                ("className".to_string(), PropertyValue::List(classes))
            } else {
                (name.to_string(), PropertyValue::String(value.to_string()))
            }
        })
        .collect();

    Node::Element(Element {
        tag_name: source.name().to_string(),
        properties,
        children: convert_children(element),
    })
}

/// Serialize `node` to HTML.
#[must_use]
pub fn to_html(node: &Node) -> String {
    let mut out = String::new();
    write_node(node, false, &mut out);
    out
}

fn write_node(node: &Node, raw_text: bool, out: &mut String) {
    match node {
        Node::Root(root) => {
            for child in &root.children {
                write_node(child, false, out);
            }
        }
        Node::Text(text) if raw_text => out.push_str(&text.value),
        Node::Text(text) => escape_into(&text.value, false, out),
        Node::Comment(comment) => {
            out.push_str("<!--");
            out.push_str(&comment.value);
            out.push_str("-->");
        }
        Node::Doctype => out.push_str("<!doctype html>"),
        Node::Raw(raw) => out.push_str(&raw.value),
        Node::Element(element) => write_element(element, out),
    }
}

fn write_element(element: &Element, out: &mut String) {
    let tag = element.tag_name.as_str();
    out.push('<');
    out.push_str(tag);
    for (name, value) in element.properties.iter() {
        write_attribute(name, value, out);
    }
    out.push('>');

    if VOID_ELEMENTS.contains(&tag) {
        return;
    }

    let raw_text = RAW_TEXT_ELEMENTS.contains(&tag);
    for child in &element.children {
        write_node(child, raw_text, out);
    }
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}

fn write_attribute(name: &str, value: &PropertyValue, out: &mut String) {
    let name = ATTRIBUTE_NAMES
        .iter()
        .find(|(property, _)| *property == name)
        .map_or(name, |(_, attribute)| *attribute);

    let value = match value {
        PropertyValue::Bool(false) | PropertyValue::Null => return,
        PropertyValue::Bool(true) => {
            out.push(' ');
            out.push_str(name);
            return;
        }
        PropertyValue::Number(number) => number.to_string(),
        PropertyValue::String(value) => value.clone(),
        PropertyValue::List(values) => values.join(" "),
    };

    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    escape_into(&value, true, out);
    out.push('"');
}

fn escape_into(raw: &str, attribute: bool, out: &mut String) {
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' if !attribute => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
}
