//! Core domain types for linkcard.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies:
//!
//! - **`tree`**: the hypertext document tree the link-card transform rewrites
//! - **`text`**: whitespace normalization, truncation, and HTML entity decoding

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory
#![allow(clippy::missing_panics_doc)] // Panics are documented in assertions

pub mod text;
pub mod tree;

pub use text::{decode_html_entities, normalize_whitespace, truncate_with_ellipsis};
pub use tree::{
    Comment, Element, Node, Properties, PropertyValue, Raw, Root, Text, text_content,
};
