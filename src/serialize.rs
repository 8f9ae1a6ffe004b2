// Copyright 2024-2026 The tagtree Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Serializing a [`Dom`] back to HTML.
//!
//! This is the "HTML fragment serialization algorithm" direction: escaped
//! text, raw-text elements left unescaped, void elements without end tags.
//! Optional-tag omission is deliberately not attempted; the output
//! reparses to the same tree, which is what the round-trip tests rely on.

use crate::dom::{Dom, NodeData, NodeId};
use crate::interface::Namespace;

//§ serializing-html-fragments
/// Serialize the children of the document node (the whole document).
pub fn serialize_document(dom: &Dom) -> String {
    let mut out = String::new();
    for &child in dom.document_children() {
        serialize_node_to(dom, child, &mut out);
    }
    out
}

/// Serialize a single node, including itself.
pub fn serialize_node(dom: &Dom, node: NodeId) -> String {
    let mut out = String::new();
    serialize_node_to(dom, node, &mut out);
    out
}

fn void_element(name: &str) -> bool {
    matches!(
        name,
        "area"
            | "base"
            | "basefont"
            | "bgsound"
            | "br"
            | "col"
            | "embed"
            | "frame"
            | "hr"
            | "img"
            | "input"
            | "keygen"
            | "link"
            | "meta"
            | "param"
            | "source"
            | "track"
            | "wbr"
    )
}

fn unescaped_text_element(name: &str) -> bool {
    matches!(
        name,
        "style" | "script" | "xmp" | "iframe" | "noembed" | "noframes" | "plaintext" | "noscript"
    )
}

fn write_escaped(text: &str, attr_mode: bool, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '\u{00A0}' => out.push_str("&nbsp;"),
            '"' if attr_mode => out.push_str("&quot;"),
            '<' if !attr_mode => out.push_str("&lt;"),
            '>' if !attr_mode => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
}

fn serialize_node_to(dom: &Dom, id: NodeId, out: &mut String) {
    let node = dom.node(id);
    match node.data {
        NodeData::Document => {
            for &child in &node.children {
                serialize_node_to(dom, child, out);
            }
        },

        NodeData::Doctype { ref name, .. } => {
            out.push_str("<!DOCTYPE ");
            out.push_str(name);
            out.push('>');
        },

        NodeData::Text { ref contents } => {
            let parent_unescaped = node.parent.is_some_and(|p| match dom.node(p).data {
                NodeData::Element { ref name, .. } => {
                    name.ns == Namespace::Html && unescaped_text_element(&name.local)
                },
                _ => false,
            });
            if parent_unescaped {
                out.push_str(contents);
            } else {
                write_escaped(contents, false, out);
            }
        },

        NodeData::Comment { ref contents } => {
            out.push_str("<!--");
            out.push_str(contents);
            out.push_str("-->");
        },

        NodeData::Element {
            ref name,
            ref attrs,
            ref template_contents,
            ..
        } => {
            out.push('<');
            out.push_str(&name.local);
            for attr in attrs {
                out.push(' ');
                match attr.name.ns {
                    Namespace::None | Namespace::Html => (),
                    Namespace::Xml => out.push_str("xml:"),
                    Namespace::Xlink => out.push_str("xlink:"),
                    Namespace::Xmlns => {
                        // The prefix distinguishes `xmlns` from
                        // `xmlns:xlink`.
                        if attr.name.prefix.is_some() {
                            out.push_str("xmlns:");
                        }
                    },
                    Namespace::Svg | Namespace::MathMl => (),
                }
                out.push_str(&attr.name.local);
                out.push_str("=\"");
                write_escaped(&attr.value, true, out);
                out.push('"');
            }
            out.push('>');

            if name.ns == Namespace::Html && void_element(&name.local) {
                return;
            }

            // The spec re-emits the newline the parser stripped, so the
            // output reparses identically.
            if name.ns == Namespace::Html
                && matches!(&*name.local, "pre" | "textarea" | "listing")
            {
                if let Some(&first) = node.children.first() {
                    if let NodeData::Text { ref contents } = dom.node(first).data {
                        if contents.starts_with('\n') {
                            out.push('\n');
                        }
                    }
                }
            }

            if let Some(contents) = *template_contents {
                for &child in &dom.node(contents).children {
                    serialize_node_to(dom, child, out);
                }
            } else {
                for &child in &node.children {
                    serialize_node_to(dom, child, out);
                }
            }

            out.push_str("</");
            out.push_str(&name.local);
            out.push('>');
        },
    }
}
