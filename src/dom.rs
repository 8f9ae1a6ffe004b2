// Copyright 2024-2026 The tagtree Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The DOM store: an append-only arena of nodes keyed by opaque [`NodeId`]
//! handles.
//!
//! Parent/child edges go through the arena, so the open-elements stack, the
//! active-formatting list and the tree itself can all reference the same
//! element without ownership cycles. Nodes are never destroyed before the
//! end of the parse; adoption-agency moves are O(1) edge rewrites.

use std::borrow::Cow;
use tendril::StrTendril;

use crate::interface::{Attribute, ExpandedName, Namespace, QualName, QuirksMode};

/// An opaque handle to a node in a [`Dom`] arena, unique for the lifetime
/// of the parse.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct NodeId(u32);

/// Either a node to insert, or text which may coalesce with a neighboring
/// text node.
pub enum NodeOrText {
    AppendNode(NodeId),
    AppendText(StrTendril),
}

/// What a node is.
pub enum NodeData {
    Document,
    Doctype {
        name: StrTendril,
        public_id: StrTendril,
        system_id: StrTendril,
    },
    Text {
        contents: StrTendril,
    },
    Comment {
        contents: StrTendril,
    },
    Element {
        name: QualName,
        attrs: Vec<Attribute>,
        /// For `<template>` elements, the content document fragment.
        /// Children parsed inside the template attach to the fragment, not
        /// to the template element itself.
        template_contents: Option<NodeId>,
        /// Is this a `math:annotation-xml` whose `encoding` is `text/html`
        /// or `application/xhtml+xml`? Computed at creation time; the
        /// foreign-content router asks for it on every token.
        mathml_annotation_xml_integration_point: bool,
    },
}

/// One node record in the arena.
pub struct Node {
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub data: NodeData,
}

/// The DOM arena. One per parse invocation.
pub struct Dom {
    nodes: Vec<Node>,
    /// The document node.
    pub document: NodeId,
    /// Quirks mode computed from the doctype.
    pub quirks_mode: QuirksMode,
    /// Parse errors, in the order encountered. Non-fatal by construction.
    pub errors: Vec<Cow<'static, str>>,
}

impl Default for Dom {
    fn default() -> Dom {
        Dom::new()
    }
}

impl Dom {
    pub fn new() -> Dom {
        let mut dom = Dom {
            nodes: vec![],
            document: NodeId(0),
            quirks_mode: QuirksMode::NoQuirks,
            errors: vec![],
        };
        let document = dom.new_node(NodeData::Document);
        debug_assert_eq!(document, dom.document);
        dom
    }

    fn new_node(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            parent: None,
            children: vec![],
            data,
        });
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0 as usize]
    }

    /// Create an element. `<template>` gets a content fragment;
    /// `math:annotation-xml` gets its integration-point bit computed from
    /// the `encoding` attribute.
    pub fn create_element(&mut self, name: QualName, attrs: Vec<Attribute>) -> NodeId {
        let template_contents = if name.ns == Namespace::Html && &*name.local == "template" {
            Some(self.new_node(NodeData::Document))
        } else {
            None
        };
        let mathml_annotation_xml_integration_point = name.ns == Namespace::MathMl
            && &*name.local == "annotation-xml"
            && attrs.iter().any(|attr| {
                &*attr.name.local == "encoding"
                    && (attr.value.eq_ignore_ascii_case("text/html")
                        || attr.value.eq_ignore_ascii_case("application/xhtml+xml"))
            });
        self.new_node(NodeData::Element {
            name,
            attrs,
            template_contents,
            mathml_annotation_xml_integration_point,
        })
    }

    pub fn create_comment(&mut self, contents: StrTendril) -> NodeId {
        self.new_node(NodeData::Comment { contents })
    }

    pub fn append_doctype_to_document(
        &mut self,
        name: StrTendril,
        public_id: StrTendril,
        system_id: StrTendril,
    ) {
        let doctype = self.new_node(NodeData::Doctype {
            name,
            public_id,
            system_id,
        });
        let document = self.document;
        self.append(document, NodeOrText::AppendNode(doctype));
    }

    /// The (namespace, local) name of an element node.
    pub fn elem_name(&self, id: NodeId) -> ExpandedName<'_> {
        match self.node(id).data {
            NodeData::Element { ref name, .. } => ExpandedName {
                ns: name.ns,
                local: &name.local,
            },
            _ => panic!("not an element"),
        }
    }

    pub fn is_mathml_annotation_xml_integration_point(&self, id: NodeId) -> bool {
        match self.node(id).data {
            NodeData::Element {
                mathml_annotation_xml_integration_point,
                ..
            } => mathml_annotation_xml_integration_point,
            _ => false,
        }
    }

    /// The content fragment of a `<template>` element.
    pub fn template_contents(&self, id: NodeId) -> NodeId {
        match self.node(id).data {
            NodeData::Element {
                template_contents: Some(contents),
                ..
            } => contents,
            _ => panic!("not a template element"),
        }
    }

    /// Append a node or text as the last child of `parent`. Text coalesces
    /// with a trailing text sibling instead of creating a new node.
    pub fn append(&mut self, parent: NodeId, child: NodeOrText) {
        match child {
            NodeOrText::AppendNode(node) => {
                debug_assert!(self.node(node).parent.is_none(), "node already has a parent");
                self.node_mut(node).parent = Some(parent);
                self.node_mut(parent).children.push(node);
            },
            NodeOrText::AppendText(text) => {
                if let Some(&last) = self.node(parent).children.last() {
                    if let NodeData::Text { ref mut contents } = self.node_mut(last).data {
                        contents.push_tendril(&text);
                        return;
                    }
                }
                let node = self.new_node(NodeData::Text { contents: text });
                self.node_mut(node).parent = Some(parent);
                self.node_mut(parent).children.push(node);
            },
        }
    }

    /// Insert a node or text immediately before `sibling` under its parent.
    /// Text coalesces with the preceding sibling when that is a text node.
    pub fn append_before_sibling(&mut self, sibling: NodeId, child: NodeOrText) {
        let parent = self
            .node(sibling)
            .parent
            .expect("append_before_sibling called on detached node");
        let position = self
            .node(parent)
            .children
            .iter()
            .position(|&c| c == sibling)
            .expect("parent does not contain sibling");

        match child {
            NodeOrText::AppendNode(node) => {
                debug_assert!(self.node(node).parent.is_none(), "node already has a parent");
                self.node_mut(node).parent = Some(parent);
                self.node_mut(parent).children.insert(position, node);
            },
            NodeOrText::AppendText(text) => {
                if position > 0 {
                    let prev = self.node(parent).children[position - 1];
                    if let NodeData::Text { ref mut contents } = self.node_mut(prev).data {
                        contents.push_tendril(&text);
                        return;
                    }
                }
                let node = self.new_node(NodeData::Text { contents: text });
                self.node_mut(node).parent = Some(parent);
                self.node_mut(parent).children.insert(position, node);
            },
        }
    }

    /// The foster-parenting insertion op: if `element` has a parent, insert
    /// before `element`; otherwise append to `prev_element`.
    pub fn append_based_on_parent_node(
        &mut self,
        element: NodeId,
        prev_element: NodeId,
        child: NodeOrText,
    ) {
        if self.node(element).parent.is_some() {
            self.append_before_sibling(element, child);
        } else {
            self.append(prev_element, child);
        }
    }

    /// Detach a node from its parent, if any.
    pub fn remove_from_parent(&mut self, target: NodeId) {
        let Some(parent) = self.node(target).parent else {
            return;
        };
        self.node_mut(target).parent = None;
        let children = &mut self.node_mut(parent).children;
        let position = children
            .iter()
            .position(|&c| c == target)
            .expect("parent does not contain child");
        children.remove(position);
    }

    /// Move all children of `node` to `new_parent`, preserving order.
    pub fn reparent_children(&mut self, node: NodeId, new_parent: NodeId) {
        let children = std::mem::take(&mut self.node_mut(node).children);
        for &child in &children {
            self.node_mut(child).parent = Some(new_parent);
        }
        self.node_mut(new_parent).children.extend_from_slice(&children);
    }

    /// Add each attribute the element does not already have. The merge rule
    /// for repeated `<html>` and `<body>` start tags.
    pub fn add_attrs_if_missing(&mut self, target: NodeId, new_attrs: Vec<Attribute>) {
        match self.node_mut(target).data {
            NodeData::Element { ref mut attrs, .. } => {
                for attr in new_attrs {
                    if !attrs.iter().any(|a| a.name.local == attr.name.local) {
                        attrs.push(attr);
                    }
                }
            },
            _ => panic!("not an element"),
        }
    }

    /// The children of the document node.
    pub fn document_children(&self) -> &[NodeId] {
        &self.node(self.document).children
    }

    /// For fragment parses: the children of the synthetic `html` root.
    pub fn fragment_children(&self) -> &[NodeId] {
        let root = *self
            .document_children()
            .first()
            .expect("fragment parse left no root");
        &self.node(root).children
    }
}

#[cfg(test)]
mod test {
    use super::{Dom, NodeData, NodeOrText};
    use crate::interface::QualName;
    use tendril::SliceExt;

    #[test]
    fn text_coalesces_on_append() {
        let mut dom = Dom::new();
        let div = dom.create_element(QualName::html("div"), vec![]);
        let document = dom.document;
        dom.append(document, NodeOrText::AppendNode(div));
        dom.append(div, NodeOrText::AppendText("a".to_tendril()));
        dom.append(div, NodeOrText::AppendText("b".to_tendril()));
        assert_eq!(dom.node(div).children.len(), 1);
        let text = dom.node(div).children[0];
        match dom.node(text).data {
            NodeData::Text { ref contents } => assert_eq!(&**contents, "ab"),
            _ => panic!("expected text node"),
        }
    }

    #[test]
    fn text_coalesces_when_fostered_before_sibling() {
        let mut dom = Dom::new();
        let body = dom.create_element(QualName::html("body"), vec![]);
        let table = dom.create_element(QualName::html("table"), vec![]);
        let document = dom.document;
        dom.append(document, NodeOrText::AppendNode(body));
        dom.append(body, NodeOrText::AppendText("x".to_tendril()));
        dom.append(body, NodeOrText::AppendNode(table));
        dom.append_before_sibling(table, NodeOrText::AppendText("y".to_tendril()));
        assert_eq!(dom.node(body).children.len(), 2);
        let text = dom.node(body).children[0];
        match dom.node(text).data {
            NodeData::Text { ref contents } => assert_eq!(&**contents, "xy"),
            _ => panic!("expected text node"),
        }
    }

    #[test]
    fn template_gets_content_fragment() {
        let mut dom = Dom::new();
        let template = dom.create_element(QualName::html("template"), vec![]);
        let contents = dom.template_contents(template);
        let p = dom.create_element(QualName::html("p"), vec![]);
        dom.append(contents, NodeOrText::AppendNode(p));
        assert!(dom.node(template).children.is_empty());
        assert_eq!(dom.node(contents).children, vec![p]);
    }
}
