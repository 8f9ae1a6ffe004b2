// Copyright 2024-2026 The tagtree Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Names, namespaces and attributes, shared by the tokenizer and the tree
//! builder.

use std::fmt;
use tendril::StrTendril;

/// An interned local (tag or attribute) name.
///
/// Names are interned so that the tree builder can clone and compare them
/// cheaply; the hot paths clone names far more often than they create them.
pub type LocalName = string_cache::DefaultAtom;

/// An interned namespace prefix (`xlink` in `xlink:href`).
pub type Prefix = string_cache::DefaultAtom;

/// One of the namespaces that can occur in an HTML document.
///
/// HTML parsing never produces namespaces outside this closed set, so there
/// is no need to carry interned URLs the way an XML parser would.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Namespace {
    /// No namespace; used for ordinary attributes.
    None,
    Html,
    Svg,
    MathMl,
    Xml,
    Xlink,
    Xmlns,
}

impl Namespace {
    /// The namespace URL, as it would appear in a DOM.
    pub fn url(self) -> &'static str {
        match self {
            Namespace::None => "",
            Namespace::Html => "http://www.w3.org/1999/xhtml",
            Namespace::Svg => "http://www.w3.org/2000/svg",
            Namespace::MathMl => "http://www.w3.org/1998/Math/MathML",
            Namespace::Xml => "http://www.w3.org/XML/1998/namespace",
            Namespace::Xlink => "http://www.w3.org/1999/xlink",
            Namespace::Xmlns => "http://www.w3.org/2000/xmlns/",
        }
    }
}

/// A fully qualified name: optional prefix, namespace, local name.
///
/// Element names are `Html`, `Svg` or `MathMl`; attribute names are
/// `Namespace::None` except for the `xlink:*` / `xml:*` / `xmlns` attributes
/// the tree builder adjusts inside foreign content.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct QualName {
    pub prefix: Option<Prefix>,
    pub ns: Namespace,
    pub local: LocalName,
}

impl QualName {
    #[inline]
    pub fn new(prefix: Option<Prefix>, ns: Namespace, local: LocalName) -> QualName {
        QualName { prefix, ns, local }
    }

    /// A name in the HTML namespace with no prefix.
    #[inline]
    pub fn html(local: &str) -> QualName {
        QualName::new(None, Namespace::Html, LocalName::from(local))
    }

    /// An attribute name with no namespace.
    #[inline]
    pub fn attr(local: LocalName) -> QualName {
        QualName::new(None, Namespace::None, local)
    }

    #[inline]
    pub fn expanded(&self) -> ExpandedName<'_> {
        ExpandedName {
            ns: self.ns,
            local: &self.local,
        }
    }
}

/// A borrowed (namespace, local-name) pair, the currency of the tag-set
/// predicates in the tree builder.
#[derive(Clone, Copy, Eq, Hash)]
pub struct ExpandedName<'a> {
    pub ns: Namespace,
    pub local: &'a str,
}

impl<'a, 'b> PartialEq<ExpandedName<'a>> for ExpandedName<'b> {
    fn eq(&self, other: &ExpandedName<'a>) -> bool {
        self.ns == other.ns && self.local == other.local
    }
}

impl<'a> fmt::Debug for ExpandedName<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ns {
            Namespace::None | Namespace::Html => write!(f, "{}", self.local),
            ns => write!(f, "{{{}}}:{}", ns.url(), self.local),
        }
    }
}

/// A tag attribute.
///
/// The tokenizer creates every attribute with `Namespace::None`; the tree
/// builder adjusts the namespaced ones inside foreign elements.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct Attribute {
    pub name: QualName,
    pub value: StrTendril,
}

/// The document's quirks mode, computed from the doctype.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum QuirksMode {
    Quirks,
    LimitedQuirks,
    NoQuirks,
}
