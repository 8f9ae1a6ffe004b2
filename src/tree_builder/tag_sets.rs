// Copyright 2024-2026 The tagtree Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Various sets of HTML tag names, and macros for declaring them.

use crate::interface::{ExpandedName, Namespace};

/// Declare a predicate over element names. Plain string lists match names
/// in the HTML namespace; `[base] + ...` extends another set and
/// `[base] - ...` carves HTML names out of one.
macro_rules! declare_tag_set (
    (pub $name:ident = [$supr:ident] - $($tag:tt)+) => (
        pub(crate) fn $name(p: crate::interface::ExpandedName) -> bool {
            match (p.ns, p.local) {
                (crate::interface::Namespace::Html, $($tag)|+) => false,
                _ => $supr(p),
            }
        }
    );

    (pub $name:ident = [$supr:ident] + $($tag:tt)+) => (
        pub(crate) fn $name(p: crate::interface::ExpandedName) -> bool {
            match (p.ns, p.local) {
                (crate::interface::Namespace::Html, $($tag)|+) => true,
                _ => $supr(p),
            }
        }
    );

    (pub $name:ident = $($tag:tt)+) => (
        pub(crate) fn $name(p: crate::interface::ExpandedName) -> bool {
            matches!((p.ns, p.local), (crate::interface::Namespace::Html, $($tag)|+))
        }
    );

    ($name:ident = [$supr:ident] - $($tag:tt)+) => (
        fn $name(p: crate::interface::ExpandedName) -> bool {
            match (p.ns, p.local) {
                (crate::interface::Namespace::Html, $($tag)|+) => false,
                _ => $supr(p),
            }
        }
    );

    ($name:ident = [$supr:ident] + $($tag:tt)+) => (
        fn $name(p: crate::interface::ExpandedName) -> bool {
            match (p.ns, p.local) {
                (crate::interface::Namespace::Html, $($tag)|+) => true,
                _ => $supr(p),
            }
        }
    );

    ($name:ident = $($tag:tt)+) => (
        fn $name(p: crate::interface::ExpandedName) -> bool {
            matches!((p.ns, p.local), (crate::interface::Namespace::Html, $($tag)|+))
        }
    );
);

/// The MathML text integration points.
pub(crate) fn mathml_text_integration_point(p: ExpandedName) -> bool {
    matches!(
        (p.ns, p.local),
        (Namespace::MathMl, "mi" | "mo" | "mn" | "ms" | "mtext")
    )
}

/// The SVG HTML integration points.
///
/// `math:annotation-xml` is also an HTML integration point when its
/// `encoding` attribute says so; that is per-element state, checked on the
/// DOM record rather than here.
pub(crate) fn svg_html_integration_point(p: ExpandedName) -> bool {
    matches!(
        (p.ns, p.local),
        (Namespace::Svg, "foreignObject" | "desc" | "title")
    )
}

declare_tag_set!(pub html_default_scope =
    "applet" "caption" "html" "table" "td" "th" "marquee" "object" "template");

/// The default scope boundary set, including the foreign integration
/// points.
pub(crate) fn default_scope(p: ExpandedName) -> bool {
    html_default_scope(p)
        || mathml_text_integration_point(p)
        || svg_html_integration_point(p)
        || matches!((p.ns, p.local), (Namespace::MathMl, "annotation-xml"))
}

declare_tag_set!(pub list_item_scope = [default_scope] + "ol" "ul");
declare_tag_set!(pub button_scope = [default_scope] + "button");
declare_tag_set!(pub table_scope = "html" "table" "template");

/// "Select scope" has complement semantics: everything except optgroup and
/// option is a boundary.
pub(crate) fn select_scope(p: ExpandedName) -> bool {
    !matches!((p.ns, p.local), (Namespace::Html, "optgroup" | "option"))
}

declare_tag_set!(pub table_body_context = "tbody" "tfoot" "thead" "template" "html");
declare_tag_set!(pub table_row_context = "tr" "template" "html");
declare_tag_set!(pub td_th = "td" "th");

declare_tag_set!(pub cursory_implied_end =
    "dd" "dt" "li" "option" "optgroup" "p" "rb" "rp" "rt" "rtc");

declare_tag_set!(pub thorough_implied_end = [cursory_implied_end]
    + "caption" "colgroup" "tbody" "td" "tfoot" "th" "thead" "tr");

declare_tag_set!(pub heading_tag = "h1" "h2" "h3" "h4" "h5" "h6");

declare_tag_set!(pub html_special_tag =
    "address" "applet" "area" "article" "aside" "base" "basefont" "bgsound" "blockquote"
    "body" "br" "button" "caption" "center" "col" "colgroup" "dd" "details" "dialog" "dir"
    "div" "dl" "dt" "embed" "fieldset" "figcaption" "figure" "footer" "form" "frame"
    "frameset" "h1" "h2" "h3" "h4" "h5" "h6" "head" "header" "hgroup" "hr" "html" "iframe"
    "img" "input" "isindex" "li" "link" "listing" "main" "marquee" "menu" "meta" "nav"
    "noembed" "noframes" "noscript" "object" "ol" "p" "param" "plaintext" "pre" "script"
    "search" "section" "select" "source" "style" "summary" "table" "tbody" "td" "template"
    "textarea" "tfoot" "th" "thead" "title" "tr" "track" "ul" "wbr" "xmp");

/// The "special" element category: scope boundaries and adoption-agency
/// furthest-block candidates.
pub(crate) fn special_tag(p: ExpandedName) -> bool {
    html_special_tag(p)
        || mathml_text_integration_point(p)
        || svg_html_integration_point(p)
        || matches!((p.ns, p.local), (Namespace::MathMl, "annotation-xml"))
}
