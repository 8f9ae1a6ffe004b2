// Copyright 2024-2026 The tagtree Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Tree-construction tests in the html5lib `#data`/`#document` format,
//! checked against the canonical indented `| ` tree dump.

use std::collections::HashMap;
use std::mem;

use tagtree::dom::{Dom, NodeData, NodeId};
use tagtree::interface::{Namespace, QuirksMode};
use tagtree::serialize::serialize_document;
use tagtree::{parse_document, parse_fragment, ParseOpts};

fn serialize(dom: &Dom, buf: &mut String, indent: usize, handle: NodeId) {
    buf.push('|');
    buf.push_str(&" ".repeat(indent));

    let node = dom.node(handle);
    match node.data {
        NodeData::Document => panic!("should not reach Document"),

        NodeData::Doctype {
            ref name,
            ref public_id,
            ref system_id,
        } => {
            buf.push_str("<!DOCTYPE ");
            buf.push_str(name);
            if !public_id.is_empty() || !system_id.is_empty() {
                buf.push_str(&format!(" \"{public_id}\" \"{system_id}\""));
            }
            buf.push_str(">\n");
        },

        NodeData::Text { ref contents } => {
            buf.push('"');
            buf.push_str(contents);
            buf.push_str("\"\n");
        },

        NodeData::Comment { ref contents } => {
            buf.push_str("<!-- ");
            buf.push_str(contents);
            buf.push_str(" -->\n");
        },

        NodeData::Element {
            ref name,
            ref attrs,
            ..
        } => {
            buf.push('<');
            match name.ns {
                Namespace::Svg => buf.push_str("svg "),
                Namespace::MathMl => buf.push_str("math "),
                _ => (),
            }
            buf.push_str(&name.local);
            buf.push_str(">\n");

            let mut attrs = attrs.clone();
            attrs.sort_by(|x, y| {
                let x: &str = &x.name.local;
                let y: &str = &y.name.local;
                x.cmp(y)
            });

            for attr in attrs.into_iter() {
                buf.push('|');
                buf.push_str(&" ".repeat(indent + 2));
                match attr.name.ns {
                    Namespace::Xlink => buf.push_str("xlink "),
                    Namespace::Xml => buf.push_str("xml "),
                    Namespace::Xmlns => buf.push_str("xmlns "),
                    _ => (),
                }
                buf.push_str(&format!("{}=\"{}\"\n", attr.name.local, attr.value));
            }
        },
    }

    for &child in &node.children {
        serialize(dom, buf, indent + 2, child);
    }

    if let NodeData::Element {
        template_contents: Some(contents),
        ..
    } = node.data
    {
        buf.push('|');
        buf.push_str(&" ".repeat(indent + 2));
        buf.push_str("content\n");
        for &child in &dom.node(contents).children {
            serialize(dom, buf, indent + 4, child);
        }
    }
}

fn dump(dom: &Dom, roots: &[NodeId]) -> String {
    let mut buf = String::new();
    for &child in roots {
        serialize(dom, &mut buf, 1, child);
    }
    buf.pop(); // drop the trailing newline
    buf
}

/// Parse a `#data` / `#document` block file into per-test field maps.
fn parse_tests(src: &str) -> Vec<HashMap<String, String>> {
    let mut tests = vec![];
    let mut test = HashMap::new();
    let mut key: Option<String> = None;
    let mut val = String::new();

    for line in src.lines() {
        if let Some(marker) = line.strip_prefix('#') {
            if let Some(key) = key.take() {
                assert!(test.insert(key, mem::take(&mut val)).is_none());
            }
            if marker == "data" {
                if !test.is_empty() {
                    tests.push(mem::take(&mut test));
                }
            }
            key = Some(marker.to_string());
        } else {
            val.push_str(line);
            val.push('\n');
        }
    }

    if let Some(key) = key.take() {
        assert!(test.insert(key, val).is_none());
    }
    if !test.is_empty() {
        tests.push(test);
    }
    tests
}

fn run_block(fields: &HashMap<String, String>) {
    let mut data = fields.get("data").expect("missing data").clone();
    data.pop();
    let expected = fields
        .get("document")
        .expect("missing document")
        .trim_end_matches('\n')
        .to_string();

    let (dom, result) = match fields.get("document-fragment") {
        None => {
            let dom = parse_document(data.as_bytes(), ParseOpts::default());
            let result = dump(&dom, dom.document_children());
            (dom, result)
        },
        Some(context) => {
            let dom = parse_fragment(data.as_bytes(), context.trim_end(), ParseOpts::default())
                .expect("bad fragment context");
            let result = dump(&dom, dom.fragment_children());
            (dom, result)
        },
    };
    check_tree_invariants(&dom);

    assert!(
        result == expected,
        "\ninput: {data}\ngot:\n{result}\nexpected:\n{expected}\n"
    );
}

/// Structural invariants that hold for every parse: parent/child edges
/// agree, and adjacent text nodes never coexist.
fn check_tree_invariants(dom: &Dom) {
    fn walk(dom: &Dom, id: NodeId) {
        let node = dom.node(id);
        let mut prev_was_text = false;
        for &child in &node.children {
            assert_eq!(dom.node(child).parent, Some(id), "parent edge mismatch");
            let is_text = matches!(dom.node(child).data, NodeData::Text { .. });
            assert!(!(prev_was_text && is_text), "adjacent text nodes");
            prev_was_text = is_text;
            walk(dom, child);
        }
        if let NodeData::Element {
            template_contents: Some(contents),
            ..
        } = node.data
        {
            walk(dom, contents);
        }
    }
    walk(dom, dom.document);
}

#[test]
fn tree_construction() {
    let tests = parse_tests(SUITE);
    assert!(!tests.is_empty());
    for fields in &tests {
        run_block(fields);
    }
}

#[test]
fn quirks_mode_from_doctype() {
    let dom = parse_document(b"<p>x", ParseOpts::default());
    assert_eq!(dom.quirks_mode, QuirksMode::Quirks);

    let dom = parse_document(b"<!DOCTYPE html><p>x", ParseOpts::default());
    assert_eq!(dom.quirks_mode, QuirksMode::NoQuirks);

    let dom = parse_document(
        b"<!DOCTYPE html PUBLIC \"-//W3C//DTD XHTML 1.0 Transitional//EN\" \"x\">",
        ParseOpts::default(),
    );
    assert_eq!(dom.quirks_mode, QuirksMode::LimitedQuirks);
}

#[test]
fn parse_errors_are_collected_but_nonfatal() {
    let dom = parse_document(b"</p><b><i></b>", ParseOpts::default());
    assert!(!dom.errors.is_empty());
    // The html root still exists.
    assert!(!dom.document_children().is_empty());
}

#[test]
fn head_always_precedes_body() {
    for input in [
        "x",
        "<body>x",
        "<head></head>y",
        "<!DOCTYPE html><title>t</title>b",
    ] {
        let dom = parse_document(input.as_bytes(), ParseOpts::default());
        let html = dom
            .document_children()
            .iter()
            .copied()
            .find(|&id| matches!(dom.node(id).data, NodeData::Element { .. }))
            .expect("no html root");
        let elems: Vec<&str> = dom
            .node(html)
            .children
            .iter()
            .filter_map(|&id| match dom.node(id).data {
                NodeData::Element { ref name, .. } => Some(&*name.local),
                _ => None,
            })
            .collect();
        assert_eq!(elems, ["head", "body"], "input: {input}");
    }
}

#[test]
fn reparse_of_serialized_output_is_identical() {
    for input in [
        "<p>Hello</p>",
        "<p><b>1<p>2",
        "<a>1<b>2</a>3",
        "<p>1<b>2<i>3</b>4</i>5",
        "<table><tr><td>a</td></tr></table>",
        "<!DOCTYPE html><table><b>x",
        "<ul><li>a<li>b</ul>",
        "<select><option>1<option>2</select>",
        "<svg><foreignObject><div>x</div></foreignObject></svg>",
        "<math definitionurl=\"x\" xlink:href=\"y\"></math>",
        "<template><p>x</p></template>",
        "<pre>\n\nx</pre>",
        "<script><!--<script>a</script>--></script>x",
        "x</br>y",
        "<table><input type=hidden></table>",
    ] {
        let first = parse_document(input.as_bytes(), ParseOpts::default());
        let html = serialize_document(&first);
        let second = parse_document(html.as_bytes(), ParseOpts::default());
        assert!(
            dump(&first, first.document_children()) == dump(&second, second.document_children()),
            "round trip diverged\ninput: {input}\nserialized: {html}"
        );
    }
}

static SUITE: &str = r##"#data
<p>Hello</p>
#document
| <html>
|   <head>
|   <body>
|     <p>
|       "Hello"

#data
<!DOCTYPE html><table><b>x
#document
| <!DOCTYPE html>
| <html>
|   <head>
|   <body>
|     <b>
|       "x"
|     <table>

#data
<p><b>1<p>2
#document
| <html>
|   <head>
|   <body>
|     <p>
|       <b>
|         "1"
|     <p>
|       <b>
|         "2"

#data
<svg><foreignObject><div>x</div></foreignObject></svg>
#document
| <html>
|   <head>
|   <body>
|     <svg svg>
|       <svg foreignObject>
|         <div>
|           "x"

#data
<!--a--><html><!--b--><body><!--c-->
#document
| <!-- a -->
| <html>
|   <!-- b -->
|   <head>
|   <body>
|     <!-- c -->

#data
<table><tr><td>a</td></tr></table>
#document
| <html>
|   <head>
|   <body>
|     <table>
|       <tbody>
|         <tr>
|           <td>
|             "a"

#data
<a>1<b>2</a>3
#document
| <html>
|   <head>
|   <body>
|     <a>
|       "1"
|       <b>
|         "2"
|     <b>
|       "3"

#data
<p>1<b>2<i>3</b>4</i>5
#document
| <html>
|   <head>
|   <body>
|     <p>
|       "1"
|       <b>
|         "2"
|         <i>
|           "3"
|       <i>
|         "4"
|       "5"

#data
<!doctype html><p><b><b><b><b><p>x
#document
| <!DOCTYPE html>
| <html>
|   <head>
|   <body>
|     <p>
|       <b>
|         <b>
|           <b>
|             <b>
|     <p>
|       <b>
|         <b>
|           <b>
|             "x"

#data
<h1><h2>x
#document
| <html>
|   <head>
|   <body>
|     <h1>
|     <h2>
|       "x"

#data
<template><p>x</p></template>
#document
| <html>
|   <head>
|     <template>
|       content
|         <p>
|           "x"
|   <body>

#data
<select><option>1<option>2</select>
#document
| <html>
|   <head>
|   <body>
|     <select>
|       <option>
|         "1"
|       <option>
|         "2"

#data
<table><tr><td><select><td>x
#document
| <html>
|   <head>
|   <body>
|     <table>
|       <tbody>
|         <tr>
|           <td>
|             <select>
|           <td>
|             "x"

#data
<table><input type=hidden></table>
#document
| <html>
|   <head>
|   <body>
|     <table>
|       <input>
|         type="hidden"

#data
<table><input type=text></table>
#document
| <html>
|   <head>
|   <body>
|     <input>
|       type="text"
|     <table>

#data
<p><table></table>
#document
| <html>
|   <head>
|   <body>
|     <p>
|       <table>

#data
<!DOCTYPE html><p><table></table>
#document
| <!DOCTYPE html>
| <html>
|   <head>
|   <body>
|     <p>
|     <table>

#data
<frameset><frame></frameset><noframes>x
#document
| <html>
|   <head>
|   <frameset>
|     <frame>
|   <noframes>
|     "x"

#data
<svg><circle></circle><div>x
#document
| <html>
|   <head>
|   <body>
|     <svg svg>
|       <svg circle>
|     <div>
|       "x"

#data
<math><mi>a<b>b</b></mi></math>
#document
| <html>
|   <head>
|   <body>
|     <math math>
|       <math mi>
|         "a"
|         <b>
|           "b"

#data
<math><annotation-xml encoding="text/html"><div>x</div></annotation-xml></math>
#document
| <html>
|   <head>
|   <body>
|     <math math>
|       <math annotation-xml>
|         encoding="text/html"
|         <div>
|           "x"

#data
<math definitionurl="x" xlink:href="y"></math>
#document
| <html>
|   <head>
|   <body>
|     <math math>
|       definitionURL="x"
|       xlink href="y"

#data
<svg viewbox="0 0 1 1"></svg>
#document
| <html>
|   <head>
|   <body>
|     <svg svg>
|       viewBox="0 0 1 1"

#data
<svg><![CDATA[<b>]]></svg>x
#document
| <html>
|   <head>
|   <body>
|     <svg svg>
|       "<b>"
|     "x"

#data
<![CDATA[x]]>
#document
| <!-- [CDATA[x]] -->
| <html>
|   <head>
|   <body>

#data
<pre>
x</pre>
#document
| <html>
|   <head>
|   <body>
|     <pre>
|       "x"

#data
<pre>

x</pre>
#document
| <html>
|   <head>
|   <body>
|     <pre>
|       "
x"

#data
<textarea>
x</textarea>
#document
| <html>
|   <head>
|   <body>
|     <textarea>
|       "x"

#data
<body>x</body>y
#document
| <html>
|   <head>
|   <body>
|     "xy"

#data
<script><!--<script>a</script>--></script>x
#document
| <html>
|   <head>
|     <script>
|       "<!--<script>a</script>-->"
|   <body>
|     "x"

#data
<nobr>a<nobr>b
#document
| <html>
|   <head>
|   <body>
|     <nobr>
|       "a"
|     <nobr>
|       "b"

#data
x</br>y
#document
| <html>
|   <head>
|   <body>
|     "x"
|     <br>
|     "y"

#data
<image src=x>
#document
| <html>
|   <head>
|   <body>
|     <img>
|       src="x"

#data
<ul><li>a<li>b</ul>
#document
| <html>
|   <head>
|   <body>
|     <ul>
|       <li>
|         "a"
|       <li>
|         "b"

#data
<dl><dt>a<dd>b</dl>
#document
| <html>
|   <head>
|   <body>
|     <dl>
|       <dt>
|         "a"
|       <dd>
|         "b"

#data
<body a=1><body b=2>
#document
| <html>
|   <head>
|   <body>
|     a="1"
|     b="2"

#data
<html a=1><html a=2 b=3>
#document
| <html>
|   a="1"
|   b="3"
|   <head>
|   <body>

#data
<table><caption>hi</caption><tr><td>a</table>
#document
| <html>
|   <head>
|   <body>
|     <table>
|       <caption>
|         "hi"
|       <tbody>
|         <tr>
|           <td>
|             "a"

#data
<table><colgroup><col span=2></table>
#document
| <html>
|   <head>
|   <body>
|     <table>
|       <colgroup>
|         <col>
|           span="2"

#data
<table><table>x
#document
| <html>
|   <head>
|   <body>
|     <table>
|     "x"
|     <table>

#data
<table> </table>
#document
| <html>
|   <head>
|   <body>
|     <table>
|       " "

#data
<!DOCTYPE html PUBLIC "-//W3C//DTD HTML 4.01//EN" "http://www.w3.org/TR/html4/strict.dtd"><p>x
#document
| <!DOCTYPE html "-//W3C//DTD HTML 4.01//EN" "http://www.w3.org/TR/html4/strict.dtd">
| <html>
|   <head>
|   <body>
|     <p>
|       "x"

#data
x<frameset></frameset>
#document
| <html>
|   <head>
|   <body>
|     "x"

#data
<frameset></frameset>
#document
| <html>
|   <head>
|   <frameset>

#data
<plaintext>a</plaintext><b>
#document
| <html>
|   <head>
|   <body>
|     <plaintext>
|       "a</plaintext><b>"

#data
<p>a<xmp><b></xmp>
#document
| <html>
|   <head>
|   <body>
|     <p>
|       "a"
|     <xmp>
|       "<b>"

#data
<td>x</td>
#document-fragment
tr
#document
| <td>
|   "x"

#data
<path d="m"/><b>
#document-fragment
svg path
#document
| <svg path>
|   d="m"
| <b>

#data
<tr><td>x
#document-fragment
template
#document
| <tr>
|   <td>
|     "x"

#data
</title>x
#document-fragment
title
#document
| "</title>x"
"##;
