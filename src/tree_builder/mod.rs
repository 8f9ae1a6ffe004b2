// Copyright 2024-2026 The tagtree Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The HTML5 tree builder: the insertion-mode machine, the stack of open
//! elements, the list of active formatting elements, the adoption agency,
//! foster parenting and the foreign-content router.
//!
//! The builder owns the [`Dom`] arena it is building and implements
//! [`TokenSink`], so it plugs directly into the tokenizer; the feedback
//! loop ("is the adjusted current node foreign?") flows back through the
//! same trait.

use self::types::*;

use crate::dom::{Dom, NodeId, NodeOrText::{self, AppendNode, AppendText}};
use crate::interface::QuirksMode::{self, NoQuirks};
use crate::interface::{Attribute, ExpandedName, LocalName, Namespace, Prefix, QualName};
use crate::tokenizer::states as tok_state;
use crate::tokenizer::{self, Doctype, EndTag, StartTag, Tag, TokenSink, TokenSinkResult};
use crate::tree_builder::tag_sets::*;
use crate::util::str::to_escaped_string;

use log::{debug, log_enabled, warn, Level};
use mac::format_if;
use std::borrow::Cow::{self, Borrowed};
use std::collections::VecDeque;
use std::fmt;
use std::mem;
use tendril::StrTendril;

#[macro_use]
mod tag_sets;

mod data;
mod rules;
mod types;

/// Tree builder options, with an impl for Default.
#[derive(Copy, Clone)]
pub struct TreeBuilderOpts {
    /// Report all parse errors described in the spec, at some performance
    /// penalty? Default: false
    pub exact_errors: bool,

    /// Is scripting enabled?
    ///
    /// This affects how `<noscript>` elements are parsed: with scripting on
    /// their contents are a single text node, with scripting off a normal
    /// tree of nodes. No script ever runs either way.
    pub scripting_enabled: bool,

    /// Is this document being parsed from the `srcdoc` attribute of an
    /// `<iframe>` element? This affects the quirks mode inferred from the
    /// `<!DOCTYPE>`.
    pub iframe_srcdoc: bool,

    /// Should we drop the DOCTYPE (if any) from the tree?
    pub drop_doctype: bool,

    /// Initial quirks mode. Default: NoQuirks
    pub quirks_mode: QuirksMode,
}

impl Default for TreeBuilderOpts {
    fn default() -> TreeBuilderOpts {
        TreeBuilderOpts {
            exact_errors: false,
            scripting_enabled: true,
            iframe_srcdoc: false,
            drop_doctype: false,
            quirks_mode: NoQuirks,
        }
    }
}

/// Which stack effect an element insertion should have.
enum PushFlag {
    Push,
    NoPush,
}
use PushFlag::{NoPush, Push};

enum Bookmark {
    Replace(NodeId),
    InsertAfter(NodeId),
}

/// The HTML tree builder.
pub struct TreeBuilder {
    /// Options controlling the behavior of the tree builder.
    opts: TreeBuilderOpts,

    /// The arena receiving the tree.
    pub dom: Dom,

    /// Insertion mode.
    mode: InsertionMode,

    /// Original insertion mode, used by Text and InTableText modes.
    orig_mode: Option<InsertionMode>,

    /// Stack of template insertion modes.
    template_modes: Vec<InsertionMode>,

    /// Pending table character tokens.
    pending_table_text: Vec<(SplitStatus, StrTendril)>,

    /// Quirks mode as set by the parser.
    quirks_mode: QuirksMode,

    /// The document node.
    doc_handle: NodeId,

    /// Stack of open elements, most recently added at end.
    open_elems: Vec<NodeId>,

    /// List of active formatting elements.
    active_formatting: Vec<FormatEntry>,

    /// Head element pointer.
    head_elem: Option<NodeId>,

    /// Form element pointer.
    form_elem: Option<NodeId>,

    /// Frameset-ok flag.
    frameset_ok: bool,

    /// Ignore a following U+000A LINE FEED?
    ignore_lf: bool,

    /// Is foster parenting enabled?
    foster_parenting: bool,

    /// The context element for the fragment parsing algorithm.
    context_elem: Option<NodeId>,

    /// Track current line for error reports.
    current_line: u64,
}

impl TreeBuilder {
    /// Create a new tree builder which writes into a fresh [`Dom`].
    ///
    /// The tree builder is also a `TokenSink`.
    pub fn new(opts: TreeBuilderOpts) -> TreeBuilder {
        let dom = Dom::new();
        let doc_handle = dom.document;
        TreeBuilder {
            opts,
            dom,
            mode: InsertionMode::Initial,
            orig_mode: None,
            template_modes: vec![],
            pending_table_text: vec![],
            quirks_mode: opts.quirks_mode,
            doc_handle,
            open_elems: vec![],
            active_formatting: vec![],
            head_elem: None,
            form_elem: None,
            frameset_ok: true,
            ignore_lf: false,
            foster_parenting: false,
            context_elem: None,
            current_line: 1,
        }
    }

    /// Create a new tree builder for parsing a fragment inside `context`.
    ///
    /// The tree builder is also a `TokenSink`.
    pub fn new_for_fragment(opts: TreeBuilderOpts, context: QualName) -> TreeBuilder {
        let mut tb = TreeBuilder::new(opts);

        let context_is_template = context.ns == Namespace::Html && &*context.local == "template";
        if context_is_template {
            tb.template_modes.push(InsertionMode::InTemplate);
        }

        // The context element exists in the arena but stays detached; only
        // the children of the synthetic root are the result of the parse.
        let context_elem = tb.dom.create_element(context, vec![]);
        tb.context_elem = Some(context_elem);

        tb.create_root(vec![]);
        tb.mode = tb.reset_insertion_mode();

        tb
    }

    /// Consume the builder, yielding the finished tree.
    pub fn finish(mut self) -> Dom {
        self.dom.quirks_mode = self.quirks_mode;
        self.dom
    }

    /// The tokenizer state matching a fragment context element. The
    /// "appropriate end tag" name is deliberately NOT set, so end tags
    /// inside such content come out as characters.
    pub fn tokenizer_state_for_context_elem(&self) -> tok_state::State {
        let context_elem = self.context_elem.expect("no context element");
        let name = self.dom.elem_name(context_elem);
        if name.ns != Namespace::Html {
            return tok_state::Data;
        }
        match name.local {
            "title" | "textarea" => tok_state::RawData(tok_state::Rcdata),

            "style" | "xmp" | "iframe" | "noembed" | "noframes" => {
                tok_state::RawData(tok_state::Rawtext)
            },

            "script" => tok_state::RawData(tok_state::ScriptData),

            "noscript" => {
                if self.opts.scripting_enabled {
                    tok_state::RawData(tok_state::Rawtext)
                } else {
                    tok_state::Data
                }
            },

            "plaintext" => tok_state::Plaintext,

            _ => tok_state::Data,
        }
    }

    fn debug_step(&self, mode: InsertionMode, token: &Token) {
        if log_enabled!(Level::Debug) {
            debug!(
                "processing {} in insertion mode {:?}",
                to_escaped_string(token),
                mode
            );
        }
    }

    fn process_to_completion(&mut self, mut token: Token) -> TokenSinkResult {
        // Queue of additional tokens yet to be processed. This stays empty
        // in the common case where we don't split whitespace.
        let mut more_tokens = VecDeque::new();

        loop {
            let should_have_acknowledged_self_closing_flag = matches!(
                token,
                Token::Tag(Tag {
                    self_closing: true,
                    kind: StartTag,
                    ..
                })
            );
            let result = if self.is_foreign(&token) {
                self.step_foreign(token)
            } else {
                let mode = self.mode;
                self.step(mode, token)
            };
            match result {
                ProcessResult::Done => {
                    if should_have_acknowledged_self_closing_flag {
                        self.parse_error(Borrowed("Unacknowledged self-closing tag"));
                    }
                    let Some(new_token) = more_tokens.pop_front() else {
                        return TokenSinkResult::Continue;
                    };
                    token = new_token;
                },
                ProcessResult::DoneAckSelfClosing => {
                    let Some(new_token) = more_tokens.pop_front() else {
                        return TokenSinkResult::Continue;
                    };
                    token = new_token;
                },
                ProcessResult::Reprocess(m, t) => {
                    self.mode = m;
                    token = t;
                },
                ProcessResult::SplitWhitespace(mut buf) => {
                    let p = buf.pop_front_char_run(|c| c.is_ascii_whitespace());
                    let Some((first, is_ws)) = p else {
                        return TokenSinkResult::Continue;
                    };
                    let status = if is_ws {
                        SplitStatus::Whitespace
                    } else {
                        SplitStatus::NotWhitespace
                    };
                    token = Token::Characters(status, first);

                    if buf.len32() > 0 {
                        more_tokens.push_back(Token::Characters(SplitStatus::NotSplit, buf));
                    }
                },
                ProcessResult::ToPlaintext => {
                    assert!(more_tokens.is_empty());
                    return TokenSinkResult::Plaintext;
                },
                ProcessResult::ToRawData(k) => {
                    assert!(more_tokens.is_empty());
                    return TokenSinkResult::RawData(k);
                },
            }
        }
    }

    /// Are we parsing a HTML fragment?
    pub fn is_fragment(&self) -> bool {
        self.context_elem.is_some()
    }

    /// <https://html.spec.whatwg.org/multipage/#appropriate-place-for-inserting-a-node>
    fn appropriate_place_for_insertion(&self, override_target: Option<NodeId>) -> InsertionPoint {
        declare_tag_set!(foster_target = "table" "tbody" "tfoot" "thead" "tr");
        let target = override_target.unwrap_or_else(|| self.current_node());
        if !(self.foster_parenting && self.elem_in(target, foster_target)) {
            if self.html_elem_named(target, "template") {
                // No foster parenting (inside template).
                return InsertionPoint::LastChild(self.dom.template_contents(target));
            }
            // No foster parenting (the common case).
            return InsertionPoint::LastChild(target);
        }

        // Foster parenting
        let mut iter = self.open_elems.iter().rev().peekable();
        while let Some(&elem) = iter.next() {
            if self.html_elem_named(elem, "template") {
                return InsertionPoint::LastChild(self.dom.template_contents(elem));
            } else if self.html_elem_named(elem, "table") {
                return InsertionPoint::TableFosterParenting {
                    element: elem,
                    prev_element: **iter.peek().unwrap(),
                };
            }
        }
        InsertionPoint::LastChild(self.html_elem())
    }

    fn insert_at(&mut self, insertion_point: InsertionPoint, child: NodeOrText) {
        match insertion_point {
            InsertionPoint::LastChild(parent) => self.dom.append(parent, child),
            InsertionPoint::TableFosterParenting {
                element,
                prev_element,
            } => self
                .dom
                .append_based_on_parent_node(element, prev_element, child),
        }
    }

    fn parse_error(&mut self, msg: Cow<'static, str>) {
        debug!("parse error: {msg}");
        self.dom.errors.push(msg);
    }
}

impl TokenSink for TreeBuilder {
    fn process_token(&mut self, token: tokenizer::Token, line_number: u64) -> TokenSinkResult {
        self.current_line = line_number;
        let ignore_lf = mem::take(&mut self.ignore_lf);

        // Handle `ParseError` and `Doctype`; convert everything else to
        // the local `Token` type.
        let token = match token {
            tokenizer::Token::ParseError(e) => {
                self.parse_error(e);
                return TokenSinkResult::Continue;
            },

            tokenizer::Token::Doctype(dt) => {
                if self.mode == InsertionMode::Initial {
                    let (err, quirk) = data::doctype_error_and_quirks(&dt, self.opts.iframe_srcdoc);
                    if err {
                        let msg = format_if!(
                            self.opts.exact_errors,
                            "Bad DOCTYPE",
                            "Bad DOCTYPE: {:?}",
                            dt
                        );
                        self.parse_error(msg);
                    }
                    let Doctype {
                        name,
                        public_id,
                        system_id,
                        force_quirks: _,
                    } = dt;
                    if !self.opts.drop_doctype {
                        self.dom.append_doctype_to_document(
                            name.unwrap_or_default(),
                            public_id.unwrap_or_default(),
                            system_id.unwrap_or_default(),
                        );
                    }
                    self.set_quirks_mode(quirk);

                    self.mode = InsertionMode::BeforeHtml;
                } else {
                    let msg = format_if!(
                        self.opts.exact_errors,
                        "DOCTYPE in body",
                        "DOCTYPE in insertion mode {:?}",
                        self.mode
                    );
                    self.parse_error(msg);
                }
                return TokenSinkResult::Continue;
            },

            tokenizer::Token::Tag(x) => Token::Tag(x),
            tokenizer::Token::Comment(x) => Token::Comment(x),
            tokenizer::Token::NullCharacter => Token::NullCharacter,
            tokenizer::Token::Eof => Token::Eof,

            tokenizer::Token::Characters(mut x) => {
                if ignore_lf && x.starts_with("\n") {
                    x.pop_front(1);
                }
                if x.is_empty() {
                    return TokenSinkResult::Continue;
                }
                Token::Characters(SplitStatus::NotSplit, x)
            },
        };

        self.process_to_completion(token)
    }

    fn end(&mut self) {
        self.open_elems.clear();
    }

    fn adjusted_current_node_present_but_not_in_html_namespace(&self) -> bool {
        !self.open_elems.is_empty()
            && self.dom.elem_name(self.adjusted_current_node()).ns != Namespace::Html
    }
}

#[doc(hidden)]
impl TreeBuilder {
    fn unexpected<T: fmt::Debug>(&mut self, _thing: &T) -> ProcessResult {
        let msg = format_if!(
            self.opts.exact_errors,
            "Unexpected token",
            "Unexpected token {} in insertion mode {:?}",
            to_escaped_string(_thing),
            self.mode
        );
        self.parse_error(msg);
        ProcessResult::Done
    }

    fn assert_named(&self, node: NodeId, name: &str) {
        assert!(self.html_elem_named(node, name));
    }

    /// Iterate over the active formatting elements (with index in the
    /// list) from the end to the last marker, or the beginning if there
    /// are no markers.
    fn active_formatting_end_to_marker(&self) -> impl Iterator<Item = (usize, NodeId, &Tag)> + '_ {
        self.active_formatting
            .iter()
            .enumerate()
            .rev()
            .take_while(|(_, entry)| !matches!(entry, FormatEntry::Marker))
            .map(|(i, entry)| match entry {
                FormatEntry::Element(h, t) => (i, *h, t),
                FormatEntry::Marker => unreachable!(),
            })
    }

    fn position_in_active_formatting(&self, element: NodeId) -> Option<usize> {
        self.active_formatting.iter().position(|n| match n {
            FormatEntry::Marker => false,
            FormatEntry::Element(handle, _) => *handle == element,
        })
    }

    fn set_quirks_mode(&mut self, mode: QuirksMode) {
        self.quirks_mode = mode;
    }

    fn stop_parsing(&mut self) -> ProcessResult {
        ProcessResult::Done
    }

    /// Switch to `Text` insertion mode, save the old mode, and switch the
    /// tokenizer to a raw-data state. The latter only takes effect after
    /// the current `process_token` of a start tag returns!
    fn to_raw_text_mode(&mut self, k: tok_state::RawKind) -> ProcessResult {
        self.orig_mode = Some(self.mode);
        self.mode = InsertionMode::Text;
        ProcessResult::ToRawData(k)
    }

    // The generic raw text / RCDATA parsing algorithm.
    fn parse_raw_data(&mut self, tag: Tag, k: tok_state::RawKind) -> ProcessResult {
        self.insert_element_for(tag);
        self.to_raw_text_mode(k)
    }

    fn current_node(&self) -> NodeId {
        *self.open_elems.last().expect("no current element")
    }

    fn adjusted_current_node(&self) -> NodeId {
        if self.open_elems.len() == 1 {
            if let Some(ctx) = self.context_elem {
                return ctx;
            }
        }
        self.current_node()
    }

    fn current_node_in<TagSet>(&self, set: TagSet) -> bool
    where
        TagSet: Fn(ExpandedName) -> bool,
    {
        set(self.dom.elem_name(self.current_node()))
    }

    // Insert at the "appropriate place for inserting a node".
    fn insert_appropriately(&mut self, child: NodeOrText, override_target: Option<NodeId>) {
        let insertion_point = self.appropriate_place_for_insertion(override_target);
        self.insert_at(insertion_point, child);
    }

    //§ the-adoption-agency-algorithm
    fn adoption_agency(&mut self, subject: LocalName) {
        // 1.
        if self.current_node_named(&subject)
            && self
                .position_in_active_formatting(self.current_node())
                .is_none()
        {
            self.pop();
            return;
        }

        // 2. 3. 4.
        for _ in 0..8 {
            // 5.
            let maybe_fmt_entry = self
                .active_formatting_end_to_marker()
                .find(|&(_, _, tag)| tag.name == subject)
                .map(|(i, h, t)| (i, h, t.clone()));

            let Some((fmt_elem_index, fmt_elem, fmt_elem_tag)) = maybe_fmt_entry else {
                return self.process_end_tag_in_body(Tag {
                    kind: EndTag,
                    name: subject,
                    self_closing: false,
                    attrs: vec![],
                });
            };

            // 6.
            let Some(fmt_elem_stack_index) =
                self.open_elems.iter().rposition(|&n| n == fmt_elem)
            else {
                self.parse_error(Borrowed("Formatting element not open"));
                self.active_formatting.remove(fmt_elem_index);
                return;
            };

            // 7.
            if !self.in_scope(default_scope, |n| n == fmt_elem) {
                self.parse_error(Borrowed("Formatting element not in scope"));
                return;
            }

            // 8.
            if self.current_node() != fmt_elem {
                self.parse_error(Borrowed("Formatting element not current node"));
            }

            // 9.
            let maybe_furthest_block = self
                .open_elems
                .iter()
                .enumerate()
                .skip(fmt_elem_stack_index)
                .find(|&(_, &open_element)| self.elem_in(open_element, special_tag))
                .map(|(i, &h)| (i, h));

            let Some((furthest_block_index, furthest_block)) = maybe_furthest_block else {
                // 10.
                self.open_elems.truncate(fmt_elem_stack_index);
                self.active_formatting.remove(fmt_elem_index);
                return;
            };

            // 11.
            let common_ancestor = self.open_elems[fmt_elem_stack_index - 1];

            // 12.
            let mut bookmark = Bookmark::Replace(fmt_elem);

            // 13.
            let mut node;
            let mut node_index = furthest_block_index;
            let mut last_node = furthest_block;

            // 13.1.
            let mut inner_counter = 0;
            loop {
                // 13.2.
                inner_counter += 1;

                // 13.3.
                node_index -= 1;
                node = self.open_elems[node_index];

                // 13.4.
                if node == fmt_elem {
                    break;
                }

                // 13.5.
                if inner_counter > 3 {
                    if let Some(position) = self.position_in_active_formatting(node) {
                        self.active_formatting.remove(position);
                    }
                    self.open_elems.remove(node_index);
                    continue;
                }

                let Some(node_formatting_index) = self.position_in_active_formatting(node) else {
                    // 13.6.
                    self.open_elems.remove(node_index);
                    continue;
                };

                // 13.7.
                let tag = match self.active_formatting[node_formatting_index] {
                    FormatEntry::Element(h, ref t) => {
                        assert_eq!(h, node);
                        t.clone()
                    },
                    FormatEntry::Marker => panic!("Found marker during adoption agency"),
                };
                let new_element = self.dom.create_element(
                    QualName::new(None, Namespace::Html, tag.name.clone()),
                    tag.attrs.clone(),
                );
                self.open_elems[node_index] = new_element;
                self.active_formatting[node_formatting_index] =
                    FormatEntry::Element(new_element, tag);
                node = new_element;

                // 13.8.
                if last_node == furthest_block {
                    bookmark = Bookmark::InsertAfter(node);
                }

                // 13.9.
                self.dom.remove_from_parent(last_node);
                self.dom.append(node, AppendNode(last_node));

                // 13.10.
                last_node = node;

                // 13.11.
            }

            // 14.
            self.dom.remove_from_parent(last_node);
            self.insert_appropriately(AppendNode(last_node), Some(common_ancestor));

            // 15.
            let new_element = self.dom.create_element(
                QualName::new(None, Namespace::Html, fmt_elem_tag.name.clone()),
                fmt_elem_tag.attrs.clone(),
            );
            let new_entry = FormatEntry::Element(new_element, fmt_elem_tag);

            // 16.
            self.dom.reparent_children(furthest_block, new_element);

            // 17.
            self.dom.append(furthest_block, AppendNode(new_element));

            // 18.
            match bookmark {
                Bookmark::Replace(to_replace) => {
                    let index = self
                        .position_in_active_formatting(to_replace)
                        .expect("bookmark not found in active formatting elements");
                    self.active_formatting[index] = new_entry;
                },
                Bookmark::InsertAfter(previous) => {
                    let index = self
                        .position_in_active_formatting(previous)
                        .expect("bookmark not found in active formatting elements")
                        + 1;
                    self.active_formatting.insert(index, new_entry);
                    let old_index = self
                        .position_in_active_formatting(fmt_elem)
                        .expect("formatting element not found in active formatting elements");
                    self.active_formatting.remove(old_index);
                },
            }

            // 19.
            self.remove_from_stack(fmt_elem);
            let new_furthest_block_index = self
                .open_elems
                .iter()
                .position(|&n| n == furthest_block)
                .expect("furthest block missing from open element stack");
            self.open_elems
                .insert(new_furthest_block_index + 1, new_element);

            // 20.
        }
    }
    //§ END

    fn push(&mut self, elem: NodeId) {
        self.open_elems.push(elem);
    }

    fn pop(&mut self) -> NodeId {
        self.open_elems.pop().expect("no current element")
    }

    fn remove_from_stack(&mut self, elem: NodeId) {
        if let Some(position) = self.open_elems.iter().rposition(|&x| x == elem) {
            self.open_elems.remove(position);
        }
    }

    fn is_marker_or_open(&self, entry: &FormatEntry) -> bool {
        match *entry {
            FormatEntry::Marker => true,
            FormatEntry::Element(node, _) => self.open_elems.iter().rev().any(|&n| n == node),
        }
    }

    /// <https://html.spec.whatwg.org/#reconstruct-the-active-formatting-elements>
    fn reconstruct_active_formatting_elements(&mut self) {
        {
            // Step 1. If there are no entries in the list of active
            // formatting elements, there is nothing to reconstruct.
            let Some(last) = self.active_formatting.last() else {
                return;
            };

            // Step 2. If the last entry is a marker or an element that is
            // in the stack of open elements, there is nothing to
            // reconstruct.
            if self.is_marker_or_open(last) {
                return;
            }
        }

        // Step 3. Let entry be the last element in the list of active
        // formatting elements. We track the index of the element instead.
        let mut entry_index = self.active_formatting.len() - 1;
        loop {
            // Step 4. Rewind: if there are no entries before entry, jump
            // to the step labeled create.
            if entry_index == 0 {
                break;
            }

            // Step 5. Let entry be the entry one earlier.
            entry_index -= 1;

            // Step 6. If entry is neither a marker nor on the stack, go to
            // rewind. Step 7. Advance: let entry be the element one later.
            if self.is_marker_or_open(&self.active_formatting[entry_index]) {
                entry_index += 1;
                break;
            }
        }

        loop {
            // Step 8. Create: insert an HTML element for the token for
            // which the element entry was created, to obtain new element.
            let tag = match self.active_formatting[entry_index] {
                FormatEntry::Element(_, ref t) => t.clone(),
                FormatEntry::Marker => {
                    panic!("Found marker during formatting element reconstruction")
                },
            };

            let new_element =
                self.insert_element(Push, Namespace::Html, tag.name.clone(), tag.attrs.clone());

            // Step 9. Replace the entry for entry in the list with an
            // entry for new element.
            self.active_formatting[entry_index] = FormatEntry::Element(new_element, tag);

            // Step 10. If the entry for new element is not the last entry
            // in the list, return to the step labeled advance.
            if entry_index == self.active_formatting.len() - 1 {
                break;
            }
            entry_index += 1;
        }
    }

    /// Get the first element on the stack, which will be the <html>
    /// element.
    fn html_elem(&self) -> NodeId {
        self.open_elems[0]
    }

    /// Get the second element on the stack, if it's a HTML body element.
    fn body_elem(&self) -> Option<NodeId> {
        if self.open_elems.len() <= 1 {
            return None;
        }

        let node = self.open_elems[1];
        if self.html_elem_named(node, "body") {
            Some(node)
        } else {
            None
        }
    }

    /// Signal an error depending on the state of the stack of open
    /// elements at the end of the body.
    fn check_body_end(&mut self) {
        declare_tag_set!(body_end_ok =
            "dd" "dt" "li" "optgroup" "option" "p" "rp" "rt" "tbody" "td" "tfoot" "th"
            "thead" "tr" "body" "html");

        for i in 0..self.open_elems.len() {
            let name = {
                let name = self.dom.elem_name(self.open_elems[i]);
                if body_end_ok(name) {
                    continue;
                }
                format!("{name:?}")
            };
            let error = format_if!(
                self.opts.exact_errors,
                "Unexpected open tag at end of body",
                "Unexpected open tag {} at end of body",
                name
            );
            self.parse_error(error);
            // FIXME: Do we keep checking after finding one bad tag?
            // The spec suggests not.
            return;
        }
    }

    fn in_scope<TagSet, Pred>(&self, scope: TagSet, pred: Pred) -> bool
    where
        TagSet: Fn(ExpandedName) -> bool,
        Pred: Fn(NodeId) -> bool,
    {
        for &node in self.open_elems.iter().rev() {
            if pred(node) {
                return true;
            }
            if scope(self.dom.elem_name(node)) {
                return false;
            }
        }

        // supposed to be impossible, because <html> is always in scope
        false
    }

    fn elem_in<TagSet>(&self, elem: NodeId, set: TagSet) -> bool
    where
        TagSet: Fn(ExpandedName) -> bool,
    {
        set(self.dom.elem_name(elem))
    }

    fn html_elem_named(&self, elem: NodeId, name: &str) -> bool {
        let elem_name = self.dom.elem_name(elem);
        elem_name.ns == Namespace::Html && elem_name.local == name
    }

    fn in_html_elem_named(&self, name: &str) -> bool {
        self.open_elems
            .iter()
            .any(|&elem| self.html_elem_named(elem, name))
    }

    fn current_node_named(&self, name: &str) -> bool {
        self.html_elem_named(self.current_node(), name)
    }

    fn in_scope_named<TagSet>(&self, scope: TagSet, name: &str) -> bool
    where
        TagSet: Fn(ExpandedName) -> bool,
    {
        self.in_scope(scope, |elem| self.html_elem_named(elem, name))
    }

    /// <https://html.spec.whatwg.org/#generate-implied-end-tags>
    fn generate_implied_end_tags<TagSet>(&mut self, set: TagSet)
    where
        TagSet: Fn(ExpandedName) -> bool,
    {
        loop {
            {
                let Some(&elem) = self.open_elems.last() else {
                    return;
                };
                if !set(self.dom.elem_name(elem)) {
                    return;
                }
            }
            self.pop();
        }
    }

    fn generate_implied_end_except(&mut self, except: LocalName) {
        self.generate_implied_end_tags(|p| {
            if p.ns == Namespace::Html && p.local == &*except {
                false
            } else {
                cursory_implied_end(p)
            }
        });
    }

    // Pop elements until the current element is in the set.
    fn pop_until_current<TagSet>(&mut self, tag_set: TagSet)
    where
        TagSet: Fn(ExpandedName) -> bool,
    {
        while !self.current_node_in(&tag_set) {
            self.open_elems.pop();
        }
    }

    // Pop elements until an element from the set has been popped. Returns
    // the number of elements popped.
    fn pop_until<P>(&mut self, pred: P) -> usize
    where
        P: Fn(ExpandedName) -> bool,
    {
        let mut n = 0;
        loop {
            n += 1;
            match self.open_elems.pop() {
                None => break,
                Some(elem) => {
                    if pred(self.dom.elem_name(elem)) {
                        break;
                    }
                },
            }
        }
        n
    }

    fn pop_until_named(&mut self, name: &str) -> usize {
        self.pop_until(|p| p.ns == Namespace::Html && p.local == name)
    }

    /// Pop elements until one with the specified name has been popped.
    /// Signal an error if it was not the first one.
    fn expect_to_close(&mut self, name: &str) {
        if self.pop_until_named(name) != 1 {
            let msg = format_if!(
                self.opts.exact_errors,
                "Unexpected open element",
                "Unexpected open element while closing {:?}",
                name
            );
            self.parse_error(msg);
        }
    }

    fn close_p_element(&mut self) {
        declare_tag_set!(implied = [cursory_implied_end] - "p");
        self.generate_implied_end_tags(implied);
        self.expect_to_close("p");
    }

    fn close_p_element_in_button_scope(&mut self) {
        if self.in_scope_named(button_scope, "p") {
            self.close_p_element();
        }
    }

    // Check <input> tags for type=hidden.
    fn is_type_hidden(&self, tag: &Tag) -> bool {
        match tag
            .attrs
            .iter()
            .find(|&at| at.name.ns == Namespace::None && &*at.name.local == "type")
        {
            None => false,
            Some(at) => at.value.eq_ignore_ascii_case("hidden"),
        }
    }

    fn foster_parent_in_body(&mut self, token: Token) -> ProcessResult {
        warn!("foster parenting not fully general");
        self.foster_parenting = true;
        let res = self.step(InsertionMode::InBody, token);
        // FIXME: what if res is Reprocess?
        self.foster_parenting = false;
        res
    }

    fn process_chars_in_table(&mut self, token: Token) -> ProcessResult {
        declare_tag_set!(table_outer = "table" "tbody" "tfoot" "thead" "tr");
        if self.current_node_in(table_outer) {
            assert!(self.pending_table_text.is_empty());
            self.orig_mode = Some(self.mode);
            ProcessResult::Reprocess(InsertionMode::InTableText, token)
        } else {
            let msg = format_if!(
                self.opts.exact_errors,
                "Unexpected characters in table",
                "Unexpected characters {} in table",
                to_escaped_string(&token)
            );
            self.parse_error(msg);
            self.foster_parent_in_body(token)
        }
    }

    // https://html.spec.whatwg.org/multipage/#reset-the-insertion-mode-appropriately
    fn reset_insertion_mode(&self) -> InsertionMode {
        for (i, mut node) in self.open_elems.iter().copied().enumerate().rev() {
            let last = i == 0usize;
            if let (true, Some(ctx)) = (last, self.context_elem) {
                node = ctx;
            }
            let name = self.dom.elem_name(node);
            if name.ns != Namespace::Html {
                continue;
            }
            match name.local {
                "select" => {
                    for &ancestor in self.open_elems[0..i].iter().rev() {
                        if self.html_elem_named(ancestor, "template") {
                            return InsertionMode::InSelect;
                        } else if self.html_elem_named(ancestor, "table") {
                            return InsertionMode::InSelectInTable;
                        }
                    }
                    return InsertionMode::InSelect;
                },
                "td" | "th" => {
                    if !last {
                        return InsertionMode::InCell;
                    }
                },
                "tr" => return InsertionMode::InRow,
                "tbody" | "thead" | "tfoot" => return InsertionMode::InTableBody,
                "caption" => return InsertionMode::InCaption,
                "colgroup" => return InsertionMode::InColumnGroup,
                "table" => return InsertionMode::InTable,
                "template" => return *self.template_modes.last().unwrap(),
                "head" => {
                    if !last {
                        return InsertionMode::InHead;
                    }
                },
                "body" => return InsertionMode::InBody,
                "frameset" => return InsertionMode::InFrameset,
                "html" => match self.head_elem {
                    None => return InsertionMode::BeforeHead,
                    Some(_) => return InsertionMode::AfterHead,
                },

                _ => (),
            }
        }
        InsertionMode::InBody
    }

    fn close_the_cell(&mut self) {
        self.generate_implied_end_tags(cursory_implied_end);
        if self.pop_until(td_th) != 1 {
            self.parse_error(Borrowed("expected to close <td> or <th> with cell"));
        }
        self.clear_active_formatting_to_marker();
    }

    fn append_text(&mut self, text: StrTendril) -> ProcessResult {
        self.insert_appropriately(AppendText(text), None);
        ProcessResult::Done
    }

    fn append_comment(&mut self, text: StrTendril) -> ProcessResult {
        let comment = self.dom.create_comment(text);
        self.insert_appropriately(AppendNode(comment), None);
        ProcessResult::Done
    }

    fn append_comment_to_doc(&mut self, text: StrTendril) -> ProcessResult {
        let comment = self.dom.create_comment(text);
        self.dom.append(self.doc_handle, AppendNode(comment));
        ProcessResult::Done
    }

    fn append_comment_to_html(&mut self, text: StrTendril) -> ProcessResult {
        let target = self.html_elem();
        let comment = self.dom.create_comment(text);
        self.dom.append(target, AppendNode(comment));
        ProcessResult::Done
    }

    //§ creating-and-inserting-nodes
    fn create_root(&mut self, attrs: Vec<Attribute>) {
        let elem = self.dom.create_element(QualName::html("html"), attrs);
        self.push(elem);
        self.dom.append(self.doc_handle, AppendNode(elem));
        // FIXME: application cache selection algorithm
    }

    // https://html.spec.whatwg.org/multipage/#create-an-element-for-the-token
    fn insert_element(
        &mut self,
        push: PushFlag,
        ns: Namespace,
        name: LocalName,
        attrs: Vec<Attribute>,
    ) -> NodeId {
        let qname = QualName::new(None, ns, name);
        let elem = self.dom.create_element(qname, attrs);

        let insertion_point = self.appropriate_place_for_insertion(None);
        self.insert_at(insertion_point, AppendNode(elem));

        match push {
            Push => self.push(elem),
            NoPush => (),
        }
        // FIXME: Remove from the stack if we can't append?
        elem
    }

    fn insert_element_for(&mut self, tag: Tag) -> NodeId {
        self.insert_element(Push, Namespace::Html, tag.name, tag.attrs)
    }

    fn insert_and_pop_element_for(&mut self, tag: Tag) -> NodeId {
        self.insert_element(NoPush, Namespace::Html, tag.name, tag.attrs)
    }

    fn insert_phantom(&mut self, name: &str) -> NodeId {
        self.insert_element(Push, Namespace::Html, LocalName::from(name), vec![])
    }
    //§ END

    fn create_formatting_element_for(&mut self, tag: Tag) -> NodeId {
        // Noah's Ark: at most three equivalent entries between markers;
        // the earliest is evicted.
        let mut first_match = None;
        let mut matches = 0usize;
        for (i, _, old_tag) in self.active_formatting_end_to_marker() {
            if tag.equiv_modulo_attr_order(old_tag) {
                first_match = Some(i);
                matches += 1;
            }
        }

        if matches >= 3 {
            self.active_formatting
                .remove(first_match.expect("matches with no index"));
        }

        let elem = self.insert_element(Push, Namespace::Html, tag.name.clone(), tag.attrs.clone());
        self.active_formatting.push(FormatEntry::Element(elem, tag));
        elem
    }

    fn push_marker(&mut self) {
        self.active_formatting.push(FormatEntry::Marker);
    }

    fn clear_active_formatting_to_marker(&mut self) {
        loop {
            match self.active_formatting.pop() {
                None | Some(FormatEntry::Marker) => break,
                _ => (),
            }
        }
    }

    fn process_end_tag_in_body(&mut self, tag: Tag) {
        // Look back for a matching open element.
        let mut match_idx = None;
        for (i, &elem) in self.open_elems.iter().enumerate().rev() {
            if self.html_elem_named(elem, &tag.name) {
                match_idx = Some(i);
                break;
            }

            if self.elem_in(elem, special_tag) {
                self.parse_error(Borrowed("Found special tag while closing generic tag"));
                return;
            }
        }

        let Some(match_idx) = match_idx else {
            // I believe this is impossible, because the root <html>
            // element is in special_tag.
            self.unexpected(&tag);
            return;
        };

        self.generate_implied_end_except(tag.name.clone());

        if match_idx != self.open_elems.len() - 1 {
            // mis-nested tags
            self.unexpected(&tag);
        }
        self.open_elems.truncate(match_idx);
    }

    fn handle_misnested_a_tags(&mut self, tag: &Tag) {
        let Some(node) = self
            .active_formatting_end_to_marker()
            .find(|&(_, n, _)| self.html_elem_named(n, "a"))
            .map(|(_, n, _)| n)
        else {
            return;
        };

        self.unexpected(tag);
        self.adoption_agency(LocalName::from("a"));
        if let Some(index) = self.position_in_active_formatting(node) {
            self.active_formatting.remove(index);
        }
        self.remove_from_stack(node);
    }

    //§ tree-construction
    fn is_foreign(&self, token: &Token) -> bool {
        if let Token::Eof = *token {
            return false;
        }

        if self.open_elems.is_empty() {
            return false;
        }

        let current = self.adjusted_current_node();
        let name = self.dom.elem_name(current);
        if name.ns == Namespace::Html {
            return false;
        }

        if mathml_text_integration_point(name) {
            match *token {
                Token::Characters(..) | Token::NullCharacter => return false,
                Token::Tag(Tag {
                    kind: StartTag,
                    ref name,
                    ..
                }) if !matches!(&**name, "mglyph" | "malignmark") => {
                    return false;
                },
                _ => (),
            }
        }

        if svg_html_integration_point(name) {
            match *token {
                Token::Characters(..) | Token::NullCharacter => return false,
                Token::Tag(Tag { kind: StartTag, .. }) => return false,
                _ => (),
            }
        }

        if (name.ns, name.local) == (Namespace::MathMl, "annotation-xml") {
            match *token {
                Token::Tag(Tag {
                    kind: StartTag,
                    ref name,
                    ..
                }) if &**name == "svg" => return false,
                Token::Characters(..)
                | Token::NullCharacter
                | Token::Tag(Tag { kind: StartTag, .. }) => {
                    return !self
                        .dom
                        .is_mathml_annotation_xml_integration_point(current);
                },
                _ => {},
            };
        }

        true
    }
    //§ END

    fn enter_foreign(&mut self, mut tag: Tag, ns: Namespace) -> ProcessResult {
        match ns {
            Namespace::MathMl => self.adjust_mathml_attributes(&mut tag),
            Namespace::Svg => self.adjust_svg_attributes(&mut tag),
            _ => (),
        }
        self.adjust_foreign_attributes(&mut tag);

        if tag.self_closing {
            self.insert_element(NoPush, ns, tag.name, tag.attrs);
            ProcessResult::DoneAckSelfClosing
        } else {
            self.insert_element(Push, ns, tag.name, tag.attrs);
            ProcessResult::Done
        }
    }

    fn adjust_svg_tag_name(&self, tag: &mut Tag) {
        let replacement = match &*tag.name {
            "altglyph" => "altGlyph",
            "altglyphdef" => "altGlyphDef",
            "altglyphitem" => "altGlyphItem",
            "animatecolor" => "animateColor",
            "animatemotion" => "animateMotion",
            "animatetransform" => "animateTransform",
            "clippath" => "clipPath",
            "feblend" => "feBlend",
            "fecolormatrix" => "feColorMatrix",
            "fecomponenttransfer" => "feComponentTransfer",
            "fecomposite" => "feComposite",
            "feconvolvematrix" => "feConvolveMatrix",
            "fediffuselighting" => "feDiffuseLighting",
            "fedisplacementmap" => "feDisplacementMap",
            "fedistantlight" => "feDistantLight",
            "fedropshadow" => "feDropShadow",
            "feflood" => "feFlood",
            "fefunca" => "feFuncA",
            "fefuncb" => "feFuncB",
            "fefuncg" => "feFuncG",
            "fefuncr" => "feFuncR",
            "fegaussianblur" => "feGaussianBlur",
            "feimage" => "feImage",
            "femerge" => "feMerge",
            "femergenode" => "feMergeNode",
            "femorphology" => "feMorphology",
            "feoffset" => "feOffset",
            "fepointlight" => "fePointLight",
            "fespecularlighting" => "feSpecularLighting",
            "fespotlight" => "feSpotLight",
            "fetile" => "feTile",
            "feturbulence" => "feTurbulence",
            "foreignobject" => "foreignObject",
            "glyphref" => "glyphRef",
            "lineargradient" => "linearGradient",
            "radialgradient" => "radialGradient",
            "textpath" => "textPath",
            _ => return,
        };
        tag.name = LocalName::from(replacement);
    }

    fn adjust_svg_attributes(&self, tag: &mut Tag) {
        for attr in &mut tag.attrs {
            let replacement = match &*attr.name.local {
                "attributename" => "attributeName",
                "attributetype" => "attributeType",
                "basefrequency" => "baseFrequency",
                "baseprofile" => "baseProfile",
                "calcmode" => "calcMode",
                "clippathunits" => "clipPathUnits",
                "diffuseconstant" => "diffuseConstant",
                "edgemode" => "edgeMode",
                "filterunits" => "filterUnits",
                "glyphref" => "glyphRef",
                "gradienttransform" => "gradientTransform",
                "gradientunits" => "gradientUnits",
                "kernelmatrix" => "kernelMatrix",
                "kernelunitlength" => "kernelUnitLength",
                "keypoints" => "keyPoints",
                "keysplines" => "keySplines",
                "keytimes" => "keyTimes",
                "lengthadjust" => "lengthAdjust",
                "limitingconeangle" => "limitingConeAngle",
                "markerheight" => "markerHeight",
                "markerunits" => "markerUnits",
                "markerwidth" => "markerWidth",
                "maskcontentunits" => "maskContentUnits",
                "maskunits" => "maskUnits",
                "numoctaves" => "numOctaves",
                "pathlength" => "pathLength",
                "patterncontentunits" => "patternContentUnits",
                "patterntransform" => "patternTransform",
                "patternunits" => "patternUnits",
                "pointsatx" => "pointsAtX",
                "pointsaty" => "pointsAtY",
                "pointsatz" => "pointsAtZ",
                "preservealpha" => "preserveAlpha",
                "preserveaspectratio" => "preserveAspectRatio",
                "primitiveunits" => "primitiveUnits",
                "refx" => "refX",
                "refy" => "refY",
                "repeatcount" => "repeatCount",
                "repeatdur" => "repeatDur",
                "requiredextensions" => "requiredExtensions",
                "requiredfeatures" => "requiredFeatures",
                "specularconstant" => "specularConstant",
                "specularexponent" => "specularExponent",
                "spreadmethod" => "spreadMethod",
                "startoffset" => "startOffset",
                "stddeviation" => "stdDeviation",
                "stitchtiles" => "stitchTiles",
                "surfacescale" => "surfaceScale",
                "systemlanguage" => "systemLanguage",
                "tablevalues" => "tableValues",
                "targetx" => "targetX",
                "targety" => "targetY",
                "textlength" => "textLength",
                "viewbox" => "viewBox",
                "viewtarget" => "viewTarget",
                "xchannelselector" => "xChannelSelector",
                "ychannelselector" => "yChannelSelector",
                "zoomandpan" => "zoomAndPan",
                _ => continue,
            };
            attr.name = QualName::attr(LocalName::from(replacement));
        }
    }

    fn adjust_mathml_attributes(&self, tag: &mut Tag) {
        for attr in &mut tag.attrs {
            if &*attr.name.local == "definitionurl" {
                attr.name = QualName::attr(LocalName::from("definitionURL"));
            }
        }
    }

    fn adjust_foreign_attributes(&self, tag: &mut Tag) {
        for attr in &mut tag.attrs {
            let (prefix, ns, local) = match &*attr.name.local {
                "xlink:actuate" => (Some("xlink"), Namespace::Xlink, "actuate"),
                "xlink:arcrole" => (Some("xlink"), Namespace::Xlink, "arcrole"),
                "xlink:href" => (Some("xlink"), Namespace::Xlink, "href"),
                "xlink:role" => (Some("xlink"), Namespace::Xlink, "role"),
                "xlink:show" => (Some("xlink"), Namespace::Xlink, "show"),
                "xlink:title" => (Some("xlink"), Namespace::Xlink, "title"),
                "xlink:type" => (Some("xlink"), Namespace::Xlink, "type"),
                "xml:lang" => (Some("xml"), Namespace::Xml, "lang"),
                "xml:space" => (Some("xml"), Namespace::Xml, "space"),
                "xmlns" => (None, Namespace::Xmlns, "xmlns"),
                "xmlns:xlink" => (Some("xmlns"), Namespace::Xmlns, "xlink"),
                _ => continue,
            };
            attr.name = QualName::new(
                prefix.map(Prefix::from),
                ns,
                LocalName::from(local),
            );
        }
    }

    fn foreign_start_tag(&mut self, mut tag: Tag) -> ProcessResult {
        let current_ns = self.dom.elem_name(self.adjusted_current_node()).ns;
        match current_ns {
            Namespace::MathMl => self.adjust_mathml_attributes(&mut tag),
            Namespace::Svg => {
                self.adjust_svg_tag_name(&mut tag);
                self.adjust_svg_attributes(&mut tag);
            },
            _ => (),
        }
        self.adjust_foreign_attributes(&mut tag);
        if tag.self_closing {
            // FIXME: <script /> in SVG
            self.insert_element(NoPush, current_ns, tag.name, tag.attrs);
            ProcessResult::DoneAckSelfClosing
        } else {
            self.insert_element(Push, current_ns, tag.name, tag.attrs);
            ProcessResult::Done
        }
    }

    /// The breakout path: pop foreign elements until the top of the stack
    /// is an integration point or an HTML element, then reprocess.
    fn unexpected_start_tag_in_foreign_content(&mut self, tag: Tag) -> ProcessResult {
        self.unexpected(&tag);
        while !self.current_node_in(|n| {
            n.ns == Namespace::Html
                || mathml_text_integration_point(n)
                || svg_html_integration_point(n)
        }) {
            self.pop();
        }
        self.step(self.mode, Token::Tag(tag))
    }
}
