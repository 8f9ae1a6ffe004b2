// Copyright 2024-2026 The tagtree Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

// The tree builder rules, as a single, enormous nested match expression.
//
// Tag dispatch is a match on `(kind, &*name)`; arms that forward to another
// mode rebuild the token they destructured, and "treated as anything else"
// tags repeat the default arm's body, which is also what the spec's prose
// describes.

use crate::dom::NodeOrText::AppendNode;
use crate::interface::{LocalName, Namespace, QualName, QuirksMode::Quirks};
use crate::tokenizer::states::{Rawtext, Rcdata, ScriptData};
use crate::tokenizer::Tag;
use crate::tokenizer::TagKind::{EndTag, StartTag};
use crate::tree_builder::tag_sets::*;
use crate::tree_builder::types::*;
use crate::tree_builder::TreeBuilder;

use std::borrow::Cow::Borrowed;
use tendril::{SliceExt, StrTendril};

fn any_not_whitespace(x: &StrTendril) -> bool {
    // FIXME: this might be much faster as a byte scan
    x.chars().any(|c| !c.is_ascii_whitespace())
}

#[doc(hidden)]
impl TreeBuilder {
    pub(crate) fn step(&mut self, mode: InsertionMode, token: Token) -> ProcessResult {
        self.debug_step(mode, &token);

        match mode {
            //§ the-initial-insertion-mode
            InsertionMode::Initial => match token {
                Token::Characters(SplitStatus::NotSplit, text) => {
                    ProcessResult::SplitWhitespace(text)
                },
                Token::Characters(SplitStatus::Whitespace, _) => ProcessResult::Done,
                Token::Comment(text) => self.append_comment_to_doc(text),
                token => {
                    if !self.opts.iframe_srcdoc {
                        self.unexpected(&token);
                        self.set_quirks_mode(Quirks);
                    }
                    ProcessResult::Reprocess(InsertionMode::BeforeHtml, token)
                },
            },

            //§ the-before-html-insertion-mode
            InsertionMode::BeforeHtml => match token {
                Token::Characters(SplitStatus::NotSplit, text) => {
                    ProcessResult::SplitWhitespace(text)
                },
                Token::Characters(SplitStatus::Whitespace, _) => ProcessResult::Done,
                Token::Comment(text) => self.append_comment_to_doc(text),

                Token::Tag(tag) => {
                    let name = tag.name.clone();
                    match (tag.kind, &*name) {
                        (StartTag, "html") => {
                            self.create_root(tag.attrs);
                            self.mode = InsertionMode::BeforeHead;
                            ProcessResult::Done
                        },

                        (EndTag, "head" | "body" | "html" | "br") => {
                            self.create_root(vec![]);
                            ProcessResult::Reprocess(InsertionMode::BeforeHead, Token::Tag(tag))
                        },

                        (EndTag, _) => self.unexpected(&tag),

                        _ => {
                            self.create_root(vec![]);
                            ProcessResult::Reprocess(InsertionMode::BeforeHead, Token::Tag(tag))
                        },
                    }
                },

                token => {
                    self.create_root(vec![]);
                    ProcessResult::Reprocess(InsertionMode::BeforeHead, token)
                },
            },

            //§ the-before-head-insertion-mode
            InsertionMode::BeforeHead => match token {
                Token::Characters(SplitStatus::NotSplit, text) => {
                    ProcessResult::SplitWhitespace(text)
                },
                Token::Characters(SplitStatus::Whitespace, _) => ProcessResult::Done,
                Token::Comment(text) => self.append_comment(text),

                Token::Tag(tag) => {
                    let name = tag.name.clone();
                    match (tag.kind, &*name) {
                        (StartTag, "html") => self.step(InsertionMode::InBody, Token::Tag(tag)),

                        (StartTag, "head") => {
                            self.head_elem = Some(self.insert_element_for(tag));
                            self.mode = InsertionMode::InHead;
                            ProcessResult::Done
                        },

                        (EndTag, "head" | "body" | "html" | "br") => {
                            self.head_elem = Some(self.insert_phantom("head"));
                            ProcessResult::Reprocess(InsertionMode::InHead, Token::Tag(tag))
                        },

                        (EndTag, _) => self.unexpected(&tag),

                        _ => {
                            self.head_elem = Some(self.insert_phantom("head"));
                            ProcessResult::Reprocess(InsertionMode::InHead, Token::Tag(tag))
                        },
                    }
                },

                token => {
                    self.head_elem = Some(self.insert_phantom("head"));
                    ProcessResult::Reprocess(InsertionMode::InHead, token)
                },
            },

            //§ parsing-main-inhead
            InsertionMode::InHead => match token {
                Token::Characters(SplitStatus::NotSplit, text) => {
                    ProcessResult::SplitWhitespace(text)
                },
                Token::Characters(SplitStatus::Whitespace, text) => self.append_text(text),
                Token::Comment(text) => self.append_comment(text),

                Token::Tag(tag) => {
                    let name = tag.name.clone();
                    match (tag.kind, &*name) {
                        (StartTag, "html") => self.step(InsertionMode::InBody, Token::Tag(tag)),

                        (StartTag, "base" | "basefont" | "bgsound" | "link" | "meta") => {
                            // FIXME: handle <meta charset=...> and
                            // <meta http-equiv="Content-Type">
                            self.insert_and_pop_element_for(tag);
                            ProcessResult::DoneAckSelfClosing
                        },

                        (StartTag, "title") => self.parse_raw_data(tag, Rcdata),

                        (StartTag, "noframes" | "style" | "noscript") => {
                            if (!self.opts.scripting_enabled) && (&*name == "noscript") {
                                self.insert_element_for(tag);
                                self.mode = InsertionMode::InHeadNoscript;
                                ProcessResult::Done
                            } else {
                                self.parse_raw_data(tag, Rawtext)
                            }
                        },

                        (StartTag, "script") => {
                            let elem = self
                                .dom
                                .create_element(QualName::html("script"), tag.attrs);
                            self.insert_appropriately(AppendNode(elem), None);
                            self.push(elem);
                            self.to_raw_text_mode(ScriptData)
                        },

                        (EndTag, "head") => {
                            self.pop();
                            self.mode = InsertionMode::AfterHead;
                            ProcessResult::Done
                        },

                        (StartTag, "template") => {
                            self.push_marker();
                            self.frameset_ok = false;
                            self.mode = InsertionMode::InTemplate;
                            self.template_modes.push(InsertionMode::InTemplate);
                            self.insert_element_for(tag);
                            ProcessResult::Done
                        },

                        (EndTag, "template") => {
                            if !self.in_html_elem_named("template") {
                                self.unexpected(&tag);
                            } else {
                                self.generate_implied_end_tags(thorough_implied_end);
                                self.expect_to_close("template");
                                self.clear_active_formatting_to_marker();
                                self.template_modes.pop();
                                self.mode = self.reset_insertion_mode();
                            }
                            ProcessResult::Done
                        },

                        (StartTag, "head") => self.unexpected(&tag),

                        (EndTag, "body" | "html" | "br") => {
                            self.pop();
                            ProcessResult::Reprocess(InsertionMode::AfterHead, Token::Tag(tag))
                        },

                        (EndTag, _) => self.unexpected(&tag),

                        _ => {
                            self.pop();
                            ProcessResult::Reprocess(InsertionMode::AfterHead, Token::Tag(tag))
                        },
                    }
                },

                token => {
                    self.pop();
                    ProcessResult::Reprocess(InsertionMode::AfterHead, token)
                },
            },

            //§ parsing-main-inheadnoscript
            InsertionMode::InHeadNoscript => match token {
                Token::Characters(SplitStatus::NotSplit, text) => {
                    ProcessResult::SplitWhitespace(text)
                },
                tok @ Token::Characters(SplitStatus::Whitespace, _) => {
                    self.step(InsertionMode::InHead, tok)
                },
                tok @ Token::Comment(_) => self.step(InsertionMode::InHead, tok),

                Token::Tag(tag) => {
                    let name = tag.name.clone();
                    match (tag.kind, &*name) {
                        (StartTag, "html") => self.step(InsertionMode::InBody, Token::Tag(tag)),

                        (EndTag, "noscript") => {
                            self.pop();
                            self.mode = InsertionMode::InHead;
                            ProcessResult::Done
                        },

                        (
                            StartTag,
                            "basefont" | "bgsound" | "link" | "meta" | "noframes" | "style",
                        ) => self.step(InsertionMode::InHead, Token::Tag(tag)),

                        (StartTag, "head" | "noscript") => self.unexpected(&tag),

                        (EndTag, "br") => {
                            self.unexpected(&tag);
                            self.pop();
                            ProcessResult::Reprocess(InsertionMode::InHead, Token::Tag(tag))
                        },

                        (EndTag, _) => self.unexpected(&tag),

                        _ => {
                            self.unexpected(&tag);
                            self.pop();
                            ProcessResult::Reprocess(InsertionMode::InHead, Token::Tag(tag))
                        },
                    }
                },

                token => {
                    self.unexpected(&token);
                    self.pop();
                    ProcessResult::Reprocess(InsertionMode::InHead, token)
                },
            },

            //§ the-after-head-insertion-mode
            InsertionMode::AfterHead => match token {
                Token::Characters(SplitStatus::NotSplit, text) => {
                    ProcessResult::SplitWhitespace(text)
                },
                Token::Characters(SplitStatus::Whitespace, text) => self.append_text(text),
                Token::Comment(text) => self.append_comment(text),

                Token::Tag(tag) => {
                    let name = tag.name.clone();
                    match (tag.kind, &*name) {
                        (StartTag, "html") => self.step(InsertionMode::InBody, Token::Tag(tag)),

                        (StartTag, "body") => {
                            self.insert_element_for(tag);
                            self.frameset_ok = false;
                            self.mode = InsertionMode::InBody;
                            ProcessResult::Done
                        },

                        (StartTag, "frameset") => {
                            self.insert_element_for(tag);
                            self.mode = InsertionMode::InFrameset;
                            ProcessResult::Done
                        },

                        (
                            StartTag,
                            "base" | "basefont" | "bgsound" | "link" | "meta" | "noframes"
                            | "script" | "style" | "template" | "title",
                        ) => {
                            self.unexpected(&tag);
                            let head = self.head_elem.expect("no head element");
                            self.push(head);
                            let result = self.step(InsertionMode::InHead, Token::Tag(tag));
                            self.remove_from_stack(head);
                            result
                        },

                        (EndTag, "template") => self.step(InsertionMode::InHead, Token::Tag(tag)),

                        (StartTag, "head") => self.unexpected(&tag),

                        (EndTag, "body" | "html" | "br") => {
                            self.insert_phantom("body");
                            ProcessResult::Reprocess(InsertionMode::InBody, Token::Tag(tag))
                        },

                        (EndTag, _) => self.unexpected(&tag),

                        _ => {
                            self.insert_phantom("body");
                            ProcessResult::Reprocess(InsertionMode::InBody, Token::Tag(tag))
                        },
                    }
                },

                token => {
                    self.insert_phantom("body");
                    ProcessResult::Reprocess(InsertionMode::InBody, token)
                },
            },

            //§ parsing-main-inbody
            InsertionMode::InBody => match token {
                Token::NullCharacter => self.unexpected(&token),

                Token::Characters(_, text) => {
                    self.reconstruct_active_formatting_elements();
                    if any_not_whitespace(&text) {
                        self.frameset_ok = false;
                    }
                    self.append_text(text)
                },

                Token::Comment(text) => self.append_comment(text),

                Token::Eof => {
                    if !self.template_modes.is_empty() {
                        self.step(InsertionMode::InTemplate, token)
                    } else {
                        self.check_body_end();
                        self.stop_parsing()
                    }
                },

                Token::Tag(tag) => {
                    let name = tag.name.clone();
                    match (tag.kind, &*name) {
                        (StartTag, "html") => {
                            self.unexpected(&tag);
                            if !self.in_html_elem_named("template") {
                                let top = self.html_elem();
                                self.dom.add_attrs_if_missing(top, tag.attrs);
                            }
                            ProcessResult::Done
                        },

                        (
                            StartTag,
                            "base" | "basefont" | "bgsound" | "link" | "meta" | "noframes"
                            | "script" | "style" | "template" | "title",
                        )
                        | (EndTag, "template") => self.step(InsertionMode::InHead, Token::Tag(tag)),

                        (StartTag, "body") => {
                            self.unexpected(&tag);
                            match self.body_elem() {
                                Some(node)
                                    if self.open_elems.len() != 1
                                        && !self.in_html_elem_named("template") =>
                                {
                                    self.frameset_ok = false;
                                    self.dom.add_attrs_if_missing(node, tag.attrs)
                                },
                                _ => {},
                            }
                            ProcessResult::Done
                        },

                        (StartTag, "frameset") => {
                            self.unexpected(&tag);
                            if !self.frameset_ok {
                                return ProcessResult::Done;
                            }

                            let Some(body) = self.body_elem() else {
                                return ProcessResult::Done;
                            };
                            self.dom.remove_from_parent(body);

                            // FIXME: can we get here in the fragment case?
                            // What to do with the first element then?
                            self.open_elems.truncate(1);
                            self.insert_element_for(tag);
                            self.mode = InsertionMode::InFrameset;
                            ProcessResult::Done
                        },

                        (EndTag, "body") => {
                            if self.in_scope_named(default_scope, "body") {
                                self.check_body_end();
                                self.mode = InsertionMode::AfterBody;
                            } else {
                                self.parse_error(Borrowed("</body> with no <body> in scope"));
                            }
                            ProcessResult::Done
                        },

                        (EndTag, "html") => {
                            if self.in_scope_named(default_scope, "body") {
                                self.check_body_end();
                                ProcessResult::Reprocess(InsertionMode::AfterBody, Token::Tag(tag))
                            } else {
                                self.parse_error(Borrowed("</html> with no <body> in scope"));
                                ProcessResult::Done
                            }
                        },

                        (
                            StartTag,
                            "address" | "article" | "aside" | "blockquote" | "center" | "details"
                            | "dialog" | "dir" | "div" | "dl" | "fieldset" | "figcaption"
                            | "figure" | "footer" | "header" | "hgroup" | "main" | "menu" | "nav"
                            | "ol" | "p" | "search" | "section" | "summary" | "ul",
                        ) => {
                            self.close_p_element_in_button_scope();
                            self.insert_element_for(tag);
                            ProcessResult::Done
                        },

                        (StartTag, "h1" | "h2" | "h3" | "h4" | "h5" | "h6") => {
                            self.close_p_element_in_button_scope();
                            if self.current_node_in(heading_tag) {
                                self.parse_error(Borrowed("nested heading tags"));
                                self.pop();
                            }
                            self.insert_element_for(tag);
                            ProcessResult::Done
                        },

                        (StartTag, "pre" | "listing") => {
                            self.close_p_element_in_button_scope();
                            self.insert_element_for(tag);
                            self.ignore_lf = true;
                            self.frameset_ok = false;
                            ProcessResult::Done
                        },

                        (StartTag, "form") => {
                            if self.form_elem.is_some() && !self.in_html_elem_named("template") {
                                self.parse_error(Borrowed("nested forms"));
                            } else {
                                self.close_p_element_in_button_scope();
                                let elem = self.insert_element_for(tag);
                                if !self.in_html_elem_named("template") {
                                    self.form_elem = Some(elem);
                                }
                            }
                            ProcessResult::Done
                        },

                        (StartTag, "li" | "dd" | "dt") => {
                            declare_tag_set!(close_list = "li");
                            declare_tag_set!(close_defn = "dd" "dt");
                            declare_tag_set!(extra_special = [special_tag] - "address" "div" "p");
                            let list = match &*name {
                                "li" => true,
                                "dd" | "dt" => false,
                                _ => unreachable!(),
                            };

                            self.frameset_ok = false;

                            let mut to_close = None;
                            for &node in self.open_elems.iter().rev() {
                                let elem_name = self.dom.elem_name(node);
                                let can_close = if list {
                                    close_list(elem_name)
                                } else {
                                    close_defn(elem_name)
                                };
                                if can_close {
                                    to_close = Some(LocalName::from(elem_name.local));
                                    break;
                                }
                                if extra_special(elem_name) {
                                    break;
                                }
                            }

                            if let Some(name) = to_close {
                                self.generate_implied_end_except(name.clone());
                                self.expect_to_close(&name);
                            }

                            self.close_p_element_in_button_scope();
                            self.insert_element_for(tag);
                            ProcessResult::Done
                        },

                        (StartTag, "plaintext") => {
                            self.close_p_element_in_button_scope();
                            self.insert_element_for(tag);
                            ProcessResult::ToPlaintext
                        },

                        (StartTag, "button") => {
                            if self.in_scope_named(default_scope, "button") {
                                self.parse_error(Borrowed("nested buttons"));
                                self.generate_implied_end_tags(cursory_implied_end);
                                self.pop_until_named("button");
                            }
                            self.reconstruct_active_formatting_elements();
                            self.insert_element_for(tag);
                            self.frameset_ok = false;
                            ProcessResult::Done
                        },

                        (
                            EndTag,
                            "address" | "article" | "aside" | "blockquote" | "button" | "center"
                            | "details" | "dialog" | "dir" | "div" | "dl" | "fieldset"
                            | "figcaption" | "figure" | "footer" | "header" | "hgroup" | "listing"
                            | "main" | "menu" | "nav" | "ol" | "pre" | "search" | "section"
                            | "summary" | "ul",
                        ) => {
                            if !self.in_scope_named(default_scope, &name) {
                                self.unexpected(&tag);
                            } else {
                                self.generate_implied_end_tags(cursory_implied_end);
                                self.expect_to_close(&name);
                            }
                            ProcessResult::Done
                        },

                        (EndTag, "form") => {
                            if !self.in_html_elem_named("template") {
                                let Some(node) = self.form_elem.take() else {
                                    self.parse_error(Borrowed(
                                        "Null form element pointer on </form>",
                                    ));
                                    return ProcessResult::Done;
                                };
                                if !self.in_scope(default_scope, |n| n == node) {
                                    self.parse_error(Borrowed(
                                        "Form element not in scope on </form>",
                                    ));
                                    return ProcessResult::Done;
                                }
                                self.generate_implied_end_tags(cursory_implied_end);
                                let current = self.current_node();
                                self.remove_from_stack(node);
                                if current != node {
                                    self.parse_error(Borrowed("Bad open element on </form>"));
                                }
                            } else {
                                if !self.in_scope_named(default_scope, "form") {
                                    self.parse_error(Borrowed(
                                        "Form element not in scope on </form>",
                                    ));
                                    return ProcessResult::Done;
                                }
                                self.generate_implied_end_tags(cursory_implied_end);
                                if !self.current_node_named("form") {
                                    self.parse_error(Borrowed("Bad open element on </form>"));
                                }
                                self.pop_until_named("form");
                            }
                            ProcessResult::Done
                        },

                        (EndTag, "p") => {
                            if !self.in_scope_named(button_scope, "p") {
                                self.parse_error(Borrowed("No <p> tag to close"));
                                self.insert_phantom("p");
                            }
                            self.close_p_element();
                            ProcessResult::Done
                        },

                        (EndTag, "li" | "dd" | "dt") => {
                            let in_scope = if &*name == "li" {
                                self.in_scope_named(list_item_scope, &name)
                            } else {
                                self.in_scope_named(default_scope, &name)
                            };
                            if in_scope {
                                self.generate_implied_end_except(name.clone());
                                self.expect_to_close(&name);
                            } else {
                                self.parse_error(Borrowed("No matching tag to close"));
                            }
                            ProcessResult::Done
                        },

                        (EndTag, "h1" | "h2" | "h3" | "h4" | "h5" | "h6") => {
                            if self.in_scope(default_scope, |n| self.elem_in(n, heading_tag)) {
                                self.generate_implied_end_tags(cursory_implied_end);
                                if !self.current_node_named(&name) {
                                    self.parse_error(Borrowed("Closing wrong heading tag"));
                                }
                                self.pop_until(heading_tag);
                            } else {
                                self.parse_error(Borrowed("No heading tag to close"));
                            }
                            ProcessResult::Done
                        },

                        (StartTag, "a") => {
                            self.handle_misnested_a_tags(&tag);
                            self.reconstruct_active_formatting_elements();
                            self.create_formatting_element_for(tag);
                            ProcessResult::Done
                        },

                        (
                            StartTag,
                            "b" | "big" | "code" | "em" | "font" | "i" | "s" | "small" | "strike"
                            | "strong" | "tt" | "u",
                        ) => {
                            self.reconstruct_active_formatting_elements();
                            self.create_formatting_element_for(tag);
                            ProcessResult::Done
                        },

                        (StartTag, "nobr") => {
                            self.reconstruct_active_formatting_elements();
                            if self.in_scope_named(default_scope, "nobr") {
                                self.parse_error(Borrowed("Nested <nobr>"));
                                self.adoption_agency(LocalName::from("nobr"));
                                self.reconstruct_active_formatting_elements();
                            }
                            self.create_formatting_element_for(tag);
                            ProcessResult::Done
                        },

                        (
                            EndTag,
                            "a" | "b" | "big" | "code" | "em" | "font" | "i" | "nobr" | "s"
                            | "small" | "strike" | "strong" | "tt" | "u",
                        ) => {
                            self.adoption_agency(tag.name);
                            ProcessResult::Done
                        },

                        (StartTag, "applet" | "marquee" | "object") => {
                            self.reconstruct_active_formatting_elements();
                            self.insert_element_for(tag);
                            self.push_marker();
                            self.frameset_ok = false;
                            ProcessResult::Done
                        },

                        (EndTag, "applet" | "marquee" | "object") => {
                            if !self.in_scope_named(default_scope, &name) {
                                self.unexpected(&tag);
                            } else {
                                self.generate_implied_end_tags(cursory_implied_end);
                                self.expect_to_close(&name);
                                self.clear_active_formatting_to_marker();
                            }
                            ProcessResult::Done
                        },

                        (StartTag, "table") => {
                            if self.quirks_mode != Quirks {
                                self.close_p_element_in_button_scope();
                            }
                            self.insert_element_for(tag);
                            self.frameset_ok = false;
                            self.mode = InsertionMode::InTable;
                            ProcessResult::Done
                        },

                        (EndTag, "br") => {
                            self.unexpected(&tag);
                            self.step(
                                InsertionMode::InBody,
                                Token::Tag(Tag {
                                    kind: StartTag,
                                    attrs: vec![],
                                    ..tag
                                }),
                            )
                        },

                        (StartTag, "area" | "br" | "embed" | "img" | "keygen" | "wbr" | "input") => {
                            let keep_frameset_ok = match &*name {
                                "input" => self.is_type_hidden(&tag),
                                _ => false,
                            };
                            self.reconstruct_active_formatting_elements();
                            self.insert_and_pop_element_for(tag);
                            if !keep_frameset_ok {
                                self.frameset_ok = false;
                            }
                            ProcessResult::DoneAckSelfClosing
                        },

                        (StartTag, "param" | "source" | "track") => {
                            self.insert_and_pop_element_for(tag);
                            ProcessResult::DoneAckSelfClosing
                        },

                        (StartTag, "hr") => {
                            self.close_p_element_in_button_scope();
                            self.insert_and_pop_element_for(tag);
                            self.frameset_ok = false;
                            ProcessResult::DoneAckSelfClosing
                        },

                        (StartTag, "image") => {
                            self.unexpected(&tag);
                            self.step(
                                InsertionMode::InBody,
                                Token::Tag(Tag {
                                    name: LocalName::from("img"),
                                    ..tag
                                }),
                            )
                        },

                        (StartTag, "textarea") => {
                            self.ignore_lf = true;
                            self.frameset_ok = false;
                            self.parse_raw_data(tag, Rcdata)
                        },

                        (StartTag, "xmp") => {
                            self.close_p_element_in_button_scope();
                            self.reconstruct_active_formatting_elements();
                            self.frameset_ok = false;
                            self.parse_raw_data(tag, Rawtext)
                        },

                        (StartTag, "iframe") => {
                            self.frameset_ok = false;
                            self.parse_raw_data(tag, Rawtext)
                        },

                        (StartTag, "noembed") => self.parse_raw_data(tag, Rawtext),

                        // <noscript> handled in wildcard case below

                        (StartTag, "select") => {
                            self.reconstruct_active_formatting_elements();
                            self.insert_element_for(tag);
                            self.frameset_ok = false;
                            // NB: mode == InBody but possibly self.mode !=
                            // mode, if we're processing "as in the rules for
                            // InBody".
                            self.mode = match self.mode {
                                InsertionMode::InTable
                                | InsertionMode::InCaption
                                | InsertionMode::InTableBody
                                | InsertionMode::InRow
                                | InsertionMode::InCell => InsertionMode::InSelectInTable,
                                _ => InsertionMode::InSelect,
                            };
                            ProcessResult::Done
                        },

                        (StartTag, "optgroup" | "option") => {
                            if self.current_node_named("option") {
                                self.pop();
                            }
                            self.reconstruct_active_formatting_elements();
                            self.insert_element_for(tag);
                            ProcessResult::Done
                        },

                        (StartTag, "rb" | "rtc") => {
                            if self.in_scope_named(default_scope, "ruby") {
                                self.generate_implied_end_tags(cursory_implied_end);
                            }
                            if !self.current_node_named("ruby") {
                                self.unexpected(&tag);
                            }
                            self.insert_element_for(tag);
                            ProcessResult::Done
                        },

                        (StartTag, "rp" | "rt") => {
                            if self.in_scope_named(default_scope, "ruby") {
                                self.generate_implied_end_except(LocalName::from("rtc"));
                            }
                            if !self.current_node_named("rtc") && !self.current_node_named("ruby") {
                                self.unexpected(&tag);
                            }
                            self.insert_element_for(tag);
                            ProcessResult::Done
                        },

                        (StartTag, "math") => self.enter_foreign(tag, Namespace::MathMl),

                        (StartTag, "svg") => self.enter_foreign(tag, Namespace::Svg),

                        (
                            StartTag,
                            "caption" | "col" | "colgroup" | "frame" | "head" | "tbody" | "td"
                            | "tfoot" | "th" | "thead" | "tr",
                        ) => {
                            self.unexpected(&tag);
                            ProcessResult::Done
                        },

                        (StartTag, _) => {
                            if self.opts.scripting_enabled && &*name == "noscript" {
                                self.parse_raw_data(tag, Rawtext)
                            } else {
                                self.reconstruct_active_formatting_elements();
                                self.insert_element_for(tag);
                                ProcessResult::Done
                            }
                        },

                        (EndTag, _) => {
                            self.process_end_tag_in_body(tag);
                            ProcessResult::Done
                        },
                    }
                },
            },

            //§ parsing-main-incdata
            InsertionMode::Text => match token {
                Token::Characters(_, text) => self.append_text(text),

                Token::Eof => {
                    self.unexpected(&token);
                    self.pop();
                    ProcessResult::Reprocess(self.orig_mode.take().unwrap(), token)
                },

                Token::Tag(tag) => {
                    debug_assert!(tag.kind == EndTag);
                    self.pop();
                    self.mode = self.orig_mode.take().unwrap();
                    ProcessResult::Done
                },

                // The spec doesn't say what to do here.
                // Other tokens are impossible?
                _ => panic!("impossible case in Text mode"),
            },

            //§ parsing-main-intable
            InsertionMode::InTable => match token {
                // FIXME: hack, should implement pat | pat for match arms
                tok @ Token::NullCharacter => self.process_chars_in_table(tok),

                tok @ Token::Characters(..) => self.process_chars_in_table(tok),

                Token::Comment(text) => self.append_comment(text),

                Token::Tag(tag) => {
                    let name = tag.name.clone();
                    match (tag.kind, &*name) {
                        (StartTag, "caption") => {
                            self.pop_until_current(table_scope);
                            self.push_marker();
                            self.insert_element_for(tag);
                            self.mode = InsertionMode::InCaption;
                            ProcessResult::Done
                        },

                        (StartTag, "colgroup") => {
                            self.pop_until_current(table_scope);
                            self.insert_element_for(tag);
                            self.mode = InsertionMode::InColumnGroup;
                            ProcessResult::Done
                        },

                        (StartTag, "col") => {
                            self.pop_until_current(table_scope);
                            self.insert_phantom("colgroup");
                            ProcessResult::Reprocess(InsertionMode::InColumnGroup, Token::Tag(tag))
                        },

                        (StartTag, "tbody" | "tfoot" | "thead") => {
                            self.pop_until_current(table_scope);
                            self.insert_element_for(tag);
                            self.mode = InsertionMode::InTableBody;
                            ProcessResult::Done
                        },

                        (StartTag, "td" | "th" | "tr") => {
                            self.pop_until_current(table_scope);
                            self.insert_phantom("tbody");
                            ProcessResult::Reprocess(InsertionMode::InTableBody, Token::Tag(tag))
                        },

                        (StartTag, "table") => {
                            self.unexpected(&tag);
                            if self.in_scope_named(table_scope, "table") {
                                self.pop_until_named("table");
                                ProcessResult::Reprocess(self.reset_insertion_mode(), Token::Tag(tag))
                            } else {
                                ProcessResult::Done
                            }
                        },

                        (EndTag, "table") => {
                            if self.in_scope_named(table_scope, "table") {
                                self.pop_until_named("table");
                                self.mode = self.reset_insertion_mode();
                            } else {
                                self.unexpected(&tag);
                            }
                            ProcessResult::Done
                        },

                        (
                            EndTag,
                            "body" | "caption" | "col" | "colgroup" | "html" | "tbody" | "td"
                            | "tfoot" | "th" | "thead" | "tr",
                        ) => self.unexpected(&tag),

                        (StartTag, "style" | "script" | "template") | (EndTag, "template") => {
                            self.step(InsertionMode::InHead, Token::Tag(tag))
                        },

                        (StartTag, "input") => {
                            self.unexpected(&tag);
                            if self.is_type_hidden(&tag) {
                                self.insert_and_pop_element_for(tag);
                                ProcessResult::DoneAckSelfClosing
                            } else {
                                self.foster_parent_in_body(Token::Tag(tag))
                            }
                        },

                        (StartTag, "form") => {
                            self.unexpected(&tag);
                            if !self.in_html_elem_named("template") && self.form_elem.is_none() {
                                self.form_elem = Some(self.insert_and_pop_element_for(tag));
                            }
                            ProcessResult::Done
                        },

                        _ => {
                            self.unexpected(&tag);
                            self.foster_parent_in_body(Token::Tag(tag))
                        },
                    }
                },

                tok @ Token::Eof => self.step(InsertionMode::InBody, tok),
            },

            //§ parsing-main-intabletext
            InsertionMode::InTableText => match token {
                tok @ Token::NullCharacter => self.unexpected(&tok),

                Token::Characters(split, text) => {
                    self.pending_table_text.push((split, text));
                    ProcessResult::Done
                },

                token => {
                    let pending = std::mem::take(&mut self.pending_table_text);
                    let contains_nonspace = pending.iter().any(|&(split, ref text)| match split {
                        SplitStatus::Whitespace => false,
                        SplitStatus::NotWhitespace => true,
                        SplitStatus::NotSplit => any_not_whitespace(text),
                    });

                    if contains_nonspace {
                        self.parse_error(Borrowed("Non-space table text"));
                        for (split, text) in pending.into_iter() {
                            match self.foster_parent_in_body(Token::Characters(split, text)) {
                                ProcessResult::Done => (),
                                _ => panic!("not prepared to handle this!"),
                            }
                        }
                    } else {
                        for (_, text) in pending.into_iter() {
                            self.append_text(text);
                        }
                    }

                    ProcessResult::Reprocess(self.orig_mode.take().unwrap(), token)
                },
            },

            //§ parsing-main-incaption
            InsertionMode::InCaption => match token {
                Token::Tag(tag) => {
                    let name = tag.name.clone();
                    match (tag.kind, &*name) {
                        (
                            StartTag,
                            "caption" | "col" | "colgroup" | "tbody" | "td" | "tfoot" | "th"
                            | "thead" | "tr",
                        )
                        | (EndTag, "table" | "caption") => {
                            if self.in_scope_named(table_scope, "caption") {
                                self.generate_implied_end_tags(cursory_implied_end);
                                self.expect_to_close("caption");
                                self.clear_active_formatting_to_marker();
                                match (tag.kind, &*name) {
                                    (EndTag, "caption") => {
                                        self.mode = InsertionMode::InTable;
                                        ProcessResult::Done
                                    },
                                    _ => ProcessResult::Reprocess(
                                        InsertionMode::InTable,
                                        Token::Tag(tag),
                                    ),
                                }
                            } else {
                                self.unexpected(&tag);
                                ProcessResult::Done
                            }
                        },

                        (
                            EndTag,
                            "body" | "col" | "colgroup" | "html" | "tbody" | "td" | "tfoot" | "th"
                            | "thead" | "tr",
                        ) => self.unexpected(&tag),

                        _ => self.step(InsertionMode::InBody, Token::Tag(tag)),
                    }
                },

                token => self.step(InsertionMode::InBody, token),
            },

            //§ parsing-main-incolgroup
            InsertionMode::InColumnGroup => match token {
                Token::Characters(SplitStatus::NotSplit, text) => {
                    ProcessResult::SplitWhitespace(text)
                },
                Token::Characters(SplitStatus::Whitespace, text) => self.append_text(text),
                Token::Comment(text) => self.append_comment(text),

                Token::Tag(tag) => {
                    let name = tag.name.clone();
                    match (tag.kind, &*name) {
                        (StartTag, "html") => self.step(InsertionMode::InBody, Token::Tag(tag)),

                        (StartTag, "col") => {
                            self.insert_and_pop_element_for(tag);
                            ProcessResult::DoneAckSelfClosing
                        },

                        (EndTag, "colgroup") => {
                            if self.current_node_named("colgroup") {
                                self.pop();
                                self.mode = InsertionMode::InTable;
                            } else {
                                self.unexpected(&tag);
                            }
                            ProcessResult::Done
                        },

                        (EndTag, "col") => self.unexpected(&tag),

                        (StartTag, "template") | (EndTag, "template") => {
                            self.step(InsertionMode::InHead, Token::Tag(tag))
                        },

                        _ => {
                            if self.current_node_named("colgroup") {
                                self.pop();
                                ProcessResult::Reprocess(InsertionMode::InTable, Token::Tag(tag))
                            } else {
                                self.unexpected(&tag)
                            }
                        },
                    }
                },

                tok @ Token::Eof => self.step(InsertionMode::InBody, tok),

                token => {
                    if self.current_node_named("colgroup") {
                        self.pop();
                        ProcessResult::Reprocess(InsertionMode::InTable, token)
                    } else {
                        self.unexpected(&token)
                    }
                },
            },

            //§ parsing-main-intbody
            InsertionMode::InTableBody => match token {
                Token::Tag(tag) => {
                    let name = tag.name.clone();
                    match (tag.kind, &*name) {
                        (StartTag, "tr") => {
                            self.pop_until_current(table_body_context);
                            self.insert_element_for(tag);
                            self.mode = InsertionMode::InRow;
                            ProcessResult::Done
                        },

                        (StartTag, "th" | "td") => {
                            self.unexpected(&tag);
                            self.pop_until_current(table_body_context);
                            self.insert_phantom("tr");
                            ProcessResult::Reprocess(InsertionMode::InRow, Token::Tag(tag))
                        },

                        (EndTag, "tbody" | "tfoot" | "thead") => {
                            if self.in_scope_named(table_scope, &name) {
                                self.pop_until_current(table_body_context);
                                self.pop();
                                self.mode = InsertionMode::InTable;
                            } else {
                                self.unexpected(&tag);
                            }
                            ProcessResult::Done
                        },

                        (StartTag, "caption" | "col" | "colgroup" | "tbody" | "tfoot" | "thead")
                        | (EndTag, "table") => {
                            declare_tag_set!(table_outer = "table" "tbody" "tfoot");
                            if self.in_scope(table_scope, |e| self.elem_in(e, table_outer)) {
                                self.pop_until_current(table_body_context);
                                self.pop();
                                ProcessResult::Reprocess(InsertionMode::InTable, Token::Tag(tag))
                            } else {
                                self.unexpected(&tag)
                            }
                        },

                        (
                            EndTag,
                            "body" | "caption" | "col" | "colgroup" | "html" | "td" | "th" | "tr",
                        ) => self.unexpected(&tag),

                        _ => self.step(InsertionMode::InTable, Token::Tag(tag)),
                    }
                },

                token => self.step(InsertionMode::InTable, token),
            },

            //§ parsing-main-intr
            InsertionMode::InRow => match token {
                Token::Tag(tag) => {
                    let name = tag.name.clone();
                    match (tag.kind, &*name) {
                        (StartTag, "th" | "td") => {
                            self.pop_until_current(table_row_context);
                            self.insert_element_for(tag);
                            self.mode = InsertionMode::InCell;
                            self.push_marker();
                            ProcessResult::Done
                        },

                        (EndTag, "tr") => {
                            if self.in_scope_named(table_scope, "tr") {
                                self.pop_until_current(table_row_context);
                                let node = self.pop();
                                self.assert_named(node, "tr");
                                self.mode = InsertionMode::InTableBody;
                            } else {
                                self.unexpected(&tag);
                            }
                            ProcessResult::Done
                        },

                        (StartTag, "caption" | "col" | "colgroup" | "tbody" | "tfoot" | "thead" | "tr")
                        | (EndTag, "table") => {
                            if self.in_scope_named(table_scope, "tr") {
                                self.pop_until_current(table_row_context);
                                let node = self.pop();
                                self.assert_named(node, "tr");
                                ProcessResult::Reprocess(InsertionMode::InTableBody, Token::Tag(tag))
                            } else {
                                self.unexpected(&tag)
                            }
                        },

                        (EndTag, "tbody" | "tfoot" | "thead") => {
                            if self.in_scope_named(table_scope, &name) {
                                if self.in_scope_named(table_scope, "tr") {
                                    self.pop_until_current(table_row_context);
                                    let node = self.pop();
                                    self.assert_named(node, "tr");
                                    ProcessResult::Reprocess(
                                        InsertionMode::InTableBody,
                                        Token::Tag(tag),
                                    )
                                } else {
                                    ProcessResult::Done
                                }
                            } else {
                                self.unexpected(&tag)
                            }
                        },

                        (EndTag, "body" | "caption" | "col" | "colgroup" | "html" | "td" | "th") => {
                            self.unexpected(&tag)
                        },

                        _ => self.step(InsertionMode::InTable, Token::Tag(tag)),
                    }
                },

                token => self.step(InsertionMode::InTable, token),
            },

            //§ parsing-main-intd
            InsertionMode::InCell => match token {
                Token::Tag(tag) => {
                    let name = tag.name.clone();
                    match (tag.kind, &*name) {
                        (EndTag, "td" | "th") => {
                            if self.in_scope_named(table_scope, &name) {
                                self.generate_implied_end_tags(cursory_implied_end);
                                self.expect_to_close(&name);
                                self.clear_active_formatting_to_marker();
                                self.mode = InsertionMode::InRow;
                            } else {
                                self.unexpected(&tag);
                            }
                            ProcessResult::Done
                        },

                        (
                            StartTag,
                            "caption" | "col" | "colgroup" | "tbody" | "td" | "tfoot" | "th"
                            | "thead" | "tr",
                        ) => {
                            if self.in_scope(table_scope, |n| self.elem_in(n, td_th)) {
                                self.close_the_cell();
                                ProcessResult::Reprocess(InsertionMode::InRow, Token::Tag(tag))
                            } else {
                                self.unexpected(&tag)
                            }
                        },

                        (EndTag, "body" | "caption" | "col" | "colgroup" | "html") => {
                            self.unexpected(&tag)
                        },

                        (EndTag, "table" | "tbody" | "tfoot" | "thead" | "tr") => {
                            if self.in_scope_named(table_scope, &name) {
                                self.close_the_cell();
                                ProcessResult::Reprocess(InsertionMode::InRow, Token::Tag(tag))
                            } else {
                                self.unexpected(&tag)
                            }
                        },

                        _ => self.step(InsertionMode::InBody, Token::Tag(tag)),
                    }
                },

                token => self.step(InsertionMode::InBody, token),
            },

            //§ parsing-main-inselect
            InsertionMode::InSelect => match token {
                tok @ Token::NullCharacter => self.unexpected(&tok),
                Token::Characters(_, text) => self.append_text(text),
                Token::Comment(text) => self.append_comment(text),

                Token::Tag(tag) => {
                    let name = tag.name.clone();
                    match (tag.kind, &*name) {
                        (StartTag, "html") => self.step(InsertionMode::InBody, Token::Tag(tag)),

                        (StartTag, "option") => {
                            if self.current_node_named("option") {
                                self.pop();
                            }
                            self.insert_element_for(tag);
                            ProcessResult::Done
                        },

                        (StartTag, "optgroup") => {
                            if self.current_node_named("option") {
                                self.pop();
                            }
                            if self.current_node_named("optgroup") {
                                self.pop();
                            }
                            self.insert_element_for(tag);
                            ProcessResult::Done
                        },

                        (StartTag, "hr") => {
                            if self.current_node_named("option") {
                                self.pop();
                            }
                            if self.current_node_named("optgroup") {
                                self.pop();
                            }
                            self.insert_element_for(tag);
                            self.pop();
                            ProcessResult::DoneAckSelfClosing
                        },

                        (EndTag, "optgroup") => {
                            if self.open_elems.len() >= 2
                                && self.current_node_named("option")
                                && self.html_elem_named(
                                    self.open_elems[self.open_elems.len() - 2],
                                    "optgroup",
                                )
                            {
                                self.pop();
                            }
                            if self.current_node_named("optgroup") {
                                self.pop();
                            } else {
                                self.unexpected(&tag);
                            }
                            ProcessResult::Done
                        },

                        (EndTag, "option") => {
                            if self.current_node_named("option") {
                                self.pop();
                            } else {
                                self.unexpected(&tag);
                            }
                            ProcessResult::Done
                        },

                        (StartTag, "select") | (EndTag, "select") => {
                            let in_scope = self.in_scope_named(select_scope, "select");

                            if !in_scope || tag.kind == StartTag {
                                self.unexpected(&tag);
                            }

                            if in_scope {
                                self.pop_until_named("select");
                                self.mode = self.reset_insertion_mode();
                            }
                            ProcessResult::Done
                        },

                        (StartTag, "input" | "keygen" | "textarea") => {
                            self.unexpected(&tag);
                            if self.in_scope_named(select_scope, "select") {
                                self.pop_until_named("select");
                                ProcessResult::Reprocess(self.reset_insertion_mode(), Token::Tag(tag))
                            } else {
                                ProcessResult::Done
                            }
                        },

                        (StartTag, "script" | "template") | (EndTag, "template") => {
                            self.step(InsertionMode::InHead, Token::Tag(tag))
                        },

                        _ => self.unexpected(&tag),
                    }
                },

                tok @ Token::Eof => self.step(InsertionMode::InBody, tok),
            },

            //§ parsing-main-inselectintable
            InsertionMode::InSelectInTable => match token {
                Token::Tag(tag) => {
                    let name = tag.name.clone();
                    match (tag.kind, &*name) {
                        (
                            StartTag,
                            "caption" | "table" | "tbody" | "tfoot" | "thead" | "tr" | "td" | "th",
                        ) => {
                            self.unexpected(&tag);
                            self.pop_until_named("select");
                            ProcessResult::Reprocess(self.reset_insertion_mode(), Token::Tag(tag))
                        },

                        (
                            EndTag,
                            "caption" | "table" | "tbody" | "tfoot" | "thead" | "tr" | "td" | "th",
                        ) => {
                            self.unexpected(&tag);
                            if self.in_scope_named(table_scope, &name) {
                                self.pop_until_named("select");
                                ProcessResult::Reprocess(self.reset_insertion_mode(), Token::Tag(tag))
                            } else {
                                ProcessResult::Done
                            }
                        },

                        _ => self.step(InsertionMode::InSelect, Token::Tag(tag)),
                    }
                },

                token => self.step(InsertionMode::InSelect, token),
            },

            //§ parsing-main-intemplate
            InsertionMode::InTemplate => match token {
                tok @ Token::Characters(_, _) => self.step(InsertionMode::InBody, tok),
                tok @ Token::Comment(_) => self.step(InsertionMode::InBody, tok),

                Token::Tag(tag) => {
                    let name = tag.name.clone();
                    match (tag.kind, &*name) {
                        (
                            StartTag,
                            "base" | "basefont" | "bgsound" | "link" | "meta" | "noframes"
                            | "script" | "style" | "template" | "title",
                        )
                        | (EndTag, "template") => self.step(InsertionMode::InHead, Token::Tag(tag)),

                        (StartTag, "caption" | "colgroup" | "tbody" | "tfoot" | "thead") => {
                            self.template_modes.pop();
                            self.template_modes.push(InsertionMode::InTable);
                            ProcessResult::Reprocess(InsertionMode::InTable, Token::Tag(tag))
                        },

                        (StartTag, "col") => {
                            self.template_modes.pop();
                            self.template_modes.push(InsertionMode::InColumnGroup);
                            ProcessResult::Reprocess(InsertionMode::InColumnGroup, Token::Tag(tag))
                        },

                        (StartTag, "tr") => {
                            self.template_modes.pop();
                            self.template_modes.push(InsertionMode::InTableBody);
                            ProcessResult::Reprocess(InsertionMode::InTableBody, Token::Tag(tag))
                        },

                        (StartTag, "td" | "th") => {
                            self.template_modes.pop();
                            self.template_modes.push(InsertionMode::InRow);
                            ProcessResult::Reprocess(InsertionMode::InRow, Token::Tag(tag))
                        },

                        (StartTag, _) => {
                            self.template_modes.pop();
                            self.template_modes.push(InsertionMode::InBody);
                            ProcessResult::Reprocess(InsertionMode::InBody, Token::Tag(tag))
                        },

                        (EndTag, _) => self.unexpected(&tag),
                    }
                },

                Token::Eof => {
                    if !self.in_html_elem_named("template") {
                        self.stop_parsing()
                    } else {
                        self.unexpected(&Token::Eof);
                        self.pop_until_named("template");
                        self.clear_active_formatting_to_marker();
                        self.template_modes.pop();
                        self.mode = self.reset_insertion_mode();
                        ProcessResult::Reprocess(self.reset_insertion_mode(), Token::Eof)
                    }
                },

                token => self.unexpected(&token),
            },

            //§ parsing-main-afterbody
            InsertionMode::AfterBody => match token {
                Token::Characters(SplitStatus::NotSplit, text) => {
                    ProcessResult::SplitWhitespace(text)
                },
                tok @ Token::Characters(SplitStatus::Whitespace, _) => {
                    self.step(InsertionMode::InBody, tok)
                },
                Token::Comment(text) => self.append_comment_to_html(text),

                Token::Tag(tag) => {
                    let name = tag.name.clone();
                    match (tag.kind, &*name) {
                        (StartTag, "html") => self.step(InsertionMode::InBody, Token::Tag(tag)),

                        (EndTag, "html") => {
                            if self.is_fragment() {
                                self.unexpected(&tag);
                            } else {
                                self.mode = InsertionMode::AfterAfterBody;
                            }
                            ProcessResult::Done
                        },

                        _ => {
                            self.unexpected(&tag);
                            ProcessResult::Reprocess(InsertionMode::InBody, Token::Tag(tag))
                        },
                    }
                },

                Token::Eof => self.stop_parsing(),

                token => {
                    self.unexpected(&token);
                    ProcessResult::Reprocess(InsertionMode::InBody, token)
                },
            },

            //§ parsing-main-inframeset
            InsertionMode::InFrameset => match token {
                Token::Characters(SplitStatus::NotSplit, text) => {
                    ProcessResult::SplitWhitespace(text)
                },
                Token::Characters(SplitStatus::Whitespace, text) => self.append_text(text),
                Token::Comment(text) => self.append_comment(text),

                Token::Tag(tag) => {
                    let name = tag.name.clone();
                    match (tag.kind, &*name) {
                        (StartTag, "html") => self.step(InsertionMode::InBody, Token::Tag(tag)),

                        (StartTag, "frameset") => {
                            self.insert_element_for(tag);
                            ProcessResult::Done
                        },

                        (EndTag, "frameset") => {
                            if self.open_elems.len() == 1 {
                                self.unexpected(&tag);
                            } else {
                                self.pop();
                                if !self.is_fragment() && !self.current_node_named("frameset") {
                                    self.mode = InsertionMode::AfterFrameset;
                                }
                            }
                            ProcessResult::Done
                        },

                        (StartTag, "frame") => {
                            self.insert_and_pop_element_for(tag);
                            ProcessResult::DoneAckSelfClosing
                        },

                        (StartTag, "noframes") => self.step(InsertionMode::InHead, Token::Tag(tag)),

                        _ => self.unexpected(&tag),
                    }
                },

                Token::Eof => {
                    if self.open_elems.len() != 1 {
                        self.unexpected(&Token::Eof);
                    }
                    self.stop_parsing()
                },

                token => self.unexpected(&token),
            },

            //§ parsing-main-afterframeset
            InsertionMode::AfterFrameset => match token {
                Token::Characters(SplitStatus::NotSplit, text) => {
                    ProcessResult::SplitWhitespace(text)
                },
                Token::Characters(SplitStatus::Whitespace, text) => self.append_text(text),
                Token::Comment(text) => self.append_comment(text),

                Token::Tag(tag) => {
                    let name = tag.name.clone();
                    match (tag.kind, &*name) {
                        (StartTag, "html") => self.step(InsertionMode::InBody, Token::Tag(tag)),

                        (EndTag, "html") => {
                            self.mode = InsertionMode::AfterAfterFrameset;
                            ProcessResult::Done
                        },

                        (StartTag, "noframes") => self.step(InsertionMode::InHead, Token::Tag(tag)),

                        _ => self.unexpected(&tag),
                    }
                },

                Token::Eof => self.stop_parsing(),

                token => self.unexpected(&token),
            },

            //§ the-after-after-body-insertion-mode
            InsertionMode::AfterAfterBody => match token {
                Token::Characters(SplitStatus::NotSplit, text) => {
                    ProcessResult::SplitWhitespace(text)
                },
                tok @ Token::Characters(SplitStatus::Whitespace, _) => {
                    self.step(InsertionMode::InBody, tok)
                },
                Token::Comment(text) => self.append_comment_to_doc(text),

                Token::Tag(tag) => {
                    let name = tag.name.clone();
                    match (tag.kind, &*name) {
                        (StartTag, "html") => self.step(InsertionMode::InBody, Token::Tag(tag)),

                        _ => {
                            self.unexpected(&tag);
                            ProcessResult::Reprocess(InsertionMode::InBody, Token::Tag(tag))
                        },
                    }
                },

                Token::Eof => self.stop_parsing(),

                token => {
                    self.unexpected(&token);
                    ProcessResult::Reprocess(InsertionMode::InBody, token)
                },
            },

            //§ the-after-after-frameset-insertion-mode
            InsertionMode::AfterAfterFrameset => match token {
                Token::Characters(SplitStatus::NotSplit, text) => {
                    ProcessResult::SplitWhitespace(text)
                },
                tok @ Token::Characters(SplitStatus::Whitespace, _) => {
                    self.step(InsertionMode::InBody, tok)
                },
                Token::Comment(text) => self.append_comment_to_doc(text),

                Token::Tag(tag) => {
                    let name = tag.name.clone();
                    match (tag.kind, &*name) {
                        (StartTag, "html") => self.step(InsertionMode::InBody, Token::Tag(tag)),

                        (StartTag, "noframes") => self.step(InsertionMode::InHead, Token::Tag(tag)),

                        _ => self.unexpected(&tag),
                    }
                },

                Token::Eof => self.stop_parsing(),

                token => self.unexpected(&token),
            },
            //§ END
        }
    }

    pub(crate) fn step_foreign(&mut self, token: Token) -> ProcessResult {
        match token {
            Token::NullCharacter => {
                self.unexpected(&Token::NullCharacter);
                self.append_text("\u{fffd}".to_tendril())
            },

            Token::Characters(_, text) => {
                if any_not_whitespace(&text) {
                    self.frameset_ok = false;
                }
                self.append_text(text)
            },

            Token::Comment(text) => self.append_comment(text),

            Token::Tag(tag) => {
                let name = tag.name.clone();
                match (tag.kind, &*name) {
                    (
                        StartTag,
                        "b" | "big" | "blockquote" | "body" | "br" | "center" | "code" | "dd"
                        | "div" | "dl" | "dt" | "em" | "embed" | "h1" | "h2" | "h3" | "h4" | "h5"
                        | "h6" | "head" | "hr" | "i" | "img" | "li" | "listing" | "menu" | "meta"
                        | "nobr" | "ol" | "p" | "pre" | "ruby" | "s" | "small" | "span" | "strong"
                        | "strike" | "sub" | "sup" | "table" | "tt" | "u" | "ul" | "var",
                    )
                    | (EndTag, "br" | "p") => self.unexpected_start_tag_in_foreign_content(tag),

                    (StartTag, "font") => {
                        let unexpected = tag.attrs.iter().any(|attr| {
                            attr.name.ns == Namespace::None
                                && matches!(&*attr.name.local, "color" | "face" | "size")
                        });
                        if unexpected {
                            self.unexpected_start_tag_in_foreign_content(tag)
                        } else {
                            self.foreign_start_tag(tag)
                        }
                    },

                    (StartTag, _) => self.foreign_start_tag(tag),

                    // FIXME: </script> in SVG

                    (EndTag, _) => {
                        let mut first = true;
                        let mut stack_idx = self.open_elems.len() - 1;
                        loop {
                            if stack_idx == 0 {
                                return ProcessResult::Done;
                            }

                            let html;
                            let eq;
                            {
                                let node_name = self.dom.elem_name(self.open_elems[stack_idx]);
                                html = node_name.ns == Namespace::Html;
                                eq = node_name.local.eq_ignore_ascii_case(&name);
                            }
                            if !first && html {
                                let mode = self.mode;
                                return self.step(mode, Token::Tag(tag));
                            }

                            if eq {
                                self.open_elems.truncate(stack_idx);
                                return ProcessResult::Done;
                            }

                            if first {
                                self.unexpected(&tag);
                                first = false;
                            }
                            stack_idx -= 1;
                        }
                    },
                }
            },

            // EOF is never dispatched to foreign content.
            Token::Eof => panic!("impossible case in foreign content"),
        }
    }
}
