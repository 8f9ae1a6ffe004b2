// Copyright 2024-2026 The tagtree Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::borrow::Cow;
use tendril::StrTendril;

use crate::interface::{Attribute, LocalName};
use crate::tokenizer::states;

pub use self::TagKind::{EndTag, StartTag};

/// A `DOCTYPE` token.
#[derive(PartialEq, Eq, Clone, Debug, Default)]
pub struct Doctype {
    pub name: Option<StrTendril>,
    pub public_id: Option<StrTendril>,
    pub system_id: Option<StrTendril>,
    pub force_quirks: bool,
}

#[derive(PartialEq, Eq, Hash, Copy, Clone, Debug)]
pub enum TagKind {
    StartTag,
    EndTag,
}

/// A tag token.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Tag {
    pub kind: TagKind,
    pub name: LocalName,
    pub self_closing: bool,
    pub attrs: Vec<Attribute>,
}

impl Tag {
    /// Are the tags equivalent when we don't care about attribute order?
    /// Also ignores the self-closing flag. This is the equivalence Noah's
    /// Ark uses.
    pub fn equiv_modulo_attr_order(&self, other: &Tag) -> bool {
        if (self.kind != other.kind) || (self.name != other.name) {
            return false;
        }

        let mut self_attrs = self.attrs.clone();
        let mut other_attrs = other.attrs.clone();
        self_attrs.sort();
        other_attrs.sort();

        self_attrs == other_attrs
    }
}

/// Tokens emitted by the tokenizer, in source order.
///
/// Adjacent character emissions are coalesced: the sink sees at most one
/// `Characters` token for any contiguous text run, delivered strictly
/// before the non-character token that ended the run. A U+0000 seen in the
/// data state is reported as the distinct `NullCharacter` token so the tree
/// builder can apply its per-mode NUL rules.
#[derive(PartialEq, Eq, Debug)]
pub enum Token {
    Doctype(Doctype),
    Tag(Tag),
    Comment(StrTendril),
    Characters(StrTendril),
    NullCharacter,
    Eof,
    ParseError(Cow<'static, str>),
}

/// What the sink wants the tokenizer to do after the current token; this is
/// the tag-name/state coupling (`<script>` switches to script data, etc.)
/// flowing back from the tree builder.
#[derive(Debug, PartialEq)]
#[must_use]
pub enum TokenSinkResult {
    Continue,
    Plaintext,
    RawData(states::RawKind),
}

/// Types which can receive tokens from the tokenizer.
pub trait TokenSink {
    /// Process a token.
    fn process_token(&mut self, token: Token, line_number: u64) -> TokenSinkResult;

    /// Signal that tokenization reached the end of input.
    fn end(&mut self) {}

    /// The re-entrant tree-builder feedback bit, sampled in the markup
    /// declaration open state. It decides whether `<![CDATA[` starts a
    /// CDATA section (true) or a bogus comment (false).
    fn adjusted_current_node_present_but_not_in_html_namespace(&self) -> bool {
        false
    }
}
