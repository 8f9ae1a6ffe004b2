// Copyright 2024-2026 The tagtree Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Types used within the tree builder code. Not exported to users.

use tendril::StrTendril;

use crate::dom::NodeId;
use crate::tokenizer::states::RawKind;
use crate::tokenizer::Tag;

/// The insertion modes from the tree-construction section of the HTML
/// Standard.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub(crate) enum InsertionMode {
    Initial,
    BeforeHtml,
    BeforeHead,
    InHead,
    InHeadNoscript,
    AfterHead,
    InBody,
    Text,
    InTable,
    InTableText,
    InCaption,
    InColumnGroup,
    InTableBody,
    InRow,
    InCell,
    InSelect,
    InSelectInTable,
    InTemplate,
    AfterBody,
    InFrameset,
    AfterFrameset,
    AfterAfterBody,
    AfterAfterFrameset,
}

/// Has a character run been split into whitespace/non-whitespace pieces
/// yet? Modes that ignore whitespace but reprocess substance ask for a
/// split lazily; fully-split pieces carry the answer so it is computed at
/// most once.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub(crate) enum SplitStatus {
    NotSplit,
    Whitespace,
    NotWhitespace,
}

/// A subset/refinement of `tokenizer::Token`. Everything else is handled
/// specially at the beginning of `process_token`.
#[derive(PartialEq, Eq, Clone, Debug)]
pub(crate) enum Token {
    Tag(Tag),
    Comment(StrTendril),
    Characters(SplitStatus, StrTendril),
    NullCharacter,
    Eof,
}

/// What a mode handler decided about the token it was given.
pub(crate) enum ProcessResult {
    Done,
    DoneAckSelfClosing,
    SplitWhitespace(StrTendril),
    Reprocess(InsertionMode, Token),
    ToPlaintext,
    ToRawData(RawKind),
}

/// An entry in the list of active formatting elements.
pub(crate) enum FormatEntry {
    Element(NodeId, Tag),
    Marker,
}

/// The appropriate place for inserting a node.
pub(crate) enum InsertionPoint {
    /// Insert as last child in this parent.
    LastChild(NodeId),
    /// Foster parenting: insertion point is decided based on the existence
    /// of the table's parent node.
    TableFosterParenting {
        element: NodeId,
        prev_element: NodeId,
    },
}
