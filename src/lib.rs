// Copyright 2024-2026 The tagtree Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A WHATWG-compliant HTML5 parser.
//!
//! `tagtree` turns arbitrary bytes into a document tree, following the HTML
//! Standard's tokenization and tree-construction algorithms including all of
//! the error-recovery behavior that makes real-world markup parse the same
//! way everywhere. There is no fatal-error path: every input produces a tree.
//!
//! The two entry points are [`parse_document`] and [`parse_fragment`]; both
//! produce an arena-backed [`Dom`](dom::Dom) keyed by opaque
//! [`NodeId`](dom::NodeId) handles.

#![allow(unused_parens)]

pub use crate::driver::{parse_document, parse_fragment, FragmentContextError, ParseOpts};

#[macro_use]
mod macros;

mod util {
    pub mod buffer_queue;
    pub mod smallcharset;
    pub mod str;
}

pub mod data;
pub mod dom;
pub mod driver;
pub mod interface;
pub mod serialize;
pub mod tokenizer;
pub mod tree_builder;

pub use interface::{Attribute, ExpandedName, LocalName, Namespace, Prefix, QualName, QuirksMode};
pub use util::buffer_queue::{BufferQueue, SetResult};
pub use util::smallcharset::SmallCharSet;

/// Re-export the tendril crate.
pub use tendril;
