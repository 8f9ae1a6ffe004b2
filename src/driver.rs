// Copyright 2024-2026 The tagtree Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! High-level interface to the parser: byte input in, finished [`Dom`] out.

use tendril::StrTendril;
use thiserror::Error;

use crate::dom::Dom;
use crate::interface::{LocalName, Namespace, QualName};
use crate::tokenizer::{Tokenizer, TokenizerOpts};
use crate::tree_builder::{TreeBuilder, TreeBuilderOpts};
use crate::util::buffer_queue::BufferQueue;

/// All-encompassing parser options.
#[derive(Clone, Default)]
pub struct ParseOpts {
    pub tokenizer: TokenizerOpts,
    pub tree_builder: TreeBuilderOpts,
}

/// A malformed fragment-parsing context. These are caller errors; parsing
/// itself cannot fail.
#[derive(Debug, PartialEq, Eq, Error)]
pub enum FragmentContextError {
    #[error("fragment context is empty")]
    EmptyContext,
    #[error("unknown fragment context namespace `{0}`")]
    UnknownNamespace(String),
    #[error("malformed fragment context `{0}`")]
    Malformed(String),
}

/// Parse a complete document from bytes.
///
/// The input is decoded as UTF-8 (lossily; there is no encoding sniffing)
/// and newlines are normalized once, before tokenization. Malformed markup
/// cannot fail: every input produces a tree.
pub fn parse_document(input: &[u8], opts: ParseOpts) -> Dom {
    let tree_builder = TreeBuilder::new(opts.tree_builder);
    let mut tokenizer = Tokenizer::new(tree_builder, opts.tokenizer);

    let mut buffer = BufferQueue::new();
    buffer.push_back(prepare_input(input));
    tokenizer.feed(&mut buffer);
    tokenizer.end();

    tokenizer.sink.finish()
}

/// Parse bytes as a fragment inside a context element, e.g. `"div"`,
/// `"template"`, `"svg path"` or `"math mtext"`.
///
/// The tree is built as if inside the context element;
/// [`Dom::fragment_children`](crate::dom::Dom::fragment_children) gives the
/// resulting nodes. When the context is a RAWTEXT/RCDATA/script/plaintext
/// element the tokenizer starts in the matching state, but with no
/// "appropriate end tag", so end tags come out as text.
pub fn parse_fragment(
    input: &[u8],
    context: &str,
    opts: ParseOpts,
) -> Result<Dom, FragmentContextError> {
    let context = parse_context_name(context)?;
    let tree_builder = TreeBuilder::new_for_fragment(opts.tree_builder, context);

    let mut tokenizer_opts = opts.tokenizer;
    if tokenizer_opts.initial_state.is_none() {
        tokenizer_opts.initial_state = Some(tree_builder.tokenizer_state_for_context_elem());
    }
    let mut tokenizer = Tokenizer::new(tree_builder, tokenizer_opts);

    let mut buffer = BufferQueue::new();
    buffer.push_back(prepare_input(input));
    tokenizer.feed(&mut buffer);
    tokenizer.end();

    Ok(tokenizer.sink.finish())
}

fn parse_context_name(context: &str) -> Result<QualName, FragmentContextError> {
    let mut parts = context.split_ascii_whitespace();
    let Some(first) = parts.next() else {
        return Err(FragmentContextError::EmptyContext);
    };
    let name = match parts.next() {
        None => QualName::html(first),
        Some(local) => {
            let ns = match first {
                "svg" => Namespace::Svg,
                "math" => Namespace::MathMl,
                _ => return Err(FragmentContextError::UnknownNamespace(first.to_owned())),
            };
            QualName::new(None, ns, LocalName::from(local))
        },
    };
    if parts.next().is_some() {
        return Err(FragmentContextError::Malformed(context.to_owned()));
    }
    Ok(name)
}

/// Decode and preprocess the input stream: UTF-8 with replacement, then
/// CRLF and lone CR collapsed to LF. The tokenizer never sees `\r`.
fn prepare_input(input: &[u8]) -> StrTendril {
    let decoded = String::from_utf8_lossy(input);
    if !decoded.as_bytes().contains(&b'\r') {
        return StrTendril::from_slice(&decoded);
    }

    let mut out = String::with_capacity(decoded.len());
    let mut chars = decoded.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\r' {
            if chars.peek() == Some(&'\n') {
                chars.next();
            }
            out.push('\n');
        } else {
            out.push(c);
        }
    }
    StrTendril::from_slice(&out)
}

#[cfg(test)]
mod test {
    use super::{parse_context_name, prepare_input, FragmentContextError};
    use crate::interface::{Namespace, QualName};

    #[test]
    fn newlines_normalize_once_at_entry() {
        assert_eq!(&*prepare_input(b"a\r\nb\rc\nd"), "a\nb\nc\nd");
        assert_eq!(&*prepare_input(b"\r\r\n\r"), "\n\n\n");
        assert_eq!(&*prepare_input(b"plain"), "plain");
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        assert_eq!(&*prepare_input(b"a\xffb"), "a\u{fffd}b");
    }

    #[test]
    fn context_names() {
        assert_eq!(parse_context_name("div"), Ok(QualName::html("div")));
        assert_eq!(
            parse_context_name("svg path"),
            Ok(QualName::new(None, Namespace::Svg, "path".into()))
        );
        assert_eq!(
            parse_context_name("math mtext"),
            Ok(QualName::new(None, Namespace::MathMl, "mtext".into()))
        );
        assert_eq!(parse_context_name(""), Err(FragmentContextError::EmptyContext));
        assert!(matches!(
            parse_context_name("tv static"),
            Err(FragmentContextError::UnknownNamespace(_))
        ));
    }
}
