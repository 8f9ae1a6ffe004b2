// Copyright 2024-2026 The tagtree Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Token-level tests: run the tokenizer with a collecting sink and check
//! the exact token sequence, including character-run coalescing.

use tagtree::interface::{Attribute, LocalName, QualName};
use tagtree::tendril::{SliceExt, StrTendril};
use tagtree::tokenizer::states;
use tagtree::tokenizer::{
    Doctype, Tag, TagKind, Token, TokenSink, TokenSinkResult, Tokenizer, TokenizerOpts,
};
use tagtree::BufferQueue;

/// Collects tokens; parse errors are gathered separately so tests can
/// assert the token stream shape without enumerating every error.
struct Collector {
    tokens: Vec<Token>,
    errors: Vec<String>,
    in_cdata: bool,
}

impl Collector {
    fn new() -> Collector {
        Collector {
            tokens: vec![],
            errors: vec![],
            in_cdata: false,
        }
    }
}

impl TokenSink for Collector {
    fn process_token(&mut self, token: Token, _line_number: u64) -> TokenSinkResult {
        match token {
            Token::ParseError(e) => self.errors.push(e.into_owned()),
            token => self.tokens.push(token),
        }
        TokenSinkResult::Continue
    }

    fn adjusted_current_node_present_but_not_in_html_namespace(&self) -> bool {
        self.in_cdata
    }
}

fn tokenize_with(input: &str, opts: TokenizerOpts, in_cdata: bool) -> Collector {
    let mut sink = Collector::new();
    sink.in_cdata = in_cdata;
    let mut tok = Tokenizer::new(sink, opts);
    let mut buffer = BufferQueue::new();
    buffer.push_back(StrTendril::from_slice(input));
    tok.feed(&mut buffer);
    tok.end();
    tok.sink
}

fn tokenize(input: &str) -> Collector {
    tokenize_with(input, TokenizerOpts::default(), false)
}

fn chars(s: &str) -> Token {
    Token::Characters(s.to_tendril())
}

fn start_tag(name: &str, attrs: Vec<(&str, &str)>) -> Token {
    Token::Tag(Tag {
        kind: TagKind::StartTag,
        name: LocalName::from(name),
        self_closing: false,
        attrs: attrs
            .into_iter()
            .map(|(name, value)| Attribute {
                name: QualName::attr(LocalName::from(name)),
                value: value.to_tendril(),
            })
            .collect(),
    })
}

fn end_tag(name: &str) -> Token {
    Token::Tag(Tag {
        kind: TagKind::EndTag,
        name: LocalName::from(name),
        self_closing: false,
        attrs: vec![],
    })
}

#[test]
fn character_runs_coalesce_and_precede_tags() {
    let out = tokenize("foo bar<b>baz</b>quux");
    assert_eq!(
        out.tokens,
        vec![
            chars("foo bar"),
            start_tag("b", vec![]),
            chars("baz"),
            end_tag("b"),
            chars("quux"),
            Token::Eof,
        ]
    );
}

#[test]
fn nul_in_data_is_reported_out_of_band() {
    let out = tokenize("a\0b");
    assert_eq!(
        out.tokens,
        vec![chars("a"), Token::NullCharacter, chars("b"), Token::Eof]
    );
    assert_eq!(out.errors.len(), 1);
}

#[test]
fn tag_names_and_attr_names_are_lowercased() {
    let out = tokenize("<DIV CLASS=Foo>");
    assert_eq!(
        out.tokens,
        vec![start_tag("div", vec![("class", "Foo")]), Token::Eof]
    );
}

#[test]
fn duplicate_attributes_keep_the_first() {
    let out = tokenize("<a b=1 b=2 c=3>");
    assert_eq!(
        out.tokens,
        vec![start_tag("a", vec![("b", "1"), ("c", "3")]), Token::Eof]
    );
    assert_eq!(out.errors.len(), 1);
}

#[test]
fn self_closing_flag() {
    let out = tokenize("<br/>");
    match &out.tokens[0] {
        Token::Tag(tag) => {
            assert_eq!(&*tag.name, "br");
            assert!(tag.self_closing);
        },
        other => panic!("expected tag, got {other:?}"),
    }
}

#[test]
fn eof_in_tag_discards_the_tag() {
    let out = tokenize("xyz<div foo=bar");
    assert_eq!(out.tokens, vec![chars("xyz"), Token::Eof]);
    assert_eq!(out.errors.len(), 1);
}

#[test]
fn nul_in_tag_name_becomes_replacement_char() {
    let out = tokenize("<di\0v>");
    assert_eq!(
        out.tokens,
        vec![start_tag("di\u{fffd}v", vec![]), Token::Eof]
    );
}

#[test]
fn numeric_reference_edge_cases() {
    let out = tokenize("&#0;&#x110000;&#xD800;&#x80;&#65;");
    assert_eq!(
        out.tokens,
        vec![chars("\u{fffd}\u{fffd}\u{fffd}\u{20ac}A"), Token::Eof]
    );
    // All but the last are invalid-reference errors.
    assert_eq!(out.errors.len(), 4);
}

#[test]
fn named_reference_longest_match_and_legacy() {
    // `&copy` without a semicolon is a legacy entity in data context.
    let out = tokenize("&copy;&copy&gt;");
    assert_eq!(out.tokens, vec![chars("\u{a9}\u{a9}>"), Token::Eof]);
}

#[test]
fn legacy_entity_followed_by_equals_stays_literal_in_attributes() {
    let out = tokenize("<a x=\"?lang=en&copy=1\" y=\"&copy1\" z=\"&copy;\">");
    assert_eq!(
        out.tokens,
        vec![
            start_tag(
                "a",
                vec![("x", "?lang=en&copy=1"), ("y", "&copy1"), ("z", "\u{a9}")]
            ),
            Token::Eof
        ]
    );
}

#[test]
fn legacy_entity_in_data_still_expands() {
    let out = tokenize("&copy=1");
    assert_eq!(out.tokens, vec![chars("\u{a9}=1"), Token::Eof]);
    assert_eq!(out.errors.len(), 1);
}

#[test]
fn two_codepoint_entity() {
    let out = tokenize("&NotEqualTilde;");
    assert_eq!(out.tokens, vec![chars("\u{2242}\u{338}"), Token::Eof]);
}

#[test]
fn bare_ampersand_is_literal() {
    let out = tokenize("fish & chips &; &#");
    assert_eq!(out.tokens, vec![chars("fish & chips &; &#"), Token::Eof]);
}

#[test]
fn doctype_with_ids() {
    let out = tokenize(
        "<!DOCTYPE HTML PUBLIC \"-//W3C//DTD HTML 4.01//EN\" \"http://www.w3.org/TR/html4/strict.dtd\">",
    );
    assert_eq!(
        out.tokens,
        vec![
            Token::Doctype(Doctype {
                name: Some("html".to_tendril()),
                public_id: Some("-//W3C//DTD HTML 4.01//EN".to_tendril()),
                system_id: Some("http://www.w3.org/TR/html4/strict.dtd".to_tendril()),
                force_quirks: false,
            }),
            Token::Eof
        ]
    );
}

#[test]
fn eof_inside_doctype_forces_quirks() {
    let out = tokenize("<!DOCTYPE html");
    assert_eq!(
        out.tokens,
        vec![
            Token::Doctype(Doctype {
                name: Some("html".to_tendril()),
                public_id: None,
                system_id: None,
                force_quirks: true,
            }),
            Token::Eof
        ]
    );
}

#[test]
fn bogus_doctype_forces_quirks() {
    let out = tokenize("<!DOCTYPE html BOGUS>");
    match &out.tokens[0] {
        Token::Doctype(dt) => assert!(dt.force_quirks),
        other => panic!("expected doctype, got {other:?}"),
    }
}

#[test]
fn comment_flavors() {
    let out = tokenize("<!--plain--><!---->x<!--a--b-->");
    assert_eq!(
        out.tokens,
        vec![
            Token::Comment("plain".to_tendril()),
            Token::Comment("".to_tendril()),
            chars("x"),
            Token::Comment("a--b".to_tendril()),
            Token::Eof
        ]
    );
}

#[test]
fn bogus_comment_from_bang() {
    let out = tokenize("<!whatever>");
    assert_eq!(
        out.tokens,
        vec![Token::Comment("whatever".to_tendril()), Token::Eof]
    );
}

#[test]
fn cdata_is_characters_in_foreign_content() {
    let out = tokenize_with("<![CDATA[x<b>y]]>", TokenizerOpts::default(), true);
    assert_eq!(out.tokens, vec![chars("x<b>y"), Token::Eof]);
}

#[test]
fn cdata_is_bogus_comment_in_html_content() {
    let out = tokenize("<![CDATA[x]]>");
    assert_eq!(
        out.tokens,
        vec![Token::Comment("[CDATA[x]]".to_tendril()), Token::Eof]
    );
}

#[test]
fn rawtext_only_closes_on_appropriate_end_tag() {
    let opts = TokenizerOpts {
        initial_state: Some(states::RawData(states::Rawtext)),
        last_start_tag_name: Some("style".to_string()),
        ..Default::default()
    };
    let out = tokenize_with("a</div>b</style>c", opts, false);
    assert_eq!(
        out.tokens,
        vec![chars("a</div>b"), end_tag("style"), chars("c"), Token::Eof]
    );
}

#[test]
fn rawtext_without_last_start_tag_never_closes() {
    let opts = TokenizerOpts {
        initial_state: Some(states::RawData(states::Rcdata)),
        ..Default::default()
    };
    let out = tokenize_with("</title>x", opts, false);
    assert_eq!(out.tokens, vec![chars("</title>x"), Token::Eof]);
}

#[test]
fn script_data_double_escape() {
    let opts = TokenizerOpts {
        initial_state: Some(states::RawData(states::ScriptData)),
        last_start_tag_name: Some("script".to_string()),
        ..Default::default()
    };
    let out = tokenize_with("<!--<script>a</script>--></script>x", opts, false);
    assert_eq!(
        out.tokens,
        vec![
            chars("<!--<script>a</script>-->"),
            end_tag("script"),
            chars("x"),
            Token::Eof
        ]
    );
}

#[test]
fn plaintext_never_ends() {
    let opts = TokenizerOpts {
        initial_state: Some(states::Plaintext),
        ..Default::default()
    };
    let out = tokenize_with("a</plaintext>b", opts, false);
    assert_eq!(out.tokens, vec![chars("a</plaintext>b"), Token::Eof]);
}

#[test]
fn bom_is_discarded_by_default() {
    let out = tokenize("\u{feff}x");
    assert_eq!(out.tokens, vec![chars("x"), Token::Eof]);
}

#[test]
fn xml_coercions_rewrite_text_and_comments() {
    let opts = TokenizerOpts {
        xml_coercions: true,
        ..Default::default()
    };
    let out = tokenize_with("a\u{c}b<!--x--y-->", opts, false);
    assert_eq!(
        out.tokens,
        vec![
            chars("a b"),
            Token::Comment("x- -y".to_tendril()),
            Token::Eof
        ]
    );
}

#[test]
fn end_tag_with_attributes_is_an_error() {
    let out = tokenize("</div class=x>");
    assert_eq!(out.errors.len(), 1);
    match &out.tokens[0] {
        Token::Tag(tag) => {
            assert_eq!(tag.kind, TagKind::EndTag);
            assert_eq!(&*tag.name, "div");
        },
        other => panic!("expected tag, got {other:?}"),
    }
}

#[test]
fn chunked_input_across_tag_boundaries() {
    // Feed the same input in every possible two-chunk split and expect
    // identical token streams.
    let input = "<!DOCTYPE html><p class=\"a&amp;b\">x &notin; y</p>";
    let whole = tokenize(input);

    for split in 1..input.len() {
        if !input.is_char_boundary(split) {
            continue;
        }
        let mut tok = Tokenizer::new(Collector::new(), TokenizerOpts::default());
        let mut buffer = BufferQueue::new();
        buffer.push_back(StrTendril::from_slice(&input[..split]));
        tok.feed(&mut buffer);
        buffer.push_back(StrTendril::from_slice(&input[split..]));
        tok.feed(&mut buffer);
        tok.end();
        assert_eq!(tok.sink.tokens, whole.tokens, "split at byte {split}");
    }
}
