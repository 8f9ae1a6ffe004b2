// Copyright 2024-2026 The tagtree Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The HTML5 tokenizer.
//!
//! Input is expected to have newlines normalized already (the driver does
//! this once, at entry); the state machine itself never sees `\r`.

pub use self::interface::{Doctype, Tag, TagKind, Token, TokenSink, TokenSinkResult};
pub use self::interface::{EndTag, StartTag};

use self::char_ref::{CharRef, CharRefTokenizer};
use self::states::{DoctypeIdKind, Public, System};
use self::states::{DoubleEscaped, Escaped};
use self::states::{DoubleQuoted, SingleQuoted, Unquoted};
use self::states::{Rawtext, Rcdata, ScriptData, ScriptDataEscaped};

use crate::interface::{Attribute, LocalName, QualName};
use crate::util::buffer_queue::{BufferQueue, FromSet, NotFromSet, SetResult};
use crate::util::str::lower_ascii_letter;

use log::{debug, trace};
use mac::{format_if, unwrap_or_return};
use std::borrow::Cow::{self, Borrowed};
use std::collections::BTreeMap;
use std::mem;
use tendril::StrTendril;

mod char_ref;
mod interface;
pub mod states;

/// Did this step of the state machine make progress, or is it waiting for
/// more input?
enum StepResult {
    Continue,
    Suspend,
}

fn option_push(opt_str: &mut Option<StrTendril>, c: char) {
    match *opt_str {
        Some(ref mut s) => s.push_char(c),
        None => *opt_str = Some(StrTendril::from_char(c)),
    }
}

/// Tokenizer options, with an impl for `Default`.
#[derive(Clone)]
pub struct TokenizerOpts {
    /// Report all parse errors described in the spec, at some performance
    /// penalty? Default: false
    pub exact_errors: bool,

    /// Discard a `U+FEFF BYTE ORDER MARK` if we see one at the beginning of
    /// the stream? Default: true
    pub discard_bom: bool,

    /// Coerce the emitted tokens so that the result is representable as an
    /// XML 1.0 infoset: U+000C in text becomes a space, U+FFFF becomes
    /// U+FFFD, and `--` inside comment data becomes `- -`. Default: false
    pub xml_coercions: bool,

    /// Keep a record of how long we spent in each state? Printed when
    /// `end()` is called. Default: false
    pub profile: bool,

    /// Initial state override. Only the test runner and the fragment
    /// algorithm should use a non-`None` value!
    pub initial_state: Option<states::State>,

    /// Last start tag. Only the test runner should use a non-`None` value!
    pub last_start_tag_name: Option<String>,
}

impl Default for TokenizerOpts {
    fn default() -> TokenizerOpts {
        TokenizerOpts {
            exact_errors: false,
            discard_bom: true,
            xml_coercions: false,
            profile: false,
            initial_state: None,
            last_start_tag_name: None,
        }
    }
}

/// The HTML tokenizer.
pub struct Tokenizer<Sink> {
    /// Options controlling the behavior of the tokenizer.
    pub(crate) opts: TokenizerOpts,

    /// Destination for tokens we emit.
    pub sink: Sink,

    /// The abstract machine state as described in the spec.
    state: states::State,

    /// Are we at the end of the file, once buffers have been processed
    /// completely? This affects whether we will wait for lookahead or not.
    at_eof: bool,

    /// Tokenizer for character references, if we're tokenizing one at the
    /// moment.
    char_ref_tokenizer: Option<Box<CharRefTokenizer>>,

    /// Current input character. Just consumed, may reconsume.
    current_char: char,

    /// Should we reconsume the current input character?
    reconsume: bool,

    /// Discard a U+FEFF BYTE ORDER MARK if we see one? Only done at the
    /// beginning of the stream.
    discard_bom: bool,

    /// Current tag kind.
    current_tag_kind: TagKind,

    /// Current tag name.
    current_tag_name: StrTendril,

    /// Current tag is self-closing?
    current_tag_self_closing: bool,

    /// Current tag attributes.
    current_tag_attrs: Vec<Attribute>,

    /// Current attribute name.
    current_attr_name: StrTendril,

    /// Current attribute value.
    current_attr_value: StrTendril,

    /// Current comment.
    current_comment: StrTendril,

    /// Current doctype token.
    current_doctype: Doctype,

    /// Last start tag name, for use in checking "appropriate end tag".
    last_start_tag_name: Option<LocalName>,

    /// The "temporary buffer" mentioned in the spec.
    temp_buf: StrTendril,

    /// The pending run of character emissions. Flushed as a single
    /// `Characters` token before any non-character token and at EOF.
    char_run: StrTendril,

    /// Record of how many ns we spent in each state, if profiling is
    /// enabled.
    state_profile: BTreeMap<states::State, u64>,

    /// Record of how many ns we spent in the token sink.
    time_in_sink: u64,

    /// Track current line.
    current_line: u64,
}

impl<Sink: TokenSink> Tokenizer<Sink> {
    /// Create a new tokenizer which feeds tokens to a particular `TokenSink`.
    pub fn new(sink: Sink, mut opts: TokenizerOpts) -> Tokenizer<Sink> {
        let start_tag_name = opts.last_start_tag_name.take().map(|s| LocalName::from(&*s));
        let state = opts.initial_state.unwrap_or(states::Data);
        let discard_bom = opts.discard_bom;
        Tokenizer {
            opts,
            sink,
            state,
            at_eof: false,
            char_ref_tokenizer: None,
            current_char: '\0',
            reconsume: false,
            discard_bom,
            current_tag_kind: StartTag,
            current_tag_name: StrTendril::new(),
            current_tag_self_closing: false,
            current_tag_attrs: vec![],
            current_attr_name: StrTendril::new(),
            current_attr_value: StrTendril::new(),
            current_comment: StrTendril::new(),
            current_doctype: Doctype::default(),
            last_start_tag_name: start_tag_name,
            temp_buf: StrTendril::new(),
            char_run: StrTendril::new(),
            state_profile: BTreeMap::new(),
            time_in_sink: 0,
            current_line: 1,
        }
    }

    /// Feed an input buffer into the tokenizer, running the state machine
    /// for as long as input is available.
    pub fn feed(&mut self, input: &mut BufferQueue) {
        if input.is_empty() {
            return;
        }

        if self.discard_bom {
            match input.peek() {
                Some('\u{feff}') => {
                    input.next();
                    self.discard_bom = false;
                },
                Some(_) => self.discard_bom = false,
                None => return,
            }
        }

        self.run(input);
    }

    fn deliver(&mut self, token: Token) -> TokenSinkResult {
        if self.opts.profile {
            let line = self.current_line;
            let (ret, dt) = time!(self.sink.process_token(token, line));
            self.time_in_sink += dt;
            ret
        } else {
            self.sink.process_token(token, self.current_line)
        }
    }

    fn deliver_and_continue(&mut self, token: Token) {
        assert!(matches!(self.deliver(token), TokenSinkResult::Continue));
    }

    /// Flush the pending character run as one `Characters` token.
    fn flush_char_run(&mut self) {
        if self.char_run.is_empty() {
            return;
        }
        let mut run = mem::take(&mut self.char_run);
        if self.opts.xml_coercions
            && (run.contains('\u{c}') || run.contains('\u{ffff}'))
        {
            let coerced: String = run
                .chars()
                .map(|c| match c {
                    '\u{c}' => ' ',
                    '\u{ffff}' => '\u{fffd}',
                    c => c,
                })
                .collect();
            run = StrTendril::from_slice(&coerced);
        }
        self.deliver_and_continue(Token::Characters(run));
    }

    // Get the next input character, which might be the character 'c' that
    // we already consumed from the buffers.
    fn get_preprocessed_char(&mut self, c: char) -> Option<char> {
        if c == '\n' {
            self.current_line += 1;
        }

        if self.opts.exact_errors
            && match c as u32 {
                0x01..=0x08 | 0x0B | 0x0E..=0x1F | 0x7F..=0x9F | 0xFDD0..=0xFDEF => true,
                n if (n & 0xFFFE) == 0xFFFE => true,
                _ => false,
            }
        {
            let msg = format!("Bad character {c}");
            self.emit_error(Cow::Owned(msg));
        }

        trace!("got character {c}");
        self.current_char = c;
        Some(c)
    }

    // Get the next input character, if one is available.
    fn get_char(&mut self, input: &mut BufferQueue) -> Option<char> {
        if self.reconsume {
            self.reconsume = false;
            Some(self.current_char)
        } else {
            input.next().and_then(|c| self.get_preprocessed_char(c))
        }
    }

    fn pop_except_from(&mut self, input: &mut BufferQueue, set: crate::SmallCharSet) -> Option<SetResult> {
        // Bail to the slow path for various corner cases. This means that
        // `FromSet` can contain characters not in the set! It shouldn't
        // matter because the fallback `FromSet` case always does the same
        // thing as the `NotFromSet` case.
        if self.opts.exact_errors || self.reconsume {
            return self.get_char(input).map(FromSet);
        }

        let d = input.pop_except_from(set);
        trace!("got characters {d:?}");
        match d {
            Some(FromSet(c)) => self.get_preprocessed_char(c).map(FromSet),

            // NB: We don't set self.current_char for a run of characters
            // not in the set. It shouldn't matter for the codepaths that
            // use this. Every stop set contains '\n', so a run can't move
            // the line counter either.
            _ => d,
        }
    }

    // Check if the next characters are an ASCII case-insensitive match.
    // See `BufferQueue::eat`.
    //
    // NB: this doesn't set the current input character.
    fn eat(&mut self, input: &mut BufferQueue, pat: &str, eq: fn(&u8, &u8) -> bool) -> Option<bool> {
        input.push_front(mem::take(&mut self.temp_buf));
        match input.eat(pat, eq) {
            None if self.at_eof => Some(false),
            None => {
                while let Some(data) = input.next() {
                    self.temp_buf.push_char(data);
                }
                None
            },
            Some(matched) => Some(matched),
        }
    }

    /// Run the state machine for as long as we can.
    fn run(&mut self, input: &mut BufferQueue) {
        if self.opts.profile {
            loop {
                let state = self.state;
                let old_sink = self.time_in_sink;
                let (run, mut dt) = time!(self.step(input));
                dt -= self.time_in_sink - old_sink;
                *self.state_profile.entry(state).or_insert(0) += dt;
                match run {
                    StepResult::Continue => (),
                    StepResult::Suspend => break,
                }
            }
        } else {
            loop {
                match self.step(input) {
                    StepResult::Continue => (),
                    StepResult::Suspend => break,
                }
            }
        }
    }

    fn bad_char_error(&mut self) {
        let msg = format_if!(
            self.opts.exact_errors,
            "Bad character",
            "Saw {} in state {:?}",
            self.current_char,
            self.state
        );
        self.emit_error(msg);
    }

    fn bad_eof_error(&mut self) {
        let msg = format_if!(
            self.opts.exact_errors,
            "Unexpected EOF",
            "Saw EOF in state {:?}",
            self.state
        );
        self.emit_error(msg);
    }

    fn emit_char(&mut self, c: char) {
        if c == '\0' {
            // NUL is reported out of band so the tree builder can apply its
            // per-mode replacement rules; it ends the current run like any
            // other non-character token.
            self.flush_char_run();
            self.deliver_and_continue(Token::NullCharacter);
        } else {
            self.char_run.push_char(c);
        }
    }

    // The string must not contain '\0'!
    fn emit_chars(&mut self, b: StrTendril) {
        self.char_run.push_tendril(&b);
    }

    fn emit_current_tag(&mut self, default_next: states::State) -> StepResult {
        self.finish_attribute();

        let name = LocalName::from(&*self.current_tag_name);
        self.current_tag_name.clear();

        match self.current_tag_kind {
            StartTag => {
                self.last_start_tag_name = Some(name.clone());
            },
            EndTag => {
                if !self.current_tag_attrs.is_empty() {
                    self.emit_error(Borrowed("Attributes on an end tag"));
                }
                if self.current_tag_self_closing {
                    self.emit_error(Borrowed("Self-closing end tag"));
                }
            },
        }

        let token = Token::Tag(Tag {
            kind: self.current_tag_kind,
            name,
            self_closing: self.current_tag_self_closing,
            attrs: mem::take(&mut self.current_tag_attrs),
        });

        self.state = default_next;
        self.flush_char_run();
        match self.deliver(token) {
            TokenSinkResult::Continue => (),
            TokenSinkResult::Plaintext => self.state = states::Plaintext,
            TokenSinkResult::RawData(kind) => self.state = states::RawData(kind),
        }
        StepResult::Continue
    }

    fn emit_temp_buf(&mut self) {
        // FIXME: Make sure that clearing on emit is spec-compatible.
        let buf = mem::take(&mut self.temp_buf);
        self.emit_chars(buf);
    }

    fn clear_temp_buf(&mut self) {
        // Do this without a new allocation.
        self.temp_buf.clear();
    }

    fn emit_current_comment(&mut self) {
        let mut comment = mem::take(&mut self.current_comment);
        if self.opts.xml_coercions && comment.contains("--") {
            let mut data = comment.to_string();
            while data.contains("--") {
                data = data.replace("--", "- -");
            }
            comment = StrTendril::from_slice(&data);
        }
        self.flush_char_run();
        self.deliver_and_continue(Token::Comment(comment));
    }

    fn discard_tag(&mut self) {
        self.current_tag_name.clear();
        self.current_tag_self_closing = false;
        self.current_tag_attrs = vec![];
    }

    fn create_tag(&mut self, kind: TagKind, c: char) {
        self.discard_tag();
        self.current_tag_name.push_char(c);
        self.current_tag_kind = kind;
    }

    fn have_appropriate_end_tag(&self) -> bool {
        match self.last_start_tag_name {
            Some(ref last) => {
                (self.current_tag_kind == EndTag) && (*self.current_tag_name == **last)
            },
            None => false,
        }
    }

    fn create_attribute(&mut self, c: char) {
        self.finish_attribute();
        self.current_attr_name.push_char(c);
    }

    fn finish_attribute(&mut self) {
        if self.current_attr_name.is_empty() {
            return;
        }

        // Check for a duplicate attribute.
        // FIXME: the spec says we should error as soon as the name is finished.
        let dup = {
            let name = &*self.current_attr_name;
            self.current_tag_attrs.iter().any(|a| &*a.name.local == name)
        };

        if dup {
            self.emit_error(Borrowed("Duplicate attribute"));
            self.current_attr_name.clear();
            self.current_attr_value.clear();
        } else {
            let name = LocalName::from(&*self.current_attr_name);
            self.current_attr_name.clear();
            self.current_tag_attrs.push(Attribute {
                // The tree builder will adjust the namespace if necessary.
                // This only happens in foreign elements.
                name: QualName::attr(name),
                value: mem::take(&mut self.current_attr_value),
            });
        }
    }

    fn emit_current_doctype(&mut self) {
        let doctype = mem::take(&mut self.current_doctype);
        self.flush_char_run();
        self.deliver_and_continue(Token::Doctype(doctype));
    }

    fn doctype_id_mut(&mut self, kind: DoctypeIdKind) -> &mut Option<StrTendril> {
        match kind {
            Public => &mut self.current_doctype.public_id,
            System => &mut self.current_doctype.system_id,
        }
    }

    fn push_doctype_id(&mut self, kind: DoctypeIdKind, c: char) {
        option_push(self.doctype_id_mut(kind), c)
    }

    fn clear_doctype_id(&mut self, kind: DoctypeIdKind) {
        let id = self.doctype_id_mut(kind);
        match *id {
            Some(ref mut s) => s.clear(),
            None => *id = Some(StrTendril::new()),
        }
    }

    fn consume_char_ref(&mut self) -> StepResult {
        self.char_ref_tokenizer = Some(Box::new(CharRefTokenizer::new(matches!(
            self.state,
            states::AttributeValue(_)
        ))));
        StepResult::Continue
    }

    fn emit_eof(&mut self) -> StepResult {
        self.flush_char_run();
        self.deliver_and_continue(Token::Eof);
        StepResult::Suspend
    }

    pub(crate) fn peek(&self, input: &BufferQueue) -> Option<char> {
        if self.reconsume {
            Some(self.current_char)
        } else {
            input.peek()
        }
    }

    pub(crate) fn discard_char(&mut self, input: &mut BufferQueue) {
        if self.reconsume {
            self.reconsume = false;
        } else {
            input.next();
        }
    }

    pub(crate) fn emit_error(&mut self, error: Cow<'static, str>) {
        // Errors don't interrupt a character run; their ordering relative
        // to text is not part of the sink contract.
        self.deliver_and_continue(Token::ParseError(error));
    }

    fn to_state(&mut self, s: states::State) -> StepResult {
        self.state = s;
        StepResult::Continue
    }

    fn reconsume_in(&mut self, s: states::State) -> StepResult {
        self.reconsume = true;
        self.to_state(s)
    }
}

// These can cause early return from the function where they are used.
macro_rules! get_char ( ($me:expr, $input:expr) => (
    unwrap_or_return!($me.get_char($input), StepResult::Suspend)
));

macro_rules! peek ( ($me:expr, $input:expr) => (
    unwrap_or_return!($me.peek($input), StepResult::Suspend)
));

macro_rules! pop_except_from ( ($me:expr, $input:expr, $set:expr) => (
    unwrap_or_return!($me.pop_except_from($input, $set), StepResult::Suspend)
));

macro_rules! eat ( ($me:expr, $input:expr, $pat:expr) => (
    unwrap_or_return!($me.eat($input, $pat, u8::eq_ignore_ascii_case), StepResult::Suspend)
));

macro_rules! eat_exact ( ($me:expr, $input:expr, $pat:expr) => (
    unwrap_or_return!($me.eat($input, $pat, u8::eq), StepResult::Suspend)
));

impl<Sink: TokenSink> Tokenizer<Sink> {
    // Run the state machine for a while. Each arm loops as long as the
    // machine stays in that state; transitions return.
    fn step(&mut self, input: &mut BufferQueue) -> StepResult {
        if self.char_ref_tokenizer.is_some() {
            return self.step_char_ref_tokenizer(input);
        }

        trace!("processing in state {:?}", self.state);
        match self.state {
            states::Data => loop {
                match pop_except_from!(self, input, small_char_set!('\n' '\0' '&' '<')) {
                    FromSet('\0') => {
                        self.bad_char_error();
                        self.emit_char('\0');
                    },
                    FromSet('&') => return self.consume_char_ref(),
                    FromSet('<') => return self.to_state(states::TagOpen),
                    FromSet(c) => self.emit_char(c),
                    NotFromSet(b) => self.emit_chars(b),
                }
            },

            states::RawData(Rcdata) => loop {
                match pop_except_from!(self, input, small_char_set!('\n' '\0' '&' '<')) {
                    FromSet('\0') => {
                        self.bad_char_error();
                        self.emit_char('\u{fffd}');
                    },
                    FromSet('&') => return self.consume_char_ref(),
                    FromSet('<') => return self.to_state(states::RawLessThanSign(Rcdata)),
                    FromSet(c) => self.emit_char(c),
                    NotFromSet(b) => self.emit_chars(b),
                }
            },

            states::RawData(Rawtext) => loop {
                match pop_except_from!(self, input, small_char_set!('\n' '\0' '<')) {
                    FromSet('\0') => {
                        self.bad_char_error();
                        self.emit_char('\u{fffd}');
                    },
                    FromSet('<') => return self.to_state(states::RawLessThanSign(Rawtext)),
                    FromSet(c) => self.emit_char(c),
                    NotFromSet(b) => self.emit_chars(b),
                }
            },

            states::RawData(ScriptData) => loop {
                match pop_except_from!(self, input, small_char_set!('\n' '\0' '<')) {
                    FromSet('\0') => {
                        self.bad_char_error();
                        self.emit_char('\u{fffd}');
                    },
                    FromSet('<') => return self.to_state(states::RawLessThanSign(ScriptData)),
                    FromSet(c) => self.emit_char(c),
                    NotFromSet(b) => self.emit_chars(b),
                }
            },

            states::RawData(ScriptDataEscaped(Escaped)) => loop {
                match pop_except_from!(self, input, small_char_set!('\n' '\0' '-' '<')) {
                    FromSet('\0') => {
                        self.bad_char_error();
                        self.emit_char('\u{fffd}');
                    },
                    FromSet('-') => {
                        self.emit_char('-');
                        return self.to_state(states::ScriptDataEscapedDash(Escaped));
                    },
                    FromSet('<') => {
                        return self.to_state(states::RawLessThanSign(ScriptDataEscaped(Escaped)))
                    },
                    FromSet(c) => self.emit_char(c),
                    NotFromSet(b) => self.emit_chars(b),
                }
            },

            states::RawData(ScriptDataEscaped(DoubleEscaped)) => loop {
                match pop_except_from!(self, input, small_char_set!('\n' '\0' '-' '<')) {
                    FromSet('\0') => {
                        self.bad_char_error();
                        self.emit_char('\u{fffd}');
                    },
                    FromSet('-') => {
                        self.emit_char('-');
                        return self.to_state(states::ScriptDataEscapedDash(DoubleEscaped));
                    },
                    FromSet('<') => {
                        self.emit_char('<');
                        return self
                            .to_state(states::RawLessThanSign(ScriptDataEscaped(DoubleEscaped)));
                    },
                    FromSet(c) => self.emit_char(c),
                    NotFromSet(b) => self.emit_chars(b),
                }
            },

            states::Plaintext => loop {
                match pop_except_from!(self, input, small_char_set!('\n' '\0')) {
                    FromSet('\0') => {
                        self.bad_char_error();
                        self.emit_char('\u{fffd}');
                    },
                    FromSet(c) => self.emit_char(c),
                    NotFromSet(b) => self.emit_chars(b),
                }
            },

            states::TagOpen => loop {
                match get_char!(self, input) {
                    '!' => return self.to_state(states::MarkupDeclarationOpen),
                    '/' => return self.to_state(states::EndTagOpen),
                    '?' => {
                        self.bad_char_error();
                        self.current_comment.clear();
                        return self.reconsume_in(states::BogusComment);
                    },
                    c => match lower_ascii_letter(c) {
                        Some(cl) => {
                            self.create_tag(StartTag, cl);
                            return self.to_state(states::TagName);
                        },
                        None => {
                            self.bad_char_error();
                            self.emit_char('<');
                            return self.reconsume_in(states::Data);
                        },
                    },
                }
            },

            states::EndTagOpen => loop {
                match get_char!(self, input) {
                    '>' => {
                        self.bad_char_error();
                        return self.to_state(states::Data);
                    },
                    c => match lower_ascii_letter(c) {
                        Some(cl) => {
                            self.create_tag(EndTag, cl);
                            return self.to_state(states::TagName);
                        },
                        None => {
                            self.bad_char_error();
                            self.current_comment.clear();
                            return self.reconsume_in(states::BogusComment);
                        },
                    },
                }
            },

            states::TagName => loop {
                match get_char!(self, input) {
                    '\t' | '\n' | '\x0C' | ' ' => {
                        return self.to_state(states::BeforeAttributeName)
                    },
                    '/' => return self.to_state(states::SelfClosingStartTag),
                    '>' => return self.emit_current_tag(states::Data),
                    '\0' => {
                        self.bad_char_error();
                        self.current_tag_name.push_char('\u{fffd}');
                    },
                    c => self.current_tag_name.push_char(c.to_ascii_lowercase()),
                }
            },

            states::RawLessThanSign(ScriptDataEscaped(Escaped)) => loop {
                match get_char!(self, input) {
                    '/' => {
                        self.clear_temp_buf();
                        return self.to_state(states::RawEndTagOpen(ScriptDataEscaped(Escaped)));
                    },
                    c => match lower_ascii_letter(c) {
                        Some(cl) => {
                            self.clear_temp_buf();
                            self.temp_buf.push_char(cl);
                            self.emit_char('<');
                            self.emit_char(c);
                            return self.to_state(states::ScriptDataEscapeStart(DoubleEscaped));
                        },
                        None => {
                            self.emit_char('<');
                            return self.reconsume_in(states::RawData(ScriptDataEscaped(Escaped)));
                        },
                    },
                }
            },

            states::RawLessThanSign(ScriptDataEscaped(DoubleEscaped)) => loop {
                match get_char!(self, input) {
                    '/' => {
                        self.clear_temp_buf();
                        self.emit_char('/');
                        return self.to_state(states::ScriptDataDoubleEscapeEnd);
                    },
                    _ => {
                        return self.reconsume_in(states::RawData(ScriptDataEscaped(DoubleEscaped)))
                    },
                }
            },

            // otherwise
            states::RawLessThanSign(kind) => loop {
                match get_char!(self, input) {
                    '/' => {
                        self.clear_temp_buf();
                        return self.to_state(states::RawEndTagOpen(kind));
                    },
                    '!' if kind == ScriptData => {
                        self.emit_char('<');
                        self.emit_char('!');
                        return self.to_state(states::ScriptDataEscapeStart(Escaped));
                    },
                    _ => {
                        self.emit_char('<');
                        return self.reconsume_in(states::RawData(kind));
                    },
                }
            },

            states::RawEndTagOpen(kind) => loop {
                let c = get_char!(self, input);
                match lower_ascii_letter(c) {
                    Some(cl) => {
                        self.create_tag(EndTag, cl);
                        self.temp_buf.push_char(c);
                        return self.to_state(states::RawEndTagName(kind));
                    },
                    None => {
                        self.emit_char('<');
                        self.emit_char('/');
                        return self.reconsume_in(states::RawData(kind));
                    },
                }
            },

            states::RawEndTagName(kind) => loop {
                let c = get_char!(self, input);
                if self.have_appropriate_end_tag() {
                    match c {
                        '\t' | '\n' | '\x0C' | ' ' => {
                            self.clear_temp_buf();
                            return self.to_state(states::BeforeAttributeName);
                        },
                        '/' => {
                            self.clear_temp_buf();
                            return self.to_state(states::SelfClosingStartTag);
                        },
                        '>' => {
                            self.clear_temp_buf();
                            return self.emit_current_tag(states::Data);
                        },
                        _ => (),
                    }
                }

                match lower_ascii_letter(c) {
                    Some(cl) => {
                        self.current_tag_name.push_char(cl);
                        self.temp_buf.push_char(c);
                    },
                    None => {
                        self.discard_tag();
                        self.emit_char('<');
                        self.emit_char('/');
                        self.emit_temp_buf();
                        return self.reconsume_in(states::RawData(kind));
                    },
                }
            },

            states::ScriptDataEscapeStart(DoubleEscaped) => loop {
                let c = get_char!(self, input);
                match c {
                    '\t' | '\n' | '\x0C' | ' ' | '/' | '>' => {
                        let esc = if &*self.temp_buf == "script" {
                            DoubleEscaped
                        } else {
                            Escaped
                        };
                        self.emit_char(c);
                        return self.to_state(states::RawData(ScriptDataEscaped(esc)));
                    },
                    _ => match lower_ascii_letter(c) {
                        Some(cl) => {
                            self.temp_buf.push_char(cl);
                            self.emit_char(c);
                        },
                        None => {
                            return self.reconsume_in(states::RawData(ScriptDataEscaped(Escaped)))
                        },
                    },
                }
            },

            states::ScriptDataEscapeStart(Escaped) => loop {
                match get_char!(self, input) {
                    '-' => {
                        self.emit_char('-');
                        return self.to_state(states::ScriptDataEscapeStartDash);
                    },
                    _ => return self.reconsume_in(states::RawData(ScriptData)),
                }
            },

            states::ScriptDataEscapeStartDash => loop {
                match get_char!(self, input) {
                    '-' => {
                        self.emit_char('-');
                        return self.to_state(states::ScriptDataEscapedDashDash(Escaped));
                    },
                    _ => return self.reconsume_in(states::RawData(ScriptData)),
                }
            },

            states::ScriptDataEscapedDash(kind) => loop {
                match get_char!(self, input) {
                    '-' => {
                        self.emit_char('-');
                        return self.to_state(states::ScriptDataEscapedDashDash(kind));
                    },
                    '<' => {
                        if kind == DoubleEscaped {
                            self.emit_char('<');
                        }
                        return self.to_state(states::RawLessThanSign(ScriptDataEscaped(kind)));
                    },
                    '\0' => {
                        self.bad_char_error();
                        self.emit_char('\u{fffd}');
                        return self.to_state(states::RawData(ScriptDataEscaped(kind)));
                    },
                    c => {
                        self.emit_char(c);
                        return self.to_state(states::RawData(ScriptDataEscaped(kind)));
                    },
                }
            },

            states::ScriptDataEscapedDashDash(kind) => loop {
                match get_char!(self, input) {
                    '-' => self.emit_char('-'),
                    '<' => {
                        if kind == DoubleEscaped {
                            self.emit_char('<');
                        }
                        return self.to_state(states::RawLessThanSign(ScriptDataEscaped(kind)));
                    },
                    '>' => {
                        self.emit_char('>');
                        return self.to_state(states::RawData(ScriptData));
                    },
                    '\0' => {
                        self.bad_char_error();
                        self.emit_char('\u{fffd}');
                        return self.to_state(states::RawData(ScriptDataEscaped(kind)));
                    },
                    c => {
                        self.emit_char(c);
                        return self.to_state(states::RawData(ScriptDataEscaped(kind)));
                    },
                }
            },

            states::ScriptDataDoubleEscapeEnd => loop {
                let c = get_char!(self, input);
                match c {
                    '\t' | '\n' | '\x0C' | ' ' | '/' | '>' => {
                        let esc = if &*self.temp_buf == "script" {
                            Escaped
                        } else {
                            DoubleEscaped
                        };
                        self.emit_char(c);
                        return self.to_state(states::RawData(ScriptDataEscaped(esc)));
                    },
                    _ => match lower_ascii_letter(c) {
                        Some(cl) => {
                            self.temp_buf.push_char(cl);
                            self.emit_char(c);
                        },
                        None => {
                            return self
                                .reconsume_in(states::RawData(ScriptDataEscaped(DoubleEscaped)))
                        },
                    },
                }
            },

            states::BeforeAttributeName => loop {
                match get_char!(self, input) {
                    '\t' | '\n' | '\x0C' | ' ' => (),
                    '/' => return self.to_state(states::SelfClosingStartTag),
                    '>' => return self.emit_current_tag(states::Data),
                    '\0' => {
                        self.bad_char_error();
                        self.create_attribute('\u{fffd}');
                        return self.to_state(states::AttributeName);
                    },
                    c => match lower_ascii_letter(c) {
                        Some(cl) => {
                            self.create_attribute(cl);
                            return self.to_state(states::AttributeName);
                        },
                        None => {
                            if matches!(c, '"' | '\'' | '<' | '=') {
                                self.bad_char_error();
                            }
                            self.create_attribute(c);
                            return self.to_state(states::AttributeName);
                        },
                    },
                }
            },

            states::AttributeName => loop {
                match get_char!(self, input) {
                    '\t' | '\n' | '\x0C' | ' ' => return self.to_state(states::AfterAttributeName),
                    '/' => return self.to_state(states::SelfClosingStartTag),
                    '=' => return self.to_state(states::BeforeAttributeValue),
                    '>' => return self.emit_current_tag(states::Data),
                    '\0' => {
                        self.bad_char_error();
                        self.current_attr_name.push_char('\u{fffd}');
                    },
                    c => match lower_ascii_letter(c) {
                        Some(cl) => self.current_attr_name.push_char(cl),
                        None => {
                            if matches!(c, '"' | '\'' | '<') {
                                self.bad_char_error();
                            }
                            self.current_attr_name.push_char(c);
                        },
                    },
                }
            },

            states::AfterAttributeName => loop {
                match get_char!(self, input) {
                    '\t' | '\n' | '\x0C' | ' ' => (),
                    '/' => return self.to_state(states::SelfClosingStartTag),
                    '=' => return self.to_state(states::BeforeAttributeValue),
                    '>' => return self.emit_current_tag(states::Data),
                    '\0' => {
                        self.bad_char_error();
                        self.create_attribute('\u{fffd}');
                        return self.to_state(states::AttributeName);
                    },
                    c => match lower_ascii_letter(c) {
                        Some(cl) => {
                            self.create_attribute(cl);
                            return self.to_state(states::AttributeName);
                        },
                        None => {
                            if matches!(c, '"' | '\'' | '<') {
                                self.bad_char_error();
                            }
                            self.create_attribute(c);
                            return self.to_state(states::AttributeName);
                        },
                    },
                }
            },

            // Use peek so we can handle the first attr character along with
            // the rest, hopefully in the same zero-copy buffer.
            states::BeforeAttributeValue => loop {
                match peek!(self, input) {
                    '\t' | '\n' | '\x0C' | ' ' => self.discard_char(input),
                    '"' => {
                        self.discard_char(input);
                        return self.to_state(states::AttributeValue(DoubleQuoted));
                    },
                    '\'' => {
                        self.discard_char(input);
                        return self.to_state(states::AttributeValue(SingleQuoted));
                    },
                    '>' => {
                        self.discard_char(input);
                        self.bad_char_error();
                        return self.emit_current_tag(states::Data);
                    },
                    _ => return self.to_state(states::AttributeValue(Unquoted)),
                }
            },

            states::AttributeValue(DoubleQuoted) => loop {
                match pop_except_from!(self, input, small_char_set!('\n' '"' '&' '\0')) {
                    FromSet('"') => return self.to_state(states::AfterAttributeValueQuoted),
                    FromSet('&') => return self.consume_char_ref(),
                    FromSet('\0') => {
                        self.bad_char_error();
                        self.current_attr_value.push_char('\u{fffd}');
                    },
                    FromSet(c) => self.current_attr_value.push_char(c),
                    NotFromSet(ref b) => self.current_attr_value.push_tendril(b),
                }
            },

            states::AttributeValue(SingleQuoted) => loop {
                match pop_except_from!(self, input, small_char_set!('\n' '\'' '&' '\0')) {
                    FromSet('\'') => return self.to_state(states::AfterAttributeValueQuoted),
                    FromSet('&') => return self.consume_char_ref(),
                    FromSet('\0') => {
                        self.bad_char_error();
                        self.current_attr_value.push_char('\u{fffd}');
                    },
                    FromSet(c) => self.current_attr_value.push_char(c),
                    NotFromSet(ref b) => self.current_attr_value.push_tendril(b),
                }
            },

            states::AttributeValue(Unquoted) => loop {
                match pop_except_from!(
                    self,
                    input,
                    small_char_set!('\t' '\n' '\x0C' ' ' '&' '>' '\0')
                ) {
                    FromSet('\t') | FromSet('\n') | FromSet('\x0C') | FromSet(' ') => {
                        return self.to_state(states::BeforeAttributeName)
                    },
                    FromSet('&') => return self.consume_char_ref(),
                    FromSet('>') => return self.emit_current_tag(states::Data),
                    FromSet('\0') => {
                        self.bad_char_error();
                        self.current_attr_value.push_char('\u{fffd}');
                    },
                    FromSet(c) => {
                        if matches!(c, '"' | '\'' | '<' | '=' | '`') {
                            self.bad_char_error();
                        }
                        self.current_attr_value.push_char(c);
                    },
                    NotFromSet(ref b) => self.current_attr_value.push_tendril(b),
                }
            },

            states::AfterAttributeValueQuoted => loop {
                match get_char!(self, input) {
                    '\t' | '\n' | '\x0C' | ' ' => {
                        return self.to_state(states::BeforeAttributeName)
                    },
                    '/' => return self.to_state(states::SelfClosingStartTag),
                    '>' => return self.emit_current_tag(states::Data),
                    _ => {
                        self.bad_char_error();
                        return self.reconsume_in(states::BeforeAttributeName);
                    },
                }
            },

            states::SelfClosingStartTag => loop {
                match get_char!(self, input) {
                    '>' => {
                        self.current_tag_self_closing = true;
                        return self.emit_current_tag(states::Data);
                    },
                    _ => {
                        self.bad_char_error();
                        return self.reconsume_in(states::BeforeAttributeName);
                    },
                }
            },

            states::CommentStart => loop {
                match get_char!(self, input) {
                    '-' => return self.to_state(states::CommentStartDash),
                    '\0' => {
                        self.bad_char_error();
                        self.current_comment.push_char('\u{fffd}');
                        return self.to_state(states::Comment);
                    },
                    '>' => {
                        self.bad_char_error();
                        self.emit_current_comment();
                        return self.to_state(states::Data);
                    },
                    c => {
                        self.current_comment.push_char(c);
                        return self.to_state(states::Comment);
                    },
                }
            },

            states::CommentStartDash => loop {
                match get_char!(self, input) {
                    '-' => return self.to_state(states::CommentEnd),
                    '\0' => {
                        self.bad_char_error();
                        self.current_comment.push_slice("-\u{fffd}");
                        return self.to_state(states::Comment);
                    },
                    '>' => {
                        self.bad_char_error();
                        self.emit_current_comment();
                        return self.to_state(states::Data);
                    },
                    c => {
                        self.current_comment.push_char('-');
                        self.current_comment.push_char(c);
                        return self.to_state(states::Comment);
                    },
                }
            },

            states::Comment => loop {
                match get_char!(self, input) {
                    c @ '<' => {
                        self.current_comment.push_char(c);
                        return self.to_state(states::CommentLessThanSign);
                    },
                    '-' => return self.to_state(states::CommentEndDash),
                    '\0' => {
                        self.bad_char_error();
                        self.current_comment.push_char('\u{fffd}');
                    },
                    c => self.current_comment.push_char(c),
                }
            },

            states::CommentLessThanSign => loop {
                match get_char!(self, input) {
                    c @ '!' => {
                        self.current_comment.push_char(c);
                        return self.to_state(states::CommentLessThanSignBang);
                    },
                    c @ '<' => self.current_comment.push_char(c),
                    _ => return self.reconsume_in(states::Comment),
                }
            },

            states::CommentLessThanSignBang => loop {
                match get_char!(self, input) {
                    '-' => return self.to_state(states::CommentLessThanSignBangDash),
                    _ => return self.reconsume_in(states::Comment),
                }
            },

            states::CommentLessThanSignBangDash => loop {
                match get_char!(self, input) {
                    '-' => return self.to_state(states::CommentLessThanSignBangDashDash),
                    _ => return self.reconsume_in(states::CommentEndDash),
                }
            },

            states::CommentLessThanSignBangDashDash => loop {
                match get_char!(self, input) {
                    '>' => return self.reconsume_in(states::CommentEnd),
                    _ => {
                        self.bad_char_error();
                        return self.reconsume_in(states::CommentEnd);
                    },
                }
            },

            states::CommentEndDash => loop {
                match get_char!(self, input) {
                    '-' => return self.to_state(states::CommentEnd),
                    '\0' => {
                        self.bad_char_error();
                        self.current_comment.push_slice("-\u{fffd}");
                        return self.to_state(states::Comment);
                    },
                    c => {
                        self.current_comment.push_char('-');
                        self.current_comment.push_char(c);
                        return self.to_state(states::Comment);
                    },
                }
            },

            states::CommentEnd => loop {
                match get_char!(self, input) {
                    '>' => {
                        self.emit_current_comment();
                        return self.to_state(states::Data);
                    },
                    '!' => return self.to_state(states::CommentEndBang),
                    '-' => self.current_comment.push_char('-'),
                    _ => {
                        self.current_comment.push_slice("--");
                        return self.reconsume_in(states::Comment);
                    },
                }
            },

            states::CommentEndBang => loop {
                match get_char!(self, input) {
                    '-' => {
                        self.current_comment.push_slice("--!");
                        return self.to_state(states::CommentEndDash);
                    },
                    '>' => {
                        self.bad_char_error();
                        self.emit_current_comment();
                        return self.to_state(states::Data);
                    },
                    '\0' => {
                        self.bad_char_error();
                        self.current_comment.push_slice("--!\u{fffd}");
                        return self.to_state(states::Comment);
                    },
                    c => {
                        self.current_comment.push_slice("--!");
                        self.current_comment.push_char(c);
                        return self.to_state(states::Comment);
                    },
                }
            },

            states::Doctype => loop {
                match get_char!(self, input) {
                    '\t' | '\n' | '\x0C' | ' ' => return self.to_state(states::BeforeDoctypeName),
                    '>' => return self.reconsume_in(states::BeforeDoctypeName),
                    _ => {
                        self.bad_char_error();
                        return self.reconsume_in(states::BeforeDoctypeName);
                    },
                }
            },

            states::BeforeDoctypeName => loop {
                match get_char!(self, input) {
                    '\t' | '\n' | '\x0C' | ' ' => (),
                    '\0' => {
                        self.bad_char_error();
                        self.current_doctype = Doctype::default();
                        option_push(&mut self.current_doctype.name, '\u{fffd}');
                        return self.to_state(states::DoctypeName);
                    },
                    '>' => {
                        self.bad_char_error();
                        self.current_doctype = Doctype::default();
                        self.current_doctype.force_quirks = true;
                        self.emit_current_doctype();
                        return self.to_state(states::Data);
                    },
                    c => {
                        self.current_doctype = Doctype::default();
                        option_push(&mut self.current_doctype.name, c.to_ascii_lowercase());
                        return self.to_state(states::DoctypeName);
                    },
                }
            },

            states::DoctypeName => loop {
                match get_char!(self, input) {
                    '\t' | '\n' | '\x0C' | ' ' => {
                        self.clear_temp_buf();
                        return self.to_state(states::AfterDoctypeName);
                    },
                    '>' => {
                        self.emit_current_doctype();
                        return self.to_state(states::Data);
                    },
                    '\0' => {
                        self.bad_char_error();
                        option_push(&mut self.current_doctype.name, '\u{fffd}');
                    },
                    c => option_push(&mut self.current_doctype.name, c.to_ascii_lowercase()),
                }
            },

            states::AfterDoctypeName => loop {
                if eat!(self, input, "public") {
                    return self.to_state(states::AfterDoctypeKeyword(Public));
                } else if eat!(self, input, "system") {
                    return self.to_state(states::AfterDoctypeKeyword(System));
                } else {
                    match get_char!(self, input) {
                        '\t' | '\n' | '\x0C' | ' ' => (),
                        '>' => {
                            self.emit_current_doctype();
                            return self.to_state(states::Data);
                        },
                        _ => {
                            self.bad_char_error();
                            self.current_doctype.force_quirks = true;
                            return self.reconsume_in(states::BogusDoctype);
                        },
                    }
                }
            },

            states::AfterDoctypeKeyword(kind) => loop {
                match get_char!(self, input) {
                    '\t' | '\n' | '\x0C' | ' ' => {
                        return self.to_state(states::BeforeDoctypeIdentifier(kind))
                    },
                    '"' => {
                        self.bad_char_error();
                        self.clear_doctype_id(kind);
                        return self.to_state(states::DoctypeIdentifierDoubleQuoted(kind));
                    },
                    '\'' => {
                        self.bad_char_error();
                        self.clear_doctype_id(kind);
                        return self.to_state(states::DoctypeIdentifierSingleQuoted(kind));
                    },
                    '>' => {
                        self.bad_char_error();
                        self.current_doctype.force_quirks = true;
                        self.emit_current_doctype();
                        return self.to_state(states::Data);
                    },
                    _ => {
                        self.bad_char_error();
                        self.current_doctype.force_quirks = true;
                        return self.reconsume_in(states::BogusDoctype);
                    },
                }
            },

            states::BeforeDoctypeIdentifier(kind) => loop {
                match get_char!(self, input) {
                    '\t' | '\n' | '\x0C' | ' ' => (),
                    '"' => {
                        self.clear_doctype_id(kind);
                        return self.to_state(states::DoctypeIdentifierDoubleQuoted(kind));
                    },
                    '\'' => {
                        self.clear_doctype_id(kind);
                        return self.to_state(states::DoctypeIdentifierSingleQuoted(kind));
                    },
                    '>' => {
                        self.bad_char_error();
                        self.current_doctype.force_quirks = true;
                        self.emit_current_doctype();
                        return self.to_state(states::Data);
                    },
                    _ => {
                        self.bad_char_error();
                        self.current_doctype.force_quirks = true;
                        return self.reconsume_in(states::BogusDoctype);
                    },
                }
            },

            states::DoctypeIdentifierDoubleQuoted(kind) => loop {
                match get_char!(self, input) {
                    '"' => return self.to_state(states::AfterDoctypeIdentifier(kind)),
                    '\0' => {
                        self.bad_char_error();
                        self.push_doctype_id(kind, '\u{fffd}');
                    },
                    '>' => {
                        self.bad_char_error();
                        self.current_doctype.force_quirks = true;
                        self.emit_current_doctype();
                        return self.to_state(states::Data);
                    },
                    c => self.push_doctype_id(kind, c),
                }
            },

            states::DoctypeIdentifierSingleQuoted(kind) => loop {
                match get_char!(self, input) {
                    '\'' => return self.to_state(states::AfterDoctypeIdentifier(kind)),
                    '\0' => {
                        self.bad_char_error();
                        self.push_doctype_id(kind, '\u{fffd}');
                    },
                    '>' => {
                        self.bad_char_error();
                        self.current_doctype.force_quirks = true;
                        self.emit_current_doctype();
                        return self.to_state(states::Data);
                    },
                    c => self.push_doctype_id(kind, c),
                }
            },

            states::AfterDoctypeIdentifier(Public) => loop {
                match get_char!(self, input) {
                    '\t' | '\n' | '\x0C' | ' ' => {
                        return self.to_state(states::BetweenDoctypePublicAndSystemIdentifiers)
                    },
                    '>' => {
                        self.emit_current_doctype();
                        return self.to_state(states::Data);
                    },
                    '"' => {
                        self.bad_char_error();
                        self.clear_doctype_id(System);
                        return self.to_state(states::DoctypeIdentifierDoubleQuoted(System));
                    },
                    '\'' => {
                        self.bad_char_error();
                        self.clear_doctype_id(System);
                        return self.to_state(states::DoctypeIdentifierSingleQuoted(System));
                    },
                    _ => {
                        self.bad_char_error();
                        self.current_doctype.force_quirks = true;
                        return self.reconsume_in(states::BogusDoctype);
                    },
                }
            },

            states::AfterDoctypeIdentifier(System) => loop {
                match get_char!(self, input) {
                    '\t' | '\n' | '\x0C' | ' ' => (),
                    '>' => {
                        self.emit_current_doctype();
                        return self.to_state(states::Data);
                    },
                    _ => {
                        self.bad_char_error();
                        return self.reconsume_in(states::BogusDoctype);
                    },
                }
            },

            states::BetweenDoctypePublicAndSystemIdentifiers => loop {
                match get_char!(self, input) {
                    '\t' | '\n' | '\x0C' | ' ' => (),
                    '>' => {
                        self.emit_current_doctype();
                        return self.to_state(states::Data);
                    },
                    '"' => {
                        self.clear_doctype_id(System);
                        return self.to_state(states::DoctypeIdentifierDoubleQuoted(System));
                    },
                    '\'' => {
                        self.clear_doctype_id(System);
                        return self.to_state(states::DoctypeIdentifierSingleQuoted(System));
                    },
                    _ => {
                        self.bad_char_error();
                        self.current_doctype.force_quirks = true;
                        return self.reconsume_in(states::BogusDoctype);
                    },
                }
            },

            states::BogusDoctype => loop {
                match get_char!(self, input) {
                    '>' => {
                        self.emit_current_doctype();
                        return self.to_state(states::Data);
                    },
                    '\0' => self.bad_char_error(),
                    _ => (),
                }
            },

            states::BogusComment => loop {
                match get_char!(self, input) {
                    '>' => {
                        self.emit_current_comment();
                        return self.to_state(states::Data);
                    },
                    '\0' => {
                        self.bad_char_error();
                        self.current_comment.push_char('\u{fffd}');
                    },
                    c => self.current_comment.push_char(c),
                }
            },

            states::MarkupDeclarationOpen => loop {
                if eat_exact!(self, input, "--") {
                    self.current_comment.clear();
                    return self.to_state(states::CommentStart);
                } else if eat!(self, input, "doctype") {
                    return self.to_state(states::Doctype);
                } else {
                    if self
                        .sink
                        .adjusted_current_node_present_but_not_in_html_namespace()
                        && eat_exact!(self, input, "[CDATA[")
                    {
                        self.clear_temp_buf();
                        return self.to_state(states::CdataSection);
                    }
                    self.bad_char_error();
                    self.current_comment.clear();
                    return self.to_state(states::BogusComment);
                }
            },

            states::CdataSection => loop {
                match pop_except_from!(self, input, small_char_set!('\n' ']' '\0')) {
                    FromSet(']') => return self.to_state(states::CdataSectionBracket),
                    FromSet('\0') => {
                        self.emit_temp_buf();
                        self.emit_char('\0');
                    },
                    FromSet(c) => self.temp_buf.push_char(c),
                    NotFromSet(ref b) => self.temp_buf.push_tendril(b),
                }
            },

            states::CdataSectionBracket => match get_char!(self, input) {
                ']' => self.to_state(states::CdataSectionEnd),
                _ => {
                    self.temp_buf.push_char(']');
                    self.reconsume_in(states::CdataSection)
                },
            },

            states::CdataSectionEnd => loop {
                match get_char!(self, input) {
                    ']' => self.temp_buf.push_char(']'),
                    '>' => {
                        self.emit_temp_buf();
                        return self.to_state(states::Data);
                    },
                    _ => {
                        self.temp_buf.push_slice("]]");
                        return self.reconsume_in(states::CdataSection);
                    },
                }
            },
        }
    }

    fn step_char_ref_tokenizer(&mut self, input: &mut BufferQueue) -> StepResult {
        // Take the sub-tokenizer out so it can borrow us mutably.
        let mut tok = self.char_ref_tokenizer.take().unwrap();
        let outcome = tok.step(self, input);

        let progress = match outcome {
            char_ref::Status::Done(char_ref) => {
                self.process_char_ref(char_ref);
                return StepResult::Continue;
            },

            char_ref::Status::Stuck => StepResult::Suspend,
            char_ref::Status::Progress => StepResult::Continue,
        };

        self.char_ref_tokenizer = Some(tok);
        progress
    }

    fn process_char_ref(&mut self, char_ref: CharRef) {
        let CharRef {
            mut chars,
            mut num_chars,
        } = char_ref;

        if num_chars == 0 {
            chars[0] = '&';
            num_chars = 1;
        }

        for i in 0..num_chars {
            let c = chars[i as usize];
            match self.state {
                states::Data | states::RawData(states::Rcdata) => self.emit_char(c),

                states::AttributeValue(_) => self.current_attr_value.push_char(c),

                _ => panic!(
                    "state {:?} should not be reachable in process_char_ref",
                    self.state
                ),
            }
        }
    }

    /// Indicate that we have reached the end of the input.
    pub fn end(&mut self) {
        // Handle EOF in the char ref sub-tokenizer, if there is one. Do
        // this first because it might un-consume stuff.
        let mut input = BufferQueue::new();
        match self.char_ref_tokenizer.take() {
            None => (),
            Some(mut tok) => {
                let char_ref = tok.end_of_file(self, &mut input);
                self.process_char_ref(char_ref);
            },
        }

        // Process all remaining buffered input. If we're waiting for
        // lookahead, we're not gonna get it.
        self.at_eof = true;
        self.run(&mut input);
        assert!(input.is_empty());

        loop {
            match self.eof_step() {
                StepResult::Continue => (),
                StepResult::Suspend => break,
            }
        }

        self.sink.end();

        if self.opts.profile {
            self.dump_profile();
        }
    }

    fn dump_profile(&self) {
        let mut results: Vec<(states::State, u64)> =
            self.state_profile.iter().map(|(s, t)| (*s, *t)).collect();
        results.sort_by(|&(_, x), &(_, y)| y.cmp(&x));

        let total: u64 = results.iter().map(|&(_, t)| t).sum();
        println!("\nTokenizer profile, in nanoseconds");
        println!("\n{:12}         total in token sink", self.time_in_sink);
        println!("\n{total:12}         total in tokenizer");

        for (k, v) in results.into_iter() {
            let pct = 100.0 * (v as f64) / (total as f64);
            println!("{v:12}  {pct:4.1}%  {k:?}");
        }
    }

    fn eof_step(&mut self) -> StepResult {
        debug!("processing EOF in state {:?}", self.state);
        match self.state {
            states::Data
            | states::RawData(Rcdata)
            | states::RawData(Rawtext)
            | states::RawData(ScriptData)
            | states::Plaintext => self.emit_eof(),

            states::TagName
            | states::RawData(ScriptDataEscaped(_))
            | states::BeforeAttributeName
            | states::AttributeName
            | states::AfterAttributeName
            | states::AttributeValue(_)
            | states::AfterAttributeValueQuoted
            | states::SelfClosingStartTag
            | states::ScriptDataEscapedDash(_)
            | states::ScriptDataEscapedDashDash(_) => {
                // EOF in the middle of a tag: the tag is discarded.
                self.bad_eof_error();
                self.to_state(states::Data)
            },

            states::BeforeAttributeValue => self.reconsume_in(states::AttributeValue(Unquoted)),

            states::TagOpen => {
                self.bad_eof_error();
                self.emit_char('<');
                self.to_state(states::Data)
            },

            states::EndTagOpen => {
                self.bad_eof_error();
                self.emit_char('<');
                self.emit_char('/');
                self.to_state(states::Data)
            },

            states::RawLessThanSign(ScriptDataEscaped(DoubleEscaped)) => {
                self.to_state(states::RawData(ScriptDataEscaped(DoubleEscaped)))
            },

            states::RawLessThanSign(kind) => {
                self.emit_char('<');
                self.to_state(states::RawData(kind))
            },

            states::RawEndTagOpen(kind) => {
                self.emit_char('<');
                self.emit_char('/');
                self.to_state(states::RawData(kind))
            },

            states::RawEndTagName(kind) => {
                self.emit_char('<');
                self.emit_char('/');
                self.emit_temp_buf();
                self.to_state(states::RawData(kind))
            },

            states::ScriptDataEscapeStart(kind) => {
                self.to_state(states::RawData(ScriptDataEscaped(kind)))
            },

            states::ScriptDataEscapeStartDash => self.to_state(states::RawData(ScriptData)),

            states::ScriptDataDoubleEscapeEnd => {
                self.to_state(states::RawData(ScriptDataEscaped(DoubleEscaped)))
            },

            states::CommentStart
            | states::CommentStartDash
            | states::Comment
            | states::CommentEndDash
            | states::CommentEnd
            | states::CommentEndBang => {
                self.bad_eof_error();
                self.emit_current_comment();
                self.to_state(states::Data)
            },

            states::CommentLessThanSign | states::CommentLessThanSignBang => {
                self.reconsume_in(states::Comment)
            },

            states::CommentLessThanSignBangDash => self.reconsume_in(states::CommentEndDash),

            states::CommentLessThanSignBangDashDash => self.reconsume_in(states::CommentEnd),

            states::Doctype | states::BeforeDoctypeName => {
                self.bad_eof_error();
                self.current_doctype = Doctype::default();
                self.current_doctype.force_quirks = true;
                self.emit_current_doctype();
                self.to_state(states::Data)
            },

            states::DoctypeName
            | states::AfterDoctypeName
            | states::AfterDoctypeKeyword(_)
            | states::BeforeDoctypeIdentifier(_)
            | states::DoctypeIdentifierDoubleQuoted(_)
            | states::DoctypeIdentifierSingleQuoted(_)
            | states::AfterDoctypeIdentifier(_)
            | states::BetweenDoctypePublicAndSystemIdentifiers => {
                self.bad_eof_error();
                self.current_doctype.force_quirks = true;
                self.emit_current_doctype();
                self.to_state(states::Data)
            },

            states::BogusDoctype => {
                self.emit_current_doctype();
                self.to_state(states::Data)
            },

            states::BogusComment => {
                self.emit_current_comment();
                self.to_state(states::Data)
            },

            states::MarkupDeclarationOpen => {
                self.bad_char_error();
                self.to_state(states::BogusComment)
            },

            states::CdataSection => {
                self.emit_temp_buf();
                self.bad_eof_error();
                self.to_state(states::Data)
            },

            states::CdataSectionBracket => {
                self.temp_buf.push_char(']');
                self.to_state(states::CdataSection)
            },

            states::CdataSectionEnd => {
                self.temp_buf.push_slice("]]");
                self.to_state(states::CdataSection)
            },
        }
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod test {
    use super::option_push; // private items
    use tendril::{SliceExt, StrTendril};

    #[test]
    fn push_to_None_gives_singleton() {
        let mut s: Option<StrTendril> = None;
        option_push(&mut s, 'x');
        assert_eq!(s, Some("x".to_tendril()));
    }

    #[test]
    fn push_to_empty_appends() {
        let mut s: Option<StrTendril> = Some(StrTendril::new());
        option_push(&mut s, 'x');
        assert_eq!(s, Some("x".to_tendril()));
    }

    #[test]
    fn push_to_nonempty_appends() {
        let mut s: Option<StrTendril> = Some(StrTendril::from_slice("y"));
        option_push(&mut s, 'x');
        assert_eq!(s, Some("yx".to_tendril()));
    }
}
