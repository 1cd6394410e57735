//! The block-oriented streaming tokenizer (component 2).
//!
//! `parse_block` consumes as much of `buf` as it can determine completely
//! and returns either `resume_offset: None` (the buffer ended cleanly on a
//! construct boundary) or `Some(offset)` (the byte at `offset` begins a
//! construct - a tag, a comment, a run of text, anything - that was still
//! open when the buffer ran out). The scan never blocks and never
//! allocates beyond the returned `Vec<Event>` and `Vec<Attribute>` storage;
//! text/name values borrow from `buf` unless a construct was reassembled
//! by the chunk bridge from a synthetic buffer, in which case they are
//! copied into an owned `Cow::Owned` (see `Event::into_owned`).
//!
//! Mirrors the teacher's `SimpleXmlParser`: a mutable struct carrying
//! cursor and accumulator state, methods that mutate it and push events,
//! rather than the combinator-parser style used elsewhere in the
//! ecosystem. Unlike a hand-rolled resumable coroutine, each call restarts
//! the currently-open construct from its own start; the chunk bridge's
//! mini-block splice (see `bridge.rs`) is what makes that cheap.

use std::borrow::Cow;
use std::marker::PhantomData;

use xrs_chars::{is_xml_char, CharEdition, Edition5, XmlAsciiChar};

use crate::event::{Attribute, ErrorKind, Event};
use crate::loc::Loc;
use crate::options::{PositionMode, TokenizerOptions};

/// Result of parsing one block (one buffer) to completion or to its first
/// unresolved construct.
#[derive(Debug)]
pub struct BlockResult<'a> {
    pub events: Vec<Event<'a>>,
    /// Byte offset, within `buf`, of the first byte of a still-open
    /// construct. `None` means the buffer was fully consumed.
    pub resume_offset: Option<usize>,
    pub line: u32,
    pub line_start: usize,
    pub abs_pos: usize,
}

/// A configured tokenizer for one XML edition. Stateless between calls:
/// all per-stream state (line/column/leftover) lives in the chunk bridge.
pub struct Tokenizer<E: CharEdition = Edition5> {
    pub options: TokenizerOptions,
    _edition: PhantomData<E>,
}

impl<E: CharEdition> Tokenizer<E> {
    pub fn new(options: TokenizerOptions) -> Self {
        Self {
            options,
            _edition: PhantomData,
        }
    }

    pub fn parse_block<'a>(
        &self,
        buf: &'a [u8],
        line: u32,
        line_start: usize,
        abs_pos: usize,
    ) -> BlockResult<'a> {
        parse_block::<E>(buf, line, line_start, abs_pos, self.options)
    }
}

impl<E: CharEdition> Default for Tokenizer<E> {
    fn default() -> Self {
        Self::new(TokenizerOptions::default())
    }
}

/// Free-function form of `Tokenizer::parse_block`, matching the public
/// contract named in the specification.
pub fn parse_block<'a, E: CharEdition>(
    buf: &'a [u8],
    line: u32,
    line_start: usize,
    abs_pos: usize,
    options: TokenizerOptions,
) -> BlockResult<'a> {
    if abs_pos == 0
        && buf.len() >= 2
        && (buf[0..2] == [0xFF, 0xFE] || buf[0..2] == [0xFE, 0xFF])
    {
        let mut sc = Scanner::<E>::new(buf, line, line_start, abs_pos, options);
        sc.events.push(Event::error(ErrorKind::Utf16, Loc::START));
        return sc.finish(None);
    }

    let mut sc = Scanner::<E>::new(buf, line, line_start, abs_pos, options);
    loop {
        if sc.pos >= sc.buf.len() {
            return sc.finish(None);
        }
        let step = if sc.buf[sc.pos] == b'<' {
            sc.dispatch_lt()
        } else {
            sc.scan_ws_or_text()
        };
        match step {
            Step::Continue => continue,
            Step::NeedMore => return sc.finish(Some(sc.pos)),
            Step::Fatal => return sc.finish(None),
        }
    }
}

enum Step {
    Continue,
    NeedMore,
    Fatal,
}

#[derive(PartialEq, Eq, Debug)]
enum LitMatch {
    Full,
    Partial,
    No,
}

enum CharDecode {
    Ok(char, usize),
    Incomplete,
    Invalid,
}

fn decode_char(buf: &[u8], pos: usize) -> CharDecode {
    let b0 = buf[pos];
    if b0 < 0x80 {
        return CharDecode::Ok(b0 as char, 1);
    }
    let len = if b0 & 0xE0 == 0xC0 {
        2
    } else if b0 & 0xF0 == 0xE0 {
        3
    } else if b0 & 0xF8 == 0xF0 {
        4
    } else {
        return CharDecode::Invalid;
    };
    if pos + len > buf.len() {
        return CharDecode::Incomplete;
    }
    match std::str::from_utf8(&buf[pos..pos + len]) {
        Ok(s) => match s.chars().next() {
            Some(c) => CharDecode::Ok(c, len),
            None => CharDecode::Invalid,
        },
        Err(_) => CharDecode::Invalid,
    }
}

enum NameOutcome {
    Ok(usize),
    NeedMore,
    Invalid,
}

fn find_byte(hay: &[u8], needle: u8) -> Option<usize> {
    hay.iter().position(|&b| b == needle)
}

fn find_subslice(hay: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || hay.len() < needle.len() {
        return None;
    }
    hay.windows(needle.len()).position(|w| w == needle)
}

struct Scanner<'a, E> {
    buf: &'a [u8],
    pos: usize,
    line: u32,
    line_start: usize,
    base_abs: usize,
    options: TokenizerOptions,
    events: Vec<Event<'a>>,
    _edition: PhantomData<E>,
}

impl<'a, E: CharEdition> Scanner<'a, E> {
    fn new(buf: &'a [u8], line: u32, line_start: usize, base_abs: usize, options: TokenizerOptions) -> Self {
        Self {
            buf,
            pos: 0,
            line,
            line_start,
            base_abs,
            options,
            events: Vec::new(),
            _edition: PhantomData,
        }
    }

    fn finish(self, resume_offset: Option<usize>) -> BlockResult<'a> {
        let abs_pos = self.base_abs + self.pos;
        BlockResult {
            events: self.events,
            resume_offset,
            line: self.line,
            line_start: self.line_start,
            abs_pos,
        }
    }

    fn loc(&self) -> Loc {
        self.loc_for(self.pos)
    }

    /// Location as if the cursor were at `pos`, without committing any
    /// state. Used to report an error at a position ahead of `self.pos`
    /// (e.g. inside an attribute value) while the enclosing construct is
    /// still being parsed and might yet turn out to need more input.
    fn loc_for(&self, pos: usize) -> Loc {
        if self.options.position_mode == PositionMode::None {
            return Loc::default();
        }
        let mut line = self.line;
        let mut line_start = self.line_start;
        let end = pos.min(self.buf.len());
        for i in self.pos..end {
            if self.buf[i] == b'\n' {
                line += 1;
                line_start = self.base_abs + i + 1;
            }
        }
        if self.options.position_mode == PositionMode::LineOnly {
            line_start = 0;
        }
        Loc {
            line,
            line_start,
            abs: self.base_abs + pos,
        }
    }

    fn commit_to(&mut self, new_pos: usize) {
        for i in self.pos..new_pos {
            if self.buf[i] == b'\n' {
                self.line += 1;
                self.line_start = self.base_abs + i + 1;
            }
        }
        self.pos = new_pos;
    }

    fn slice_str(&self, start: usize, end: usize) -> &'a str {
        std::str::from_utf8(&self.buf[start..end])
            .expect("byte range was validated char-by-char during name scanning")
    }

    fn skip_ws_at(&self, mut pos: usize) -> usize {
        while pos < self.buf.len() && self.buf[pos].is_xml_whitespace() {
            pos += 1;
        }
        pos
    }

    fn match_literal(&self, pos: usize, lit: &[u8]) -> LitMatch {
        if pos >= self.buf.len() {
            return if lit.is_empty() {
                LitMatch::Full
            } else {
                LitMatch::Partial
            };
        }
        let avail = &self.buf[pos..];
        if avail.len() >= lit.len() {
            if &avail[..lit.len()] == lit {
                LitMatch::Full
            } else {
                LitMatch::No
            }
        } else if lit.starts_with(avail) {
            LitMatch::Partial
        } else {
            LitMatch::No
        }
    }

    fn find_literal_from(&self, from: usize, lit: &[u8]) -> Option<usize> {
        if from > self.buf.len() {
            return None;
        }
        let hay = &self.buf[from..];
        if hay.len() < lit.len() {
            return None;
        }
        hay.windows(lit.len()).position(|w| w == lit).map(|p| from + p)
    }

    fn read_name_at(&self, pos: usize) -> NameOutcome {
        match decode_char(self.buf, pos) {
            CharDecode::Incomplete => NameOutcome::NeedMore,
            CharDecode::Invalid => NameOutcome::Invalid,
            CharDecode::Ok(c, len) => {
                if !E::is_name_start_char(c) {
                    return NameOutcome::Invalid;
                }
                let mut p = pos + len;
                loop {
                    if p >= self.buf.len() {
                        return NameOutcome::NeedMore;
                    }
                    match decode_char(self.buf, p) {
                        CharDecode::Incomplete => return NameOutcome::NeedMore,
                        CharDecode::Invalid => return NameOutcome::Invalid,
                        CharDecode::Ok(c, len) => {
                            if E::is_name_char(c) {
                                p += len;
                            } else {
                                return NameOutcome::Ok(p);
                            }
                        }
                    }
                }
            }
        }
    }

    // --- content dispatch -------------------------------------------------

    fn dispatch_lt(&mut self) -> Step {
        let tok_start = self.pos;
        let open_loc = self.loc();
        if tok_start + 1 >= self.buf.len() {
            return Step::NeedMore;
        }
        match self.buf[tok_start + 1] {
            b'!' => self.dispatch_bang(tok_start, open_loc),
            b'/' => self.scan_close_tag(tok_start, open_loc),
            b'?' => self.dispatch_question(tok_start, open_loc),
            _ => self.scan_start_tag(tok_start, open_loc),
        }
    }

    fn dispatch_bang(&mut self, tok_start: usize, open_loc: Loc) -> Step {
        match self.match_literal(tok_start, b"<!--") {
            LitMatch::Full => return self.scan_comment(tok_start, open_loc),
            LitMatch::Partial => return Step::NeedMore,
            LitMatch::No => {}
        }
        match self.match_literal(tok_start, b"<![CDATA[") {
            LitMatch::Full => return self.scan_cdata(tok_start, open_loc),
            LitMatch::Partial => return Step::NeedMore,
            LitMatch::No => {}
        }
        match self.match_literal(tok_start, b"<!DOCTYPE") {
            LitMatch::Full => return self.scan_doctype(tok_start, open_loc),
            LitMatch::Partial => return Step::NeedMore,
            LitMatch::No => {}
        }
        self.events.push(Event::error(ErrorKind::InvalidElement, open_loc));
        self.commit_to(tok_start + 1);
        Step::Continue
    }

    fn dispatch_question(&mut self, tok_start: usize, open_loc: Loc) -> Step {
        let target_start = tok_start + 2;
        let target_end = match self.read_name_at(target_start) {
            NameOutcome::Ok(end) => end,
            NameOutcome::NeedMore => return Step::NeedMore,
            NameOutcome::Invalid => {
                self.events.push(Event::error(ErrorKind::InvalidPiTarget, open_loc));
                self.commit_to(tok_start + 2);
                return Step::Continue;
            }
        };
        let target = self.slice_str(target_start, target_end);
        if target.eq_ignore_ascii_case("xml") {
            if target == "xml" && self.base_abs + tok_start == 0 {
                return self.scan_xml_decl(tok_start, target_end, open_loc);
            }
            if target == "xml" {
                self.events.push(Event::error(ErrorKind::MisplacedXmlDecl, open_loc));
            } else {
                self.events.push(Event::error(ErrorKind::ReservedPiTarget, open_loc));
            }
            return self.skip_to_pi_end(target_end);
        }
        self.scan_pi_content(target, target_end, open_loc)
    }

    fn skip_to_pi_end(&mut self, after_target: usize) -> Step {
        match self.find_literal_from(after_target, b"?>") {
            Some(end) => {
                self.commit_to(end + 2);
                Step::Continue
            }
            None => Step::NeedMore,
        }
    }

    fn scan_pi_content(&mut self, target: &'a str, after_target: usize, open_loc: Loc) -> Step {
        let before = after_target;
        let content_start = self.skip_ws_at(after_target);
        let had_ws = content_start > before;
        if content_start >= self.buf.len() {
            return Step::NeedMore;
        }
        match self.find_literal_from(content_start, b"?>") {
            Some(end) => {
                if !had_ws && end != content_start {
                    self.events
                        .push(Event::error(ErrorKind::ExpectedPiEndOrAttr, open_loc));
                }
                let content = if end == content_start {
                    None
                } else {
                    match std::str::from_utf8(&self.buf[content_start..end]) {
                        Ok(s) => Some(s),
                        Err(_) => {
                            self.events.push(Event::error(ErrorKind::InvalidUtf8, open_loc));
                            return Step::Fatal;
                        }
                    }
                };
                self.commit_to(end + 2);
                if self.options.emit_pi {
                    self.events.push(Event::ProcessingInstruction {
                        target: Cow::Borrowed(target),
                        content: content.map(Cow::Borrowed),
                        loc: open_loc,
                    });
                }
                Step::Continue
            }
            None => Step::NeedMore,
        }
    }

    fn scan_xml_decl(&mut self, tok_start: usize, name_end: usize, open_loc: Loc) -> Step {
        let mut pos = name_end;
        let mut attrs = Vec::new();
        loop {
            let before = pos;
            pos = self.skip_ws_at(pos);
            if pos >= self.buf.len() {
                return Step::NeedMore;
            }
            match self.match_literal(pos, b"?>") {
                LitMatch::Full => {
                    self.commit_to(pos + 2);
                    if self.options.emit_prolog {
                        self.events.push(Event::Prolog {
                            pseudo_attrs: attrs,
                            loc: open_loc,
                        });
                    }
                    return Step::Continue;
                }
                LitMatch::Partial => return Step::NeedMore,
                LitMatch::No => {}
            }
            if pos == before && !attrs.is_empty() {
                self.events.push(Event::error(ErrorKind::MalformedXmlDecl, open_loc));
                return self.skip_to_pi_end(pos);
            }
            let name_end2 = match self.read_name_at(pos) {
                NameOutcome::Ok(e) => e,
                NameOutcome::NeedMore => return Step::NeedMore,
                NameOutcome::Invalid => {
                    self.events.push(Event::error(ErrorKind::MalformedXmlDecl, open_loc));
                    return self.skip_to_pi_end(pos);
                }
            };
            let pname = self.slice_str(pos, name_end2);
            let p2 = self.skip_ws_at(name_end2);
            if p2 >= self.buf.len() {
                return Step::NeedMore;
            }
            if self.buf[p2] != b'=' {
                self.events.push(Event::error(ErrorKind::ExpectedEq, open_loc));
                return self.skip_to_pi_end(p2);
            }
            let p2 = p2 + 1;
            let p3 = self.skip_ws_at(p2);
            if p3 >= self.buf.len() {
                return Step::NeedMore;
            }
            let quote = self.buf[p3];
            if quote != b'"' && quote != b'\'' {
                self.events.push(Event::error(ErrorKind::ExpectedQuote, open_loc));
                return self.skip_to_pi_end(p3);
            }
            let value_start = p3 + 1;
            let mut q = value_start;
            loop {
                if q >= self.buf.len() {
                    return Step::NeedMore;
                }
                if self.buf[q] == quote {
                    break;
                }
                q += 1;
            }
            let value = match std::str::from_utf8(&self.buf[value_start..q]) {
                Ok(s) => s,
                Err(_) => {
                    self.events.push(Event::error(ErrorKind::InvalidUtf8, open_loc));
                    return Step::Fatal;
                }
            };
            attrs.push(Attribute::new(Cow::Borrowed(pname), Cow::Borrowed(value)));
            pos = q + 1;
        }
    }

    fn scan_close_tag(&mut self, tok_start: usize, open_loc: Loc) -> Step {
        let name_start = tok_start + 2;
        let name_end = match self.read_name_at(name_start) {
            NameOutcome::Ok(e) => e,
            NameOutcome::NeedMore => return Step::NeedMore,
            NameOutcome::Invalid => {
                self.events.push(Event::error(ErrorKind::InvalidCloseTag, open_loc));
                self.commit_to(tok_start + 2);
                return Step::Continue;
            }
        };
        let name = self.slice_str(name_start, name_end);
        let p = self.skip_ws_at(name_end);
        if p >= self.buf.len() {
            return Step::NeedMore;
        }
        if self.buf[p] != b'>' {
            self.events.push(Event::error(ErrorKind::ExpectedGt, open_loc));
            match find_byte(&self.buf[p..], b'>') {
                Some(off) => self.commit_to(p + off + 1),
                None => return Step::NeedMore,
            }
        } else {
            self.commit_to(p + 1);
        }
        self.events.push(Event::EndElement {
            name: Cow::Borrowed(name),
            loc: open_loc,
        });
        Step::Continue
    }

    fn scan_start_tag(&mut self, tok_start: usize, open_loc: Loc) -> Step {
        let name_start = tok_start + 1;
        let name_end = match self.read_name_at(name_start) {
            NameOutcome::Ok(e) => e,
            NameOutcome::NeedMore => return Step::NeedMore,
            NameOutcome::Invalid => {
                self.events.push(Event::error(ErrorKind::InvalidElement, open_loc));
                self.commit_to(tok_start + 1);
                return Step::Continue;
            }
        };
        let name = self.slice_str(name_start, name_end);
        let mut pos = name_end;
        let mut attrs: Vec<Attribute<'a>> = Vec::new();
        let mut seen: Vec<&'a str> = Vec::new();
        loop {
            let before_ws = pos;
            pos = self.skip_ws_at(pos);
            if pos >= self.buf.len() {
                return Step::NeedMore;
            }
            match self.buf[pos] {
                b'>' => {
                    self.commit_to(pos + 1);
                    self.events.push(Event::StartElement {
                        name: Cow::Borrowed(name),
                        attrs,
                        loc: open_loc,
                    });
                    return Step::Continue;
                }
                b'/' => {
                    if pos + 1 >= self.buf.len() {
                        return Step::NeedMore;
                    }
                    if self.buf[pos + 1] == b'>' {
                        self.commit_to(pos + 2);
                        self.events.push(Event::StartElement {
                            name: Cow::Borrowed(name),
                            attrs,
                            loc: open_loc,
                        });
                        self.events.push(Event::EndElement {
                            name: Cow::Borrowed(name),
                            loc: open_loc,
                        });
                        return Step::Continue;
                    }
                    self.events.push(Event::error(ErrorKind::ExpectedGtOrAttr, open_loc));
                    self.commit_to(pos + 1);
                    return Step::Continue;
                }
                _ => {
                    if pos == before_ws && !attrs.is_empty() {
                        self.events
                            .push(Event::error(ErrorKind::MissingWhitespaceBeforeAttr, self.loc_for(pos)));
                    }
                    let attr_name_end = match self.read_name_at(pos) {
                        NameOutcome::Ok(e) => e,
                        NameOutcome::NeedMore => return Step::NeedMore,
                        NameOutcome::Invalid => {
                            self.events
                                .push(Event::error(ErrorKind::ExpectedGtOrAttr, self.loc_for(pos)));
                            pos += 1;
                            continue;
                        }
                    };
                    let attr_name = self.slice_str(pos, attr_name_end);
                    let p2 = self.skip_ws_at(attr_name_end);
                    if p2 >= self.buf.len() {
                        return Step::NeedMore;
                    }
                    if self.buf[p2] != b'=' {
                        self.events.push(Event::error(ErrorKind::ExpectedEq, self.loc_for(p2)));
                        pos = p2;
                        continue;
                    }
                    let p2 = p2 + 1;
                    let p3 = self.skip_ws_at(p2);
                    if p3 >= self.buf.len() {
                        return Step::NeedMore;
                    }
                    let quote = self.buf[p3];
                    if quote != b'"' && quote != b'\'' {
                        self.events.push(Event::error(ErrorKind::ExpectedQuote, self.loc_for(p3)));
                        pos = p3;
                        continue;
                    }
                    let value_start = p3 + 1;
                    let mut q = value_start;
                    let mut saw_lt = false;
                    loop {
                        if q >= self.buf.len() {
                            return Step::NeedMore;
                        }
                        if self.buf[q] == quote {
                            break;
                        }
                        if self.buf[q] == b'<' {
                            saw_lt = true;
                        }
                        q += 1;
                    }
                    let value_str = match std::str::from_utf8(&self.buf[value_start..q]) {
                        Ok(s) => s,
                        Err(_) => {
                            self.events.push(Event::error(ErrorKind::InvalidUtf8, open_loc));
                            return Step::Fatal;
                        }
                    };
                    if saw_lt {
                        self.events
                            .push(Event::error(ErrorKind::AttrLt, self.loc_for(value_start)));
                    }
                    if seen.contains(&attr_name) {
                        self.events.push(Event::error(ErrorKind::AttrUnique, self.loc_for(pos)));
                    }
                    seen.push(attr_name);
                    attrs.push(Attribute::new(Cow::Borrowed(attr_name), Cow::Borrowed(value_str)));
                    pos = q + 1;
                }
            }
        }
    }

    fn scan_comment(&mut self, tok_start: usize, open_loc: Loc) -> Step {
        let content_start = tok_start + 4;
        let mut i = content_start;
        let mut malformed = false;
        loop {
            if i >= self.buf.len() {
                return Step::NeedMore;
            }
            if self.buf[i] == b'-' {
                match self.buf.get(i + 1) {
                    Some(b'-') => match self.buf.get(i + 2) {
                        Some(b'>') => {
                            let body = &self.buf[content_start..i];
                            return self.finish_comment(body, i + 3, open_loc, malformed);
                        }
                        Some(_) => {
                            malformed = true;
                            i += 1;
                        }
                        None => return Step::NeedMore,
                    },
                    Some(_) => i += 1,
                    None => return Step::NeedMore,
                }
            } else {
                i += 1;
            }
        }
    }

    fn finish_comment(&mut self, body: &'a [u8], new_pos: usize, open_loc: Loc, malformed: bool) -> Step {
        match std::str::from_utf8(body) {
            Ok(s) => {
                self.commit_to(new_pos);
                if self.options.emit_comment {
                    self.events.push(Event::Comment {
                        text: Cow::Borrowed(s),
                        loc: open_loc,
                    });
                }
                if malformed {
                    self.events.push(Event::error(ErrorKind::Comment, open_loc));
                }
                Step::Continue
            }
            Err(_) => {
                self.events.push(Event::error(ErrorKind::InvalidUtf8, open_loc));
                Step::Fatal
            }
        }
    }

    fn scan_cdata(&mut self, tok_start: usize, open_loc: Loc) -> Step {
        let content_start = tok_start + 9;
        match self.find_literal_from(content_start, b"]]>") {
            Some(end) => match std::str::from_utf8(&self.buf[content_start..end]) {
                Ok(s) => {
                    self.commit_to(end + 3);
                    if self.options.emit_cdata {
                        self.events.push(Event::CData {
                            text: Cow::Borrowed(s),
                            loc: open_loc,
                        });
                    }
                    Step::Continue
                }
                Err(_) => {
                    self.events.push(Event::error(ErrorKind::InvalidUtf8, open_loc));
                    Step::Fatal
                }
            },
            None => Step::NeedMore,
        }
    }

    fn scan_doctype(&mut self, tok_start: usize, open_loc: Loc) -> Step {
        let body_start = tok_start + 9;
        let mut i = body_start;
        let mut depth: i32 = 0;
        let mut in_quote: Option<u8> = None;
        loop {
            if i >= self.buf.len() {
                return Step::NeedMore;
            }
            if let Some(q) = in_quote {
                if self.buf[i] == q {
                    in_quote = None;
                }
                i += 1;
                continue;
            }
            match self.match_literal(i, b"<!--") {
                LitMatch::Full => match self.find_literal_from(i + 4, b"-->") {
                    Some(end) => {
                        i = end + 3;
                        continue;
                    }
                    None => return Step::NeedMore,
                },
                LitMatch::Partial => return Step::NeedMore,
                LitMatch::No => {}
            }
            match self.buf[i] {
                b'"' | b'\'' => {
                    in_quote = Some(self.buf[i]);
                    i += 1;
                }
                b'[' => {
                    depth += 1;
                    i += 1;
                }
                b']' => {
                    depth -= 1;
                    i += 1;
                }
                b'>' if depth <= 0 => {
                    let body = &self.buf[body_start..i];
                    return match std::str::from_utf8(body) {
                        Ok(s) => {
                            self.commit_to(i + 1);
                            self.events.push(Event::Dtd {
                                content: Cow::Borrowed(s),
                                loc: open_loc,
                            });
                            Step::Continue
                        }
                        Err(_) => {
                            self.events.push(Event::error(ErrorKind::InvalidUtf8, open_loc));
                            Step::Fatal
                        }
                    };
                }
                _ => i += 1,
            }
        }
    }

    fn scan_ws_or_text(&mut self) -> Step {
        loop {
            if self.pos >= self.buf.len() {
                return Step::Continue;
            }
            let start = self.pos;
            let open_loc = self.loc();
            let lt_pos = find_byte(&self.buf[start..], b'<').map(|i| start + i);
            let seg_end = lt_pos.unwrap_or(self.buf.len());
            match find_subslice(&self.buf[start..seg_end], b"]]>") {
                Some(rel) => {
                    let bad_at = start + rel;
                    if let Step::Fatal = self.emit_text_piece(start, bad_at, open_loc) {
                        return Step::Fatal;
                    }
                    let err_loc = self.loc();
                    self.events.push(Event::error(ErrorKind::TextCdataEnd, err_loc));
                    self.commit_to(bad_at + 3);
                }
                None => {
                    if lt_pos.is_none() {
                        if start == seg_end {
                            return Step::Continue;
                        }
                        return Step::NeedMore;
                    }
                    return self.emit_text_piece(start, seg_end, open_loc);
                }
            }
        }
    }

    fn emit_text_piece(&mut self, start: usize, end: usize, open_loc: Loc) -> Step {
        if start == end {
            return Step::Continue;
        }
        match std::str::from_utf8(&self.buf[start..end]) {
            Ok(s) => {
                for ch in s.chars() {
                    if !is_xml_char(ch) {
                        self.events.push(Event::error(ErrorKind::InvalidChar, open_loc));
                        return Step::Fatal;
                    }
                }
                let all_ws = s.bytes().all(|b| b.is_xml_whitespace());
                self.commit_to(end);
                if all_ws {
                    if self.options.emit_space {
                        self.events.push(Event::Space {
                            text: Cow::Borrowed(s),
                            loc: open_loc,
                        });
                    } else if self.options.emit_characters {
                        self.events.push(Event::Characters {
                            text: Cow::Borrowed(s),
                            loc: open_loc,
                        });
                    }
                } else if self.options.emit_characters {
                    self.events.push(Event::Characters {
                        text: Cow::Borrowed(s),
                        loc: open_loc,
                    });
                }
                Step::Continue
            }
            Err(_) => {
                self.events.push(Event::error(ErrorKind::InvalidUtf8, open_loc));
                Step::Fatal
            }
        }
    }
}
