//! Chunk bridge: turns a sequence of arbitrarily-sized byte chunks into a
//! sequence of owned events, by splicing an unfinished construct from one
//! chunk with a "mini-block" prefix of the next.
//!
//! The tokenizer (`tokenizer::parse_block`) is itself stateless between
//! calls - it always rescans its buffer from byte 0. All cross-chunk state
//! (leftover bytes, line/column counters, end-of-stream bookkeeping) lives
//! here instead, following the division of labor the specification's
//! Design Notes describe for the "mini-block" strategy.

use xrs_chars::CharEdition;

use crate::event::{ErrorKind, Event};
use crate::loc::Loc;
use crate::options::TokenizerOptions;
use crate::tokenizer::{parse_block, Tokenizer};

/// Feeds chunks to a `Tokenizer` and reassembles an owned event stream
/// across chunk boundaries.
pub struct ChunkBridge<E: CharEdition> {
    tokenizer: Tokenizer<E>,
    leftover: Vec<u8>,
    line: u32,
    line_start: usize,
    abs_pos: usize,
    started: bool,
    done: bool,
}

impl<E: CharEdition> ChunkBridge<E> {
    pub fn new(options: TokenizerOptions) -> Self {
        Self {
            tokenizer: Tokenizer::new(options),
            leftover: Vec::new(),
            line: 1,
            line_start: 0,
            abs_pos: 0,
            started: false,
            done: false,
        }
    }

    /// Feed the next chunk of input. Returns owned events produced from
    /// it (plus any leftover from the previous chunk that this chunk
    /// completed). Call repeatedly as chunks arrive, then call `finish()`
    /// once there is no more input. The very first call is prefixed with
    /// the `StartDocument` sentinel; `finish()` appends `EndDocument`.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Event<'static>> {
        debug_assert!(!self.done, "feed() called after finish()");
        let mut out = Vec::new();
        if !self.started {
            out.push(Event::StartDocument);
            self.started = true;
        }
        if self.leftover.is_empty() {
            self.feed_fresh(chunk, &mut out);
        } else {
            self.feed_with_leftover(chunk, &mut out);
        }
        out
    }

    fn feed_fresh(&mut self, chunk: &[u8], out: &mut Vec<Event<'static>>) {
        let result = parse_block::<E>(
            chunk,
            self.line,
            self.line_start,
            self.abs_pos,
            self.tokenizer.options,
        );
        self.line = result.line;
        self.line_start = result.line_start;
        match result.resume_offset {
            None => {
                self.abs_pos = result.abs_pos;
                out.extend(result.events.into_iter().map(Event::into_owned));
            }
            Some(offset) => {
                out.extend(result.events.into_iter().map(Event::into_owned));
                self.abs_pos = self.abs_pos + offset;
                self.leftover = chunk[offset..].to_vec();
            }
        }
    }

    /// `leftover` holds an unfinished construct from a previous call.
    /// Re-scan it against successively larger mini-blocks (leftover plus a
    /// growing prefix of `chunk`, bounded at each `>` byte) until the
    /// construct resolves or the whole new chunk has been absorbed into
    /// `leftover` for the next call.
    fn feed_with_leftover(&mut self, chunk: &[u8], out: &mut Vec<Event<'static>>) {
        let mut chunk_pos = 0;
        loop {
            let next_gt = chunk[chunk_pos..].iter().position(|&b| b == b'>');
            let mini_end = match next_gt {
                Some(rel) => chunk_pos + rel + 1,
                None => chunk.len(),
            };
            let mut mini_block = std::mem::take(&mut self.leftover);
            mini_block.extend_from_slice(&chunk[chunk_pos..mini_end]);

            let result = parse_block::<E>(
                &mini_block,
                self.line,
                self.line_start,
                self.abs_pos,
                self.tokenizer.options,
            );
            self.line = result.line;
            self.line_start = result.line_start;
            out.extend(result.events.into_iter().map(Event::into_owned));

            match result.resume_offset {
                None => {
                    self.abs_pos = result.abs_pos;
                    // The rest of the chunk, past this mini-block, is
                    // fresh input: hand it to the ordinary fast path.
                    if mini_end < chunk.len() {
                        self.feed_fresh(&chunk[mini_end..], out);
                    }
                    return;
                }
                Some(offset) => {
                    self.abs_pos += offset;
                    self.leftover = mini_block[offset..].to_vec();
                    if next_gt.is_none() {
                        // Absorbed the whole rest of the chunk and still
                        // unresolved; wait for the next one.
                        return;
                    }
                    chunk_pos = mini_end;
                    if chunk_pos >= chunk.len() {
                        return;
                    }
                }
            }
        }
    }

    /// Signal end of input. Drains any leftover bytes, surfacing an
    /// `unexpected_eof` error if a construct was still open, and appends
    /// the `EndDocument` sentinel (preceded by `StartDocument` too, for
    /// the degenerate case of a stream that never got a `feed()` call).
    pub fn finish(&mut self) -> Vec<Event<'static>> {
        self.done = true;
        let mut out = Vec::new();
        if !self.started {
            out.push(Event::StartDocument);
            self.started = true;
        }
        if !self.leftover.is_empty() {
            let leftover = std::mem::take(&mut self.leftover);
            let result = parse_block::<E>(
                &leftover,
                self.line,
                self.line_start,
                self.abs_pos,
                self.tokenizer.options,
            );
            out.extend(result.events.into_iter().map(Event::into_owned));
            if result.resume_offset.is_some() {
                out.push(Event::error(
                    ErrorKind::UnexpectedEof,
                    Loc::new(result.line, result.line_start, result.abs_pos),
                ));
            }
        }
        out.push(Event::EndDocument);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xrs_chars::Edition5;

    /// Runs the bridge and strips the `StartDocument`/`EndDocument`
    /// sentinels, since most of these tests care only about the
    /// structural events in between; `sentinels_wrap_every_stream` below
    /// checks the sentinels themselves.
    fn run(chunks: &[&[u8]]) -> Vec<Event<'static>> {
        let mut bridge = ChunkBridge::<Edition5>::new(TokenizerOptions::default());
        let mut events = Vec::new();
        for chunk in chunks {
            events.extend(bridge.feed(chunk));
        }
        events.extend(bridge.finish());
        events
            .into_iter()
            .filter(|e| !matches!(e, Event::StartDocument | Event::EndDocument))
            .collect()
    }

    #[test]
    fn sentinels_wrap_every_stream() {
        let mut bridge = ChunkBridge::<Edition5>::new(TokenizerOptions::default());
        let mut events = bridge.feed(b"<a><b/></a>");
        events.extend(bridge.finish());
        assert!(matches!(events.first(), Some(Event::StartDocument)));
        assert!(matches!(events.last(), Some(Event::EndDocument)));
    }

    #[test]
    fn whole_document_in_one_chunk() {
        let events = run(&[b"<a><b/></a>"]);
        assert!(matches!(events[0], Event::StartElement { .. }));
    }

    #[test]
    fn start_tag_split_across_chunks() {
        let a = run(&[b"<a"]);
        assert!(a.is_empty(), "nothing resolves until '>' arrives");
        let events = run(&[b"<a", b">", b"</a>"]);
        assert!(matches!(events[0], Event::StartElement { .. }));
        assert!(matches!(events[1], Event::EndElement { .. }));
    }

    #[test]
    fn element_name_split_mid_codepoint() {
        // "café" with the 'é' (0xC3 0xA9) split across the chunk boundary.
        let mut bytes = Vec::new();
        bytes.extend_from_slice("<caf".as_bytes());
        bytes.push(0xC3);
        let first = bytes.clone();
        let mut second = vec![0xA9];
        second.extend_from_slice(b"/>");
        let events = run(&[&first, &second]);
        match &events[0] {
            Event::StartElement { name, .. } => assert_eq!(name, "caf\u{e9}"),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn quoted_gt_inside_doctype_does_not_end_mini_block_early() {
        let events = run(&[b"<!DOCTYPE a [<!ENTITY x \"", b">\">]>"]);
        assert!(matches!(events[0], Event::Dtd { .. }));
    }

    #[test]
    fn unterminated_comment_reports_eof() {
        let events = run(&[b"<!-- never closed"]);
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::Error { kind: ErrorKind::UnexpectedEof, .. })));
    }
}
