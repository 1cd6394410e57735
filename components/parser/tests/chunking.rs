//! Chunk-boundary insensitivity: splitting an input at any byte offset
//! (including mid-codepoint) must not change the resulting event stream
//! versus single-shot parsing, once both are reduced to owned `'static`
//! events.

use xrs_chars::Edition5;
use xrs_parser::{ChunkBridge, Event, TokenizerOptions};

fn single_shot(input: &[u8]) -> Vec<Event<'static>> {
    let mut bridge = ChunkBridge::<Edition5>::new(TokenizerOptions::default());
    let mut events = bridge.feed(input);
    events.extend(bridge.finish());
    events
}

fn chunked(input: &[u8], split_at: &[usize]) -> Vec<Event<'static>> {
    let mut bridge = ChunkBridge::<Edition5>::new(TokenizerOptions::default());
    let mut events = Vec::new();
    let mut start = 0;
    for &split in split_at {
        events.extend(bridge.feed(&input[start..split]));
        start = split;
    }
    events.extend(bridge.feed(&input[start..]));
    events.extend(bridge.finish());
    events
}

const DOCUMENT: &str = "<?xml version=\"1.0\"?><root a=\"1\"><child>text &amp; more</child><!-- note --></root>";

#[test]
fn every_split_point_matches_single_shot() {
    let bytes = DOCUMENT.as_bytes();
    let whole = single_shot(bytes);
    for split in 1..bytes.len() {
        let got = chunked(bytes, &[split]);
        assert_eq!(got, whole, "mismatch splitting at byte {split}");
    }
}

#[test]
fn three_way_split_matches_single_shot() {
    let bytes = DOCUMENT.as_bytes();
    let whole = single_shot(bytes);
    let got = chunked(bytes, &[5, bytes.len() / 2]);
    assert_eq!(got, whole);
}

#[test]
fn utf8_codepoint_split_across_chunks_stays_intact() {
    // "café" with 'é' (0xC3 0xA9) split down the middle of its two bytes.
    let input = "<name>caf\u{e9}</name>";
    let bytes = input.as_bytes();
    let split_idx = bytes.iter().position(|&b| b == 0xA9).unwrap();
    let got = chunked(bytes, &[split_idx]);
    let whole = single_shot(bytes);
    assert_eq!(got, whole);
    let text = got.iter().find_map(|e| match e {
        Event::Characters { text, .. } => Some(text.as_ref()),
        _ => None,
    });
    assert_eq!(text, Some("caf\u{e9}"));
}

#[test]
fn start_tag_left_open_until_gt_arrives() {
    let mut bridge = ChunkBridge::<Edition5>::new(TokenizerOptions::default());
    let events = bridge.feed(b"<a attr=\"x\"");
    assert_eq!(events, vec![Event::StartDocument], "nothing structural resolves until '>' arrives");
    let mut events = bridge.feed(b">");
    events.extend(bridge.finish());
    assert!(matches!(events[0], Event::StartElement { .. }));
}

#[test]
fn unterminated_construct_at_end_of_stream_reports_eof() {
    let mut bridge = ChunkBridge::<Edition5>::new(TokenizerOptions::default());
    let mut events = bridge.feed(b"<a><!-- never closed");
    events.extend(bridge.finish());
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::Error { kind: xrs_parser::ErrorKind::UnexpectedEof, .. })));
}
