//! Tokenizer-level boundary behaviors around DOCTYPE, CDATA, comments,
//! and the XML declaration/PI reserved-target rules.

use xrs_chars::Edition5;
use xrs_parser::{ChunkBridge, ErrorKind, Event, TokenizerOptions};

fn run(input: &str) -> Vec<Event<'static>> {
    let mut bridge = ChunkBridge::<Edition5>::new(TokenizerOptions::default());
    let mut events = bridge.feed(input.as_bytes());
    events.extend(bridge.finish());
    events
}

#[test]
fn quoted_gt_inside_doctype_does_not_terminate_it() {
    let events = run(r#"<!DOCTYPE d [<!ENTITY x ">">]><r/>"#);
    let content = events.iter().find_map(|e| match e {
        Event::Dtd { content, .. } => Some(content.as_ref()),
        _ => None,
    });
    assert_eq!(content, Some(r#"d [<!ENTITY x ">">]"#));
}

#[test]
fn xml_decl_past_offset_zero_is_misplaced() {
    let events = run("<a><?xml version=\"1.0\"?></a>");
    assert!(events.iter().any(|e| matches!(e, Event::Error { kind: ErrorKind::MisplacedXmlDecl, .. })));
}

#[test]
fn reserved_xml_pi_target_rejected_at_any_offset() {
    let events = run("<a><?XML data?></a>");
    assert!(events.iter().any(|e| matches!(e, Event::Error { kind: ErrorKind::ReservedPiTarget, .. })));
}

#[test]
fn empty_cdata_section_produces_empty_event() {
    let events = run("<a><![CDATA[]]></a>");
    let text = events.iter().find_map(|e| match e {
        Event::CData { text, .. } => Some(text.as_ref()),
        _ => None,
    });
    assert_eq!(text, Some(""));
}

#[test]
fn comment_with_embedded_double_hyphen_is_flagged_but_recovered() {
    let events = run("<a><!-- -- --></a>");
    assert!(events.iter().any(|e| matches!(e, Event::Comment { .. })));
    assert!(events.iter().any(|e| matches!(e, Event::Error { kind: ErrorKind::Comment, .. })));
}
