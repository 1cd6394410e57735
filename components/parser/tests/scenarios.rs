//! Literal end-to-end input/output scenarios.

use pretty_assertions::assert_eq;

use xrs_chars::Edition5;
use xrs_parser::{Attribute, ChunkBridge, Event, TokenizerOptions};

fn run(input: &str) -> Vec<Event<'static>> {
    let mut bridge = ChunkBridge::<Edition5>::new(TokenizerOptions::default());
    let mut events = bridge.feed(input.as_bytes());
    events.extend(bridge.finish());
    events
        .into_iter()
        .filter(|e| !matches!(e, Event::StartDocument | Event::EndDocument))
        .collect()
}

#[test]
fn stream_is_wrapped_in_document_sentinels() {
    let mut bridge = ChunkBridge::<Edition5>::new(TokenizerOptions::default());
    let mut events = bridge.feed(b"<a/>");
    events.extend(bridge.finish());
    assert_eq!(events.first(), Some(&Event::StartDocument));
    assert_eq!(events.last(), Some(&Event::EndDocument));
}

fn element_names(events: &[Event<'static>]) -> Vec<(&'static str, &str)> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::StartElement { name, .. } => Some(("start", name.as_ref())),
            Event::EndElement { name, .. } => Some(("end", name.as_ref())),
            _ => None,
        })
        .collect()
}

#[test]
fn simple_nested_elements() {
    let events = run("<a><b/></a>");
    assert_eq!(element_names(&events), vec![("start", "a"), ("start", "b"), ("end", "b"), ("end", "a")]);
}

#[test]
fn duplicate_attribute_is_kept_and_flagged() {
    let events = run(r#"<a x="1" x="2"/>"#);
    let attrs = events.iter().find_map(|e| match e {
        Event::StartElement { attrs, .. } => Some(attrs),
        _ => None,
    });
    assert_eq!(
        attrs.unwrap(),
        &vec![Attribute::new("x", "1"), Attribute::new("x", "2")]
    );
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::Error { kind: xrs_parser::ErrorKind::AttrUnique, .. })));
}

#[test]
fn xml_declaration_then_empty_root() {
    let events = run(r#"<?xml version="1.0"?><r/>"#);
    match &events[0] {
        Event::Prolog { pseudo_attrs, .. } => {
            assert_eq!(pseudo_attrs, &vec![Attribute::new("version", "1.0")]);
        }
        other => panic!("unexpected first event {other:?}"),
    }
    assert_eq!(element_names(&events[1..]), vec![("start", "r"), ("end", "r")]);
}

#[test]
fn chunk_split_mid_tag_name_matches_single_shot() {
    let mut bridge = ChunkBridge::<Edition5>::new(TokenizerOptions::default());
    let mut chunked = bridge.feed(b"<aa");
    chunked.extend(bridge.feed(b"a></aaa>"));
    chunked.extend(bridge.finish());

    let single_shot = run("<aaa></aaa>");
    assert_eq!(chunked, single_shot);
    assert_eq!(element_names(&chunked), vec![("start", "aaa"), ("end", "aaa")]);
}
