//! Quantified invariants and round-trip properties over the tokenizer.

use xrs_chars::Edition5;
use xrs_parser::{ChunkBridge, Event, TokenizerOptions};

fn run(input: &str) -> Vec<Event<'static>> {
    let mut bridge = ChunkBridge::<Edition5>::new(TokenizerOptions::default());
    let mut events = bridge.feed(input.as_bytes());
    events.extend(bridge.finish());
    events
}

const SAMPLES: &[&str] = &[
    "<a><b/></a>",
    r#"<?xml version="1.0"?><r a="1" b="2"><c/>text<!--x--></r>"#,
    "<a>line one\nline two</a>",
    "<a><![CDATA[<not-a-tag>]]>tail</a>",
];

#[test]
fn event_offsets_are_non_decreasing() {
    for sample in SAMPLES {
        let events = run(sample);
        let mut last = 0usize;
        for event in &events {
            if let Some(loc) = event.loc() {
                assert!(loc.abs >= last, "offset went backwards in {sample:?}: {loc:?}");
                last = loc.abs;
            }
        }
    }
}

#[test]
fn attribute_order_matches_source_order() {
    let events = run(r#"<a z="1" a="2" m="3"/>"#);
    let attrs = events.iter().find_map(|e| match e {
        Event::StartElement { attrs, .. } => Some(attrs),
        _ => None,
    });
    let names: Vec<&str> = attrs.unwrap().iter().map(|a| a.name.as_ref()).collect();
    assert_eq!(names, vec!["z", "a", "m"]);
}

#[test]
fn concatenated_text_cdata_space_equals_source_content_sections() {
    let input = "<a>  <b>hi</b>  <![CDATA[raw]]></a>";
    let events = run(input);
    let concatenated: String = events
        .iter()
        .filter_map(|e| match e {
            Event::Characters { text, .. } | Event::Space { text, .. } | Event::CData { text, .. } => Some(text.as_ref()),
            _ => None,
        })
        .collect();
    assert_eq!(concatenated, "  hi  raw");
}

#[test]
fn disabling_space_events_coalesces_into_surrounding_characters_range() {
    let input = "<a>  <b/>  </a>";
    let mut full_options = TokenizerOptions::default();
    full_options.emit_space = false;
    let mut bridge = ChunkBridge::<Edition5>::new(full_options);
    let mut events = bridge.feed(input.as_bytes());
    events.extend(bridge.finish());
    assert!(!events.iter().any(|e| matches!(e, Event::Space { .. })));
}
