//! Streaming, chunk-resilient XML 1.0 tokenizer.
//!
//! This crate turns arbitrarily-chunked byte input into a flat sequence of
//! lexical [`Event`]s - start/end tags, text, comments, CDATA sections, the
//! XML declaration, processing instructions, and the raw DOCTYPE body - by
//! the layer above (`xrs-dtd`) processes. It does not build a DOM, does not
//! resolve namespaces, and does not validate element nesting: it is a
//! single-pass lexer, not a parser with a stack.
//!
//! Chunking is handled by [`ChunkBridge`], which feeds chunks through the
//! stateless [`tokenizer::parse_block`] function and splices together any
//! construct left unfinished at a chunk boundary. Events borrow from the
//! input buffer where possible (`Cow::Borrowed`) and fall back to owned
//! storage (`Cow::Owned`) only when a construct had to be reassembled from
//! a synthetic mini-block buffer.

mod bridge;
mod event;
mod loc;
mod options;
mod tokenizer;

pub use bridge::ChunkBridge;
pub use event::{Attribute, ErrorKind, Event};
pub use loc::Loc;
pub use options::{PositionMode, TokenizerOptions};
pub use tokenizer::{parse_block, BlockResult, Tokenizer};

pub use xrs_chars::{CharEdition, Edition4, Edition5};

#[cfg(test)]
mod tests {
    use super::*;

    fn events_for(input: &str) -> Vec<Event<'static>> {
        let mut bridge = ChunkBridge::<Edition5>::new(TokenizerOptions::default());
        let mut events = bridge.feed(input.as_bytes());
        events.extend(bridge.finish());
        events
            .into_iter()
            .filter(|e| !matches!(e, Event::StartDocument | Event::EndDocument))
            .collect()
    }

    #[test]
    fn minimal_document() {
        let events = events_for("<a><b/></a>");
        let names: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                Event::StartElement { name, .. } => Some(name.as_ref()),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn duplicate_attribute_is_flagged_but_both_kept() {
        let events = events_for(r#"<a x="1" x="2"/>"#);
        let attrs = events.iter().find_map(|e| match e {
            Event::StartElement { attrs, .. } => Some(attrs),
            _ => None,
        });
        assert_eq!(attrs.unwrap().len(), 2);
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::Error { kind: ErrorKind::AttrUnique, .. })));
    }

    #[test]
    fn xml_declaration_only_recognized_at_start() {
        let events = events_for("<?xml version=\"1.0\"?><a/>");
        assert!(matches!(events[0], Event::Prolog { .. }));

        let events = events_for("<a><?xml version=\"1.0\"?></a>");
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::Error { kind: ErrorKind::MisplacedXmlDecl, .. })));
    }

    #[test]
    fn reserved_pi_target_case_variants_rejected() {
        for target in ["XML", "Xml", "xML"] {
            let events = events_for(&format!("<a><?{target} data?></a>"));
            assert!(events
                .iter()
                .any(|e| matches!(e, Event::Error { kind: ErrorKind::ReservedPiTarget, .. })));
        }
    }

    #[test]
    fn comment_and_cdata_round_trip() {
        let events = events_for("<a><!-- hi --><![CDATA[<not a tag>]]></a>");
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::Comment { text, .. } if text == " hi ")));
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::CData { text, .. } if text == "<not a tag>")));
    }

    #[test]
    fn forbidden_cdata_end_sequence_in_text_is_flagged() {
        let events = events_for("<a>x]]>y</a>");
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::Error { kind: ErrorKind::TextCdataEnd, .. })));
        let texts: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                Event::Characters { text, .. } => Some(text.as_ref()),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["x", "y"]);
    }

    #[test]
    fn whitespace_run_reclassified_as_text_on_trailing_nonws() {
        let events = events_for("<a>   x</a>");
        let texts: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                Event::Characters { text, .. } => Some(text.as_ref()),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["   x"]);
        assert!(!events.iter().any(|e| matches!(e, Event::Space { .. })));
    }

    #[test]
    fn pure_whitespace_between_elements_is_space() {
        let events = events_for("<a>  <b/>  </a>");
        assert_eq!(
            events.iter().filter(|e| matches!(e, Event::Space { .. })).count(),
            2
        );
    }

    #[test]
    fn edition4_tokenizer_accepts_narrower_name_chars() {
        let mut bridge = ChunkBridge::<Edition4>::new(TokenizerOptions::default());
        let mut events = bridge.feed(b"<a:b/>");
        events.extend(bridge.finish());
        assert!(matches!(events[0], Event::StartElement { .. }));
    }

    #[test]
    fn malformed_comment_with_embedded_double_hyphen_is_flagged() {
        let events = events_for("<a><!-- x -- y --></a>");
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::Error { kind: ErrorKind::Comment, .. })));
    }

    #[test]
    fn doctype_content_is_captured_raw() {
        let events = events_for("<!DOCTYPE root [<!ENTITY a \"b\">]><root/>");
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::Dtd { content, .. } if content.contains("ENTITY a"))));
    }

    #[test]
    fn malformed_attribute_name_mid_tag_recovers_in_place() {
        let events = events_for("<a $></a>");
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::Error { kind: ErrorKind::ExpectedGtOrAttr, .. })));
        assert!(events.iter().any(|e| matches!(e, Event::StartElement { name, .. } if name == "a")));
        assert!(events.iter().any(|e| matches!(e, Event::EndElement { name, .. } if name == "a")));
        assert!(!events.iter().any(|e| matches!(e, Event::Characters { .. })));
    }
}
