//! General entity resolution (component 7): projects the internal
//! general entities out of a [`DtdModel`] into a `name -> replacement`
//! map, then rewrites `&name;` references found in `Characters`/`Space`
//! text and attribute values across an event stream, under the
//! billion-laughs defenses mandated by the specification.
//!
//! Design decision (recorded in `DESIGN.md`): entity definitions are kept
//! in the map *unexpanded* - building a fully-expanded map up front would
//! itself be the unbounded recursive substitution the depth/size limits
//! exist to prevent (a `loln` chain in a billion-laughs DTD would already
//! have blown up before the first document reference is even scanned).
//! Expansion instead happens lazily, once, at the point a `&name;`
//! reference is actually encountered in document text, recursing into
//! the looked-up replacement with the same depth counter and a running
//! total shared across the whole document.

use std::borrow::Cow;
use std::collections::HashMap;

use xrs_chars::CharEdition;
use xrs_parser::{Attribute, ErrorKind, Event, Loc};

use crate::model::{DtdModel, EntityDef};

/// Security ceilings for general entity expansion. Defaults match the
/// specification: 10 levels of nesting, 1 MB of cumulative expanded
/// output across the whole document.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExpansionLimits {
    pub max_entity_depth: u32,
    pub max_total_expansion: usize,
}

impl Default for ExpansionLimits {
    fn default() -> Self {
        Self {
            max_entity_depth: 10,
            max_total_expansion: 1_000_000,
        }
    }
}

/// Caller-supplied callback resolving an external general entity's
/// content from its system/public identifiers. Its absence means
/// external entities are silently skipped, per the specified contract.
pub type ExternalEntityFn<'a> = dyn Fn(&str, Option<&str>) -> Result<Vec<u8>, String> + 'a;

const PREDEFINED: &[(&str, &str)] = &[("amp", "&"), ("lt", "<"), ("gt", ">"), ("apos", "'"), ("quot", "\"")];

/// Projects the model's internal general entities (and, if a resolver is
/// supplied, its external ones) into a `name -> raw replacement text`
/// map. The five predefined entities (`amp`, `lt`, `gt`, `apos`, `quot`)
/// are always present, since they are usable in any XML document
/// regardless of whether a DTD declares them.
pub fn build_entity_map(model: &DtdModel, resolve_external: Option<&ExternalEntityFn>) -> HashMap<String, String> {
    let mut map: HashMap<String, String> = PREDEFINED.iter().map(|&(k, v)| (k.to_string(), v.to_string())).collect();
    for (name, def) in &model.entities {
        match def {
            EntityDef::Internal(value) => {
                map.entry(name.clone()).or_insert_with(|| value.clone());
            }
            EntityDef::External(ext) => {
                if let Some(resolve) = resolve_external {
                    if let Ok(bytes) = resolve(&ext.system_id, ext.public_id.as_deref()) {
                        if let Ok(s) = String::from_utf8(bytes) {
                            map.entry(name.clone()).or_insert(s);
                        }
                    }
                }
            }
            EntityDef::Unparsed(..) => {
                // Unparsed entities are referenced only from attribute
                // values typed ENTITY/ENTITIES, never via `&name;` in
                // content; nothing to project here.
            }
        }
    }
    map
}

fn is_entity_name<E: CharEdition>(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if E::is_name_start_char(c) => {}
        _ => return false,
    }
    chars.all(E::is_name_char)
}

/// Rewrites every `Characters`, `Space`, and `StartElement` attribute
/// value in `events` in place, substituting known `&name;` references
/// and leaving everything else (including `&#...;` character references,
/// handled by a separate stage) untouched. Errors are inserted as
/// `Event::Error` immediately after the event whose content triggered
/// them, never raised.
pub fn resolve_entities<'a, E: CharEdition>(events: Vec<Event<'a>>, entity_map: &HashMap<String, String>, limits: ExpansionLimits) -> Vec<Event<'a>> {
    let mut total = 0usize;
    let mut out = Vec::with_capacity(events.len());
    for event in events {
        match event {
            Event::Characters { text, loc } => push_expanded_text::<E>(&mut out, text, loc, entity_map, limits, &mut total, Event::Characters),
            Event::Space { text, loc } => push_expanded_text::<E>(&mut out, text, loc, entity_map, limits, &mut total, Event::Space),
            Event::StartElement { name, attrs, loc } => {
                let mut new_attrs = Vec::with_capacity(attrs.len());
                let mut errors = Vec::new();
                for attr in attrs {
                    let (expanded, err) = expand_text::<E>(&attr.value, entity_map, limits, &mut total, 0);
                    new_attrs.push(Attribute::new(attr.name, Cow::Owned(expanded)));
                    if let Some(kind) = err {
                        errors.push(kind);
                    }
                }
                out.push(Event::StartElement { name, attrs: new_attrs, loc });
                out.extend(errors.into_iter().map(|kind| Event::error(kind, loc)));
            }
            other => out.push(other),
        }
    }
    out
}

fn push_expanded_text<'a, E: CharEdition>(
    out: &mut Vec<Event<'a>>,
    text: Cow<'a, str>,
    loc: Loc,
    entity_map: &HashMap<String, String>,
    limits: ExpansionLimits,
    total: &mut usize,
    make: impl Fn(Cow<'a, str>, Loc) -> Event<'a>,
) {
    let (expanded, err) = expand_text::<E>(&text, entity_map, limits, total, 0);
    out.push(make(Cow::Owned(expanded), loc));
    if let Some(kind) = err {
        out.push(Event::error(kind, loc));
    }
}

/// Expands `&name;` references in `text` against `entity_map`,
/// recursing into each looked-up replacement (so a replacement that
/// itself contains further references is fully resolved), bounded by
/// `limits.max_entity_depth` levels of nesting and
/// `limits.max_total_expansion` cumulative bytes across the whole
/// document (`*total`). `&#...;` character references are left
/// untouched - they are a separate resolution stage.
fn expand_text<E: CharEdition>(text: &str, entity_map: &HashMap<String, String>, limits: ExpansionLimits, total: &mut usize, depth: u32) -> (String, Option<ErrorKind>) {
    let mut out = String::with_capacity(text.len());
    let bytes = text.as_bytes();
    let mut i = 0;
    let mut err = None;
    while i < bytes.len() {
        if bytes[i] != b'&' {
            let ch = text[i..].chars().next().expect("i within a UTF-8 boundary");
            out.push(ch);
            i += ch.len_utf8();
            continue;
        }
        if bytes.get(i + 1) == Some(&b'#') {
            // Character reference: a separate stage's concern. Copy
            // through verbatim (including the terminating `;`, if one is
            // found - if not, this `&` is simply not a well-formed
            // reference of any kind and is copied as-is).
            match text[i..].find(';') {
                Some(rel) => {
                    out.push_str(&text[i..i + rel + 1]);
                    i += rel + 1;
                }
                None => {
                    out.push('&');
                    i += 1;
                }
            }
            continue;
        }
        let Some(semi_rel) = text[i + 1..].find(';') else {
            out.push('&');
            i += 1;
            continue;
        };
        let name = &text[i + 1..i + 1 + semi_rel];
        let ref_end = i + 1 + semi_rel + 1;
        if !is_entity_name::<E>(name) {
            out.push('&');
            i += 1;
            continue;
        }
        let Some(replacement) = entity_map.get(name) else {
            // Unknown entity: left intact, scanning continues past it.
            out.push_str(&text[i..ref_end]);
            if err.is_none() {
                err = Some(ErrorKind::UnknownEntity);
            }
            i = ref_end;
            continue;
        };
        if depth >= limits.max_entity_depth {
            out.push_str(&text[i..ref_end]);
            err = Some(ErrorKind::ExpansionDepthExceeded);
            i = ref_end;
            continue;
        }
        if *total + replacement.len() > limits.max_total_expansion {
            out.push_str(&text[i..ref_end]);
            err = Some(ErrorKind::ExpansionSizeExceeded);
            i = ref_end;
            continue;
        }
        *total += replacement.len();
        let (nested, nested_err) = expand_text::<E>(replacement, entity_map, limits, total, depth + 1);
        out.push_str(&nested);
        if nested_err.is_some() {
            err = nested_err;
        }
        i = ref_end;
    }
    (out, err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use xrs_chars::Edition5;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        let mut m: HashMap<String, String> = PREDEFINED.iter().map(|&(k, v)| (k.to_string(), v.to_string())).collect();
        for &(k, v) in pairs {
            m.insert(k.to_string(), v.to_string());
        }
        m
    }

    #[test]
    fn predefined_entities_always_available() {
        let m = map(&[]);
        let (out, err) = expand_text::<Edition5>("a &amp; b &lt; c", &m, ExpansionLimits::default(), &mut 0, 0);
        assert_eq!(out, "a & b < c");
        assert!(err.is_none());
    }

    #[test]
    fn nested_entity_expansion() {
        let m = map(&[("a", "X&b;Y"), ("b", "Z")]);
        let (out, err) = expand_text::<Edition5>("&a;", &m, ExpansionLimits::default(), &mut 0, 0);
        assert_eq!(out, "XZY");
        assert!(err.is_none());
    }

    #[test]
    fn unknown_entity_left_intact_and_scanning_continues() {
        let m = map(&[("known", "K")]);
        let (out, err) = expand_text::<Edition5>("&unknown; &known;", &m, ExpansionLimits::default(), &mut 0, 0);
        assert_eq!(out, "&unknown; K");
        assert_eq!(err, Some(ErrorKind::UnknownEntity));
    }

    #[test]
    fn character_references_are_left_untouched() {
        let m = map(&[]);
        let (out, err) = expand_text::<Edition5>("&#65;&#x42;", &m, ExpansionLimits::default(), &mut 0, 0);
        assert_eq!(out, "&#65;&#x42;");
        assert!(err.is_none());
    }

    #[test]
    fn depth_limit_stops_runaway_nesting() {
        let mut m = HashMap::new();
        for i in 0..20 {
            m.insert(format!("e{i}"), format!("&e{};&e{};", i + 1, i + 1));
        }
        m.insert("e20".to_string(), "x".to_string());
        let limits = ExpansionLimits {
            max_entity_depth: 5,
            max_total_expansion: 1_000_000,
        };
        let (_, err) = expand_text::<Edition5>("&e0;", &m, limits, &mut 0, 0);
        assert_eq!(err, Some(ErrorKind::ExpansionDepthExceeded));
    }

    #[test]
    fn size_limit_stops_billion_laughs() {
        let mut m = HashMap::new();
        m.insert("lol".to_string(), "lol".to_string());
        for i in 1..=9 {
            let prev = if i == 1 { "lol".to_string() } else { format!("lol{}", i - 1) };
            m.insert(format!("lol{i}"), format!("&{prev};&{prev};&{prev};&{prev};&{prev};&{prev};&{prev};&{prev};&{prev};&{prev};"));
        }
        let limits = ExpansionLimits {
            max_entity_depth: 20,
            max_total_expansion: 1_000,
        };
        let mut total = 0;
        let (out, err) = expand_text::<Edition5>("&lol9;", &m, limits, &mut total, 0);
        assert_eq!(err, Some(ErrorKind::ExpansionSizeExceeded));
        assert!(out.len() < 100_000, "expansion must be capped, got {} bytes", out.len());
    }

    #[test]
    fn resolve_entities_rewrites_characters_and_attributes() {
        let m = map(&[("who", "world")]);
        let events = vec![
            Event::StartElement {
                name: Cow::Borrowed("a"),
                attrs: vec![Attribute::new("greeting", Cow::Borrowed("hi &who;"))],
                loc: Loc::START,
            },
            Event::Characters {
                text: Cow::Borrowed("hello &who;"),
                loc: Loc::START,
            },
        ];
        let out = resolve_entities::<Edition5>(events, &m, ExpansionLimits::default());
        match &out[0] {
            Event::StartElement { attrs, .. } => assert_eq!(attrs[0].value, "hi world"),
            other => panic!("unexpected {other:?}"),
        }
        match &out[1] {
            Event::Characters { text, .. } => assert_eq!(text, "hello world"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
