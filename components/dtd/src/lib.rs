//! DTD subsystem: parameter-entity expansion, DTD declaration parsing,
//! external subset resolution, and general-entity resolution against a
//! document event stream.
//!
//! Driven by a single `Dtd` event's content (see `xrs_parser::Event`):
//! `parse_doctype_header` splits it into the root element name, an
//! optional external identifier, and the internal subset's raw text;
//! `parse_internal_subset` (and, for an external subset,
//! `resolver::parse_external_dtd`) then run the PE processor and
//! declaration parser over that text to build a [`DtdModel`].

mod charref;
mod content_model;
mod declarations;
pub mod entity_resolve;
mod error;
mod model;
mod pe;
pub mod resolver;
mod wellformed;

pub use entity_resolve::{build_entity_map, resolve_entities, ExpansionLimits, ExternalEntityFn};
pub use error::{DtdError, DtdErrorKind, DtdResult};
pub use model::{
    AttDefault, AttType, AttValueType, AttributeDef, ContentModel, ContentParticle, DtdModel, EntityDef,
    EnumeratedType, ExternalId, NotationDef, Occurrence, ParamEntityDef,
};
pub use pe::DEFAULT_MAX_PE_ITERATIONS;
pub use resolver::{fetch, parse_external_dtd, FetchError};

use xrs_chars::CharEdition;

/// The parsed header of a `<!DOCTYPE ...>` construct: the document's
/// declared root element name, an optional external identifier for the
/// external subset, and the raw internal-subset text (the portion
/// between `[` and `]`, exclusive), if present.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DoctypeHeader<'a> {
    pub root_element: &'a str,
    pub external_id: Option<ExternalId>,
    pub internal_subset: Option<&'a str>,
}

/// Splits a `Dtd` event's content (everything between `<!DOCTYPE` and
/// the matching outer `>`, exclusive of both) into its three parts.
/// `E` selects the active edition's name rules (see `xrs_chars::CharEdition`),
/// matching the edition the document's own `Tokenizer<E>` was configured
/// with.
pub fn parse_doctype_header<E: CharEdition>(content: &str) -> DtdResult<DoctypeHeader<'_>> {
    // The raw `Dtd` event content captured by the tokenizer always starts
    // with the mandatory whitespace after `<!DOCTYPE`, but callers (and
    // this module's own tests) may hand in the root name directly; be
    // lenient about a leading run of whitespace rather than requiring it.
    let p = skip_ws(content, 0);
    let (root_element, after_name) = read_name::<E>(content, p)?;
    let mut p = skip_ws(content, after_name);

    let external_id = if content[p..].starts_with("SYSTEM") || content[p..].starts_with("PUBLIC") {
        let (id, after_id) = parse_external_id(content, p)?;
        p = skip_ws(content, after_id);
        Some(id)
    } else {
        None
    };

    let internal_subset = if content.as_bytes().get(p) == Some(&b'[') {
        let close = find_matching_bracket(content, p)?;
        let subset = &content[p + 1..close];
        Some(subset)
    } else {
        None
    };

    Ok(DoctypeHeader {
        root_element,
        external_id,
        internal_subset,
    })
}

/// Runs the PE processor then the declaration parser over an internal
/// subset's raw text (as split out by [`parse_doctype_header`]),
/// accumulating into `model`. `max_pe_iterations` bounds PE cycle
/// detection (see `pe::expand`); pass [`DEFAULT_MAX_PE_ITERATIONS`] for
/// the specified default of 100.
pub fn parse_internal_subset<E: CharEdition>(text: &str, model: &mut DtdModel, max_pe_iterations: u32) -> DtdResult<()> {
    let pe_defs = pe::extract_definitions(text);
    for (name, value) in &pe_defs {
        model.declare_param_entity(name.clone(), ParamEntityDef::Internal(value.clone()));
    }
    let expanded = pe::process::<E>(text, &model.internal_param_entity_values(), false, max_pe_iterations)?;
    declarations::parse_declarations::<E>(&expanded, model, false)
}

fn skip_ws(text: &str, mut p: usize) -> usize {
    let bytes = text.as_bytes();
    while p < bytes.len() && bytes[p].is_ascii_whitespace() {
        p += 1;
    }
    p
}

fn expect_ws(text: &str, p: usize) -> DtdResult<usize> {
    let after = skip_ws(text, p);
    if after == p {
        return Err(DtdError::new(DtdErrorKind::Expected("whitespace"), p));
    }
    Ok(after)
}

fn read_name<E: CharEdition>(text: &str, start: usize) -> DtdResult<(&str, usize)> {
    let rest = &text[start..];
    let mut chars = rest.char_indices();
    match chars.next() {
        Some((_, c)) if E::is_name_start_char(c) => {}
        _ => return Err(DtdError::new(DtdErrorKind::NameInvalid, start)),
    }
    let mut end = rest.len();
    for (i, c) in chars {
        if !E::is_name_char(c) {
            end = i;
            break;
        }
    }
    Ok((&rest[..end], start + end))
}

fn read_quoted(text: &str, p: usize) -> DtdResult<(&str, usize)> {
    let bytes = text.as_bytes();
    let quote = match bytes.get(p) {
        Some(q @ (b'"' | b'\'')) => *q,
        _ => return Err(DtdError::new(DtdErrorKind::Expected("quote"), p)),
    };
    let value_start = p + 1;
    match text[value_start..].find(quote as char) {
        Some(rel) => Ok((&text[value_start..value_start + rel], value_start + rel + 1)),
        None => Err(DtdError::new(DtdErrorKind::UnexpectedEof, p)),
    }
}

fn parse_external_id(text: &str, p: usize) -> DtdResult<(ExternalId, usize)> {
    if text[p..].starts_with("SYSTEM") {
        let after = expect_ws(text, p + "SYSTEM".len())?;
        let (system_id, end) = read_quoted(text, after)?;
        return Ok((
            ExternalId {
                public_id: None,
                system_id: system_id.to_string(),
            },
            end,
        ));
    }
    let after = expect_ws(text, p + "PUBLIC".len())?;
    let (pubid, after_pub) = read_quoted(text, after)?;
    for (i, c) in pubid.char_indices() {
        if !xrs_chars::is_pubid_char(c) {
            return Err(DtdError::new(DtdErrorKind::PubidInvalidChar, after + 1 + i));
        }
    }
    let after_ws = expect_ws(text, after_pub)?;
    let (system_id, end) = read_quoted(text, after_ws)?;
    Ok((
        ExternalId {
            public_id: Some(pubid.to_string()),
            system_id: system_id.to_string(),
        },
        end,
    ))
}

/// Finds the `]` matching the `[` at `open`, tracking quoted strings so
/// an embedded `]` inside a declaration's literal value doesn't close
/// the subset early.
fn find_matching_bracket(text: &str, open: usize) -> DtdResult<usize> {
    let bytes = text.as_bytes();
    let mut i = open + 1;
    let mut in_quote: Option<u8> = None;
    while i < bytes.len() {
        if let Some(q) = in_quote {
            if bytes[i] == q {
                in_quote = None;
            }
            i += 1;
            continue;
        }
        match bytes[i] {
            b'"' | b'\'' => {
                in_quote = Some(bytes[i]);
                i += 1;
            }
            b']' => return Ok(i),
            _ => i += 1,
        }
    }
    Err(DtdError::new(DtdErrorKind::UnexpectedEof, open))
}
