//! Top-level DTD grammar: scans declaration-sized chunks out of a DTD
//! content string (already PE-expanded, per the caller's subset rules)
//! and dispatches each to its declaration parser, accumulating results
//! into a [`DtdModel`] under the first-declaration-wins policy.

use xrs_chars::CharEdition;

use crate::content_model::parse_content_spec;
use crate::error::{DtdError, DtdErrorKind};
use crate::model::{
    AttDefault, AttType, AttValueType, AttributeDef, DtdModel, EntityDef, EnumeratedType, ExternalId, NotationDef,
    ParamEntityDef,
};
use crate::wellformed::{check_bare_refs, check_no_reserved_pi, check_well_formed_content};

type Res<T> = Result<T, DtdError>;

/// Parses every declaration in `text` into `model`. `external` selects the
/// stricter external-subset rules (e.g. a bare `%` is never allowed in an
/// entity value, since the internal-subset two-stage `&#37;` trick does
/// not apply there).
pub fn parse_declarations<E: CharEdition>(text: &str, model: &mut DtdModel, external: bool) -> Res<()> {
    let mut i = 0;
    let bytes = text.as_bytes();
    while i < bytes.len() {
        if bytes[i].is_ascii_whitespace() {
            i += 1;
            continue;
        }
        if text[i..].starts_with("<!--") {
            i = skip_comment(text, i)?;
            continue;
        }
        if text[i..].starts_with("<?") {
            i = skip_pi(text, i)?;
            continue;
        }
        if text[i..].starts_with("<![") {
            return Err(DtdError::new(DtdErrorKind::ConditionalInInternal, i));
        }
        if text[i..].starts_with("<!ELEMENT") {
            i = parse_element_decl::<E>(text, i, model)?;
            continue;
        }
        if text[i..].starts_with("<!ATTLIST") {
            i = parse_attlist_decl::<E>(text, i, model)?;
            continue;
        }
        if text[i..].starts_with("<!ENTITY") {
            i = parse_entity_decl::<E>(text, i, model, external)?;
            continue;
        }
        if text[i..].starts_with("<!NOTATION") {
            i = parse_notation_decl::<E>(text, i, model)?;
            continue;
        }
        if bytes[i] == b'&' {
            return Err(DtdError::new(DtdErrorKind::Malformed("bare general entity reference in DTD space"), i));
        }
        if bytes[i] == b'<' && i == 0 && text[i..].starts_with("<?xml") {
            return Err(DtdError::new(DtdErrorKind::Malformed("XML declaration not at document start"), i));
        }
        return Err(DtdError::new(DtdErrorKind::Malformed("unrecognized markup"), i));
    }
    Ok(())
}

fn skip_comment(text: &str, start: usize) -> Res<usize> {
    match text[start + 4..].find("-->") {
        Some(rel) => Ok(start + 4 + rel + 3),
        None => Err(DtdError::new(DtdErrorKind::UnexpectedEof, start)),
    }
}

fn skip_pi(text: &str, start: usize) -> Res<usize> {
    match text[start + 2..].find("?>") {
        Some(rel) => Ok(start + 2 + rel + 2),
        None => Err(DtdError::new(DtdErrorKind::UnexpectedEof, start)),
    }
}

fn skip_ws(text: &str, mut p: usize) -> usize {
    let bytes = text.as_bytes();
    while p < bytes.len() && bytes[p].is_ascii_whitespace() {
        p += 1;
    }
    p
}

fn expect_ws(text: &str, p: usize) -> Res<usize> {
    let after = skip_ws(text, p);
    if after == p {
        return Err(DtdError::new(DtdErrorKind::Expected("whitespace"), p));
    }
    Ok(after)
}

fn read_name<E: CharEdition>(text: &str, start: usize) -> Res<(&str, usize)> {
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

/// Finds the closing `>` of a declaration starting at `start` (pointing
/// at the leading `<`), tracking quoted-string state so an embedded `>`
/// does not end the declaration early.
fn find_decl_end(text: &str, start: usize) -> Res<usize> {
    let bytes = text.as_bytes();
    let mut i = start;
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
            b'>' => return Ok(i),
            _ => i += 1,
        }
    }
    Err(DtdError::new(DtdErrorKind::UnexpectedEof, start))
}

fn read_quoted(text: &str, p: usize) -> Res<(&str, usize)> {
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

// --- <!ELEMENT ... > ------------------------------------------------------

fn parse_element_decl<E: CharEdition>(text: &str, start: usize, model: &mut DtdModel) -> Res<usize> {
    let end = find_decl_end(text, start)?;
    let body = &text[start + "<!ELEMENT".len()..end];
    let p = expect_ws(body, 0)?;
    if body[p..].starts_with('(') {
        // SGML-style `<!ELEMENT (a|b) ...>` inclusion/exclusion lists are
        // not XML: an element-type name must be a single Name.
        return Err(DtdError::new(
            DtdErrorKind::Malformed("parenthesized element-type list is not allowed"),
            start + "<!ELEMENT".len() + p,
        ));
    }
    let (name, after_name) = read_name::<E>(body, p)?;
    let p2 = expect_ws(body, after_name)?;
    let rest = body[p2..].trim_end();
    if rest.starts_with('+') || rest.starts_with('-') {
        return Err(DtdError::new(
            DtdErrorKind::Malformed("SGML inclusion/exclusion is not allowed"),
            start,
        ));
    }
    if rest == "CDATA" || rest == "RCDATA" {
        return Err(DtdError::new(DtdErrorKind::Malformed("SGML CDATA/RCDATA content is not allowed"), start));
    }
    let model_spec = parse_content_spec::<E>(rest, start + "<!ELEMENT".len() + p2)?;
    model.declare_element(name.to_string(), model_spec);
    Ok(end + 1)
}

// --- <!ATTLIST ... > -------------------------------------------------------

fn parse_attlist_decl<E: CharEdition>(text: &str, start: usize, model: &mut DtdModel) -> Res<usize> {
    let end = find_decl_end(text, start)?;
    let body = &text[start + "<!ATTLIST".len()..end];
    let p = expect_ws(body, 0)?;
    let (elem_name, mut p) = read_name::<E>(body, p)?;
    let elem_name = elem_name.to_string();
    loop {
        let before = p;
        p = skip_ws(body, p);
        if p >= body.len() {
            break;
        }
        if p == before {
            return Err(DtdError::new(DtdErrorKind::Expected("whitespace before attribute"), start + p));
        }
        let (attr_name, after_name) = read_name::<E>(body, p)?;
        let p2 = expect_ws(body, after_name)?;
        let (att_type, p3) = parse_att_type(body, p2)?;
        let p4 = expect_ws(body, p3)?;
        let (default, p5) = parse_att_default(body, p4)?;
        model.declare_attribute(
            &elem_name,
            AttributeDef {
                name: attr_name.to_string(),
                att_type,
                default,
            },
        );
        p = p5;
    }
    Ok(end + 1)
}

fn parse_att_type(body: &str, p: usize) -> Res<(AttValueType, usize)> {
    if body[p..].starts_with('(') {
        let (values, end) = parse_enum_list(body, p)?;
        return Ok((AttValueType::Enumerated(EnumeratedType::Enumeration(values)), end));
    }
    for (kw, ty) in [
        ("CDATA", AttType::CData),
        ("IDREFS", AttType::IdRefs),
        ("IDREF", AttType::IdRef),
        ("ID", AttType::Id),
        ("ENTITIES", AttType::Entities),
        ("ENTITY", AttType::Entity),
        ("NMTOKENS", AttType::NmTokens),
        ("NMTOKEN", AttType::NmToken),
    ] {
        if body[p..].starts_with(kw) {
            let after = p + kw.len();
            if body.as_bytes().get(after).map(|b| b.is_ascii_whitespace()) != Some(true) {
                return Err(DtdError::new(DtdErrorKind::Expected("whitespace after attribute type keyword"), after));
            }
            return Ok((AttValueType::Plain(ty), after));
        }
    }
    if body[p..].starts_with("NOTATION") {
        let after = p + "NOTATION".len();
        let after = expect_ws(body, after)?;
        if body.as_bytes().get(after) == Some(&b'(') {
            let (values, end) = parse_enum_list(body, after)?;
            return Ok((AttValueType::Enumerated(EnumeratedType::Notation(values)), end));
        }
        return Err(DtdError::new(DtdErrorKind::Expected("'(' after NOTATION"), after));
    }
    if body[p..].starts_with("#ALL") {
        return Err(DtdError::new(DtdErrorKind::Malformed("#ALL is not a valid attribute type"), p));
    }
    Err(DtdError::new(DtdErrorKind::Expected("attribute type"), p))
}

/// Parses `(v1|v2|...)`, rejecting quoted tokens, comma separators, an
/// empty list, and a parenthesized single element name masquerading as a
/// NOTATION enumeration member.
fn parse_enum_list(body: &str, start: usize) -> Res<(Vec<String>, usize)> {
    let bytes = body.as_bytes();
    let mut p = start + 1;
    let mut values = Vec::new();
    loop {
        p = skip_ws(body, p);
        match bytes.get(p) {
            Some(b'"') | Some(b'\'') => {
                return Err(DtdError::new(DtdErrorKind::Malformed("quoted value in enumeration"), p));
            }
            Some(b')') => {
                if values.is_empty() {
                    return Err(DtdError::new(DtdErrorKind::Malformed("empty enumeration"), start));
                }
                return Ok((values, p + 1));
            }
            _ => {}
        }
        let tok_start = p;
        while p < bytes.len() && !matches!(bytes[p], b'|' | b')') && !bytes[p].is_ascii_whitespace() {
            p += 1;
        }
        if p == tok_start {
            return Err(DtdError::new(DtdErrorKind::Expected("enumeration member"), p));
        }
        values.push(body[tok_start..p].to_string());
        p = skip_ws(body, p);
        match bytes.get(p) {
            Some(b'|') => p += 1,
            Some(b')') => continue,
            Some(b',') => return Err(DtdError::new(DtdErrorKind::Malformed("',' is not a valid enumeration separator"), p)),
            _ => return Err(DtdError::new(DtdErrorKind::Expected("'|' or ')'"), p)),
        }
    }
}

fn parse_att_default(body: &str, p: usize) -> Res<(AttDefault, usize)> {
    if body[p..].starts_with("#REQUIRED") {
        return Ok((AttDefault::Required, p + "#REQUIRED".len()));
    }
    if body[p..].starts_with("#IMPLIED") {
        return Ok((AttDefault::Implied, p + "#IMPLIED".len()));
    }
    if body[p..].starts_with("#FIXED") {
        let after = expect_ws(body, p + "#FIXED".len())?;
        let (value, end) = read_quoted(body, after)?;
        return Ok((AttDefault::Fixed(value.to_string()), end));
    }
    let (value, end) = read_quoted(body, p)?;
    Ok((AttDefault::Default(value.to_string()), end))
}

// --- <!ENTITY ... > --------------------------------------------------------

fn parse_entity_decl<E: CharEdition>(text: &str, start: usize, model: &mut DtdModel, external: bool) -> Res<usize> {
    let end = find_decl_end(text, start)?;
    let body_start = start + "<!ENTITY".len();
    let body = &text[body_start..end];
    let offset_base = body_start;
    let p = expect_ws(body, 0)?;
    let is_pe = body.as_bytes().get(p) == Some(&b'%');
    let p = if is_pe { expect_ws(body, p + 1)? } else { p };
    let (name, after_name) = read_name::<E>(body, p)?;
    let name = name.to_string();
    let p2 = expect_ws(body, after_name)?;

    if body[p2..].starts_with("SYSTEM") || body[p2..].starts_with("PUBLIC") {
        let (ext_id, after_id) = parse_external_id(body, p2)?;
        if is_pe {
            // External PEs are not expanded by this subsystem's internal
            // PE processor; the model records the reference so the
            // external resolver can fetch and merge it later.
            model.declare_param_entity(name, ParamEntityDef::External(ext_id));
            return Ok(end + 1);
        }
        let after_ws = skip_ws(body, after_id);
        if body[after_ws..].starts_with("NDATA") {
            let p3 = expect_ws(body, after_ws + "NDATA".len())?;
            let (notation, _) = read_name::<E>(body, p3)?;
            model.declare_entity(name, EntityDef::Unparsed(ext_id, notation.to_string()));
        } else {
            model.declare_entity(name, EntityDef::External(ext_id));
        }
        return Ok(end + 1);
    }

    let (raw_value, _) = read_quoted(body, p2)?;
    let value_offset = offset_base + p2 + 1;
    // External mode applies stricter rules: the internal subset's
    // two-stage `&#37;` -> `%` trick (see the PE processor) does not
    // apply once a PE value has already been PE-expanded in place, so a
    // bare `%` is never tolerated there either.
    check_bare_refs::<E>(raw_value, is_pe && !external, value_offset)?;
    let expanded = crate::charref::expand_char_refs(raw_value)?;
    if !is_pe {
        check_well_formed_content(&expanded, value_offset)?;
        check_no_reserved_pi(&expanded, value_offset)?;
    }
    if is_pe {
        model.declare_param_entity(name, ParamEntityDef::Internal(expanded));
    } else {
        model.declare_entity(name, EntityDef::Internal(expanded));
    }
    Ok(end + 1)
}

fn parse_external_id(body: &str, p: usize) -> Res<(ExternalId, usize)> {
    if body[p..].starts_with("SYSTEM") {
        let after = expect_ws(body, p + "SYSTEM".len())?;
        let (system_id, end) = read_quoted(body, after)?;
        return Ok((
            ExternalId {
                public_id: None,
                system_id: system_id.to_string(),
            },
            end,
        ));
    }
    if body[p..].starts_with("PUBLIC") {
        let after = expect_ws(body, p + "PUBLIC".len())?;
        let (pubid, after_pub) = read_quoted(body, after)?;
        validate_pubid(pubid, after + 1)?;
        let after_ws = expect_ws(body, after_pub)?;
        let (system_id, end) = read_quoted(body, after_ws)?;
        return Ok((
            ExternalId {
                public_id: Some(pubid.to_string()),
                system_id: system_id.to_string(),
            },
            end,
        ));
    }
    Err(DtdError::new(DtdErrorKind::Expected("SYSTEM or PUBLIC"), p))
}

fn validate_pubid(pubid: &str, base_offset: usize) -> Res<()> {
    for (i, c) in pubid.char_indices() {
        if !xrs_chars::is_pubid_char(c) {
            return Err(DtdError::new(DtdErrorKind::PubidInvalidChar, base_offset + i));
        }
    }
    Ok(())
}

// --- <!NOTATION ... > -------------------------------------------------------

fn parse_notation_decl<E: CharEdition>(text: &str, start: usize, model: &mut DtdModel) -> Res<usize> {
    let end = find_decl_end(text, start)?;
    let body_start = start + "<!NOTATION".len();
    let body = &text[body_start..end];
    let p = expect_ws(body, 0)?;
    let (name, after_name) = read_name::<E>(body, p)?;
    let name = name.to_string();
    let p2 = expect_ws(body, after_name)?;
    if body[p2..].starts_with("SYSTEM") {
        let after = expect_ws(body, p2 + "SYSTEM".len())?;
        let (system_id, _) = read_quoted(body, after)?;
        model.declare_notation(
            name,
            NotationDef {
                public_id: None,
                system_id: Some(system_id.to_string()),
            },
        );
        return Ok(end + 1);
    }
    if body[p2..].starts_with("PUBLIC") {
        let after = expect_ws(body, p2 + "PUBLIC".len())?;
        let (pubid, after_pub) = read_quoted(body, after)?;
        validate_pubid(pubid, after + 1)?;
        let rest = skip_ws(body, after_pub);
        if rest < body.len() && matches!(body.as_bytes()[rest], b'"' | b'\'') {
            let (system_id, _) = read_quoted(body, rest)?;
            model.declare_notation(
                name,
                NotationDef {
                    public_id: Some(pubid.to_string()),
                    system_id: Some(system_id.to_string()),
                },
            );
        } else {
            model.declare_notation(
                name,
                NotationDef {
                    public_id: Some(pubid.to_string()),
                    system_id: None,
                },
            );
        }
        return Ok(end + 1);
    }
    Err(DtdError::new(DtdErrorKind::Expected("SYSTEM or PUBLIC"), body_start + p2))
}
