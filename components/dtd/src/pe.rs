//! Parameter entity extraction, expansion, and position validation.

use std::collections::HashMap;

use xrs_chars::CharEdition;

use crate::charref::expand_char_refs;
use crate::error::{DtdError, DtdErrorKind};

pub const DEFAULT_MAX_PE_ITERATIONS: u32 = 100;

fn find_subslice(hay: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || hay.len() < needle.len() {
        return None;
    }
    hay.windows(needle.len()).position(|w| w == needle)
}

fn skip_ws(bytes: &[u8], mut p: usize) -> Option<usize> {
    while p < bytes.len() && bytes[p].is_ascii_whitespace() {
        p += 1;
    }
    if p >= bytes.len() {
        None
    } else {
        Some(p)
    }
}

fn is_pe_name_like<E: CharEdition>(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if E::is_name_start_char(c) => {}
        _ => return false,
    }
    chars.all(E::is_name_char)
}

/// Scan `dtd_text` for internal parameter entity declarations of the form
/// `<!ENTITY % name "value">` and return their values, with character
/// references already expanded (so `&#37;` can spell a literal `%`).
/// Declarations with an external identifier instead of a quoted value are
/// not internal-subset PE values and are skipped here.
pub fn extract_definitions(dtd_text: &str) -> HashMap<String, String> {
    let mut defs = HashMap::new();
    let bytes = dtd_text.as_bytes();
    let mut i = 0;
    while let Some(rel) = find_subslice(&bytes[i..], b"<!ENTITY") {
        let start = i + rel;
        match try_parse_internal_pe(dtd_text, start) {
            Some((name, value, end)) => {
                defs.entry(name).or_insert(value);
                i = end;
            }
            None => i = start + "<!ENTITY".len(),
        }
    }
    defs
}

fn try_parse_internal_pe(text: &str, start: usize) -> Option<(String, String, usize)> {
    let bytes = text.as_bytes();
    let mut p = start + "<!ENTITY".len();
    p = skip_ws(bytes, p)?;
    if bytes.get(p) != Some(&b'%') {
        return None;
    }
    p = skip_ws(bytes, p + 1)?;
    let name_start = p;
    while p < bytes.len() && !bytes[p].is_ascii_whitespace() {
        p += 1;
    }
    if p == name_start {
        return None;
    }
    let name = text[name_start..p].to_string();
    p = skip_ws(bytes, p)?;
    let quote = *bytes.get(p)?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }
    let value_start = p + 1;
    let end_quote = text[value_start..].find(quote as char)? + value_start;
    let raw_value = &text[value_start..end_quote];
    let value = expand_char_refs(raw_value).ok()?;
    let gt = text[end_quote + 1..].find('>')? + end_quote + 1;
    Some((name, value, gt + 1))
}

/// Iteratively substitute `%name;` references from `pe_map`. Unknown PEs
/// are left verbatim (they may be defined only in an external subset).
/// Returns `PeExpansionCycle` if `max_iterations` passes still produce
/// changes, which is how circular PE references are detected.
pub fn expand<E: CharEdition>(content: &str, pe_map: &HashMap<String, String>, max_iterations: u32) -> Result<String, DtdError> {
    let mut current = content.to_string();
    for _ in 0..max_iterations {
        let (next, changed) = expand_one_pass::<E>(&current, pe_map);
        if !changed {
            return Ok(next);
        }
        current = next;
    }
    Err(DtdError::new(DtdErrorKind::PeExpansionCycle, 0))
}

fn expand_one_pass<E: CharEdition>(content: &str, pe_map: &HashMap<String, String>) -> (String, bool) {
    let mut out = String::with_capacity(content.len());
    let mut changed = false;
    let mut i = 0;
    while i < content.len() {
        if content.as_bytes()[i] == b'%' {
            if let Some(semi_rel) = content[i + 1..].find(';') {
                let name = &content[i + 1..i + 1 + semi_rel];
                if is_pe_name_like::<E>(name) {
                    if let Some(value) = pe_map.get(name) {
                        out.push_str(value);
                        changed = true;
                        i = i + 1 + semi_rel + 1;
                        continue;
                    }
                }
            }
        }
        let ch = content[i..].chars().next().expect("i within a UTF-8 boundary");
        out.push(ch);
        i += ch.len_utf8();
    }
    (out, changed)
}

/// Rejects a `%name;` reference that appears in the *bare* markup of a
/// declaration in the internal subset - e.g. inside an `<!ELEMENT ...>`
/// content spec - while allowing one inside a quoted literal such as an
/// `<!ENTITY name "...">` value, where `EntityValue`'s own grammar
/// admits parameter-entity references. A reference between declarations,
/// at the top level, is always fine.
fn validate_pe_position<E: CharEdition>(text: &str) -> Result<(), DtdError> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if text[i..].starts_with("<!--") {
            match find_subslice(&bytes[i + 4..], b"-->") {
                Some(end) => {
                    i = i + 4 + end + 3;
                    continue;
                }
                None => break,
            }
        }
        if text[i..].starts_with("<!") {
            let mut j = i + 2;
            let mut in_quote: Option<u8> = None;
            loop {
                if j >= bytes.len() {
                    break;
                }
                if let Some(q) = in_quote {
                    if bytes[j] == q {
                        in_quote = None;
                    }
                    j += 1;
                    continue;
                }
                match bytes[j] {
                    b'"' | b'\'' => {
                        in_quote = Some(bytes[j]);
                        j += 1;
                    }
                    b'>' => {
                        j += 1;
                        break;
                    }
                    b'%' => {
                        if let Some(semi_rel) = text[j + 1..].find(';') {
                            let name = &text[j + 1..j + 1 + semi_rel];
                            if is_pe_name_like::<E>(name) {
                                return Err(DtdError::new(DtdErrorKind::PeInDeclInternal, j));
                            }
                        }
                        j += 1;
                    }
                    _ => j += 1,
                }
            }
            i = j;
            continue;
        }
        i += 1;
    }
    Ok(())
}

/// Orchestrates PE handling for one DTD content string: for the internal
/// subset, first verify no PE reference crosses a declaration boundary,
/// then expand all `%name;` references against `pe_map`.
pub fn process<E: CharEdition>(
    dtd_text: &str,
    pe_map: &HashMap<String, String>,
    external: bool,
    max_iterations: u32,
) -> Result<String, DtdError> {
    if !external {
        validate_pe_position::<E>(dtd_text)?;
    }
    expand::<E>(dtd_text, pe_map, max_iterations)
}
