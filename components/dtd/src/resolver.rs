//! External subset resolution (component 6): fetches external DTD
//! content, merges its parameter entities with the internal subset's,
//! checks the PE-boundary invariant, expands PE references, processes
//! `INCLUDE`/`IGNORE` conditional sections, and hands the result to the
//! declaration parser in external mode.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use xrs_chars::CharEdition;

use crate::error::{DtdError, DtdErrorKind};
use crate::model::DtdModel;
use crate::{declarations, pe};

#[derive(Debug, thiserror::Error)]
#[error("failed to read external entity at {path}: {source}")]
pub struct FetchError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Resolves `uri` to bytes. Supports `file://` absolute URIs, absolute
/// filesystem paths, and paths relative to the directory of `base_path`.
pub fn fetch(uri: &str, base_path: Option<&Path>) -> Result<Vec<u8>, FetchError> {
    let resolved = resolve_path(uri, base_path);
    fs::read(&resolved).map_err(|source| FetchError { path: resolved, source })
}

fn resolve_path(uri: &str, base_path: Option<&Path>) -> PathBuf {
    if let Some(rest) = uri.strip_prefix("file://") {
        return PathBuf::from(rest);
    }
    let path = Path::new(uri);
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match base_path.and_then(Path::parent) {
        Some(dir) => dir.join(path),
        None => path.to_path_buf(),
    }
}

/// Parses an external DTD subset's content into `model`, per the
/// six-step pipeline: extract this subset's own PE definitions, merge
/// with the caller's internal-subset PEs (which take precedence), check
/// the PE-boundary invariant, expand PE references, process conditional
/// sections, then parse declarations in external mode.
pub fn parse_external_dtd<E: CharEdition>(
    content: &str,
    internal_pe: &HashMap<String, String>,
    model: &mut DtdModel,
    max_pe_iterations: u32,
) -> Result<(), DtdError> {
    let mut merged = pe::extract_definitions(content);
    for (name, value) in internal_pe {
        merged.insert(name.clone(), value.clone());
    }
    for value in merged.values() {
        check_pe_boundary(value)?;
    }
    let expanded = pe::process::<E>(content, &merged, true, max_pe_iterations)?;
    let conditioned = process_conditional_sections(&expanded)?;
    declarations::parse_declarations::<E>(&conditioned, model, true)
}

/// Rejects a PE value whose expansion in place would split a comment or
/// a declaration's markup in two: an unterminated `<!--`, an unmatched
/// `-->`, or a `<!` with no matching top-level `>` within the value.
/// Unterminated quoted strings are flagged the same way, since a PE that
/// opens a quote it never closes would let a later `>` in the
/// surrounding document masquerade as the declaration's end.
fn check_pe_boundary(value: &str) -> Result<(), DtdError> {
    let bytes = value.as_bytes();
    let mut i = 0;
    let mut in_quote: Option<u8> = None;
    let mut unmatched_decl_open = false;
    while i < bytes.len() {
        if let Some(q) = in_quote {
            if bytes[i] == q {
                in_quote = None;
            }
            i += 1;
            continue;
        }
        if value[i..].starts_with("<!--") {
            match value[i + 4..].find("-->") {
                Some(rel) => i = i + 4 + rel + 3,
                None => return Err(DtdError::new(DtdErrorKind::PeBoundaryViolation, i)),
            }
            continue;
        }
        if value[i..].starts_with("-->") {
            return Err(DtdError::new(DtdErrorKind::PeBoundaryViolation, i));
        }
        match bytes[i] {
            b'"' | b'\'' => {
                in_quote = Some(bytes[i]);
                i += 1;
            }
            b'<' => {
                unmatched_decl_open = true;
                i += 1;
            }
            b'>' => {
                unmatched_decl_open = false;
                i += 1;
            }
            _ => i += 1,
        }
    }
    if in_quote.is_some() || unmatched_decl_open {
        return Err(DtdError::new(DtdErrorKind::PeBoundaryViolation, value.len()));
    }
    Ok(())
}

/// Walks `text` left to right, recognizing `<![INCLUDE[...]]>` and
/// `<![IGNORE[...]]>` conditional sections. `INCLUDE` contents are kept
/// (after being recursively processed, so a nested section inside an
/// `INCLUDE` is resolved too); `IGNORE` contents are dropped, tracking
/// nested `<![...]]>` pairs so an inner section's delimiters don't end
/// the outer skip early. A `<![` whose keyword position is itself a PE
/// reference (`<![%cond;[...`) cannot be resolved without a further PE
/// pass that this function does not perform; per the documented
/// limitation, processing stops there and everything collected so far
/// is returned rather than treated as an error.
fn process_conditional_sections(text: &str) -> Result<String, DtdError> {
    let (out, _) = process_conditional_inner(text, 0);
    Ok(out)
}

fn process_conditional_inner(text: &str, start: usize) -> (String, usize) {
    let bytes = text.as_bytes();
    let mut out = String::new();
    let mut i = start;
    while i < bytes.len() {
        if text[i..].starts_with("]]>") {
            return (out, i + 3);
        }
        if text[i..].starts_with("<![") {
            let kw_start = skip_ws(bytes, i + 3);
            if bytes.get(kw_start) == Some(&b'%') {
                // Undecidable without re-expanding PEs: halt here.
                return (out, text.len());
            }
            if text[kw_start..].starts_with("INCLUDE") {
                let bracket = skip_ws(bytes, kw_start + "INCLUDE".len());
                if bytes.get(bracket) == Some(&b'[') {
                    let (inner, after) = process_conditional_inner(text, bracket + 1);
                    out.push_str(&inner);
                    i = after;
                    continue;
                }
            } else if text[kw_start..].starts_with("IGNORE") {
                let bracket = skip_ws(bytes, kw_start + "IGNORE".len());
                if bytes.get(bracket) == Some(&b'[') {
                    i = skip_ignored(text, bracket + 1);
                    continue;
                }
            }
        }
        let ch = text[i..].chars().next().expect("i within a UTF-8 boundary");
        out.push(ch);
        i += ch.len_utf8();
    }
    (out, i)
}

/// Skips an `IGNORE` section's content starting just after its opening
/// `[`, tracking nested `<![...]]>` depth so an inner section's own
/// delimiters don't end the outer skip early. Returns the byte offset
/// just past the matching `]]>`.
fn skip_ignored(text: &str, start: usize) -> usize {
    let mut depth = 1usize;
    let mut i = start;
    let bytes = text.as_bytes();
    while i < bytes.len() {
        if text[i..].starts_with("<![") {
            depth += 1;
            i += 3;
            continue;
        }
        if text[i..].starts_with("]]>") {
            depth -= 1;
            i += 3;
            if depth == 0 {
                return i;
            }
            continue;
        }
        i += 1;
    }
    i
}

fn skip_ws(bytes: &[u8], mut p: usize) -> usize {
    while p < bytes.len() && bytes[p].is_ascii_whitespace() {
        p += 1;
    }
    p
}

#[cfg(test)]
mod tests {
    use super::*;
    use xrs_chars::Edition5;

    #[test]
    fn include_section_keeps_its_content() {
        let out = process_conditional_sections("a<![INCLUDE[<!ELEMENT x EMPTY>]]>b").unwrap();
        assert_eq!(out, "a<!ELEMENT x EMPTY>b");
    }

    #[test]
    fn ignore_section_drops_its_content() {
        let out = process_conditional_sections("a<![IGNORE[<!ELEMENT x EMPTY>]]>b").unwrap();
        assert_eq!(out, "ab");
    }

    #[test]
    fn nested_ignore_tracks_depth() {
        let out = process_conditional_sections("<![IGNORE[<![IGNORE[inner]]>still ignored]]>kept").unwrap();
        assert_eq!(out, "kept");
    }

    #[test]
    fn nested_include_inside_include_is_recursively_processed() {
        let out = process_conditional_sections("<![INCLUDE[a<![INCLUDE[b]]>c]]>").unwrap();
        assert_eq!(out, "abc");
    }

    #[test]
    fn pe_keyword_halts_and_returns_partial_output() {
        let out = process_conditional_sections("kept<![%cond;[<!ELEMENT x EMPTY>]]>never reached").unwrap();
        assert_eq!(out, "kept");
    }

    #[test]
    fn pe_boundary_rejects_unterminated_comment() {
        assert!(check_pe_boundary("<!-- oops").is_err());
    }

    #[test]
    fn pe_boundary_rejects_unterminated_declaration() {
        assert!(check_pe_boundary("<!ELEMENT a EMPTY").is_err());
    }

    #[test]
    fn pe_boundary_accepts_self_contained_declaration() {
        assert!(check_pe_boundary("<!ELEMENT a EMPTY>").is_ok());
    }

    #[test]
    fn internal_subset_pe_takes_precedence_over_external() {
        let mut model = DtdModel::new();
        let mut internal = HashMap::new();
        internal.insert("x".to_string(), "from-internal".to_string());
        parse_external_dtd::<Edition5>("<!ENTITY % x \"from-external\"><!ENTITY e \"%x;\">", &internal, &mut model, 100).unwrap();
        assert_eq!(model.entities["e"], crate::model::EntityDef::Internal("from-internal".to_string()));
    }
}
