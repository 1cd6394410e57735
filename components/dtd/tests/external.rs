//! External-subset resolution: PE merge precedence, PE-boundary
//! checking, and INCLUDE/IGNORE conditional-section processing, driven
//! through the public `parse_external_dtd` entry point.

use std::collections::HashMap;

use xrs_chars::Edition5;
use xrs_dtd::{parse_external_dtd, ContentModel, DtdErrorKind, DtdModel, DEFAULT_MAX_PE_ITERATIONS};

#[test]
fn include_section_declarations_are_kept() {
    let mut model = DtdModel::new();
    parse_external_dtd::<Edition5>(
        "<![INCLUDE[<!ELEMENT a EMPTY>]]>",
        &HashMap::new(),
        &mut model,
        DEFAULT_MAX_PE_ITERATIONS,
    )
    .unwrap();
    assert_eq!(model.elements["a"], ContentModel::Empty);
}

#[test]
fn ignore_section_declarations_are_dropped() {
    let mut model = DtdModel::new();
    parse_external_dtd::<Edition5>(
        "<![IGNORE[<!ELEMENT a EMPTY>]]><!ELEMENT b EMPTY>",
        &HashMap::new(),
        &mut model,
        DEFAULT_MAX_PE_ITERATIONS,
    )
    .unwrap();
    assert!(!model.elements.contains_key("a"));
    assert_eq!(model.elements["b"], ContentModel::Empty);
}

#[test]
fn internal_subset_pe_wins_over_external_subsets_own_definition() {
    let mut model = DtdModel::new();
    let mut internal_pe = HashMap::new();
    internal_pe.insert("content".to_string(), "(a)".to_string());
    parse_external_dtd::<Edition5>(
        r#"<!ENTITY % content "ANY"><!ELEMENT root %content;>"#,
        &internal_pe,
        &mut model,
        DEFAULT_MAX_PE_ITERATIONS,
    )
    .unwrap();
    match &model.elements["root"] {
        ContentModel::Children(_) => {}
        other => panic!("expected the internal subset's '(a)' to win, got {other:?}"),
    }
}

#[test]
fn pe_boundary_violation_is_rejected() {
    let mut model = DtdModel::new();
    let mut internal_pe = HashMap::new();
    internal_pe.insert("broken".to_string(), "<!-- unterminated".to_string());
    let err = parse_external_dtd::<Edition5>("%broken; <!ELEMENT a EMPTY>", &internal_pe, &mut model, DEFAULT_MAX_PE_ITERATIONS).unwrap_err();
    assert_eq!(err.kind, DtdErrorKind::PeBoundaryViolation);
}
