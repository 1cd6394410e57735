//! End-to-end DTD pipeline scenarios driven through the public
//! `parse_doctype_header` / `parse_internal_subset` entry points, as if
//! fed from a tokenizer's `Dtd` event content.

use xrs_chars::Edition5;
use xrs_dtd::{parse_doctype_header, parse_internal_subset, DtdModel, EntityDef, DEFAULT_MAX_PE_ITERATIONS};

fn parse(doctype_content: &str) -> DtdModel {
    let header = parse_doctype_header::<Edition5>(doctype_content).unwrap();
    let mut model = DtdModel::new();
    if let Some(subset) = header.internal_subset {
        parse_internal_subset::<Edition5>(subset, &mut model, DEFAULT_MAX_PE_ITERATIONS).unwrap();
    }
    model
}

#[test]
fn two_stage_percent_trick_yields_a_pe_defined_entity() {
    // `&#37;x;` expands (at PE-definition time, via character reference
    // expansion) to the literal text `%x;`, which is only then eligible
    // for a second-pass substitution by the PE processor - the two-step
    // trick used to smuggle a declaration through a PE value.
    let model = parse(r#"d [<!ENTITY % x "<!ENTITY tricky 'ok'>"><!ENTITY % y "&#37;x;">%y;]"#);
    assert_eq!(model.entities["tricky"], EntityDef::Internal("ok".to_string()));
}

#[test]
fn pe_declaration_order_does_not_affect_result() {
    let forward = parse(r#"d [<!ENTITY % a "1"><!ENTITY % b "%a;2">%b;<!ENTITY e "%b;">]"#);
    let backward = parse(r#"d [<!ENTITY % b "%a;2"><!ENTITY % a "1">%b;<!ENTITY e "%b;">]"#);
    assert_eq!(forward.entities["e"], backward.entities["e"]);
    assert_eq!(forward.entities["e"], EntityDef::Internal("12".to_string()));
}

#[test]
fn first_entity_declaration_wins() {
    let model = parse(r#"d [<!ENTITY a "1"><!ENTITY a "2">]"#);
    assert_eq!(model.entities["a"], EntityDef::Internal("1".to_string()));
}

#[test]
fn doctype_with_external_id_and_no_internal_subset() {
    let header = parse_doctype_header::<Edition5>(r#"book PUBLIC "-//example//book" "book.dtd""#).unwrap();
    assert_eq!(header.root_element, "book");
    assert!(header.internal_subset.is_none());
    let ext = header.external_id.unwrap();
    assert_eq!(ext.system_id, "book.dtd");
}
