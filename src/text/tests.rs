use crate::codeplug::Codeplug;
use crate::error::{Error, Position};
use crate::tests::{
    channel, contact, empty_codeplug, ft, populated_codeplug, record_tree, rt, zone,
};
use crate::text::quote_string;
use crate::value::FieldValue;

fn export_string(cp: &Codeplug) -> String {
    let mut out = Vec::new();
    cp.write_records(&mut out).expect("write");
    String::from_utf8(out).expect("utf8")
}

// ─── Export ─────────────────────────────────────────────────────────────────

#[test]
fn export_emits_the_multi_line_form() {
    let cp = populated_codeplug();
    let text = export_string(&cp);
    assert_eq!(
        text,
        "ChannelInformation[1]:\n\
         \tName: Alpha\n\
         \tRxFrequency: 145.5\n\
         \tTxFrequency: 145.5\n\
         \tContactName: Dispatch\n\
         \tPower: 1\n\
         \n\
         ChannelInformation[2]:\n\
         \tName: Bravo\n\
         \tRxFrequency: 146\n\
         \tTxFrequency: 146\n\
         \tContactName: Dispatch\n\
         \tPower: 1\n\
         \n\
         Contacts[1]:\n\
         \tName: Dispatch\n\
         \tCallID: 100\n\
         \n\
         ZoneInformation[1]:\n\
         \tName: Main\n\
         \tChannelMember[1]: Alpha\n\
         \tChannelMember[2]: Bravo\n"
    );
}

#[test]
fn single_line_form_packs_one_record_per_line() {
    let cp = populated_codeplug();
    let r = cp.record(&rt("Contacts")).expect("contact").clone();
    let mut out = Vec::new();
    cp.write_record_line(&mut out, &r).expect("write");
    assert_eq!(
        String::from_utf8(out).expect("utf8"),
        "Contacts[1]: Name:Dispatch CallID:100\n"
    );
}

#[test]
fn quoting_applies_to_whitespace_and_empty_values() {
    assert_eq!(quote_string("Alpha"), "Alpha");
    assert_eq!(quote_string("Foo Bar"), "\"Foo Bar\"");
    assert_eq!(quote_string(""), "\"\"");
    assert_eq!(quote_string("a\tb"), "\"a\\tb\"");
    assert_eq!(quote_string("say \"hi\""), "\"say \\\"hi\\\"\"");
}

// ─── Import ─────────────────────────────────────────────────────────────────

#[test]
fn import_of_exported_text_reproduces_the_records() {
    let cp = populated_codeplug();
    let text = export_string(&cp);

    let mut cp2 = populated_codeplug();
    cp2.import_str(&text).expect("import");
    assert_eq!(record_tree(&cp), record_tree(&cp2));
    assert!(!cp2.can_undo());
}

#[test]
fn quoted_names_survive_the_round_trip() {
    let mut cp = empty_codeplug();
    let c = contact(&cp, "Big Dispatch", 100);
    cp.insert_record(c).expect("insert");
    let ch = channel(&cp, "Foo Bar", 145.5, 1);
    cp.insert_record(ch).expect("insert");
    let z = zone(&cp, "Main", &[1]);
    cp.insert_record(z).expect("insert");

    let text = export_string(&cp);
    assert!(text.contains("\tName: \"Foo Bar\"\n"));
    assert!(text.contains("\tContactName: \"Big Dispatch\"\n"));

    let mut cp2 = populated_codeplug();
    cp2.import_str(&text).expect("import");
    assert_eq!(record_tree(&cp), record_tree(&cp2));
}

#[test]
fn field_bracket_index_selects_the_instance() {
    let mut cp = populated_codeplug();
    let text = "ChannelInformation[1]:\n\tName: Alpha\n\
                \n\
                Contacts[1]:\n\tName: Dispatch\n\tCallID: 100\n\
                \n\
                ZoneInformation[1]:\n\tName: Main\n\tChannelMember[2]: Alpha\n";
    cp.import_str(text).expect("import");

    let members = cp.records(&rt("ZoneInformation"))[0].fields(&ft("ChannelMember"));
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].index, 1);
    assert_eq!(members[0].value, FieldValue::Ref(1));

    // The sparse instance keeps its slot through export and re-import.
    let text = export_string(&cp);
    assert!(text.contains("\tChannelMember[2]: Alpha\n"));
    let mut cp2 = populated_codeplug();
    cp2.import_str(&text).expect("import");
    assert_eq!(record_tree(&cp), record_tree(&cp2));
}

#[test]
fn duplicate_field_instance_is_rejected() {
    let mut cp = populated_codeplug();
    let before = record_tree(&cp);
    let err = cp
        .import_str(
            "ZoneInformation[1]:\n\tName: Main\n\tChannelMember[1]: A\n\tChannelMember[1]: B\n",
        )
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "line 4 column 9: duplicate ChannelMember field"
    );
    assert_eq!(record_tree(&cp), before);
}

#[test]
fn field_index_beyond_the_layout_max_is_rejected() {
    let mut cp = populated_codeplug();
    let err = cp
        .import_str("ChannelInformation[1]:\n\tPower[2]: 1\n")
        .unwrap_err();
    assert_eq!(err.to_string(), "line 2 column 9: too many Power fields");
}

#[test]
fn single_line_form_imports_like_the_multi_line_form() {
    let cp = populated_codeplug();
    let mut out = Vec::new();
    for rtype in cp.record_types() {
        for r in cp.records(&rtype) {
            cp.write_record_line(&mut out, r).expect("write");
        }
    }
    let text = String::from_utf8(out).expect("utf8");

    let mut cp2 = populated_codeplug();
    cp2.import_str(&text).expect("import");
    assert_eq!(record_tree(&cp), record_tree(&cp2));
}

#[test]
fn unknown_field_name_is_positioned_at_the_field() {
    let mut cp = populated_codeplug();
    let before = record_tree(&cp);
    let text = "ChannelInformation[1]:\n\tName: Alpha\n\tBogus: 1\n";

    let err = cp.import_str(text).unwrap_err();
    let Error::Grammar { pos, .. } = err else {
        panic!("expected a grammar error, got {}", err);
    };
    assert_eq!(pos, Position { line: 2, column: 8 });
    assert_eq!(record_tree(&cp), before);
}

#[test]
fn grammar_errors_display_one_based_positions() {
    let mut cp = populated_codeplug();
    let err = cp.import_str("Bogus[1]:\n").unwrap_err();
    assert_eq!(err.to_string(), "line 1 column 1: unknown record type: Bogus");
}

#[test]
fn bare_quote_in_a_value_is_rejected() {
    let mut cp = populated_codeplug();
    let err = cp
        .import_str("ChannelInformation[1]:\n\tName: Al\"pha\n")
        .unwrap_err();
    assert!(matches!(err, Error::Grammar { .. }));
    assert!(err.to_string().contains("bare"));
}

#[test]
fn unterminated_quote_is_rejected() {
    let mut cp = populated_codeplug();
    let err = cp
        .import_str("ChannelInformation[1]:\n\tName: \"Alpha\n")
        .unwrap_err();
    assert!(err.to_string().contains("unterminated"));
}

#[test]
fn escapes_decode_inside_quoted_values() {
    let mut cp = populated_codeplug();
    let text = "ChannelInformation[1]:\n\
                \tName: \"A\\tB\"\n\
                \tRxFrequency: 145.5\n\
                \tTxFrequency: 145.5\n\
                \tPower: 1\n\
                \n\
                Contacts[1]:\n\
                \tName: Dispatch\n\
                \tCallID: 100\n\
                \n\
                ZoneInformation[1]:\n\
                \tName: Main\n\
                \tChannelMember[1]: \"A\\tB\"\n";
    cp.import_str(text).expect("import");

    let channels = rt("ChannelInformation");
    let name = cp
        .records(&channels)[0]
        .field(&ft("Name"))
        .and_then(|f| f.value.as_str())
        .expect("name");
    assert_eq!(name, "A\tB");
    // The zone member resolved against the escaped name.
    let member = &cp.records(&rt("ZoneInformation"))[0].fields(&ft("ChannelMember"))[0];
    assert_eq!(member.value, FieldValue::Ref(1));
}

#[test]
fn unresolved_reference_reports_the_value_position() {
    let mut cp = populated_codeplug();
    let before = record_tree(&cp);
    let text = "ChannelInformation[1]:\n\
                \tName: Alpha\n\
                \tContactName: Nobody\n\
                \n\
                Contacts[1]:\n\
                \tName: Dispatch\n\
                \tCallID: 100\n\
                \n\
                ZoneInformation[1]:\n\
                \tName: Main\n\
                \tChannelMember[1]: Alpha\n";

    let err = cp.import_str(text).unwrap_err();
    let Error::Grammar { pos, msg } = err else {
        panic!("expected a grammar error");
    };
    assert_eq!(msg, "no ContactName: Nobody");
    // "\tContactName: " puts the value at column 21 of line 3.
    assert_eq!(pos, Position { line: 2, column: 21 });
    assert_eq!(record_tree(&cp), before);
}

#[test]
fn unparsable_numeric_value_is_a_grammar_error() {
    let mut cp = populated_codeplug();
    let err = cp
        .import_str("ChannelInformation[1]:\n\tRxFrequency: banana\n")
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "line 2 column 22: no RxFrequency: banana"
    );
}

#[test]
fn import_requires_every_record_type() {
    let mut cp = populated_codeplug();
    let before = record_tree(&cp);
    let text = "ChannelInformation[1]:\n\tName: Alpha\n\tRxFrequency: 145.5\n";

    let err = cp.import_str(text).unwrap_err();
    let Error::Validation(msg) = err else {
        panic!("expected a validation error");
    };
    assert_eq!(msg, "no Contacts records found");
    assert_eq!(record_tree(&cp), before);
}

#[test]
fn import_renumbers_and_uniques_names() {
    let mut cp = populated_codeplug();
    let text = "ChannelInformation[7]:\n\tName: Dup\n\
                \n\
                ChannelInformation[9]:\n\tName: Dup\n\
                \n\
                Contacts[1]:\n\tName: Dispatch\n\tCallID: 100\n\
                \n\
                ZoneInformation[1]:\n\tName: Main\n\tChannelMember[1]: Dup\n";
    cp.import_str(text).expect("import");

    let channels = rt("ChannelInformation");
    let slab = cp.slab(&channels).expect("slab");
    let names: Vec<&str> = cp
        .records(&channels)
        .iter()
        .filter_map(|r| slab.name_of(r))
        .collect();
    assert_eq!(names, vec!["Dup", "Dup 2"]);
    let indices: Vec<usize> = cp.records(&channels).iter().map(|r| r.index).collect();
    assert_eq!(indices, vec![0, 1]);
}

// ─── Files ──────────────────────────────────────────────────────────────────

#[test]
fn export_and_import_through_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("plug.txt");

    let cp = populated_codeplug();
    cp.export_to(&path).expect("export");

    let mut cp2 = populated_codeplug();
    cp2.import_from(&path).expect("import");
    assert_eq!(record_tree(&cp), record_tree(&cp2));
}
