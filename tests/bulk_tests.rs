//! Bulk-state coordination tests
//!
//! These tests verify:
//! - Snapshot capture and restore
//! - Atomic LDIF import (all-or-nothing, with and without clear)
//! - Export to files and writers, and export/import round trips
//! - Entry lookups and the assertion helpers

mod common;

use memdir::{Attribute, Entry, MemDirError};

use common::{person_entry, server_with_listeners};

// =============================================================================
// Snapshots
// =============================================================================

#[test]
fn test_snapshot_restore_rewinds_all_changes() {
    let (server, _) = server_with_listeners(&["main"]);
    server
        .add_entry(&person_entry("dc=example,dc=com", "example"))
        .unwrap();

    let snapshot = server.create_snapshot();

    server
        .add_entry(&person_entry("cn=extra,dc=example,dc=com", "extra"))
        .unwrap();
    server.delete("dc=example,dc=com").unwrap();
    assert_eq!(server.count_entries().unwrap(), 1);

    server.restore_snapshot(&snapshot);
    assert_eq!(server.count_entries().unwrap(), 1);
    assert!(server.entry_exists("dc=example,dc=com").unwrap());
    assert!(!server.entry_exists("cn=extra,dc=example,dc=com").unwrap());
}

#[test]
fn test_snapshot_survives_multiple_restores() {
    let (server, _) = server_with_listeners(&["main"]);
    server
        .add_entry(&person_entry("dc=example,dc=com", "example"))
        .unwrap();
    let snapshot = server.create_snapshot();

    for round in 0..3 {
        server
            .add_entry(&person_entry(
                &format!("cn=round{round},dc=example,dc=com"),
                "round",
            ))
            .unwrap();
        server.restore_snapshot(&snapshot);
        assert_eq!(server.count_entries().unwrap(), 1);
    }
}

// =============================================================================
// Bulk Adds
// =============================================================================

#[test]
fn test_add_entries_is_all_or_nothing() {
    let (server, backend) = server_with_listeners(&["main"]);
    server
        .add_entry(&person_entry("dc=example,dc=com", "example"))
        .unwrap();

    *backend.fail_add_dn.lock() = Some("cn=third,dc=example,dc=com".to_string());

    let batch = vec![
        person_entry("cn=first,dc=example,dc=com", "first"),
        person_entry("cn=second,dc=example,dc=com", "second"),
        person_entry("cn=third,dc=example,dc=com", "third"),
    ];
    assert!(server.add_entries(&batch).is_err());

    // Nothing from the failed batch stuck
    assert_eq!(server.count_entries().unwrap(), 1);
    assert!(!server.entry_exists("cn=first,dc=example,dc=com").unwrap());

    *backend.fail_add_dn.lock() = None;
    server.add_entries(&batch).unwrap();
    assert_eq!(server.count_entries().unwrap(), 4);
}

#[test]
fn test_add_entries_from_ldif_text() {
    let (server, _) = server_with_listeners(&["main"]);

    server
        .add_entries_from_ldif(&[
            "dn: dc=example,dc=com",
            "objectClass: domain",
            "dc: example",
            "",
            "dn: ou=people,dc=example,dc=com",
            "objectClass: organizationalUnit",
            "ou: people",
        ])
        .unwrap();

    server
        .assert_entries_exist(&["dc=example,dc=com", "ou=people,dc=example,dc=com"])
        .unwrap();
}

// =============================================================================
// Import / Export
// =============================================================================

#[test]
fn test_export_import_round_trip_through_a_file() {
    let (server, _) = server_with_listeners(&["main"]);
    server
        .add_entry(&person_entry("dc=example,dc=com", "example"))
        .unwrap();
    server
        .add_entry(&person_entry("cn=a,dc=example,dc=com", "a"))
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("export.ldif");

    let exported = server.export_to_ldif(&path, true, true).unwrap();
    assert_eq!(exported, 2);

    server.clear().unwrap();
    assert_eq!(server.count_entries().unwrap(), 0);

    let imported = server.import_from_ldif(false, &path).unwrap();
    assert_eq!(imported, 2);
    assert!(server.entry_exists("cn=a,dc=example,dc=com").unwrap());
}

#[test]
fn test_import_with_clear_replaces_existing_content() {
    let (server, _) = server_with_listeners(&["main"]);
    server
        .add_entry(&person_entry("cn=old,dc=example,dc=com", "old"))
        .unwrap();

    let ldif = "dn: dc=fresh,dc=com\nobjectClass: domain\ndc: fresh\n";
    let imported = server
        .import_from_reader(true, std::io::Cursor::new(ldif))
        .unwrap();
    assert_eq!(imported, 1);

    assert!(!server.entry_exists("cn=old,dc=example,dc=com").unwrap());
    assert!(server.entry_exists("dc=fresh,dc=com").unwrap());
}

#[test]
fn test_malformed_import_leaves_state_untouched() {
    let (server, _) = server_with_listeners(&["main"]);
    for i in 0..5 {
        server
            .add_entry(&person_entry(&format!("cn=seed{i},dc=example,dc=com"), "seed"))
            .unwrap();
    }

    // Five valid records followed by one malformed record
    let mut ldif = String::new();
    for i in 0..5 {
        ldif.push_str(&format!(
            "dn: cn=new{i},dc=example,dc=com\nobjectClass: person\ncn: new{i}\n\n"
        ));
    }
    ldif.push_str("objectClass: person\ncn: no-dn-line\n");

    let outcome = server.import_from_reader(true, std::io::Cursor::new(ldif));
    assert!(matches!(outcome, Err(MemDirError::LdifParse(_))));

    // The original five entries are intact, none of the new ones landed
    assert_eq!(server.count_entries().unwrap(), 5);
    assert!(server.entry_exists("cn=seed0,dc=example,dc=com").unwrap());
    assert!(!server.entry_exists("cn=new0,dc=example,dc=com").unwrap());
}

#[test]
fn test_failed_import_add_restores_prior_state() {
    let (server, backend) = server_with_listeners(&["main"]);
    server
        .add_entry(&person_entry("cn=seed,dc=example,dc=com", "seed"))
        .unwrap();

    *backend.fail_add_dn.lock() = Some("cn=bad,dc=example,dc=com".to_string());

    let ldif = "dn: cn=good,dc=example,dc=com\nobjectClass: person\ncn: good\n\n\
                dn: cn=bad,dc=example,dc=com\nobjectClass: person\ncn: bad\n";
    let outcome = server.import_from_reader(true, std::io::Cursor::new(ldif));
    assert!(outcome.is_err());

    // Clear-then-add was rewound, the seed entry is back
    assert_eq!(server.count_entries().unwrap(), 1);
    assert!(server.entry_exists("cn=seed,dc=example,dc=com").unwrap());
}

#[test]
fn test_export_to_writer_leaves_writer_open() {
    let (server, _) = server_with_listeners(&["main"]);
    server
        .add_entry(&person_entry("dc=example,dc=com", "example"))
        .unwrap();

    let mut buffer = Vec::new();
    let count = server.export_to_writer(&mut buffer, false, false).unwrap();
    assert_eq!(count, 1);

    let text = String::from_utf8(buffer).unwrap();
    assert!(text.contains("dn: dc=example,dc=com"));
    assert!(text.contains("objectClass: person"));
}

// =============================================================================
// Lookups and Subtree Operations
// =============================================================================

#[test]
fn test_count_and_delete_subtree() {
    let (server, _) = server_with_listeners(&["main"]);
    server
        .add_entry(&person_entry("dc=example,dc=com", "example"))
        .unwrap();
    server
        .add_entry(&person_entry("ou=people,dc=example,dc=com", "people"))
        .unwrap();
    server
        .add_entry(&person_entry("cn=a,ou=people,dc=example,dc=com", "a"))
        .unwrap();
    server
        .add_entry(&person_entry("dc=other,dc=com", "other"))
        .unwrap();

    assert_eq!(server.count_entries().unwrap(), 4);
    assert_eq!(
        server.count_entries_below("dc=example,dc=com").unwrap(),
        3
    );

    let removed = server.delete_subtree("ou=people,dc=example,dc=com").unwrap();
    assert_eq!(removed, 2);
    assert_eq!(server.count_entries().unwrap(), 2);
}

#[test]
fn test_entry_exists_superset_checks_values() {
    let (server, _) = server_with_listeners(&["main"]);
    server
        .add_entry(&Entry::with_attributes(
            "cn=who,dc=example,dc=com",
            vec![
                Attribute::new("objectClass", "person"),
                Attribute::with_values("cn", ["who", "whom"]),
            ],
        ))
        .unwrap();

    let expected = Entry::with_attributes(
        "cn=who,dc=example,dc=com",
        vec![Attribute::new("cn", "whom")],
    );
    assert!(server.entry_exists_superset(&expected).unwrap());

    let not_expected = Entry::with_attributes(
        "cn=who,dc=example,dc=com",
        vec![Attribute::new("cn", "nobody")],
    );
    assert!(!server.entry_exists_superset(&not_expected).unwrap());
}

// =============================================================================
// Assertion Helpers
// =============================================================================

#[test]
fn test_assertion_helpers_pass_and_fail() {
    let (server, _) = server_with_listeners(&["main"]);
    server
        .add_entry(&person_entry("cn=who,dc=example,dc=com", "who"))
        .unwrap();

    server.assert_entry_exists("cn=who,dc=example,dc=com").unwrap();
    server
        .assert_attribute_exists("cn=who,dc=example,dc=com", &["cn", "objectClass"])
        .unwrap();
    server
        .assert_value_exists("cn=who,dc=example,dc=com", "cn", &["who"])
        .unwrap();
    server.assert_entry_missing("cn=ghost,dc=example,dc=com").unwrap();
    server
        .assert_attribute_missing("cn=who,dc=example,dc=com", &["mail"])
        .unwrap();
    server
        .assert_value_missing("cn=who,dc=example,dc=com", "cn", &["other"])
        .unwrap();

    assert!(matches!(
        server.assert_entry_exists("cn=ghost,dc=example,dc=com"),
        Err(MemDirError::Assertion(_))
    ));
    assert!(matches!(
        server.assert_attribute_exists("cn=who,dc=example,dc=com", &["mail"]),
        Err(MemDirError::Assertion(_))
    ));
    assert!(matches!(
        server.assert_value_exists("cn=who,dc=example,dc=com", "cn", &["other"]),
        Err(MemDirError::Assertion(_))
    ));
    assert!(matches!(
        server.assert_entry_missing("cn=who,dc=example,dc=com"),
        Err(MemDirError::Assertion(_))
    ));
}

#[test]
fn test_missing_helpers_report_what_is_absent() {
    let (server, _) = server_with_listeners(&["main"]);
    server
        .add_entry(&person_entry("cn=who,dc=example,dc=com", "who"))
        .unwrap();

    let missing = server
        .missing_entry_dns(&["cn=who,dc=example,dc=com", "cn=ghost,dc=example,dc=com"])
        .unwrap();
    assert_eq!(missing, vec!["cn=ghost,dc=example,dc=com".to_string()]);

    let names = server
        .missing_attribute_names("cn=who,dc=example,dc=com", &["cn", "mail"])
        .unwrap()
        .unwrap();
    assert_eq!(names, vec!["mail".to_string()]);

    // A missing entry reads as None, distinct from "nothing missing"
    assert!(server
        .missing_attribute_names("cn=ghost,dc=example,dc=com", &["cn"])
        .unwrap()
        .is_none());
}

#[test]
fn test_filter_assertions() {
    let (server, _) = server_with_listeners(&["main"]);
    server
        .add_entry(&person_entry("cn=who,dc=example,dc=com", "who"))
        .unwrap();

    server
        .assert_entry_exists_matching("cn=who,dc=example,dc=com", "(cn=who)")
        .unwrap();
    assert!(matches!(
        server.assert_entry_exists_matching("cn=who,dc=example,dc=com", "(cn=other)"),
        Err(MemDirError::Assertion(_))
    ));
}
