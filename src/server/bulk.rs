//! Bulk state coordination and entry-level conveniences.
//!
//! Snapshot/restore, atomic interchange-format import/export, all-or-nothing
//! multi-entry adds, and the lookup and assertion helpers test code leans on.
//! Atomicity here is snapshot-based: capture, apply, restore on any failure.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use tracing::info;

use crate::error::{MemDirError, Result};
use crate::handler::Snapshot;
use crate::ldif;
use crate::protocol::Entry;

use super::DirectoryServer;

impl DirectoryServer {
    // =========================================================================
    // Snapshots
    // =========================================================================

    /// Capture a point-in-time snapshot of all directory content.
    pub fn create_snapshot(&self) -> Snapshot {
        self.backend().create_snapshot()
    }

    /// Restore previously captured content, replacing the current state.
    pub fn restore_snapshot(&self, snapshot: &Snapshot) {
        self.backend().restore_snapshot(snapshot);
    }

    // =========================================================================
    // Import / export
    // =========================================================================

    /// Import entries from an LDIF file. With `clear` set, existing content
    /// is removed first. All-or-nothing: on any parse or add failure the
    /// directory is restored to its prior state. Returns the number of
    /// entries added.
    pub fn import_from_ldif(&self, clear: bool, path: impl AsRef<Path>) -> Result<usize> {
        let file = File::open(path.as_ref())?;
        self.import_from_reader(clear, BufReader::new(file))
    }

    /// Import entries from any LDIF reader, with the same atomicity as
    /// [`import_from_ldif`](Self::import_from_ldif).
    pub fn import_from_reader<R: BufRead>(&self, clear: bool, reader: R) -> Result<usize> {
        // Parse fully before touching directory state, so a malformed record
        // cannot leave a partial import behind.
        let entries = ldif::read_entries(reader)?;
        self.apply_entries(clear, entries)
    }

    /// Import already-parsed entries with the same clear and atomicity
    /// semantics as the LDIF import paths. Returns the number added.
    pub fn import_entries(&self, clear: bool, entries: Vec<Entry>) -> Result<usize> {
        self.apply_entries(clear, entries)
    }

    /// Add every entry, all-or-nothing: if any add fails, the directory is
    /// restored to its state before the first add.
    pub fn add_entries(&self, entries: &[Entry]) -> Result<()> {
        self.apply_entries(false, entries.to_vec()).map(|_| ())
    }

    /// Parse the given LDIF lines and add every resulting entry,
    /// all-or-nothing.
    pub fn add_entries_from_ldif<S: AsRef<str>>(&self, lines: &[S]) -> Result<()> {
        let entries = ldif::read_entries_from_lines(lines)?;
        self.apply_entries(false, entries).map(|_| ())
    }

    fn apply_entries(&self, clear: bool, entries: Vec<Entry>) -> Result<usize> {
        let snapshot = self.create_snapshot();

        if clear {
            if let Err(e) = self.backend().clear() {
                self.restore_snapshot(&snapshot);
                return Err(e);
            }
        }

        for entry in &entries {
            if let Err(e) = self.add_entry(entry) {
                self.restore_snapshot(&snapshot);
                return Err(e);
            }
        }

        info!(count = entries.len(), cleared = clear, "bulk add applied");
        Ok(entries.len())
    }

    /// Export all directory content to an LDIF file. Returns the number of
    /// entries written.
    pub fn export_to_ldif(
        &self,
        path: impl AsRef<Path>,
        exclude_generated: bool,
        exclude_changelog: bool,
    ) -> Result<usize> {
        let file = File::create(path.as_ref())?;
        let mut writer = BufWriter::new(file);
        let count = self.export_to_writer(&mut writer, exclude_generated, exclude_changelog)?;
        writer.flush()?;
        Ok(count)
    }

    /// Export all directory content to any writer. The writer is flushed but
    /// stays open; lifetime is the caller's concern.
    pub fn export_to_writer<W: Write>(
        &self,
        writer: &mut W,
        exclude_generated: bool,
        exclude_changelog: bool,
    ) -> Result<usize> {
        let entries = self
            .backend()
            .export_entries(exclude_generated, exclude_changelog)?;
        let count = ldif::write_entries(writer, &entries)?;
        writer.flush()?;
        Ok(count)
    }

    // =========================================================================
    // Entry lookups
    // =========================================================================

    /// Whether an entry with the given DN exists.
    pub fn entry_exists(&self, dn: &str) -> Result<bool> {
        self.backend().entry_exists(dn)
    }

    /// Whether an entry with the given DN exists and matches the filter.
    pub fn entry_exists_matching(&self, dn: &str, filter: &str) -> Result<bool> {
        self.backend().entry_exists_matching(dn, filter)
    }

    /// Whether an entry exists with the expected entry's DN and at least all
    /// of its attribute values.
    pub fn entry_exists_superset(&self, expected: &Entry) -> Result<bool> {
        Ok(self
            .backend()
            .get_entry(&expected.dn)?
            .is_some_and(|actual| actual.is_superset_of(expected)))
    }

    /// Fetch an entry by DN.
    pub fn get_entry(&self, dn: &str) -> Result<Option<Entry>> {
        self.backend().get_entry(dn)
    }

    /// Number of entries held, excluding changelog entries.
    pub fn count_entries(&self) -> Result<usize> {
        self.backend().count_entries(false)
    }

    /// Number of entries held, including changelog entries.
    pub fn count_entries_with_changelog(&self) -> Result<usize> {
        self.backend().count_entries(true)
    }

    /// Number of entries at or below the given base DN.
    pub fn count_entries_below(&self, base_dn: &str) -> Result<usize> {
        self.backend().count_entries_below(base_dn)
    }

    /// Remove all entries.
    pub fn clear(&self) -> Result<()> {
        self.backend().clear()
    }

    /// Remove the given entry and all subordinates; returns the count removed.
    pub fn delete_subtree(&self, base_dn: &str) -> Result<usize> {
        self.backend().delete_subtree(base_dn)
    }

    // =========================================================================
    // Assertion helpers
    // =========================================================================

    /// Among the given DNs, those with no corresponding entry.
    pub fn missing_entry_dns<S: AsRef<str>>(&self, dns: &[S]) -> Result<Vec<String>> {
        let mut missing = Vec::new();
        for dn in dns {
            if !self.entry_exists(dn.as_ref())? {
                missing.push(dn.as_ref().to_string());
            }
        }
        Ok(missing)
    }

    /// Among the given attribute names, those absent from the entry. `None`
    /// when the entry itself does not exist.
    pub fn missing_attribute_names<S: AsRef<str>>(
        &self,
        dn: &str,
        attribute_names: &[S],
    ) -> Result<Option<Vec<String>>> {
        let Some(entry) = self.get_entry(dn)? else {
            return Ok(None);
        };
        Ok(Some(
            attribute_names
                .iter()
                .map(|n| n.as_ref())
                .filter(|n| !entry.has_attribute(n))
                .map(str::to_string)
                .collect(),
        ))
    }

    /// Among the given values, those absent from the named attribute of the
    /// entry. `None` when the entry does not exist.
    pub fn missing_attribute_values<S: AsRef<str>>(
        &self,
        dn: &str,
        attribute_name: &str,
        values: &[S],
    ) -> Result<Option<Vec<String>>> {
        let Some(entry) = self.get_entry(dn)? else {
            return Ok(None);
        };
        Ok(Some(
            values
                .iter()
                .map(|v| v.as_ref())
                .filter(|v| !entry.has_attribute_value(attribute_name, v))
                .map(str::to_string)
                .collect(),
        ))
    }

    /// Assert that an entry with the given DN exists.
    pub fn assert_entry_exists(&self, dn: &str) -> Result<()> {
        if self.entry_exists(dn)? {
            Ok(())
        } else {
            Err(assertion(format!("entry '{dn}' does not exist")))
        }
    }

    /// Assert that an entry exists and matches the filter.
    pub fn assert_entry_exists_matching(&self, dn: &str, filter: &str) -> Result<()> {
        self.assert_entry_exists(dn)?;
        if self.entry_exists_matching(dn, filter)? {
            Ok(())
        } else {
            Err(assertion(format!(
                "entry '{dn}' does not match filter '{filter}'"
            )))
        }
    }

    /// Assert that an entry exists with the expected entry's DN and at least
    /// all of its attribute values.
    pub fn assert_entry_exists_superset(&self, expected: &Entry) -> Result<()> {
        self.assert_entry_exists(&expected.dn)?;
        if self.entry_exists_superset(expected)? {
            Ok(())
        } else {
            Err(assertion(format!(
                "entry '{}' is missing expected attribute values",
                expected.dn
            )))
        }
    }

    /// Assert that every given DN has a corresponding entry.
    pub fn assert_entries_exist<S: AsRef<str>>(&self, dns: &[S]) -> Result<()> {
        let missing = self.missing_entry_dns(dns)?;
        if missing.is_empty() {
            Ok(())
        } else {
            Err(assertion(format!(
                "missing entries: {}",
                missing.join(", ")
            )))
        }
    }

    /// Assert that the entry exists and carries every named attribute.
    pub fn assert_attribute_exists<S: AsRef<str>>(
        &self,
        dn: &str,
        attribute_names: &[S],
    ) -> Result<()> {
        match self.missing_attribute_names(dn, attribute_names)? {
            None => Err(assertion(format!("entry '{dn}' does not exist"))),
            Some(missing) if missing.is_empty() => Ok(()),
            Some(missing) => Err(assertion(format!(
                "entry '{dn}' is missing attributes: {}",
                missing.join(", ")
            ))),
        }
    }

    /// Assert that the entry exists and carries every given value of the
    /// named attribute.
    pub fn assert_value_exists<S: AsRef<str>>(
        &self,
        dn: &str,
        attribute_name: &str,
        values: &[S],
    ) -> Result<()> {
        match self.missing_attribute_values(dn, attribute_name, values)? {
            None => Err(assertion(format!("entry '{dn}' does not exist"))),
            Some(missing) if missing.is_empty() => Ok(()),
            Some(missing) => Err(assertion(format!(
                "entry '{dn}' is missing values for '{attribute_name}': {}",
                missing.join(", ")
            ))),
        }
    }

    /// Assert that no entry with the given DN exists.
    pub fn assert_entry_missing(&self, dn: &str) -> Result<()> {
        if self.entry_exists(dn)? {
            Err(assertion(format!("entry '{dn}' unexpectedly exists")))
        } else {
            Ok(())
        }
    }

    /// Assert that the entry exists but carries none of the named attributes.
    pub fn assert_attribute_missing<S: AsRef<str>>(
        &self,
        dn: &str,
        attribute_names: &[S],
    ) -> Result<()> {
        let Some(entry) = self.get_entry(dn)? else {
            return Err(assertion(format!("entry '{dn}' does not exist")));
        };
        let present: Vec<&str> = attribute_names
            .iter()
            .map(|n| n.as_ref())
            .filter(|n| entry.has_attribute(n))
            .collect();
        if present.is_empty() {
            Ok(())
        } else {
            Err(assertion(format!(
                "entry '{dn}' unexpectedly has attributes: {}",
                present.join(", ")
            )))
        }
    }

    /// Assert that the entry exists but carries none of the given values for
    /// the named attribute.
    pub fn assert_value_missing<S: AsRef<str>>(
        &self,
        dn: &str,
        attribute_name: &str,
        values: &[S],
    ) -> Result<()> {
        let Some(entry) = self.get_entry(dn)? else {
            return Err(assertion(format!("entry '{dn}' does not exist")));
        };
        let present: Vec<&str> = values
            .iter()
            .map(|v| v.as_ref())
            .filter(|v| entry.has_attribute_value(attribute_name, v))
            .collect();
        if present.is_empty() {
            Ok(())
        } else {
            Err(assertion(format!(
                "entry '{dn}' unexpectedly has values for '{attribute_name}': {}",
                present.join(", ")
            )))
        }
    }
}

fn assertion(message: String) -> MemDirError {
    MemDirError::Assertion(message)
}
