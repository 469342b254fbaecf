//! Line-oriented interchange format (LDIF-style) reading and writing
//!
//! A minimal reader/writer sufficient for bulk import/export orchestration:
//! blank-line-delimited entry blocks, a `dn:` line first, `name: value`
//! attribute lines, `#` comments, and leading-space continuation lines. The
//! full interchange grammar (base64 values, change records, URLs) is owned by
//! the external codec collaborator.

use std::io::{BufRead, Write};

use crate::error::{MemDirError, Result};
use crate::protocol::Entry;

/// Read all entries from the source.
///
/// Fails with [`MemDirError::LdifParse`] on malformed input: an attribute
/// line without a colon, a block not starting with `dn:`, or a continuation
/// line with nothing to continue.
pub fn read_entries<R: BufRead>(reader: R) -> Result<Vec<Entry>> {
    let mut entries = Vec::new();
    let mut block: Vec<String> = Vec::new();
    let mut line_number = 0usize;

    for line in reader.lines() {
        let line = line?;
        line_number += 1;

        if line.trim().is_empty() {
            if !block.is_empty() {
                entries.push(parse_block(&block, line_number)?);
                block.clear();
            }
            continue;
        }

        if line.starts_with('#') {
            continue;
        }

        // Version header, permitted once at the top of a file.
        if block.is_empty() && entries.is_empty() && line.starts_with("version:") {
            continue;
        }

        if let Some(continuation) = line.strip_prefix(' ') {
            match block.last_mut() {
                Some(previous) => previous.push_str(continuation),
                None => {
                    return Err(MemDirError::LdifParse(format!(
                        "line {line_number}: continuation line with nothing to continue"
                    )));
                }
            }
            continue;
        }

        block.push(line);
    }

    if !block.is_empty() {
        entries.push(parse_block(&block, line_number)?);
    }

    Ok(entries)
}

/// Parse a blank-line-delimited block of entry text given as individual lines
pub fn read_entries_from_lines<S: AsRef<str>>(lines: &[S]) -> Result<Vec<Entry>> {
    let mut buffer = String::new();
    for line in lines {
        buffer.push_str(line.as_ref());
        buffer.push('\n');
    }
    read_entries(buffer.as_bytes())
}

/// Write entries to the sink, one blank-line-separated block per entry.
/// Returns the number of entries written.
pub fn write_entries<W: Write>(writer: &mut W, entries: &[Entry]) -> Result<usize> {
    for (index, entry) in entries.iter().enumerate() {
        if index > 0 {
            writeln!(writer)?;
        }
        write_entry(writer, entry)?;
    }
    writer.flush()?;
    Ok(entries.len())
}

fn write_entry<W: Write>(writer: &mut W, entry: &Entry) -> Result<()> {
    writeln!(writer, "dn: {}", entry.dn)?;
    for attribute in &entry.attributes {
        for value in &attribute.values {
            writeln!(writer, "{}: {}", attribute.name, value)?;
        }
    }
    Ok(())
}

fn parse_block(lines: &[String], line_number: usize) -> Result<Entry> {
    let first = &lines[0];
    let dn = first
        .strip_prefix("dn:")
        .ok_or_else(|| {
            MemDirError::LdifParse(format!(
                "entry block ending at line {line_number} does not start with 'dn:'"
            ))
        })?
        .trim()
        .to_string();

    if dn.is_empty() {
        return Err(MemDirError::LdifParse(format!(
            "entry block ending at line {line_number} has an empty DN"
        )));
    }

    let mut entry = Entry::new(dn);
    for line in &lines[1..] {
        let (name, value) = line.split_once(':').ok_or_else(|| {
            MemDirError::LdifParse(format!(
                "malformed attribute line '{line}' in entry '{}'",
                entry.dn
            ))
        })?;

        let name = name.trim();
        if name.is_empty() {
            return Err(MemDirError::LdifParse(format!(
                "attribute line with empty name in entry '{}'",
                entry.dn
            )));
        }

        entry.add_attribute_value(name, value.trim());
    }

    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Attribute;

    #[test]
    fn parses_two_entries_with_comments() {
        let text = b"# seed data\n\
                     dn: dc=example,dc=com\n\
                     objectClass: domain\n\
                     dc: example\n\
                     \n\
                     dn: ou=People,dc=example,dc=com\n\
                     objectClass: organizationalUnit\n\
                     ou: People\n";

        let entries = read_entries(&text[..]).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].dn, "dc=example,dc=com");
        assert!(entries[1].has_attribute_value("ou", "People"));
    }

    #[test]
    fn continuation_lines_are_folded() {
        let text = b"dn: cn=long,dc=example,dc=com\n\
                     description: first part\n  and the rest\n";
        let entries = read_entries(&text[..]).unwrap();
        assert_eq!(
            entries[0].attribute("description").unwrap().values[0],
            "first part and the rest"
        );
    }

    #[test]
    fn block_without_dn_is_a_parse_error() {
        let text = b"objectClass: top\n";
        let err = read_entries(&text[..]).unwrap_err();
        assert!(matches!(err, MemDirError::LdifParse(_)));
    }

    #[test]
    fn attribute_line_without_colon_is_a_parse_error() {
        let text = b"dn: dc=example,dc=com\nbroken line\n";
        let err = read_entries(&text[..]).unwrap_err();
        assert!(matches!(err, MemDirError::LdifParse(_)));
    }

    #[test]
    fn round_trips_through_writer() {
        let entries = vec![
            Entry::with_attributes(
                "dc=example,dc=com",
                vec![
                    Attribute::new("objectClass", "domain"),
                    Attribute::new("dc", "example"),
                ],
            ),
            Entry::with_attributes(
                "ou=People,dc=example,dc=com",
                vec![Attribute::with_values("ou", ["People", "Humans"])],
            ),
        ];

        let mut buffer = Vec::new();
        let written = write_entries(&mut buffer, &entries).unwrap();
        assert_eq!(written, 2);

        let reread = read_entries(&buffer[..]).unwrap();
        assert_eq!(reread, entries);
    }
}
