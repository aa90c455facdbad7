use std::io::{self, Write};

use serde::Serialize;

/// One catalogued filesystem object from the scanned MFT copy.
///
/// Identity is the record number plus the owning fragment; a record with
/// no $FILE_NAME attribute is catalogued with `name: None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogueEntry {
    pub name: Option<String>,
    /// Absolute device byte offset of the MFT fragment the record came from.
    pub fragment_offset: u64,
    pub record_number: u32,
}

/// Append-only, insertion-ordered collection of catalogue entries.
#[derive(Debug, Default)]
pub struct Catalogue {
    entries: Vec<CatalogueEntry>,
}

impl Catalogue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, name: Option<String>, fragment_offset: u64, record_number: u32) {
        self.entries.push(CatalogueEntry {
            name,
            fragment_offset,
            record_number,
        });
    }

    /// Absorb another catalogue, keeping insertion order.
    pub fn extend(&mut self, other: Catalogue) {
        self.entries.extend(other.entries);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CatalogueEntry> {
        self.entries.iter()
    }

    /// Print every entry in insertion order: record number and name.
    pub fn print_all<W: Write>(&self, sink: &mut W) -> io::Result<()> {
        for entry in &self.entries {
            writeln!(
                sink,
                "{:>10}  {}",
                entry.record_number,
                entry.name.as_deref().unwrap_or("(unnamed)")
            )?;
        }
        Ok(())
    }
}
