use std::fmt;
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use log::debug;
use serde::Serialize;

use crate::catalogue::Catalogue;
use crate::error::MftDumpError;
use crate::mft::attr::{AttributeType, Attributes, FileNameAttr};
use crate::mft::record::{FragmentMarker, MftRecordHeader, RecordKind, FILE_SIGNATURE, FRAG_SIGNATURE};
use crate::mft::MFT_RECORD_LEN;
use crate::report;

/// Counters accumulated over one scan of a local MFT copy.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ScanStats {
    pub records: u64,
    pub files: u64,
    pub directories: u64,
    pub deleted: u64,
    pub other: u64,
    pub bad_attributes: u64,
    pub file_names: u64,
    pub fragments: u64,
}

impl ScanStats {
    /// Fold another scan's counters into this one.
    pub fn absorb(&mut self, other: &ScanStats) {
        self.records += other.records;
        self.files += other.files;
        self.directories += other.directories;
        self.deleted += other.deleted;
        self.other += other.other;
        self.bad_attributes += other.bad_attributes;
        self.file_names += other.file_names;
        self.fragments += other.fragments;
    }
}

impl fmt::Display for ScanStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} MFT fragments", self.fragments)?;
        writeln!(
            f,
            "files: {}\tdirectories: {}",
            self.files, self.directories
        )?;
        writeln!(
            f,
            "deleted entities: {}\tother entities: {}",
            self.deleted, self.other
        )?;
        writeln!(f, "bad record attributes: {}", self.bad_attributes)?;
        writeln!(f, "file names: {}", self.file_names)?;
        write!(f, "{} FILE records processed", self.records)
    }
}

/// Scan a local MFT copy file into a catalogue.
pub fn scan_mft_copy(path: &Path) -> Result<(Catalogue, ScanStats), MftDumpError> {
    let file = File::open(path)?;
    scan_mft_stream(BufReader::new(file))
}

/// Scan a stream laid out as the extractor writes it: a sequence of
/// 1024-byte slots, each either a `FRAG` marker or a FILE record.
///
/// A marker updates the fragment offset attributed to the records that
/// follow it. A record with an oversized attribute has its attribute
/// walk abandoned (bad-attribute counter) but is still catalogued; any
/// other signature is fatal.
pub fn scan_mft_stream<R: Read>(mut reader: R) -> Result<(Catalogue, ScanStats), MftDumpError> {
    let mut catalogue = Catalogue::new();
    let mut stats = ScanStats::default();
    let mut fragment_offset: u64 = 0;
    let mut buf = [0u8; MFT_RECORD_LEN];

    loop {
        match read_slot(&mut reader, &mut buf)? {
            0 => break,
            MFT_RECORD_LEN => {}
            n => {
                return Err(MftDumpError::CorruptMft(format!(
                    "trailing partial slot of {n} bytes"
                )))
            }
        }

        if buf[0..4] == FRAG_SIGNATURE {
            let marker = FragmentMarker::decode(&buf)
                .map_err(|e| MftDumpError::CorruptMft(e.to_string()))?;
            debug!("fragment marker: records below were read at {}", marker.offset);
            fragment_offset = marker.offset;
            stats.fragments += 1;
        } else if buf[0..4] == FILE_SIGNATURE {
            scan_record(&buf, fragment_offset, &mut catalogue, &mut stats);
        } else {
            return Err(MftDumpError::CorruptMft(format!(
                "unknown slot signature {:02X?}",
                &buf[0..4]
            )));
        }
    }

    Ok((catalogue, stats))
}

fn scan_record(record: &[u8], fragment_offset: u64, catalogue: &mut Catalogue, stats: &mut ScanStats) {
    // The header always fits: the slot is 1024 bytes.
    let header = MftRecordHeader::decode(record).expect("slot holds a full record header");

    match header.kind() {
        RecordKind::File => stats.files += 1,
        RecordKind::Directory => stats.directories += 1,
        RecordKind::Deleted => stats.deleted += 1,
        RecordKind::Other => {
            debug!("record {} has flags {:#06X}", header.record_number, header.flags);
            stats.other += 1;
        }
    }

    let mut name: Option<String> = None;

    for attr in Attributes::new(record, header.attr_offset as usize, header.used_size as usize) {
        let attr = match attr {
            Ok(attr) => attr,
            Err(e) => {
                debug!("record {}: {e}", header.record_number);
                stats.bad_attributes += 1;
                break;
            }
        };
        debug!("attribute: {}", report::describe_attribute(&attr.header));

        match attr.header.attr_type() {
            Some(AttributeType::FileName) => {
                // Several $FILE_NAME attributes per record are normal
                // (DOS + Win32 names); the last one seen wins.
                match attr
                    .resident_value()
                    .and_then(FileNameAttr::decode)
                {
                    Ok(parsed) => {
                        stats.file_names += 1;
                        name = Some(parsed.name);
                    }
                    Err(e) => {
                        debug!("record {}: {e}", header.record_number);
                        stats.bad_attributes += 1;
                        break;
                    }
                }
            }
            Some(AttributeType::Data) if !attr.header.non_resident => {
                // Resident content is reachable here but deliberately not
                // decoded.
                if let Ok(value) = attr.resident_value() {
                    debug!(
                        "record {}: resident $DATA of {} bytes",
                        header.record_number,
                        value.len()
                    );
                }
            }
            _ => {}
        }
    }

    catalogue.append(name, fragment_offset, header.record_number);
    stats.records += 1;
}

/// Read exactly one slot, tolerating EOF only at a slot boundary.
fn read_slot<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize, MftDumpError> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}
