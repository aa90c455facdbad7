use byteorder::{ByteOrder, LittleEndian};
use serde::Serialize;

use super::MFT_RECORD_LEN;
use crate::error::MftDumpError;

/// Signature of a real MFT FILE record.
pub const FILE_SIGNATURE: [u8; 4] = *b"FILE";

/// Signature of a synthetic fragment marker in the local MFT copy.
pub const FRAG_SIGNATURE: [u8; 4] = *b"FRAG";

/// On-disk size of the FILE record header.
pub const RECORD_HEADER_LEN: usize = 48;

const FLAG_IN_USE: u16 = 0x0001;
const FLAG_DIRECTORY: u16 = 0x0002;

/// The 48-byte header at the start of every MFT FILE record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MftRecordHeader {
    pub signature: [u8; 4],
    pub fixup_offset: u16,
    pub fixup_count: u16,
    pub log_seq_number: u64,
    pub sequence: u16,
    pub hard_links: u16,
    pub attr_offset: u16,
    pub flags: u16,
    pub used_size: u32,
    pub allocated_size: u32,
    pub base_record: u64,
    pub next_attr_id: u16,
    pub fixup_pattern: u16,
    pub record_number: u32,
}

impl MftRecordHeader {
    pub fn decode(data: &[u8]) -> Result<Self, MftDumpError> {
        if data.len() < RECORD_HEADER_LEN {
            return Err(MftDumpError::MalformedStructure(format!(
                "MFT record header needs {RECORD_HEADER_LEN} bytes, have {}",
                data.len()
            )));
        }
        Ok(Self {
            signature: [data[0], data[1], data[2], data[3]],
            fixup_offset: LittleEndian::read_u16(&data[0x04..0x06]),
            fixup_count: LittleEndian::read_u16(&data[0x06..0x08]),
            log_seq_number: LittleEndian::read_u64(&data[0x08..0x10]),
            sequence: LittleEndian::read_u16(&data[0x10..0x12]),
            hard_links: LittleEndian::read_u16(&data[0x12..0x14]),
            attr_offset: LittleEndian::read_u16(&data[0x14..0x16]),
            flags: LittleEndian::read_u16(&data[0x16..0x18]),
            used_size: LittleEndian::read_u32(&data[0x18..0x1C]),
            allocated_size: LittleEndian::read_u32(&data[0x1C..0x20]),
            base_record: LittleEndian::read_u64(&data[0x20..0x28]),
            next_attr_id: LittleEndian::read_u16(&data[0x28..0x2A]),
            fixup_pattern: LittleEndian::read_u16(&data[0x2A..0x2C]),
            record_number: LittleEndian::read_u32(&data[0x2C..0x30]),
        })
    }

    pub fn to_bytes(&self) -> [u8; RECORD_HEADER_LEN] {
        let mut out = [0u8; RECORD_HEADER_LEN];
        out[0..4].copy_from_slice(&self.signature);
        LittleEndian::write_u16(&mut out[0x04..0x06], self.fixup_offset);
        LittleEndian::write_u16(&mut out[0x06..0x08], self.fixup_count);
        LittleEndian::write_u64(&mut out[0x08..0x10], self.log_seq_number);
        LittleEndian::write_u16(&mut out[0x10..0x12], self.sequence);
        LittleEndian::write_u16(&mut out[0x12..0x14], self.hard_links);
        LittleEndian::write_u16(&mut out[0x14..0x16], self.attr_offset);
        LittleEndian::write_u16(&mut out[0x16..0x18], self.flags);
        LittleEndian::write_u32(&mut out[0x18..0x1C], self.used_size);
        LittleEndian::write_u32(&mut out[0x1C..0x20], self.allocated_size);
        LittleEndian::write_u64(&mut out[0x20..0x28], self.base_record);
        LittleEndian::write_u16(&mut out[0x28..0x2A], self.next_attr_id);
        LittleEndian::write_u16(&mut out[0x2A..0x2C], self.fixup_pattern);
        LittleEndian::write_u32(&mut out[0x2C..0x30], self.record_number);
        out
    }

    pub fn is_file_record(&self) -> bool {
        self.signature == FILE_SIGNATURE
    }

    pub fn is_in_use(&self) -> bool {
        self.flags & FLAG_IN_USE != 0
    }

    pub fn is_directory(&self) -> bool {
        self.flags & FLAG_DIRECTORY != 0
    }

    pub fn kind(&self) -> RecordKind {
        RecordKind::classify(self.flags)
    }
}

/// Classification of a FILE record by its flag word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// Bit 0 clear: the record is not in use.
    Deleted,
    /// In use, not a directory.
    File,
    /// In use and a directory.
    Directory,
    /// Flag bits outside the two defined ones are set.
    Other,
}

impl RecordKind {
    pub fn classify(flags: u16) -> Self {
        if flags & !(FLAG_IN_USE | FLAG_DIRECTORY) != 0 {
            RecordKind::Other
        } else if flags & FLAG_IN_USE == 0 {
            RecordKind::Deleted
        } else if flags & FLAG_DIRECTORY != 0 {
            RecordKind::Directory
        } else {
            RecordKind::File
        }
    }
}

/// Synthetic marker written before every extent in the local MFT copy:
/// the `FRAG` tag followed by the absolute device byte offset the extent
/// was read from. Never present on the source device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FragmentMarker {
    pub offset: u64,
}

impl FragmentMarker {
    pub fn decode(data: &[u8]) -> Result<Self, MftDumpError> {
        if data.len() < 12 {
            return Err(MftDumpError::MalformedStructure(format!(
                "fragment marker needs 12 bytes, have {}",
                data.len()
            )));
        }
        if data[0..4] != FRAG_SIGNATURE {
            return Err(MftDumpError::MalformedStructure(
                "fragment marker signature is not \"FRAG\"".into(),
            ));
        }
        Ok(Self {
            offset: LittleEndian::read_u64(&data[4..12]),
        })
    }

    pub fn to_bytes(&self) -> [u8; 12] {
        let mut out = [0u8; 12];
        out[0..4].copy_from_slice(&FRAG_SIGNATURE);
        LittleEndian::write_u64(&mut out[4..12], self.offset);
        out
    }

    /// The marker padded to a whole record slot, preserving the scanner's
    /// fixed 1024-byte stride.
    pub fn to_slot(&self) -> [u8; MFT_RECORD_LEN] {
        let mut out = [0u8; MFT_RECORD_LEN];
        out[0..12].copy_from_slice(&self.to_bytes());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_record_header(flags: u16, record_number: u32) -> [u8; RECORD_HEADER_LEN] {
        MftRecordHeader {
            signature: FILE_SIGNATURE,
            fixup_offset: 0x30,
            fixup_count: 3,
            log_seq_number: 0x11223344,
            sequence: 1,
            hard_links: 1,
            attr_offset: 0x38,
            flags,
            used_size: 0x188,
            allocated_size: 1024,
            base_record: 0,
            next_attr_id: 4,
            fixup_pattern: 0,
            record_number,
        }
        .to_bytes()
    }

    #[test]
    fn test_header_round_trip() {
        let raw = make_record_header(0x0001, 42);
        let header = MftRecordHeader::decode(&raw).unwrap();
        assert_eq!(header.signature, FILE_SIGNATURE);
        assert_eq!(header.attr_offset, 0x38);
        assert_eq!(header.used_size, 0x188);
        assert_eq!(header.allocated_size, 1024);
        assert_eq!(header.record_number, 42);
        assert_eq!(header.to_bytes(), raw);
    }

    #[test]
    fn test_header_too_short() {
        assert!(MftRecordHeader::decode(&[0u8; 32]).is_err());
    }

    #[test]
    fn test_classify_flags() {
        assert_eq!(RecordKind::classify(0x0000), RecordKind::Deleted);
        assert_eq!(RecordKind::classify(0x0001), RecordKind::File);
        assert_eq!(RecordKind::classify(0x0003), RecordKind::Directory);
        // in-use bit clear, directory bit set: a removed directory
        assert_eq!(RecordKind::classify(0x0002), RecordKind::Deleted);
        // extension bits push the record into "other"
        assert_eq!(RecordKind::classify(0x0005), RecordKind::Other);
        assert_eq!(RecordKind::classify(0x0008), RecordKind::Other);
    }

    #[test]
    fn test_fragment_marker_round_trip() {
        let marker = FragmentMarker {
            offset: 0x1234_5678_9ABC,
        };
        let raw = marker.to_bytes();
        assert_eq!(&raw[0..4], b"FRAG");
        assert_eq!(FragmentMarker::decode(&raw).unwrap(), marker);

        let slot = marker.to_slot();
        assert_eq!(slot.len(), MFT_RECORD_LEN);
        assert_eq!(&slot[0..12], &raw);
        assert!(slot[12..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_fragment_marker_bad_tag() {
        let mut raw = FragmentMarker { offset: 0 }.to_bytes();
        raw[0] = b'X';
        assert!(FragmentMarker::decode(&raw).is_err());
    }
}
