use byteorder::{ByteOrder, LittleEndian};

use crate::error::MftDumpError;

/// Attribute type code marking the end of the attribute list.
pub const ATTR_END: u32 = 0xFFFF_FFFF;

/// On-disk size of the common attribute header.
pub const ATTR_HEADER_LEN: usize = 16;

/// Minimum size of the $FILE_NAME attribute value (fixed part before the name).
const FILE_NAME_FIXED_LEN: usize = 66;

/// Known NTFS attribute type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeType {
    StandardInformation = 0x10,
    AttributeList = 0x20,
    FileName = 0x30,
    ObjectId = 0x40,
    SecurityDescriptor = 0x50,
    VolumeName = 0x60,
    VolumeInformation = 0x70,
    Data = 0x80,
    IndexRoot = 0x90,
    IndexAllocation = 0xA0,
    Bitmap = 0xB0,
    ReparsePoint = 0xC0,
    EaInformation = 0xD0,
    Ea = 0xE0,
    LoggedUtilityStream = 0x100,
}

impl AttributeType {
    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            0x10 => Self::StandardInformation,
            0x20 => Self::AttributeList,
            0x30 => Self::FileName,
            0x40 => Self::ObjectId,
            0x50 => Self::SecurityDescriptor,
            0x60 => Self::VolumeName,
            0x70 => Self::VolumeInformation,
            0x80 => Self::Data,
            0x90 => Self::IndexRoot,
            0xA0 => Self::IndexAllocation,
            0xB0 => Self::Bitmap,
            0xC0 => Self::ReparsePoint,
            0xD0 => Self::EaInformation,
            0xE0 => Self::Ea,
            0x100 => Self::LoggedUtilityStream,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::StandardInformation => "$STANDARD_INFORMATION",
            Self::AttributeList => "$ATTRIBUTE_LIST",
            Self::FileName => "$FILE_NAME",
            Self::ObjectId => "$OBJECT_ID",
            Self::SecurityDescriptor => "$SECURITY_DESCRIPTOR",
            Self::VolumeName => "$VOLUME_NAME",
            Self::VolumeInformation => "$VOLUME_INFORMATION",
            Self::Data => "$DATA",
            Self::IndexRoot => "$INDEX_ROOT",
            Self::IndexAllocation => "$INDEX_ALLOCATION",
            Self::Bitmap => "$BITMAP",
            Self::ReparsePoint => "$REPARSE_POINT",
            Self::EaInformation => "$EA_INFORMATION",
            Self::Ea => "$EA",
            Self::LoggedUtilityStream => "$LOGGED_UTILITY_STREAM",
        }
    }
}

/// The common 16-byte header every attribute starts with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeHeader {
    pub type_code: u32,
    pub full_length: u32,
    pub non_resident: bool,
    pub name_length: u8,
    pub name_offset: u16,
    pub flags: u16,
    pub id: u16,
}

impl AttributeHeader {
    pub fn decode(data: &[u8]) -> Result<Self, MftDumpError> {
        if data.len() < ATTR_HEADER_LEN {
            return Err(MftDumpError::MalformedStructure(format!(
                "attribute header needs {ATTR_HEADER_LEN} bytes, have {}",
                data.len()
            )));
        }
        Ok(Self {
            type_code: LittleEndian::read_u32(&data[0x00..0x04]),
            full_length: LittleEndian::read_u32(&data[0x04..0x08]),
            non_resident: data[0x08] != 0,
            name_length: data[0x09],
            name_offset: LittleEndian::read_u16(&data[0x0A..0x0C]),
            flags: LittleEndian::read_u16(&data[0x0C..0x0E]),
            id: LittleEndian::read_u16(&data[0x0E..0x10]),
        })
    }

    pub fn to_bytes(&self) -> [u8; ATTR_HEADER_LEN] {
        let mut out = [0u8; ATTR_HEADER_LEN];
        LittleEndian::write_u32(&mut out[0x00..0x04], self.type_code);
        LittleEndian::write_u32(&mut out[0x04..0x08], self.full_length);
        out[0x08] = self.non_resident as u8;
        out[0x09] = self.name_length;
        LittleEndian::write_u16(&mut out[0x0A..0x0C], self.name_offset);
        LittleEndian::write_u16(&mut out[0x0C..0x0E], self.flags);
        LittleEndian::write_u16(&mut out[0x0E..0x10], self.id);
        out
    }

    pub fn attr_type(&self) -> Option<AttributeType> {
        AttributeType::from_code(self.type_code)
    }
}

/// Resident attribute form: the content lives inside the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResidentHeader {
    pub value_length: u32,
    /// Byte offset of the content relative to the attribute start.
    pub value_offset: u16,
    pub indexed: u8,
}

impl ResidentHeader {
    /// Decode from the full attribute slice (header included).
    pub fn decode(attr: &[u8]) -> Result<Self, MftDumpError> {
        if attr.len() < 24 {
            return Err(MftDumpError::MalformedStructure(format!(
                "resident attribute needs 24 bytes, have {}",
                attr.len()
            )));
        }
        Ok(Self {
            value_length: LittleEndian::read_u32(&attr[0x10..0x14]),
            value_offset: LittleEndian::read_u16(&attr[0x14..0x16]),
            indexed: attr[0x16],
        })
    }
}

/// Non-resident attribute form: the content lives in extents described by
/// the data runs packed at the attribute tail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonResidentHeader {
    pub start_vcn: u64,
    pub end_vcn: u64,
    /// Byte offset of the packed run list relative to the attribute start.
    pub run_offset: u16,
    pub compression_unit: u16,
    pub allocated_size: u64,
    pub real_size: u64,
    pub initialized_size: u64,
}

impl NonResidentHeader {
    /// Decode from the full attribute slice (header included).
    pub fn decode(attr: &[u8]) -> Result<Self, MftDumpError> {
        if attr.len() < 0x40 {
            return Err(MftDumpError::MalformedStructure(format!(
                "non-resident attribute needs 64 bytes, have {}",
                attr.len()
            )));
        }
        Ok(Self {
            start_vcn: LittleEndian::read_u64(&attr[0x10..0x18]),
            end_vcn: LittleEndian::read_u64(&attr[0x18..0x20]),
            run_offset: LittleEndian::read_u16(&attr[0x20..0x22]),
            compression_unit: LittleEndian::read_u16(&attr[0x22..0x24]),
            allocated_size: LittleEndian::read_u64(&attr[0x28..0x30]),
            real_size: LittleEndian::read_u64(&attr[0x30..0x38]),
            initialized_size: LittleEndian::read_u64(&attr[0x38..0x40]),
        })
    }
}

/// Decoded $FILE_NAME attribute value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNameAttr {
    pub parent_ref: u64,
    pub allocated_size: u64,
    pub real_size: u64,
    pub flags: u32,
    /// 0=POSIX, 1=Win32, 2=DOS, 3=Win32+DOS
    pub namespace: u8,
    pub name: String,
}

impl FileNameAttr {
    /// Decode from the resident attribute value bytes.
    ///
    /// The name is UCS-2 little-endian; unpaired surrogates are replaced
    /// rather than rejected.
    pub fn decode(value: &[u8]) -> Result<Self, MftDumpError> {
        if value.len() < FILE_NAME_FIXED_LEN {
            return Err(MftDumpError::MalformedStructure(format!(
                "$FILE_NAME value needs {FILE_NAME_FIXED_LEN} bytes, have {}",
                value.len()
            )));
        }
        let name_length = value[0x40] as usize;
        let namespace = value[0x41];
        let name_end = FILE_NAME_FIXED_LEN + name_length * 2;
        if name_end > value.len() {
            return Err(MftDumpError::MalformedStructure(format!(
                "$FILE_NAME name of {name_length} units overruns the {} byte value",
                value.len()
            )));
        }

        let units: Vec<u16> = (0..name_length)
            .map(|i| {
                LittleEndian::read_u16(&value[FILE_NAME_FIXED_LEN + i * 2..FILE_NAME_FIXED_LEN + i * 2 + 2])
            })
            .collect();

        Ok(Self {
            parent_ref: LittleEndian::read_u64(&value[0x00..0x08]),
            allocated_size: LittleEndian::read_u64(&value[0x28..0x30]),
            real_size: LittleEndian::read_u64(&value[0x30..0x38]),
            flags: LittleEndian::read_u32(&value[0x38..0x3C]),
            namespace,
            name: String::from_utf16_lossy(&units),
        })
    }
}

/// One attribute viewed in place inside a record buffer.
#[derive(Debug, Clone)]
pub struct Attribute<'a> {
    /// Byte offset of the attribute within the record.
    pub offset: usize,
    pub header: AttributeHeader,
    /// The full attribute slice, header included.
    pub raw: &'a [u8],
}

impl<'a> Attribute<'a> {
    pub fn resident(&self) -> Result<ResidentHeader, MftDumpError> {
        ResidentHeader::decode(self.raw)
    }

    pub fn non_resident(&self) -> Result<NonResidentHeader, MftDumpError> {
        NonResidentHeader::decode(self.raw)
    }

    /// The content bytes of a resident attribute.
    pub fn resident_value(&self) -> Result<&'a [u8], MftDumpError> {
        let res = self.resident()?;
        let start = res.value_offset as usize;
        let end = start + res.value_length as usize;
        if end > self.raw.len() {
            return Err(MftDumpError::BadAttribute(format!(
                "resident content {start}..{end} overruns attribute of {} bytes",
                self.raw.len()
            )));
        }
        Ok(&self.raw[start..end])
    }

    /// The packed data-run bytes of a non-resident attribute.
    pub fn run_bytes(&self) -> Result<&'a [u8], MftDumpError> {
        let nonres = self.non_resident()?;
        let start = nonres.run_offset as usize;
        if start >= self.raw.len() {
            return Err(MftDumpError::BadAttribute(format!(
                "data-run offset {start} is outside the {} byte attribute",
                self.raw.len()
            )));
        }
        Ok(&self.raw[start..])
    }
}

/// Iterator over the attributes of one MFT record, yielding borrowed views.
///
/// Walks from the first-attribute offset, bounded by the record's used
/// size. An attribute whose length is zero or overruns the record stops
/// the walk with `BadAttribute`; the `0xFFFFFFFF` end marker stops it
/// cleanly.
pub struct Attributes<'a> {
    record: &'a [u8],
    cursor: usize,
    used: usize,
    done: bool,
}

impl<'a> Attributes<'a> {
    pub fn new(record: &'a [u8], first_offset: usize, used_size: usize) -> Self {
        Attributes {
            record,
            cursor: first_offset,
            used: used_size.min(record.len()),
            done: false,
        }
    }
}

impl<'a> Iterator for Attributes<'a> {
    type Item = Result<Attribute<'a>, MftDumpError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        // Space for at least a type + length header must remain.
        if self.cursor + 8 >= self.used {
            self.done = true;
            return None;
        }
        if self.cursor + ATTR_HEADER_LEN > self.record.len() {
            self.done = true;
            return Some(Err(MftDumpError::BadAttribute(format!(
                "attribute header at {} truncated by the record end",
                self.cursor
            ))));
        }

        let header = match AttributeHeader::decode(&self.record[self.cursor..]) {
            Ok(h) => h,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };
        if header.type_code == ATTR_END || header.type_code == 0 {
            self.done = true;
            return None;
        }

        let full_length = header.full_length as usize;
        if full_length < ATTR_HEADER_LEN || self.cursor + full_length > self.record.len() {
            self.done = true;
            return Some(Err(MftDumpError::BadAttribute(format!(
                "attribute at {} reports length {} beyond the {} byte record",
                self.cursor,
                header.full_length,
                self.record.len()
            ))));
        }

        let offset = self.cursor;
        let raw = &self.record[offset..offset + full_length];
        self.cursor += full_length;
        Some(Ok(Attribute {
            offset,
            header,
            raw,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a resident attribute with the given type and value bytes.
    fn make_resident_attr(type_code: u32, value: &[u8]) -> Vec<u8> {
        let value_offset = 24u16;
        let full_length = (value_offset as usize + value.len() + 7) & !7;
        let mut out = vec![0u8; full_length];
        out[0..16].copy_from_slice(
            &AttributeHeader {
                type_code,
                full_length: full_length as u32,
                non_resident: false,
                name_length: 0,
                name_offset: 0,
                flags: 0,
                id: 0,
            }
            .to_bytes(),
        );
        LittleEndian::write_u32(&mut out[0x10..0x14], value.len() as u32);
        LittleEndian::write_u16(&mut out[0x14..0x16], value_offset);
        out[value_offset as usize..value_offset as usize + value.len()].copy_from_slice(value);
        out
    }

    fn make_file_name_value(name: &str, flags: u32) -> Vec<u8> {
        let units: Vec<u16> = name.encode_utf16().collect();
        let mut value = vec![0u8; FILE_NAME_FIXED_LEN + units.len() * 2];
        LittleEndian::write_u64(&mut value[0x00..0x08], 5);
        LittleEndian::write_u64(&mut value[0x28..0x30], 4096);
        LittleEndian::write_u64(&mut value[0x30..0x38], 1234);
        LittleEndian::write_u32(&mut value[0x38..0x3C], flags);
        value[0x40] = units.len() as u8;
        value[0x41] = 1; // Win32 namespace
        for (i, unit) in units.iter().enumerate() {
            LittleEndian::write_u16(
                &mut value[FILE_NAME_FIXED_LEN + i * 2..FILE_NAME_FIXED_LEN + i * 2 + 2],
                *unit,
            );
        }
        value
    }

    #[test]
    fn test_attribute_header_round_trip() {
        let header = AttributeHeader {
            type_code: 0x80,
            full_length: 72,
            non_resident: true,
            name_length: 0,
            name_offset: 0x40,
            flags: 0,
            id: 3,
        };
        let raw = header.to_bytes();
        assert_eq!(AttributeHeader::decode(&raw).unwrap(), header);
    }

    #[test]
    fn test_attribute_type_classification() {
        assert_eq!(AttributeType::from_code(0x30), Some(AttributeType::FileName));
        assert_eq!(AttributeType::from_code(0x80), Some(AttributeType::Data));
        assert_eq!(
            AttributeType::from_code(0x100),
            Some(AttributeType::LoggedUtilityStream)
        );
        assert_eq!(AttributeType::from_code(0x123), None);
        assert_eq!(AttributeType::Data.name(), "$DATA");
    }

    #[test]
    fn test_file_name_decode() {
        let value = make_file_name_value("hello.txt", 0x20);
        let parsed = FileNameAttr::decode(&value).unwrap();
        assert_eq!(parsed.name, "hello.txt");
        assert_eq!(parsed.parent_ref, 5);
        assert_eq!(parsed.real_size, 1234);
        assert_eq!(parsed.namespace, 1);
    }

    #[test]
    fn test_file_name_overrun_rejected() {
        let mut value = make_file_name_value("a", 0);
        value[0x40] = 200; // claims a name far past the value end
        assert!(FileNameAttr::decode(&value).is_err());
    }

    #[test]
    fn test_resident_value_view() {
        let attr_bytes = make_resident_attr(0x30, b"abcdef");
        let header = AttributeHeader::decode(&attr_bytes).unwrap();
        let attr = Attribute {
            offset: 0,
            header,
            raw: &attr_bytes,
        };
        assert_eq!(attr.resident_value().unwrap(), b"abcdef");
    }

    #[test]
    fn test_iterate_attributes() {
        // Record with two resident attributes then the end marker.
        let mut record = vec![0u8; 1024];
        let first = make_resident_attr(0x10, &[0u8; 48]);
        let second = make_resident_attr(0x30, &make_file_name_value("f.txt", 0));
        let start = 0x38;
        record[start..start + first.len()].copy_from_slice(&first);
        let second_off = start + first.len();
        record[second_off..second_off + second.len()].copy_from_slice(&second);
        let end_off = second_off + second.len();
        record[end_off..end_off + 4].copy_from_slice(&ATTR_END.to_le_bytes());
        let used = end_off + 8;

        let attrs: Vec<_> = Attributes::new(&record, start, used)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs[0].header.type_code, 0x10);
        assert_eq!(attrs[1].header.type_code, 0x30);
        let name = FileNameAttr::decode(attrs[1].resident_value().unwrap()).unwrap();
        assert_eq!(name.name, "f.txt");
    }

    #[test]
    fn test_oversized_attribute_is_bad() {
        let mut record = vec![0u8; 1024];
        let start = 0x38;
        let header = AttributeHeader {
            type_code: 0x80,
            full_length: 5000,
            non_resident: false,
            name_length: 0,
            name_offset: 0,
            flags: 0,
            id: 0,
        }
        .to_bytes();
        record[start..start + 16].copy_from_slice(&header);

        let mut iter = Attributes::new(&record, start, 1024);
        match iter.next() {
            Some(Err(MftDumpError::BadAttribute(_))) => {}
            other => panic!("expected BadAttribute, got {other:?}"),
        }
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_zero_length_attribute_is_bad() {
        let mut record = vec![0u8; 1024];
        let start = 0x38;
        record[start..start + 4].copy_from_slice(&0x30u32.to_le_bytes());
        // full_length stays zero

        let mut iter = Attributes::new(&record, start, 1024);
        assert!(matches!(
            iter.next(),
            Some(Err(MftDumpError::BadAttribute(_)))
        ));
    }
}
