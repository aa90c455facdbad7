use byteorder::{ByteOrder, LittleEndian};
use serde::Serialize;

use crate::error::MftDumpError;

const MBR_SIGNATURE: u16 = 0xAA55;
const PARTITION_TABLE_OFFSET: usize = 0x1BE;
const PARTITION_ENTRY_SIZE: usize = 16;

/// Sector size assumed by the MBR addressing scheme.
pub const SECTOR_SIZE: u64 = 512;

/// Partition type byte for NTFS.
pub const NTFS_TYPE: u8 = 0x07;

/// Boot indicator byte for a bootable partition.
pub const BOOT_INDICATOR: u8 = 0x80;

/// CHS (Cylinder-Head-Sector) address from an MBR partition entry.
/// Informational only; all addressing goes through the LBA fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChsAddress {
    pub head: u8,
    pub sector: u8,    // bits 0-5 only (6 bits)
    pub cylinder: u16, // 10 bits: 2 high bits from sector byte + 8 bits from cylinder byte
}

impl ChsAddress {
    fn decode(bytes: &[u8; 3]) -> Self {
        Self {
            head: bytes[0],
            sector: bytes[1] & 0x3F,
            cylinder: ((bytes[1] as u16 & 0xC0) << 2) | bytes[2] as u16,
        }
    }

    fn encode(&self) -> [u8; 3] {
        [
            self.head,
            (self.sector & 0x3F) | ((self.cylinder >> 2) as u8 & 0xC0),
            self.cylinder as u8,
        ]
    }
}

/// A single 16-byte MBR partition table entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionEntry {
    /// Raw boot indicator byte; 0x80 means bootable.
    pub boot_indicator: u8,
    pub partition_type: u8,
    /// Start of the partition in 512-byte sectors from the device start.
    pub relative_sector: u32,
    pub total_sectors: u32,
    pub chs_start: ChsAddress,
    pub chs_end: ChsAddress,
}

impl PartitionEntry {
    /// Decode one partition entry from its 16 on-disk bytes.
    pub fn decode(data: &[u8]) -> Result<Self, MftDumpError> {
        if data.len() < PARTITION_ENTRY_SIZE {
            return Err(MftDumpError::MalformedStructure(format!(
                "partition entry needs {PARTITION_ENTRY_SIZE} bytes, have {}",
                data.len()
            )));
        }
        Ok(Self {
            boot_indicator: data[0],
            chs_start: ChsAddress::decode(&[data[1], data[2], data[3]]),
            partition_type: data[4],
            chs_end: ChsAddress::decode(&[data[5], data[6], data[7]]),
            relative_sector: LittleEndian::read_u32(&data[8..12]),
            total_sectors: LittleEndian::read_u32(&data[12..16]),
        })
    }

    /// Re-encode to the 16 on-disk bytes.
    pub fn to_bytes(&self) -> [u8; PARTITION_ENTRY_SIZE] {
        let mut out = [0u8; PARTITION_ENTRY_SIZE];
        out[0] = self.boot_indicator;
        out[1..4].copy_from_slice(&self.chs_start.encode());
        out[4] = self.partition_type;
        out[5..8].copy_from_slice(&self.chs_end.encode());
        LittleEndian::write_u32(&mut out[8..12], self.relative_sector);
        LittleEndian::write_u32(&mut out[12..16], self.total_sectors);
        out
    }

    /// An entry is empty when it describes zero sectors.
    pub fn is_empty(&self) -> bool {
        self.total_sectors == 0
    }

    pub fn is_ntfs(&self) -> bool {
        self.partition_type == NTFS_TYPE
    }

    /// Bootable per the MBR specification: indicator byte 0x80 exactly.
    pub fn is_bootable(&self) -> bool {
        self.boot_indicator == BOOT_INDICATOR
    }

    /// Absolute byte offset of the partition start on the device.
    pub fn start_byte(&self) -> u64 {
        self.relative_sector as u64 * SECTOR_SIZE
    }

    pub fn size_bytes(&self) -> u64 {
        self.total_sectors as u64 * SECTOR_SIZE
    }

    pub fn partition_type_name(&self) -> &'static str {
        match self.partition_type {
            0x00 => "Empty",
            0x01 => "FAT12",
            0x04 => "FAT16 (<32MB)",
            0x05 => "Extended",
            0x06 => "FAT16 (>32MB)",
            0x07 => "NTFS/HPFS/exFAT",
            0x0B => "FAT32 (CHS)",
            0x0C => "FAT32 (LBA)",
            0x0E => "FAT16 (LBA)",
            0x0F => "Extended (LBA)",
            0x27 => "Windows RE",
            0x82 => "Linux swap",
            0x83 => "Linux",
            0x85 => "Linux Extended",
            0x8E => "Linux LVM",
            0xEE => "GPT Protective",
            0xEF => "EFI System",
            _ => "Unknown",
        }
    }
}

/// Parsed MBR (Master Boot Record).
#[derive(Debug, Clone)]
pub struct Mbr {
    pub disk_signature: u32,
    pub entries: [PartitionEntry; 4],
}

impl Mbr {
    /// Parse an MBR from exactly 512 bytes.
    pub fn decode(data: &[u8; 512]) -> Result<Self, MftDumpError> {
        // Boot signature at bytes 510-511
        let signature = LittleEndian::read_u16(&data[510..512]);
        if signature != MBR_SIGNATURE {
            return Err(MftDumpError::MalformedStructure(format!(
                "invalid MBR boot signature: expected 0xAA55, got {signature:#06X}"
            )));
        }

        let disk_signature = LittleEndian::read_u32(&data[440..444]);

        let mut entries = Vec::with_capacity(4);
        for i in 0..4 {
            let offset = PARTITION_TABLE_OFFSET + i * PARTITION_ENTRY_SIZE;
            entries.push(PartitionEntry::decode(&data[offset..offset + PARTITION_ENTRY_SIZE])?);
        }
        let entries: [PartitionEntry; 4] = entries.try_into().expect("exactly four entries");

        Ok(Self {
            disk_signature,
            entries,
        })
    }

    /// The primary NTFS partitions (type 0x07), with their table index.
    pub fn ntfs_entries(&self) -> Vec<(usize, &PartitionEntry)> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| !e.is_empty() && e.is_ntfs())
            .collect()
    }
}
