use byteorder::{ByteOrder, LittleEndian};
use serde::Serialize;

use crate::error::MftDumpError;

const OEM_ID: &[u8; 8] = b"NTFS    ";

/// NTFS boot sector / BIOS Parameter Block fields.
///
/// Only the fields the extraction pipeline needs are decoded; the jump
/// instruction, boot code and checksum areas are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BootSector {
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub total_sectors: u64,
    pub mft_lcn: u64,
    pub mft_mirror_lcn: u64,
    /// Signed encoding: positive = clusters per record, negative = log2 of
    /// the record size in bytes.
    pub clusters_per_record: i8,
    pub clusters_per_index: i8,
    pub volume_serial: u64,
}

impl BootSector {
    /// Decode the boot sector from its first 512 bytes.
    pub fn decode(data: &[u8]) -> Result<Self, MftDumpError> {
        if data.len() < 512 {
            return Err(MftDumpError::MalformedStructure(format!(
                "boot sector needs 512 bytes, have {}",
                data.len()
            )));
        }
        if &data[3..11] != OEM_ID {
            return Err(MftDumpError::MalformedBootSector(
                "OEM ID is not \"NTFS    \"".into(),
            ));
        }

        let bytes_per_sector = LittleEndian::read_u16(&data[0x0B..0x0D]);
        if !bytes_per_sector.is_power_of_two()
            || bytes_per_sector < 512
            || bytes_per_sector > 4096
        {
            return Err(MftDumpError::MalformedBootSector(format!(
                "bytes per sector {bytes_per_sector} is not a power of two in 512..=4096"
            )));
        }

        let sectors_per_cluster = data[0x0D];
        if sectors_per_cluster == 0 {
            return Err(MftDumpError::MalformedBootSector(
                "sectors per cluster is 0".into(),
            ));
        }

        Ok(Self {
            bytes_per_sector,
            sectors_per_cluster,
            total_sectors: LittleEndian::read_u64(&data[0x28..0x30]),
            mft_lcn: LittleEndian::read_u64(&data[0x30..0x38]),
            mft_mirror_lcn: LittleEndian::read_u64(&data[0x38..0x40]),
            clusters_per_record: data[0x40] as i8,
            clusters_per_index: data[0x44] as i8,
            volume_serial: LittleEndian::read_u64(&data[0x48..0x50]),
        })
    }

    /// Re-encode the decoded fields into a 512-byte sector image.
    /// Code and padding areas come out zeroed, so this is a field-level
    /// round trip, not a byte-exact one.
    pub fn to_bytes(&self) -> [u8; 512] {
        let mut out = [0u8; 512];
        out[3..11].copy_from_slice(OEM_ID);
        LittleEndian::write_u16(&mut out[0x0B..0x0D], self.bytes_per_sector);
        out[0x0D] = self.sectors_per_cluster;
        LittleEndian::write_u64(&mut out[0x28..0x30], self.total_sectors);
        LittleEndian::write_u64(&mut out[0x30..0x38], self.mft_lcn);
        LittleEndian::write_u64(&mut out[0x38..0x40], self.mft_mirror_lcn);
        out[0x40] = self.clusters_per_record as u8;
        out[0x44] = self.clusters_per_index as u8;
        LittleEndian::write_u64(&mut out[0x48..0x50], self.volume_serial);
        out[510] = 0x55;
        out[511] = 0xAA;
        out
    }

    pub fn bytes_per_cluster(&self) -> u64 {
        self.bytes_per_sector as u64 * self.sectors_per_cluster as u64
    }

    /// MFT record size in bytes, following the signed BPB convention:
    /// a negative value v means 2^|v| bytes, a positive value counts
    /// clusters per record.
    pub fn mft_record_size(&self) -> u64 {
        if self.clusters_per_record < 0 {
            1u64 << (-self.clusters_per_record as u32)
        } else {
            self.clusters_per_record as u64 * self.bytes_per_cluster()
        }
    }

    /// Index block size in bytes, same signed convention.
    pub fn index_block_size(&self) -> u64 {
        if self.clusters_per_index < 0 {
            1u64 << (-self.clusters_per_index as u32)
        } else {
            self.clusters_per_index as u64 * self.bytes_per_cluster()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_boot_sector() -> [u8; 512] {
        let mut vbr = [0u8; 512];
        vbr[0] = 0xEB;
        vbr[1] = 0x52;
        vbr[2] = 0x90;
        vbr[3..11].copy_from_slice(b"NTFS    ");
        vbr[0x0B..0x0D].copy_from_slice(&512u16.to_le_bytes());
        vbr[0x0D] = 8;
        vbr[0x28..0x30].copy_from_slice(&102400u64.to_le_bytes());
        vbr[0x30..0x38].copy_from_slice(&786432u64.to_le_bytes());
        vbr[0x38..0x40].copy_from_slice(&2u64.to_le_bytes());
        vbr[0x40] = (-10i8) as u8; // 2^10 = 1024-byte records
        vbr[0x44] = 1;
        vbr[0x48..0x50].copy_from_slice(&0x1234567890ABCDEFu64.to_le_bytes());
        vbr[510] = 0x55;
        vbr[511] = 0xAA;
        vbr
    }

    #[test]
    fn test_decode_valid() {
        let parsed = BootSector::decode(&make_boot_sector()).unwrap();
        assert_eq!(parsed.bytes_per_sector, 512);
        assert_eq!(parsed.sectors_per_cluster, 8);
        assert_eq!(parsed.total_sectors, 102400);
        assert_eq!(parsed.mft_lcn, 786432);
        assert_eq!(parsed.mft_mirror_lcn, 2);
        assert_eq!(parsed.volume_serial, 0x1234567890ABCDEF);
        assert_eq!(parsed.bytes_per_cluster(), 4096);
        assert_eq!(parsed.mft_record_size(), 1024);
    }

    #[test]
    fn test_mft_device_offset_arithmetic() {
        // bytes_per_sector=512, sectors_per_cluster=8, mft_lcn=786432:
        // cluster size 4096, MFT sits 786432 * 4096 bytes into the volume.
        let parsed = BootSector::decode(&make_boot_sector()).unwrap();
        let partition_start = 2048u64 * 512;
        let offset = partition_start + parsed.mft_lcn * parsed.bytes_per_cluster();
        assert_eq!(offset, 2048 * 512 + 786432 * 4096);
    }

    #[test]
    fn test_decode_bad_oem() {
        let mut vbr = make_boot_sector();
        vbr[3..11].copy_from_slice(b"MSDOS5.0");
        assert!(matches!(
            BootSector::decode(&vbr),
            Err(MftDumpError::MalformedBootSector(_))
        ));
    }

    #[test]
    fn test_decode_bad_sector_size() {
        let mut vbr = make_boot_sector();
        vbr[0x0B..0x0D].copy_from_slice(&0u16.to_le_bytes());
        assert!(BootSector::decode(&vbr).is_err());

        let mut vbr = make_boot_sector();
        vbr[0x0B..0x0D].copy_from_slice(&768u16.to_le_bytes());
        assert!(BootSector::decode(&vbr).is_err());

        let mut vbr = make_boot_sector();
        vbr[0x0B..0x0D].copy_from_slice(&8192u16.to_le_bytes());
        assert!(BootSector::decode(&vbr).is_err());
    }

    #[test]
    fn test_decode_zero_sectors_per_cluster() {
        let mut vbr = make_boot_sector();
        vbr[0x0D] = 0;
        assert!(BootSector::decode(&vbr).is_err());
    }

    #[test]
    fn test_record_size_positive_encoding() {
        // 2 clusters per record, 8 sectors per cluster, 512-byte sectors
        let mut vbr = make_boot_sector();
        vbr[0x40] = 2;
        let parsed = BootSector::decode(&vbr).unwrap();
        assert_eq!(parsed.mft_record_size(), 8192);
    }

    #[test]
    fn test_field_round_trip() {
        let parsed = BootSector::decode(&make_boot_sector()).unwrap();
        let reparsed = BootSector::decode(&parsed.to_bytes()).unwrap();
        assert_eq!(parsed, reparsed);
    }
}
