//! Human-readable dumps of the decoded on-disk structures, for
//! diagnostic logging. Consumers feed these to `log::debug!`.

use crate::mft::attr::AttributeHeader;
use crate::mft::boot::BootSector;
use crate::mft::record::MftRecordHeader;
use crate::partition::format_size;
use crate::partition::mbr::PartitionEntry;

pub fn describe_partition(entry: &PartitionEntry) -> String {
    if entry.is_empty() {
        return "empty partition table entry".into();
    }
    format!(
        "bootable: {}\n\
         partition type: {} ({:#04X})\n\
         start CHS: {}/{}/{}\n\
         end CHS: {}/{}/{}\n\
         relative sector: {}\n\
         total sectors: {}\n\
         partition size: {}",
        if entry.is_bootable() { "yes" } else { "no" },
        entry.partition_type_name(),
        entry.partition_type,
        entry.chs_start.cylinder,
        entry.chs_start.head,
        entry.chs_start.sector,
        entry.chs_end.cylinder,
        entry.chs_end.head,
        entry.chs_end.sector,
        entry.relative_sector,
        entry.total_sectors,
        format_size(entry.size_bytes()),
    )
}

pub fn describe_boot_sector(boot: &BootSector) -> String {
    format!(
        "bytes per sector: {}\n\
         sectors per cluster: {}\n\
         bytes per cluster: {}\n\
         total sectors: {}\n\
         volume size: {}\n\
         MFT cluster: {}\n\
         MFT mirror cluster: {}\n\
         MFT record size: {} (raw {})\n\
         index block size: {} (raw {})\n\
         volume serial: {:#018X}",
        boot.bytes_per_sector,
        boot.sectors_per_cluster,
        boot.bytes_per_cluster(),
        boot.total_sectors,
        format_size(boot.total_sectors * boot.bytes_per_sector as u64),
        boot.mft_lcn,
        boot.mft_mirror_lcn,
        boot.mft_record_size(),
        boot.clusters_per_record,
        boot.index_block_size(),
        boot.clusters_per_index,
        boot.volume_serial,
    )
}

pub fn describe_record_header(header: &MftRecordHeader) -> String {
    format!(
        "signature: {}\n\
         fixup offset/count: {}/{}\n\
         $LogFile sequence number: {}\n\
         sequence: {}\n\
         hard links: {}\n\
         first attribute offset: {}\n\
         flags: {:#06X} ({:?})\n\
         used size: {}\n\
         allocated size: {}\n\
         base record: {}\n\
         record number: {}",
        String::from_utf8_lossy(&header.signature),
        header.fixup_offset,
        header.fixup_count,
        header.log_seq_number,
        header.sequence,
        header.hard_links,
        header.attr_offset,
        header.flags,
        header.kind(),
        header.used_size,
        header.allocated_size,
        header.base_record,
        header.record_number,
    )
}

pub fn describe_attribute(header: &AttributeHeader) -> String {
    let type_name = header
        .attr_type()
        .map(|t| t.name())
        .unwrap_or("(unknown)");
    format!(
        "type: {} ({:#06X}), length {}, {}, name length {}, flags {:#06X}, id {}",
        type_name,
        header.type_code,
        header.full_length,
        if header.non_resident {
            "non-resident"
        } else {
            "resident"
        },
        header.name_length,
        header.flags,
        header.id,
    )
}
