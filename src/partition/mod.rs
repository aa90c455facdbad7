pub mod mbr;

use std::io::{Read, Seek};

use log::debug;

use crate::device::Session;
use crate::error::MftDumpError;
use crate::report;
use mbr::{Mbr, PartitionEntry};

/// Read the MBR from sector 0 and return the primary NTFS partitions,
/// each with its table index.
///
/// Fails with `NoNtfsPartitions` when no type-0x07 entry exists; on raw
/// devices that usually means the process lacks read rights and got an
/// empty or unreadable table.
pub fn locate_ntfs_partitions<R: Read + Seek>(
    session: &mut Session<R>,
) -> Result<Vec<(usize, PartitionEntry)>, MftDumpError> {
    session.seek_abs(0)?;
    let mut sector = [0u8; 512];
    session.read_into(&mut sector)?;

    let table = Mbr::decode(&sector)?;
    debug!("MBR disk signature: {:#010X}", table.disk_signature);

    let ntfs: Vec<(usize, PartitionEntry)> = table
        .ntfs_entries()
        .into_iter()
        .map(|(i, e)| (i, e.clone()))
        .collect();

    for (i, entry) in &ntfs {
        debug!("partition {i}:\n{}", report::describe_partition(entry));
    }

    if ntfs.is_empty() {
        return Err(MftDumpError::NoNtfsPartitions);
    }
    Ok(ntfs)
}

/// Format a byte count as a human-readable size string using binary units.
pub fn format_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * KIB;
    const GIB: u64 = 1024 * MIB;
    const TIB: u64 = 1024 * GIB;

    if bytes >= TIB {
        format!("{:.1} TiB", bytes as f64 / TIB as f64)
    } else if bytes >= GIB {
        format!("{:.1} GiB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}
