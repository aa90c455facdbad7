use std::io::{Read, Seek, Write};

use log::{debug, info, warn};
use serde::Serialize;

use crate::device::Session;
use crate::error::MftDumpError;
use crate::mft::attr::{AttributeType, Attributes, FileNameAttr};
use crate::mft::boot::BootSector;
use crate::mft::record::{FragmentMarker, MftRecordHeader, RECORD_HEADER_LEN};
use crate::mft::runlist::{decode_run_list, total_clusters, DataRun};
use crate::mft::MFT_RECORD_LEN;
use crate::partition::mbr::PartitionEntry;
use crate::report;

const COPY_CHUNK: usize = 1024 * 1024;

/// What one extraction produced, plus the volume geometry it was read
/// with. Serialized as the `.meta.json` sidecar of the local copy.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractSummary {
    pub partition_index: usize,
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub bytes_per_cluster: u64,
    pub mft_lcn: u64,
    pub mft_mirror_lcn: u64,
    pub mft_record_size: u64,
    pub volume_serial: u64,
    pub fragments: u32,
    pub bytes_written: u64,
    pub mft_real_size: u64,
    pub mft_allocated_size: u64,
}

/// Materialise the `$MFT` of one NTFS partition into `out`.
///
/// Every extent of the `$MFT` data runs is copied in order, preceded by
/// a `FragmentMarker` slot recording the absolute device offset the
/// extent came from. The device cursor is restored before returning, so
/// callers observe no position side effect.
pub fn extract_mft<R: Read + Seek, W: Write>(
    session: &mut Session<R>,
    partition: &PartitionEntry,
    partition_index: usize,
    out: &mut W,
) -> Result<ExtractSummary, MftDumpError> {
    let entry_position = session.position();
    let partition_start = partition.start_byte();

    session.seek_abs(partition_start)?;
    let mut sector = [0u8; 512];
    session.read_into(&mut sector)?;
    let boot = BootSector::decode(&sector)?;
    debug!(
        "boot sector of partition {partition_index}:\n{}",
        report::describe_boot_sector(&boot)
    );

    let bytes_per_cluster = boot.bytes_per_cluster();
    let device_len = session.device_len()?;
    let mft_offset = boot
        .mft_lcn
        .checked_mul(bytes_per_cluster)
        .and_then(|rel| rel.checked_add(partition_start))
        .ok_or_else(|| {
            MftDumpError::MalformedBootSector(format!(
                "MFT cluster {} overflows the device offset space",
                boot.mft_lcn
            ))
        })?;
    if mft_offset
        .checked_add(MFT_RECORD_LEN as u64)
        .map_or(true, |end| end > device_len)
    {
        return Err(MftDumpError::MalformedBootSector(format!(
            "MFT offset {mft_offset} lies past the {device_len} byte device"
        )));
    }

    // Record 0 is $MFT itself; its DATA runs describe the whole table.
    session.seek_abs(mft_offset)?;
    let mut record = [0u8; MFT_RECORD_LEN];
    session.read_into(&mut record)?;

    let header = MftRecordHeader::decode(&record)?;
    debug!(
        "MFT record 0:\n{}",
        report::describe_record_header(&header)
    );
    if !header.is_file_record() {
        return Err(MftDumpError::MalformedStructure(format!(
            "MFT record 0 signature is {:?}, not \"FILE\"",
            String::from_utf8_lossy(&header.signature)
        )));
    }
    if header.used_size as usize > MFT_RECORD_LEN {
        return Err(MftDumpError::MalformedStructure(format!(
            "MFT record 0 used size {} exceeds the record length",
            header.used_size
        )));
    }
    if (header.attr_offset as usize) < RECORD_HEADER_LEN
        || header.attr_offset as u32 >= header.used_size
    {
        return Err(MftDumpError::MalformedStructure(format!(
            "MFT record 0 first attribute offset {} is out of range",
            header.attr_offset
        )));
    }

    let mut file_name: Option<String> = None;
    let mut data_attr: Option<(u64, u64, Vec<DataRun>)> = None;

    for attr in Attributes::new(&record, header.attr_offset as usize, header.used_size as usize) {
        let attr = attr?;
        debug!("attribute: {}", report::describe_attribute(&attr.header));
        match attr.header.attr_type() {
            Some(AttributeType::FileName) => {
                let parsed = FileNameAttr::decode(attr.resident_value()?)?;
                file_name = Some(parsed.name);
            }
            Some(AttributeType::Data) if attr.header.non_resident => {
                let nonres = attr.non_resident()?;
                let runs = decode_run_list(attr.run_bytes()?)?;
                data_attr = Some((nonres.allocated_size, nonres.real_size, runs));
            }
            _ => {}
        }
    }

    match file_name.as_deref() {
        Some("$MFT") => {}
        other => {
            return Err(MftDumpError::UnexpectedMftLayout(format!(
                "MFT record 0 is named {other:?}, expected \"$MFT\""
            )))
        }
    }
    let (allocated_size, real_size, runs) = data_attr.ok_or_else(|| {
        MftDumpError::UnexpectedMftLayout(
            "MFT record 0 carries no non-resident $DATA attribute".into(),
        )
    })?;

    let covered_bytes = total_clusters(&runs)
        .checked_mul(bytes_per_cluster)
        .ok_or_else(|| MftDumpError::MalformedRunList("run list cluster count overflows".into()))?;
    if covered_bytes < real_size {
        return Err(MftDumpError::MalformedRunList(format!(
            "run list covers {covered_bytes} bytes but $MFT real size is {real_size}"
        )));
    }

    if runs.len() > 1 {
        info!(
            "$MFT is fragmented on disk, located {} fragments",
            runs.len()
        );
    }

    let mut lcn: i64 = 0;
    let mut bytes_written: u64 = 0;
    let mut fragments: u32 = 0;
    let mut chunk = vec![0u8; COPY_CHUNK];

    for run in &runs {
        if run.sparse {
            warn!(
                "skipping sparse $MFT run of {} clusters (no device extent to record)",
                run.length
            );
            continue;
        }
        lcn += run.offset;
        if lcn < 0 {
            return Err(MftDumpError::MalformedRunList(format!(
                "run list walks to negative LCN {lcn}"
            )));
        }

        let absolute = (lcn as u64)
            .checked_mul(bytes_per_cluster)
            .and_then(|rel| rel.checked_add(partition_start))
            .ok_or_else(|| {
                MftDumpError::MalformedRunList(format!("LCN {lcn} overflows the offset space"))
            })?;
        let size = run
            .length
            .checked_mul(bytes_per_cluster)
            .ok_or_else(|| {
                MftDumpError::MalformedRunList(format!("run of {} clusters overflows", run.length))
            })?;
        if absolute
            .checked_add(size)
            .map_or(true, |end| end > device_len)
        {
            return Err(MftDumpError::MalformedRunList(format!(
                "run at {absolute} of {size} bytes lies past the device end"
            )));
        }
        debug!("extent: {} bytes at device offset {absolute}", size);

        out.write_all(&FragmentMarker { offset: absolute }.to_slot())?;

        session.seek_abs(absolute)?;
        let mut remaining = size;
        while remaining > 0 {
            let take = remaining.min(chunk.len() as u64) as usize;
            session.read_into(&mut chunk[..take])?;
            out.write_all(&chunk[..take])?;
            remaining -= take as u64;
        }
        bytes_written += size;
        fragments += 1;
    }

    // Leave the device cursor where the caller had it.
    session.seek_abs(entry_position)?;

    Ok(ExtractSummary {
        partition_index,
        bytes_per_sector: boot.bytes_per_sector,
        sectors_per_cluster: boot.sectors_per_cluster,
        bytes_per_cluster,
        mft_lcn: boot.mft_lcn,
        mft_mirror_lcn: boot.mft_mirror_lcn,
        mft_record_size: boot.mft_record_size(),
        volume_serial: boot.volume_serial,
        fragments,
        bytes_written,
        mft_real_size: real_size,
        mft_allocated_size: allocated_size,
    })
}
