use std::collections::BTreeMap;
use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::error::MftDumpError;

/// Positioned reader over the raw block device.
///
/// Owns the device handle for the whole run and keeps the current byte
/// offset as observable state. All reads are exact: a read shorter than
/// the buffer is an error, the device is not a stream.
pub struct Session<R> {
    inner: R,
    offset: u64,
}

impl Session<File> {
    /// Open a block device (or disk image) read-only.
    pub fn open(path: &Path) -> Result<Self, MftDumpError> {
        let file = File::open(path)?;
        Ok(Session {
            inner: file,
            offset: 0,
        })
    }
}

impl<R: Read + Seek> Session<R> {
    /// Wrap an already-open seekable source (used by tests with `Cursor`).
    pub fn new(inner: R) -> Self {
        Session { inner, offset: 0 }
    }

    /// Current byte offset on the device.
    pub fn position(&self) -> u64 {
        self.offset
    }

    /// Seek to an absolute byte offset. Returns the new offset.
    pub fn seek_abs(&mut self, offset: u64) -> Result<u64, MftDumpError> {
        self.offset = self.inner.seek(SeekFrom::Start(offset))?;
        Ok(self.offset)
    }

    /// Seek relative to the current offset. Returns the new offset.
    pub fn seek_rel(&mut self, delta: i64) -> Result<u64, MftDumpError> {
        self.offset = self.inner.seek(SeekFrom::Current(delta))?;
        Ok(self.offset)
    }

    /// Total size of the device in bytes. Restores the current offset.
    pub fn device_len(&mut self) -> Result<u64, MftDumpError> {
        let saved = self.offset;
        let len = self.inner.seek(SeekFrom::End(0))?;
        self.offset = self.inner.seek(SeekFrom::Start(saved))?;
        Ok(len)
    }

    /// Fill `buf` completely from the current offset.
    ///
    /// A short read is reported as `ShortRead` with the offset the read
    /// started at; the session offset still advances past the bytes that
    /// were consumed.
    pub fn read_into(&mut self, buf: &mut [u8]) -> Result<(), MftDumpError> {
        let start = self.offset;
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => {
                    return Err(MftDumpError::ShortRead {
                        offset: start,
                        wanted: buf.len(),
                        got: filled,
                    })
                }
                Ok(n) => {
                    filled += n;
                    self.offset += n as u64;
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

/// A candidate block device for raw reading.
#[derive(Debug, Clone)]
pub struct BlockDevice {
    pub name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub is_removable: bool,
}

impl BlockDevice {
    pub fn display_name(&self) -> String {
        let mut label = format!(
            "{} ({})",
            self.path.display(),
            crate::partition::format_size(self.size_bytes)
        );
        if self.is_removable {
            label.push_str(" [removable]");
        }
        label
    }
}

/// Enumerate disk devices using sysinfo.
///
/// sysinfo reports mounted volumes; volumes are grouped under their
/// parent device (`sda1` -> `sda`, `nvme0n1p2` -> `nvme0n1`) so the
/// caller gets whole-disk paths suitable for raw partition-table reads.
pub fn enumerate_devices() -> Vec<BlockDevice> {
    let disks = sysinfo::Disks::new_with_refreshed_list();

    let mut device_map: BTreeMap<String, BlockDevice> = BTreeMap::new();

    for disk in disks.list() {
        let volume_name = disk.name().to_string_lossy().to_string();
        let parent = parent_device_name(volume_name.trim_start_matches("/dev/"));

        let entry = device_map
            .entry(parent.clone())
            .or_insert_with(|| BlockDevice {
                name: parent.clone(),
                path: device_path_from_name(&parent),
                size_bytes: 0,
                is_removable: false,
            });

        entry.size_bytes += disk.total_space();
        if disk.is_removable() {
            entry.is_removable = true;
        }
    }

    device_map.into_values().collect()
}

/// Strip the partition suffix from a kernel volume name, leaving the
/// whole-disk name. The suffix convention depends on the driver family:
/// `sd`/`vd`/`hd`/`xvd` devices append bare digits, `nvme` and `mmcblk`
/// devices insert a `p` before the digits, macOS `disk` devices an `s`.
/// A name with no recognisable suffix is returned unchanged.
pub fn parent_device_name(volume: &str) -> String {
    if volume.starts_with("nvme") || volume.starts_with("mmcblk") {
        // nvme0n1p2 -> nvme0n1, mmcblk0p1 -> mmcblk0. The disk part must
        // still end in a digit (the namespace or controller number), so a
        // bare disk name with no `p<n>` suffix never gets truncated.
        if let Some((disk, part)) = volume.rsplit_once('p') {
            if !part.is_empty()
                && part.bytes().all(|b| b.is_ascii_digit())
                && disk.ends_with(|c: char| c.is_ascii_digit())
            {
                return disk.to_string();
            }
        }
        return volume.to_string();
    }

    if volume.starts_with("disk") {
        // disk2s1 -> disk2. Split on the last `s`; "disk" itself contains
        // an `s`, so the candidate disk part must read disk<digits>.
        if let Some((disk, part)) = volume.rsplit_once('s') {
            if !part.is_empty()
                && part.bytes().all(|b| b.is_ascii_digit())
                && disk.len() > 4
                && disk[4..].bytes().all(|b| b.is_ascii_digit())
            {
                return disk.to_string();
            }
        }
        return volume.to_string();
    }

    if volume.starts_with("sd")
        || volume.starts_with("vd")
        || volume.starts_with("hd")
        || volume.starts_with("xvd")
    {
        // sda1 -> sda, xvda2 -> xvda
        return volume
            .trim_end_matches(|c: char| c.is_ascii_digit())
            .to_string();
    }

    volume.to_string()
}

fn device_path_from_name(name: &str) -> PathBuf {
    if cfg!(target_os = "windows") {
        PathBuf::from(format!("\\\\.\\{name}"))
    } else {
        PathBuf::from(format!("/dev/{name}"))
    }
}
