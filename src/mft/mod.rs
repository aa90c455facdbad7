pub mod attr;
pub mod boot;
pub mod record;
pub mod runlist;

/// MFT FILE records are read in fixed 1024-byte units.
pub const MFT_RECORD_LEN: usize = 1024;
