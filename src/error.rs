use thiserror::Error;

#[derive(Error, Debug)]
pub enum MftDumpError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("short read at offset {offset}: wanted {wanted} bytes, got {got}")]
    ShortRead {
        offset: u64,
        wanted: usize,
        got: usize,
    },

    #[error("malformed structure: {0}")]
    MalformedStructure(String),

    #[error("malformed boot sector: {0}")]
    MalformedBootSector(String),

    #[error("malformed run list: {0}")]
    MalformedRunList(String),

    #[error("bad attribute: {0}")]
    BadAttribute(String),

    #[error("unexpected MFT layout: {0}")]
    UnexpectedMftLayout(String),

    #[error("corrupt MFT copy: {0}")]
    CorruptMft(String),

    #[error("No NTFS partitions found, please check user privileges")]
    NoNtfsPartitions,
}
