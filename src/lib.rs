pub mod catalogue;
pub mod device;
pub mod error;
pub mod extract;
pub mod mft;
pub mod partition;
pub mod report;
pub mod scan;

pub use error::MftDumpError;
