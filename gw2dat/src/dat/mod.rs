//! `.dat` archive parsing and entry extraction

mod reader;
mod types;

pub use reader::DatArchive;
pub use types::{DatHeader, IndexEntry, LookupKind, MftEntry, MftHeader, MFT_MAGIC};
