//! On-disk structures of the `.dat` container
//!
//! All multi-byte integers are little-endian. The CRC fields are carried
//! through unverified; the checksum algorithm is not public.

/// MFT identifier bytes: ASCII `Mft` followed by `0x1A`.
pub const MFT_MAGIC: [u8; 4] = [0x4D, 0x66, 0x74, 0x1A];

/// Size of the primary header on disk.
pub(crate) const DAT_HEADER_SIZE: usize = 40;

/// Size of the MFT header on disk.
pub(crate) const MFT_HEADER_SIZE: usize = 24;

/// Size of one MFT entry on disk.
pub(crate) const MFT_ENTRY_SIZE: usize = 24;

/// Size of one index record on disk.
pub(crate) const INDEX_RECORD_SIZE: usize = 8;

/// Zero-based MFT position of the entry whose payload is the index table.
pub(crate) const INDEX_ENTRY: usize = 1;

/// Primary header at the start of a `.dat` archive.
#[derive(Debug, Clone)]
pub struct DatHeader {
    /// Format revision, accepted as-is.
    pub version: u8,
    /// Format tag, accepted as-is.
    pub identifier: [u8; 3],
    /// Size of this header in bytes.
    pub header_size: u32,
    pub unknown_field: u32,
    pub chunk_size: u32,
    /// Header checksum, not verified.
    pub crc: u32,
    pub unknown_field2: u32,
    /// Absolute byte offset of the MFT.
    pub mft_offset: u64,
    /// Size of the MFT region in bytes.
    pub mft_size: u32,
    pub flags: u32,
}

/// Header of the Master File Table.
#[derive(Debug, Clone)]
pub struct MftHeader {
    /// Identifier bytes, validated against [`MFT_MAGIC`].
    pub identifier: [u8; 4],
    pub unknown: u64,
    /// Number of MFT entries following this header.
    pub num_entries: u32,
    pub unknown_field2: u32,
    pub unknown_field3: u32,
}

/// One record of the MFT entry array.
#[derive(Debug, Clone, Copy)]
pub struct MftEntry {
    /// Absolute byte offset of the entry's payload.
    pub offset: u64,
    /// Payload size in bytes (possibly compressed).
    pub size: u32,
    /// Non-zero when the payload is stored compressed.
    pub compression_flag: u16,
    /// Opaque to this crate.
    pub entry_flag: u16,
    /// Opaque to this crate.
    pub counter: u32,
    /// Entry checksum, not verified.
    pub crc: u32,
}

impl MftEntry {
    /// Whether this entry's payload must be inflated after reading.
    #[must_use]
    pub fn is_compressed(&self) -> bool {
        self.compression_flag != 0
    }
}

/// One record of the index table (MFT entry #1's payload).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    /// Lookup key assigned to the asset.
    pub file_id: u32,
    /// Lookup key doubling as a 1-based index into the MFT entry array.
    pub base_id: u32,
}

/// Which identifier field of an index record a lookup key refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKind {
    FileId,
    BaseId,
}

impl LookupKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            LookupKind::FileId => "file ID",
            LookupKind::BaseId => "base ID",
        }
    }
}
