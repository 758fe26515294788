//! Error types for `gw2dat`

use thiserror::Error;

/// The error type for `gw2dat` operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    // ==================== IO Errors ====================
    /// IO error from the underlying byte source.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ==================== Archive Errors ====================
    /// The MFT identifier did not match the expected magic bytes.
    #[error("invalid MFT magic: expected 4d 66 74 1a, found {found:02x?}")]
    InvalidFormat {
        /// The bytes found where the MFT identifier should be.
        found: [u8; 4],
    },

    /// A read reached past the end of the archive.
    #[error("archive truncated at offset {offset}")]
    Truncated {
        /// Absolute offset of the region that could not be read in full.
        offset: u64,
    },

    /// The index table or one of its records is inconsistent with the MFT.
    #[error("corrupt index: {message}")]
    CorruptIndex {
        /// Description of the inconsistency.
        message: String,
    },

    /// No index record matches the requested identifier.
    #[error("no index record matches {kind} {key}")]
    NotFound {
        /// The identifier kind that was searched ("file ID" or "base ID").
        kind: &'static str,
        /// The identifier value.
        key: u32,
    },

    // ==================== Decompression Errors ====================
    /// A compressed payload violated the codec's framing or coding rules.
    #[error("malformed compressed stream: {message}")]
    Malformed {
        /// Description of the violation.
        message: String,
    },
}

/// A specialized Result type for `gw2dat` operations.
pub type Result<T> = std::result::Result<T, Error>;
