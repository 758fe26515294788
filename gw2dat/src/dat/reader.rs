//! `.dat` archive reader

use std::fs::File;
use std::io::{BufReader, Cursor, ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};

use super::types::{
    DatHeader, IndexEntry, LookupKind, MftEntry, MftHeader, DAT_HEADER_SIZE, INDEX_ENTRY,
    INDEX_RECORD_SIZE, MFT_ENTRY_SIZE, MFT_HEADER_SIZE, MFT_MAGIC,
};
use crate::compression;
use crate::error::{Error, Result};

/// Parsed `.dat` archive over a seekable byte source.
///
/// [`DatArchive::open`] reads the primary header, the MFT header, the MFT
/// entry array and the index table; the handle is immutable afterwards.
/// Extraction only re-seeks the underlying source, so a single handle
/// serializes concurrent extractions through `&mut self`.
pub struct DatArchive<R: Read + Seek> {
    reader: BufReader<R>,
    source_len: u64,
    header: DatHeader,
    mft_header: MftHeader,
    entries: Vec<MftEntry>,
    index: Vec<IndexEntry>,
}

impl DatArchive<File> {
    /// Open an archive file from disk.
    ///
    /// # Errors
    /// Returns [`Error::Io`] if the file cannot be opened, or any of the
    /// parse errors described on [`DatArchive::open`].
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        tracing::debug!("opening archive: {}", path.as_ref().display());
        Self::open(File::open(path)?)
    }
}

impl<R: Read + Seek> DatArchive<R> {
    /// Parse an archive from a `Read + Seek` source.
    ///
    /// # Errors
    /// Returns [`Error::InvalidFormat`] if the MFT identifier does not match,
    /// [`Error::Truncated`] if the MFT region or index table reaches past the
    /// end of the source, and [`Error::CorruptIndex`] if the index table size
    /// is not a multiple of 8 or the archive has no index entry.
    pub fn open(source: R) -> Result<Self> {
        let mut reader = BufReader::new(source);
        let source_len = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;

        let header = read_header(&mut reader)?;

        let mft_end = header.mft_offset.saturating_add(u64::from(header.mft_size));
        if mft_end > source_len {
            return Err(Error::Truncated {
                offset: header.mft_offset,
            });
        }

        reader.seek(SeekFrom::Start(header.mft_offset))?;
        let mft_header = read_mft_header(&mut reader, header.mft_offset)?;
        tracing::debug!(num_entries = mft_header.num_entries, "parsed MFT header");

        let entries = read_entries(&mut reader, &mft_header, header.mft_offset, source_len)?;
        let index = read_index(&mut reader, &entries, source_len)?;
        tracing::debug!(records = index.len(), "parsed index table");

        Ok(Self {
            reader,
            source_len,
            header,
            mft_header,
            entries,
            index,
        })
    }

    /// Get the primary archive header.
    #[must_use]
    pub fn header(&self) -> &DatHeader {
        &self.header
    }

    /// Get the MFT header.
    #[must_use]
    pub fn mft_header(&self) -> &MftHeader {
        &self.mft_header
    }

    /// Get the MFT entry array.
    #[must_use]
    pub fn entries(&self) -> &[MftEntry] {
        &self.entries
    }

    /// Get the index table.
    #[must_use]
    pub fn index(&self) -> &[IndexEntry] {
        &self.index
    }

    /// Resolve a lookup key to its MFT entry.
    ///
    /// The index table is scanned in stored order and the first matching
    /// record wins. The record's base ID is a 1-based index into the MFT
    /// entry array.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] if no record matches and
    /// [`Error::CorruptIndex`] if the matched record points outside the MFT.
    pub fn resolve(&self, key: u32, kind: LookupKind) -> Result<&MftEntry> {
        let record = self
            .index
            .iter()
            .find(|record| match kind {
                LookupKind::FileId => record.file_id == key,
                LookupKind::BaseId => record.base_id == key,
            })
            .ok_or(Error::NotFound {
                kind: kind.as_str(),
                key,
            })?;

        let base_id = record.base_id;
        if base_id == 0 || base_id > self.mft_header.num_entries {
            return Err(Error::CorruptIndex {
                message: format!(
                    "record for {} {key} points at MFT entry {base_id} of {}",
                    kind.as_str(),
                    self.mft_header.num_entries
                ),
            });
        }

        Ok(&self.entries[(base_id - 1) as usize])
    }

    /// Extract the payload identified by `key`, inflating it if the entry is
    /// stored compressed.
    ///
    /// # Errors
    /// Returns the resolution errors of [`DatArchive::resolve`],
    /// [`Error::Truncated`] if the payload reaches past the end of the
    /// source, and [`Error::Malformed`] if a compressed payload cannot be
    /// inflated.
    pub fn extract(&mut self, key: u32, kind: LookupKind) -> Result<Vec<u8>> {
        let entry = *self.resolve(key, kind)?;
        tracing::debug!(
            key,
            offset = entry.offset,
            size = entry.size,
            compressed = entry.is_compressed(),
            "extracting entry"
        );

        let raw = self.read_payload(&entry)?;
        if entry.is_compressed() {
            let (inflated, size) = compression::inflate_buffer(&raw, 0, 0)?;
            tracing::debug!(inflated = size, "inflated entry");
            Ok(inflated)
        } else {
            Ok(raw)
        }
    }

    fn read_payload(&mut self, entry: &MftEntry) -> Result<Vec<u8>> {
        let end = entry.offset.saturating_add(u64::from(entry.size));
        if end > self.source_len {
            return Err(Error::Truncated {
                offset: entry.offset,
            });
        }

        self.reader.seek(SeekFrom::Start(entry.offset))?;
        let mut payload = vec![0u8; entry.size as usize];
        self.reader
            .read_exact(&mut payload)
            .map_err(|e| truncated(e, entry.offset))?;
        Ok(payload)
    }
}

/// Map a short read to [`Error::Truncated`], keeping other IO failures.
fn truncated(err: std::io::Error, offset: u64) -> Error {
    if err.kind() == ErrorKind::UnexpectedEof {
        Error::Truncated { offset }
    } else {
        Error::Io(err)
    }
}

fn read_header<R: Read>(reader: &mut R) -> Result<DatHeader> {
    let mut buf = [0u8; DAT_HEADER_SIZE];
    reader.read_exact(&mut buf).map_err(|e| truncated(e, 0))?;

    let mut cursor = Cursor::new(&buf[..]);
    let version = cursor.read_u8()?;
    let mut identifier = [0u8; 3];
    cursor.read_exact(&mut identifier)?;

    Ok(DatHeader {
        version,
        identifier,
        header_size: cursor.read_u32::<LittleEndian>()?,
        unknown_field: cursor.read_u32::<LittleEndian>()?,
        chunk_size: cursor.read_u32::<LittleEndian>()?,
        crc: cursor.read_u32::<LittleEndian>()?,
        unknown_field2: cursor.read_u32::<LittleEndian>()?,
        mft_offset: cursor.read_u64::<LittleEndian>()?,
        mft_size: cursor.read_u32::<LittleEndian>()?,
        flags: cursor.read_u32::<LittleEndian>()?,
    })
}

fn read_mft_header<R: Read>(reader: &mut R, mft_offset: u64) -> Result<MftHeader> {
    let mut buf = [0u8; MFT_HEADER_SIZE];
    reader
        .read_exact(&mut buf)
        .map_err(|e| truncated(e, mft_offset))?;

    let mut identifier = [0u8; 4];
    identifier.copy_from_slice(&buf[0..4]);
    if identifier != MFT_MAGIC {
        return Err(Error::InvalidFormat { found: identifier });
    }

    let mut cursor = Cursor::new(&buf[4..]);
    Ok(MftHeader {
        identifier,
        unknown: cursor.read_u64::<LittleEndian>()?,
        num_entries: cursor.read_u32::<LittleEndian>()?,
        unknown_field2: cursor.read_u32::<LittleEndian>()?,
        unknown_field3: cursor.read_u32::<LittleEndian>()?,
    })
}

fn read_entries<R: Read>(
    reader: &mut R,
    mft_header: &MftHeader,
    mft_offset: u64,
    source_len: u64,
) -> Result<Vec<MftEntry>> {
    let num_entries = mft_header.num_entries as usize;
    let entries_offset = mft_offset + MFT_HEADER_SIZE as u64;
    let entries_bytes = num_entries as u64 * MFT_ENTRY_SIZE as u64;
    if entries_offset.saturating_add(entries_bytes) > source_len {
        return Err(Error::Truncated {
            offset: entries_offset,
        });
    }

    let mut buf = vec![0u8; num_entries * MFT_ENTRY_SIZE];
    reader
        .read_exact(&mut buf)
        .map_err(|e| truncated(e, entries_offset))?;

    Ok(buf.chunks_exact(MFT_ENTRY_SIZE).map(parse_entry).collect())
}

fn parse_entry(bytes: &[u8]) -> MftEntry {
    MftEntry {
        offset: u64::from_le_bytes(bytes[0..8].try_into().unwrap()),
        size: u32::from_le_bytes(bytes[8..12].try_into().unwrap()),
        compression_flag: u16::from_le_bytes(bytes[12..14].try_into().unwrap()),
        entry_flag: u16::from_le_bytes(bytes[14..16].try_into().unwrap()),
        counter: u32::from_le_bytes(bytes[16..20].try_into().unwrap()),
        crc: u32::from_le_bytes(bytes[20..24].try_into().unwrap()),
    }
}

fn read_index<R: Read + Seek>(
    reader: &mut R,
    entries: &[MftEntry],
    source_len: u64,
) -> Result<Vec<IndexEntry>> {
    let entry = entries.get(INDEX_ENTRY).ok_or_else(|| Error::CorruptIndex {
        message: format!("archive has no index entry (MFT holds {} entries)", entries.len()),
    })?;

    if entry.size as usize % INDEX_RECORD_SIZE != 0 {
        return Err(Error::CorruptIndex {
            message: format!("index table size {} is not a multiple of 8", entry.size),
        });
    }

    let end = entry.offset.saturating_add(u64::from(entry.size));
    if end > source_len {
        return Err(Error::Truncated {
            offset: entry.offset,
        });
    }

    reader.seek(SeekFrom::Start(entry.offset))?;
    let mut buf = vec![0u8; entry.size as usize];
    reader
        .read_exact(&mut buf)
        .map_err(|e| truncated(e, entry.offset))?;

    Ok(buf
        .chunks_exact(INDEX_RECORD_SIZE)
        .map(|record| IndexEntry {
            file_id: u32::from_le_bytes(record[0..4].try_into().unwrap()),
            base_id: u32::from_le_bytes(record[4..8].try_into().unwrap()),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::compression::testutil::{assign_codes, dict_codes, BitWriter};

    /// Compressed stream inflating to `0x41 0x42 0x43`.
    fn compressed_abc() -> Vec<u8> {
        let dict = dict_codes();
        let mut writer = BitWriter::new();
        writer.put(0, 32); // version word
        writer.put(3, 32); // uncompressed length
        writer.put(0, 8); // copy length bias nibble (unused here)

        // Symbol tree: 0x41..=0x43 at two bits, rest absent.
        writer.put(0x44, 16);
        let (code, bits) = dict[&0x42]; // two-bit codes, run of 3
        writer.put(code, bits);
        for _ in 0..8 {
            let (code, bits) = dict[&0xE0]; // skip 8
            writer.put(code, bits);
        }
        let (code, bits) = dict[&0x00]; // skip 1
        writer.put(code, bits);

        // Copy tree: empty two-symbol alphabet.
        writer.put(2, 16);
        let (code, bits) = dict[&0x20];
        writer.put(code, bits);

        writer.put(0, 4); // max_count
        let codes = assign_codes(&[(2, 0x43), (2, 0x42), (2, 0x41)]);
        for symbol in [0x41u16, 0x42, 0x43] {
            let (code, bits) = codes[&symbol];
            writer.put(code, bits);
        }
        writer.pad_words(2);
        writer.into_bytes()
    }

    /// Archive with one payload entry (1-based MFT index 3).
    fn archive_with_payload(payload: &[u8], compression: u16) -> Vec<u8> {
        let index_offset = 40u64 + 24 + 24 * 3;
        let payload_offset = index_offset + 8;

        let mut buf = Vec::new();
        buf.push(0x10);
        buf.extend_from_slice(b"AN\x1a");
        for value in [40u32, 0, 512, 0, 0] {
            buf.extend_from_slice(&value.to_le_bytes());
        }
        buf.extend_from_slice(&40u64.to_le_bytes());
        buf.extend_from_slice(&((24 + 24 * 3) as u32).to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());

        buf.extend_from_slice(&MFT_MAGIC);
        buf.extend_from_slice(&0u64.to_le_bytes());
        buf.extend_from_slice(&3u32.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());

        let entries = [
            (0u64, 0u32, 0u16),
            (index_offset, 8, 0),
            (payload_offset, payload.len() as u32, compression),
        ];
        for (offset, size, flag) in entries {
            buf.extend_from_slice(&offset.to_le_bytes());
            buf.extend_from_slice(&size.to_le_bytes());
            buf.extend_from_slice(&flag.to_le_bytes());
            buf.extend_from_slice(&0u16.to_le_bytes());
            buf.extend_from_slice(&0u32.to_le_bytes());
            buf.extend_from_slice(&0u32.to_le_bytes());
        }

        // One index record: file ID 7 -> entry 3.
        buf.extend_from_slice(&7u32.to_le_bytes());
        buf.extend_from_slice(&3u32.to_le_bytes());
        buf.extend_from_slice(payload);
        buf
    }

    #[test]
    fn extract_inflates_compressed_entry() {
        let bytes = archive_with_payload(&compressed_abc(), 1);
        let mut archive = DatArchive::open(Cursor::new(&bytes)).unwrap();
        assert_eq!(
            archive.extract(7, LookupKind::FileId).unwrap(),
            vec![0x41, 0x42, 0x43]
        );
    }

    #[test]
    fn extract_returns_raw_entry_untouched() {
        let payload = compressed_abc();
        let bytes = archive_with_payload(&payload, 0);
        let mut archive = DatArchive::open(Cursor::new(&bytes)).unwrap();
        assert_eq!(archive.extract(7, LookupKind::FileId).unwrap(), payload);
    }
}
