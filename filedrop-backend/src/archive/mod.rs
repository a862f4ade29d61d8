//! In-memory ZIP archive expansion.
//!
//! Uploads are already fully buffered, so the archive is read straight from a
//! byte slice: the End of Central Directory record is located at the tail
//! (searching backwards past any archive comment, and following the ZIP64
//! locator when the 32-bit fields are saturated), the Central Directory is
//! parsed up front, and each entry's data is only decoded when the iterator
//! returned by [`ZipArchive::entries`] reaches it.
//!
//! STORED and DEFLATE entries are supported. Encrypted entries, other
//! compression methods and CRC-32 mismatches are rejected.

mod structures;
#[cfg(test)]
pub(crate) mod testzip;

use std::io::{self, Cursor, Read};

use filedrop_shared::error::FileError;
use filedrop_shared::file::base_name;
use flate2::read::DeflateDecoder;
use flate2::Crc;
use tracing::trace;

use structures::*;

/// Maximum ZIP comment size allowed by the format (65535 bytes).
const MAX_COMMENT_SIZE: usize = 65535;

fn format_error(err: io::Error) -> FileError {
    FileError::Format(err.to_string())
}

/// A file extracted from an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Full relative path inside the archive
    pub path: String,
    /// Decoded bytes
    pub content: Vec<u8>,
}

impl ArchiveEntry {
    /// The final segment of the entry's path.
    pub fn file_name(&self) -> &str {
        base_name(&self.path)
    }
}

/// A parsed archive, ready to have its entries decoded
pub struct ZipArchive<'a> {
    data: &'a [u8],
    entries: Vec<CentralEntry>,
}

impl<'a> ZipArchive<'a> {
    /// Parse the archive's central directory. Fails with [`FileError::Format`]
    /// when `data` is not a ZIP archive.
    pub fn new(data: &'a [u8]) -> Result<Self, FileError> {
        let entries = read_central_directory(data).map_err(format_error)?;
        Ok(Self { data, entries })
    }

    /// Number of entries in the archive, directories included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Single pass over the archive's files, skipping directory entries.
    pub fn entries(self) -> ArchiveEntries<'a> {
        ArchiveEntries {
            data: self.data,
            entries: self.entries.into_iter(),
        }
    }
}

/// Lazy iterator over the files of a [`ZipArchive`]
pub struct ArchiveEntries<'a> {
    data: &'a [u8],
    entries: std::vec::IntoIter<CentralEntry>,
}

impl Iterator for ArchiveEntries<'_> {
    type Item = Result<ArchiveEntry, FileError>;

    fn next(&mut self) -> Option<Self::Item> {
        for entry in self.entries.by_ref() {
            if entry.is_directory {
                trace!("Skipping directory entry {}", entry.path);
                continue;
            }
            return Some(read_entry(self.data, &entry));
        }
        None
    }
}

fn slice_at(data: &[u8], offset: u64, len: u64) -> io::Result<&[u8]> {
    let start = usize::try_from(offset).map_err(|_| invalid("offset out of range"))?;
    let len = usize::try_from(len).map_err(|_| invalid("length out of range"))?;
    start
        .checked_add(len)
        .and_then(|end| data.get(start..end))
        .ok_or_else(|| invalid("archive is truncated"))
}

/// Find the End of Central Directory record, returning it and its offset.
fn find_eocd(data: &[u8]) -> io::Result<(EndOfCentralDirectory, usize)> {
    if data.len() < EndOfCentralDirectory::SIZE {
        return Err(invalid("not a valid ZIP file"));
    }
    let last = data.len() - EndOfCentralDirectory::SIZE;

    // common case, no archive comment
    if &data[last..last + 4] == EndOfCentralDirectory::SIGNATURE
        && data[last + 20..last + 22] == [0, 0]
    {
        return Ok((EndOfCentralDirectory::from_bytes(&data[last..])?, last));
    }

    let search_start = data
        .len()
        .saturating_sub(MAX_COMMENT_SIZE + EndOfCentralDirectory::SIZE);
    for i in (search_start..=last).rev() {
        if &data[i..i + 4] == EndOfCentralDirectory::SIGNATURE {
            let eocd = EndOfCentralDirectory::from_bytes(&data[i..])?;
            // a signature inside the comment itself will not line up with the end
            if eocd.comment_len as usize == data.len() - i - EndOfCentralDirectory::SIZE {
                return Ok((eocd, i));
            }
        }
    }

    Err(invalid("not a valid ZIP file"))
}

fn read_central_directory(data: &[u8]) -> io::Result<Vec<CentralEntry>> {
    let (eocd, eocd_offset) = find_eocd(data)?;

    let (cd_offset, cd_size, total_entries) = if eocd.is_zip64() {
        let locator_offset = eocd_offset
            .checked_sub(Zip64EocdLocator::SIZE)
            .ok_or_else(|| invalid("missing zip64 locator"))?;
        let locator = Zip64EocdLocator::from_bytes(&data[locator_offset..])?;
        let eocd64 = Zip64Eocd::from_bytes(slice_at(
            data,
            locator.eocd64_offset,
            Zip64Eocd::MIN_SIZE as u64,
        )?)?;
        (eocd64.cd_offset, eocd64.cd_size, eocd64.total_entries)
    } else {
        (
            eocd.cd_offset as u64,
            eocd.cd_size as u64,
            eocd.total_entries as u64,
        )
    };

    let cd_data = slice_at(data, cd_offset, cd_size)?;
    let capacity = (total_entries as usize).min(cd_data.len() / CDFH_MIN_SIZE);
    let mut entries = Vec::with_capacity(capacity);
    let mut cursor = Cursor::new(cd_data);
    for _ in 0..total_entries {
        entries.push(CentralEntry::parse(&mut cursor)?);
    }

    Ok(entries)
}

fn read_entry(data: &[u8], entry: &CentralEntry) -> Result<ArchiveEntry, FileError> {
    if entry.is_encrypted() {
        return Err(FileError::Format(format!(
            "{} is encrypted, which is not supported",
            entry.path
        )));
    }

    let raw = entry_data(data, entry).map_err(format_error)?;

    let content = match entry.compression_method {
        CompressionMethod::Stored => raw.to_vec(),
        CompressionMethod::Deflate => {
            let mut content =
                Vec::with_capacity((entry.uncompressed_size as usize).min(raw.len() * 4));
            // one byte past the declared size is enough to detect a lying header
            DeflateDecoder::new(raw)
                .take(entry.uncompressed_size.saturating_add(1))
                .read_to_end(&mut content)
                .map_err(|err| {
                    FileError::Format(format!("Failed to inflate {}: {}", entry.path, err))
                })?;
            content
        }
        CompressionMethod::Unknown(method) => {
            return Err(FileError::Format(format!(
                "{} uses unsupported compression method {}",
                entry.path, method
            )))
        }
    };

    if content.len() as u64 > entry.uncompressed_size {
        return Err(FileError::Format(format!(
            "{} decodes to more than its declared {} bytes",
            entry.path, entry.uncompressed_size
        )));
    }
    if content.len() as u64 != entry.uncompressed_size {
        return Err(FileError::Format(format!(
            "{} decoded to {} bytes, expected {}",
            entry.path,
            content.len(),
            entry.uncompressed_size
        )));
    }

    let mut crc = Crc::new();
    crc.update(&content);
    if crc.sum() != entry.crc32 {
        return Err(FileError::Format(format!(
            "{} failed its CRC-32 check",
            entry.path
        )));
    }

    trace!("Extracted {} ({} bytes)", entry.path, content.len());

    Ok(ArchiveEntry {
        path: entry.path.clone(),
        content,
    })
}

/// The (possibly compressed) bytes of an entry, found through its local file header.
fn entry_data<'a>(data: &'a [u8], entry: &CentralEntry) -> io::Result<&'a [u8]> {
    let lfh = slice_at(data, entry.lfh_offset, LFH_SIZE as u64)?;
    if &lfh[0..4] != LFH_SIGNATURE {
        return Err(invalid(format!("invalid local file header for {}", entry.path)));
    }

    // the local header may carry a different extra field than the central one
    let file_name_length = u16::from_le_bytes([lfh[26], lfh[27]]) as u64;
    let extra_field_length = u16::from_le_bytes([lfh[28], lfh[29]]) as u64;
    let data_offset = entry.lfh_offset + LFH_SIZE as u64 + file_name_length + extra_field_length;

    slice_at(data, data_offset, entry.compressed_size)
}
