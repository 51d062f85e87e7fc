//! End-of-central-directory location and sanity checks.
//!
//! The `zip` crate reports malformed archives without a position. Office
//! packages never carry prepended data, so the directory offsets recorded in
//! the end record can be checked directly and a byte offset reported.

use super::error::{ArchiveError, Result};
use memchr::memmem;

/// End of central directory record signature (`PK\x05\x06`).
pub const EOCD_SIGNATURE: [u8; 4] = [0x50, 0x4B, 0x05, 0x06];
/// Central directory file header signature (`PK\x01\x02`).
pub const CENTRAL_HEADER_SIGNATURE: [u8; 4] = [0x50, 0x4B, 0x01, 0x02];
/// Local file header signature (`PK\x03\x04`).
pub const LOCAL_HEADER_SIGNATURE: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

const EOCD_LEN: usize = 22;
const MAX_COMMENT_LEN: usize = u16::MAX as usize;
const ZIP64_MARKER: u32 = u32::MAX;

/// Parsed end of central directory record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndOfCentralDirectory {
    /// Byte offset of the record itself
    pub offset: u64,
    /// Number of entries recorded in the central directory
    pub entry_count: u16,
    /// Size of the central directory in bytes
    pub directory_size: u32,
    /// Byte offset of the first central directory header
    pub directory_offset: u32,
}

/// Find the end record by scanning backwards over the maximum comment window.
pub fn locate(data: &[u8]) -> Result<EndOfCentralDirectory> {
    if data.len() < EOCD_LEN {
        return Err(ArchiveError::corrupt(
            None,
            format!("{} bytes is shorter than an end of central directory record", data.len()),
        ));
    }

    let window_start = data.len().saturating_sub(EOCD_LEN + MAX_COMMENT_LEN);
    let window = &data[window_start..];
    let pos = memmem::rfind(window, &EOCD_SIGNATURE)
        .map(|p| p + window_start)
        .ok_or_else(|| ArchiveError::corrupt(None, "end of central directory record not found"))?;

    if pos + EOCD_LEN > data.len() {
        return Err(ArchiveError::corrupt(
            Some(pos as u64),
            "truncated end of central directory record",
        ));
    }

    let record = &data[pos..pos + EOCD_LEN];
    let eocd = EndOfCentralDirectory {
        offset: pos as u64,
        entry_count: u16::from_le_bytes([record[10], record[11]]),
        directory_size: u32::from_le_bytes([record[12], record[13], record[14], record[15]]),
        directory_offset: u32::from_le_bytes([record[16], record[17], record[18], record[19]]),
    };

    // Zip64 archives keep the real values elsewhere; leave those to the zip crate.
    if eocd.directory_offset == ZIP64_MARKER || eocd.directory_size == ZIP64_MARKER {
        return Ok(eocd);
    }

    let directory_end = u64::from(eocd.directory_offset) + u64::from(eocd.directory_size);
    if directory_end > eocd.offset {
        return Err(ArchiveError::corrupt(
            Some(eocd.offset),
            format!(
                "central directory ({} bytes at {}) overruns its end record",
                eocd.directory_size, eocd.directory_offset
            ),
        ));
    }

    if eocd.entry_count > 0 {
        let start = eocd.directory_offset as usize;
        if data.get(start..start + 4) != Some(&CENTRAL_HEADER_SIGNATURE[..]) {
            return Err(ArchiveError::corrupt(
                Some(u64::from(eocd.directory_offset)),
                "missing central directory header signature",
            ));
        }
    }

    Ok(eocd)
}
