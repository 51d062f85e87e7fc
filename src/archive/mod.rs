//! ZIP container access for OOXML packages.
//!
//! [`Archive`] opens a byte buffer, lists and reads entries, accepts new or
//! replacement entry contents, and serializes the result. Entries that were
//! never written are copied raw (compressed bytes, headers and CRC exactly as
//! found), so the engine never rewrites parts it did not touch.
//!
//! # Example
//!
//! ```rust,no_run
//! use docstamp::archive::Archive;
//!
//! let data = std::fs::read("template.docx")?;
//! let mut archive = Archive::open(data)?;
//! let xml = archive.read_entry("word/document.xml")?;
//! archive.write_entry("word/document.xml", xml);
//! let bytes = archive.serialize()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod error;
pub mod locator;

pub use error::{ArchiveError, Result};

use bytes::Bytes;
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Entry as recorded in the source central directory.
#[derive(Debug, Clone)]
struct SourceEntry {
    name: String,
    is_dir: bool,
}

/// An opened (or freshly created) ZIP archive with pending writes.
pub struct Archive {
    source: Option<RefCell<ZipArchive<Cursor<Bytes>>>>,
    source_len: usize,
    /// Source entries in central directory order
    entries: Vec<SourceEntry>,
    /// Entry name to position in `entries`
    index: HashMap<String, usize>,
    /// Replacement or new contents, by entry name
    written: HashMap<String, Vec<u8>>,
    /// Names of entries that did not exist in the source, in write order
    added: Vec<String>,
}

impl Archive {
    /// Open a byte buffer as a ZIP archive.
    ///
    /// Fails with [`ArchiveError::CorruptArchive`] when the end record, central
    /// directory or any entry header cannot be parsed.
    pub fn open(data: impl Into<Bytes>) -> Result<Self> {
        let data: Bytes = data.into();
        let eocd = locator::locate(&data)?;

        let mut zip = ZipArchive::new(Cursor::new(data.clone()))
            .map_err(|e| ArchiveError::corrupt(Some(eocd.offset), e.to_string()))?;

        let mut entries = Vec::with_capacity(zip.len());
        let mut index = HashMap::with_capacity(zip.len());
        for i in 0..zip.len() {
            let file = zip
                .by_index_raw(i)
                .map_err(|e| ArchiveError::corrupt(None, format!("entry #{i}: {e}")))?;
            let name = file.name().to_string();
            let is_dir = file.is_dir();
            index.insert(name.clone(), entries.len());
            entries.push(SourceEntry { name, is_dir });
        }

        Ok(Self {
            source: Some(RefCell::new(zip)),
            source_len: data.len(),
            entries,
            index,
            written: HashMap::new(),
            added: Vec::new(),
        })
    }

    /// Create an archive with no entries.
    pub fn empty() -> Self {
        Self {
            source: None,
            source_len: 0,
            entries: Vec::new(),
            index: HashMap::new(),
            written: HashMap::new(),
            added: Vec::new(),
        }
    }

    /// Number of file entries (directories excluded), including pending additions.
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_dir).count() + self.added.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Paths of all file entries in archive order, followed by pending additions.
    pub fn list_entries(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| !e.is_dir)
            .map(|e| e.name.clone())
            .chain(self.added.iter().cloned())
            .collect()
    }

    /// Check whether an entry exists (a leading `/` is ignored).
    pub fn contains(&self, path: &str) -> bool {
        let path = normalize(path);
        self.index.contains_key(path) || self.written.contains_key(path)
    }

    /// Read an entry's uncompressed contents.
    ///
    /// Pending writes are returned in preference to the source data.
    pub fn read_entry(&self, path: &str) -> Result<Vec<u8>> {
        let path = normalize(path);
        if let Some(data) = self.written.get(path) {
            return Ok(data.clone());
        }

        let (Some(source), Some(&position)) = (&self.source, self.index.get(path)) else {
            return Err(ArchiveError::EntryNotFound(path.to_string()));
        };

        let mut zip = source.borrow_mut();
        let mut file = zip.by_index(position).map_err(|e| match e {
            zip::result::ZipError::FileNotFound => ArchiveError::EntryNotFound(path.to_string()),
            other => ArchiveError::corrupt(None, format!("{path}: {other}")),
        })?;

        let header_start = file.header_start();
        let mut content = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut content)
            .map_err(|e| ArchiveError::corrupt(Some(header_start), format!("{path}: {e}")))?;
        Ok(content)
    }

    /// Read an entry as UTF-8 text.
    pub fn read_string(&self, path: &str) -> Result<String> {
        let bytes = self.read_entry(path)?;
        String::from_utf8(bytes)
            .map_err(|e| ArchiveError::corrupt(None, format!("{path} is not UTF-8: {e}")))
    }

    /// Replace an entry's contents, or add a new entry.
    pub fn write_entry(&mut self, path: &str, data: Vec<u8>) {
        let path = normalize(path).to_string();
        if !self.index.contains_key(&path) && !self.written.contains_key(&path) {
            self.added.push(path.clone());
        }
        self.written.insert(path, data);
    }

    /// Serialize the archive.
    ///
    /// Written entries are deflated; everything else is raw-copied from the
    /// source so its bytes are identical in the output.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::with_capacity(self.source_len)));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        if let Some(source) = &self.source {
            let mut zip = source.borrow_mut();
            for (i, entry) in self.entries.iter().enumerate() {
                if let Some(data) = self.written.get(&entry.name) {
                    writer.start_file(entry.name.as_str(), options)?;
                    writer.write_all(data)?;
                } else {
                    let file = zip
                        .by_index_raw(i)
                        .map_err(|e| ArchiveError::corrupt(None, format!("{}: {e}", entry.name)))?;
                    writer.raw_copy_file(file)?;
                }
            }
        }

        for name in &self.added {
            if let Some(data) = self.written.get(name) {
                writer.start_file(name.as_str(), options)?;
                writer.write_all(data)?;
            }
        }

        Ok(writer.finish()?.into_inner())
    }
}

impl std::fmt::Debug for Archive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archive")
            .field("entries", &self.entries.len())
            .field("written", &self.written.len())
            .finish()
    }
}

#[inline]
fn normalize(path: &str) -> &str {
    path.strip_prefix('/').unwrap_or(path)
}
