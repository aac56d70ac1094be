//! Minimal ZIP writer for batch archives
//!
//! Entries are stored uncompressed (method 0) with a fixed 1980-01-01
//! timestamp, so the same entries always produce the same archive bytes.

use crate::error::{Error, Result};

const LOCAL_HEADER_SIGNATURE: u32 = 0x0403_4b50;
const CENTRAL_HEADER_SIGNATURE: u32 = 0x0201_4b50;
const END_OF_CENTRAL_DIR_SIGNATURE: u32 = 0x0605_4b50;
const VERSION: u16 = 20;
/// General purpose flag bit 11: names are UTF-8
const FLAG_UTF8: u16 = 0x0800;
const METHOD_STORED: u16 = 0;
const DOS_TIME: u16 = 0;
/// 1980-01-01 in MS-DOS date format
const DOS_DATE: u16 = 0x0021;

struct CentralEntry {
    name: String,
    crc: u32,
    size: u32,
    offset: u32,
}

/// Archive being assembled in memory
pub struct StoredZip {
    buffer: Vec<u8>,
    entries: Vec<CentralEntry>,
}

impl Default for StoredZip {
    fn default() -> Self {
        Self::new()
    }
}

impl StoredZip {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append one file
    pub fn add(&mut self, name: &str, data: &[u8]) -> Result<()> {
        if name.is_empty() {
            return Err(Error::Archive("entry name is empty".to_string()));
        }
        if self.entries.iter().any(|e| e.name == name) {
            return Err(Error::Archive(format!("duplicate entry name: {}", name)));
        }

        let size = to_u32(data.len(), "entry size")?;
        let offset = to_u32(self.buffer.len(), "archive offset")?;
        let name_len = to_u16(name.len(), "entry name length")?;
        let crc = crc32fast::hash(data);

        put_u32(&mut self.buffer, LOCAL_HEADER_SIGNATURE);
        put_u16(&mut self.buffer, VERSION);
        put_u16(&mut self.buffer, FLAG_UTF8);
        put_u16(&mut self.buffer, METHOD_STORED);
        put_u16(&mut self.buffer, DOS_TIME);
        put_u16(&mut self.buffer, DOS_DATE);
        put_u32(&mut self.buffer, crc);
        put_u32(&mut self.buffer, size);
        put_u32(&mut self.buffer, size);
        put_u16(&mut self.buffer, name_len);
        put_u16(&mut self.buffer, 0);
        self.buffer.extend_from_slice(name.as_bytes());
        self.buffer.extend_from_slice(data);

        self.entries.push(CentralEntry {
            name: name.to_string(),
            crc,
            size,
            offset,
        });
        Ok(())
    }

    /// Write the central directory and return the archive bytes
    pub fn finish(mut self) -> Result<Vec<u8>> {
        let directory_offset = to_u32(self.buffer.len(), "central directory offset")?;
        let count = to_u16(self.entries.len(), "entry count")?;

        for entry in &self.entries {
            put_u32(&mut self.buffer, CENTRAL_HEADER_SIGNATURE);
            put_u16(&mut self.buffer, VERSION);
            put_u16(&mut self.buffer, VERSION);
            put_u16(&mut self.buffer, FLAG_UTF8);
            put_u16(&mut self.buffer, METHOD_STORED);
            put_u16(&mut self.buffer, DOS_TIME);
            put_u16(&mut self.buffer, DOS_DATE);
            put_u32(&mut self.buffer, entry.crc);
            put_u32(&mut self.buffer, entry.size);
            put_u32(&mut self.buffer, entry.size);
            put_u16(&mut self.buffer, entry.name.len() as u16);
            put_u16(&mut self.buffer, 0); // extra
            put_u16(&mut self.buffer, 0); // comment
            put_u16(&mut self.buffer, 0); // disk
            put_u16(&mut self.buffer, 0); // internal attributes
            put_u32(&mut self.buffer, 0); // external attributes
            put_u32(&mut self.buffer, entry.offset);
            self.buffer.extend_from_slice(entry.name.as_bytes());
        }

        let directory_size = to_u32(self.buffer.len(), "central directory size")? - directory_offset;

        put_u32(&mut self.buffer, END_OF_CENTRAL_DIR_SIGNATURE);
        put_u16(&mut self.buffer, 0);
        put_u16(&mut self.buffer, 0);
        put_u16(&mut self.buffer, count);
        put_u16(&mut self.buffer, count);
        put_u32(&mut self.buffer, directory_size);
        put_u32(&mut self.buffer, directory_offset);
        put_u16(&mut self.buffer, 0);

        Ok(self.buffer)
    }
}

fn put_u16(buffer: &mut Vec<u8>, value: u16) {
    buffer.extend_from_slice(&value.to_le_bytes());
}

fn put_u32(buffer: &mut Vec<u8>, value: u32) {
    buffer.extend_from_slice(&value.to_le_bytes());
}

fn to_u16(value: usize, what: &str) -> Result<u16> {
    u16::try_from(value).map_err(|_| Error::Archive(format!("{} {} exceeds ZIP limits", what, value)))
}

fn to_u32(value: usize, what: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::Archive(format!("{} {} exceeds ZIP limits", what, value)))
}
