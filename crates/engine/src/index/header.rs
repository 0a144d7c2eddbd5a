use std::{
    fs::File,
    io::{ErrorKind, Read, Seek, SeekFrom, Write},
    mem,
    path::Path,
};

use bytemuck::{Pod, Zeroable, bytes_of, pod_read_unaligned};
use crc32fast::Hasher;

use crate::error::{IndexError, Result};

/// Magic number: "MIDX" in little-endian
pub const INDEX_MAGIC: u32 = 0x5844_494D;

pub const INDEX_VERSION: u32 = 1;

/// Number of list slots in the header table.
pub const MAX_LISTS: usize = 8;

/// Length of the ASCII hex tag naming the index kind.
pub const TYPE_TAG_LEN: usize = 12;

pub const HEADER_SIZE: u64 = mem::size_of::<IndexHeader>() as u64;

/// Where one list's records live inside the main index file.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct ListDesc {
    pub list_type: u32,
    pub _reserved: u32,
    /// Absolute byte offset from file start
    pub offset: u64,
    /// Length in bytes, framing included
    pub size: u64,
    /// Number of records
    pub count: u64,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct IndexHeader {
    /// Magic number (INDEX_MAGIC)
    pub magic: u32,
    /// Index format version
    pub version: u32,
    /// Size of this header in bytes
    pub header_size: u32,
    /// CRC32 of the header bytes with this field set to 0
    pub header_crc32: u32,
    /// Hex tag of the index kind that owns this file
    pub type_tag: [u8; TYPE_TAG_LEN],
    /// Used slots in `lists`
    pub list_count: u32,
    pub lists: [ListDesc; MAX_LISTS],
}

impl IndexHeader {
    /// Header of an index with every list empty, laid out right after the
    /// header.
    pub fn empty(type_tag: &[u8; TYPE_TAG_LEN], list_types: &[u32]) -> Self {
        assert!(
            list_types.len() <= MAX_LISTS,
            "an index kind may declare at most {MAX_LISTS} lists"
        );

        let mut header = IndexHeader::zeroed();
        header.magic = INDEX_MAGIC;
        header.version = INDEX_VERSION;
        header.header_size = HEADER_SIZE as u32;
        header.type_tag = *type_tag;
        header.list_count = list_types.len() as u32;
        for (slot, list_type) in header.lists.iter_mut().zip(list_types) {
            *slot = ListDesc {
                list_type: *list_type,
                _reserved: 0,
                offset: HEADER_SIZE,
                size: 0,
                count: 0,
            };
        }
        header.seal();
        header
    }

    pub fn active_lists(&self) -> &[ListDesc] {
        let n = (self.list_count as usize).min(MAX_LISTS);
        &self.lists[..n]
    }

    pub fn desc(&self, list_type: u32) -> Option<&ListDesc> {
        self.active_lists()
            .iter()
            .find(|d| d.list_type == list_type)
    }

    pub fn desc_mut(&mut self, list_type: u32) -> Option<&mut ListDesc> {
        let n = (self.list_count as usize).min(MAX_LISTS);
        self.lists[..n].iter_mut().find(|d| d.list_type == list_type)
    }

    /// Byte offset one past the last list.
    pub fn data_end(&self) -> u64 {
        self.active_lists()
            .iter()
            .map(|d| d.offset + d.size)
            .max()
            .unwrap_or(HEADER_SIZE)
    }

    pub fn type_tag_str(&self) -> String {
        String::from_utf8_lossy(&self.type_tag).into_owned()
    }

    fn compute_crc(&self) -> u32 {
        let mut copy = *self;
        copy.header_crc32 = 0;
        let mut hasher = Hasher::new();
        hasher.update(bytes_of(&copy));
        hasher.finalize()
    }

    /// Recompute the CRC after any field change.
    pub fn seal(&mut self) {
        self.header_crc32 = self.compute_crc();
    }

    pub fn read_from(file: &mut File) -> Result<Self> {
        let mut buf = [0u8; HEADER_SIZE as usize];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut buf).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => IndexError::corrupt("index file too small for header"),
            _ => IndexError::Io(e),
        })?;
        Ok(pod_read_unaligned(&buf))
    }

    pub fn write_to(&self, file: &mut File) -> Result<()> {
        file.seek(SeekFrom::Start(0))?;
        file.write_all(bytes_of(self))?;
        Ok(())
    }

    /// Check magic, version, CRC, kind tag and list bounds.
    pub fn validate(
        &self,
        path: &Path,
        expected_tag: &[u8; TYPE_TAG_LEN],
        file_len: u64,
    ) -> Result<()> {
        if self.magic != INDEX_MAGIC {
            return Err(IndexError::corrupt("invalid index magic"));
        }

        if self.version != INDEX_VERSION {
            return Err(IndexError::corrupt(format!(
                "index version {} unsupported, expected {INDEX_VERSION}",
                self.version
            )));
        }

        if self.header_size as u64 != HEADER_SIZE {
            return Err(IndexError::corrupt(format!(
                "header size {} does not match {HEADER_SIZE}",
                self.header_size
            )));
        }

        if self.header_crc32 != self.compute_crc() {
            return Err(IndexError::corrupt("header checksum mismatch"));
        }

        if &self.type_tag != expected_tag {
            return Err(IndexError::TypeMismatch {
                path: path.to_path_buf(),
                expected: String::from_utf8_lossy(expected_tag).into_owned(),
                found: self.type_tag_str(),
            });
        }

        if self.list_count as usize > MAX_LISTS {
            return Err(IndexError::corrupt(format!(
                "list count {} exceeds {MAX_LISTS}",
                self.list_count
            )));
        }

        for desc in self.active_lists() {
            let end = desc
                .offset
                .checked_add(desc.size)
                .ok_or_else(|| IndexError::corrupt("list length overflow"))?;
            if desc.offset < HEADER_SIZE || end > file_len {
                return Err(IndexError::corrupt(format!(
                    "list {} [{}..{end}) lies outside index file of {file_len} bytes",
                    desc.list_type, desc.offset
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
#[path = "header_tests.rs"]
mod tests;
