use std::{
    fs::File,
    io::{self, BufReader, BufWriter, ErrorKind, Read, Seek, SeekFrom, Take, Write},
    path::Path,
};

use log::debug;
use tempfile::NamedTempFile;

use crate::{
    binary::{self, FieldFormat, Value},
    error::{IndexError, Result},
};

/// Bytes of framing around each payload: 4-byte length and trailing newline.
pub const RECORD_OVERHEAD: u64 = 5;

const RECORD_TERMINATOR: u8 = b'\n';

/// Staging segment holding one list type's records while an index is open
/// for write.
///
/// Records are framed as `[u32 BE length][payload]["\n"]`. The backing temp
/// file lives next to the index and is removed when the segment is dropped.
#[derive(Debug)]
pub struct IndexList {
    list_type: u32,
    writer: BufWriter<NamedTempFile>,
    count: u64,
    size: u64,
}

impl IndexList {
    /// Create an empty segment in `dir`.
    pub fn new(list_type: u32, dir: &Path) -> Result<Self> {
        let tmp = tempfile::Builder::new()
            .prefix(".manidx-seg-")
            .suffix(".tmp")
            .tempfile_in(dir)?;
        debug!("[index_list] list {list_type} staged at {:?}", tmp.path());

        Ok(Self {
            list_type,
            writer: BufWriter::new(tmp),
            count: 0,
            size: 0,
        })
    }

    #[inline]
    pub fn list_type(&self) -> u32 {
        self.list_type
    }

    #[inline]
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Expected byte size, framing included.
    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn path(&self) -> &Path {
        self.writer.get_ref().path()
    }

    /// Encode and append one record.
    pub fn add(&mut self, values: &[Value], formats: &[FieldFormat]) -> Result<()> {
        let payload = binary::encode(values, formats)?;
        self.add_payload(&payload)
    }

    fn add_payload(&mut self, payload: &[u8]) -> Result<()> {
        let len: u32 = payload.len().try_into().map_err(|_| {
            IndexError::format(format!("record of {} bytes is too large", payload.len()))
        })?;

        self.writer.write_all(&len.to_be_bytes())?;
        self.writer.write_all(payload)?;
        self.writer.write_all(&[RECORD_TERMINATOR])?;

        self.count += 1;
        self.size += RECORD_OVERHEAD + len as u64;
        Ok(())
    }

    /// Lazily decode records, skipping the first `seek`.
    pub fn iterate(&mut self, formats: &'static [FieldFormat], seek: u64) -> Result<RecordIter> {
        let file = self.reopen()?;
        RecordIter::new(file, 0, self.size, self.count, formats, seek)
    }

    /// Drop every record.
    pub fn truncate(&mut self) -> Result<()> {
        self.writer.flush()?;
        let file = self.writer.get_mut().as_file_mut();
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        self.count = 0;
        self.size = 0;
        Ok(())
    }

    /// Append the whole segment to `main` at its current position.
    pub fn copy_to_main(&mut self, main: &mut File) -> Result<()> {
        let mut src = self.reopen()?.take(self.size);
        let copied = io::copy(&mut src, main)?;
        if copied != self.size {
            return Err(IndexError::SizeMismatch {
                list_type: self.list_type,
                expected: self.size,
                copied,
            });
        }
        Ok(())
    }

    /// Seed the segment with `length` bytes of `main` starting at `offset`.
    pub fn copy_from_main(
        &mut self,
        main: &mut File,
        offset: u64,
        length: u64,
        count: u64,
    ) -> Result<()> {
        main.seek(SeekFrom::Start(offset))?;
        let mut src = Read::take(&mut *main, length);
        let copied = io::copy(&mut src, &mut self.writer)?;
        if copied != length {
            return Err(IndexError::SizeMismatch {
                list_type: self.list_type,
                expected: length,
                copied,
            });
        }

        self.size += length;
        self.count += count;
        Ok(())
    }

    /// Independent read handle positioned at the segment start.
    fn reopen(&mut self) -> Result<File> {
        self.writer.flush()?;
        let mut file = self.writer.get_ref().reopen()?;
        file.seek(SeekFrom::Start(0))?;
        Ok(file)
    }
}

/// Forward-only iterator over framed records in one byte range of a file.
///
/// Yields `Err` once on corruption and then stops. Dropping it closes the
/// underlying handle.
pub struct RecordIter {
    reader: Take<BufReader<File>>,
    formats: &'static [FieldFormat],
    remaining: u64,
    failed: bool,
}

impl RecordIter {
    pub(crate) fn new(
        mut file: File,
        offset: u64,
        size: u64,
        count: u64,
        formats: &'static [FieldFormat],
        seek: u64,
    ) -> Result<Self> {
        file.seek(SeekFrom::Start(offset))?;
        let mut iter = RecordIter {
            reader: BufReader::new(file).take(size),
            formats,
            remaining: count,
            failed: false,
        };

        for _ in 0..seek.min(count) {
            iter.read_frame()?;
        }

        Ok(iter)
    }

    fn read_frame(&mut self) -> Result<Vec<u8>> {
        let mut len_buf = [0u8; 4];
        read_exact_or_corrupt(&mut self.reader, &mut len_buf, "length prefix")?;
        let len = u32::from_be_bytes(len_buf) as u64;

        if len + 1 > self.reader.limit() {
            return Err(IndexError::corrupt(format!(
                "record length {len} exceeds remaining list bytes {}",
                self.reader.limit()
            )));
        }

        let mut payload = vec![0u8; len as usize];
        read_exact_or_corrupt(&mut self.reader, &mut payload, "payload")?;

        let mut term = [0u8; 1];
        read_exact_or_corrupt(&mut self.reader, &mut term, "terminator")?;
        if term[0] != RECORD_TERMINATOR {
            return Err(IndexError::corrupt(format!(
                "record terminator is {:#04x}, expected newline",
                term[0]
            )));
        }

        self.remaining = self.remaining.saturating_sub(1);
        Ok(payload)
    }

    fn next_record(&mut self) -> Result<Vec<Value>> {
        let payload = self.read_frame()?;
        binary::decode(&payload, self.formats)
    }
}

fn read_exact_or_corrupt<R: Read>(reader: &mut R, buf: &mut [u8], what: &str) -> Result<()> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => IndexError::corrupt(format!("truncated record {what}")),
        _ => IndexError::Io(e),
    })
}

impl Iterator for RecordIter {
    type Item = Result<Vec<Value>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.remaining == 0 {
            return None;
        }

        let item = self.next_record();
        if item.is_err() {
            self.failed = true;
        }
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.failed {
            return (0, Some(0));
        }
        let n = self.remaining as usize;
        (0, Some(n))
    }
}

#[cfg(test)]
#[path = "list_tests.rs"]
mod tests;
