use std::{
    fs::{self, File, OpenOptions},
    io::{self, ErrorKind, Seek, SeekFrom},
    marker::PhantomData,
    path::{Path, PathBuf},
};

use log::{debug, error, info, warn};

use crate::{
    binary::Record,
    error::{IndexError, Result},
    index::{
        IndexKind,
        header::{HEADER_SIZE, IndexHeader},
        list::{IndexList, RecordIter},
    },
};

/// A manifest index file: one header followed by one contiguous segment per
/// list type.
///
/// The manager starts in read mode holding a shared lock. The first `add`
/// takes the exclusive lock and stages every list in a temp segment;
/// `save` merges the segments back, rewrites the header and drops to the
/// shared lock again. Dropping the manager saves pending writes and
/// releases the lock.
pub struct IndexManager<K: IndexKind> {
    path: PathBuf,
    file: File,
    header: IndexHeader,
    /// Staged lists in `K::LISTS` order; `Some` while open for write.
    segments: Option<Vec<IndexList>>,
    kind: K,
}

impl<K: IndexKind> IndexManager<K> {
    /// Open the index at `path`.
    ///
    /// A missing or empty file is initialised with an empty header when
    /// `create` is set and is an error otherwise.
    pub fn open(path: impl AsRef<Path>, create: bool, kind: K) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let needs_init = match fs::metadata(&path) {
            Ok(meta) => meta.len() == 0,
            Err(e) if e.kind() == ErrorKind::NotFound => true,
            Err(e) => return Err(e.into()),
        };

        if needs_init && !create {
            return Err(IndexError::Io(io::Error::new(
                ErrorKind::NotFound,
                format!("index {} does not exist", path.display()),
            )));
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(create)
            .truncate(false)
            .open(&path)?;

        if needs_init {
            lock_exclusive(&file, &path)?;
            // Another process may have initialised it between stat and lock.
            if file.metadata()?.len() == 0 {
                IndexHeader::empty(&K::TYPE_TAG, K::LISTS).write_to(&mut file)?;
                file.sync_all()?;
                info!("[index] created empty index at {}", path.display());
            }
        }
        lock_shared(&file, &path)?;

        let header = read_header::<K>(&mut file, &path)?;
        debug!(
            "[index] opened {} ({} lists, {} bytes)",
            path.display(),
            header.list_count,
            header.data_end()
        );

        Ok(Self {
            path,
            file,
            header,
            segments: None,
            kind,
        })
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn kind(&self) -> &K {
        &self.kind
    }

    #[inline]
    pub fn header(&self) -> &IndexHeader {
        &self.header
    }

    #[inline]
    pub fn is_write_mode(&self) -> bool {
        self.segments.is_some()
    }

    /// Append one record to `list_type`, entering write mode if needed.
    pub fn add(&mut self, list_type: u32, mut record: K::Record) -> Result<()> {
        check_list::<K>(list_type)?;
        self.open_for_write()?;

        self.kind.before_write(&mut record);
        let segment = self.segment_mut(list_type)?;
        segment.add(&record.values(), K::Record::formats())
    }

    /// Number of records in `list_type`, staged ones included.
    pub fn count(&self, list_type: u32) -> Result<u64> {
        let count = match &self.segments {
            Some(segments) => segments
                .iter()
                .find(|s| s.list_type() == list_type)
                .map(IndexList::count),
            None => self.header.desc(list_type).map(|d| d.count),
        };
        count.ok_or(IndexError::UnknownList(list_type))
    }

    /// Lazily read `list_type`, skipping the first `seek` records.
    ///
    /// Reads the staged segment in write mode and the main file otherwise.
    pub fn iterate(&mut self, list_type: u32, seek: u64) -> Result<Records<K::Record>> {
        check_list::<K>(list_type)?;
        let formats = K::Record::formats();

        let inner = if self.segments.is_some() {
            self.segment_mut(list_type)?.iterate(formats, seek)?
        } else {
            let desc = *self
                .header
                .desc(list_type)
                .ok_or(IndexError::UnknownList(list_type))?;
            let file = File::open(&self.path)?;
            RecordIter::new(file, desc.offset, desc.size, desc.count, formats, seek)?
        };

        Ok(Records {
            inner,
            failed: false,
            _record: PhantomData,
        })
    }

    /// Merge staged segments into the main file and return to read mode.
    /// A no-op in read mode.
    pub fn save(&mut self) -> Result<()> {
        let Some(mut segments) = self.segments.take() else {
            return Ok(());
        };

        if let Err(e) = self.merge(&mut segments) {
            // Keep the staged data and the exclusive lock; a later save may
            // still succeed.
            self.segments = Some(segments);
            return Err(e);
        }

        drop(segments);
        lock_shared(&self.file, &self.path)?;
        debug!("[index] saved {} ({} bytes)", self.path.display(), self.header.data_end());
        Ok(())
    }

    /// Empty every list and truncate the file to a bare header.
    pub fn reset(&mut self) -> Result<()> {
        lock_exclusive(&self.file, &self.path)?;
        self.segments = None;

        let header = IndexHeader::empty(&K::TYPE_TAG, K::LISTS);
        let result = (|| -> Result<()> {
            self.file.set_len(0)?;
            header.write_to(&mut self.file)?;
            self.file.sync_all()?;
            Ok(())
        })();
        if result.is_ok() {
            self.header = header;
            info!("[index] reset {}", self.path.display());
        }

        let relock = lock_shared(&self.file, &self.path);
        result.and(relock)
    }

    /// Save and close, reporting any error the implicit drop would only log.
    pub fn close(mut self) -> Result<()> {
        self.save()
    }

    fn segment_mut(&mut self, list_type: u32) -> Result<&mut IndexList> {
        self.segments
            .as_mut()
            .and_then(|segments| segments.iter_mut().find(|s| s.list_type() == list_type))
            .ok_or(IndexError::UnknownList(list_type))
    }

    fn open_for_write(&mut self) -> Result<()> {
        if self.segments.is_some() {
            return Ok(());
        }

        lock_exclusive(&self.file, &self.path)?;
        match self.stage_segments() {
            Ok(segments) => {
                debug!("[index] {} open for write", self.path.display());
                self.segments = Some(segments);
                Ok(())
            }
            Err(e) => {
                if let Err(relock) = lock_shared(&self.file, &self.path) {
                    warn!("[index] could not restore shared lock: {relock}");
                }
                Err(e)
            }
        }
    }

    /// Copy every list out of the main file into fresh temp segments.
    fn stage_segments(&mut self) -> Result<Vec<IndexList>> {
        // Another writer may have saved since we last read the header.
        self.header = read_header::<K>(&mut self.file, &self.path)?;

        let dir = segment_dir(&self.path);
        let mut segments = Vec::with_capacity(K::LISTS.len());
        for &list_type in K::LISTS {
            let desc = *self
                .header
                .desc(list_type)
                .ok_or(IndexError::UnknownList(list_type))?;
            let mut segment = IndexList::new(list_type, dir)?;
            segment.copy_from_main(&mut self.file, desc.offset, desc.size, desc.count)?;
            segments.push(segment);
        }
        Ok(segments)
    }

    /// Rewrite the main file as header + segments in declaration order.
    fn merge(&mut self, segments: &mut [IndexList]) -> Result<()> {
        let mut header = IndexHeader::empty(&K::TYPE_TAG, K::LISTS);

        // An interrupted merge leaves a valid empty index, not a header
        // pointing past the end of the file.
        self.file.set_len(HEADER_SIZE)?;
        header.write_to(&mut self.file)?;
        self.file.seek(SeekFrom::Start(HEADER_SIZE))?;

        let mut offset = HEADER_SIZE;
        for segment in segments.iter_mut() {
            segment.copy_to_main(&mut self.file)?;

            let desc = header
                .desc_mut(segment.list_type())
                .ok_or(IndexError::UnknownList(segment.list_type()))?;
            desc.offset = offset;
            desc.size = segment.size();
            desc.count = segment.count();
            offset += segment.size();
        }

        header.seal();
        header.write_to(&mut self.file)?;
        self.file.sync_all()?;
        self.header = header;
        Ok(())
    }
}

impl<K: IndexKind> Drop for IndexManager<K> {
    fn drop(&mut self) {
        if self.segments.is_some()
            && let Err(e) = self.save()
        {
            error!(
                "[index] failed to save {} on close: {e}",
                self.path.display()
            );
        }

        if let Err(e) = self.file.unlock() {
            warn!("[index] failed to unlock {}: {e}", self.path.display());
        }
    }
}

/// Typed view over a [RecordIter].
pub struct Records<R> {
    inner: RecordIter,
    failed: bool,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> Iterator for Records<R> {
    type Item = Result<R>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        let item = self.inner.next()?.and_then(R::from_values);
        self.failed = item.is_err();
        Some(item)
    }
}

fn check_list<K: IndexKind>(list_type: u32) -> Result<()> {
    if K::LISTS.contains(&list_type) {
        Ok(())
    } else {
        Err(IndexError::UnknownList(list_type))
    }
}

fn read_header<K: IndexKind>(file: &mut File, path: &Path) -> Result<IndexHeader> {
    let header = IndexHeader::read_from(file)?;
    header.validate(path, &K::TYPE_TAG, file.metadata()?.len())?;

    for list_type in K::LISTS {
        if header.desc(*list_type).is_none() {
            return Err(IndexError::corrupt(format!(
                "header has no entry for list {list_type}"
            )));
        }
    }
    Ok(header)
}

fn segment_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

// Every acquisition releases first: changing the mode of a lock that is
// already held is not reliable on every platform (Windows in particular).

fn lock_shared(file: &File, path: &Path) -> Result<()> {
    relock(file, path, File::lock_shared)
}

fn lock_exclusive(file: &File, path: &Path) -> Result<()> {
    relock(file, path, File::lock)
}

fn relock(file: &File, path: &Path, lock: fn(&File) -> io::Result<()>) -> Result<()> {
    // Fails on Windows when nothing is held yet.
    let _ = file.unlock();
    lock(file).map_err(|source| IndexError::Lock {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
