//! Sorted merge-diff of two manifests.

use std::cmp::Ordering;

use serde::Serialize;

use crate::{
    error::{IndexError, Result},
    index::{FileIndexManager, ListType},
    node::FileNodeInfo,
};

/// Receives the classification of every entry seen by [compare].
pub trait IndexComparator {
    /// Present only in the new manifest.
    fn handle_new(&mut self, new: FileNodeInfo) -> Result<()>;

    /// Present only in the old manifest.
    fn handle_deleted(&mut self, old: FileNodeInfo) -> Result<()>;

    fn handle_modified(&mut self, old: FileNodeInfo, new: FileNodeInfo) -> Result<()>;

    fn handle_unchanged(&mut self, old: FileNodeInfo, new: FileNodeInfo) -> Result<()>;
}

/// Whether two entries with the same path differ.
///
/// Size and mtime always count. Hashes count only when both sides carry
/// one; an empty hash means it was never computed.
pub fn is_modified(old: &FileNodeInfo, new: &FileNodeInfo) -> bool {
    if old.size() != new.size() || old.mtime() != new.mtime() {
        return true;
    }
    !old.hash().is_empty() && !new.hash().is_empty() && old.hash() != new.hash()
}

/// Walk both manifests once, in step, and classify every entry.
///
/// Both inputs must be strictly ascending by path; a violation aborts with
/// [IndexError::Unsorted] instead of producing a wrong diff.
pub fn compare<O, N, H>(old: O, new: N, handler: &mut H) -> Result<()>
where
    O: IntoIterator<Item = Result<FileNodeInfo>>,
    N: IntoIterator<Item = Result<FileNodeInfo>>,
    H: IndexComparator + ?Sized,
{
    let mut old = SortedCursor::new(old.into_iter(), "old")?;
    let mut new = SortedCursor::new(new.into_iter(), "new")?;

    loop {
        match (old.current.take(), new.current.take()) {
            (None, None) => break,
            (None, Some(n)) => {
                handler.handle_new(n)?;
                new.advance()?;
            }
            (Some(o), None) => {
                handler.handle_deleted(o)?;
                old.advance()?;
            }
            (Some(o), Some(n)) => match o.path().cmp(n.path()) {
                Ordering::Equal => {
                    if is_modified(&o, &n) {
                        handler.handle_modified(o, n)?;
                    } else {
                        handler.handle_unchanged(o, n)?;
                    }
                    old.advance()?;
                    new.advance()?;
                }
                Ordering::Less => {
                    handler.handle_deleted(o)?;
                    new.current = Some(n);
                    old.advance()?;
                }
                Ordering::Greater => {
                    handler.handle_new(n)?;
                    old.current = Some(o);
                    new.advance()?;
                }
            },
        }
    }

    Ok(())
}

struct SortedCursor<I> {
    iter: I,
    side: &'static str,
    current: Option<FileNodeInfo>,
    last_path: Option<String>,
}

impl<I: Iterator<Item = Result<FileNodeInfo>>> SortedCursor<I> {
    fn new(iter: I, side: &'static str) -> Result<Self> {
        let mut cursor = Self {
            iter,
            side,
            current: None,
            last_path: None,
        };
        cursor.advance()?;
        Ok(cursor)
    }

    fn advance(&mut self) -> Result<()> {
        let Some(next) = self.iter.next() else {
            self.current = None;
            return Ok(());
        };
        let node = next?;

        if let Some(prev) = &self.last_path
            && node.path() <= prev.as_str()
        {
            return Err(IndexError::Unsorted {
                side: self.side,
                previous: prev.clone(),
                current: node.path().to_owned(),
            });
        }

        self.last_path = Some(node.path().to_owned());
        self.current = Some(node);
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ModifiedEntry {
    pub old: FileNodeInfo,
    pub new: FileNodeInfo,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffCounts {
    pub added: usize,
    pub deleted: usize,
    pub modified: usize,
    pub unchanged: usize,
}

/// Collects every change; unchanged entries are only counted.
#[derive(Debug, Default, Serialize)]
pub struct ManifestDiff {
    pub added: Vec<FileNodeInfo>,
    pub deleted: Vec<FileNodeInfo>,
    pub modified: Vec<ModifiedEntry>,
    pub unchanged: usize,
}

impl ManifestDiff {
    pub fn counts(&self) -> DiffCounts {
        DiffCounts {
            added: self.added.len(),
            deleted: self.deleted.len(),
            modified: self.modified.len(),
            unchanged: self.unchanged,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.deleted.is_empty() && self.modified.is_empty()
    }
}

impl IndexComparator for ManifestDiff {
    fn handle_new(&mut self, new: FileNodeInfo) -> Result<()> {
        self.added.push(new);
        Ok(())
    }

    fn handle_deleted(&mut self, old: FileNodeInfo) -> Result<()> {
        self.deleted.push(old);
        Ok(())
    }

    fn handle_modified(&mut self, old: FileNodeInfo, new: FileNodeInfo) -> Result<()> {
        self.modified.push(ModifiedEntry { old, new });
        Ok(())
    }

    fn handle_unchanged(&mut self, _old: FileNodeInfo, _new: FileNodeInfo) -> Result<()> {
        self.unchanged += 1;
        Ok(())
    }
}

/// Writes every deleted entry into a manifest's `Delete` list, so an
/// incremental archive can record what disappeared since the last one.
pub struct DeletionRecorder<'a> {
    target: &'a mut FileIndexManager,
    recorded: u64,
}

impl<'a> DeletionRecorder<'a> {
    pub fn new(target: &'a mut FileIndexManager) -> Self {
        Self {
            target,
            recorded: 0,
        }
    }

    pub fn recorded(&self) -> u64 {
        self.recorded
    }
}

impl IndexComparator for DeletionRecorder<'_> {
    fn handle_new(&mut self, _new: FileNodeInfo) -> Result<()> {
        Ok(())
    }

    fn handle_deleted(&mut self, old: FileNodeInfo) -> Result<()> {
        self.target.add_node(ListType::Delete, old)?;
        self.recorded += 1;
        Ok(())
    }

    fn handle_modified(&mut self, _old: FileNodeInfo, _new: FileNodeInfo) -> Result<()> {
        Ok(())
    }

    fn handle_unchanged(&mut self, _old: FileNodeInfo, _new: FileNodeInfo) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
#[path = "compare_tests.rs"]
mod tests;
