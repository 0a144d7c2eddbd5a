use std::{fmt, path::Path, str::FromStr};

use serde::Serialize;

use crate::{
    error::Result,
    index::{
        IndexKind, TYPE_TAG_LEN,
        header::IndexHeader,
        helpers::{join_root_rel, strip_root, trim_trailing_sep},
        manager::{IndexManager, Records},
    },
    node::FileNodeInfo,
};

/// Header tag of filesystem manifests.
pub const FILE_INDEX_TAG: [u8; TYPE_TAG_LEN] = *b"f11e1dc0a001";

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ListType {
    Files = 0,
    Dirs = 1,
    /// Entries shipped with the installer rather than the archive body
    Installer = 2,
    /// Paths removed since the previous backup
    Delete = 3,
}

impl ListType {
    pub const ALL: [ListType; 4] = [
        ListType::Files,
        ListType::Dirs,
        ListType::Installer,
        ListType::Delete,
    ];

    #[inline]
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ListType::Files => "files",
            ListType::Dirs => "dirs",
            ListType::Installer => "installer",
            ListType::Delete => "delete",
        }
    }
}

impl fmt::Display for ListType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ListType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        ListType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown list type {s:?} (files, dirs, installer, delete)"))
    }
}

/// Rewrites paths under `root` to live under `new_root` instead. Scoped to
/// one manifest build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootPathMap {
    root: String,
    new_root: String,
}

impl RootPathMap {
    pub fn new(root: impl AsRef<str>, new_root: impl AsRef<str>) -> Self {
        Self {
            root: trim_trailing_sep(root.as_ref()).to_owned(),
            new_root: trim_trailing_sep(new_root.as_ref()).to_owned(),
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn new_root(&self) -> &str {
        &self.new_root
    }

    /// The remapped path, or `None` when `path` is not `root` or below it.
    pub fn remap(&self, path: &str) -> Option<String> {
        if self.root.is_empty() {
            return None;
        }
        strip_root(path, &self.root).map(|rest| join_root_rel(&self.new_root, rest))
    }
}

impl FromStr for RootPathMap {
    type Err = String;

    /// Parses `OLD=NEW`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (old, new) = s
            .split_once('=')
            .ok_or_else(|| format!("root map {s:?} must look like OLD=NEW"))?;
        if old.is_empty() {
            return Err("root map needs a non-empty OLD root".to_string());
        }
        Ok(RootPathMap::new(old, new))
    }
}

/// Index kind for filesystem manifests.
#[derive(Debug, Clone, Default)]
pub struct FileIndex {
    root_map: Option<RootPathMap>,
}

impl FileIndex {
    pub fn new(root_map: Option<RootPathMap>) -> Self {
        Self { root_map }
    }

    pub fn root_map(&self) -> Option<&RootPathMap> {
        self.root_map.as_ref()
    }
}

impl IndexKind for FileIndex {
    type Record = FileNodeInfo;

    const TYPE_TAG: [u8; TYPE_TAG_LEN] = FILE_INDEX_TAG;

    const LISTS: &'static [u32] = &[
        ListType::Files as u32,
        ListType::Dirs as u32,
        ListType::Installer as u32,
        ListType::Delete as u32,
    ];

    fn before_write(&self, record: &mut FileNodeInfo) {
        if let Some(target) = self.root_map.as_ref().and_then(|m| m.remap(record.path())) {
            record.set_target_path(target);
        }
    }
}

/// Manifest of filesystem entries for one backup archive.
pub struct FileIndexManager {
    inner: IndexManager<FileIndex>,
}

impl FileIndexManager {
    pub fn open(path: impl AsRef<Path>, create: bool, root_map: Option<RootPathMap>) -> Result<Self> {
        Ok(Self {
            inner: IndexManager::open(path, create, FileIndex::new(root_map))?,
        })
    }

    pub fn add_node(&mut self, list: ListType, node: FileNodeInfo) -> Result<()> {
        self.inner.add(list.as_u32(), node)
    }

    pub fn nodes(&mut self, list: ListType, seek: u64) -> Result<Records<FileNodeInfo>> {
        self.inner.iterate(list.as_u32(), seek)
    }

    /// Collect a whole list; convenient for small manifests and tests.
    pub fn read_all(&mut self, list: ListType) -> Result<Vec<FileNodeInfo>> {
        self.nodes(list, 0)?.collect()
    }

    pub fn count(&self, list: ListType) -> Result<u64> {
        self.inner.count(list.as_u32())
    }

    /// Counts of every list, in `ListType::ALL` order.
    pub fn counts(&self) -> Result<Vec<(ListType, u64)>> {
        ListType::ALL
            .into_iter()
            .map(|t| self.count(t).map(|n| (t, n)))
            .collect()
    }

    pub fn save(&mut self) -> Result<()> {
        self.inner.save()
    }

    pub fn reset(&mut self) -> Result<()> {
        self.inner.reset()
    }

    pub fn close(self) -> Result<()> {
        self.inner.close()
    }

    pub fn is_write_mode(&self) -> bool {
        self.inner.is_write_mode()
    }

    pub fn path(&self) -> &Path {
        self.inner.path()
    }

    pub fn root_map(&self) -> Option<&RootPathMap> {
        self.inner.kind().root_map()
    }

    pub fn header(&self) -> &IndexHeader {
        self.inner.header()
    }

    /// Size of the index file on disk.
    pub fn file_len(&self) -> Result<u64> {
        Ok(std::fs::metadata(self.path())?.len())
    }
}

#[cfg(test)]
#[path = "file_index_tests.rs"]
mod tests;
