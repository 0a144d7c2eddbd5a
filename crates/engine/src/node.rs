use std::{
    fmt,
    fs::File,
    io::{self, BufReader, Read},
    path::Path,
};

use crc32fast::Hasher;
use manidx_fs::FileRecord;
use serde::Serialize;

use crate::{
    binary::{FieldFormat, Record, Value},
    error::{IndexError, Result},
};

/// Modification time for entries whose mtime is unknown.
pub const MTIME_UNSET: i64 = -1;

const HASH_READ_BUF: usize = 64 * 1024;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeType {
    Unknown = 0,
    File = 1,
    Dir = 2,
    LinkFile = 3,
    LinkDir = 4,
}

impl NodeType {
    pub fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0 => NodeType::Unknown,
            1 => NodeType::File,
            2 => NodeType::Dir,
            3 => NodeType::LinkFile,
            4 => NodeType::LinkDir,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NodeType::Unknown => "unknown",
            NodeType::File => "file",
            NodeType::Dir => "dir",
            NodeType::LinkFile => "link-file",
            NodeType::LinkDir => "link-dir",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One filesystem entry of a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileNodeInfo {
    path: String,
    /// Path written to disk instead of `path`, set by root remapping.
    #[serde(skip_serializing_if = "Option::is_none")]
    target_path: Option<String>,
    node_type: NodeType,
    size: u64,
    /// Number of entries below a directory, 0 for leaves.
    nodes: u64,
    mtime: i64,
    /// Lower-case hex CRC32 of the content; empty when not computed.
    hash: String,
}

#[cfg(feature = "node-hash")]
const FORMATS: &[FieldFormat] = &[
    FieldFormat::Str,
    FieldFormat::U8,
    FieldFormat::U64,
    FieldFormat::U64,
    FieldFormat::I64,
    FieldFormat::Str,
];

#[cfg(not(feature = "node-hash"))]
const FORMATS: &[FieldFormat] = &[
    FieldFormat::Str,
    FieldFormat::U8,
    FieldFormat::U64,
    FieldFormat::U64,
    FieldFormat::I64,
];

impl FileNodeInfo {
    pub fn new(path: impl Into<String>, node_type: NodeType, size: u64, mtime: i64) -> Self {
        Self {
            path: path.into(),
            target_path: None,
            node_type,
            size,
            nodes: 0,
            mtime,
            hash: String::new(),
        }
    }

    pub fn with_nodes(mut self, nodes: u64) -> Self {
        self.nodes = nodes;
        self
    }

    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.hash = hash.into();
        self
    }

    /// Build a node from a scanner record. `path` is made relative to `root`
    /// with `/` separators. When `with_hash` is set, regular files get their
    /// content hash computed now.
    pub fn from_record(record: &FileRecord, root: &Path, with_hash: bool) -> io::Result<Self> {
        let rel = record.full_path.strip_prefix(root).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "{} is outside scan root {}",
                    record.full_path.display(),
                    root.display()
                ),
            )
        })?;
        let path = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let node_type = match (record.is_symlink, record.link_to_dir, record.is_dir) {
            (true, true, _) => NodeType::LinkDir,
            (true, false, _) => NodeType::LinkFile,
            (false, _, true) => NodeType::Dir,
            _ if record.is_special => NodeType::Unknown,
            _ => NodeType::File,
        };

        let mut node = FileNodeInfo::new(path, node_type, record.size, record.mtime_secs);
        if with_hash && node_type == NodeType::File {
            node.hash = Self::hash_file(&record.full_path)?;
        }
        Ok(node)
    }

    /// CRC32 of a file's content as 8 lower-case hex chars.
    pub fn hash_file(path: &Path) -> io::Result<String> {
        let mut reader = BufReader::with_capacity(HASH_READ_BUF, File::open(path)?);
        let mut hasher = Hasher::new();
        let mut buf = vec![0u8; HASH_READ_BUF];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(format!("{:08x}", hasher.finalize()))
    }

    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The path that is stored on write.
    #[inline]
    pub fn write_path(&self) -> &str {
        self.target_path.as_deref().unwrap_or(&self.path)
    }

    #[inline]
    pub fn target_path(&self) -> Option<&str> {
        self.target_path.as_deref()
    }

    pub fn set_target_path(&mut self, target: impl Into<String>) {
        self.target_path = Some(target.into());
    }

    #[inline]
    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    #[inline]
    pub fn nodes(&self) -> u64 {
        self.nodes
    }

    #[inline]
    pub fn mtime(&self) -> i64 {
        self.mtime
    }

    #[inline]
    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn is_dir(&self) -> bool {
        matches!(self.node_type, NodeType::Dir | NodeType::LinkDir)
    }

    pub fn is_file(&self) -> bool {
        matches!(self.node_type, NodeType::File | NodeType::LinkFile)
    }

    pub fn binary_formats() -> &'static [FieldFormat] {
        FORMATS
    }

    pub fn binary_values(&self) -> Vec<Value> {
        let mut values = vec![
            Value::Str(self.write_path().to_owned()),
            Value::U8(self.node_type as u8),
            Value::U64(self.size),
            Value::U64(self.nodes),
            Value::I64(self.mtime),
        ];
        if cfg!(feature = "node-hash") {
            values.push(Value::Str(self.hash.clone()));
        }
        values
    }

    pub fn object_from_data(values: Vec<Value>) -> Result<Self> {
        if values.len() != FORMATS.len() {
            return Err(IndexError::format(format!(
                "file node needs {} fields, got {}",
                FORMATS.len(),
                values.len()
            )));
        }

        let mut it = values.into_iter();
        let (Some(Value::Str(path)), Some(Value::U8(raw_type)), Some(Value::U64(size))) =
            (it.next(), it.next(), it.next())
        else {
            return Err(IndexError::format("file node: bad path/type/size fields"));
        };
        let (Some(Value::U64(nodes)), Some(Value::I64(mtime))) = (it.next(), it.next()) else {
            return Err(IndexError::format("file node: bad nodes/mtime fields"));
        };
        let hash = match it.next() {
            Some(Value::Str(h)) => h,
            None => String::new(),
            Some(other) => {
                return Err(IndexError::format(format!(
                    "file node: hash field is {:?}",
                    other.format()
                )));
            }
        };

        let node_type = NodeType::from_u8(raw_type)
            .ok_or_else(|| IndexError::corrupt(format!("unknown node type {raw_type}")))?;

        Ok(FileNodeInfo {
            path,
            target_path: None,
            node_type,
            size,
            nodes,
            mtime,
            hash,
        })
    }
}

impl Record for FileNodeInfo {
    fn formats() -> &'static [FieldFormat] {
        Self::binary_formats()
    }

    fn values(&self) -> Vec<Value> {
        self.binary_values()
    }

    fn from_values(values: Vec<Value>) -> Result<Self> {
        Self::object_from_data(values)
    }
}

#[cfg(test)]
#[path = "node_tests.rs"]
mod tests;
