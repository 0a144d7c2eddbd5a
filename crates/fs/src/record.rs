use std::path::PathBuf;

/// One filesystem entry seen by the scanner.
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub full_path: PathBuf,
    /// File name
    pub name: String,
    /// File size, 0 for directories
    pub size: u64,
    /// Last modified time in seconds since epoch, -1 when unavailable
    pub mtime_secs: i64,
    pub is_dir: bool,
    pub is_symlink: bool,
    /// Symlink whose target resolves to a directory
    pub link_to_dir: bool,
    /// Sockets, fifos, device nodes
    pub is_special: bool,
}
