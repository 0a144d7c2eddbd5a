use std::path::PathBuf;

pub const PROGRAM_NAME: &str = "manidx";
pub const PROGRAM_LOG_LEVEL: &str = "MANIDX_LOG_LEVEL";
/// When set, log lines are appended to this file instead of stderr.
pub const PROGRAM_LOG_FILE: &str = "MANIDX_LOG_FILE";
pub const INDEX_FILE_NAME: &str = "manifest.idx";

pub fn xdg_or_home(xdg_var: &str, home_suffix: &str) -> PathBuf {
    if let Some(dir) = std::env::var_os(xdg_var) {
        PathBuf::from(dir)
    } else {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(home_suffix)
    }
}

/// Default root for a manifest scan: the current directory.
pub fn default_scan_root() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

pub fn manidx_dir() -> PathBuf {
    xdg_or_home("XDG_CACHE_HOME", ".cache").join(PROGRAM_NAME)
}

/// Default manifest file path
pub fn default_index_path() -> PathBuf {
    manidx_dir().join(INDEX_FILE_NAME)
}

/// Root-relative patterns that never belong in a backup manifest.
pub const DEFAULT_BACKUP_IGNORE_PATTERNS: &[&str] = &[
    ".git/",
    ".hg/",
    ".svn/",
    "node_modules/",
    ".cache/",
    ".DS_Store",
    "Thumbs.db",
    ".manidx-seg-*",
    "lost+found/",
];

/// System-ish directories to skip when the scan root is `/`.
pub const DEFAULT_SYSTEM_SKIP_PREFIXES: &[&str] = &[
    "/proc",
    "/sys",
    "/dev",
    "/run",
    "/var/run",
    "/var/tmp",
    "/private/tmp",
];
