mod config;
pub mod logging;

pub use config::{
    DEFAULT_BACKUP_IGNORE_PATTERNS, DEFAULT_SYSTEM_SKIP_PREFIXES, INDEX_FILE_NAME, PROGRAM_NAME,
    default_index_path, default_scan_root, manidx_dir,
};

pub use logging::init;
