mod config;
mod excludes;
mod record;
mod walker;

pub use excludes::{IgnoreEngine, IgnoreOptions, UserExcludes};
pub use record::FileRecord;
pub use walker::{ScanContext, walk_parallel};
