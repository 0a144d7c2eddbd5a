pub mod build;
pub mod diff;
pub mod info;
pub mod list;
pub mod reset;
pub mod tree;

use std::{path::PathBuf, process::ExitCode};

use anyhow::Result;
use clap::{Args, Subcommand};
use log::error;
use manidx_runtime::default_index_path;

pub use build::BuildArgs;
pub use diff::DiffArgs;
pub use info::InfoArgs;
pub use list::ListArgs;
pub use reset::ResetArgs;
pub use tree::TreeArgs;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan a directory and rewrite the manifest from scratch.
    ///
    /// Example:
    ///   manidx build --root /srv/www --hash
    ///   manidx build --index /backups/site.idx --root-map wp-content=content
    Build(BuildArgs),

    /// Show the header and list counts of a manifest.
    Info(InfoArgs),

    /// Print the entries of one list.
    ///
    /// Example:
    ///   manidx list --list dirs --json
    List(ListArgs),

    /// Show one path of the manifest and what lies below it.
    Tree(TreeArgs),

    /// Compare the file lists of two manifests.
    ///
    /// Example:
    ///   manidx diff yesterday.idx today.idx
    Diff(DiffArgs),

    /// Empty every list of a manifest.
    Reset(ResetArgs),
}

/// Location of the manifest file a command works on.
#[derive(Debug, Args)]
pub struct IndexOpt {
    /// Manifest file (defaults to the per-user cache location)
    #[arg(long, short = 'i', value_name = "FILE")]
    pub index: Option<PathBuf>,
}

impl IndexOpt {
    pub fn resolve(&self) -> PathBuf {
        self.index.clone().unwrap_or_else(default_index_path)
    }
}

/// Map a command outcome to the process exit code; errors exit with 2.
pub fn finish(kind: &str, result: Result<ExitCode>) -> ExitCode {
    match result {
        Ok(code) => code,
        Err(e) => {
            error!("[{kind}] {e:#}");
            eprintln!("[{kind}] {e:#}");
            ExitCode::from(2)
        }
    }
}

/// Soft failure: the manifest does not exist yet.
pub fn missing_index(kind: &str, path: &std::path::Path) -> ExitCode {
    eprintln!("[{kind}] no index found at {}", path.display());
    ExitCode::from(1)
}
