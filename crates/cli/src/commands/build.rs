use std::{path::PathBuf, process::ExitCode};

use anyhow::Result;
use clap::Args;
use log::info;
use manidx_engine::RootPathMap;
use manidx_indexer::{BuildOptions, build_manifest};
use manidx_runtime::default_scan_root;

use crate::commands::{IndexOpt, finish};

#[derive(Debug, Args)]
pub struct BuildArgs {
    /// Directory to scan (defaults to the current directory)
    #[arg(long, short = 'r', value_name = "DIR")]
    pub root: Option<PathBuf>,

    #[command(flatten)]
    pub index: IndexOpt,

    /// Store a CRC32 content hash for every regular file
    #[arg(long)]
    pub hash: bool,

    /// Rewrite stored paths under OLD to NEW
    #[arg(long, value_name = "OLD=NEW")]
    pub root_map: Option<RootPathMap>,

    /// Extra gitignore-style pattern to leave out (repeatable)
    #[arg(long, short = 'x', value_name = "PATTERN")]
    pub exclude: Vec<String>,

    /// Absolute path to leave out (repeatable)
    #[arg(long, value_name = "PATH")]
    pub exclude_path: Vec<PathBuf>,

    /// Do not apply the built-in ignore patterns (.git/, node_modules/, ...)
    #[arg(long)]
    pub no_default_ignores: bool,

    /// Number of scanner threads
    #[arg(long, short = 'j')]
    pub threads: Option<usize>,
}

pub fn run(args: BuildArgs) -> ExitCode {
    finish("build", execute(args))
}

fn execute(args: BuildArgs) -> Result<ExitCode> {
    let root = args.root.unwrap_or_else(default_scan_root);
    let index_path = args.index.resolve();

    let options = BuildOptions {
        with_hash: args.hash,
        root_map: args.root_map,
        use_default_ignores: !args.no_default_ignores,
        exclude_patterns: args.exclude,
        exclude_paths: args.exclude_path,
        threads: args.threads,
    };

    info!("[build] {} -> {}", root.display(), index_path.display());
    let summary = build_manifest(&root, &index_path, &options)?;

    eprintln!(
        "[build] {} dirs, {} files -> {}",
        summary.dirs,
        summary.files,
        index_path.display()
    );

    Ok(ExitCode::SUCCESS)
}
