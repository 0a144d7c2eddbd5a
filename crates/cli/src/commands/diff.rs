use std::{
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::{Context, Result, bail};
use clap::Args;
use log::info;
use manidx_engine::{DeletionRecorder, FileIndexManager, ListType, ManifestDiff, compare};

use crate::commands::{finish, missing_index};

#[derive(Debug, Args)]
pub struct DiffArgs {
    /// Manifest of the previous state
    pub old: PathBuf,

    /// Manifest of the current state
    pub new: PathBuf,

    /// List to compare
    #[arg(long, short = 'l', default_value = "files")]
    pub list: ListType,

    /// Print the full diff as one JSON object
    #[arg(long)]
    pub json: bool,

    /// Append every deleted entry to NEW's delete list instead of printing
    #[arg(long, conflicts_with = "json")]
    pub record_deletions: bool,
}

pub fn run(args: DiffArgs) -> ExitCode {
    finish("diff", execute(args))
}

fn open(path: &Path) -> Result<FileIndexManager> {
    FileIndexManager::open(path, false, None)
        .with_context(|| format!("Failed to open index at {}", path.display()))
}

fn execute(args: DiffArgs) -> Result<ExitCode> {
    for path in [&args.old, &args.new] {
        if !path.exists() {
            return Ok(missing_index("diff", path));
        }
    }

    if args.record_deletions && args.old.canonicalize()? == args.new.canonicalize()? {
        bail!("OLD and NEW are the same manifest");
    }

    let mut old = open(&args.old)?;
    let mut new = open(&args.new)?;
    let old_nodes = old.nodes(args.list, 0)?;
    let new_nodes = new.nodes(args.list, 0)?;

    if args.record_deletions {
        let mut recorder = DeletionRecorder::new(&mut new);
        compare(old_nodes, new_nodes, &mut recorder)?;
        let recorded = recorder.recorded();
        new.close()
            .with_context(|| format!("Failed to save {}", args.new.display()))?;
        eprintln!(
            "[diff] recorded {recorded} deletions in {}",
            args.new.display()
        );
        return Ok(ExitCode::SUCCESS);
    }

    let mut diff = ManifestDiff::default();
    compare(old_nodes, new_nodes, &mut diff)?;
    let counts = diff.counts();
    info!("[diff] {counts:?}");

    if args.json {
        println!("{}", serde_json::to_string_pretty(&diff)?);
        return Ok(ExitCode::SUCCESS);
    }

    for node in &diff.added {
        println!("+ {}", node.path());
    }
    for node in &diff.deleted {
        println!("- {}", node.path());
    }
    for entry in &diff.modified {
        println!("M {}", entry.new.path());
    }
    eprintln!(
        "[diff] {} added, {} deleted, {} modified, {} unchanged",
        counts.added, counts.deleted, counts.modified, counts.unchanged
    );

    Ok(ExitCode::SUCCESS)
}
