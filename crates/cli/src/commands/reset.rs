use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use manidx_engine::FileIndexManager;

use crate::commands::{IndexOpt, finish, missing_index};

#[derive(Debug, Args)]
pub struct ResetArgs {
    #[command(flatten)]
    pub index: IndexOpt,
}

pub fn run(args: ResetArgs) -> ExitCode {
    finish("reset", execute(args))
}

fn execute(args: ResetArgs) -> Result<ExitCode> {
    let index_path = args.index.resolve();
    if !index_path.exists() {
        return Ok(missing_index("reset", &index_path));
    }

    let mut index = FileIndexManager::open(&index_path, false, None)
        .with_context(|| format!("Failed to open index at {}", index_path.display()))?;
    index.reset()?;
    index.close()?;

    eprintln!("[reset] emptied {}", index_path.display());
    Ok(ExitCode::SUCCESS)
}
