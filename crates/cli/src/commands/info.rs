use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use manidx_engine::{FileIndexManager, ListType};
use serde::Serialize;

use crate::commands::{IndexOpt, finish, missing_index};

#[derive(Debug, Args)]
pub struct InfoArgs {
    #[command(flatten)]
    pub index: IndexOpt,

    /// Print one JSON object instead of text
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct ListInfo {
    list: ListType,
    count: u64,
    offset: u64,
    size: u64,
}

#[derive(Debug, Serialize)]
struct IndexInfo {
    location: String,
    type_tag: String,
    version: u32,
    size_bytes: u64,
    lists: Vec<ListInfo>,
}

pub fn run(args: InfoArgs) -> ExitCode {
    finish("info", execute(args))
}

fn execute(args: InfoArgs) -> Result<ExitCode> {
    let index_path = args.index.resolve();
    if !index_path.exists() {
        return Ok(missing_index("info", &index_path));
    }

    let index = FileIndexManager::open(&index_path, false, None)
        .with_context(|| format!("Failed to open index at {}", index_path.display()))?;

    let header = index.header();
    let lists = index
        .counts()?
        .into_iter()
        .map(|(list, count)| {
            let (offset, size) = header
                .desc(list.as_u32())
                .map_or((0, 0), |d| (d.offset, d.size));
            ListInfo {
                list,
                count,
                offset,
                size,
            }
        })
        .collect();

    let info = IndexInfo {
        location: index_path.display().to_string(),
        type_tag: header.type_tag_str(),
        version: header.version,
        size_bytes: index.file_len()?,
        lists,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        println!("location: {}", info.location);
        println!("type:     {}", info.type_tag);
        println!("version:  {}", info.version);
        println!("size:     {} bytes", info.size_bytes);
        for l in &info.lists {
            println!(
                "{:<10}{:>10} entries  ({} bytes at offset {})",
                format!("{}:", l.list),
                l.count,
                l.size,
                l.offset
            );
        }
    }

    Ok(ExitCode::SUCCESS)
}
